/// Примитив синхронизации [`IrqSpinlock`], запрещающий прерывания, пока он захвачен.
pub mod irq_spinlock;

/// Примитив синхронизации [`Spinlock`].
pub mod spinlock;

pub use irq_spinlock::{
    IrqSpinlock,
    IrqSpinlockGuard,
};
pub use spinlock::{
    Spinlock,
    SpinlockGuard,
};

/// Примитив синхронизации для данных, которые записываются один раз и дальше только читаются.
pub type OnceLock<T> = spin::Once<T>;

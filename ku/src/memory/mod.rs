/// Физические и виртуальные адреса.
pub mod addr;

/// Непрерывные диапазоны адресов.
pub mod block;

/// Страницы виртуальной памяти и фреймы физической.
pub mod frage;

/// Права доступа к отображённым страницам.
pub mod mmu;

/// Код ошибки исключения доступа к странице.
pub mod page_fault_info;

pub use addr::{
    Phys,
    Virt,
};
pub use block::Block;
pub use frage::{
    Frame,
    PAGE_SIZE,
    Page,
};
pub use mmu::{
    KERNEL_RW,
    PageTableFlags,
    USER_R,
    USER_RW,
    USER_RX,
};
pub use page_fault_info::{
    FaultAccess,
    FaultCause,
    PageFaultInfo,
};

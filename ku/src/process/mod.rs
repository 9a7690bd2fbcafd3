/// Минимальная информация о контексте исполнения.
pub mod mini_context;

/// Идентификатор процесса.
pub mod pid;

/// Номера системных вызовов, коды завершения и коды результата системных вызовов.
pub mod syscall;

/// Номера прерываний и информация, которую процессор сообщает вместе с прерыванием.
pub mod trap_info;

use core::fmt;

use num_enum::{
    IntoPrimitive,
    TryFromPrimitive,
};

pub use mini_context::MiniContext;
pub use pid::Pid;
pub use syscall::{
    ExitCode,
    ResultCode,
    Syscall,
};
pub use trap_info::{
    IRQ_BASE,
    Info,
    Trap,
    VECTOR_COUNT,
};

/// Состояние пользовательского процесса с точки зрения диспетчера прерываний.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(usize)]
pub enum State {
    /// Процесс готов к исполнению, но не выполняется в данный момент.
    Runnable = 1,

    /// Процесс выполняется в данный момент.
    Running = 2,

    /// Процесс ждёт какого-то события, например тика таймера.
    Sleeping = 3,
}

impl fmt::Display for State {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        let state = match self {
            State::Runnable => "runnable",
            State::Running => "running",
            State::Sleeping => "sleeping",
        };

        write!(formatter, "{state}")
    }
}

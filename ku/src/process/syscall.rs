use num_enum::{
    IntoPrimitive,
    TryFromPrimitive,
};

use crate::error::{
    Error,
    Result,
};

/// Код завершения пользовательского процесса.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(usize)]
pub enum ExitCode {
    /// Процесс завершился успешно.
    Ok = 0,

    /// Процесс запаниковал.
    Panic = 1,

    /// Процесс выполнил несуществующий системный вызов.
    UnimplementedSyscall = 2,

    /// Процесс был убит ядром.
    Killed = 3,
}

/// Номера системных вызовов, передаются в регистре `rax`.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(usize)]
pub enum Syscall {
    /// `exit(code)`.
    Exit = 0,

    /// `alarm(period, handler)` --- взводит или выключает периодический будильник вызывающего процесса.
    Alarm = 1,

    /// `sleep(ticks)`.
    Sleep = 2,

    /// `uptime()` --- количество тиков с момента загрузки.
    Uptime = 3,
}

/// Код результата, который системные вызовы возвращают в регистре `rax`.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(usize)]
pub enum ResultCode {
    /// Код для [`Result::Ok`].
    Ok = 0,

    /// Код всех ошибок, которые системные вызовы возвращать не должны.
    Unexpected = 1,

    /// Код для [`Error::InvalidArgument`].
    InvalidArgument = 2,

    /// Код для [`Error::NoFrame`].
    NoFrame = 3,

    /// Код для [`Error::NoPage`].
    NoPage = 4,

    /// Код для [`Error::NoProcess`].
    NoProcess = 5,

    /// Код для [`Error::Overflow`].
    Overflow = 8,

    /// Код для [`Error::PermissionDenied`].
    PermissionDenied = 9,

    /// Код для [`Error::Unimplemented`].
    Unimplemented = 10,

    /// Код для [`Error::InvalidAlignment`].
    InvalidAlignment = 11,
}

impl From<ResultCode> for Result<()> {
    fn from(result: ResultCode) -> Result<()> {
        match result {
            ResultCode::Ok => Ok(()),

            ResultCode::InvalidArgument => Err(Error::InvalidArgument),
            ResultCode::NoFrame => Err(Error::NoFrame),
            ResultCode::NoPage => Err(Error::NoPage),
            ResultCode::NoProcess => Err(Error::NoProcess),
            ResultCode::Overflow => Err(Error::Overflow),
            ResultCode::PermissionDenied => Err(Error::PermissionDenied),
            ResultCode::Unimplemented => Err(Error::Unimplemented),
            ResultCode::InvalidAlignment => Err(Error::InvalidAlignment),

            ResultCode::Unexpected => panic!("unexpected error {result:?}"),
        }
    }
}

impl<T> From<Result<T>> for ResultCode {
    fn from(result: Result<T>) -> ResultCode {
        match result {
            Ok(_) => ResultCode::Ok,

            Err(error) => match error {
                Error::Fmt(_) | Error::Int(_) => ResultCode::Unexpected,
                Error::InvalidAlignment => ResultCode::InvalidAlignment,
                Error::InvalidArgument => ResultCode::InvalidArgument,
                Error::NoFrame => ResultCode::NoFrame,
                Error::NoPage => ResultCode::NoPage,
                Error::NoProcess => ResultCode::NoProcess,
                Error::Overflow => ResultCode::Overflow,
                Error::PermissionDenied => ResultCode::PermissionDenied,
                Error::Unimplemented => ResultCode::Unimplemented,
            },
        }
    }
}

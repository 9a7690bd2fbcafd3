use core::{
    fmt,
    num::TryFromIntError,
    result,
};

/// Перечисление возможных ошибок.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// Ошибка форматирования сообщения.
    Fmt(fmt::Error),

    /// Целое значение не помещается в запрошенный тип.
    Int(TryFromIntError),

    /// Неверное выравнивание.
    InvalidAlignment,

    /// Недопустимое значение аргумента.
    InvalidArgument,

    /// Не осталось свободных физических фреймов.
    NoFrame,

    /// Запрошенная виртуальная страница не отображена.
    NoPage,

    /// Нет такого процесса или он был убит.
    NoProcess,

    /// Произошло переполнение.
    Overflow,

    /// Нарушение прав доступа.
    PermissionDenied,

    /// Запрошенная функциональность не реализована.
    Unimplemented,
}

impl From<fmt::Error> for Error {
    fn from(e: fmt::Error) -> Self {
        Error::Fmt(e)
    }
}

impl From<TryFromIntError> for Error {
    fn from(e: TryFromIntError) -> Self {
        Error::Int(e)
    }
}

impl fmt::Display for Error {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        match self {
            Error::Fmt(error) => write!(formatter, "formatting failed: {error}"),
            Error::Int(error) => write!(formatter, "integer conversion failed: {error}"),
            Error::InvalidAlignment => write!(formatter, "invalid alignment"),
            Error::InvalidArgument => write!(formatter, "invalid argument"),
            Error::NoFrame => write!(formatter, "out of physical frames"),
            Error::NoPage => write!(formatter, "page is not mapped"),
            Error::NoProcess => write!(formatter, "no such process"),
            Error::Overflow => write!(formatter, "overflow"),
            Error::PermissionDenied => write!(formatter, "permission denied"),
            Error::Unimplemented => write!(formatter, "not implemented"),
        }
    }
}

/// Тип результата `T` или [`Error`] ---
/// [`result::Result`], конкретизированный типом ошибки.
pub type Result<T> = result::Result<T, Error>;

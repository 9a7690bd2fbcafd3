use derive_more::Display;

/// Идентификатор процесса.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{_0}")]
pub struct Pid(usize);

impl Pid {
    /// Создаёт идентификатор с порядковым номером `id`.
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Упаковывает [`Pid`] в значение регистра.
    pub fn into_usize(self) -> usize {
        self.0
    }
}

use core::fmt;

use crate::error::{
    Error::InvalidAlignment,
    Result,
};

use super::addr::{
    Addr,
    PhysTag,
    Tag,
    VirtTag,
};

// Used in docs.
#[allow(unused)]
use {
    super::{
        Phys,
        Virt,
    },
    crate::error::Error,
};

/// Размер стандартной страницы виртуальной памяти и фрейма физической.
pub const PAGE_SIZE: usize = 1 << PAGE_OFFSET_BITS;

/// Количество младших бит адреса, которые задают смещение байта внутри страницы.
pub const PAGE_OFFSET_BITS: u32 = 12;

/// Обобщённый тип для (виртуальных) страниц памяти и (физических) фреймов.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Frage<T: Tag>(Addr<T>);

impl<T: Tag> Frage<T> {
    /// Размер физического фрейма или виртуальной страницы.
    pub const SIZE: usize = PAGE_SIZE;

    /// Создаёт [`Frage`] --- [`Frame`] или [`Page`] ---
    /// по его начальному адресу `addr` --- [`Phys`] или [`Virt`] соответственно.
    ///
    /// Возвращает ошибку [`Error::InvalidAlignment`], если `addr` не выровнен на [`Frage::SIZE`].
    pub fn new(addr: Addr<T>) -> Result<Self> {
        if addr.is_aligned(Self::SIZE) {
            Ok(Self(addr))
        } else {
            Err(InvalidAlignment)
        }
    }

    /// Возвращает [`Frage`], содержащий адрес `addr`.
    pub fn containing(addr: Addr<T>) -> Self {
        Self(addr.align_down(Self::SIZE))
    }

    /// Возвращает начальный адрес [`Frage`].
    pub fn address(&self) -> Addr<T> {
        self.0
    }

    /// Возвращает порядковый номер [`Frage`] в адресном пространстве.
    pub fn index(&self) -> usize {
        self.0.into_usize() >> PAGE_OFFSET_BITS
    }
}

impl<T: Tag> fmt::Debug for Frage<T> {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(formatter, "{:?} @ {:?}", self.index(), self.0)
    }
}

impl<T: Tag> fmt::Display for Frage<T> {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(formatter, "{} @ {}", self.index(), self.0)
    }
}

/// Физический фрейм памяти.
pub type Frame = Frage<PhysTag>;

/// Виртуальная страница памяти.
pub type Page = Frage<VirtTag>;

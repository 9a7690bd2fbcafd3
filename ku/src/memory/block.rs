use core::fmt;

use crate::error::{
    Error::InvalidArgument,
    Result,
};

use super::{
    addr::{
        Addr,
        Tag,
    },
    frage::{
        Frage,
        PAGE_SIZE,
    },
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

/// Адрес, над которым строится [`Block`] --- [`Phys`] или [`Virt`].
pub trait Memory {
    /// Тег, отличающий физические адреса от виртуальных.
    type Tag: Tag;
}

impl<T: Tag> Memory for Addr<T> {
    type Tag = T;
}

/// Полуоткрытый интервал `[start, end)` физической или виртуальной памяти.
///
/// - [`Block<Phys>`] --- произвольный кусок физической памяти.
/// - [`Block<Virt>`] --- произвольный кусок виртуальной памяти.
///
/// [`Block`] не владеет описываемой им памятью.
pub struct Block<T: Memory> {
    /// Первый адрес блока.
    start: Addr<T::Tag>,

    /// Адрес, следующий за последним байтом блока.
    end: Addr<T::Tag>,
}

impl<T: Memory> Block<T> {
    /// Создаёт блок `[start, end)`.
    ///
    /// Возвращает ошибку [`Error::InvalidArgument`], если `start` больше `end`.
    pub fn new(
        start: Addr<T::Tag>,
        end: Addr<T::Tag>,
    ) -> Result<Self> {
        if start <= end {
            Ok(Self { start, end })
        } else {
            Err(InvalidArgument)
        }
    }

    /// Создаёт блок размером `size` байт, начинающийся с адреса `start`.
    pub fn from_size(
        start: Addr<T::Tag>,
        size: usize,
    ) -> Result<Self> {
        Self::new(start, (start + size)?)
    }

    /// Создаёт блок, который занимает [`Frage`] `frage`.
    pub fn from_frage(frage: Frage<T::Tag>) -> Result<Self> {
        Self::from_size(frage.address(), Frage::<T::Tag>::SIZE)
    }

    /// Первый адрес блока.
    pub fn start_address(&self) -> Addr<T::Tag> {
        self.start
    }

    /// Адрес, следующий за последним байтом блока.
    pub fn end_address(&self) -> Addr<T::Tag> {
        self.end
    }

    /// Размер блока в байтах.
    pub fn size(&self) -> usize {
        self.end.into_usize() - self.start.into_usize()
    }

    /// Возвращает `true`, если блок пуст.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Возвращает `true`, если адрес `addr` лежит внутри блока.
    pub fn contains_address(
        &self,
        addr: Addr<T::Tag>,
    ) -> bool {
        self.start <= addr && addr < self.end
    }

    /// Возвращает `true`, если блок `other` целиком лежит внутри этого блока.
    pub fn contains_block(
        &self,
        other: Block<T>,
    ) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Возвращает итератор по всем [`Frage`], пересекающимся с блоком.
    /// Для пустого блока итератор пуст.
    pub fn enclosing(&self) -> impl Iterator<Item = Frage<T::Tag>> + use<T> {
        let first = self.start.into_usize() / PAGE_SIZE;
        let last = if self.is_empty() {
            first
        } else {
            self.end.into_usize().div_ceil(PAGE_SIZE)
        };

        (first .. last).filter_map(|index| Addr::new(index * PAGE_SIZE).ok().map(Frage::containing))
    }
}

impl<T: Memory> Clone for Block<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Memory> Copy for Block<T> {
}

impl<T: Memory> Default for Block<T> {
    fn default() -> Self {
        Self {
            start: Addr::zero(),
            end: Addr::zero(),
        }
    }
}

impl<T: Memory> PartialEq for Block<T> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.start == other.start && self.end == other.end
    }
}

impl<T: Memory> Eq for Block<T> {
}

impl<T: Memory> fmt::Debug for Block<T> {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(formatter, "[{:?}, {:?})", self.start, self.end)
    }
}

impl<T: Memory> fmt::Display for Block<T> {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(formatter, "[{}, {}), size {}", self.start, self.end, self.size())
    }
}

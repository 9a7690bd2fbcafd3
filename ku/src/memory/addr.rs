use core::{
    fmt,
    marker::PhantomData,
    mem,
    ops::{
        Add,
        Sub,
    },
};

use static_assertions::const_assert_eq;

use crate::error::{
    Error::{
        InvalidArgument,
        Overflow,
    },
    Result,
};

// Used in docs.
#[allow(unused)]
use crate::error::Error;

/// Базовый тип для виртуальных и физических адресов [x86-64](https://wiki.osdev.org/X86-64).
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Addr<T>(usize, PhantomData<T>);

const_assert_eq!(mem::size_of::<Addr<VirtTag>>(), mem::size_of::<usize>());
const_assert_eq!(mem::size_of::<Addr<PhysTag>>(), mem::size_of::<u64>());

impl<T: Tag> Addr<T> {
    /// Создаёт [`Addr`] --- [`Phys`] или [`Virt`] --- по его битовому представлению `addr`.
    ///
    /// Возвращает ошибку [`Error::InvalidArgument`], если `addr`
    /// не является корректным адресом нужного вида.
    pub fn new(addr: usize) -> Result<Self> {
        if T::is_valid(addr) {
            Ok(Self(addr, PhantomData))
        } else {
            Err(InvalidArgument)
        }
    }

    /// То же, что и [`Addr::new()`], для битового представления типа [`u64`].
    pub fn new_u64(addr: u64) -> Result<Self> {
        Self::new(addr.try_into()?)
    }

    /// Возвращает нулевой адрес.
    /// В отличие от [`Addr::default()`] доступна в константном контексте.
    pub const fn zero() -> Self {
        Self(0, PhantomData)
    }

    /// Возвращает битовое представление адреса.
    pub fn into_usize(self) -> usize {
        self.0
    }

    /// Возвращает битовое представление адреса.
    pub fn into_u64(self) -> u64 {
        self.0 as u64
    }

    /// Округляет адрес вниз до кратного `align`, который должен быть степенью двойки.
    pub fn align_down(
        self,
        align: usize,
    ) -> Self {
        debug_assert!(align.is_power_of_two());
        Self(self.0 & !(align - 1), PhantomData)
    }

    /// Возвращает `true`, если адрес кратен `align`, который должен быть степенью двойки.
    pub fn is_aligned(
        self,
        align: usize,
    ) -> bool {
        debug_assert!(align.is_power_of_two());
        self.0 & (align - 1) == 0
    }
}

impl Addr<VirtTag> {
    /// Создаёт [`Virt`] по указателю `ptr`.
    /// Указатели всегда канонические, так что проверка не нужна.
    pub fn from_ptr<Q>(ptr: *const Q) -> Self {
        Self(ptr as usize, PhantomData)
    }

    /// Создаёт [`Virt`] по ссылке `x`.
    pub fn from_ref<Q>(x: &Q) -> Self {
        Self::from_ptr(x as *const Q)
    }
}

impl<T: Tag> Add<usize> for Addr<T> {
    type Output = Result<Self>;

    fn add(
        self,
        rhs: usize,
    ) -> Self::Output {
        self.0.checked_add(rhs).ok_or(Overflow).and_then(|addr| Self::new(addr).map_err(|_| Overflow))
    }
}

impl<T: Tag> Sub<usize> for Addr<T> {
    type Output = Result<Self>;

    fn sub(
        self,
        rhs: usize,
    ) -> Self::Output {
        self.0.checked_sub(rhs).ok_or(Overflow).and_then(|addr| Self::new(addr).map_err(|_| Overflow))
    }
}

impl<T: Tag> Sub<Self> for Addr<T> {
    type Output = Result<usize>;

    fn sub(
        self,
        rhs: Self,
    ) -> Self::Output {
        self.0.checked_sub(rhs.0).ok_or(Overflow)
    }
}

impl<T: Tag> fmt::Debug for Addr<T> {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(formatter, "{}(0x{:X})", T::ADDR_NAME, self.0)
    }
}

impl<T: Tag> fmt::Display for Addr<T> {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(formatter, "{}", T::HEX_PREFIX)?;

        let digits = (usize::BITS - self.0.leading_zeros()).div_ceil(4).max(1);
        for i in (0 .. digits).rev() {
            write!(formatter, "{:X}", (self.0 >> (4 * i)) & 0xF)?;
            if i != 0 && i % 4 == 0 {
                write!(formatter, "_")?;
            }
        }

        Ok(())
    }
}

/// Различает виртуальные и физические адреса на уровне типов.
pub trait Tag: Clone + Copy + Default + Eq + Ord {
    /// Название вида адреса для вывода через [`fmt::Debug`].
    const ADDR_NAME: &'static str;

    /// Префикс адреса для вывода через [`fmt::Display`].
    const HEX_PREFIX: &'static str;

    /// Возвращает `true`, если `addr` --- корректный адрес этого вида.
    fn is_valid(addr: usize) -> bool;
}

/// Тег виртуальных адресов.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct VirtTag;

impl VirtTag {
    /// Количество значащих бит
    /// [канонического](https://en.wikipedia.org/wiki/X86-64#Virtual_address_space_details)
    /// виртуального адреса.
    const BITS: u32 = 48;
}

impl Tag for VirtTag {
    const ADDR_NAME: &'static str = "Virt";
    const HEX_PREFIX: &'static str = "0v";

    fn is_valid(addr: usize) -> bool {
        let high = addr >> (Self::BITS - 1);
        high == 0 || high == usize::MAX >> (Self::BITS - 1)
    }
}

/// Тег физических адресов.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PhysTag;

impl PhysTag {
    /// Максимальное количество бит в физическом адресе, которое поддерживает
    /// [x86-64](https://wiki.osdev.org/X86-64).
    const BITS: u32 = 52;
}

impl Tag for PhysTag {
    const ADDR_NAME: &'static str = "Phys";
    const HEX_PREFIX: &'static str = "0p";

    fn is_valid(addr: usize) -> bool {
        addr >> Self::BITS == 0
    }
}

/// Виртуальный адрес.
pub type Virt = Addr<VirtTag>;

/// Физический адрес.
pub type Phys = Addr<PhysTag>;

#[cfg(test)]
mod test {
    use super::{
        Phys,
        Virt,
    };

    #[test]
    fn canonical() {
        assert!(Virt::new(0x7FFF_FFFF_F000).is_ok());
        assert!(Virt::new(0xFFFF_8000_0000_0000).is_ok());
        assert!(Virt::new(0x8000_0000_0000).is_err());
        assert!(Phys::new(1 << 52).is_err());
    }

    #[test]
    fn arithmetic() {
        let virt = Virt::new(0x1000).unwrap();
        assert_eq!((virt - 8).unwrap().into_usize(), 0xFF8);
        assert!((Virt::zero() - 1).is_err());
        assert_eq!((virt - Virt::zero()).unwrap(), 0x1000);
        assert_eq!(Virt::new(0x1234).unwrap().align_down(0x1000), virt);
    }

    #[test]
    fn formatting() {
        assert_eq!(format!("{}", Virt::zero()), "0v0");
        assert_eq!(format!("{}", Virt::new(0x1_0000).unwrap()), "0v1_0000");
        assert_eq!(format!("{}", Phys::new(0xABC_DEF0).unwrap()), "0pABC_DEF0");
        assert_eq!(format!("{:?}", Virt::new(0x10).unwrap()), "Virt(0x10)");
    }
}

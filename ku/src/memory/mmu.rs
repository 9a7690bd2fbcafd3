use core::fmt;

use bitflags::bitflags;

bitflags! {
    /// Флаги доступа к отображённой странице.
    ///
    /// В отличие от аппаратного бита `NO_EXECUTE`, [`PageTableFlags::EXECUTABLE`]
    /// разрешает, а не запрещает,
    /// так что каждое право выражается установленным битом.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct PageTableFlags: usize {
        /// Страница отображена.
        const PRESENT = 1 << 0;

        /// В страницу можно писать.
        const WRITABLE = 1 << 1;

        /// Страница доступна из пространства пользователя.
        const USER = 1 << 2;

        /// Из страницы можно исполнять код.
        const EXECUTABLE = 1 << 63;
    }
}

/// Данные пользователя, доступные только на чтение.
pub const USER_R: PageTableFlags = PageTableFlags::PRESENT.union(PageTableFlags::USER);

/// Данные пользователя, доступные на чтение и запись.
pub const USER_RW: PageTableFlags = USER_R.union(PageTableFlags::WRITABLE);

/// Код пользователя.
pub const USER_RX: PageTableFlags = USER_R.union(PageTableFlags::EXECUTABLE);

/// Данные ядра, доступные на чтение и запись.
pub const KERNEL_RW: PageTableFlags = PageTableFlags::PRESENT.union(PageTableFlags::WRITABLE);

impl fmt::Display for PageTableFlags {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        let flag = |bit, symbol| if self.contains(bit) { symbol } else { '-' };

        write!(
            formatter,
            "{}{}{}{}",
            flag(PageTableFlags::PRESENT, 'P'),
            flag(PageTableFlags::USER, 'U'),
            flag(PageTableFlags::WRITABLE, 'W'),
            flag(PageTableFlags::EXECUTABLE, 'X'),
        )
    }
}

#[cfg(test)]
mod test {
    use super::{
        KERNEL_RW,
        PageTableFlags,
        USER_RW,
        USER_RX,
    };

    #[test]
    fn permissions() {
        assert!(USER_RW.contains(PageTableFlags::USER | PageTableFlags::WRITABLE));
        assert!(!USER_RX.contains(PageTableFlags::WRITABLE));
        assert!(!KERNEL_RW.contains(PageTableFlags::USER));

        assert_eq!(format!("{USER_RW}"), "PUW-");
        assert_eq!(format!("{USER_RX}"), "PU-X");
    }
}

use core::fmt;

use bitflags::bitflags;
use derive_more::Display;

bitflags! {
    /// Код ошибки [исключения доступа к странице](https://wiki.osdev.org/Exceptions#Page_Fault),
    /// который процессор кладёт в стек вместе с кадром прерывания.
    ///
    /// Неизвестные биты отбрасываются при разборе через [`PageFaultInfo::from_bits_truncate()`].
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct PageFaultInfo: usize {
        /// Страница отображена, а исключение вызвано нарушением прав доступа к ней.
        /// Если бит сброшен, страница не отображена.
        const PRESENT = 1 << 0;

        /// Обращение было записью.
        const WRITE = 1 << 1;

        /// Обращение произошло в режиме пользователя.
        const USER = 1 << 2;

        /// В одной из записей таблиц страниц установлен зарезервированный бит.
        const RESERVED = 1 << 3;

        /// Обращение было выборкой инструкции.
        const EXECUTE = 1 << 4;

        /// Доступ запрещён ключом защиты страницы.
        const PROTECTION_KEY = 1 << 5;

        /// Обращение к теневому стеку.
        const SHADOW_STACK = 1 << 6;
    }
}

impl PageFaultInfo {
    /// Почему обращение к странице не удалось.
    pub fn cause(self) -> FaultCause {
        if self.contains(Self::RESERVED) {
            FaultCause::MalformedTable
        } else if self.contains(Self::PROTECTION_KEY) {
            FaultCause::ProtectionKey
        } else if self.contains(Self::PRESENT) {
            FaultCause::Protection
        } else {
            FaultCause::NotPresent
        }
    }

    /// Вид обращения, которое привело к исключению.
    pub fn access(self) -> FaultAccess {
        if self.contains(Self::EXECUTE) {
            FaultAccess::Execute
        } else if self.contains(Self::WRITE) {
            FaultAccess::Write
        } else {
            FaultAccess::Read
        }
    }

    /// Возвращает `true`, если исключение можно устранить,
    /// отобразив в виртуальную память недостающую страницу.
    pub fn is_not_present(self) -> bool {
        self.cause() == FaultCause::NotPresent
    }
}

impl fmt::Display for PageFaultInfo {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        let mode = if self.contains(Self::USER) {
            "user"
        } else {
            "kernel"
        };

        write!(formatter, "{:#b} = {} | {} | {}", self.bits(), self.cause(), self.access(), mode)
    }
}

/// Причина исключения доступа к странице.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum FaultCause {
    /// Страница не отображена.
    #[display("non-present page")]
    NotPresent,

    /// Страница отображена, но её флаги запрещают такое обращение.
    #[display("protection violation")]
    Protection,

    /// Обращение запрещено ключом защиты.
    #[display("protection key violation")]
    ProtectionKey,

    /// Таблица страниц испорчена.
    #[display("malformed page table (a reserved bit set)")]
    MalformedTable,
}

/// Вид обращения к памяти.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum FaultAccess {
    /// Чтение.
    #[display("read")]
    Read,

    /// Запись.
    #[display("write")]
    Write,

    /// Выборка инструкции.
    #[display("execute")]
    Execute,
}

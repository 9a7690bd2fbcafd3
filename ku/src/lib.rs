//! Библиотека, общая для ядра и пространства пользователя.
//! ku --- **k**ernel && **u**ser.
//!
//! Содержит всё, о чём должны договориться обе стороны границы привилегий:
//! номера прерываний, раскладку минимального контекста исполнения,
//! права доступа в таблицах страниц, номера системных вызовов и коды их результатов.

#![cfg_attr(not(test), no_std)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(missing_docs)]

/// Перечисление возможных ошибок [`Error`] и соответствующий [`Result`].
pub mod error;

/// Логирование с помощью макросов библиотеки [`tracing`].
pub mod log;

/// Базовые примитивы работы с памятью, нужные и в ядре, и в пространстве пользователя.
pub mod memory;

/// Определения, связанные с процессами, нужные и в ядре, и в пространстве пользователя.
pub mod process;

/// Примитивы синхронизации.
pub mod sync;

pub use error::{
    Error,
    Result,
};
pub use sync::{
    IrqSpinlock,
    IrqSpinlockGuard,
    Spinlock,
    SpinlockGuard,
};

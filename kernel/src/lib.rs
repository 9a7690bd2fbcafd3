//! Диспетчер прерываний вытесняющего многопроцессорного ядра.
//!
//! Любое исключение, аппаратное прерывание или системный вызов попадает в ядро
//! через один из 256 векторов таблицы [`trap::VectorTable`]
//! и оказывается в [`trap::Dispatcher::handle_trap()`].
//! Диспетчер продвигает глобальные часы [`time::Clock`],
//! устраняет пользовательские исключения доступа к страницам, отображая новые обнулённые страницы,
//! переключает процессы на обработчики их периодических будильников,
//! передаёт прерывания устройств драйверам и решает, продолжится ли прерванный процесс,
//! уступит процессор или будет завершён.
//!
//! Всё, чем диспетчер не владеет, --- планировщик, аллокатор физических фреймов,
//! контроллер прерываний и драйверы устройств --- доступно через типажи.
//! Поэтому логика обработки прерываний одинаково работает и в ядре, и в тестах на хост-системе.

#![cfg_attr(not(test), no_std)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(missing_docs)]

/// Настройки диспетчера прерываний.
pub mod config;

/// Перечисление возможных ошибок [`Error`] и соответствующий [`Result`].
pub mod error;

/// Журналирование с помощью макросов [`tracing`].
pub mod log;

/// Часть управления памятью, нужная для обработки прерываний.
pub mod memory;

/// Часть управления процессами, нужная для обработки прерываний.
pub mod process;

/// Поддержка [симметричной многопроцессорности](https://en.wikipedia.org/wiki/Symmetric_multiprocessing).
pub mod smp;

/// Глобальный счётчик тиков.
pub mod time;

/// Система обработки [прерываний](https://en.wikipedia.org/wiki/Interrupt).
pub mod trap;

pub use config::{
    ExhaustionPolicy,
    FaultPolicy,
    TrapConfig,
};
pub use error::{
    Error,
    Result,
};

/// Глобальный счётчик тиков, который продвигает прерывание таймера.
pub mod clock;

use ku::sync::OnceLock;

use crate::{
    config::TrapConfig,
    log::info,
};

pub use clock::Clock;

/// Общесистемные часы.
static CLOCK: OnceLock<Clock> = OnceLock::new();

/// Создаёт общесистемные часы, которые продвигает процессор
/// [`TrapConfig::bootstrap_cpu`].
/// Последующие вызовы возвращают уже инициализированные часы.
pub fn init(config: &TrapConfig) -> &'static Clock {
    CLOCK.call_once(|| {
        info!(bootstrap = config.bootstrap_cpu, "time init");
        Clock::new(config.bootstrap_cpu)
    })
}

/// Общесистемные часы, если [`init()`] уже был вызван.
pub fn clock() -> Option<&'static Clock> {
    CLOCK.get()
}

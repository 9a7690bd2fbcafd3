use ku::memory::{
    Block,
    Virt,
};

use crate::smp::{
    BOOTSTRAP_CPU,
    CpuId,
};

/// Настройки диспетчера прерываний.
///
/// [`TrapConfig::default()`] задаёт классическое поведение
/// с включённой проверкой обработчика будильника.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TrapConfig {
    /// Единственный процессор, который продвигает глобальный счётчик тиков.
    pub bootstrap_cpu: CpuId,

    /// Какие исключения доступа к страницам устраняются отображением новой страницы.
    pub fault_policy: FaultPolicy,

    /// Реакция на нехватку физических фреймов при устранении исключения доступа к странице.
    pub on_exhaustion: ExhaustionPolicy,

    /// Проверять, что обработчик будильника лежит в исполнимой странице пользователя
    /// и что в стек пользователя помещается адрес возврата, прежде чем переключать контекст.
    pub check_alarm_handler: bool,
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self {
            bootstrap_cpu: BOOTSTRAP_CPU,
            fault_policy: FaultPolicy::Permissive,
            on_exhaustion: ExhaustionPolicy::Halt,
            check_alarm_handler: true,
        }
    }
}

/// Какие исключения доступа к страницам устраняет ядро.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FaultPolicy {
    /// Любое исключение процесса отображает новую обнулённую страницу по адресу обращения.
    #[default]
    Permissive,

    /// Устраняются только обращения к неотображённым страницам внутри региона,
    /// остальные убивают процесс.
    Region(Block<Virt>),
}

/// Реакция на нехватку физических фреймов или ошибку отображения.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ExhaustionPolicy {
    /// Ядро паникует с диагностикой.
    #[default]
    Halt,

    /// Убивается только вызвавший исключение процесс.
    KillProcess,
}

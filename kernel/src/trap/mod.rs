/// Центральный обработчик прерываний и исключений.
pub mod dispatcher;

/// Точки входа всех векторов и общий трамплин.
pub mod entry;

/// Раскладка состояния, сохраняемого при прерывании.
pub mod frame;

/// [Таблица дескрипторов прерываний](https://wiki.osdev.org/Interrupt_Descriptor_Table).
pub mod idt;

/// Счётчики прерываний по векторам.
pub mod stats;

use ku::{
    memory::Virt,
    process::Trap,
};

use crate::{
    process::Process,
    smp::CpuId,
};

pub use dispatcher::{
    Collaborators,
    Dispatcher,
    Disposition,
};
pub use entry::{
    deliver,
    install,
};
pub use frame::{
    ModeContext,
    Registers,
    TrapFrame,
};
pub use idt::{
    Gate,
    GateKind,
    VectorTable,
    initialize_vectors,
    load_vectors,
};
pub use stats::{
    Statistics,
    TrapStats,
};

/// Устройство, которое сгенерировало прерывание.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Device {
    /// Первичный канал ATA.
    Disk,

    /// Клавиатура PS/2.
    Keyboard,

    /// Первый последовательный порт.
    Serial,
}

/// Путь обработки вектора прерывания.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Classification {
    /// Системный вызов.
    Syscall,

    /// Прерывание таймера.
    Timer,

    /// Прерывание устройства, у которого есть драйвер.
    Device(Device),

    /// Прерывание, которое подтверждается контроллеру и в остальном игнорируется.
    Spurious,

    /// Исключение доступа к странице.
    PageFault,

    /// Всё остальное: неожиданные исключения и прерывания без драйвера.
    Unexpected,
}

impl Classification {
    /// Путь обработки вектора `vector`.
    pub fn new(vector: usize) -> Self {
        match Trap::try_from(vector) {
            Ok(Trap::Syscall) => Self::Syscall,
            Ok(Trap::Timer) => Self::Timer,
            Ok(Trap::Ata0) => Self::Device(Device::Disk),
            Ok(Trap::Keyboard) => Self::Device(Device::Keyboard),
            Ok(Trap::Com1) => Self::Device(Device::Serial),
            Ok(Trap::Lpt1 | Trap::ApicSpurious | Trap::Ata1) => Self::Spurious,
            Ok(Trap::PageFault) => Self::PageFault,
            _ => Self::Unexpected,
        }
    }
}

/// Драйверы устройств, обслуживающие прерывания.
/// Каждый вызов обслуживает ровно одно прерывание.
pub trait Devices: Sync {
    /// Обслуживает прерывание контроллера диска.
    fn disk_interrupt(&self);

    /// Обслуживает прерывание клавиатуры.
    fn keyboard_interrupt(&self);

    /// Обслуживает прерывание последовательного порта.
    fn serial_interrupt(&self);
}

/// Таблица системных вызовов.
pub trait SyscallTable<P: Process>: Sync {
    /// Выполняет на процессоре `cpu` системный вызов,
    /// который процесс `process` запросил в сохранённых регистрах,
    /// и записывает результат в `frame`.
    ///
    /// Возвращает [`Disposition::Terminated`], если процесс завершился.
    /// Тогда результат не записывается.
    fn dispatch(
        &self,
        cpu: CpuId,
        process: &P,
        frame: &mut TrapFrame,
    ) -> Disposition;
}

/// Получатель всех прерываний.
pub trait TrapHandler: Sync {
    /// Обрабатывает прерывание, описанное кадром `frame`.
    /// `fault_address` --- содержимое регистра `CR2`.
    ///
    /// Возвращается, только если прерванный контекст, возможно изменённый,
    /// нужно продолжить.
    fn handle(
        &self,
        frame: &mut TrapFrame,
        fault_address: Virt,
    );
}

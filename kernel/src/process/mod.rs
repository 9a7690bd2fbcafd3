/// Периодические будильники процессов, которые доставляются
/// подменой прерванного пользовательского контекста.
pub mod alarm;

/// Системные вызовы, реализованные поверх диспетчера прерываний.
pub mod syscall;

use core::sync::atomic::{
    AtomicBool,
    AtomicU64,
    Ordering,
};

use ku::sync::{
    IrqSpinlock,
    IrqSpinlockGuard,
    Spinlock,
};

use crate::{
    memory::AddressSpace,
    smp::CpuId,
    trap::TrapFrame,
};

pub use alarm::{
    Alarm,
    Redirect,
};
pub use ku::process::{
    ExitCode,
    MiniContext,
    Pid,
    State,
};
pub use syscall::Syscalls;

// Used in docs.
#[allow(unused)]
use crate::time::Clock;

/// Пользовательский процесс с точки зрения диспетчера прерываний.
pub trait Process: Sync {
    /// Адресное пространство процесса.
    type AddressSpace: AddressSpace;

    /// Идентификатор процесса.
    fn pid(&self) -> Pid;

    /// Состояние процесса с точки зрения планировщика.
    fn state(&self) -> State;

    /// Часть процесса, которой владеет диспетчер прерываний.
    fn trap_state(&self) -> &TrapState;

    /// Захватывает адресное пространство процесса.
    ///
    /// Блокировка должна запрещать прерывания, например быть [`IrqSpinlock`],
    /// так как её берёт и обработчик прерывания таймера.
    fn address_space(&self) -> IrqSpinlockGuard<'_, Self::AddressSpace>;

    /// Пытается захватить адресное пространство процесса,
    /// возвращает [`None`] если оно уже захвачено.
    fn try_address_space(&self) -> Option<IrqSpinlockGuard<'_, Self::AddressSpace>>;
}

/// Таблица процессов и планировщик.
pub trait Scheduler: Sync {
    /// Тип процессов, которыми управляет планировщик.
    type Process: Process;

    /// Процессор, на котором выполняется вызывающий код.
    fn current_cpu(&self) -> CpuId;

    /// Процесс, работающий на процессоре `cpu`, если такой есть.
    fn current_process(
        &self,
        cpu: CpuId,
    ) -> Option<&Self::Process>;

    /// Отдаёт процессор `cpu` другому готовому к исполнению процессу.
    /// Возвращается, когда текущий процесс снова получит процессор.
    fn sched_yield(
        &self,
        cpu: CpuId,
    );

    /// Усыпляет текущий процесс процессора `cpu` до ближайшего [`Scheduler::wakeup()`].
    ///
    /// Захваченный счётчик тиков `ticks` должен быть освобождён только после того,
    /// как процесс помечен спящим.
    /// Тогда [`Scheduler::wakeup()`], который [`Clock`] вызывает под той же блокировкой,
    /// не может потеряться.
    fn sleep(
        &self,
        cpu: CpuId,
        ticks: IrqSpinlockGuard<'_, u64>,
    );

    /// Будит все процессы, уснувшие в [`Scheduler::sleep()`].
    /// Вызывается из прерывания таймера, когда счётчик тиков стал равен `ticks`.
    fn wakeup(
        &self,
        ticks: u64,
    );

    /// Помечает процесс `process` убитым.
    /// Он будет завершён в ближайшей контрольной точке диспетчера.
    /// Спящий процесс планировщик должен разбудить.
    fn kill(
        &self,
        process: &Self::Process,
    ) {
        process.trap_state().kill();
    }

    /// Завершает работающий на процессоре `cpu` процесс `process` с кодом `code`.
    fn exit(
        &self,
        cpu: CpuId,
        process: &Self::Process,
        code: ExitCode,
    );

    /// Отдаёт процессор `cpu` планировщику насовсем.
    /// Прерванный контекст больше не продолжается,
    /// так что после завершения процесса возврат в него невозможен.
    fn run(
        &self,
        cpu: CpuId,
    ) -> !;
}

/// Состояние процесса, которое поддерживает диспетчер прерываний.
#[derive(Debug, Default)]
pub struct TrapState {
    /// Процесс нужно завершить в ближайшей контрольной точке.
    killed: AtomicBool,

    /// Периодический будильник процесса.
    alarm: IrqSpinlock<Alarm>,

    /// Тики таймера, которые не удалось сразу учесть в будильнике,
    /// так как он или адресное пространство были захвачены.
    deferred_ticks: AtomicU64,

    /// Кадр последнего системного вызова процесса.
    frame: Spinlock<Option<TrapFrame>>,
}

impl TrapState {
    /// Помечает процесс убитым.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::Release);
    }

    /// Возвращает `true`, если процесс был убит.
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    /// Захватывает будильник процесса.
    pub fn alarm(&self) -> IrqSpinlockGuard<'_, Alarm> {
        self.alarm.lock()
    }

    /// Пытается захватить будильник процесса,
    /// возвращает [`None`] если он уже захвачен.
    pub fn try_alarm(&self) -> Option<IrqSpinlockGuard<'_, Alarm>> {
        self.alarm.try_lock()
    }

    /// Кадр последнего системного вызова процесса.
    pub fn frame(&self) -> Option<TrapFrame> {
        *self.frame.lock()
    }

    /// Число тиков, ещё не учтённых в будильнике.
    pub fn deferred_ticks(&self) -> u64 {
        self.deferred_ticks.load(Ordering::Acquire)
    }

    /// Запоминает исполняемый системный вызов с кадром `frame`.
    pub(crate) fn record_frame(
        &self,
        frame: &TrapFrame,
    ) {
        *self.frame.lock() = Some(*frame);
    }

    /// Откладывает учёт тика таймера до следующего прерывания.
    pub(crate) fn defer_tick(&self) {
        self.deferred_ticks.fetch_add(1, Ordering::AcqRel);
    }

    /// Забирает отложенные тики.
    pub(crate) fn take_deferred_ticks(&self) -> u64 {
        self.deferred_ticks.swap(0, Ordering::AcqRel)
    }
}

use ku::{
    memory::{
        PageFaultInfo,
        Virt,
    },
    process::{
        ExitCode,
        Pid,
        State,
    },
};

use crate::{
    config::{
        ExhaustionPolicy,
        TrapConfig,
    },
    log::{
        debug,
        info,
        trace,
        warn,
    },
    memory::{
        FaultError,
        FrameAllocator,
        resolve_page_fault,
    },
    process::{
        Process,
        Scheduler,
    },
    smp::{
        CpuId,
        InterruptController,
    },
    time::Clock,
};

use super::{
    Classification,
    Device,
    Devices,
    SyscallTable,
    TrapFrame,
    TrapHandler,
    TrapStats,
};

/// Внешние подсистемы, которым [`Dispatcher`] делегирует работу.
pub struct Collaborators<'a, S: Scheduler> {
    /// Таблица процессов и планировщик.
    pub scheduler: &'a S,

    /// Аллокатор фреймов для обработки исключений доступа к страницам.
    pub frame_allocator: &'a dyn FrameAllocator,

    /// Получает уведомления о завершении обработки прерываний.
    pub interrupt_controller: &'a dyn InterruptController,

    /// Драйверы устройств.
    pub devices: &'a dyn Devices,

    /// Таблица системных вызовов.
    pub syscalls: &'a dyn SyscallTable<S::Process>,

    /// Глобальный счётчик тиков.
    pub clock: &'a Clock,
}

/// Что делать с прерванным контекстом после обработки прерывания.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disposition {
    /// Продолжить прерванный контекст, возможно изменённый.
    Resume,

    /// Процесс завершён --- был убит или сам вызвал `exit()`.
    /// Его контекст продолжать нельзя.
    Terminated(Pid),
}

/// Направляет каждое прерывание его обработчику и проводит политику
/// завершения убитых процессов и вытеснения.
///
/// Все процессоры вызывают [`Dispatcher::handle_trap()`] независимо, возможно одновременно.
pub struct Dispatcher<'a, S: Scheduler> {
    /// Внешние подсистемы.
    collaborators: Collaborators<'a, S>,

    /// Настройки.
    config: TrapConfig,

    /// Счётчики прерываний по векторам.
    stats: TrapStats,
}

impl<'a, S: Scheduler> Dispatcher<'a, S> {
    /// Создаёт диспетчер поверх `collaborators`.
    pub fn new(
        collaborators: Collaborators<'a, S>,
        config: TrapConfig,
    ) -> Self {
        Self {
            collaborators,
            config,
            stats: TrapStats::new(),
        }
    }

    /// Настройки диспетчера.
    pub fn config(&self) -> &TrapConfig {
        &self.config
    }

    /// Счётчики прерываний по векторам.
    pub fn stats(&self) -> &TrapStats {
        &self.stats
    }

    /// Обрабатывает прерывание, описанное кадром `frame`.
    /// `fault_address` --- содержимое регистра `CR2`.
    ///
    /// Кадр `frame` может быть переписан, чтобы переключить процесс
    /// на обработчик будильника или вернуть результат системного вызова.
    ///
    /// При [`Disposition::Terminated`] процесс уже завершён
    /// и вызывающий не должен возвращаться в `frame`.
    /// Реализация [`TrapHandler`] для [`Dispatcher`] в этом случае
    /// отдаёт процессор [`Scheduler::run()`].
    ///
    /// # Panics
    ///
    /// Паникует с диагностикой на прерывании, после которого ядро не может продолжать работу:
    /// на неожиданном прерывании в режиме ядра или без текущего процесса,
    /// на системном вызове или исключении доступа к странице без текущего процесса,
    /// а также при нехватке памяти под [`ExhaustionPolicy::Halt`].
    pub fn handle_trap(
        &self,
        frame: &mut TrapFrame,
        fault_address: Virt,
    ) -> Disposition {
        let scheduler = self.collaborators.scheduler;
        let cpu = scheduler.current_cpu();
        let process = scheduler.current_process(cpu);
        let classification = Classification::new(frame.number());

        self.stats.inc(frame.number());

        trace!(
            cpu,
            pid = ?process.map(|process| process.pid()),
            trap = frame.name(),
            number = frame.number(),
            context = %frame.context(),
            ?classification,
            "trap",
        );

        match classification {
            Classification::Syscall => {
                let process = process.unwrap_or_else(|| self.halt(cpu, frame, fault_address));
                return self.syscall(cpu, process, frame);
            },
            Classification::Timer => self.timer(cpu, process, frame),
            Classification::Device(device) => self.device(cpu, device),
            Classification::Spurious => self.spurious(cpu, frame),
            Classification::PageFault => {
                let process = process.unwrap_or_else(|| self.halt(cpu, frame, fault_address));
                self.page_fault(cpu, process, frame, fault_address);
            },
            Classification::Unexpected => match process {
                Some(process) if frame.is_user_mode() => {
                    warn!(
                        pid = %process.pid(),
                        trap = frame.name(),
                        number = frame.number(),
                        error_code = frame.error_code(),
                        cpu,
                        context = %frame.context(),
                        info = %frame.info(fault_address),
                        "unexpected user mode trap, killing the process",
                    );
                    scheduler.kill(process);
                },
                _ => self.halt(cpu, frame, fault_address),
            },
        }

        match process {
            Some(process) => self.post_policy(cpu, process, frame, classification),
            None => Disposition::Resume,
        }
    }

    /// Выполняет системный вызов, если процесс не был убит до него или во время него.
    fn syscall(
        &self,
        cpu: CpuId,
        process: &S::Process,
        frame: &mut TrapFrame,
    ) -> Disposition {
        if process.trap_state().is_killed() {
            return self.terminate(cpu, process);
        }

        process.trap_state().record_frame(frame);

        let disposition = self.collaborators.syscalls.dispatch(cpu, process, frame);
        if let Disposition::Terminated(_) = disposition {
            return disposition;
        }

        if process.trap_state().is_killed() {
            let cpu = self.collaborators.scheduler.current_cpu();
            return self.terminate(cpu, process);
        }

        Disposition::Resume
    }

    /// Продвигает глобальные часы, будит ждущих тика,
    /// доставляет будильник процессу в режиме пользователя
    /// и подтверждает прерывание.
    fn timer(
        &self,
        cpu: CpuId,
        process: Option<&S::Process>,
        frame: &mut TrapFrame,
    ) {
        let clock = self.collaborators.clock;
        let scheduler = self.collaborators.scheduler;

        if let Some(ticks) = clock.on_timer_tick(cpu, |ticks| scheduler.wakeup(ticks)) {
            trace!(cpu, ticks, "tick");
        }

        if let Some(process) = process &&
            frame.is_user_mode()
        {
            self.deliver_alarm(process, frame);
        }

        self.collaborators.interrupt_controller.end_of_interrupt(cpu);
    }

    /// Переключает процесс на обработчик будильника, если его период истёк.
    /// Убивает процесс, если переключение невозможно.
    ///
    /// Не ждёт блокировок адресного пространства и будильника:
    /// если одна из них захвачена, тик откладывается до следующего прерывания таймера.
    fn deliver_alarm(
        &self,
        process: &S::Process,
        frame: &mut TrapFrame,
    ) {
        let trap_state = process.trap_state();

        let Some(mut address_space) = process.try_address_space() else {
            trap_state.defer_tick();
            debug!(pid = %process.pid(), "address space is busy, deferring the alarm tick");
            return;
        };
        let Some(mut alarm) = trap_state.try_alarm() else {
            trap_state.defer_tick();
            debug!(pid = %process.pid(), "alarm is busy, deferring the alarm tick");
            return;
        };

        let ticks = 1 + trap_state.take_deferred_ticks();
        let Some(redirect) = alarm.advance(ticks) else {
            return;
        };
        drop(alarm);

        let mut context = frame.mini_context();
        let result = redirect.apply(
            &mut context,
            &mut *address_space,
            self.config.check_alarm_handler,
        );
        drop(address_space);

        match result {
            Ok(()) => {
                debug!(
                    pid = %process.pid(),
                    interrupted = %frame.mini_context(),
                    redirected = %context,
                    ticks,
                    "alarm delivered",
                );
                frame.set_mini_context(context);
            },
            Err(error) => {
                warn!(
                    pid = %process.pid(),
                    handler = %redirect.handler(),
                    context = %frame.mini_context(),
                    ?error,
                    "failed to deliver an alarm, killing the process",
                );
                self.collaborators.scheduler.kill(process);
            },
        }
    }

    /// Передаёт прерывание устройства его драйверу и подтверждает прерывание.
    fn device(
        &self,
        cpu: CpuId,
        device: Device,
    ) {
        let devices = self.collaborators.devices;

        match device {
            Device::Disk => devices.disk_interrupt(),
            Device::Keyboard => devices.keyboard_interrupt(),
            Device::Serial => devices.serial_interrupt(),
        }

        self.collaborators.interrupt_controller.end_of_interrupt(cpu);
    }

    /// Подтверждает ложное прерывание.
    fn spurious(
        &self,
        cpu: CpuId,
        frame: &TrapFrame,
    ) {
        info!(
            cpu,
            trap = frame.name(),
            cs = frame.context().cs(),
            context = %frame.mini_context(),
            "spurious interrupt",
        );

        self.collaborators.interrupt_controller.end_of_interrupt(cpu);
    }

    /// Отображает свежую страницу по адресу `fault_address` процесса `process`.
    ///
    /// Нехватка памяти под [`ExhaustionPolicy::Halt`] останавливает ядро,
    /// любая другая ошибка убивает процесс.
    fn page_fault(
        &self,
        cpu: CpuId,
        process: &S::Process,
        frame: &TrapFrame,
        fault_address: Virt,
    ) {
        let code = PageFaultInfo::from_bits_truncate(frame.error_code());

        let result = resolve_page_fault(
            &mut *process.address_space(),
            self.collaborators.frame_allocator,
            fault_address,
            code,
            self.config.fault_policy,
        );

        let error = match result {
            Ok(_) => return,
            Err(error) => error,
        };

        if let FaultError::Exhausted(_) = error &&
            self.config.on_exhaustion == ExhaustionPolicy::Halt
        {
            panic!(
                "page fault handler: {} at {} on cpu {}, process {}, context {}",
                error,
                fault_address,
                cpu,
                process.pid(),
                frame.context(),
            );
        }

        warn!(
            pid = %process.pid(),
            %fault_address,
            %code,
            %error,
            context = %frame.context(),
            "unresolved page fault, killing the process",
        );
        self.collaborators.scheduler.kill(process);
    }

    /// Завершает убитый процесс и вытесняет работающий по тику таймера.
    ///
    /// Флаг убитого процесса проверяется и до, и после уступки процессора,
    /// так как другой процессор может убить процесс, пока тот не работает.
    /// Процесс, прерванный в режиме ядра, завершается только на границе системного вызова.
    fn post_policy(
        &self,
        cpu: CpuId,
        process: &S::Process,
        frame: &TrapFrame,
        classification: Classification,
    ) -> Disposition {
        let scheduler = self.collaborators.scheduler;

        if process.trap_state().is_killed() && frame.is_user_mode() {
            return self.terminate(cpu, process);
        }

        if process.state() == State::Running && classification == Classification::Timer {
            scheduler.sched_yield(cpu);
        }

        if process.trap_state().is_killed() && frame.is_user_mode() {
            return self.terminate(scheduler.current_cpu(), process);
        }

        Disposition::Resume
    }

    /// Завершает убитый процесс `process`.
    fn terminate(
        &self,
        cpu: CpuId,
        process: &S::Process,
    ) -> Disposition {
        let pid = process.pid();

        info!(%pid, cpu, "terminating a killed process");
        self.collaborators.scheduler.exit(cpu, process, ExitCode::Killed);

        Disposition::Terminated(pid)
    }

    /// Останавливает ядро на прерывании, после которого нельзя продолжать работу.
    fn halt(
        &self,
        cpu: CpuId,
        frame: &TrapFrame,
        fault_address: Virt,
    ) -> ! {
        panic!(
            "unexpected trap {} ({}) from cpu {} rip {} (cr2 = {}), frame {}",
            frame.number(),
            frame.name(),
            cpu,
            frame.mini_context().rip(),
            fault_address,
            frame,
        );
    }
}

impl<S: Scheduler> TrapHandler for Dispatcher<'_, S> {
    fn handle(
        &self,
        frame: &mut TrapFrame,
        fault_address: Virt,
    ) {
        if let Disposition::Terminated(pid) = self.handle_trap(frame, fault_address) {
            let scheduler = self.collaborators.scheduler;
            let cpu = scheduler.current_cpu();

            debug!(%pid, cpu, "leaving the context of a terminated process");

            scheduler.run(cpu);
        }
    }
}

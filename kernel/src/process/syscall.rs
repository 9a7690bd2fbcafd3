use ku::{
    error::{
        Error::{
            InvalidArgument,
            NoProcess,
            Overflow,
            PermissionDenied,
        },
        Result,
    },
    memory::{
        Block,
        USER_RX,
        Virt,
    },
    process::{
        ExitCode,
        Syscall,
    },
    sync::IrqSpinlockGuard,
};

use crate::{
    log::{
        debug,
        info,
        warn,
    },
    memory::AddressSpace,
    smp::CpuId,
    time::Clock,
    trap::{
        Disposition,
        SyscallTable,
        TrapFrame,
    },
};

use super::{
    Process,
    Scheduler,
};

// Used in docs.
#[allow(unused)]
use ku::error::Error;

/// Взводит будильник процесса `process`: обработчик `handler` будет вызываться
/// каждые `period` тиков, проведённых процессом в режиме пользователя.
/// Нулевой `period` выключает будильник.
///
/// Если задан `check_handler`, взвод будильника с `handler` вне исполнимой
/// памяти пользователя завершается ошибкой [`Error::PermissionDenied`].
pub fn alarm<P: Process>(
    process: &P,
    period: u64,
    handler: Virt,
    check_handler: bool,
) -> Result<()> {
    let pid = process.pid();

    if period != 0 && check_handler {
        let code: Block<Virt> = Block::from_size(handler, 1)?;
        process
            .address_space()
            .check_permission(code, USER_RX)
            .map_err(|_| PermissionDenied)?;
    }

    let mut alarm = process.trap_state().alarm();
    if period == 0 {
        alarm.disarm();
    } else {
        alarm.arm(period, handler);
    }

    info!(%pid, %alarm, syscall = "alarm");

    Ok(())
}

/// Усыпляет процесс `process` на `ticks` тиков таймера.
/// Для ожидания вызывает `sleep` с захваченным счётчиком тиков,
/// см. [`Clock::sleep_until()`].
///
/// Возвращает значение счётчика в момент пробуждения или ошибку [`Error::NoProcess`],
/// если процесс был убит во время сна.
pub fn sleep<P, F>(
    clock: &Clock,
    process: &P,
    ticks: u64,
    mut sleep: F,
) -> Result<u64>
where
    P: Process,
    F: FnMut(IrqSpinlockGuard<'_, u64>),
{
    let deadline = clock.current_ticks().checked_add(ticks).ok_or(Overflow)?;

    debug!(pid = %process.pid(), ticks, deadline, syscall = "sleep");

    clock.sleep_until(deadline, |ticks| {
        if process.trap_state().is_killed() {
            Err(NoProcess)
        } else {
            sleep(ticks);
            Ok(())
        }
    })
}

/// Количество тиков таймера с момента загрузки.
pub fn uptime(clock: &Clock) -> u64 {
    clock.current_ticks()
}

/// Таблица системных вызовов `exit()`, `alarm()`, `sleep()` и `uptime()`.
///
/// Номер системного вызова берётся из `rax`, аргументы --- из `rdi` и `rsi`.
/// Код результата возвращается в `rax`, а значение --- в `rdi`.
pub struct Syscalls<'a, S: Scheduler> {
    /// Планировщик, нужен для `exit()` и для ожидания в `sleep()`.
    scheduler: &'a S,

    /// Часы.
    clock: &'a Clock,

    /// Проверять обработчик при взводе будильника.
    check_alarm_handler: bool,
}

impl<'a, S: Scheduler> Syscalls<'a, S> {
    /// Создаёт таблицу системных вызовов поверх планировщика `scheduler` и часов `clock`.
    pub fn new(
        scheduler: &'a S,
        clock: &'a Clock,
        check_alarm_handler: bool,
    ) -> Self {
        Self {
            scheduler,
            clock,
            check_alarm_handler,
        }
    }
}

impl<S: Scheduler> SyscallTable<S::Process> for Syscalls<'_, S> {
    fn dispatch(
        &self,
        cpu: CpuId,
        process: &S::Process,
        frame: &mut TrapFrame,
    ) -> Disposition {
        let registers = *frame.registers();
        let number = registers.rax;
        let arg0 = registers.rdi;
        let arg1 = registers.rsi;

        let result = match Syscall::try_from(number) {
            Ok(Syscall::Exit) => {
                let pid = process.pid();
                let code = ExitCode::try_from(arg0);
                info!(%pid, arg0, ?code, syscall = "exit");
                self.scheduler.exit(cpu, process, code.unwrap_or(ExitCode::Panic));
                return Disposition::Terminated(pid);
            },
            Ok(Syscall::Alarm) => Virt::new(arg1)
                .and_then(|handler| alarm(process, arg0 as u64, handler, self.check_alarm_handler))
                .map(|_| 0),
            Ok(Syscall::Sleep) => {
                sleep(self.clock, process, arg0 as u64, |ticks| self.scheduler.sleep(cpu, ticks))
                    .and_then(|ticks| Ok(ticks.try_into()?))
            },
            Ok(Syscall::Uptime) => Ok(uptime(self.clock).try_into().unwrap_or(usize::MAX)),
            Err(_) => {
                warn!(pid = %process.pid(), number, arg0, arg1, "unknown syscall");
                Err(InvalidArgument)
            },
        };

        frame.set_syscall_result(result);

        Disposition::Resume
    }
}

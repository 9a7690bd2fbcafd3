use core::sync::atomic::{
    AtomicUsize,
    Ordering,
};

use scopeguard::defer;

use ku::sync::{
    IrqSpinlock,
    IrqSpinlockGuard,
};

use crate::{
    error::Result,
    log::trace,
    smp::CpuId,
};

// Used in docs.
#[allow(unused)]
use crate::process::Scheduler;

/// Монотонный счётчик тиков таймера.
///
/// Увеличивает его только загрузочный процессор,
/// чтобы частота тиков не зависела от количества работающих процессоров.
/// Читатели берут ту же блокировку, что и писатель,
/// поэтому никогда не видят значение старее уже объявленного ожидающим.
/// Блокировка запрещает прерывания, так как её берёт и обработчик прерывания таймера.
#[derive(Debug)]
pub struct Clock {
    /// Количество тиков с момента загрузки.
    ticks: IrqSpinlock<u64>,

    /// Процессор, который увеличивает счётчик.
    bootstrap: CpuId,

    /// Количество потоков, ждущих в [`Clock::wait_for_tick()`] или [`Clock::sleep_until()`].
    waiters: AtomicUsize,
}

impl Clock {
    /// Создаёт часы с нулевым счётчиком, который увеличивает только процессор `bootstrap`.
    #[track_caller]
    pub const fn new(bootstrap: CpuId) -> Self {
        Self {
            ticks: IrqSpinlock::new(0),
            bootstrap,
            waiters: AtomicUsize::new(0),
        }
    }

    /// Учитывает прерывание таймера на процессоре `cpu`.
    ///
    /// Если есть ожидающие, будит их вызовом `wakeup` с новым значением счётчика.
    /// Вызов происходит под блокировкой счётчика, поэтому ожидающий,
    /// который проверил счётчик и засыпает под той же блокировкой,
    /// не может пропустить пробуждение.
    ///
    /// Возвращает новое значение счётчика, если `cpu` загрузочный, и [`None`] иначе.
    /// Во втором случае счётчик не меняется.
    pub fn on_timer_tick<F: FnOnce(u64)>(
        &self,
        cpu: CpuId,
        wakeup: F,
    ) -> Option<u64> {
        if cpu != self.bootstrap {
            return None;
        }

        let mut ticks = self.ticks.lock();
        *ticks += 1;

        let waiters = self.waiters.load(Ordering::Acquire);
        if waiters > 0 {
            trace!(ticks = *ticks, waiters, "wake up waiters");
            wakeup(*ticks);
        }

        Some(*ticks)
    }

    /// Количество тиков с момента загрузки.
    pub fn current_ticks(&self) -> u64 {
        *self.ticks.lock()
    }

    /// Процессор, который увеличивает счётчик.
    pub fn bootstrap(&self) -> CpuId {
        self.bootstrap
    }

    /// Количество потоков, ожидающих тика.
    pub fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Acquire)
    }

    /// Ждёт изменения счётчика и возвращает его новое значение.
    ///
    /// Пока счётчик не изменился, вызывает `sleep` с захваченным счётчиком.
    /// Она должна освободить его и заснуть до пробуждения,
    /// как это делает [`Scheduler::sleep()`].
    pub fn wait_for_tick<F>(
        &self,
        mut sleep: F,
    ) -> u64
    where
        F: FnMut(IrqSpinlockGuard<'_, u64>),
    {
        let start = self.current_ticks();

        self.waiters.fetch_add(1, Ordering::AcqRel);
        defer! {
            self.waiters.fetch_sub(1, Ordering::AcqRel);
        }

        loop {
            let ticks = self.ticks.lock();
            if *ticks != start {
                return *ticks;
            }

            sleep(ticks);
        }
    }

    /// Ждёт, пока счётчик достигнет `deadline`, и возвращает его значение.
    ///
    /// Пока этого не случилось, вызывает `sleep` с захваченным счётчиком,
    /// как и [`Clock::wait_for_tick()`].
    /// Прекращает ожидание, как только `sleep` вернёт ошибку, и возвращает её.
    pub fn sleep_until<F>(
        &self,
        deadline: u64,
        mut sleep: F,
    ) -> Result<u64>
    where
        F: FnMut(IrqSpinlockGuard<'_, u64>) -> Result<()>,
    {
        self.waiters.fetch_add(1, Ordering::AcqRel);
        defer! {
            self.waiters.fetch_sub(1, Ordering::AcqRel);
        }

        loop {
            let ticks = self.ticks.lock();
            if *ticks >= deadline {
                return Ok(*ticks);
            }

            sleep(ticks)?;
        }
    }
}

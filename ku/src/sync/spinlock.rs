use core::{
    fmt,
    ops::{
        Deref,
        DerefMut,
    },
    panic::Location,
    sync::atomic::{
        AtomicUsize,
        Ordering,
    },
};

use crate::log::trace;

/// Спин-блокировка, которая синхронизирует доступ к защищаемым данным
/// из разных потоков исполнения.
///
/// <https://en.wikipedia.org/wiki/Spinlock>
///
/// Запоминает место своего определения и собирает статистику захватов
/// для отладочной печати.
///
/// # Примеры
///
/// ```rust
/// # use ku::sync::spinlock::Spinlock;
/// #
/// let spinlock: Spinlock<i32> = Spinlock::new(42);
///
/// {
///     let mut lock = spinlock.lock();
///     *lock += 1;
///
///     assert!(spinlock.try_lock().is_none());
/// }
///
/// assert_eq!(*spinlock.lock(), 43);
/// ```
pub struct Spinlock<T> {
    /// Защищаемые блокировкой данные.
    data: spin::Mutex<T>,

    /// Место в коде, где определена блокировка.
    defined: &'static Location<'static>,

    /// Статистика захватов.
    stats: Stats,
}

impl<T> Spinlock<T> {
    /// Создаёт новую блокировку, защищающую `data`.
    #[track_caller]
    pub const fn new(data: T) -> Self {
        Self {
            data: spin::Mutex::new(data),
            defined: Location::caller(),
            stats: Stats::new(),
        }
    }

    /// Захватывает блокировку, активно ожидая, пока она занята кем-то другим.
    ///
    /// Возвращает [`SpinlockGuard`], который даёт доступ к защищаемым данным
    /// и освобождает блокировку при удалении.
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }

            self.stats.waits.fetch_add(1, Ordering::Relaxed);

            while self.data.is_locked() {
                core::hint::spin_loop();
            }
        }
    }

    /// Делает одну попытку захватить блокировку.
    /// Возвращает [`None`], если она занята кем-то другим.
    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        match self.data.try_lock() {
            Some(guard) => {
                self.stats.locks.fetch_add(1, Ordering::Relaxed);
                Some(SpinlockGuard {
                    guard,
                    stats: &self.stats,
                })
            },
            None => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                None
            },
        }
    }

    /// Даёт доступ к защищаемым данным без захвата блокировки,
    /// так как `self` заимствован эксклюзивно.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: fmt::Debug> fmt::Debug for Spinlock<T> {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(formatter, "Spinlock {{ defined: {}, ", self.defined)?;

        match self.data.try_lock() {
            Some(data) => write!(formatter, "data: {:?}", *data)?,
            None => write!(formatter, "data: <locked>")?,
        }

        write!(formatter, ", stats: {:?} }}", self.stats)
    }
}

impl<T: Default> Default for Spinlock<T> {
    #[track_caller]
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Drop for Spinlock<T> {
    fn drop(&mut self) {
        debug_assert_eq!(
            self.stats.locks.load(Ordering::Relaxed),
            self.stats.unlocks.load(Ordering::Relaxed),
        );
        trace!(spinlock = %self.defined, stats = ?self.stats, "dropping");
    }
}

/// Даёт доступ к данным, защищённым [`Spinlock`],
/// и освобождает её при удалении.
pub struct SpinlockGuard<'a, T> {
    /// Страж нижележащей блокировки.
    guard: spin::MutexGuard<'a, T>,

    /// Статистика [`Spinlock`], к которой относится этот страж.
    stats: &'a Stats,
}

impl<T> Deref for SpinlockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.guard.deref()
    }
}

impl<T> DerefMut for SpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.deref_mut()
    }
}

impl<T> Drop for SpinlockGuard<'_, T> {
    fn drop(&mut self) {
        self.stats.unlocks.fetch_add(1, Ordering::Relaxed);
    }
}

impl<T: fmt::Debug> fmt::Debug for SpinlockGuard<'_, T> {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(formatter, "{:?}", self.deref())
    }
}

impl<T: fmt::Display> fmt::Display for SpinlockGuard<'_, T> {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(formatter, "{}", self.deref())
    }
}

/// Статистика захватов [`Spinlock`].
#[derive(Debug)]
struct Stats {
    /// Количество неудачных попыток [`Spinlock::try_lock()`].
    failures: AtomicUsize,

    /// Количество успешных захватов.
    locks: AtomicUsize,

    /// Количество освобождений.
    unlocks: AtomicUsize,

    /// Сколько раз [`Spinlock::lock()`] пришлось ждать.
    waits: AtomicUsize,
}

impl Stats {
    /// Нулевая статистика.
    const fn new() -> Self {
        Self {
            failures: AtomicUsize::new(0),
            locks: AtomicUsize::new(0),
            unlocks: AtomicUsize::new(0),
            waits: AtomicUsize::new(0),
        }
    }
}

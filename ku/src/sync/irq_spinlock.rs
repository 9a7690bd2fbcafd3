use core::{
    fmt,
    ops::{
        Deref,
        DerefMut,
    },
};

use super::{
    Spinlock,
    SpinlockGuard,
};

/// Спин-блокировка, которая позволяет синхронизировать доступ
/// к защищаемым ею данным как из обычного кода, так и из обработчика прерываний.
/// Пока она захвачена, прерывания на текущем процессоре запрещены,
/// поэтому обработчик прерывания не может застать её захваченной
/// прерванным кодом того же процессора.
/// В остальном аналогична [`Spinlock`].
pub struct IrqSpinlock<T>(Spinlock<T>);

impl<T> IrqSpinlock<T> {
    /// Создаёт новую спин-блокировку для защиты `data`.
    #[track_caller]
    pub const fn new(data: T) -> Self {
        Self(Spinlock::new(data))
    }

    /// Захватывает спин-блокировку.
    /// При этом ожидает в активном цикле освобождения блокировки, если она уже захвачена.
    ///
    /// Возвращает [`IrqSpinlockGuard`], который:
    ///   - Позволяет читать и писать в защищаемые [`IrqSpinlock`] данные
    ///     с помощью типажей [`Deref`] и [`DerefMut`] соответственно.
    ///   - Автоматически освобождает блокировку в реализации типажа [`Drop`].
    pub fn lock(&self) -> IrqSpinlockGuard<'_, T> {
        let irq_guard = IrqGuard::new();

        IrqSpinlockGuard {
            spinlock_guard: self.0.lock(),
            irq_guard,
        }
    }

    /// Пытается захватить спин-блокировку.
    /// Если она уже захвачена, возвращает [`None`],
    /// а флаг разрешения прерываний остаётся прежним.
    pub fn try_lock(&self) -> Option<IrqSpinlockGuard<'_, T>> {
        let irq_guard = IrqGuard::new();

        self.0.try_lock().map(|spinlock_guard| IrqSpinlockGuard {
            spinlock_guard,
            irq_guard,
        })
    }
}

impl<T> Deref for IrqSpinlock<T> {
    type Target = Spinlock<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for IrqSpinlock<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for IrqSpinlock<T> {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(formatter, "Irq{:?}", self.0)
    }
}

impl<T: Default> Default for IrqSpinlock<T> {
    #[track_caller]
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Вспомогательная структура для [`IrqSpinlock`].
///
/// - Запоминает состояние флага разрешения прерываний в момент создания.
/// - После чего запрещает прерывания.
/// - Автоматически возвращает флаг разрешения прерываний
///   в исходное состояние в реализации типажа [`Drop`].
///
/// Вне ядра, то есть в пользовательском режиме хостовой системы,
/// флаг прерываний недоступен и [`IrqGuard`] ничего не делает.
struct IrqGuard {
    /// Прерывания были разрешены до создания [`IrqGuard`].
    #[cfg_attr(not(target_os = "none"), allow(dead_code))]
    were_enabled: bool,
}

impl IrqGuard {
    /// Запоминает состояние флага разрешения прерываний и запрещает их.
    #[cfg(target_os = "none")]
    fn new() -> Self {
        use x86_64::instructions::interrupts;

        let were_enabled = interrupts::are_enabled();
        interrupts::disable();
        Self { were_enabled }
    }

    /// На хостовой системе прерываниями управлять нельзя.
    #[cfg(not(target_os = "none"))]
    fn new() -> Self {
        Self {
            were_enabled: false,
        }
    }
}

impl Drop for IrqGuard {
    /// Возвращает флаг разрешения прерываний в исходное состояние,
    /// в котором он находился до создания этого [`IrqGuard`].
    fn drop(&mut self) {
        #[cfg(target_os = "none")]
        if self.were_enabled {
            x86_64::instructions::interrupts::enable();
        }
    }
}

#[allow(rustdoc::private_intra_doc_links)]
/// Захваченный [`IrqSpinlock`].
///
/// - Позволяет читать и писать в защищаемые [`IrqSpinlock`] данные
///   с помощью типажей [`Deref`] и [`DerefMut`] соответственно.
/// - В реализации типажа [`Drop`]:
///   - Автоматически освобождает блокировку.
///   - После этого, возвращает флаг разрешения прерываний в исходное состояние,
///     в котором он находился до создания этого [`IrqGuard`].
pub struct IrqSpinlockGuard<'a, T> {
    /// Захваченный [`Spinlock`].
    spinlock_guard: SpinlockGuard<'a, T>,

    /// Должен быть после [`IrqSpinlockGuard::spinlock_guard`],
    /// чтобы при разрушении [`IrqSpinlockGuard`] сначала освободилась спин-блокировка,
    /// а уже потом --- включились прерывания.
    // Используется только неявный вызов [`IrqGuard::drop()`].
    #[allow(dead_code)]
    irq_guard: IrqGuard,
}

impl<T> Deref for IrqSpinlockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.spinlock_guard.deref()
    }
}

impl<T> DerefMut for IrqSpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.spinlock_guard.deref_mut()
    }
}

impl<T: fmt::Debug> fmt::Debug for IrqSpinlockGuard<'_, T> {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(formatter, "{:?}", self.deref())
    }
}

impl<T: fmt::Display> fmt::Display for IrqSpinlockGuard<'_, T> {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(formatter, "{}", self.deref())
    }
}

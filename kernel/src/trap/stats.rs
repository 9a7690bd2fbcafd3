use core::{
    fmt,
    sync::atomic::{
        AtomicUsize,
        Ordering,
    },
};

use ku::process::{
    Trap,
    VECTOR_COUNT,
};

/// Количество прерываний по каждому вектору.
#[derive(Debug)]
pub struct TrapStats([AtomicUsize; VECTOR_COUNT]);

impl TrapStats {
    /// Нулевая статистика.
    pub const fn new() -> Self {
        Self([const { AtomicUsize::new(0) }; VECTOR_COUNT])
    }

    /// Количество прерываний по вектору `vector`.
    pub fn count(
        &self,
        vector: u8,
    ) -> usize {
        self.0[usize::from(vector)].load(Ordering::Relaxed)
    }

    /// Количество прерываний по всем векторам.
    pub fn total(&self) -> usize {
        self.0.iter().map(|count| count.load(Ordering::Relaxed)).sum()
    }

    /// Статистика векторов, по которым было хотя бы одно прерывание.
    pub fn iter(&self) -> impl Iterator<Item = Statistics> + '_ {
        self.0.iter().enumerate().filter_map(|(vector, count)| {
            let count = count.load(Ordering::Relaxed);
            (count > 0).then(|| Statistics {
                vector,
                trap: Trap::try_from(vector).ok(),
                count,
            })
        })
    }

    /// Учитывает прерывание по вектору `vector`.
    pub(super) fn inc(
        &self,
        vector: usize,
    ) {
        if let Some(count) = self.0.get(vector) {
            count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for TrapStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Статистика одного вектора.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Statistics {
    /// Номер вектора.
    pub vector: usize,

    /// Прерывание, если вектор известен.
    pub trap: Option<Trap>,

    /// Количество прерываний.
    pub count: usize,
}

impl Statistics {
    /// Понятное человеку название вектора.
    pub fn name(&self) -> &'static str {
        self.trap.map_or("Unknown", |trap| trap.name())
    }

    /// Короткая мнемоника вектора.
    pub fn mnemonic(&self) -> &'static str {
        self.trap.map_or("#??", |trap| trap.mnemonic())
    }
}

impl fmt::Display for Statistics {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(
            formatter,
            "{:#04X} {:<3} {:<28} {}",
            self.vector,
            self.mnemonic(),
            self.name(),
            self.count,
        )
    }
}

use core::mem;

use derive_more::{
    Deref,
    Display,
};

use ku::memory::Frame;

use crate::error::Result;

use super::FrameAllocator;

/// Владеет выделенным физическим фреймом и возвращает его в [`FrameAllocator`],
/// если владение не передано дальше с помощью [`FrameGuard::take()`].
#[derive(Deref, Display)]
#[display("{}", frame)]
#[must_use]
pub struct FrameGuard<'a> {
    /// Охраняемый фрейм.
    #[deref]
    frame: Frame,

    /// Аллокатор, которому возвращается фрейм.
    allocator: &'a dyn FrameAllocator,
}

impl<'a> FrameGuard<'a> {
    /// Выделяет фрейм из аллокатора `allocator`.
    pub fn allocate(allocator: &'a dyn FrameAllocator) -> Result<Self> {
        let frame = allocator.allocate()?;

        Ok(Self { frame, allocator })
    }

    /// Отказывается от владения фреймом, не освобождая его.
    pub fn take(self) -> Frame {
        let frame = self.frame;
        mem::forget(self);
        frame
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.allocator.deallocate(self.frame);
    }
}

use core::{
    fmt,
    mem,
};

use crate::{
    error::Result,
    memory::{
        Block,
        Virt,
    },
};

/// Минимальная информация о контексте исполнения.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(C)]
pub struct MiniContext {
    /// Адрес кода, регистр `rip`.
    rip: Virt,

    /// Адрес стека, регистр `rsp`.
    rsp: Virt,
}

impl MiniContext {
    /// Создаёт [`MiniContext`] по значениям регистров `rip` и `rsp`.
    pub fn new(
        rip: Virt,
        rsp: Virt,
    ) -> Self {
        Self { rip, rsp }
    }

    /// Адрес кода, регистр `rip`.
    pub fn rip(&self) -> Virt {
        self.rip
    }

    /// Адрес стека, регистр `rsp`.
    pub fn rsp(&self) -> Virt {
        self.rsp
    }

    /// Резервирует на стеке [`MiniContext`] блок для объекта типа `T`.
    /// Не проверяет ни выравнивание, ни доступность блока.
    ///
    /// При ошибке контекст не меняется.
    pub fn push<T>(&mut self) -> Result<Block<Virt>> {
        let old_rsp = self.rsp;
        let new_rsp = (old_rsp - mem::size_of::<T>())?;
        let block = Block::new(new_rsp, old_rsp)?;

        self.rsp = new_rsp;

        Ok(block)
    }
}

impl fmt::Display for MiniContext {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(formatter, "{{ rip: {}, rsp: {} }}", self.rip, self.rsp)
    }
}

#[cfg(test)]
mod test {
    use crate::memory::Virt;

    use super::MiniContext;

    #[test]
    fn push() {
        let rip = Virt::new(0x1234).unwrap();
        let mut context = MiniContext::new(rip, Virt::new(0x2000).unwrap());

        let slot = context.push::<u64>().unwrap();
        assert_eq!(slot.start_address().into_usize(), 0x1FF8);
        assert_eq!(slot.size(), 8);
        assert_eq!(context.rsp().into_usize(), 0x1FF8);
        assert_eq!(context.rip(), rip);

        let mut bottom = MiniContext::new(rip, Virt::new(4).unwrap());
        assert!(bottom.push::<u64>().is_err());
        assert_eq!(bottom.rsp().into_usize(), 4);
    }
}

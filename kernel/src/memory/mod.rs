/// Устранение исключений доступа к страницам отображением новых обнулённых страниц.
pub mod fault;

/// Селекторы сегментов
/// [глобальной таблицы дескрипторов](https://en.wikipedia.org/wiki/Global_Descriptor_Table).
pub mod gdt;

/// RAII-страж выделенного физического фрейма.
mod frame_guard;

use ku::memory::{
    Block,
    Frame,
    Page,
    PageTableFlags,
    Virt,
};

use crate::error::{
    Error::{
        NoPage,
        PermissionDenied,
    },
    Result,
};

pub use fault::{
    FaultError,
    resolve_page_fault,
};
pub use frame_guard::FrameGuard;

// Used in docs.
#[allow(unused)]
use crate::error::Error;

/// Аллокатор физических фреймов.
pub trait FrameAllocator: Sync {
    /// Выделяет физический фрейм.
    ///
    /// Возвращает [`Error::NoFrame`], если свободных фреймов нет.
    fn allocate(&self) -> Result<Frame>;

    /// Возвращает фрейм `frame` аллокатору.
    fn deallocate(
        &self,
        frame: Frame,
    );

    /// Заполняет фрейм `frame` нулями.
    fn zero(
        &self,
        frame: Frame,
    );
}

/// Виртуальное адресное пространство процесса.
pub trait AddressSpace {
    /// Отображает виртуальную страницу `page` на физический фрейм `frame` с флагами доступа `flags`.
    /// После успешного вызова фреймом владеет адресное пространство.
    fn map_page(
        &mut self,
        page: Page,
        frame: Frame,
        flags: PageTableFlags,
    ) -> Result<()>;

    /// Флаги доступа страницы `page` или [`None`], если она не отображена.
    fn flags(
        &self,
        page: Page,
    ) -> Option<PageTableFlags>;

    /// Записывает `value` по виртуальному адресу `address` этого адресного пространства.
    fn write_word(
        &mut self,
        address: Virt,
        value: usize,
    ) -> Result<()>;

    /// Проверяет, что каждая страница блока `block` отображена как минимум с флагами `flags`.
    ///
    /// Возвращает [`Error::NoPage`], если какая-то страница блока не отображена,
    /// и [`Error::PermissionDenied`], если у какой-то страницы не хватает нужных флагов.
    fn check_permission(
        &self,
        block: Block<Virt>,
        flags: PageTableFlags,
    ) -> Result<()> {
        let required_flags = PageTableFlags::PRESENT | flags;

        for page in block.enclosing() {
            let page_flags = self.flags(page).ok_or(NoPage)?;
            if !page_flags.contains(required_flags) {
                return Err(PermissionDenied);
            }
        }

        Ok(())
    }
}

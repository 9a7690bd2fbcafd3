use derive_more::Display;

use ku::memory::{
    Page,
    PageFaultInfo,
    USER_RW,
    Virt,
};

use crate::{
    config::FaultPolicy,
    error::Error::{
        self,
        NoFrame,
    },
    log::debug,
};

use super::{
    AddressSpace,
    FrameAllocator,
    FrameGuard,
};

/// Причина, по которой исключение доступа к странице не обработано.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum FaultError {
    /// [`FaultPolicy`] запрещает обрабатывать это исключение.
    #[display("the fault is outside of the resolvable region")]
    Rejected,

    /// Закончились физические фреймы --- для самой страницы
    /// или для промежуточных таблиц страниц.
    #[display("out of memory: {_0}")]
    Exhausted(Error),

    /// Отображение страницы не удалось по другой причине.
    /// Например, страница уже отображена и исключение вызвано нарушением прав доступа.
    #[display("failed to map the page: {_0}")]
    MapFailed(Error),
}

/// Обрабатывает исключение доступа к странице по адресу `fault_address`
/// в адресном пространстве `address_space`.
///
/// Выделяет фрейм, заполняет его нулями и отображает в страницу,
/// содержащую `fault_address`, с правами [`USER_RW`].
/// При успехе отображается ровно одна страница, при ошибке ничего не меняется.
pub fn resolve_page_fault<A: AddressSpace + ?Sized>(
    address_space: &mut A,
    allocator: &dyn FrameAllocator,
    fault_address: Virt,
    code: PageFaultInfo,
    policy: FaultPolicy,
) -> Result<Page, FaultError> {
    let page = Page::containing(fault_address);

    if let FaultPolicy::Region(region) = policy {
        if !code.is_not_present() || !region.contains_address(fault_address) {
            return Err(FaultError::Rejected);
        }
    }

    let frame = FrameGuard::allocate(allocator).map_err(FaultError::Exhausted)?;
    allocator.zero(*frame);

    address_space.map_page(page, *frame, USER_RW).map_err(|error| match error {
        NoFrame => FaultError::Exhausted(error),
        _ => FaultError::MapFailed(error),
    })?;

    debug!(%fault_address, %page, %frame, %code, "resolved a page fault");

    frame.take();

    Ok(page)
}

use x86_64::{
    PrivilegeLevel,
    structures::gdt::SegmentSelector,
};

/// Индекс дескриптора 64-битного кода ядра.
/// По индексу `0` находится обязательный нулевой дескриптор.
const KERNEL_CODE_INDEX: u16 = 1;

/// Индекс дескриптора данных ядра.
const KERNEL_DATA_INDEX: u16 = 2;

/// Индекс дескриптора данных пользователя.
/// Он предшествует дескриптору кода пользователя, как требует регистр `STAR`.
const USER_DATA_INDEX: u16 = 3;

/// Индекс дескриптора 64-битного кода пользователя.
const USER_CODE_INDEX: u16 = 4;

/// Селектор сегмента кода ядра, `0x08`.
pub const fn kernel_code() -> SegmentSelector {
    SegmentSelector::new(KERNEL_CODE_INDEX, PrivilegeLevel::Ring0)
}

/// Селектор сегмента данных ядра, `0x10`.
pub const fn kernel_data() -> SegmentSelector {
    SegmentSelector::new(KERNEL_DATA_INDEX, PrivilegeLevel::Ring0)
}

/// Селектор сегмента данных пользователя, `0x1B`.
pub const fn user_data() -> SegmentSelector {
    SegmentSelector::new(USER_DATA_INDEX, PrivilegeLevel::Ring3)
}

/// Селектор сегмента кода пользователя, `0x23`.
pub const fn user_code() -> SegmentSelector {
    SegmentSelector::new(USER_CODE_INDEX, PrivilegeLevel::Ring3)
}

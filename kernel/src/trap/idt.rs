use core::mem;

use bitflags::bitflags;
use lazy_static::lazy_static;
use num_enum::{
    IntoPrimitive,
    TryFromPrimitive,
};
use static_assertions::const_assert_eq;
use x86_64::{
    PrivilegeLevel,
    VirtAddr,
    instructions::tables,
    structures::{
        DescriptorTablePointer,
        gdt::SegmentSelector,
    },
};

use ku::{
    memory::Virt,
    process::{
        Trap,
        VECTOR_COUNT,
    },
};

use crate::{
    log::info,
    memory::gdt,
};

use super::entry;

/// Тип шлюза
/// [таблицы дескрипторов прерываний](https://wiki.osdev.org/Interrupt_Descriptor_Table).
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum GateKind {
    /// Запрещает прерывания при входе.
    Interrupt = 0xE,

    /// Не меняет флаг прерываний.
    Trap = 0xF,
}

/// Запись таблицы векторов прерываний.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Gate {
    /// Адрес входной заглушки.
    pub handler: Virt,

    /// Сегмент кода, в котором работает обработчик.
    pub selector: SegmentSelector,

    /// Наименее привилегированное кольцо, которому разрешено вызывать вектор инструкцией `int`.
    pub privilege: PrivilegeLevel,

    /// Тип шлюза.
    pub kind: GateKind,
}

impl Gate {
    /// Шлюз вектора `vector` с входной заглушкой по адресу `handler`.
    ///
    /// Вектор системных вызовов получает шлюз ловушки, доступный из пространства пользователя,
    /// остальные --- шлюзы прерываний, доступные только ядру.
    pub fn for_vector(
        vector: usize,
        handler: Virt,
        selector: SegmentSelector,
    ) -> Self {
        if vector == usize::from(Trap::Syscall) {
            Self {
                handler,
                selector,
                privilege: PrivilegeLevel::Ring3,
                kind: GateKind::Trap,
            }
        } else {
            Self {
                handler,
                selector,
                privilege: PrivilegeLevel::Ring0,
                kind: GateKind::Interrupt,
            }
        }
    }
}

bitflags! {
    /// Слово опций дескриптора шлюза.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    struct GateOptions: u16 {
        /// Биты [`GateKind`].
        const KIND = 0xF << Self::KIND_SHIFT;

        /// Биты уровня привилегий дескриптора.
        const DPL = 0b11 << Self::DPL_SHIFT;

        /// Шлюз действителен.
        const PRESENT = 1 << 15;
    }
}

impl GateOptions {
    /// Позиция [`GateKind`] внутри слова опций.
    const KIND_SHIFT: u32 = 8;

    /// Позиция уровня привилегий дескриптора внутри слова опций.
    const DPL_SHIFT: u32 = 13;

    /// Опции шлюза типа `kind` с уровнем привилегий дескриптора `privilege`.
    fn new(
        kind: GateKind,
        privilege: PrivilegeLevel,
    ) -> Self {
        Self::from_bits_retain(u16::from(u8::from(kind)) << Self::KIND_SHIFT) |
            Self::from_bits_retain((privilege as u16) << Self::DPL_SHIFT) |
            Self::PRESENT
    }
}

/// Шлюз в 16-байтном формате x86-64
/// [таблицы дескрипторов прерываний](https://wiki.osdev.org/Interrupt_Descriptor_Table#Gate_Descriptor_2).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(C)]
pub struct GateDescriptor {
    /// Биты `0..16` адреса обработчика.
    offset_low: u16,

    /// Селектор сегмента кода.
    selector: u16,

    /// Бит присутствия, уровень привилегий и тип шлюза, см. [`GateOptions`].
    options: u16,

    /// Биты `16..32` адреса обработчика.
    offset_middle: u16,

    /// Биты `32..64` адреса обработчика.
    offset_high: u32,

    /// Должно быть нулём.
    reserved: u32,
}

const_assert_eq!(mem::size_of::<GateDescriptor>(), 16);

impl GateDescriptor {
    /// Кодирует шлюз `gate`.
    pub fn new(gate: Gate) -> Self {
        let handler = gate.handler.into_usize();

        Self {
            offset_low: handler as u16,
            selector: gate.selector.0,
            options: GateOptions::new(gate.kind, gate.privilege).bits(),
            offset_middle: (handler >> 16) as u16,
            offset_high: (handler >> 32) as u32,
            reserved: 0,
        }
    }

    /// Декодирует шлюз или возвращает [`None`], если дескриптор не присутствует или некорректен.
    pub fn gate(&self) -> Option<Gate> {
        let options = GateOptions::from_bits_retain(self.options);
        if !options.contains(GateOptions::PRESENT) {
            return None;
        }

        let handler = usize::from(self.offset_low) |
            usize::from(self.offset_middle) << 16 |
            (self.offset_high as usize) << 32;
        let dpl = (options & GateOptions::DPL).bits() >> GateOptions::DPL_SHIFT;
        let kind = (options & GateOptions::KIND).bits() >> GateOptions::KIND_SHIFT;

        Some(Gate {
            handler: Virt::new(handler).ok()?,
            selector: SegmentSelector(self.selector),
            privilege: PrivilegeLevel::from_u16(dpl),
            kind: GateKind::try_from(u8::try_from(kind).ok()?).ok()?,
        })
    }

    /// Сырое слово опций.
    pub fn options(&self) -> u16 {
        self.options
    }
}

/// [Таблица дескрипторов прерываний](https://wiki.osdev.org/Interrupt_Descriptor_Table)
/// со шлюзом для каждого вектора.
#[derive(Clone, Debug)]
#[repr(C, align(16))]
pub struct VectorTable([GateDescriptor; VECTOR_COUNT]);

impl VectorTable {
    /// Строит таблицу по входным заглушкам `handlers`, индексированным номером вектора.
    /// Все они работают в сегменте `kernel_code`.
    pub fn new(
        handlers: &[Virt; VECTOR_COUNT],
        kernel_code: SegmentSelector,
    ) -> Self {
        let mut table = [GateDescriptor::default(); VECTOR_COUNT];

        for (vector, (descriptor, &handler)) in table.iter_mut().zip(handlers).enumerate() {
            *descriptor = GateDescriptor::new(Gate::for_vector(vector, handler, kernel_code));
        }

        Self(table)
    }

    /// Дескриптор вектора `vector`.
    pub fn descriptor(
        &self,
        vector: u8,
    ) -> &GateDescriptor {
        &self.0[usize::from(vector)]
    }

    /// Декодированный шлюз вектора `vector`.
    pub fn gate(
        &self,
        vector: u8,
    ) -> Option<Gate> {
        self.descriptor(vector).gate()
    }

    /// Псевдодескриптор для инструкции `lidt`.
    pub fn pseudo_descriptor(&self) -> DescriptorTablePointer {
        DescriptorTablePointer {
            base: VirtAddr::from_ptr(self.0.as_ptr()),
            limit: (mem::size_of_val(&self.0) - 1) as u16,
        }
    }

    /// Загружает таблицу в регистр IDTR текущего процессора.
    ///
    /// # Safety
    ///
    /// Каждый шлюз должен указывать на корректную входную заглушку,
    /// а селектор --- на корректный сегмент кода.
    pub unsafe fn load(&'static self) {
        unsafe {
            tables::lidt(&self.pseudo_descriptor());
        }
    }
}

const_assert_eq!(mem::size_of::<VectorTable>(), VECTOR_COUNT * mem::size_of::<GateDescriptor>());

lazy_static! {
    /// Общая для всех процессоров таблица векторов.
    static ref VECTORS: VectorTable = VectorTable::new(&entry::STUB_ADDRESSES, gdt::kernel_code());
}

/// Строит общую для всех процессоров таблицу векторов.
/// Последующие вызовы ничего не делают.
pub fn initialize_vectors() -> &'static VectorTable {
    lazy_static::initialize(&VECTORS);
    &VECTORS
}

/// Загружает общую таблицу векторов в регистр IDTR текущего процессора.
/// Каждый процессор должен вызвать её один раз, повторные вызовы безвредны.
pub fn load_vectors() {
    let vectors = initialize_vectors();

    unsafe {
        vectors.load();
    }

    let base = vectors.pseudo_descriptor().base;
    info!(?base, "vectors loaded");
}

#[cfg(test)]
mod test {
    use ku::memory::Virt;
    use x86_64::{
        PrivilegeLevel,
        structures::gdt::SegmentSelector,
    };

    use super::{
        Gate,
        GateDescriptor,
        GateKind,
    };

    #[test]
    fn encoding() {
        let handler = Virt::new(0xFFFF_8000_1234_5678).unwrap();
        let selector = SegmentSelector(0x08);

        let timer = GateDescriptor::new(Gate::for_vector(0x20, handler, selector));
        assert_eq!(timer.options(), 0x8E00);

        let syscall = GateDescriptor::new(Gate::for_vector(0x40, handler, selector));
        assert_eq!(syscall.options(), 0xEF00);

        let gate = syscall.gate().unwrap();
        assert_eq!(gate.handler, handler);
        assert_eq!(gate.selector, selector);
        assert_eq!(gate.privilege, PrivilegeLevel::Ring3);
        assert_eq!(gate.kind, GateKind::Trap);

        assert_eq!(GateDescriptor::default().gate(), None);
    }
}

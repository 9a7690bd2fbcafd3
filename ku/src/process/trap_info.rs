use core::fmt;

use num_enum::{
    IntoPrimitive,
    TryFromPrimitive,
};

use crate::memory::{
    PageFaultInfo,
    Virt,
};

/// Количество записей в таблице векторов прерываний.
pub const VECTOR_COUNT: usize = 256;

/// Вектор первой линии аппаратных прерываний.
pub const IRQ_BASE: usize = 0x20;

/// Исключение или прерывание.
#[derive(Clone, Copy, Debug, Eq, Hash, IntoPrimitive, Ord, PartialEq, PartialOrd, TryFromPrimitive)]
#[repr(usize)]
pub enum Trap {
    /// [Exceptions: Division Error](https://wiki.osdev.org/Exception#Division_Error)
    DivideError = 0x00,

    /// [Exceptions: Debug](https://wiki.osdev.org/Exception#Debug)
    Debug = 0x01,

    /// [Non-maskable interrupt](https://wiki.osdev.org/Non_Maskable_Interrupt)
    NonMaskableInterrupt = 0x02,

    /// [Exceptions: Breakpoint](https://wiki.osdev.org/Exception#Breakpoint)
    Breakpoint = 0x03,

    /// [Exceptions: Overflow](https://wiki.osdev.org/Exception#Overflow)
    Overflow = 0x04,

    /// [Exceptions: Bound Range Exceeded](https://wiki.osdev.org/Exception#Bound_Range_Exceeded)
    BoundRangeExceeded = 0x05,

    /// [Exceptions: Invalid Opcode](https://wiki.osdev.org/Exception#Invalid_Opcode)
    InvalidOpcode = 0x06,

    /// [Exceptions: Device Not Available](https://wiki.osdev.org/Exception#Device_Not_Available)
    DeviceNotAvailable = 0x07,

    /// [Exceptions: Double Fault](https://wiki.osdev.org/Exception#Double_Fault)
    DoubleFault = 0x08,

    /// [Exceptions: Invalid TSS](https://wiki.osdev.org/Exception#Invalid_TSS)
    InvalidTss = 0x0A,

    /// [Exceptions: Segment Not Present](https://wiki.osdev.org/Exception#Segment_Not_Present)
    SegmentNotPresent = 0x0B,

    /// [Exceptions: Stack-Segment Fault](https://wiki.osdev.org/Exception#Stack-Segment_Fault)
    StackSegmentFault = 0x0C,

    /// [Exceptions: General Protection Fault](https://wiki.osdev.org/Exception#General_Protection_Fault)
    GeneralProtectionFault = 0x0D,

    /// [Exceptions: Page Fault](https://wiki.osdev.org/Exception#Page_Fault)
    PageFault = 0x0E,

    /// [Exceptions: x87 Floating-Point Exception](https://wiki.osdev.org/Exception#x87_Floating-Point_Exception)
    X87FloatingPoint = 0x10,

    /// [Exceptions: Alignment Check](https://wiki.osdev.org/Exception#Alignment_Check)
    AlignmentCheck = 0x11,

    /// [Exceptions: Machine Check](https://wiki.osdev.org/Exception#Machine_Check)
    MachineCheck = 0x12,

    /// [Exceptions: SIMD Floating-Point Exception](https://wiki.osdev.org/Exception#SIMD_Floating-Point_Exception)
    SimdFloatingPoint = 0x13,

    /// [Exceptions: Virtualization Exception](https://wiki.osdev.org/Exception#Virtualization_Exception)
    Virtualization = 0x14,

    /// [Exceptions: Control Protection Exception](https://wiki.osdev.org/Exception#Control_Protection_Exception)
    ControlProtection = 0x15,

    /// [Exceptions: VMM Communication Exception](https://wiki.osdev.org/Exception#VMM_Communication_Exception)
    VmmCommunication = 0x1D,

    /// [Exceptions: Security Exception](https://wiki.osdev.org/Exception#Security_Exception)
    SecurityException = 0x1E,

    /// Таймер локального APIC, источник тиков планировщика.
    Timer = 0x20,

    /// Клавиатура.
    Keyboard = 0x21,

    /// Вход ведущего [PIC 8259](https://en.wikipedia.org/wiki/Intel_8259),
    /// к которому каскадно подключён ведомый.
    Cascade = 0x22,

    /// [Последовательные порты](https://en.wikipedia.org/wiki/Serial_port) 2 и 4.
    Com2 = 0x23,

    /// [Последовательные порты](https://en.wikipedia.org/wiki/Serial_port) 1 и 3.
    Com1 = 0x24,

    /// Второй [параллельный порт](https://en.wikipedia.org/wiki/Parallel_port).
    Lpt2 = 0x25,

    /// Контроллер [гибких дисков](https://en.wikipedia.org/wiki/Floppy_disk).
    FloppyDisk = 0x26,

    /// Первый [параллельный порт](https://en.wikipedia.org/wiki/Parallel_port).
    /// На этой же линии ведущий PIC сообщает о своих ложных прерываниях.
    Lpt1 = 0x27,

    /// [Часы реального времени](https://en.wikipedia.org/wiki/Real-time_clock).
    Rtc = 0x28,

    /// Мышь PS/2.
    Ps2Mouse = 0x2C,

    /// Сопроцессор.
    Coprocessor = 0x2D,

    /// Первичный канал [PATA](https://en.wikipedia.org/wiki/Parallel_ATA).
    Ata0 = 0x2E,

    /// Вторичный канал [PATA](https://en.wikipedia.org/wiki/Parallel_ATA).
    /// Некоторые эмуляторы генерируют его ложно.
    Ata1 = 0x2F,

    /// Внутренняя ошибка локального APIC.
    ApicError = 0x33,

    /// [Ложное прерывание](https://en.wikipedia.org/wiki/Interrupt#Spurious_interrupts)
    /// локального APIC.
    ApicSpurious = 0x3F,

    /// Системный вызов, выполненный инструкцией `int 0x40` из пространства пользователя.
    Syscall = 0x40,
}

impl Trap {
    /// Понятное человеку название прерывания.
    pub fn name(&self) -> &'static str {
        match self {
            Trap::DivideError => "Divide Error",
            Trap::Debug => "Debug",
            Trap::NonMaskableInterrupt => "Non-maskable Interrupt",
            Trap::Breakpoint => "Breakpoint",
            Trap::Overflow => "Overflow",
            Trap::BoundRangeExceeded => "Bound Range Exceeded",
            Trap::InvalidOpcode => "Invalid Opcode",
            Trap::DeviceNotAvailable => "Device Not Available",
            Trap::DoubleFault => "Double Fault",
            Trap::InvalidTss => "Invalid TSS",
            Trap::SegmentNotPresent => "Segment Not Present",
            Trap::StackSegmentFault => "Stack-Segment Fault",
            Trap::GeneralProtectionFault => "General Protection Fault",
            Trap::PageFault => "Page Fault",
            Trap::X87FloatingPoint => "x87 Floating-Point Exception",
            Trap::AlignmentCheck => "Alignment Check",
            Trap::MachineCheck => "Machine Check",
            Trap::SimdFloatingPoint => "SIMD Floating-Point Exception",
            Trap::Virtualization => "Virtualization Exception",
            Trap::ControlProtection => "Control Protection Exception",
            Trap::VmmCommunication => "VMM Communication Exception",
            Trap::SecurityException => "Security Exception",
            Trap::Timer => "Timer",
            Trap::Keyboard => "Keyboard",
            Trap::Cascade => "Cascade",
            Trap::Com2 => "COM2",
            Trap::Com1 => "COM1",
            Trap::Lpt2 => "LPT2",
            Trap::FloppyDisk => "Floppy Disk",
            Trap::Lpt1 => "LPT1",
            Trap::Rtc => "RTC",
            Trap::Ps2Mouse => "PS/2 Mouse",
            Trap::Coprocessor => "Coprocessor",
            Trap::Ata0 => "ATA0",
            Trap::Ata1 => "ATA1",
            Trap::ApicError => "APIC Error",
            Trap::ApicSpurious => "APIC Spurious",
            Trap::Syscall => "Syscall",
        }
    }

    /// Короткая мнемоника прерывания, например `#PF`.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Trap::DivideError => "#DE",
            Trap::Debug => "#DB",
            Trap::NonMaskableInterrupt => "NMI",
            Trap::Breakpoint => "#BP",
            Trap::Overflow => "#OF",
            Trap::BoundRangeExceeded => "#BR",
            Trap::InvalidOpcode => "#UD",
            Trap::DeviceNotAvailable => "#NM",
            Trap::DoubleFault => "#DF",
            Trap::InvalidTss => "#TS",
            Trap::SegmentNotPresent => "#NP",
            Trap::StackSegmentFault => "#SS",
            Trap::GeneralProtectionFault => "#GP",
            Trap::PageFault => "#PF",
            Trap::X87FloatingPoint => "#MF",
            Trap::AlignmentCheck => "#AC",
            Trap::MachineCheck => "#MC",
            Trap::SimdFloatingPoint => "#XM",
            Trap::Virtualization => "#VE",
            Trap::ControlProtection => "#CP",
            Trap::VmmCommunication => "#VC",
            Trap::SecurityException => "#SX",
            Trap::Syscall => "SYS",
            _ => "IRQ",
        }
    }

    /// Возвращает `true`, если для этого прерывания процессор кладёт в стек код ошибки.
    pub fn has_error_code(&self) -> bool {
        has_error_code(usize::from(*self))
    }
}

impl fmt::Display for Trap {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(
            formatter,
            "{} ({}, {:#04X})",
            self.name(),
            self.mnemonic(),
            usize::from(*self),
        )
    }
}

/// Возвращает `true`, если процессор кладёт в стек код ошибки
/// при доставке прерывания `vector`.
pub const fn has_error_code(vector: usize) -> bool {
    matches!(vector, 0x08 | 0x0A ..= 0x0E | 0x11 | 0x15 | 0x1D | 0x1E)
}

/// Информация о прерывании, которую сообщает процессор.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Info {
    /// У прерывания нет дополнительной информации.
    None,

    /// Код ошибки, который процессор кладёт в стек для некоторых исключений.
    Code(usize),

    /// Информация о некорректном обращении к странице виртуальной памяти.
    PageFault {
        /// Адрес, по которому было обращение.
        address: Virt,

        /// Причина исключения.
        code: PageFaultInfo,
    },
}

impl Info {
    /// Собирает информацию о прерывании `vector`, которую процессор сообщил
    /// кодом ошибки `error_code` в стеке и адресом `fault_address` в регистре `CR2`.
    pub fn new(
        vector: usize,
        error_code: usize,
        fault_address: Virt,
    ) -> Self {
        if vector == usize::from(Trap::PageFault) {
            Info::PageFault {
                address: fault_address,
                code: PageFaultInfo::from_bits_truncate(error_code),
            }
        } else if has_error_code(vector) {
            Info::Code(error_code)
        } else {
            Info::None
        }
    }
}

impl fmt::Display for Info {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        match self {
            Info::None => write!(formatter, "{{ }}"),
            Info::Code(code) => write!(formatter, "{{ code: {code} }}"),
            Info::PageFault { address, code } => {
                write!(formatter, "{{ address: {address}, code: {code} }}")
            },
        }
    }
}

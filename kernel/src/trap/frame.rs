use core::{
    fmt,
    mem,
};

use static_assertions::const_assert_eq;
use x86_64::registers::rflags::RFlags;

use ku::{
    memory::Virt,
    process::{
        Info,
        MiniContext,
        ResultCode,
        Trap,
    },
};

use crate::{
    error::Result,
    memory::gdt,
};

/// Регистры общего назначения в том порядке, в котором их сохраняет трамплин прерываний.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(C)]
pub struct Registers {
    pub r15: usize,
    pub r14: usize,
    pub r13: usize,
    pub r12: usize,
    pub r11: usize,
    pub r10: usize,
    pub r9: usize,
    pub r8: usize,
    pub rdi: usize,
    pub rsi: usize,
    pub rbp: usize,
    pub rdx: usize,
    pub rcx: usize,
    pub rbx: usize,
    pub rax: usize,
}

/// Контекст, который процессор сохраняет при прерывании и восстанавливает инструкцией `iretq`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(C)]
pub struct ModeContext {
    /// Указатель инструкции.
    rip: Virt,

    /// Селектор сегмента кода, его младшие биты хранят уровень привилегий контекста.
    cs: usize,

    /// Регистр флагов.
    rflags: usize,

    /// Указатель стека.
    rsp: Virt,

    /// Селектор сегмента стека.
    ss: usize,
}

impl ModeContext {
    /// Контекст, исполняющий код пользователя в `context` с разрешёнными прерываниями.
    pub fn user(context: MiniContext) -> Self {
        Self {
            rip: context.rip(),
            cs: gdt::user_code().0.into(),
            rflags: RFlags::INTERRUPT_FLAG.bits() as usize,
            rsp: context.rsp(),
            ss: gdt::user_data().0.into(),
        }
    }

    /// Контекст, исполняющий код ядра в `context`.
    pub fn kernel(context: MiniContext) -> Self {
        Self {
            rip: context.rip(),
            cs: gdt::kernel_code().0.into(),
            rflags: 0,
            rsp: context.rsp(),
            ss: gdt::kernel_data().0.into(),
        }
    }

    /// Возвращает `true`, если контекст относится к пространству пользователя.
    pub fn is_user_mode(&self) -> bool {
        debug_assert_eq!(
            Self::is_user_mode_segment(self.cs),
            Self::is_user_mode_segment(self.ss),
        );

        Self::is_user_mode_segment(self.cs)
    }

    /// Селектор сегмента кода.
    pub fn cs(&self) -> usize {
        self.cs
    }

    /// Регистр флагов.
    pub fn rflags(&self) -> RFlags {
        RFlags::from_bits_truncate(self.rflags as u64)
    }

    /// Указатели инструкции и стека контекста.
    pub fn mini_context(&self) -> MiniContext {
        MiniContext::new(self.rip, self.rsp)
    }

    /// Заменяет указатели инструкции и стека контекста.
    pub fn set_mini_context(
        &mut self,
        context: MiniContext,
    ) {
        self.rip = context.rip();
        self.rsp = context.rsp();
    }

    /// Возвращает `true`, если `segment_selector` запрашивает ненулевое кольцо привилегий.
    fn is_user_mode_segment(segment_selector: usize) -> bool {
        segment_selector & Self::CPL_MASK != Self::RING_0
    }

    /// Маска текущего уровня привилегий в селекторе сегмента.
    const CPL_MASK: usize = 0x3;

    /// Уровень привилегий ядра.
    const RING_0: usize = 0x0;
}

impl fmt::Display for ModeContext {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(
            formatter,
            "{{ mode: {}, cs:rip: {:#06X}:{}, ss:rsp: {:#06X}:{}, rflags: {:#X} }}",
            if self.is_user_mode() { "user" } else { "kernel" },
            self.cs,
            self.rip,
            self.ss,
            self.rsp,
            self.rflags,
        )
    }
}

/// Всё, что сохраняется в стеке ядра при прерывании:
/// регистры, записанные трамплином, номер вектора и код ошибки,
/// записанные заглушкой вектора, а также контекст, записанный процессором.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(C)]
pub struct TrapFrame {
    /// Регистры общего назначения прерванного контекста.
    registers: Registers,

    /// Номер вектора.
    number: usize,

    /// Записанный процессором код ошибки или ноль.
    error_code: usize,

    /// Контекст, который восстановит `iretq`.
    context: ModeContext,
}

const_assert_eq!(mem::size_of::<TrapFrame>(), 22 * mem::size_of::<usize>());

impl TrapFrame {
    /// Создаёт кадр прерывания `number` с кодом ошибки `error_code`,
    /// которое прервало контекст `context`.
    pub fn new(
        number: usize,
        error_code: usize,
        context: ModeContext,
    ) -> Self {
        Self {
            registers: Registers::default(),
            number,
            error_code,
            context,
        }
    }

    /// Номер вектора.
    pub fn number(&self) -> usize {
        self.number
    }

    /// Прерывание, если номер вектора известен.
    pub fn trap(&self) -> Option<Trap> {
        Trap::try_from(self.number).ok()
    }

    /// Понятное человеку название прерывания.
    pub fn name(&self) -> &'static str {
        self.trap().map_or("Unknown", |trap| trap.name())
    }

    /// Записанный процессором код ошибки или ноль.
    pub fn error_code(&self) -> usize {
        self.error_code
    }

    /// Информация о прерывании, которую сообщил процессор.
    pub fn info(
        &self,
        fault_address: Virt,
    ) -> Info {
        Info::new(self.number, self.error_code, fault_address)
    }

    /// Контекст, который восстановит `iretq`.
    pub fn context(&self) -> &ModeContext {
        &self.context
    }

    /// Возвращает `true`, если прерывание пришло из пространства пользователя.
    pub fn is_user_mode(&self) -> bool {
        self.context.is_user_mode()
    }

    /// Указатели инструкции и стека прерванного контекста.
    pub fn mini_context(&self) -> MiniContext {
        self.context.mini_context()
    }

    /// Заменяет указатели инструкции и стека, куда вернётся прерывание.
    pub fn set_mini_context(
        &mut self,
        context: MiniContext,
    ) {
        self.context.set_mini_context(context);
    }

    /// Регистры общего назначения прерванного контекста.
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Регистры общего назначения прерванного контекста.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    /// Сохраняет результат `result` системного вызова:
    /// [`ResultCode`] записывается в `rax`, а значение --- в `rdi`.
    pub fn set_syscall_result(
        &mut self,
        result: Result<usize>,
    ) {
        let value = *result.as_ref().unwrap_or(&0);
        self.registers.rax = ResultCode::from(result).into();
        self.registers.rdi = value;
    }
}

impl fmt::Display for TrapFrame {
    fn fmt(
        &self,
        formatter: &mut fmt::Formatter,
    ) -> fmt::Result {
        write!(
            formatter,
            "{{ #{} {}, error code: {:#X}, {} }}",
            self.number,
            self.name(),
            self.error_code,
            self.context,
        )
    }
}

use core::{
    arch::naked_asm,
    mem,
};

use lazy_static::lazy_static;
use static_assertions::const_assert_eq;
use x86_64::registers::control::Cr2;

use ku::{
    error::{
        Error::InvalidArgument,
        Result,
    },
    memory::Virt,
    process::{
        VECTOR_COUNT,
        trap_info::has_error_code,
    },
    sync::OnceLock,
};

use super::{
    TrapHandler,
    frame::{
        Registers,
        TrapFrame,
    },
};

/// Генерирует входную заглушку для каждого вектора.
///
/// Заглушка кладёт в стек нулевой код ошибки, если процессор не кладёт настоящий,
/// чтобы все [`TrapFrame`] имели одинаковую структуру.
/// Затем кладёт номер вектора и переходит в [`trap_trampoline()`].
macro_rules! vector_stubs {
    ($($name:ident = $vector:literal),* $(,)?) => {
        $(
            #[unsafe(naked)]
            extern "C" fn $name() {
                naked_asm!(
                    "
                    .if {has_error_code} == 0
                    push 0
                    .endif
                    push {number}
                    jmp {trap_trampoline}
                    ",
                    has_error_code = const has_error_code($vector) as usize,
                    number = const $vector,
                    trap_trampoline = sym trap_trampoline,
                )
            }
        )*

        /// Входные заглушки, индексированные номером вектора.
        const STUBS: [extern "C" fn(); VECTOR_COUNT] = [$($name),*];
    };
}

vector_stubs!(
    vector_00 = 0x00,
    vector_01 = 0x01,
    vector_02 = 0x02,
    vector_03 = 0x03,
    vector_04 = 0x04,
    vector_05 = 0x05,
    vector_06 = 0x06,
    vector_07 = 0x07,
    vector_08 = 0x08,
    vector_09 = 0x09,
    vector_0a = 0x0A,
    vector_0b = 0x0B,
    vector_0c = 0x0C,
    vector_0d = 0x0D,
    vector_0e = 0x0E,
    vector_0f = 0x0F,
    vector_10 = 0x10,
    vector_11 = 0x11,
    vector_12 = 0x12,
    vector_13 = 0x13,
    vector_14 = 0x14,
    vector_15 = 0x15,
    vector_16 = 0x16,
    vector_17 = 0x17,
    vector_18 = 0x18,
    vector_19 = 0x19,
    vector_1a = 0x1A,
    vector_1b = 0x1B,
    vector_1c = 0x1C,
    vector_1d = 0x1D,
    vector_1e = 0x1E,
    vector_1f = 0x1F,
    vector_20 = 0x20,
    vector_21 = 0x21,
    vector_22 = 0x22,
    vector_23 = 0x23,
    vector_24 = 0x24,
    vector_25 = 0x25,
    vector_26 = 0x26,
    vector_27 = 0x27,
    vector_28 = 0x28,
    vector_29 = 0x29,
    vector_2a = 0x2A,
    vector_2b = 0x2B,
    vector_2c = 0x2C,
    vector_2d = 0x2D,
    vector_2e = 0x2E,
    vector_2f = 0x2F,
    vector_30 = 0x30,
    vector_31 = 0x31,
    vector_32 = 0x32,
    vector_33 = 0x33,
    vector_34 = 0x34,
    vector_35 = 0x35,
    vector_36 = 0x36,
    vector_37 = 0x37,
    vector_38 = 0x38,
    vector_39 = 0x39,
    vector_3a = 0x3A,
    vector_3b = 0x3B,
    vector_3c = 0x3C,
    vector_3d = 0x3D,
    vector_3e = 0x3E,
    vector_3f = 0x3F,
    vector_40 = 0x40,
    vector_41 = 0x41,
    vector_42 = 0x42,
    vector_43 = 0x43,
    vector_44 = 0x44,
    vector_45 = 0x45,
    vector_46 = 0x46,
    vector_47 = 0x47,
    vector_48 = 0x48,
    vector_49 = 0x49,
    vector_4a = 0x4A,
    vector_4b = 0x4B,
    vector_4c = 0x4C,
    vector_4d = 0x4D,
    vector_4e = 0x4E,
    vector_4f = 0x4F,
    vector_50 = 0x50,
    vector_51 = 0x51,
    vector_52 = 0x52,
    vector_53 = 0x53,
    vector_54 = 0x54,
    vector_55 = 0x55,
    vector_56 = 0x56,
    vector_57 = 0x57,
    vector_58 = 0x58,
    vector_59 = 0x59,
    vector_5a = 0x5A,
    vector_5b = 0x5B,
    vector_5c = 0x5C,
    vector_5d = 0x5D,
    vector_5e = 0x5E,
    vector_5f = 0x5F,
    vector_60 = 0x60,
    vector_61 = 0x61,
    vector_62 = 0x62,
    vector_63 = 0x63,
    vector_64 = 0x64,
    vector_65 = 0x65,
    vector_66 = 0x66,
    vector_67 = 0x67,
    vector_68 = 0x68,
    vector_69 = 0x69,
    vector_6a = 0x6A,
    vector_6b = 0x6B,
    vector_6c = 0x6C,
    vector_6d = 0x6D,
    vector_6e = 0x6E,
    vector_6f = 0x6F,
    vector_70 = 0x70,
    vector_71 = 0x71,
    vector_72 = 0x72,
    vector_73 = 0x73,
    vector_74 = 0x74,
    vector_75 = 0x75,
    vector_76 = 0x76,
    vector_77 = 0x77,
    vector_78 = 0x78,
    vector_79 = 0x79,
    vector_7a = 0x7A,
    vector_7b = 0x7B,
    vector_7c = 0x7C,
    vector_7d = 0x7D,
    vector_7e = 0x7E,
    vector_7f = 0x7F,
    vector_80 = 0x80,
    vector_81 = 0x81,
    vector_82 = 0x82,
    vector_83 = 0x83,
    vector_84 = 0x84,
    vector_85 = 0x85,
    vector_86 = 0x86,
    vector_87 = 0x87,
    vector_88 = 0x88,
    vector_89 = 0x89,
    vector_8a = 0x8A,
    vector_8b = 0x8B,
    vector_8c = 0x8C,
    vector_8d = 0x8D,
    vector_8e = 0x8E,
    vector_8f = 0x8F,
    vector_90 = 0x90,
    vector_91 = 0x91,
    vector_92 = 0x92,
    vector_93 = 0x93,
    vector_94 = 0x94,
    vector_95 = 0x95,
    vector_96 = 0x96,
    vector_97 = 0x97,
    vector_98 = 0x98,
    vector_99 = 0x99,
    vector_9a = 0x9A,
    vector_9b = 0x9B,
    vector_9c = 0x9C,
    vector_9d = 0x9D,
    vector_9e = 0x9E,
    vector_9f = 0x9F,
    vector_a0 = 0xA0,
    vector_a1 = 0xA1,
    vector_a2 = 0xA2,
    vector_a3 = 0xA3,
    vector_a4 = 0xA4,
    vector_a5 = 0xA5,
    vector_a6 = 0xA6,
    vector_a7 = 0xA7,
    vector_a8 = 0xA8,
    vector_a9 = 0xA9,
    vector_aa = 0xAA,
    vector_ab = 0xAB,
    vector_ac = 0xAC,
    vector_ad = 0xAD,
    vector_ae = 0xAE,
    vector_af = 0xAF,
    vector_b0 = 0xB0,
    vector_b1 = 0xB1,
    vector_b2 = 0xB2,
    vector_b3 = 0xB3,
    vector_b4 = 0xB4,
    vector_b5 = 0xB5,
    vector_b6 = 0xB6,
    vector_b7 = 0xB7,
    vector_b8 = 0xB8,
    vector_b9 = 0xB9,
    vector_ba = 0xBA,
    vector_bb = 0xBB,
    vector_bc = 0xBC,
    vector_bd = 0xBD,
    vector_be = 0xBE,
    vector_bf = 0xBF,
    vector_c0 = 0xC0,
    vector_c1 = 0xC1,
    vector_c2 = 0xC2,
    vector_c3 = 0xC3,
    vector_c4 = 0xC4,
    vector_c5 = 0xC5,
    vector_c6 = 0xC6,
    vector_c7 = 0xC7,
    vector_c8 = 0xC8,
    vector_c9 = 0xC9,
    vector_ca = 0xCA,
    vector_cb = 0xCB,
    vector_cc = 0xCC,
    vector_cd = 0xCD,
    vector_ce = 0xCE,
    vector_cf = 0xCF,
    vector_d0 = 0xD0,
    vector_d1 = 0xD1,
    vector_d2 = 0xD2,
    vector_d3 = 0xD3,
    vector_d4 = 0xD4,
    vector_d5 = 0xD5,
    vector_d6 = 0xD6,
    vector_d7 = 0xD7,
    vector_d8 = 0xD8,
    vector_d9 = 0xD9,
    vector_da = 0xDA,
    vector_db = 0xDB,
    vector_dc = 0xDC,
    vector_dd = 0xDD,
    vector_de = 0xDE,
    vector_df = 0xDF,
    vector_e0 = 0xE0,
    vector_e1 = 0xE1,
    vector_e2 = 0xE2,
    vector_e3 = 0xE3,
    vector_e4 = 0xE4,
    vector_e5 = 0xE5,
    vector_e6 = 0xE6,
    vector_e7 = 0xE7,
    vector_e8 = 0xE8,
    vector_e9 = 0xE9,
    vector_ea = 0xEA,
    vector_eb = 0xEB,
    vector_ec = 0xEC,
    vector_ed = 0xED,
    vector_ee = 0xEE,
    vector_ef = 0xEF,
    vector_f0 = 0xF0,
    vector_f1 = 0xF1,
    vector_f2 = 0xF2,
    vector_f3 = 0xF3,
    vector_f4 = 0xF4,
    vector_f5 = 0xF5,
    vector_f6 = 0xF6,
    vector_f7 = 0xF7,
    vector_f8 = 0xF8,
    vector_f9 = 0xF9,
    vector_fa = 0xFA,
    vector_fb = 0xFB,
    vector_fc = 0xFC,
    vector_fd = 0xFD,
    vector_fe = 0xFE,
    vector_ff = 0xFF,
);

lazy_static! {
    /// Адреса входных заглушек, индексированные номером вектора.
    pub(super) static ref STUB_ADDRESSES: [Virt; VECTOR_COUNT] =
        STUBS.map(|stub| Virt::from_ptr(stub as *const ()));
}

/// Сохраняет регистры общего назначения поверх кадра, построенного заглушкой,
/// передаёт получившийся [`TrapFrame`] в [`trap_entry()`],
/// восстанавливает возможно изменённый кадр и возвращается из прерывания.
///
/// На инструкции `call` стек выровнен на 16 байт, как требует System V ABI:
/// процессор выравнивает его перед записью 5 слов [`super::ModeContext`],
/// код ошибки и номер вектора добавляют 2 слова, а регистры --- ещё 15.
#[unsafe(naked)]
extern "C" fn trap_trampoline() {
    naked_asm!(
        "
        push rax
        push rbx
        push rcx
        push rdx
        push rbp
        push rsi
        push rdi
        push r8
        push r9
        push r10
        push r11
        push r12
        push r13
        push r14
        push r15

        mov rdi, rsp
        cld
        call {trap_entry}

        pop r15
        pop r14
        pop r13
        pop r12
        pop r11
        pop r10
        pop r9
        pop r8
        pop rdi
        pop rsi
        pop rbp
        pop rdx
        pop rcx
        pop rbx
        pop rax

        add rsp, {number_and_error_code_size}

        iretq
        ",

        number_and_error_code_size = const 2 * mem::size_of::<usize>(),
        trap_entry = sym trap_entry,
    )
}

const_assert_eq!(mem::size_of::<Registers>(), 15 * mem::size_of::<usize>());

/// Получает все прерывания от [`trap_trampoline()`].
extern "C" fn trap_entry(frame: &mut TrapFrame) {
    let fault_address = Virt::new_u64(Cr2::read_raw()).unwrap_or_default();

    deliver(frame, fault_address);
}

/// Обработчик, которому доставляются все прерывания.
static HANDLER: OnceLock<&'static dyn TrapHandler> = OnceLock::new();

/// Устанавливает обработчик `handler`, который с этого момента получает все прерывания.
///
/// Возвращает [`InvalidArgument`], если обработчик уже установлен.
pub fn install(handler: &'static dyn TrapHandler) -> Result<()> {
    let mut installed = false;

    HANDLER.call_once(|| {
        installed = true;
        handler
    });

    if installed {
        Ok(())
    } else {
        Err(InvalidArgument)
    }
}

/// Передаёт кадр прерывания `frame` вместе с адресом `fault_address` из регистра `CR2`
/// установленному обработчику.
///
/// # Panics
///
/// Паникует, если обработчик не установлен.
pub fn deliver(
    frame: &mut TrapFrame,
    fault_address: Virt,
) {
    match HANDLER.get() {
        Some(handler) => handler.handle(frame, fault_address),
        None => panic!(
            "unexpected trap {} before a trap handler is installed, fault address {}",
            frame, fault_address,
        ),
    }
}

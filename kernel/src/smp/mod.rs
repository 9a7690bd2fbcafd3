/// Идентификатор процессора, совпадает с идентификатором его
/// [локального APIC](https://wiki.osdev.org/APIC#Local_APIC_configuration).
pub type CpuId = u8;

/// Процессор, на котором загружается система.
/// Только он продвигает глобальный счётчик тиков.
pub const BOOTSTRAP_CPU: CpuId = 0;

/// Контроллер прерываний, которому нужно сообщать
/// о завершении обработки прерывания.
pub trait InterruptController: Sync {
    /// Сообщает о завершении обработки прерывания на процессоре `cpu`, чтобы
    /// контроллер мог доставлять прерывания того же или более низкого приоритета.
    ///
    /// <https://wiki.osdev.org/APIC#EOI_Register>
    fn end_of_interrupt(
        &self,
        cpu: CpuId,
    );
}

use std::time::Duration;

use rstest::rstest;

use ku::{
    error::Error,
    memory::{
        Block,
        PAGE_SIZE,
        Page,
        PageFaultInfo,
        USER_RW,
        Virt,
    },
    process::{
        MiniContext,
        Trap,
    },
};

use kernel::{
    ExhaustionPolicy,
    FaultPolicy,
    TrapConfig,
    memory::{
        FaultError,
        resolve_page_fault,
    },
    process::Process,
    trap::{
        Disposition,
        ModeContext,
        TrapFrame,
    },
};

use mock::{
    CODE,
    Kit,
    MockAddressSpace,
    MockFrameAllocator,
    NoSyscalls,
    STACK_TOP,
    virt,
};

mod log;
mod mock;

/// Адрес, далёкий от всего отображённого в тестовом процессе.
const HEAP: usize = 0x1_0000_0000;

#[ctor::ctor]
fn init() {
    log::init();
}

fn page_fault(
    address: usize,
    code: PageFaultInfo,
) -> (TrapFrame, Virt) {
    let context = MiniContext::new(virt(CODE), virt(STACK_TOP));
    let frame = TrapFrame::new(Trap::PageFault.into(), code.bits(), ModeContext::user(context));

    (frame, virt(address))
}

#[rstest]
#[case(HEAP)]
#[case(HEAP + 1)]
#[case(HEAP + PAGE_SIZE - 1)]
#[timeout(Duration::from_secs(1))]
fn maps_exactly_one_zeroed_page(#[case] address: usize) {
    let kit = Kit::new(1);
    let process = kit.process(0);
    let dispatcher = kit.dispatcher(&NoSyscalls, TrapConfig::default());
    let pages_before = process.address_space().page_count();

    let (mut frame, fault_address) = page_fault(address, PageFaultInfo::USER);
    assert_eq!(dispatcher.handle_trap(&mut frame, fault_address), Disposition::Resume);

    let address_space = process.address_space();
    assert_eq!(address_space.page_count(), pages_before + 1);

    let page = Page::new(virt(HEAP)).unwrap();
    let (frame, flags) = address_space.mapping(page).unwrap();
    assert_eq!(flags, USER_RW);
    assert!(kit.frame_allocator.is_zeroed(frame));
    assert_eq!(kit.frame_allocator.allocated(), 1);

    assert!(!process.trap_state().is_killed());
    assert_eq!(kit.interrupt_controller.total(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(1))]
fn other_mappings_are_intact() {
    let kit = Kit::new(1);
    let process = kit.process(0);
    let dispatcher = kit.dispatcher(&NoSyscalls, TrapConfig::default());

    let code_page = Page::new(virt(CODE)).unwrap();
    let code = process.address_space().mapping(code_page);

    for address in [HEAP, HEAP + 3 * PAGE_SIZE] {
        let (mut frame, fault_address) = page_fault(address, PageFaultInfo::WRITE);
        dispatcher.handle_trap(&mut frame, fault_address);
    }

    let address_space = process.address_space();
    assert_eq!(address_space.mapping(code_page), code);
    assert!(address_space.mapping(Page::new(virt(HEAP + PAGE_SIZE)).unwrap()).is_none());
    assert!(address_space.mapping(Page::new(virt(HEAP + 3 * PAGE_SIZE)).unwrap()).is_some());
    assert_eq!(kit.frame_allocator.allocated(), 2);
}

#[rstest]
#[timeout(Duration::from_secs(1))]
fn region_policy() {
    let region = Block::from_size(virt(HEAP), 4 * PAGE_SIZE).unwrap();
    let policy = FaultPolicy::Region(region);
    let allocator = MockFrameAllocator::new(Kit::FRAMES);
    let mut address_space = MockAddressSpace::default();

    let inside = virt(HEAP + PAGE_SIZE + 8);
    let page = resolve_page_fault(
        &mut address_space,
        &allocator,
        inside,
        PageFaultInfo::WRITE,
        policy,
    );
    assert_eq!(page, Ok(Page::containing(inside)));

    let outside = virt(HEAP + 4 * PAGE_SIZE);
    let rejected = resolve_page_fault(
        &mut address_space,
        &allocator,
        outside,
        PageFaultInfo::WRITE,
        policy,
    );
    assert_eq!(rejected, Err(FaultError::Rejected));

    let protection = resolve_page_fault(
        &mut address_space,
        &allocator,
        inside,
        PageFaultInfo::PRESENT | PageFaultInfo::WRITE,
        policy,
    );
    assert_eq!(protection, Err(FaultError::Rejected));

    assert_eq!(address_space.page_count(), 1);
    assert_eq!(allocator.allocated(), 1);
}

#[rstest]
#[timeout(Duration::from_secs(1))]
fn rejected_fault_kills_the_process() {
    let kit = Kit::new(1);
    let process = kit.process(0);
    let config = TrapConfig {
        fault_policy: FaultPolicy::Region(Block::from_size(virt(HEAP), PAGE_SIZE).unwrap()),
        ..TrapConfig::default()
    };
    let dispatcher = kit.dispatcher(&NoSyscalls, config);

    let (mut frame, fault_address) = page_fault(HEAP + PAGE_SIZE, PageFaultInfo::USER);
    assert_eq!(
        dispatcher.handle_trap(&mut frame, fault_address),
        Disposition::Terminated(process.pid()),
    );
    assert_eq!(kit.frame_allocator.allocated(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(1))]
fn failed_mapping_returns_the_frame() {
    let allocator = MockFrameAllocator::new(Kit::FRAMES);
    let mut address_space = MockAddressSpace::default();
    address_space.fail_mapping();

    let result = resolve_page_fault(
        &mut address_space,
        &allocator,
        virt(HEAP),
        PageFaultInfo::empty(),
        FaultPolicy::Permissive,
    );

    assert!(matches!(result, Err(FaultError::Exhausted(_))));
    assert_eq!(allocator.allocated(), 0);
    assert_eq!(address_space.page_count(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(1))]
fn remapping_a_present_page_is_not_exhaustion() {
    let allocator = MockFrameAllocator::new(Kit::FRAMES);
    let mut address_space = MockAddressSpace::user();
    let pages_before = address_space.page_count();

    let result = resolve_page_fault(
        &mut address_space,
        &allocator,
        virt(CODE + 8),
        PageFaultInfo::PRESENT | PageFaultInfo::WRITE | PageFaultInfo::USER,
        FaultPolicy::Permissive,
    );

    let error = result.unwrap_err();
    assert_eq!(error, FaultError::MapFailed(Error::InvalidArgument));
    assert!(!error.to_string().contains("out of memory"));
    assert_eq!(allocator.allocated(), 0);
    assert_eq!(address_space.page_count(), pages_before);
}

#[rstest]
#[timeout(Duration::from_secs(1))]
fn protection_fault_kills_the_process_even_when_exhaustion_halts() {
    let kit = Kit::new(1);
    let process = kit.process(0);
    let config = TrapConfig::default();
    assert_eq!(config.on_exhaustion, ExhaustionPolicy::Halt);
    let dispatcher = kit.dispatcher(&NoSyscalls, config);

    let code_page = Page::containing(virt(CODE));
    let code = process.address_space().mapping(code_page);

    let (mut frame, fault_address) = page_fault(
        CODE,
        PageFaultInfo::PRESENT | PageFaultInfo::WRITE | PageFaultInfo::USER,
    );
    assert_eq!(
        dispatcher.handle_trap(&mut frame, fault_address),
        Disposition::Terminated(process.pid()),
    );

    assert_eq!(process.address_space().mapping(code_page), code);
    assert_eq!(kit.frame_allocator.allocated(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(1))]
fn exhaustion_kills_the_process() {
    let kit = Kit::with_frames(1, 0);
    let process = kit.process(0);
    let config = TrapConfig {
        on_exhaustion: ExhaustionPolicy::KillProcess,
        ..TrapConfig::default()
    };
    let dispatcher = kit.dispatcher(&NoSyscalls, config);

    let (mut frame, fault_address) = page_fault(HEAP, PageFaultInfo::USER);
    assert_eq!(
        dispatcher.handle_trap(&mut frame, fault_address),
        Disposition::Terminated(process.pid()),
    );
}

#[rstest]
#[should_panic(expected = "out of memory")]
#[timeout(Duration::from_secs(1))]
fn exhaustion_halts() {
    let kit = Kit::with_frames(1, 0);
    let dispatcher = kit.dispatcher(&NoSyscalls, TrapConfig::default());

    let (mut frame, fault_address) = page_fault(HEAP, PageFaultInfo::USER);
    dispatcher.handle_trap(&mut frame, fault_address);
}

#[rstest]
#[should_panic(expected = "unexpected trap")]
#[timeout(Duration::from_secs(1))]
fn page_fault_without_process() {
    let kit = Kit::new(0);
    let dispatcher = kit.dispatcher(&NoSyscalls, TrapConfig::default());

    let mut frame = mock::kernel_frame(Trap::PageFault.into(), 0);
    dispatcher.handle_trap(&mut frame, virt(HEAP));
}

#![allow(dead_code)]

use std::{
    cell::Cell,
    collections::{
        HashMap,
        HashSet,
    },
    panic,
    sync::{
        Condvar,
        Mutex,
        atomic::{
            AtomicBool,
            AtomicUsize,
            Ordering,
        },
    },
};

use ku::{
    error::{
        Error::{
            InvalidArgument,
            NoFrame,
            NoPage,
        },
        Result,
    },
    memory::{
        Frame,
        PAGE_SIZE,
        Page,
        PageTableFlags,
        Phys,
        USER_RW,
        USER_RX,
        Virt,
    },
    process::{
        ExitCode,
        MiniContext,
        Pid,
        State,
        Trap,
    },
    sync::{
        IrqSpinlock,
        IrqSpinlockGuard,
        Spinlock,
    },
};

use kernel::{
    TrapConfig,
    memory::{
        AddressSpace,
        FrameAllocator,
    },
    process::{
        Process,
        Scheduler,
        TrapState,
    },
    smp::{
        CpuId,
        InterruptController,
    },
    time::Clock,
    trap::{
        Collaborators,
        Devices,
        Dispatcher,
        Disposition,
        ModeContext,
        SyscallTable,
        TrapFrame,
    },
};

/// Начало кода каждого тестового процесса.
pub const CODE: usize = 0x40_0000;

/// Адрес обработчика будильника внутри кода.
pub const HANDLER: usize = CODE + PAGE_SIZE + 0x10;

/// Вершина стека пользователя каждого тестового процесса.
pub const STACK_TOP: usize = 0x80_0000;

/// Количество отображённых страниц стека пользователя.
pub const STACK_PAGES: usize = 2;

/// Дно отображённого стека пользователя.
pub const STACK_BOTTOM: usize = STACK_TOP - STACK_PAGES * PAGE_SIZE;

pub fn virt(address: usize) -> Virt {
    Virt::new(address).unwrap()
}

pub fn user_frame(
    trap: Trap,
    rip: usize,
    rsp: usize,
) -> TrapFrame {
    TrapFrame::new(
        trap.into(),
        0,
        ModeContext::user(MiniContext::new(virt(rip), virt(rsp))),
    )
}

pub fn kernel_frame(
    number: usize,
    error_code: usize,
) -> TrapFrame {
    TrapFrame::new(
        number,
        error_code,
        ModeContext::kernel(MiniContext::new(virt(0xFFFF_8000_0010_0000), virt(0xFFFF_8000_0020_0000))),
    )
}

#[derive(Debug, Default)]
pub struct MockAddressSpace {
    pages: HashMap<Page, (Frame, PageTableFlags)>,
    words: HashMap<Virt, usize>,
    fail_mapping: bool,
}

impl MockAddressSpace {
    /// Адресное пространство с отображёнными кодом и стеком пользовательского процесса.
    pub fn user() -> Self {
        let mut address_space = Self::default();

        for (index, page) in [CODE, CODE + PAGE_SIZE].into_iter().enumerate() {
            address_space.insert(page, index, USER_RX);
        }

        for index in 0 .. STACK_PAGES {
            address_space.insert(STACK_BOTTOM + index * PAGE_SIZE, 0x100 + index, USER_RW);
        }

        address_space
    }

    pub fn insert(
        &mut self,
        address: usize,
        frame_index: usize,
        flags: PageTableFlags,
    ) {
        let page = Page::new(virt(address)).unwrap();
        let frame = Frame::new(Phys::new(frame_index * PAGE_SIZE).unwrap()).unwrap();
        self.pages.insert(page, (frame, flags));
    }

    pub fn mapping(
        &self,
        page: Page,
    ) -> Option<(Frame, PageTableFlags)> {
        self.pages.get(&page).copied()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn read_word(
        &self,
        address: Virt,
    ) -> Option<usize> {
        self.words.get(&address).copied()
    }

    pub fn fail_mapping(&mut self) {
        self.fail_mapping = true;
    }
}

impl AddressSpace for MockAddressSpace {
    fn map_page(
        &mut self,
        page: Page,
        frame: Frame,
        flags: PageTableFlags,
    ) -> Result<()> {
        if self.fail_mapping {
            return Err(NoFrame);
        }

        if self.pages.contains_key(&page) {
            return Err(InvalidArgument);
        }

        self.pages.insert(page, (frame, flags));

        Ok(())
    }

    fn flags(
        &self,
        page: Page,
    ) -> Option<PageTableFlags> {
        self.pages.get(&page).map(|&(_, flags)| flags)
    }

    fn write_word(
        &mut self,
        address: Virt,
        value: usize,
    ) -> Result<()> {
        self.pages.get(&Page::containing(address)).ok_or(NoPage)?;
        self.words.insert(address, value);
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockProcess {
    pid: Pid,
    state: Spinlock<State>,
    trap_state: TrapState,
    address_space: IrqSpinlock<MockAddressSpace>,
}

impl MockProcess {
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            state: Spinlock::new(State::Running),
            trap_state: TrapState::default(),
            address_space: IrqSpinlock::new(MockAddressSpace::user()),
        }
    }

    pub fn set_state(
        &self,
        state: State,
    ) {
        *self.state.lock() = state;
    }
}

impl Process for MockProcess {
    type AddressSpace = MockAddressSpace;

    fn pid(&self) -> Pid {
        self.pid
    }

    fn state(&self) -> State {
        *self.state.lock()
    }

    fn trap_state(&self) -> &TrapState {
        &self.trap_state
    }

    fn address_space(&self) -> IrqSpinlockGuard<'_, MockAddressSpace> {
        self.address_space.lock()
    }

    fn try_address_space(&self) -> Option<IrqSpinlockGuard<'_, MockAddressSpace>> {
        self.address_space.try_lock()
    }
}

thread_local! {
    /// Процессор, на котором якобы работает текущий поток теста.
    static CPU: Cell<CpuId> = const { Cell::new(0) };
}

pub fn set_cpu(cpu: CpuId) {
    CPU.with(|current| current.set(cpu));
}

/// Значение паники, которой тестовый [`Scheduler::run()`] заменяет невозврат управления.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Rescheduled(pub CpuId);

#[derive(Debug)]
pub struct MockScheduler {
    processes: Vec<MockProcess>,
    running: Mutex<HashMap<CpuId, usize>>,
    yields: AtomicUsize,
    exits: Mutex<Vec<(Pid, ExitCode)>>,
    kill_on_yield: AtomicBool,
    generation: Mutex<u64>,
    woken: Condvar,
    sleeps: AtomicUsize,
    wakeups: AtomicUsize,
}

impl MockScheduler {
    /// Создаёт `count` процессов, процесс `i` работает на процессоре `i`.
    pub fn new(count: usize) -> Self {
        Self {
            processes: (0 .. count).map(|index| MockProcess::new(Pid::new(index + 1))).collect(),
            running: Mutex::new((0 .. count).map(|index| (index as CpuId, index)).collect()),
            yields: AtomicUsize::new(0),
            exits: Mutex::new(Vec::new()),
            kill_on_yield: AtomicBool::new(false),
            generation: Mutex::new(0),
            woken: Condvar::new(),
            sleeps: AtomicUsize::new(0),
            wakeups: AtomicUsize::new(0),
        }
    }

    pub fn process(
        &self,
        index: usize,
    ) -> &MockProcess {
        &self.processes[index]
    }

    pub fn stop(
        &self,
        cpu: CpuId,
    ) {
        self.running.lock().unwrap().remove(&cpu);
    }

    pub fn yields(&self) -> usize {
        self.yields.load(Ordering::Relaxed)
    }

    pub fn exits(&self) -> Vec<(Pid, ExitCode)> {
        self.exits.lock().unwrap().clone()
    }

    /// Процесс убивают, пока он отдал процессор.
    pub fn kill_on_yield(&self) {
        self.kill_on_yield.store(true, Ordering::Relaxed);
    }

    /// Сколько раз процессы засыпали в [`Scheduler::sleep()`].
    pub fn sleeps(&self) -> usize {
        self.sleeps.load(Ordering::Acquire)
    }

    /// Количество вызовов [`Scheduler::wakeup()`].
    pub fn wakeups(&self) -> usize {
        self.wakeups.load(Ordering::Acquire)
    }

    fn wake_all(&self) {
        *self.generation.lock().unwrap() += 1;
        self.woken.notify_all();
    }
}

impl Scheduler for MockScheduler {
    type Process = MockProcess;

    fn current_cpu(&self) -> CpuId {
        CPU.with(Cell::get)
    }

    fn current_process(
        &self,
        cpu: CpuId,
    ) -> Option<&MockProcess> {
        let index = *self.running.lock().unwrap().get(&cpu)?;
        Some(&self.processes[index])
    }

    fn sched_yield(
        &self,
        cpu: CpuId,
    ) {
        self.yields.fetch_add(1, Ordering::Relaxed);

        if self.kill_on_yield.load(Ordering::Relaxed) &&
            let Some(process) = self.current_process(cpu)
        {
            self.kill(process);
        }
    }

    fn sleep(
        &self,
        cpu: CpuId,
        ticks: IrqSpinlockGuard<'_, u64>,
    ) {
        let mut generation = self.generation.lock().unwrap();
        let start = *generation;

        self.sleeps.fetch_add(1, Ordering::AcqRel);
        drop(ticks);

        if self.kill_on_yield.load(Ordering::Relaxed) &&
            let Some(process) = self.current_process(cpu)
        {
            drop(generation);
            self.kill(process);
            return;
        }

        while *generation == start {
            generation = self.woken.wait(generation).unwrap();
        }
    }

    fn wakeup(
        &self,
        _ticks: u64,
    ) {
        self.wakeups.fetch_add(1, Ordering::AcqRel);
        self.wake_all();
    }

    fn kill(
        &self,
        process: &MockProcess,
    ) {
        process.trap_state().kill();
        self.wake_all();
    }

    fn exit(
        &self,
        cpu: CpuId,
        process: &MockProcess,
        code: ExitCode,
    ) {
        self.exits.lock().unwrap().push((process.pid(), code));
        self.stop(cpu);
    }

    fn run(
        &self,
        cpu: CpuId,
    ) -> ! {
        panic::panic_any(Rescheduled(cpu));
    }
}

#[derive(Debug)]
pub struct MockFrameAllocator {
    state: Mutex<AllocatorState>,
}

#[derive(Debug, Default)]
struct AllocatorState {
    free: Vec<Frame>,
    next: usize,
    limit: usize,
    allocated: usize,
    zeroed: HashSet<Frame>,
}

impl MockFrameAllocator {
    /// Первый выдаваемый фрейм, далеко от фреймов [`MockAddressSpace::user()`].
    const FIRST_FRAME: usize = 0x1000;

    pub fn new(limit: usize) -> Self {
        Self {
            state: Mutex::new(AllocatorState {
                limit,
                ..AllocatorState::default()
            }),
        }
    }

    /// Количество выделенных и не возвращённых фреймов.
    pub fn allocated(&self) -> usize {
        self.state.lock().unwrap().allocated
    }

    pub fn is_zeroed(
        &self,
        frame: Frame,
    ) -> bool {
        self.state.lock().unwrap().zeroed.contains(&frame)
    }
}

impl FrameAllocator for MockFrameAllocator {
    fn allocate(&self) -> Result<Frame> {
        let mut state = self.state.lock().unwrap();

        let frame = match state.free.pop() {
            Some(frame) => frame,
            None if state.next < state.limit => {
                let index = Self::FIRST_FRAME + state.next;
                state.next += 1;
                Frame::new(Phys::new(index * PAGE_SIZE)?)?
            },
            None => return Err(NoFrame),
        };

        state.allocated += 1;
        state.zeroed.remove(&frame);

        Ok(frame)
    }

    fn deallocate(
        &self,
        frame: Frame,
    ) {
        let mut state = self.state.lock().unwrap();
        state.allocated -= 1;
        state.free.push(frame);
    }

    fn zero(
        &self,
        frame: Frame,
    ) {
        self.state.lock().unwrap().zeroed.insert(frame);
    }
}

#[derive(Debug, Default)]
pub struct MockInterruptController {
    acknowledged: Mutex<HashMap<CpuId, usize>>,
}

impl MockInterruptController {
    pub fn acknowledged(
        &self,
        cpu: CpuId,
    ) -> usize {
        self.acknowledged.lock().unwrap().get(&cpu).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.acknowledged.lock().unwrap().values().sum()
    }
}

impl InterruptController for MockInterruptController {
    fn end_of_interrupt(
        &self,
        cpu: CpuId,
    ) {
        *self.acknowledged.lock().unwrap().entry(cpu).or_default() += 1;
    }
}

#[derive(Debug, Default)]
pub struct MockDevices {
    pub disk: AtomicUsize,
    pub keyboard: AtomicUsize,
    pub serial: AtomicUsize,
}

impl Devices for MockDevices {
    fn disk_interrupt(&self) {
        self.disk.fetch_add(1, Ordering::Relaxed);
    }

    fn keyboard_interrupt(&self) {
        self.keyboard.fetch_add(1, Ordering::Relaxed);
    }

    fn serial_interrupt(&self) {
        self.serial.fetch_add(1, Ordering::Relaxed);
    }
}

/// Все партнёры диспетчера.
pub struct Kit {
    pub scheduler: MockScheduler,
    pub frame_allocator: MockFrameAllocator,
    pub interrupt_controller: MockInterruptController,
    pub devices: MockDevices,
    pub clock: Clock,
}

impl Kit {
    /// Лимит фреймов аллокатора по умолчанию.
    pub const FRAMES: usize = 16;

    /// Создаёт `process_count` процессов, процесс `i` работает на процессоре `i`.
    pub fn new(process_count: usize) -> Self {
        Self::with_frames(process_count, Self::FRAMES)
    }

    pub fn with_frames(
        process_count: usize,
        frames: usize,
    ) -> Self {
        Self {
            scheduler: MockScheduler::new(process_count),
            frame_allocator: MockFrameAllocator::new(frames),
            interrupt_controller: MockInterruptController::default(),
            devices: MockDevices::default(),
            clock: Clock::new(TrapConfig::default().bootstrap_cpu),
        }
    }

    pub fn process(
        &self,
        index: usize,
    ) -> &MockProcess {
        self.scheduler.process(index)
    }

    pub fn dispatcher<'a>(
        &'a self,
        syscalls: &'a dyn SyscallTable<MockProcess>,
        config: TrapConfig,
    ) -> Dispatcher<'a, MockScheduler> {
        let collaborators = Collaborators {
            scheduler: &self.scheduler,
            frame_allocator: &self.frame_allocator,
            interrupt_controller: &self.interrupt_controller,
            devices: &self.devices,
            syscalls,
            clock: &self.clock,
        };

        Dispatcher::new(collaborators, config)
    }
}

/// Таблица системных вызовов, которая отвергает любой вызов.
pub struct NoSyscalls;

impl SyscallTable<MockProcess> for NoSyscalls {
    fn dispatch(
        &self,
        _cpu: CpuId,
        _process: &MockProcess,
        frame: &mut TrapFrame,
    ) -> Disposition {
        frame.set_syscall_result(Err(InvalidArgument));
        Disposition::Resume
    }
}

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use horizon_core::{
    AppLoader, ControlHandle, CpuEngine, Hardware, InitClock, LoaderError, LoaderFactory, Machine,
    ProgramImage, ResultStatus, Settings, System, SystemState, SHARED_PAGE_VADDR,
};
use horizon_ipc::RESULT_TIMEOUT;
use horizon_kernel::{KernelError, ThreadContext, COMMAND_BUFFER_OFFSET};
use horizon_memory::{GuestMemory, SparseMemory};
use horizon_service::{MediaType, ServiceError};
use horizon_timing::DEFAULT_MAX_SLICE_LENGTH;

const APP: &str = "/apps/game.3dsx";
const CODE: u32 = 0x0010_0000;
const STACK_TOP: u32 = 0x1000_0000;
const STACK_SIZE: u32 = 0x4000;
const PROGRAM_ID: u64 = 0x0004_0000_0000_1000;

#[derive(Clone)]
struct App {
    program_id: u64,
    system_mode: Result<u32, LoaderError>,
    image: Result<(), LoaderError>,
}

impl App {
    fn good(program_id: u64) -> Self {
        Self {
            program_id,
            system_mode: Ok(0),
            image: Ok(()),
        }
    }
}

impl AppLoader for App {
    fn load_kernel_system_mode(&mut self) -> Result<u32, LoaderError> {
        self.system_mode.clone()
    }

    fn read_program_id(&mut self) -> Result<u64, LoaderError> {
        Ok(self.program_id)
    }

    fn load(&mut self, memory: &mut SparseMemory) -> Result<ProgramImage, LoaderError> {
        self.image.clone()?;
        memory
            .map(CODE, 0x1000)
            .map_err(|err| LoaderError::Other(err.to_string()))?;
        Ok(ProgramImage {
            entry_point: CODE,
            stack_top: STACK_TOP,
            stack_size: STACK_SIZE,
            main_thread_priority: 0x30,
        })
    }
}

#[derive(Default)]
struct Library {
    apps: HashMap<PathBuf, App>,
    opened: Rc<RefCell<Vec<PathBuf>>>,
}

impl LoaderFactory for Library {
    fn get_loader(&mut self, path: &Path) -> Option<Box<dyn AppLoader>> {
        self.opened.borrow_mut().push(path.to_path_buf());
        let app = self.apps.get(path)?.clone();
        Some(Box::new(app))
    }
}

type Slice = Box<dyn FnMut(&mut Machine, &mut ThreadContext)>;

#[derive(Default)]
struct CpuLog {
    runs: u32,
    loaded_pcs: Vec<u32>,
    reschedule_requests: u32,
}

/// Runs a script once per slice, then burns whatever is left of the slice.
struct ScriptedCpu {
    regs: ThreadContext,
    slice: Slice,
    log: Rc<RefCell<CpuLog>>,
}

impl CpuEngine for ScriptedCpu {
    fn run(&mut self, machine: &mut Machine) {
        self.log.borrow_mut().runs += 1;
        (self.slice)(machine, &mut self.regs);
        let left = machine.timing.downcount();
        if left > 0 {
            machine.timing.add_ticks(left as u64);
        }
    }

    fn prepare_reschedule(&mut self) {
        self.log.borrow_mut().reschedule_requests += 1;
    }

    fn save_context(&self, context: &mut ThreadContext) {
        *context = self.regs;
    }

    fn load_context(&mut self, context: &ThreadContext) {
        self.regs = *context;
        self.log.borrow_mut().loaded_pcs.push(context.pc);
    }
}

struct CountingHardware(Rc<Cell<u64>>);

impl Hardware for CountingHardware {
    fn update(&mut self, elapsed_cycles: u64) {
        self.0.set(self.0.get() + elapsed_cycles);
    }
}

fn settings() -> Settings {
    Settings {
        init_clock: InitClock::FixedTime,
        sdmc_root: PathBuf::from("/sd"),
        nand_root: PathBuf::from("/nand"),
        ..Settings::default()
    }
}

struct Harness {
    system: System,
    cpu: Rc<RefCell<CpuLog>>,
    hardware: Rc<Cell<u64>>,
    opened: Rc<RefCell<Vec<PathBuf>>>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn harness_with(
    apps: Vec<(PathBuf, App)>,
    slice: impl FnMut(&mut Machine, &mut ThreadContext) + 'static,
) -> Harness {
    init_tracing();
    let library = Library {
        apps: apps.into_iter().collect(),
        ..Library::default()
    };
    let opened = library.opened.clone();
    let cpu = Rc::new(RefCell::new(CpuLog::default()));
    let hardware = Rc::new(Cell::new(0));
    let system = System::new(settings(), Box::new(library))
        .with_cpu(Box::new(ScriptedCpu {
            regs: ThreadContext::default(),
            slice: Box::new(slice),
            log: cpu.clone(),
        }))
        .with_hardware(Box::new(CountingHardware(hardware.clone())));
    Harness {
        system,
        cpu,
        hardware,
        opened,
    }
}

fn booted(slice: impl FnMut(&mut Machine, &mut ThreadContext) + 'static) -> Harness {
    let mut harness = harness_with(vec![(PathBuf::from(APP), App::good(PROGRAM_ID))], slice);
    assert_eq!(harness.system.load(Path::new(APP)), ResultStatus::Success);
    harness
}

fn current_program_id(system: &System) -> u64 {
    let machine = system.machine().unwrap();
    let pid = machine.kernel.current_process().unwrap();
    machine.kernel.process(pid).unwrap().program_id
}

#[test]
fn first_iteration_idles_then_the_main_thread_runs() {
    let mut h = booted(|_, _| {});
    assert_eq!(h.system.state(), SystemState::Running);

    assert_eq!(h.system.run_loop(), ResultStatus::Success);
    assert_eq!(h.cpu.borrow().runs, 0);
    assert_eq!(h.cpu.borrow().reschedule_requests, 1);
    assert_eq!(h.cpu.borrow().loaded_pcs, vec![CODE]);
    let machine = h.system.machine().unwrap();
    let main = machine.kernel.current_thread().unwrap();
    assert_eq!(machine.kernel.thread(main).unwrap().name, "main");
    // The boot-time clock update fired and was published.
    assert_eq!(machine.memory.read_u32_le(SHARED_PAGE_VADDR).unwrap(), 1);

    assert_eq!(h.system.run_loop(), ResultStatus::Success);
    assert_eq!(h.cpu.borrow().runs, 1);
    let ticks = h.system.machine().unwrap().timing.ticks();
    assert_eq!(ticks, DEFAULT_MAX_SLICE_LENGTH as u64);
    assert_eq!(h.hardware.get(), ticks);
}

#[test]
fn timed_out_wait_resumes_with_the_timeout_result() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = seen.clone();
    let mut step = 0;
    let mut h = booted(move |machine, regs| {
        match step {
            0 => {
                assert!(horizon_core::svc::call_svc(machine, 0x17, regs));
                regs.cpu_registers[0] = regs.cpu_registers[1];
                regs.cpu_registers[2] = 1_000_000;
                regs.cpu_registers[3] = 0;
                assert!(horizon_core::svc::call_svc(machine, 0x24, regs));
            }
            _ => record.borrow_mut().push(regs.cpu_registers[0]),
        }
        step += 1;
    });

    // Schedule main, block in the wait, idle until the timeout, run again.
    for _ in 0..4 {
        assert_eq!(h.system.run_loop(), ResultStatus::Success);
    }
    assert_eq!(h.cpu.borrow().runs, 2);
    assert_eq!(*seen.borrow(), vec![RESULT_TIMEOUT.raw()]);
    assert!(h.system.machine().unwrap().timing.idled_cycles() > 0);
}

#[test]
fn malformed_request_halts_emulation() {
    let mut h = booted(|machine, regs| {
        let name = STACK_TOP - 0x100;
        machine.memory.write_from(name, b"srv:\0").unwrap();
        regs.cpu_registers[1] = name;
        assert!(horizon_core::svc::call_svc(machine, 0x2D, regs));
        assert_eq!(regs.cpu_registers[0], 0);

        let thread = machine.kernel.current_thread().unwrap();
        let tls = machine.kernel.thread(thread).unwrap().tls_address;
        // Claims more parameter words than a command buffer holds.
        machine
            .memory
            .write_u32_le(tls + COMMAND_BUFFER_OFFSET, 0x0001_0FFF)
            .unwrap();
        regs.cpu_registers[0] = regs.cpu_registers[1];
        assert!(horizon_core::svc::call_svc(machine, 0x32, regs));
    });

    assert_eq!(h.system.run_loop(), ResultStatus::Success);
    assert_eq!(h.system.run_loop(), ResultStatus::ErrorHalted);
    let halted = h.system.machine().unwrap().halted().cloned();
    assert!(matches!(
        halted,
        Some(ServiceError::Kernel(KernelError::Ipc(_)))
    ));
}

#[test]
fn shutdown_requested_from_another_thread_is_honoured_once() {
    let mut h = booted(|_, _| {});
    let control: ControlHandle = h.system.control();
    std::thread::spawn(move || control.request_shutdown())
        .join()
        .unwrap();
    assert_eq!(h.system.state(), SystemState::ShutdownRequested);
    assert_eq!(h.system.run_loop(), ResultStatus::ShutdownRequested);
    assert_eq!(h.system.run_loop(), ResultStatus::Success);

    h.system.shutdown();
    assert_eq!(h.system.state(), SystemState::NotRunning);
    assert_eq!(h.system.run_loop(), ResultStatus::ErrorNotInitialized);
}

#[test]
fn paused_iterations_leave_the_clock_alone() {
    let mut h = booted(|_, _| {});
    assert_eq!(h.system.run_loop(), ResultStatus::Success);
    let control = h.system.control();
    control.set_paused(true);
    let before = h.system.machine().unwrap().timing.ticks();
    for _ in 0..3 {
        assert_eq!(h.system.run_loop(), ResultStatus::Paused);
    }
    assert_eq!(h.system.machine().unwrap().timing.ticks(), before);
    control.set_paused(false);
    assert_eq!(h.system.run_loop(), ResultStatus::Success);
    assert_eq!(h.cpu.borrow().runs, 1);
}

#[test]
fn jump_loads_the_title_from_its_media_root() {
    let title_id = 0x0004_0000_0012_3400;
    let title_path = PathBuf::from("/sd/title/00040000/00123400/content/00000000.app");
    let mut h = harness_with(
        vec![
            (PathBuf::from(APP), App::good(PROGRAM_ID)),
            (title_path.clone(), App::good(title_id)),
        ],
        |_, _| {},
    );
    assert_eq!(h.system.load(Path::new(APP)), ResultStatus::Success);

    h.system.control().request_jump(MediaType::Sdmc, title_id);
    assert_eq!(h.system.run_loop(), ResultStatus::Success);
    assert_eq!(current_program_id(&h.system), title_id);
    assert_eq!(h.system.app_path(), Some(title_path.as_path()));
    assert_eq!(*h.opened.borrow(), vec![PathBuf::from(APP), title_path.clone()]);

    // Title id zero reloads whatever is running.
    h.system.control().request_jump(MediaType::Nand, 0);
    assert_eq!(h.system.run_loop(), ResultStatus::Success);
    assert_eq!(h.opened.borrow().last(), Some(&title_path));
    assert_eq!(current_program_id(&h.system), title_id);
}

#[test]
fn unresolvable_jump_keeps_the_current_title() {
    let mut h = booted(|_, _| {});
    h.system.control().request_jump(MediaType::GameCard, 0x0004_0000_0000_2000);
    assert_eq!(h.system.run_loop(), ResultStatus::ErrorGetLoader);
    assert_eq!(h.system.state(), SystemState::Running);
    assert_eq!(current_program_id(&h.system), PROGRAM_ID);
}

const TITLE_ID: u64 = 0x0004_0000_0012_3400;
const TITLE_PATH: &str = "/sd/title/00040000/00123400/content/00000000.app";

fn with_installed_title() -> Harness {
    let mut harness = harness_with(
        vec![
            (PathBuf::from(APP), App::good(PROGRAM_ID)),
            (PathBuf::from(TITLE_PATH), App::good(TITLE_ID)),
        ],
        |_, _| {},
    );
    assert_eq!(harness.system.load(Path::new(APP)), ResultStatus::Success);
    harness
}

#[test]
fn jump_and_shutdown_in_one_iteration_are_both_honoured_in_turn() {
    let mut h = with_installed_title();
    let control = h.system.control();
    control.request_jump(MediaType::Sdmc, TITLE_ID);
    control.request_shutdown();

    assert_eq!(h.system.run_loop(), ResultStatus::Success);
    assert_eq!(current_program_id(&h.system), TITLE_ID);
    assert_eq!(h.system.state(), SystemState::ShutdownRequested);
    assert_eq!(h.system.run_loop(), ResultStatus::ShutdownRequested);
    assert_eq!(h.system.run_loop(), ResultStatus::Success);
    assert_eq!(current_program_id(&h.system), TITLE_ID);
}

#[test]
fn requests_do_not_outlive_the_session_they_were_made_for() {
    let mut h = with_installed_title();
    let control = h.system.control();
    control.request_jump(MediaType::Sdmc, TITLE_ID);
    control.request_shutdown();

    h.system.shutdown();
    assert_eq!(h.system.state(), SystemState::NotRunning);
    assert_eq!(h.system.load(Path::new(APP)), ResultStatus::Success);
    assert_eq!(h.system.state(), SystemState::Running);
    for _ in 0..2 {
        assert_eq!(h.system.run_loop(), ResultStatus::Success);
        assert_eq!(current_program_id(&h.system), PROGRAM_ID);
        assert_eq!(h.system.app_path(), Some(Path::new(APP)));
    }
}

#[test]
fn loading_over_a_running_title_discards_its_pending_jump() {
    let mut h = with_installed_title();
    h.system.control().request_jump(MediaType::Sdmc, TITLE_ID);
    assert_eq!(h.system.load(Path::new(APP)), ResultStatus::Success);
    assert_eq!(h.system.run_loop(), ResultStatus::Success);
    assert_eq!(current_program_id(&h.system), PROGRAM_ID);
    assert_eq!(*h.opened.borrow(), vec![PathBuf::from(APP), PathBuf::from(APP)]);
}

#[test]
fn load_failures_are_distinct_and_leave_nothing_running() {
    let encrypted = App {
        image: Err(LoaderError::Encrypted),
        ..App::good(1)
    };
    let malformed = App {
        image: Err(LoaderError::InvalidFormat),
        ..App::good(2)
    };
    let no_mode = App {
        system_mode: Err(LoaderError::Other("no exheader".into())),
        ..App::good(3)
    };
    let mut h = harness_with(
        vec![
            (PathBuf::from("/encrypted"), encrypted),
            (PathBuf::from("/malformed"), malformed),
            (PathBuf::from("/no_mode"), no_mode),
        ],
        |_, _| {},
    );

    let cases = [
        ("/missing", ResultStatus::ErrorGetLoader),
        ("/encrypted", ResultStatus::ErrorLoaderEncrypted),
        ("/malformed", ResultStatus::ErrorLoaderInvalidFormat),
        ("/no_mode", ResultStatus::ErrorSystemMode),
    ];
    for (path, status) in cases {
        assert_eq!(h.system.load(Path::new(path)), status, "{path}");
        assert_eq!(h.system.state(), SystemState::NotRunning, "{path}");
    }
    assert_eq!(h.system.run_loop(), ResultStatus::ErrorNotInitialized);
}

#[test]
fn run_loop_without_an_engine_is_not_initialised() {
    let library = Library {
        apps: [(PathBuf::from(APP), App::good(PROGRAM_ID))].into_iter().collect(),
        ..Library::default()
    };
    let mut system = System::new(settings(), Box::new(library));
    assert_eq!(system.load(Path::new(APP)), ResultStatus::Success);
    assert_eq!(system.run_loop(), ResultStatus::ErrorNotInitialized);
}

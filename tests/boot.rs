//! Whole-system scenarios: a scripted guest drives services through the kernel call surface and
//! the run loop reacts to what the services ask for.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use horizon::ipc::{Header, RESULT_SUCCESS};
use horizon::kernel::{ThreadContext, COMMAND_BUFFER_OFFSET};
use horizon::memory::{GuestMemory, SparseMemory};
use horizon::{
    svc, AppLoader, CpuEngine, LoaderError, LoaderFactory, Machine, ProgramImage, ResultStatus,
    Settings, System, SystemState,
};

const LAUNCHER: &str = "/apps/launcher.cxi";
const LAUNCHER_ID: u64 = 0x0004_0010_0000_8202;
const GAME_ID: u64 = 0x0004_0000_0012_3400;
const GAME_PATH: &str = "/sd/title/00040000/00123400/content/00000000.app";
const CODE: u32 = 0x0010_0000;
const STACK_TOP: u32 = 0x1000_0000;
const NAME_ADDR: u32 = STACK_TOP - 0x100;

struct Title(u64);

impl AppLoader for Title {
    fn load_kernel_system_mode(&mut self) -> Result<u32, LoaderError> {
        Ok(0)
    }

    fn read_program_id(&mut self) -> Result<u64, LoaderError> {
        Ok(self.0)
    }

    fn load(&mut self, memory: &mut SparseMemory) -> Result<ProgramImage, LoaderError> {
        memory
            .map(CODE, 0x1000)
            .map_err(|err| LoaderError::Other(err.to_string()))?;
        Ok(ProgramImage {
            entry_point: CODE,
            stack_top: STACK_TOP,
            stack_size: 0x1000,
            main_thread_priority: 0x30,
        })
    }
}

struct Installed(HashMap<PathBuf, u64>);

impl LoaderFactory for Installed {
    fn get_loader(&mut self, path: &Path) -> Option<Box<dyn AppLoader>> {
        let id = *self.0.get(path)?;
        Some(Box::new(Title(id)))
    }
}

type Guest = Box<dyn FnMut(&mut Machine, &mut ThreadContext)>;

/// Runs the guest script once per slice on behalf of whichever thread is current.
struct Interpreter {
    regs: ThreadContext,
    guest: Guest,
}

impl CpuEngine for Interpreter {
    fn run(&mut self, machine: &mut Machine) {
        (self.guest)(machine, &mut self.regs);
        let left = machine.timing.downcount();
        if left > 0 {
            machine.timing.add_ticks(left as u64);
        }
    }

    fn prepare_reschedule(&mut self) {}

    fn save_context(&self, context: &mut ThreadContext) {
        *context = self.regs;
    }

    fn load_context(&mut self, context: &ThreadContext) {
        self.regs = *context;
    }
}

fn system(guest: impl FnMut(&mut Machine, &mut ThreadContext) + 'static) -> System {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
    let settings: Settings = serde_json::from_value(serde_json::json!({
        "init_clock": "fixed_time",
        "init_time": 946_684_800,
        "sdmc_root": "/sd",
        "nand_root": "/nand",
    }))
    .unwrap();
    let titles = [
        (PathBuf::from(LAUNCHER), LAUNCHER_ID),
        (PathBuf::from(GAME_PATH), GAME_ID),
    ];
    let mut system = System::new(settings, Box::new(Installed(titles.into_iter().collect())))
        .with_cpu(Box::new(Interpreter {
            regs: ThreadContext::default(),
            guest: Box::new(guest),
        }));
    assert_eq!(system.load(Path::new(LAUNCHER)), ResultStatus::Success);
    system
}

fn command_buffer(machine: &Machine) -> u32 {
    let thread = machine.kernel.current_thread().unwrap();
    machine.kernel.thread(thread).unwrap().tls_address + COMMAND_BUFFER_OFFSET
}

/// Writes `words` into the command buffer and issues SendSyncRequest on `handle`.
fn request(
    machine: &mut Machine,
    regs: &mut ThreadContext,
    handle: u32,
    words: &[u32],
) -> Vec<u32> {
    let cmd = command_buffer(machine);
    machine.memory.write_words(cmd, words).unwrap();
    regs.cpu_registers[0] = handle;
    assert!(svc::call_svc(machine, 0x32, regs));
    assert_eq!(regs.cpu_registers[0], RESULT_SUCCESS.raw());
    let mut reply = vec![0; 4];
    machine.memory.read_words(cmd, &mut reply).unwrap();
    reply
}

/// ConnectToPort("srv:") followed by GetServiceHandle(`name`).
fn open_service(machine: &mut Machine, regs: &mut ThreadContext, name: &[u8; 4]) -> u32 {
    machine.memory.write_from(NAME_ADDR, b"srv:\0").unwrap();
    regs.cpu_registers[1] = NAME_ADDR;
    assert!(svc::call_svc(machine, 0x2D, regs));
    assert_eq!(regs.cpu_registers[0], RESULT_SUCCESS.raw());
    let srv = regs.cpu_registers[1];

    let get_service_handle = [
        Header::new(0x5, 4, 0).raw(),
        u32::from_le_bytes(*name),
        0,
        4,
        0,
    ];
    let reply = request(machine, regs, srv, &get_service_handle);
    assert_eq!(reply[1], RESULT_SUCCESS.raw());
    reply[3]
}

#[test]
fn launch_title_from_the_guest_jumps_to_the_installed_title() {
    let mut launched = false;
    let mut system = system(move |machine, regs| {
        if launched {
            return;
        }
        launched = true;
        let ns = open_service(machine, regs, b"ns:s");
        let launch = [
            Header::new(0x2, 3, 0).raw(),
            GAME_ID as u32,
            (GAME_ID >> 32) as u32,
            0,
        ];
        let reply = request(machine, regs, ns, &launch);
        assert_eq!(reply[0], Header::new(0x2, 2, 0).raw());
        assert_eq!(reply[1], RESULT_SUCCESS.raw());
    });

    // Idle into the main thread, then run the script that asks for the launch.
    assert_eq!(system.run_loop(), ResultStatus::Success);
    assert_eq!(system.app_path(), Some(Path::new(LAUNCHER)));
    assert_eq!(system.run_loop(), ResultStatus::Success);
    assert_eq!(system.app_path(), Some(Path::new(GAME_PATH)));
    assert_eq!(system.state(), SystemState::Running);

    let machine = system.machine().unwrap();
    let pid = machine.kernel.current_process().unwrap();
    assert_eq!(machine.kernel.process(pid).unwrap().program_id, GAME_ID);
    assert_eq!(machine.timing.ticks(), 0);
}

#[test]
fn shutdown_async_ends_the_run_loop() {
    let mut system = system(|machine, regs| {
        let ns = open_service(machine, regs, b"ns:s");
        let reply = request(machine, regs, ns, &[Header::new(0xE, 0, 0).raw()]);
        assert_eq!(reply[1], RESULT_SUCCESS.raw());
    });
    assert_eq!(system.run_loop(), ResultStatus::Success);
    assert_eq!(system.run_loop(), ResultStatus::ShutdownRequested);
    system.shutdown();
    assert_eq!(system.state(), SystemState::NotRunning);
}

#[test]
fn idle_guest_sees_the_hourly_clock_refresh() {
    let mut waited = false;
    let mut system = system(move |machine, regs| {
        if waited {
            return;
        }
        waited = true;
        // An event nobody signals, waited on forever.
        regs.cpu_registers[1] = 0;
        assert!(svc::call_svc(machine, 0x17, regs));
        regs.cpu_registers[0] = regs.cpu_registers[1];
        regs.cpu_registers[2] = u32::MAX;
        regs.cpu_registers[3] = u32::MAX;
        assert!(svc::call_svc(machine, 0x24, regs));
    });

    assert_eq!(system.run_loop(), ResultStatus::Success);
    assert_eq!(system.run_loop(), ResultStatus::Success);
    let hour = horizon::timing::ms_to_cycles(3_600_000);
    assert!(system.machine().unwrap().timing.ticks() < hour);

    // Nothing is runnable, so the clock jumps straight to the refresh.
    assert_eq!(system.run_loop(), ResultStatus::Success);
    let machine = system.machine().unwrap();
    assert_eq!(machine.timing.ticks(), hour);
    let page = horizon::SHARED_PAGE_VADDR;
    assert_eq!(machine.memory.read_u32_le(page).unwrap(), 2);
    assert_eq!(
        machine.memory.read_u64_le(page + 0x20).unwrap(),
        horizon::console_time_ms(946_684_800_000) + 3_600_000
    );
    assert_eq!(machine.memory.read_u64_le(page + 0x28).unwrap(), hour);
}

use horizon_ipc::ResultCode;

use crate::object::ObjectId;
use crate::process::ProcessId;

pub const PRIORITY_LEVELS: usize = 64;
pub const THREAD_PRIO_HIGHEST: u32 = 0;
/// Highest priority a user-mode application may request.
pub const THREAD_PRIO_USER_HIGHEST: u32 = 24;
pub const THREAD_PRIO_LOWEST: u32 = 63;

/// ARM user mode.
const CPSR_USER_MODE: u32 = 0x10;
const CPSR_THUMB: u32 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitKind {
    Sleep,
    SynchAny,
    SynchAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadStatus {
    Ready,
    Running,
    Waiting(WaitKind),
    /// Created but not started.
    Dormant,
    Dead,
}

/// Guest register state saved across context switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadContext {
    pub cpu_registers: [u32; 13],
    pub sp: u32,
    pub lr: u32,
    pub pc: u32,
    pub cpsr: u32,
    pub fpscr: u32,
}

impl ThreadContext {
    pub fn new(entry_point: u32, stack_top: u32, arg: u32) -> Self {
        let mut ctx = Self {
            sp: stack_top,
            pc: entry_point & !1,
            cpsr: CPSR_USER_MODE,
            ..Self::default()
        };
        if entry_point & 1 != 0 {
            ctx.cpsr |= CPSR_THUMB;
        }
        ctx.cpu_registers[0] = arg;
        ctx
    }

    /// Writes a kernel-call result into r0 and, when present, an output word into r1.
    pub fn set_return(&mut self, result: ResultCode, output: Option<u32>) {
        self.cpu_registers[0] = result.raw();
        if let Some(output) = output {
            self.cpu_registers[1] = output;
        }
    }
}

#[derive(Debug)]
pub struct Thread {
    pub thread_id: u32,
    pub name: String,
    pub owner: ProcessId,
    pub priority: u32,
    pub nominal_priority: u32,
    pub status: ThreadStatus,
    pub context: ThreadContext,
    pub entry_point: u32,
    pub stack_top: u32,
    pub tls_address: u32,
    /// Objects this thread is blocked on, each holding a reference.
    pub(crate) wait_objects: Vec<ObjectId>,
    pub(crate) held_mutexes: Vec<ObjectId>,
    /// Threads waiting for this one to exit.
    pub(crate) waiters: Vec<ObjectId>,
    pub(crate) timeout_pending: bool,
}

impl Thread {
    pub fn wait_objects(&self) -> &[ObjectId] {
        &self.wait_objects
    }

    pub fn held_mutexes(&self) -> &[ObjectId] {
        &self.held_mutexes
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.status, ThreadStatus::Waiting(_))
    }

    pub fn has_timeout_pending(&self) -> bool {
        self.timeout_pending
    }
}

//! Guest kernel objects and the cooperative thread scheduler.
//!
//! All objects live in one [`ObjectArena`] and are addressed by generation-tagged [`ObjectId`]s, so
//! back-references (a thread's wait list, a session's server end) are lookups that can report an
//! object as gone instead of owning pointers. Processes address objects through per-process
//! [`HandleTable`]s.
//!
//! Blocking is never a host-level block: a waiting thread is a state transition plus an optional
//! CoreTiming event that force-resolves the wait.

mod error;
mod handle;
mod ipc;
mod kernel;
mod object;
mod process;
mod ready_queue;
mod scheduler;
mod session;
mod sync;
mod thread;
mod wait;

pub use error::{
    KernelError, ERR_INVALID_HANDLE, ERR_MAX_CONNECTIONS_REACHED, ERR_NOT_FOUND,
    ERR_OUT_OF_HANDLES, ERR_OUT_OF_RANGE, ERR_WRONG_LOCKING_THREAD,
};
pub use handle::{Handle, HandleTable, CURRENT_PROCESS, CURRENT_THREAD, MAX_HANDLES};
pub use ipc::{TranslatedRequest, COMMAND_BUFFER_OFFSET, STATIC_BUFFER_DESCRIPTORS_OFFSET};
pub use kernel::{Kernel, KernelHost};
pub use object::{Object, ObjectArena, ObjectId, ObjectKind};
pub use process::{Process, ProcessId, TLS_AREA_VADDR, TLS_ENTRY_SIZE, TLS_SLOTS};
pub use ready_queue::ReadyQueue;
pub use scheduler::ContextSwitch;
pub use session::{ClientSession, Port, PortKind, ServerSession, ServiceId, SessionData};
pub use sync::{Event, Mutex, ResetType, Semaphore};
pub use thread::{
    Thread, ThreadContext, ThreadStatus, WaitKind, PRIORITY_LEVELS, THREAD_PRIO_HIGHEST,
    THREAD_PRIO_LOWEST, THREAD_PRIO_USER_HIGHEST,
};
pub use wait::WaitOutcome;

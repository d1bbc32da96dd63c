use horizon_ipc::{
    ErrorDescription, ErrorLevel, ErrorModule, ErrorSummary, IpcError, ResultCode,
};
use horizon_memory::GuestMemoryError;
use thiserror::Error;

use crate::object::{ObjectId, ObjectKind};
use crate::process::ProcessId;

pub const ERR_INVALID_HANDLE: ResultCode = ResultCode::new(
    ErrorDescription::INVALID_HANDLE,
    ErrorModule::Kernel,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Permanent,
);

pub const ERR_OUT_OF_HANDLES: ResultCode = ResultCode::new(
    ErrorDescription(19),
    ErrorModule::Kernel,
    ErrorSummary::OutOfResource,
    ErrorLevel::Permanent,
);

pub const ERR_OUT_OF_RANGE: ResultCode = ResultCode::new(
    ErrorDescription::OUT_OF_RANGE,
    ErrorModule::Kernel,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Permanent,
);

pub const ERR_WRONG_LOCKING_THREAD: ResultCode = ResultCode::new(
    ErrorDescription(31),
    ErrorModule::Kernel,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Permanent,
);

pub const ERR_NOT_FOUND: ResultCode = ResultCode::new(
    ErrorDescription::NOT_FOUND,
    ErrorModule::Kernel,
    ErrorSummary::NotFound,
    ErrorLevel::Permanent,
);

pub const ERR_MAX_CONNECTIONS_REACHED: ResultCode = ResultCode::new(
    ErrorDescription::MAX_CONNECTIONS_REACHED,
    ErrorModule::Os,
    ErrorSummary::WouldBlock,
    ErrorLevel::Temporary,
);

const ERR_OUT_OF_MEMORY: ResultCode = ResultCode::new(
    ErrorDescription::OUT_OF_MEMORY,
    ErrorModule::Kernel,
    ErrorSummary::OutOfResource,
    ErrorLevel::Permanent,
);

const ERR_INVALID_POINTER: ResultCode = ResultCode::new(
    ErrorDescription::INVALID_POINTER,
    ErrorModule::Kernel,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Permanent,
);

const ERR_INVALID_BUFFER_DESCRIPTOR: ResultCode = ResultCode::new(
    ErrorDescription::OS_INVALID_BUFFER_DESCRIPTOR,
    ErrorModule::Os,
    ErrorSummary::WrongArgument,
    ErrorLevel::Permanent,
);

const ERR_ALREADY_EXISTS: ResultCode = ResultCode::new(
    ErrorDescription::ALREADY_EXISTS,
    ErrorModule::Kernel,
    ErrorSummary::InvalidState,
    ErrorLevel::Permanent,
);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("invalid handle 0x{0:08X}")]
    InvalidHandle(u32),

    #[error("handle table is full")]
    HandleTableFull,

    #[error("object is a {found:?}, expected {expected:?}")]
    WrongObjectKind {
        expected: ObjectKind,
        found: ObjectKind,
    },

    #[error("object {0:?} no longer exists")]
    ObjectGone(ObjectId),

    #[error("no process {0:?}")]
    NoSuchProcess(ProcessId),

    #[error("no thread is running")]
    NoCurrentThread,

    #[error("thread-local storage of {0:?} is exhausted")]
    OutOfTls(ProcessId),

    #[error("mutex is not held by the releasing thread")]
    MutexNotOwned,

    #[error("semaphore release of {release} exceeds max count {max} (count {count})")]
    SemaphoreOverflow { count: i32, release: i32, max: i32 },

    #[error("{what} {value} is out of range")]
    OutOfRange { what: &'static str, value: i64 },

    #[error("no port named {0:?}")]
    PortNotFound(String),

    #[error("port {0:?} is already registered")]
    PortAlreadyRegistered(String),

    #[error("port {port:?} reached its limit of {max} sessions")]
    MaxSessionsReached { port: String, max: u32 },

    #[error(transparent)]
    Memory(#[from] GuestMemoryError),

    #[error(transparent)]
    Ipc(#[from] IpcError),
}

impl KernelError {
    /// The guest-visible result this error is reported as.
    pub fn result_code(&self) -> ResultCode {
        match self {
            KernelError::InvalidHandle(_)
            | KernelError::WrongObjectKind { .. }
            | KernelError::ObjectGone(_)
            | KernelError::NoSuchProcess(_)
            | KernelError::NoCurrentThread => ERR_INVALID_HANDLE,
            KernelError::HandleTableFull => ERR_OUT_OF_HANDLES,
            KernelError::OutOfTls(_) => ERR_OUT_OF_MEMORY,
            KernelError::MutexNotOwned => ERR_WRONG_LOCKING_THREAD,
            KernelError::SemaphoreOverflow { .. } | KernelError::OutOfRange { .. } => {
                ERR_OUT_OF_RANGE
            }
            KernelError::PortNotFound(_) => ERR_NOT_FOUND,
            KernelError::PortAlreadyRegistered(_) => ERR_ALREADY_EXISTS,
            KernelError::MaxSessionsReached { .. } => ERR_MAX_CONNECTIONS_REACHED,
            KernelError::Memory(_) => ERR_INVALID_POINTER,
            KernelError::Ipc(_) => ERR_INVALID_BUFFER_DESCRIPTOR,
        }
    }
}

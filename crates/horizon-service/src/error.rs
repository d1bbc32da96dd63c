use horizon_ipc::{Header, IpcError};
use horizon_kernel::{KernelError, ServiceId};
use thiserror::Error;

/// A request could not be answered at all.
///
/// Guest-visible failures are result codes pushed into the response; these errors are the
/// host-fatal class instead and stop the call (and, in the run loop, emulation).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ipc(#[from] IpcError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(
        "{service} answered {declared} with {normal_written} normal and {translate_written} \
         translate words"
    )]
    ResponseContract {
        service: &'static str,
        declared: Header,
        normal_written: u32,
        translate_written: u32,
    },

    #[error("{service} returned from {request} without building a response")]
    NoResponse {
        service: &'static str,
        request: Header,
    },

    #[error("no service module behind {0:?}")]
    UnknownService(ServiceId),

    #[error("service {0:?} is already installed")]
    AlreadyRegistered(String),
}

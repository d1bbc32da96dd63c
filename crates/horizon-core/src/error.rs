use horizon_kernel::KernelError;
use horizon_memory::GuestMemoryError;
use horizon_service::ServiceError;
use thiserror::Error;

/// Failure to bring the emulated system up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SystemError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Memory(#[from] GuestMemoryError),
}

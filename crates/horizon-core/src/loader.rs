use std::path::Path;

use horizon_memory::SparseMemory;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    #[error("application is encrypted")]
    Encrypted,

    #[error("application format is invalid")]
    InvalidFormat,

    /// The loader does not provide this piece of information.
    #[error("not provided by this loader")]
    NotUsed,

    #[error("{0}")]
    Other(String),
}

/// How the loaded program's main thread starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    pub entry_point: u32,
    pub stack_top: u32,
    pub stack_size: u32,
    pub main_thread_priority: u32,
}

/// Reads one application image.
pub trait AppLoader {
    /// Kernel memory layout the application asks for.
    fn load_kernel_system_mode(&mut self) -> Result<u32, LoaderError>;

    fn read_program_id(&mut self) -> Result<u64, LoaderError>;

    /// Maps the code and data segments into `memory`. The stack is mapped by the caller.
    fn load(&mut self, memory: &mut SparseMemory) -> Result<ProgramImage, LoaderError>;
}

/// Picks a loader for a file on the host.
pub trait LoaderFactory {
    /// `None` when the file is missing or of no known format.
    fn get_loader(&mut self, path: &Path) -> Option<Box<dyn AppLoader>>;
}

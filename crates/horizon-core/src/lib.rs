//! The system orchestrator: boots the guest-visible [`Machine`], drives it one slice per
//! [`System::run_loop`] iteration and honours deferred requests from other host threads.
//!
//! Host collaborators plug in through [`CpuEngine`], [`Hardware`], [`LoaderFactory`] and
//! [`ServiceBackends`].

mod collaborators;
mod control;
mod error;
mod loader;
mod machine;
mod settings;
mod shared_page;
pub mod svc;
mod system;

pub use collaborators::{CpuEngine, Hardware, Offline, ServiceBackends};
pub use control::{ControlHandle, JumpRequest};
pub use error::SystemError;
pub use loader::{AppLoader, LoaderError, LoaderFactory, ProgramImage};
pub use machine::Machine;
pub use settings::{ConfigError, InitClock, Settings, BATTERY_LEVEL_FULL};
pub use shared_page::{
    console_time_ms, DateTime, SharedPage, SharedPageHost, SHARED_PAGE_SIZE, SHARED_PAGE_VADDR,
};
pub use system::{title_content_path, ResultStatus, System, SystemState};

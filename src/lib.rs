//! High-level emulation of a handheld console's guest operating system.
//!
//! The member crates layer bottom-up: guest memory, the CoreTiming event clock, the IPC wire
//! format, kernel objects and the scheduler, system services, and the orchestrator that drives
//! them. This crate re-exports each of them and the orchestrator's entry points.

pub use horizon_core::{
    console_time_ms, svc, AppLoader, ConfigError, ControlHandle, CpuEngine, Hardware, InitClock,
    JumpRequest, LoaderError, LoaderFactory, Machine, Offline, ProgramImage, ResultStatus,
    ServiceBackends, Settings, System, SystemError, SystemState, SHARED_PAGE_VADDR,
};

pub use horizon_ipc as ipc;
pub use horizon_kernel as kernel;
pub use horizon_memory as memory;
pub use horizon_service as service;
pub use horizon_timing as timing;

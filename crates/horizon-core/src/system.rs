use std::path::{Path, PathBuf};

use horizon_kernel::THREAD_PRIO_LOWEST;
use horizon_service::MediaType;
use horizon_timing::CoreTiming;

use crate::collaborators::{CpuEngine, Hardware, Offline, ServiceBackends};
use crate::control::{ControlHandle, JumpRequest};
use crate::loader::{AppLoader, LoaderError, LoaderFactory};
use crate::machine::Machine;
use crate::settings::Settings;

/// Outcome of loading an application or of one run-loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Success,
    ShutdownRequested,
    /// No execution engine is attached, or nothing is loaded.
    ErrorNotInitialized,
    ErrorGetLoader,
    ErrorSystemMode,
    ErrorLoader,
    ErrorLoaderEncrypted,
    ErrorLoaderInvalidFormat,
    /// A host-fatal error stopped emulation.
    ErrorHalted,
    /// A pause request is active; the iteration did nothing.
    Paused,
}

impl From<LoaderError> for ResultStatus {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::Encrypted => ResultStatus::ErrorLoaderEncrypted,
            LoaderError::InvalidFormat => ResultStatus::ErrorLoaderInvalidFormat,
            LoaderError::NotUsed | LoaderError::Other(_) => ResultStatus::ErrorLoader,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    NotRunning,
    Running,
    ShutdownRequested,
}

/// `<media root>/title/<high:08x>/<low:08x>/content/00000000.app`
pub fn title_content_path(settings: &Settings, media: MediaType, title_id: u64) -> Option<PathBuf> {
    let root = match media {
        MediaType::Nand => &settings.nand_root,
        MediaType::Sdmc => &settings.sdmc_root,
        MediaType::GameCard => return None,
    };
    let high = (title_id >> 32) as u32;
    let low = title_id as u32;
    Some(
        root.join("title")
            .join(format!("{high:08x}"))
            .join(format!("{low:08x}"))
            .join("content")
            .join("00000000.app"),
    )
}

/// The emulated console: the guest-visible [`Machine`] plus the host collaborators driving it.
pub struct System {
    settings: Settings,
    control: ControlHandle,
    cpu: Option<Box<dyn CpuEngine>>,
    hardware: Vec<Box<dyn Hardware>>,
    loaders: Box<dyn LoaderFactory>,
    backends: Box<dyn ServiceBackends>,
    machine: Option<Machine>,
    app_path: Option<PathBuf>,
    /// CoreTiming ticks at the last hardware update.
    last_hardware_ticks: u64,
}

impl System {
    pub fn new(settings: Settings, loaders: Box<dyn LoaderFactory>) -> Self {
        Self {
            settings,
            control: ControlHandle::new(),
            cpu: None,
            hardware: Vec::new(),
            loaders,
            backends: Box::new(Offline),
            machine: None,
            app_path: None,
            last_hardware_ticks: 0,
        }
    }

    pub fn with_cpu(mut self, cpu: Box<dyn CpuEngine>) -> Self {
        self.cpu = Some(cpu);
        self
    }

    pub fn with_hardware(mut self, hardware: Box<dyn Hardware>) -> Self {
        self.hardware.push(hardware);
        self
    }

    pub fn with_service_backends(mut self, backends: Box<dyn ServiceBackends>) -> Self {
        self.backends = backends;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// A handle for other host threads. Requests take effect at the end of an iteration.
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn machine(&self) -> Option<&Machine> {
        self.machine.as_ref()
    }

    pub fn machine_mut(&mut self) -> Option<&mut Machine> {
        self.machine.as_mut()
    }

    pub fn app_path(&self) -> Option<&Path> {
        self.app_path.as_deref()
    }

    pub fn state(&self) -> SystemState {
        match &self.machine {
            None => SystemState::NotRunning,
            Some(_) if self.control.is_shutdown_requested() => SystemState::ShutdownRequested,
            Some(_) => SystemState::Running,
        }
    }

    /// Boots the system around the application at `path`.
    ///
    /// Requests aimed at a previous session are discarded. Everything brought up is torn down
    /// again when a later step fails.
    pub fn load(&mut self, path: &Path) -> ResultStatus {
        self.control.clear_requests();
        self.boot(path)
    }

    fn boot(&mut self, path: &Path) -> ResultStatus {
        if self.machine.is_some() {
            self.teardown();
        }
        let Some(mut loader) = self.loaders.get_loader(path) else {
            tracing::error!(path = %path.display(), "failed to obtain loader");
            return ResultStatus::ErrorGetLoader;
        };
        let system_mode = match loader.load_kernel_system_mode() {
            Ok(mode) => mode,
            Err(err) => {
                tracing::error!(%err, "failed to determine system mode");
                return match err {
                    LoaderError::Encrypted | LoaderError::InvalidFormat => err.into(),
                    _ => ResultStatus::ErrorSystemMode,
                };
            }
        };

        let machine = match Machine::boot(
            &self.settings,
            system_mode,
            &self.control,
            self.backends.as_mut(),
        ) {
            Ok(machine) => machine,
            Err(err) => {
                tracing::error!(%err, "failed to initialise the system");
                return ResultStatus::ErrorHalted;
            }
        };
        self.machine = Some(machine);
        self.last_hardware_ticks = 0;

        let name = path
            .file_stem()
            .map_or_else(|| "app".to_owned(), |stem| stem.to_string_lossy().into_owned());
        let status = self.load_process(&name, loader.as_mut());
        if status != ResultStatus::Success {
            self.teardown();
            return status;
        }
        self.app_path = Some(path.to_path_buf());
        tracing::info!(path = %path.display(), system_mode, "application loaded");
        ResultStatus::Success
    }

    fn load_process(&mut self, name: &str, loader: &mut dyn AppLoader) -> ResultStatus {
        let Some(machine) = self.machine.as_mut() else {
            return ResultStatus::ErrorNotInitialized;
        };
        let program_id = match loader.read_program_id() {
            Ok(id) => id,
            Err(LoaderError::NotUsed) => 0,
            Err(err) => {
                tracing::error!(%err, "failed to read program id");
                return err.into();
            }
        };
        let pid = machine.kernel.create_process(name, program_id);
        let image = match loader.load(&mut machine.memory) {
            Ok(image) => image,
            Err(err) => {
                tracing::error!(%err, "failed to load application");
                return err.into();
            }
        };
        let stack_base = image.stack_top.wrapping_sub(image.stack_size);
        let mapped = machine
            .map_process_tls()
            .and_then(|()| Ok(machine.memory.map(stack_base, image.stack_size)?));
        if let Err(err) = mapped {
            tracing::error!(%err, "failed to map process memory");
            return ResultStatus::ErrorLoader;
        }

        let priority = image.main_thread_priority.min(THREAD_PRIO_LOWEST);
        let main = machine
            .kernel
            .create_thread(pid, "main", image.entry_point, priority, 0, image.stack_top)
            .and_then(|thread| machine.kernel.start_thread(thread));
        if let Err(err) = main {
            tracing::error!(%err, "failed to create the main thread");
            return ResultStatus::ErrorLoader;
        }
        ResultStatus::Success
    }

    /// Tears down services, kernel and timing, discarding pending requests. Safe to call when
    /// nothing is loaded.
    pub fn shutdown(&mut self) {
        self.control.clear_requests();
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(machine) = self.machine.take() {
            tracing::info!(ticks = machine.timing.ticks(), "shutting down");
            drop(machine);
        }
        self.last_hardware_ticks = 0;
    }

    /// Replaces the running title: a full teardown followed by a fresh boot. Requests still
    /// pending stay queued for the new title.
    pub fn jump(&mut self, request: JumpRequest) -> ResultStatus {
        let path = if request.title_id == 0 {
            self.app_path.clone()
        } else {
            title_content_path(&self.settings, request.media, request.title_id)
        };
        let Some(path) = path else {
            tracing::error!(
                media = ?request.media,
                title_id = format_args!("0x{:016X}", request.title_id),
                "cannot resolve title path"
            );
            return ResultStatus::ErrorGetLoader;
        };
        tracing::info!(path = %path.display(), "jumping to title");
        self.teardown();
        self.boot(&path)
    }

    /// One iteration: run (or idle) a slice, update hardware, reschedule, then honour at most
    /// one deferred request. A jump is honoured before a shutdown; the shutdown then applies on
    /// the next iteration.
    pub fn run_loop(&mut self) -> ResultStatus {
        if self.control.is_paused() {
            return ResultStatus::Paused;
        }
        let (Some(cpu), Some(machine)) = (self.cpu.as_mut(), self.machine.as_mut()) else {
            return ResultStatus::ErrorNotInitialized;
        };

        if machine.is_idle() {
            // Nothing runnable: skip straight to the next event, even the hourly clock refresh.
            tracing::trace!("idling");
            machine.timing.idle();
            CoreTiming::advance(machine);
            machine.kernel.prepare_reschedule();
            cpu.prepare_reschedule();
        } else {
            CoreTiming::advance(machine);
            cpu.run(machine);
        }

        let now = machine.timing.ticks();
        let elapsed = now.saturating_sub(self.last_hardware_ticks);
        self.last_hardware_ticks = now;
        for device in &mut self.hardware {
            device.update(elapsed);
        }

        if machine.kernel.is_reschedule_pending() {
            reschedule(&mut **cpu, machine);
        }

        if machine.halted().is_some() {
            return ResultStatus::ErrorHalted;
        }

        if let Some(request) = self.control.take_jump() {
            return self.jump(request);
        }
        if self.control.take_shutdown() {
            tracing::info!("shutdown requested");
            return ResultStatus::ShutdownRequested;
        }
        ResultStatus::Success
    }
}

/// Saves the outgoing thread's registers and loads the incoming thread's.
fn reschedule(cpu: &mut dyn CpuEngine, machine: &mut Machine) {
    let Some(switch) = machine.kernel.reschedule() else {
        return;
    };
    if let Some(from) = switch.from {
        // Gone when the thread exited and nothing else referenced it.
        if let Ok(context) = machine.kernel.thread_context_mut(from) {
            cpu.save_context(context);
        }
    }
    if let Some(to) = switch.to {
        if let Ok(thread) = machine.kernel.thread(to) {
            cpu.load_context(&thread.context);
        }
    }
}

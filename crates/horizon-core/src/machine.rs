use horizon_kernel::{Kernel, KernelHost, Process, ThreadStatus, TLS_AREA_VADDR};
use horizon_memory::SparseMemory;
use horizon_service::{Cecd, HttpC, NsS, ServiceError, ServiceManager, SocU, Srv};
use horizon_timing::{CoreTiming, TimingHost};

use crate::collaborators::ServiceBackends;
use crate::control::ControlHandle;
use crate::error::SystemError;
use crate::settings::Settings;
use crate::shared_page::{SharedPage, SharedPageHost, SHARED_PAGE_SIZE, SHARED_PAGE_VADDR};

/// Everything the guest can observe, passed to every component entry point and to the execution
/// engine.
///
/// Fields drop in declaration order, the reverse of boot.
pub struct Machine {
    pub shared_page: SharedPage,
    pub services: ServiceManager,
    pub kernel: Kernel,
    pub timing: CoreTiming<Machine>,
    pub memory: SparseMemory,
    halted: Option<ServiceError>,
}

impl TimingHost for Machine {
    fn core_timing(&mut self) -> &mut CoreTiming<Self> {
        &mut self.timing
    }
}

impl KernelHost for Machine {
    fn kernel_and_timing(&mut self) -> (&mut Kernel, &mut CoreTiming<Self>) {
        (&mut self.kernel, &mut self.timing)
    }
}

impl SharedPageHost for Machine {
    fn shared_page(&mut self) -> &mut SharedPage {
        &mut self.shared_page
    }

    fn publish_shared_page(&mut self) {
        if let Err(err) = self.shared_page.write_to(&mut self.memory) {
            tracing::error!(%err, "failed to publish shared page");
        }
    }
}

impl Machine {
    /// Brings up timing, the kernel, the system services and the shared page, in that order.
    pub fn boot(
        settings: &Settings,
        system_mode: u32,
        control: &ControlHandle,
        backends: &mut dyn ServiceBackends,
    ) -> Result<Self, SystemError> {
        let mut timing = CoreTiming::new(settings.max_slice_length);
        let mut kernel = Kernel::new(system_mode);
        kernel.register_timing_events(&mut timing);

        let mut services = ServiceManager::new();
        services.install(&mut kernel, Srv::new())?;
        services.install(&mut kernel, NsS::new(Box::new(control.clone())))?;
        services.install(&mut kernel, HttpC::new(backends.http_transport()))?;
        services.install(&mut kernel, Cecd::new())?;
        services.install(&mut kernel, SocU::new(backends.host_sockets()))?;

        let mut shared_page = SharedPage::new(settings);
        shared_page.start(&mut timing);
        let mut memory = SparseMemory::new();
        memory.map(SHARED_PAGE_VADDR, SHARED_PAGE_SIZE as u32)?;

        let mut machine = Self {
            shared_page,
            services,
            kernel,
            timing,
            memory,
            halted: None,
        };
        machine.publish_shared_page();
        tracing::debug!(system_mode, services = machine.services.len(), "system initialised");
        Ok(machine)
    }

    /// Maps the thread-local storage area every process carries.
    pub fn map_process_tls(&mut self) -> Result<(), SystemError> {
        self.memory.map(TLS_AREA_VADDR, Process::tls_area_size())?;
        Ok(())
    }

    /// Records a host-fatal error. The run loop stops at the end of the current iteration.
    pub fn halt(&mut self, err: ServiceError) {
        tracing::error!(%err, "emulation halted");
        if self.halted.is_none() {
            self.halted = Some(err);
        }
        self.kernel.prepare_reschedule();
    }

    pub fn halted(&self) -> Option<&ServiceError> {
        self.halted.as_ref()
    }

    /// No thread is running, so the next slice is idle time.
    pub fn is_idle(&self) -> bool {
        self.kernel
            .current_thread()
            .and_then(|id| self.kernel.thread(id).ok())
            .map_or(true, |thread| thread.status != ThreadStatus::Running)
    }
}

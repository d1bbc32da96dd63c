use horizon_ipc::RequestContext;
use horizon_kernel::{Handle, Kernel, KernelError, ObjectId, ProcessId, ServiceId};
use horizon_memory::GuestMemory;

use crate::error::ServiceError;
use crate::framework::{HleEnv, ServiceFramework, ServiceHandler, ServiceModule};

/// Owns every installed service module and routes session requests to them.
#[derive(Default)]
pub struct ServiceManager {
    services: Vec<Box<dyn ServiceHandler>>,
}

impl ServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `module`'s port and lets it create its kernel objects.
    pub fn install<M: ServiceModule>(
        &mut self,
        kernel: &mut Kernel,
        module: M,
    ) -> Result<ServiceId, ServiceError> {
        let id = ServiceId(self.services.len() as u32);
        let mut framework = ServiceFramework::new(module);
        kernel
            .register_port(M::NAME, M::PORT, id, M::MAX_SESSIONS)
            .map_err(|err| match err {
                KernelError::PortAlreadyRegistered(name) => ServiceError::AlreadyRegistered(name),
                other => other.into(),
            })?;
        ServiceHandler::install(&mut framework, kernel)?;
        tracing::debug!(
            service = M::NAME,
            commands = framework.command_count(),
            "service installed"
        );
        self.services.push(Box::new(framework));
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn service_name(&self, id: ServiceId) -> Option<&'static str> {
        self.services.get(id.0 as usize).map(|s| s.service_name())
    }

    /// Answers an already translated request that arrived on `server`.
    pub fn handle_request(
        &mut self,
        kernel: &mut Kernel,
        memory: &mut dyn GuestMemory,
        process: ProcessId,
        server: ObjectId,
        service: ServiceId,
        ctx: &mut RequestContext<ObjectId>,
    ) -> Result<(), ServiceError> {
        let handler = self
            .services
            .get_mut(service.0 as usize)
            .ok_or(ServiceError::UnknownService(service))?;
        let mut data = kernel.take_session_data(server)?;
        let mut env = HleEnv {
            kernel: &mut *kernel,
            memory: &mut *memory,
            process,
            session: server,
        };
        let result = handler.handle_sync_request(ctx, &mut env, &mut data);
        kernel.restore_session_data(server, data);
        result
    }

    /// Runs one synchronous request from `process` on the session behind `handle`, using the
    /// command buffer in the TLS entry at `tls`.
    pub fn send_sync_request(
        &mut self,
        kernel: &mut Kernel,
        memory: &mut dyn GuestMemory,
        process: ProcessId,
        handle: Handle,
        tls: u32,
    ) -> Result<(), ServiceError> {
        let (server, service) = kernel.session_target(process, handle)?;
        let mut request = kernel.read_request(process, &*memory, tls)?;
        let handled =
            self.handle_request(kernel, memory, process, server, service, &mut request.context);
        let result = handled.and_then(|()| {
            kernel
                .write_response(process, memory, tls, &request.context)
                .map_err(ServiceError::from)
        });
        for object in request.moved {
            kernel.release_object(object);
        }
        result
    }
}

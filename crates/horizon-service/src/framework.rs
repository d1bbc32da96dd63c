use std::collections::BTreeMap;

use horizon_ipc::{
    ErrorDescription, ErrorLevel, ErrorModule, ErrorSummary, Header, RequestContext,
    RequestParser, ResponseBuilder, ResultCode,
};
use horizon_kernel::{Kernel, KernelError, ObjectId, PortKind, ProcessId, SessionData};
use horizon_memory::GuestMemory;

use crate::error::ServiceError;

/// Answer to a command id no handler is registered for.
pub const ERR_NOT_IMPLEMENTED: ResultCode = ResultCode::new(
    ErrorDescription::NOT_IMPLEMENTED,
    ErrorModule::Common,
    ErrorSummary::NotSupported,
    ErrorLevel::Permanent,
);

/// Everything a handler may touch besides its module and session state.
pub struct HleEnv<'a> {
    pub kernel: &'a mut Kernel,
    pub memory: &'a mut dyn GuestMemory,
    /// The process that sent the request.
    pub process: ProcessId,
    /// Server end of the session the request arrived on.
    pub session: ObjectId,
}

pub type HandlerFn<M> = fn(
    &mut M,
    &mut <M as ServiceModule>::Session,
    RequestParser<'_, ObjectId>,
    &mut HleEnv<'_>,
) -> Result<(), ServiceError>;

/// One row of a module's command table.
pub struct FunctionInfo<M: ServiceModule> {
    /// Full request header, so the parser knows the declared word counts.
    pub header: Header,
    pub handler: Option<HandlerFn<M>>,
    pub name: &'static str,
}

impl<M: ServiceModule> FunctionInfo<M> {
    pub fn handler(header: u32, handler: HandlerFn<M>, name: &'static str) -> Self {
        Self {
            header: Header::from_raw(header),
            handler: Some(handler),
            name,
        }
    }

    /// A known command that is answered as unimplemented.
    pub fn stub(header: u32, name: &'static str) -> Self {
        Self {
            header: Header::from_raw(header),
            handler: None,
            name,
        }
    }
}

/// A system service: its port, its command table and the state of one session.
pub trait ServiceModule: Sized + 'static {
    /// Per-session state. Created on a session's first request and dropped with the session.
    type Session: Default + 'static;

    const NAME: &'static str;
    const MAX_SESSIONS: u32;
    const PORT: PortKind = PortKind::Service;

    fn handlers() -> Vec<FunctionInfo<Self>>;

    /// Creates the kernel objects the module hands out.
    fn install(&mut self, _kernel: &mut Kernel) -> Result<(), KernelError> {
        Ok(())
    }
}

/// Object-safe view of a [`ServiceFramework`], as the manager stores it.
pub trait ServiceHandler {
    fn service_name(&self) -> &'static str;
    fn max_sessions(&self) -> u32;
    fn port_kind(&self) -> PortKind;
    fn install(&mut self, kernel: &mut Kernel) -> Result<(), KernelError>;

    /// Answers the request in `ctx` in place. `session_data` is the state attached to the
    /// session the request arrived on.
    fn handle_sync_request(
        &mut self,
        ctx: &mut RequestContext<ObjectId>,
        env: &mut HleEnv<'_>,
        session_data: &mut Option<SessionData>,
    ) -> Result<(), ServiceError>;
}

/// A module plus its command table, keyed by command id.
pub struct ServiceFramework<M: ServiceModule> {
    module: M,
    handlers: BTreeMap<u16, FunctionInfo<M>>,
}

impl<M: ServiceModule> ServiceFramework<M> {
    /// Panics when two table rows share a command id.
    pub fn new(module: M) -> Self {
        let mut handlers = BTreeMap::new();
        for info in M::handlers() {
            let id = info.header.command_id();
            let name = info.name;
            let previous = handlers.insert(id, info);
            assert!(
                previous.is_none(),
                "{}: command 0x{id:04X} ({name}) registered twice",
                M::NAME
            );
        }
        Self { module, handlers }
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut M {
        &mut self.module
    }

    pub fn command_count(&self) -> usize {
        self.handlers.len()
    }

    fn report_unimplemented(&self, ctx: &mut RequestContext<ObjectId>, name: Option<&str>) {
        let header = ctx.header();
        tracing::error!(
            service = M::NAME,
            command = name.unwrap_or("<unknown>"),
            header = %format_args!("0x{:08X}", header.raw()),
            "unimplemented function"
        );
        ResponseBuilder::new(ctx, Header::new(header.command_id(), 1, 0)).push(ERR_NOT_IMPLEMENTED);
    }
}

impl<M: ServiceModule> ServiceHandler for ServiceFramework<M> {
    fn service_name(&self) -> &'static str {
        M::NAME
    }

    fn max_sessions(&self) -> u32 {
        M::MAX_SESSIONS
    }

    fn port_kind(&self) -> PortKind {
        M::PORT
    }

    fn install(&mut self, kernel: &mut Kernel) -> Result<(), KernelError> {
        self.module.install(kernel)
    }

    fn handle_sync_request(
        &mut self,
        ctx: &mut RequestContext<ObjectId>,
        env: &mut HleEnv<'_>,
        session_data: &mut Option<SessionData>,
    ) -> Result<(), ServiceError> {
        let request = ctx.header();
        let Some(info) = self.handlers.get(&request.command_id()) else {
            self.report_unimplemented(ctx, None);
            return Ok(());
        };
        let (declared, name) = (info.header, info.name);
        let Some(handler) = info.handler else {
            self.report_unimplemented(ctx, Some(name));
            return Ok(());
        };

        let mut session = session_data
            .take()
            .and_then(|data| data.downcast::<M::Session>().ok())
            .map(|data| *data)
            .unwrap_or_default();
        let result = handler(
            &mut self.module,
            &mut session,
            RequestParser::new(ctx, declared),
            env,
        );
        *session_data = Some(Box::new(session));
        result?;

        match ctx.response_shape() {
            Some(shape) if shape.is_complete() => Ok(()),
            Some(shape) => Err(ServiceError::ResponseContract {
                service: M::NAME,
                declared: shape.declared,
                normal_written: shape.normal_written,
                translate_written: shape.translate_written,
            }),
            None => Err(ServiceError::NoResponse {
                service: M::NAME,
                request,
            }),
        }
    }
}

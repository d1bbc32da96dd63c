//! High-level emulation of the guest's system services.
//!
//! A service is a [`ServiceModule`]: a command table mapping request headers to handler
//! functions plus a per-session state type. [`ServiceFramework`] wraps a module to look up the
//! handler for a request, enforce the response shape the handler declared and carry session
//! state between requests. [`ServiceManager`] owns every installed framework and routes
//! `SendSyncRequest` from a client session to the service behind it.

mod error;
mod framework;
mod manager;
pub mod services;

pub use error::ServiceError;
pub use framework::{
    FunctionInfo, HandlerFn, HleEnv, ServiceFramework, ServiceHandler, ServiceModule,
    ERR_NOT_IMPLEMENTED,
};
pub use manager::ServiceManager;
pub use services::cecd::Cecd;
pub use services::http::{HttpC, HttpRequest, HttpResponse, HttpTransport, HttpTransportError};
pub use services::ns::{MediaType, NsS, SystemControl};
pub use services::soc::{HostSockets, SocU, SocketKind};
pub use services::srv::Srv;

use horizon_kernel::ThreadContext;
use horizon_service::{HostSockets, HttpRequest, HttpResponse, HttpTransport, HttpTransportError, SocketKind};

use crate::machine::Machine;

/// Executes guest code for the current thread.
pub trait CpuEngine {
    /// Runs until the slice's downcount is used up or a reschedule is pending.
    ///
    /// The engine burns cycles with `machine.timing.add_ticks` and makes kernel calls through
    /// [`crate::svc`].
    fn run(&mut self, machine: &mut Machine);

    /// Stop at the next opportunity; a thread switch is due.
    fn prepare_reschedule(&mut self);

    fn save_context(&self, context: &mut ThreadContext);

    fn load_context(&mut self, context: &ThreadContext);
}

/// A peripheral whose state moves with emulated time.
pub trait Hardware {
    fn update(&mut self, elapsed_cycles: u64);
}

/// Host-side transports the networked services are built on.
///
/// Called again on every boot, since services are rebuilt with the rest of the system.
pub trait ServiceBackends {
    fn http_transport(&mut self) -> Box<dyn HttpTransport>;
    fn host_sockets(&mut self) -> Box<dyn HostSockets>;
}

/// Backends for a console with no network: every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

/// Guest errno for a network that is down.
const ENETDOWN: i32 = 49;

impl HttpTransport for Offline {
    fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, HttpTransportError> {
        Err(HttpTransportError::Connection(request.url.clone()))
    }
}

impl HostSockets for Offline {
    fn open(&mut self, _kind: SocketKind, _protocol: u32) -> Result<u32, i32> {
        Err(ENETDOWN)
    }

    fn set_blocking(&mut self, _host_fd: u32, _blocking: bool) -> Result<(), i32> {
        Err(ENETDOWN)
    }

    fn close(&mut self, _host_fd: u32) -> Result<(), i32> {
        Ok(())
    }
}

impl ServiceBackends for Offline {
    fn http_transport(&mut self) -> Box<dyn HttpTransport> {
        Box::new(Offline)
    }

    fn host_sockets(&mut self) -> Box<dyn HostSockets> {
        Box::new(Offline)
    }
}

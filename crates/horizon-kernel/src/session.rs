use core::fmt;
use std::any::Any;

use crate::object::ObjectId;

/// Module-defined state attached to one server session.
pub type SessionData = Box<dyn Any>;

/// Identifies the HLE service module that answers a port's sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(pub u32);

/// Client end of a session. Owns a reference to its server end.
#[derive(Debug)]
pub struct ClientSession {
    pub name: String,
    pub server: ObjectId,
}

/// Server end of a session, answered by an HLE service.
pub struct ServerSession {
    pub name: String,
    pub service: ServiceId,
    pub(crate) data: Option<SessionData>,
}

impl ServerSession {
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

impl fmt::Debug for ServerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSession")
            .field("name", &self.name)
            .field("service", &self.service)
            .field("has_data", &self.data.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    /// Reachable with `ConnectToPort`, like `srv:`.
    Named,
    /// Reachable only through the service manager's `GetServiceHandle`.
    Service,
}

#[derive(Debug)]
pub struct Port {
    pub name: String,
    pub kind: PortKind,
    pub service: ServiceId,
    pub max_sessions: u32,
    /// Server ends of the sessions opened through this port. May hold ids of closed sessions
    /// until the next connect prunes them.
    pub(crate) sessions: Vec<ObjectId>,
}

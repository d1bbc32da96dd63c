use std::collections::BTreeMap;

use horizon_timing::{CoreTiming, EventId, TimingHost};

use crate::error::KernelError;
use crate::handle::{Handle, CURRENT_THREAD};
use crate::object::{Object, ObjectArena, ObjectId, ObjectKind};
use crate::process::{Process, ProcessId};
use crate::ready_queue::ReadyQueue;
use crate::session::{ClientSession, Port, PortKind, ServerSession, ServiceId, SessionData};
use crate::sync::{Event, Mutex, ResetType, Semaphore};
use crate::thread::{Thread, ThreadContext, ThreadStatus, THREAD_PRIO_LOWEST};

/// A host context owning both the kernel and the CoreTiming instance that drives it.
pub trait KernelHost: TimingHost {
    fn kernel_and_timing(&mut self) -> (&mut Kernel, &mut CoreTiming<Self>);
}

fn thread_wakeup_callback<C: KernelHost>(host: &mut C, user_data: u64, _cycles_late: i64) {
    let (kernel, timing) = host.kernel_and_timing();
    kernel.resume_from_timeout(timing, ObjectId::from_bits(user_data));
}

/// Kernel state for one emulated system.
#[derive(Debug)]
pub struct Kernel {
    pub(crate) objects: ObjectArena,
    pub(crate) processes: BTreeMap<ProcessId, Process>,
    pub(crate) ready_queue: ReadyQueue,
    pub(crate) current_thread: Option<ObjectId>,
    pub(crate) current_process: Option<ProcessId>,
    pub(crate) reschedule_pending: bool,
    pub(crate) wakeup_event: Option<EventId>,
    ports: BTreeMap<String, Port>,
    next_process_id: u32,
    next_thread_id: u32,
    system_mode: u32,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Kernel {
    pub fn new(system_mode: u32) -> Self {
        Self {
            objects: ObjectArena::new(),
            processes: BTreeMap::new(),
            ready_queue: ReadyQueue::new(),
            current_thread: None,
            current_process: None,
            reschedule_pending: false,
            wakeup_event: None,
            ports: BTreeMap::new(),
            next_process_id: 1,
            next_thread_id: 1,
            system_mode,
        }
    }

    /// Registers the kernel's timed events. Must run before any thread waits with a timeout.
    pub fn register_timing_events<C: KernelHost>(&mut self, timing: &mut CoreTiming<C>) {
        self.wakeup_event =
            Some(timing.register_event("ThreadWakeupCallback", thread_wakeup_callback::<C>));
    }

    pub fn system_mode(&self) -> u32 {
        self.system_mode
    }

    pub fn objects(&self) -> &ObjectArena {
        &self.objects
    }

    // ---------------------------------------------------------------------------------------------
    // Processes and handles
    // ---------------------------------------------------------------------------------------------

    pub fn create_process(&mut self, name: &str, program_id: u64) -> ProcessId {
        let id = ProcessId(self.next_process_id);
        self.next_process_id += 1;
        self.processes.insert(id, Process::new(id, name, program_id));
        if self.current_process.is_none() {
            self.current_process = Some(id);
        }
        tracing::debug!(pid = id.0, name, program_id = format_args!("{program_id:016X}"), "process created");
        id
    }

    pub fn process(&self, pid: ProcessId) -> Result<&Process, KernelError> {
        self.processes.get(&pid).ok_or(KernelError::NoSuchProcess(pid))
    }

    pub(crate) fn process_mut(&mut self, pid: ProcessId) -> Result<&mut Process, KernelError> {
        self.processes
            .get_mut(&pid)
            .ok_or(KernelError::NoSuchProcess(pid))
    }

    pub fn current_process(&self) -> Option<ProcessId> {
        self.current_process
    }

    /// Opens a handle to `object` in `pid`'s table, adding a reference.
    pub fn create_handle(&mut self, pid: ProcessId, object: ObjectId) -> Result<Handle, KernelError> {
        if !self.objects.contains(object) {
            return Err(KernelError::ObjectGone(object));
        }
        let handle = self.process_mut(pid)?.handles.create(object)?;
        self.objects.retain(object);
        Ok(handle)
    }

    /// Resolves `handle`, including the current-thread pseudo-handle.
    pub fn resolve_handle(&self, pid: ProcessId, handle: Handle) -> Result<ObjectId, KernelError> {
        if handle == CURRENT_THREAD {
            return self.current_thread.ok_or(KernelError::NoCurrentThread);
        }
        let object = self.process(pid)?.handles.get(handle)?;
        if !self.objects.contains(object) {
            return Err(KernelError::InvalidHandle(handle.raw()));
        }
        Ok(object)
    }

    /// Resolves `handle` and checks the object's kind.
    pub fn resolve_handle_of(
        &self,
        pid: ProcessId,
        handle: Handle,
        expected: ObjectKind,
    ) -> Result<ObjectId, KernelError> {
        let object = self.resolve_handle(pid, handle)?;
        let found = self.objects.kind(object)?;
        if found != expected {
            return Err(KernelError::WrongObjectKind { expected, found });
        }
        Ok(object)
    }

    pub fn duplicate_handle(&mut self, pid: ProcessId, handle: Handle) -> Result<Handle, KernelError> {
        let object = self.resolve_handle(pid, handle)?;
        self.create_handle(pid, object)
    }

    pub fn close_handle(&mut self, pid: ProcessId, handle: Handle) -> Result<(), KernelError> {
        let object = self.process_mut(pid)?.handles.close(handle)?;
        self.release_object(object);
        Ok(())
    }

    /// Drops one reference, destroying the object (and anything it owned) on the last one.
    pub fn release_object(&mut self, object: ObjectId) {
        let mut pending = vec![object];
        while let Some(id) = pending.pop() {
            let Some(destroyed) = self.objects.release(id) else {
                continue;
            };
            tracing::trace!(object = ?id, kind = ?destroyed.kind(), name = destroyed.name(), "object destroyed");
            if let Object::ClientSession(client) = destroyed {
                pending.push(client.server);
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Object creation. Every constructor returns an id holding one reference owned by the caller.
    // ---------------------------------------------------------------------------------------------

    pub fn create_event(&mut self, reset_type: ResetType, name: &str) -> ObjectId {
        self.objects.insert(Object::Event(Event::new(reset_type, name)))
    }

    pub fn create_mutex(&mut self, initial_locked: bool, name: &str) -> ObjectId {
        let mut mutex = Mutex::new(name);
        let owner = self.current_thread.filter(|_| initial_locked);
        if let Some(owner) = owner {
            mutex.owner = Some(owner);
            mutex.lock_count = 1;
        }
        let id = self.objects.insert(Object::Mutex(mutex));
        if let Some(owner) = owner {
            if let Ok(thread) = self.objects.thread_mut(owner) {
                thread.held_mutexes.push(id);
            }
        }
        id
    }

    pub fn create_semaphore(
        &mut self,
        initial_count: i32,
        max_count: i32,
        name: &str,
    ) -> Result<ObjectId, KernelError> {
        if initial_count < 0 || max_count < 0 || initial_count > max_count {
            return Err(KernelError::OutOfRange {
                what: "semaphore count",
                value: i64::from(initial_count),
            });
        }
        Ok(self
            .objects
            .insert(Object::Semaphore(Semaphore::new(initial_count, max_count, name))))
    }

    /// Creates a dormant thread in `owner`. The returned reference is the scheduler's own and is
    /// dropped when the thread exits.
    pub fn create_thread(
        &mut self,
        owner: ProcessId,
        name: &str,
        entry_point: u32,
        priority: u32,
        arg: u32,
        stack_top: u32,
    ) -> Result<ObjectId, KernelError> {
        if priority > THREAD_PRIO_LOWEST {
            return Err(KernelError::OutOfRange {
                what: "thread priority",
                value: i64::from(priority),
            });
        }
        let tls_address = self
            .process_mut(owner)?
            .allocate_tls()
            .ok_or(KernelError::OutOfTls(owner))?;
        let thread_id = self.next_thread_id;
        self.next_thread_id += 1;

        let thread = Thread {
            thread_id,
            name: name.to_owned(),
            owner,
            priority,
            nominal_priority: priority,
            status: ThreadStatus::Dormant,
            context: ThreadContext::new(entry_point, stack_top, arg),
            entry_point,
            stack_top,
            tls_address,
            wait_objects: Vec::new(),
            held_mutexes: Vec::new(),
            waiters: Vec::new(),
            timeout_pending: false,
        };
        let id = self.objects.insert(Object::Thread(thread));
        tracing::debug!(
            thread_id,
            name,
            entry = format_args!("0x{entry_point:08X}"),
            priority,
            "thread created"
        );
        Ok(id)
    }

    pub fn thread(&self, id: ObjectId) -> Result<&Thread, KernelError> {
        self.objects.thread(id)
    }

    pub fn thread_context_mut(&mut self, id: ObjectId) -> Result<&mut ThreadContext, KernelError> {
        Ok(&mut self.objects.thread_mut(id)?.context)
    }

    // ---------------------------------------------------------------------------------------------
    // Ports and sessions
    // ---------------------------------------------------------------------------------------------

    pub fn register_port(
        &mut self,
        name: &str,
        kind: PortKind,
        service: ServiceId,
        max_sessions: u32,
    ) -> Result<(), KernelError> {
        if self.ports.contains_key(name) {
            return Err(KernelError::PortAlreadyRegistered(name.to_owned()));
        }
        self.ports.insert(
            name.to_owned(),
            Port {
                name: name.to_owned(),
                kind,
                service,
                max_sessions,
                sessions: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.get(name)
    }

    /// Open sessions on the port `name`.
    pub fn session_count(&self, name: &str) -> usize {
        self.ports.get(name).map_or(0, |port| {
            port.sessions
                .iter()
                .filter(|s| self.objects.contains(**s))
                .count()
        })
    }

    /// Opens a new session on the port `name`, returning the client end (one reference, owned by
    /// the caller).
    pub fn connect_to_port(&mut self, name: &str, kind: PortKind) -> Result<ObjectId, KernelError> {
        let objects = &self.objects;
        let port = self
            .ports
            .get_mut(name)
            .filter(|port| port.kind == kind)
            .ok_or_else(|| KernelError::PortNotFound(name.to_owned()))?;
        port.sessions.retain(|s| objects.contains(*s));
        if port.sessions.len() >= port.max_sessions as usize {
            return Err(KernelError::MaxSessionsReached {
                port: name.to_owned(),
                max: port.max_sessions,
            });
        }
        let service = port.service;

        let server = self.objects.insert(Object::ServerSession(ServerSession {
            name: name.to_owned(),
            service,
            data: None,
        }));
        let client = self.objects.insert(Object::ClientSession(ClientSession {
            name: name.to_owned(),
            server,
        }));
        if let Some(port) = self.ports.get_mut(name) {
            port.sessions.push(server);
        }
        tracing::debug!(port = name, server = ?server, "session opened");
        Ok(client)
    }

    /// The server end and service behind a client-session handle.
    pub fn session_target(
        &self,
        pid: ProcessId,
        handle: Handle,
    ) -> Result<(ObjectId, ServiceId), KernelError> {
        let client = self.resolve_handle_of(pid, handle, ObjectKind::ClientSession)?;
        let server = self.objects.client_session(client)?.server;
        let service = self.objects.server_session(server)?.service;
        Ok((server, service))
    }

    /// Detaches a session's module state for the duration of one request.
    pub fn take_session_data(&mut self, server: ObjectId) -> Result<Option<SessionData>, KernelError> {
        Ok(self.objects.server_session_mut(server)?.data.take())
    }

    /// Reattaches state taken with [`Kernel::take_session_data`]. Dropped if the session closed.
    pub fn restore_session_data(&mut self, server: ObjectId, data: Option<SessionData>) {
        if let Ok(session) = self.objects.server_session_mut(server) {
            session.data = data;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::CURRENT_PROCESS;

    #[test]
    fn handle_lifecycle_tracks_references() {
        let mut kernel = Kernel::new(0);
        let pid = kernel.create_process("app", 0);
        let event = kernel.create_event(ResetType::OneShot, "ev");
        let handle = kernel.create_handle(pid, event).unwrap();
        let dup = kernel.duplicate_handle(pid, handle).unwrap();
        kernel.release_object(event);
        assert_eq!(kernel.objects().refcount(event), Some(2));

        kernel.close_handle(pid, handle).unwrap();
        assert_eq!(
            kernel.resolve_handle(pid, handle),
            Err(KernelError::InvalidHandle(handle.raw()))
        );
        assert_eq!(kernel.resolve_handle(pid, dup).unwrap(), event);

        kernel.close_handle(pid, dup).unwrap();
        assert!(!kernel.objects().contains(event));
    }

    #[test]
    fn pseudo_handles_resolve_only_for_threads() {
        let mut kernel = Kernel::new(0);
        let pid = kernel.create_process("app", 0);
        assert_eq!(
            kernel.resolve_handle(pid, CURRENT_THREAD),
            Err(KernelError::NoCurrentThread)
        );
        assert!(kernel.resolve_handle(pid, CURRENT_PROCESS).is_err());
    }

    #[test]
    fn closing_client_session_destroys_server_and_its_data() {
        let mut kernel = Kernel::new(0);
        let pid = kernel.create_process("app", 0);
        kernel
            .register_port("test:", PortKind::Named, ServiceId(0), 1)
            .unwrap();
        let client = kernel.connect_to_port("test:", PortKind::Named).unwrap();
        let handle = kernel.create_handle(pid, client).unwrap();
        kernel.release_object(client);

        let (server, service) = kernel.session_target(pid, handle).unwrap();
        assert_eq!(service, ServiceId(0));
        kernel.restore_session_data(server, Some(Box::new(5u32)));
        assert!(kernel.objects().server_session(server).unwrap().has_data());

        assert!(matches!(
            kernel.connect_to_port("test:", PortKind::Named),
            Err(KernelError::MaxSessionsReached { .. })
        ));

        kernel.close_handle(pid, handle).unwrap();
        assert!(!kernel.objects().contains(server));
        assert_eq!(kernel.session_count("test:"), 0);
        // The freed slot admits a new session.
        assert!(kernel.connect_to_port("test:", PortKind::Named).is_ok());
    }

    #[test]
    fn service_ports_are_not_connectable_by_name() {
        let mut kernel = Kernel::new(0);
        kernel
            .register_port("http:C", PortKind::Service, ServiceId(3), 32)
            .unwrap();
        assert!(matches!(
            kernel.connect_to_port("http:C", PortKind::Named),
            Err(KernelError::PortNotFound(_))
        ));
        assert!(kernel.connect_to_port("http:C", PortKind::Service).is_ok());
        assert!(matches!(
            kernel.register_port("http:C", PortKind::Service, ServiceId(4), 1),
            Err(KernelError::PortAlreadyRegistered(_))
        ));
    }

    #[test]
    fn thread_priority_is_range_checked() {
        let mut kernel = Kernel::new(0);
        let pid = kernel.create_process("app", 0);
        assert!(matches!(
            kernel.create_thread(pid, "t", 0x10_0000, 64, 0, 0x1000_0000),
            Err(KernelError::OutOfRange { .. })
        ));
        let id = kernel
            .create_thread(pid, "t", 0x10_0001, 63, 7, 0x1000_0000)
            .unwrap();
        let thread = kernel.thread(id).unwrap();
        assert_eq!(thread.status, ThreadStatus::Dormant);
        assert_eq!(thread.context.pc, 0x10_0000);
        assert_eq!(thread.context.cpu_registers[0], 7);
    }
}

use core::fmt;

use crate::error::KernelError;
use crate::session::{ClientSession, ServerSession};
use crate::sync::{Event, Mutex, Semaphore};
use crate::thread::Thread;

/// Generation-tagged index into the [`ObjectArena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    /// Packs the id into one word, e.g. for CoreTiming user data.
    pub fn to_bits(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({}v{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Thread,
    Event,
    Mutex,
    Semaphore,
    ClientSession,
    ServerSession,
}

#[derive(Debug)]
pub enum Object {
    Thread(Thread),
    Event(Event),
    Mutex(Mutex),
    Semaphore(Semaphore),
    ClientSession(ClientSession),
    ServerSession(ServerSession),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Thread(_) => ObjectKind::Thread,
            Object::Event(_) => ObjectKind::Event,
            Object::Mutex(_) => ObjectKind::Mutex,
            Object::Semaphore(_) => ObjectKind::Semaphore,
            Object::ClientSession(_) => ObjectKind::ClientSession,
            Object::ServerSession(_) => ObjectKind::ServerSession,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Object::Thread(t) => &t.name,
            Object::Event(e) => &e.name,
            Object::Mutex(m) => &m.name,
            Object::Semaphore(s) => &s.name,
            Object::ClientSession(c) => &c.name,
            Object::ServerSession(s) => &s.name,
        }
    }

    /// Threads blocked on this object, for the kinds a thread can wait on.
    pub(crate) fn waiters_mut(&mut self) -> Option<&mut Vec<ObjectId>> {
        match self {
            Object::Thread(t) => Some(&mut t.waiters),
            Object::Event(e) => Some(&mut e.waiters),
            Object::Mutex(m) => Some(&mut m.waiters),
            Object::Semaphore(s) => Some(&mut s.waiters),
            Object::ClientSession(_) | Object::ServerSession(_) => None,
        }
    }

    pub(crate) fn waiters(&self) -> &[ObjectId] {
        match self {
            Object::Thread(t) => &t.waiters,
            Object::Event(e) => &e.waiters,
            Object::Mutex(m) => &m.waiters,
            Object::Semaphore(s) => &s.waiters,
            Object::ClientSession(_) | Object::ServerSession(_) => &[],
        }
    }
}

struct Slot {
    generation: u32,
    refcount: u32,
    object: Option<Object>,
}

/// Storage for every kernel object.
///
/// An object is created holding one reference, owned by whoever created it. It is destroyed when
/// its last reference is released; the slot's generation then advances so stale ids stop
/// resolving.
#[derive(Default)]
pub struct ObjectArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl fmt::Debug for ObjectArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectArena")
            .field("slots", &self.slots.len())
            .field("live", &self.live)
            .finish()
    }
}

macro_rules! typed_accessors {
    ($($get:ident, $get_mut:ident => $variant:ident($ty:ty);)*) => {$(
        pub fn $get(&self, id: ObjectId) -> Result<&$ty, KernelError> {
            match self.get(id) {
                Some(Object::$variant(object)) => Ok(object),
                Some(other) => Err(KernelError::WrongObjectKind {
                    expected: ObjectKind::$variant,
                    found: other.kind(),
                }),
                None => Err(KernelError::ObjectGone(id)),
            }
        }

        pub fn $get_mut(&mut self, id: ObjectId) -> Result<&mut $ty, KernelError> {
            match self.get_mut(id) {
                Some(Object::$variant(object)) => Ok(object),
                Some(other) => Err(KernelError::WrongObjectKind {
                    expected: ObjectKind::$variant,
                    found: other.kind(),
                }),
                None => Err(KernelError::ObjectGone(id)),
            }
        }
    )*};
}

impl ObjectArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: Object) -> ObjectId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.refcount = 1;
            slot.object = Some(object);
            return ObjectId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 1,
            refcount: 1,
            object: Some(object),
        });
        ObjectId {
            index,
            generation: 1,
        }
    }

    fn slot(&self, id: ObjectId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.object.is_some())
    }

    fn slot_mut(&mut self, id: ObjectId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.object.is_some())
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.slot(id).is_some()
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.slot(id).and_then(|slot| slot.object.as_ref())
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.slot_mut(id).and_then(|slot| slot.object.as_mut())
    }

    pub fn kind(&self, id: ObjectId) -> Result<ObjectKind, KernelError> {
        self.get(id)
            .map(Object::kind)
            .ok_or(KernelError::ObjectGone(id))
    }

    pub fn refcount(&self, id: ObjectId) -> Option<u32> {
        self.slot(id).map(|slot| slot.refcount)
    }

    /// Adds a reference. Returns false if the object is gone.
    pub fn retain(&mut self, id: ObjectId) -> bool {
        match self.slot_mut(id) {
            Some(slot) => {
                slot.refcount += 1;
                true
            }
            None => false,
        }
    }

    /// Drops a reference, returning the object if that was the last one.
    pub fn release(&mut self, id: ObjectId) -> Option<Object> {
        let slot = self.slot_mut(id)?;
        slot.refcount -= 1;
        if slot.refcount > 0 {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1).max(1);
        let object = slot.object.take();
        self.free.push(id.index);
        self.live -= 1;
        object
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    typed_accessors! {
        thread, thread_mut => Thread(Thread);
        event, event_mut => Event(Event);
        mutex, mutex_mut => Mutex(Mutex);
        semaphore, semaphore_mut => Semaphore(Semaphore);
        client_session, client_session_mut => ClientSession(ClientSession);
        server_session, server_session_mut => ServerSession(ServerSession);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ResetType;

    fn event() -> Object {
        Object::Event(Event::new(ResetType::OneShot, "test"))
    }

    #[test]
    fn release_destroys_on_last_reference() {
        let mut arena = ObjectArena::new();
        let id = arena.insert(event());
        assert!(arena.retain(id));
        assert_eq!(arena.refcount(id), Some(2));
        assert!(arena.release(id).is_none());
        assert!(arena.contains(id));
        assert!(matches!(arena.release(id), Some(Object::Event(_))));
        assert!(!arena.contains(id));
        assert!(arena.is_empty());
    }

    #[test]
    fn reused_slot_does_not_resolve_stale_id() {
        let mut arena = ObjectArena::new();
        let old = arena.insert(event());
        arena.release(old);
        let new = arena.insert(event());
        assert_ne!(old, new);
        assert!(arena.get(old).is_none());
        assert!(!arena.retain(old));
        assert!(arena.release(old).is_none());
        assert!(arena.contains(new));
    }

    #[test]
    fn typed_access_reports_kind_mismatch() {
        let mut arena = ObjectArena::new();
        let id = arena.insert(event());
        assert!(arena.event(id).is_ok());
        assert_eq!(
            arena.mutex(id).unwrap_err(),
            KernelError::WrongObjectKind {
                expected: ObjectKind::Mutex,
                found: ObjectKind::Event
            }
        );
    }

    #[test]
    fn id_bits_round_trip() {
        let mut arena = ObjectArena::new();
        let id = arena.insert(event());
        assert_eq!(ObjectId::from_bits(id.to_bits()), id);
    }
}

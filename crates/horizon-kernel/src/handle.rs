use core::fmt;

use crate::error::KernelError;
use crate::object::ObjectId;

/// Slots per process handle table.
pub const MAX_HANDLES: usize = 4096;

const GENERATION_BITS: u32 = 15;
const SLOT_MASK: u32 = (1 << GENERATION_BITS) - 1;
const MAX_GENERATION: u16 = (1 << GENERATION_BITS) - 1;

/// A process-local reference to a kernel object: `(generation << 15) | slot`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

/// Pseudo-handle naming the calling thread.
pub const CURRENT_THREAD: Handle = Handle(0xFFFF_8000);
/// Pseudo-handle naming the calling process.
pub const CURRENT_PROCESS: Handle = Handle(0xFFFF_8001);

impl Handle {
    pub const NULL: Handle = Handle(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    fn slot(self) -> usize {
        (self.0 & SLOT_MASK) as usize
    }

    fn generation(self) -> u32 {
        self.0 >> GENERATION_BITS
    }

    fn compose(generation: u16, slot: u16) -> Self {
        Self((u32::from(generation) << GENERATION_BITS) | u32::from(slot))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle(0x{:08X})", self.0)
    }
}

#[derive(Debug, Clone)]
struct HandleSlot {
    generation: u16,
    object: Option<ObjectId>,
}

/// Per-process table from [`Handle`]s to objects.
///
/// The table only records which object a slot names; reference counting is the kernel's job.
/// Closing a slot bumps its generation, so a copy of the closed handle keeps failing with
/// [`KernelError::InvalidHandle`] after the slot is reused.
#[derive(Debug, Clone, Default)]
pub struct HandleTable {
    slots: Vec<HandleSlot>,
    free: Vec<u16>,
    open: usize,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, object: ObjectId) -> Result<Handle, KernelError> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None if self.slots.len() < MAX_HANDLES => {
                self.slots.push(HandleSlot {
                    generation: 1,
                    object: None,
                });
                (self.slots.len() - 1) as u16
            }
            None => return Err(KernelError::HandleTableFull),
        };
        let entry = &mut self.slots[slot as usize];
        entry.object = Some(object);
        self.open += 1;
        Ok(Handle::compose(entry.generation, slot))
    }

    fn entry(&self, handle: Handle) -> Result<&HandleSlot, KernelError> {
        self.slots
            .get(handle.slot())
            .filter(|entry| {
                entry.object.is_some()
                    && u32::from(entry.generation) == handle.generation()
            })
            .ok_or(KernelError::InvalidHandle(handle.raw()))
    }

    pub fn get(&self, handle: Handle) -> Result<ObjectId, KernelError> {
        self.entry(handle)?
            .object
            .ok_or(KernelError::InvalidHandle(handle.raw()))
    }

    pub fn is_valid(&self, handle: Handle) -> bool {
        self.entry(handle).is_ok()
    }

    /// Empties the slot and invalidates every copy of `handle`.
    pub fn close(&mut self, handle: Handle) -> Result<ObjectId, KernelError> {
        self.entry(handle)?;
        let slot = handle.slot();
        let entry = &mut self.slots[slot];
        let object = entry
            .object
            .take()
            .ok_or(KernelError::InvalidHandle(handle.raw()))?;
        entry.generation = if entry.generation == MAX_GENERATION {
            1
        } else {
            entry.generation + 1
        };
        self.free.push(slot as u16);
        self.open -= 1;
        Ok(object)
    }

    /// Number of open handles.
    pub fn len(&self) -> usize {
        self.open
    }

    pub fn is_empty(&self) -> bool {
        self.open == 0
    }

    /// Closes every handle, returning the objects they named.
    pub fn clear(&mut self) -> Vec<ObjectId> {
        let objects = self
            .slots
            .iter_mut()
            .filter_map(|entry| entry.object.take())
            .collect();
        self.slots.clear();
        self.free.clear();
        self.open = 0;
        objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Object, ObjectArena};
    use crate::sync::{Event, ResetType};

    fn objects(n: usize) -> Vec<ObjectId> {
        let mut arena = ObjectArena::new();
        (0..n)
            .map(|_| arena.insert(Object::Event(Event::new(ResetType::OneShot, "e"))))
            .collect()
    }

    #[test]
    fn closed_handle_fails_and_stays_invalid_after_reuse() {
        let ids = objects(2);
        let mut table = HandleTable::new();
        let old = table.create(ids[0]).unwrap();
        assert_eq!(table.get(old).unwrap(), ids[0]);

        table.close(old).unwrap();
        assert_eq!(table.get(old), Err(KernelError::InvalidHandle(old.raw())));

        let new = table.create(ids[1]).unwrap();
        assert_eq!(new.slot(), old.slot());
        assert_ne!(new, old);
        assert_eq!(table.get(old), Err(KernelError::InvalidHandle(old.raw())));
        assert_eq!(table.get(new).unwrap(), ids[1]);
        assert!(table.close(old).is_err());
    }

    #[test]
    fn handles_are_never_zero_or_pseudo() {
        let ids = objects(1);
        let mut table = HandleTable::new();
        let handle = table.create(ids[0]).unwrap();
        assert_ne!(handle, Handle::NULL);
        assert!(table.get(Handle::NULL).is_err());
        assert!(table.get(CURRENT_THREAD).is_err());
        assert!(table.get(CURRENT_PROCESS).is_err());
    }

    #[test]
    fn table_fills_at_capacity() {
        let ids = objects(1);
        let mut table = HandleTable::new();
        for _ in 0..MAX_HANDLES {
            table.create(ids[0]).unwrap();
        }
        assert_eq!(table.create(ids[0]), Err(KernelError::HandleTableFull));
        assert_eq!(table.len(), MAX_HANDLES);
    }

    #[test]
    fn generation_wraps_without_reaching_zero() {
        let ids = objects(1);
        let mut table = HandleTable::new();
        let mut last = table.create(ids[0]).unwrap();
        for _ in 0..usize::from(MAX_GENERATION) + 2 {
            table.close(last).unwrap();
            last = table.create(ids[0]).unwrap();
            assert_ne!(last.generation(), 0);
        }
    }
}

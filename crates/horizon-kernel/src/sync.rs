use crate::object::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetType {
    /// Cleared by the first thread that acquires it.
    OneShot,
    /// Stays signalled until cleared.
    Sticky,
    /// Wakes the current waiters, then clears.
    Pulse,
}

impl TryFrom<u32> for ResetType {
    type Error = u32;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(ResetType::OneShot),
            1 => Ok(ResetType::Sticky),
            2 => Ok(ResetType::Pulse),
            other => Err(other),
        }
    }
}

#[derive(Debug)]
pub struct Event {
    pub name: String,
    pub reset_type: ResetType,
    pub signaled: bool,
    pub(crate) waiters: Vec<ObjectId>,
}

impl Event {
    pub fn new(reset_type: ResetType, name: &str) -> Self {
        Self {
            name: name.to_owned(),
            reset_type,
            signaled: false,
            waiters: Vec::new(),
        }
    }
}

/// A recursive lock owned by at most one thread.
#[derive(Debug)]
pub struct Mutex {
    pub name: String,
    pub owner: Option<ObjectId>,
    pub lock_count: u32,
    pub(crate) waiters: Vec<ObjectId>,
}

impl Mutex {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            owner: None,
            lock_count: 0,
            waiters: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct Semaphore {
    pub name: String,
    pub count: i32,
    pub max_count: i32,
    pub(crate) waiters: Vec<ObjectId>,
}

impl Semaphore {
    pub fn new(initial_count: i32, max_count: i32, name: &str) -> Self {
        Self {
            name: name.to_owned(),
            count: initial_count,
            max_count,
            waiters: Vec::new(),
        }
    }
}

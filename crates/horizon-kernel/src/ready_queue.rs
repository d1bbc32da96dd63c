use std::collections::VecDeque;

use crate::object::ObjectId;
use crate::thread::PRIORITY_LEVELS;

/// Ready threads, one FIFO per priority level.
///
/// `occupied` has bit `p` set exactly when level `p` is non-empty, so the best level is its lowest
/// set bit.
#[derive(Debug)]
pub struct ReadyQueue {
    levels: [VecDeque<ObjectId>; PRIORITY_LEVELS],
    occupied: u64,
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self {
            levels: std::array::from_fn(|_| VecDeque::new()),
            occupied: 0,
        }
    }
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn level(priority: u32) -> usize {
        (priority as usize).min(PRIORITY_LEVELS - 1)
    }

    pub fn push_back(&mut self, priority: u32, thread: ObjectId) {
        let level = Self::level(priority);
        self.levels[level].push_back(thread);
        self.occupied |= 1 << level;
    }

    pub fn push_front(&mut self, priority: u32, thread: ObjectId) {
        let level = Self::level(priority);
        self.levels[level].push_front(thread);
        self.occupied |= 1 << level;
    }

    pub fn remove(&mut self, priority: u32, thread: ObjectId) -> bool {
        let level = Self::level(priority);
        let queue = &mut self.levels[level];
        let Some(pos) = queue.iter().position(|t| *t == thread) else {
            return false;
        };
        queue.remove(pos);
        if queue.is_empty() {
            self.occupied &= !(1 << level);
        }
        true
    }

    /// Highest-priority level that has a thread, and the thread at its front.
    pub fn first(&self) -> Option<(u32, ObjectId)> {
        if self.occupied == 0 {
            return None;
        }
        let level = self.occupied.trailing_zeros() as usize;
        self.levels[level]
            .front()
            .map(|thread| (level as u32, *thread))
    }

    pub fn pop_first(&mut self) -> Option<ObjectId> {
        let (priority, _) = self.first()?;
        let level = priority as usize;
        let thread = self.levels[level].pop_front();
        if self.levels[level].is_empty() {
            self.occupied &= !(1 << level);
        }
        thread
    }

    pub fn contains(&self, thread: ObjectId) -> bool {
        self.levels.iter().any(|level| level.contains(&thread))
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Every queued thread with its priority, best first.
    pub fn iter(&self) -> impl Iterator<Item = (u32, ObjectId)> + '_ {
        self.levels
            .iter()
            .enumerate()
            .flat_map(|(level, queue)| queue.iter().map(move |t| (level as u32, *t)))
    }
}

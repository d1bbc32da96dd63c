use crate::kernel::Kernel;
use crate::object::ObjectId;
use crate::process::ProcessId;
use crate::thread::ThreadStatus;

/// Result of a reschedule that changed the running thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSwitch {
    pub from: Option<ObjectId>,
    pub to: Option<ObjectId>,
}

impl Kernel {
    /// Asks for a reschedule at the next opportunity.
    pub fn prepare_reschedule(&mut self) {
        self.reschedule_pending = true;
    }

    pub fn is_reschedule_pending(&self) -> bool {
        self.reschedule_pending
    }

    pub fn have_ready_threads(&self) -> bool {
        !self.ready_queue.is_empty()
    }

    pub fn current_thread(&self) -> Option<ObjectId> {
        self.current_thread
    }

    /// Owner of the current thread, falling back to the last scheduled process.
    pub fn current_thread_process(&self) -> Option<ProcessId> {
        self.current_thread
            .and_then(|id| self.objects.thread(id).ok())
            .map(|thread| thread.owner)
            .or(self.current_process)
    }

    /// Returns a still-running current thread to the tail of its level, then takes the best ready
    /// thread.
    fn pick_next_thread(&mut self) -> Option<ObjectId> {
        if let Some(current) = self.current_thread {
            if let Ok(thread) = self.objects.thread_mut(current) {
                if thread.status == ThreadStatus::Running {
                    thread.status = ThreadStatus::Ready;
                    let priority = thread.priority;
                    self.ready_queue.push_back(priority, current);
                }
            }
        }
        self.ready_queue.pop_first()
    }

    /// Picks the thread to run next. Returns the switch when the running thread changed.
    ///
    /// A running thread only loses the CPU to a thread of equal or better priority, since it
    /// re-enters its own level at the back before the pick.
    pub fn reschedule(&mut self) -> Option<ContextSwitch> {
        self.reschedule_pending = false;
        let from = self.current_thread;
        let next = self.pick_next_thread();

        if let Some(next) = next {
            if let Ok(thread) = self.objects.thread_mut(next) {
                thread.status = ThreadStatus::Running;
                self.current_process = Some(thread.owner);
            }
        }
        self.current_thread = next;

        if from == next {
            return None;
        }
        tracing::trace!(?from, to = ?next, "context switch");
        Some(ContextSwitch { from, to: next })
    }
}

use horizon_ipc::{ResultCode, RESULT_SUCCESS, RESULT_TIMEOUT};
use horizon_timing::{ns_to_cycles, CoreTiming};

use crate::error::KernelError;
use crate::kernel::{Kernel, KernelHost};
use crate::object::{Object, ObjectId, ObjectKind};
use crate::sync::ResetType;
use crate::thread::{ThreadStatus, WaitKind, THREAD_PRIO_LOWEST};

/// Output word written alongside a result when no object index applies.
const NO_INDEX: u32 = u32::MAX;

/// How a wait request resolved at the time it was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Acquired without blocking. `index` is the acquired object for a wait-any.
    Acquired { index: Option<usize> },
    /// Nothing was available and the timeout was zero.
    TimedOut,
    /// The thread is now waiting. Its result is written into its context when it wakes.
    Blocked,
}

impl Kernel {
    fn should_wait(&self, object: ObjectId, thread: ObjectId) -> Result<bool, KernelError> {
        match self.objects.get(object) {
            Some(Object::Event(event)) => Ok(!event.signaled),
            Some(Object::Mutex(mutex)) => Ok(mutex.owner.is_some_and(|owner| owner != thread)),
            Some(Object::Semaphore(semaphore)) => Ok(semaphore.count <= 0),
            Some(Object::Thread(target)) => Ok(target.status != ThreadStatus::Dead),
            Some(other) => Err(KernelError::WrongObjectKind {
                expected: ObjectKind::Event,
                found: other.kind(),
            }),
            None => Err(KernelError::ObjectGone(object)),
        }
    }

    fn acquire(&mut self, object: ObjectId, thread: ObjectId) {
        let first_lock = match self.objects.get_mut(object) {
            Some(Object::Event(event)) => {
                if event.reset_type == ResetType::OneShot {
                    event.signaled = false;
                }
                false
            }
            Some(Object::Mutex(mutex)) => {
                mutex.owner = Some(thread);
                mutex.lock_count += 1;
                mutex.lock_count == 1
            }
            Some(Object::Semaphore(semaphore)) => {
                semaphore.count -= 1;
                false
            }
            _ => false,
        };
        if first_lock {
            if let Ok(owner) = self.objects.thread_mut(thread) {
                owner.held_mutexes.push(object);
            }
        }
    }

    fn wake_after_delay<C: KernelHost>(
        &mut self,
        timing: &mut CoreTiming<C>,
        thread: ObjectId,
        timeout_ns: i64,
    ) {
        if timeout_ns < 0 {
            return;
        }
        let event = match self.wakeup_event {
            Some(event) => event,
            None => {
                self.register_timing_events(timing);
                match self.wakeup_event {
                    Some(event) => event,
                    None => return,
                }
            }
        };
        let cycles = i64::try_from(ns_to_cycles(timeout_ns as u64)).unwrap_or(i64::MAX);
        timing.schedule_event(cycles, event, thread.to_bits());
        if let Ok(thread) = self.objects.thread_mut(thread) {
            thread.timeout_pending = true;
        }
    }

    fn cancel_wakeup<C>(&mut self, timing: &mut CoreTiming<C>, thread: ObjectId) {
        let Ok(state) = self.objects.thread_mut(thread) else {
            return;
        };
        if !state.timeout_pending {
            return;
        }
        state.timeout_pending = false;
        if let Some(event) = self.wakeup_event {
            timing.unschedule_event(event, thread.to_bits());
        }
    }

    /// Drops `thread` from the waiter list of everything it waits on.
    fn detach_from_wait_objects(&mut self, thread: ObjectId) {
        let wait_objects = match self.objects.thread_mut(thread) {
            Ok(state) => std::mem::take(&mut state.wait_objects),
            Err(_) => return,
        };
        for object in wait_objects {
            if let Some(waiters) = self.objects.get_mut(object).and_then(Object::waiters_mut) {
                waiters.retain(|waiter| *waiter != thread);
            }
            self.release_object(object);
        }
    }

    /// Blocks, or immediately resolves, the current thread's wait on `objects`.
    ///
    /// With `wait_all` the wait is satisfied only when every object is available at once, and all
    /// of them are acquired together. Otherwise the first available object in list order is
    /// acquired. A negative timeout waits forever; zero never blocks.
    pub fn wait_synchronization<C: KernelHost>(
        &mut self,
        timing: &mut CoreTiming<C>,
        objects: &[ObjectId],
        wait_all: bool,
        timeout_ns: i64,
    ) -> Result<WaitOutcome, KernelError> {
        let thread = self.current_thread.ok_or(KernelError::NoCurrentThread)?;
        let waits = objects
            .iter()
            .map(|object| self.should_wait(*object, thread))
            .collect::<Result<Vec<_>, _>>()?;

        if wait_all {
            if waits.iter().all(|w| !w) {
                for object in objects {
                    self.acquire(*object, thread);
                }
                return Ok(WaitOutcome::Acquired { index: None });
            }
        } else if let Some(index) = waits.iter().position(|w| !w) {
            self.acquire(objects[index], thread);
            return Ok(WaitOutcome::Acquired { index: Some(index) });
        }

        if timeout_ns == 0 {
            return Ok(WaitOutcome::TimedOut);
        }

        for object in objects {
            self.objects.retain(*object);
            if let Some(waiters) = self.objects.get_mut(*object).and_then(Object::waiters_mut) {
                waiters.push(thread);
            }
        }
        let state = self.objects.thread_mut(thread)?;
        state.wait_objects = objects.to_vec();
        state.status = ThreadStatus::Waiting(if wait_all {
            WaitKind::SynchAll
        } else {
            WaitKind::SynchAny
        });
        self.wake_after_delay(timing, thread, timeout_ns);
        self.prepare_reschedule();
        tracing::trace!(?thread, count = objects.len(), wait_all, timeout_ns, "thread waiting");
        Ok(WaitOutcome::Blocked)
    }

    /// Puts the current thread to sleep. Zero yields to other ready threads of the same priority.
    pub fn sleep_thread<C: KernelHost>(
        &mut self,
        timing: &mut CoreTiming<C>,
        timeout_ns: i64,
    ) -> Result<(), KernelError> {
        let thread = self.current_thread.ok_or(KernelError::NoCurrentThread)?;
        if timeout_ns == 0 {
            self.prepare_reschedule();
            return Ok(());
        }
        self.objects.thread_mut(thread)?.status = ThreadStatus::Waiting(WaitKind::Sleep);
        self.wake_after_delay(timing, thread, timeout_ns);
        self.prepare_reschedule();
        Ok(())
    }

    /// Returns a waiting thread to Ready with `result` (and `output` in r1).
    ///
    /// The thread leaves every waiter list it is on and its timeout is cancelled before it is
    /// queued, so nothing can resolve it a second time.
    pub fn resume_from_wait<C>(
        &mut self,
        timing: &mut CoreTiming<C>,
        thread: ObjectId,
        result: ResultCode,
        output: Option<u32>,
    ) -> Result<(), KernelError> {
        self.detach_from_wait_objects(thread);
        self.cancel_wakeup(timing, thread);
        let state = self.objects.thread_mut(thread)?;
        state.context.set_return(result, output);
        state.status = ThreadStatus::Ready;
        let priority = state.priority;
        self.ready_queue.push_back(priority, thread);
        self.prepare_reschedule();
        Ok(())
    }

    /// Timeout event handler. Ignores threads that already woke or no longer exist.
    pub(crate) fn resume_from_timeout<C>(&mut self, timing: &mut CoreTiming<C>, thread: ObjectId) {
        let status = match self.objects.thread_mut(thread) {
            Ok(state) => {
                state.timeout_pending = false;
                state.status
            }
            Err(_) => {
                tracing::trace!(?thread, "timeout for destroyed thread ignored");
                return;
            }
        };
        let resolved = match status {
            ThreadStatus::Waiting(WaitKind::Sleep) => {
                self.resume_from_wait(timing, thread, RESULT_SUCCESS, None)
            }
            ThreadStatus::Waiting(_) => {
                self.resume_from_wait(timing, thread, RESULT_TIMEOUT, Some(NO_INDEX))
            }
            _ => {
                tracing::trace!(?thread, ?status, "stale timeout ignored");
                Ok(())
            }
        };
        if let Err(err) = resolved {
            tracing::warn!(?thread, %err, "failed to resolve wait timeout");
        }
    }

    /// The best-priority waiter on `object` whose wait is satisfied now, with its r1 output.
    fn next_satisfied_waiter(&self, object: ObjectId) -> Option<(ObjectId, u32)> {
        let waiters = self.objects.get(object)?.waiters();
        let mut best: Option<(u32, ObjectId, u32)> = None;
        for waiter in waiters {
            let Ok(thread) = self.objects.thread(*waiter) else {
                continue;
            };
            let output = match thread.status {
                ThreadStatus::Waiting(WaitKind::SynchAll) => {
                    let ready = thread
                        .wait_objects
                        .iter()
                        .all(|o| matches!(self.should_wait(*o, *waiter), Ok(false)));
                    ready.then_some(NO_INDEX)
                }
                ThreadStatus::Waiting(WaitKind::SynchAny) => {
                    match self.should_wait(object, *waiter) {
                        Ok(false) => thread
                            .wait_objects
                            .iter()
                            .position(|o| *o == object)
                            .map(|index| index as u32),
                        _ => None,
                    }
                }
                _ => None,
            };
            let Some(output) = output else {
                continue;
            };
            if best.map_or(true, |(priority, _, _)| thread.priority < priority) {
                best = Some((thread.priority, *waiter, output));
            }
        }
        best.map(|(_, thread, output)| (thread, output))
    }

    /// Wakes waiters on `object` for as long as it can satisfy them.
    fn wake_waiters<C>(&mut self, timing: &mut CoreTiming<C>, object: ObjectId) {
        while let Some((thread, output)) = self.next_satisfied_waiter(object) {
            let all = self
                .objects
                .thread(thread)
                .map(|t| t.status == ThreadStatus::Waiting(WaitKind::SynchAll))
                .unwrap_or(false);
            if all {
                let objects = self
                    .objects
                    .thread(thread)
                    .map(|t| t.wait_objects.clone())
                    .unwrap_or_default();
                for o in objects {
                    self.acquire(o, thread);
                }
            } else {
                self.acquire(object, thread);
            }
            if let Err(err) = self.resume_from_wait(timing, thread, RESULT_SUCCESS, Some(output)) {
                tracing::warn!(?thread, %err, "failed to wake waiter");
                break;
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Synchronization objects
    // ---------------------------------------------------------------------------------------------

    pub fn signal_event<C>(
        &mut self,
        timing: &mut CoreTiming<C>,
        event: ObjectId,
    ) -> Result<(), KernelError> {
        self.objects.event_mut(event)?.signaled = true;
        self.wake_waiters(timing, event);
        let state = self.objects.event_mut(event)?;
        if state.reset_type == ResetType::Pulse {
            state.signaled = false;
        }
        Ok(())
    }

    pub fn clear_event(&mut self, event: ObjectId) -> Result<(), KernelError> {
        self.objects.event_mut(event)?.signaled = false;
        Ok(())
    }

    /// Drops one lock level held by the current thread.
    pub fn release_mutex<C>(
        &mut self,
        timing: &mut CoreTiming<C>,
        mutex: ObjectId,
    ) -> Result<(), KernelError> {
        let thread = self.current_thread.ok_or(KernelError::NoCurrentThread)?;
        let state = self.objects.mutex_mut(mutex)?;
        if state.owner != Some(thread) {
            return Err(KernelError::MutexNotOwned);
        }
        state.lock_count -= 1;
        if state.lock_count == 0 {
            self.force_unlock(timing, mutex, thread);
        }
        Ok(())
    }

    fn force_unlock<C>(&mut self, timing: &mut CoreTiming<C>, mutex: ObjectId, owner: ObjectId) {
        if let Ok(state) = self.objects.mutex_mut(mutex) {
            state.owner = None;
            state.lock_count = 0;
        }
        if let Ok(thread) = self.objects.thread_mut(owner) {
            thread.held_mutexes.retain(|m| *m != mutex);
        }
        self.wake_waiters(timing, mutex);
    }

    /// Adds `release` to the count and returns the previous count.
    pub fn release_semaphore<C>(
        &mut self,
        timing: &mut CoreTiming<C>,
        semaphore: ObjectId,
        release: i32,
    ) -> Result<i32, KernelError> {
        let state = self.objects.semaphore_mut(semaphore)?;
        if release < 0 {
            return Err(KernelError::OutOfRange {
                what: "semaphore release count",
                value: i64::from(release),
            });
        }
        if i64::from(state.count) + i64::from(release) > i64::from(state.max_count) {
            return Err(KernelError::SemaphoreOverflow {
                count: state.count,
                release,
                max: state.max_count,
            });
        }
        let previous = state.count;
        state.count += release;
        self.wake_waiters(timing, semaphore);
        Ok(previous)
    }

    // ---------------------------------------------------------------------------------------------
    // Thread lifecycle
    // ---------------------------------------------------------------------------------------------

    /// Makes a dormant thread runnable.
    pub fn start_thread(&mut self, thread: ObjectId) -> Result<(), KernelError> {
        let state = self.objects.thread_mut(thread)?;
        if state.status != ThreadStatus::Dormant {
            return Ok(());
        }
        state.status = ThreadStatus::Ready;
        let priority = state.priority;
        self.ready_queue.push_back(priority, thread);
        self.prepare_reschedule();
        Ok(())
    }

    /// Terminates `thread` wherever it is: running, queued, or waiting.
    ///
    /// Mutexes it holds are released and threads waiting for it to exit are woken. The scheduler's
    /// reference is dropped, so the object survives only while guest handles name it.
    pub fn stop_thread<C>(
        &mut self,
        timing: &mut CoreTiming<C>,
        thread: ObjectId,
    ) -> Result<(), KernelError> {
        let state = self.objects.thread(thread)?;
        if state.status == ThreadStatus::Dead {
            return Ok(());
        }
        let (priority, owner, tls) = (state.priority, state.owner, state.tls_address);

        self.detach_from_wait_objects(thread);
        self.cancel_wakeup(timing, thread);
        self.ready_queue.remove(priority, thread);

        let state = self.objects.thread_mut(thread)?;
        state.status = ThreadStatus::Dead;
        let held = std::mem::take(&mut state.held_mutexes);
        for mutex in held {
            self.force_unlock(timing, mutex, thread);
        }
        self.wake_waiters(timing, thread);

        if let Ok(process) = self.process_mut(owner) {
            process.free_tls(tls);
        }
        if let Ok(state) = self.objects.thread(thread) {
            tracing::debug!(thread_id = state.thread_id, name = %state.name, "thread stopped");
        }
        self.prepare_reschedule();
        self.release_object(thread);
        Ok(())
    }

    pub fn exit_current_thread<C>(&mut self, timing: &mut CoreTiming<C>) -> Result<(), KernelError> {
        let thread = self.current_thread.ok_or(KernelError::NoCurrentThread)?;
        self.stop_thread(timing, thread)
    }

    pub fn set_thread_priority(&mut self, thread: ObjectId, priority: u32) -> Result<(), KernelError> {
        if priority > THREAD_PRIO_LOWEST {
            return Err(KernelError::OutOfRange {
                what: "thread priority",
                value: i64::from(priority),
            });
        }
        let state = self.objects.thread_mut(thread)?;
        let old = state.priority;
        state.priority = priority;
        state.nominal_priority = priority;
        if state.status == ThreadStatus::Ready && self.ready_queue.remove(old, thread) {
            self.ready_queue.push_back(priority, thread);
        }
        self.prepare_reschedule();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use horizon_timing::{ms_to_cycles, TimingHost};

    use super::*;
    use crate::process::ProcessId;

    #[derive(Default)]
    struct Host {
        kernel: Kernel,
        timing: CoreTiming<Host>,
    }

    impl TimingHost for Host {
        fn core_timing(&mut self) -> &mut CoreTiming<Self> {
            &mut self.timing
        }
    }

    impl KernelHost for Host {
        fn kernel_and_timing(&mut self) -> (&mut Kernel, &mut CoreTiming<Self>) {
            (&mut self.kernel, &mut self.timing)
        }
    }

    fn spawn(host: &mut Host, pid: ProcessId, priority: u32) -> ObjectId {
        let thread = host
            .kernel
            .create_thread(pid, "t", 0x10_0000, priority, 0, 0x1000_0000)
            .unwrap();
        host.kernel.start_thread(thread).unwrap();
        thread
    }

    fn make_current(host: &mut Host, thread: ObjectId) {
        let priority = host.kernel.thread(thread).unwrap().priority;
        host.kernel.ready_queue.remove(priority, thread);
        host.kernel.objects.thread_mut(thread).unwrap().status = ThreadStatus::Running;
        host.kernel.current_thread = Some(thread);
    }

    fn setup() -> (Host, ProcessId) {
        let mut host = Host::default();
        let pid = host.kernel.create_process("app", 0);
        (host, pid)
    }

    #[test]
    fn zero_timeout_never_blocks() {
        let (mut host, pid) = setup();
        let thread = spawn(&mut host, pid, 30);
        host.kernel.reschedule();
        let event = host.kernel.create_event(ResetType::OneShot, "e");

        let outcome = host
            .kernel
            .wait_synchronization(&mut host.timing, &[event], false, 0)
            .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert_eq!(host.kernel.thread(thread).unwrap().status, ThreadStatus::Running);
        assert!(host.kernel.objects().event(event).unwrap().waiters.is_empty());
        assert_eq!(host.timing.pending_events(), 0);
    }

    #[test]
    fn wait_times_out_through_core_timing() {
        let (mut host, pid) = setup();
        let thread = spawn(&mut host, pid, 30);
        host.kernel.reschedule();
        let event = host.kernel.create_event(ResetType::OneShot, "e");

        let outcome = host
            .kernel
            .wait_synchronization(&mut host.timing, &[event], false, 1_000_000)
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Blocked);
        assert_eq!(host.kernel.objects().refcount(event), Some(2));

        host.timing.add_ticks(ms_to_cycles(2));
        CoreTiming::advance(&mut host);

        let state = host.kernel.thread(thread).unwrap();
        assert_eq!(state.status, ThreadStatus::Ready);
        assert_eq!(state.context.cpu_registers[0], RESULT_TIMEOUT.raw());
        assert_eq!(state.context.cpu_registers[1], u32::MAX);
        assert!(!state.has_timeout_pending());
        assert!(host.kernel.objects().event(event).unwrap().waiters.is_empty());
        assert_eq!(host.kernel.objects().refcount(event), Some(1));
    }

    #[test]
    fn signal_wakes_waiter_and_cancels_timeout() {
        let (mut host, pid) = setup();
        let thread = spawn(&mut host, pid, 30);
        host.kernel.reschedule();
        let a = host.kernel.create_event(ResetType::OneShot, "a");
        let b = host.kernel.create_event(ResetType::OneShot, "b");

        host.kernel
            .wait_synchronization(&mut host.timing, &[a, b], false, 5_000_000)
            .unwrap();
        assert_eq!(host.timing.pending_events(), 1);

        host.kernel.signal_event(&mut host.timing, b).unwrap();
        let state = host.kernel.thread(thread).unwrap();
        assert_eq!(state.status, ThreadStatus::Ready);
        assert_eq!(state.context.cpu_registers[0], RESULT_SUCCESS.raw());
        assert_eq!(state.context.cpu_registers[1], 1);
        assert_eq!(host.timing.pending_events(), 0);
        // One-shot events are consumed by the woken thread.
        assert!(!host.kernel.objects().event(b).unwrap().signaled);
        assert!(host.kernel.objects().event(a).unwrap().waiters.is_empty());
    }

    #[test]
    fn wait_all_needs_every_object() {
        let (mut host, pid) = setup();
        let thread = spawn(&mut host, pid, 30);
        host.kernel.reschedule();
        let a = host.kernel.create_event(ResetType::Sticky, "a");
        let b = host.kernel.create_event(ResetType::Sticky, "b");

        host.kernel
            .wait_synchronization(&mut host.timing, &[a, b], true, -1)
            .unwrap();
        host.kernel.signal_event(&mut host.timing, a).unwrap();
        assert!(host.kernel.thread(thread).unwrap().is_waiting());
        host.kernel.signal_event(&mut host.timing, b).unwrap();
        assert_eq!(host.kernel.thread(thread).unwrap().status, ThreadStatus::Ready);
    }

    #[test]
    fn mutex_passes_to_highest_priority_waiter() {
        let (mut host, pid) = setup();
        let owner = spawn(&mut host, pid, 20);
        let low = spawn(&mut host, pid, 40);
        let high = spawn(&mut host, pid, 30);
        host.kernel.reschedule();
        let mutex = host.kernel.create_mutex(true, "m");
        assert_eq!(host.kernel.objects().mutex(mutex).unwrap().owner, Some(owner));

        for waiter in [low, high] {
            make_current(&mut host, waiter);
            let outcome = host
                .kernel
                .wait_synchronization(&mut host.timing, &[mutex], false, -1)
                .unwrap();
            assert_eq!(outcome, WaitOutcome::Blocked);
        }
        make_current(&mut host, low);
        assert_eq!(
            host.kernel.release_mutex(&mut host.timing, mutex),
            Err(KernelError::MutexNotOwned)
        );

        make_current(&mut host, owner);
        host.kernel.release_mutex(&mut host.timing, mutex).unwrap();
        let state = host.kernel.objects().mutex(mutex).unwrap();
        assert_eq!(state.owner, Some(high));
        assert_eq!(state.lock_count, 1);
        assert!(host.kernel.thread(low).unwrap().is_waiting());
        assert!(host.kernel.thread(owner).unwrap().held_mutexes().is_empty());
    }

    #[test]
    fn semaphore_release_wakes_up_to_count() {
        let (mut host, pid) = setup();
        let waiters: Vec<_> = (0..3).map(|_| spawn(&mut host, pid, 30)).collect();
        let semaphore = host.kernel.create_semaphore(0, 2, "s").unwrap();
        for waiter in &waiters {
            make_current(&mut host, *waiter);
            host.kernel
                .wait_synchronization(&mut host.timing, &[semaphore], false, -1)
                .unwrap();
        }
        assert_eq!(
            host.kernel.release_semaphore(&mut host.timing, semaphore, 2).unwrap(),
            0
        );
        let woken = waiters
            .iter()
            .filter(|t| !host.kernel.thread(**t).unwrap().is_waiting())
            .count();
        assert_eq!(woken, 2);
        assert_eq!(host.kernel.objects().semaphore(semaphore).unwrap().count, 0);
        assert!(matches!(
            host.kernel.release_semaphore(&mut host.timing, semaphore, 3),
            Err(KernelError::SemaphoreOverflow { .. })
        ));
    }

    #[test]
    fn stopping_a_waiting_thread_deregisters_it() {
        let (mut host, pid) = setup();
        let thread = spawn(&mut host, pid, 30);
        host.kernel.reschedule();
        let event = host.kernel.create_event(ResetType::OneShot, "e");
        host.kernel
            .wait_synchronization(&mut host.timing, &[event], false, 1_000_000)
            .unwrap();

        host.kernel.stop_thread(&mut host.timing, thread).unwrap();
        assert!(!host.kernel.objects().contains(thread));
        assert!(host.kernel.objects().event(event).unwrap().waiters.is_empty());
        assert_eq!(host.kernel.objects().refcount(event), Some(1));
        assert_eq!(host.timing.pending_events(), 0);

        // A later signal has nobody stale to wake.
        host.kernel.signal_event(&mut host.timing, event).unwrap();
        assert!(host.kernel.objects().event(event).unwrap().signaled);
    }

    #[test]
    fn stopping_a_thread_releases_its_mutexes_and_wakes_joiners() {
        let (mut host, pid) = setup();
        let victim = spawn(&mut host, pid, 30);
        let joiner = spawn(&mut host, pid, 30);
        host.kernel.reschedule();
        assert_eq!(host.kernel.current_thread(), Some(victim));
        let mutex = host.kernel.create_mutex(true, "m");

        make_current(&mut host, joiner);
        host.kernel
            .wait_synchronization(&mut host.timing, &[victim, mutex], true, -1)
            .unwrap();

        host.kernel.stop_thread(&mut host.timing, victim).unwrap();
        let state = host.kernel.thread(joiner).unwrap();
        assert_eq!(state.status, ThreadStatus::Ready);
        assert_eq!(host.kernel.objects().mutex(mutex).unwrap().owner, Some(joiner));
    }

    #[test]
    fn sleep_resolves_with_success() {
        let (mut host, pid) = setup();
        let thread = spawn(&mut host, pid, 30);
        host.kernel.reschedule();
        host.kernel.sleep_thread(&mut host.timing, 1_000).unwrap();
        assert!(host.kernel.thread(thread).unwrap().is_waiting());
        assert!(host.kernel.is_reschedule_pending());

        host.timing.idle();
        CoreTiming::advance(&mut host);
        let state = host.kernel.thread(thread).unwrap();
        assert_eq!(state.status, ThreadStatus::Ready);
        assert_eq!(state.context.cpu_registers[0], RESULT_SUCCESS.raw());
    }
}

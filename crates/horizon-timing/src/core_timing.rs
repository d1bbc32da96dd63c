use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

use crate::cycles::{cycles_to_us, BASE_CLOCK_RATE_ARM11};

/// Upper bound on one execution slice, in cycles.
pub const DEFAULT_MAX_SLICE_LENGTH: i64 = 20_000;

/// Callback invoked when a scheduled event fires: `(host, user_data, cycles_late)`.
pub type TimedCallback<C> = fn(&mut C, u64, i64);

/// Handle returned by [`CoreTiming::register_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u32);

impl EventId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// A host context that owns a [`CoreTiming`] driving itself.
pub trait TimingHost: Sized {
    fn core_timing(&mut self) -> &mut CoreTiming<Self>;
}

struct EventType<C> {
    name: String,
    callback: TimedCallback<C>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduledEvent {
    target: u64,
    fifo_order: u64,
    user_data: u64,
    event: EventId,
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // `BinaryHeap` is a max-heap; invert so the earliest target (then the earliest
        // registration) is popped first.
        (other.target, other.fifo_order).cmp(&(self.target, self.fifo_order))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Virtual cycle counter plus the queue of pending timed events.
///
/// The counter is split into `global_timer` (cycles up to the start of the current slice) and the
/// part of the current slice already executed (`slice_length - downcount`). The execution engine
/// burns `downcount` through [`CoreTiming::add_ticks`]; [`CoreTiming::ticks`] is always the sum.
pub struct CoreTiming<C> {
    event_types: Vec<EventType<C>>,
    queue: BinaryHeap<ScheduledEvent>,
    next_fifo_order: u64,
    global_timer: u64,
    slice_length: i64,
    downcount: i64,
    max_slice_length: i64,
    idled_cycles: u64,
}

impl<C> fmt::Debug for CoreTiming<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreTiming")
            .field("events", &self.event_types.len())
            .field("pending", &self.queue.len())
            .field("global_timer", &self.global_timer)
            .field("slice_length", &self.slice_length)
            .field("downcount", &self.downcount)
            .finish()
    }
}

impl<C> Default for CoreTiming<C> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SLICE_LENGTH)
    }
}

impl<C> CoreTiming<C> {
    pub fn new(max_slice_length: i64) -> Self {
        let max_slice_length = max_slice_length.max(1);
        Self {
            event_types: Vec::new(),
            queue: BinaryHeap::new(),
            next_fifo_order: 0,
            global_timer: 0,
            slice_length: max_slice_length,
            downcount: max_slice_length,
            max_slice_length,
            idled_cycles: 0,
        }
    }

    /// Registers a named event kind. Registering the same name again returns the original id.
    pub fn register_event(&mut self, name: &str, callback: TimedCallback<C>) -> EventId {
        if let Some(index) = self.event_types.iter().position(|ty| ty.name == name) {
            tracing::debug!(event = name, "event type already registered");
            return EventId(index as u32);
        }
        let id = EventId(self.event_types.len() as u32);
        self.event_types.push(EventType {
            name: name.to_owned(),
            callback,
        });
        id
    }

    pub fn event_name(&self, event: EventId) -> Option<&str> {
        self.event_types
            .get(event.0 as usize)
            .map(|ty| ty.name.as_str())
    }

    /// Current virtual time in cycles.
    pub fn ticks(&self) -> u64 {
        let executed = (self.slice_length - self.downcount).max(0) as u64;
        self.global_timer + executed
    }

    pub fn global_time_us(&self) -> u64 {
        cycles_to_us(self.ticks())
    }

    /// Cycles left in the current slice. May go negative when the engine overruns.
    pub fn downcount(&self) -> i64 {
        self.downcount
    }

    pub fn slice_length(&self) -> i64 {
        self.slice_length
    }

    pub fn max_slice_length(&self) -> i64 {
        self.max_slice_length
    }

    /// Total cycles skipped by [`CoreTiming::idle`].
    pub fn idled_cycles(&self) -> u64 {
        self.idled_cycles
    }

    pub fn clock_rate(&self) -> u64 {
        BASE_CLOCK_RATE_ARM11
    }

    /// Consumes `ticks` cycles of the current slice.
    pub fn add_ticks(&mut self, ticks: u64) {
        let ticks = i64::try_from(ticks).unwrap_or(i64::MAX);
        self.downcount = self.downcount.saturating_sub(ticks);
    }

    /// Schedules `event` to fire `cycles_into_future` cycles from now.
    ///
    /// A negative delta places the target in the past; it fires on the next [`advance`] with the
    /// corresponding lateness. Periodic callbacks use this to compensate for `cycles_late`.
    ///
    /// [`advance`]: CoreTiming::advance
    pub fn schedule_event(&mut self, cycles_into_future: i64, event: EventId, user_data: u64) {
        debug_assert!(
            (event.0 as usize) < self.event_types.len(),
            "scheduling unregistered event {event:?}"
        );
        let now = self.ticks();
        let target = now.saturating_add_signed(cycles_into_future);
        let fifo_order = self.next_fifo_order;
        self.next_fifo_order += 1;
        self.queue.push(ScheduledEvent {
            target,
            fifo_order,
            user_data,
            event,
        });

        let slice_end = self.global_timer + self.slice_length.max(0) as u64;
        if target < slice_end {
            // Shrink the running slice so the engine yields in time for the new event.
            let executed = self.slice_length - self.downcount;
            let remaining = target.saturating_sub(now) as i64;
            self.slice_length = executed + remaining;
            self.downcount = remaining;
        }
    }

    /// Removes every pending instance of `event` with matching `user_data`. No-op if none.
    pub fn unschedule_event(&mut self, event: EventId, user_data: u64) {
        self.queue
            .retain(|evt| !(evt.event == event && evt.user_data == user_data));
    }

    /// Removes every pending instance of `event`.
    pub fn unschedule_all(&mut self, event: EventId) {
        self.queue.retain(|evt| evt.event != event);
    }

    pub fn is_scheduled(&self, event: EventId, user_data: u64) -> bool {
        self.queue
            .iter()
            .any(|evt| evt.event == event && evt.user_data == user_data)
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Target cycle of the earliest pending event.
    pub fn next_target(&self) -> Option<u64> {
        self.queue.peek().map(|evt| evt.target)
    }

    /// Skips the rest of the current slice without executing it.
    ///
    /// The clock jumps to the next pending target (or to the end of the slice when nothing is
    /// pending), so the following [`CoreTiming::advance`] fires that event with zero lateness.
    pub fn idle(&mut self) {
        let now = self.ticks();
        let slice_end = self.global_timer + self.slice_length.max(0) as u64;
        let end = match self.next_target() {
            Some(target) => target.max(now),
            None => slice_end.max(now),
        };
        self.idled_cycles += end - now;
        self.slice_length = (end - self.global_timer) as i64;
        self.downcount = 0;
        tracing::trace!(cycles = end - now, "idle");
    }

    fn pop_due(&mut self) -> Option<ScheduledEvent> {
        match self.queue.peek() {
            Some(evt) if evt.target <= self.global_timer => self.queue.pop(),
            _ => None,
        }
    }

    fn start_slice(&mut self) {
        let length = match self.next_target() {
            Some(target) => {
                let until = target.saturating_sub(self.global_timer);
                i64::try_from(until)
                    .unwrap_or(i64::MAX)
                    .min(self.max_slice_length)
            }
            None => self.max_slice_length,
        };
        self.slice_length = length;
        self.downcount = length;
    }
}

impl<C: TimingHost> CoreTiming<C> {
    /// Closes the current slice, fires every due event in (target, registration) order and opens
    /// the next slice.
    ///
    /// Callbacks run with the clock parked at the end of the closed slice, so events they schedule
    /// with a zero delay fire in this same call.
    pub fn advance(host: &mut C) {
        let timing = host.core_timing();
        let executed = (timing.slice_length - timing.downcount).max(0) as u64;
        timing.global_timer += executed;
        timing.slice_length = 0;
        timing.downcount = 0;

        loop {
            let timing = host.core_timing();
            let Some(evt) = timing.pop_due() else {
                break;
            };
            let Some(callback) = timing
                .event_types
                .get(evt.event.0 as usize)
                .map(|ty| ty.callback)
            else {
                continue;
            };
            let cycles_late = (timing.global_timer - evt.target) as i64;
            callback(host, evt.user_data, cycles_late);
        }

        host.core_timing().start_slice();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Host {
        timing: CoreTiming<Host>,
        fired: Vec<(u64, i64, u64)>,
        periodic: Option<EventId>,
    }

    impl TimingHost for Host {
        fn core_timing(&mut self) -> &mut CoreTiming<Self> {
            &mut self.timing
        }
    }

    fn record(host: &mut Host, user_data: u64, cycles_late: i64) {
        let now = host.timing.ticks();
        host.fired.push((user_data, cycles_late, now));
    }

    fn periodic(host: &mut Host, user_data: u64, cycles_late: i64) {
        record(host, user_data, cycles_late);
        let event = host.periodic.unwrap();
        host.timing.schedule_event(1_000 - cycles_late, event, user_data);
    }

    fn run_for(host: &mut Host, cycles: u64) {
        host.timing.add_ticks(cycles);
        CoreTiming::advance(host);
    }

    fn fired_ids(host: &Host) -> Vec<u64> {
        host.fired.iter().map(|(id, _, _)| *id).collect()
    }

    #[test]
    fn earlier_event_fires_first_and_later_waits() {
        let mut host = Host::default();
        let ev = host.timing.register_event("test", record);
        host.timing.schedule_event(100, ev, 0xA);
        host.timing.schedule_event(50, ev, 0xB);

        run_for(&mut host, 60);
        assert_eq!(host.timing.ticks(), 60);
        assert_eq!(fired_ids(&host), vec![0xB]);
        assert_eq!(host.fired[0].1, 10);

        run_for(&mut host, 90);
        assert_eq!(host.timing.ticks(), 150);
        assert_eq!(fired_ids(&host), vec![0xB, 0xA]);
        assert_eq!(host.fired[1].1, 50);
    }

    #[test]
    fn equal_targets_fire_in_registration_order() {
        let mut host = Host::default();
        let a = host.timing.register_event("a", record);
        let b = host.timing.register_event("b", record);
        host.timing.schedule_event(10, b, 1);
        host.timing.schedule_event(10, a, 2);
        host.timing.schedule_event(10, b, 3);
        run_for(&mut host, 10);
        assert_eq!(fired_ids(&host), vec![1, 2, 3]);
        assert!(host.fired.iter().all(|(_, late, _)| *late == 0));
    }

    #[test]
    fn register_is_idempotent_by_name() {
        let mut host = Host::default();
        let first = host.timing.register_event("dup", record);
        let second = host.timing.register_event("dup", periodic);
        assert_eq!(first, second);
        assert_eq!(host.timing.event_name(first), Some("dup"));
    }

    #[test]
    fn unschedule_matches_user_data_and_is_noop_when_absent() {
        let mut host = Host::default();
        let ev = host.timing.register_event("ev", record);
        host.timing.schedule_event(10, ev, 1);
        host.timing.schedule_event(10, ev, 2);
        host.timing.unschedule_event(ev, 1);
        host.timing.unschedule_event(ev, 99);
        assert!(!host.timing.is_scheduled(ev, 1));
        assert!(host.timing.is_scheduled(ev, 2));
        run_for(&mut host, 20);
        assert_eq!(fired_ids(&host), vec![2]);

        host.timing.schedule_event(5, ev, 7);
        host.timing.schedule_event(6, ev, 8);
        host.timing.unschedule_all(ev);
        assert_eq!(host.timing.pending_events(), 0);
    }

    #[test]
    fn callback_can_reschedule_itself() {
        let mut host = Host::default();
        let ev = host.timing.register_event("periodic", periodic);
        host.periodic = Some(ev);
        host.timing.schedule_event(1_000, ev, 0);

        for _ in 0..5 {
            run_for(&mut host, 700);
        }
        // 3500 cycles elapsed: fired at 1400 (late 400), 2100 (late 100), 3500 (late 500).
        let times: Vec<u64> = host.fired.iter().map(|(_, _, now)| *now).collect();
        assert_eq!(times, vec![1_400, 2_100, 3_500]);
        // Compensation keeps the cadence anchored at multiples of 1000.
        assert_eq!(host.timing.next_target(), Some(4_000));
    }

    #[test]
    fn scheduling_inside_slice_shortens_it() {
        let mut host = Host::default();
        let ev = host.timing.register_event("ev", record);
        assert_eq!(host.timing.downcount(), DEFAULT_MAX_SLICE_LENGTH);
        host.timing.add_ticks(100);
        host.timing.schedule_event(50, ev, 0);
        assert_eq!(host.timing.downcount(), 50);
        assert_eq!(host.timing.ticks(), 100);
        host.timing.add_ticks(50);
        CoreTiming::advance(&mut host);
        assert_eq!(fired_ids(&host), vec![0]);
        assert_eq!(host.fired[0].1, 0);
    }

    #[test]
    fn next_slice_is_bounded_by_next_event_and_max() {
        let mut host = Host::default();
        let ev = host.timing.register_event("ev", record);
        CoreTiming::advance(&mut host);
        assert_eq!(host.timing.downcount(), DEFAULT_MAX_SLICE_LENGTH);

        host.timing.schedule_event(DEFAULT_MAX_SLICE_LENGTH * 3, ev, 0);
        CoreTiming::advance(&mut host);
        assert_eq!(host.timing.downcount(), DEFAULT_MAX_SLICE_LENGTH);

        host.timing.schedule_event(300, ev, 1);
        CoreTiming::advance(&mut host);
        assert_eq!(host.timing.downcount(), 300);
    }

    #[test]
    fn idle_jumps_to_next_target() {
        let mut host = Host::default();
        let ev = host.timing.register_event("ev", record);
        host.timing.schedule_event(1_000_000, ev, 5);
        host.timing.idle();
        assert_eq!(host.timing.ticks(), 1_000_000);
        CoreTiming::advance(&mut host);
        assert_eq!(host.fired, vec![(5, 0, 1_000_000)]);
        assert_eq!(host.timing.idled_cycles(), 1_000_000);
    }

    #[test]
    fn idle_without_events_consumes_the_slice() {
        let mut host = Host::default();
        host.timing.add_ticks(10);
        host.timing.idle();
        assert_eq!(host.timing.ticks(), DEFAULT_MAX_SLICE_LENGTH as u64);
        assert_eq!(host.timing.idled_cycles(), DEFAULT_MAX_SLICE_LENGTH as u64 - 10);
    }

    #[test]
    fn clock_never_goes_backwards_on_overrun() {
        let mut host = Host::default();
        let ev = host.timing.register_event("ev", record);
        host.timing.schedule_event(10, ev, 0);
        // The engine overruns the 10-cycle slice by 90 cycles.
        host.timing.add_ticks(100);
        let before = host.timing.ticks();
        CoreTiming::advance(&mut host);
        assert_eq!(host.timing.ticks(), before);
        assert_eq!(host.fired, vec![(0, 90, 100)]);
    }
}

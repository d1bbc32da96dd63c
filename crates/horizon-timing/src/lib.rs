//! CoreTiming: the virtual-cycle clock and its scheduled-callback queue.
//!
//! Time is measured in ARM11 cycles. The execution engine consumes a slice of cycles at a time
//! (see [`CoreTiming::downcount`]) and the orchestrator calls [`CoreTiming::advance`] between
//! slices to fire every event whose target has been reached.
//!
//! Callbacks are plain function pointers over a host context `C` instead of stored closures, so a
//! callback gets full mutable access to the host (including the timer itself) and may reschedule
//! its own event while it runs.

mod core_timing;
mod cycles;

pub use core_timing::{
    CoreTiming, EventId, TimedCallback, TimingHost, DEFAULT_MAX_SLICE_LENGTH,
};
pub use cycles::{
    cycles_to_ms, cycles_to_ns, cycles_to_us, ms_to_cycles, ns_to_cycles, us_to_cycles,
    BASE_CLOCK_RATE_ARM11,
};

//! Kernel calls, as the execution engine issues them between instructions.
//!
//! Each call comes in two forms: a typed function, and a register-level entry in [`call_svc`]
//! that decodes arguments from the calling thread's registers and writes the result into r0
//! (and outputs into r1, r2).

use horizon_ipc::{RESULT_SUCCESS, RESULT_TIMEOUT};
use horizon_kernel::{
    Handle, KernelError, KernelHost, ObjectId, ObjectKind, PortKind, ProcessId, ResetType,
    ThreadContext, WaitOutcome, CURRENT_PROCESS, THREAD_PRIO_LOWEST,
};
use horizon_memory::GuestMemory;
use horizon_service::ServiceError;

use crate::machine::Machine;

pub type SvcResult<T> = Result<T, KernelError>;

/// Port names are at most this long, excluding the terminator.
const PORT_NAME_MAX_LENGTH: u32 = 11;
/// Cycles `GetSystemTick` burns so busy-waiting titles make progress.
const SYSTEM_TICK_COST: u64 = 150;
/// r1 after a wait that acquired every object.
const NO_INDEX: u32 = u32::MAX;

/// Most handles a single WaitSynchronizationN may name.
pub const MAX_WAIT_OBJECTS: usize = 256;

fn current_process(machine: &Machine) -> SvcResult<ProcessId> {
    machine
        .kernel
        .current_thread_process()
        .ok_or(KernelError::NoCurrentThread)
}

/// Opens a handle to a freshly created object and hands the creation reference over to it.
fn publish(machine: &mut Machine, object: ObjectId) -> SvcResult<Handle> {
    let pid = current_process(machine);
    let handle = pid.and_then(|pid| machine.kernel.create_handle(pid, object));
    machine.kernel.release_object(object);
    handle
}

fn nanoseconds(low: u32, high: u32) -> i64 {
    ((u64::from(high) << 32) | u64::from(low)) as i64
}

// -------------------------------------------------------------------------------------------------
// Threads
// -------------------------------------------------------------------------------------------------

pub fn create_thread(
    machine: &mut Machine,
    priority: u32,
    entry_point: u32,
    arg: u32,
    stack_top: u32,
    processor_id: i32,
) -> SvcResult<Handle> {
    if priority > THREAD_PRIO_LOWEST {
        return Err(KernelError::OutOfRange {
            what: "thread priority",
            value: i64::from(priority),
        });
    }
    let pid = current_process(machine)?;
    let name = format!("thread-{entry_point:08X}");
    let thread = machine
        .kernel
        .create_thread(pid, &name, entry_point, priority, arg, stack_top)?;
    let handle = machine.kernel.create_handle(pid, thread)?;
    machine.kernel.start_thread(thread)?;
    tracing::debug!(
        entry = format_args!("0x{entry_point:08X}"),
        priority,
        processor_id,
        handle = ?handle,
        "CreateThread"
    );
    Ok(handle)
}

pub fn exit_thread(machine: &mut Machine) -> SvcResult<()> {
    let (kernel, timing) = machine.kernel_and_timing();
    kernel.exit_current_thread(timing)
}

/// Zero yields to other threads of the same priority.
pub fn sleep_thread(machine: &mut Machine, nanoseconds: i64) -> SvcResult<()> {
    let (kernel, timing) = machine.kernel_and_timing();
    kernel.sleep_thread(timing, nanoseconds)
}

pub fn get_thread_priority(machine: &Machine, handle: Handle) -> SvcResult<u32> {
    let pid = current_process(machine)?;
    let thread = machine
        .kernel
        .resolve_handle_of(pid, handle, ObjectKind::Thread)?;
    Ok(machine.kernel.thread(thread)?.priority)
}

pub fn set_thread_priority(machine: &mut Machine, handle: Handle, priority: u32) -> SvcResult<()> {
    let pid = current_process(machine)?;
    let thread = machine
        .kernel
        .resolve_handle_of(pid, handle, ObjectKind::Thread)?;
    machine.kernel.set_thread_priority(thread, priority)
}

// -------------------------------------------------------------------------------------------------
// Synchronization objects
// -------------------------------------------------------------------------------------------------

pub fn create_event(machine: &mut Machine, reset_type: u32) -> SvcResult<Handle> {
    let reset_type = ResetType::try_from(reset_type).map_err(|raw| KernelError::OutOfRange {
        what: "reset type",
        value: i64::from(raw),
    })?;
    let event = machine.kernel.create_event(reset_type, "event");
    publish(machine, event)
}

pub fn signal_event(machine: &mut Machine, handle: Handle) -> SvcResult<()> {
    let pid = current_process(machine)?;
    let event = machine
        .kernel
        .resolve_handle_of(pid, handle, ObjectKind::Event)?;
    let (kernel, timing) = machine.kernel_and_timing();
    kernel.signal_event(timing, event)
}

pub fn clear_event(machine: &mut Machine, handle: Handle) -> SvcResult<()> {
    let pid = current_process(machine)?;
    let event = machine
        .kernel
        .resolve_handle_of(pid, handle, ObjectKind::Event)?;
    machine.kernel.clear_event(event)
}

pub fn create_mutex(machine: &mut Machine, initial_locked: bool) -> SvcResult<Handle> {
    let mutex = machine.kernel.create_mutex(initial_locked, "mutex");
    publish(machine, mutex)
}

pub fn release_mutex(machine: &mut Machine, handle: Handle) -> SvcResult<()> {
    let pid = current_process(machine)?;
    let mutex = machine
        .kernel
        .resolve_handle_of(pid, handle, ObjectKind::Mutex)?;
    let (kernel, timing) = machine.kernel_and_timing();
    kernel.release_mutex(timing, mutex)
}

pub fn create_semaphore(machine: &mut Machine, initial_count: i32, max_count: i32) -> SvcResult<Handle> {
    let semaphore = machine
        .kernel
        .create_semaphore(initial_count, max_count, "semaphore")?;
    publish(machine, semaphore)
}

/// Returns the count before the release.
pub fn release_semaphore(machine: &mut Machine, handle: Handle, release_count: i32) -> SvcResult<i32> {
    let pid = current_process(machine)?;
    let semaphore = machine
        .kernel
        .resolve_handle_of(pid, handle, ObjectKind::Semaphore)?;
    let (kernel, timing) = machine.kernel_and_timing();
    kernel.release_semaphore(timing, semaphore, release_count)
}

pub fn wait_synchronization_1(
    machine: &mut Machine,
    handle: Handle,
    nanoseconds: i64,
) -> SvcResult<WaitOutcome> {
    let pid = current_process(machine)?;
    let object = machine.kernel.resolve_handle(pid, handle)?;
    let (kernel, timing) = machine.kernel_and_timing();
    kernel.wait_synchronization(timing, &[object], false, nanoseconds)
}

/// Waits on the `count` handles stored at `handles_address`.
pub fn wait_synchronization_n(
    machine: &mut Machine,
    handles_address: u32,
    count: i32,
    wait_all: bool,
    nanoseconds: i64,
) -> SvcResult<WaitOutcome> {
    let count = usize::try_from(count)
        .ok()
        .filter(|&count| count <= MAX_WAIT_OBJECTS)
        .ok_or(KernelError::OutOfRange {
            what: "handle count",
            value: i64::from(count),
        })?;
    let pid = current_process(machine)?;
    let mut raw = vec![0u32; count];
    machine.memory.read_words(handles_address, &mut raw)?;
    let objects = raw
        .into_iter()
        .map(|handle| machine.kernel.resolve_handle(pid, Handle::from_raw(handle)))
        .collect::<Result<Vec<_>, _>>()?;
    let (kernel, timing) = machine.kernel_and_timing();
    kernel.wait_synchronization(timing, &objects, wait_all, nanoseconds)
}

// -------------------------------------------------------------------------------------------------
// Handles, ports and IPC
// -------------------------------------------------------------------------------------------------

pub fn close_handle(machine: &mut Machine, handle: Handle) -> SvcResult<()> {
    let pid = current_process(machine)?;
    machine.kernel.close_handle(pid, handle)
}

pub fn duplicate_handle(machine: &mut Machine, handle: Handle) -> SvcResult<Handle> {
    let pid = current_process(machine)?;
    machine.kernel.duplicate_handle(pid, handle)
}

fn read_port_name(memory: &dyn GuestMemory, address: u32) -> SvcResult<String> {
    let mut name = Vec::new();
    for i in 0..=PORT_NAME_MAX_LENGTH {
        let address = address.checked_add(i).ok_or(KernelError::OutOfRange {
            what: "port name address",
            value: i64::from(address),
        })?;
        match memory.read_u8(address)? {
            0 => return Ok(String::from_utf8_lossy(&name).into_owned()),
            byte => name.push(byte),
        }
    }
    Err(KernelError::OutOfRange {
        what: "port name length",
        value: name.len() as i64,
    })
}

pub fn connect_to_port(machine: &mut Machine, name_address: u32) -> SvcResult<Handle> {
    let name = read_port_name(&machine.memory, name_address)?;
    let client = machine.kernel.connect_to_port(&name, PortKind::Named)?;
    tracing::debug!(port = %name, "ConnectToPort");
    publish(machine, client)
}

/// Runs the request in the calling thread's command buffer on the session behind `handle`.
///
/// Handle problems are reported to the guest. Any other failure is host-fatal and halts the
/// machine.
pub fn send_sync_request(machine: &mut Machine, handle: Handle) -> SvcResult<()> {
    let thread = machine
        .kernel
        .current_thread()
        .ok_or(KernelError::NoCurrentThread)?;
    let tls = machine.kernel.thread(thread)?.tls_address;
    let pid = current_process(machine)?;
    let Machine {
        services,
        kernel,
        memory,
        ..
    } = machine;
    let result = services.send_sync_request(kernel, memory, pid, handle, tls);
    machine.kernel.prepare_reschedule();
    match result {
        Ok(()) => Ok(()),
        Err(ServiceError::Kernel(
            err @ (KernelError::InvalidHandle(_) | KernelError::WrongObjectKind { .. }),
        )) => Err(err),
        Err(err) => {
            machine.halt(err);
            Ok(())
        }
    }
}

pub fn get_system_tick(machine: &mut Machine) -> u64 {
    let ticks = machine.timing.ticks();
    machine.timing.add_ticks(SYSTEM_TICK_COST);
    ticks
}

/// Only the current-process pseudo-handle names a process.
pub fn get_process_id(machine: &Machine, handle: Handle) -> SvcResult<u32> {
    if handle != CURRENT_PROCESS {
        return Err(KernelError::InvalidHandle(handle.raw()));
    }
    Ok(current_process(machine)?.0)
}

// -------------------------------------------------------------------------------------------------
// Register-level dispatch
// -------------------------------------------------------------------------------------------------

fn finish(ctx: &mut ThreadContext, result: SvcResult<Option<u32>>) {
    match result {
        Ok(output) => ctx.set_return(RESULT_SUCCESS, output),
        Err(err) => ctx.set_return(err.result_code(), None),
    }
}

fn finish_wait(ctx: &mut ThreadContext, outcome: SvcResult<WaitOutcome>) {
    match outcome {
        Ok(WaitOutcome::Acquired { index }) => {
            let output = index.map_or(NO_INDEX, |index| index as u32);
            ctx.set_return(RESULT_SUCCESS, Some(output));
        }
        Ok(WaitOutcome::TimedOut) => ctx.set_return(RESULT_TIMEOUT, Some(NO_INDEX)),
        // The kernel writes the result when the thread wakes.
        Ok(WaitOutcome::Blocked) => {}
        Err(err) => ctx.set_return(err.result_code(), None),
    }
}

/// Executes kernel call `number` with arguments in `ctx`. Returns false for calls that are not
/// provided, leaving `ctx` untouched.
pub fn call_svc(machine: &mut Machine, number: u32, ctx: &mut ThreadContext) -> bool {
    let r = ctx.cpu_registers;
    let handle = |reg: u32| Handle::from_raw(reg);
    match number {
        0x08 => {
            let result = create_thread(machine, r[0], r[1], r[2], r[3], r[4] as i32);
            finish(ctx, result.map(|h| Some(h.raw())));
        }
        0x09 => {
            if let Err(err) = exit_thread(machine) {
                tracing::warn!(%err, "ExitThread without a running thread");
            }
        }
        0x0A => {
            if let Err(err) = sleep_thread(machine, nanoseconds(r[0], r[1])) {
                tracing::warn!(%err, "SleepThread failed");
            }
        }
        0x0B => finish(ctx, get_thread_priority(machine, handle(r[1])).map(Some)),
        0x0C => finish(ctx, set_thread_priority(machine, handle(r[0]), r[1]).map(|()| None)),
        0x13 => finish(ctx, create_mutex(machine, r[1] != 0).map(|h| Some(h.raw()))),
        0x14 => finish(ctx, release_mutex(machine, handle(r[0])).map(|()| None)),
        0x15 => {
            let result = create_semaphore(machine, r[1] as i32, r[2] as i32);
            finish(ctx, result.map(|h| Some(h.raw())));
        }
        0x16 => {
            let result = release_semaphore(machine, handle(r[1]), r[2] as i32);
            finish(ctx, result.map(|count| Some(count as u32)));
        }
        0x17 => finish(ctx, create_event(machine, r[1]).map(|h| Some(h.raw()))),
        0x18 => finish(ctx, signal_event(machine, handle(r[0])).map(|()| None)),
        0x19 => finish(ctx, clear_event(machine, handle(r[0])).map(|()| None)),
        0x23 => finish(ctx, close_handle(machine, handle(r[0])).map(|()| None)),
        0x24 => {
            let outcome = wait_synchronization_1(machine, handle(r[0]), nanoseconds(r[2], r[3]));
            finish_wait(ctx, outcome);
        }
        0x25 => {
            let outcome =
                wait_synchronization_n(machine, r[1], r[2] as i32, r[3] != 0, nanoseconds(r[0], r[4]));
            finish_wait(ctx, outcome);
        }
        0x27 => finish(ctx, duplicate_handle(machine, handle(r[1])).map(|h| Some(h.raw()))),
        0x28 => {
            let ticks = get_system_tick(machine);
            ctx.cpu_registers[0] = ticks as u32;
            ctx.cpu_registers[1] = (ticks >> 32) as u32;
        }
        0x2D => finish(ctx, connect_to_port(machine, r[1]).map(|h| Some(h.raw()))),
        0x32 => finish(ctx, send_sync_request(machine, handle(r[0])).map(|()| None)),
        0x35 => finish(ctx, get_process_id(machine, handle(r[1])).map(Some)),
        _ => {
            tracing::error!(number = format_args!("0x{number:02X}"), "unimplemented kernel call");
            return false;
        }
    }
    true
}


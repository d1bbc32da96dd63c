#![cfg(not(target_arch = "wasm32"))]

use horizon_kernel::{Handle, Kernel, KernelError, ResetType, ERR_INVALID_HANDLE};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Open,
    Close(usize),
    Duplicate(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Open),
        2 => any::<usize>().prop_map(Op::Close),
        1 => any::<usize>().prop_map(Op::Duplicate),
    ]
}

proptest! {
    /// Every closed handle keeps failing, however its slot is reused later.
    #[test]
    fn closed_handles_never_resolve_again(ops in prop::collection::vec(op(), 1..200)) {
        let mut kernel = Kernel::new(0);
        let pid = kernel.create_process("app", 0);
        let event = kernel.create_event(ResetType::Sticky, "shared");

        let mut open: Vec<Handle> = Vec::new();
        let mut closed: Vec<Handle> = Vec::new();
        for op in ops {
            match op {
                Op::Open => open.push(kernel.create_handle(pid, event).unwrap()),
                Op::Close(i) if !open.is_empty() => {
                    let handle = open.swap_remove(i % open.len());
                    kernel.close_handle(pid, handle).unwrap();
                    closed.push(handle);
                }
                Op::Duplicate(i) if !open.is_empty() => {
                    let handle = open[i % open.len()];
                    open.push(kernel.duplicate_handle(pid, handle).unwrap());
                }
                _ => {}
            }

            for handle in &open {
                prop_assert_eq!(kernel.resolve_handle(pid, *handle), Ok(event));
            }
            for handle in &closed {
                let err = kernel.resolve_handle(pid, *handle).unwrap_err();
                prop_assert_eq!(err.result_code(), ERR_INVALID_HANDLE);
            }
            // One reference per open handle plus the creator's.
            prop_assert_eq!(kernel.objects().refcount(event), Some(open.len() as u32 + 1));
        }
    }
}

#[test]
fn closing_twice_is_an_error() {
    let mut kernel = Kernel::new(0);
    let pid = kernel.create_process("app", 0);
    let event = kernel.create_event(ResetType::OneShot, "e");
    let handle = kernel.create_handle(pid, event).unwrap();
    kernel.close_handle(pid, handle).unwrap();
    assert_eq!(
        kernel.close_handle(pid, handle),
        Err(KernelError::InvalidHandle(handle.raw()))
    );
}

mod moved_handles {
    use horizon_ipc::descriptor::{move_handle_desc, static_buffer_desc};
    use horizon_ipc::Header;
    use horizon_kernel::{Handle, Kernel, ProcessId, ResetType, COMMAND_BUFFER_OFFSET};
    use horizon_memory::{GuestMemory, SparseMemory};

    const TLS: u32 = 0x1000_0000;
    const STATIC_DATA: u32 = 0x1000_0800;
    const UNMAPPED: u32 = 0x5000_0000;

    fn setup() -> (Kernel, ProcessId, SparseMemory, Handle) {
        let mut kernel = Kernel::new(0);
        let pid = kernel.create_process("client", 0);
        let event = kernel.create_event(ResetType::OneShot, "moved");
        let handle = kernel.create_handle(pid, event).unwrap();
        kernel.release_object(event);
        let mut memory = SparseMemory::new();
        memory.map(TLS, 0x1000).unwrap();
        (kernel, pid, memory, handle)
    }

    fn write_request(memory: &mut SparseMemory, words: &[u32]) {
        memory.write_words(TLS + COMMAND_BUFFER_OFFSET, words).unwrap();
    }

    #[test]
    fn failed_translation_keeps_moved_handles_open() {
        let (mut kernel, pid, mut memory, handle) = setup();
        write_request(
            &mut memory,
            &[
                Header::new(0x1, 0, 4).raw(),
                move_handle_desc(1),
                handle.raw(),
                static_buffer_desc(0x10, 0),
                UNMAPPED,
            ],
        );
        assert!(kernel.read_request(pid, &memory, TLS).is_err());
        assert!(kernel.resolve_handle(pid, handle).is_ok());
    }

    #[test]
    fn translated_request_takes_the_moved_handle() {
        let (mut kernel, pid, mut memory, handle) = setup();
        let object = kernel.resolve_handle(pid, handle).unwrap();
        write_request(
            &mut memory,
            &[
                Header::new(0x1, 0, 4).raw(),
                move_handle_desc(1),
                handle.raw(),
                static_buffer_desc(0x10, 0),
                STATIC_DATA,
            ],
        );
        let request = kernel.read_request(pid, &memory, TLS).unwrap();
        assert_eq!(request.moved, vec![object]);
        assert!(kernel.resolve_handle(pid, handle).is_err());
        for object in request.moved {
            kernel.release_object(object);
        }
    }

    #[test]
    fn moving_one_handle_twice_is_rejected_without_closing_it() {
        let (mut kernel, pid, mut memory, handle) = setup();
        write_request(
            &mut memory,
            &[
                Header::new(0x1, 0, 3).raw(),
                move_handle_desc(2),
                handle.raw(),
                handle.raw(),
            ],
        );
        assert!(kernel.read_request(pid, &memory, TLS).is_err());
        assert!(kernel.resolve_handle(pid, handle).is_ok());
    }
}

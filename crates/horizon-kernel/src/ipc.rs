//! Translation between a thread's raw command buffer and a [`RequestContext`].

use horizon_ipc::descriptor::{
    handle_number_from_desc, parse_static_buffer_desc, static_buffer_desc,
};
use horizon_ipc::{DescriptorType, IpcError, RequestContext, COMMAND_BUFFER_LENGTH};
use horizon_memory::GuestMemory;

use crate::error::KernelError;
use crate::handle::Handle;
use crate::kernel::Kernel;
use crate::object::ObjectId;
use crate::process::ProcessId;

/// Offset of the command buffer inside a thread's TLS entry.
pub const COMMAND_BUFFER_OFFSET: u32 = 0x80;
/// Offset of the receive-side static buffer descriptors (two words per buffer id).
pub const STATIC_BUFFER_DESCRIPTORS_OFFSET: u32 = 0x180;

/// A request read out of guest memory.
#[derive(Debug)]
pub struct TranslatedRequest {
    pub context: RequestContext<ObjectId>,
    /// References taken over from handles the client moved. The caller releases them once the
    /// request has been handled.
    pub moved: Vec<ObjectId>,
}

/// Bounds of the translate area, or an error if the header claims more words than exist.
fn translate_range(header_raw: u32) -> Result<(usize, usize), KernelError> {
    let header = horizon_ipc::Header::from_raw(header_raw);
    if header.total_words() > COMMAND_BUFFER_LENGTH {
        return Err(IpcError::Truncated {
            descriptor: header_raw,
        }
        .into());
    }
    let start = 1 + header.normal_params() as usize;
    Ok((start, start + header.translate_params() as usize))
}

fn payload_end(descriptor: u32, index: usize, end: usize) -> Result<usize, KernelError> {
    let words = if DescriptorType::of(descriptor).is_handle() {
        handle_number_from_desc(descriptor) as usize
    } else {
        1
    };
    if index + words > end {
        return Err(IpcError::Truncated { descriptor }.into());
    }
    Ok(index + words)
}

impl Kernel {
    /// Reads and translates the request in the command buffer of the TLS entry at `tls`.
    ///
    /// Handles are resolved in `pid`'s table. Moved handles are closed there after every
    /// descriptor translated, their references passing to the request. Calling-pid words
    /// receive the caller's id, static buffers are copied in, and mapped buffers are registered.
    pub fn read_request(
        &mut self,
        pid: ProcessId,
        memory: &dyn GuestMemory,
        tls: u32,
    ) -> Result<TranslatedRequest, KernelError> {
        let mut words = [0u32; COMMAND_BUFFER_LENGTH];
        memory.read_words(tls + COMMAND_BUFFER_OFFSET, &mut words)?;
        let (start, end) = translate_range(words[0])?;

        let mut ctx = RequestContext::from_words(pid.0, &words);
        let mut move_handles = Vec::new();
        self.translate_request(pid, memory, &mut ctx, &mut move_handles, start, end)?;

        // Moved handles leave the client's table only once the whole request translated.
        let table = &mut self.process_mut(pid)?.handles;
        let mut moved = Vec::with_capacity(move_handles.len());
        for handle in move_handles {
            moved.push(table.close(handle)?);
        }
        Ok(TranslatedRequest {
            context: ctx,
            moved,
        })
    }

    fn translate_request(
        &mut self,
        pid: ProcessId,
        memory: &dyn GuestMemory,
        ctx: &mut RequestContext<ObjectId>,
        move_handles: &mut Vec<Handle>,
        start: usize,
        end: usize,
    ) -> Result<(), KernelError> {
        let mut i = start;
        while i < end {
            let descriptor = ctx.command_buffer()[i];
            i += 1;
            let next = payload_end(descriptor, i, end)?;
            match DescriptorType::of(descriptor) {
                kind @ (DescriptorType::CopyHandle | DescriptorType::MoveHandle) => {
                    for slot in i..next {
                        let raw = ctx.command_buffer()[slot];
                        let object = if raw == 0 {
                            None
                        } else {
                            let handle = Handle::from_raw(raw);
                            let object = self.resolve_handle(pid, handle)?;
                            if kind == DescriptorType::MoveHandle {
                                if move_handles.contains(&handle) {
                                    return Err(KernelError::InvalidHandle(raw));
                                }
                                move_handles.push(handle);
                            }
                            Some(object)
                        };
                        let index = ctx.add_request_object(object);
                        ctx.command_buffer_mut()[slot] = index;
                    }
                }
                DescriptorType::CallingPid => ctx.command_buffer_mut()[i] = pid.0,
                DescriptorType::StaticBuffer => {
                    let info = parse_static_buffer_desc(descriptor);
                    let mut data = vec![0u8; info.size as usize];
                    memory.read_into(ctx.command_buffer()[i], &mut data)?;
                    ctx.set_static_buffer(info.buffer_id, data)?;
                }
                DescriptorType::PxiBuffer => {}
                DescriptorType::MappedBuffer => {
                    let id = ctx.add_mapped_buffer(ctx.command_buffer()[i], descriptor);
                    ctx.command_buffer_mut()[i] = id;
                }
            }
            i = next;
        }
        Ok(())
    }

    /// Writes the response held in `ctx` back into the command buffer at `tls`.
    ///
    /// Response objects become new handles in `pid`'s table. For a move the service's own
    /// reference is released. Static buffer data lands in the client's receive buffer and mapped
    /// buffer ids turn back into addresses.
    pub fn write_response(
        &mut self,
        pid: ProcessId,
        memory: &mut dyn GuestMemory,
        tls: u32,
        ctx: &RequestContext<ObjectId>,
    ) -> Result<(), KernelError> {
        let mut words = *ctx.command_buffer();
        let (start, end) = translate_range(words[0])?;

        let mut i = start;
        while i < end {
            let descriptor = words[i];
            i += 1;
            let next = payload_end(descriptor, i, end)?;
            match DescriptorType::of(descriptor) {
                kind @ (DescriptorType::CopyHandle | DescriptorType::MoveHandle) => {
                    for slot in &mut words[i..next] {
                        *slot = match ctx.response_object(*slot)? {
                            Some(object) => {
                                let handle = self.create_handle(pid, object)?;
                                if kind == DescriptorType::MoveHandle {
                                    self.release_object(object);
                                }
                                handle.raw()
                            }
                            None => 0,
                        };
                    }
                }
                DescriptorType::CallingPid => words[i] = pid.0,
                DescriptorType::StaticBuffer => {
                    let buffer_id = parse_static_buffer_desc(descriptor).buffer_id;
                    let data = ctx.response_static_buffer(buffer_id).unwrap_or(&[]);
                    let slot = tls + STATIC_BUFFER_DESCRIPTORS_OFFSET + u32::from(buffer_id) * 8;
                    let receive = parse_static_buffer_desc(memory.read_u32_le(slot)?);
                    let address = memory.read_u32_le(slot + 4)?;
                    let len = data.len().min(receive.size as usize);
                    memory.write_from(address, &data[..len])?;
                    words[i - 1] = static_buffer_desc(len as u32, buffer_id);
                    words[i] = address;
                }
                DescriptorType::PxiBuffer => {}
                DescriptorType::MappedBuffer => {
                    words[i] = ctx.mapped_buffer(words[i])?.address();
                }
            }
            i = next;
        }

        let total = horizon_ipc::Header::from_raw(words[0]).total_words();
        memory.write_words(tls + COMMAND_BUFFER_OFFSET, &words[..total])?;
        Ok(())
    }
}

use horizon_memory::GuestMemoryError;
use thiserror::Error;

use crate::buffer::MappedBufferPermissions;
use crate::descriptor::DescriptorType;

/// A request or response violated the wire contract.
///
/// These are host-side precondition violations: they abort the current call instead of being
/// reported to the guest as a result code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpcError {
    #[error("expected {expected:?} descriptor, found 0x{found:08X}")]
    UnexpectedDescriptor {
        expected: DescriptorType,
        found: u32,
    },

    #[error("descriptor carries {found} handles, expected {expected}")]
    HandleCount { expected: u32, found: u32 },

    #[error("translate descriptor 0x{descriptor:08X} overruns the command buffer")]
    Truncated { descriptor: u32 },

    #[error("static buffer id {0} is out of range")]
    StaticBufferId(u32),

    #[error("object index {0} does not name a translated object")]
    UnknownObject(u32),

    #[error("mapped buffer index {0} does not name a translated buffer")]
    UnknownMappedBuffer(u32),

    #[error("mapped buffer descriptor 0x{descriptor:08X} does not match translated buffer {id}")]
    MappedBufferMismatch { id: u32, descriptor: u32 },

    #[error("value 0x{0:X} is not a valid enumerator")]
    InvalidEnumValue(u32),

    #[error("mapped buffer requires {required:?} but grants {granted:?}")]
    BufferPermission {
        required: MappedBufferPermissions,
        granted: MappedBufferPermissions,
    },

    #[error("access of {len} bytes at offset {offset} exceeds mapped buffer of {size} bytes")]
    BufferBounds { offset: usize, len: usize, size: u32 },

    #[error(transparent)]
    Memory(#[from] GuestMemoryError),
}

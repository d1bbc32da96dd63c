//! Translate descriptor encoding.
//!
//! | type          | low bits       | payload words                     |
//! |---------------|----------------|-----------------------------------|
//! | copy handles  | `0x00`         | one handle per count              |
//! | move handles  | `0x10`         | one handle per count              |
//! | calling pid   | `0x20`         | process id (filled by the kernel) |
//! | static buffer | `0x02`         | buffer address                    |
//! | PXI buffer    | `0x04`         | buffer address                    |
//! | mapped buffer | `0x08 \| perm` | buffer address                    |
//!
//! Handle descriptors store `count - 1` in bits 26..32.

use crate::buffer::MappedBufferPermissions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    CopyHandle,
    MoveHandle,
    CallingPid,
    StaticBuffer,
    PxiBuffer,
    MappedBuffer,
}

impl DescriptorType {
    pub fn of(descriptor: u32) -> Self {
        if descriptor & 0xF == 0 {
            match descriptor & 0x30 {
                0x10 => Self::MoveHandle,
                0x20 => Self::CallingPid,
                // 0x30 is unused on hardware and decodes like a copy.
                _ => Self::CopyHandle,
            }
        } else if descriptor & 0x8 != 0 {
            Self::MappedBuffer
        } else if descriptor & 0x4 != 0 {
            Self::PxiBuffer
        } else {
            Self::StaticBuffer
        }
    }

    pub fn is_handle(self) -> bool {
        matches!(self, Self::CopyHandle | Self::MoveHandle)
    }
}

pub const fn copy_handle_desc(num_handles: u32) -> u32 {
    (num_handles.saturating_sub(1)) << 26
}

pub const fn move_handle_desc(num_handles: u32) -> u32 {
    0x10 | ((num_handles.saturating_sub(1)) << 26)
}

pub const fn calling_pid_desc() -> u32 {
    0x20
}

/// Number of handle payload words following a copy/move descriptor.
pub const fn handle_number_from_desc(descriptor: u32) -> u32 {
    (descriptor >> 26) + 1
}

pub const fn static_buffer_desc(size: u32, buffer_id: u8) -> u32 {
    0x2 | (size << 14) | (((buffer_id & 0xF) as u32) << 10)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticBufferDescInfo {
    pub size: u32,
    pub buffer_id: u8,
}

pub const fn parse_static_buffer_desc(descriptor: u32) -> StaticBufferDescInfo {
    StaticBufferDescInfo {
        size: descriptor >> 14,
        buffer_id: ((descriptor >> 10) & 0xF) as u8,
    }
}

pub fn mapped_buffer_desc(size: u32, perms: MappedBufferPermissions) -> u32 {
    0x8 | (size << 4) | (u32::from(perms.bits()) << 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedBufferDescInfo {
    pub size: u32,
    pub perms: MappedBufferPermissions,
}

pub fn parse_mapped_buffer_desc(descriptor: u32) -> MappedBufferDescInfo {
    MappedBufferDescInfo {
        size: descriptor >> 4,
        perms: MappedBufferPermissions::from_bits_truncate(((descriptor >> 1) & 0x3) as u8),
    }
}

/// Words taken by the descriptor at hand plus its payload.
pub fn descriptor_words(descriptor: u32) -> usize {
    match DescriptorType::of(descriptor) {
        DescriptorType::CopyHandle | DescriptorType::MoveHandle => {
            1 + handle_number_from_desc(descriptor) as usize
        }
        _ => 2,
    }
}

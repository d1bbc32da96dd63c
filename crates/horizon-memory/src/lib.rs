//! Guest virtual memory for emulated processes.
//!
//! Each process owns a 32-bit virtual address space. The kernel and the IPC layer only ever see it
//! through [`GuestMemory`]; [`SparseMemory`] is the default backend used by the orchestrator and by
//! tests.

mod sparse;

pub use sparse::SparseMemory;

use thiserror::Error;

/// Errors returned by [`GuestMemory`] backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuestMemoryError {
    /// No mapped region covers the requested range.
    #[error("guest memory access unmapped: vaddr=0x{vaddr:08x} len={len}")]
    Unmapped { vaddr: u32, len: usize },
    /// The requested range wraps around the end of the 32-bit address space.
    #[error("guest memory access overflows the address space: vaddr=0x{vaddr:08x} len={len}")]
    OutOfRange { vaddr: u32, len: usize },
    /// A new mapping would overlap an existing one.
    #[error("mapping 0x{base:08x}+0x{size:x} overlaps an existing region")]
    Overlap { base: u32, size: u32 },
    /// Mappings must be non-empty.
    #[error("invalid mapping size 0x{size:x} at 0x{base:08x}")]
    InvalidSize { base: u32, size: u32 },
}

pub type GuestMemoryResult<T> = Result<T, GuestMemoryError>;

/// Guest *virtual* memory of one process.
pub trait GuestMemory {
    /// Reads bytes from guest memory into `dst`.
    fn read_into(&self, vaddr: u32, dst: &mut [u8]) -> GuestMemoryResult<()>;

    /// Writes bytes from `src` into guest memory.
    fn write_from(&mut self, vaddr: u32, src: &[u8]) -> GuestMemoryResult<()>;

    fn read_u8(&self, vaddr: u32) -> GuestMemoryResult<u8> {
        let mut buf = [0u8; 1];
        self.read_into(vaddr, &mut buf)?;
        Ok(buf[0])
    }

    fn read_u16_le(&self, vaddr: u32) -> GuestMemoryResult<u16> {
        let mut buf = [0u8; 2];
        self.read_into(vaddr, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32_le(&self, vaddr: u32) -> GuestMemoryResult<u32> {
        let mut buf = [0u8; 4];
        self.read_into(vaddr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64_le(&self, vaddr: u32) -> GuestMemoryResult<u64> {
        let mut buf = [0u8; 8];
        self.read_into(vaddr, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn write_u8(&mut self, vaddr: u32, value: u8) -> GuestMemoryResult<()> {
        self.write_from(vaddr, &[value])
    }

    fn write_u16_le(&mut self, vaddr: u32, value: u16) -> GuestMemoryResult<()> {
        self.write_from(vaddr, &value.to_le_bytes())
    }

    fn write_u32_le(&mut self, vaddr: u32, value: u32) -> GuestMemoryResult<()> {
        self.write_from(vaddr, &value.to_le_bytes())
    }

    fn write_u64_le(&mut self, vaddr: u32, value: u64) -> GuestMemoryResult<()> {
        self.write_from(vaddr, &value.to_le_bytes())
    }

    /// Reads `count` little-endian words starting at `vaddr`.
    fn read_words(&self, vaddr: u32, dst: &mut [u32]) -> GuestMemoryResult<()> {
        for (i, word) in dst.iter_mut().enumerate() {
            *word = self.read_u32_le(word_address(vaddr, i)?)?;
        }
        Ok(())
    }

    /// Writes little-endian words starting at `vaddr`.
    fn write_words(&mut self, vaddr: u32, src: &[u32]) -> GuestMemoryResult<()> {
        for (i, word) in src.iter().enumerate() {
            self.write_u32_le(word_address(vaddr, i)?, *word)?;
        }
        Ok(())
    }
}

fn word_address(base: u32, index: usize) -> GuestMemoryResult<u32> {
    u32::try_from(index)
        .ok()
        .and_then(|i| i.checked_mul(4))
        .and_then(|offset| base.checked_add(offset))
        .ok_or(GuestMemoryError::OutOfRange {
            vaddr: base,
            len: index.saturating_mul(4),
        })
}

impl<T: GuestMemory + ?Sized> GuestMemory for &mut T {
    fn read_into(&self, vaddr: u32, dst: &mut [u8]) -> GuestMemoryResult<()> {
        (**self).read_into(vaddr, dst)
    }

    fn write_from(&mut self, vaddr: u32, src: &[u8]) -> GuestMemoryResult<()> {
        (**self).write_from(vaddr, src)
    }
}

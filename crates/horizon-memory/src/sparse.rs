use std::collections::BTreeMap;

use crate::{GuestMemory, GuestMemoryError, GuestMemoryResult};

/// A virtual address space made of independently mapped, zero-initialised regions.
///
/// Accesses must fall entirely inside one region; an access that straddles two adjacent regions is
/// rejected like an unmapped one.
#[derive(Debug, Default, Clone)]
pub struct SparseMemory {
    regions: BTreeMap<u32, Vec<u8>>,
}

impl SparseMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `size` zeroed bytes at `base`.
    pub fn map(&mut self, base: u32, size: u32) -> GuestMemoryResult<()> {
        if size == 0 {
            return Err(GuestMemoryError::InvalidSize { base, size });
        }
        let end = base
            .checked_add(size - 1)
            .ok_or(GuestMemoryError::InvalidSize { base, size })?;

        let overlaps_prev = self
            .regions
            .range(..=base)
            .next_back()
            .is_some_and(|(start, data)| region_contains(*start, data.len(), base));
        let overlaps_next = self.regions.range(base..=end).next().is_some();
        if overlaps_prev || overlaps_next {
            return Err(GuestMemoryError::Overlap { base, size });
        }

        self.regions.insert(base, vec![0; size as usize]);
        Ok(())
    }

    /// Maps a region at `base` initialised from `data`.
    pub fn map_bytes(&mut self, base: u32, data: &[u8]) -> GuestMemoryResult<()> {
        let size = u32::try_from(data.len()).map_err(|_| GuestMemoryError::OutOfRange {
            vaddr: base,
            len: data.len(),
        })?;
        self.map(base, size)?;
        self.write_from(base, data)
    }

    /// Removes the region that starts exactly at `base`. Returns whether one existed.
    pub fn unmap(&mut self, base: u32) -> bool {
        self.regions.remove(&base).is_some()
    }

    pub fn is_mapped(&self, vaddr: u32, len: usize) -> bool {
        self.locate(vaddr, len).is_ok()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    fn locate(&self, vaddr: u32, len: usize) -> GuestMemoryResult<(u32, usize)> {
        let end = u64::from(vaddr) + len as u64;
        if end > u64::from(u32::MAX) + 1 {
            return Err(GuestMemoryError::OutOfRange { vaddr, len });
        }
        match self.regions.range(..=vaddr).next_back() {
            Some((start, data)) if end <= u64::from(*start) + data.len() as u64 => {
                Ok((*start, (vaddr - start) as usize))
            }
            _ => Err(GuestMemoryError::Unmapped { vaddr, len }),
        }
    }
}

fn region_contains(start: u32, len: usize, vaddr: u32) -> bool {
    u64::from(vaddr) < u64::from(start) + len as u64
}

impl GuestMemory for SparseMemory {
    fn read_into(&self, vaddr: u32, dst: &mut [u8]) -> GuestMemoryResult<()> {
        let (start, offset) = self.locate(vaddr, dst.len())?;
        let region = &self.regions[&start];
        dst.copy_from_slice(&region[offset..offset + dst.len()]);
        Ok(())
    }

    fn write_from(&mut self, vaddr: u32, src: &[u8]) -> GuestMemoryResult<()> {
        let (start, offset) = self.locate(vaddr, src.len())?;
        let region = self
            .regions
            .get_mut(&start)
            .ok_or(GuestMemoryError::Unmapped {
                vaddr,
                len: src.len(),
            })?;
        region[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }
}

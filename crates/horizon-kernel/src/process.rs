use crate::handle::HandleTable;

/// Base of the thread-local storage area in every process.
pub const TLS_AREA_VADDR: u32 = 0x1FF8_2000;
/// Bytes of thread-local storage per thread; the IPC command buffer lives inside it.
pub const TLS_ENTRY_SIZE: u32 = 0x200;
/// Threads a process can host at once.
pub const TLS_SLOTS: u32 = 0x100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

#[derive(Debug)]
pub struct Process {
    pub id: ProcessId,
    pub name: String,
    pub program_id: u64,
    pub handles: HandleTable,
    tls_used: Vec<bool>,
}

impl Process {
    pub(crate) fn new(id: ProcessId, name: &str, program_id: u64) -> Self {
        Self {
            id,
            name: name.to_owned(),
            program_id,
            handles: HandleTable::new(),
            tls_used: vec![false; TLS_SLOTS as usize],
        }
    }

    /// Size of the TLS area the process's address space must map at [`TLS_AREA_VADDR`].
    pub fn tls_area_size() -> u32 {
        TLS_ENTRY_SIZE * TLS_SLOTS
    }

    pub(crate) fn allocate_tls(&mut self) -> Option<u32> {
        let slot = self.tls_used.iter().position(|used| !used)?;
        self.tls_used[slot] = true;
        Some(TLS_AREA_VADDR + slot as u32 * TLS_ENTRY_SIZE)
    }

    pub(crate) fn free_tls(&mut self, address: u32) {
        let Some(offset) = address.checked_sub(TLS_AREA_VADDR) else {
            return;
        };
        if let Some(used) = self.tls_used.get_mut((offset / TLS_ENTRY_SIZE) as usize) {
            *used = false;
        }
    }
}

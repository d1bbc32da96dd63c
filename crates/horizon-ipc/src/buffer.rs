use bitflags::bitflags;
use horizon_memory::GuestMemory;

use crate::descriptor::mapped_buffer_desc;
use crate::error::IpcError;

bitflags! {
    /// Access the client grants the service over a mapped buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MappedBufferPermissions: u8 {
        const R = 1;
        const W = 2;
        const RW = Self::R.bits() | Self::W.bits();
    }
}

/// A client memory range granted to a service for the duration of one request.
///
/// Every access is checked against the declared length and permission before guest memory is
/// touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedBuffer {
    id: u32,
    address: u32,
    size: u32,
    perms: MappedBufferPermissions,
}

impl MappedBuffer {
    pub fn new(id: u32, address: u32, size: u32, perms: MappedBufferPermissions) -> Self {
        Self {
            id,
            address,
            size,
            perms,
        }
    }

    /// Index of this buffer in its request's translated buffer list.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Client virtual address of the buffer.
    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn len(&self) -> usize {
        self.size as usize
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn permissions(&self) -> MappedBufferPermissions {
        self.perms
    }

    /// The descriptor word that describes this buffer on the wire.
    pub fn descriptor(&self) -> u32 {
        mapped_buffer_desc(self.size, self.perms)
    }

    fn check(
        &self,
        required: MappedBufferPermissions,
        offset: usize,
        len: usize,
    ) -> Result<u32, IpcError> {
        if !self.perms.contains(required) {
            return Err(IpcError::BufferPermission {
                required,
                granted: self.perms,
            });
        }
        let bounds = IpcError::BufferBounds {
            offset,
            len,
            size: self.size,
        };
        let end = offset.checked_add(len).ok_or(bounds.clone())?;
        if end > self.len() {
            return Err(bounds);
        }
        let offset = u32::try_from(offset).map_err(|_| bounds.clone())?;
        self.address.checked_add(offset).ok_or(bounds)
    }

    /// Reads `dst.len()` bytes starting `offset` bytes into the buffer.
    pub fn read(
        &self,
        memory: &dyn GuestMemory,
        offset: usize,
        dst: &mut [u8],
    ) -> Result<(), IpcError> {
        let vaddr = self.check(MappedBufferPermissions::R, offset, dst.len())?;
        memory.read_into(vaddr, dst)?;
        Ok(())
    }

    /// Reads the whole buffer.
    pub fn read_all(&self, memory: &dyn GuestMemory) -> Result<Vec<u8>, IpcError> {
        let mut data = vec![0; self.len()];
        self.read(memory, 0, &mut data)?;
        Ok(data)
    }

    /// Writes `src` starting `offset` bytes into the buffer.
    pub fn write(
        &self,
        memory: &mut dyn GuestMemory,
        offset: usize,
        src: &[u8],
    ) -> Result<(), IpcError> {
        let vaddr = self.check(MappedBufferPermissions::W, offset, src.len())?;
        memory.write_from(vaddr, src)?;
        Ok(())
    }
}

use crate::buffer::MappedBuffer;
use crate::error::IpcError;
use crate::header::Header;

/// Words in a thread's IPC command buffer.
pub const COMMAND_BUFFER_LENGTH: usize = 0x100 / 4;

/// Static buffer slots a request may carry.
pub const MAX_STATIC_BUFFERS: usize = 16;

/// Normal and translate word counts a response actually emitted, next to what it declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseShape {
    pub declared: Header,
    pub normal_written: u32,
    pub translate_written: u32,
}

impl ResponseShape {
    pub fn is_complete(&self) -> bool {
        self.normal_written == self.declared.normal_params()
            && self.translate_written == self.declared.translate_params()
    }
}

/// One translated request, reused in place for its response.
///
/// `O` is the kernel's object reference type. Handle payload words in the command buffer hold
/// indices into the request (or, after building, the response) object list. `None` entries stand
/// for the null handle.
#[derive(Debug, Clone)]
pub struct RequestContext<O> {
    cmd_buf: [u32; COMMAND_BUFFER_LENGTH],
    request_objects: Vec<Option<O>>,
    response_objects: Vec<Option<O>>,
    mapped_buffers: Vec<MappedBuffer>,
    static_buffers: [Vec<u8>; MAX_STATIC_BUFFERS],
    response_static_buffers: Vec<(u8, Vec<u8>)>,
    caller_pid: u32,
    response: Option<ResponseShape>,
}

impl<O: Clone> RequestContext<O> {
    pub fn new(caller_pid: u32) -> Self {
        Self {
            cmd_buf: [0; COMMAND_BUFFER_LENGTH],
            request_objects: Vec::new(),
            response_objects: Vec::new(),
            mapped_buffers: Vec::new(),
            static_buffers: std::array::from_fn(|_| Vec::new()),
            response_static_buffers: Vec::new(),
            caller_pid,
            response: None,
        }
    }

    /// Builds a context whose command buffer starts with `words`. Extra words are ignored.
    pub fn from_words(caller_pid: u32, words: &[u32]) -> Self {
        let mut ctx = Self::new(caller_pid);
        for (dst, src) in ctx.cmd_buf.iter_mut().zip(words) {
            *dst = *src;
        }
        ctx
    }

    pub fn header(&self) -> Header {
        Header::from_raw(self.cmd_buf[0])
    }

    pub fn command_buffer(&self) -> &[u32; COMMAND_BUFFER_LENGTH] {
        &self.cmd_buf
    }

    pub fn command_buffer_mut(&mut self) -> &mut [u32; COMMAND_BUFFER_LENGTH] {
        &mut self.cmd_buf
    }

    pub fn caller_pid(&self) -> u32 {
        self.caller_pid
    }

    pub(crate) fn word(&self, index: usize) -> u32 {
        self.cmd_buf.get(index).copied().unwrap_or(0)
    }

    /// Writes `value` at `index`. Returns false when the index is outside the command buffer.
    pub(crate) fn set_word(&mut self, index: usize, value: u32) -> bool {
        match self.cmd_buf.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Registers an inbound object, returning the index the translated payload word should hold.
    pub fn add_request_object(&mut self, object: Option<O>) -> u32 {
        self.request_objects.push(object);
        (self.request_objects.len() - 1) as u32
    }

    pub fn request_object(&self, index: u32) -> Result<Option<O>, IpcError> {
        self.request_objects
            .get(index as usize)
            .cloned()
            .ok_or(IpcError::UnknownObject(index))
    }

    pub fn request_objects(&self) -> &[Option<O>] {
        &self.request_objects
    }

    pub(crate) fn add_response_object(&mut self, object: Option<O>) -> u32 {
        self.response_objects.push(object);
        (self.response_objects.len() - 1) as u32
    }

    pub fn response_object(&self, index: u32) -> Result<Option<O>, IpcError> {
        self.response_objects
            .get(index as usize)
            .cloned()
            .ok_or(IpcError::UnknownObject(index))
    }

    pub fn response_objects(&self) -> &[Option<O>] {
        &self.response_objects
    }

    /// Registers a mapped buffer, returning its id.
    pub fn add_mapped_buffer(&mut self, address: u32, descriptor: u32) -> u32 {
        let info = crate::descriptor::parse_mapped_buffer_desc(descriptor);
        let id = self.mapped_buffers.len() as u32;
        self.mapped_buffers
            .push(MappedBuffer::new(id, address, info.size, info.perms));
        id
    }

    pub fn mapped_buffer(&self, id: u32) -> Result<MappedBuffer, IpcError> {
        self.mapped_buffers
            .get(id as usize)
            .copied()
            .ok_or(IpcError::UnknownMappedBuffer(id))
    }

    pub fn set_static_buffer(&mut self, buffer_id: u8, data: Vec<u8>) -> Result<(), IpcError> {
        let slot = self
            .static_buffers
            .get_mut(buffer_id as usize)
            .ok_or(IpcError::StaticBufferId(u32::from(buffer_id)))?;
        *slot = data;
        Ok(())
    }

    pub fn static_buffer(&self, buffer_id: u8) -> Result<&[u8], IpcError> {
        self.static_buffers
            .get(buffer_id as usize)
            .map(Vec::as_slice)
            .ok_or(IpcError::StaticBufferId(u32::from(buffer_id)))
    }

    pub(crate) fn add_response_static_buffer(&mut self, buffer_id: u8, data: Vec<u8>) {
        self.response_static_buffers.retain(|(id, _)| *id != buffer_id);
        self.response_static_buffers.push((buffer_id, data));
    }

    /// Data the response wants copied into the client's receive buffer `buffer_id`.
    pub fn response_static_buffer(&self, buffer_id: u8) -> Option<&[u8]> {
        self.response_static_buffers
            .iter()
            .find(|(id, _)| *id == buffer_id)
            .map(|(_, data)| data.as_slice())
    }

    pub(crate) fn begin_response(&mut self, declared: Header) {
        self.cmd_buf[0] = declared.raw();
        self.response_objects.clear();
        self.response_static_buffers.clear();
        self.response = Some(ResponseShape {
            declared,
            normal_written: 0,
            translate_written: 0,
        });
    }

    pub(crate) fn response_mut(&mut self) -> Option<&mut ResponseShape> {
        self.response.as_mut()
    }

    /// Shape of the response built so far, `None` if no response was started.
    pub fn response_shape(&self) -> Option<ResponseShape> {
        self.response
    }
}

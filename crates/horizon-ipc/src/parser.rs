use crate::buffer::MappedBuffer;
use crate::builder::ResponseBuilder;
use crate::context::RequestContext;
use crate::descriptor::{
    handle_number_from_desc, parse_mapped_buffer_desc, parse_static_buffer_desc, DescriptorType,
};
use crate::error::IpcError;
use crate::header::Header;
use crate::value::IpcValue;

/// Typed reader over a translated request.
///
/// The parser trusts the `(normal, translate)` counts it is constructed with; reading past them is
/// a programming error in the service definition and trips a debug assertion.
pub struct RequestParser<'c, O> {
    ctx: &'c mut RequestContext<O>,
    header: Header,
    index: usize,
}

impl<'c, O: Clone> RequestParser<'c, O> {
    pub fn new(ctx: &'c mut RequestContext<O>, header: Header) -> Self {
        debug_assert_eq!(
            ctx.header(),
            header,
            "wire header disagrees with the declared command shape"
        );
        Self {
            ctx,
            header,
            index: 1,
        }
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn caller_pid(&self) -> u32 {
        self.ctx.caller_pid()
    }

    fn normal_end(&self) -> usize {
        1 + self.header.normal_params() as usize
    }

    fn translate_end(&self) -> usize {
        self.header.total_words()
    }

    fn next_word(&mut self) -> u32 {
        let word = self.ctx.word(self.index);
        self.index += 1;
        word
    }

    pub fn pop<T: IpcValue>(&mut self) -> T {
        debug_assert!(
            self.index + T::WORDS <= self.normal_end(),
            "popping {} words at {} overruns {} normal params",
            T::WORDS,
            self.index,
            self.header.normal_params()
        );
        let mut words = [0u32; crate::context::COMMAND_BUFFER_LENGTH];
        for word in words.iter_mut().take(T::WORDS) {
            *word = self.next_word();
        }
        T::decode(&words[..T::WORDS])
    }

    pub fn pop_enum<E: TryFrom<u32>>(&mut self) -> Result<E, IpcError> {
        let raw: u32 = self.pop();
        E::try_from(raw).map_err(|_| IpcError::InvalidEnumValue(raw))
    }

    /// Skips `words` words without interpreting them.
    pub fn skip(&mut self, words: usize) {
        self.index += words;
    }

    fn pop_descriptor(&mut self, expected: DescriptorType) -> Result<u32, IpcError> {
        debug_assert!(
            self.index >= self.normal_end(),
            "translate parameter popped before normal params were consumed"
        );
        let descriptor = self.next_word();
        let found = DescriptorType::of(descriptor);
        let matches = match expected {
            DescriptorType::CopyHandle | DescriptorType::MoveHandle => found.is_handle(),
            other => found == other,
        };
        if !matches {
            return Err(IpcError::UnexpectedDescriptor {
                expected,
                found: descriptor,
            });
        }
        let payload = if found.is_handle() {
            handle_number_from_desc(descriptor) as usize
        } else {
            1
        };
        if self.index + payload > self.translate_end() {
            return Err(IpcError::Truncated { descriptor });
        }
        Ok(descriptor)
    }

    /// Pops a calling-pid descriptor and the process id the kernel filled in.
    pub fn pop_pid(&mut self) -> Result<u32, IpcError> {
        self.pop_descriptor(DescriptorType::CallingPid)?;
        Ok(self.next_word())
    }

    /// Pops a handle descriptor carrying exactly one object.
    pub fn pop_object(&mut self) -> Result<Option<O>, IpcError> {
        let descriptor = self.pop_descriptor(DescriptorType::CopyHandle)?;
        let count = handle_number_from_desc(descriptor);
        if count != 1 {
            return Err(IpcError::HandleCount {
                expected: 1,
                found: count,
            });
        }
        let index = self.next_word();
        self.ctx.request_object(index)
    }

    /// Pops a handle descriptor and every object it carries.
    pub fn pop_objects(&mut self) -> Result<Vec<Option<O>>, IpcError> {
        let descriptor = self.pop_descriptor(DescriptorType::CopyHandle)?;
        (0..handle_number_from_desc(descriptor))
            .map(|_| {
                let index = self.next_word();
                self.ctx.request_object(index)
            })
            .collect()
    }

    /// Pops a static buffer descriptor and returns the bytes the kernel copied in.
    pub fn pop_static_buffer(&mut self) -> Result<Vec<u8>, IpcError> {
        let descriptor = self.pop_descriptor(DescriptorType::StaticBuffer)?;
        let info = parse_static_buffer_desc(descriptor);
        let _address = self.next_word();
        let data = self.ctx.static_buffer(info.buffer_id)?;
        let len = (info.size as usize).min(data.len());
        Ok(data[..len].to_vec())
    }

    /// Pops a mapped buffer descriptor and returns the bounded view it grants.
    pub fn pop_mapped_buffer(&mut self) -> Result<MappedBuffer, IpcError> {
        let descriptor = self.pop_descriptor(DescriptorType::MappedBuffer)?;
        let id = self.next_word();
        let buffer = self.ctx.mapped_buffer(id)?;
        let info = parse_mapped_buffer_desc(descriptor);
        if info.size != buffer.size() || info.perms != buffer.permissions() {
            return Err(IpcError::MappedBufferMismatch { id, descriptor });
        }
        Ok(buffer)
    }

    /// Starts the response over the same command buffer.
    pub fn make_builder(self, normal_params: u32, translate_params: u32) -> ResponseBuilder<'c, O> {
        let header = Header::new(self.header.command_id(), normal_params, translate_params);
        ResponseBuilder::new(self.ctx, header)
    }
}

use crate::buffer::MappedBuffer;
use crate::context::RequestContext;
use crate::descriptor::{copy_handle_desc, move_handle_desc, static_buffer_desc};
use crate::header::Header;
use crate::value::IpcValue;

/// Typed writer for a response.
///
/// Every push is counted against the declared `(normal, translate)` shape in the context's
/// [`ResponseShape`](crate::ResponseShape), which the dispatcher checks once the handler returns.
pub struct ResponseBuilder<'c, O> {
    ctx: &'c mut RequestContext<O>,
    header: Header,
    index: usize,
}

impl<'c, O: Clone> ResponseBuilder<'c, O> {
    pub fn new(ctx: &'c mut RequestContext<O>, header: Header) -> Self {
        ctx.begin_response(header);
        Self {
            ctx,
            header,
            index: 1,
        }
    }

    pub fn header(&self) -> Header {
        self.header
    }

    fn write(&mut self, value: u32, translate: bool) {
        let written = self.ctx.set_word(self.index, value);
        debug_assert!(written, "response overruns the command buffer");
        self.index += 1;
        if let Some(shape) = self.ctx.response_mut() {
            if translate {
                shape.translate_written += 1;
            } else {
                shape.normal_written += 1;
            }
            debug_assert!(
                shape.normal_written <= self.header.normal_params()
                    && shape.translate_written <= self.header.translate_params(),
                "response for {:?} writes more words than declared",
                self.header
            );
        }
    }

    pub fn push<T: IpcValue>(&mut self, value: T) -> &mut Self {
        let mut words = [0u32; crate::context::COMMAND_BUFFER_LENGTH];
        value.encode(&mut words[..T::WORDS]);
        for word in &words[..T::WORDS] {
            self.write(*word, false);
        }
        self
    }

    pub fn push_enum<E: Into<u32>>(&mut self, value: E) -> &mut Self {
        self.push(value.into())
    }

    /// Emits a copy-handle descriptor; the kernel duplicates each object into the client.
    pub fn push_copy_objects(&mut self, objects: &[Option<O>]) -> &mut Self {
        self.push_objects(copy_handle_desc(objects.len() as u32), objects)
    }

    /// Emits a move-handle descriptor; the service's reference is handed to the client.
    pub fn push_move_objects(&mut self, objects: &[Option<O>]) -> &mut Self {
        self.push_objects(move_handle_desc(objects.len() as u32), objects)
    }

    fn push_objects(&mut self, descriptor: u32, objects: &[Option<O>]) -> &mut Self {
        debug_assert!(!objects.is_empty(), "handle descriptor with no handles");
        self.write(descriptor, true);
        for object in objects {
            let index = self.ctx.add_response_object(object.clone());
            self.write(index, true);
        }
        self
    }

    /// Emits a static buffer; the kernel copies `data` into the client's receive buffer
    /// `buffer_id` and fills in its address.
    pub fn push_static_buffer(&mut self, data: Vec<u8>, buffer_id: u8) -> &mut Self {
        let size = data.len() as u32;
        self.write(static_buffer_desc(size, buffer_id), true);
        self.write(0, true);
        self.ctx.add_response_static_buffer(buffer_id, data);
        self
    }

    /// Re-emits a mapped buffer popped from the request, unchanged.
    pub fn push_mapped_buffer(&mut self, buffer: &MappedBuffer) -> &mut Self {
        self.write(buffer.descriptor(), true);
        self.write(buffer.id(), true);
        self
    }
}

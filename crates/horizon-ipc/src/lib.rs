//! Wire format of the guest IPC protocol and the typed reader/writer services use over it.
//!
//! A command buffer is 64 little-endian words. Word 0 is a [`Header`]; it is followed by the
//! normal (plain data) words and then the translate words, which are tagged descriptors (see
//! [`descriptor`]) each followed by their payload.
//!
//! By the time a service sees a request, the kernel has already translated it into a
//! [`RequestContext`]: handle payloads are replaced by indices into the context's object list,
//! process-id payloads hold the caller's real id, static buffers have been copied in and mapped
//! buffer addresses are replaced by indices into the context's [`MappedBuffer`] list. The
//! [`RequestParser`] / [`ResponseBuilder`] pair reads and writes that translated form.

mod buffer;
mod builder;
mod context;
pub mod descriptor;
mod error;
mod header;
mod parser;
mod result;
mod value;

pub use buffer::{MappedBuffer, MappedBufferPermissions};
pub use builder::ResponseBuilder;
pub use context::{RequestContext, ResponseShape, COMMAND_BUFFER_LENGTH, MAX_STATIC_BUFFERS};
pub use descriptor::DescriptorType;
pub use error::IpcError;
pub use header::Header;
pub use parser::RequestParser;
pub use result::{
    ErrorDescription, ErrorLevel, ErrorModule, ErrorSummary, ResultCode, RESULT_SUCCESS,
    RESULT_TIMEOUT,
};
pub use value::IpcValue;

//! `http:C`, the HTTP client service. Requests go out through an injected [`HttpTransport`].

use std::collections::BTreeMap;

use horizon_ipc::{
    ErrorDescription, ErrorLevel, ErrorModule, ErrorSummary, RequestParser, ResultCode,
    RESULT_SUCCESS,
};
use horizon_kernel::ObjectId;
use thiserror::Error;

use crate::error::ServiceError;
use crate::framework::{FunctionInfo, HleEnv, ServiceModule};

pub const ERROR_CONTEXT_ERROR: ResultCode = ResultCode::new(
    ErrorDescription(102),
    ErrorModule::Http,
    ErrorSummary::InvalidState,
    ErrorLevel::Permanent,
);

/// More response body remains after a `ReceiveData`.
pub const RESULT_DOWNLOAD_PENDING: ResultCode = ResultCode::new(
    ErrorDescription(43),
    ErrorModule::Http,
    ErrorSummary::WouldBlock,
    ErrorLevel::Permanent,
);

const ERR_INVALID_REQUEST_METHOD: ResultCode = ResultCode::new(
    ErrorDescription::INVALID_ENUM_VALUE,
    ErrorModule::Http,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Permanent,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    None = 0,
    Get = 1,
    Post = 2,
    Head = 3,
    Put = 4,
    Delete = 5,
    PostEmpty = 6,
    PutEmpty = 7,
}

impl TryFrom<u32> for RequestMethod {
    type Error = u32;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Ok(match raw {
            0 => RequestMethod::None,
            1 => RequestMethod::Get,
            2 => RequestMethod::Post,
            3 => RequestMethod::Head,
            4 => RequestMethod::Put,
            5 => RequestMethod::Delete,
            6 => RequestMethod::PostEmpty,
            7 => RequestMethod::PutEmpty,
            other => return Err(other),
        })
    }
}

impl RequestMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestMethod::None | RequestMethod::Get => "GET",
            RequestMethod::Post | RequestMethod::PostEmpty => "POST",
            RequestMethod::Head => "HEAD",
            RequestMethod::Put | RequestMethod::PutEmpty => "PUT",
            RequestMethod::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    NotStarted = 0x1,
    InProgress = 0x5,
    ReadyToDownloadContent = 0x7,
    ReadyToDownload = 0x8,
    TimedOut = 0xA,
}

impl From<RequestState> for u32 {
    fn from(state: RequestState) -> Self {
        state as u32
    }
}

/// A request as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub method: RequestMethod,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub ssl_options: u32,
    pub keep_alive: bool,
    pub proxy_default: bool,
    /// Nanoseconds, as given by the last `*Timeout` command.
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u32,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn content_length(&self) -> u32 {
        self.body.len() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpTransportError {
    #[error("connection to {0} failed")]
    Connection(String),

    #[error("request timed out")]
    TimedOut,
}

/// Performs requests on behalf of the guest.
pub trait HttpTransport {
    fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, HttpTransportError>;
}

/// One request context created with `CreateContext`.
#[derive(Debug, Clone)]
pub struct Context {
    pub url: String,
    pub method: RequestMethod,
    pub state: RequestState,
    pub request_headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub ssl_options: u32,
    pub keep_alive: bool,
    pub proxy_default: bool,
    pub timeout: Option<u64>,
    pub connection_initialized: bool,
    pub response: Option<HttpResponse>,
    pub current_offset: u32,
}

impl Context {
    fn new(url: String, method: RequestMethod) -> Self {
        Self {
            url,
            method,
            state: RequestState::NotStarted,
            request_headers: Vec::new(),
            body: Vec::new(),
            ssl_options: 0,
            keep_alive: false,
            proxy_default: false,
            timeout: None,
            connection_initialized: false,
            response: None,
            current_offset: 0,
        }
    }

    fn content_length(&self) -> u32 {
        self.response.as_ref().map_or(0, HttpResponse::content_length)
    }

    fn request(&self) -> HttpRequest {
        HttpRequest {
            url: self.url.clone(),
            method: self.method,
            headers: self.request_headers.clone(),
            body: self.body.clone(),
            ssl_options: self.ssl_options,
            keep_alive: self.keep_alive,
            proxy_default: self.proxy_default,
            timeout: self.timeout,
        }
    }
}

/// State of one `http:C` session.
#[derive(Debug, Default)]
pub struct HttpSession {
    pub initialized: bool,
    pub shared_memory: Option<ObjectId>,
    pub contexts: BTreeMap<u32, Context>,
}

pub struct HttpC {
    transport: Box<dyn HttpTransport>,
    context_counter: u32,
}

fn context_not_found(rp: RequestParser<'_, ObjectId>, context_id: u32) -> Result<(), ServiceError> {
    tracing::error!(context_id, "context not found");
    rp.make_builder(1, 0).push(ERROR_CONTEXT_ERROR);
    Ok(())
}

/// Drops the nul terminator the guest includes in string sizes.
fn guest_string(mut bytes: Vec<u8>) -> String {
    if let Some(end) = bytes.iter().position(|b| *b == 0) {
        bytes.truncate(end);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

impl HttpC {
    pub fn new(transport: Box<dyn HttpTransport>) -> Self {
        Self {
            transport,
            context_counter: 0,
        }
    }

    fn send(&mut self, context: &mut Context) {
        context.state = RequestState::InProgress;
        match self.transport.send(&context.request()) {
            Ok(response) => {
                context.response = Some(response);
                context.current_offset = 0;
                context.state = RequestState::ReadyToDownloadContent;
            }
            Err(err) => {
                tracing::warn!(url = %context.url, %err, "http request failed");
                context.response = None;
                context.current_offset = 0;
                context.state = RequestState::TimedOut;
            }
        }
    }

    fn initialize(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let shmem_size: u32 = rp.pop();
        let pid = rp.pop_pid()?;
        session.shared_memory = rp.pop_object()?;
        session.initialized = true;
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        tracing::debug!(shmem_size, pid, "Initialize");
        Ok(())
    }

    fn create_context(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let url_size: u32 = rp.pop();
        let raw_method: u32 = rp.pop();
        let buffer = rp.pop_mapped_buffer()?;

        let Ok(method) = RequestMethod::try_from(raw_method) else {
            tracing::error!(raw_method, "CreateContext with an invalid method");
            rp.make_builder(1, 0).push(ERR_INVALID_REQUEST_METHOD);
            return Ok(());
        };
        let mut url = vec![0; url_size.saturating_sub(1) as usize];
        buffer.read(&*env.memory, 0, &mut url)?;
        let url = guest_string(url);

        self.context_counter += 1;
        let context_id = self.context_counter;
        tracing::debug!(context_id, %url, ?method, "CreateContext");
        session.contexts.insert(context_id, Context::new(url, method));

        rp.make_builder(2, 2)
            .push(RESULT_SUCCESS)
            .push(context_id)
            .push_mapped_buffer(&buffer);
        Ok(())
    }

    fn close_context(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        if session.contexts.remove(&context_id).is_none() {
            return context_not_found(rp, context_id);
        }
        tracing::debug!(context_id, "CloseContext");
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        Ok(())
    }

    fn get_request_state(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let Some(context) = session.contexts.get(&context_id) else {
            return context_not_found(rp, context_id);
        };
        tracing::debug!(context_id, state = ?context.state, "GetRequestState");
        rp.make_builder(2, 0)
            .push(RESULT_SUCCESS)
            .push_enum(context.state);
        Ok(())
    }

    fn get_download_size_state(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let Some(context) = session.contexts.get(&context_id) else {
            return context_not_found(rp, context_id);
        };
        tracing::debug!(context_id, offset = context.current_offset, "GetDownloadSizeState");
        rp.make_builder(3, 0)
            .push(RESULT_SUCCESS)
            .push(context.current_offset)
            .push(context.content_length());
        Ok(())
    }

    fn initialize_connection_session(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let pid = rp.pop_pid()?;
        let Some(context) = session.contexts.get_mut(&context_id) else {
            return context_not_found(rp, context_id);
        };
        context.connection_initialized = true;
        tracing::debug!(context_id, pid, "InitializeConnectionSession");
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        Ok(())
    }

    fn begin_request(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let Some(context) = session.contexts.get_mut(&context_id) else {
            return context_not_found(rp, context_id);
        };
        self.send(context);
        tracing::debug!(context_id, state = ?context.state, "BeginRequest");
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        Ok(())
    }

    fn receive_into(
        context: &mut Context,
        rp: RequestParser<'_, ObjectId>,
        buffer_size: u32,
        buffer: &horizon_ipc::MappedBuffer,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let remaining = context.content_length().saturating_sub(context.current_offset);
        let size = buffer_size.min(remaining).min(buffer.size());
        if let Some(response) = &context.response {
            let start = context.current_offset as usize;
            buffer.write(env.memory, 0, &response.body[start..start + size as usize])?;
        }
        context.current_offset += size;

        let result = if context.current_offset < context.content_length() {
            RESULT_DOWNLOAD_PENDING
        } else {
            RESULT_SUCCESS
        };
        rp.make_builder(1, 2).push(result).push_mapped_buffer(buffer);
        Ok(())
    }

    fn receive_data(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let buffer_size: u32 = rp.pop();
        let buffer = rp.pop_mapped_buffer()?;
        let Some(context) = session.contexts.get_mut(&context_id) else {
            return context_not_found(rp, context_id);
        };
        tracing::debug!(context_id, buffer_size, "ReceiveData");
        Self::receive_into(context, rp, buffer_size, &buffer, env)
    }

    fn receive_data_timeout(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let buffer_size: u32 = rp.pop();
        let timeout: u64 = rp.pop();
        let buffer = rp.pop_mapped_buffer()?;
        let Some(context) = session.contexts.get_mut(&context_id) else {
            return context_not_found(rp, context_id);
        };
        context.timeout = Some(timeout);
        tracing::debug!(context_id, buffer_size, timeout, "ReceiveDataTimeout");
        Self::receive_into(context, rp, buffer_size, &buffer, env)
    }

    fn set_proxy_default(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let Some(context) = session.contexts.get_mut(&context_id) else {
            return context_not_found(rp, context_id);
        };
        context.proxy_default = true;
        tracing::debug!(context_id, "SetProxyDefault");
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        Ok(())
    }

    fn set_socket_buffer_size(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let size: u32 = rp.pop();
        if !session.contexts.contains_key(&context_id) {
            return context_not_found(rp, context_id);
        }
        tracing::warn!(context_id, size, "(STUBBED) SetSocketBufferSize");
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        Ok(())
    }

    fn add_request_header(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let name_size: u32 = rp.pop();
        let value_size: u32 = rp.pop();
        let name = guest_string(rp.pop_static_buffer()?);
        let value_buffer = rp.pop_mapped_buffer()?;
        let mut value = vec![0; value_size.saturating_sub(1) as usize];
        value_buffer.read(&*env.memory, 0, &mut value)?;
        let value = guest_string(value);

        let Some(context) = session.contexts.get_mut(&context_id) else {
            return context_not_found(rp, context_id);
        };
        tracing::debug!(context_id, %name, name_size, %value, "AddRequestHeader");
        context.request_headers.push((name, value));
        rp.make_builder(1, 2)
            .push(RESULT_SUCCESS)
            .push_mapped_buffer(&value_buffer);
        Ok(())
    }

    fn add_post_data_raw(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let length: u32 = rp.pop();
        let buffer = rp.pop_mapped_buffer()?;
        let mut data = vec![0; length as usize];
        buffer.read(&*env.memory, 0, &mut data)?;

        let Some(context) = session.contexts.get_mut(&context_id) else {
            return context_not_found(rp, context_id);
        };
        tracing::debug!(context_id, length, "AddPostDataRaw");
        context.body = data;
        rp.make_builder(1, 2)
            .push(RESULT_SUCCESS)
            .push_mapped_buffer(&buffer);
        Ok(())
    }

    fn get_response_header(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let name_size: u32 = rp.pop();
        let value_size: u32 = rp.pop();
        let name = guest_string(rp.pop_static_buffer()?);
        let value_buffer = rp.pop_mapped_buffer()?;

        let Some(context) = session.contexts.get(&context_id) else {
            return context_not_found(rp, context_id);
        };
        let value = context
            .response
            .as_ref()
            .and_then(|response| response.header(&name))
            .unwrap_or_default();
        let size = value.len().min(value_size as usize).min(value_buffer.len());
        value_buffer.write(env.memory, 0, &value.as_bytes()[..size])?;
        tracing::debug!(context_id, %name, name_size, value, value_size, "GetResponseHeader");

        rp.make_builder(2, 2)
            .push(RESULT_SUCCESS)
            .push(size as u32)
            .push_mapped_buffer(&value_buffer);
        Ok(())
    }

    fn get_response_status_code(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let Some(context) = session.contexts.get(&context_id) else {
            return context_not_found(rp, context_id);
        };
        let status = context.response.as_ref().map_or(0, |r| r.status);
        tracing::debug!(context_id, status, "GetResponseStatusCode");
        rp.make_builder(2, 0).push(RESULT_SUCCESS).push(status);
        Ok(())
    }

    fn get_response_status_code_timeout(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let timeout: u64 = rp.pop();
        let Some(context) = session.contexts.get_mut(&context_id) else {
            return context_not_found(rp, context_id);
        };
        context.timeout = Some(timeout);
        let status = context.response.as_ref().map_or(0, |r| r.status);
        tracing::debug!(context_id, status, timeout, "GetResponseStatusCodeTimeout");
        rp.make_builder(2, 0).push(RESULT_SUCCESS).push(status);
        Ok(())
    }

    fn set_ssl_opt(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let ssl_options: u32 = rp.pop();
        let Some(context) = session.contexts.get_mut(&context_id) else {
            return context_not_found(rp, context_id);
        };
        context.ssl_options = ssl_options;
        tracing::debug!(
            context_id,
            ssl_options = format_args!("0x{ssl_options:X}"),
            "SetSSLOpt"
        );
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        Ok(())
    }

    fn set_keep_alive(
        &mut self,
        session: &mut HttpSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let context_id: u32 = rp.pop();
        let keep_alive: bool = rp.pop();
        let Some(context) = session.contexts.get_mut(&context_id) else {
            return context_not_found(rp, context_id);
        };
        context.keep_alive = keep_alive;
        tracing::debug!(context_id, keep_alive, "SetKeepAlive");
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        Ok(())
    }

    fn finalize(
        &mut self,
        session: &mut HttpSession,
        rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        tracing::debug!(contexts = session.contexts.len(), "Finalize");
        session.contexts.clear();
        session.initialized = false;
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        Ok(())
    }
}

impl ServiceModule for HttpC {
    type Session = HttpSession;
    const NAME: &'static str = "http:C";
    const MAX_SESSIONS: u32 = 32;

    fn handlers() -> Vec<FunctionInfo<Self>> {
        vec![
            FunctionInfo::handler(0x0001_0044, Self::initialize, "Initialize"),
            FunctionInfo::handler(0x0002_0082, Self::create_context, "CreateContext"),
            FunctionInfo::handler(0x0003_0040, Self::close_context, "CloseContext"),
            FunctionInfo::stub(0x0004_0040, "CancelConnection"),
            FunctionInfo::handler(0x0005_0040, Self::get_request_state, "GetRequestState"),
            FunctionInfo::handler(
                0x0006_0040,
                Self::get_download_size_state,
                "GetDownloadSizeState",
            ),
            FunctionInfo::stub(0x0007_0040, "GetRequestError"),
            FunctionInfo::handler(
                0x0008_0042,
                Self::initialize_connection_session,
                "InitializeConnectionSession",
            ),
            FunctionInfo::handler(0x0009_0040, Self::begin_request, "BeginRequest"),
            FunctionInfo::handler(0x000A_0040, Self::begin_request, "BeginRequestAsync"),
            FunctionInfo::handler(0x000B_0082, Self::receive_data, "ReceiveData"),
            FunctionInfo::handler(0x000C_0102, Self::receive_data_timeout, "ReceiveDataTimeout"),
            FunctionInfo::stub(0x000D_0146, "SetProxy"),
            FunctionInfo::handler(0x000E_0040, Self::set_proxy_default, "SetProxyDefault"),
            FunctionInfo::stub(0x000F_00C4, "SetBasicAuthorization"),
            FunctionInfo::handler(
                0x0010_0080,
                Self::set_socket_buffer_size,
                "SetSocketBufferSize",
            ),
            FunctionInfo::handler(0x0011_00C4, Self::add_request_header, "AddRequestHeader"),
            FunctionInfo::stub(0x0012_00C4, "AddPostDataAscii"),
            FunctionInfo::stub(0x0013_00C4, "AddPostDataBinary"),
            FunctionInfo::handler(0x0014_0082, Self::add_post_data_raw, "AddPostDataRaw"),
            FunctionInfo::stub(0x0015_0080, "SetPostDataType"),
            FunctionInfo::stub(0x0016_00C4, "SendPostDataAscii"),
            FunctionInfo::stub(0x0017_0144, "SendPostDataAsciiTimeout"),
            FunctionInfo::stub(0x0018_00C4, "SendPostDataBinary"),
            FunctionInfo::stub(0x0019_0144, "SendPostDataBinaryTimeout"),
            FunctionInfo::stub(0x001A_0082, "SendPostDataRaw"),
            FunctionInfo::stub(0x001B_0102, "SendPOSTDataRawTimeout"),
            FunctionInfo::stub(0x001C_0080, "SetPostDataEncoding"),
            FunctionInfo::stub(0x001D_0040, "NotifyFinishSendPostData"),
            FunctionInfo::handler(0x001E_00C4, Self::get_response_header, "GetResponseHeader"),
            FunctionInfo::stub(0x001F_0144, "GetResponseHeaderTimeout"),
            FunctionInfo::stub(0x0020_0082, "GetResponseData"),
            FunctionInfo::stub(0x0021_0102, "GetResponseDataTimeout"),
            FunctionInfo::handler(
                0x0022_0040,
                Self::get_response_status_code,
                "GetResponseStatusCode",
            ),
            FunctionInfo::handler(
                0x0023_00C0,
                Self::get_response_status_code_timeout,
                "GetResponseStatusCodeTimeout",
            ),
            FunctionInfo::stub(0x0024_0082, "AddTrustedRootCA"),
            FunctionInfo::stub(0x0025_0080, "AddDefaultCert"),
            FunctionInfo::stub(0x0026_0080, "SelectRootCertChain"),
            FunctionInfo::stub(0x0027_00C4, "SetClientCert"),
            FunctionInfo::handler(0x002B_0080, Self::set_ssl_opt, "SetSSLOpt"),
            FunctionInfo::stub(0x002C_0080, "SetSSLClearOpt"),
            FunctionInfo::stub(0x002D_0000, "CreateRootCertChain"),
            FunctionInfo::stub(0x002E_0040, "DestroyRootCertChain"),
            FunctionInfo::stub(0x002F_0082, "RootCertChainAddCert"),
            FunctionInfo::stub(0x0030_0080, "RootCertChainAddDefaultCert"),
            FunctionInfo::stub(0x0031_0080, "RootCertChainRemoveCert"),
            FunctionInfo::stub(0x0032_0084, "OpenClientCertContext"),
            FunctionInfo::stub(0x0033_0040, "OpenDefaultClientCertContext"),
            FunctionInfo::stub(0x0034_0040, "CloseClientCertContext"),
            FunctionInfo::stub(0x0035_0186, "SetDefaultProxy"),
            FunctionInfo::stub(0x0036_0000, "ClearDNSCache"),
            FunctionInfo::handler(0x0037_0080, Self::set_keep_alive, "SetKeepAlive"),
            FunctionInfo::stub(0x0038_00C0, "SetPostDataTypeSize"),
            FunctionInfo::handler(0x0039_0000, Self::finalize, "Finalize"),
        ]
    }
}

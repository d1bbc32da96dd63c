//! `soc:U`, a thin passthrough from guest socket ids to host sockets.

use std::collections::BTreeMap;

use horizon_ipc::{
    ErrorDescription, ErrorLevel, ErrorModule, ErrorSummary, RequestParser, ResultCode,
    RESULT_SUCCESS,
};
use horizon_kernel::ObjectId;

use crate::error::ServiceError;
use crate::framework::{FunctionInfo, HleEnv, ServiceModule};

const AF_INET: u32 = 2;
const SOCK_STREAM: u32 = 1;
const SOCK_DGRAM: u32 = 2;

const F_GETFL: u32 = 3;
const F_SETFL: u32 = 4;
const O_NONBLOCK: u32 = 4;

/// Guest errno for a socket id that is not open.
const EBADF: i32 = 9;
const EINVAL: i32 = 28;

const ERR_INVALID_ENUM_VALUE: ResultCode = ResultCode::new(
    ErrorDescription::INVALID_ENUM_VALUE,
    ErrorModule::Soc,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Permanent,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Stream,
    Datagram,
}

/// Host socket operations. Errors are guest errno values.
pub trait HostSockets {
    fn open(&mut self, kind: SocketKind, protocol: u32) -> Result<u32, i32>;
    fn set_blocking(&mut self, host_fd: u32, blocking: bool) -> Result<(), i32>;
    fn close(&mut self, host_fd: u32) -> Result<(), i32>;
}

/// One open guest socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketHolder {
    pub host_fd: u32,
    pub blocking: bool,
}

pub struct SocU {
    host: Box<dyn HostSockets>,
    open_sockets: BTreeMap<u32, SocketHolder>,
}

/// Posix-style return word: the value itself, or the negated errno.
fn posix_return(result: Result<u32, i32>) -> u32 {
    match result {
        Ok(value) => value,
        Err(errno) => (-errno) as u32,
    }
}

impl SocU {
    pub fn new(host: Box<dyn HostSockets>) -> Self {
        Self {
            host,
            open_sockets: BTreeMap::new(),
        }
    }

    pub fn socket(&self, id: u32) -> Option<&SocketHolder> {
        self.open_sockets.get(&id)
    }

    pub fn open_socket_count(&self) -> usize {
        self.open_sockets.len()
    }

    fn cleanup_sockets(&mut self) {
        for (id, holder) in std::mem::take(&mut self.open_sockets) {
            if let Err(errno) = self.host.close(holder.host_fd) {
                tracing::warn!(socket = id, errno, "closing host socket failed");
            }
        }
    }

    fn initialize_sockets(
        &mut self,
        _session: &mut (),
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let memory_block_size: u32 = rp.pop();
        let pid = rp.pop_pid()?;
        let _shared_memory = rp.pop_object()?;
        tracing::debug!(memory_block_size, pid, "InitializeSockets");
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        Ok(())
    }

    fn open_socket(
        &mut self,
        _session: &mut (),
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let domain: u32 = rp.pop();
        let socket_type: u32 = rp.pop();
        let protocol: u32 = rp.pop();
        let _pid = rp.pop_pid()?;

        let kind = match (domain, socket_type) {
            (AF_INET, SOCK_STREAM) => SocketKind::Stream,
            (AF_INET, SOCK_DGRAM) => SocketKind::Datagram,
            _ => {
                tracing::error!(domain, socket_type, "Socket with unsupported family or type");
                rp.make_builder(2, 0).push(ERR_INVALID_ENUM_VALUE).push(0u32);
                return Ok(());
            }
        };

        let opened = self.host.open(kind, protocol);
        if let Ok(host_fd) = opened {
            self.open_sockets.insert(
                host_fd,
                SocketHolder {
                    host_fd,
                    blocking: true,
                },
            );
        }
        tracing::debug!(?kind, protocol, ?opened, "Socket");
        rp.make_builder(2, 0)
            .push(RESULT_SUCCESS)
            .push(posix_return(opened));
        Ok(())
    }

    fn fcntl(
        &mut self,
        _session: &mut (),
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let socket: u32 = rp.pop();
        let command: u32 = rp.pop();
        let argument: u32 = rp.pop();
        let _pid = rp.pop_pid()?;

        let result = match self.open_sockets.get_mut(&socket) {
            None => Err(EBADF),
            Some(holder) => match command {
                F_GETFL => Ok(if holder.blocking { 0 } else { O_NONBLOCK }),
                F_SETFL => {
                    let blocking = argument & O_NONBLOCK == 0;
                    self.host
                        .set_blocking(holder.host_fd, blocking)
                        .map(|()| {
                            holder.blocking = blocking;
                            0
                        })
                }
                _ => {
                    tracing::error!(command, "unsupported fcntl command");
                    Err(EINVAL)
                }
            },
        };
        tracing::debug!(socket, command, argument, ?result, "Fcntl");
        rp.make_builder(2, 0)
            .push(RESULT_SUCCESS)
            .push(posix_return(result));
        Ok(())
    }

    fn close(
        &mut self,
        _session: &mut (),
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let socket: u32 = rp.pop();
        let _pid = rp.pop_pid()?;

        let result = match self.open_sockets.remove(&socket) {
            Some(holder) => self.host.close(holder.host_fd).map(|()| 0),
            None => Err(EBADF),
        };
        tracing::debug!(socket, ?result, "Close");
        rp.make_builder(2, 0)
            .push(RESULT_SUCCESS)
            .push(posix_return(result));
        Ok(())
    }

    fn shutdown_sockets(
        &mut self,
        _session: &mut (),
        rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        tracing::debug!(open = self.open_sockets.len(), "ShutdownSockets");
        self.cleanup_sockets();
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        Ok(())
    }
}

impl Drop for SocU {
    fn drop(&mut self) {
        self.cleanup_sockets();
    }
}

impl ServiceModule for SocU {
    type Session = ();
    const NAME: &'static str = "soc:U";
    const MAX_SESSIONS: u32 = 18;

    fn handlers() -> Vec<FunctionInfo<Self>> {
        vec![
            FunctionInfo::handler(0x0001_0044, Self::initialize_sockets, "InitializeSockets"),
            FunctionInfo::handler(0x0002_00C2, Self::open_socket, "Socket"),
            FunctionInfo::stub(0x0003_0082, "Listen"),
            FunctionInfo::stub(0x0004_0082, "Accept"),
            FunctionInfo::stub(0x0005_0084, "Bind"),
            FunctionInfo::stub(0x0006_0084, "Connect"),
            FunctionInfo::stub(0x0007_0104, "recvfrom_other"),
            FunctionInfo::stub(0x0008_0102, "RecvFrom"),
            FunctionInfo::stub(0x0009_0106, "sendto_other"),
            FunctionInfo::stub(0x000A_0106, "SendTo"),
            FunctionInfo::handler(0x000B_0042, Self::close, "Close"),
            FunctionInfo::stub(0x000C_0082, "Shutdown"),
            FunctionInfo::stub(0x000D_0082, "GetHostByName"),
            FunctionInfo::stub(0x000E_00C2, "GetHostByAddr"),
            FunctionInfo::stub(0x0011_0102, "GetSockOpt"),
            FunctionInfo::stub(0x0012_0104, "SetSockOpt"),
            FunctionInfo::handler(0x0013_00C2, Self::fcntl, "Fcntl"),
            FunctionInfo::stub(0x0014_00C0, "Poll"),
            FunctionInfo::stub(0x0016_0000, "GetHostId"),
            FunctionInfo::stub(0x0017_0082, "GetSockName"),
            FunctionInfo::stub(0x0018_0082, "GetPeerName"),
            FunctionInfo::handler(0x0019_0000, Self::shutdown_sockets, "ShutdownSockets"),
        ]
    }
}

//! `cecd:u`, the StreetPass box service.
//!
//! Each title owns a message box under `/CEC/<program id>`. A session opens one path with
//! `Open` and then reads or writes it; messages are addressed by id instead and do not touch the
//! session state.

mod headers;
mod store;

use bitflags::bitflags;
use horizon_ipc::{
    ErrorDescription, ErrorLevel, ErrorModule, ErrorSummary, MappedBuffer, RequestParser,
    ResultCode, RESULT_SUCCESS,
};
use horizon_kernel::{Kernel, KernelError, ObjectId, ResetType};
use horizon_memory::GuestMemory;

use crate::error::ServiceError;
use crate::framework::{FunctionInfo, HleEnv, ServiceModule};

pub use headers::{check_and_update_file, ob_index_message_count};
pub use store::BoxStore;

pub(crate) const ROOT_DIR: &str = "/CEC";

/// Directories report at most this many entries.
const MAX_DIR_ENTRIES: usize = 32;

/// `MBoxData` slot that holds the owning title's program id.
const MBOX_PROGRAM_ID_INDEX: u32 = 50;

/// Message ids are stored as base64 over this alphabet, without padding.
const BASE64_DICT: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789.-";

const ERR_NO_DATA: ResultCode = ResultCode::new(
    ErrorDescription::NO_DATA,
    ErrorModule::Cec,
    ErrorSummary::NotFound,
    ErrorLevel::Status,
);

const ERR_NOT_AUTHORIZED: ResultCode = ResultCode::new(
    ErrorDescription::NOT_AUTHORIZED,
    ErrorModule::Cec,
    ErrorSummary::NotFound,
    ErrorLevel::Status,
);

const ERR_INVALID_PATH_TYPE: ResultCode = ResultCode::new(
    ErrorDescription::INVALID_ENUM_VALUE,
    ErrorModule::Cec,
    ErrorSummary::InvalidArgument,
    ErrorLevel::Permanent,
);

/// What `GetCecdState` reports; the daemon never leaves idle.
const CECD_STATE_IDLE: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CecDataPathType {
    #[default]
    Invalid,
    MboxList,
    MboxInfo,
    InboxInfo,
    OutboxInfo,
    OutboxIndex,
    InboxMsg,
    OutboxMsg,
    RootDir,
    MboxDir,
    InboxDir,
    OutboxDir,
    /// `MBoxData.NNN`, raw values 100 to 199.
    MboxData(u32),
}

impl TryFrom<u32> for CecDataPathType {
    type Error = u32;

    fn try_from(raw: u32) -> Result<Self, u32> {
        Ok(match raw {
            0 => Self::Invalid,
            1 => Self::MboxList,
            2 => Self::MboxInfo,
            3 => Self::InboxInfo,
            4 => Self::OutboxInfo,
            5 => Self::OutboxIndex,
            6 => Self::InboxMsg,
            7 => Self::OutboxMsg,
            10 => Self::RootDir,
            11 => Self::MboxDir,
            12 => Self::InboxDir,
            13 => Self::OutboxDir,
            100..=199 => Self::MboxData(raw - 100),
            _ => return Err(raw),
        })
    }
}

impl CecDataPathType {
    pub fn is_dir(self) -> bool {
        matches!(
            self,
            Self::RootDir | Self::MboxDir | Self::InboxDir | Self::OutboxDir
        )
    }

    /// Storage path for this type in `ncch_program_id`'s box. Messages also need an id.
    pub fn path(self, ncch_program_id: u32, message_id: &[u8]) -> Option<String> {
        let boxdir = format!("{ROOT_DIR}/{ncch_program_id:08x}");
        Some(match self {
            Self::Invalid => return None,
            Self::MboxList => format!("{ROOT_DIR}/MBoxList____"),
            Self::MboxInfo => format!("{boxdir}/MBoxInfo____"),
            Self::InboxInfo => format!("{boxdir}/InBox___/BoxInfo_____"),
            Self::OutboxInfo => format!("{boxdir}/OutBox__/BoxInfo_____"),
            Self::OutboxIndex => format!("{boxdir}/OutBox__/OBIndex_____"),
            Self::InboxMsg => format!("{boxdir}/InBox___/_{}", encode_base64(message_id)),
            Self::OutboxMsg => format!("{boxdir}/OutBox__/_{}", encode_base64(message_id)),
            Self::RootDir => ROOT_DIR.to_owned(),
            Self::MboxDir => boxdir,
            Self::InboxDir => format!("{boxdir}/InBox___"),
            Self::OutboxDir => format!("{boxdir}/OutBox__"),
            Self::MboxData(index) => format!("{boxdir}/MBoxData.{index:03}"),
        })
    }
}

pub fn encode_base64(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len().div_ceil(3) * 4);
    for chunk in input.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied();
        let b2 = chunk.get(2).copied();

        out.push(BASE64_DICT[(b0 >> 2) as usize] as char);
        let hi = (b0 & 0x03) << 4;
        let Some(b1) = b1 else {
            out.push(BASE64_DICT[hi as usize] as char);
            continue;
        };
        out.push(BASE64_DICT[(hi | b1 >> 4) as usize] as char);
        let mid = (b1 & 0x0F) << 2;
        let Some(b2) = b2 else {
            out.push(BASE64_DICT[mid as usize] as char);
            continue;
        };
        out.push(BASE64_DICT[(mid | b2 >> 6) as usize] as char);
        out.push(BASE64_DICT[(b2 & 0x3F) as usize] as char);
    }
    out
}

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct CecOpenMode: u32 {
        const UNKNOWN = 1 << 0;
        const READ = 1 << 1;
        const WRITE = 1 << 2;
        const CREATE = 1 << 3;
        /// Validate box metadata headers on write.
        const CHECK = 1 << 4;
    }
}

/// The path a session last opened.
#[derive(Debug, Default)]
pub struct CecdSession {
    pub ncch_program_id: u32,
    pub path_type: CecDataPathType,
    pub open_mode: CecOpenMode,
    pub path: String,
}

pub struct Cecd {
    store: BoxStore,
    cecinfo_event: Option<ObjectId>,
    change_state_event: Option<ObjectId>,
}

impl Default for Cecd {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the first `len` bytes of a client buffer, clamped to its size.
fn read_prefix(
    buffer: &MappedBuffer,
    memory: &dyn GuestMemory,
    len: u32,
) -> Result<Vec<u8>, ServiceError> {
    let mut data = vec![0; len.min(buffer.size()) as usize];
    buffer.read(memory, 0, &mut data)?;
    Ok(data)
}

/// Copies up to `len` bytes of `data` into a client buffer and returns how many were copied.
fn write_prefix(
    buffer: &MappedBuffer,
    memory: &mut dyn GuestMemory,
    len: u32,
    data: &[u8],
) -> Result<u32, ServiceError> {
    let count = data.len().min(len as usize).min(buffer.len());
    buffer.write(memory, 0, &data[..count])?;
    Ok(count as u32)
}

fn message_type(is_outbox: bool) -> CecDataPathType {
    if is_outbox {
        CecDataPathType::OutboxMsg
    } else {
        CecDataPathType::InboxMsg
    }
}

impl Cecd {
    pub fn new() -> Self {
        let mut store = BoxStore::new();
        store.create_dir_all(ROOT_DIR);
        Self {
            store,
            cecinfo_event: None,
            change_state_event: None,
        }
    }

    pub fn store(&self) -> &BoxStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut BoxStore {
        &mut self.store
    }

    /// Opens `path`, creating it when `create` is set. Returns the entry count for directories
    /// and the size for files, or `None` when the path does not exist.
    fn open_path(&mut self, path_type: CecDataPathType, path: &str, create: bool) -> Option<u32> {
        if path_type.is_dir() {
            if self.store.is_dir(path) {
                return Some(self.store.entries(path).len().min(MAX_DIR_ENTRIES) as u32);
            }
            if create {
                self.store.create_dir_all(path);
                return Some(0);
            }
            return None;
        }
        if let Some(data) = self.store.read(path) {
            return Some(data.len() as u32);
        }
        if create {
            self.store.write(path, Vec::new());
            return Some(0);
        }
        None
    }

    /// Writes `data` to a file, validating its header first when the check flag is set.
    fn write_file(
        &mut self,
        path_type: CecDataPathType,
        ncch_program_id: u32,
        open_mode: CecOpenMode,
        path: &str,
        mut data: Vec<u8>,
    ) {
        if open_mode.contains(CecOpenMode::CHECK) {
            check_and_update_file(path_type, ncch_program_id, &mut data, &self.store);
        }
        self.store.write(path, data);
    }

    fn open(
        &mut self,
        session: &mut CecdSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let ncch_program_id: u32 = rp.pop();
        let raw_type: u32 = rp.pop();
        let open_mode = CecOpenMode::from_bits_retain(rp.pop());
        let _pid = rp.pop_pid()?;

        let path = CecDataPathType::try_from(raw_type)
            .ok()
            .and_then(|path_type| Some((path_type, path_type.path(ncch_program_id, &[])?)));
        let Some((path_type, path)) = path else {
            tracing::error!(raw_type, "Open with invalid path type");
            rp.make_builder(2, 0).push(ERR_INVALID_PATH_TYPE).push(0u32);
            return Ok(());
        };

        *session = CecdSession {
            ncch_program_id,
            path_type,
            open_mode,
            path: path.clone(),
        };

        let opened = self.open_path(path_type, &path, open_mode.contains(CecOpenMode::CREATE));
        if opened.is_some() && path_type == CecDataPathType::MboxData(MBOX_PROGRAM_ID_INDEX) {
            let program_id = env.kernel.process(env.process)?.program_id;
            self.store.write(&path, program_id.to_le_bytes().to_vec());
        }

        tracing::debug!(
            ncch_program_id = format_args!("{ncch_program_id:#010x}"),
            ?path_type,
            %path,
            ?open_mode,
            ?opened,
            "Open"
        );
        let mut rb = rp.make_builder(2, 0);
        match opened {
            Some(value) => rb.push(RESULT_SUCCESS).push(value),
            None => rb.push(ERR_NO_DATA).push(0u32),
        };
        Ok(())
    }

    fn read(
        &mut self,
        session: &mut CecdSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let size: u32 = rp.pop();
        let buffer = rp.pop_mapped_buffer()?;

        let (result, bytes_read) = if session.path_type.is_dir() {
            (ERR_NOT_AUTHORIZED, 0)
        } else {
            match self.store.read(&session.path) {
                Some(data) => (RESULT_SUCCESS, write_prefix(&buffer, env.memory, size, data)?),
                None => (ERR_NO_DATA, 0),
            }
        };
        tracing::debug!(size, path = %session.path, bytes_read, "Read");
        rp.make_builder(2, 2)
            .push(result)
            .push(bytes_read)
            .push_mapped_buffer(&buffer);
        Ok(())
    }

    fn read_message(
        &mut self,
        _session: &mut CecdSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let ncch_program_id: u32 = rp.pop();
        let is_outbox: bool = rp.pop();
        let message_id_size: u32 = rp.pop();
        let size: u32 = rp.pop();
        let id_buffer = rp.pop_mapped_buffer()?;
        let buffer = rp.pop_mapped_buffer()?;

        let message_id = read_prefix(&id_buffer, &*env.memory, message_id_size)?;
        let path = message_type(is_outbox).path(ncch_program_id, &message_id);
        let (result, bytes_read) = match path.as_deref().and_then(|path| self.store.read(path)) {
            Some(data) => (RESULT_SUCCESS, write_prefix(&buffer, env.memory, size, data)?),
            None => (ERR_NO_DATA, 0),
        };
        tracing::debug!(is_outbox, ?path, bytes_read, "ReadMessage");
        rp.make_builder(2, 4)
            .push(result)
            .push(bytes_read)
            .push_mapped_buffer(&id_buffer)
            .push_mapped_buffer(&buffer);
        Ok(())
    }

    fn write(
        &mut self,
        session: &mut CecdSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let size: u32 = rp.pop();
        let buffer = rp.pop_mapped_buffer()?;

        let result = if session.path_type.is_dir() {
            ERR_NOT_AUTHORIZED
        } else if session.path.is_empty() {
            ERR_NO_DATA
        } else {
            let data = read_prefix(&buffer, &*env.memory, size)?;
            self.write_file(
                session.path_type,
                session.ncch_program_id,
                session.open_mode,
                &session.path,
                data,
            );
            RESULT_SUCCESS
        };
        tracing::debug!(size, path = %session.path, "Write");
        rp.make_builder(1, 2)
            .push(result)
            .push_mapped_buffer(&buffer);
        Ok(())
    }

    fn write_message(
        &mut self,
        _session: &mut CecdSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let ncch_program_id: u32 = rp.pop();
        let is_outbox: bool = rp.pop();
        let message_id_size: u32 = rp.pop();
        let size: u32 = rp.pop();
        let buffer = rp.pop_mapped_buffer()?;
        let id_buffer = rp.pop_mapped_buffer()?;

        let message_id = read_prefix(&id_buffer, &*env.memory, message_id_size)?;
        let result = match message_type(is_outbox).path(ncch_program_id, &message_id) {
            Some(path) => {
                let data = read_prefix(&buffer, &*env.memory, size)?;
                tracing::debug!(is_outbox, %path, size = data.len(), "WriteMessage");
                self.store.write(&path, data);
                RESULT_SUCCESS
            }
            None => ERR_NO_DATA,
        };
        rp.make_builder(1, 4)
            .push(result)
            .push_mapped_buffer(&buffer)
            .push_mapped_buffer(&id_buffer);
        Ok(())
    }

    fn delete(
        &mut self,
        _session: &mut CecdSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let ncch_program_id: u32 = rp.pop();
        let raw_type: u32 = rp.pop();
        let is_outbox: bool = rp.pop();
        let message_id_size: u32 = rp.pop();
        let id_buffer = rp.pop_mapped_buffer()?;

        let result = match CecDataPathType::try_from(raw_type) {
            Err(_) | Ok(CecDataPathType::Invalid) => ERR_INVALID_PATH_TYPE,
            Ok(path_type) => {
                let path = if path_type.is_dir() || message_id_size == 0 {
                    path_type.path(ncch_program_id, &[])
                } else {
                    let message_id = read_prefix(&id_buffer, &*env.memory, message_id_size)?;
                    message_type(is_outbox).path(ncch_program_id, &message_id)
                };
                let removed = path.as_deref().is_some_and(|path| {
                    if path_type.is_dir() {
                        self.store.remove_dir_all(path)
                    } else {
                        self.store.remove_file(path)
                    }
                });
                tracing::debug!(?path_type, ?path, removed, "Delete");
                if removed {
                    RESULT_SUCCESS
                } else {
                    ERR_NO_DATA
                }
            }
        };
        rp.make_builder(1, 2)
            .push(result)
            .push_mapped_buffer(&id_buffer);
        Ok(())
    }

    fn start(
        &mut self,
        _session: &mut CecdSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let command: u32 = rp.pop();
        tracing::warn!(command, "(STUBBED) Start");
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        Ok(())
    }

    fn stop(
        &mut self,
        _session: &mut CecdSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let command: u32 = rp.pop();
        tracing::warn!(command, "(STUBBED) Stop");
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        Ok(())
    }

    fn get_cec_info_buffer(
        &mut self,
        _session: &mut CecdSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let size: u32 = rp.pop();
        let info_type: u32 = rp.pop();
        let buffer = rp.pop_mapped_buffer()?;
        tracing::debug!(size, info_type, "GetCecInfoBuffer");
        rp.make_builder(1, 2)
            .push(RESULT_SUCCESS)
            .push_mapped_buffer(&buffer);
        Ok(())
    }

    fn get_cecd_state(
        &mut self,
        _session: &mut CecdSession,
        rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        rp.make_builder(2, 0)
            .push(RESULT_SUCCESS)
            .push(CECD_STATE_IDLE);
        Ok(())
    }

    fn get_cec_info_event_handle(
        &mut self,
        _session: &mut CecdSession,
        rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        rp.make_builder(1, 2)
            .push(RESULT_SUCCESS)
            .push_copy_objects(&[self.cecinfo_event]);
        Ok(())
    }

    fn get_change_state_event_handle(
        &mut self,
        _session: &mut CecdSession,
        rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        rp.make_builder(1, 2)
            .push(RESULT_SUCCESS)
            .push_copy_objects(&[self.change_state_event]);
        Ok(())
    }

    fn open_and_write(
        &mut self,
        _session: &mut CecdSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let size: u32 = rp.pop();
        let ncch_program_id: u32 = rp.pop();
        let raw_type: u32 = rp.pop();
        let open_mode = CecOpenMode::from_bits_retain(rp.pop());
        let _pid = rp.pop_pid()?;
        let buffer = rp.pop_mapped_buffer()?;

        let result = match CecDataPathType::try_from(raw_type) {
            Ok(path_type) if path_type.is_dir() => ERR_NOT_AUTHORIZED,
            Ok(path_type) => match path_type.path(ncch_program_id, &[]) {
                Some(path) => {
                    let data = read_prefix(&buffer, &*env.memory, size)?;
                    tracing::debug!(?path_type, %path, size, ?open_mode, "OpenAndWrite");
                    self.write_file(path_type, ncch_program_id, open_mode, &path, data);
                    RESULT_SUCCESS
                }
                None => ERR_INVALID_PATH_TYPE,
            },
            Err(_) => ERR_INVALID_PATH_TYPE,
        };
        rp.make_builder(1, 2)
            .push(result)
            .push_mapped_buffer(&buffer);
        Ok(())
    }

    fn open_and_read(
        &mut self,
        _session: &mut CecdSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let size: u32 = rp.pop();
        let ncch_program_id: u32 = rp.pop();
        let raw_type: u32 = rp.pop();
        let open_mode = CecOpenMode::from_bits_retain(rp.pop());
        let _pid = rp.pop_pid()?;
        let buffer = rp.pop_mapped_buffer()?;

        let (result, bytes_read) = match CecDataPathType::try_from(raw_type) {
            Ok(path_type) if path_type.is_dir() => (ERR_NOT_AUTHORIZED, 0),
            Ok(path_type) => {
                let path = path_type.path(ncch_program_id, &[]);
                tracing::debug!(?path_type, ?path, size, ?open_mode, "OpenAndRead");
                match path.as_deref().and_then(|path| self.store.read(path)) {
                    Some(data) => (RESULT_SUCCESS, write_prefix(&buffer, env.memory, size, data)?),
                    None => (ERR_NO_DATA, 0),
                }
            }
            Err(_) => (ERR_INVALID_PATH_TYPE, 0),
        };
        rp.make_builder(2, 2)
            .push(result)
            .push(bytes_read)
            .push_mapped_buffer(&buffer);
        Ok(())
    }
}

impl ServiceModule for Cecd {
    type Session = CecdSession;
    const NAME: &'static str = "cecd:u";
    const MAX_SESSIONS: u32 = 10;

    fn handlers() -> Vec<FunctionInfo<Self>> {
        vec![
            FunctionInfo::handler(0x0001_00C2, Self::open, "Open"),
            FunctionInfo::handler(0x0002_0042, Self::read, "Read"),
            FunctionInfo::handler(0x0003_0104, Self::read_message, "ReadMessage"),
            FunctionInfo::stub(0x0004_0106, "ReadMessageWithHMAC"),
            FunctionInfo::handler(0x0005_0042, Self::write, "Write"),
            FunctionInfo::handler(0x0006_0104, Self::write_message, "WriteMessage"),
            FunctionInfo::stub(0x0007_0106, "WriteMessageWithHMAC"),
            FunctionInfo::handler(0x0008_0102, Self::delete, "Delete"),
            FunctionInfo::stub(0x0009_00C2, "SetData"),
            FunctionInfo::stub(0x000A_00C4, "ReadData"),
            FunctionInfo::handler(0x000B_0040, Self::start, "Start"),
            FunctionInfo::handler(0x000C_0040, Self::stop, "Stop"),
            FunctionInfo::handler(0x000D_0082, Self::get_cec_info_buffer, "GetCecInfoBuffer"),
            FunctionInfo::handler(0x000E_0000, Self::get_cecd_state, "GetCecdState"),
            FunctionInfo::handler(
                0x000F_0000,
                Self::get_cec_info_event_handle,
                "GetCecInfoEventHandle",
            ),
            FunctionInfo::handler(
                0x0010_0000,
                Self::get_change_state_event_handle,
                "GetChangeStateEventHandle",
            ),
            FunctionInfo::handler(0x0011_0104, Self::open_and_write, "OpenAndWrite"),
            FunctionInfo::handler(0x0012_0104, Self::open_and_read, "OpenAndRead"),
        ]
    }

    fn install(&mut self, kernel: &mut Kernel) -> Result<(), KernelError> {
        self.cecinfo_event = Some(kernel.create_event(ResetType::OneShot, "CECD::cecinfo_event"));
        self.change_state_event =
            Some(kernel.create_event(ResetType::OneShot, "CECD::change_state_event"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_types_decode_from_raw_values() {
        assert_eq!(CecDataPathType::try_from(5), Ok(CecDataPathType::OutboxIndex));
        assert_eq!(CecDataPathType::try_from(13), Ok(CecDataPathType::OutboxDir));
        assert_eq!(CecDataPathType::try_from(150), Ok(CecDataPathType::MboxData(50)));
        assert_eq!(CecDataPathType::try_from(8), Err(8));
        assert_eq!(CecDataPathType::try_from(200), Err(200));
    }

    #[test]
    fn paths_follow_the_box_layout() {
        let id = 0x0012_3400;
        assert_eq!(
            CecDataPathType::OutboxIndex.path(id, &[]).as_deref(),
            Some("/CEC/00123400/OutBox__/OBIndex_____")
        );
        assert_eq!(
            CecDataPathType::MboxData(50).path(id, &[]).as_deref(),
            Some("/CEC/00123400/MBoxData.050")
        );
        assert_eq!(
            CecDataPathType::InboxMsg.path(id, b"ab").as_deref(),
            Some("/CEC/00123400/InBox___/_YWI")
        );
        assert_eq!(CecDataPathType::Invalid.path(id, &[]), None);
        assert!(CecDataPathType::RootDir.is_dir());
        assert!(!CecDataPathType::MboxInfo.is_dir());
    }

    #[test]
    fn base64_uses_the_box_alphabet_without_padding() {
        assert_eq!(encode_base64(b""), "");
        assert_eq!(encode_base64(b"Man"), "TWFu");
        assert_eq!(encode_base64(b"Ma"), "TWE");
        assert_eq!(encode_base64(b"M"), "TQ");
        assert_eq!(encode_base64(&[0xFF, 0xFF, 0xFF]), "----");
        assert_eq!(encode_base64(&[0xFB, 0xEF, 0xBE]), "....");
    }

    #[test]
    fn open_mode_keeps_unknown_bits() {
        let mode = CecOpenMode::from_bits_retain(0x1C | 0x100);
        assert!(mode.contains(CecOpenMode::WRITE | CecOpenMode::CREATE | CecOpenMode::CHECK));
        assert!(!mode.contains(CecOpenMode::READ));
        assert_eq!(mode.bits(), 0x11C);
    }

    #[test]
    fn open_path_creates_only_with_the_create_flag() {
        let mut cecd = Cecd::new();
        let path = "/CEC/00001234/MBoxInfo____";
        assert_eq!(cecd.open_path(CecDataPathType::MboxInfo, path, false), None);
        assert_eq!(cecd.open_path(CecDataPathType::MboxInfo, path, true), Some(0));
        assert!(cecd.store().is_file(path));
        assert_eq!(cecd.open_path(CecDataPathType::MboxDir, "/CEC/00001234", false), Some(1));
        assert_eq!(cecd.open_path(CecDataPathType::RootDir, ROOT_DIR, false), Some(1));
    }
}

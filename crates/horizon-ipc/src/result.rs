use core::fmt;

/// Result description (bits 0..10). Services define their own values beyond the common ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorDescription(pub u32);

impl ErrorDescription {
    pub const SUCCESS: Self = Self(0);
    pub const OS_INVALID_BUFFER_DESCRIPTOR: Self = Self(48);
    pub const MAX_CONNECTIONS_REACHED: Self = Self(52);
    pub const WRONG_PERMISSION: Self = Self(46);
    pub const NOT_AUTHORIZED: Self = Self(1002);
    pub const ALREADY_EXISTS: Self = Self(1004);
    pub const NO_DATA: Self = Self(1007);
    pub const OUT_OF_MEMORY: Self = Self(1011);
    pub const NOT_IMPLEMENTED: Self = Self(1012);
    pub const INVALID_ADDRESS: Self = Self(1013);
    pub const INVALID_POINTER: Self = Self(1014);
    pub const INVALID_HANDLE: Self = Self(1015);
    pub const NOT_INITIALIZED: Self = Self(1016);
    pub const ALREADY_INITIALIZED: Self = Self(1017);
    pub const NOT_FOUND: Self = Self(1018);
    pub const CANCEL_REQUESTED: Self = Self(1019);
    pub const INVALID_ENUM_VALUE: Self = Self(1020);
    pub const OUT_OF_RANGE: Self = Self(1021);
    pub const TIMEOUT: Self = Self(1022);
    pub const INVALID_RESULT_VALUE: Self = Self(1023);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorModule {
    Common = 0,
    Kernel = 1,
    Util = 2,
    FileServer = 3,
    LoaderServer = 4,
    Os = 6,
    Fs = 17,
    Srv = 25,
    Ndm = 26,
    Soc = 28,
    Am = 32,
    Http = 40,
    Cec = 58,
    Application = 254,
    InvalidResult = 255,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorSummary {
    Success = 0,
    NothingHappened = 1,
    WouldBlock = 2,
    OutOfResource = 3,
    NotFound = 4,
    InvalidState = 5,
    NotSupported = 6,
    InvalidArgument = 7,
    WrongArgument = 8,
    Canceled = 9,
    StatusChanged = 10,
    Internal = 11,
    InvalidResultValue = 63,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorLevel {
    Success = 0,
    Info = 1,
    Status = 25,
    Temporary = 26,
    Permanent = 27,
    Usage = 28,
    Reinitialize = 29,
    Reset = 30,
    Fatal = 31,
}

/// Guest-visible outcome of a kernel call or IPC command.
///
/// Layout: description bits 0..10, module bits 10..18, summary bits 21..27, level bits 27..32.
/// Any value with the top bit set is a failure.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultCode(u32);

pub const RESULT_SUCCESS: ResultCode = ResultCode(0);

/// A wait that was force-resolved by its timeout.
pub const RESULT_TIMEOUT: ResultCode = ResultCode::new(
    ErrorDescription::TIMEOUT,
    ErrorModule::Os,
    ErrorSummary::StatusChanged,
    ErrorLevel::Info,
);

impl ResultCode {
    pub const fn new(
        description: ErrorDescription,
        module: ErrorModule,
        summary: ErrorSummary,
        level: ErrorLevel,
    ) -> Self {
        Self(
            (description.0 & 0x3FF)
                | ((module as u32 & 0xFF) << 10)
                | ((summary as u32 & 0x3F) << 21)
                | ((level as u32 & 0x1F) << 27),
        )
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn description(self) -> ErrorDescription {
        ErrorDescription(self.0 & 0x3FF)
    }

    pub const fn module_raw(self) -> u32 {
        (self.0 >> 10) & 0xFF
    }

    pub const fn summary_raw(self) -> u32 {
        (self.0 >> 21) & 0x3F
    }

    pub const fn level_raw(self) -> u32 {
        self.0 >> 27
    }

    pub const fn is_success(self) -> bool {
        (self.0 as i32) >= 0
    }

    pub const fn is_error(self) -> bool {
        !self.is_success()
    }
}

impl fmt::Debug for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResultCode(0x{:08X} desc={} module={} summary={} level={})",
            self.0,
            self.description().0,
            self.module_raw(),
            self.summary_raw(),
            self.level_raw()
        )
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

use core::fmt;

/// Command header: command id in bits 16..32, normal word count in bits 6..12, translate word
/// count in bits 0..6.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header(u32);

impl Header {
    pub const MAX_PARAMS: u32 = 0x3F;

    pub const fn new(command_id: u16, normal_params: u32, translate_params: u32) -> Self {
        Self(
            ((command_id as u32) << 16)
                | ((normal_params & Self::MAX_PARAMS) << 6)
                | (translate_params & Self::MAX_PARAMS),
        )
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn command_id(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Number of plain data words following the header.
    pub const fn normal_params(self) -> u32 {
        (self.0 >> 6) & Self::MAX_PARAMS
    }

    /// Number of translate words (descriptors plus their payloads) after the normal words.
    pub const fn translate_params(self) -> u32 {
        self.0 & Self::MAX_PARAMS
    }

    /// Words occupied by the whole command, header included.
    pub const fn total_words(self) -> usize {
        1 + self.normal_params() as usize + self.translate_params() as usize
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Header(0x{:08X} id=0x{:X} normal={} translate={})",
            self.0,
            self.command_id(),
            self.normal_params(),
            self.translate_params()
        )
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

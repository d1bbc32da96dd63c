use crate::result::ResultCode;

/// A plain value carried in normal parameter words.
///
/// Values occupy `ceil(size / 4)` words. Multi-word values are little-endian across words, like
/// the guest lays them out in memory.
pub trait IpcValue: Sized {
    const WORDS: usize;

    fn decode(words: &[u32]) -> Self;

    fn encode(&self, out: &mut [u32]);
}

macro_rules! single_word_value {
    ($($ty:ty),*) => {$(
        impl IpcValue for $ty {
            const WORDS: usize = 1;

            fn decode(words: &[u32]) -> Self {
                words[0] as $ty
            }

            fn encode(&self, out: &mut [u32]) {
                out[0] = *self as u32;
            }
        }
    )*};
}

single_word_value!(u8, u16, u32, i8, i16, i32);

impl IpcValue for bool {
    const WORDS: usize = 1;

    fn decode(words: &[u32]) -> Self {
        // Only the low byte is meaningful.
        words[0] & 0xFF != 0
    }

    fn encode(&self, out: &mut [u32]) {
        out[0] = u32::from(*self);
    }
}

impl IpcValue for f32 {
    const WORDS: usize = 1;

    fn decode(words: &[u32]) -> Self {
        f32::from_bits(words[0])
    }

    fn encode(&self, out: &mut [u32]) {
        out[0] = self.to_bits();
    }
}

impl IpcValue for u64 {
    const WORDS: usize = 2;

    fn decode(words: &[u32]) -> Self {
        u64::from(words[0]) | (u64::from(words[1]) << 32)
    }

    fn encode(&self, out: &mut [u32]) {
        out[0] = *self as u32;
        out[1] = (*self >> 32) as u32;
    }
}

impl IpcValue for i64 {
    const WORDS: usize = 2;

    fn decode(words: &[u32]) -> Self {
        u64::decode(words) as i64
    }

    fn encode(&self, out: &mut [u32]) {
        (*self as u64).encode(out);
    }
}

impl IpcValue for ResultCode {
    const WORDS: usize = 1;

    fn decode(words: &[u32]) -> Self {
        ResultCode::from_raw(words[0])
    }

    fn encode(&self, out: &mut [u32]) {
        out[0] = self.raw();
    }
}

/// Fixed-size blobs, e.g. service names or MAC addresses.
impl<const N: usize> IpcValue for [u8; N] {
    const WORDS: usize = N.div_ceil(4);

    fn decode(words: &[u32]) -> Self {
        let mut out = [0u8; N];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = (words[i / 4] >> ((i % 4) * 8)) as u8;
        }
        out
    }

    fn encode(&self, out: &mut [u32]) {
        for word in out.iter_mut().take(Self::WORDS) {
            *word = 0;
        }
        for (i, byte) in self.iter().enumerate() {
            out[i / 4] |= u32::from(*byte) << ((i % 4) * 8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_packs_little_endian_and_pads() {
        let name = *b"http:C\0\0";
        assert_eq!(<[u8; 8]>::WORDS, 2);
        let mut words = [0xFFFF_FFFFu32; 2];
        name.encode(&mut words);
        assert_eq!(words, [0x7074_7468, 0x0000_433A]);
        assert_eq!(<[u8; 8]>::decode(&words), name);

        assert_eq!(<[u8; 6]>::WORDS, 2);
        let mac = [1u8, 2, 3, 4, 5, 6];
        let mut words = [0xFFFF_FFFFu32; 2];
        mac.encode(&mut words);
        assert_eq!(words[1], 0x0000_0605);
    }

    #[test]
    fn u64_spans_two_words_low_first() {
        let mut words = [0u32; 2];
        0x0004_0000_0012_3400u64.encode(&mut words);
        assert_eq!(words, [0x0012_3400, 0x0004_0000]);
    }
}

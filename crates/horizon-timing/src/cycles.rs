/// ARM11 core clock in Hz.
pub const BASE_CLOCK_RATE_ARM11: u64 = 268_111_856;

const MS_PER_SEC: u128 = 1_000;
const US_PER_SEC: u128 = 1_000_000;
const NS_PER_SEC: u128 = 1_000_000_000;

fn scale(value: u64, mul: u128, div: u128) -> u64 {
    let scaled = u128::from(value) * mul / div;
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

pub fn ms_to_cycles(ms: u64) -> u64 {
    scale(ms, u128::from(BASE_CLOCK_RATE_ARM11), MS_PER_SEC)
}

pub fn us_to_cycles(us: u64) -> u64 {
    scale(us, u128::from(BASE_CLOCK_RATE_ARM11), US_PER_SEC)
}

pub fn ns_to_cycles(ns: u64) -> u64 {
    scale(ns, u128::from(BASE_CLOCK_RATE_ARM11), NS_PER_SEC)
}

pub fn cycles_to_ms(cycles: u64) -> u64 {
    scale(cycles, MS_PER_SEC, u128::from(BASE_CLOCK_RATE_ARM11))
}

pub fn cycles_to_us(cycles: u64) -> u64 {
    scale(cycles, US_PER_SEC, u128::from(BASE_CLOCK_RATE_ARM11))
}

pub fn cycles_to_ns(cycles: u64) -> u64 {
    scale(cycles, NS_PER_SEC, u128::from(BASE_CLOCK_RATE_ARM11))
}

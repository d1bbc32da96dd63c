//! The read-only page the kernel shares with every process: console clock, battery, Wi-Fi and
//! 3D slider state.

use std::time::{SystemTime, UNIX_EPOCH};

use horizon_memory::{GuestMemory, GuestMemoryResult};
use horizon_timing::{ms_to_cycles, CoreTiming, EventId, TimingHost, BASE_CLOCK_RATE_ARM11};

use crate::settings::{InitClock, Settings};

pub const SHARED_PAGE_VADDR: u32 = 0x1FF8_1000;
pub const SHARED_PAGE_SIZE: usize = 0x1000;

/// The console refreshes its clock once per emulated hour.
const UPDATE_INTERVAL_MS: u64 = 60 * 60 * 1000;

/// Unix milliseconds of 2000-01-01T00:00:00Z. The console cannot be set earlier.
const CONSOLE_EPOCH_UNIX_MS: u64 = 946_684_800_000;
/// Milliseconds from 1900-01-01 to 2000-01-01; console time counts from 1900.
const CONSOLE_TIME_AT_EPOCH: u64 = 3_155_673_600_000;

const DATE_TIME_COUNTER: usize = 0x00;
const RUNNING_HW: usize = 0x04;
const DATE_TIME_0: usize = 0x20;
const DATE_TIME_1: usize = 0x40;
const WIFI_LINK_LEVEL: usize = 0x66;
const NETWORK_STATE: usize = 0x67;
const SLIDER_STATE_3D: usize = 0x80;
const BATTERY_STATE: usize = 0x85;
const UNKNOWN_VALUE: usize = 0x86;

const RUNNING_HW_PRODUCT: u8 = 1;

/// One of the two alternating clock records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateTime {
    /// Milliseconds since 1900-01-01.
    pub date_time: u64,
    pub update_tick: u64,
    pub tick_to_second_coefficient: u64,
    pub tick_offset: u64,
}

impl DateTime {
    fn write(&self, page: &mut [u8], offset: usize) {
        let fields = [
            self.date_time,
            self.update_tick,
            self.tick_to_second_coefficient,
            self.tick_offset,
        ];
        for (i, field) in fields.iter().enumerate() {
            let at = offset + i * 8;
            page[at..at + 8].copy_from_slice(&field.to_le_bytes());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SharedPage {
    pub date_time_counter: u32,
    pub date_time: [DateTime; 2],
    pub wifi_link_level: u8,
    pub network_state: u8,
    pub slider_state_3d: f32,
    pub battery_charging: bool,
    pub adapter_connected: bool,
    pub battery_level: u8,
    /// Unix milliseconds at boot.
    init_time_ms: u64,
    update_event: Option<EventId>,
}

fn host_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}

/// Console time for a wall-clock instant given in unix milliseconds.
pub fn console_time_ms(unix_ms: u64) -> u64 {
    CONSOLE_TIME_AT_EPOCH + unix_ms.saturating_sub(CONSOLE_EPOCH_UNIX_MS)
}

impl SharedPage {
    pub fn new(settings: &Settings) -> Self {
        let init_time_ms = match settings.init_clock {
            InitClock::SystemTime => host_unix_ms(),
            InitClock::FixedTime => settings.init_time.saturating_mul(1000),
        };
        let slider_state_3d = if settings.enable_3d {
            f32::from(settings.factor_3d) / 100.0
        } else {
            0.0
        };
        Self {
            date_time_counter: 0,
            date_time: [DateTime::default(); 2],
            wifi_link_level: settings.wifi_link_level,
            network_state: settings.network_state,
            slider_state_3d,
            battery_charging: settings.battery_charging,
            adapter_connected: settings.adapter_connected,
            battery_level: settings.battery_level,
            init_time_ms,
            update_event: None,
        }
    }

    /// Console time after `elapsed_us` of emulated time.
    pub fn system_time(&self, elapsed_us: u64) -> u64 {
        console_time_ms(self.init_time_ms + elapsed_us / 1000)
    }

    /// Writes a fresh clock record into the slot the guest is not reading and flips the counter.
    pub fn update_time(&mut self, ticks: u64, elapsed_us: u64) {
        let slot = if self.date_time_counter % 2 == 1 { 0 } else { 1 };
        self.date_time[slot] = DateTime {
            date_time: self.system_time(elapsed_us),
            update_tick: ticks,
            tick_to_second_coefficient: BASE_CLOCK_RATE_ARM11,
            tick_offset: 0,
        };
        self.date_time_counter = self.date_time_counter.wrapping_add(1);
    }

    /// Registers the hourly clock refresh and schedules the first one immediately.
    pub fn start<C: SharedPageHost>(&mut self, timing: &mut CoreTiming<C>) {
        let event = timing.register_event("SharedPage::UpdateTimeCallback", update_time_callback::<C>);
        timing.schedule_event(0, event, 0);
        self.update_event = Some(event);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut page = vec![0u8; SHARED_PAGE_SIZE];
        page[DATE_TIME_COUNTER..DATE_TIME_COUNTER + 4]
            .copy_from_slice(&self.date_time_counter.to_le_bytes());
        page[RUNNING_HW] = RUNNING_HW_PRODUCT;
        self.date_time[0].write(&mut page, DATE_TIME_0);
        self.date_time[1].write(&mut page, DATE_TIME_1);
        page[WIFI_LINK_LEVEL] = self.wifi_link_level;
        page[NETWORK_STATE] = self.network_state;
        page[SLIDER_STATE_3D..SLIDER_STATE_3D + 4]
            .copy_from_slice(&self.slider_state_3d.to_le_bytes());
        page[BATTERY_STATE] = u8::from(self.battery_charging)
            | u8::from(self.adapter_connected) << 1
            | (self.battery_level & 0x7) << 2;
        // Some titles spin until this reads 1.
        page[UNKNOWN_VALUE] = 1;
        page
    }

    pub fn write_to(&self, memory: &mut dyn GuestMemory) -> GuestMemoryResult<()> {
        memory.write_from(SHARED_PAGE_VADDR, &self.to_bytes())
    }
}

/// A timing host that owns a shared page and the memory it is mapped into.
pub trait SharedPageHost: TimingHost {
    fn shared_page(&mut self) -> &mut SharedPage;
    fn publish_shared_page(&mut self);
}

fn update_time_callback<C: SharedPageHost>(host: &mut C, _user_data: u64, cycles_late: i64) {
    let timing = host.core_timing();
    let (ticks, elapsed_us) = (timing.ticks(), timing.global_time_us());
    let page = host.shared_page();
    page.update_time(ticks, elapsed_us);
    let event = page.update_event;
    host.publish_shared_page();
    if let Some(event) = event {
        let interval = ms_to_cycles(UPDATE_INTERVAL_MS) as i64;
        host.core_timing().schedule_event(interval - cycles_late, event, 0);
    }
}

use std::path::{Path, PathBuf};

use horizon_timing::DEFAULT_MAX_SLICE_LENGTH;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 2000-01-01T00:00:00Z, give or take the seconds the console's own default carries.
const DEFAULT_INIT_TIME: u64 = 946_681_277;

/// Full charge in the shared page's battery level field.
pub const BATTERY_LEVEL_FULL: u8 = 5;
const MAX_BATTERY_LEVEL: u8 = BATTERY_LEVEL_FULL;
const MAX_WIFI_LINK_LEVEL: u8 = 3;

/// How the console clock is seeded at boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitClock {
    /// The host's wall clock.
    #[default]
    SystemTime,
    /// [`Settings::init_time`].
    FixedTime,
}

impl InitClock {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "system_time" => Some(Self::SystemTime),
            "fixed_time" => Some(Self::FixedTime),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for env var {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("{field} {value} is out of range (max {max})")]
    OutOfRange {
        field: &'static str,
        value: u8,
        max: u8,
    },
}

/// Emulated console configuration. Read once at boot and never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub init_clock: InitClock,
    /// Unix seconds, used with [`InitClock::FixedTime`].
    pub init_time: u64,

    pub battery_level: u8,
    pub adapter_connected: bool,
    pub battery_charging: bool,

    pub wifi_link_level: u8,
    pub network_state: u8,

    pub enable_3d: bool,
    /// 3D slider position in percent.
    pub factor_3d: u8,

    pub sdmc_root: PathBuf,
    pub nand_root: PathBuf,

    /// Longest execution slice CoreTiming hands out, in cycles.
    pub max_slice_length: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            init_clock: InitClock::SystemTime,
            init_time: DEFAULT_INIT_TIME,
            battery_level: BATTERY_LEVEL_FULL,
            adapter_connected: true,
            battery_charging: true,
            wifi_link_level: 0,
            network_state: 0,
            enable_3d: false,
            factor_3d: 0,
            sdmc_root: PathBuf::from("./sdmc"),
            nand_root: PathBuf::from("./nand"),
            max_slice_length: DEFAULT_MAX_SLICE_LENGTH,
        }
    }
}

impl Settings {
    /// Parses settings from JSON. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Applies `HORIZON_INIT_TIME`, `HORIZON_INIT_CLOCK`, `HORIZON_SDMC_ROOT` and
    /// `HORIZON_NAND_ROOT` when they are set.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(raw) = std::env::var("HORIZON_INIT_TIME") {
            self.init_time = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "HORIZON_INIT_TIME",
                value: raw.clone(),
            })?;
        }
        if let Ok(raw) = std::env::var("HORIZON_INIT_CLOCK") {
            self.init_clock = InitClock::parse(&raw).ok_or(ConfigError::InvalidEnv {
                var: "HORIZON_INIT_CLOCK",
                value: raw.clone(),
            })?;
        }
        if let Ok(raw) = std::env::var("HORIZON_SDMC_ROOT") {
            self.sdmc_root = PathBuf::from(raw);
        }
        if let Ok(raw) = std::env::var("HORIZON_NAND_ROOT") {
            self.nand_root = PathBuf::from(raw);
        }
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.battery_level > MAX_BATTERY_LEVEL {
            return Err(ConfigError::OutOfRange {
                field: "battery_level",
                value: self.battery_level,
                max: MAX_BATTERY_LEVEL,
            });
        }
        if self.wifi_link_level > MAX_WIFI_LINK_LEVEL {
            return Err(ConfigError::OutOfRange {
                field: "wifi_link_level",
                value: self.wifi_link_level,
                max: MAX_WIFI_LINK_LEVEL,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_keep_defaults() {
        let settings = Settings::from_json_str(r#"{ "init_clock": "fixed_time", "factor_3d": 40 }"#)
            .unwrap();
        assert_eq!(settings.init_clock, InitClock::FixedTime);
        assert_eq!(settings.factor_3d, 40);
        assert_eq!(settings.init_time, DEFAULT_INIT_TIME);
        assert_eq!(settings.battery_level, BATTERY_LEVEL_FULL);
        assert_eq!(settings.max_slice_length, DEFAULT_MAX_SLICE_LENGTH);
    }

    #[test]
    fn out_of_range_levels_are_rejected() {
        let err = Settings::from_json_str(r#"{ "wifi_link_level": 9 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                field: "wifi_link_level",
                ..
            }
        ));
    }

    #[test]
    fn unknown_clock_mode_is_malformed() {
        let err = Settings::from_json_str(r#"{ "init_clock": "sundial" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}

use std::{path::Path, time::Duration};

use anyhow::{bail, Error};
use common::Settings;
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{animation::DEFAULT_UPDATE_RATE_HZ, ble::SessionSettings};

pub const CONFIG_PATH: &str = "config.ron";

/// The characteristic the light firmware takes colors on
pub const RGB_COLOR_UUID: Uuid = Uuid::from_u128(0x3d09ac99_1201_63ad_b8ab_ff18f6545762);

#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Local name the light advertises
    pub device_name: String,
    pub characteristic: Uuid,
    pub scan_timeout_ms: u64,
    pub update_rate_hz: u32,
    /// Where the knobs start out
    pub settings: Settings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: "RgbLedTest".to_string(),
            characteristic: RGB_COLOR_UUID,
            scan_timeout_ms: 10_000,
            update_rate_hz: DEFAULT_UPDATE_RATE_HZ,
            settings: Settings::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Config, Error> {
        Self::load_from(CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Config, Error> {
        let config = std::fs::read_to_string(path)?;
        Self::parse(&config)
    }

    /// Load `config.ron`, or use the defaults if there isn't one
    pub fn load_or_default() -> Result<Config, Error> {
        if Path::new(CONFIG_PATH).exists() {
            Self::load()
        } else {
            info!("No {} found, using defaults", CONFIG_PATH);
            Ok(Config::default())
        }
    }

    pub fn parse(config: &str) -> Result<Config, Error> {
        let config: Config = ron::from_str(config)?;
        if config.update_rate_hz == 0 {
            bail!("update_rate_hz must be at least 1");
        }
        Ok(config)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.update_rate_hz
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            device_name: self.device_name.clone(),
            characteristic: self.characteristic,
            scan_timeout: Duration::from_millis(self.scan_timeout_ms),
        }
    }
}

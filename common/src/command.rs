use serde::{Deserialize, Serialize};

use crate::Color;

/// Settings changes that can be sent to the animation engine.
///
/// Levels are already normalized to `0.0..=1.0` by whoever sends them (a
/// slider at 40% sends `0.4`). The engine clamps anything outside that range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConfigCommand {
    /// Start a transition toward a new color
    RequestColor { color: Color },
    /// How slowly a transition runs. 0 snaps straight to the target
    SetSmoothing { level: f64 },
    /// Flash frequency. 0 keeps the light steady
    SetFlashLevel { level: f64 },
    /// Output brightness multiplier
    SetIntensity { level: f64 },
    /// How quickly the palette auto-cycle advances. 0 disables it
    SetAutoSpeed { level: f64 },
}

/// The knobs of the engine that aren't colors
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub smoothing: f64,
    pub flash_level: f64,
    pub intensity: f64,
    pub auto_speed: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            smoothing: 0.0,
            flash_level: 0.0,
            intensity: 1.0,
            auto_speed: 0.0,
        }
    }
}

impl Settings {
    /// The commands that bring an engine in line with these settings
    pub fn commands(&self) -> [ConfigCommand; 4] {
        [
            ConfigCommand::SetSmoothing {
                level: self.smoothing,
            },
            ConfigCommand::SetFlashLevel {
                level: self.flash_level,
            },
            ConfigCommand::SetIntensity {
                level: self.intensity,
            },
            ConfigCommand::SetAutoSpeed {
                level: self.auto_speed,
            },
        ]
    }
}

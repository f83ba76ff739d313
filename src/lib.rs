use common::ConfigCommand;

pub mod animation;
pub mod ble;
pub mod color;
pub mod config;
pub mod controller;
pub mod input;

pub mod prelude {
    pub use crate::{animation::*, ble::*, color::*, config::*, controller::*};
    pub use common::{Color, ConfigCommand, Preset, Settings, PALETTE};
}

/// Messages from the user side into the controller
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlMessage {
    /// Change a color or one of the animation knobs
    Config(ConfigCommand),
    /// Start scanning for the light
    Connect,
    /// Stop scanning, or drop the connection
    Disconnect,
    /// The connect button: connect when idle, otherwise cancel or disconnect
    Toggle,
}

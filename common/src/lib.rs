//! Types shared between the light controller and anything that feeds it
//! settings. Everything here is plain data.

mod color;
mod command;

pub use color::*;
pub use command::*;

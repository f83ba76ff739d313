//! Text commands typed on the console, standing in for buttons and sliders.

use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Error};
use common::{Color, ConfigCommand, Preset};

use crate::ControlMessage;

pub const HELP: &str = "\
commands:
  connect | disconnect | toggle | status | quit
  off | white | red | green | blue
  color <r> <g> <b>        channels from 0 to 1
  smoothing <0-100>
  flash <0-100>
  intensity <0-100>
  auto <0-100>";

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Input {
    Control(ControlMessage),
    Status,
    Help,
    Quit,
}

impl FromStr for Input {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            bail!("empty command");
        };
        let args: Vec<&str> = words.collect();

        let input = match (command.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("connect", []) => Input::Control(ControlMessage::Connect),
            ("disconnect", []) => Input::Control(ControlMessage::Disconnect),
            ("toggle", []) => Input::Control(ControlMessage::Toggle),
            ("status", []) => Input::Status,
            ("help" | "?", []) => Input::Help,
            ("quit" | "exit", []) => Input::Quit,
            ("color", [r, g, b]) => config(ConfigCommand::RequestColor {
                color: Color::new(channel(r)?, channel(g)?, channel(b)?),
            }),
            ("smoothing", [level]) => config(ConfigCommand::SetSmoothing {
                level: slider(level)?,
            }),
            ("flash", [level]) => config(ConfigCommand::SetFlashLevel {
                level: slider(level)?,
            }),
            ("intensity", [level]) => config(ConfigCommand::SetIntensity {
                level: slider(level)?,
            }),
            ("auto", [level]) => config(ConfigCommand::SetAutoSpeed {
                level: slider(level)?,
            }),
            (name, []) => match Preset::from_name(name) {
                Some(preset) => config(ConfigCommand::RequestColor {
                    color: preset.color(),
                }),
                None => bail!("unknown command {}", name),
            },
            (name, _) => bail!("wrong arguments for {}", name),
        };

        Ok(input)
    }
}

fn config(command: ConfigCommand) -> Input {
    Input::Control(ControlMessage::Config(command))
}

fn channel(value: &str) -> Result<f64, Error> {
    value
        .parse()
        .with_context(|| format!("{} is not a number", value))
}

/// Slider positions go from 0 to 100 and get scaled to 0..1
fn slider(value: &str) -> Result<f64, Error> {
    let position: u8 = value
        .parse()
        .with_context(|| format!("{} is not a slider position", value))?;
    if position > 100 {
        return Err(anyhow!("slider positions go up to 100, got {}", position));
    }
    Ok(f64::from(position) / 100.0)
}

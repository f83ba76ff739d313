use serde::{Deserialize, Serialize};

/// Number of colors the auto-cycle chooses from
pub const PALETTE_SIZE: usize = 7;

/// Colors the auto-cycle picks its targets from, in a fixed order.
pub const PALETTE: [Color; PALETTE_SIZE] = [
    Color::new(0.0, 0.0, 1.0),
    Color::new(0.0, 1.0, 0.0),
    Color::new(0.0, 1.0, 0.5),
    Color::new(1.0, 0.0, 0.0),
    Color::new(1.0, 0.0, 1.0),
    Color::new(0.5, 1.0, 0.0),
    Color::new(0.5, 1.0, 0.5),
];

/// A light color with one floating point value per channel.
///
/// Channels are nominally in `0.0..=1.0`. Nothing clamps them until the color
/// is turned into bytes for the peripheral, so a caller handing in `1.5` gets
/// exactly that back out of every blend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);

    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub const fn channels(&self) -> [f64; 3] {
        [self.r, self.g, self.b]
    }

    /// Combine two colors channel by channel
    pub fn zip_with(self, other: Color, f: impl Fn(f64, f64) -> f64) -> Color {
        Color {
            r: f(self.r, other.r),
            g: f(self.g, other.g),
            b: f(self.b, other.b),
        }
    }
}

impl From<[f64; 3]> for Color {
    fn from([r, g, b]: [f64; 3]) -> Self {
        Color::new(r, g, b)
    }
}

/// The fixed color buttons of the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    Off,
    White,
    Red,
    Green,
    Blue,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Off,
        Preset::White,
        Preset::Red,
        Preset::Green,
        Preset::Blue,
    ];

    pub const fn color(self) -> Color {
        match self {
            Preset::Off => Color::BLACK,
            // The LEDs are much brighter on green, so "white" halves red and blue
            Preset::White => Color::new(0.5, 1.0, 0.5),
            Preset::Red => Color::new(1.0, 0.0, 0.0),
            Preset::Green => Color::new(0.0, 1.0, 0.0),
            Preset::Blue => Color::new(0.0, 1.0, 1.0),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Preset::Off => "off",
            Preset::White => "white",
            Preset::Red => "red",
            Preset::Green => "green",
            Preset::Blue => "blue",
        }
    }

    pub fn from_name(name: &str) -> Option<Preset> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(name))
    }
}

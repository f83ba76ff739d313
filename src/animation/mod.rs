use std::time::Duration;

use common::{Color, ConfigCommand, PALETTE, PALETTE_SIZE};
use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::color::{
    advance_auto_cycle, advance_flash_step, advance_transition_step, is_flash_on, lerp,
    to_byte_color, ByteColor,
};

pub const DEFAULT_UPDATE_RATE_HZ: u32 = 50;

/// Somewhere the engine can send its output to. The BLE session is the real
/// one; it only reports ready while it has a characteristic to write to.
pub trait ColorSink {
    fn is_ready(&self) -> bool;
    fn write(&mut self, color: ByteColor);
}

/// Everything the animation remembers between ticks
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationState {
    /// The color shown on the last tick, before flashing and intensity
    pub current: Color,
    pub target: Color,
    /// The target that was replaced when the current transition started. The
    /// transition blends from here to `target`.
    pub previous: Color,
    pub transition_step: f64,
    pub smoothing: f64,
    pub flash_level: f64,
    /// Flasher phase, lit from 0.5 upwards
    pub flash_step: f64,
    pub intensity: f64,
    pub auto_speed: f64,
    pub auto_step: f64,
    pub last_auto_index: usize,
}

impl Default for AnimationState {
    fn default() -> Self {
        Self {
            current: Color::BLACK,
            target: Color::BLACK,
            previous: Color::BLACK,
            transition_step: 0.0,
            smoothing: 0.0,
            flash_level: 0.0,
            flash_step: 0.0,
            intensity: 1.0,
            auto_speed: 0.0,
            auto_step: 0.0,
            last_auto_index: 0,
        }
    }
}

/// Runs the color animation one tick at a time.
///
/// The engine doesn't schedule itself, something else has to call
/// [`AnimationEngine::tick`] at the rate it was built for.
pub struct AnimationEngine<R = StdRng> {
    state: AnimationState,
    tick_secs: f64,
    rng: R,
}

impl AnimationEngine {
    pub fn new(tick_period: Duration) -> Self {
        Self::with_rng(tick_period, StdRng::from_entropy())
    }
}

impl Default for AnimationEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(1) / DEFAULT_UPDATE_RATE_HZ)
    }
}

impl<R: Rng> AnimationEngine<R> {
    pub fn with_rng(tick_period: Duration, rng: R) -> Self {
        Self {
            state: AnimationState::default(),
            tick_secs: tick_period.as_secs_f64(),
            rng,
        }
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(self.tick_secs)
    }

    /// Run one tick and send the result to `sink`. Does nothing at all when
    /// the sink isn't ready, so the animation stays where it was until a
    /// connection comes up.
    pub fn tick(&mut self, sink: &mut impl ColorSink) -> Option<ByteColor> {
        if !sink.is_ready() {
            return None;
        }

        let color = self.step();
        sink.write(color);
        Some(color)
    }

    /// Advance every animation and work out the bytes for this tick
    pub fn step(&mut self) -> ByteColor {
        let state = &mut self.state;

        // Blend toward the target
        state.transition_step =
            advance_transition_step(state.transition_step, state.smoothing, self.tick_secs);
        state.current = lerp(state.previous, state.target, state.transition_step);

        // Maybe pick a new target from the palette
        let (auto_step, index) = advance_auto_cycle(
            state.auto_step,
            state.auto_speed,
            self.tick_secs,
            state.last_auto_index,
            PALETTE_SIZE,
            &mut self.rng,
        );
        self.state.auto_step = auto_step;
        if let Some(index) = index {
            debug!("Auto-cycle moving to palette color {}", index);
            self.state.last_auto_index = index;
            self.set_target_color(PALETTE[index]);
        }

        // Flash
        let state = &mut self.state;
        state.flash_step = advance_flash_step(state.flash_step, state.flash_level);
        let shown = if is_flash_on(state.flash_step) {
            state.current
        } else {
            Color::BLACK
        };

        to_byte_color(shown, state.intensity)
    }

    /// Start a new transition. It runs from the old target, not from
    /// wherever the current blend had got to.
    pub fn set_target_color(&mut self, color: Color) {
        self.state.previous = self.state.target;
        self.state.target = color;
        self.state.transition_step = 0.0;
    }

    pub fn set_smoothing(&mut self, level: f64) {
        self.state.smoothing = unit(level);
    }

    pub fn set_flash_level(&mut self, level: f64) {
        self.state.flash_level = unit(level);
    }

    pub fn set_intensity(&mut self, level: f64) {
        self.state.intensity = unit(level);
    }

    pub fn set_auto_speed(&mut self, level: f64) {
        self.state.auto_speed = unit(level);
    }

    pub fn apply(&mut self, command: ConfigCommand) {
        debug!("Applying {:?}", command);
        match command {
            ConfigCommand::RequestColor { color } => self.set_target_color(color),
            ConfigCommand::SetSmoothing { level } => self.set_smoothing(level),
            ConfigCommand::SetFlashLevel { level } => self.set_flash_level(level),
            ConfigCommand::SetIntensity { level } => self.set_intensity(level),
            ConfigCommand::SetAutoSpeed { level } => self.set_auto_speed(level),
        }
    }
}

/// Clamp a level into `0.0..=1.0`, treating NaN as zero
fn unit(level: f64) -> f64 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

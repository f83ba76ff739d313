//! Pure color arithmetic used by the animation engine on every tick.
//!
//! Nothing in here keeps state. Each step function takes the old value and
//! hands back the new one so the engine decides what to store.

use common::Color;
use rand::Rng;

/// Transition speed scale: a smoothing of 1.0 takes 10 seconds
const SMOOTHING_SECONDS: f64 = 10.0;

/// Flash phase added per tick at a flash level of 1.0
const FLASH_RATE: f64 = 0.2;

/// Auto-cycle phase added per second at an auto speed of 1.0
const AUTO_RATE: f64 = 5.0;

/// Transition steps this close to the end count as finished
const STEP_EPSILON: f64 = 1e-9;

/// A color ready to go over the wire, one byte per channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ByteColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ByteColor {
    pub const OFF: ByteColor = ByteColor::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// The peripheral expects a trailing zero after the three channels
    pub const fn payload(&self) -> [u8; 4] {
        [self.r, self.g, self.b, 0]
    }
}

impl From<(u8, u8, u8)> for ByteColor {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        ByteColor::new(r, g, b)
    }
}

/// Blend from `prev` to `target`, with `t = 0` giving `prev` and `t = 1`
/// giving `target`.
pub fn lerp(prev: Color, target: Color, t: f64) -> Color {
    prev.zip_with(target, |a, b| a * (1.0 - t) + b * t)
}

/// Move a transition forward by one tick.
///
/// A smoothing of zero finishes the transition immediately. Otherwise the
/// transition takes `smoothing * 10` seconds and never goes past 1.0.
pub fn advance_transition_step(step: f64, smoothing: f64, tick_secs: f64) -> f64 {
    if smoothing == 0.0 {
        return 1.0;
    }

    let next = (step + tick_secs / (smoothing * SMOOTHING_SECONDS)).min(1.0);
    if 1.0 - next < STEP_EPSILON {
        1.0
    } else {
        next
    }
}

/// Move the flasher phase forward by one tick.
///
/// Without flashing the phase is pinned to 1.0, which is always lit.
pub fn advance_flash_step(step: f64, flash_level: f64) -> f64 {
    if flash_level == 0.0 {
        return 1.0;
    }

    let next = step + flash_level * FLASH_RATE;
    if next > 1.0 {
        0.0
    } else {
        next
    }
}

/// Whether a flasher phase lands in the lit half of the square wave
pub fn is_flash_on(step: f64) -> bool {
    step >= 0.5
}

/// Move the auto-cycle forward by one tick.
///
/// Returns the new phase, and a palette index when the phase rolled over. The
/// index is drawn uniformly and redrawn until it differs from `last_index`.
/// That loop has no fixed upper bound but needs about one draw on average for
/// any palette with two or more colors.
pub fn advance_auto_cycle<R: Rng + ?Sized>(
    auto_step: f64,
    auto_speed: f64,
    tick_secs: f64,
    last_index: usize,
    palette_size: usize,
    rng: &mut R,
) -> (f64, Option<usize>) {
    if auto_speed == 0.0 {
        return (auto_step, None);
    }

    let next = auto_step + auto_speed * tick_secs * AUTO_RATE;
    if next <= 1.0 {
        return (next, None);
    }

    let index = match palette_size {
        0 => None,
        1 => Some(0),
        _ => loop {
            let index = rng.gen_range(0..palette_size);
            if index != last_index {
                break Some(index);
            }
        },
    };

    (0.0, index)
}

/// Scale a color by `intensity` and convert it to bytes.
///
/// Channels below zero (or NaN) become 0 and anything past full brightness
/// saturates at 255. Halves round away from zero.
pub fn to_byte_color(color: Color, intensity: f64) -> ByteColor {
    let [r, g, b] = color.channels().map(|channel| {
        let scaled = (channel.max(0.0) * intensity * 255.0).round();
        if scaled.is_nan() {
            0
        } else {
            scaled.clamp(0.0, 255.0) as u8
        }
    });

    ByteColor::new(r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PALETTE_SIZE;
    use rand::{rngs::StdRng, SeedableRng};

    const TICK: f64 = 0.02;

    #[test]
    fn test_zero_smoothing_snaps() {
        for step in [0.0, 0.25, 0.5, 0.999, 1.0] {
            assert_eq!(advance_transition_step(step, 0.0, TICK), 1.0);
        }
    }

    #[test]
    fn test_smoothing_finishes_in_bounded_ticks() {
        for smoothing in [0.01, 0.1, 0.33, 0.5, 0.77, 1.0] {
            let limit = (smoothing * SMOOTHING_SECONDS / TICK).ceil() as usize;
            let mut step = 0.0;
            let mut ticks = 0;
            while step < 1.0 {
                step = advance_transition_step(step, smoothing, TICK);
                assert!(step <= 1.0, "overshot to {step}");
                ticks += 1;
                assert!(ticks <= limit, "smoothing {smoothing} needed more than {limit} ticks");
            }
            assert_eq!(step, 1.0);
        }
    }

    #[test]
    fn test_lerp_endpoints() {
        let prev = Color::new(0.2, 0.9, -0.4);
        let target = Color::new(1.0, 0.0, 1.5);

        assert_eq!(lerp(prev, target, 0.0), prev);
        assert_eq!(lerp(prev, target, 1.0), target);

        let mid = lerp(Color::BLACK, Color::new(1.0, 0.5, 0.0), 0.5);
        assert_eq!(mid, Color::new(0.5, 0.25, 0.0));
    }

    #[test]
    fn test_flash_off_is_always_lit() {
        let mut step = 0.0;
        for _ in 0..100 {
            step = advance_flash_step(step, 0.0);
            assert!(is_flash_on(step));
        }
    }

    #[test]
    fn test_flash_square_wave() {
        // Level 1.0 adds 0.2 per tick and wraps after passing 1.0
        let mut step = 0.0;
        let mut pattern = Vec::new();
        for _ in 0..6 {
            step = advance_flash_step(step, 1.0);
            pattern.push(is_flash_on(step));
        }
        assert_eq!(pattern, [false, false, true, true, true, false]);
        assert_eq!(step, 0.0);
    }

    #[test]
    fn test_auto_cycle_disabled() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            advance_auto_cycle(0.7, 0.0, TICK, 3, PALETTE_SIZE, &mut rng),
            (0.7, None)
        );
    }

    #[test]
    fn test_auto_cycle_rolls_over() {
        let mut rng = StdRng::seed_from_u64(2);
        // 1.0 * 0.02 * 5 = 0.1 per tick
        let (step, index) = advance_auto_cycle(0.5, 1.0, TICK, 0, PALETTE_SIZE, &mut rng);
        assert!((step - 0.6).abs() < 1e-12);
        assert_eq!(index, None);

        let (step, index) = advance_auto_cycle(0.95, 1.0, TICK, 0, PALETTE_SIZE, &mut rng);
        assert_eq!(step, 0.0);
        assert!(matches!(index, Some(i) if i != 0 && i < PALETTE_SIZE));
    }

    #[test]
    fn test_auto_cycle_never_repeats() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut last = 0;
        for _ in 0..10_000 {
            let (_, index) = advance_auto_cycle(1.0, 1.0, TICK, last, PALETTE_SIZE, &mut rng);
            let index = index.unwrap();
            assert_ne!(index, last);
            last = index;
        }
    }

    #[test]
    fn test_auto_cycle_tiny_palettes() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(advance_auto_cycle(1.0, 1.0, TICK, 0, 1, &mut rng), (0.0, Some(0)));
        assert_eq!(advance_auto_cycle(1.0, 1.0, TICK, 0, 0, &mut rng), (0.0, None));
    }

    #[test]
    fn test_byte_color() {
        assert_eq!(
            to_byte_color(Color::new(1.0, 1.0, 1.0), 1.0),
            ByteColor::new(255, 255, 255)
        );
        assert_eq!(to_byte_color(Color::BLACK, 1.0), ByteColor::OFF);
        // 127.5 rounds up
        assert_eq!(
            to_byte_color(Color::new(1.0, 0.0, 0.0), 0.5),
            ByteColor::new(128, 0, 0)
        );
        // 0.25 * 255 = 63.75 rounds up, 0.2 * 255 = 51.0 stays, 0.001 * 255 rounds down
        assert_eq!(
            to_byte_color(Color::new(0.25, 0.2, 0.001), 1.0),
            ByteColor::new(64, 51, 0)
        );
    }

    #[test]
    fn test_byte_color_clamps_out_of_range() {
        assert_eq!(
            to_byte_color(Color::new(2.0, -1.0, f64::NAN), 1.0),
            ByteColor::new(255, 0, 0)
        );
        assert_eq!(
            to_byte_color(Color::new(1.0, 1.0, 1.0), 0.0),
            ByteColor::OFF
        );
    }

    #[test]
    fn test_payload_has_trailing_zero() {
        assert_eq!(ByteColor::new(1, 2, 3).payload(), [1, 2, 3, 0]);
    }
}

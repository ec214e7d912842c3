//! # Calibration Module
//!
//! Turns raw integer axis samples into normalized stick values and shapes
//! them with deadzone and expo.
//!
//! ## Normalization
//!
//! A raw sample is divided by the device's full-scale value and clamped to
//! `-1.0..=1.0`. Throttle is then folded into `0.0..=1.0`:
//!
//! - **Linear** (default): the value is taken as is, `clamp(v, 0, 1)`. A
//!   recentering gamepad stick idles at rest and the lower half is cut.
//! - **Full travel** (opt-in, RC transmitter gimbal): `(v + 1) / 2`, so the
//!   bottom stop is idle and center is half throttle.
//!
//! ## Deadzone and Expo
//!
//! Values inside the deadzone read as center; the remaining travel is
//! rescaled to full range, then bent by `(1 - expo) * x + expo * x³`.
//!
//! ```
//! use fpv_sim_bridge::controller::calibration::Calibration;
//!
//! let cal = Calibration::new(0.05, 0.3);
//! assert_eq!(cal.apply(0.02), 0.0);
//! assert!((cal.apply(1.0) - 1.0).abs() < 0.001);
//! ```

/// Deadzone and expo applied to one stick channel.
///
/// Input and output are in the range -1.0 to 1.0, where 0.0 is center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Deadzone as a fraction (0.0 to 0.25).
    deadzone: f32,
    /// Exponential curve factor (0.0 to 1.0).
    expo: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self::linear()
    }
}

impl Calibration {
    /// Creates a calibration, clamping deadzone to 0.0..=0.25 and expo to 0.0..=1.0.
    #[must_use]
    pub fn new(deadzone: f32, expo: f32) -> Self {
        Self {
            deadzone: deadzone.clamp(0.0, 0.25),
            expo: expo.clamp(0.0, 1.0),
        }
    }

    /// Pass-through calibration (no deadzone, no expo).
    #[must_use]
    pub fn linear() -> Self {
        Self {
            deadzone: 0.0,
            expo: 0.0,
        }
    }

    #[must_use]
    pub fn deadzone(&self) -> f32 {
        self.deadzone
    }

    #[must_use]
    pub fn expo(&self) -> f32 {
        self.expo
    }

    /// Applies deadzone then expo, preserving sign.
    #[must_use]
    pub fn apply(&self, input: f32) -> f32 {
        let magnitude = input.abs().min(1.0);

        if magnitude <= self.deadzone {
            return 0.0;
        }

        let live = (magnitude - self.deadzone) / (1.0 - self.deadzone);
        let shaped = (1.0 - self.expo) * live + self.expo * live * live * live;
        shaped.copysign(input)
    }
}

/// Calibration for the three centered stick channels.
///
/// Throttle and aux are never shaped: throttle keeps its full resolution near
/// idle and aux is a switch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StickCalibration {
    pub roll: Calibration,
    pub pitch: Calibration,
    pub yaw: Calibration,
}

impl StickCalibration {
    /// No shaping on any stick.
    #[must_use]
    pub fn linear() -> Self {
        Self::default()
    }

    /// Builds stick calibration from config values.
    ///
    /// # Examples
    ///
    /// ```
    /// use fpv_sim_bridge::controller::calibration::StickCalibration;
    ///
    /// let cal = StickCalibration::from_config(
    ///     0.05, // deadzone_stick
    ///     0.3,  // expo_roll
    ///     0.3,  // expo_pitch
    ///     0.2,  // expo_yaw
    /// );
    /// assert_eq!(cal.roll.apply(0.01), 0.0);
    /// ```
    #[must_use]
    pub fn from_config(
        deadzone_stick: f32,
        expo_roll: f32,
        expo_pitch: f32,
        expo_yaw: f32,
    ) -> Self {
        Self {
            roll: Calibration::new(deadzone_stick, expo_roll),
            pitch: Calibration::new(deadzone_stick, expo_pitch),
            yaw: Calibration::new(deadzone_stick, expo_yaw),
        }
    }
}

/// Divides a raw sample by the device full-scale value and clamps to -1.0..=1.0.
///
/// A non-positive full scale yields 0.0 (inert device).
///
/// ```
/// use fpv_sim_bridge::controller::calibration::normalize_sample;
///
/// assert_eq!(normalize_sample(16384, 32768), 0.5);
/// assert_eq!(normalize_sample(-40000, 32768), -1.0);
/// ```
#[must_use]
pub fn normalize_sample(raw: i32, full_scale: i32) -> f32 {
    if full_scale <= 0 {
        return 0.0;
    }
    (raw as f32 / full_scale as f32).clamp(-1.0, 1.0)
}

/// Folds a throttle value (-1.0..=1.0) into 0.0..=1.0.
///
/// Linear unless `full_travel` remaps the whole stick range.
#[must_use]
pub fn shape_throttle(value: f32, full_travel: bool) -> f32 {
    if full_travel {
        ((value + 1.0) * 0.5).clamp(0.0, 1.0)
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Calibration Tests ====================

    #[test]
    fn test_calibration_new() {
        let cal = Calibration::new(0.05, 0.3);
        assert!((cal.deadzone() - 0.05).abs() < 0.001);
        assert!((cal.expo() - 0.3).abs() < 0.001);
    }

    #[test]
    fn test_calibration_default_is_linear() {
        assert_eq!(Calibration::default(), Calibration::linear());
        assert!((Calibration::default().apply(0.37) - 0.37).abs() < 1e-6);
    }

    #[test]
    fn test_calibration_clamps_parameters() {
        let cal = Calibration::new(0.5, 1.5);
        assert!((cal.deadzone() - 0.25).abs() < 0.001);
        assert!((cal.expo() - 1.0).abs() < 0.001);

        let cal = Calibration::new(-0.1, -0.5);
        assert_eq!(cal.deadzone(), 0.0);
        assert_eq!(cal.expo(), 0.0);
    }

    #[test]
    fn test_deadzone_within_zone() {
        let cal = Calibration::new(0.1, 0.0);
        assert_eq!(cal.apply(0.05), 0.0);
        assert_eq!(cal.apply(-0.1), 0.0);
    }

    #[test]
    fn test_deadzone_rescales_remaining_travel() {
        let cal = Calibration::new(0.1, 0.0);
        assert!((cal.apply(0.55) - 0.5).abs() < 0.01);
        assert!((cal.apply(-0.55) + 0.5).abs() < 0.01);
        assert!((cal.apply(1.0) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_expo_reduces_small_inputs() {
        let cal = Calibration::new(0.0, 0.5);
        assert!(cal.apply(0.3) < 0.3);
        assert!((cal.apply(1.0) - 1.0).abs() < 0.001);
        assert!((cal.apply(0.5) + cal.apply(-0.5)).abs() < 0.001);
    }

    #[test]
    fn test_apply_saturates_out_of_range_input() {
        let cal = Calibration::new(0.05, 0.3);
        assert!((cal.apply(3.0) - 1.0).abs() < 0.001);
        assert!((cal.apply(-3.0) + 1.0).abs() < 0.001);
    }

    // ==================== StickCalibration Tests ====================

    #[test]
    fn test_stick_calibration_from_config() {
        let cal = StickCalibration::from_config(0.08, 0.4, 0.35, 0.3);
        assert!((cal.roll.deadzone() - 0.08).abs() < 0.001);
        assert!((cal.roll.expo() - 0.4).abs() < 0.001);
        assert!((cal.pitch.expo() - 0.35).abs() < 0.001);
        assert!((cal.yaw.expo() - 0.3).abs() < 0.001);
    }

    // ==================== Normalization Tests ====================

    #[test]
    fn test_normalize_sample() {
        assert_eq!(normalize_sample(0, 32768), 0.0);
        assert_eq!(normalize_sample(32768, 32768), 1.0);
        assert_eq!(normalize_sample(-32768, 32768), -1.0);
        assert_eq!(normalize_sample(-16384, 32768), -0.5);
    }

    #[test]
    fn test_normalize_sample_clamps() {
        assert_eq!(normalize_sample(i32::MAX, 32768), 1.0);
        assert_eq!(normalize_sample(i32::MIN, 32768), -1.0);
    }

    #[test]
    fn test_normalize_sample_zero_scale() {
        assert_eq!(normalize_sample(1234, 0), 0.0);
        assert_eq!(normalize_sample(1234, -5), 0.0);
    }

    #[test]
    fn test_shape_throttle_linear() {
        assert_eq!(shape_throttle(-1.0, false), 0.0);
        assert_eq!(shape_throttle(0.0, false), 0.0);
        assert_eq!(shape_throttle(0.5, false), 0.5);
        assert_eq!(shape_throttle(1.0, false), 1.0);
        assert_eq!(shape_throttle(1.5, false), 1.0);
    }

    #[test]
    fn test_shape_throttle_full_travel() {
        assert_eq!(shape_throttle(-1.0, true), 0.0);
        assert_eq!(shape_throttle(0.0, true), 0.5);
        assert_eq!(shape_throttle(0.5, true), 0.75);
        assert_eq!(shape_throttle(1.0, true), 1.0);
    }
}

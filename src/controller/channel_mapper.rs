//! # Device Channel Mapper
//!
//! Converts one raw controller sample (axis values + button bitmask) into a
//! canonical [`ChannelSet`] using a [`DeviceProfile`].
//!
//! ## Pipeline
//!
//! 1. Each raw axis slot is normalized by the profile's full scale and clamped
//!    to -1.0..=1.0, negated if its binding is inverted, and written into the
//!    channel it is bound to.
//! 2. With `reversed_verticals`, throttle and pitch are negated.
//! 3. Throttle is folded into 0.0..=1.0 (linear, or full travel when the
//!    profile opts in).
//! 4. Roll, pitch and yaw pass through the stick calibration.
//! 5. With aux buttons, aux is driven by the 3-position switch.
//!
//! ## Usage
//!
//! ```
//! use fpv_sim_bridge::controller::channel_mapper::DeviceMapper;
//! use fpv_sim_bridge::controller::profile::{products, vendors, ProfileRegistry};
//!
//! let profile = ProfileRegistry::builtin().identify(vendors::SONY, products::PS4);
//! let mut mapper = DeviceMapper::new(profile);
//!
//! // Left stick pushed fully up (negative Y on a gamepad)
//! let channels = mapper.poll(&[0, -32768, 0, 0, 0, 0], 0);
//! assert_eq!(channels.throttle(), 1.0);
//! assert_eq!(channels.aux(), 0.5);
//! ```

use tracing::warn;

use super::calibration::{normalize_sample, shape_throttle, StickCalibration};
use super::profile::{AuxPosition, Channel, ChannelSet, DeviceProfile, AXIS_SLOTS, NUM_CHANNELS};

/// Aux value before any button has been decoded.
const AUX_CENTER: f32 = 0.5;

/// Maps raw samples from one device into canonical channels.
///
/// Holds the last aux value so a conflicting button pair leaves the switch
/// where it was.
#[derive(Debug, Clone)]
pub struct DeviceMapper {
    profile: DeviceProfile,
    calibration: StickCalibration,
    aux: f32,
    aux_conflict: bool,
}

impl DeviceMapper {
    /// Creates a mapper with linear stick response.
    #[must_use]
    pub fn new(profile: DeviceProfile) -> Self {
        Self::with_calibration(profile, StickCalibration::linear())
    }

    /// Creates a mapper applying `calibration` to roll, pitch and yaw.
    #[must_use]
    pub fn with_calibration(profile: DeviceProfile, calibration: StickCalibration) -> Self {
        let aux = if profile.uses_buttons_for_aux() {
            AUX_CENTER
        } else {
            0.0
        };

        Self {
            profile,
            calibration,
            aux,
            aux_conflict: false,
        }
    }

    #[must_use]
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// Maps one raw sample to channels.
    ///
    /// `raw_axes` is indexed by axis slot; missing slots read as centered and
    /// extra slots are ignored. `buttons` is the raw button bitmask.
    pub fn poll(&mut self, raw_axes: &[i32], buttons: u32) -> ChannelSet {
        let mut values = [0.0_f32; NUM_CHANNELS];

        for (slot, binding) in self.profile.axes.iter().enumerate().take(AXIS_SLOTS) {
            let Some(binding) = binding else {
                continue;
            };
            let raw = raw_axes.get(slot).copied().unwrap_or(0);
            let sample = normalize_sample(raw, self.profile.full_scale);
            values[binding.channel.index()] = if binding.inverted { -sample } else { sample };
        }

        if self.profile.reversed_verticals {
            values[Channel::Throttle.index()] = -values[Channel::Throttle.index()];
            values[Channel::Pitch.index()] = -values[Channel::Pitch.index()];
        }

        if self.profile.slot_for(Channel::Throttle).is_some() {
            values[Channel::Throttle.index()] = shape_throttle(
                values[Channel::Throttle.index()],
                self.profile.full_travel_throttle,
            );
        }

        let cal = &self.calibration;
        values[Channel::Roll.index()] = cal.roll.apply(values[Channel::Roll.index()]);
        values[Channel::Pitch.index()] = cal.pitch.apply(values[Channel::Pitch.index()]);
        values[Channel::Yaw.index()] = cal.yaw.apply(values[Channel::Yaw.index()]);

        if let Some(aux_buttons) = self.profile.aux_buttons {
            values[Channel::Aux.index()] = self.update_aux(aux_buttons.position(buttons));
        } else {
            values[Channel::Aux.index()] = values[Channel::Aux.index()].clamp(-1.0, 1.0);
        }

        ChannelSet::from_array(values)
    }

    /// Applies a decoded switch position; a conflict holds the previous value.
    fn update_aux(&mut self, position: AuxPosition) -> f32 {
        match position.value() {
            Some(value) => {
                self.aux = value;
                self.aux_conflict = false;
            }
            None => {
                if !self.aux_conflict {
                    warn!(
                        "{}: both aux buttons pressed, holding aux at {}",
                        self.profile.name, self.aux
                    );
                }
                self.aux_conflict = true;
            }
        }
        self.aux
    }
}

//! # Controller Module
//!
//! Pilot input handling.
//!
//! This module handles:
//! - Device discovery and raw sampling via evdev ([`gamepad`])
//! - Per-model axis/button tables ([`profile`])
//! - Normalization, polarity and aux-switch logic ([`channel_mapper`])
//! - Deadzone and expo shaping ([`calibration`])
//!
//! [`Receiver`] ties a raw input source to its mapper and is what the control
//! loop polls once per tick.

pub mod calibration;
pub mod channel_mapper;
pub mod gamepad;
pub mod profile;

use tracing::{debug, info, warn};

use crate::error::Result;
use calibration::StickCalibration;
use channel_mapper::DeviceMapper;
use gamepad::Gamepad;
use profile::{ChannelSet, DeviceProfile, ProfileRegistry, AXIS_SLOTS};

/// One raw reading from an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample {
    /// Signed, centered axis values indexed by slot.
    pub axes: [i32; AXIS_SLOTS],
    /// Button bitmask.
    pub buttons: u32,
}

impl RawSample {
    #[must_use]
    pub fn new(axes: [i32; AXIS_SLOTS], buttons: u32) -> Self {
        Self { axes, buttons }
    }
}

/// A device that can be sampled for raw axis and button state.
#[cfg_attr(test, mockall::automock)]
pub trait InputSource: Send {
    /// Reads the current device state without blocking.
    fn read_sample(&mut self) -> Result<RawSample>;
}

/// Input source used when no device is attached: sticks centered, no buttons.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullInput;

impl InputSource for NullInput {
    fn read_sample(&mut self) -> Result<RawSample> {
        Ok(RawSample::default())
    }
}

/// An input source paired with the mapper for its device profile.
pub struct Receiver {
    source: Box<dyn InputSource>,
    mapper: DeviceMapper,
    read_failed: bool,
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("profile", &self.mapper.profile().name)
            .finish_non_exhaustive()
    }
}

impl Receiver {
    #[must_use]
    pub fn new(source: Box<dyn InputSource>, mapper: DeviceMapper) -> Self {
        Self {
            source,
            mapper,
            read_failed: false,
        }
    }

    /// Receiver with no device: every poll yields neutral channels.
    #[must_use]
    pub fn inert() -> Self {
        Self::new(
            Box::new(NullInput),
            DeviceMapper::new(DeviceProfile::unrecognized(0, 0)),
        )
    }

    /// Opens an input device and resolves its profile.
    ///
    /// An empty `device_path` auto-detects. A missing or unreadable device, or
    /// an unknown vendor/product pair, yields an inert receiver.
    #[must_use]
    pub fn open(
        device_path: &str,
        registry: &ProfileRegistry,
        calibration: StickCalibration,
    ) -> Self {
        let opened = if device_path.is_empty() {
            Gamepad::open()
        } else {
            Gamepad::open_path(device_path)
        };

        let pad = match opened {
            Ok(pad) => pad,
            Err(e) => {
                warn!("No input device ({}), flying with neutral sticks", e);
                return Self::inert();
            }
        };

        let (vendor, product) = pad.identity();
        let profile = registry.identify(vendor, product);
        if profile.recognized {
            info!("Input device recognized as {}", profile.name);
        } else {
            warn!(
                "Input device 0x{:04x}:0x{:04x} not recognized, channels stay neutral",
                vendor, product
            );
        }

        Self::new(Box::new(pad), DeviceMapper::with_calibration(profile, calibration))
    }

    #[must_use]
    pub fn profile(&self) -> &DeviceProfile {
        self.mapper.profile()
    }

    /// Samples the device and maps it to channels.
    ///
    /// A failed read is treated as a centered, released device.
    pub fn poll(&mut self) -> ChannelSet {
        let sample = match self.source.read_sample() {
            Ok(sample) => {
                if self.read_failed {
                    info!("Input device readable again");
                    self.read_failed = false;
                }
                sample
            }
            Err(e) => {
                if !self.read_failed {
                    warn!("Input read failed: {}", e);
                    self.read_failed = true;
                } else {
                    debug!("Input read failed: {}", e);
                }
                RawSample::default()
            }
        };

        self.mapper.poll(&sample.axes, sample.buttons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimBridgeError;
    use profile::{products, vendors};

    fn ps4_mapper() -> DeviceMapper {
        DeviceMapper::new(ProfileRegistry::builtin().identify(vendors::SONY, products::PS4))
    }

    #[test]
    fn test_inert_receiver_is_neutral() {
        let mut rx = Receiver::inert();
        assert!(!rx.profile().recognized);
        assert_eq!(rx.poll(), ChannelSet::NEUTRAL);
    }

    #[test]
    fn test_receiver_maps_source_samples() {
        let mut source = MockInputSource::new();
        source
            .expect_read_sample()
            .times(1)
            .returning(|| Ok(RawSample::new([0, -32768, 0, 0, 0, 0, 0, 0], 0x04)));

        let mut rx = Receiver::new(Box::new(source), ps4_mapper());
        let channels = rx.poll();
        assert_eq!(channels.throttle(), 1.0);
        assert_eq!(channels.aux(), 1.0);
    }

    #[test]
    fn test_receiver_read_error_degrades_to_center() {
        let mut source = MockInputSource::new();
        source
            .expect_read_sample()
            .times(2)
            .returning(|| Err(SimBridgeError::Controller("unplugged".to_string())));

        let mut rx = Receiver::new(Box::new(source), ps4_mapper());
        for _ in 0..2 {
            let channels = rx.poll();
            assert_eq!(channels.throttle(), 0.0);
            assert_eq!(channels.roll(), 0.0);
            assert_eq!(channels.aux(), 0.5);
        }
    }

    #[test]
    fn test_null_input_sample() {
        assert_eq!(NullInput.read_sample().unwrap(), RawSample::default());
    }
}

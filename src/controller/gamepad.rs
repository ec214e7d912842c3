//! # Gamepad Input Source
//!
//! Reads joystick, gamepad and USB-transmitter state through the Linux evdev
//! interface and hands it to the mapper as a [`RawSample`].
//!
//! ## Device Discovery
//!
//! [`Gamepad::open`] scans `/dev/input/event*` in sorted order and takes the
//! first device reporting both `ABS_X` and `ABS_Y`. The vendor/product pair
//! from the device's input id selects the profile.
//!
//! ## Sampling
//!
//! Every poll takes an ioctl snapshot of all absolute axes and keys, so reads
//! never block on the event queue. Axis values are recentered and rescaled
//! from the device's reported min/max into the signed full-scale range the
//! profiles expect.

use evdev::{AbsoluteAxisType, Device, Key};
use std::path::Path;
use tracing::{debug, info};

use super::profile::{AXIS_SLOTS, DEFAULT_FULL_SCALE};
use super::{InputSource, RawSample};
use crate::error::{Result, SimBridgeError};

/// Absolute axis read into each slot.
const SLOT_AXES: [AbsoluteAxisType; AXIS_SLOTS] = [
    AbsoluteAxisType::ABS_X,
    AbsoluteAxisType::ABS_Y,
    AbsoluteAxisType::ABS_Z,
    AbsoluteAxisType::ABS_RX,
    AbsoluteAxisType::ABS_RY,
    AbsoluteAxisType::ABS_RZ,
    AbsoluteAxisType::ABS_THROTTLE,
    AbsoluteAxisType::ABS_RUDDER,
];

/// Key reported on each button bit.
const BUTTON_BITS: [Key; 13] = [
    Key::BTN_SOUTH,
    Key::BTN_EAST,
    Key::BTN_NORTH,
    Key::BTN_WEST,
    Key::BTN_TL,
    Key::BTN_TR,
    Key::BTN_TL2,
    Key::BTN_TR2,
    Key::BTN_SELECT,
    Key::BTN_START,
    Key::BTN_MODE,
    Key::BTN_THUMBL,
    Key::BTN_THUMBR,
];

/// Handle to one evdev input device.
pub struct Gamepad {
    device: Device,
    device_path: String,
}

impl std::fmt::Debug for Gamepad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gamepad")
            .field("device_path", &self.device_path)
            .field("name", &self.device.name())
            .finish_non_exhaustive()
    }
}

impl Gamepad {
    /// Opens the first joystick-like device under `/dev/input`.
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: no device with X/Y axes is accessible
    /// - `Controller`: `/dev/input` is missing or unreadable
    pub fn open() -> Result<Self> {
        let input_dir = Path::new("/dev/input");

        if !input_dir.exists() {
            return Err(SimBridgeError::Controller(
                "/dev/input directory not found".to_string(),
            ));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| SimBridgeError::Controller(format!("Failed to read /dev/input: {}", e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with("event"))
            })
            .collect();
        entries.sort();

        for path in entries {
            match Device::open(&path) {
                Ok(device) => {
                    let id = device.input_id();
                    debug!(
                        "Found input device: {} (vendor: 0x{:04x}, product: 0x{:04x})",
                        path.display(),
                        id.vendor(),
                        id.product()
                    );

                    if is_joystick(&device) {
                        let device_path = path.to_string_lossy().to_string();
                        info!(
                            "Using input device {} at {}",
                            device.name().unwrap_or("<unnamed>"),
                            device_path
                        );
                        return Ok(Self {
                            device,
                            device_path,
                        });
                    }
                }
                Err(e) => {
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(SimBridgeError::ControllerNotFound)
    }

    /// Opens a specific event device.
    ///
    /// # Errors
    ///
    /// Returns `Controller` if the device cannot be opened or has no X/Y axes.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let device = Device::open(path).map_err(|e| {
            SimBridgeError::Controller(format!("Failed to open {}: {}", path.display(), e))
        })?;

        if !is_joystick(&device) {
            return Err(SimBridgeError::Controller(format!(
                "{} has no X/Y axes",
                path.display()
            )));
        }

        Ok(Self {
            device,
            device_path: path.to_string_lossy().to_string(),
        })
    }

    /// Vendor and product id reported by the device.
    #[must_use]
    pub fn identity(&self) -> (u16, u16) {
        let id = self.device.input_id();
        (id.vendor(), id.product())
    }

    #[must_use]
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.device.name()
    }
}

impl InputSource for Gamepad {
    fn read_sample(&mut self) -> Result<RawSample> {
        let abs = self
            .device
            .get_abs_state()
            .map_err(|e| SimBridgeError::Controller(format!("Failed to read axes: {}", e)))?;
        let keys = self
            .device
            .get_key_state()
            .map_err(|e| SimBridgeError::Controller(format!("Failed to read buttons: {}", e)))?;

        let mut sample = RawSample::default();

        for (slot, axis) in SLOT_AXES.iter().enumerate() {
            if let Some(info) = abs.get(axis.0 as usize) {
                sample.axes[slot] = rescale_axis(info.value, info.minimum, info.maximum);
            }
        }

        for (bit, key) in BUTTON_BITS.iter().enumerate() {
            if keys.contains(*key) {
                sample.buttons |= 1 << bit;
            }
        }

        Ok(sample)
    }
}

fn is_joystick(device: &Device) -> bool {
    device.supported_absolute_axes().is_some_and(|axes| {
        axes.contains(AbsoluteAxisType::ABS_X) && axes.contains(AbsoluteAxisType::ABS_Y)
    })
}

/// Recenters a raw evdev value and scales it to +/-[`DEFAULT_FULL_SCALE`].
///
/// Axes with an empty range read as centered.
#[must_use]
pub fn rescale_axis(value: i32, minimum: i32, maximum: i32) -> i32 {
    if maximum <= minimum {
        return 0;
    }

    let center = (minimum as f64 + maximum as f64) / 2.0;
    let half_range = (maximum as f64 - minimum as f64) / 2.0;
    let scaled = (value as f64 - center) / half_range * DEFAULT_FULL_SCALE as f64;

    scaled
        .round()
        .clamp(-(DEFAULT_FULL_SCALE as f64), DEFAULT_FULL_SCALE as f64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_byte_axis() {
        // DualSense-style 0..255 stick
        assert_eq!(rescale_axis(0, 0, 255), -DEFAULT_FULL_SCALE);
        assert_eq!(rescale_axis(255, 0, 255), DEFAULT_FULL_SCALE);
        assert!(rescale_axis(128, 0, 255).abs() < 200);
    }

    #[test]
    fn test_rescale_signed_axis() {
        // Xbox-style -32768..32767 stick
        assert!((rescale_axis(0, -32768, 32767)).abs() <= 1);
        assert_eq!(rescale_axis(-32768, -32768, 32767), -DEFAULT_FULL_SCALE);
        assert_eq!(rescale_axis(32767, -32768, 32767), DEFAULT_FULL_SCALE);
    }

    #[test]
    fn test_rescale_clamps_and_handles_empty_range() {
        assert_eq!(rescale_axis(1000, 0, 255), DEFAULT_FULL_SCALE);
        assert_eq!(rescale_axis(10, 5, 5), 0);
        assert_eq!(rescale_axis(10, 6, 5), 0);
    }

    #[test]
    fn test_slot_table_matches_profile_width() {
        assert_eq!(SLOT_AXES.len(), AXIS_SLOTS);
        assert_eq!(SLOT_AXES[0], AbsoluteAxisType::ABS_X);
        assert_eq!(SLOT_AXES[1], AbsoluteAxisType::ABS_Y);
    }

    #[test]
    fn test_button_bits_fit_mask() {
        assert!(BUTTON_BITS.len() <= 32);
        assert_eq!(BUTTON_BITS[4], Key::BTN_TL);
        assert_eq!(BUTTON_BITS[5], Key::BTN_TR);
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_open_with_real_hardware() {
        let mut pad = Gamepad::open().expect("No input device found");
        assert!(pad.device_path().starts_with("/dev/input/event"));

        let sample = pad.read_sample().expect("Failed to read sample");
        for value in sample.axes {
            assert!(value.abs() <= DEFAULT_FULL_SCALE);
        }
    }
}

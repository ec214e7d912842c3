//! # Device Profiles
//!
//! Per-model tables that say which raw axis slot feeds which canonical
//! channel, plus the polarity and behavior flags each controller family needs.
//!
//! ## Canonical Channels
//!
//! | Index | Channel | Range |
//! |-------|---------|-------|
//! | 0 | Throttle | 0.0 to 1.0 |
//! | 1 | Roll | -1.0 to 1.0 |
//! | 2 | Pitch | -1.0 to 1.0 |
//! | 3 | Yaw | -1.0 to 1.0 |
//! | 4 | Aux | 0.0 to 1.0 (3-position switch when button driven) |
//!
//! ## Axis Slots
//!
//! Slot order is the joystick API's absolute-axis order: X, Y, Z, RX, RY, RZ,
//! then two spare slots. Raw samples are signed and centered, with
//! [`DEFAULT_FULL_SCALE`] at full deflection.
//!
//! ## Button Bits
//!
//! Button masks use the gamepad button order: bit 0 = south/trigger,
//! 1 = east, 2 = north, 3 = west, 4 = left shoulder, 5 = right shoulder,
//! 6 = left trigger, 7 = right trigger, 8 = select, 9 = start, 10 = mode,
//! 11 = left thumb, 12 = right thumb.

use serde::Serialize;
use std::collections::HashMap;

/// Number of canonical channels.
pub const NUM_CHANNELS: usize = 5;

/// Number of raw axis slots a profile can bind.
pub const AXIS_SLOTS: usize = 8;

/// Raw sample magnitude at full stick deflection.
pub const DEFAULT_FULL_SCALE: i32 = 32768;

/// One canonical control axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Channel {
    Throttle,
    Roll,
    Pitch,
    Yaw,
    Aux,
}

impl Channel {
    /// All channels in canonical order.
    pub const ALL: [Channel; NUM_CHANNELS] = [
        Channel::Throttle,
        Channel::Roll,
        Channel::Pitch,
        Channel::Yaw,
        Channel::Aux,
    ];

    /// Position of this channel in a [`ChannelSet`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Channel::Throttle => 0,
            Channel::Roll => 1,
            Channel::Pitch => 2,
            Channel::Yaw => 3,
            Channel::Aux => 4,
        }
    }
}

/// Normalized channel values produced by one poll.
///
/// Immutable once built; the mapper creates a fresh set every poll.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ChannelSet {
    values: [f32; NUM_CHANNELS],
}

impl ChannelSet {
    /// All channels at zero: idle throttle, centered sticks, aux low.
    pub const NEUTRAL: Self = Self {
        values: [0.0; NUM_CHANNELS],
    };

    #[must_use]
    pub const fn from_array(values: [f32; NUM_CHANNELS]) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn get(&self, channel: Channel) -> f32 {
        self.values[channel.index()]
    }

    #[must_use]
    pub fn throttle(&self) -> f32 {
        self.get(Channel::Throttle)
    }

    #[must_use]
    pub fn roll(&self) -> f32 {
        self.get(Channel::Roll)
    }

    #[must_use]
    pub fn pitch(&self) -> f32 {
        self.get(Channel::Pitch)
    }

    #[must_use]
    pub fn yaw(&self) -> f32 {
        self.get(Channel::Yaw)
    }

    #[must_use]
    pub fn aux(&self) -> f32 {
        self.get(Channel::Aux)
    }

    #[must_use]
    pub fn as_array(&self) -> [f32; NUM_CHANNELS] {
        self.values
    }
}

/// Routes one raw axis slot into a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisBinding {
    pub channel: Channel,
    /// Negate the sample before it reaches the channel.
    pub inverted: bool,
}

impl AxisBinding {
    #[must_use]
    pub const fn to(channel: Channel) -> Self {
        Self {
            channel,
            inverted: false,
        }
    }

    #[must_use]
    pub const fn inverted(channel: Channel) -> Self {
        Self {
            channel,
            inverted: true,
        }
    }
}

/// Axis slot table; `None` means the slot feeds nothing.
pub type AxisMap = [Option<AxisBinding>; AXIS_SLOTS];

/// Two buttons emulating a 3-position aux switch.
///
/// `low` asserted reads 0.0, `high` asserted reads 1.0, neither reads 0.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxButtons {
    /// Bitmask of the button that selects the low position.
    pub low: u32,
    /// Bitmask of the button that selects the high position.
    pub high: u32,
}

/// Decoded state of an [`AuxButtons`] pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxPosition {
    Low,
    Center,
    High,
    /// Both buttons asserted at once. There is no defined position.
    Conflict,
}

impl AuxPosition {
    /// Channel value for this position, `None` for [`AuxPosition::Conflict`].
    #[must_use]
    pub fn value(self) -> Option<f32> {
        match self {
            AuxPosition::Low => Some(0.0),
            AuxPosition::Center => Some(0.5),
            AuxPosition::High => Some(1.0),
            AuxPosition::Conflict => None,
        }
    }
}

impl AuxButtons {
    #[must_use]
    pub const fn new(low: u32, high: u32) -> Self {
        Self { low, high }
    }

    /// Decodes the switch position from a raw button bitmask.
    #[must_use]
    pub fn position(&self, buttons: u32) -> AuxPosition {
        let low = buttons & self.low != 0;
        let high = buttons & self.high != 0;

        match (low, high) {
            (true, true) => AuxPosition::Conflict,
            (true, false) => AuxPosition::Low,
            (false, true) => AuxPosition::High,
            (false, false) => AuxPosition::Center,
        }
    }
}

/// Mapping and behavior flags for one controller model.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub axes: AxisMap,
    /// Button pair driving the aux channel, if the device has no aux axis.
    pub aux_buttons: Option<AuxButtons>,
    /// Raw sample magnitude at full deflection.
    pub full_scale: i32,
    /// Negate throttle (channel 0) and pitch (channel 2).
    pub reversed_verticals: bool,
    /// Remap the whole throttle travel, `(v + 1) / 2`. Off means linear.
    pub full_travel_throttle: bool,
    /// False for the inert fallback profile.
    pub recognized: bool,
}

impl DeviceProfile {
    /// Inert profile for an unknown device: nothing bound, every channel reads zero.
    #[must_use]
    pub fn unrecognized(vendor_id: u16, product_id: u16) -> Self {
        Self {
            name: "Unrecognized device".to_string(),
            vendor_id,
            product_id,
            axes: [None; AXIS_SLOTS],
            aux_buttons: None,
            full_scale: DEFAULT_FULL_SCALE,
            reversed_verticals: false,
            full_travel_throttle: false,
            recognized: false,
        }
    }

    #[must_use]
    pub fn uses_buttons_for_aux(&self) -> bool {
        self.aux_buttons.is_some()
    }

    /// Slot bound to `channel`, if any.
    #[must_use]
    pub fn slot_for(&self, channel: Channel) -> Option<usize> {
        self.axes
            .iter()
            .position(|b| b.is_some_and(|b| b.channel == channel))
    }
}

/// Vendor IDs of supported controllers.
pub mod vendors {
    /// STMicroelectronics (OpenTX/EdgeTX and Spektrum USB joystick mode)
    pub const STM: u16 = 0x0483;
    /// Sony
    pub const SONY: u16 = 0x054c;
    /// Microsoft
    pub const MICROSOFT: u16 = 0x045e;
    /// Logitech
    pub const LOGITECH: u16 = 0x046d;
    /// PS3 clone pads
    pub const PS3_CLONE: u16 = 0x0e8f;
    /// Generic X-Box pad clones
    pub const XBOX_CLONE: u16 = 0x24c6;
    /// Great Planes (RealFlight InterLink)
    pub const GREAT_PLANES: u16 = 0x1781;
}

/// Product IDs of supported controllers.
pub mod products {
    pub const TARANIS: u16 = 0x5710;
    pub const SPEKTRUM: u16 = 0x572b;
    pub const PS4: u16 = 0x05c4;
    pub const DUALSENSE: u16 = 0x0ce6;
    pub const PS3_CLONE: u16 = 0x0003;
    pub const XBOX360_CLONE: u16 = 0xfafe;
    pub const XBOX360_WIRELESS: u16 = 0x0719;
    pub const EXTREME_3D_PRO: u16 = 0xc215;
    pub const F310: u16 = 0xc216;
    pub const REALFLIGHT_INTERLINK: u16 = 0x0898;
}

/// Lookup from `(vendor, product)` to [`DeviceProfile`].
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<(u16, u16), DeviceProfile>,
}

impl ProfileRegistry {
    /// Registry with no entries; every lookup is unrecognized.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry seeded with every supported controller.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for profile in builtin_profiles() {
            registry.register(profile);
        }
        registry
    }

    /// Adds or replaces the entry for the profile's vendor/product pair.
    pub fn register(&mut self, profile: DeviceProfile) {
        self.profiles
            .insert((profile.vendor_id, profile.product_id), profile);
    }

    /// Resolves a device identity, falling back to an inert profile.
    #[must_use]
    pub fn identify(&self, vendor_id: u16, product_id: u16) -> DeviceProfile {
        self.profiles
            .get(&(vendor_id, product_id))
            .cloned()
            .unwrap_or_else(|| DeviceProfile::unrecognized(vendor_id, product_id))
    }

    #[must_use]
    pub fn contains(&self, vendor_id: u16, product_id: u16) -> bool {
        self.profiles.contains_key(&(vendor_id, product_id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceProfile> {
        self.profiles.values()
    }
}

/// Builds an axis map from `(slot, binding)` pairs.
fn axes(bindings: &[(usize, AxisBinding)]) -> AxisMap {
    let mut map = [None; AXIS_SLOTS];
    for &(slot, binding) in bindings {
        map[slot] = Some(binding);
    }
    map
}

fn profile(name: &str, vendor_id: u16, product_id: u16, axis_map: AxisMap) -> DeviceProfile {
    DeviceProfile {
        name: name.to_string(),
        vendor_id,
        product_id,
        axes: axis_map,
        aux_buttons: None,
        full_scale: DEFAULT_FULL_SCALE,
        reversed_verticals: false,
        full_travel_throttle: false,
        recognized: true,
    }
}

/// Gamepad: recentering linear throttle, reversed verticals and button aux.
fn gamepad(
    name: &str,
    vendor_id: u16,
    product_id: u16,
    axis_map: AxisMap,
    aux: Option<AuxButtons>,
) -> DeviceProfile {
    DeviceProfile {
        aux_buttons: aux,
        reversed_verticals: true,
        ..profile(name, vendor_id, product_id, axis_map)
    }
}

/// RC transmitter: throttle gimbal holds position over its full travel.
fn transmitter(name: &str, vendor_id: u16, product_id: u16, axis_map: AxisMap) -> DeviceProfile {
    DeviceProfile {
        full_travel_throttle: true,
        ..profile(name, vendor_id, product_id, axis_map)
    }
}

fn builtin_profiles() -> Vec<DeviceProfile> {
    use AxisBinding as B;
    use Channel::*;

    // Left stick X/Y = yaw/throttle on every Mode 2 gamepad below.
    let dualshock = axes(&[
        (0, B::to(Yaw)),
        (1, B::to(Throttle)),
        (2, B::to(Roll)),
        (3, B::to(Pitch)),
    ]);
    let xinput = axes(&[
        (0, B::to(Yaw)),
        (1, B::to(Throttle)),
        (3, B::to(Pitch)),
        (4, B::to(Roll)),
    ]);

    vec![
        // R/C transmitters in USB joystick mode
        transmitter(
            "FrSky Taranis",
            vendors::STM,
            products::TARANIS,
            axes(&[
                (0, B::to(Throttle)),
                (1, B::to(Roll)),
                (2, B::to(Pitch)),
                (3, B::to(Aux)),
                (5, B::to(Yaw)),
            ]),
        ),
        transmitter(
            "Spektrum",
            vendors::STM,
            products::SPEKTRUM,
            axes(&[
                (0, B::to(Yaw)),
                (1, B::to(Throttle)),
                (2, B::to(Roll)),
                (4, B::to(Aux)),
                (5, B::to(Pitch)),
            ]),
        ),
        DeviceProfile {
            aux_buttons: Some(AuxButtons::new(1 << 3, 1 << 4)),
            reversed_verticals: true,
            ..transmitter(
                "RealFlight InterLink Elite",
                vendors::GREAT_PLANES,
                products::REALFLIGHT_INTERLINK,
                axes(&[
                    (0, B::to(Roll)),
                    (1, B::to(Pitch)),
                    (2, B::to(Throttle)),
                    (4, B::to(Yaw)),
                ]),
            )
        },
        // Gamepads
        gamepad(
            "PS3 clone",
            vendors::PS3_CLONE,
            products::PS3_CLONE,
            dualshock,
            Some(AuxButtons::new(0x01, 0x04)),
        ),
        gamepad(
            "PS4 DualShock",
            vendors::SONY,
            products::PS4,
            dualshock,
            Some(AuxButtons::new(0x01, 0x04)),
        ),
        gamepad(
            "PS5 DualSense",
            vendors::SONY,
            products::DUALSENSE,
            xinput,
            Some(AuxButtons::new(1 << 4, 1 << 5)),
        ),
        gamepad(
            "Xbox 360 clone",
            vendors::XBOX_CLONE,
            products::XBOX360_CLONE,
            xinput,
            Some(AuxButtons::new(0x08, 0x01)),
        ),
        gamepad(
            "Xbox 360 Wireless",
            vendors::MICROSOFT,
            products::XBOX360_WIRELESS,
            axes(&[
                (0, B::to(Yaw)),
                (1, B::to(Throttle)),
                (3, B::to(Roll)),
                (4, B::to(Pitch)),
            ]),
            None,
        ),
        gamepad(
            "Logitech F310",
            vendors::LOGITECH,
            products::F310,
            xinput,
            Some(AuxButtons::new(0x08, 0x01)),
        ),
        // Flight stick: throttle lever holds its position
        DeviceProfile {
            aux_buttons: Some(AuxButtons::new(0x01, 0x04)),
            reversed_verticals: true,
            full_travel_throttle: true,
            ..profile(
                "Logitech Extreme 3D Pro",
                vendors::LOGITECH,
                products::EXTREME_3D_PRO,
                axes(&[
                    (0, B::to(Roll)),
                    (1, B::to(Pitch)),
                    (2, B::to(Throttle)),
                    (3, B::to(Yaw)),
                ]),
            )
        },
    ]
}

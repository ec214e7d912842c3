//! # Board Abstraction
//!
//! The hardware surface flight firmware is written against, implemented here
//! on top of the simulation: attitude and gyro come from the sensor
//! emulator, motor writes are latched for the control loop, the clock is a
//! fixed-step counter, and the UART is the [`SerialBridge`].

use tracing::debug;

use crate::config::SensorConfig;
use crate::sensors::{quaternion_to_board_frame, GaussianNoise, SensorState};
use crate::serial::SerialBridge;
use nalgebra::{UnitQuaternion, Vector3};

/// Number of motor outputs (quad-X).
pub const NUM_MOTORS: usize = 4;

/// Clock value before the first read.
pub const CLOCK_SEED: f32 = 1.0;

/// Clock increment per read (assumes a 100 Hz firmware loop).
pub const CLOCK_STEP: f32 = 0.01;

/// Callbacks consumed by flight firmware.
pub trait Board {
    /// Attitude quaternion `[w, x, y, z]` in board convention.
    fn get_orientation_quaternion(&mut self) -> [f32; 4];

    /// Gyro rates `[roll, pitch, yaw]` in rad/s. Yaw reads zero.
    fn get_angular_rates(&mut self) -> [f32; 3];

    /// Vertical acceleration in m/s².
    fn get_vertical_acceleration(&mut self) -> f32;

    /// Sets motor `index` (0..4) to `value` (0..1).
    fn write_motor(&mut self, index: usize, value: f32);

    /// Seconds since start. Advances by a fixed step on every call.
    fn get_elapsed_time(&mut self) -> f32;

    /// Bytes ready on the serial port.
    fn serial_bytes_available(&mut self) -> usize;

    /// Next serial byte. Only valid while bytes are available.
    fn serial_read_byte(&mut self) -> u8;

    /// Queues one byte for transmit. Dropped when no client is attached.
    fn serial_write_byte(&mut self, byte: u8);
}

/// Fixed-step firmware clock.
///
/// Starts away from zero so the first time delta a firmware computes is
/// never a division by zero. Time is derived from a tick count, so the step
/// stays exact over long sessions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimClock {
    ticks: u64,
    seed: f64,
    step: f64,
}

impl Default for SimClock {
    fn default() -> Self {
        Self {
            ticks: 0,
            seed: f64::from(CLOCK_SEED),
            step: f64::from(CLOCK_STEP),
        }
    }
}

impl SimClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances one step and returns the new time.
    pub fn tick(&mut self) -> f32 {
        self.ticks += 1;
        self.peek()
    }

    /// Current time without advancing.
    #[must_use]
    pub fn peek(&self) -> f32 {
        (self.seed + self.ticks as f64 * self.step) as f32
    }

    /// Steps taken so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// [`Board`] backed by the simulation.
#[derive(Debug)]
pub struct SimBoard {
    sensors: SensorState,
    motors: [f32; NUM_MOTORS],
    clock: SimClock,
    serial: SerialBridge,
    quaternion_noise: GaussianNoise,
    gyro_noise: GaussianNoise,
}

impl SimBoard {
    /// Board with noiseless sensors.
    #[must_use]
    pub fn new(serial: SerialBridge) -> Self {
        Self::with_noise(serial, GaussianNoise::new(4, 0.0), GaussianNoise::new(3, 0.0))
    }

    #[must_use]
    pub fn with_noise(
        serial: SerialBridge,
        quaternion_noise: GaussianNoise,
        gyro_noise: GaussianNoise,
    ) -> Self {
        Self {
            sensors: SensorState::new(),
            motors: [0.0; NUM_MOTORS],
            clock: SimClock::new(),
            serial,
            quaternion_noise,
            gyro_noise,
        }
    }

    /// Board with noise sources for the `[sensors]` section.
    ///
    /// A configured seed makes both noise streams reproducible.
    #[must_use]
    pub fn from_config(serial: SerialBridge, config: &SensorConfig) -> Self {
        let (quaternion_noise, gyro_noise) = match config.seed {
            Some(seed) => (
                GaussianNoise::seeded(4, config.quaternion_noise, seed),
                GaussianNoise::seeded(3, config.gyro_noise, seed.wrapping_add(1)),
            ),
            None => (
                GaussianNoise::new(4, config.quaternion_noise),
                GaussianNoise::new(3, config.gyro_noise),
            ),
        };
        Self::with_noise(serial, quaternion_noise, gyro_noise)
    }

    /// Refreshes sensor readings from the body's ground truth.
    pub fn sample(&mut self, orientation: UnitQuaternion<f32>, vertical_velocity: f32, dt: f32) {
        self.sensors.update(orientation, vertical_velocity, dt);
    }

    #[must_use]
    pub fn sensors(&self) -> &SensorState {
        &self.sensors
    }

    /// Latest motor command vector.
    #[must_use]
    pub fn motors(&self) -> [f32; NUM_MOTORS] {
        self.motors
    }

    #[must_use]
    pub fn euler(&self) -> Vector3<f32> {
        self.sensors.euler()
    }

    #[must_use]
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    #[must_use]
    pub fn serial(&self) -> &SerialBridge {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut SerialBridge {
        &mut self.serial
    }
}

impl Board for SimBoard {
    fn get_orientation_quaternion(&mut self) -> [f32; 4] {
        let mut q = quaternion_to_board_frame(&self.sensors.orientation);
        self.quaternion_noise.add_noise(&mut q);
        q
    }

    fn get_angular_rates(&mut self) -> [f32; 3] {
        let rates = self.sensors.angular_rates;
        let mut rates = [rates.x, rates.y, rates.z];
        self.gyro_noise.add_noise(&mut rates[..2]);
        rates
    }

    fn get_vertical_acceleration(&mut self) -> f32 {
        self.sensors.vertical_accel
    }

    fn write_motor(&mut self, index: usize, value: f32) {
        match self.motors.get_mut(index) {
            Some(slot) => *slot = value.clamp(0.0, 1.0),
            None => debug!("Ignoring write to motor {}", index),
        }
    }

    fn get_elapsed_time(&mut self) -> f32 {
        self.clock.tick()
    }

    fn serial_bytes_available(&mut self) -> usize {
        self.serial.receive_available_bytes()
    }

    fn serial_read_byte(&mut self) -> u8 {
        self.serial.read_byte().unwrap_or(0)
    }

    fn serial_write_byte(&mut self, byte: u8) {
        self.serial.write_byte(byte);
    }
}

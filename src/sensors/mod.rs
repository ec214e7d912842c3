//! # Sensor Emulation
//!
//! Derives the readings an IMU would report from the simulated body's
//! ground-truth motion.
//!
//! - Gyro: first difference of Euler angles between ticks. The yaw component
//!   is always reported as zero.
//! - Vertical accelerometer: first difference of vertical velocity.
//! - Attitude: the body quaternion remapped into the board's axis convention
//!   (X and Y negated).
//!
//! Every finite difference divides by the frame time, which must be non-zero.

pub mod noise;

pub use noise::GaussianNoise;

use nalgebra::{UnitQuaternion, Vector3};

/// Angular rates from two consecutive Euler samples.
///
/// Returns `(current - previous) / dt` with the yaw (Z) component forced to
/// zero.
///
/// `dt` must be non-zero.
///
/// ```
/// use fpv_sim_bridge::sensors::attitude_to_rates;
/// use nalgebra::Vector3;
///
/// let rates = attitude_to_rates(Vector3::new(0.2, 0.1, 0.5), Vector3::zeros(), 0.1);
/// assert!((rates.x - 2.0).abs() < 1e-5);
/// assert!((rates.y - 1.0).abs() < 1e-5);
/// assert_eq!(rates.z, 0.0);
/// ```
#[must_use]
pub fn attitude_to_rates(current: Vector3<f32>, previous: Vector3<f32>, dt: f32) -> Vector3<f32> {
    debug_assert!(dt != 0.0, "attitude_to_rates called with dt == 0");
    let rates = (current - previous) / dt;
    Vector3::new(rates.x, rates.y, 0.0)
}

/// Vertical acceleration from two consecutive vertical-velocity samples.
///
/// `dt` must be non-zero.
#[must_use]
pub fn vertical_velocity_to_accel(current: f32, previous: f32, dt: f32) -> f32 {
    debug_assert!(dt != 0.0, "vertical_velocity_to_accel called with dt == 0");
    (current - previous) / dt
}

/// Remaps a simulation-frame quaternion into the board's axis convention,
/// as `[w, x, y, z]`.
#[must_use]
pub fn quaternion_to_board_frame(q: &UnitQuaternion<f32>) -> [f32; 4] {
    [q.w, -q.i, -q.j, q.k]
}

/// Roll/pitch/yaw (radians, Z-Y-X) of a simulation-frame quaternion.
#[must_use]
pub fn quaternion_to_euler(q: &UnitQuaternion<f32>) -> Vector3<f32> {
    let (roll, pitch, yaw) = q.euler_angles();
    Vector3::new(roll, pitch, yaw)
}

/// Quaternion for Z-Y-X Euler angles `(roll, pitch, yaw)`.
#[must_use]
pub fn euler_to_quaternion(euler: &Vector3<f32>) -> UnitQuaternion<f32> {
    UnitQuaternion::from_euler_angles(euler.x, euler.y, euler.z)
}

/// Sensor state carried from one tick to the next.
///
/// Owned by the control loop; updated once per tick after the body moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorState {
    /// Body attitude in simulation frame.
    pub orientation: UnitQuaternion<f32>,
    /// Emulated gyro rates, yaw zeroed.
    pub angular_rates: Vector3<f32>,
    /// Emulated vertical acceleration (m/s²).
    pub vertical_accel: f32,
    previous_euler: Vector3<f32>,
    previous_vertical_velocity: f32,
}

impl Default for SensorState {
    fn default() -> Self {
        Self {
            orientation: UnitQuaternion::identity(),
            angular_rates: Vector3::zeros(),
            vertical_accel: 0.0,
            previous_euler: Vector3::zeros(),
            previous_vertical_velocity: 0.0,
        }
    }
}

impl SensorState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples the body and refreshes the derived readings.
    ///
    /// `dt` is the frame time since the previous sample and must be non-zero.
    pub fn update(&mut self, orientation: UnitQuaternion<f32>, vertical_velocity: f32, dt: f32) {
        let euler = quaternion_to_euler(&orientation);

        self.orientation = orientation;
        self.angular_rates = attitude_to_rates(euler, self.previous_euler, dt);
        self.previous_euler = euler;

        self.vertical_accel =
            vertical_velocity_to_accel(vertical_velocity, self.previous_vertical_velocity, dt);
        self.previous_vertical_velocity = vertical_velocity;
    }

    /// Euler angles of the current orientation.
    #[must_use]
    pub fn euler(&self) -> Vector3<f32> {
        self.previous_euler
    }
}

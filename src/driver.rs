//! # Control Loop Driver
//!
//! Runs one simulation frame end to end:
//!
//! 1. Poll the pilot's input device into a [`ChannelSet`]
//! 2. Run the firmware against the [`SimBoard`]
//! 3. Read back the motor command vector
//! 4. Turn diagonal motor-pair differences into angular pseudo-forces
//! 5. Rotate the body by `dt * forces`
//! 6. Sample the body into the sensor emulator
//! 7. Push total thrust along the tilted body vertical
//!
//! The host body is whatever implements [`Vehicle`]; collisions or other
//! host effects may reorient it between ticks and the driver simply takes the
//! orientation it finds as ground truth.

use nalgebra::{UnitQuaternion, Vector3};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::board::{SimBoard, NUM_MOTORS};
use crate::controller::profile::ChannelSet;
use crate::controller::Receiver;
use crate::error::Result;
use crate::firmware::Firmware;

/// Default scale from summed motor output to thrust.
pub const DEFAULT_THRUST_FACTOR: f32 = 130.0;

/// Smallest frame time accepted; shorter frames are stretched to this.
pub const MIN_FRAME_TIME: f32 = 1e-4;

/// The simulated body the driver actuates.
#[cfg_attr(test, mockall::automock)]
pub trait Vehicle {
    /// Current attitude in simulation frame.
    fn orientation(&self) -> UnitQuaternion<f32>;

    /// Linear velocity in m/s, Z up.
    fn velocity(&self) -> Vector3<f32>;

    /// Rotates the body by a local roll/pitch/yaw increment (radians).
    fn add_local_rotation(&mut self, delta: Vector3<f32>);

    /// Applies a world-frame force for the current frame.
    fn add_force(&mut self, force: Vector3<f32>);
}

/// Signed difference between two motor pairs: `(m[a] + m[b]) - (m[c] + m[d])`.
#[must_use]
pub fn motors_to_angular_force(
    motors: &[f32; NUM_MOTORS],
    a: usize,
    b: usize,
    c: usize,
    d: usize,
) -> f32 {
    (motors[a] + motors[b]) - (motors[c] + motors[d])
}

/// Roll, pitch and yaw pseudo-forces for a quad-X motor vector.
#[must_use]
pub fn angular_forces(motors: &[f32; NUM_MOTORS]) -> Vector3<f32> {
    Vector3::new(
        motors_to_angular_force(motors, 2, 3, 0, 1),
        motors_to_angular_force(motors, 1, 3, 0, 2),
        motors_to_angular_force(motors, 1, 2, 0, 3),
    )
}

/// Unit thrust direction for a body at the given Euler attitude.
///
/// Level attitude thrusts straight up `(0, 0, 1)`.
#[must_use]
pub fn thrust_direction(euler: Vector3<f32>) -> Vector3<f32> {
    let (sr, cr) = euler.x.sin_cos();
    let (sp, cp) = euler.y.sin_cos();
    let (sy, cy) = euler.z.sin_cos();

    let x = sr * sy + cr * cy * sp;
    let y = cr * sp * sy - cy * sr;
    let z = cp * cr;

    Vector3::new(-x, -y, z)
}

/// What one tick did, for the host and the flight recorder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub dt: f32,
    pub channels: ChannelSet,
    pub motors: [f32; NUM_MOTORS],
    pub forces: Vector3<f32>,
    pub motor_sum: f32,
    /// Audio/visual intensity for the host, `motor_sum / 4`.
    pub feedback: f32,
    pub thrust: Vector3<f32>,
    pub attitude: Vector3<f32>,
    pub serial_connected: bool,
}

/// Owns the receiver, firmware, board and body for one session.
pub struct ControlLoop<V: Vehicle> {
    receiver: Receiver,
    firmware: Box<dyn Firmware>,
    board: SimBoard,
    vehicle: V,
    thrust_factor: f32,
    ticks: u64,
    begun: bool,
}

impl<V: Vehicle> std::fmt::Debug for ControlLoop<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("receiver", &self.receiver)
            .field("board", &self.board)
            .field("thrust_factor", &self.thrust_factor)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl<V: Vehicle> ControlLoop<V> {
    #[must_use]
    pub fn new(
        receiver: Receiver,
        firmware: Box<dyn Firmware>,
        board: SimBoard,
        vehicle: V,
        thrust_factor: f32,
    ) -> Self {
        Self {
            receiver,
            firmware,
            board,
            vehicle,
            thrust_factor,
            ticks: 0,
            begun: false,
        }
    }

    /// Starts the serial bridge.
    ///
    /// # Errors
    ///
    /// Returns `Bind` if the bridge cannot listen. The loop still ticks
    /// without a transport; serial output is dropped.
    pub fn start(&mut self) -> Result<()> {
        self.board.serial_mut().start()
    }

    /// Runs one frame of `dt` seconds.
    ///
    /// # Errors
    ///
    /// Propagates firmware failures. Input and serial problems never fail a
    /// tick.
    pub fn tick(&mut self, dt: f32) -> Result<TickReport> {
        let dt = if dt < MIN_FRAME_TIME {
            debug!("Frame time {} below minimum, using {}", dt, MIN_FRAME_TIME);
            MIN_FRAME_TIME
        } else {
            dt
        };

        if !self.begun {
            self.firmware.begin(&mut self.board)?;
            self.begun = true;
        }

        let channels = self.receiver.poll();
        self.firmware.update(&channels, &mut self.board)?;

        let motors = self.board.motors();
        let forces = angular_forces(&motors);
        self.vehicle.add_local_rotation(forces * dt);

        let motor_sum: f32 = motors.iter().sum();

        let orientation = self.vehicle.orientation();
        let velocity = self.vehicle.velocity();
        self.board.sample(orientation, velocity.z, dt);

        let attitude = self.board.euler();
        let thrust = thrust_direction(attitude) * (motor_sum * self.thrust_factor);
        self.vehicle.add_force(thrust);

        self.ticks += 1;

        Ok(TickReport {
            tick: self.ticks,
            dt,
            channels,
            motors,
            forces,
            motor_sum,
            feedback: motor_sum / NUM_MOTORS as f32,
            thrust,
            attitude,
            serial_connected: self.board.serial_mut().connected(),
        })
    }

    /// Ends the session: drops any serial client, then closes the bridge.
    pub fn shutdown(&mut self) {
        let serial = self.board.serial_mut();
        if serial.connected() {
            match serial.disconnect() {
                Ok(true) => info!("Serial client disconnected"),
                Ok(false) => warn!("Serial client did not disconnect cleanly"),
                Err(e) => warn!("Serial disconnect failed: {}", e),
            }
        }
        serial.stop();
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub fn board(&self) -> &SimBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut SimBoard {
        &mut self.board
    }

    #[must_use]
    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    #[must_use]
    pub fn vehicle(&self) -> &V {
        &self.vehicle
    }

    pub fn vehicle_mut(&mut self) -> &mut V {
        &mut self.vehicle
    }
}

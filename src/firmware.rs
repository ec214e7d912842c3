//! # Firmware Interface
//!
//! Flight firmware runs unmodified against a [`Board`]: once per tick it is
//! handed the pilot's channels, reads sensors, writes motors and services
//! its serial port through the board callbacks.
//!
//! [`MixerFirmware`] is a minimal stand-in used by the binary and tests: a
//! rate-damped quad-X mixer that echoes every serial byte it receives.

use crate::board::{Board, NUM_MOTORS};
use crate::controller::profile::ChannelSet;
use crate::error::Result;

/// Flight firmware plugged into the control loop.
pub trait Firmware: Send {
    /// Called once before the first update.
    fn begin(&mut self, _board: &mut dyn Board) -> Result<()> {
        Ok(())
    }

    /// One firmware cycle.
    fn update(&mut self, channels: &ChannelSet, board: &mut dyn Board) -> Result<()>;
}

/// Roll contribution per motor. Matches the driver's diagonal pairs.
const ROLL_MIX: [f32; NUM_MOTORS] = [-1.0, -1.0, 1.0, 1.0];
/// Pitch contribution per motor.
const PITCH_MIX: [f32; NUM_MOTORS] = [-1.0, 1.0, -1.0, 1.0];
/// Yaw contribution per motor.
const YAW_MIX: [f32; NUM_MOTORS] = [-1.0, 1.0, 1.0, -1.0];

/// Quad-X mixer with gyro damping and a serial echo.
#[derive(Debug, Clone)]
pub struct MixerFirmware {
    stick_gain: f32,
    damping: f32,
    last_time: f32,
    cycles: u64,
    echoed: u64,
}

impl Default for MixerFirmware {
    fn default() -> Self {
        Self::new(0.25, 0.05)
    }
}

impl MixerFirmware {
    #[must_use]
    pub fn new(stick_gain: f32, damping: f32) -> Self {
        Self {
            stick_gain,
            damping,
            last_time: 0.0,
            cycles: 0,
            echoed: 0,
        }
    }

    /// Completed update cycles.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Board time seen on the latest cycle.
    #[must_use]
    pub fn last_time(&self) -> f32 {
        self.last_time
    }

    /// Serial bytes echoed back so far.
    #[must_use]
    pub fn echoed(&self) -> u64 {
        self.echoed
    }

    /// Motor outputs for the given stick commands and gyro rates.
    ///
    /// Zero throttle cuts every motor.
    #[must_use]
    pub fn mix(&self, channels: &ChannelSet, rates: [f32; 3]) -> [f32; NUM_MOTORS] {
        let throttle = channels.throttle();
        if throttle <= 0.0 {
            return [0.0; NUM_MOTORS];
        }

        let roll = channels.roll() * self.stick_gain - rates[0] * self.damping;
        let pitch = channels.pitch() * self.stick_gain - rates[1] * self.damping;
        let yaw = channels.yaw() * self.stick_gain - rates[2] * self.damping;

        let mut motors = [0.0; NUM_MOTORS];
        for (i, motor) in motors.iter_mut().enumerate() {
            *motor = (throttle + roll * ROLL_MIX[i] + pitch * PITCH_MIX[i] + yaw * YAW_MIX[i])
                .clamp(0.0, 1.0);
        }
        motors
    }

    fn service_serial(&mut self, board: &mut dyn Board) {
        let mut available = board.serial_bytes_available();
        while available > 0 {
            let byte = board.serial_read_byte();
            board.serial_write_byte(byte);
            self.echoed += 1;
            available -= 1;
        }
    }
}

impl Firmware for MixerFirmware {
    fn begin(&mut self, board: &mut dyn Board) -> Result<()> {
        self.last_time = board.get_elapsed_time();
        Ok(())
    }

    fn update(&mut self, channels: &ChannelSet, board: &mut dyn Board) -> Result<()> {
        self.last_time = board.get_elapsed_time();

        let rates = board.get_angular_rates();
        let motors = self.mix(channels, rates);
        for (index, value) in motors.iter().enumerate() {
            board.write_motor(index, *value);
        }

        self.service_serial(board);
        self.cycles += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::SimBoard;
    use crate::serial::transport::mocks::MockTransport;
    use crate::serial::SerialBridge;

    fn channels(throttle: f32, roll: f32, pitch: f32, yaw: f32) -> ChannelSet {
        ChannelSet::from_array([throttle, roll, pitch, yaw, 0.0])
    }

    fn board_with(mock: &MockTransport) -> SimBoard {
        let mut serial = SerialBridge::new(Box::new(mock.clone()), 16);
        serial.start().unwrap();
        SimBoard::new(serial)
    }

    // ==================== Mixer Tests ====================

    #[test]
    fn test_zero_throttle_cuts_motors() {
        let fw = MixerFirmware::default();
        assert_eq!(fw.mix(&channels(0.0, 1.0, 1.0, 1.0), [0.0; 3]), [0.0; 4]);
    }

    #[test]
    fn test_hover_is_symmetric() {
        let fw = MixerFirmware::default();
        assert_eq!(fw.mix(&channels(0.5, 0.0, 0.0, 0.0), [0.0; 3]), [0.5; 4]);
    }

    #[test]
    fn test_roll_command_loads_right_pair() {
        let fw = MixerFirmware::new(0.2, 0.0);
        let m = fw.mix(&channels(0.5, 1.0, 0.0, 0.0), [0.0; 3]);
        assert!((m[2] + m[3]) > (m[0] + m[1]));
    }

    #[test]
    fn test_gyro_damping_opposes_rate() {
        let fw = MixerFirmware::new(0.0, 0.1);
        let m = fw.mix(&channels(0.5, 0.0, 0.0, 0.0), [1.0, 0.0, 0.0]);
        assert!((m[2] + m[3]) < (m[0] + m[1]));
    }

    #[test]
    fn test_outputs_clamped() {
        let fw = MixerFirmware::new(1.0, 0.0);
        for m in fw.mix(&channels(1.0, 1.0, -1.0, 1.0), [0.0; 3]) {
            assert!((0.0..=1.0).contains(&m));
        }
    }

    // ==================== Board Interaction Tests ====================

    #[test]
    fn test_update_writes_motors() {
        let mock = MockTransport::new();
        let mut board = board_with(&mock);
        let mut fw = MixerFirmware::default();

        fw.begin(&mut board).unwrap();
        fw.update(&channels(0.4, 0.0, 0.0, 0.0), &mut board).unwrap();

        assert_eq!(board.motors(), [0.4; 4]);
        assert_eq!(fw.cycles(), 1);
        assert!(fw.last_time() > crate::board::CLOCK_SEED);
    }

    #[test]
    fn test_update_echoes_serial() {
        let mock = MockTransport::new();
        mock.set_connected(true);
        mock.push_inbound(b"ping");
        let mut board = board_with(&mock);
        let mut fw = MixerFirmware::default();

        fw.update(&ChannelSet::NEUTRAL, &mut board).unwrap();

        assert_eq!(mock.get_sent(), b"ping".to_vec());
        assert_eq!(fw.echoed(), 4);
        assert_eq!(board.serial_bytes_available(), 0);
    }
}

//! # Headless Host Body
//!
//! A minimal rigid body that stands in for a game engine actor so the bridge
//! can fly without one. Rotation is kinematic (local Euler increments are
//! composed straight into the attitude); translation integrates force, mass
//! and gravity with a flat ground plane at `z = 0`.
//!
//! Forces arrive in engine units (kg·cm/s²) and are converted to SI on
//! integration, so the default thrust factor gives a hover point inside the
//! motors' range.

use crate::config::DynamicsConfig;
use crate::driver::Vehicle;
use nalgebra::{UnitQuaternion, Vector3};

/// Standard gravity (m/s²).
pub const STANDARD_GRAVITY: f32 = 9.80665;

/// Default body mass (kg).
pub const DEFAULT_MASS_KG: f32 = 0.3;

/// Conversion from applied force units to newtons.
pub const FORCE_TO_NEWTONS: f32 = 0.01;

/// Kinematic quadcopter body.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicBody {
    orientation: UnitQuaternion<f32>,
    position: Vector3<f32>,
    velocity: Vector3<f32>,
    pending_force: Vector3<f32>,
    mass_kg: f32,
    gravity: f32,
}

impl Default for KinematicBody {
    fn default() -> Self {
        Self::new(DEFAULT_MASS_KG, STANDARD_GRAVITY)
    }
}

impl KinematicBody {
    /// Level body at rest on the ground.
    ///
    /// Non-positive mass is replaced by the default.
    #[must_use]
    pub fn new(mass_kg: f32, gravity: f32) -> Self {
        Self {
            orientation: UnitQuaternion::identity(),
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            pending_force: Vector3::zeros(),
            mass_kg: if mass_kg > 0.0 { mass_kg } else { DEFAULT_MASS_KG },
            gravity,
        }
    }

    /// Body for the `[dynamics]` section.
    #[must_use]
    pub fn from_config(config: &DynamicsConfig) -> Self {
        Self::new(config.mass_kg, config.gravity)
    }

    #[must_use]
    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    #[must_use]
    pub fn mass_kg(&self) -> f32 {
        self.mass_kg
    }

    /// Whether the body is resting on the ground plane.
    #[must_use]
    pub fn on_ground(&self) -> bool {
        self.position.z <= 0.0 && self.velocity.z <= 0.0
    }

    /// Overrides the attitude, e.g. after a collision.
    pub fn set_orientation(&mut self, orientation: UnitQuaternion<f32>) {
        self.orientation = orientation;
    }

    /// Integrates forces accumulated since the last step over `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        let accel = self.pending_force * (FORCE_TO_NEWTONS / self.mass_kg)
            + Vector3::new(0.0, 0.0, -self.gravity);
        self.pending_force = Vector3::zeros();

        self.velocity += accel * dt;
        self.position += self.velocity * dt;

        if self.position.z < 0.0 {
            self.position.z = 0.0;
            self.velocity = Vector3::zeros();
        }
    }
}

impl Vehicle for KinematicBody {
    fn orientation(&self) -> UnitQuaternion<f32> {
        self.orientation
    }

    fn velocity(&self) -> Vector3<f32> {
        self.velocity
    }

    fn add_local_rotation(&mut self, delta: Vector3<f32>) {
        let increment = UnitQuaternion::from_euler_angles(delta.x, delta.y, delta.z);
        self.orientation = self.orientation * increment;
        self.orientation.renormalize_fast();
    }

    fn add_force(&mut self, force: Vector3<f32>) {
        self.pending_force += force;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_rests_on_ground_without_thrust() {
        let mut body = KinematicBody::default();
        for _ in 0..100 {
            body.step(0.01);
        }
        assert_eq!(body.position(), Vector3::zeros());
        assert_eq!(body.velocity(), Vector3::zeros());
        assert!(body.on_ground());
    }

    #[test]
    fn test_climbs_with_excess_thrust() {
        let mut body = KinematicBody::new(0.3, STANDARD_GRAVITY);
        for _ in 0..50 {
            // 2x hover force
            let lift = 2.0 * 0.3 * STANDARD_GRAVITY / FORCE_TO_NEWTONS;
            body.add_force(Vector3::new(0.0, 0.0, lift));
            body.step(0.01);
        }
        assert!(body.position().z > 0.0);
        assert!(body.velocity().z > 0.0);
        assert!(!body.on_ground());
    }

    #[test]
    fn test_force_cleared_each_step() {
        let mut body = KinematicBody::default();
        body.add_force(Vector3::new(0.0, 0.0, 1000.0));
        body.step(0.01);
        let v1 = body.velocity().z;
        body.step(0.01);
        assert!(body.velocity().z < v1);
    }

    #[test]
    fn test_hover_force_holds_velocity() {
        let mut body = KinematicBody::new(0.5, STANDARD_GRAVITY);
        body.add_force(Vector3::new(0.0, 0.0, 500.0));
        body.step(0.01);
        let v = body.velocity().z;
        body.add_force(Vector3::new(0.0, 0.0, 0.5 * STANDARD_GRAVITY / FORCE_TO_NEWTONS));
        body.step(0.01);
        assert!((body.velocity().z - v).abs() < EPS);
    }

    #[test]
    fn test_local_rotation_accumulates() {
        let mut body = KinematicBody::default();
        for _ in 0..10 {
            body.add_local_rotation(Vector3::new(0.01, 0.0, 0.0));
        }
        let (roll, pitch, _) = body.orientation().euler_angles();
        assert!((roll - 0.1).abs() < EPS);
        assert!(pitch.abs() < EPS);
    }

    #[test]
    fn test_invalid_mass_defaults() {
        assert_eq!(KinematicBody::new(0.0, STANDARD_GRAVITY).mass_kg(), DEFAULT_MASS_KG);
        assert_eq!(KinematicBody::new(-1.0, STANDARD_GRAVITY).mass_kg(), DEFAULT_MASS_KG);
    }

    #[test]
    fn test_from_config() {
        let body = KinematicBody::from_config(&DynamicsConfig::default());
        assert_eq!(body.mass_kg(), DEFAULT_MASS_KG);
        assert!(body.on_ground());
    }

    #[test]
    fn test_zero_dt_is_noop() {
        let mut body = KinematicBody::default();
        body.add_force(Vector3::new(0.0, 0.0, 1000.0));
        body.step(0.0);
        assert_eq!(body.velocity(), Vector3::zeros());
    }
}

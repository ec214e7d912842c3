//! # FPV Sim Bridge Library
//!
//! Fly unmodified flight-control firmware against a simulated quadcopter.
//!
//! This library provides the pieces that stand between a firmware and a
//! physics host: a gamepad-to-channel mapper, an emulated IMU and clock, a
//! serial port tunnelled over TCP, and the per-frame control loop that turns
//! motor commands back into torque and thrust.

pub mod board;
pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod firmware;
pub mod host;
pub mod runner;
pub mod sensors;
pub mod serial;
pub mod telemetry;

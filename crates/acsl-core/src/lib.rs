//! # ACSL Core
//!
//! Flight control core for multi-rotor vehicles.
//!
//! This library implements three cascaded controllers: PID, model-reference
//! adaptive control (MRAC) and two-layer MRAC. The adaptive variants carry
//! dead-zone modulation, e-modification and an ellipsoidal projection
//! operator, and every variant runs through an outer-loop safety mechanism.
//!
//! ## Modules
//!
//! - [`math`]: Euler-angle kinematics, Lyapunov equations, pole shifting, RK4
//! - [`config`]: Serializable gains configuration
//! - [`vehicle`]: Vehicle parameters and thrust allocation
//! - [`control`]: Controllers, adaptive laws, safety, logging, trajectories
//! - [`error`]: Error type
//!
//! Frames: inertial NED, body FRD, ZYX Euler angles.

pub mod config;
pub mod control;
pub mod error;
pub mod math;
pub mod vehicle;

pub use config::ControllerConfig;
pub use control::{instantiate_controller, ControllerType, FlightController, OdeInput};
pub use error::{ControlError, Result};
pub use vehicle::VehicleParams;

/// Standard gravity [m/s²]
pub const GRAVITY: f64 = 9.80665;

//! Flight controllers
//!
//! Cascaded position/attitude controllers for multi-rotor vehicles:
//! - PID: PID outer and inner loops with drag and gyroscopic compensation
//! - MRAC: baseline PD/PI laws augmented by adaptive estimates
//! - Two-layer MRAC: MRAC with a second adaptive layer shaping the transient
//!
//! Each controller evaluates its control law into a [`StepContext`], then
//! advances its [`ControlState`] with one RK4 step.

pub mod adaptive;
pub mod context;
pub mod controller;
pub mod dispatch;
pub mod evaluator;
pub mod filter;
pub mod gains;
pub mod input;
pub mod logger;
pub mod mrac;
pub mod pid;
pub mod projection;
pub mod safety;
pub mod state;
pub mod trajectory;
pub mod two_layer;

pub use context::{AdaptiveContext, StepContext};
pub use controller::{ControllerCore, FlightController};
pub use dispatch::{instantiate_by_name, instantiate_controller, Controller, ControllerBundle, ControllerType, GainsSet};
pub use filter::Differentiator;
pub use gains::{MracGains, PidGains, TwoLayerGains};
pub use input::{OdeInput, TrajectoryState, VehicleState};
pub use logger::{DiagnosticLogger, DiagnosticRecord};
pub use mrac::MracController;
pub use pid::PidController;
pub use projection::Ellipsoid;
pub use safety::{SafetyMechanism, SafetyResult};
pub use state::ControlState;
pub use trajectory::{CircularTrajectory, HoverTrajectory, UserTrajectory};
pub use two_layer::TwoLayerMracController;

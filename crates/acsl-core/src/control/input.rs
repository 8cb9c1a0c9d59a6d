//! Per-step controller input
//!
//! Snapshot of the measured vehicle state and the user trajectory reference
//! consumed by one control-law evaluation. Inertial quantities are NED.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Measured vehicle state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    /// Position [m] (inertial frame)
    pub position: Vector3<f64>,
    /// Velocity [m/s] (inertial frame)
    pub velocity: Vector3<f64>,
    /// Roll angle [rad]
    pub roll: f64,
    /// Pitch angle [rad]
    pub pitch: f64,
    /// Yaw angle [rad]
    pub yaw: f64,
    /// Angular velocity [rad/s] (body frame)
    pub angular_velocity: Vector3<f64>,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            roll: 0.0,
            pitch: 0.0,
            yaw: 0.0,
            angular_velocity: Vector3::zeros(),
        }
    }
}

impl VehicleState {
    /// Vehicle at rest at the given position
    pub fn at_rest(position: Vector3<f64>) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Euler angles as [roll, pitch, yaw]
    pub fn euler_angles(&self) -> Vector3<f64> {
        Vector3::new(self.roll, self.pitch, self.yaw)
    }
}

/// User-defined trajectory reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryState {
    /// Position [m]
    pub position: Vector3<f64>,
    /// Velocity [m/s]
    pub velocity: Vector3<f64>,
    /// Acceleration [m/s²]
    pub acceleration: Vector3<f64>,
    /// Yaw [rad]
    pub yaw: f64,
    /// Yaw rate [rad/s]
    pub yaw_rate: f64,
    /// Yaw acceleration [rad/s²]
    pub yaw_acceleration: f64,
}

impl Default for TrajectoryState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            yaw: 0.0,
            yaw_rate: 0.0,
            yaw_acceleration: 0.0,
        }
    }
}

impl TrajectoryState {
    /// Stationary reference at a given position and heading
    pub fn hover(position: Vector3<f64>, yaw: f64) -> Self {
        Self {
            position,
            yaw,
            ..Default::default()
        }
    }
}

/// Exogenous input of one control step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OdeInput {
    /// Controller time [s]
    pub time: f64,
    pub vehicle: VehicleState,
    pub trajectory: TrajectoryState,
}

impl OdeInput {
    pub fn new(time: f64, vehicle: VehicleState, trajectory: TrajectoryState) -> Self {
        Self {
            time,
            vehicle,
            trajectory,
        }
    }
}

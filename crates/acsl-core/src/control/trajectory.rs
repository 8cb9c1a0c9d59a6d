//! User trajectories
//!
//! Reference generators producing the trajectory half of [`OdeInput`]:
//! position, velocity, acceleration and yaw with its two derivatives.
//! Time is measured from the controller start time.
//!
//! [`OdeInput`]: super::input::OdeInput

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::input::TrajectoryState;

/// Time-parameterized user reference
pub trait UserTrajectory {
    /// Reference at simulation time `t`
    fn sample(&self, t: f64) -> TrajectoryState;
}

/// Stationary hover at a fixed altitude
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoverTrajectory {
    /// Hover altitude, NED z [m] (negative above ground)
    pub altitude: f64,
}

impl Default for HoverTrajectory {
    fn default() -> Self {
        Self { altitude: -1.0 }
    }
}

impl UserTrajectory for HoverTrajectory {
    fn sample(&self, _t: f64) -> TrajectoryState {
        TrajectoryState::hover(Vector3::new(0.0, 0.0, self.altitude), 0.0)
    }
}

/// Constant-altitude circle, flown clockwise seen from above
///
/// The circle starts at the origin and is centered at (-radius, 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircularTrajectory {
    /// Circle radius [m]
    pub radius: f64,
    /// Angular rate along the circle [rad/s]
    pub angular_rate: f64,
    /// NED z [m]
    pub altitude: f64,
    /// Time at which the controller takes over [s]
    pub start_time: f64,
}

impl Default for CircularTrajectory {
    fn default() -> Self {
        Self {
            radius: 3.0,
            angular_rate: 0.2,
            altitude: -1.0,
            start_time: 0.0,
        }
    }
}

impl CircularTrajectory {
    /// Heading reference, stepped during the first 1.5 s
    fn yaw(&self, t: f64) -> f64 {
        let offset = if t < 0.5 {
            PI / 8.0
        } else if t < 1.0 {
            PI / 4.0
        } else if t < 1.5 {
            3.0 * PI / 8.0
        } else {
            PI / 2.0
        };
        -self.angular_rate * t - offset
    }
}

impl UserTrajectory for CircularTrajectory {
    fn sample(&self, t: f64) -> TrajectoryState {
        let t = t - self.start_time;
        let (r, w) = (self.radius, self.angular_rate);
        let (sin_wt, cos_wt) = (w * t).sin_cos();

        TrajectoryState {
            position: Vector3::new(r * cos_wt - r, -r * sin_wt, self.altitude),
            velocity: Vector3::new(-w * r * sin_wt, -w * r * cos_wt, 0.0),
            acceleration: Vector3::new(-w * w * r * cos_wt, w * w * r * sin_wt, 0.0),
            yaw: self.yaw(t),
            yaw_rate: -w,
            yaw_acceleration: 0.0,
        }
    }
}

//! Vehicle parameters
//!
//! Estimated physical properties the controllers rely on: mass, inertia,
//! aerodynamic coefficients, gravity and the thrust allocation
//! pseudo-inverse that turns [u1, u2, u3, u4] into per-motor thrusts.
//!
//! Frames follow the NED convention (x-front, y-right, z-down).

use nalgebra::{DMatrix, DVector, Matrix3, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};
use crate::GRAVITY;

/// Maximum number of motors carried in exported diagnostics
pub const MAX_LOGGED_MOTORS: usize = 8;

/// Estimated vehicle parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleParams {
    /// Total mass [kg]
    pub mass: f64,
    /// Inertia tensor [kg·m²] (body frame, NED axes)
    pub inertia: Matrix3<f64>,
    /// Air density [kg/m³]
    pub air_density: f64,
    /// Reference surface area for drag [m²]
    pub surface_area: f64,
    /// Drag coefficient (flat plate) [-]
    pub drag_coefficient: f64,
    /// Gravitational acceleration [m/s²]
    pub gravity: f64,
    /// Moore-Penrose pseudo-inverse of the mixer matrix (N motors × 4)
    pub allocation_pinv: DMatrix<f64>,
}

impl VehicleParams {
    /// Build parameters from a 4 × N mixer matrix
    ///
    /// The mixer maps motor thrusts to [total thrust, roll, pitch, yaw
    /// moments]. Its pseudo-inverse is computed once here.
    pub fn from_mixer(
        mass: f64,
        inertia: Matrix3<f64>,
        air_density: f64,
        surface_area: f64,
        drag_coefficient: f64,
        mixer: &DMatrix<f64>,
    ) -> Result<Self> {
        if mixer.nrows() != 4 {
            return Err(ControlError::shape("mixer rows", 4, mixer.nrows()));
        }
        let allocation_pinv = mixer
            .clone()
            .pseudo_inverse(1e-12)
            .map_err(|e| ControlError::config(format!("mixer pseudo-inverse failed: {e}")))?;

        let params = Self {
            mass,
            inertia,
            air_density,
            surface_area,
            drag_coefficient,
            gravity: GRAVITY,
            allocation_pinv,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check that the parameters describe a physical vehicle
    pub fn validate(&self) -> Result<()> {
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(ControlError::config("vehicle mass must be positive"));
        }
        if !(self.gravity.is_finite() && self.gravity > 0.0) {
            return Err(ControlError::config("gravity must be positive"));
        }
        if self.inertia.try_inverse().is_none() {
            return Err(ControlError::config("vehicle inertia must be invertible"));
        }
        if self.allocation_pinv.ncols() != 4 {
            return Err(ControlError::shape(
                "allocation pseudo-inverse columns",
                4,
                self.allocation_pinv.ncols(),
            ));
        }
        if self.motor_count() == 0 {
            return Err(ControlError::config("vehicle must have at least one motor"));
        }
        Ok(())
    }

    /// Number of motors
    pub fn motor_count(&self) -> usize {
        self.allocation_pinv.nrows()
    }

    /// Weight of the vehicle [N]
    pub fn weight(&self) -> f64 {
        self.mass * self.gravity
    }

    /// Drag coefficient matrix diag(Cd, Cd, 0)
    ///
    /// Only the body-frame horizontal axes carry drag in the estimate.
    pub fn drag_coefficient_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_diagonal(&Vector3::new(self.drag_coefficient, self.drag_coefficient, 0.0))
    }

    /// Map [u1, u2, u3, u4] to per-motor thrusts
    pub fn allocate(&self, u: &Vector4<f64>) -> DVector<f64> {
        &self.allocation_pinv * u
    }
}

impl Default for VehicleParams {
    fn default() -> Self {
        // Coaxial X8 octocopter
        let allocation_pinv = orthogonal_allocation(&x8_mixer(0.3, 0.02));
        Self {
            mass: 6.0,
            inertia: Matrix3::from_diagonal(&Vector3::new(0.35, 0.35, 0.6)),
            air_density: 1.225,
            surface_area: 0.2,
            drag_coefficient: 1.28,
            gravity: GRAVITY,
            allocation_pinv,
        }
    }
}

/// Mixer matrix of a coaxial X8 octocopter
///
/// Four arms at 45°, 135°, 225° and 315° from the nose, one motor above and
/// one below on each arm with opposite spin. Motors 0-3 are the upper ring,
/// 4-7 the lower ring on the same arms.
///
/// # Arguments
/// * `arm_length` - Distance from the center of mass to each motor axis [m]
/// * `torque_coefficient` - Reaction torque per unit thrust [m]
pub fn x8_mixer(arm_length: f64, torque_coefficient: f64) -> DMatrix<f64> {
    let d = arm_length / std::f64::consts::SQRT_2;
    // (x, y) per arm: front-right, rear-right, rear-left, front-left
    let arms = [(d, d), (-d, d), (-d, -d), (d, -d)];
    let upper_spin = [1.0, -1.0, 1.0, -1.0];

    let mut mixer = DMatrix::zeros(4, 8);
    for (ring, sign) in [(0usize, 1.0), (1usize, -1.0)] {
        for (arm, &(x, y)) in arms.iter().enumerate() {
            let col = ring * 4 + arm;
            mixer[(0, col)] = 1.0;
            mixer[(1, col)] = -y;
            mixer[(2, col)] = x;
            mixer[(3, col)] = sign * upper_spin[arm] * torque_coefficient;
        }
    }
    mixer
}

/// Mixer matrix of an X-configuration quadrotor
pub fn quad_x_mixer(arm_length: f64, torque_coefficient: f64) -> DMatrix<f64> {
    let d = arm_length / std::f64::consts::SQRT_2;
    let arms = [(d, d), (-d, d), (-d, -d), (d, -d)];
    let spin = [1.0, -1.0, 1.0, -1.0];

    let mut mixer = DMatrix::zeros(4, 4);
    for (col, &(x, y)) in arms.iter().enumerate() {
        mixer[(0, col)] = 1.0;
        mixer[(1, col)] = -y;
        mixer[(2, col)] = x;
        mixer[(3, col)] = spin[col] * torque_coefficient;
    }
    mixer
}

/// Pseudo-inverse Mᵀ(MMᵀ)⁻¹ of a mixer with mutually orthogonal, nonzero rows
///
/// Holds for the symmetric X8 and quad-X layouts, where MMᵀ is diagonal.
pub fn orthogonal_allocation(mixer: &DMatrix<f64>) -> DMatrix<f64> {
    let row_norms: Vec<f64> = mixer.row_iter().map(|row| row.norm_squared()).collect();
    DMatrix::from_fn(mixer.ncols(), mixer.nrows(), |motor, axis| {
        mixer[(axis, motor)] / row_norms[axis]
    })
}

//! Euler-angle rotation utilities
//!
//! ZYX (yaw-pitch-roll) rotation matrices, the Euler-rate Jacobian and its
//! derivative, and angle wrapping. All frames follow the NED convention:
//! the inertial z-axis points down.

use nalgebra::{Matrix3, Vector3};
use std::f64::consts::PI;

use crate::error::{ControlError, Result};

/// Below this |cos(pitch)| the Euler-rate Jacobian is treated as singular
pub const SINGULARITY_THRESHOLD: f64 = 1e-6;

/// Skew-symmetric matrix from vector (hat operator)
///
/// For v = [x, y, z]^T:
/// ```text
/// [v]× = [ 0  -z   y]
///        [ z   0  -x]
///        [-y   x   0]
/// ```
///
/// Used in: ω × Iω
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}

/// Elementary rotation about the x-axis (roll)
pub fn rotation_x(roll: f64) -> Matrix3<f64> {
    let (s, c) = roll.sin_cos();
    Matrix3::new(
        1.0, 0.0, 0.0,
        0.0, c, -s,
        0.0, s, c,
    )
}

/// Elementary rotation about the y-axis (pitch)
pub fn rotation_y(pitch: f64) -> Matrix3<f64> {
    let (s, c) = pitch.sin_cos();
    Matrix3::new(
        c, 0.0, s,
        0.0, 1.0, 0.0,
        -s, 0.0, c,
    )
}

/// Elementary rotation about the z-axis (yaw)
pub fn rotation_z(yaw: f64) -> Matrix3<f64> {
    let (s, c) = yaw.sin_cos();
    Matrix3::new(
        c, -s, 0.0,
        s, c, 0.0,
        0.0, 0.0, 1.0,
    )
}

/// Body-to-inertial rotation matrix for ZYX Euler angles
///
/// R = R_z(ψ) · R_y(θ) · R_x(φ)
///
/// A body-frame vector v_J maps to the inertial frame as v_I = R · v_J.
pub fn rotation_matrix_zyx(roll: f64, pitch: f64, yaw: f64) -> Matrix3<f64> {
    rotation_z(yaw) * rotation_y(pitch) * rotation_x(roll)
}

/// Euler-rate Jacobian
///
/// Maps Euler angle rates [φ̇, θ̇, ψ̇] to body angular velocity ω:
/// ```text
///     [1    0       -sθ  ]
/// J = [0   cφ     sφ·cθ  ]
///     [0  -sφ     cφ·cθ  ]
/// ```
pub fn euler_rate_jacobian(roll: f64, pitch: f64) -> Matrix3<f64> {
    let (sphi, cphi) = roll.sin_cos();
    let (sth, cth) = pitch.sin_cos();
    Matrix3::new(
        1.0, 0.0, -sth,
        0.0, cphi, sphi * cth,
        0.0, -sphi, cphi * cth,
    )
}

/// Inverse of the Euler-rate Jacobian
///
/// Maps body angular velocity ω to Euler angle rates. Fails with
/// [`ControlError::SingularAttitude`] when |cos θ| < [`SINGULARITY_THRESHOLD`].
pub fn euler_rate_jacobian_inverse(roll: f64, pitch: f64) -> Result<Matrix3<f64>> {
    let (sphi, cphi) = roll.sin_cos();
    let (sth, cth) = pitch.sin_cos();

    if cth.abs() < SINGULARITY_THRESHOLD {
        return Err(ControlError::SingularAttitude { pitch });
    }

    let tth = sth / cth;
    Ok(Matrix3::new(
        1.0, sphi * tth, cphi * tth,
        0.0, cphi, -sphi,
        0.0, sphi / cth, cphi / cth,
    ))
}

/// Time derivative of the Euler-rate Jacobian
///
/// # Arguments
/// * `roll`, `pitch` - Current angles [rad]
/// * `roll_rate`, `pitch_rate` - Their time derivatives [rad/s]
pub fn euler_rate_jacobian_dot(roll: f64, pitch: f64, roll_rate: f64, pitch_rate: f64) -> Matrix3<f64> {
    let (sphi, cphi) = roll.sin_cos();
    let (sth, cth) = pitch.sin_cos();
    Matrix3::new(
        0.0, 0.0, -cth * pitch_rate,
        0.0, -sphi * roll_rate, cphi * cth * roll_rate - sphi * sth * pitch_rate,
        0.0, -cphi * roll_rate, -cth * sphi * roll_rate - cphi * sth * pitch_rate,
    )
}

/// Wrap an angle to the half-open interval (-π, π]
pub fn wrap_to_pi(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI {
        PI
    } else {
        wrapped
    }
}

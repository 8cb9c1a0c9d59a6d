//! Controller gains
//!
//! One concrete gains set per controller variant, assembled from small named
//! groups: reference filters, baseline gains, plant/reference models and
//! adaptation settings. Every derived quantity (Lyapunov solutions, transient
//! dynamics, ellipsoid shapes and margins) is computed once here and the set
//! is immutable afterwards.

mod mrac;
mod pid;
mod two_layer;

pub use mrac::*;
pub use pid::*;
pub use two_layer::*;

use nalgebra::{Matrix3, Matrix6, SMatrix};

use super::adaptive::{DeadZone, LoopEllipsoids};
use super::filter::Differentiator;
use super::projection::Ellipsoid;
use crate::config::{DeadZoneConfig, DifferentiatorConfig, LoopEllipsoidsConfig, ScaledMatrix};
use crate::error::{ControlError, Result};

/// Roll and pitch reference differentiators
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFilters {
    pub roll: Differentiator,
    pub pitch: Differentiator,
}

impl ReferenceFilters {
    pub fn from_config(roll: &DifferentiatorConfig, pitch: &DifferentiatorConfig) -> Result<Self> {
        Ok(Self {
            roll: Differentiator::from_config(roll, "roll_filter")?,
            pitch: Differentiator::from_config(pitch, "pitch_filter")?,
        })
    }
}

/// Materialize a 3 × 3 gain matrix
pub(crate) fn matrix3(m: &ScaledMatrix, name: &str) -> Result<Matrix3<f64>> {
    m.to_fixed::<3, 3>(name)
}

/// Materialize a 6 × 6 matrix
pub(crate) fn matrix6(m: &ScaledMatrix, name: &str) -> Result<Matrix6<f64>> {
    m.to_fixed::<6, 6>(name)
}

/// Dead-zone parameters of both loops
pub(crate) fn dead_zones(config: &DeadZoneConfig) -> Result<(DeadZone, DeadZone)> {
    let check = |delta: f64, e0: f64, suffix: &str| -> Result<DeadZone> {
        if config.enabled {
            if !(delta > 0.0 && delta < 1.0) {
                return Err(ControlError::config(format!(
                    "dead_zone_delta_{suffix} must lie in (0, 1), got {delta}"
                )));
            }
            if !(e0.is_finite() && e0 > 0.0) {
                return Err(ControlError::config(format!(
                    "dead_zone_e0_{suffix} must be positive, got {e0}"
                )));
            }
        }
        Ok(DeadZone {
            enabled: config.enabled,
            delta,
            e0,
        })
    };
    Ok((
        check(config.delta_tran, config.e0_tran, "tran")?,
        check(config.delta_rot, config.e0_rot, "rot")?,
    ))
}

/// Projection ellipsoids of one loop, sized for `NX` states
pub(crate) fn loop_ellipsoids<const NX: usize>(
    config: &LoopEllipsoidsConfig,
    suffix: &str,
) -> Result<LoopEllipsoids> {
    Ok(LoopEllipsoids {
        k_x: Ellipsoid::from_config(&config.k_x, NX * 3, &format!("k_x_{suffix}"))?,
        k_r: Ellipsoid::from_config(&config.k_r, 9, &format!("k_r_{suffix}"))?,
        theta: Ellipsoid::from_config(&config.theta, 18, &format!("theta_{suffix}"))?,
        k_g: Ellipsoid::from_config(&config.k_g, NX * 3, &format!("k_g_{suffix}"))?,
    })
}

/// Non-negative finite leakage coefficient
pub(crate) fn sigma(value: f64, name: &str) -> Result<f64> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(ControlError::config(format!("{name} must be non-negative, got {value}")));
    }
    Ok(value)
}

/// Adaptation rates must be symmetric positive definite
pub(crate) fn rate_matrix<const N: usize>(m: &ScaledMatrix, name: &str) -> Result<SMatrix<f64, N, N>> {
    let gamma = m.to_fixed::<N, N>(name)?;
    let dynamic = nalgebra::DMatrix::from_column_slice(N, N, gamma.as_slice());
    if !crate::math::is_positive_definite(&dynamic) {
        return Err(ControlError::config(format!("{name} must be symmetric positive definite")));
    }
    Ok(gamma)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_zone_validation_names_field() {
        let config = DeadZoneConfig {
            delta_rot: 1.2,
            ..Default::default()
        };
        let err = dead_zones(&config).unwrap_err();
        assert!(err.to_string().contains("dead_zone_delta_rot"));

        let config = DeadZoneConfig {
            e0_tran: 0.0,
            ..Default::default()
        };
        let err = dead_zones(&config).unwrap_err();
        assert!(err.to_string().contains("dead_zone_e0_tran"));
    }

    #[test]
    fn test_disabled_dead_zone_skips_validation() {
        let config = DeadZoneConfig {
            enabled: false,
            delta_tran: 5.0,
            ..Default::default()
        };
        let (tran, _) = dead_zones(&config).unwrap();
        assert!(!tran.enabled);
    }

    #[test]
    fn test_rate_matrix_requires_positive_definite() {
        let gamma = ScaledMatrix::identity(-1.0, 3);
        let err = rate_matrix::<3>(&gamma, "gamma_r_tran").unwrap_err();
        assert!(err.to_string().contains("gamma_r_tran"));
    }

    #[test]
    fn test_loop_ellipsoid_sizes_checked() {
        let config = crate::config::ProjectionConfig::default();
        assert!(loop_ellipsoids::<6>(&config.tran, "tran").is_ok());
        assert!(matches!(
            loop_ellipsoids::<3>(&config.tran, "tran"),
            Err(ControlError::ShapeMismatch { .. })
        ));
    }
}

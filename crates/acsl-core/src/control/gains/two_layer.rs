//! Two-layer MRAC gains
//!
//! The reference-model poles are shifted left (by twice the slowest real
//! part for translation, once for rotation) to obtain transient dynamics
//! `A - B_ref·K`. Every adaptive law of this variant is weighted by the
//! Lyapunov solution of the transient matrix.

use log::{debug, info};
use nalgebra::{Matrix3, Matrix6};

use super::{rate_matrix, sigma, MracGains};
use crate::config::ControllerConfig;
use crate::control::state::two_layer_layout;
use crate::error::Result;
use crate::math::{rotational_transient, solve_lyapunov_fixed, translational_transient, TransientDynamics};
use crate::vehicle::VehicleParams;

/// Pole shift factor of the translational transient dynamics
pub const TRANSLATIONAL_SHIFT_MULTIPLIER: f64 = 2.0;
/// Pole shift factor of the rotational transient dynamics
pub const ROTATIONAL_SHIFT_MULTIPLIER: f64 = 1.0;

/// Gains of the two-layer MRAC controller
#[derive(Debug, Clone)]
pub struct TwoLayerGains {
    /// MRAC gains with transient weighting and second-layer rates installed
    pub core: MracGains,
    pub transient_tran: TransientDynamics<6, 3>,
    pub transient_rot: TransientDynamics<3, 3>,
    /// Solution of A_trᵀP + P A_tr = -Q (translational)
    pub p_transient_tran: Matrix6<f64>,
    /// Solution of A_trᵀP + P A_tr = -Q (rotational)
    pub p_transient_rot: Matrix3<f64>,
}

impl TwoLayerGains {
    pub const NUMBER_OF_STATES: usize = two_layer_layout::NUMBER_OF_STATES;

    pub fn new(vehicle: VehicleParams, config: &ControllerConfig) -> Result<Self> {
        let two_layer = &config.two_layer;
        let mut core = MracGains::from_parts(vehicle, config, &two_layer.mrac)?;

        let transient_tran = translational_transient(
            &core.baseline.kp_tran,
            &core.baseline.kd_tran,
            core.vehicle.mass,
            TRANSLATIONAL_SHIFT_MULTIPLIER,
        );
        let transient_rot = rotational_transient(
            &core.rot.a_plant,
            &core.rot.a_ref,
            &core.rot.b_ref,
            ROTATIONAL_SHIFT_MULTIPLIER,
            "rotational transient dynamics",
        )?;
        debug!(
            "transient pole shifts: translational {:.4}, rotational {:.4}",
            transient_tran.shift, transient_rot.shift
        );

        let p_transient_tran = solve_lyapunov_fixed(
            &transient_tran.a_transient,
            &core.tran.q,
            "translational transient dynamics",
        )?;
        let p_transient_rot = solve_lyapunov_fixed(
            &transient_rot.a_transient,
            &core.rot.q,
            "rotational transient dynamics",
        )?;

        let second = &two_layer.second_layer;
        core.adaptive_tran.p = p_transient_tran;
        core.adaptive_tran.gamma_g = Some(rate_matrix::<6>(&second.gamma_g_tran, "gamma_g_tran")?);
        core.adaptive_tran.sigma_g = sigma(second.sigma_g_tran, "sigma_g_tran")?;

        core.adaptive_rot.p = p_transient_rot;
        core.adaptive_rot.gamma_g = Some(rate_matrix::<3>(&second.gamma_g_rot, "gamma_g_rot")?);
        core.adaptive_rot.sigma_g = sigma(second.sigma_g_rot, "sigma_g_rot")?;

        info!("loaded TwoLayerMRAC gains ({} motors)", core.vehicle.motor_count());
        Ok(Self {
            core,
            transient_tran,
            transient_rot,
            p_transient_tran,
            p_transient_rot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScaledMatrix;
    use crate::math::min_real_eigenvalue;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn test_transient_poles_faster_than_reference() {
        let gains = TwoLayerGains::new(VehicleParams::default(), &ControllerConfig::default()).unwrap();

        let a_ref = DMatrix::from_column_slice(6, 6, gains.core.tran.a_ref.as_slice());
        let a_tr = DMatrix::from_column_slice(6, 6, gains.transient_tran.a_transient.as_slice());
        let min_ref = min_real_eigenvalue(&a_ref);
        assert_relative_eq!(
            min_real_eigenvalue(&a_tr),
            min_ref + TRANSLATIONAL_SHIFT_MULTIPLIER * min_ref,
            epsilon = 1e-6
        );

        // Default K_P_omega_ref = diag(30, 30, 15): rotational poles shifted by -30
        assert_relative_eq!(gains.transient_rot.shift, -30.0, epsilon = 1e-9);
        assert_relative_eq!(
            gains.transient_rot.a_transient,
            Matrix3::from_diagonal(&nalgebra::Vector3::new(-60.0, -60.0, -45.0)),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_adaptive_laws_use_transient_weighting() {
        let gains = TwoLayerGains::new(VehicleParams::default(), &ControllerConfig::default()).unwrap();

        assert_eq!(gains.core.adaptive_tran.p, gains.p_transient_tran);
        assert_eq!(gains.core.adaptive_rot.p, gains.p_transient_rot);
        assert!(gains.core.adaptive_tran.gamma_g.is_some());
        assert!(gains.core.adaptive_rot.gamma_g.is_some());

        let a = gains.transient_tran.a_transient;
        let p = gains.p_transient_tran;
        let residual = a.transpose() * p + p * a + gains.core.tran.q;
        assert_relative_eq!(residual, Matrix6::zeros(), epsilon = 1e-8);
    }

    #[test]
    fn test_second_layer_rates_validated() {
        let mut config = ControllerConfig::default();
        config.two_layer.second_layer.gamma_g_rot = ScaledMatrix::identity(1.0, 6);
        assert!(TwoLayerGains::new(VehicleParams::default(), &config).is_err());

        let mut config = ControllerConfig::default();
        config.two_layer.second_layer.sigma_g_tran = -0.1;
        let err = TwoLayerGains::new(VehicleParams::default(), &config).unwrap_err();
        assert!(err.to_string().contains("sigma_g_tran"));
    }
}

//! MRAC gains
//!
//! Translational plant `ẋ = A x + B u` with `x = [p; v]`, `A = [[0, I], [0, 0]]`,
//! `B = [0; I]` and reference model in companion form
//! `A_ref = [[0, I], [-KP, -KD]]`, `B_ref = [0; I/m]`.
//! Rotational plant `ω̇ = u` (`A = 0`, `B = I`) with reference model
//! `A_ref = -K_P_ω`, `B_ref = I`.

use log::{debug, info};
use nalgebra::{Matrix3, Matrix6, SMatrix};

use super::{dead_zones, loop_ellipsoids, matrix3, matrix6, rate_matrix, sigma, ReferenceFilters};
use crate::config::{BaselineGainsConfig, ControllerConfig, MracGainsConfig};
use crate::control::adaptive::LoopAdaptiveGains;
use crate::control::safety::SafetyMechanism;
use crate::control::state::mrac_layout;
use crate::error::Result;
use crate::math::{companion_matrix, solve_lyapunov_fixed};
use crate::vehicle::VehicleParams;

/// Baseline gains shared by both adaptive controllers
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineGains {
    pub kp_tran: Matrix3<f64>,
    pub kd_tran: Matrix3<f64>,
    pub ki_tran: Matrix3<f64>,
    pub kp_tran_pd: Matrix3<f64>,
    pub kd_tran_pd: Matrix3<f64>,
    pub kp_rot: Matrix3<f64>,
    pub ki_rot: Matrix3<f64>,
    pub kp_rot_pi: Matrix3<f64>,
    pub ki_rot_pi: Matrix3<f64>,
    pub k_p_omega_ref: Matrix3<f64>,
    pub k_i_omega_ref: Matrix3<f64>,
}

impl BaselineGains {
    pub fn from_config(config: &BaselineGainsConfig) -> Result<Self> {
        Ok(Self {
            kp_tran: matrix3(&config.kp_tran, "kp_tran")?,
            kd_tran: matrix3(&config.kd_tran, "kd_tran")?,
            ki_tran: matrix3(&config.ki_tran, "ki_tran")?,
            kp_tran_pd: matrix3(&config.kp_tran_pd_baseline, "kp_tran_pd_baseline")?,
            kd_tran_pd: matrix3(&config.kd_tran_pd_baseline, "kd_tran_pd_baseline")?,
            kp_rot: matrix3(&config.kp_rot, "kp_rot")?,
            ki_rot: matrix3(&config.ki_rot, "ki_rot")?,
            kp_rot_pi: matrix3(&config.kp_rot_pi_baseline, "kp_rot_pi_baseline")?,
            ki_rot_pi: matrix3(&config.ki_rot_pi_baseline, "ki_rot_pi_baseline")?,
            k_p_omega_ref: matrix3(&config.k_p_omega_ref, "k_p_omega_ref")?,
            k_i_omega_ref: matrix3(&config.k_i_omega_ref, "k_i_omega_ref")?,
        })
    }
}

/// Translational plant and reference model
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationalModel {
    pub a_plant: Matrix6<f64>,
    pub b_plant: SMatrix<f64, 6, 3>,
    pub a_ref: Matrix6<f64>,
    pub b_ref: SMatrix<f64, 6, 3>,
    pub q: Matrix6<f64>,
    /// Solution of A_refᵀP + P A_ref = -Q
    pub p_ref: Matrix6<f64>,
}

impl TranslationalModel {
    pub fn new(kp: &Matrix3<f64>, kd: &Matrix3<f64>, mass: f64, q: Matrix6<f64>) -> Result<Self> {
        let mut a_plant = Matrix6::zeros();
        a_plant.fixed_view_mut::<3, 3>(0, 3).copy_from(&Matrix3::identity());

        let mut b_plant = SMatrix::<f64, 6, 3>::zeros();
        b_plant.fixed_view_mut::<3, 3>(3, 0).copy_from(&Matrix3::identity());

        let a_ref = companion_matrix(kp, kd);
        let b_ref = b_plant / mass;
        let p_ref = solve_lyapunov_fixed(&a_ref, &q, "translational reference model")?;

        Ok(Self {
            a_plant,
            b_plant,
            a_ref,
            b_ref,
            q,
            p_ref,
        })
    }
}

/// Rotational plant and reference model
#[derive(Debug, Clone, PartialEq)]
pub struct RotationalModel {
    pub a_plant: Matrix3<f64>,
    pub b_plant: Matrix3<f64>,
    pub a_ref: Matrix3<f64>,
    pub b_ref: Matrix3<f64>,
    pub q: Matrix3<f64>,
    pub p_ref: Matrix3<f64>,
}

impl RotationalModel {
    pub fn new(k_p_omega_ref: &Matrix3<f64>, q: Matrix3<f64>) -> Result<Self> {
        let a_ref = -k_p_omega_ref;
        let p_ref = solve_lyapunov_fixed(&a_ref, &q, "rotational reference model")?;
        Ok(Self {
            a_plant: Matrix3::zeros(),
            b_plant: Matrix3::identity(),
            a_ref,
            b_ref: Matrix3::identity(),
            q,
            p_ref,
        })
    }
}

/// Gains of the classical MRAC controller
///
/// Also the core of the two-layer controller, which swaps in its transient
/// Lyapunov weighting and second-layer rates.
#[derive(Debug, Clone)]
pub struct MracGains {
    pub vehicle: VehicleParams,
    pub filters: ReferenceFilters,
    pub safety: SafetyMechanism,
    pub baseline: BaselineGains,
    pub tran: TranslationalModel,
    pub rot: RotationalModel,
    pub adaptive_tran: LoopAdaptiveGains<6>,
    pub adaptive_rot: LoopAdaptiveGains<3>,
}

impl MracGains {
    pub const NUMBER_OF_STATES: usize = mrac_layout::NUMBER_OF_STATES;

    pub fn new(vehicle: VehicleParams, config: &ControllerConfig) -> Result<Self> {
        let gains = Self::from_parts(vehicle, config, &config.mrac)?;
        info!("loaded MRAC gains ({} motors)", gains.vehicle.motor_count());
        Ok(gains)
    }

    /// Build from a specific MRAC block of the configuration
    pub(crate) fn from_parts(
        vehicle: VehicleParams,
        config: &ControllerConfig,
        mrac: &MracGainsConfig,
    ) -> Result<Self> {
        vehicle.validate()?;
        let baseline = BaselineGains::from_config(&mrac.baseline)?;
        let rates = &mrac.adaptive;

        let tran = TranslationalModel::new(
            &baseline.kp_tran,
            &baseline.kd_tran,
            vehicle.mass,
            matrix6(&rates.q_tran, "q_tran")?,
        )?;
        let rot = RotationalModel::new(&baseline.k_p_omega_ref, matrix3(&rates.q_rot, "q_rot")?)?;

        let (dead_zone_tran, dead_zone_rot) = dead_zones(&mrac.dead_zone)?;
        let emod = &mrac.e_modification;
        let projection = &mrac.projection;
        let (ellipsoids_tran, ellipsoids_rot) = if projection.enabled {
            (
                Some(loop_ellipsoids::<6>(&projection.tran, "tran")?),
                Some(loop_ellipsoids::<3>(&projection.rot, "rot")?),
            )
        } else {
            (None, None)
        };
        if let Some(ellipsoids) = &ellipsoids_tran {
            debug!(
                "translational projection epsilons: k_x {:.4}, k_r {:.4}, theta {:.4}",
                ellipsoids.k_x.epsilon, ellipsoids.k_r.epsilon, ellipsoids.theta.epsilon
            );
        }

        let adaptive_tran = LoopAdaptiveGains {
            gamma_x: rate_matrix::<6>(&rates.gamma_x_tran, "gamma_x_tran")?,
            gamma_r: rate_matrix::<3>(&rates.gamma_r_tran, "gamma_r_tran")?,
            gamma_theta: rate_matrix::<6>(&rates.gamma_theta_tran, "gamma_theta_tran")?,
            gamma_g: None,
            sigma_x: sigma(emod.sigma_x_tran, "sigma_x_tran")?,
            sigma_r: sigma(emod.sigma_r_tran, "sigma_r_tran")?,
            sigma_theta: sigma(emod.sigma_theta_tran, "sigma_theta_tran")?,
            sigma_g: 0.0,
            p: tran.p_ref,
            b: tran.b_plant,
            dead_zone: dead_zone_tran,
            e_modification: emod.enabled,
            projection: ellipsoids_tran,
        };
        let adaptive_rot = LoopAdaptiveGains {
            gamma_x: rate_matrix::<3>(&rates.gamma_x_rot, "gamma_x_rot")?,
            gamma_r: rate_matrix::<3>(&rates.gamma_r_rot, "gamma_r_rot")?,
            gamma_theta: rate_matrix::<6>(&rates.gamma_theta_rot, "gamma_theta_rot")?,
            gamma_g: None,
            sigma_x: sigma(emod.sigma_x_rot, "sigma_x_rot")?,
            sigma_r: sigma(emod.sigma_r_rot, "sigma_r_rot")?,
            sigma_theta: sigma(emod.sigma_theta_rot, "sigma_theta_rot")?,
            sigma_g: 0.0,
            p: rot.p_ref,
            b: rot.b_plant,
            dead_zone: dead_zone_rot,
            e_modification: emod.enabled,
            projection: ellipsoids_rot,
        };

        Ok(Self {
            filters: ReferenceFilters::from_config(&config.roll_filter, &config.pitch_filter)?,
            safety: SafetyMechanism::from_config(&mrac.safety)?,
            baseline,
            tran,
            rot,
            adaptive_tran,
            adaptive_rot,
            vehicle,
        })
    }
}

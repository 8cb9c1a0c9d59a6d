//! Controller configuration
//!
//! Plain serde structures describing every tunable value of the three
//! controllers. Gain matrices use a `{ scaling_factor, rows }` pair so that a
//! configuration file can keep a readable base matrix and a single scale.
//! Derived quantities (Lyapunov solutions, transient dynamics, ellipsoid
//! shapes) are computed from these structures in [`crate::control::gains`].

use nalgebra::{DMatrix, SMatrix};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// Matrix given as a scale times a row-major base matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledMatrix {
    /// Multiplies every entry of `rows`
    pub scaling_factor: f64,
    /// Row-major entries
    pub rows: Vec<Vec<f64>>,
}

impl ScaledMatrix {
    pub fn new(scaling_factor: f64, rows: Vec<Vec<f64>>) -> Self {
        Self { scaling_factor, rows }
    }

    /// Square diagonal matrix
    pub fn diagonal(scaling_factor: f64, diagonal: &[f64]) -> Self {
        let n = diagonal.len();
        let rows = (0..n)
            .map(|i| {
                let mut row = vec![0.0; n];
                row[i] = diagonal[i];
                row
            })
            .collect();
        Self { scaling_factor, rows }
    }

    /// Scaled identity of size n
    pub fn identity(scaling_factor: f64, n: usize) -> Self {
        Self::diagonal(scaling_factor, &vec![1.0; n])
    }

    /// Materialize as a dynamically sized matrix
    pub fn to_dmatrix(&self, name: &str) -> Result<DMatrix<f64>> {
        let nrows = self.rows.len();
        if nrows == 0 {
            return Err(ControlError::config(format!("{name}: matrix has no rows")));
        }
        let ncols = self.rows[0].len();
        if let Some(row) = self.rows.iter().find(|r| r.len() != ncols) {
            return Err(ControlError::shape(format!("{name}: row length"), ncols, row.len()));
        }
        if !self.scaling_factor.is_finite() {
            return Err(ControlError::config(format!("{name}: scaling factor must be finite")));
        }

        let entries: Vec<f64> = self.rows.iter().flatten().map(|v| v * self.scaling_factor).collect();
        if entries.iter().any(|v| !v.is_finite()) {
            return Err(ControlError::config(format!("{name}: entries must be finite")));
        }
        Ok(DMatrix::from_row_slice(nrows, ncols, &entries))
    }

    /// Materialize as a fixed-size matrix, checking the dimensions
    pub fn to_fixed<const R: usize, const C: usize>(&self, name: &str) -> Result<SMatrix<f64, R, C>> {
        let m = self.to_dmatrix(name)?;
        if m.nrows() != R {
            return Err(ControlError::shape(format!("{name}: rows"), R, m.nrows()));
        }
        if m.ncols() != C {
            return Err(ControlError::shape(format!("{name}: columns"), C, m.ncols()));
        }
        Ok(SMatrix::<f64, R, C>::from_column_slice(m.as_slice()))
    }
}

/// Second-order reference differentiator
///
/// Either built from a natural frequency and damping ratio or supplied as
/// explicit state-space matrices `ẋ = A x + B u`, `y = C x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DifferentiatorConfig {
    SecondOrder {
        /// Natural frequency [rad/s]
        natural_frequency: f64,
        /// Damping ratio [-]
        damping_ratio: f64,
    },
    StateSpace {
        /// Row-major 2 × 2 state matrix
        a: [[f64; 2]; 2],
        b: [f64; 2],
        c: [f64; 2],
    },
}

impl Default for DifferentiatorConfig {
    fn default() -> Self {
        DifferentiatorConfig::SecondOrder {
            natural_frequency: 40.0,
            damping_ratio: 0.8,
        }
    }
}

/// Outer-loop safety mechanism settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyConfig {
    pub enabled: bool,
    /// Minimum ‖mu‖ for the thrust sphere test
    pub sphere_epsilon: f64,
    /// Maximum total thrust [N]
    pub maximum_thrust: f64,
    /// Minimum denominator magnitude for the elliptic cone test
    pub elliptic_cone_epsilon: f64,
    /// Maximum roll angle [deg]
    pub maximum_roll_angle_deg: f64,
    /// Maximum pitch angle [deg]
    pub maximum_pitch_angle_deg: f64,
    /// Minimum |mu_z| for the free-fall plane test
    pub plane_epsilon: f64,
    /// Height of the free-fall plane as a fraction of the weight, in (0, 1)
    pub alpha_plane: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sphere_epsilon: 1e-3,
            maximum_thrust: 85.0, // [N]
            elliptic_cone_epsilon: 1e-3,
            maximum_roll_angle_deg: 30.0,
            maximum_pitch_angle_deg: 30.0,
            plane_epsilon: 1e-3,
            alpha_plane: 0.3,
        }
    }
}

/// Dead-zone modification of the adaptive laws
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadZoneConfig {
    pub enabled: bool,
    /// Slope parameter in (0, 1)
    pub delta_tran: f64,
    /// Error norm below which adaptation stops (scaled by delta)
    pub e0_tran: f64,
    pub delta_rot: f64,
    pub e0_rot: f64,
}

impl Default for DeadZoneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delta_tran: 0.1,
            e0_tran: 0.05,
            delta_rot: 0.1,
            e0_rot: 0.05,
        }
    }
}

/// e-modification leakage coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EModificationConfig {
    pub enabled: bool,
    pub sigma_x_tran: f64,
    pub sigma_r_tran: f64,
    pub sigma_theta_tran: f64,
    pub sigma_x_rot: f64,
    pub sigma_r_rot: f64,
    pub sigma_theta_rot: f64,
}

impl Default for EModificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sigma_x_tran: 0.1,
            sigma_r_tran: 0.1,
            sigma_theta_tran: 0.1,
            sigma_x_rot: 0.1,
            sigma_r_rot: 0.1,
            sigma_theta_rot: 0.1,
        }
    }
}

/// Ellipsoid bounding one adaptive matrix (flattened column-major)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EllipsoidConfig {
    /// Ellipsoid center
    pub center: Vec<f64>,
    /// Semi-axis lengths, one per entry
    pub semi_axes: Vec<f64>,
    /// Inner-set scaling in (0, 1)
    pub alpha: f64,
}

impl EllipsoidConfig {
    /// Ellipsoid centered at the origin with equal semi-axes
    pub fn uniform(len: usize, semi_axis: f64, alpha: f64) -> Self {
        Self {
            center: vec![0.0; len],
            semi_axes: vec![semi_axis; len],
            alpha,
        }
    }
}

/// Projection ellipsoids of one loop's adaptive matrices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopEllipsoidsConfig {
    pub k_x: EllipsoidConfig,
    pub k_r: EllipsoidConfig,
    pub theta: EllipsoidConfig,
    /// Only used by the two-layer controller
    pub k_g: EllipsoidConfig,
}

/// Projection operator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    pub enabled: bool,
    pub tran: LoopEllipsoidsConfig,
    pub rot: LoopEllipsoidsConfig,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tran: LoopEllipsoidsConfig {
                k_x: EllipsoidConfig::uniform(18, 20.0, 0.9),
                k_r: EllipsoidConfig::uniform(9, 20.0, 0.9),
                theta: EllipsoidConfig::uniform(18, 20.0, 0.9),
                k_g: EllipsoidConfig::uniform(18, 20.0, 0.9),
            },
            rot: LoopEllipsoidsConfig {
                k_x: EllipsoidConfig::uniform(9, 5.0, 0.9),
                k_r: EllipsoidConfig::uniform(9, 5.0, 0.9),
                theta: EllipsoidConfig::uniform(18, 5.0, 0.9),
                k_g: EllipsoidConfig::uniform(9, 5.0, 0.9),
            },
        }
    }
}

/// PID gains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidGainsConfig {
    pub kp_tran: ScaledMatrix,
    pub kd_tran: ScaledMatrix,
    pub ki_tran: ScaledMatrix,
    pub kp_rot: ScaledMatrix,
    pub kd_rot: ScaledMatrix,
    pub ki_rot: ScaledMatrix,
    pub safety: SafetyConfig,
}

impl Default for PidGainsConfig {
    fn default() -> Self {
        Self {
            kp_tran: ScaledMatrix::diagonal(1.0, &[3.0, 3.0, 5.0]),
            kd_tran: ScaledMatrix::diagonal(1.0, &[3.0, 3.0, 4.0]),
            ki_tran: ScaledMatrix::diagonal(1.0, &[0.2, 0.2, 0.5]),
            kp_rot: ScaledMatrix::diagonal(1.0, &[100.0, 100.0, 36.0]),
            kd_rot: ScaledMatrix::diagonal(1.0, &[20.0, 20.0, 12.0]),
            ki_rot: ScaledMatrix::diagonal(1.0, &[5.0, 5.0, 2.0]),
            safety: SafetyConfig::default(),
        }
    }
}

/// Baseline gains shared by both adaptive controllers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineGainsConfig {
    /// Reference model translational gains
    pub kp_tran: ScaledMatrix,
    pub kd_tran: ScaledMatrix,
    pub ki_tran: ScaledMatrix,
    /// PD baseline around the reference model
    pub kp_tran_pd_baseline: ScaledMatrix,
    pub kd_tran_pd_baseline: ScaledMatrix,
    /// Attitude loop producing the angular velocity command
    pub kp_rot: ScaledMatrix,
    pub ki_rot: ScaledMatrix,
    /// PI baseline around the rotational reference model
    pub kp_rot_pi_baseline: ScaledMatrix,
    pub ki_rot_pi_baseline: ScaledMatrix,
    /// Rotational reference model
    pub k_p_omega_ref: ScaledMatrix,
    pub k_i_omega_ref: ScaledMatrix,
}

impl Default for BaselineGainsConfig {
    fn default() -> Self {
        Self {
            kp_tran: ScaledMatrix::diagonal(1.0, &[4.0, 4.0, 9.0]),
            kd_tran: ScaledMatrix::diagonal(1.0, &[5.0, 5.0, 10.0]),
            ki_tran: ScaledMatrix::diagonal(1.0, &[0.5, 0.5, 1.0]),
            kp_tran_pd_baseline: ScaledMatrix::diagonal(1.0, &[6.0, 6.0, 12.0]),
            kd_tran_pd_baseline: ScaledMatrix::diagonal(1.0, &[6.0, 6.0, 12.0]),
            kp_rot: ScaledMatrix::diagonal(1.0, &[8.0, 8.0, 4.0]),
            ki_rot: ScaledMatrix::diagonal(1.0, &[0.5, 0.5, 0.2]),
            kp_rot_pi_baseline: ScaledMatrix::diagonal(1.0, &[30.0, 30.0, 15.0]),
            ki_rot_pi_baseline: ScaledMatrix::diagonal(1.0, &[2.0, 2.0, 1.0]),
            k_p_omega_ref: ScaledMatrix::diagonal(1.0, &[30.0, 30.0, 15.0]),
            k_i_omega_ref: ScaledMatrix::diagonal(1.0, &[5.0, 5.0, 2.0]),
        }
    }
}

/// Adaptation rates and Lyapunov weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveRatesConfig {
    /// 6 × 6
    pub gamma_x_tran: ScaledMatrix,
    /// 3 × 3
    pub gamma_r_tran: ScaledMatrix,
    /// 6 × 6
    pub gamma_theta_tran: ScaledMatrix,
    /// 3 × 3
    pub gamma_x_rot: ScaledMatrix,
    /// 3 × 3
    pub gamma_r_rot: ScaledMatrix,
    /// 6 × 6
    pub gamma_theta_rot: ScaledMatrix,
    /// 6 × 6
    pub q_tran: ScaledMatrix,
    /// 3 × 3
    pub q_rot: ScaledMatrix,
}

impl Default for AdaptiveRatesConfig {
    fn default() -> Self {
        Self {
            gamma_x_tran: ScaledMatrix::identity(0.5, 6),
            gamma_r_tran: ScaledMatrix::identity(0.5, 3),
            gamma_theta_tran: ScaledMatrix::identity(0.1, 6),
            gamma_x_rot: ScaledMatrix::identity(0.5, 3),
            gamma_r_rot: ScaledMatrix::identity(0.5, 3),
            gamma_theta_rot: ScaledMatrix::identity(0.1, 6),
            q_tran: ScaledMatrix::identity(1.0, 6),
            q_rot: ScaledMatrix::identity(1.0, 3),
        }
    }
}

/// MRAC gains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MracGainsConfig {
    pub baseline: BaselineGainsConfig,
    pub adaptive: AdaptiveRatesConfig,
    pub safety: SafetyConfig,
    pub dead_zone: DeadZoneConfig,
    pub e_modification: EModificationConfig,
    pub projection: ProjectionConfig,
}

/// Second adaptive layer of the two-layer controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondLayerConfig {
    /// 6 × 6
    pub gamma_g_tran: ScaledMatrix,
    /// 3 × 3
    pub gamma_g_rot: ScaledMatrix,
    pub sigma_g_tran: f64,
    pub sigma_g_rot: f64,
}

impl Default for SecondLayerConfig {
    fn default() -> Self {
        Self {
            gamma_g_tran: ScaledMatrix::identity(0.2, 6),
            gamma_g_rot: ScaledMatrix::identity(0.2, 3),
            sigma_g_tran: 0.1,
            sigma_g_rot: 0.1,
        }
    }
}

/// Two-layer MRAC gains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TwoLayerGainsConfig {
    pub mrac: MracGainsConfig,
    pub second_layer: SecondLayerConfig,
}

/// Complete controller configuration
///
/// The reference differentiators are shared by all variants; each variant
/// reads only its own gains block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ControllerConfig {
    pub roll_filter: DifferentiatorConfig,
    pub pitch_filter: DifferentiatorConfig,
    pub pid: PidGainsConfig,
    pub mrac: MracGainsConfig,
    pub two_layer: TwoLayerGainsConfig,
}

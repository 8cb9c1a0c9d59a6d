//! Adaptive law engine
//!
//! Parameter-estimate derivatives for the MRAC family:
//!
//! K̂̇ = (±Γ) · μ · (π · eᵀPB - σ ‖eᵀPB‖ K̂)
//!
//! where π is the regressor (state, command, augmented regressor or tracking
//! error), μ the dead-zone modulation and σ the e-modification leakage.
//! State and command gains adapt with a negative rate, the regressor weights
//! Θ̂ with a positive one.
//!
//! References: Lavretsky & Wise, "Robust and Adaptive Control", Sec. 11.2.

use nalgebra::{RowVector3, SMatrix, SVector, Vector3};
use serde::Serialize;

use super::projection::{project_matrix, Ellipsoid};
use crate::error::Result;

/// Sign of an adaptation rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LawSign {
    Negative,
    Positive,
}

impl LawSign {
    pub fn factor(self) -> f64 {
        match self {
            LawSign::Negative => -1.0,
            LawSign::Positive => 1.0,
        }
    }
}

/// Dead-zone parameters of one loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeadZone {
    pub enabled: bool,
    /// Slope parameter, 0 < delta < 1
    pub delta: f64,
    /// Threshold, e0 > 0
    pub e0: f64,
}

impl DeadZone {
    /// Modulation factor μ ∈ [0, 1]
    ///
    /// μ = clamp((‖e‖ - δe₀)/((1-δ)e₀), 0, 1), or 1 when disabled.
    pub fn modulation(&self, error_norm: f64) -> f64 {
        if !self.enabled {
            return 1.0;
        }
        let coefficient = (error_norm - self.delta * self.e0) / ((1.0 - self.delta) * self.e0);
        coefficient.clamp(0.0, 1.0)
    }
}

/// eᵀPB and its Euclidean norm
pub fn e_transpose_pb<const N: usize>(
    e: &SVector<f64, N>,
    p: &SMatrix<f64, N, N>,
    b: &SMatrix<f64, N, 3>,
) -> (RowVector3<f64>, f64) {
    let e_t_pb = e.transpose() * p * b;
    let norm = e_t_pb.norm();
    (e_t_pb, norm)
}

/// One robust adaptive law
///
/// # Arguments
/// * `gamma` - Adaptation rate matrix Γ
/// * `sign` - Sign applied to Γ
/// * `regressor` - π
/// * `e_t_pb` - eᵀPB
/// * `modulation` - Dead-zone factor μ (1 when disabled)
/// * `leakage` - `Some(σ)` when e-modification is enabled
/// * `estimate` - Current estimate K̂
pub fn robust_adaptive_law<const R: usize>(
    gamma: &SMatrix<f64, R, R>,
    sign: LawSign,
    regressor: &SVector<f64, R>,
    e_t_pb: &RowVector3<f64>,
    modulation: f64,
    leakage: Option<f64>,
    estimate: &SMatrix<f64, R, 3>,
) -> SMatrix<f64, R, 3> {
    let classic = regressor * e_t_pb;
    let update = match leakage {
        Some(sigma) => classic - estimate * (sigma * e_t_pb.norm()),
        None => classic,
    };
    gamma * update * (sign.factor() * modulation)
}

/// Adaptive estimates of one loop (or their time derivatives)
///
/// `NX` is the loop's state dimension: 6 translational, 3 rotational.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveEstimates<const NX: usize> {
    pub k_x: SMatrix<f64, NX, 3>,
    pub k_r: SMatrix<f64, 3, 3>,
    pub theta: SMatrix<f64, 6, 3>,
    /// Second-layer gain, two-layer controller only
    pub k_g: Option<SMatrix<f64, NX, 3>>,
}

impl<const NX: usize> AdaptiveEstimates<NX> {
    pub fn zeros(two_layer: bool) -> Self {
        Self {
            k_x: SMatrix::zeros(),
            k_r: SMatrix::zeros(),
            theta: SMatrix::zeros(),
            k_g: two_layer.then(|| SMatrix::zeros()),
        }
    }

    /// Adaptive control input K̂xᵀx + K̂rᵀr - Θ̂ᵀΦ (+ K̂gᵀe)
    pub fn control_input(
        &self,
        x: &SVector<f64, NX>,
        r: &Vector3<f64>,
        phi: &SVector<f64, 6>,
        e: &SVector<f64, NX>,
    ) -> Vector3<f64> {
        let mut u = self.k_x.transpose() * x + self.k_r.transpose() * r - self.theta.transpose() * phi;
        if let Some(k_g) = &self.k_g {
            u += k_g.transpose() * e;
        }
        u
    }
}

/// Projection activation per adaptive block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectionFlags {
    pub k_x: bool,
    pub k_r: bool,
    pub theta: bool,
    pub k_g: bool,
}

impl ProjectionFlags {
    pub fn any(&self) -> bool {
        self.k_x || self.k_r || self.theta || self.k_g
    }
}

/// Projection ellipsoids of one loop
#[derive(Debug, Clone)]
pub struct LoopEllipsoids {
    pub k_x: Ellipsoid,
    pub k_r: Ellipsoid,
    pub theta: Ellipsoid,
    pub k_g: Ellipsoid,
}

/// Adaptation gains of one loop
#[derive(Debug, Clone)]
pub struct LoopAdaptiveGains<const NX: usize> {
    pub gamma_x: SMatrix<f64, NX, NX>,
    pub gamma_r: SMatrix<f64, 3, 3>,
    pub gamma_theta: SMatrix<f64, 6, 6>,
    /// Second-layer rate, two-layer controller only
    pub gamma_g: Option<SMatrix<f64, NX, NX>>,
    pub sigma_x: f64,
    pub sigma_r: f64,
    pub sigma_theta: f64,
    pub sigma_g: f64,
    /// Lyapunov weighting used in eᵀPB
    pub p: SMatrix<f64, NX, NX>,
    /// Plant input matrix used in eᵀPB
    pub b: SMatrix<f64, NX, 3>,
    pub dead_zone: DeadZone,
    pub e_modification: bool,
    /// `Some` when the projection operator is enabled
    pub projection: Option<LoopEllipsoids>,
}

/// Regressors driving one loop's adaptive laws
#[derive(Debug, Clone, Copy)]
pub struct LoopRegressors<'a, const NX: usize> {
    /// Plant state x
    pub x: &'a SVector<f64, NX>,
    /// Command input r
    pub r: &'a Vector3<f64>,
    /// Augmented regressor [baseline; Φ]
    pub phi: &'a SVector<f64, 6>,
    /// Tracking error e
    pub e: &'a SVector<f64, NX>,
}

/// Result of evaluating one loop's adaptive laws
#[derive(Debug, Clone, PartialEq)]
pub struct LoopAdaptation<const NX: usize> {
    pub derivatives: AdaptiveEstimates<NX>,
    pub dead_zone_value: f64,
    pub e_t_pb_norm: f64,
    pub projection: ProjectionFlags,
}

/// Evaluate every adaptive law of one loop, then project if enabled
pub fn update_loop<const NX: usize>(
    gains: &LoopAdaptiveGains<NX>,
    estimates: &AdaptiveEstimates<NX>,
    regressors: LoopRegressors<'_, NX>,
) -> Result<LoopAdaptation<NX>> {
    let (e_t_pb, e_t_pb_norm) = e_transpose_pb(regressors.e, &gains.p, &gains.b);
    let mu = gains.dead_zone.modulation(regressors.e.norm());
    let leak = |sigma: f64| gains.e_modification.then_some(sigma);

    let mut derivatives = AdaptiveEstimates {
        k_x: robust_adaptive_law(
            &gains.gamma_x,
            LawSign::Negative,
            regressors.x,
            &e_t_pb,
            mu,
            leak(gains.sigma_x),
            &estimates.k_x,
        ),
        k_r: robust_adaptive_law(
            &gains.gamma_r,
            LawSign::Negative,
            regressors.r,
            &e_t_pb,
            mu,
            leak(gains.sigma_r),
            &estimates.k_r,
        ),
        theta: robust_adaptive_law(
            &gains.gamma_theta,
            LawSign::Positive,
            regressors.phi,
            &e_t_pb,
            mu,
            leak(gains.sigma_theta),
            &estimates.theta,
        ),
        k_g: match (&gains.gamma_g, &estimates.k_g) {
            (Some(gamma_g), Some(k_g)) => Some(robust_adaptive_law(
                gamma_g,
                LawSign::Negative,
                regressors.e,
                &e_t_pb,
                mu,
                leak(gains.sigma_g),
                k_g,
            )),
            _ => None,
        },
    };

    let mut flags = ProjectionFlags::default();
    if let Some(ellipsoids) = &gains.projection {
        let (k_x_dot, active) = project_matrix(&estimates.k_x, &derivatives.k_x, &ellipsoids.k_x)?;
        derivatives.k_x = k_x_dot;
        flags.k_x = active;

        let (k_r_dot, active) = project_matrix(&estimates.k_r, &derivatives.k_r, &ellipsoids.k_r)?;
        derivatives.k_r = k_r_dot;
        flags.k_r = active;

        let (theta_dot, active) = project_matrix(&estimates.theta, &derivatives.theta, &ellipsoids.theta)?;
        derivatives.theta = theta_dot;
        flags.theta = active;

        if let (Some(k_g), Some(k_g_dot)) = (&estimates.k_g, &derivatives.k_g) {
            let (projected, active) = project_matrix(k_g, k_g_dot, &ellipsoids.k_g)?;
            derivatives.k_g = Some(projected);
            flags.k_g = active;
        }
    }

    Ok(LoopAdaptation {
        derivatives,
        dead_zone_value: mu,
        e_t_pb_norm,
        projection: flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{DVector, Matrix3, Matrix6, Vector6};

    fn dead_zone() -> DeadZone {
        DeadZone {
            enabled: true,
            delta: 0.2,
            e0: 1.0,
        }
    }

    #[test]
    fn test_dead_zone_regions() {
        let dz = dead_zone();
        assert_relative_eq!(dz.modulation(0.0), 0.0);
        assert_relative_eq!(dz.modulation(0.2), 0.0);
        assert_relative_eq!(dz.modulation(1.0), 1.0);
        assert_relative_eq!(dz.modulation(5.0), 1.0);

        let mid = dz.modulation(0.6);
        assert!(mid > 0.0 && mid < 1.0);
        assert_relative_eq!(mid, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_dead_zone_monotone() {
        let dz = dead_zone();
        let mut previous = -1.0;
        for i in 0..=120 {
            let value = dz.modulation(i as f64 * 0.01);
            assert!(value >= previous);
            previous = value;
        }
    }

    #[test]
    fn test_dead_zone_disabled() {
        let dz = DeadZone {
            enabled: false,
            ..dead_zone()
        };
        assert_relative_eq!(dz.modulation(0.0), 1.0);
    }

    #[test]
    fn test_e_transpose_pb_translational() {
        let e = Vector6::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let p = Matrix6::identity();
        let mut b = SMatrix::<f64, 6, 3>::zeros();
        b.fixed_view_mut::<3, 3>(3, 0).copy_from(&Matrix3::identity());

        let (e_t_pb, norm) = e_transpose_pb(&e, &p, &b);
        assert_relative_eq!(e_t_pb, RowVector3::new(4.0, 5.0, 6.0));
        assert_relative_eq!(norm, (16.0f64 + 25.0 + 36.0).sqrt());
    }

    #[test]
    fn test_classic_law_signs() {
        let gamma = Matrix3::identity() * 2.0;
        let regressor = Vector3::new(1.0, 0.0, 0.0);
        let e_t_pb = RowVector3::new(0.0, 3.0, 0.0);
        let estimate = Matrix3::zeros();

        let negative = robust_adaptive_law(&gamma, LawSign::Negative, &regressor, &e_t_pb, 1.0, None, &estimate);
        let positive = robust_adaptive_law(&gamma, LawSign::Positive, &regressor, &e_t_pb, 1.0, None, &estimate);

        assert_relative_eq!(negative[(0, 1)], -6.0);
        assert_relative_eq!(positive[(0, 1)], 6.0);
        assert_relative_eq!(negative.abs().sum(), 6.0);
    }

    #[test]
    fn test_e_modification_leakage() {
        let gamma = Matrix3::identity();
        let regressor = Vector3::zeros();
        let e_t_pb = RowVector3::new(3.0, 4.0, 0.0);
        let estimate = Matrix3::identity();

        // Zero regressor: only the leakage term remains, -(-σ‖eᵀPB‖K̂)
        let rate = robust_adaptive_law(&gamma, LawSign::Negative, &regressor, &e_t_pb, 1.0, Some(0.1), &estimate);
        assert_relative_eq!(rate, Matrix3::identity() * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_modulation_freezes_adaptation() {
        let gamma = Matrix3::identity();
        let regressor = Vector3::new(1.0, 2.0, 3.0);
        let e_t_pb = RowVector3::new(1.0, 1.0, 1.0);
        let rate = robust_adaptive_law(
            &gamma,
            LawSign::Positive,
            &regressor,
            &e_t_pb,
            0.0,
            Some(0.5),
            &Matrix3::identity(),
        );
        assert_relative_eq!(rate, Matrix3::zeros());
    }

    #[test]
    fn test_control_input_includes_second_layer() {
        let mut estimates = AdaptiveEstimates::<3>::zeros(true);
        estimates.k_x = Matrix3::identity();
        estimates.k_g = Some(Matrix3::identity() * 2.0);

        let x = Vector3::new(1.0, 0.0, 0.0);
        let e = Vector3::new(0.0, 1.0, 0.0);
        let u = estimates.control_input(&x, &Vector3::zeros(), &SVector::<f64, 6>::zeros(), &e);
        assert_relative_eq!(u, Vector3::new(1.0, 2.0, 0.0));

        let classic = AdaptiveEstimates::<3>::zeros(false);
        assert!(classic.k_g.is_none());
    }

    fn rotational_gains(projection: Option<LoopEllipsoids>) -> LoopAdaptiveGains<3> {
        LoopAdaptiveGains {
            gamma_x: Matrix3::identity(),
            gamma_r: Matrix3::identity(),
            gamma_theta: Matrix6::identity(),
            gamma_g: Some(Matrix3::identity()),
            sigma_x: 0.0,
            sigma_r: 0.0,
            sigma_theta: 0.0,
            sigma_g: 0.0,
            p: Matrix3::identity(),
            b: Matrix3::identity(),
            dead_zone: DeadZone {
                enabled: false,
                delta: 0.1,
                e0: 1.0,
            },
            e_modification: false,
            projection,
        }
    }

    #[test]
    fn test_update_loop_zero_error_gives_zero_rates() {
        let gains = rotational_gains(None);
        let estimates = AdaptiveEstimates::<3>::zeros(true);
        let x = Vector3::new(0.3, -0.2, 0.1);
        let r = Vector3::new(1.0, 1.0, 1.0);
        let phi = SVector::<f64, 6>::repeat(0.5);
        let e = Vector3::zeros();

        let out = update_loop(&gains, &estimates, LoopRegressors { x: &x, r: &r, phi: &phi, e: &e }).unwrap();
        assert_relative_eq!(out.derivatives.k_x, Matrix3::zeros());
        assert_relative_eq!(out.derivatives.theta, SMatrix::<f64, 6, 3>::zeros());
        assert_relative_eq!(out.derivatives.k_g.unwrap(), Matrix3::zeros());
        assert!(!out.projection.any());
    }

    #[test]
    fn test_update_loop_projection_flags() {
        let unit = |n: usize| Ellipsoid::new(DVector::zeros(n), &vec![1.0; n], 0.5).unwrap();
        let gains = rotational_gains(Some(LoopEllipsoids {
            k_x: unit(9),
            k_r: unit(9),
            theta: unit(18),
            k_g: unit(9),
        }));

        // K̂x sits on the outer boundary; its law pushes it further out
        let mut estimates = AdaptiveEstimates::<3>::zeros(true);
        estimates.k_x[(0, 0)] = -1.0;
        let x = Vector3::new(1.0, 0.0, 0.0);
        let e = Vector3::new(1.0, 0.0, 0.0);
        let r = Vector3::zeros();
        let phi = SVector::<f64, 6>::zeros();

        let out = update_loop(&gains, &estimates, LoopRegressors { x: &x, r: &r, phi: &phi, e: &e }).unwrap();
        assert!(out.projection.k_x);
        assert!(!out.projection.k_r);
        assert_relative_eq!(out.derivatives.k_x[(0, 0)], 0.0, epsilon = 1e-12);
    }
}

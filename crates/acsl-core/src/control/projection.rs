//! Ellipsoid projection operator
//!
//! Keeps adaptive parameter estimates bounded. The outer set is the ellipsoid
//! `(x - x_e)ᵀ S (x - x_e) ≤ 1`; the inner set is the same ellipsoid scaled by
//! `alpha = 1/sqrt(1 + epsilon)`. Between the two sets the component of the
//! update pointing outward is progressively removed.
//!
//! References: Lavretsky & Wise, "Robust and Adaptive Control", Sec. 11.4.

use nalgebra::{DMatrix, DVector, RowDVector, SMatrix};

use crate::config::EllipsoidConfig;
use crate::error::{ControlError, Result};

/// Ellipsoid constraint on a flattened parameter vector
#[derive(Debug, Clone)]
pub struct Ellipsoid {
    /// Center x_e
    pub center: DVector<f64>,
    /// Shape matrix S = diag(1/len_i²)
    pub shape: DMatrix<f64>,
    /// Margin between inner and outer set
    pub epsilon: f64,
}

impl Ellipsoid {
    /// Build from a center, semi-axis lengths and inner-set scale alpha
    pub fn new(center: DVector<f64>, semi_axes: &[f64], alpha: f64) -> Result<Self> {
        if semi_axes.len() != center.len() {
            return Err(ControlError::shape("ellipsoid semi-axes", center.len(), semi_axes.len()));
        }
        if semi_axes.iter().any(|a| !(a.is_finite() && *a > 0.0)) {
            return Err(ControlError::config("ellipsoid semi-axes must be positive"));
        }
        let epsilon = epsilon_from_alpha(alpha)?;
        Ok(Self {
            center,
            shape: shape_from_semi_axes(semi_axes),
            epsilon,
        })
    }

    /// Build from configuration, checking the flattened dimension
    pub fn from_config(config: &EllipsoidConfig, dimension: usize, name: &str) -> Result<Self> {
        if config.center.len() != dimension {
            return Err(ControlError::shape(format!("{name}: ellipsoid center"), dimension, config.center.len()));
        }
        if config.semi_axes.len() != dimension {
            return Err(ControlError::shape(
                format!("{name}: ellipsoid semi-axes"),
                dimension,
                config.semi_axes.len(),
            ));
        }
        Self::new(DVector::from_column_slice(&config.center), &config.semi_axes, config.alpha)
            .map_err(|e| match e {
                ControlError::Configuration(msg) => ControlError::config(format!("{name}: {msg}")),
                other => other,
            })
    }

    pub fn dimension(&self) -> usize {
        self.center.len()
    }

    /// Convex function h(x) and its gradient ∇h (row vector)
    ///
    /// h = ((1+ε)(x-x_e)ᵀS(x-x_e) - 1)/ε, ∇h = (2(1+ε)/ε)(x-x_e)ᵀS
    pub fn convex_function(&self, x: &DVector<f64>) -> Result<(f64, RowDVector<f64>)> {
        if x.len() != self.dimension() {
            return Err(ControlError::shape("projection vector", self.dimension(), x.len()));
        }
        let diff = x - &self.center;
        let diff_t_s = diff.transpose() * &self.shape;
        let quadratic = (&diff_t_s * &diff)[(0, 0)];

        let h = ((1.0 + self.epsilon) * quadratic - 1.0) / self.epsilon;
        let gradient = diff_t_s * (2.0 * (1.0 + self.epsilon) / self.epsilon);
        Ok((h, gradient))
    }
}

/// Shape matrix diag(1/len_i²) from semi-axis lengths
pub fn shape_from_semi_axes(semi_axes: &[f64]) -> DMatrix<f64> {
    let diagonal = DVector::from_iterator(semi_axes.len(), semi_axes.iter().map(|a| 1.0 / (a * a)));
    DMatrix::from_diagonal(&diagonal)
}

/// epsilon = 1/alpha² - 1, positive for 0 < alpha < 1
pub fn epsilon_from_alpha(alpha: f64) -> Result<f64> {
    let epsilon = 1.0 / (alpha * alpha) - 1.0;
    if !(alpha > 0.0 && alpha < 1.0 && epsilon.is_finite() && epsilon > 0.0) {
        return Err(ControlError::config(format!(
            "projection alpha must lie in (0, 1), got {alpha}"
        )));
    }
    Ok(epsilon)
}

/// Project the time derivative `x_dot` of a parameter vector `x`
///
/// Returns the (possibly modified) derivative and whether the projection
/// was active. Active iff h(x) > 0 and ∇h·ẋ > 0; then
/// `ẋ ← ẋ - h ∇hᵀ (∇h·ẋ) / (∇h ∇hᵀ)`.
pub fn project_vector(
    x: &DVector<f64>,
    x_dot: &DVector<f64>,
    ellipsoid: &Ellipsoid,
) -> Result<(DVector<f64>, bool)> {
    if x_dot.len() != x.len() {
        return Err(ControlError::shape("projection derivative", x.len(), x_dot.len()));
    }
    let (h, gradient) = ellipsoid.convex_function(x)?;
    let outward = (&gradient * x_dot)[(0, 0)];

    if h > 0.0 && outward > 0.0 {
        let denominator = gradient.norm_squared();
        let correction = gradient.transpose() * (h * outward / denominator);
        Ok((x_dot - correction, true))
    } else {
        Ok((x_dot.clone(), false))
    }
}

/// Project the derivative of a matrix-valued estimate
///
/// Both matrices are flattened column-major, projected as vectors and
/// reshaped back.
pub fn project_matrix<const R: usize, const C: usize>(
    estimate: &SMatrix<f64, R, C>,
    estimate_dot: &SMatrix<f64, R, C>,
    ellipsoid: &Ellipsoid,
) -> Result<(SMatrix<f64, R, C>, bool)> {
    if ellipsoid.dimension() != R * C {
        return Err(ControlError::shape("projection ellipsoid", R * C, ellipsoid.dimension()));
    }
    let x = DVector::from_column_slice(estimate.as_slice());
    let x_dot = DVector::from_column_slice(estimate_dot.as_slice());
    let (projected, active) = project_vector(&x, &x_dot, ellipsoid)?;
    Ok((SMatrix::<f64, R, C>::from_column_slice(projected.as_slice()), active))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;

    fn unit_ball(n: usize, alpha: f64) -> Ellipsoid {
        Ellipsoid::new(DVector::zeros(n), &vec![1.0; n], alpha).unwrap()
    }

    #[test]
    fn test_epsilon_from_alpha() {
        assert_relative_eq!(epsilon_from_alpha(0.5).unwrap(), 3.0, epsilon = 1e-12);
        assert!(epsilon_from_alpha(1.0).is_err());
        assert!(epsilon_from_alpha(0.0).is_err());
        assert!(epsilon_from_alpha(1.5).is_err());
    }

    #[test]
    fn test_shape_from_semi_axes() {
        let s = shape_from_semi_axes(&[2.0, 0.5]);
        assert_relative_eq!(s[(0, 0)], 0.25);
        assert_relative_eq!(s[(1, 1)], 4.0);
        assert_relative_eq!(s[(0, 1)], 0.0);
    }

    #[test]
    fn test_convex_function_boundaries() {
        let ell = unit_ball(2, 0.8);
        // h = 0 on the inner set boundary (radius alpha), 1 on the outer one
        let (h_inner, _) = ell.convex_function(&DVector::from_vec(vec![0.8, 0.0])).unwrap();
        let (h_outer, _) = ell.convex_function(&DVector::from_vec(vec![0.0, 1.0])).unwrap();
        assert_relative_eq!(h_inner, 0.0, epsilon = 1e-12);
        assert_relative_eq!(h_outer, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_identity_inside_inner_set() {
        let ell = unit_ball(3, 0.9);
        let x = DVector::from_vec(vec![0.1, -0.2, 0.3]);
        let x_dot = DVector::from_vec(vec![5.0, 5.0, 5.0]);

        let (projected, active) = project_vector(&x, &x_dot, &ell).unwrap();
        assert!(!active);
        assert_eq!(projected, x_dot);
    }

    #[test]
    fn test_identity_when_pointing_inward() {
        let ell = unit_ball(2, 0.5);
        let x = DVector::from_vec(vec![0.9, 0.0]);
        let x_dot = DVector::from_vec(vec![-1.0, 0.3]);

        let (projected, active) = project_vector(&x, &x_dot, &ell).unwrap();
        assert!(!active);
        assert_eq!(projected, x_dot);
    }

    #[test]
    fn test_outward_component_removed_on_outer_boundary() {
        let ell = unit_ball(2, 0.5);
        let x = DVector::from_vec(vec![1.0, 0.0]);
        let x_dot = DVector::from_vec(vec![2.0, 1.0]);

        let (projected, active) = project_vector(&x, &x_dot, &ell).unwrap();
        assert!(active);
        // h = 1 on the outer boundary: the normal component vanishes
        assert_relative_eq!(projected[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(projected[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_containment_under_constant_drift() {
        let ell = Ellipsoid::new(
            DVector::from_vec(vec![1.0, -1.0]),
            &[2.0, 0.5],
            0.7,
        )
        .unwrap();
        let drift = DVector::from_vec(vec![3.0, 4.0]);
        let mut x = ell.center.clone();
        let dt = 1e-3;

        let mut max_h = f64::NEG_INFINITY;
        for _ in 0..20_000 {
            let (x_dot, _) = project_vector(&x, &drift, &ell).unwrap();
            x += x_dot * dt;
            let (h, _) = ell.convex_function(&x).unwrap();
            max_h = max_h.max(h);
        }
        assert!(max_h <= 1.0 + 1e-2, "estimate left the outer set: h = {max_h}");
    }

    #[test]
    fn test_matrix_projection_column_major() {
        let ell = unit_ball(9, 0.5);
        // Only entry (2, 0) non-zero: flattened index 2 in column-major order
        let mut k = Matrix3::zeros();
        k[(2, 0)] = 1.0;
        let mut k_dot = Matrix3::zeros();
        k_dot[(2, 0)] = 1.0;
        k_dot[(0, 1)] = 0.5;

        let (projected, active) = project_matrix(&k, &k_dot, &ell).unwrap();
        assert!(active);
        assert_relative_eq!(projected[(2, 0)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(projected[(0, 1)], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_shape_mismatch() {
        let ell = unit_ball(4, 0.5);
        let k = Matrix3::zeros();
        let result = project_matrix(&k, &k, &ell);
        assert!(matches!(result, Err(ControlError::ShapeMismatch { .. })));

        let config = EllipsoidConfig::uniform(9, 1.0, 0.5);
        let result = Ellipsoid::from_config(&config, 18, "k_x_tran");
        assert!(matches!(result, Err(ControlError::ShapeMismatch { .. })));
    }
}

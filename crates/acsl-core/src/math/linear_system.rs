//! Linear-system utilities
//!
//! Continuous Lyapunov equation solver, positive-definiteness check,
//! eigenvalue helpers and the pole shifting used to build the transient
//! dynamics of the two-layer adaptive controller.

use nalgebra::{Cholesky, DMatrix, DVector, Matrix3, Matrix6, SMatrix};

use crate::error::{ControlError, Result};

/// Solve the continuous Lyapunov equation AᵀP + PA = -Q for P
///
/// Vectorizes the equation column-major,
/// `(I ⊗ Aᵀ + Aᵀ ⊗ I) · vec(P) = -vec(Q)`, and solves it with an LU
/// factorization. The result is symmetrized and must be positive definite,
/// which holds whenever A is Hurwitz and Q is positive definite.
///
/// # Arguments
/// * `a` - System matrix (n × n)
/// * `q` - Weighting matrix (n × n), symmetric positive definite
/// * `name` - Label used in error messages
pub fn solve_lyapunov(a: &DMatrix<f64>, q: &DMatrix<f64>, name: &str) -> Result<DMatrix<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(ControlError::shape(format!("{name}: A columns"), n, a.ncols()));
    }
    if q.nrows() != n || q.ncols() != n {
        return Err(ControlError::shape(format!("{name}: Q size"), n * n, q.len()));
    }

    let identity = DMatrix::<f64>::identity(n, n);
    let at = a.transpose();
    let lhs = identity.kronecker(&at) + at.kronecker(&identity);
    let rhs = -DVector::from_column_slice(q.as_slice());

    let vec_p = lhs.lu().solve(&rhs).ok_or_else(|| {
        ControlError::config(format!(
            "{name}: Lyapunov equation has no unique solution (A has eigenvalues summing to zero)"
        ))
    })?;

    let p = DMatrix::from_column_slice(n, n, vec_p.as_slice());
    let p = (&p + p.transpose()) * 0.5;

    if !is_positive_definite(&p) {
        return Err(ControlError::config(format!(
            "{name}: Lyapunov solution is not positive definite (reference model not Hurwitz?)"
        )));
    }

    Ok(p)
}

/// Fixed-size convenience wrapper around [`solve_lyapunov`]
pub fn solve_lyapunov_fixed<const N: usize>(
    a: &SMatrix<f64, N, N>,
    q: &SMatrix<f64, N, N>,
    name: &str,
) -> Result<SMatrix<f64, N, N>> {
    let a_dyn = DMatrix::from_column_slice(N, N, a.as_slice());
    let q_dyn = DMatrix::from_column_slice(N, N, q.as_slice());
    let p = solve_lyapunov(&a_dyn, &q_dyn, name)?;
    Ok(SMatrix::<f64, N, N>::from_column_slice(p.as_slice()))
}

/// Check symmetric positive definiteness via Cholesky factorization
pub fn is_positive_definite(m: &DMatrix<f64>) -> bool {
    if m.nrows() != m.ncols() {
        return false;
    }
    let symmetric = (m - m.transpose()).abs().max() <= 1e-9 * m.abs().max().max(1.0);
    symmetric && Cholesky::new(m.clone()).is_some()
}

/// Eigenvalues of a real square matrix as (real, imaginary) pairs
pub fn eigenvalues(m: &DMatrix<f64>) -> Vec<(f64, f64)> {
    m.complex_eigenvalues()
        .iter()
        .map(|c| (c.re, c.im))
        .collect()
}

/// Smallest real part among the eigenvalues of `m`
pub fn min_real_eigenvalue(m: &DMatrix<f64>) -> f64 {
    eigenvalues(m)
        .into_iter()
        .map(|(re, _)| re)
        .fold(f64::INFINITY, f64::min)
}

/// Result of shifting a reference model's poles to the left
#[derive(Debug, Clone)]
pub struct TransientDynamics<const N: usize, const M: usize> {
    /// Pole shift applied to every eigenvalue (negative)
    pub shift: f64,
    /// State feedback placing `A - B_ref·K` at the shifted poles
    pub feedback: SMatrix<f64, M, N>,
    /// Closed-loop transient matrix `A - B_ref·K`
    pub a_transient: SMatrix<f64, N, N>,
}

/// Transient dynamics for the translational double integrator
///
/// The reference model `[[0, I], [-KP, -KD]]` is in block companion form, so
/// shifting every root of `det(λ²I + λ·KD + KP)` by `s` gives another
/// companion matrix with
/// `KP' = KP - s·KD + s²·I` and `KD' = KD - 2s·I`.
/// With plant `A = [[0, I], [0, 0]]` and `B_ref = [0; I/m]` the feedback is
/// `K = m·[KP', KD']`.
///
/// # Arguments
/// * `kp`, `kd` - Reference-model gains
/// * `mass` - Estimated vehicle mass [kg]
/// * `multiplier` - Shift factor k in `s = k·min Re(λ)`
pub fn translational_transient(
    kp: &Matrix3<f64>,
    kd: &Matrix3<f64>,
    mass: f64,
    multiplier: f64,
) -> TransientDynamics<6, 3> {
    let a_ref = companion_matrix(kp, kd);
    let a_ref_dyn = DMatrix::from_column_slice(6, 6, a_ref.as_slice());
    let shift = multiplier * min_real_eigenvalue(&a_ref_dyn);

    let identity = Matrix3::identity();
    let kp_shifted = kp - kd * shift + identity * (shift * shift);
    let kd_shifted = kd - identity * (2.0 * shift);

    let mut feedback = SMatrix::<f64, 3, 6>::zeros();
    feedback.fixed_view_mut::<3, 3>(0, 0).copy_from(&(kp_shifted * mass));
    feedback.fixed_view_mut::<3, 3>(0, 3).copy_from(&(kd_shifted * mass));

    TransientDynamics {
        shift,
        feedback,
        a_transient: companion_matrix(&kp_shifted, &kd_shifted),
    }
}

/// Transient dynamics for the fully actuated rotational plant
///
/// With invertible `B_ref`, the feedback `K = B_ref⁻¹(A - (A_ref + s·I))`
/// places `A - B_ref·K` exactly at `A_ref + s·I`.
pub fn rotational_transient(
    a_plant: &Matrix3<f64>,
    a_ref: &Matrix3<f64>,
    b_ref: &Matrix3<f64>,
    multiplier: f64,
    name: &str,
) -> Result<TransientDynamics<3, 3>> {
    let a_ref_dyn = DMatrix::from_column_slice(3, 3, a_ref.as_slice());
    let shift = multiplier * min_real_eigenvalue(&a_ref_dyn);

    let a_desired = a_ref + Matrix3::identity() * shift;
    let b_inv = b_ref
        .try_inverse()
        .ok_or_else(|| ControlError::config(format!("{name}: B_ref is not invertible")))?;
    let feedback = b_inv * (a_plant - a_desired);

    Ok(TransientDynamics {
        shift,
        feedback,
        a_transient: a_plant - b_ref * feedback,
    })
}

/// Block companion matrix `[[0, I], [-KP, -KD]]`
pub fn companion_matrix(kp: &Matrix3<f64>, kd: &Matrix3<f64>) -> Matrix6<f64> {
    let mut a = Matrix6::zeros();
    a.fixed_view_mut::<3, 3>(0, 3).copy_from(&Matrix3::identity());
    a.fixed_view_mut::<3, 3>(3, 0).copy_from(&(-kp));
    a.fixed_view_mut::<3, 3>(3, 3).copy_from(&(-kd));
    a
}

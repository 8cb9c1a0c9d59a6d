//! Numerical integration methods
//!
//! Fixed-step Runge-Kutta 4th order (RK4) for fixed-size and dynamic state
//! vectors.

use nalgebra::{DVector, SVector};

/// Generic RK4 integrator for any fixed-size state vector
///
/// Solves dx/dt = f(t, x) using 4th-order Runge-Kutta method.
///
/// # Arguments
/// * `x` - Current state
/// * `t` - Current time
/// * `dt` - Time step
/// * `f` - Derivative function f(t, x) -> dx/dt
///
/// # Returns
/// New state after integration
pub fn rk4<const N: usize, F>(
    x: &SVector<f64, N>,
    t: f64,
    dt: f64,
    f: F,
) -> SVector<f64, N>
where
    F: Fn(f64, &SVector<f64, N>) -> SVector<f64, N>,
{
    let k1 = f(t, x);
    let k2 = f(t + dt / 2.0, &(x + k1 * dt / 2.0));
    let k3 = f(t + dt / 2.0, &(x + k2 * dt / 2.0));
    let k4 = f(t + dt, &(x + k3 * dt));

    x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}

/// RK4 integrator for dynamically sized state vectors
///
/// The controller states have a per-variant length fixed at construction
/// (10, 106 or 133 entries), so they are stored as `DVector`.
pub fn rk4_dyn<F>(x: &DVector<f64>, t: f64, dt: f64, f: F) -> DVector<f64>
where
    F: Fn(f64, &DVector<f64>) -> DVector<f64>,
{
    let k1 = f(t, x);
    let k2 = f(t + dt / 2.0, &(x + &k1 * (dt / 2.0)));
    let k3 = f(t + dt / 2.0, &(x + &k2 * (dt / 2.0)));
    let k4 = f(t + dt, &(x + &k3 * dt));

    x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_rk4_exponential_decay() {
        // dx/dt = -x, x(0) = 1  =>  x(t) = e^(-t)
        let mut x = SVector::<f64, 1>::new(1.0);
        let dt = 0.01;
        let mut t = 0.0;

        for _ in 0..100 {
            x = rk4(&x, t, dt, |_t, x| -x);
            t += dt;
        }

        assert_relative_eq!(x[0], (-1.0_f64).exp(), epsilon = 1e-9);
    }

    #[test]
    fn test_rk4_local_error_is_fifth_order() {
        // One step of exponential decay: local error ~ h^5 / 120.
        // Halving h must shrink the error by about 2^5 = 32.
        let step_error = |h: f64| {
            let x = rk4(&SVector::<f64, 1>::new(1.0), 0.0, h, |_t, x| -x);
            (x[0] - (-h).exp()).abs()
        };

        let e1 = step_error(0.1);
        let e2 = step_error(0.05);
        let ratio = e1 / e2;

        assert!(e1 < 1e-6);
        assert!(ratio > 28.0 && ratio < 36.0, "ratio = {ratio}");
    }

    #[test]
    fn test_rk4_dyn_matches_fixed_size() {
        let x_fixed = SVector::<f64, 2>::new(1.0, 0.0);
        let x_dyn = DVector::from_vec(vec![1.0, 0.0]);
        let dt = 0.001;

        let mut a = x_fixed;
        let mut b = x_dyn;
        let mut t = 0.0;
        let steps = (PI / 2.0 / dt) as usize;
        for _ in 0..steps {
            a = rk4(&a, t, dt, |_t, s| SVector::<f64, 2>::new(s[1], -s[0]));
            b = rk4_dyn(&b, t, dt, |_t, s| DVector::from_vec(vec![s[1], -s[0]]));
            t += dt;
        }

        assert_relative_eq!(a[0], b[0], epsilon = 1e-14);
        assert_relative_eq!(a[1], b[1], epsilon = 1e-14);
        assert_relative_eq!(b[1], -1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_rk4_dyn_frozen_derivative_is_single_euler_step() {
        // A derivative that ignores the stage state collapses all four
        // stages to the same slope: y + h * f.
        let y = DVector::from_vec(vec![1.0, -2.0, 3.0]);
        let slope = DVector::from_vec(vec![0.5, 0.25, -1.0]);
        let dt = 0.01;

        let next = rk4_dyn(&y, 0.0, dt, |_t, _y| slope.clone());

        assert_relative_eq!(next, &y + &slope * dt, epsilon = 1e-15);
    }
}

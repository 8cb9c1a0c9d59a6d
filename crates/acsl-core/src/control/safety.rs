//! Outer-loop safety mechanism
//!
//! Scales the raw translational command `mu` by `t ∈ [0, 1]` so that the
//! resulting thrust and attitude references respect:
//! - a maximum total thrust (sphere),
//! - maximum roll and pitch angles (elliptic cone),
//! - a minimum vertical thrust that prevents free fall (plane).
//!
//! Every test yields up to two candidate scales. Negative or undefined
//! candidates are discarded; the smallest remaining one, clamped to 1, wins.

use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::config::SafetyConfig;
use crate::error::{ControlError, Result};

/// Safety mechanism parameters (angles in radians)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyMechanism {
    pub enabled: bool,
    pub sphere_epsilon: f64,
    pub maximum_thrust: f64,
    pub elliptic_cone_epsilon: f64,
    pub maximum_roll_angle: f64,
    pub maximum_pitch_angle: f64,
    pub plane_epsilon: f64,
    pub alpha_plane: f64,
}

/// Outcome of one safety evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyResult {
    /// Scaled command t · mu
    pub mu: Vector3<f64>,
    /// Selected scale t
    pub scale: f64,
    pub sphere_active: bool,
    pub cone_active: bool,
    pub plane_active: bool,
}

impl SafetyResult {
    /// Command passed through unchanged
    pub fn passthrough(mu: Vector3<f64>) -> Self {
        Self {
            mu,
            scale: 1.0,
            sphere_active: false,
            cone_active: false,
            plane_active: false,
        }
    }

    pub fn saturated(&self) -> bool {
        self.sphere_active || self.cone_active || self.plane_active
    }
}

impl SafetyMechanism {
    /// Build from configuration, converting angles to radians
    pub fn from_config(config: &SafetyConfig) -> Result<Self> {
        let mechanism = Self {
            enabled: config.enabled,
            sphere_epsilon: config.sphere_epsilon,
            maximum_thrust: config.maximum_thrust,
            elliptic_cone_epsilon: config.elliptic_cone_epsilon,
            maximum_roll_angle: config.maximum_roll_angle_deg.to_radians(),
            maximum_pitch_angle: config.maximum_pitch_angle_deg.to_radians(),
            plane_epsilon: config.plane_epsilon,
            alpha_plane: config.alpha_plane,
        };
        if mechanism.enabled {
            mechanism.validate()?;
        }
        Ok(mechanism)
    }

    fn validate(&self) -> Result<()> {
        if !(self.alpha_plane > 0.0 && self.alpha_plane < 1.0) {
            return Err(ControlError::config("alpha_plane must lie in (0, 1)"));
        }
        if !(self.maximum_thrust > 0.0) {
            return Err(ControlError::config("maximum_thrust must be positive"));
        }
        let half_pi = std::f64::consts::FRAC_PI_2;
        for (name, angle) in [
            ("maximum_roll_angle_deg", self.maximum_roll_angle),
            ("maximum_pitch_angle_deg", self.maximum_pitch_angle),
        ] {
            if !(angle > 0.0 && angle < half_pi) {
                return Err(ControlError::config(format!("{name} must lie in (0, 90)")));
            }
        }
        for (name, eps) in [
            ("sphere_epsilon", self.sphere_epsilon),
            ("elliptic_cone_epsilon", self.elliptic_cone_epsilon),
            ("plane_epsilon", self.plane_epsilon),
        ] {
            if !(eps >= 0.0 && eps.is_finite()) {
                return Err(ControlError::config(format!("{name} must be non-negative")));
            }
        }
        Ok(())
    }

    /// Apply the mechanism to a raw command
    ///
    /// # Arguments
    /// * `mu_raw` - Raw translational command [N]
    /// * `weight` - Estimated vehicle weight m·g [N]
    pub fn apply(&self, mu_raw: &Vector3<f64>, weight: f64) -> SafetyResult {
        if !self.enabled {
            return SafetyResult::passthrough(*mu_raw);
        }

        let sphere = self.sphere_candidates(mu_raw, weight);
        let cone = self.cone_candidates(mu_raw, weight);
        let plane = self.plane_candidate(mu_raw, weight);

        let valid = |t: &f64| t.is_finite() && *t >= 0.0;
        let minimum = sphere
            .iter()
            .chain(cone.iter())
            .chain(std::iter::once(&plane))
            .copied()
            .filter(|t| valid(t))
            .fold(f64::INFINITY, f64::min);

        if !minimum.is_finite() || minimum >= 1.0 {
            return SafetyResult::passthrough(*mu_raw);
        }

        let selected = |candidates: &[f64]| candidates.iter().any(|t| valid(t) && *t == minimum);
        let result = SafetyResult {
            mu: mu_raw * minimum,
            scale: minimum,
            sphere_active: selected(&sphere),
            cone_active: selected(&cone),
            plane_active: selected(&[plane]),
        };
        debug!(
            "safety mechanism scaled outer-loop command by {:.4} (sphere: {}, cone: {}, plane: {})",
            result.scale, result.sphere_active, result.cone_active, result.plane_active
        );
        result
    }

    /// Intersections of t·mu with the maximum-thrust sphere
    fn sphere_candidates(&self, mu: &Vector3<f64>, weight: f64) -> [f64; 2] {
        let norm = mu.norm();
        if norm < self.sphere_epsilon || norm == 0.0 {
            return [f64::NAN; 2];
        }
        let a = mu.z * weight;
        let discriminant = a * a + norm * norm * (self.maximum_thrust.powi(2) - weight * weight);
        if discriminant < 0.0 {
            return [f64::NAN; 2];
        }
        let root = discriminant.sqrt();
        let n2 = norm * norm;
        [(a + root) / n2, (a - root) / n2]
    }

    /// Intersections of t·mu with the roll/pitch elliptic cone
    fn cone_candidates(&self, mu: &Vector3<f64>, weight: f64) -> [f64; 2] {
        let c = ((mu.x / self.maximum_pitch_angle.tan()).powi(2)
            + (mu.y / self.maximum_roll_angle.tan()).powi(2))
        .sqrt();

        let upper = mu.z + c;
        let lower = -mu.z + c;
        let t1 = if upper.abs() >= self.elliptic_cone_epsilon && upper != 0.0 {
            weight / upper
        } else {
            f64::NAN
        };
        let t2 = if lower.abs() >= self.elliptic_cone_epsilon && lower != 0.0 {
            -weight / lower
        } else {
            f64::NAN
        };
        [t1, t2]
    }

    /// Intersection of t·mu with the free-fall plane mu_z = alpha·m·g
    fn plane_candidate(&self, mu: &Vector3<f64>, weight: f64) -> f64 {
        if mu.z.abs() >= self.plane_epsilon && mu.z != 0.0 {
            self.alpha_plane * weight / mu.z
        } else {
            f64::NAN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const WEIGHT: f64 = 6.0 * crate::GRAVITY;

    fn mechanism() -> SafetyMechanism {
        SafetyMechanism::from_config(&SafetyConfig::default()).unwrap()
    }

    fn thrust_and_tilt(mu: &Vector3<f64>) -> (f64, f64, f64) {
        let vertical = WEIGHT - mu.z;
        let thrust = (mu.x * mu.x + mu.y * mu.y + vertical * vertical).sqrt();
        let roll = (mu.y / thrust).asin();
        let pitch = (-mu.x).atan2(vertical);
        (thrust, roll, pitch)
    }

    #[test]
    fn test_idempotent_without_violation() {
        let safety = mechanism();
        let mu = Vector3::new(2.0, -1.5, 3.0);
        let result = safety.apply(&mu, WEIGHT);

        assert_relative_eq!(result.scale, 1.0);
        assert_eq!(result.mu, mu);
        assert!(!result.saturated());
    }

    #[test]
    fn test_zero_command_passes_through() {
        let result = mechanism().apply(&Vector3::zeros(), WEIGHT);
        assert_relative_eq!(result.scale, 1.0);
        assert!(!result.saturated());
    }

    #[test]
    fn test_disabled_passes_through() {
        let config = SafetyConfig {
            enabled: false,
            ..Default::default()
        };
        let safety = SafetyMechanism::from_config(&config).unwrap();
        let mu = Vector3::new(500.0, 500.0, -500.0);
        let result = safety.apply(&mu, WEIGHT);
        assert_eq!(result.mu, mu);
        assert_relative_eq!(result.scale, 1.0);
    }

    #[test]
    fn test_roll_limit_activates_cone() {
        let safety = mechanism();
        let mu = Vector3::new(0.0, 300.0, 0.0);
        let result = safety.apply(&mu, WEIGHT);

        assert!(result.scale < 1.0);
        assert!(result.cone_active);

        let (_, roll, _) = thrust_and_tilt(&result.mu);
        assert_relative_eq!(roll, safety.maximum_roll_angle, epsilon = 1e-9);
    }

    #[test]
    fn test_thrust_limit_activates_sphere() {
        let safety = mechanism();
        // Strong climb command: mu_z very negative in NED
        let mu = Vector3::new(0.0, 0.0, -200.0);
        let result = safety.apply(&mu, WEIGHT);

        assert!(result.sphere_active);
        let (thrust, _, _) = thrust_and_tilt(&result.mu);
        assert_relative_eq!(thrust, safety.maximum_thrust, epsilon = 1e-9);
    }

    #[test]
    fn test_free_fall_limit_activates_plane() {
        let safety = mechanism();
        // Strong descent command: mu_z close to the weight
        let mu = Vector3::new(0.0, 0.0, 0.9 * WEIGHT);
        let result = safety.apply(&mu, WEIGHT);

        assert!(result.plane_active);
        assert_relative_eq!(result.mu.z, safety.alpha_plane * WEIGHT, epsilon = 1e-9);
    }

    #[test]
    fn test_scale_in_unit_interval_and_fixed_point() {
        let safety = mechanism();
        let commands = [
            Vector3::new(120.0, -40.0, 10.0),
            Vector3::new(-10.0, 90.0, -150.0),
            Vector3::new(0.0, 0.0, 55.0),
            Vector3::new(30.0, 30.0, -20.0),
        ];
        for mu in commands.iter() {
            let first = safety.apply(mu, WEIGHT);
            assert!(first.scale >= 0.0 && first.scale <= 1.0);

            let second = safety.apply(&first.mu, WEIGHT);
            assert_relative_eq!(second.scale, 1.0, epsilon = 1e-9);
            assert_relative_eq!(second.mu, first.mu, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_invalid_alpha_plane_rejected() {
        let config = SafetyConfig {
            alpha_plane: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            SafetyMechanism::from_config(&config),
            Err(ControlError::Configuration(_))
        ));
    }
}

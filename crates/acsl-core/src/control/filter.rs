//! Reference differentiators
//!
//! Second-order state-space filters `ẋ = A x + B u`, `y = C x` that turn the
//! roll and pitch references produced by the outer loop into smooth rate and
//! acceleration references for the inner loop.

use nalgebra::{Matrix2, RowVector2, Vector2};
use serde::{Deserialize, Serialize};

use crate::config::DifferentiatorConfig;
use crate::error::{ControlError, Result};

/// Output of one filter evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentiatorOutput {
    /// ẋ, integrated into the controller state
    pub state_dot: Vector2<f64>,
    /// C x
    pub rate: f64,
    /// C ẋ
    pub acceleration: f64,
}

/// Second-order differentiator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Differentiator {
    pub a: Matrix2<f64>,
    pub b: Vector2<f64>,
    pub c: RowVector2<f64>,
}

impl Differentiator {
    /// Filter with transfer function ω²s / (s² + 2ζωs + ω²)
    pub fn second_order(natural_frequency: f64, damping_ratio: f64) -> Result<Self> {
        if !(natural_frequency.is_finite() && natural_frequency > 0.0) {
            return Err(ControlError::config("differentiator natural_frequency must be positive"));
        }
        if !(damping_ratio.is_finite() && damping_ratio > 0.0) {
            return Err(ControlError::config("differentiator damping_ratio must be positive"));
        }
        let w2 = natural_frequency * natural_frequency;
        Ok(Self {
            a: Matrix2::new(
                0.0, 1.0,
                -w2, -2.0 * damping_ratio * natural_frequency,
            ),
            b: Vector2::new(0.0, w2),
            c: RowVector2::new(0.0, 1.0),
        })
    }

    pub fn from_config(config: &DifferentiatorConfig, name: &str) -> Result<Self> {
        let filter = match config {
            DifferentiatorConfig::SecondOrder {
                natural_frequency,
                damping_ratio,
            } => Self::second_order(*natural_frequency, *damping_ratio),
            DifferentiatorConfig::StateSpace { a, b, c } => Ok(Self {
                a: Matrix2::new(a[0][0], a[0][1], a[1][0], a[1][1]),
                b: Vector2::new(b[0], b[1]),
                c: RowVector2::new(c[0], c[1]),
            }),
        }
        .map_err(|e| match e {
            ControlError::Configuration(msg) => ControlError::config(format!("{name}: {msg}")),
            other => other,
        })?;

        if filter.a.iter().chain(filter.b.iter()).chain(filter.c.iter()).any(|v| !v.is_finite()) {
            return Err(ControlError::config(format!("{name}: filter matrices must be finite")));
        }
        Ok(filter)
    }

    /// Evaluate the filter at its current state for a given input
    pub fn evaluate(&self, state: &Vector2<f64>, input: f64) -> DifferentiatorOutput {
        let state_dot = self.a * state + self.b * input;
        DifferentiatorOutput {
            state_dot,
            rate: (self.c * state)[(0, 0)],
            acceleration: (self.c * state_dot)[(0, 0)],
        }
    }
}

impl Default for Differentiator {
    fn default() -> Self {
        let w = 40.0;
        let zeta = 0.8;
        Self {
            a: Matrix2::new(0.0, 1.0, -w * w, -2.0 * zeta * w),
            b: Vector2::new(0.0, w * w),
            c: RowVector2::new(0.0, 1.0),
        }
    }
}

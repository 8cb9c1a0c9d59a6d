//! Step context
//!
//! Every intermediate quantity of one control-law evaluation. A controller
//! replaces its context only after a complete, successful evaluation, so the
//! previous step stays readable after an error.

use nalgebra::{DVector, Vector2, Vector3, Vector4, Vector6};

use super::adaptive::LoopAdaptation;
use super::input::OdeInput;
use super::safety::SafetyResult;

/// Quantities shared by every controller variant
#[derive(Debug, Clone, PartialEq)]
pub struct StepContext {
    pub input: OdeInput,
    /// p - p_user
    pub position_error: Vector3<f64>,
    /// v - v_user
    pub velocity_error: Vector3<f64>,
    /// Translational command before the safety mechanism
    pub mu_raw: Vector3<f64>,
    pub safety: SafetyResult,
    /// Total thrust u1 [N]
    pub thrust: f64,
    pub roll_ref: f64,
    pub pitch_ref: f64,
    /// Time derivative of the roll differentiator state
    pub roll_filter_dot: Vector2<f64>,
    /// Time derivative of the pitch differentiator state
    pub pitch_filter_dot: Vector2<f64>,
    /// [roll, pitch, yaw] reference rates
    pub angular_ref_dot: Vector3<f64>,
    /// [roll, pitch, yaw] reference accelerations
    pub angular_ref_ddot: Vector3<f64>,
    /// [roll - roll_ref, pitch - pitch_ref, wrap(yaw - yaw_ref)]
    pub angular_error: Vector3<f64>,
    /// Euler angle rates J⁻¹ω
    pub angular_position_dot: Vector3<f64>,
    pub angular_error_dot: Vector3<f64>,
    /// Body moments [u2, u3, u4]
    pub moment: Vector3<f64>,
    /// [u1, u2, u3, u4]
    pub control_input: Vector4<f64>,
    pub motor_thrusts: DVector<f64>,
    /// `Some` for the adaptive variants
    pub adaptive: Option<AdaptiveContext>,
}

/// Quantities specific to the adaptive variants
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveContext {
    /// Plant state [p; v]
    pub x_tran: Vector6<f64>,
    pub x_ref_tran: Vector6<f64>,
    pub x_ref_tran_dot: Vector6<f64>,
    /// x_tran - x_ref_tran
    pub e_tran: Vector6<f64>,
    /// p_ref - p_user
    pub position_ref_error: Vector3<f64>,
    pub r_tran: Vector3<f64>,
    pub mu_pd_baseline: Vector3<f64>,
    /// -½ v_J ‖v_J‖
    pub drag_regressor: Vector3<f64>,
    pub mu_adaptive: Vector3<f64>,
    pub omega_ref: Vector3<f64>,
    pub omega_ref_dot: Vector3<f64>,
    /// ω - ω_ref
    pub e_rot: Vector3<f64>,
    pub omega_cmd: Vector3<f64>,
    pub omega_cmd_dot: Vector3<f64>,
    pub r_rot: Vector3<f64>,
    pub moment_baseline_pi: Vector3<f64>,
    /// ω × Iω
    pub moment_gyroscopic: Vector3<f64>,
    /// [ω_y ω_z, ω_x ω_z, ω_x ω_y]
    pub rotational_regressor: Vector3<f64>,
    pub moment_adaptive: Vector3<f64>,
    pub outer: LoopAdaptation<6>,
    pub inner: LoopAdaptation<3>,
}

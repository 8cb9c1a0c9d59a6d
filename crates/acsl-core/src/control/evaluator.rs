//! Control-law building blocks
//!
//! Geometry and kinematics shared by the three controllers: thrust and
//! attitude references from the translational command, reference
//! differentiation, Euler angle errors, drag and gyroscopic terms and
//! motor allocation. The evaluation of the adaptive controllers, common to
//! MRAC and two-layer MRAC, lives here as well.

use nalgebra::{Matrix3, Vector2, Vector3, Vector4, Vector6};

use super::adaptive::{update_loop, AdaptiveEstimates, LoopRegressors};
use super::context::{AdaptiveContext, StepContext};
use super::gains::{MracGains, ReferenceFilters};
use super::input::{OdeInput, TrajectoryState, VehicleState};
use super::safety::SafetyMechanism;
use super::state::{mrac_layout, two_layer_layout, ControlState};
use crate::error::{ControlError, Result};
use crate::math::{
    euler_rate_jacobian, euler_rate_jacobian_dot, euler_rate_jacobian_inverse, rotation_matrix_zyx,
    skew, wrap_to_pi,
};
use crate::vehicle::VehicleParams;

/// Smallest total thrust [N] for which an attitude reference is defined
pub const MIN_REFERENCE_THRUST: f64 = 1e-6;

/// Total thrust and roll/pitch references realizing the command `mu`
///
/// Returns `(u1, roll_ref, pitch_ref)`. Fails with `DegenerateThrust` when
/// `mu` cancels gravity and leaves no thrust direction.
pub fn thrust_and_attitude_reference(
    mu: &Vector3<f64>,
    mass: f64,
    gravity: f64,
    yaw: f64,
) -> Result<(f64, f64, f64)> {
    let vertical = mass * gravity - mu.z;
    let thrust = (mu.x * mu.x + mu.y * mu.y + vertical * vertical).sqrt();
    if !(thrust >= MIN_REFERENCE_THRUST) {
        return Err(ControlError::DegenerateThrust { thrust });
    }

    let (sin_yaw, cos_yaw) = yaw.sin_cos();
    let a = (-(mu.x * sin_yaw - mu.y * cos_yaw) / thrust).clamp(-1.0, 1.0);
    let roll_ref = a.atan2((1.0 - a * a).sqrt());
    let pitch_ref = (-(mu.x * cos_yaw + mu.y * sin_yaw)).atan2(vertical);

    Ok((thrust, roll_ref, pitch_ref))
}

/// Output of the roll/pitch reference differentiators
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularReference {
    pub roll_filter_dot: Vector2<f64>,
    pub pitch_filter_dot: Vector2<f64>,
    /// [roll, pitch, yaw] reference rates
    pub rate: Vector3<f64>,
    /// [roll, pitch, yaw] reference accelerations
    pub acceleration: Vector3<f64>,
}

/// Differentiate the roll/pitch references; yaw derivatives come from the trajectory
pub fn angular_reference_signals(
    filters: &ReferenceFilters,
    roll_state: &Vector2<f64>,
    pitch_state: &Vector2<f64>,
    roll_ref: f64,
    pitch_ref: f64,
    trajectory: &TrajectoryState,
) -> AngularReference {
    let roll = filters.roll.evaluate(roll_state, roll_ref);
    let pitch = filters.pitch.evaluate(pitch_state, pitch_ref);
    AngularReference {
        roll_filter_dot: roll.state_dot,
        pitch_filter_dot: pitch.state_dot,
        rate: Vector3::new(roll.rate, pitch.rate, trajectory.yaw_rate),
        acceleration: Vector3::new(roll.acceleration, pitch.acceleration, trajectory.yaw_acceleration),
    }
}

/// Euler angle error and its time derivative
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularError {
    pub error: Vector3<f64>,
    /// J⁻¹ω
    pub position_dot: Vector3<f64>,
    pub error_dot: Vector3<f64>,
}

/// Angular error with the yaw component wrapped to (-π, π]
///
/// Fails with `SingularAttitude` when the Euler-rate Jacobian cannot be
/// inverted.
pub fn angular_error_and_derivative(
    vehicle: &VehicleState,
    roll_ref: f64,
    pitch_ref: f64,
    yaw_ref: f64,
    reference_rate: &Vector3<f64>,
) -> Result<AngularError> {
    let error = Vector3::new(
        vehicle.roll - roll_ref,
        vehicle.pitch - pitch_ref,
        wrap_to_pi(vehicle.yaw - yaw_ref),
    );
    let position_dot = euler_rate_jacobian_inverse(vehicle.roll, vehicle.pitch)? * vehicle.angular_velocity;
    Ok(AngularError {
        error,
        position_dot,
        error_dot: position_dot - reference_rate,
    })
}

/// Inertial velocity expressed in the body frame, v_J = Rᵀv
pub fn body_velocity(vehicle: &VehicleState) -> Vector3<f64> {
    rotation_matrix_zyx(vehicle.roll, vehicle.pitch, vehicle.yaw).transpose() * vehicle.velocity
}

/// Drag regressor -½ v_J ‖v_J‖
pub fn drag_regressor(velocity_body: &Vector3<f64>) -> Vector3<f64> {
    velocity_body * (-0.5 * velocity_body.norm())
}

/// Inertial force cancelling the estimated aerodynamic drag
///
/// D_I = R · (½ ρ S C_d v_J ‖v_J‖)
pub fn drag_compensation(params: &VehicleParams, vehicle: &VehicleState) -> Vector3<f64> {
    let rotation = rotation_matrix_zyx(vehicle.roll, vehicle.pitch, vehicle.yaw);
    let v_body = rotation.transpose() * vehicle.velocity;
    let drag_body = params.drag_coefficient_matrix() * drag_regressor(&v_body)
        * (params.air_density * params.surface_area);
    // drag_body is the drag force itself; its inversion is the negative
    -(rotation * drag_body)
}

/// Rotational regressor [ω_y ω_z, ω_x ω_z, ω_x ω_y]
pub fn rotational_regressor(omega: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(omega.y * omega.z, omega.x * omega.z, omega.x * omega.y)
}

/// Gyroscopic moment ω × Iω
pub fn gyroscopic_moment(omega: &Vector3<f64>, inertia: &Matrix3<f64>) -> Vector3<f64> {
    skew(omega) * (inertia * omega)
}

/// Attitude references and errors derived from the safe command
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AttitudeStage {
    pub safety: super::safety::SafetyResult,
    pub thrust: f64,
    pub roll_ref: f64,
    pub pitch_ref: f64,
    pub reference: AngularReference,
    pub angular: AngularError,
}

/// Safety mechanism, thrust and attitude references, reference
/// differentiation and angular error, in that order
pub(crate) fn attitude_stage(
    input: &OdeInput,
    mu_raw: &Vector3<f64>,
    params: &VehicleParams,
    safety: &SafetyMechanism,
    filters: &ReferenceFilters,
    roll_state: &Vector2<f64>,
    pitch_state: &Vector2<f64>,
) -> Result<AttitudeStage> {
    let safety = safety.apply(mu_raw, params.weight());
    let (thrust, roll_ref, pitch_ref) =
        thrust_and_attitude_reference(&safety.mu, params.mass, params.gravity, input.trajectory.yaw)?;

    let reference = angular_reference_signals(
        filters,
        roll_state,
        pitch_state,
        roll_ref,
        pitch_ref,
        &input.trajectory,
    );
    let angular = angular_error_and_derivative(
        &input.vehicle,
        roll_ref,
        pitch_ref,
        input.trajectory.yaw,
        &reference.rate,
    )?;

    Ok(AttitudeStage {
        safety,
        thrust,
        roll_ref,
        pitch_ref,
        reference,
        angular,
    })
}

/// Read the adaptive estimates of both loops from the state
fn read_estimates(
    state: &ControlState,
    two_layer: bool,
) -> Result<(AdaptiveEstimates<6>, AdaptiveEstimates<3>)> {
    use mrac_layout::*;
    let (k_g_tran, k_g_rot) = if two_layer {
        (
            Some(state.matrix::<6, 3>(two_layer_layout::K_G_TRAN)?),
            Some(state.matrix::<3, 3>(two_layer_layout::K_G_ROT)?),
        )
    } else {
        (None, None)
    };
    let tran = AdaptiveEstimates {
        k_x: state.matrix::<6, 3>(K_X_TRAN)?,
        k_r: state.matrix::<3, 3>(K_R_TRAN)?,
        theta: state.matrix::<6, 3>(THETA_TRAN)?,
        k_g: k_g_tran,
    };
    let rot = AdaptiveEstimates {
        k_x: state.matrix::<3, 3>(K_X_ROT)?,
        k_r: state.matrix::<3, 3>(K_R_ROT)?,
        theta: state.matrix::<6, 3>(THETA_ROT)?,
        k_g: k_g_rot,
    };
    Ok((tran, rot))
}

/// Evaluate the MRAC-family control law
///
/// With `two_layer` set, the second-layer estimates K̂g are read from the
/// state and contribute K̂gᵀe to both loops. The gains must carry matching
/// second-layer rates.
pub(crate) fn evaluate_adaptive(
    gains: &MracGains,
    state: &ControlState,
    input: &OdeInput,
    two_layer: bool,
) -> Result<StepContext> {
    use mrac_layout::*;
    let vehicle = &input.vehicle;
    let trajectory = &input.trajectory;
    let params = &gains.vehicle;
    let baseline = &gains.baseline;
    let mass = params.mass;

    let roll_state: Vector2<f64> = state.vector(ROLL_FILTER)?;
    let pitch_state: Vector2<f64> = state.vector(PITCH_FILTER)?;
    let x_ref_tran: Vector6<f64> = state.vector(X_REF_TRAN)?;
    let integral_position_ref: Vector3<f64> = state.vector(INTEGRAL_POSITION_REF)?;
    let omega_ref: Vector3<f64> = state.vector(OMEGA_REF)?;
    let integral_e_rot: Vector3<f64> = state.vector(INTEGRAL_E_ROT)?;
    let integral_angular_error: Vector3<f64> = state.vector(INTEGRAL_ANGULAR_ERROR)?;
    let integral_omega_ref_cmd: Vector3<f64> = state.vector(INTEGRAL_OMEGA_REF_CMD)?;
    let (estimates_tran, estimates_rot) = read_estimates(state, two_layer)?;

    // Tracking errors
    let x_tran = Vector6::new(
        vehicle.position.x,
        vehicle.position.y,
        vehicle.position.z,
        vehicle.velocity.x,
        vehicle.velocity.y,
        vehicle.velocity.z,
    );
    let e_tran = x_tran - x_ref_tran;
    let omega = vehicle.angular_velocity;
    let e_rot = omega - omega_ref;
    let position_ref: Vector3<f64> = x_ref_tran.fixed_rows::<3>(0).into_owned();
    let velocity_ref: Vector3<f64> = x_ref_tran.fixed_rows::<3>(3).into_owned();

    // Outer loop
    let r_tran = (-baseline.ki_tran * integral_position_ref
        + trajectory.acceleration
        + baseline.kp_tran * trajectory.position
        + baseline.kd_tran * trajectory.velocity)
        * mass;
    let x_ref_tran_dot = gains.tran.a_ref * x_ref_tran + gains.tran.b_ref * r_tran;
    let velocity_ref_dot: Vector3<f64> = x_ref_tran_dot.fixed_rows::<3>(3).into_owned();

    let mu_pd_baseline = -(baseline.kp_tran_pd * (vehicle.position - position_ref)
        + baseline.kd_tran_pd * (vehicle.velocity - velocity_ref)
        - velocity_ref_dot)
        * mass;
    let drag = drag_regressor(&body_velocity(vehicle));
    let phi_tran = augmented(&mu_pd_baseline, &drag);

    let mu_adaptive = estimates_tran.control_input(&x_tran, &r_tran, &phi_tran, &e_tran);
    let mu_raw = mu_pd_baseline + mu_adaptive;

    let outer = update_loop(
        &gains.adaptive_tran,
        &estimates_tran,
        LoopRegressors {
            x: &x_tran,
            r: &r_tran,
            phi: &phi_tran,
            e: &e_tran,
        },
    )?;

    let stage = attitude_stage(
        input,
        &mu_raw,
        params,
        &gains.safety,
        &gains.filters,
        &roll_state,
        &pitch_state,
    )?;
    let angular = &stage.angular;
    let reference = &stage.reference;

    // Inner loop
    let jacobian = euler_rate_jacobian(vehicle.roll, vehicle.pitch);
    let jacobian_dot = euler_rate_jacobian_dot(
        vehicle.roll,
        vehicle.pitch,
        angular.position_dot.x,
        angular.position_dot.y,
    );
    let attitude_feedback =
        -baseline.kp_rot * angular.error - baseline.ki_rot * integral_angular_error + reference.rate;
    let omega_cmd = jacobian * attitude_feedback;
    let omega_cmd_dot = jacobian_dot * attitude_feedback
        + jacobian
            * (-baseline.kp_rot * angular.error_dot - baseline.ki_rot * angular.error + reference.acceleration);

    let omega_ref_dot = -baseline.k_p_omega_ref * (omega_ref - omega_cmd)
        - baseline.k_i_omega_ref * integral_omega_ref_cmd
        + omega_cmd_dot;
    let r_rot = baseline.k_p_omega_ref * omega_cmd - baseline.k_i_omega_ref * integral_omega_ref_cmd + omega_cmd_dot;

    let moment_baseline_pi =
        -(params.inertia * (baseline.kp_rot_pi * e_rot + baseline.ki_rot_pi * integral_e_rot - omega_ref_dot));
    let rotational = rotational_regressor(&omega);
    let phi_rot = augmented(&moment_baseline_pi, &rotational);

    let inner = update_loop(
        &gains.adaptive_rot,
        &estimates_rot,
        LoopRegressors {
            x: &omega,
            r: &r_rot,
            phi: &phi_rot,
            e: &e_rot,
        },
    )?;

    let moment_gyroscopic = gyroscopic_moment(&omega, &params.inertia);
    let moment_adaptive = estimates_rot.control_input(&omega, &r_rot, &phi_rot, &e_rot);
    let moment = moment_baseline_pi + moment_gyroscopic + moment_adaptive;

    let control_input = Vector4::new(stage.thrust, moment.x, moment.y, moment.z);
    let motor_thrusts = params.allocate(&control_input);

    Ok(StepContext {
        input: *input,
        position_error: vehicle.position - trajectory.position,
        velocity_error: vehicle.velocity - trajectory.velocity,
        mu_raw,
        safety: stage.safety,
        thrust: stage.thrust,
        roll_ref: stage.roll_ref,
        pitch_ref: stage.pitch_ref,
        roll_filter_dot: reference.roll_filter_dot,
        pitch_filter_dot: reference.pitch_filter_dot,
        angular_ref_dot: reference.rate,
        angular_ref_ddot: reference.acceleration,
        angular_error: angular.error,
        angular_position_dot: angular.position_dot,
        angular_error_dot: angular.error_dot,
        moment,
        control_input,
        motor_thrusts,
        adaptive: Some(AdaptiveContext {
            x_tran,
            x_ref_tran,
            x_ref_tran_dot,
            e_tran,
            position_ref_error: position_ref - trajectory.position,
            r_tran,
            mu_pd_baseline,
            drag_regressor: drag,
            mu_adaptive,
            omega_ref,
            omega_ref_dot,
            e_rot,
            omega_cmd,
            omega_cmd_dot,
            r_rot,
            moment_baseline_pi,
            moment_gyroscopic,
            rotational_regressor: rotational,
            moment_adaptive,
            outer,
            inner,
        }),
    })
}

/// Stack a baseline command and a regressor into [baseline; Φ]
fn augmented(baseline: &Vector3<f64>, regressor: &Vector3<f64>) -> Vector6<f64> {
    Vector6::new(
        baseline.x,
        baseline.y,
        baseline.z,
        regressor.x,
        regressor.y,
        regressor.z,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    const MASS: f64 = 6.0;
    const G: f64 = crate::GRAVITY;

    #[test]
    fn test_hover_command_gives_level_attitude() {
        let (thrust, roll, pitch) = thrust_and_attitude_reference(&Vector3::zeros(), MASS, G, 0.3).unwrap();
        assert_relative_eq!(thrust, MASS * G);
        assert_relative_eq!(roll, 0.0);
        assert_relative_eq!(pitch, 0.0);
    }

    #[test]
    fn test_lateral_command_tilts_vehicle() {
        // Push toward +y (east) at zero yaw: positive roll
        let mu = Vector3::new(0.0, 10.0, 0.0);
        let (thrust, roll, pitch) = thrust_and_attitude_reference(&mu, MASS, G, 0.0).unwrap();
        assert!(roll > 0.0);
        assert_relative_eq!(pitch, 0.0);
        assert_relative_eq!(roll.sin() * thrust, 10.0, epsilon = 1e-9);

        // Push toward +x (north) at zero yaw: nose down, negative pitch
        let mu = Vector3::new(10.0, 0.0, 0.0);
        let (_, roll, pitch) = thrust_and_attitude_reference(&mu, MASS, G, 0.0).unwrap();
        assert_relative_eq!(roll, 0.0);
        assert!(pitch < 0.0);
    }

    #[test]
    fn test_gravity_cancelling_command_rejected() {
        let mu = Vector3::new(0.0, 0.0, MASS * G);
        let result = thrust_and_attitude_reference(&mu, MASS, G, 0.0);
        assert!(matches!(result, Err(ControlError::DegenerateThrust { .. })));

        let nan = Vector3::new(f64::NAN, 0.0, 0.0);
        assert!(thrust_and_attitude_reference(&nan, MASS, G, 0.0).is_err());
    }

    #[test]
    fn test_yaw_rotates_command() {
        // At yaw = 90° a north push is a body-frame lateral push
        let mu = Vector3::new(10.0, 0.0, 0.0);
        let (_, roll, pitch) = thrust_and_attitude_reference(&mu, MASS, G, FRAC_PI_2).unwrap();
        assert!(roll < 0.0);
        assert_relative_eq!(pitch, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_angular_error_wraps_yaw() {
        let vehicle = VehicleState {
            yaw: PI - 0.1,
            ..Default::default()
        };
        let err = angular_error_and_derivative(&vehicle, 0.0, 0.0, -PI + 0.1, &Vector3::zeros()).unwrap();
        assert_relative_eq!(err.error.z, -0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_angular_error_singular_at_vertical_pitch() {
        let vehicle = VehicleState {
            pitch: FRAC_PI_2,
            ..Default::default()
        };
        let result = angular_error_and_derivative(&vehicle, 0.0, 0.0, 0.0, &Vector3::zeros());
        assert!(matches!(
            result,
            Err(ControlError::SingularAttitude { .. })
        ));
    }

    #[test]
    fn test_drag_compensation_opposes_drag() {
        let params = VehicleParams::default();
        let vehicle = VehicleState {
            velocity: Vector3::new(4.0, 0.0, 0.0),
            ..Default::default()
        };
        let d = drag_compensation(&params, &vehicle);
        let expected = 0.5 * params.air_density * params.surface_area * params.drag_coefficient * 16.0;
        assert_relative_eq!(d.x, expected, epsilon = 1e-12);
        assert_relative_eq!(d.y, 0.0);

        // No vertical drag estimate
        let climbing = VehicleState {
            velocity: Vector3::new(0.0, 0.0, -3.0),
            ..Default::default()
        };
        assert_relative_eq!(drag_compensation(&params, &climbing), Vector3::zeros());
    }

    #[test]
    fn test_regressors() {
        let omega = Vector3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(rotational_regressor(&omega), Vector3::new(6.0, 3.0, 2.0));

        let v = Vector3::new(3.0, 4.0, 0.0);
        assert_relative_eq!(drag_regressor(&v), Vector3::new(-7.5, -10.0, 0.0));

        let inertia = Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 3.0));
        let gyro = gyroscopic_moment(&omega, &inertia);
        assert_relative_eq!(gyro, omega.cross(&Vector3::new(1.0, 4.0, 9.0)));
    }

    #[test]
    fn test_reference_yaw_derivatives_from_trajectory() {
        let filters = ReferenceFilters {
            roll: Default::default(),
            pitch: Default::default(),
        };
        let trajectory = TrajectoryState {
            yaw_rate: 0.2,
            yaw_acceleration: -0.1,
            ..Default::default()
        };
        let reference = angular_reference_signals(
            &filters,
            &Vector2::zeros(),
            &Vector2::zeros(),
            0.1,
            0.0,
            &trajectory,
        );
        assert_relative_eq!(reference.rate.z, 0.2);
        assert_relative_eq!(reference.acceleration.z, -0.1);
        // Filter at rest: zero rate, acceleration driven by the step input
        assert_relative_eq!(reference.rate.x, 0.0);
        assert!(reference.acceleration.x > 0.0);
    }
}

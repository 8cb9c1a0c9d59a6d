//! Cascaded PID controller
//!
//! Outer loop: PID on the position error with acceleration feedforward and
//! drag inversion, producing the translational command. Inner loop: PID on
//! the Euler angle error with gyroscopic compensation, producing the body
//! moments.

use std::sync::Arc;

use nalgebra::{DVector, Vector2, Vector3, Vector4};

use super::context::StepContext;
use super::controller::{ControllerCore, FlightController};
use super::evaluator::{attitude_stage, drag_compensation, gyroscopic_moment};
use super::gains::PidGains;
use super::input::OdeInput;
use super::state::{pid_layout, write_segment};
use crate::error::Result;

/// PID flight controller
#[derive(Debug, Clone)]
pub struct PidController {
    gains: Arc<PidGains>,
    core: ControllerCore,
}

impl PidController {
    pub fn new(gains: Arc<PidGains>, timestep: f64) -> Result<Self> {
        Ok(Self {
            gains,
            core: ControllerCore::new(pid_layout::NUMBER_OF_STATES, timestep)?,
        })
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }
}

impl FlightController for PidController {
    fn name(&self) -> &'static str {
        "PID"
    }

    fn core(&self) -> &ControllerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ControllerCore {
        &mut self.core
    }

    fn compute_control_law(&mut self, input: &OdeInput) -> Result<()> {
        use pid_layout::*;
        let gains = &*self.gains;
        let params = &gains.vehicle;
        let vehicle = &input.vehicle;
        let trajectory = &input.trajectory;
        let state = &self.core.state;

        let roll_state: Vector2<f64> = state.vector(ROLL_FILTER)?;
        let pitch_state: Vector2<f64> = state.vector(PITCH_FILTER)?;
        let integral_position_error: Vector3<f64> = state.vector(INTEGRAL_POSITION_ERROR)?;
        let integral_angular_error: Vector3<f64> = state.vector(INTEGRAL_ANGULAR_ERROR)?;

        let position_error = vehicle.position - trajectory.position;
        let velocity_error = vehicle.velocity - trajectory.velocity;

        let mu_raw = (-gains.kp_tran * position_error - gains.kd_tran * velocity_error
            - gains.ki_tran * integral_position_error
            + trajectory.acceleration)
            * params.mass
            + drag_compensation(params, vehicle);

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

        let omega = vehicle.angular_velocity;
        let feedback = params.inertia
            * (-gains.kp_rot * angular.error - gains.kd_rot * angular.error_dot
                - gains.ki_rot * integral_angular_error
                + stage.reference.acceleration);
        let moment = gyroscopic_moment(&omega, &params.inertia) + feedback;

        let control_input = Vector4::new(stage.thrust, moment.x, moment.y, moment.z);
        let motor_thrusts = params.allocate(&control_input);

        self.core.context = Some(StepContext {
            input: *input,
            position_error,
            velocity_error,
            mu_raw,
            safety: stage.safety,
            thrust: stage.thrust,
            roll_ref: stage.roll_ref,
            pitch_ref: stage.pitch_ref,
            roll_filter_dot: stage.reference.roll_filter_dot,
            pitch_filter_dot: stage.reference.pitch_filter_dot,
            angular_ref_dot: stage.reference.rate,
            angular_ref_ddot: stage.reference.acceleration,
            angular_error: angular.error,
            angular_position_dot: angular.position_dot,
            angular_error_dot: angular.error_dot,
            moment,
            control_input,
            motor_thrusts,
            adaptive: None,
        });
        Ok(())
    }

    fn derivative(&self, _t: f64, y: &DVector<f64>) -> Result<DVector<f64>> {
        use pid_layout::*;
        let context = self.core.require_context()?;
        let mut dy = DVector::zeros(y.len());
        write_segment(&mut dy, ROLL_FILTER, &context.roll_filter_dot)?;
        write_segment(&mut dy, PITCH_FILTER, &context.pitch_filter_dot)?;
        write_segment(&mut dy, INTEGRAL_POSITION_ERROR, &context.position_error)?;
        write_segment(&mut dy, INTEGRAL_ANGULAR_ERROR, &context.angular_error)?;
        Ok(dy)
    }
}

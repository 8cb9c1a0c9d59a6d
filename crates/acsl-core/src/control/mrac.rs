//! Model-reference adaptive controller
//!
//! Baseline PD (outer) and PI (inner) laws track translational and
//! rotational reference models; adaptive estimates K̂x, K̂r and Θ̂ compensate
//! for parameter uncertainty and aerodynamic drag.

use std::sync::Arc;

use nalgebra::DVector;

use super::context::StepContext;
use super::controller::{ControllerCore, FlightController};
use super::evaluator::evaluate_adaptive;
use super::gains::MracGains;
use super::input::OdeInput;
use super::state::{mrac_layout, two_layer_layout, write_segment};
use crate::error::{ControlError, Result};

/// MRAC flight controller
#[derive(Debug, Clone)]
pub struct MracController {
    gains: Arc<MracGains>,
    core: ControllerCore,
}

impl MracController {
    pub fn new(gains: Arc<MracGains>, timestep: f64) -> Result<Self> {
        Ok(Self {
            gains,
            core: ControllerCore::new(mrac_layout::NUMBER_OF_STATES, timestep)?,
        })
    }

    pub fn gains(&self) -> &MracGains {
        &self.gains
    }
}

impl FlightController for MracController {
    fn name(&self) -> &'static str {
        "MRAC"
    }

    fn core(&self) -> &ControllerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ControllerCore {
        &mut self.core
    }

    fn compute_control_law(&mut self, input: &OdeInput) -> Result<()> {
        let context = evaluate_adaptive(&self.gains, &self.core.state, input, false)?;
        self.core.context = Some(context);
        Ok(())
    }

    fn derivative(&self, _t: f64, y: &DVector<f64>) -> Result<DVector<f64>> {
        adaptive_state_derivative(self.core.require_context()?, y.len(), false)
    }
}

/// Assemble the MRAC-family state derivative from a step context
pub(crate) fn adaptive_state_derivative(
    context: &StepContext,
    number_of_states: usize,
    two_layer: bool,
) -> Result<DVector<f64>> {
    use mrac_layout::*;
    let adaptive = context
        .adaptive
        .as_ref()
        .ok_or_else(|| ControlError::config("adaptive step context missing"))?;
    let outer = &adaptive.outer.derivatives;
    let inner = &adaptive.inner.derivatives;

    let mut dy = DVector::zeros(number_of_states);
    write_segment(&mut dy, ROLL_FILTER, &context.roll_filter_dot)?;
    write_segment(&mut dy, PITCH_FILTER, &context.pitch_filter_dot)?;
    write_segment(&mut dy, X_REF_TRAN, &adaptive.x_ref_tran_dot)?;
    write_segment(&mut dy, INTEGRAL_POSITION_REF, &adaptive.position_ref_error)?;
    write_segment(&mut dy, K_X_TRAN, &outer.k_x)?;
    write_segment(&mut dy, K_R_TRAN, &outer.k_r)?;
    write_segment(&mut dy, THETA_TRAN, &outer.theta)?;
    write_segment(&mut dy, OMEGA_REF, &adaptive.omega_ref_dot)?;
    write_segment(&mut dy, K_X_ROT, &inner.k_x)?;
    write_segment(&mut dy, K_R_ROT, &inner.k_r)?;
    write_segment(&mut dy, THETA_ROT, &inner.theta)?;
    write_segment(&mut dy, INTEGRAL_E_ROT, &adaptive.e_rot)?;
    write_segment(&mut dy, INTEGRAL_ANGULAR_ERROR, &context.angular_error)?;
    write_segment(
        &mut dy,
        INTEGRAL_OMEGA_REF_CMD,
        &(adaptive.omega_ref - adaptive.omega_cmd),
    )?;

    if two_layer {
        let (k_g_tran, k_g_rot) = match (&outer.k_g, &inner.k_g) {
            (Some(tran), Some(rot)) => (tran, rot),
            _ => return Err(ControlError::config("second-layer derivatives missing")),
        };
        write_segment(&mut dy, two_layer_layout::K_G_TRAN, k_g_tran)?;
        write_segment(&mut dy, two_layer_layout::K_G_ROT, k_g_rot)?;
    }
    Ok(dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::control::input::{TrajectoryState, VehicleState};
    use crate::vehicle::VehicleParams;
    use approx::assert_relative_eq;
    use nalgebra::{Vector3, Vector6};

    fn controller() -> MracController {
        let gains = MracGains::new(VehicleParams::default(), &ControllerConfig::default()).unwrap();
        MracController::new(Arc::new(gains), 0.01).unwrap()
    }

    #[test]
    fn test_hover_keeps_estimates_at_zero() {
        let mut mrac = controller();
        let input = OdeInput::new(0.0, VehicleState::default(), TrajectoryState::default());
        for i in 0..10 {
            let step = OdeInput {
                time: i as f64 * 0.01,
                ..input
            };
            mrac.run(&step).unwrap();
        }
        let weight = mrac.gains().vehicle.weight();
        let context = mrac.context().unwrap();
        assert_relative_eq!(context.thrust, weight, epsilon = 1e-9);
        assert_eq!(mrac.state().len(), 106);
        assert!(mrac.state().as_vector().iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_reference_model_follows_user_trajectory() {
        let mut mrac = controller();
        let trajectory = TrajectoryState::hover(Vector3::new(1.0, 0.0, 0.0), 0.0);
        let input = OdeInput::new(0.0, VehicleState::default(), trajectory);
        mrac.run(&input).unwrap();

        // x_ref starts at rest: the command input only drives the velocity rows
        let adaptive = mrac.context().unwrap().adaptive.as_ref().unwrap();
        let kp = mrac.gains().baseline.kp_tran;
        assert_relative_eq!(adaptive.r_tran, kp * Vector3::new(6.0, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(adaptive.x_ref_tran_dot[3], kp[(0, 0)], epsilon = 1e-9);

        let x_ref: Vector6<f64> = mrac.state().vector(mrac_layout::X_REF_TRAN).unwrap();
        assert_relative_eq!(x_ref[3], kp[(0, 0)] * 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_adaptive_derivative_excludes_second_layer() {
        let mut mrac = controller();
        let vehicle = VehicleState {
            velocity: Vector3::new(1.0, -0.5, 0.2),
            angular_velocity: Vector3::new(0.1, 0.0, -0.2),
            ..Default::default()
        };
        let input = OdeInput::new(0.0, vehicle, TrajectoryState::default());
        mrac.compute_control_law(&input).unwrap();

        let context = mrac.context().unwrap();
        assert!(context.adaptive.as_ref().unwrap().outer.derivatives.k_g.is_none());
        let dy = mrac.derivative(0.0, mrac.state().as_vector()).unwrap();
        assert_eq!(dy.len(), 106);
        assert!(adaptive_state_derivative(context, 133, true).is_err());
    }
}

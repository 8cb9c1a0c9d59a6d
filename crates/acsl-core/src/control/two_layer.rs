//! Two-layer model-reference adaptive controller
//!
//! MRAC with a second adaptive layer: the gain K̂g acts on the tracking error
//! and adapts with the Lyapunov weighting of faster transient dynamics,
//! shaping the transient response of both loops.

use std::sync::Arc;

use nalgebra::DVector;

use super::controller::{ControllerCore, FlightController};
use super::evaluator::evaluate_adaptive;
use super::gains::TwoLayerGains;
use super::input::OdeInput;
use super::mrac::adaptive_state_derivative;
use super::state::two_layer_layout;
use crate::error::Result;

/// Two-layer MRAC flight controller
#[derive(Debug, Clone)]
pub struct TwoLayerMracController {
    gains: Arc<TwoLayerGains>,
    core: ControllerCore,
}

impl TwoLayerMracController {
    pub fn new(gains: Arc<TwoLayerGains>, timestep: f64) -> Result<Self> {
        Ok(Self {
            gains,
            core: ControllerCore::new(two_layer_layout::NUMBER_OF_STATES, timestep)?,
        })
    }

    pub fn gains(&self) -> &TwoLayerGains {
        &self.gains
    }
}

impl FlightController for TwoLayerMracController {
    fn name(&self) -> &'static str {
        "TwoLayerMRAC"
    }

    fn core(&self) -> &ControllerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ControllerCore {
        &mut self.core
    }

    fn compute_control_law(&mut self, input: &OdeInput) -> Result<()> {
        let context = evaluate_adaptive(&self.gains.core, &self.core.state, input, true)?;
        self.core.context = Some(context);
        Ok(())
    }

    fn derivative(&self, _t: f64, y: &DVector<f64>) -> Result<DVector<f64>> {
        adaptive_state_derivative(self.core.require_context()?, y.len(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::control::input::{TrajectoryState, VehicleState};
    use crate::control::state::ControlState;
    use crate::vehicle::VehicleParams;
    use approx::assert_relative_eq;
    use nalgebra::{SMatrix, Vector3};

    fn controller(config: &ControllerConfig) -> TwoLayerMracController {
        let gains = TwoLayerGains::new(VehicleParams::default(), config).unwrap();
        TwoLayerMracController::new(Arc::new(gains), 0.005).unwrap()
    }

    #[test]
    fn test_second_layer_adapts_on_tracking_error() {
        let mut config = ControllerConfig::default();
        let mrac = &mut config.two_layer.mrac;
        mrac.dead_zone.enabled = false;
        mrac.e_modification.enabled = false;
        mrac.projection.enabled = false;
        let mut controller = controller(&config);

        let vehicle = VehicleState::at_rest(Vector3::new(0.3, -0.2, 0.1));
        let input = OdeInput::new(0.0, vehicle, TrajectoryState::default());
        controller.run(&input).unwrap();

        let k_g: SMatrix<f64, 6, 3> = controller.state().matrix(two_layer_layout::K_G_TRAN).unwrap();
        assert!(k_g.norm() > 0.0);

        // K̂g̣ = -Γg e (eᵀPB), with P from the transient dynamics
        let gains = controller.gains();
        let adaptive = controller.context().unwrap().adaptive.as_ref().unwrap();
        let e = adaptive.e_tran;
        let e_t_pb = e.transpose() * gains.p_transient_tran * gains.core.tran.b_plant;
        let gamma_g = gains.core.adaptive_tran.gamma_g.unwrap();
        let expected = -(gamma_g * e * e_t_pb);
        assert_relative_eq!(adaptive.outer.derivatives.k_g.unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_failed_step_leaves_state_and_context() {
        let mut controller = controller(&ControllerConfig::default());
        let good = OdeInput::new(0.0, VehicleState::at_rest(Vector3::new(0.1, 0.0, 0.0)), TrajectoryState::default());
        controller.run(&good).unwrap();

        let state_before: ControlState = controller.state().clone();
        let context_before = controller.context().cloned();

        let singular = VehicleState {
            pitch: std::f64::consts::FRAC_PI_2,
            ..Default::default()
        };
        let err = controller.run(&OdeInput::new(0.005, singular, TrajectoryState::default())).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(controller.state(), &state_before);
        assert_eq!(controller.context().cloned(), context_before);
        assert_eq!(controller.core().steps(), 1);
    }
}

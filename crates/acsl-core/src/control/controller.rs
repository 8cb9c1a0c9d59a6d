//! Flight controller interface
//!
//! A controller evaluates its control law once per step, then advances its
//! state with a single RK4 step. The derivative is computed once from the
//! step context and held fixed across the four RK4 stages.

use log::{trace, warn};
use nalgebra::DVector;

use super::context::StepContext;
use super::input::OdeInput;
use super::state::ControlState;
use crate::error::{ControlError, Result};
use crate::math::rk4_dyn;

/// State owned by every controller
#[derive(Debug, Clone)]
pub struct ControllerCore {
    pub(crate) state: ControlState,
    timestep: f64,
    time: f64,
    steps: u64,
    pub(crate) context: Option<StepContext>,
}

impl ControllerCore {
    pub fn new(number_of_states: usize, timestep: f64) -> Result<Self> {
        validate_timestep(timestep)?;
        Ok(Self {
            state: ControlState::zeros(number_of_states),
            timestep,
            time: 0.0,
            steps: 0,
            context: None,
        })
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    /// Controller time, advanced by one timestep per successful step
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Context of the last successful evaluation
    pub fn context(&self) -> Option<&StepContext> {
        self.context.as_ref()
    }

    /// Context of the last successful evaluation, required by `derivative`
    pub(crate) fn require_context(&self) -> Result<&StepContext> {
        self.context
            .as_ref()
            .ok_or_else(|| ControlError::config("control law evaluated before derivative"))
    }
}

/// Timestep must be finite and positive
pub fn validate_timestep(timestep: f64) -> Result<()> {
    if !(timestep.is_finite() && timestep > 0.0) {
        return Err(ControlError::config(format!(
            "timestep must be finite and positive, got {timestep}"
        )));
    }
    Ok(())
}

/// Common interface of the PID, MRAC and two-layer MRAC controllers
pub trait FlightController {
    /// Registry name of the variant
    fn name(&self) -> &'static str;

    fn core(&self) -> &ControllerCore;

    fn core_mut(&mut self) -> &mut ControllerCore;

    /// Evaluate the control law and store the step context
    ///
    /// On error the previous context and the state are left untouched.
    fn compute_control_law(&mut self, input: &OdeInput) -> Result<()>;

    /// State derivative assembled from the current step context
    fn derivative(&self, t: f64, y: &DVector<f64>) -> Result<DVector<f64>>;

    /// Hook invoked after every integration step
    fn post_integrate(&mut self) {}

    fn state(&self) -> &ControlState {
        self.core().state()
    }

    fn context(&self) -> Option<&StepContext> {
        self.core().context()
    }

    fn timestep(&self) -> f64 {
        self.core().timestep()
    }

    /// Motor thrusts of the last successful evaluation
    fn motor_thrusts(&self) -> Option<&DVector<f64>> {
        self.context().map(|c| &c.motor_thrusts)
    }

    /// One control step: evaluate, integrate, post-process
    fn run(&mut self, input: &OdeInput) -> Result<()> {
        self.compute_control_law(input)?;

        let dt = self.timestep();
        let frozen = self.derivative(input.time, self.state().as_vector())?;
        let next = rk4_dyn(self.state().as_vector(), input.time, dt, |_, _| frozen.clone());

        let core = self.core_mut();
        core.state.set(next)?;
        core.time += dt;
        core.steps += 1;
        self.post_integrate();

        if let Some(context) = self.context() {
            trace!(
                "{} step at t = {:.4}: u = [{:.3}, {:.4}, {:.4}, {:.4}]",
                self.name(),
                input.time,
                context.control_input[0],
                context.control_input[1],
                context.control_input[2],
                context.control_input[3]
            );
            if context.safety.saturated() {
                warn!(
                    "{}: outer-loop command scaled by {:.4} at t = {:.4}",
                    self.name(),
                    context.safety.scale,
                    input.time
                );
            }
            if let Some(adaptive) = &context.adaptive {
                if adaptive.outer.projection.any() || adaptive.inner.projection.any() {
                    warn!(
                        "{}: projection active at t = {:.4} (outer: {:?}, inner: {:?})",
                        self.name(),
                        input.time,
                        adaptive.outer.projection,
                        adaptive.inner.projection
                    );
                }
            }
        }
        Ok(())
    }
}

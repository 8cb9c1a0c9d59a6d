//! Controller dispatch
//!
//! Maps a controller identifier to its gains set, controller and logger.
//! The variants form a closed set: `"PID"`, `"MRAC"` and `"TwoLayerMRAC"`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::info;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::controller::{validate_timestep, ControllerCore, FlightController};
use super::gains::{MracGains, PidGains, TwoLayerGains};
use super::input::OdeInput;
use super::logger::DiagnosticLogger;
use super::mrac::MracController;
use super::pid::PidController;
use super::two_layer::TwoLayerMracController;
use crate::config::ControllerConfig;
use crate::error::{ControlError, Result};
use crate::vehicle::VehicleParams;

/// Controller variant identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerType {
    #[serde(rename = "PID")]
    Pid,
    #[serde(rename = "MRAC")]
    Mrac,
    #[serde(rename = "TwoLayerMRAC")]
    TwoLayerMrac,
}

impl ControllerType {
    pub const ALL: [ControllerType; 3] = [Self::Pid, Self::Mrac, Self::TwoLayerMrac];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pid => "PID",
            Self::Mrac => "MRAC",
            Self::TwoLayerMrac => "TwoLayerMRAC",
        }
    }
}

impl fmt::Display for ControllerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControllerType {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                ControlError::config(format!(
                    "unknown controller type '{s}' (expected PID, MRAC or TwoLayerMRAC)"
                ))
            })
    }
}

/// Immutable gains set, shared with the controller
#[derive(Debug, Clone)]
pub enum GainsSet {
    Pid(Arc<PidGains>),
    Mrac(Arc<MracGains>),
    TwoLayerMrac(Arc<TwoLayerGains>),
}

impl GainsSet {
    pub fn controller_type(&self) -> ControllerType {
        match self {
            Self::Pid(_) => ControllerType::Pid,
            Self::Mrac(_) => ControllerType::Mrac,
            Self::TwoLayerMrac(_) => ControllerType::TwoLayerMrac,
        }
    }

    pub fn vehicle(&self) -> &VehicleParams {
        match self {
            Self::Pid(gains) => &gains.vehicle,
            Self::Mrac(gains) => &gains.vehicle,
            Self::TwoLayerMrac(gains) => &gains.core.vehicle,
        }
    }
}

/// Any of the three controllers
#[derive(Debug, Clone)]
pub enum Controller {
    Pid(PidController),
    Mrac(MracController),
    TwoLayerMrac(TwoLayerMracController),
}

macro_rules! delegate {
    ($self:expr, $c:ident => $body:expr) => {
        match $self {
            Controller::Pid($c) => $body,
            Controller::Mrac($c) => $body,
            Controller::TwoLayerMrac($c) => $body,
        }
    };
}

impl FlightController for Controller {
    fn name(&self) -> &'static str {
        delegate!(self, c => c.name())
    }

    fn core(&self) -> &ControllerCore {
        delegate!(self, c => c.core())
    }

    fn core_mut(&mut self) -> &mut ControllerCore {
        delegate!(self, c => c.core_mut())
    }

    fn compute_control_law(&mut self, input: &OdeInput) -> Result<()> {
        delegate!(self, c => c.compute_control_law(input))
    }

    fn derivative(&self, t: f64, y: &DVector<f64>) -> Result<DVector<f64>> {
        delegate!(self, c => c.derivative(t, y))
    }

    fn post_integrate(&mut self) {
        delegate!(self, c => c.post_integrate())
    }
}

/// Gains, controller and logger of one run
#[derive(Debug, Clone)]
pub struct ControllerBundle {
    pub gains: GainsSet,
    pub controller: Controller,
    pub logger: DiagnosticLogger,
}

impl ControllerBundle {
    /// Advance the controller one step
    pub fn step(&mut self, input: &OdeInput) -> Result<()> {
        self.controller.run(input)
    }

    /// Record the controller's last successful step
    pub fn log(&mut self, simulation_time: f64) -> Result<()> {
        self.logger.collect(&self.controller, simulation_time)
    }
}

/// Build the gains set, controller and logger of a variant
pub fn instantiate_controller(
    kind: ControllerType,
    vehicle: VehicleParams,
    config: &ControllerConfig,
    timestep: f64,
) -> Result<ControllerBundle> {
    validate_timestep(timestep)?;
    let (gains, controller) = match kind {
        ControllerType::Pid => {
            let gains = Arc::new(PidGains::new(vehicle, config)?);
            let controller = PidController::new(Arc::clone(&gains), timestep)?;
            (GainsSet::Pid(gains), Controller::Pid(controller))
        }
        ControllerType::Mrac => {
            let gains = Arc::new(MracGains::new(vehicle, config)?);
            let controller = MracController::new(Arc::clone(&gains), timestep)?;
            (GainsSet::Mrac(gains), Controller::Mrac(controller))
        }
        ControllerType::TwoLayerMrac => {
            let gains = Arc::new(TwoLayerGains::new(vehicle, config)?);
            let controller = TwoLayerMracController::new(Arc::clone(&gains), timestep)?;
            (GainsSet::TwoLayerMrac(gains), Controller::TwoLayerMrac(controller))
        }
    };
    info!(
        "instantiated {} controller: {} states, dt = {timestep} s",
        kind,
        controller.state().len()
    );
    Ok(ControllerBundle {
        gains,
        controller,
        logger: DiagnosticLogger::new(),
    })
}

/// Parse the identifier, then build the bundle
pub fn instantiate_by_name(
    name: &str,
    vehicle: VehicleParams,
    config: &ControllerConfig,
    timestep: f64,
) -> Result<ControllerBundle> {
    instantiate_controller(name.parse()?, vehicle, config, timestep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::input::{TrajectoryState, VehicleState};

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_parse_names() {
        for kind in ControllerType::ALL {
            assert_eq!(kind.to_string().parse::<ControllerType>().unwrap(), kind);
        }
        assert!(matches!(
            "LQR".parse::<ControllerType>(),
            Err(ControlError::Configuration(_))
        ));
        assert!("pid".parse::<ControllerType>().is_err());
    }

    #[test]
    fn test_state_sizes() {
        let config = ControllerConfig::default();
        let expected = [
            (ControllerType::Pid, 10),
            (ControllerType::Mrac, 106),
            (ControllerType::TwoLayerMrac, 133),
        ];
        for (kind, len) in expected {
            let bundle = instantiate_controller(kind, VehicleParams::default(), &config, 0.01).unwrap();
            assert_eq!(bundle.controller.state().len(), len);
            assert_eq!(bundle.controller.name(), kind.as_str());
            assert_eq!(bundle.gains.controller_type(), kind);
        }
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let config = ControllerConfig::default();
        assert!(instantiate_by_name("INDI", VehicleParams::default(), &config, 0.01).is_err());
        assert!(instantiate_controller(ControllerType::Pid, VehicleParams::default(), &config, 0.0).is_err());
    }

    #[test]
    fn test_bundle_step_and_log() {
        let config = ControllerConfig::default();
        let mut bundle =
            instantiate_by_name("TwoLayerMRAC", VehicleParams::default(), &config, 0.01).unwrap();
        let input = OdeInput::new(0.0, VehicleState::default(), TrajectoryState::default());
        bundle.step(&input).unwrap();
        bundle.log(0.0).unwrap();
        assert_eq!(bundle.logger.len(), 1);
        assert_eq!(bundle.controller.core().steps(), 1);
    }

    #[test]
    fn test_gains_shareable_across_threads() {
        assert_send_sync::<GainsSet>();
        assert_send_sync::<Controller>();
    }
}

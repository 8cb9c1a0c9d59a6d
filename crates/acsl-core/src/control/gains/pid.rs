//! PID gains

use log::info;
use nalgebra::Matrix3;

use super::{matrix3, ReferenceFilters};
use crate::config::ControllerConfig;
use crate::control::safety::SafetyMechanism;
use crate::control::state::pid_layout;
use crate::error::Result;
use crate::vehicle::VehicleParams;

/// Gains of the cascaded PID controller
#[derive(Debug, Clone)]
pub struct PidGains {
    pub vehicle: VehicleParams,
    pub filters: ReferenceFilters,
    pub safety: SafetyMechanism,
    pub kp_tran: Matrix3<f64>,
    pub kd_tran: Matrix3<f64>,
    pub ki_tran: Matrix3<f64>,
    pub kp_rot: Matrix3<f64>,
    pub kd_rot: Matrix3<f64>,
    pub ki_rot: Matrix3<f64>,
}

impl PidGains {
    pub const NUMBER_OF_STATES: usize = pid_layout::NUMBER_OF_STATES;

    pub fn new(vehicle: VehicleParams, config: &ControllerConfig) -> Result<Self> {
        vehicle.validate()?;
        let pid = &config.pid;
        let gains = Self {
            filters: ReferenceFilters::from_config(&config.roll_filter, &config.pitch_filter)?,
            safety: SafetyMechanism::from_config(&pid.safety)?,
            kp_tran: matrix3(&pid.kp_tran, "kp_tran")?,
            kd_tran: matrix3(&pid.kd_tran, "kd_tran")?,
            ki_tran: matrix3(&pid.ki_tran, "ki_tran")?,
            kp_rot: matrix3(&pid.kp_rot, "kp_rot")?,
            kd_rot: matrix3(&pid.kd_rot, "kd_rot")?,
            ki_rot: matrix3(&pid.ki_rot, "ki_rot")?,
            vehicle,
        };
        info!("loaded PID gains ({} motors)", gains.vehicle.motor_count());
        Ok(gains)
    }
}

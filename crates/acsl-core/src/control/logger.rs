//! Diagnostic logger
//!
//! Collects one record per control step from the controller's step context.
//! Motor thrusts are zero-padded to [`MAX_LOGGED_MOTORS`] entries so records
//! of different airframes share one layout.

use log::debug;
use nalgebra::{Vector3, Vector6};
use serde::Serialize;

use super::adaptive::ProjectionFlags;
use super::context::{AdaptiveContext, StepContext};
use super::controller::FlightController;
use crate::error::{ControlError, Result};
use crate::vehicle::MAX_LOGGED_MOTORS;

/// Diagnostics of one control step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticRecord {
    /// Controller time [s]
    pub time: f64,
    /// Simulator time [s]
    pub simulation_time: f64,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    /// [roll, pitch, yaw] [rad]
    pub euler_angles: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
    pub roll_ref: f64,
    pub pitch_ref: f64,
    pub yaw_ref: f64,
    pub angular_ref_dot: Vector3<f64>,
    pub angular_ref_ddot: Vector3<f64>,
    pub user_position: Vector3<f64>,
    pub user_velocity: Vector3<f64>,
    pub user_acceleration: Vector3<f64>,
    /// Translational command after the safety mechanism
    pub mu: Vector3<f64>,
    /// Safety scaling factor in [0, 1]
    pub safety_scale: f64,
    /// [u1, u2, u3, u4]
    pub control_input: [f64; 4],
    pub motor_thrusts: [f64; MAX_LOGGED_MOTORS],
    pub angular_position_dot: Vector3<f64>,
    pub adaptive: Option<AdaptiveRecord>,
}

/// Extra diagnostics of the MRAC variants
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptiveRecord {
    pub x_ref_tran: Vector6<f64>,
    pub e_tran: Vector6<f64>,
    pub r_tran: Vector3<f64>,
    pub mu_pd_baseline: Vector3<f64>,
    pub mu_adaptive: Vector3<f64>,
    pub omega_ref: Vector3<f64>,
    pub omega_ref_dot: Vector3<f64>,
    pub omega_cmd: Vector3<f64>,
    pub omega_cmd_dot: Vector3<f64>,
    pub r_rot: Vector3<f64>,
    pub moment_baseline_pi: Vector3<f64>,
    pub moment_adaptive: Vector3<f64>,
    pub dead_zone_tran: f64,
    pub dead_zone_rot: f64,
    pub projection_tran: ProjectionFlags,
    pub projection_rot: ProjectionFlags,
}

impl AdaptiveRecord {
    fn from_context(adaptive: &AdaptiveContext) -> Self {
        Self {
            x_ref_tran: adaptive.x_ref_tran,
            e_tran: adaptive.e_tran,
            r_tran: adaptive.r_tran,
            mu_pd_baseline: adaptive.mu_pd_baseline,
            mu_adaptive: adaptive.mu_adaptive,
            omega_ref: adaptive.omega_ref,
            omega_ref_dot: adaptive.omega_ref_dot,
            omega_cmd: adaptive.omega_cmd,
            omega_cmd_dot: adaptive.omega_cmd_dot,
            r_rot: adaptive.r_rot,
            moment_baseline_pi: adaptive.moment_baseline_pi,
            moment_adaptive: adaptive.moment_adaptive,
            dead_zone_tran: adaptive.outer.dead_zone_value,
            dead_zone_rot: adaptive.inner.dead_zone_value,
            projection_tran: adaptive.outer.projection,
            projection_rot: adaptive.inner.projection,
        }
    }
}

impl DiagnosticRecord {
    /// Build a record from a step context
    pub fn from_context(context: &StepContext, simulation_time: f64) -> Result<Self> {
        let input = &context.input;
        let vehicle = &input.vehicle;
        let trajectory = &input.trajectory;

        Ok(Self {
            time: input.time,
            simulation_time,
            position: vehicle.position,
            velocity: vehicle.velocity,
            euler_angles: vehicle.euler_angles(),
            angular_velocity: vehicle.angular_velocity,
            roll_ref: context.roll_ref,
            pitch_ref: context.pitch_ref,
            yaw_ref: trajectory.yaw,
            angular_ref_dot: context.angular_ref_dot,
            angular_ref_ddot: context.angular_ref_ddot,
            user_position: trajectory.position,
            user_velocity: trajectory.velocity,
            user_acceleration: trajectory.acceleration,
            mu: context.safety.mu,
            safety_scale: context.safety.scale,
            control_input: context.control_input.into(),
            motor_thrusts: pad_motor_thrusts(context.motor_thrusts.as_slice())?,
            angular_position_dot: context.angular_position_dot,
            adaptive: context.adaptive.as_ref().map(AdaptiveRecord::from_context),
        })
    }
}

/// Zero-pad motor thrusts to the logged layout
pub fn pad_motor_thrusts(thrusts: &[f64]) -> Result<[f64; MAX_LOGGED_MOTORS]> {
    if thrusts.len() > MAX_LOGGED_MOTORS {
        return Err(ControlError::shape(
            "logged motor thrusts",
            MAX_LOGGED_MOTORS,
            thrusts.len(),
        ));
    }
    let mut padded = [0.0; MAX_LOGGED_MOTORS];
    padded[..thrusts.len()].copy_from_slice(thrusts);
    Ok(padded)
}

/// In-memory diagnostic record collector
#[derive(Debug, Clone, Default)]
pub struct DiagnosticLogger {
    records: Vec<DiagnosticRecord>,
}

impl DiagnosticLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the controller's last successful step
    ///
    /// Fails when the controller has not completed a step yet.
    pub fn collect(&mut self, controller: &dyn FlightController, simulation_time: f64) -> Result<()> {
        let context = controller.context().ok_or_else(|| {
            ControlError::config(format!("{}: no step context to log", controller.name()))
        })?;
        let record = DiagnosticRecord::from_context(context, simulation_time)?;
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[DiagnosticRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drain the collected records
    pub fn take_records(&mut self) -> Vec<DiagnosticRecord> {
        debug!("flushing {} diagnostic records", self.records.len());
        std::mem::take(&mut self.records)
    }
}

//! Controller state vector
//!
//! Each controller integrates one flat vector holding its filter states,
//! integrators, reference models and adaptive parameter estimates. The
//! vector is split into named fixed-offset segments; matrix-valued segments
//! are stored flattened in column-major order.

use nalgebra::{DVector, SMatrix, SVector};

use crate::error::{ControlError, Result};

/// Contiguous block of the state vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub name: &'static str,
    pub offset: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Segment {
    pub const fn new(name: &'static str, offset: usize, rows: usize, cols: usize) -> Self {
        Self { name, offset, rows, cols }
    }

    pub const fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn end(&self) -> usize {
        self.offset + self.len()
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.end()
    }
}

/// PID state layout (10 states)
pub mod pid_layout {
    use super::Segment;

    pub const ROLL_FILTER: Segment = Segment::new("roll_filter", 0, 2, 1);
    pub const PITCH_FILTER: Segment = Segment::new("pitch_filter", 2, 2, 1);
    pub const INTEGRAL_POSITION_ERROR: Segment = Segment::new("integral_position_error", 4, 3, 1);
    pub const INTEGRAL_ANGULAR_ERROR: Segment = Segment::new("integral_angular_error", 7, 3, 1);

    pub const NUMBER_OF_STATES: usize = 10;

    pub const SEGMENTS: [Segment; 4] = [
        ROLL_FILTER,
        PITCH_FILTER,
        INTEGRAL_POSITION_ERROR,
        INTEGRAL_ANGULAR_ERROR,
    ];
}

/// MRAC state layout (106 states)
pub mod mrac_layout {
    use super::Segment;

    pub const ROLL_FILTER: Segment = Segment::new("roll_filter", 0, 2, 1);
    pub const PITCH_FILTER: Segment = Segment::new("pitch_filter", 2, 2, 1);
    pub const X_REF_TRAN: Segment = Segment::new("x_ref_tran", 4, 6, 1);
    pub const INTEGRAL_POSITION_REF: Segment = Segment::new("integral_position_ref", 10, 3, 1);
    pub const K_X_TRAN: Segment = Segment::new("k_x_tran", 13, 6, 3);
    pub const K_R_TRAN: Segment = Segment::new("k_r_tran", 31, 3, 3);
    pub const THETA_TRAN: Segment = Segment::new("theta_tran", 40, 6, 3);
    pub const OMEGA_REF: Segment = Segment::new("omega_ref", 58, 3, 1);
    pub const K_X_ROT: Segment = Segment::new("k_x_rot", 61, 3, 3);
    pub const K_R_ROT: Segment = Segment::new("k_r_rot", 70, 3, 3);
    pub const THETA_ROT: Segment = Segment::new("theta_rot", 79, 6, 3);
    pub const INTEGRAL_E_ROT: Segment = Segment::new("integral_e_rot", 97, 3, 1);
    pub const INTEGRAL_ANGULAR_ERROR: Segment = Segment::new("integral_angular_error", 100, 3, 1);
    pub const INTEGRAL_OMEGA_REF_CMD: Segment = Segment::new("integral_omega_ref_cmd", 103, 3, 1);

    pub const NUMBER_OF_STATES: usize = 106;

    pub const SEGMENTS: [Segment; 14] = [
        ROLL_FILTER,
        PITCH_FILTER,
        X_REF_TRAN,
        INTEGRAL_POSITION_REF,
        K_X_TRAN,
        K_R_TRAN,
        THETA_TRAN,
        OMEGA_REF,
        K_X_ROT,
        K_R_ROT,
        THETA_ROT,
        INTEGRAL_E_ROT,
        INTEGRAL_ANGULAR_ERROR,
        INTEGRAL_OMEGA_REF_CMD,
    ];
}

/// Two-layer MRAC state layout (133 states): MRAC plus the K̂g blocks
pub mod two_layer_layout {
    use super::Segment;
    pub use super::mrac_layout::{
        INTEGRAL_ANGULAR_ERROR, INTEGRAL_E_ROT, INTEGRAL_OMEGA_REF_CMD, INTEGRAL_POSITION_REF,
        K_R_ROT, K_R_TRAN, K_X_ROT, K_X_TRAN, OMEGA_REF, PITCH_FILTER, ROLL_FILTER, THETA_ROT,
        THETA_TRAN, X_REF_TRAN,
    };

    pub const K_G_TRAN: Segment = Segment::new("k_g_tran", 106, 6, 3);
    pub const K_G_ROT: Segment = Segment::new("k_g_rot", 124, 3, 3);

    pub const NUMBER_OF_STATES: usize = 133;

    pub const SEGMENTS: [Segment; 16] = [
        ROLL_FILTER,
        PITCH_FILTER,
        X_REF_TRAN,
        INTEGRAL_POSITION_REF,
        K_X_TRAN,
        K_R_TRAN,
        THETA_TRAN,
        OMEGA_REF,
        K_X_ROT,
        K_R_ROT,
        THETA_ROT,
        INTEGRAL_E_ROT,
        INTEGRAL_ANGULAR_ERROR,
        INTEGRAL_OMEGA_REF_CMD,
        K_G_TRAN,
        K_G_ROT,
    ];
}

/// Flat controller state, zero at construction
#[derive(Debug, Clone, PartialEq)]
pub struct ControlState {
    values: DVector<f64>,
}

impl ControlState {
    pub fn zeros(number_of_states: usize) -> Self {
        Self {
            values: DVector::zeros(number_of_states),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_vector(&self) -> &DVector<f64> {
        &self.values
    }

    /// Replace the whole state; the length is fixed at construction
    pub fn set(&mut self, values: DVector<f64>) -> Result<()> {
        if values.len() != self.values.len() {
            return Err(ControlError::shape("control state", self.values.len(), values.len()));
        }
        self.values = values;
        Ok(())
    }

    /// Read a vector segment
    pub fn vector<const N: usize>(&self, segment: Segment) -> Result<SVector<f64, N>> {
        read_segment::<N, 1>(&self.values, segment)
    }

    /// Read a matrix segment (column-major)
    pub fn matrix<const R: usize, const C: usize>(&self, segment: Segment) -> Result<SMatrix<f64, R, C>> {
        read_segment::<R, C>(&self.values, segment)
    }

    /// Overwrite a segment with a matrix or vector (column-major)
    pub fn write<const R: usize, const C: usize>(
        &mut self,
        segment: Segment,
        value: &SMatrix<f64, R, C>,
    ) -> Result<()> {
        write_segment(&mut self.values, segment, value)
    }
}

/// Read a segment of a flat vector into a fixed-size matrix
pub fn read_segment<const R: usize, const C: usize>(
    values: &DVector<f64>,
    segment: Segment,
) -> Result<SMatrix<f64, R, C>> {
    check_segment::<R, C>(values, segment)?;
    Ok(SMatrix::<f64, R, C>::from_column_slice(
        &values.as_slice()[segment.range()],
    ))
}

/// Write a fixed-size matrix into a segment of a flat vector
pub fn write_segment<const R: usize, const C: usize>(
    values: &mut DVector<f64>,
    segment: Segment,
    value: &SMatrix<f64, R, C>,
) -> Result<()> {
    check_segment::<R, C>(values, segment)?;
    values.as_mut_slice()[segment.range()].copy_from_slice(value.as_slice());
    Ok(())
}

fn check_segment<const R: usize, const C: usize>(values: &DVector<f64>, segment: Segment) -> Result<()> {
    if R * C != segment.len() {
        return Err(ControlError::shape(segment.name, segment.len(), R * C));
    }
    if segment.end() > values.len() {
        return Err(ControlError::shape(
            format!("{} (state length)", segment.name),
            segment.end(),
            values.len(),
        ));
    }
    Ok(())
}

//! Mathematical utilities
//!
//! Implements ZYX Euler-angle rotation utilities, linear-system tools
//! (Lyapunov equations, pole shifting) and numerical integrators.

pub mod rotation;
pub mod linear_system;
pub mod integrator;

pub use rotation::*;
pub use linear_system::*;
pub use integrator::*;

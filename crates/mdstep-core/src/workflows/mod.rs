//! # Workflows Module
//!
//! High-level drivers that advance a configured [`Integrator`](crate::engine::integrator::Integrator)
//! through a complete procedure.
//!
//! - **Minimization** ([`minimize`]) - Update until every searching method has converged
//!   or a step cap is reached.
//! - **Dynamics** ([`dynamics`]) - Run a fixed number of steps, sampling thermodynamic
//!   observables at a fixed period.

pub mod dynamics;
pub mod minimize;

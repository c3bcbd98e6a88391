//! # Engine Module
//!
//! The stateful machinery advanced once per timestep.
//!
//! ## Overview
//!
//! Force contributions add into a shared net-force arena, integration methods advance
//! particle groups in two half-steps around a force recomputation, and the thermodynamic
//! reducer turns the resulting per-particle state into global observables. The
//! [`integrator::Integrator`] ties the first two together.
//!
//! ## Architecture
//!
//! - **Forces** ([`force`], [`forces`]) - The `ForceContribution` trait, the net-force arena
//!   and the coarse-grained angle contribution
//! - **Methods** ([`method`], [`methods`]) - The `IntegrationMethod` trait, constant-energy
//!   integration and the FIRE minimizer
//! - **Orchestration** ([`integrator`]) - Registration and per-step scheduling
//! - **Observables** ([`thermo`]) - Kinetic and potential energy, temperature, pressure
//! - **Configuration** ([`config`]) - Validated parameter sets and the TOML run file
//! - **Error Handling** ([`error`]) - The aggregated engine error
//! - **Requests** ([`flags`]) - Which optional observables must be produced this step

pub mod config;
pub mod error;
pub mod flags;
pub mod force;
pub mod forces;
pub mod integrator;
pub mod method;
pub mod methods;
pub(crate) mod reduce;
pub mod thermo;

#[cfg(test)]
pub(crate) mod testing;

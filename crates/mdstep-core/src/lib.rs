//! # mdstep Core Library
//!
//! The time-stepping core of a particle simulation engine: accumulation of inter-particle
//! forces, two-half-step integration of particle groups, adaptive-step energy minimization
//! and the reduction of per-particle state into global thermodynamic observables.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Structural data and pure math: the periodic box
//!   (`BoxGeometry`), the structure-of-arrays `ParticleStore`, particle groups, angle
//!   topology, host/accelerator mirrored buffers, the domain communicator abstraction and
//!   the analytic angle potentials.
//!
//! - **[`engine`]: The Stepping Core.** The stateful machinery advanced once per timestep:
//!   the force arena and `ForceContribution` trait, the `IntegrationMethod` trait with the
//!   NVE method and the FIRE minimizer, the `Integrator` that orchestrates them, and the
//!   `ThermoReducer` with its lazy cross-domain reduction.
//!
//! - **[`workflows`]: The Public API.** Drivers that tie the engine to a system for
//!   complete procedures, such as minimizing to convergence or running dynamics while
//!   sampling observables.

pub mod core;
pub mod engine;
pub mod workflows;

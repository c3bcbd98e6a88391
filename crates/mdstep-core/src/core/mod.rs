//! # Core Module
//!
//! Structural building blocks shared by every stepping component.
//!
//! - **System Representation** ([`models`]) - Periodic box, particle store, groups, angle
//!   topology, the per-particle virial type and the `SystemDefinition` that bundles them
//! - **Buffers and Execution** ([`memory`]) - Host/accelerator mirrored arrays with scoped
//!   access handles, and the execution configuration that says whether an accelerator exists
//! - **Domains** ([`domain`]) - The cross-domain reduction contract and its single-domain
//!   and in-process implementations
//! - **Force Field** ([`forcefield`]) - Analytic angle potentials and angle coefficient files
//! - **Utilities** ([`utils`]) - Wall-clock formatting

pub mod domain;
pub mod forcefield;
pub mod memory;
pub mod models;
pub mod utils;

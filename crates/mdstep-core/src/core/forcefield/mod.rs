//! Analytic potentials and their coefficient files.

pub mod params;
pub mod potentials;

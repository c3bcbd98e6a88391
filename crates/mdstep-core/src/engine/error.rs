use thiserror::Error;

use super::config::ConfigError;
use super::force::ForceError;
use super::thermo::ThermoError;
use crate::core::memory::{BufferError, ExecutionError};
use crate::core::models::group::GroupError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Buffer access failed: {source}")]
    Buffer {
        #[from]
        source: BufferError,
    },

    #[error("Execution configuration error: {source}")]
    Execution {
        #[from]
        source: ExecutionError,
    },

    #[error("Force computation failed: {source}")]
    Force {
        #[from]
        source: ForceError,
    },

    #[error("Thermodynamic reduction failed: {source}")]
    Thermo {
        #[from]
        source: ThermoError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Group construction failed: {source}")]
    Group {
        #[from]
        source: GroupError,
    },

    #[error("Integrator has no integration methods to advance")]
    NoIntegrationMethods,

    #[error("Force arena holds {arena} particles but the system holds {system}")]
    ArenaSizeMismatch { arena: usize, system: usize },

    #[error("Unknown log quantity '{0}'")]
    UnknownLogQuantity(String),
}

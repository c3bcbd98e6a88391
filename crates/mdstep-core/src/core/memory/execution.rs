use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ExecutionError {
    #[error("'{component}' requires an accelerator, but the execution configuration has none")]
    AcceleratorUnavailable { component: &'static str },
}

/// Description of an accelerator context available to accelerator-backed components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceleratorDevice {
    pub name: String,
}

impl AcceleratorDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionConfig {
    accelerator: Option<AcceleratorDevice>,
}

impl ExecutionConfig {
    pub fn cpu() -> Self {
        Self { accelerator: None }
    }

    pub fn with_accelerator(device: AcceleratorDevice) -> Self {
        Self {
            accelerator: Some(device),
        }
    }

    pub fn accelerator(&self) -> Option<&AcceleratorDevice> {
        self.accelerator.as_ref()
    }

    pub fn has_accelerator(&self) -> bool {
        self.accelerator.is_some()
    }

    /// Returns the accelerator for `component`, or the error that must abort its construction.
    pub fn require_accelerator(
        &self,
        component: &'static str,
    ) -> Result<&AcceleratorDevice, ExecutionError> {
        self.accelerator
            .as_ref()
            .ok_or(ExecutionError::AcceleratorUnavailable { component })
    }
}

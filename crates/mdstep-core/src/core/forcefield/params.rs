use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Unrecognized 1-3 repulsion selector {0}; expected 0, 1, 2 or 3")]
pub struct UnknownRepulsionForm(pub u32);

/// Power-law form of the 1-3 repulsion applied inside coarse-grained angles.
///
/// Each form is `pref * eps * ((sigma/r)^p1 - (sigma/r)^p2)`, with the prefactor chosen so
/// that the well depth is exactly `eps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "u32")]
pub enum RepulsionForm {
    #[default]
    None,
    Lj9_6,
    Lj12_4,
    Lj12_6,
}

impl RepulsionForm {
    pub fn selector(self) -> u32 {
        match self {
            RepulsionForm::None => 0,
            RepulsionForm::Lj9_6 => 1,
            RepulsionForm::Lj12_4 => 2,
            RepulsionForm::Lj12_6 => 3,
        }
    }

    #[inline]
    pub fn exponents(self) -> Option<(f64, f64)> {
        match self {
            RepulsionForm::None => None,
            RepulsionForm::Lj9_6 => Some((9.0, 6.0)),
            RepulsionForm::Lj12_4 => Some((12.0, 4.0)),
            RepulsionForm::Lj12_6 => Some((12.0, 6.0)),
        }
    }

    #[inline]
    pub fn prefactor(self) -> f64 {
        match self {
            RepulsionForm::None => 0.0,
            RepulsionForm::Lj9_6 => 6.75,
            RepulsionForm::Lj12_4 => 2.59807621135332,
            RepulsionForm::Lj12_6 => 4.0,
        }
    }

    /// Separation of the potential minimum, `sigma * (p1/p2)^(1/(p1-p2))`.
    pub fn cutoff(self, sigma: f64) -> f64 {
        match self.exponents() {
            Some((p1, p2)) => sigma * ((p1 / p2).ln() / (p1 - p2)).exp(),
            None => 0.0,
        }
    }
}

impl TryFrom<u32> for RepulsionForm {
    type Error = UnknownRepulsionForm;

    fn try_from(selector: u32) -> Result<Self, Self::Error> {
        match selector {
            0 => Ok(RepulsionForm::None),
            1 => Ok(RepulsionForm::Lj9_6),
            2 => Ok(RepulsionForm::Lj12_4),
            3 => Ok(RepulsionForm::Lj12_6),
            other => Err(UnknownRepulsionForm(other)),
        }
    }
}

/// Coefficients of one angle type.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AngleCoeff {
    /// Bending stiffness.
    pub k: f64,
    /// Equilibrium angle in radians.
    pub t0: f64,
    #[serde(default)]
    pub cg_type: RepulsionForm,
    #[serde(default)]
    pub epsilon: f64,
    #[serde(default)]
    pub sigma: f64,
}

impl AngleCoeff {
    pub fn new(k: f64, t0: f64, cg_type: RepulsionForm, epsilon: f64, sigma: f64) -> Self {
        Self {
            k,
            t0,
            cg_type,
            epsilon,
            sigma,
        }
    }

    pub fn harmonic(k: f64, t0: f64) -> Self {
        Self::new(k, t0, RepulsionForm::None, 0.0, 0.0)
    }
}

/// Angle coefficients keyed by angle type name, as read from a TOML file.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct AngleParamSet {
    #[serde(default)]
    pub angle: HashMap<String, AngleCoeff>,
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

impl AngleParamSet {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn get(&self, type_name: &str) -> Option<&AngleCoeff> {
        self.angle.get(type_name)
    }
}

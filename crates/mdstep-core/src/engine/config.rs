use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Parameter '{name}' = {value} is out of range (expected {expected})")]
    OutOfRange {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
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

fn check(
    name: &'static str,
    value: f64,
    ok: bool,
    expected: &'static str,
) -> Result<(), ConfigError> {
    if ok && !value.is_nan() {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            expected,
        })
    }
}

/// Settings of the constant-energy two-step method.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct NveParams {
    /// Maximum distance a particle may move in one step.
    #[serde(default)]
    pub limit: Option<f64>,
    /// Integrate as if every force were zero.
    #[serde(default)]
    pub zero_force: bool,
}

impl NveParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(limit) = self.limit {
            check("limit", limit, limit > 0.0, "> 0")?;
        }
        Ok(())
    }
}

/// Validated FIRE minimizer parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireParams {
    /// Consecutive downhill steps required before the step may grow.
    pub nmin: u32,
    pub finc: f64,
    pub fdec: f64,
    pub alpha_start: f64,
    pub falpha: f64,
    /// Convergence threshold on the RMS force.
    pub ftol: f64,
    /// Convergence threshold on the step-to-step potential energy change.
    pub etol: f64,
    /// Steps that must elapse before convergence is checked.
    pub min_steps: u64,
    /// Initial timestep.
    pub dt: f64,
    pub dt_max: f64,
}

impl Default for FireParams {
    fn default() -> Self {
        Self {
            nmin: 5,
            finc: 1.1,
            fdec: 0.5,
            alpha_start: 0.1,
            falpha: 0.99,
            ftol: 1e-1,
            etol: 1e-5,
            min_steps: 10,
            dt: 0.005,
            dt_max: 0.05,
        }
    }
}

impl FireParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check("dt", self.dt, self.dt > 0.0, "> 0")?;
        check("dt_max", self.dt_max, self.dt_max >= self.dt, ">= dt")?;
        check("finc", self.finc, self.finc > 1.0, "> 1")?;
        check("fdec", self.fdec, self.fdec > 0.0 && self.fdec < 1.0, "in (0, 1)")?;
        check(
            "alpha_start",
            self.alpha_start,
            self.alpha_start > 0.0 && self.alpha_start < 1.0,
            "in (0, 1)",
        )?;
        check(
            "falpha",
            self.falpha,
            self.falpha > 0.0 && self.falpha < 1.0,
            "in (0, 1)",
        )?;
        check("ftol", self.ftol, self.ftol >= 0.0, ">= 0")?;
        check("etol", self.etol, self.etol >= 0.0, ">= 0")?;
        Ok(())
    }
}

/// Builder for [`FireParams`]; unset knobs take their defaults, and an unset `dt_max` is
/// ten times the initial timestep.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FireParamsBuilder {
    nmin: Option<u32>,
    finc: Option<f64>,
    fdec: Option<f64>,
    alpha_start: Option<f64>,
    falpha: Option<f64>,
    ftol: Option<f64>,
    etol: Option<f64>,
    min_steps: Option<u64>,
    dt: Option<f64>,
    dt_max: Option<f64>,
}

impl FireParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nmin(mut self, nmin: u32) -> Self {
        self.nmin = Some(nmin);
        self
    }
    pub fn finc(mut self, finc: f64) -> Self {
        self.finc = Some(finc);
        self
    }
    pub fn fdec(mut self, fdec: f64) -> Self {
        self.fdec = Some(fdec);
        self
    }
    pub fn alpha_start(mut self, alpha: f64) -> Self {
        self.alpha_start = Some(alpha);
        self
    }
    pub fn falpha(mut self, falpha: f64) -> Self {
        self.falpha = Some(falpha);
        self
    }
    pub fn ftol(mut self, ftol: f64) -> Self {
        self.ftol = Some(ftol);
        self
    }
    pub fn etol(mut self, etol: f64) -> Self {
        self.etol = Some(etol);
        self
    }
    pub fn min_steps(mut self, steps: u64) -> Self {
        self.min_steps = Some(steps);
        self
    }
    pub fn dt(mut self, dt: f64) -> Self {
        self.dt = Some(dt);
        self
    }
    pub fn dt_max(mut self, dt_max: f64) -> Self {
        self.dt_max = Some(dt_max);
        self
    }

    pub fn build(self) -> Result<FireParams, ConfigError> {
        let defaults = FireParams::default();
        let dt = self.dt.unwrap_or(defaults.dt);
        let params = FireParams {
            nmin: self.nmin.unwrap_or(defaults.nmin),
            finc: self.finc.unwrap_or(defaults.finc),
            fdec: self.fdec.unwrap_or(defaults.fdec),
            alpha_start: self.alpha_start.unwrap_or(defaults.alpha_start),
            falpha: self.falpha.unwrap_or(defaults.falpha),
            ftol: self.ftol.unwrap_or(defaults.ftol),
            etol: self.etol.unwrap_or(defaults.etol),
            min_steps: self.min_steps.unwrap_or(defaults.min_steps),
            dt,
            dt_max: self.dt_max.unwrap_or(10.0 * dt),
        };
        params.validate()?;
        Ok(params)
    }
}

/// Settings of a thermodynamic reducer.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ThermoParams {
    /// Translational degrees of freedom; `D*N - D` for the group when unset.
    #[serde(default)]
    pub ndof: Option<u32>,
    #[serde(default)]
    pub rotational_ndof: u32,
    /// Suffix appended to every quantity key the reducer provides.
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct IntegratorParams {
    #[serde(default)]
    pub dt: Option<f64>,
}

/// A complete run description, usually read from a TOML file.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SimulationConfig {
    #[serde(default)]
    pub integrator: IntegratorParams,
    #[serde(default)]
    pub nve: NveParams,
    #[serde(default)]
    pub minimizer: FireParamsBuilder,
    #[serde(default)]
    pub thermo: ThermoParams,
}

impl SimulationConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn delta_t(&self) -> Result<f64, ConfigError> {
        let dt = self
            .integrator
            .dt
            .ok_or(ConfigError::MissingParameter("integrator.dt"))?;
        check("integrator.dt", dt, dt > 0.0, "> 0")?;
        Ok(dt)
    }

    pub fn fire_params(&self) -> Result<FireParams, ConfigError> {
        self.minimizer.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn builder_uses_defaults_for_unset_knobs() {
        let params = FireParamsBuilder::new().dt(0.01).build().unwrap();
        assert_eq!(params.nmin, 5);
        assert_eq!(params.finc, 1.1);
        assert_eq!(params.dt, 0.01);
        assert_eq!(params.dt_max, 0.1);
    }

    #[test]
    fn builder_rejects_out_of_range_knobs() {
        assert_eq!(
            FireParamsBuilder::new().finc(1.0).build(),
            Err(ConfigError::OutOfRange {
                name: "finc",
                value: 1.0,
                expected: "> 1"
            })
        );
        assert!(FireParamsBuilder::new().fdec(1.0).build().is_err());
        assert!(FireParamsBuilder::new().fdec(0.0).build().is_err());
        assert!(FireParamsBuilder::new().alpha_start(1.5).build().is_err());
        assert!(FireParamsBuilder::new().falpha(0.0).build().is_err());
        assert!(FireParamsBuilder::new().dt(-1.0).build().is_err());
        assert!(FireParamsBuilder::new().dt(0.1).dt_max(0.05).build().is_err());
        assert!(FireParamsBuilder::new().ftol(f64::NAN).build().is_err());
    }

    #[test]
    fn nve_limit_must_be_positive() {
        let params = NveParams {
            limit: Some(0.0),
            zero_force: false,
        };
        assert!(params.validate().is_err());
        assert!(NveParams::default().validate().is_ok());
    }

    #[test]
    fn load_reads_every_section() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.toml");
        fs::write(
            &path,
            r#"
            [integrator]
            dt = 0.002

            [nve]
            limit = 0.05

            [minimizer]
            ftol = 1e-4
            min-steps = 20
            dt = 0.01

            [thermo]
            ndof = 30
            label = "_solvent"
            "#,
        )
        .unwrap();

        let config = SimulationConfig::load(&path).unwrap();
        assert_eq!(config.delta_t().unwrap(), 0.002);
        assert_eq!(config.nve.limit, Some(0.05));
        assert!(!config.nve.zero_force);
        let fire = config.fire_params().unwrap();
        assert_eq!(fire.ftol, 1e-4);
        assert_eq!(fire.min_steps, 20);
        assert_eq!(fire.dt, 0.01);
        assert_eq!(fire.dt_max, 0.1);
        assert_eq!(config.thermo.ndof, Some(30));
        assert_eq!(config.thermo.label, "_solvent");
    }

    #[test]
    fn missing_timestep_is_reported() {
        let config = SimulationConfig::default();
        assert_eq!(
            config.delta_t(),
            Err(ConfigError::MissingParameter("integrator.dt"))
        );
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("typo.toml");
        fs::write(&path, "[minimizer]\nfinc-typo = 2.0\n").unwrap();
        assert!(matches!(
            SimulationConfig::load(&path),
            Err(ConfigLoadError::Toml { .. })
        ));
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            SimulationConfig::load(&dir.path().join("absent.toml")),
            Err(ConfigLoadError::Io { .. })
        ));
    }
}

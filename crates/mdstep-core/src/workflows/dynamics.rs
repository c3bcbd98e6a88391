use crate::core::models::system::SystemDefinition;
use crate::core::utils::clock::Clock;
use crate::engine::config::ConfigError;
use crate::engine::error::EngineError;
use crate::engine::flags::RequestedFlags;
use crate::engine::integrator::Integrator;
use crate::engine::thermo::ThermoReducer;
use tracing::{debug, info, instrument};

/// Observables of one sampled timestep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermoSample {
    pub timestep: u64,
    pub temperature: f64,
    pub kinetic_energy: f64,
    pub potential_energy: f64,
    pub pressure: f64,
}

impl ThermoSample {
    pub fn total_energy(&self) -> f64 {
        self.kinetic_energy + self.potential_energy
    }
}

/// Advances `steps` timesteps from `start_timestep`, sampling `thermo` after every
/// `sample_period`-th update.
///
/// Potential energy and the isotropic virial are added to the integrator's requested flags
/// so that every sample carries them.
#[instrument(skip_all, name = "dynamics_workflow")]
pub fn run(
    system: &SystemDefinition,
    integrator: &mut Integrator,
    thermo: &mut ThermoReducer,
    start_timestep: u64,
    steps: u64,
    sample_period: u64,
) -> Result<Vec<ThermoSample>, EngineError> {
    if sample_period == 0 {
        return Err(ConfigError::OutOfRange {
            name: "sample_period",
            value: 0.0,
            expected: ">= 1",
        }
        .into());
    }
    integrator.set_requested_flags(
        integrator.requested_flags()
            | RequestedFlags::POTENTIAL_ENERGY
            | RequestedFlags::ISOTROPIC_VIRIAL,
    );
    info!(start_timestep, steps, sample_period, "Starting dynamics run.");
    let clock = Clock::start();

    let mut samples = Vec::with_capacity((steps / sample_period) as usize);
    let mut timestep = start_timestep;
    for step in 1..=steps {
        integrator.update(timestep, system)?;
        timestep += 1;
        if step % sample_period == 0 {
            thermo.compute(timestep, &integrator.step_context(system))?;
            let sample = ThermoSample {
                timestep,
                temperature: thermo.temperature(),
                kinetic_energy: thermo.kinetic_energy(),
                potential_energy: thermo.potential_energy(),
                pressure: thermo.pressure(),
            };
            debug!(
                timestep,
                temperature = sample.temperature,
                potential_energy = sample.potential_energy,
                pressure = sample.pressure,
                "Sampled thermodynamic state"
            );
            samples.push(sample);
        }
    }

    info!(
        samples = samples.len(),
        elapsed = %clock.elapsed_hms(),
        "Dynamics run complete."
    );
    Ok(samples)
}

use crate::core::models::system::SystemDefinition;
use crate::core::utils::clock::Clock;
use crate::engine::error::EngineError;
use crate::engine::integrator::Integrator;
use std::time::Duration;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct MinimizationReport {
    pub converged: bool,
    /// Number of integrator updates performed.
    pub steps: u64,
    /// Timestep the system is at after the last update.
    pub final_timestep: u64,
    pub elapsed: Duration,
}

/// Updates `integrator` from `start_timestep` until it reports convergence or `max_steps`
/// updates have been made.
#[instrument(skip_all, name = "minimize_workflow")]
pub fn run(
    system: &SystemDefinition,
    integrator: &mut Integrator,
    start_timestep: u64,
    max_steps: u64,
) -> Result<MinimizationReport, EngineError> {
    info!(start_timestep, max_steps, "Starting energy minimization.");
    let clock = Clock::start();

    let mut timestep = start_timestep;
    let mut steps = 0;
    while steps < max_steps && !integrator.has_converged() {
        integrator.update(timestep, system)?;
        timestep += 1;
        steps += 1;
    }

    let converged = integrator.has_converged();
    if converged {
        info!(
            steps,
            elapsed = %clock.elapsed_hms(),
            "Minimization converged."
        );
    } else {
        warn!(steps, "Minimization stopped at the step cap without converging.");
    }

    Ok(MinimizationReport {
        converged,
        steps,
        final_timestep: timestep,
        elapsed: clock.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::SingleDomain;
    use crate::core::models::group::{GroupSelector, ParticleGroup};
    use crate::engine::config::{FireParamsBuilder, NveParams};
    use crate::engine::methods::{FireMinimizer, TwoStepNve};
    use crate::engine::testing::{HarmonicTrap, trapped_system};
    use nalgebra::{Point3, Vector3};
    use std::sync::Arc;

    fn all(system: &SystemDefinition) -> Arc<ParticleGroup> {
        Arc::new(
            ParticleGroup::new("all", system.particles(), &GroupSelector::All, &SingleDomain)
                .unwrap(),
        )
    }

    #[test]
    fn fire_minimization_reaches_the_trap_minimum() {
        let system = trapped_system(&[
            (Point3::new(1.5, -0.5, 0.25), Vector3::zeros()),
            (Point3::new(-1.0, 2.0, 0.0), Vector3::zeros()),
        ]);
        let params = FireParamsBuilder::default()
            .dt(0.01)
            .ftol(1e-6)
            .etol(1e-10)
            .build()
            .unwrap();
        let mut integrator = Integrator::new(&system, params.dt).unwrap();
        integrator.add_force(Box::new(HarmonicTrap::new(1.0)));
        integrator.add_method(Box::new(
            FireMinimizer::new(&system, all(&system), params).unwrap(),
        ));

        let report = run(&system, &mut integrator, 100, 5_000).unwrap();

        assert!(report.converged);
        assert!(report.steps > 0 && report.steps < 5_000);
        assert_eq!(report.final_timestep, 100 + report.steps);
        for p in system.particles().positions().to_vec().unwrap() {
            assert!(p.coords.norm() < 1e-5);
        }
    }

    #[test]
    fn without_searching_methods_the_step_cap_is_hit() {
        let system = trapped_system(&[(Point3::new(1.0, 0.0, 0.0), Vector3::zeros())]);
        let mut integrator = Integrator::new(&system, 0.01).unwrap();
        integrator.add_force(Box::new(HarmonicTrap::new(1.0)));
        integrator.add_method(Box::new(
            TwoStepNve::new(all(&system), NveParams::default()).unwrap(),
        ));

        let report = run(&system, &mut integrator, 0, 20).unwrap();

        assert!(!report.converged);
        assert_eq!(report.steps, 20);
        assert_eq!(report.final_timestep, 20);
    }
}

use super::config::ConfigError;
use super::error::EngineError;
use super::flags::RequestedFlags;
use super::force::{ForceArena, ForceContext, ForceContribution};
use super::method::{IntegrationMethod, StepContext};
use crate::core::models::ids::{ForceId, MethodId};
use crate::core::models::system::SystemDefinition;
use slotmap::SlotMap;
use tracing::{debug, instrument};

/// Orchestrates force contributions and integration methods, one timestep at a time.
///
/// The integrator owns the net-force arena. Each [`update`](Self::update) makes sure the
/// arena holds forces for the current configuration, runs the first half-step of every
/// method, recomputes forces for the moved configuration and runs the second half-step.
/// Contributions and methods run in registration order.
pub struct Integrator {
    delta_t: f64,
    forces: SlotMap<ForceId, Box<dyn ForceContribution>>,
    methods: SlotMap<MethodId, Box<dyn IntegrationMethod>>,
    arena: ForceArena,
    requested_flags: RequestedFlags,
}

fn check_delta_t(delta_t: f64) -> Result<(), ConfigError> {
    if delta_t > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name: "delta_t",
            value: delta_t,
            expected: "> 0",
        })
    }
}

impl Integrator {
    pub fn new(system: &SystemDefinition, delta_t: f64) -> Result<Self, EngineError> {
        check_delta_t(delta_t)?;
        Ok(Self {
            delta_t,
            forces: SlotMap::with_key(),
            methods: SlotMap::with_key(),
            arena: ForceArena::new(system.particles().len()),
            requested_flags: RequestedFlags::NONE,
        })
    }

    pub fn delta_t(&self) -> f64 {
        self.delta_t
    }

    /// Changes the timestep of the integrator and of every registered method that does not
    /// adapt its own.
    pub fn set_delta_t(&mut self, delta_t: f64) -> Result<(), ConfigError> {
        check_delta_t(delta_t)?;
        self.delta_t = delta_t;
        for method in self.methods.values_mut() {
            if !method.adapts_delta_t() {
                method.set_delta_t(delta_t);
            }
        }
        Ok(())
    }

    pub fn add_force(&mut self, force: Box<dyn ForceContribution>) -> ForceId {
        debug!(force = force.name(), "Registering force contribution");
        self.arena.invalidate();
        self.forces.insert(force)
    }

    pub fn remove_force(&mut self, id: ForceId) -> Option<Box<dyn ForceContribution>> {
        let removed = self.forces.remove(id);
        if removed.is_some() {
            self.arena.invalidate();
        }
        removed
    }

    pub fn force(&self, id: ForceId) -> Option<&dyn ForceContribution> {
        self.forces.get(id).map(|f| f.as_ref())
    }

    pub fn add_method(&mut self, mut method: Box<dyn IntegrationMethod>) -> MethodId {
        debug!(method = method.name(), "Registering integration method");
        if !method.adapts_delta_t() {
            method.set_delta_t(self.delta_t);
        }
        self.methods.insert(method)
    }

    pub fn remove_method(&mut self, id: MethodId) -> Option<Box<dyn IntegrationMethod>> {
        self.methods.remove(id)
    }

    pub fn method(&self, id: MethodId) -> Option<&dyn IntegrationMethod> {
        self.methods.get(id).map(|m| m.as_ref())
    }

    pub fn methods(&self) -> impl Iterator<Item = &dyn IntegrationMethod> {
        self.methods.values().map(|m| m.as_ref())
    }

    /// Observables requested by the caller, in addition to those the methods request.
    pub fn set_requested_flags(&mut self, flags: RequestedFlags) {
        self.requested_flags = flags;
    }

    pub fn requested_flags(&self) -> RequestedFlags {
        self.methods
            .values()
            .fold(self.requested_flags, |acc, m| acc | m.requested_flags())
    }

    pub fn arena(&self) -> &ForceArena {
        &self.arena
    }

    /// Read-only view for observable reducers consuming the current step.
    pub fn step_context<'a>(&'a self, system: &'a SystemDefinition) -> StepContext<'a> {
        StepContext {
            system,
            forces: &self.arena,
            flags: self.requested_flags(),
        }
    }

    /// Clears the arena and lets every contribution add its share for `timestep`.
    #[instrument(skip_all, name = "net_force", fields(timestep = timestep))]
    pub fn compute_net_force(
        &mut self,
        timestep: u64,
        system: &SystemDefinition,
    ) -> Result<(), EngineError> {
        if self.arena.len() != system.particles().len() {
            return Err(EngineError::ArenaSizeMismatch {
                arena: self.arena.len(),
                system: system.particles().len(),
            });
        }
        let flags = self.requested_flags();
        let ctx = ForceContext { system, flags };
        self.arena.clear()?;
        for force in self.forces.values_mut() {
            force.compute_forces(timestep, &ctx, &mut self.arena)?;
        }
        self.arena.mark_computed(timestep, flags);
        Ok(())
    }

    /// Computes forces for `timestep` unless the arena already holds them with every
    /// observable currently requested.
    pub fn prepare(&mut self, timestep: u64, system: &SystemDefinition) -> Result<(), EngineError> {
        if !self.arena.is_current(timestep, self.requested_flags()) {
            self.compute_net_force(timestep, system)?;
        }
        Ok(())
    }

    /// Advances every method from `timestep` to `timestep + 1`.
    #[instrument(skip_all, name = "integrator_update", fields(timestep = timestep))]
    pub fn update(&mut self, timestep: u64, system: &SystemDefinition) -> Result<(), EngineError> {
        if self.methods.is_empty() {
            return Err(EngineError::NoIntegrationMethods);
        }
        self.prepare(timestep, system)?;

        let flags = self.requested_flags();
        {
            let ctx = StepContext {
                system,
                forces: &self.arena,
                flags,
            };
            for method in self.methods.values_mut() {
                method.step_one(timestep, &ctx)?;
            }
        }

        self.compute_net_force(timestep + 1, system)?;

        let ctx = StepContext {
            system,
            forces: &self.arena,
            flags,
        };
        for method in self.methods.values_mut() {
            method.step_two(timestep, &ctx)?;
        }
        Ok(())
    }

    /// True once every searching method has converged; false if there is none.
    pub fn has_converged(&self) -> bool {
        let mut searching = self.methods.values().filter_map(|m| m.convergence()).peekable();
        searching.peek().is_some() && searching.all(|converged| converged)
    }

    pub fn reset(&mut self) {
        for method in self.methods.values_mut() {
            method.reset();
        }
    }

    pub fn provided_log_quantities(&self) -> Vec<String> {
        self.forces
            .values()
            .flat_map(|f| f.provided_log_quantities())
            .collect()
    }

    pub fn log_value(&self, quantity: &str) -> Result<f64, EngineError> {
        self.forces
            .values()
            .find(|f| f.provided_log_quantities().iter().any(|q| q == quantity))
            .ok_or_else(|| EngineError::UnknownLogQuantity(quantity.to_string()))?
            .log_value(quantity)
            .map_err(EngineError::from)
    }
}

impl std::fmt::Debug for Integrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integrator")
            .field("delta_t", &self.delta_t)
            .field(
                "forces",
                &self.forces.values().map(|f| f.name()).collect::<Vec<_>>(),
            )
            .field(
                "methods",
                &self.methods.values().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field("requested_flags", &self.requested_flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::SingleDomain;
    use crate::core::forcefield::params::AngleCoeff;
    use crate::core::models::box_geometry::BoxGeometry;
    use crate::core::models::group::{GroupSelector, ParticleGroup};
    use crate::core::models::particle::{Particle, ParticleStore};
    use crate::core::models::topology::AngleTable;
    use crate::engine::config::{FireParamsBuilder, NveParams};
    use crate::engine::forces::angle::CoarseGrainAngleForce;
    use crate::engine::methods::fire::FireMinimizer;
    use crate::engine::methods::nve::TwoStepNve;
    use crate::engine::testing::{HarmonicTrap, trapped_system};
    use nalgebra::{Point3, Vector3};
    use std::sync::Arc;

    fn nve_for(system: &SystemDefinition) -> Box<TwoStepNve> {
        let group = Arc::new(
            ParticleGroup::new("all", system.particles(), &GroupSelector::All, &SingleDomain)
                .unwrap(),
        );
        Box::new(TwoStepNve::new(group, NveParams::default()).unwrap())
    }

    fn total_energy(system: &SystemDefinition, integrator: &Integrator) -> f64 {
        let velocities = system.particles().velocities().to_vec().unwrap();
        let forces = integrator.arena().forces().to_vec().unwrap();
        let kinetic: f64 = velocities
            .iter()
            .map(|v| 0.5 * v.w * v.xyz().norm_squared())
            .sum();
        let potential: f64 = forces.iter().map(|f| f.w).sum();
        kinetic + potential
    }

    #[test]
    fn new_rejects_non_positive_timestep() {
        let system = trapped_system(&[(Point3::origin(), Vector3::zeros())]);
        assert!(matches!(
            Integrator::new(&system, 0.0),
            Err(EngineError::Config { .. })
        ));
    }

    #[test]
    fn update_without_methods_is_an_error() {
        let system = trapped_system(&[(Point3::origin(), Vector3::zeros())]);
        let mut integrator = Integrator::new(&system, 0.01).unwrap();
        assert!(matches!(
            integrator.update(0, &system),
            Err(EngineError::NoIntegrationMethods)
        ));
    }

    #[test]
    fn nve_conserves_energy_in_harmonic_trap() {
        let system = trapped_system(&[
            (Point3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.5, 0.0)),
            (Point3::new(0.0, -0.5, 0.2), Vector3::new(0.3, 0.0, 0.0)),
        ]);
        let mut integrator = Integrator::new(&system, 0.01).unwrap();
        integrator.add_force(Box::new(HarmonicTrap::new(2.0)));
        integrator.add_method(nve_for(&system));

        integrator.prepare(0, &system).unwrap();
        let initial = total_energy(&system, &integrator);
        for step in 0..1_000 {
            integrator.update(step, &system).unwrap();
        }
        let drift = (total_energy(&system, &integrator) - initial).abs();
        assert!(drift < 1e-3 * initial, "energy drift {drift}");
    }

    #[test]
    fn forces_are_current_after_update() {
        let system = trapped_system(&[(Point3::new(1.0, 0.0, 0.0), Vector3::zeros())]);
        let mut integrator = Integrator::new(&system, 0.1).unwrap();
        integrator.add_force(Box::new(HarmonicTrap::new(1.0)));
        integrator.add_method(nve_for(&system));

        integrator.update(7, &system).unwrap();

        assert_eq!(integrator.arena().computed_for(), Some(8));
        let x = system.particles().positions().to_vec().unwrap()[0].x;
        let fx = integrator.arena().forces().to_vec().unwrap()[0].x;
        assert!((fx + x).abs() < 1e-12);
    }

    #[test]
    fn set_delta_t_propagates_to_methods() {
        let system = trapped_system(&[(Point3::origin(), Vector3::zeros())]);
        let mut integrator = Integrator::new(&system, 0.01).unwrap();
        let id = integrator.add_method(nve_for(&system));
        assert_eq!(integrator.method(id).unwrap().delta_t(), 0.01);

        integrator.set_delta_t(0.02).unwrap();
        assert_eq!(integrator.method(id).unwrap().delta_t(), 0.02);
        assert!(integrator.set_delta_t(-1.0).is_err());
    }

    #[test]
    fn removed_force_no_longer_contributes() {
        let system = trapped_system(&[(Point3::new(1.0, 0.0, 0.0), Vector3::zeros())]);
        let mut integrator = Integrator::new(&system, 0.01).unwrap();
        let id = integrator.add_force(Box::new(HarmonicTrap::new(1.0)));
        integrator.prepare(0, &system).unwrap();
        assert!(integrator.remove_force(id).is_some());
        assert!(integrator.force(id).is_none());

        integrator.prepare(0, &system).unwrap();
        let f = integrator.arena().forces().to_vec().unwrap()[0];
        assert_eq!(f.x, 0.0);
    }

    #[test]
    fn requested_flags_include_caller_and_method_requests() {
        let system = trapped_system(&[(Point3::origin(), Vector3::zeros())]);
        let mut integrator = Integrator::new(&system, 0.01).unwrap();
        integrator.set_requested_flags(RequestedFlags::PRESSURE_TENSOR);
        integrator.add_method(nve_for(&system));
        assert_eq!(integrator.requested_flags(), RequestedFlags::PRESSURE_TENSOR);
    }

    #[test]
    fn prepare_recomputes_when_new_observables_are_requested() {
        let system = trapped_system(&[(Point3::new(1.0, 0.0, 0.0), Vector3::zeros())]);
        let mut integrator = Integrator::new(&system, 0.01).unwrap();
        integrator.add_force(Box::new(HarmonicTrap::new(1.0)));
        integrator.add_method(nve_for(&system));

        integrator.prepare(0, &system).unwrap();
        assert_eq!(integrator.arena().virials().to_vec().unwrap()[0].xx, 0.0);

        integrator.set_requested_flags(RequestedFlags::ISOTROPIC_VIRIAL);
        integrator.prepare(0, &system).unwrap();
        assert_eq!(integrator.arena().virials().to_vec().unwrap()[0].xx, -1.0);
        assert!(
            integrator
                .arena()
                .computed_with()
                .contains(RequestedFlags::ISOTROPIC_VIRIAL)
        );

        // a narrower request is served by the existing arena
        integrator.set_requested_flags(RequestedFlags::NONE);
        assert!(
            integrator
                .arena()
                .is_current(0, integrator.requested_flags())
        );
    }

    #[test]
    fn adaptive_methods_keep_their_own_timestep() {
        let system = trapped_system(&[(Point3::new(0.5, 0.0, 0.0), Vector3::zeros())]);
        let group = Arc::new(
            ParticleGroup::new("all", system.particles(), &GroupSelector::All, &SingleDomain)
                .unwrap(),
        );
        let params = FireParamsBuilder::new().dt(0.01).build().unwrap();
        let mut integrator = Integrator::new(&system, 0.002).unwrap();
        let fire = integrator
            .add_method(Box::new(FireMinimizer::new(&system, group, params).unwrap()));
        let nve = integrator.add_method(nve_for(&system));
        assert_eq!(integrator.method(fire).unwrap().delta_t(), 0.01);

        integrator.set_delta_t(0.004).unwrap();
        assert_eq!(integrator.method(fire).unwrap().delta_t(), 0.01);
        assert_eq!(integrator.method(nve).unwrap().delta_t(), 0.004);
    }

    #[test]
    fn has_converged_is_false_without_searching_methods() {
        let system = trapped_system(&[(Point3::origin(), Vector3::zeros())]);
        let mut integrator = Integrator::new(&system, 0.01).unwrap();
        assert!(!integrator.has_converged());
        integrator.add_method(nve_for(&system));
        assert!(!integrator.has_converged());
    }

    #[test]
    fn log_value_forwards_to_providing_force() {
        let store = ParticleStore::from_particles(vec![
            Particle::new(Point3::new(1.0, 0.0, 0.0)),
            Particle::new(Point3::origin()),
            Particle::new(Point3::new(0.0, 1.0, 0.0)),
        ]);
        let mut table = AngleTable::new(["bend"]);
        table.add_angle(0, 1, 2, 0).unwrap();
        let system = SystemDefinition::new(store, BoxGeometry::cubic(10.0).unwrap())
            .with_angles(table)
            .unwrap();
        let mut angle = CoarseGrainAngleForce::new(&system).unwrap();
        angle.set_params(0, AngleCoeff::harmonic(2.0, 2.0)).unwrap();
        let mut integrator = Integrator::new(&system, 0.01).unwrap();
        integrator.add_force(Box::new(angle));
        integrator.prepare(0, &system).unwrap();

        assert_eq!(integrator.provided_log_quantities(), vec!["angle_cg_energy"]);
        let dth: f64 = std::f64::consts::FRAC_PI_2 - 2.0;
        let energy = integrator.log_value("angle_cg_energy").unwrap();
        assert!((energy - dth * dth).abs() < 1e-12);
        assert!(matches!(
            integrator.log_value("pair_energy"),
            Err(EngineError::UnknownLogQuantity(_))
        ));
    }

    #[test]
    fn arena_size_must_match_system() {
        let small = trapped_system(&[(Point3::origin(), Vector3::zeros())]);
        let large = trapped_system(&[
            (Point3::origin(), Vector3::zeros()),
            (Point3::new(1.0, 0.0, 0.0), Vector3::zeros()),
        ]);
        let mut integrator = Integrator::new(&small, 0.01).unwrap();
        assert!(matches!(
            integrator.compute_net_force(0, &large),
            Err(EngineError::ArenaSizeMismatch { arena: 1, system: 2 })
        ));
    }
}

use super::box_geometry::BoxGeometry;
use super::particle::ParticleStore;
use super::topology::{AngleTable, TopologyError};
use crate::core::domain::{Communicator, SingleDomain};
use crate::core::memory::ExecutionConfig;
use std::sync::Arc;

/// Everything a stepping component needs to know about the simulated system in this domain.
///
/// The definition is shared immutably; per-particle state is mutated through the scoped
/// handles of the store's mirrored arrays.
pub struct SystemDefinition {
    particles: ParticleStore,
    box_geometry: BoxGeometry,
    angles: AngleTable,
    execution: ExecutionConfig,
    communicator: Arc<dyn Communicator>,
}

impl SystemDefinition {
    pub fn new(particles: ParticleStore, box_geometry: BoxGeometry) -> Self {
        Self {
            particles,
            box_geometry,
            angles: AngleTable::default(),
            execution: ExecutionConfig::cpu(),
            communicator: Arc::new(SingleDomain),
        }
    }

    pub fn with_angles(mut self, angles: AngleTable) -> Result<Self, TopologyError> {
        angles.validate_against(self.particles.len())?;
        self.angles = angles;
        Ok(self)
    }

    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_communicator(mut self, communicator: Arc<dyn Communicator>) -> Self {
        self.communicator = communicator;
        self
    }

    pub fn particles(&self) -> &ParticleStore {
        &self.particles
    }

    pub fn box_geometry(&self) -> &BoxGeometry {
        &self.box_geometry
    }

    pub fn angles(&self) -> &AngleTable {
        &self.angles
    }

    pub fn execution(&self) -> &ExecutionConfig {
        &self.execution
    }

    pub fn communicator(&self) -> &Arc<dyn Communicator> {
        &self.communicator
    }

    /// Number of spatial dimensions as a float, for use in degree-of-freedom arithmetic.
    pub fn dimensions(&self) -> f64 {
        self.box_geometry.dimensions().count() as f64
    }
}

impl std::fmt::Debug for SystemDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemDefinition")
            .field("num_particles", &self.particles.len())
            .field("box_geometry", &self.box_geometry)
            .field("num_angles", &self.angles.angles().len())
            .field("execution", &self.execution)
            .field("rank", &self.communicator.rank())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::particle::Particle;
    use nalgebra::Point3;

    #[test]
    fn with_angles_rejects_indices_beyond_store() {
        let store = ParticleStore::from_particles(vec![Particle::new(Point3::origin()); 2]);
        let mut angles = AngleTable::new(["t"]);
        angles.add_angle(0, 1, 2, 0).unwrap();
        let result = SystemDefinition::new(store, BoxGeometry::cubic(5.0).unwrap()).with_angles(angles);
        assert!(matches!(
            result,
            Err(TopologyError::ParticleOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn defaults_to_single_domain_cpu() {
        let store = ParticleStore::from_particles(Vec::new());
        let system = SystemDefinition::new(store, BoxGeometry::cubic(5.0).unwrap());
        assert!(!system.execution().has_accelerator());
        assert_eq!(system.communicator().num_domains(), 1);
        assert_eq!(system.dimensions(), 3.0);
    }
}

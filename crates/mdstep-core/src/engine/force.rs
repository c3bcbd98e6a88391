use super::flags::RequestedFlags;
use crate::core::forcefield::params::UnknownRepulsionForm;
use crate::core::memory::{AccessLocation, AccessMode, BufferError, MirroredArray};
use crate::core::models::system::SystemDefinition;
use crate::core::models::virial::Virial;
use nalgebra::Vector4;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForceError {
    #[error("'{force}' needs at least one angle type, but the system defines none")]
    NoAngleTypes { force: String },
    #[error("Angle type {type_id} is out of range; {num_types} angle types are defined")]
    InvalidAngleType { type_id: u32, num_types: usize },
    #[error("No angle type named '{0}'")]
    UnknownAngleTypeName(String),
    #[error(transparent)]
    InvalidRepulsionForm(#[from] UnknownRepulsionForm),
    #[error("'{force}' does not provide log quantity '{quantity}'")]
    UnknownLogQuantity { force: String, quantity: String },
    #[error("Buffer access failed: {0}")]
    Buffer(#[from] BufferError),
}

/// Net per-particle force, energy and virial shared by every contribution of a step.
///
/// Force `xyz` and energy `w` are packed into one `Vector4`. Contributions only ever add
/// into the arena; the integrator clears it before each recomputation.
#[derive(Debug)]
pub struct ForceArena {
    forces: MirroredArray<Vector4<f64>>,
    virials: MirroredArray<Virial>,
    computed_for: Option<u64>,
    computed_with: RequestedFlags,
}

impl ForceArena {
    pub fn new(len: usize) -> Self {
        Self {
            forces: MirroredArray::filled("net_force", len, Vector4::zeros()),
            virials: MirroredArray::filled("net_virial", len, Virial::default()),
            computed_for: None,
            computed_with: RequestedFlags::NONE,
        }
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    pub fn forces(&self) -> &MirroredArray<Vector4<f64>> {
        &self.forces
    }

    pub fn virials(&self) -> &MirroredArray<Virial> {
        &self.virials
    }

    /// Timestep the current contents were computed for.
    pub fn computed_for(&self) -> Option<u64> {
        self.computed_for
    }

    /// Observables the current contents were computed with.
    pub fn computed_with(&self) -> RequestedFlags {
        self.computed_with
    }

    /// True when the contents belong to `timestep` and cover every observable in `flags`.
    pub fn is_current(&self, timestep: u64, flags: RequestedFlags) -> bool {
        self.computed_for == Some(timestep) && self.computed_with.contains(flags)
    }

    pub fn clear(&mut self) -> Result<(), BufferError> {
        self.forces
            .write(AccessLocation::Host, AccessMode::Overwrite)?
            .fill(Vector4::zeros());
        self.virials
            .write(AccessLocation::Host, AccessMode::Overwrite)?
            .fill(Virial::default());
        self.invalidate();
        Ok(())
    }

    pub(crate) fn mark_computed(&mut self, timestep: u64, flags: RequestedFlags) {
        self.computed_for = Some(timestep);
        self.computed_with = flags;
    }

    /// Forces the next step to recompute, e.g. after particles were moved externally.
    pub fn invalidate(&mut self) {
        self.computed_for = None;
        self.computed_with = RequestedFlags::NONE;
    }
}

/// Read-only inputs of a force computation.
#[derive(Debug, Clone, Copy)]
pub struct ForceContext<'a> {
    pub system: &'a SystemDefinition,
    pub flags: RequestedFlags,
}

/// One additive term of the net force.
///
/// Implementations add their per-particle force, energy and (when a virial is requested)
/// virial into the arena lent to them for the duration of the call. They must never
/// overwrite what earlier contributions wrote.
pub trait ForceContribution {
    fn name(&self) -> &str;

    fn compute_forces(
        &mut self,
        timestep: u64,
        ctx: &ForceContext<'_>,
        arena: &mut ForceArena,
    ) -> Result<(), ForceError>;

    /// Names of the scalar quantities this contribution can report.
    fn provided_log_quantities(&self) -> Vec<String> {
        Vec::new()
    }

    /// Value of a provided quantity as of the last computation.
    fn log_value(&self, quantity: &str) -> Result<f64, ForceError> {
        Err(ForceError::UnknownLogQuantity {
            force: self.name().to_string(),
            quantity: quantity.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_zeroes_forces_and_virials() {
        let mut arena = ForceArena::new(2);
        {
            let mut forces = arena
                .forces()
                .write(AccessLocation::Host, AccessMode::ReadWrite)
                .unwrap();
            forces[1] = Vector4::new(1.0, 2.0, 3.0, 4.0);
        }
        arena.mark_computed(5, RequestedFlags::VIRIAL);
        arena.clear().unwrap();

        assert_eq!(arena.computed_for(), None);
        assert_eq!(arena.computed_with(), RequestedFlags::NONE);
        assert!(arena.forces().to_vec().unwrap().iter().all(|f| *f == Vector4::zeros()));
        assert!(arena.virials().to_vec().unwrap().iter().all(|v| *v == Virial::default()));
    }

    #[test]
    fn default_log_value_reports_unknown_quantity() {
        struct Silent;
        impl ForceContribution for Silent {
            fn name(&self) -> &str {
                "silent"
            }
            fn compute_forces(
                &mut self,
                _timestep: u64,
                _ctx: &ForceContext<'_>,
                _arena: &mut ForceArena,
            ) -> Result<(), ForceError> {
                Ok(())
            }
        }

        assert!(Silent.provided_log_quantities().is_empty());
        assert!(matches!(
            Silent.log_value("energy"),
            Err(ForceError::UnknownLogQuantity { .. })
        ));
    }
}

use super::error::EngineError;
use super::flags::RequestedFlags;
use super::force::ForceArena;
use crate::core::models::system::SystemDefinition;

/// Read-only inputs shared by the half-steps of every method and by observable reducers.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub system: &'a SystemDefinition,
    pub forces: &'a ForceArena,
    pub flags: RequestedFlags,
}

/// A scheme that advances one particle group by one timestep in two half-steps.
///
/// `step_one` runs with the forces of the current configuration, after which the
/// integrator recomputes forces for the moved particles; `step_two` then sees the new
/// forces. Methods are stateful and may keep per-step bookkeeping between the calls.
pub trait IntegrationMethod {
    fn name(&self) -> &str;

    fn delta_t(&self) -> f64;

    fn set_delta_t(&mut self, delta_t: f64);

    /// Methods that adapt their own timestep keep it when the integrator's changes.
    fn adapts_delta_t(&self) -> bool {
        false
    }

    fn step_one(&mut self, timestep: u64, ctx: &StepContext<'_>) -> Result<(), EngineError>;

    fn step_two(&mut self, timestep: u64, ctx: &StepContext<'_>) -> Result<(), EngineError>;

    /// Observables this method needs the force contributions to produce.
    fn requested_flags(&self) -> RequestedFlags {
        RequestedFlags::NONE
    }

    /// `Some(converged)` for methods that search for a stationary point, `None` otherwise.
    fn convergence(&self) -> Option<bool> {
        None
    }

    /// Returns the method to its freshly constructed state.
    fn reset(&mut self) {}
}

use super::nve::{drift_and_kick, kick};
use crate::core::domain::Communicator;
use crate::core::memory::{AccessLocation, AccessMode};
use crate::core::models::group::ParticleGroup;
use crate::core::models::system::SystemDefinition;
use crate::engine::config::FireParams;
use crate::engine::error::EngineError;
use crate::engine::flags::RequestedFlags;
use crate::engine::method::{IntegrationMethod, StepContext};
use crate::engine::reduce::member_sum;
use nalgebra::Vector3;
use std::iter::Sum;
use std::ops::Add;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const NAME: &str = "fire_minimizer";

/// Adaptive state of the FIRE search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireState {
    pub delta_t: f64,
    pub alpha: f64,
    /// Consecutive steps with positive power `F.v`.
    pub n_since_negative: u32,
    /// Steps taken since the last reset.
    pub n_since_start: u64,
    pub last_energy: Option<f64>,
    pub converged: bool,
}

impl FireState {
    fn fresh(params: &FireParams) -> Self {
        Self {
            delta_t: params.dt,
            alpha: params.alpha_start,
            n_since_negative: 0,
            n_since_start: 0,
            last_energy: None,
            converged: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PowerTerms {
    power: f64,
    velocity_sq: f64,
    force_sq: f64,
    energy: f64,
}

impl Add for PowerTerms {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            power: self.power + rhs.power,
            velocity_sq: self.velocity_sq + rhs.velocity_sq,
            force_sq: self.force_sq + rhs.force_sq,
            energy: self.energy + rhs.energy,
        }
    }
}

impl Sum for PowerTerms {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, term| acc + term)
    }
}

/// Fast inertial relaxation engine.
///
/// Each step is a velocity-Verlet step with the minimizer's own adaptive timestep, after
/// which velocities are steered towards the force direction. While the power `F.v` stays
/// positive for more than `nmin` steps the timestep grows (up to `dt_max`) and the steering
/// weakens; as soon as it turns non-positive the particles are stopped, the timestep shrinks
/// and the steering is reset. The search converges once at least `min_steps` steps have
/// elapsed, the RMS force is at most `ftol` and the potential energy changed by at most
/// `etol` since the previous step. Once converged both half-steps do nothing until
/// [`reset`](IntegrationMethod::reset).
pub struct FireMinimizer {
    group: Arc<ParticleGroup>,
    params: FireParams,
    communicator: Arc<dyn Communicator>,
    state: FireState,
}

impl FireMinimizer {
    pub fn new(
        system: &SystemDefinition,
        group: Arc<ParticleGroup>,
        params: FireParams,
    ) -> Result<Self, EngineError> {
        params.validate()?;
        Ok(Self {
            group,
            params,
            communicator: Arc::clone(system.communicator()),
            state: FireState::fresh(&params),
        })
    }

    pub fn params(&self) -> &FireParams {
        &self.params
    }

    pub fn state(&self) -> &FireState {
        &self.state
    }

    pub fn has_converged(&self) -> bool {
        self.state.converged
    }
}

impl std::fmt::Debug for FireMinimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FireMinimizer")
            .field("group", &self.group.name())
            .field("params", &self.params)
            .field("state", &self.state)
            .finish()
    }
}

impl IntegrationMethod for FireMinimizer {
    fn name(&self) -> &str {
        NAME
    }

    fn delta_t(&self) -> f64 {
        self.state.delta_t
    }

    /// Restarts the adaptive timestep from `delta_t`.
    fn set_delta_t(&mut self, delta_t: f64) {
        self.params.dt = delta_t;
        self.params.dt_max = self.params.dt_max.max(delta_t);
        self.state.delta_t = delta_t;
    }

    fn adapts_delta_t(&self) -> bool {
        true
    }

    #[instrument(skip_all, name = "fire_step_one")]
    fn step_one(&mut self, _timestep: u64, ctx: &StepContext<'_>) -> Result<(), EngineError> {
        if self.state.converged || self.group.is_empty() {
            return Ok(());
        }
        let particles = ctx.system.particles();
        let mut positions = particles
            .positions()
            .write(AccessLocation::Host, AccessMode::ReadWrite)?;
        let mut images = particles
            .images()
            .write(AccessLocation::Host, AccessMode::ReadWrite)?;
        let mut velocities = particles
            .velocities()
            .write(AccessLocation::Host, AccessMode::ReadWrite)?;
        let forces = ctx.forces.forces().read(AccessLocation::Host)?;

        drift_and_kick(
            self.group.members(),
            &mut positions,
            &mut images,
            &mut velocities,
            &forces,
            ctx.system.box_geometry(),
            self.state.delta_t,
            None,
            false,
        );
        Ok(())
    }

    #[instrument(skip_all, name = "fire_step_two")]
    fn step_two(&mut self, timestep: u64, ctx: &StepContext<'_>) -> Result<(), EngineError> {
        if self.state.converged || self.group.global_size() == 0 {
            return Ok(());
        }
        let members = self.group.members();
        let mut velocities = ctx
            .system
            .particles()
            .velocities()
            .write(AccessLocation::Host, AccessMode::ReadWrite)?;
        let forces = ctx.forces.forces().read(AccessLocation::Host)?;

        kick(members, &mut velocities, &forces, self.state.delta_t, None, false);

        let local = {
            let vel: &[nalgebra::Vector4<f64>] = &velocities;
            let frc: &[nalgebra::Vector4<f64>] = &forces;
            member_sum(members, |i| {
                let v = vel[i].xyz();
                let f = frc[i].xyz();
                PowerTerms {
                    power: f.dot(&v),
                    velocity_sq: v.norm_squared(),
                    force_sq: f.norm_squared(),
                    energy: frc[i].w,
                }
            })
        };
        let external = if self.communicator.rank() == 0 {
            ctx.system.particles().external_energy()
        } else {
            0.0
        };
        let mut totals = [
            local.power,
            local.velocity_sq,
            local.force_sq,
            local.energy + external,
        ];
        self.communicator.all_reduce_sum(&mut totals);
        let [power, velocity_sq, force_sq, energy] = totals;

        let dof = ctx.system.dimensions() * self.group.global_size() as f64;
        let rms_force = (force_sq / dof).sqrt();
        let energy_change = self.state.last_energy.map(|last| (energy - last).abs());

        let state = &mut self.state;
        if state.n_since_start >= self.params.min_steps
            && rms_force <= self.params.ftol
            && energy_change.is_some_and(|de| de <= self.params.etol)
        {
            state.converged = true;
            state.last_energy = Some(energy);
            info!(
                timestep,
                steps = state.n_since_start,
                rms_force,
                energy,
                "FIRE minimization converged"
            );
            return Ok(());
        }

        if power > 0.0 {
            state.n_since_negative += 1;
            if state.n_since_negative > self.params.nmin {
                state.delta_t = (state.delta_t * self.params.finc).min(self.params.dt_max);
                state.alpha *= self.params.falpha;
            }
            let force_norm = force_sq.sqrt();
            if force_norm > 0.0 {
                let alpha = state.alpha;
                let steer = alpha * velocity_sq.sqrt() / force_norm;
                for &i in members {
                    let mass = velocities[i].w;
                    let v = velocities[i].xyz() * (1.0 - alpha) + forces[i].xyz() * steer;
                    velocities[i] = v.push(mass);
                }
            }
        } else {
            state.delta_t *= self.params.fdec;
            state.alpha = self.params.alpha_start;
            state.n_since_negative = 0;
            for &i in members {
                let mass = velocities[i].w;
                velocities[i] = Vector3::zeros().push(mass);
            }
            debug!(timestep, delta_t = state.delta_t, "FIRE uphill step, velocities reset");
        }

        state.n_since_start += 1;
        state.last_energy = Some(energy);
        Ok(())
    }

    fn requested_flags(&self) -> RequestedFlags {
        RequestedFlags::POTENTIAL_ENERGY
    }

    fn convergence(&self) -> Option<bool> {
        Some(self.state.converged)
    }

    fn reset(&mut self) {
        self.state = FireState::fresh(&self.params);
    }
}

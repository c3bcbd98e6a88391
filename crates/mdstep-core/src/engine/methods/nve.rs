use crate::core::memory::{AccessLocation, AccessMode};
use crate::core::models::box_geometry::BoxGeometry;
use crate::core::models::group::ParticleGroup;
use crate::core::models::system::SystemDefinition;
use crate::engine::config::{ConfigError, NveParams};
use crate::engine::error::EngineError;
use crate::engine::method::{IntegrationMethod, StepContext};
use nalgebra::{Point3, Vector3, Vector4};
use std::sync::Arc;
use tracing::{debug, instrument};

const NAME: &str = "two_step_nve";

#[inline]
fn acceleration(force: &Vector4<f64>, mass: f64, zero_force: bool) -> Vector3<f64> {
    if zero_force {
        Vector3::zeros()
    } else {
        force.xyz() / mass
    }
}

/// First velocity-Verlet half-step: drift positions a full step, kick velocities half a
/// step, then fold the moved particles back into the box.
#[allow(clippy::too_many_arguments)]
pub(crate) fn drift_and_kick(
    members: &[usize],
    positions: &mut [Point3<f64>],
    images: &mut [Vector3<i32>],
    velocities: &mut [Vector4<f64>],
    forces: &[Vector4<f64>],
    box_geometry: &BoxGeometry,
    delta_t: f64,
    limit: Option<f64>,
    zero_force: bool,
) {
    for &i in members {
        let mass = velocities[i].w;
        let accel = acceleration(&forces[i], mass, zero_force);
        let mut v = velocities[i].xyz();

        let mut dx = v * delta_t + accel * (0.5 * delta_t * delta_t);
        if let Some(limit) = limit {
            let len = dx.norm();
            if len > limit {
                dx *= limit / len;
            }
        }
        positions[i] += dx;
        v += accel * (0.5 * delta_t);
        velocities[i] = v.push(mass);

        box_geometry.wrap(&mut positions[i], &mut images[i]);
    }
}

/// Second velocity-Verlet half-step: kick velocities with the freshly computed forces.
pub(crate) fn kick(
    members: &[usize],
    velocities: &mut [Vector4<f64>],
    forces: &[Vector4<f64>],
    delta_t: f64,
    limit: Option<f64>,
    zero_force: bool,
) {
    for &i in members {
        let mass = velocities[i].w;
        let mut v = velocities[i].xyz() + acceleration(&forces[i], mass, zero_force) * (0.5 * delta_t);
        if let Some(limit) = limit {
            let speed = v.norm();
            if speed * delta_t > limit {
                v *= limit / (speed * delta_t);
            }
        }
        velocities[i] = v.push(mass);
    }
}

/// Constant-energy velocity-Verlet integration of one group.
///
/// The method can run on host memory or, when constructed with
/// [`TwoStepNve::on_accelerator`], on the accelerator copies of the particle arrays. Both
/// paths produce the same trajectory; they differ only in where the data lives afterwards.
#[derive(Debug, Clone)]
pub struct TwoStepNve {
    group: Arc<ParticleGroup>,
    params: NveParams,
    delta_t: f64,
    location: AccessLocation,
}

impl TwoStepNve {
    pub fn new(group: Arc<ParticleGroup>, params: NveParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self {
            group,
            params,
            delta_t: 0.0,
            location: AccessLocation::Host,
        })
    }

    /// Binds the method to the accelerator of `system`'s execution configuration.
    pub fn on_accelerator(
        system: &SystemDefinition,
        group: Arc<ParticleGroup>,
        params: NveParams,
    ) -> Result<Self, EngineError> {
        let device = system.execution().require_accelerator(NAME)?;
        debug!(device = %device.name, group = group.name(), "NVE bound to accelerator");
        let mut method = Self::new(group, params)?;
        method.location = AccessLocation::Device;
        Ok(method)
    }

    pub fn group(&self) -> &ParticleGroup {
        &self.group
    }

    pub fn location(&self) -> AccessLocation {
        self.location
    }

    pub fn limit(&self) -> Option<f64> {
        self.params.limit
    }

    /// Caps the per-step displacement, or removes the cap with `None`.
    pub fn set_limit(&mut self, limit: Option<f64>) -> Result<(), ConfigError> {
        let params = NveParams { limit, ..self.params };
        params.validate()?;
        self.params = params;
        Ok(())
    }

    pub fn set_zero_force(&mut self, zero_force: bool) {
        self.params.zero_force = zero_force;
    }
}

impl IntegrationMethod for TwoStepNve {
    fn name(&self) -> &str {
        NAME
    }

    fn delta_t(&self) -> f64 {
        self.delta_t
    }

    fn set_delta_t(&mut self, delta_t: f64) {
        self.delta_t = delta_t;
    }

    #[instrument(skip_all, name = "nve_step_one")]
    fn step_one(&mut self, _timestep: u64, ctx: &StepContext<'_>) -> Result<(), EngineError> {
        if self.group.is_empty() {
            return Ok(());
        }
        let particles = ctx.system.particles();
        let mut positions = particles
            .positions()
            .write(self.location, AccessMode::ReadWrite)?;
        let mut images = particles
            .images()
            .write(self.location, AccessMode::ReadWrite)?;
        let mut velocities = particles
            .velocities()
            .write(self.location, AccessMode::ReadWrite)?;
        let forces = ctx.forces.forces().read(self.location)?;

        drift_and_kick(
            self.group.members(),
            &mut positions,
            &mut images,
            &mut velocities,
            &forces,
            ctx.system.box_geometry(),
            self.delta_t,
            self.params.limit,
            self.params.zero_force,
        );
        Ok(())
    }

    #[instrument(skip_all, name = "nve_step_two")]
    fn step_two(&mut self, _timestep: u64, ctx: &StepContext<'_>) -> Result<(), EngineError> {
        if self.group.is_empty() {
            return Ok(());
        }
        let mut velocities = ctx
            .system
            .particles()
            .velocities()
            .write(self.location, AccessMode::ReadWrite)?;
        let forces = ctx.forces.forces().read(self.location)?;

        kick(
            self.group.members(),
            &mut velocities,
            &forces,
            self.delta_t,
            self.params.limit,
            self.params.zero_force,
        );
        Ok(())
    }
}

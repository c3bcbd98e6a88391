use super::force::{ForceArena, ForceContext, ForceContribution, ForceError};
use crate::core::memory::{AccessLocation, AccessMode};
use crate::core::models::box_geometry::BoxGeometry;
use crate::core::models::particle::{Particle, ParticleStore};
use crate::core::models::system::SystemDefinition;
use crate::core::models::virial::Virial;
use nalgebra::{Point3, Vector3};
use std::sync::{Arc, Mutex};
use tracing::Subscriber;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// Pulls every particle towards the origin with `F = -k x`.
#[derive(Debug)]
pub struct HarmonicTrap {
    stiffness: f64,
}

impl HarmonicTrap {
    pub fn new(stiffness: f64) -> Self {
        Self { stiffness }
    }
}

impl ForceContribution for HarmonicTrap {
    fn name(&self) -> &str {
        "harmonic_trap"
    }

    fn compute_forces(
        &mut self,
        _timestep: u64,
        ctx: &ForceContext<'_>,
        arena: &mut ForceArena,
    ) -> Result<(), ForceError> {
        let positions = ctx.system.particles().positions().read(AccessLocation::Host)?;
        let mut forces = arena
            .forces()
            .write(AccessLocation::Host, AccessMode::ReadWrite)?;
        let mut virials = ctx
            .flags
            .needs_virial()
            .then(|| arena.virials().write(AccessLocation::Host, AccessMode::ReadWrite))
            .transpose()?;

        for (i, p) in positions.iter().enumerate() {
            let r = p.coords;
            let f = -self.stiffness * r;
            forces[i].x += f.x;
            forces[i].y += f.y;
            forces[i].z += f.z;
            forces[i].w += 0.5 * self.stiffness * r.norm_squared();
            if let Some(virials) = virials.as_mut() {
                virials[i] += Virial::new(
                    r.x * f.x,
                    r.x * f.y,
                    r.x * f.z,
                    r.y * f.y,
                    r.y * f.z,
                    r.z * f.z,
                );
            }
        }
        Ok(())
    }
}

/// Unit-mass particles at the given positions and velocities in a large cubic box.
pub fn trapped_system(particles: &[(Point3<f64>, Vector3<f64>)]) -> SystemDefinition {
    let store = ParticleStore::from_particles(
        particles
            .iter()
            .map(|&(p, v)| Particle::new(p).with_velocity(v))
            .collect(),
    );
    SystemDefinition::new(store, BoxGeometry::cubic(50.0).expect("positive box length"))
}

/// Counts `WARN` events emitted while the returned guard is alive on this thread.
#[derive(Clone, Default)]
pub struct WarningCounter {
    messages: Arc<Mutex<Vec<String>>>,
}

impl WarningCounter {
    pub fn install() -> (Self, DefaultGuard) {
        let counter = Self::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (counter, guard)
    }

    pub fn count(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl tracing::field::Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for WarningCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::WARN {
            let mut message = String::new();
            event.record(&mut MessageVisitor(&mut message));
            if let Ok(mut messages) = self.messages.lock() {
                messages.push(message);
            }
        }
    }
}

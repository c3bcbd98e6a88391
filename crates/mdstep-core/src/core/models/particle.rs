use super::virial::Virial;
use crate::core::memory::MirroredArray;
use nalgebra::{Point3, Quaternion, Vector3, Vector4};
use std::cell::Cell;

/// Initial state of a single particle, used to assemble a [`ParticleStore`].
///
/// Fields not set explicitly take physically neutral defaults: unit mass, zero velocity,
/// identity orientation, zero angular momentum and a point-like (zero) moment of inertia.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Position inside the primary image of the box.
    pub position: Point3<f64>,
    /// Number of times the particle has crossed each periodic boundary.
    pub image: Vector3<i32>,
    pub velocity: Vector3<f64>,
    pub mass: f64,
    /// Index into the particle-type table.
    pub type_id: u32,
    /// Body-frame orientation as a unit quaternion.
    pub orientation: Quaternion<f64>,
    /// Conjugate angular momentum of the orientation quaternion.
    pub angular_momentum: Quaternion<f64>,
    /// Principal moments of inertia in the body frame.
    pub moment_of_inertia: Vector3<f64>,
}

impl Particle {
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            image: Vector3::zeros(),
            velocity: Vector3::zeros(),
            mass: 1.0,
            type_id: 0,
            orientation: Quaternion::identity(),
            angular_momentum: Quaternion::new(0.0, 0.0, 0.0, 0.0),
            moment_of_inertia: Vector3::zeros(),
        }
    }

    pub fn with_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_type(mut self, type_id: u32) -> Self {
        self.type_id = type_id;
        self
    }

    pub fn with_rotation(
        mut self,
        orientation: Quaternion<f64>,
        angular_momentum: Quaternion<f64>,
        moment_of_inertia: Vector3<f64>,
    ) -> Self {
        self.orientation = orientation;
        self.angular_momentum = angular_momentum;
        self.moment_of_inertia = moment_of_inertia;
        self
    }
}

/// Structure-of-arrays storage for the particles owned by this domain.
///
/// Every per-particle field is a [`MirroredArray`] of the same length, so components can
/// request exactly the fields they touch on the location they run on. Velocity and mass
/// are packed together (`w` holds the mass), matching the layout the integrators consume.
/// The store also carries the domain-global external energy and virial, contributed by
/// collaborators outside the per-particle force pipeline.
#[derive(Debug)]
pub struct ParticleStore {
    positions: MirroredArray<Point3<f64>>,
    images: MirroredArray<Vector3<i32>>,
    velocities: MirroredArray<Vector4<f64>>,
    orientations: MirroredArray<Quaternion<f64>>,
    angular_momenta: MirroredArray<Quaternion<f64>>,
    moments_of_inertia: MirroredArray<Vector3<f64>>,
    types: Vec<u32>,
    external_energy: Cell<f64>,
    external_virial: Cell<Virial>,
}

impl ParticleStore {
    pub fn from_particles(particles: Vec<Particle>) -> Self {
        let n = particles.len();
        let mut positions = Vec::with_capacity(n);
        let mut images = Vec::with_capacity(n);
        let mut velocities = Vec::with_capacity(n);
        let mut orientations = Vec::with_capacity(n);
        let mut angular_momenta = Vec::with_capacity(n);
        let mut moments_of_inertia = Vec::with_capacity(n);
        let mut types = Vec::with_capacity(n);

        for p in particles {
            positions.push(p.position);
            images.push(p.image);
            velocities.push(Vector4::new(p.velocity.x, p.velocity.y, p.velocity.z, p.mass));
            orientations.push(p.orientation);
            angular_momenta.push(p.angular_momentum);
            moments_of_inertia.push(p.moment_of_inertia);
            types.push(p.type_id);
        }

        Self {
            positions: MirroredArray::from_vec("positions", positions),
            images: MirroredArray::from_vec("images", images),
            velocities: MirroredArray::from_vec("velocities", velocities),
            orientations: MirroredArray::from_vec("orientations", orientations),
            angular_momenta: MirroredArray::from_vec("angular_momenta", angular_momenta),
            moments_of_inertia: MirroredArray::from_vec("moments_of_inertia", moments_of_inertia),
            types,
            external_energy: Cell::new(0.0),
            external_virial: Cell::new(Virial::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn positions(&self) -> &MirroredArray<Point3<f64>> {
        &self.positions
    }

    pub fn images(&self) -> &MirroredArray<Vector3<i32>> {
        &self.images
    }

    /// Velocity in `xyz`, mass in `w`.
    pub fn velocities(&self) -> &MirroredArray<Vector4<f64>> {
        &self.velocities
    }

    pub fn orientations(&self) -> &MirroredArray<Quaternion<f64>> {
        &self.orientations
    }

    pub fn angular_momenta(&self) -> &MirroredArray<Quaternion<f64>> {
        &self.angular_momenta
    }

    pub fn moments_of_inertia(&self) -> &MirroredArray<Vector3<f64>> {
        &self.moments_of_inertia
    }

    pub fn types(&self) -> &[u32] {
        &self.types
    }

    pub fn external_energy(&self) -> f64 {
        self.external_energy.get()
    }

    pub fn set_external_energy(&self, energy: f64) {
        self.external_energy.set(energy);
    }

    pub fn external_virial(&self) -> Virial {
        self.external_virial.get()
    }

    pub fn set_external_virial(&self, virial: Virial) {
        self.external_virial.set(virial);
    }
}

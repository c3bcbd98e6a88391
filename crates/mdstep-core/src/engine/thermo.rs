use super::config::ThermoParams;
use super::flags::RequestedFlags;
use super::method::StepContext;
use super::reduce::member_sum;
use crate::core::domain::Communicator;
use crate::core::memory::{AccessLocation, BufferError};
use crate::core::models::box_geometry::Dimensions;
use crate::core::models::group::ParticleGroup;
use crate::core::models::system::SystemDefinition;
use crate::core::models::virial::Virial;
use nalgebra::{Quaternion, Vector3, Vector4};
use phf::{Map, phf_map};
use std::cell::Cell;
use std::sync::Arc;
use thiserror::Error;
use tracing::{instrument, trace, warn};

/// Moments of inertia below this are treated as absent.
const INERTIA_EPSILON: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum ThermoError {
    #[error("'{0}' is not a valid thermodynamic log quantity")]
    UnknownQuantity(String),
    #[error("Buffer access failed: {0}")]
    Buffer(#[from] BufferError),
}

/// A named observable of a [`ThermoReducer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThermoQuantity {
    Temperature,
    TranslationalTemperature,
    RotationalTemperature,
    KineticEnergy,
    TranslationalKineticEnergy,
    RotationalKineticEnergy,
    PotentialEnergy,
    Ndof,
    TranslationalNdof,
    RotationalNdof,
    NumParticles,
    Pressure,
    PressureXx,
    PressureXy,
    PressureXz,
    PressureYy,
    PressureYz,
    PressureZz,
}

static QUANTITY_KEYS: Map<&'static str, ThermoQuantity> = phf_map! {
    "temperature" => ThermoQuantity::Temperature,
    "translational_temperature" => ThermoQuantity::TranslationalTemperature,
    "rotational_temperature" => ThermoQuantity::RotationalTemperature,
    "kinetic_energy" => ThermoQuantity::KineticEnergy,
    "translational_kinetic_energy" => ThermoQuantity::TranslationalKineticEnergy,
    "rotational_kinetic_energy" => ThermoQuantity::RotationalKineticEnergy,
    "potential_energy" => ThermoQuantity::PotentialEnergy,
    "ndof" => ThermoQuantity::Ndof,
    "translational_ndof" => ThermoQuantity::TranslationalNdof,
    "rotational_ndof" => ThermoQuantity::RotationalNdof,
    "num_particles" => ThermoQuantity::NumParticles,
    "pressure" => ThermoQuantity::Pressure,
    "pressure_xx" => ThermoQuantity::PressureXx,
    "pressure_xy" => ThermoQuantity::PressureXy,
    "pressure_xz" => ThermoQuantity::PressureXz,
    "pressure_yy" => ThermoQuantity::PressureYy,
    "pressure_yz" => ThermoQuantity::PressureYz,
    "pressure_zz" => ThermoQuantity::PressureZz,
};

impl ThermoQuantity {
    /// Every quantity, in logging order.
    pub const ALL: [ThermoQuantity; 18] = [
        ThermoQuantity::Temperature,
        ThermoQuantity::TranslationalTemperature,
        ThermoQuantity::RotationalTemperature,
        ThermoQuantity::KineticEnergy,
        ThermoQuantity::TranslationalKineticEnergy,
        ThermoQuantity::RotationalKineticEnergy,
        ThermoQuantity::PotentialEnergy,
        ThermoQuantity::Ndof,
        ThermoQuantity::TranslationalNdof,
        ThermoQuantity::RotationalNdof,
        ThermoQuantity::NumParticles,
        ThermoQuantity::Pressure,
        ThermoQuantity::PressureXx,
        ThermoQuantity::PressureXy,
        ThermoQuantity::PressureXz,
        ThermoQuantity::PressureYy,
        ThermoQuantity::PressureYz,
        ThermoQuantity::PressureZz,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ThermoQuantity::Temperature => "temperature",
            ThermoQuantity::TranslationalTemperature => "translational_temperature",
            ThermoQuantity::RotationalTemperature => "rotational_temperature",
            ThermoQuantity::KineticEnergy => "kinetic_energy",
            ThermoQuantity::TranslationalKineticEnergy => "translational_kinetic_energy",
            ThermoQuantity::RotationalKineticEnergy => "rotational_kinetic_energy",
            ThermoQuantity::PotentialEnergy => "potential_energy",
            ThermoQuantity::Ndof => "ndof",
            ThermoQuantity::TranslationalNdof => "translational_ndof",
            ThermoQuantity::RotationalNdof => "rotational_ndof",
            ThermoQuantity::NumParticles => "num_particles",
            ThermoQuantity::Pressure => "pressure",
            ThermoQuantity::PressureXx => "pressure_xx",
            ThermoQuantity::PressureXy => "pressure_xy",
            ThermoQuantity::PressureXz => "pressure_xz",
            ThermoQuantity::PressureYy => "pressure_yy",
            ThermoQuantity::PressureYz => "pressure_yz",
            ThermoQuantity::PressureZz => "pressure_zz",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        QUANTITY_KEYS.get(key).copied()
    }
}

// Extensive slots; everything else is derived from these and the ndof counts.
const TRANSLATIONAL_KE: usize = 0;
const ROTATIONAL_KE: usize = 1;
const POTENTIAL_ENERGY: usize = 2;
const PRESSURE: usize = 3;
const PRESSURE_TENSOR: usize = 4;
const SLOT_COUNT: usize = 10;

#[inline]
fn kinetic_tensor(v: &Vector4<f64>) -> Virial {
    let m = v.w;
    Virial::new(
        m * v.x * v.x,
        m * v.x * v.y,
        m * v.x * v.z,
        m * v.y * v.y,
        m * v.y * v.z,
        m * v.z * v.z,
    )
}

/// Twice the rotational kinetic energy of one body.
#[inline]
fn rotational_term(
    orientation: &Quaternion<f64>,
    angular_momentum: &Quaternion<f64>,
    inertia: &Vector3<f64>,
) -> f64 {
    let s = (orientation.conjugate() * angular_momentum) * 0.5;
    let body = [s.i, s.j, s.k];
    (0..3)
        .filter(|&axis| inertia[axis] >= INERTIA_EPSILON)
        .map(|axis| body[axis] * body[axis] / inertia[axis])
        .sum()
}

/// Reduces the per-particle state of a group into thermodynamic observables.
///
/// [`compute`](Self::compute) fills a fixed set of extensive, domain-local sums at most
/// once per timestep. The cross-domain sum is deferred to the first read after a compute,
/// so steps on which nobody looks at the observables never pay for the collective. Because
/// every read may trigger that collective, all domains must read in the same order.
///
/// Temperatures are derived on read as `2 KE / ndof`.
pub struct ThermoReducer {
    group: Arc<ParticleGroup>,
    communicator: Arc<dyn Communicator>,
    ndof: u32,
    rotational_ndof: u32,
    label: String,
    logging_enabled: bool,
    last_computed: Option<u64>,
    properties: Cell<[f64; SLOT_COUNT]>,
    needs_reduction: Cell<bool>,
    reduction_count: Cell<u64>,
}

impl ThermoReducer {
    pub fn new(system: &SystemDefinition, group: Arc<ParticleGroup>, params: &ThermoParams) -> Self {
        let dims = u64::from(system.box_geometry().dimensions().count());
        let default_ndof = (dims * group.global_size()).saturating_sub(dims).max(1);
        let mut reducer = Self {
            group,
            communicator: Arc::clone(system.communicator()),
            ndof: u32::try_from(default_ndof).unwrap_or(u32::MAX),
            rotational_ndof: params.rotational_ndof,
            label: params.label.clone(),
            logging_enabled: true,
            last_computed: None,
            properties: Cell::new([0.0; SLOT_COUNT]),
            needs_reduction: Cell::new(false),
            reduction_count: Cell::new(0),
        };
        if let Some(ndof) = params.ndof {
            reducer.set_ndof(ndof);
        }
        reducer
    }

    pub fn group(&self) -> &Arc<ParticleGroup> {
        &self.group
    }

    /// Sets the translational degrees of freedom. Zero is raised to one.
    pub fn set_ndof(&mut self, ndof: u32) {
        if ndof == 0 {
            warn!(
                group = self.group.name(),
                "Group has 0 degrees of freedom, using 1 to avoid dividing by zero"
            );
        }
        self.ndof = ndof.max(1);
    }

    pub fn ndof(&self) -> u32 {
        self.ndof
    }

    pub fn set_rotational_ndof(&mut self, ndof: u32) {
        self.rotational_ndof = ndof;
    }

    pub fn rotational_ndof(&self) -> u32 {
        self.rotational_ndof
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_logging_enabled(&mut self, enabled: bool) {
        self.logging_enabled = enabled;
    }

    pub fn last_computed(&self) -> Option<u64> {
        self.last_computed
    }

    /// Number of cross-domain reductions performed so far.
    pub fn reduction_count(&self) -> u64 {
        self.reduction_count.get()
    }

    /// Recomputes the local sums for `timestep` unless they are already current.
    #[instrument(skip_all, name = "thermo_compute", fields(timestep = timestep))]
    pub fn compute(&mut self, timestep: u64, ctx: &StepContext<'_>) -> Result<(), ThermoError> {
        if self.last_computed == Some(timestep) || self.group.global_size() == 0 {
            return Ok(());
        }

        let flags = ctx.flags;
        let particles = ctx.system.particles();
        let members = self.group.members();
        let is_root = self.communicator.rank() == 0;

        let velocities = particles.velocities().read(AccessLocation::Host)?;
        let vel: &[Vector4<f64>] = &velocities;
        let (kinetic, translational_ke) = if flags.contains(RequestedFlags::PRESSURE_TENSOR) {
            let tensor: Virial = member_sum(members, |i| kinetic_tensor(&vel[i]));
            (tensor, 0.5 * tensor.trace())
        } else {
            let twice: f64 = member_sum(members, |i| vel[i].w * vel[i].xyz().norm_squared());
            (Virial::default(), 0.5 * twice)
        };

        let rotational_ke = if flags.contains(RequestedFlags::ROTATIONAL_KINETIC_ENERGY) {
            let orientations = particles.orientations().read(AccessLocation::Host)?;
            let angular_momenta = particles.angular_momenta().read(AccessLocation::Host)?;
            let inertia = particles.moments_of_inertia().read(AccessLocation::Host)?;
            let q: &[Quaternion<f64>] = &orientations;
            let p: &[Quaternion<f64>] = &angular_momenta;
            let moi: &[Vector3<f64>] = &inertia;
            let twice: f64 = member_sum(members, |i| rotational_term(&q[i], &p[i], &moi[i]));
            0.5 * twice
        } else {
            0.0
        };

        let potential_energy = if flags.contains(RequestedFlags::POTENTIAL_ENERGY) {
            let forces = ctx.forces.forces().read(AccessLocation::Host)?;
            let frc: &[Vector4<f64>] = &forces;
            let local: f64 = member_sum(members, |i| frc[i].w);
            local + if is_root { particles.external_energy() } else { 0.0 }
        } else {
            0.0
        };

        let mut virial = if is_root {
            particles.external_virial()
        } else {
            Virial::default()
        };
        if flags.intersects(RequestedFlags::PRESSURE_TENSOR | RequestedFlags::ISOTROPIC_VIRIAL) {
            let virials = ctx.forces.virials().read(AccessLocation::Host)?;
            let vir: &[Virial] = &virials;
            if flags.contains(RequestedFlags::PRESSURE_TENSOR) {
                virial += member_sum(members, |i| vir[i]);
            } else {
                virial += member_sum(members, |i| {
                    Virial::new(vir[i].xx, 0.0, 0.0, vir[i].yy, 0.0, vir[i].zz)
                });
            }
        }

        let box_geometry = ctx.system.box_geometry();
        let volume = box_geometry.volume();
        let mut w = if flags.contains(RequestedFlags::ISOTROPIC_VIRIAL) {
            virial.trace() / 3.0
        } else {
            0.0
        };
        if box_geometry.dimensions() == Dimensions::Two {
            w *= 1.5;
        }
        let pressure = (2.0 * translational_ke / ctx.system.dimensions() + w) / volume;
        let tensor = (kinetic + virial) * (1.0 / volume);

        let mut properties = [0.0; SLOT_COUNT];
        properties[TRANSLATIONAL_KE] = translational_ke;
        properties[ROTATIONAL_KE] = rotational_ke;
        properties[POTENTIAL_ENERGY] = potential_energy;
        properties[PRESSURE] = pressure;
        properties[PRESSURE_TENSOR..].copy_from_slice(&tensor.components());
        self.properties.set(properties);
        self.needs_reduction.set(true);
        self.last_computed = Some(timestep);
        Ok(())
    }

    fn reduced(&self) -> [f64; SLOT_COUNT] {
        if self.needs_reduction.get() {
            let mut properties = self.properties.get();
            self.communicator.all_reduce_sum(&mut properties);
            self.properties.set(properties);
            self.needs_reduction.set(false);
            self.reduction_count.set(self.reduction_count.get() + 1);
            trace!(group = self.group.name(), "Reduced thermodynamic properties");
        }
        self.properties.get()
    }

    pub fn translational_kinetic_energy(&self) -> f64 {
        self.reduced()[TRANSLATIONAL_KE]
    }

    pub fn rotational_kinetic_energy(&self) -> f64 {
        self.reduced()[ROTATIONAL_KE]
    }

    pub fn kinetic_energy(&self) -> f64 {
        let properties = self.reduced();
        properties[TRANSLATIONAL_KE] + properties[ROTATIONAL_KE]
    }

    pub fn potential_energy(&self) -> f64 {
        self.reduced()[POTENTIAL_ENERGY]
    }

    pub fn translational_temperature(&self) -> f64 {
        2.0 * self.translational_kinetic_energy() / f64::from(self.ndof)
    }

    pub fn rotational_temperature(&self) -> f64 {
        if self.rotational_ndof == 0 {
            0.0
        } else {
            2.0 * self.rotational_kinetic_energy() / f64::from(self.rotational_ndof)
        }
    }

    pub fn temperature(&self) -> f64 {
        2.0 * self.kinetic_energy() / f64::from(self.ndof + self.rotational_ndof)
    }

    pub fn pressure(&self) -> f64 {
        self.reduced()[PRESSURE]
    }

    pub fn pressure_tensor(&self) -> Virial {
        let p = self.reduced();
        let t = &p[PRESSURE_TENSOR..];
        Virial::new(t[0], t[1], t[2], t[3], t[4], t[5])
    }

    /// Value of `quantity` as of the last compute.
    pub fn value(&self, quantity: ThermoQuantity) -> f64 {
        match quantity {
            ThermoQuantity::Temperature => self.temperature(),
            ThermoQuantity::TranslationalTemperature => self.translational_temperature(),
            ThermoQuantity::RotationalTemperature => self.rotational_temperature(),
            ThermoQuantity::KineticEnergy => self.kinetic_energy(),
            ThermoQuantity::TranslationalKineticEnergy => self.translational_kinetic_energy(),
            ThermoQuantity::RotationalKineticEnergy => self.rotational_kinetic_energy(),
            ThermoQuantity::PotentialEnergy => self.potential_energy(),
            ThermoQuantity::Ndof => f64::from(self.ndof + self.rotational_ndof),
            ThermoQuantity::TranslationalNdof => f64::from(self.ndof),
            ThermoQuantity::RotationalNdof => f64::from(self.rotational_ndof),
            ThermoQuantity::NumParticles => self.group.global_size() as f64,
            ThermoQuantity::Pressure => self.pressure(),
            ThermoQuantity::PressureXx => self.pressure_tensor().xx,
            ThermoQuantity::PressureXy => self.pressure_tensor().xy,
            ThermoQuantity::PressureXz => self.pressure_tensor().xz,
            ThermoQuantity::PressureYy => self.pressure_tensor().yy,
            ThermoQuantity::PressureYz => self.pressure_tensor().yz,
            ThermoQuantity::PressureZz => self.pressure_tensor().zz,
        }
    }

    /// Resolves a labelled key such as `temperature_solvent` to its quantity.
    pub fn quantity_for(&self, key: &str) -> Result<ThermoQuantity, ThermoError> {
        key.strip_suffix(self.label.as_str())
            .and_then(ThermoQuantity::from_key)
            .ok_or_else(|| ThermoError::UnknownQuantity(key.to_string()))
    }

    /// Computes for `timestep` if needed and returns the value logged under `key`.
    pub fn log_value(
        &mut self,
        key: &str,
        timestep: u64,
        ctx: &StepContext<'_>,
    ) -> Result<f64, ThermoError> {
        let quantity = self.quantity_for(key)?;
        self.compute(timestep, ctx)?;
        Ok(self.value(quantity))
    }

    pub fn provided_log_quantities(&self) -> Vec<String> {
        if !self.logging_enabled {
            return Vec::new();
        }
        ThermoQuantity::ALL
            .iter()
            .map(|q| format!("{}{}", q.key(), self.label))
            .collect()
    }
}

impl std::fmt::Debug for ThermoReducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThermoReducer")
            .field("group", &self.group.name())
            .field("ndof", &self.ndof)
            .field("rotational_ndof", &self.rotational_ndof)
            .field("label", &self.label)
            .field("last_computed", &self.last_computed)
            .finish()
    }
}

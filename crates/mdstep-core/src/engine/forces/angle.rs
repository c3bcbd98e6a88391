use crate::core::forcefield::params::{AngleCoeff, AngleParamSet, RepulsionForm};
use crate::core::forcefield::potentials::{
    clamped_cos_and_inv_sin, harmonic_bend, power_law_repulsion,
};
use crate::core::memory::{AccessLocation, AccessMode};
use crate::core::models::box_geometry::BoxGeometry;
use crate::core::models::system::SystemDefinition;
use crate::core::models::topology::AngleTable;
use crate::core::models::virial::Virial;
use crate::engine::force::{ForceArena, ForceContext, ForceContribution, ForceError};
use nalgebra::{Point3, Vector3};
use tracing::{instrument, warn};

const NAME: &str = "cg_angle";

/// Contribution of one angle to its three particles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AngleTerm {
    pub force_a: Vector3<f64>,
    pub force_b: Vector3<f64>,
    pub force_c: Vector3<f64>,
    /// A third of the angle energy, credited to each particle.
    pub energy_share: f64,
    /// A third of the angle virial, credited to each particle.
    pub virial_share: Virial,
}

/// Harmonic bend plus the 1-3 power-law repulsion of one `a-b-c` angle.
pub(crate) fn angle_term(
    box_geometry: &BoxGeometry,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    coeff: &AngleCoeff,
) -> AngleTerm {
    let dab = box_geometry.displacement(a, b);
    let dcb = box_geometry.displacement(c, b);
    let dac = box_geometry.displacement(a, c);

    let rsq_ab = dab.norm_squared();
    let rab = rsq_ab.sqrt();
    let rsq_cb = dcb.norm_squared();
    let rcb = rsq_cb.sqrt();
    let rsq_ac = dac.norm_squared();
    let rac = rsq_ac.sqrt();

    let (cos_theta, inv_sin) = clamped_cos_and_inv_sin(dab.dot(&dcb) / (rab * rcb));

    let (e13, f13) = power_law_repulsion(rac, rsq_ac, coeff.sigma, coeff.epsilon, coeff.cg_type)
        .unwrap_or((0.0, 0.0));

    let dth = cos_theta.acos() - coeff.t0;
    let tk = coeff.k * dth;

    let a0 = -tk * inv_sin;
    let a11 = a0 * cos_theta / rsq_ab;
    let a12 = -a0 / (rab * rcb);
    let a22 = a0 * cos_theta / rsq_cb;

    let fab = dab * a11 + dcb * a12;
    let fcb = dcb * a22 + dab * a12;

    let outer = |u: usize, v: usize| {
        (dab[u] * fab[v] + dcb[u] * fcb[v] + f13 * dac[u] * dac[v]) / 3.0
    };

    AngleTerm {
        force_a: fab + dac * f13,
        force_b: -(fab + fcb),
        force_c: fcb - dac * f13,
        energy_share: (harmonic_bend(coeff.k, dth) + e13) / 3.0,
        virial_share: Virial::new(
            outer(0, 0),
            outer(0, 1),
            outer(0, 2),
            outer(1, 1),
            outer(1, 2),
            outer(2, 2),
        ),
    }
}

/// Coarse-grained angle potential: a harmonic bend around `t0` combined with a shifted
/// power-law repulsion between the two outer particles, active inside the minimum of the
/// chosen form.
#[derive(Debug, Clone)]
pub struct CoarseGrainAngleForce {
    coeffs: Vec<AngleCoeff>,
    last_energy: f64,
}

impl CoarseGrainAngleForce {
    pub const ENERGY_LOG_NAME: &'static str = "angle_cg_energy";

    /// Creates the force with zeroed coefficients for every angle type of `system`.
    pub fn new(system: &SystemDefinition) -> Result<Self, ForceError> {
        let num_types = system.angles().num_types();
        if num_types == 0 {
            return Err(ForceError::NoAngleTypes {
                force: NAME.to_string(),
            });
        }
        Ok(Self {
            coeffs: vec![AngleCoeff::default(); num_types],
            last_energy: 0.0,
        })
    }

    pub fn set_params(&mut self, type_id: u32, coeff: AngleCoeff) -> Result<(), ForceError> {
        let num_types = self.coeffs.len();
        let slot = self
            .coeffs
            .get_mut(type_id as usize)
            .ok_or(ForceError::InvalidAngleType { type_id, num_types })?;

        if coeff.k <= 0.0 {
            warn!(type_id, k = coeff.k, "Non-positive angle stiffness");
        }
        if coeff.t0 <= 0.0 {
            warn!(type_id, t0 = coeff.t0, "Non-positive equilibrium angle");
        }
        if coeff.cg_type.exponents().is_some() {
            if coeff.epsilon <= 0.0 {
                warn!(type_id, epsilon = coeff.epsilon, "Non-positive 1-3 repulsion epsilon");
            }
            if coeff.sigma <= 0.0 {
                warn!(type_id, sigma = coeff.sigma, "Non-positive 1-3 repulsion sigma");
            }
        }

        *slot = coeff;
        Ok(())
    }

    /// Like [`set_params`](Self::set_params), with the repulsion form given by its numeric
    /// selector (0 none, 1 LJ 9-6, 2 LJ 12-4, 3 LJ 12-6).
    pub fn set_params_raw(
        &mut self,
        type_id: u32,
        k: f64,
        t0: f64,
        cg_type: u32,
        epsilon: f64,
        sigma: f64,
    ) -> Result<(), ForceError> {
        let form = RepulsionForm::try_from(cg_type)?;
        self.set_params(type_id, AngleCoeff::new(k, t0, form, epsilon, sigma))
    }

    /// Applies coefficients given by angle type name.
    pub fn apply_param_set(
        &mut self,
        table: &AngleTable,
        params: &AngleParamSet,
    ) -> Result<(), ForceError> {
        for (name, coeff) in &params.angle {
            let type_id = table
                .type_id(name)
                .ok_or_else(|| ForceError::UnknownAngleTypeName(name.clone()))?;
            self.set_params(type_id, *coeff)?;
        }
        Ok(())
    }

    pub fn params(&self, type_id: u32) -> Option<&AngleCoeff> {
        self.coeffs.get(type_id as usize)
    }

    /// Total angle energy in this domain from the last computation.
    pub fn last_energy(&self) -> f64 {
        self.last_energy
    }
}

impl ForceContribution for CoarseGrainAngleForce {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip_all, name = "cg_angle_forces")]
    fn compute_forces(
        &mut self,
        _timestep: u64,
        ctx: &ForceContext<'_>,
        arena: &mut ForceArena,
    ) -> Result<(), ForceError> {
        self.last_energy = 0.0;
        let angles = ctx.system.angles().angles();
        if angles.is_empty() {
            return Ok(());
        }

        let box_geometry = ctx.system.box_geometry();
        let positions = ctx
            .system
            .particles()
            .positions()
            .read(AccessLocation::Host)?;
        let mut forces = arena
            .forces()
            .write(AccessLocation::Host, AccessMode::ReadWrite)?;
        let mut virials = if ctx.flags.needs_virial() {
            Some(
                arena
                    .virials()
                    .write(AccessLocation::Host, AccessMode::ReadWrite)?,
            )
        } else {
            None
        };

        let num_types = self.coeffs.len();
        let mut total_energy = 0.0;
        for angle in angles {
            let coeff = self.coeffs.get(angle.type_id as usize).ok_or(
                ForceError::InvalidAngleType {
                    type_id: angle.type_id,
                    num_types,
                },
            )?;
            let term = angle_term(
                box_geometry,
                &positions[angle.a],
                &positions[angle.b],
                &positions[angle.c],
                coeff,
            );

            forces[angle.a] += term.force_a.push(term.energy_share);
            forces[angle.b] += term.force_b.push(term.energy_share);
            forces[angle.c] += term.force_c.push(term.energy_share);
            if let Some(virials) = virials.as_mut() {
                virials[angle.a] += term.virial_share;
                virials[angle.b] += term.virial_share;
                virials[angle.c] += term.virial_share;
            }
            total_energy += 3.0 * term.energy_share;
        }

        self.last_energy = total_energy;
        Ok(())
    }

    fn provided_log_quantities(&self) -> Vec<String> {
        vec![Self::ENERGY_LOG_NAME.to_string()]
    }

    fn log_value(&self, quantity: &str) -> Result<f64, ForceError> {
        if quantity == Self::ENERGY_LOG_NAME {
            Ok(self.last_energy)
        } else {
            Err(ForceError::UnknownLogQuantity {
                force: NAME.to_string(),
                quantity: quantity.to_string(),
            })
        }
    }
}

use super::params::RepulsionForm;

/// Lower bound applied to `sin(theta)` before it is inverted.
pub const SIN_FLOOR: f64 = 0.001;

/// Harmonic bend energy `K/2 (theta - theta0)^2`.
#[inline]
pub fn harmonic_bend(stiffness: f64, delta_theta: f64) -> f64 {
    0.5 * stiffness * delta_theta * delta_theta
}

/// Clamps a cosine into `[-1, 1]` and returns it with the inverse of the floored sine.
#[inline]
pub fn clamped_cos_and_inv_sin(cos_theta: f64) -> (f64, f64) {
    let c = cos_theta.clamp(-1.0, 1.0);
    let s = (1.0 - c * c).sqrt().max(SIN_FLOOR);
    (c, 1.0 / s)
}

/// Shifted power-law 1-3 repulsion between the outer particles of an angle.
///
/// Returns `(energy, force / r)` for a separation of `dist` (squared: `dist_sq`), or `None`
/// at and beyond the cutoff where the potential is identically zero. The energy is shifted
/// by `epsilon` so that it vanishes at the cutoff, the minimum of the unshifted form.
#[inline]
pub fn power_law_repulsion(
    dist: f64,
    dist_sq: f64,
    sigma: f64,
    epsilon: f64,
    form: RepulsionForm,
) -> Option<(f64, f64)> {
    let (p1, p2) = form.exponents()?;
    if dist >= form.cutoff(sigma) {
        return None;
    }
    let prefactor = form.prefactor();
    let ratio = sigma / dist;
    let rep = ratio.powf(p1);
    let att = ratio.powf(p2);

    let energy = epsilon + prefactor * epsilon * (rep - att);
    let force_over_r = prefactor * epsilon / dist_sq * (p1 * rep - p2 * att);
    Some((energy, force_over_r))
}

//! Truncated Lennard-Jones pair kernel in reduced units (σ = ε = 1).
//!
//! All separations follow the minimum-image convention, which is only
//! meaningful while the cutoff stays below half the box length; that bound is
//! enforced when [`SimulationParameters`] are built.

use crate::core::params::SimulationParameters;
use crate::core::particle::{dot, ParticleState, DIM};
use crate::error::{Error, Result};

/// Energy and radial force factor of one interacting pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairTerm {
    /// u(r) = 4 (r^-12 - r^-6).
    pub energy: f64,
    /// f(r)/r = 48 (r^-14 - 0.5 r^-8); the force on i is `force_over_r * (r_i - r_j)`.
    pub force_over_r: f64,
}

impl PairTerm {
    /// Pair virial r·f = r² · f/r.
    #[inline]
    pub fn virial(&self, r2: f64) -> f64 {
        r2 * self.force_over_r
    }
}

/// Result of a full-system evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ForceEvaluation {
    pub potential_energy: f64,
    /// Σ r·f over interacting pairs.
    pub virial: f64,
    /// Configurational pressure-tensor sums (xx, yy, zz, xy, xz, yz); the trace equals `virial`.
    pub stress: [f64; 6],
}

/// Shift one Cartesian separation component to the nearest periodic image.
#[inline]
pub fn minimum_image(d: f64, box_length: f64) -> f64 {
    let half = 0.5 * box_length;
    if d > half {
        d - box_length
    } else if d < -half {
        d + box_length
    } else {
        d
    }
}

/// Minimum-image separation vector `a - b`.
#[inline]
pub fn separation(a: &[f64; DIM], b: &[f64; DIM], box_length: f64) -> [f64; DIM] {
    let mut d = [0.0; DIM];
    for (k, dk) in d.iter_mut().enumerate() {
        *dk = minimum_image(a[k] - b[k], box_length);
    }
    d
}

/// Lennard-Jones term for squared separation `r2`; `None` at or beyond the cutoff.
#[inline]
pub fn lj_pair(r2: f64, cutoff_sq: f64) -> Option<PairTerm> {
    if r2 >= cutoff_sq {
        return None;
    }
    let d2 = 1.0 / r2;
    let d6 = d2 * d2 * d2;
    Some(PairTerm {
        energy: 4.0 * d6 * (d6 - 1.0),
        force_over_r: 48.0 * d2 * d6 * (d6 - 0.5),
    })
}

/// Full-system evaluation over unique pairs.
///
/// Overwrites every particle's force and returns the potential energy, virial
/// and configurational stress sums. Coincident particles are a precondition
/// violation reported as [`Error::CoincidentParticles`].
pub fn compute_forces(
    state: &mut ParticleState,
    params: &SimulationParameters,
) -> Result<ForceEvaluation> {
    let l = params.box_length();
    let rc2 = params.cutoff_sq();
    let n = state.len();

    for p in &mut state.particles {
        p.f = [0.0; DIM];
    }

    let mut eval = ForceEvaluation::default();
    if n < 2 {
        return Ok(eval);
    }

    for i in 0..(n - 1) {
        let ri = state.particles[i].r;
        let mut fi = [0.0; DIM];
        for j in (i + 1)..n {
            let d = separation(&ri, &state.particles[j].r, l);
            let r2 = dot(&d, &d);
            if r2 == 0.0 {
                return Err(Error::CoincidentParticles { i, j });
            }
            let Some(term) = lj_pair(r2, rc2) else {
                continue;
            };

            let fj = &mut state.particles[j].f;
            for k in 0..DIM {
                let fk = term.force_over_r * d[k];
                fi[k] += fk;
                fj[k] -= fk;
            }

            eval.potential_energy += term.energy;
            eval.virial += term.virial(r2);
            let s = term.force_over_r;
            eval.stress[0] += s * d[0] * d[0];
            eval.stress[1] += s * d[1] * d[1];
            eval.stress[2] += s * d[2] * d[2];
            eval.stress[3] += s * d[0] * d[1];
            eval.stress[4] += s * d[0] * d[2];
            eval.stress[5] += s * d[1] * d[2];
        }
        let f = &mut state.particles[i].f;
        for k in 0..DIM {
            f[k] += fi[k];
        }
    }

    Ok(eval)
}

/// Energy and virial of particle `i` placed at `position` against every other particle.
///
/// Pure: the state is not modified, and particle `i`'s stored position is ignored.
pub fn particle_interaction(
    state: &ParticleState,
    i: usize,
    position: &[f64; DIM],
    params: &SimulationParameters,
) -> Result<(f64, f64)> {
    let l = params.box_length();
    let rc2 = params.cutoff_sq();
    let mut energy = 0.0;
    let mut virial = 0.0;
    for (j, pj) in state.particles.iter().enumerate() {
        if j == i {
            continue;
        }
        let d = separation(position, &pj.r, l);
        let r2 = dot(&d, &d);
        if r2 == 0.0 {
            return Err(Error::CoincidentParticles { i, j });
        }
        if let Some(term) = lj_pair(r2, rc2) {
            energy += term.energy;
            virial += term.virial(r2);
        }
    }
    Ok((energy, virial))
}

/// Potential energy of particle `i` placed at `position` (single-particle mode).
pub fn particle_energy(
    state: &ParticleState,
    i: usize,
    position: &[f64; DIM],
    params: &SimulationParameters,
) -> Result<f64> {
    particle_interaction(state, i, position, params).map(|(u, _)| u)
}

//! Momentum and temperature utilities (unit mass, k_B = 1).

use rand::Rng;

use crate::core::particle::{dot, ParticleState, DIM};
use crate::error::{Error, Result};

/// Net momentum magnitude below which the system is considered at rest.
///
/// Absolute, not scaled with N: the round-off residual of a zeroed system grows
/// with particle count.
pub const MOMENTUM_TOLERANCE: f64 = 1e-10;

/// Σ v_i over all particles.
pub fn net_momentum(state: &ParticleState) -> [f64; DIM] {
    let mut p = [0.0; DIM];
    for particle in &state.particles {
        for k in 0..DIM {
            p[k] += particle.v[k];
        }
    }
    p
}

pub fn momentum_is_zero(state: &ParticleState) -> bool {
    let p = net_momentum(state);
    dot(&p, &p).sqrt() < MOMENTUM_TOLERANCE
}

/// Subtract the mean velocity from every particle.
///
/// Errors:
/// - `Error::MomentumNotZeroed` if the residual still exceeds [`MOMENTUM_TOLERANCE`].
pub fn zero_momentum(state: &mut ParticleState) -> Result<()> {
    if state.is_empty() {
        return Ok(());
    }
    let n = state.len() as f64;
    let p = net_momentum(state);
    for particle in &mut state.particles {
        for k in 0..DIM {
            particle.v[k] -= p[k] / n;
        }
    }
    let residual = net_momentum(state);
    let norm = dot(&residual, &residual).sqrt();
    if norm < MOMENTUM_TOLERANCE {
        Ok(())
    } else {
        Err(Error::MomentumNotZeroed(norm))
    }
}

/// Σ 1/2 |v_i|².
pub fn kinetic_energy(state: &ParticleState) -> f64 {
    state.particles.iter().map(|p| p.kinetic_energy()).sum()
}

/// T = 2 KE / (3N); zero for an empty system.
#[inline]
pub fn temperature_from_kinetic(kinetic: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    2.0 / 3.0 / n as f64 * kinetic
}

pub fn temperature(state: &ParticleState) -> f64 {
    temperature_from_kinetic(kinetic_energy(state), state.len())
}

/// Isokinetic rescale: multiply every velocity by sqrt(target / current).
pub fn rescale_velocities(state: &mut ParticleState, target: f64, current: f64) -> Result<()> {
    if !(current.is_finite() && current > 0.0) {
        return Err(Error::MathError(format!(
            "cannot rescale velocities from temperature {current}"
        )));
    }
    if !(target.is_finite() && target >= 0.0) {
        return Err(Error::InvalidParam(format!(
            "target temperature {target} must be finite and >= 0"
        )));
    }
    let scale = (target / current).sqrt();
    for p in &mut state.particles {
        for v in &mut p.v {
            *v *= scale;
        }
    }
    Ok(())
}

/// Assign velocities uniform in [-1, 1) per component, remove the net momentum and
/// rescale to `temperature`.
///
/// Consumes three draws per particle from `rng`, in particle order.
pub fn initialize_velocities<R: Rng + ?Sized>(
    state: &mut ParticleState,
    temperature_set: f64,
    rng: &mut R,
) -> Result<()> {
    for p in &mut state.particles {
        for v in &mut p.v {
            *v = rng.random_range(-1.0..1.0);
        }
    }
    zero_momentum(state)?;
    let current = temperature(state);
    rescale_velocities(state, temperature_set, current)
}

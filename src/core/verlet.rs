//! Two-stage velocity-Verlet integrator.
//!
//! One step is `verlet_first_half`, a fresh force evaluation at the new
//! positions, then `verlet_second_half`.

use crate::core::particle::{wrap, ParticleState};

/// Drift positions a full step and kick velocities half a step with the current forces.
///
/// The displacement `v dt + f dt²/2` is added both to the wrapped position and to the
/// unwrapped displacement accumulator.
pub fn verlet_first_half(state: &mut ParticleState, dt: f64, box_length: f64) {
    let half_dt2 = 0.5 * dt * dt;
    let half_dt = 0.5 * dt;
    for p in &mut state.particles {
        for k in 0..p.r.len() {
            let dr = p.v[k] * dt + p.f[k] * half_dt2;
            p.r[k] = wrap(p.r[k] + dr, box_length);
            p.d[k] += dr;
            p.v[k] += p.f[k] * half_dt;
        }
    }
}

/// Complete the velocity update with forces evaluated at the new positions.
pub fn verlet_second_half(state: &mut ParticleState, dt: f64) {
    let half_dt = 0.5 * dt;
    for p in &mut state.particles {
        for (v, f) in p.v.iter_mut().zip(p.f.iter()) {
            *v += f * half_dt;
        }
    }
}

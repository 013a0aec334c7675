//! Metropolis single-particle move engine and adaptive step control.
//!
//! One proposed move consumes the random stream in a fixed order: particle index,
//! then the x, y and z displacements, then the acceptance draw. The acceptance draw
//! is taken even when the move lowers the energy, so the stream position after a
//! move never depends on its outcome.

use rand::rngs::StdRng;
use rand::Rng;

use crate::core::params::SimulationParameters;
use crate::core::particle::{dot, wrap, ParticleState, DIM};
use crate::core::potential::{compute_forces, lj_pair, particle_energy, separation};
use crate::core::properties::{InstantProperties, MoveCounters};
use crate::error::{Error, Result};

/// Acceptance ratio the step controller steers towards.
pub const TARGET_ACCEPTANCE: f64 = 0.30;
/// Half-width of the band around the target in which no adjustment is made.
pub const ACCEPTANCE_TOLERANCE: f64 = 0.02;
/// The maximum displacement is never raised above this length.
pub const MAX_DISPLACEMENT_CEILING: f64 = 2.0;

const SHRINK: f64 = 0.95;
const GROW: f64 = 1.05;

/// min(1, exp(-ΔE / T)).
#[inline]
pub fn acceptance_probability(delta_e: f64, temperature: f64) -> f64 {
    (-delta_e / temperature).exp().min(1.0)
}

/// Metropolis criterion for a uniform draw in [0, 1).
#[inline]
pub fn metropolis_accept(delta_e: f64, temperature: f64, draw: f64) -> bool {
    draw < acceptance_probability(delta_e, temperature)
}

/// Tunes the maximum displacement towards [`TARGET_ACCEPTANCE`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepController {
    /// Moves since the last adjustment.
    pub recent: MoveCounters,
    /// Moves folded in by previous adjustments.
    pub total: MoveCounters,
}

impl StepController {
    pub fn record(&mut self, accepted: bool) {
        self.recent.tried += 1;
        if accepted {
            self.recent.accepted += 1;
        }
    }

    /// Adjust `max_displacement` from the acceptance ratio since the last call and fold
    /// the recent counters into the totals. Returns the ratio that was used.
    ///
    /// Below the band the step shrinks by 5%, above it grows by 5% up to
    /// [`MAX_DISPLACEMENT_CEILING`]. Nothing happens if no move was tried.
    pub fn adjust(&mut self, max_displacement: &mut f64) -> Option<f64> {
        let ratio = self.recent.ratio()?;
        if ratio < TARGET_ACCEPTANCE - ACCEPTANCE_TOLERANCE {
            *max_displacement *= SHRINK;
        } else if ratio > TARGET_ACCEPTANCE + ACCEPTANCE_TOLERANCE
            && *max_displacement < MAX_DISPLACEMENT_CEILING
        {
            *max_displacement = (*max_displacement * GROW).min(MAX_DISPLACEMENT_CEILING);
        }
        self.total.absorb(&mut self.recent);
        Some(ratio)
    }

    /// All moves recorded, folded or not.
    pub fn overall(&self) -> MoveCounters {
        MoveCounters {
            tried: self.total.tried + self.recent.tried,
            accepted: self.total.accepted + self.recent.accepted,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Outcome of one proposed move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveOutcome {
    Accepted { particle: usize, delta_e: f64 },
    Rejected { particle: usize, delta_e: f64 },
}

impl MoveOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, MoveOutcome::Accepted { .. })
    }
}

/// Metropolis move engine.
///
/// Owns the random stream, the current maximum displacement and the per-particle
/// energy cache. `last_accepted_energy[i]` is the energy of particle `i` in the
/// current configuration: it is set for the moved particle and corrected for every
/// neighbour at each acceptance.
#[derive(Debug, Clone)]
pub struct MonteCarlo {
    rng: StdRng,
    max_displacement: f64,
    last_accepted_energy: Vec<f64>,
    controller: StepController,
}

impl MonteCarlo {
    pub fn new(rng: StdRng, max_displacement: f64) -> Self {
        Self {
            rng,
            max_displacement,
            last_accepted_energy: Vec::new(),
            controller: StepController::default(),
        }
    }

    /// Recompute every particle's energy from scratch.
    pub fn refresh_energies(
        &mut self,
        state: &ParticleState,
        params: &SimulationParameters,
    ) -> Result<()> {
        self.last_accepted_energy = (0..state.len())
            .map(|i| particle_energy(state, i, &state.particles[i].r, params))
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    pub fn max_displacement(&self) -> f64 {
        self.max_displacement
    }

    pub fn cached_energies(&self) -> &[f64] {
        &self.last_accepted_energy
    }

    pub fn controller(&self) -> &StepController {
        &self.controller
    }

    /// Run the adaptive step controller.
    pub fn adjust_step(&mut self) -> Option<f64> {
        let before = self.max_displacement;
        let ratio = self.controller.adjust(&mut self.max_displacement);
        if let Some(r) = ratio {
            log::trace!(
                "acceptance {r:.3}: max displacement {before:.5} -> {:.5}",
                self.max_displacement
            );
        }
        ratio
    }

    pub fn reset_counters(&mut self) {
        self.controller.reset();
    }

    /// Propose, evaluate and accept or reject one single-particle displacement.
    ///
    /// On acceptance the instantaneous energy and virial in `inst` are brought up
    /// to date: incrementally in O(N), or by a full O(N²) kernel evaluation when
    /// the parameters ask for it. Rejected moves leave `state` and `inst` untouched.
    pub fn attempt_move(
        &mut self,
        state: &mut ParticleState,
        params: &SimulationParameters,
        inst: &mut InstantProperties,
    ) -> Result<MoveOutcome> {
        let n = state.len();
        if n == 0 {
            return Err(Error::InvalidParam("no particles to move".into()));
        }
        if self.last_accepted_energy.len() != n {
            return Err(Error::ParticleCountMismatch {
                expected: n,
                found: self.last_accepted_energy.len(),
            });
        }
        let l = params.box_length();

        let particle = self.rng.random_range(0..n);
        let old = state.particles[particle].r;
        let mut new = old;
        for (k, x) in new.iter_mut().enumerate() {
            let shift = self.rng.random_range(-1.0..1.0) * self.max_displacement;
            *x = wrap(old[k] + shift, l);
        }

        let e_new = particle_energy(state, particle, &new, params)?;
        let delta_e = e_new - self.last_accepted_energy[particle];
        let draw: f64 = self.rng.random();
        let accepted = metropolis_accept(delta_e, params.temperature(), draw);
        self.controller.record(accepted);

        if !accepted {
            return Ok(MoveOutcome::Rejected { particle, delta_e });
        }

        let (du, dw) = self.update_neighbours(state, particle, &old, &new, params);
        self.last_accepted_energy[particle] = e_new;
        state.particles[particle].r = new;
        if params.full_recompute_on_accept() {
            let eval = compute_forces(state, params)?;
            inst.set_forces(&eval);
        } else {
            inst.potential_energy += du;
            inst.virial += dw;
        }
        Ok(MoveOutcome::Accepted { particle, delta_e })
    }

    /// Apply the pair-energy change of moving `moved` from `old` to `new` to every
    /// neighbour's cached energy. Returns the change in total energy and virial.
    fn update_neighbours(
        &mut self,
        state: &ParticleState,
        moved: usize,
        old: &[f64; DIM],
        new: &[f64; DIM],
        params: &SimulationParameters,
    ) -> (f64, f64) {
        let l = params.box_length();
        let rc2 = params.cutoff_sq();
        let mut du = 0.0;
        let mut dw = 0.0;
        for (j, pj) in state.particles.iter().enumerate() {
            if j == moved {
                continue;
            }
            let d_old = separation(old, &pj.r, l);
            let d_new = separation(new, &pj.r, l);
            let r2_old = dot(&d_old, &d_old);
            let r2_new = dot(&d_new, &d_new);
            let (u_old, w_old) = lj_pair(r2_old, rc2)
                .map_or((0.0, 0.0), |t| (t.energy, t.virial(r2_old)));
            let (u_new, w_new) = lj_pair(r2_new, rc2)
                .map_or((0.0, 0.0), |t| (t.energy, t.virial(r2_new)));
            self.last_accepted_energy[j] += u_new - u_old;
            du += u_new - u_old;
            dw += w_new - w_old;
        }
        (du, dw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::{Method, SimulationConfig};
    use crate::core::particle::fcc_lattice;
    use crate::core::potential::particle_interaction;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    #[test]
    fn downhill_moves_always_accepted() {
        assert_eq!(acceptance_probability(-3.0, 0.5), 1.0);
        assert_eq!(acceptance_probability(0.0, 0.5), 1.0);
        for draw in [0.0, 0.5, 0.999_999] {
            assert!(metropolis_accept(-1e-9, 1.0, draw));
            assert!(metropolis_accept(0.0, 1.0, draw));
        }
    }

    #[test]
    fn uphill_acceptance_frequency_matches_boltzmann_factor() {
        let mut rng = StdRng::seed_from_u64(2024);
        let (delta_e, t) = (0.7, 1.3);
        let trials = 200_000;
        let accepted = (0..trials)
            .filter(|_| metropolis_accept(delta_e, t, rng.random::<f64>()))
            .count();
        let freq = accepted as f64 / trials as f64;
        let expected = (-delta_e / t).exp();
        assert!(
            (freq - expected).abs() < 0.005,
            "frequency {freq} vs exp(-dE/T) = {expected}"
        );
    }

    #[test]
    fn controller_shrinks_grows_and_caps() {
        let mut c = StepController::default();
        let mut step = 0.5;
        assert_eq!(c.adjust(&mut step), None);
        assert_eq!(step, 0.5);

        c.recent = MoveCounters { tried: 100, accepted: 10 };
        c.adjust(&mut step);
        assert_relative_eq!(step, 0.475);
        assert_eq!(c.recent, MoveCounters::default());
        assert_eq!(c.total.tried, 100);

        c.recent = MoveCounters { tried: 100, accepted: 31 };
        c.adjust(&mut step);
        assert_relative_eq!(step, 0.475);

        c.recent = MoveCounters { tried: 100, accepted: 90 };
        let mut big = 1.99;
        c.adjust(&mut big);
        assert_eq!(big, MAX_DISPLACEMENT_CEILING);
        c.recent = MoveCounters { tried: 100, accepted: 90 };
        c.adjust(&mut big);
        assert_eq!(big, MAX_DISPLACEMENT_CEILING);
        assert_eq!(c.overall().tried, 400);
    }

    fn dense_system(full_recompute: bool) -> Result<(ParticleState, SimulationParameters)> {
        let mut cfg = SimulationConfig::new(Method::MonteCarlo, 32, 1.0, 0.8, 1.5, 0.15);
        cfg.full_recompute_on_accept = full_recompute;
        let params = cfg.build()?;
        let state =
            ParticleState::from_positions(&fcc_lattice(32, params.box_length())?)?;
        Ok((state, params))
    }

    fn run_moves(full_recompute: bool, moves: usize) -> Result<(ParticleState, MonteCarlo, InstantProperties)> {
        let (mut state, params) = dense_system(full_recompute)?;
        let mut inst = InstantProperties::default();
        inst.set_forces(&compute_forces(&mut state, &params)?);
        let mut mc = MonteCarlo::new(StdRng::seed_from_u64(99), params.dt());
        mc.refresh_energies(&state, &params)?;
        for _ in 0..moves {
            mc.attempt_move(&mut state, &params, &mut inst)?;
        }
        Ok((state, mc, inst))
    }

    #[test]
    fn cache_and_totals_stay_synchronised() -> Result<()> {
        let (mut state, mc, inst) = run_moves(false, 2000)?;
        let (_, params) = dense_system(false)?;
        let counters = mc.controller().overall();
        assert_eq!(counters.tried, 2000);
        assert!(counters.accepted > 0 && counters.accepted < 2000);

        for (i, &cached) in mc.cached_energies().iter().enumerate() {
            let (fresh, _) = particle_interaction(&state, i, &state.particles[i].r, &params)?;
            assert_relative_eq!(cached, fresh, epsilon = 1e-9);
        }
        let eval = compute_forces(&mut state, &params)?;
        assert_relative_eq!(inst.potential_energy, eval.potential_energy, epsilon = 1e-8);
        assert_relative_eq!(inst.virial, eval.virial, epsilon = 1e-8);
        assert!(state.validate(32, params.box_length()).is_ok());
        Ok(())
    }

    #[test]
    fn incremental_and_full_recompute_sample_the_same_chain() -> Result<()> {
        let (state_a, mc_a, inst_a) = run_moves(false, 500)?;
        let (state_b, mc_b, inst_b) = run_moves(true, 500)?;
        assert_eq!(mc_a.controller().overall(), mc_b.controller().overall());
        assert_eq!(state_a.positions(), state_b.positions());
        assert_relative_eq!(inst_a.potential_energy, inst_b.potential_energy, epsilon = 1e-8);
        Ok(())
    }

    #[test]
    fn rejected_move_restores_nothing_changed() -> Result<()> {
        let (mut state, params) = dense_system(false)?;
        let mut inst = InstantProperties::default();
        inst.set_forces(&compute_forces(&mut state, &params)?);
        // huge steps at a dense lattice are almost always rejected
        let mut mc = MonteCarlo::new(StdRng::seed_from_u64(5), 1.0);
        mc.refresh_energies(&state, &params)?;
        for _ in 0..50 {
            let before = state.clone();
            let inst_before = inst;
            if let MoveOutcome::Rejected { .. } = mc.attempt_move(&mut state, &params, &mut inst)? {
                assert_eq!(state.positions(), before.positions());
                assert_eq!(inst, inst_before);
            }
        }
        Ok(())
    }

    #[test]
    fn cache_length_checked() -> Result<()> {
        let (mut state, params) = dense_system(false)?;
        let mut mc = MonteCarlo::new(StdRng::seed_from_u64(1), 0.1);
        let mut inst = InstantProperties::default();
        assert!(matches!(
            mc.attempt_move(&mut state, &params, &mut inst),
            Err(Error::ParticleCountMismatch { .. })
        ));
        Ok(())
    }
}

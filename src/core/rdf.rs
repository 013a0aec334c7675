//! Radial distribution function g(r).

use std::f64::consts::PI;

use crate::core::histogram::Histogram;
use crate::core::params::RdfConfig;
use crate::core::particle::{dot, ParticleState};
use crate::core::potential::separation;
use crate::error::Result;

/// Bins minimum-image pair separations and normalises them against an ideal gas.
#[derive(Debug, Clone)]
pub struct RdfAccumulator {
    hist: Histogram,
    samples: u64,
}

impl RdfAccumulator {
    pub fn new(cfg: &RdfConfig) -> Result<Self> {
        Ok(Self {
            hist: Histogram::new(cfg.min, cfg.max, cfg.bins)?,
            samples: 0,
        })
    }

    /// Number of sampling calls so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Raw pair counts.
    pub fn counts(&self) -> &Histogram {
        &self.hist
    }

    /// Bin every unique pair separation of the current configuration once.
    pub fn sample(&mut self, state: &ParticleState, box_length: f64) {
        let n = state.len();
        for i in 0..n {
            let ri = &state.particles[i].r;
            for pj in &state.particles[(i + 1)..] {
                let d = separation(ri, &pj.r, box_length);
                self.hist.increment(dot(&d, &d).sqrt());
            }
        }
        self.samples += 1;
    }

    /// Normalised g(r) for `n` particles at number density `density`.
    ///
    /// Each bin is divided by `samples * n_ideal * n / 2`, where `n_ideal` is the
    /// ideal-gas occupancy of the bin's spherical shell. With no samples every bin is zero.
    pub fn finalize(&self, density: f64, n: usize) -> Histogram {
        let mut g = self.hist.clone();
        if self.samples == 0 || n == 0 {
            g.clear();
            return g;
        }
        let sphere = 4.0 / 3.0 * PI * density;
        let w = g.bin_width();
        let norm = self.samples as f64 * n as f64 / 2.0;
        for i in 0..g.len() {
            let r1 = g.bin_lower(i);
            let r2 = r1 + w;
            let ideal = sphere * (r2 * r2 * r2 - r1 * r1 * r1);
            g.bins_mut()[i] /= norm * ideal;
        }
        g
    }
}

/// `(bin midpoint, value)` pairs of a finalised histogram.
pub fn rdf_points(g: &Histogram) -> Vec<(f64, f64)> {
    g.midpoints().into_iter().zip(g.bins().iter().copied()).collect()
}

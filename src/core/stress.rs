//! Pressure tensor and its time autocorrelation for Green-Kubo shear viscosity.
//!
//! Tensor components are stored in the order xx, yy, zz, xy, xz, yz throughout.

use crate::core::histogram::Histogram;
use crate::core::particle::ParticleState;
use crate::error::{Error, Result};

pub const COMPONENTS: usize = 6;

/// P_ab = (Σ v_a v_b + Σ_pairs r_a r_b f/r) / V.
pub fn pressure_tensor(
    state: &ParticleState,
    stress: &[f64; COMPONENTS],
    volume: f64,
) -> [f64; COMPONENTS] {
    let mut t = *stress;
    for p in &state.particles {
        let v = &p.v;
        t[0] += v[0] * v[0];
        t[1] += v[1] * v[1];
        t[2] += v[2] * v[2];
        t[3] += v[0] * v[1];
        t[4] += v[0] * v[2];
        t[5] += v[1] * v[2];
    }
    t.map(|c| c / volume)
}

/// Remove the isotropic part: diagonal components lose a third of the trace.
pub fn traceless(mut p: [f64; COMPONENTS]) -> [f64; COMPONENTS] {
    let third = (p[0] + p[1] + p[2]) / 3.0;
    for c in &mut p[..3] {
        *c -= third;
    }
    p
}

/// Lag-binned autocorrelation of the traceless pressure tensor.
///
/// Every sample is paired with the tensor at the current time origin. The origin
/// moves to the current sample once the lag reaches the window length.
#[derive(Debug, Clone)]
pub struct StressAutocorrelation {
    components: Vec<Histogram>,
    counts: Histogram,
    dt: f64,
    nbins: usize,
    origin: [f64; COMPONENTS],
    lag: Option<usize>,
}

/// Finalised correlation functions.
#[derive(Debug, Clone)]
pub struct StressCorrelation {
    /// Per-component ⟨τ_ab(0) τ_ab(t)⟩.
    pub components: Vec<Histogram>,
    /// Lag times k·dt.
    pub lag_times: Vec<f64>,
    /// Rotationally averaged C(t) = (Σ diag + 2 Σ off-diag) / 10.
    pub correlation: Vec<f64>,
}

impl StressCorrelation {
    /// η = V/T ∫ C(t) dt by the trapezoid rule.
    pub fn viscosity(&self, volume: f64, temperature: f64) -> Result<f64> {
        if !(temperature > 0.0) {
            return Err(Error::MathError(format!(
                "viscosity needs a positive temperature, got {temperature}"
            )));
        }
        let dt = match self.lag_times.as_slice() {
            [a, b, ..] => b - a,
            _ => return Ok(0.0),
        };
        let c = &self.correlation;
        let inner: f64 = c.iter().sum();
        let integral = dt * (inner - 0.5 * (c[0] + c[c.len() - 1]));
        Ok(volume / temperature * integral)
    }
}

impl StressAutocorrelation {
    /// `round(window / dt)` lag bins, each one time step wide.
    pub fn new(window: f64, dt: f64) -> Result<Self> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(Error::InvalidParam(format!("time step {dt} must be > 0")));
        }
        let nbins = (window / dt).round();
        if !(nbins >= 1.0) {
            return Err(Error::InvalidParam(format!(
                "correlation window {window} is shorter than one time step"
            )));
        }
        let nbins = nbins as usize;
        let span = nbins as f64 * dt;
        let components = (0..COMPONENTS)
            .map(|_| Histogram::new(0.0, span, nbins))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            components,
            counts: Histogram::new(0.0, span, nbins)?,
            dt,
            nbins,
            origin: [0.0; COMPONENTS],
            lag: None,
        })
    }

    pub fn nbins(&self) -> usize {
        self.nbins
    }

    /// Samples per lag bin.
    pub fn counts(&self) -> &Histogram {
        &self.counts
    }

    /// Record the traceless tensor of the current step.
    pub fn sample(&mut self, tau: &[f64; COMPONENTS]) {
        let lag = match self.lag {
            Some(k) if k < self.nbins => k,
            _ => {
                self.origin = *tau;
                0
            }
        };
        let t = (lag as f64 + 0.5) * self.dt;
        for (h, (o, x)) in self.components.iter_mut().zip(self.origin.iter().zip(tau)) {
            h.accumulate(t, o * x);
        }
        self.counts.increment(t);
        self.lag = Some(lag + 1);
    }

    /// Normalise every component by the per-lag sample count.
    pub fn finalize(&self) -> Result<StressCorrelation> {
        let components = self
            .components
            .iter()
            .map(|h| h.divide(&self.counts))
            .collect::<Result<Vec<_>>>()?;
        let correlation = (0..self.nbins)
            .map(|k| {
                let diag: f64 = components[..3].iter().map(|h| h.bins()[k]).sum();
                let off: f64 = components[3..].iter().map(|h| h.bins()[k]).sum();
                (diag + 2.0 * off) / 10.0
            })
            .collect();
        Ok(StressCorrelation {
            components,
            lag_times: (0..self.nbins).map(|k| k as f64 * self.dt).collect(),
            correlation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kinetic_part_of_pressure_tensor() -> Result<()> {
        let state = ParticleState::from_positions(&[[0.0; 3], [1.0; 3]])?
            .with_velocities(&[[1.0, 2.0, 0.0], [-1.0, 0.0, 3.0]])?;
        let stress = [0.5, 0.0, 0.0, 0.0, 0.0, 1.0];
        let p = pressure_tensor(&state, &stress, 2.0);
        assert_eq!(p, [1.25, 2.0, 4.5, 1.0, -1.5, 0.5]);
        let t = traceless(p);
        assert_relative_eq!(t[0] + t[1] + t[2], 0.0, epsilon = 1e-14);
        assert_eq!(&t[3..], &p[3..]);
        Ok(())
    }

    #[test]
    fn origin_resets_after_window() -> Result<()> {
        let mut acf = StressAutocorrelation::new(0.04, 0.01)?;
        assert_eq!(acf.nbins(), 4);
        let tau = [1.0, -2.0, 1.0, 0.5, 0.0, -1.0];
        for _ in 0..10 {
            acf.sample(&tau);
        }
        assert_eq!(acf.counts().bins(), &[3.0, 3.0, 2.0, 2.0]);

        let corr = acf.finalize()?;
        // constant signal: every lag correlates to tau^2
        let expected = (1.0 + 4.0 + 1.0 + 2.0 * (0.25 + 0.0 + 1.0)) / 10.0;
        for &c in &corr.correlation {
            assert_relative_eq!(c, expected, epsilon = 1e-12);
        }
        assert_relative_eq!(corr.components[1].bins()[2], 4.0, epsilon = 1e-12);
        assert_relative_eq!(corr.lag_times[3], 0.03, epsilon = 1e-15);

        let eta = corr.viscosity(8.0, 2.0)?;
        assert_relative_eq!(eta, 4.0 * expected * 0.03, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn window_shorter_than_step_rejected() {
        assert!(StressAutocorrelation::new(0.001, 0.01).is_err());
        assert!(StressAutocorrelation::new(0.1, 0.0).is_err());
    }
}

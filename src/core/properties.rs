//! Instantaneous and running property accumulators.

use crate::core::potential::ForceEvaluation;

/// Properties of the current configuration, overwritten at every computation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InstantProperties {
    pub potential_energy: f64,
    pub virial: f64,
    pub kinetic_energy: f64,
    pub temperature: f64,
    /// Configurational pressure-tensor sums (xx, yy, zz, xy, xz, yz).
    pub stress: [f64; 6],
}

impl InstantProperties {
    /// Take energy, virial and stress from a full-system kernel evaluation.
    pub fn set_forces(&mut self, eval: &ForceEvaluation) {
        self.potential_energy = eval.potential_energy;
        self.virial = eval.virial;
        self.stress = eval.stress;
    }
}

/// Phase-long sums of instantaneous properties.
///
/// One sample is one accumulation call: one MD step, or one proposed MC move.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningProperties {
    pub potential_energy: f64,
    pub potential_energy_sq: f64,
    pub virial: f64,
    pub kinetic_energy: f64,
    pub temperature: f64,
    pub samples: u64,
}

impl RunningProperties {
    /// Add one sample.
    pub fn accumulate(&mut self, inst: &InstantProperties) {
        self.potential_energy += inst.potential_energy;
        self.potential_energy_sq += inst.potential_energy * inst.potential_energy;
        self.virial += inst.virial;
        self.kinetic_energy += inst.kinetic_energy;
        self.temperature += inst.temperature;
        self.samples += 1;
    }

    /// Discard every sample.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    fn mean(&self, sum: f64) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            sum / self.samples as f64
        }
    }

    /// ⟨U⟩ over all samples.
    pub fn mean_potential_energy(&self) -> f64 {
        self.mean(self.potential_energy)
    }

    /// ⟨U²⟩.
    pub fn mean_potential_energy_sq(&self) -> f64 {
        self.mean(self.potential_energy_sq)
    }

    /// ⟨W⟩.
    pub fn mean_virial(&self) -> f64 {
        self.mean(self.virial)
    }

    /// ⟨K⟩.
    pub fn mean_kinetic_energy(&self) -> f64 {
        self.mean(self.kinetic_energy)
    }

    /// ⟨T⟩.
    pub fn mean_temperature(&self) -> f64 {
        self.mean(self.temperature)
    }

    /// ⟨U²⟩ - ⟨U⟩².
    pub fn potential_energy_variance(&self) -> f64 {
        let u = self.mean_potential_energy();
        self.mean_potential_energy_sq() - u * u
    }
}

/// Monte Carlo move statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveCounters {
    pub tried: u64,
    pub accepted: u64,
}

impl MoveCounters {
    /// accepted / tried, or `None` before the first attempt.
    pub fn ratio(&self) -> Option<f64> {
        (self.tried > 0).then(|| self.accepted as f64 / self.tried as f64)
    }

    /// Move the counts of `other` into `self`, leaving `other` empty.
    pub fn absorb(&mut self, other: &mut MoveCounters) {
        self.tried += other.tried;
        self.accepted += other.accepted;
        *other = MoveCounters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn running_means_and_variance() {
        let mut agg = RunningProperties::default();
        assert_eq!(agg.mean_potential_energy(), 0.0);
        for u in [-2.0, -4.0] {
            agg.accumulate(&InstantProperties {
                potential_energy: u,
                virial: 1.0,
                ..Default::default()
            });
        }
        assert_eq!(agg.samples, 2);
        assert_relative_eq!(agg.mean_potential_energy(), -3.0);
        assert_relative_eq!(agg.mean_potential_energy_sq(), 10.0);
        assert_relative_eq!(agg.potential_energy_variance(), 1.0);
        assert_relative_eq!(agg.mean_virial(), 1.0);
        agg.reset();
        assert_eq!(agg, RunningProperties::default());
    }

    #[test]
    fn counters_fold() {
        let mut total = MoveCounters::default();
        let mut recent = MoveCounters {
            tried: 10,
            accepted: 3,
        };
        assert_eq!(total.ratio(), None);
        total.absorb(&mut recent);
        assert_eq!(recent, MoveCounters::default());
        assert_eq!(total.ratio(), Some(0.3));
    }
}

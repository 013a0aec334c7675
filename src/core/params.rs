//! Simulation parameters.
//!
//! [`SimulationConfig`] is the thin, `serde`-deserializable form of a run
//! description as an input file would carry it. [`SimulationParameters`] is the
//! validated, immutable bundle the engine consumes, with the derived box length
//! and analytic tail corrections computed once.
//!
//! # YAML format
//!
//! ```yaml
//! method: mc              # "mc" (NVT Monte Carlo) or "md" (NVE molecular dynamics)
//! n: 500
//! temperature: 0.85
//! density: 0.9
//! equilibration_steps: 1000
//! production_steps: 5000
//! cutoff: 2.5
//! dt: 0.1                 # time step (md) or initial max displacement (mc)
//! output_interval: 100
//! seed: 42
//! rdf: { min: 0.8, max: 3.0, bins: 100, interval: 10 }
//! ```

use std::f64::consts::PI;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Sampling scheme.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Metropolis Monte Carlo at constant N, V, T.
    #[serde(rename = "mc")]
    MonteCarlo,
    /// Velocity-Verlet molecular dynamics at constant N, V, E.
    #[serde(rename = "md")]
    MolecularDynamics,
}

/// Radial distribution function binning and sampling cadence.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RdfConfig {
    pub min: f64,   // smallest separation binned
    pub max: f64,   // largest separation binned (exclusive)
    pub bins: usize,
    pub interval: u64, // production steps between samples
}

/// Pressure-tensor autocorrelation window (MD only).
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct StressConfig {
    pub window: f64, // correlation length in reduced time
}

fn default_output_interval() -> u64 {
    100
}

/// Raw run description, as loaded from a configuration document.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub method: Method,
    pub n: usize,
    pub temperature: f64,
    pub density: f64,
    pub equilibration_steps: u64,
    pub production_steps: u64,
    pub cutoff: f64,
    pub dt: f64,
    #[serde(default = "default_output_interval")]
    pub output_interval: u64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub rdf: Option<RdfConfig>,
    #[serde(default)]
    pub stress: Option<StressConfig>,
    #[serde(default)]
    pub full_recompute_on_accept: bool,
}

impl SimulationConfig {
    /// Minimal description with no steps, default output interval and no optional features.
    pub fn new(
        method: Method,
        n: usize,
        temperature: f64,
        density: f64,
        cutoff: f64,
        dt: f64,
    ) -> Self {
        Self {
            method,
            n,
            temperature,
            density,
            equilibration_steps: 0,
            production_steps: 0,
            cutoff,
            dt,
            output_interval: default_output_interval(),
            seed: None,
            rdf: None,
            stress: None,
            full_recompute_on_accept: false,
        }
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Read and parse a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(BufReader::new(file))?)
    }

    /// Validate and derive the immutable parameter bundle.
    pub fn build(self) -> Result<SimulationParameters> {
        SimulationParameters::from_config(self)
    }
}

/// Validated, immutable parameter bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParameters {
    method: Method,
    n: usize,
    temperature: f64,
    density: f64,
    equilibration_steps: u64,
    production_steps: u64,
    cutoff: f64,
    cutoff_sq: f64,
    dt: f64,
    output_interval: u64,
    seed: Option<u64>,
    rdf: Option<RdfConfig>,
    stress: Option<StressConfig>,
    full_recompute_on_accept: bool,
    box_length: f64,
    energy_tail: f64,
    pressure_tail: f64,
}

impl SimulationParameters {
    /// Validate `cfg` and derive L, rc² and the tail corrections.
    pub fn from_config(cfg: SimulationConfig) -> Result<Self> {
        if cfg.n == 0 {
            return Err(Error::InvalidParam("n must be > 0".into()));
        }
        positive("temperature", cfg.temperature)?;
        positive("density", cfg.density)?;
        positive("cutoff", cfg.cutoff)?;
        positive("dt", cfg.dt)?;
        if cfg.output_interval == 0 {
            return Err(Error::InvalidParam("output_interval must be > 0".into()));
        }

        let box_length = (cfg.n as f64 / cfg.density).cbrt();
        let half_box = 0.5 * box_length;
        if cfg.cutoff >= half_box {
            return Err(Error::CutoffTooLarge {
                cutoff: cfg.cutoff,
                half_box,
            });
        }

        if let Some(rdf) = &cfg.rdf {
            if !rdf.min.is_finite() || rdf.min < 0.0 {
                return Err(Error::InvalidParam("rdf min must be >= 0".into()));
            }
            if !rdf.max.is_finite() || rdf.max <= rdf.min {
                return Err(Error::InvalidParam("rdf max must exceed rdf min".into()));
            }
            if rdf.bins == 0 {
                return Err(Error::InvalidParam("rdf bins must be > 0".into()));
            }
            if rdf.interval == 0 {
                return Err(Error::InvalidParam("rdf interval must be > 0".into()));
            }
        }
        if let Some(stress) = &cfg.stress {
            if !stress.window.is_finite() || stress.window < cfg.dt {
                return Err(Error::InvalidParam(
                    "stress window must be at least one time step".into(),
                ));
            }
        }

        let rc3 = cfg.cutoff.powi(-3);
        let rc9 = cfg.cutoff.powi(-9);
        let energy_tail = 8.0 / 3.0 * PI * cfg.density * (rc9 / 3.0 - rc3);
        let pressure_tail =
            16.0 / 3.0 * PI * cfg.density * cfg.density * (2.0 / 3.0 * rc9 - rc3);

        Ok(Self {
            method: cfg.method,
            n: cfg.n,
            temperature: cfg.temperature,
            density: cfg.density,
            equilibration_steps: cfg.equilibration_steps,
            production_steps: cfg.production_steps,
            cutoff: cfg.cutoff,
            cutoff_sq: cfg.cutoff * cfg.cutoff,
            dt: cfg.dt,
            output_interval: cfg.output_interval,
            seed: cfg.seed,
            rdf: cfg.rdf,
            stress: cfg.stress,
            full_recompute_on_accept: cfg.full_recompute_on_accept,
            box_length,
            energy_tail,
            pressure_tail,
        })
    }

    /// Sampling scheme.
    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }
    /// Number of particles N.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }
    /// Temperature set point T*.
    #[inline]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }
    /// Number density ρ.
    #[inline]
    pub fn density(&self) -> f64 {
        self.density
    }
    /// Steps (MD) or sweeps (MC) before averaging starts.
    #[inline]
    pub fn equilibration_steps(&self) -> u64 {
        self.equilibration_steps
    }
    /// Steps (MD) or sweeps (MC) that are averaged.
    #[inline]
    pub fn production_steps(&self) -> u64 {
        self.production_steps
    }
    /// Pair cutoff radius rc.
    #[inline]
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }
    /// rc².
    #[inline]
    pub fn cutoff_sq(&self) -> f64 {
        self.cutoff_sq
    }
    /// Time step (MD) or initial maximum displacement (MC).
    #[inline]
    pub fn dt(&self) -> f64 {
        self.dt
    }
    /// Steps between periodic reports.
    #[inline]
    pub fn output_interval(&self) -> u64 {
        self.output_interval
    }
    /// Random seed, if the run is reproducible.
    #[inline]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
    /// Pair-distribution sampling, if configured.
    #[inline]
    pub fn rdf(&self) -> Option<&RdfConfig> {
        self.rdf.as_ref()
    }
    /// Pressure autocorrelation window, if configured.
    #[inline]
    pub fn stress(&self) -> Option<&StressConfig> {
        self.stress.as_ref()
    }
    /// Whether an accepted MC move triggers a full O(N²) evaluation.
    #[inline]
    pub fn full_recompute_on_accept(&self) -> bool {
        self.full_recompute_on_accept
    }
    /// Box edge L = (N/ρ)^(1/3).
    #[inline]
    pub fn box_length(&self) -> f64 {
        self.box_length
    }
    /// Box volume L³.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.box_length * self.box_length * self.box_length
    }
    /// Energy tail correction per particle.
    #[inline]
    pub fn energy_tail(&self) -> f64 {
        self.energy_tail
    }
    /// Pressure tail correction.
    #[inline]
    pub fn pressure_tail(&self) -> f64 {
        self.pressure_tail
    }

    /// Virial pressure P = ρT + W/(3V) + P_tail.
    #[inline]
    pub fn pressure(&self, temperature: f64, virial: f64) -> f64 {
        self.density * temperature + virial / (3.0 * self.volume()) + self.pressure_tail
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::InvalidParam(format!(
            "{name} must be finite and > 0"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn derived_quantities() -> Result<()> {
        let p = SimulationConfig::new(Method::MonteCarlo, 500, 0.85, 0.9, 2.5, 0.1).build()?;
        assert_relative_eq!(p.box_length(), (500.0f64 / 0.9).cbrt(), epsilon = 1e-12);
        assert_relative_eq!(p.cutoff_sq(), 6.25);
        let rc = 2.5f64;
        let utail = 8.0 / 3.0 * PI * 0.9 * (1.0 / 3.0 * rc.powi(-9) - rc.powi(-3));
        let ptail = 16.0 / 3.0 * PI * 0.81 * (2.0 / 3.0 * rc.powi(-9) - rc.powi(-3));
        assert_relative_eq!(p.energy_tail(), utail, epsilon = 1e-14);
        assert_relative_eq!(p.pressure_tail(), ptail, epsilon = 1e-14);
        assert!(p.energy_tail() < 0.0 && p.pressure_tail() < 0.0);
        Ok(())
    }

    #[test]
    fn cutoff_must_be_below_half_box() {
        // N = 32, rho = 1 -> L = 3.1748, L/2 = 1.587
        let err = SimulationConfig::new(Method::MolecularDynamics, 32, 1.0, 1.0, 2.5, 0.005)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::CutoffTooLarge { .. }));
    }

    #[test]
    fn invalid_scalars_rejected() {
        let base = SimulationConfig::new(Method::MonteCarlo, 100, 1.0, 0.5, 2.0, 0.1);
        let mut c = base.clone();
        c.n = 0;
        assert!(c.build().is_err());
        let mut c = base.clone();
        c.temperature = -1.0;
        assert!(c.build().unwrap_err().to_string().contains("temperature"));
        let mut c = base.clone();
        c.density = f64::NAN;
        assert!(c.build().is_err());
        let mut c = base.clone();
        c.output_interval = 0;
        assert!(c.build().is_err());
        let mut c = base;
        c.rdf = Some(RdfConfig {
            min: 2.0,
            max: 1.0,
            bins: 10,
            interval: 1,
        });
        assert!(c.build().unwrap_err().to_string().contains("rdf"));
    }

    #[test]
    fn parse_yaml_config() -> Result<()> {
        let doc = r#"
method: md
n: 108
temperature: 1.2
density: 0.8
equilibration_steps: 100
production_steps: 200
cutoff: 2.5
dt: 0.004
seed: 7
rdf: { min: 0.5, max: 2.5, bins: 40, interval: 5 }
"#;
        let cfg = SimulationConfig::from_yaml_str(doc)?;
        assert_eq!(cfg.method, Method::MolecularDynamics);
        assert_eq!(cfg.output_interval, 100);
        assert_eq!(cfg.seed, Some(7));
        assert!(cfg.stress.is_none());
        assert!(!cfg.full_recompute_on_accept);
        let p = cfg.build()?;
        assert_eq!(p.rdf().map(|r| r.bins), Some(40));
        Ok(())
    }

    #[test]
    fn unknown_method_is_a_config_error() {
        let doc = "method: bd\nn: 4\ntemperature: 1\ndensity: 0.1\nequilibration_steps: 0\nproduction_steps: 0\ncutoff: 1\ndt: 0.1\n";
        assert!(matches!(
            SimulationConfig::from_yaml_str(doc),
            Err(Error::Config(_))
        ));
    }
}

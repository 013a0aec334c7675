//! Lennard-Jones fluid simulation: NVT Metropolis Monte Carlo and NVE
//! velocity-Verlet molecular dynamics under periodic boundary conditions.

pub mod core;
pub mod error;

#[cfg(feature = "python")]
mod python;

pub use crate::core::{Method, Simulation, SimulationConfig, SimulationParameters};
pub use crate::error::{Error, Result};

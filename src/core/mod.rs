//! Lennard-Jones fluid simulation engine.
//!
//! Leaf modules first: histogramming, the pair kernel, momentum and temperature
//! utilities, then the two sampling schemes and the run orchestrator in [`sim`].

pub mod histogram;
pub mod monte_carlo;
pub mod params;
pub mod particle;
pub mod potential;
pub mod properties;
pub mod rdf;
pub mod sim;
pub mod stress;
pub mod thermo;
pub mod verlet;

pub use histogram::Histogram;
pub use monte_carlo::{MonteCarlo, MoveOutcome, StepController};
pub use params::{Method, RdfConfig, SimulationConfig, SimulationParameters, StressConfig};
pub use particle::{Particle, ParticleState};
pub use potential::ForceEvaluation;
pub use properties::{InstantProperties, MoveCounters, RunningProperties};
pub use rdf::RdfAccumulator;
pub use sim::{
    Ensemble, FinalAverages, LogObserver, McAverages, MdAverages, MolecularDynamicsEnsemble,
    MonteCarloEnsemble, NullObserver, Observer, Phase, RunSummary, Simulation, StepReport,
    StressSummary,
};
pub use stress::{StressAutocorrelation, StressCorrelation};

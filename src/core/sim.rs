use std::fmt;

use rand::{rng, rngs::StdRng, Rng, SeedableRng};

use crate::core::histogram::Histogram;
use crate::core::monte_carlo::MonteCarlo;
use crate::core::params::{Method, SimulationParameters};
use crate::core::particle::{fcc_lattice, ParticleState, DIM};
use crate::core::potential::compute_forces;
use crate::core::properties::{InstantProperties, RunningProperties};
use crate::core::rdf::RdfAccumulator;
use crate::core::stress::{pressure_tensor, traceless, StressAutocorrelation, StressCorrelation};
use crate::core::thermo::{
    initialize_velocities, kinetic_energy, rescale_velocities, temperature_from_kinetic,
    zero_momentum,
};
use crate::core::verlet::{verlet_first_half, verlet_second_half};
use crate::error::{Error, Result};

/// Production sweeps between step-size adjustments (every sweep during equilibration).
const PRODUCTION_STEP_CONTROL_INTERVAL: u64 = 100;
/// MD equilibration steps between isokinetic rescales.
const RESCALE_INTERVAL: u64 = 100;

/// Seeded stream, or one seeded from the thread RNG when no seed is given.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => SeedableRng::seed_from_u64(s),
        None => SeedableRng::seed_from_u64(rng().random()),
    }
}

/// Run lifecycle; strictly advances in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    Equilibration,
    Production,
    Finalize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Equilibration => "equilibration",
            Phase::Production => "production",
            Phase::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// Per-interval property tuple. Energies are per particle; potential energies
/// include the tail correction.
#[derive(Debug, Clone, PartialEq)]
pub enum StepReport {
    MonteCarlo {
        phase: Phase,
        iteration: u64,
        pressure: f64,
        mean_pressure: f64,
        potential_energy: f64,
    },
    MolecularDynamics {
        phase: Phase,
        iteration: u64,
        temperature: f64,
        mean_temperature: f64,
        pressure: f64,
        mean_pressure: f64,
        kinetic_energy: f64,
        potential_energy: f64,
        total_energy: f64,
    },
}

impl StepReport {
    pub fn phase(&self) -> Phase {
        match self {
            StepReport::MonteCarlo { phase, .. } | StepReport::MolecularDynamics { phase, .. } => {
                *phase
            }
        }
    }

    pub fn iteration(&self) -> u64 {
        match self {
            StepReport::MonteCarlo { iteration, .. }
            | StepReport::MolecularDynamics { iteration, .. } => *iteration,
        }
    }
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepReport::MonteCarlo {
                phase,
                iteration,
                pressure,
                mean_pressure,
                potential_energy,
            } => write!(
                f,
                "{phase} {iteration:<10} {pressure:13.6} {mean_pressure:13.6} {potential_energy:13.6}"
            ),
            StepReport::MolecularDynamics {
                phase,
                iteration,
                temperature,
                mean_temperature,
                pressure,
                mean_pressure,
                kinetic_energy,
                potential_energy,
                total_energy,
            } => write!(
                f,
                "{phase} {iteration:<10} {temperature:13.6} {mean_temperature:13.6} \
                 {pressure:13.6} {mean_pressure:13.6} {kinetic_energy:13.6} \
                 {potential_energy:13.6} {total_energy:13.6}"
            ),
        }
    }
}

/// Receives phase transitions and periodic reports during a run.
pub trait Observer {
    fn phase_changed(&mut self, _phase: Phase) {}
    fn report(&mut self, report: &StepReport);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn report(&mut self, _report: &StepReport) {}
}

/// Writes every report through `log` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn phase_changed(&mut self, phase: Phase) {
        log::info!("entering {phase} phase");
    }

    fn report(&mut self, report: &StepReport) {
        log::info!("{report}");
    }
}

impl Observer for Vec<StepReport> {
    fn report(&mut self, report: &StepReport) {
        self.push(report.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McAverages {
    /// Accepted over tried production moves; `None` if nothing was tried.
    pub acceptance_ratio: Option<f64>,
    pub max_displacement: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MdAverages {
    /// Per particle.
    pub kinetic_energy: f64,
    /// Per particle, including the energy tail correction.
    pub total_energy: f64,
    pub diffusivity: f64,
}

/// Production averages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalAverages {
    pub temperature: f64,
    pub pressure: f64,
    pub heat_capacity: f64,
    /// Per particle, including the energy tail correction.
    pub potential_energy: f64,
    pub mc: Option<McAverages>,
    pub md: Option<MdAverages>,
}

#[derive(Debug, Clone)]
pub struct StressSummary {
    pub correlation: StressCorrelation,
    pub viscosity: f64,
}

/// Everything a finished run hands back.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// `None` when no production steps were run.
    pub averages: Option<FinalAverages>,
    /// Normalised g(r), when RDF sampling was configured.
    pub rdf: Option<Histogram>,
    /// Pressure autocorrelation and shear viscosity (MD with a correlation window only).
    pub stress: Option<StressSummary>,
}

/// One sampling scheme driven by [`Simulation`].
///
/// A step is one MD time step or one MC sweep of N proposed moves.
pub trait Ensemble: fmt::Debug + Send {
    fn method(&self) -> Method;

    /// Compute iteration-0 properties.
    fn initialize(
        &mut self,
        state: &mut ParticleState,
        params: &SimulationParameters,
        inst: &mut InstantProperties,
    ) -> Result<()>;

    /// Advance one step and fold the resulting properties into `agg`.
    fn advance(
        &mut self,
        state: &mut ParticleState,
        params: &SimulationParameters,
        inst: &mut InstantProperties,
        agg: &mut RunningProperties,
    ) -> Result<()>;

    /// Periodic work after step `iteration` has been reported.
    fn maintain(
        &mut self,
        phase: Phase,
        iteration: u64,
        state: &mut ParticleState,
        params: &SimulationParameters,
        inst: &mut InstantProperties,
    ) -> Result<()>;

    /// Reset per-phase bookkeeping at the equilibration/production boundary.
    fn begin_production(&mut self, state: &mut ParticleState);

    fn report(
        &self,
        phase: Phase,
        iteration: u64,
        params: &SimulationParameters,
        inst: &InstantProperties,
        agg: &RunningProperties,
    ) -> StepReport;

    fn averages(
        &self,
        state: &ParticleState,
        params: &SimulationParameters,
        agg: &RunningProperties,
    ) -> Result<FinalAverages>;
}

/// Metropolis Monte Carlo at constant N, V, T.
#[derive(Debug, Clone)]
pub struct MonteCarloEnsemble {
    engine: MonteCarlo,
}

impl MonteCarloEnsemble {
    pub fn new(rng: StdRng, max_displacement: f64) -> Self {
        Self {
            engine: MonteCarlo::new(rng, max_displacement),
        }
    }

    pub fn engine(&self) -> &MonteCarlo {
        &self.engine
    }
}

impl Ensemble for MonteCarloEnsemble {
    fn method(&self) -> Method {
        Method::MonteCarlo
    }

    fn initialize(
        &mut self,
        state: &mut ParticleState,
        params: &SimulationParameters,
        inst: &mut InstantProperties,
    ) -> Result<()> {
        inst.set_forces(&compute_forces(state, params)?);
        inst.temperature = params.temperature();
        self.engine.refresh_energies(state, params)
    }

    fn advance(
        &mut self,
        state: &mut ParticleState,
        params: &SimulationParameters,
        inst: &mut InstantProperties,
        agg: &mut RunningProperties,
    ) -> Result<()> {
        for _ in 0..state.len() {
            self.engine.attempt_move(state, params, inst)?;
            agg.accumulate(inst);
        }
        Ok(())
    }

    fn maintain(
        &mut self,
        phase: Phase,
        iteration: u64,
        _state: &mut ParticleState,
        _params: &SimulationParameters,
        _inst: &mut InstantProperties,
    ) -> Result<()> {
        let due = match phase {
            Phase::Equilibration => true,
            Phase::Production => iteration % PRODUCTION_STEP_CONTROL_INTERVAL == 0,
            _ => false,
        };
        if due {
            self.engine.adjust_step();
        }
        Ok(())
    }

    fn begin_production(&mut self, _state: &mut ParticleState) {
        self.engine.reset_counters();
    }

    fn report(
        &self,
        phase: Phase,
        iteration: u64,
        params: &SimulationParameters,
        inst: &InstantProperties,
        agg: &RunningProperties,
    ) -> StepReport {
        let t = params.temperature();
        let mean_virial = if agg.samples > 0 {
            agg.mean_virial()
        } else {
            inst.virial
        };
        StepReport::MonteCarlo {
            phase,
            iteration,
            pressure: params.pressure(t, inst.virial),
            mean_pressure: params.pressure(t, mean_virial),
            potential_energy: inst.potential_energy / params.n() as f64 + params.energy_tail(),
        }
    }

    fn averages(
        &self,
        _state: &ParticleState,
        params: &SimulationParameters,
        agg: &RunningProperties,
    ) -> Result<FinalAverages> {
        let n = params.n() as f64;
        let t = params.temperature();
        let heat_capacity = agg.potential_energy_variance() / (n * t * t) + 1.5;
        Ok(FinalAverages {
            temperature: t,
            pressure: params.pressure(t, agg.mean_virial()),
            heat_capacity,
            potential_energy: agg.mean_potential_energy() / n + params.energy_tail(),
            mc: Some(McAverages {
                acceptance_ratio: self.engine.controller().overall().ratio(),
                max_displacement: self.engine.max_displacement(),
            }),
            md: None,
        })
    }
}

/// Velocity-Verlet molecular dynamics at constant N, V, E.
#[derive(Debug, Clone, Default)]
pub struct MolecularDynamicsEnsemble;

impl MolecularDynamicsEnsemble {
    fn refresh_kinetic(state: &ParticleState, inst: &mut InstantProperties) {
        inst.kinetic_energy = kinetic_energy(state);
        inst.temperature = temperature_from_kinetic(inst.kinetic_energy, state.len());
    }
}

impl Ensemble for MolecularDynamicsEnsemble {
    fn method(&self) -> Method {
        Method::MolecularDynamics
    }

    fn initialize(
        &mut self,
        state: &mut ParticleState,
        params: &SimulationParameters,
        inst: &mut InstantProperties,
    ) -> Result<()> {
        zero_momentum(state)?;
        inst.set_forces(&compute_forces(state, params)?);
        Self::refresh_kinetic(state, inst);
        Ok(())
    }

    fn advance(
        &mut self,
        state: &mut ParticleState,
        params: &SimulationParameters,
        inst: &mut InstantProperties,
        agg: &mut RunningProperties,
    ) -> Result<()> {
        let dt = params.dt();
        verlet_first_half(state, dt, params.box_length());
        inst.set_forces(&compute_forces(state, params)?);
        verlet_second_half(state, dt);
        Self::refresh_kinetic(state, inst);
        agg.accumulate(inst);
        Ok(())
    }

    fn maintain(
        &mut self,
        phase: Phase,
        iteration: u64,
        state: &mut ParticleState,
        params: &SimulationParameters,
        inst: &mut InstantProperties,
    ) -> Result<()> {
        if phase != Phase::Equilibration || iteration % RESCALE_INTERVAL != 0 {
            return Ok(());
        }
        if inst.temperature > 0.0 {
            rescale_velocities(state, params.temperature(), inst.temperature)?;
            Self::refresh_kinetic(state, inst);
        } else {
            log::warn!("step {iteration}: system has no kinetic energy, skipping rescale");
        }
        Ok(())
    }

    fn begin_production(&mut self, state: &mut ParticleState) {
        state.reset_displacements();
    }

    fn report(
        &self,
        phase: Phase,
        iteration: u64,
        params: &SimulationParameters,
        inst: &InstantProperties,
        agg: &RunningProperties,
    ) -> StepReport {
        let n = params.n() as f64;
        let (mean_t, mean_virial) = if agg.samples > 0 {
            (agg.mean_temperature(), agg.mean_virial())
        } else {
            (inst.temperature, inst.virial)
        };
        let ke = inst.kinetic_energy / n;
        let pe = inst.potential_energy / n + params.energy_tail();
        StepReport::MolecularDynamics {
            phase,
            iteration,
            temperature: inst.temperature,
            mean_temperature: mean_t,
            pressure: params.pressure(inst.temperature, inst.virial),
            mean_pressure: params.pressure(mean_t, mean_virial),
            kinetic_energy: ke,
            potential_energy: pe,
            total_energy: ke + pe,
        }
    }

    fn averages(
        &self,
        state: &ParticleState,
        params: &SimulationParameters,
        agg: &RunningProperties,
    ) -> Result<FinalAverages> {
        let n = params.n() as f64;
        let t = agg.mean_temperature();
        if !(t > 0.0) {
            return Err(Error::MathError(format!(
                "NVE heat capacity undefined at mean temperature {t}"
            )));
        }
        let heat_capacity =
            1.5 / (1.0 - 2.0 / 3.0 * agg.potential_energy_variance() / (n * t * t));
        let ke = agg.mean_kinetic_energy() / n;
        let pe = agg.mean_potential_energy() / n + params.energy_tail();
        let diffusivity =
            state.squared_displacement_sum() / (agg.samples as f64 * n * 6.0 * params.dt());
        Ok(FinalAverages {
            temperature: t,
            pressure: params.pressure(t, agg.mean_virial()),
            heat_capacity,
            potential_energy: pe,
            mc: None,
            md: Some(MdAverages {
                kinetic_energy: ke,
                total_energy: ke + pe,
                diffusivity,
            }),
        })
    }
}

/// Equilibration/production driver for one run.
///
/// Owns the particle state, the ensemble (and with it the random stream) and
/// both property accumulators for the lifetime of the run.
#[derive(Debug)]
pub struct Simulation {
    params: SimulationParameters,
    state: ParticleState,
    ensemble: Box<dyn Ensemble>,
    inst: InstantProperties,
    agg: RunningProperties,
    phase: Phase,
}

impl Simulation {
    /// Run on a caller-supplied configuration, seeding the stream from the parameters.
    pub fn new(params: SimulationParameters, state: ParticleState) -> Result<Self> {
        let rng = seeded_rng(params.seed());
        Self::with_rng(params, state, rng)
    }

    /// Errors:
    /// - `Error::ParticleCountMismatch` / `Error::OutOfBounds` if `state` does not fit `params`.
    pub fn with_rng(
        params: SimulationParameters,
        state: ParticleState,
        rng: StdRng,
    ) -> Result<Self> {
        state.validate(params.n(), params.box_length())?;
        let ensemble: Box<dyn Ensemble> = match params.method() {
            Method::MonteCarlo => Box::new(MonteCarloEnsemble::new(rng, params.dt())),
            Method::MolecularDynamics => Box::new(MolecularDynamicsEnsemble),
        };
        Ok(Self {
            params,
            state,
            ensemble,
            inst: InstantProperties::default(),
            agg: RunningProperties::default(),
            phase: Phase::Init,
        })
    }

    /// Start from an FCC lattice; MD runs also get random velocities at the set point,
    /// drawn from the same stream the run continues with.
    pub fn from_lattice(params: SimulationParameters) -> Result<Self> {
        let mut rng = seeded_rng(params.seed());
        let mut state =
            ParticleState::from_positions(&fcc_lattice(params.n(), params.box_length())?)?;
        if params.method() == Method::MolecularDynamics {
            initialize_velocities(&mut state, params.temperature(), &mut rng)?;
        }
        Self::with_rng(params, state, rng)
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn state(&self) -> &ParticleState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ensemble(&self) -> &dyn Ensemble {
        self.ensemble.as_ref()
    }

    pub fn instant(&self) -> &InstantProperties {
        &self.inst
    }

    pub fn positions(&self) -> Vec<[f64; DIM]> {
        self.state.positions()
    }

    pub fn velocities(&self) -> Vec<[f64; DIM]> {
        self.state.velocities()
    }

    fn enter(&mut self, phase: Phase, observer: &mut dyn Observer) {
        self.phase = phase;
        observer.phase_changed(phase);
    }

    fn emit(&self, iteration: u64, observer: &mut dyn Observer) {
        let report =
            self.ensemble
                .report(self.phase, iteration, &self.params, &self.inst, &self.agg);
        observer.report(&report);
    }

    /// Execute the whole run: iteration-0 properties, equilibration, production and
    /// the final reduction. A simulation runs once.
    pub fn run(&mut self, observer: &mut dyn Observer) -> Result<RunSummary> {
        if self.phase != Phase::Init {
            return Err(Error::InvalidParam(format!(
                "simulation cannot run again from the {} phase",
                self.phase
            )));
        }
        let method = self.ensemble.method();
        log::info!(
            "{method:?}: N={} T={} rho={} L={:.6} rc={}",
            self.params.n(),
            self.params.temperature(),
            self.params.density(),
            self.params.box_length(),
            self.params.cutoff()
        );
        observer.phase_changed(Phase::Init);
        self.ensemble
            .initialize(&mut self.state, &self.params, &mut self.inst)?;
        self.emit(0, observer);

        self.enter(Phase::Equilibration, observer);
        for i in 1..=self.params.equilibration_steps() {
            self.step(i, observer)?;
        }

        self.agg.reset();
        self.ensemble.begin_production(&mut self.state);
        let mut rdf = self.params.rdf().map(RdfAccumulator::new).transpose()?;
        let mut acf = self.stress_autocorrelation()?;
        self.enter(Phase::Production, observer);
        for i in 1..=self.params.production_steps() {
            self.step(i, observer)?;
            if let Some(rdf) = rdf.as_mut() {
                let interval = self.params.rdf().map_or(1, |c| c.interval);
                if i % interval == 0 {
                    rdf.sample(&self.state, self.params.box_length());
                }
            }
            if let Some(acf) = acf.as_mut() {
                acf.sample(&self.current_traceless_pressure());
            }
        }

        self.enter(Phase::Finalize, observer);
        let averages = if self.params.production_steps() > 0 {
            Some(
                self.ensemble
                    .averages(&self.state, &self.params, &self.agg)?,
            )
        } else {
            log::warn!("no production steps, averages not computed");
            None
        };
        let rdf = rdf.map(|r| r.finalize(self.params.density(), self.params.n()));
        let stress = match (acf, averages.as_ref()) {
            (Some(acf), Some(avg)) => {
                let correlation = acf.finalize()?;
                let viscosity = correlation.viscosity(self.params.volume(), avg.temperature)?;
                Some(StressSummary {
                    correlation,
                    viscosity,
                })
            }
            _ => None,
        };
        if let Some(avg) = &averages {
            log::info!(
                "averages: T={:.6} P={:.6} Cv={:.6} U/N={:.6}",
                avg.temperature,
                avg.pressure,
                avg.heat_capacity,
                avg.potential_energy
            );
        }
        Ok(RunSummary {
            averages,
            rdf,
            stress,
        })
    }

    fn step(&mut self, iteration: u64, observer: &mut dyn Observer) -> Result<()> {
        self.ensemble
            .advance(&mut self.state, &self.params, &mut self.inst, &mut self.agg)?;
        if iteration % self.params.output_interval() == 0 {
            self.emit(iteration, observer);
        }
        self.ensemble.maintain(
            self.phase,
            iteration,
            &mut self.state,
            &self.params,
            &mut self.inst,
        )
    }

    /// Pressure autocorrelation seeded with the configuration at the start of production.
    fn stress_autocorrelation(&self) -> Result<Option<StressAutocorrelation>> {
        let Some(cfg) = self.params.stress() else {
            return Ok(None);
        };
        if self.params.method() != Method::MolecularDynamics {
            log::warn!("pressure autocorrelation needs dynamics, ignored for Monte Carlo");
            return Ok(None);
        }
        let mut acf = StressAutocorrelation::new(cfg.window, self.params.dt())?;
        acf.sample(&self.current_traceless_pressure());
        Ok(Some(acf))
    }

    fn current_traceless_pressure(&self) -> [f64; 6] {
        traceless(pressure_tensor(
            &self.state,
            &self.inst.stress,
            self.params.volume(),
        ))
    }
}

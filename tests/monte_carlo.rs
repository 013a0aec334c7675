use approx::assert_relative_eq;
use ljfluid::core::{Method, NullObserver, Simulation, SimulationConfig, StepReport};

fn config(n: usize, density: f64, cutoff: f64, max_disp: f64, seed: u64) -> SimulationConfig {
    let mut cfg = SimulationConfig::new(Method::MonteCarlo, n, 1.0, density, cutoff, max_disp);
    cfg.seed = Some(seed);
    cfg
}

/// Four particles at low density never come within the cutoff: the potential energy
/// is exactly the tail correction and the heat capacity is the ideal-gas 3/2.
#[test]
fn ideal_gas_limit() -> ljfluid::error::Result<()> {
    let mut cfg = config(4, 0.1, 1.0, 0.01, 1);
    cfg.equilibration_steps = 10;
    cfg.production_steps = 50;
    let mut sim = Simulation::from_lattice(cfg.build()?)?;
    let summary = sim.run(&mut NullObserver)?;
    let avg = summary.averages.expect("production ran");

    assert_relative_eq!(
        avg.potential_energy - sim.params().energy_tail(),
        0.0,
        epsilon = 1e-12
    );
    assert_relative_eq!(avg.heat_capacity, 1.5, epsilon = 1e-12);
    assert_eq!(avg.temperature, 1.0);
    // ideal-gas pressure rho*T plus the tail
    assert_relative_eq!(
        avg.pressure,
        0.1 + sim.params().pressure_tail(),
        epsilon = 1e-12
    );
    let mc = avg.mc.expect("mc averages");
    assert_eq!(mc.acceptance_ratio, Some(1.0));
    // every equilibration sweep accepts everything, so the step only grows
    assert!(mc.max_displacement > 0.01);
    Ok(())
}

/// From an oversized initial step the controller settles the acceptance ratio near 0.3.
#[test]
fn step_controller_reaches_target_acceptance() -> ljfluid::error::Result<()> {
    let mut cfg = config(108, 0.8, 2.5, 1.5, 2718);
    cfg.equilibration_steps = 200;
    cfg.production_steps = 100;
    let mut sim = Simulation::from_lattice(cfg.build()?)?;
    let avg = sim.run(&mut NullObserver)?.averages.expect("production ran");
    let mc = avg.mc.expect("mc averages");
    let ratio = mc.acceptance_ratio.expect("moves were tried");
    // production keeps the step of the last equilibration sweep until sweep 100
    assert!(
        (0.24..=0.36).contains(&ratio),
        "acceptance ratio {ratio} far from target"
    );
    assert!(mc.max_displacement < 1.5);
    assert!(avg.potential_energy < 0.0, "dense liquid should be bound");
    assert!(avg.pressure.is_finite() && avg.heat_capacity.is_finite());
    Ok(())
}

/// Incremental and full-recompute acceptance bookkeeping walk the same Markov chain.
#[test]
fn acceptance_bookkeeping_modes_agree() -> ljfluid::error::Result<()> {
    let run = |full: bool| -> ljfluid::error::Result<_> {
        let mut cfg = config(32, 0.5, 1.5, 0.2, 99);
        cfg.equilibration_steps = 10;
        cfg.production_steps = 20;
        cfg.full_recompute_on_accept = full;
        let mut sim = Simulation::from_lattice(cfg.build()?)?;
        let avg = sim.run(&mut NullObserver)?.averages.expect("production ran");
        Ok((sim.positions(), avg))
    };
    let (pos_inc, avg_inc) = run(false)?;
    let (pos_full, avg_full) = run(true)?;
    assert_eq!(pos_inc, pos_full);
    let (mc_inc, mc_full) = (avg_inc.mc.expect("mc"), avg_full.mc.expect("mc"));
    assert_eq!(mc_inc.acceptance_ratio, mc_full.acceptance_ratio);
    assert_eq!(mc_inc.max_displacement, mc_full.max_displacement);
    assert_relative_eq!(avg_inc.potential_energy, avg_full.potential_energy, max_relative = 1e-9);
    assert_relative_eq!(avg_inc.pressure, avg_full.pressure, max_relative = 1e-9);
    Ok(())
}

/// A fixed seed reproduces the trajectory; a different seed does not.
#[test]
fn seed_determines_trajectory() -> ljfluid::error::Result<()> {
    let run = |seed: u64| -> ljfluid::error::Result<_> {
        let mut cfg = config(32, 0.5, 1.5, 0.2, seed);
        cfg.equilibration_steps = 3;
        cfg.production_steps = 3;
        let mut sim = Simulation::from_lattice(cfg.build()?)?;
        sim.run(&mut NullObserver)?;
        Ok(sim.positions())
    };
    assert_eq!(run(5)?, run(5)?);
    assert_ne!(run(5)?, run(6)?);
    Ok(())
}

/// Reports carry the pressure tuple at every output interval, and the running mean of
/// the first report equals the instantaneous value.
#[test]
fn reports_follow_output_interval() -> ljfluid::error::Result<()> {
    let mut cfg = config(32, 0.5, 1.5, 0.2, 4);
    cfg.equilibration_steps = 6;
    cfg.production_steps = 9;
    cfg.output_interval = 3;
    let mut sim = Simulation::from_lattice(cfg.build()?)?;
    let mut reports: Vec<StepReport> = Vec::new();
    sim.run(&mut reports)?;
    assert_eq!(reports.len(), 1 + 2 + 3);
    match &reports[0] {
        StepReport::MonteCarlo {
            iteration,
            pressure,
            mean_pressure,
            ..
        } => {
            assert_eq!(*iteration, 0);
            assert_eq!(pressure, mean_pressure);
        }
        other => panic!("unexpected report {other:?}"),
    }
    assert!(reports
        .iter()
        .skip(1)
        .all(|r| r.iteration() % 3 == 0 && r.iteration() > 0));
    Ok(())
}

/// A full run can be described by a YAML document.
#[test]
fn yaml_configured_run() -> ljfluid::error::Result<()> {
    let doc = r#"
method: mc
n: 32
temperature: 1.5
density: 0.5
equilibration_steps: 2
production_steps: 4
cutoff: 1.5
dt: 0.2
output_interval: 2
seed: 12
rdf: { min: 0.5, max: 1.9, bins: 14, interval: 2 }
"#;
    let params = SimulationConfig::from_yaml_str(doc)?.build()?;
    let mut sim = Simulation::from_lattice(params)?;
    let summary = sim.run(&mut NullObserver)?;
    let rdf = summary.rdf.expect("rdf configured");
    assert_eq!(rdf.len(), 14);
    assert!(rdf.total() > 0.0);
    assert!(summary.stress.is_none());
    Ok(())
}

use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::core::histogram::Histogram;
use crate::core::params::{Method, RdfConfig, SimulationConfig, StressConfig};
use crate::core::particle::DIM;
use crate::core::sim::{LogObserver, Simulation};

fn py_err<E: ToString>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn rows_to_array(rows: &[[f64; DIM]]) -> Array2<f64> {
    let mut arr = Array2::<f64>::zeros((rows.len(), DIM));
    for (i, row) in rows.iter().enumerate() {
        for k in 0..DIM {
            arr[[i, k]] = row[k];
        }
    }
    arr
}

/// Python-facing Lennard-Jones fluid run.
///
/// - __new__(method, n, temperature, density, equilibration_steps, production_steps,
///   cutoff, dt, output_interval=100, seed=None, rdf=None, stress_window=None)
/// - run() -> dict of production averages
/// - get_positions() / get_velocities() -> np.ndarray, shape (N, 3)
/// - get_rdf() -> np.ndarray, shape (M, 2) of (r, g(r))
#[pyclass]
pub struct LjFluid {
    sim: Simulation,
    rdf: Option<Histogram>,
    viscosity: Option<f64>,
}

impl LjFluid {
    fn from_config(cfg: SimulationConfig) -> PyResult<Self> {
        let params = cfg.build().map_err(py_err)?;
        Ok(Self {
            sim: Simulation::from_lattice(params).map_err(py_err)?,
            rdf: None,
            viscosity: None,
        })
    }
}

#[pymethods]
impl LjFluid {
    /// Build a run on an FCC lattice (plus random velocities for "md").
    ///
    /// Parameters
    /// - method: "mc" or "md"
    /// - rdf: optional (min, max, bins, interval)
    /// - stress_window: optional pressure autocorrelation window (md only)
    ///
    /// Errors: raises ValueError on invalid parameters.
    #[new]
    #[pyo3(signature = (
        method, n, temperature, density, equilibration_steps, production_steps, cutoff, dt,
        output_interval=100, seed=None, rdf=None, stress_window=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        method: &str,
        n: usize,
        temperature: f64,
        density: f64,
        equilibration_steps: u64,
        production_steps: u64,
        cutoff: f64,
        dt: f64,
        output_interval: u64,
        seed: Option<u64>,
        rdf: Option<(f64, f64, usize, u64)>,
        stress_window: Option<f64>,
    ) -> PyResult<Self> {
        let method = match method {
            "mc" => Method::MonteCarlo,
            "md" => Method::MolecularDynamics,
            other => return Err(py_err(format!("unknown method '{other}', expected 'mc' or 'md'"))),
        };
        let mut cfg = SimulationConfig::new(method, n, temperature, density, cutoff, dt);
        cfg.equilibration_steps = equilibration_steps;
        cfg.production_steps = production_steps;
        cfg.output_interval = output_interval;
        cfg.seed = seed;
        cfg.rdf = rdf.map(|(min, max, bins, interval)| RdfConfig {
            min,
            max,
            bins,
            interval,
        });
        cfg.stress = stress_window.map(|window| StressConfig { window });
        Self::from_config(cfg)
    }

    /// Build a run from a YAML configuration file.
    #[staticmethod]
    fn from_yaml(path: &str) -> PyResult<Self> {
        Self::from_config(SimulationConfig::from_yaml_file(path).map_err(py_err)?)
    }

    /// Box edge length.
    #[getter]
    fn box_length(&self) -> f64 {
        self.sim.params().box_length()
    }

    /// Run equilibration and production (releases the GIL during computation).
    ///
    /// Returns a dict of production averages; empty when no production steps ran.
    fn run<'py>(&mut self, py: Python<'py>) -> PyResult<Py<PyDict>> {
        let summary = py.detach(|| self.sim.run(&mut LogObserver)).map_err(py_err)?;
        self.rdf = summary.rdf;
        self.viscosity = summary.stress.as_ref().map(|s| s.viscosity);

        let out = PyDict::new(py);
        if let Some(avg) = summary.averages {
            out.set_item("temperature", avg.temperature)?;
            out.set_item("pressure", avg.pressure)?;
            out.set_item("heat_capacity", avg.heat_capacity)?;
            out.set_item("potential_energy", avg.potential_energy)?;
            if let Some(md) = avg.md {
                out.set_item("kinetic_energy", md.kinetic_energy)?;
                out.set_item("total_energy", md.total_energy)?;
                out.set_item("diffusivity", md.diffusivity)?;
            }
            if let Some(mc) = avg.mc {
                out.set_item("acceptance_ratio", mc.acceptance_ratio)?;
                out.set_item("max_displacement", mc.max_displacement)?;
            }
        }
        if let Some(eta) = self.viscosity {
            out.set_item("viscosity", eta)?;
        }
        Ok(out.into())
    }

    /// Return positions as a NumPy array of shape (N, 3), dtype=float64.
    fn get_positions<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f64>>> {
        let arr = rows_to_array(&self.sim.positions());
        Ok(arr.into_pyarray(py).to_owned().into())
    }

    /// Return velocities as a NumPy array of shape (N, 3), dtype=float64.
    fn get_velocities<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f64>>> {
        let arr = rows_to_array(&self.sim.velocities());
        Ok(arr.into_pyarray(py).to_owned().into())
    }

    /// Return the normalised RDF as a (M, 2) array of [r, g(r)] after `run()`.
    fn get_rdf<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f64>>> {
        let Some(g) = &self.rdf else {
            return Err(py_err("no RDF available; configure rdf and call run() first"));
        };
        let mut arr = Array2::<f64>::zeros((g.len(), 2));
        for (i, (r, v)) in crate::core::rdf::rdf_points(g).into_iter().enumerate() {
            arr[[i, 0]] = r;
            arr[[i, 1]] = v;
        }
        Ok(arr.into_pyarray(py).to_owned().into())
    }
}

/// The ljfluid Python module entry point.
#[pymodule]
fn ljfluid(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<LjFluid>()?;
    Ok(())
}

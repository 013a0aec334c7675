use crate::error::{Error, Result};

/// Fixed spatial dimension (3D).
pub const DIM: usize = 3;

/// One Lennard-Jones site in reduced units (mass = 1).
///
/// Fields:
/// - `r`: position, always wrapped into `[0, L)` while a run is in progress
/// - `v`: velocity
/// - `f`: force from the last full-system kernel evaluation
/// - `d`: unwrapped displacement since the last reset (mean-squared displacement)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Particle {
    /// Position (x, y, z).
    pub r: [f64; DIM],
    /// Velocity (vx, vy, vz).
    pub v: [f64; DIM],
    /// Force (fx, fy, fz).
    pub f: [f64; DIM],
    /// Unwrapped displacement (dx, dy, dz); never folded back into the box.
    pub d: [f64; DIM],
}

impl Particle {
    /// Create a particle at rest after validating that the position is finite.
    pub fn at(r: [f64; DIM]) -> Result<Self> {
        Self::new(r, [0.0; DIM])
    }

    /// Create a particle with position and velocity.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if any component is NaN/inf.
    pub fn new(r: [f64; DIM], v: [f64; DIM]) -> Result<Self> {
        if !r.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        if !v.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        Ok(Self {
            r,
            v,
            ..Self::default()
        })
    }

    /// Returns the particle's kinetic energy: 1/2 |v|^2.
    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * dot(&self.v, &self.v)
    }

    /// Squared length of the unwrapped displacement accumulator.
    #[inline]
    pub fn squared_displacement(&self) -> f64 {
        dot(&self.d, &self.d)
    }

    /// Set velocity (validated as finite).
    pub fn set_velocity(&mut self, v: [f64; DIM]) -> Result<()> {
        if !v.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        self.v = v;
        Ok(())
    }
}

/// Per-particle state of one simulation, owned by the run orchestrator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleState {
    pub particles: Vec<Particle>,
}

impl ParticleState {
    /// Build a state at rest from a list of positions.
    pub fn from_positions(positions: &[[f64; DIM]]) -> Result<Self> {
        let particles = positions
            .iter()
            .map(|&r| Particle::at(r))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { particles })
    }

    /// Attach initial velocities; the count must match the number of positions.
    pub fn with_velocities(mut self, velocities: &[[f64; DIM]]) -> Result<Self> {
        if velocities.len() != self.particles.len() {
            return Err(Error::ParticleCountMismatch {
                expected: self.particles.len(),
                found: velocities.len(),
            });
        }
        for (p, &v) in self.particles.iter_mut().zip(velocities) {
            p.set_velocity(v)?;
        }
        Ok(self)
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Positions as a Vec of fixed-size arrays.
    pub fn positions(&self) -> Vec<[f64; DIM]> {
        self.particles.iter().map(|p| p.r).collect()
    }

    /// Velocities as a Vec of fixed-size arrays.
    pub fn velocities(&self) -> Vec<[f64; DIM]> {
        self.particles.iter().map(|p| p.v).collect()
    }

    /// Fail fast if the state does not describe `n` particles inside a box of edge `box_length`.
    pub fn validate(&self, n: usize, box_length: f64) -> Result<()> {
        if self.particles.len() != n {
            return Err(Error::ParticleCountMismatch {
                expected: n,
                found: self.particles.len(),
            });
        }
        for (i, p) in self.particles.iter().enumerate() {
            if !p.r.iter().all(|&x| x.is_finite() && (0.0..box_length).contains(&x)) {
                return Err(Error::OutOfBounds(format!(
                    "particle {i} at {:?} is outside [0, {box_length})",
                    p.r
                )));
            }
            if !p.v.iter().all(|x| x.is_finite()) {
                return Err(Error::InvalidParam(format!(
                    "particle {i} has a non-finite velocity"
                )));
            }
        }
        Ok(())
    }

    /// Zero the unwrapped displacement accumulators.
    pub fn reset_displacements(&mut self) {
        for p in &mut self.particles {
            p.d = [0.0; DIM];
        }
    }

    /// Sum of squared unwrapped displacements over all particles.
    pub fn squared_displacement_sum(&self) -> f64 {
        self.particles.iter().map(Particle::squared_displacement).sum()
    }
}

/// Fold a coordinate into `[0, box_length)`.
#[inline]
pub fn wrap(x: f64, box_length: f64) -> f64 {
    let w = x.rem_euclid(box_length);
    // rem_euclid rounds up to box_length for tiny negative inputs
    if w >= box_length {
        w - box_length
    } else {
        w
    }
}

/// Place `n` sites on a face-centred cubic lattice filling a cubic box.
///
/// The lattice has `nlin^3` unit cells with `nlin` the smallest integer such that
/// `4 * nlin^3 >= n`; cells are filled along x fastest, then y, then z, and sites
/// beyond `n` are left empty.
pub fn fcc_lattice(n: usize, box_length: f64) -> Result<Vec<[f64; DIM]>> {
    if !box_length.is_finite() || box_length <= 0.0 {
        return Err(Error::InvalidParam(
            "box length must be finite and > 0".into(),
        ));
    }
    const BASIS: [[f64; DIM]; 4] = [
        [0.0, 0.0, 0.0],
        [0.0, 0.5, 0.5],
        [0.5, 0.0, 0.5],
        [0.5, 0.5, 0.0],
    ];

    let mut nlin = ((n as f64) / 4.0).cbrt().floor() as usize;
    while 4 * nlin * nlin * nlin < n {
        nlin += 1;
    }
    let a = box_length / nlin.max(1) as f64;

    let mut out = Vec::with_capacity(n);
    'fill: for z in 0..nlin {
        for y in 0..nlin {
            for x in 0..nlin {
                for b in &BASIS {
                    if out.len() == n {
                        break 'fill;
                    }
                    out.push([
                        (x as f64 + b[0]) * a,
                        (y as f64 + b[1]) * a,
                        (z as f64 + b[2]) * a,
                    ]);
                }
            }
        }
    }
    Ok(out)
}

/// Dot product of two vectors.
#[inline]
pub fn dot(a: &[f64; DIM], b: &[f64; DIM]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the simulation core.
///
/// Every detected fault either aborts the run (returned through `?`) or, for
/// histogram binning mismatches, is handed back to the caller as a recoverable value.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user or API parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Particle arrays do not match the configured particle count.
    #[error("particle count mismatch: expected {expected}, found {found}")]
    ParticleCountMismatch { expected: usize, found: usize },

    /// Coordinate outside the periodic box or not finite.
    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    /// Cutoff radius violates the minimum-image requirement rc < L/2.
    #[error("cutoff {cutoff} must be smaller than half the box length ({half_box})")]
    CutoffTooLarge { cutoff: f64, half_box: f64 },

    /// Two particles share the same position; the pair potential is singular.
    #[error("particles {i} and {j} are coincident")]
    CoincidentParticles { i: usize, j: usize },

    /// Net linear momentum could not be removed.
    #[error("net momentum {0:e} could not be zeroed")]
    MomentumNotZeroed(f64),

    /// Two histograms with different bin layouts were combined.
    #[error("histograms have different binning")]
    BinningMismatch,

    /// Numerical issue (e.g. rescaling from a zero temperature).
    #[error("numerical error: {0}")]
    MathError(String),

    /// Malformed configuration document.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),

    /// Propagated I/O errors (configuration files).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

//! Fixed-range, uniformly binned histogram.
//!
//! Bin `i` covers `[xmin + i*w, xmin + (i+1)*w)` with `w = (xmax - xmin) / n`, so the
//! histogram includes `xmin` and excludes `xmax`. Samples outside the range are dropped.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    xmin: f64,
    xmax: f64,
    bin_width: f64,
    bins: Vec<f64>,
}

impl Histogram {
    /// Create an empty histogram with `n` bins over `[xmin, xmax)`.
    pub fn new(xmin: f64, xmax: f64, n: usize) -> Result<Self> {
        if !xmin.is_finite() || !xmax.is_finite() || xmax <= xmin {
            return Err(Error::InvalidParam(format!(
                "histogram range [{xmin}, {xmax}) is empty or not finite"
            )));
        }
        if n == 0 {
            return Err(Error::InvalidParam("histogram needs at least one bin".into()));
        }
        Ok(Self {
            xmin,
            xmax,
            bin_width: (xmax - xmin) / n as f64,
            bins: vec![0.0; n],
        })
    }

    /// Bin index for `x`, or `None` outside `[xmin, xmax)`.
    #[inline]
    pub fn index_of(&self, x: f64) -> Option<usize> {
        if !(x >= self.xmin && x < self.xmax) {
            return None;
        }
        let idx = ((x - self.xmin) / self.bin_width) as usize;
        // x just below xmax can round up to n
        Some(idx.min(self.bins.len() - 1))
    }

    /// Add `weight` to the bin containing `x`. Returns whether the sample was kept.
    pub fn accumulate(&mut self, x: f64, weight: f64) -> bool {
        match self.index_of(x) {
            Some(i) => {
                self.bins[i] += weight;
                true
            }
            None => false,
        }
    }

    /// Add one count to the bin containing `x`.
    #[inline]
    pub fn increment(&mut self, x: f64) -> bool {
        self.accumulate(x, 1.0)
    }

    pub fn bins(&self) -> &[f64] {
        &self.bins
    }

    pub fn bins_mut(&mut self) -> &mut [f64] {
        &mut self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    /// Left edge of bin `i`.
    #[inline]
    pub fn bin_lower(&self, i: usize) -> f64 {
        self.xmin + self.bin_width * i as f64
    }

    /// Centre of bin `i`.
    #[inline]
    pub fn bin_mid(&self, i: usize) -> f64 {
        self.xmin + self.bin_width * (i as f64 + 0.5)
    }

    pub fn midpoints(&self) -> Vec<f64> {
        (0..self.bins.len()).map(|i| self.bin_mid(i)).collect()
    }

    /// The `n + 1` bin edges.
    pub fn edges(&self) -> Vec<f64> {
        (0..=self.bins.len()).map(|i| self.bin_lower(i)).collect()
    }

    /// Sum over all bins.
    pub fn total(&self) -> f64 {
        self.bins.iter().sum()
    }

    pub fn clear(&mut self) {
        self.bins.iter_mut().for_each(|b| *b = 0.0);
    }

    /// Same bin count and identical bin edges.
    pub fn equal_binning(&self, other: &Histogram) -> bool {
        self.bins.len() == other.bins.len()
            && (0..self.bins.len()).all(|i| self.bin_lower(i) == other.bin_lower(i))
    }

    /// Bin-wise quotient `self / denominator`; bins with an empty denominator become zero.
    ///
    /// Errors:
    /// - `Error::BinningMismatch` if the two histograms are binned differently.
    pub fn divide(&self, denominator: &Histogram) -> Result<Histogram> {
        if !self.equal_binning(denominator) {
            return Err(Error::BinningMismatch);
        }
        let mut out = self.clone();
        for (b, &d) in out.bins.iter_mut().zip(&denominator.bins) {
            *b = if d != 0.0 { *b / d } else { 0.0 };
        }
        Ok(out)
    }
}

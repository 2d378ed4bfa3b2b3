//! Fixed-width binning of mass samples with Poisson errors.

use dp_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Binning configuration: fixed-width bins over `[xmin, xmax)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramConfig {
    /// Lower edge of the first bin (GeV).
    pub xmin: f64,
    /// Upper edge of the last bin (GeV).
    pub xmax: f64,
    /// Bin width (GeV).
    pub step: f64,
}

impl Default for HistogramConfig {
    /// The published di-photon spectrum binning: 100–160 GeV in 2 GeV bins.
    fn default() -> Self {
        Self { xmin: 100.0, xmax: 160.0, step: 2.0 }
    }
}

impl HistogramConfig {
    /// Number of bins implied by the range and step.
    pub fn n_bins(&self) -> usize {
        ((self.xmax - self.xmin) / self.step).round() as usize
    }

    fn validate(&self) -> Result<()> {
        if !(self.step > 0.0 && self.xmax > self.xmin) {
            return Err(Error::Validation(format!(
                "invalid histogram config: xmin={}, xmax={}, step={}",
                self.xmin, self.xmax, self.step
            )));
        }
        let span = self.xmax - self.xmin;
        let n = (span / self.step).round();
        if n < 1.0 || (n * self.step - span).abs() > 1e-9 * span {
            return Err(Error::Validation(format!(
                "histogram range {}..{} is not a whole number of {}-wide bins",
                self.xmin, self.xmax, self.step
            )));
        }
        Ok(())
    }
}

/// A 1D histogram of mass samples.
///
/// Errors are `sqrt(count)` per bin (Poisson approximation); zero-count
/// bins carry zero error and are excluded from fit weighting. This is a
/// documented contract, not a rigorous covariance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Bin boundaries (length = n_bins + 1).
    pub bin_edges: Vec<f64>,
    /// Bin centres (length = n_bins).
    pub bin_centres: Vec<f64>,
    /// Entry count per bin.
    pub counts: Vec<u64>,
    /// Statistical error per bin, `sqrt(count)`.
    pub errors: Vec<f64>,
}

impl Histogram {
    /// Bin a sequence of values.
    ///
    /// Values outside `[xmin, xmax)` and non-finite values are silently
    /// dropped: not counted, not an error. The range is half-open, so a
    /// value exactly at `xmax` is dropped too; NumPy-style binning closes
    /// the last bin over it, a zero-measure difference on real data.
    pub fn fill(values: &[f64], config: &HistogramConfig) -> Result<Self> {
        config.validate()?;
        let n_bins = config.n_bins();

        let bin_edges: Vec<f64> =
            (0..=n_bins).map(|i| config.xmin + i as f64 * config.step).collect();
        let bin_centres: Vec<f64> =
            (0..n_bins).map(|i| config.xmin + (i as f64 + 0.5) * config.step).collect();

        let mut counts = vec![0u64; n_bins];
        for &v in values {
            if !v.is_finite() || v < config.xmin || v >= config.xmax {
                continue;
            }
            let mut idx = ((v - config.xmin) / config.step) as usize;
            // Guard against float rounding placing v on the upper edge.
            if idx >= n_bins {
                idx = n_bins - 1;
            }
            counts[idx] += 1;
        }

        let errors = counts.iter().map(|&c| (c as f64).sqrt()).collect();
        Ok(Self { bin_edges, bin_centres, counts, errors })
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }

    /// Total number of binned entries.
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binning_shape() {
        let h = Histogram::fill(&[], &HistogramConfig::default()).unwrap();
        assert_eq!(h.n_bins(), 30);
        assert_eq!(h.bin_edges.len(), 31);
        assert_eq!(h.bin_centres.len(), 30);
        assert_eq!(h.bin_edges[0], 100.0);
        assert_eq!(*h.bin_edges.last().unwrap(), 160.0);
        assert_eq!(h.bin_centres[0], 101.0);
    }

    #[test]
    fn out_of_range_values_are_dropped() {
        let cfg = HistogramConfig::default();
        let values = [99.9, 100.0, 125.0, 159.999, 160.0, 500.0, f64::NAN];
        let h = Histogram::fill(&values, &cfg).unwrap();
        // 100.0 (first bin, inclusive), 125.0, 159.999 (last bin) survive;
        // 99.9, 160.0 (right-open), 500.0 and NaN are dropped.
        assert_eq!(h.total_count(), 3);
        assert!(h.total_count() <= values.len() as u64);
    }

    #[test]
    fn all_in_range_counts_everything() {
        let cfg = HistogramConfig::default();
        let values: Vec<f64> = (100..160).map(|i| i as f64 + 0.5).collect();
        let h = Histogram::fill(&values, &cfg).unwrap();
        assert_eq!(h.total_count(), values.len() as u64);
        assert!(h.counts.iter().all(|&c| c == 2));
    }

    #[test]
    fn errors_are_sqrt_of_counts() {
        let cfg = HistogramConfig::default();
        let h = Histogram::fill(&[101.0, 101.1, 101.2, 101.3], &cfg).unwrap();
        assert_eq!(h.counts[0], 4);
        assert_eq!(h.errors[0], 2.0);
        assert_eq!(h.errors[1], 0.0);
    }

    #[test]
    fn bad_config_is_rejected() {
        let cfg = HistogramConfig { xmin: 160.0, xmax: 100.0, step: 2.0 };
        assert!(Histogram::fill(&[], &cfg).is_err());
        let cfg = HistogramConfig { xmin: 100.0, xmax: 160.0, step: 0.0 };
        assert!(Histogram::fill(&[], &cfg).is_err());
        let cfg = HistogramConfig { xmin: 100.0, xmax: 160.0, step: 7.0 };
        assert!(Histogram::fill(&[], &cfg).is_err());
    }
}

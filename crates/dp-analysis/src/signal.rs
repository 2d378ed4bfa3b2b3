//! Residual signal extraction.

use crate::histogram::Histogram;

/// `signal[i] = counts[i] − background[i]`, elementwise over bin centres.
///
/// No smoothing or constraint is applied; the signal may be negative where
/// the fitted background overestimates the data, and that is preserved.
pub fn extract_signal(hist: &Histogram, background: &[f64]) -> Vec<f64> {
    debug_assert_eq!(hist.n_bins(), background.len());
    hist.counts.iter().zip(background.iter()).map(|(&c, &b)| c as f64 - b).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::HistogramConfig;

    #[test]
    fn subtraction_is_exact_and_keeps_negatives() {
        let cfg = HistogramConfig { xmin: 100.0, xmax: 106.0, step: 2.0 };
        let hist = Histogram::fill(&[101.0, 101.5, 103.0], &cfg).unwrap();
        let background = [1.0, 2.5, 0.25];
        let signal = extract_signal(&hist, &background);
        assert_eq!(signal, vec![1.0, -1.5, -0.25]);
    }
}

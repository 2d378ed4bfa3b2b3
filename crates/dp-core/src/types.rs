//! Common data types for the di-photon pipeline.

use serde::{Deserialize, Serialize};

/// Summary of a completed spectrum fit.
///
/// `parameters` holds the composite-model parameters in a fixed order:
/// polynomial coefficients `c0..c4` followed by the Gaussian
/// `(amplitude, centre, sigma)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSummary {
    /// Best-fit parameter values
    pub parameters: Vec<f64>,

    /// Parameter uncertainties (sqrt of covariance diagonal).
    /// `None` if the curvature matrix could not be inverted.
    pub uncertainties: Option<Vec<f64>>,

    /// Weighted chi-square at the minimum
    pub chi2: f64,

    /// Convergence status
    pub converged: bool,

    /// Number of objective evaluations
    pub n_evaluations: usize,
}

impl FitSummary {
    /// Create a new fit summary without uncertainties.
    pub fn new(parameters: Vec<f64>, chi2: f64, converged: bool, n_evaluations: usize) -> Self {
        Self { parameters, uncertainties: None, chi2, converged, n_evaluations }
    }

    /// Attach parameter uncertainties.
    pub fn with_uncertainties(mut self, uncertainties: Vec<f64>) -> Self {
        self.uncertainties = Some(uncertainties);
        self
    }
}

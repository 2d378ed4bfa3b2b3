//! Signal/background decomposition of the mass spectrum.
//!
//! Fits `count(x) ≈ Σ c_i·x^i + A·exp(-(x-μ)²/(2σ²))` to a histogram by
//! weighted least squares (weights `1/error`, zero-error bins excluded)
//! and returns the combined best-fit curve together with the
//! background-only polynomial evaluated at the bin centres.

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use dp_core::{Error, FitSummary, Result};
use nalgebra::DMatrix;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::histogram::Histogram;

/// Degree of the background polynomial.
pub const POLY_DEGREE: usize = 4;
/// Number of fit parameters: 5 polynomial coefficients + 3 Gaussian.
pub const N_PARAMS: usize = POLY_DEGREE + 1 + 3;

/// Physics-motivated Gaussian seed: peak amplitude (events per bin).
pub const INIT_AMPLITUDE: f64 = 100.0;
/// Physics-motivated Gaussian seed: resonance mass (GeV).
pub const INIT_CENTRE: f64 = 125.0;
/// Physics-motivated Gaussian seed: resolution (GeV).
pub const INIT_SIGMA: f64 = 2.0;

/// Optimizer configuration for the spectrum fit.
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Maximum number of L-BFGS iterations.
    pub max_iter: u64,
    /// Convergence tolerance on the gradient norm. The objective is a
    /// chi-square over event counts, so this is far looser than a unit
    /// -scale tolerance would be.
    pub tol: f64,
    /// Number of corrections kept for the inverse-Hessian approximation.
    pub m: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self { max_iter: 1000, tol: 1e-4, m: 10 }
    }
}

/// A completed spectrum fit.
///
/// Constructed once per fit invocation and immutable afterwards.
#[derive(Debug, Clone)]
pub struct SpectrumFit {
    /// Parameter estimates and fit diagnostics. Parameter order:
    /// `c0..c4` (standardized-polynomial coefficients), then the Gaussian
    /// `amplitude`, `centre`, `sigma` (in GeV / events-per-bin units).
    pub summary: FitSummary,
    /// Combined model evaluated at every bin centre.
    pub best_fit: Vec<f64>,
    /// Background-only polynomial evaluated at every bin centre.
    pub background: Vec<f64>,
}

/// Objective function trait for the fit optimizer.
pub trait Objective: Send + Sync {
    /// Evaluate the objective at the given parameters.
    fn value(&self, params: &[f64]) -> Result<f64>;

    /// Gradient at the given parameters (central differences if not
    /// overridden).
    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        let n = params.len();
        let mut grad = vec![0.0; n];
        for i in 0..n {
            let eps = 1e-8 * params[i].abs().max(1.0);

            let mut plus = params.to_vec();
            plus[i] += eps;
            let f_plus = self.value(&plus)?;

            let mut minus = params.to_vec();
            minus[i] -= eps;
            let f_minus = self.value(&minus)?;

            grad[i] = (f_plus - f_minus) / (2.0 * eps);
        }
        Ok(grad)
    }
}

/// The composite polynomial + Gaussian model.
///
/// The polynomial is evaluated in standardized coordinates
/// `t = (x - offset) / scale`: raw powers of x ≈ 100–160 GeV span eight
/// orders of magnitude and leave the least-squares problem too
/// ill-conditioned for a quasi-Newton minimizer.
#[derive(Debug, Clone)]
struct CompositeModel {
    offset: f64,
    scale: f64,
}

impl CompositeModel {
    fn for_range(centres: &[f64]) -> Self {
        let lo = centres.first().copied().unwrap_or(0.0);
        let hi = centres.last().copied().unwrap_or(1.0);
        let scale = ((hi - lo) / 2.0).max(1.0);
        Self { offset: (lo + hi) / 2.0, scale }
    }

    fn background(&self, params: &[f64], x: f64) -> f64 {
        let t = (x - self.offset) / self.scale;
        // Horner evaluation of c0 + c1 t + ... + c4 t^4
        let mut acc = params[POLY_DEGREE];
        for i in (0..POLY_DEGREE).rev() {
            acc = acc * t + params[i];
        }
        acc
    }

    fn gaussian(&self, params: &[f64], x: f64) -> f64 {
        let (amp, centre, sigma) = (params[5], params[6], params[7]);
        let z = (x - centre) / sigma;
        amp * (-0.5 * z * z).exp()
    }

    fn eval(&self, params: &[f64], x: f64) -> f64 {
        self.background(params, x) + self.gaussian(params, x)
    }
}

/// Weighted chi-square over the non-empty bins of a histogram.
struct Chi2Objective {
    model: CompositeModel,
    x: Vec<f64>,
    y: Vec<f64>,
    weights: Vec<f64>,
}

impl Chi2Objective {
    /// Bins with zero error (zero count) are excluded rather than given a
    /// floor weight; `1/error` is undefined for them.
    fn from_histogram(hist: &Histogram) -> Self {
        let model = CompositeModel::for_range(&hist.bin_centres);
        let mut x = Vec::with_capacity(hist.n_bins());
        let mut y = Vec::with_capacity(hist.n_bins());
        let mut weights = Vec::with_capacity(hist.n_bins());
        for i in 0..hist.n_bins() {
            if hist.errors[i] > 0.0 {
                x.push(hist.bin_centres[i]);
                y.push(hist.counts[i] as f64);
                weights.push(1.0 / hist.errors[i]);
            }
        }
        Self { model, x, y, weights }
    }
}

impl Objective for Chi2Objective {
    fn value(&self, params: &[f64]) -> Result<f64> {
        let mut chi2 = 0.0;
        for i in 0..self.x.len() {
            let r = (self.model.eval(params, self.x[i]) - self.y[i]) * self.weights[i];
            chi2 += r * r;
        }
        if !chi2.is_finite() {
            return Err(Error::Fit("non-finite chi-square".to_string()));
        }
        Ok(chi2)
    }
}

fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params.iter().zip(bounds.iter()).map(|(&v, &(lo, hi))| v.clamp(lo, hi)).collect()
}

#[derive(Default)]
struct EvalCounts {
    cost: AtomicUsize,
    grad: AtomicUsize,
}

/// Adapter making an [`Objective`] usable by argmin's executor.
struct ArgminProblem<'a> {
    objective: &'a dyn Objective,
    bounds: &'a [(f64, f64)],
    counts: Arc<EvalCounts>,
}

impl CostFunction for ArgminProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        self.counts.cost.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);
        self.objective.value(&clamped).map_err(|e| argmin::core::Error::msg(e.to_string()))
    }
}

impl Gradient for ArgminProblem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(
        &self,
        params: &Self::Param,
    ) -> std::result::Result<Self::Gradient, argmin::core::Error> {
        self.counts.grad.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);
        let mut g = self
            .objective
            .gradient(&clamped)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;

        // Projected-gradient heuristic: at a bound, zero any component that
        // would push further outside so the line search cannot stall in the
        // clamped region.
        const EPS: f64 = 1e-12;
        for (i, (&x, &(lo, hi))) in clamped.iter().zip(self.bounds.iter()).enumerate() {
            if x <= lo + EPS && g[i] > 0.0 {
                g[i] = 0.0;
            }
            if x >= hi - EPS && g[i] < 0.0 {
                g[i] = 0.0;
            }
        }
        Ok(g)
    }
}

/// Fits the composite model to a histogram.
#[derive(Debug, Clone, Default)]
pub struct FitEngine {
    config: FitConfig,
}

impl FitEngine {
    /// Create a fit engine with default optimizer settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fit engine with a custom optimizer configuration.
    pub fn with_config(config: FitConfig) -> Self {
        Self { config }
    }

    /// Fit the spectrum, returning parameters and the decomposed curves.
    ///
    /// Fails with [`Error::Fit`] when too few populated bins remain, when
    /// the objective turns non-finite, or when the minimizer does not
    /// converge. Callers in the pipeline log the failure and publish
    /// nothing, but still acknowledge the unit of work.
    pub fn fit(&self, hist: &Histogram) -> Result<SpectrumFit> {
        let objective = Chi2Objective::from_histogram(hist);
        if objective.x.len() < N_PARAMS {
            return Err(Error::Fit(format!(
                "only {} populated bins for {} parameters",
                objective.x.len(),
                N_PARAMS
            )));
        }

        let max_count = hist.counts.iter().copied().max().unwrap_or(0) as f64;
        // c0 = max(count), c1..c4 = 0, then the fixed Gaussian seed.
        let mut init = vec![0.0; N_PARAMS];
        init[0] = max_count;
        init[5] = INIT_AMPLITUDE;
        init[6] = INIT_CENTRE;
        init[7] = INIT_SIGMA;

        let (xmin, xmax) = (hist.bin_edges[0], *hist.bin_edges.last().unwrap());
        let coeff_limit = (max_count.abs() + 1.0) * 1e4;
        let mut bounds = vec![(-coeff_limit, coeff_limit); POLY_DEGREE + 1];
        bounds.push((0.0, coeff_limit)); // amplitude
        bounds.push((xmin, xmax)); // centre
        bounds.push((1e-3, xmax - xmin)); // sigma

        let result = self.minimize(&objective, &init, &bounds)?;
        if !result.converged {
            return Err(Error::Fit(format!("fit did not converge: {}", result.message)));
        }

        let best_fit: Vec<f64> =
            hist.bin_centres.iter().map(|&x| objective.model.eval(&result.parameters, x)).collect();
        let background: Vec<f64> = hist
            .bin_centres
            .iter()
            .map(|&x| objective.model.background(&result.parameters, x))
            .collect();

        let mut summary =
            FitSummary::new(result.parameters.clone(), result.fval, true, result.n_fev);
        match self.uncertainties(&objective, &result.parameters) {
            Some(unc) => summary = summary.with_uncertainties(unc),
            None => log::warn!("curvature matrix yields no valid variances; omitting uncertainties"),
        }

        Ok(SpectrumFit { summary, best_fit, background })
    }

    fn minimize(
        &self,
        objective: &dyn Objective,
        init: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<MinimizeResult> {
        let init_clamped = clamp_params(init, bounds);
        let counts = Arc::new(EvalCounts::default());
        let problem = ArgminProblem { objective, bounds, counts: counts.clone() };

        let linesearch = MoreThuenteLineSearch::new();
        // argmin's default cost tolerance is ~machine epsilon, far too
        // strict for a chi-square over event counts.
        let tol_cost = (0.1 * self.config.tol).max(1e-12);
        let solver = LBFGS::new(linesearch, self.config.m)
            .with_tolerance_grad(self.config.tol)
            .map_err(|e| Error::Fit(format!("invalid optimizer tolerance: {e}")))?
            .with_tolerance_cost(tol_cost)
            .map_err(|e| Error::Fit(format!("invalid optimizer cost tolerance: {e}")))?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.param(init_clamped).max_iters(self.config.max_iter))
            .run()
            .map_err(|e| Error::Fit(format!("optimization failed: {e}")))?;

        let state = res.state();
        let best = state
            .get_best_param()
            .ok_or_else(|| Error::Fit("no best parameters found".to_string()))?
            .clone();
        let termination = state.get_termination_status();
        let converged = matches!(
            termination,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );

        Ok(MinimizeResult {
            parameters: clamp_params(&best, bounds),
            fval: state.get_best_cost(),
            converged,
            message: termination.to_string(),
            n_fev: counts.cost.load(Ordering::Relaxed),
        })
    }

    /// Parameter uncertainties from the inverted curvature of chi²/2,
    /// via a central-difference Hessian and an SVD pseudo-inverse. Rank
    /// -deficient directions get zero variance rather than failing the
    /// whole inversion. Returns `None` when the curvature yields
    /// non-finite or negative variances.
    fn uncertainties(&self, objective: &dyn Objective, params: &[f64]) -> Option<Vec<f64>> {
        let n = params.len();
        let mut hessian = DMatrix::zeros(n, n);
        let f0 = objective.value(params).ok()?;
        let step = |i: usize| 1e-4 * params[i].abs().max(1.0);

        for i in 0..n {
            for j in i..n {
                let (hi, hj) = (step(i), step(j));
                let mut p = params.to_vec();
                let h_ij = if i == j {
                    p[i] = params[i] + hi;
                    let f_plus = objective.value(&p).ok()?;
                    p[i] = params[i] - hi;
                    let f_minus = objective.value(&p).ok()?;
                    (f_plus - 2.0 * f0 + f_minus) / (hi * hi)
                } else {
                    p[i] = params[i] + hi;
                    p[j] = params[j] + hj;
                    let fpp = objective.value(&p).ok()?;
                    p[j] = params[j] - hj;
                    let fpm = objective.value(&p).ok()?;
                    p[i] = params[i] - hi;
                    let fmm = objective.value(&p).ok()?;
                    p[j] = params[j] + hj;
                    let fmp = objective.value(&p).ok()?;
                    (fpp - fpm - fmp + fmm) / (4.0 * hi * hj)
                };
                // Hessian of chi²/2
                hessian[(i, j)] = 0.5 * h_ij;
                hessian[(j, i)] = 0.5 * h_ij;
            }
        }

        let svd = hessian.svd(true, true);
        let eps = svd.singular_values.max() * 1e-9;
        let cov = svd.pseudo_inverse(eps).ok()?;
        let mut unc = Vec::with_capacity(n);
        for i in 0..n {
            let var = cov[(i, i)];
            if !var.is_finite() || var < 0.0 {
                return None;
            }
            unc.push(var.sqrt());
        }
        Some(unc)
    }
}

struct MinimizeResult {
    parameters: Vec<f64>,
    fval: f64,
    converged: bool,
    message: String,
    n_fev: usize,
}

/// The Gaussian component of a fitted model at `x`.
///
/// Exposed so callers can verify `best_fit = background + gaussian`.
pub fn gaussian_component(fit: &SpectrumFit, x: f64) -> f64 {
    let p = &fit.summary.parameters;
    let z = (x - p[6]) / p[7];
    p[5] * (-0.5 * z * z).exp()
}

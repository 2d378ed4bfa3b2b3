//! # dp-analysis
//!
//! The physics core of the di-photon pipeline: per-event selection cuts,
//! invariant-mass reconstruction, batch aggregation, histogramming, and
//! signal/background decomposition of the resulting spectrum.
//!
//! ## Example
//!
//! ```
//! use dp_analysis::event::{Event, EventBatch};
//! use dp_analysis::selection::select_and_reconstruct;
//! use dp_analysis::histogram::{Histogram, HistogramConfig};
//!
//! let batch = EventBatch::new("data15_periodG", vec![Event {
//!     photon_pt: vec![60.0, 55.0],
//!     photon_eta: vec![0.5, -0.7],
//!     photon_phi: vec![0.2, 2.8],
//!     photon_e: vec![68.0, 70.0],
//!     photon_is_tight_id: vec![true, true],
//!     photon_ptcone20: vec![1.0, 1.2],
//!     mass: None,
//! }]);
//! let selected = select_and_reconstruct(batch);
//! let masses: Vec<f64> = selected.events.iter().filter_map(|e| e.mass).collect();
//! let hist = Histogram::fill(&masses, &HistogramConfig::default()).unwrap();
//! assert_eq!(hist.n_bins(), 30);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod event;
pub mod fit;
pub mod histogram;
pub mod kinematics;
pub mod selection;
pub mod signal;

pub use aggregate::BatchAggregator;
pub use event::{Event, EventBatch, EVENT_FIELDS, MASS_FIELD};
pub use fit::{FitConfig, FitEngine, SpectrumFit};
pub use histogram::{Histogram, HistogramConfig};
pub use kinematics::{diphoton_mass, FourMomentum};
pub use selection::select_and_reconstruct;
pub use signal::extract_signal;

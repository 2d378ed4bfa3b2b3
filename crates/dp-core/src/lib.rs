//! # dp-core
//!
//! Shared error and result types for the di-photon spectrum pipeline.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::FitSummary;

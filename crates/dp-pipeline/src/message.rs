//! Typed wire schemas for the inter-stage messages.
//!
//! The payloads keep the original JSON field names so the stages stay
//! wire-compatible with the previous deployment. Validation happens here,
//! at the transport boundary, before anything reaches business logic.

use dp_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A message type that can cross the transport.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Structural validation beyond what deserialization enforces.
    fn validate(&self) -> Result<()>;

    /// Parse and validate a payload.
    fn parse(payload: &[u8]) -> Result<Self> {
        let msg: Self = serde_json::from_slice(payload)
            .map_err(|e| Error::Validation(format!("malformed message: {e}")))?;
        msg.validate()?;
        Ok(msg)
    }

    /// Serialize for publishing.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Mass-values summary published by the selection stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MassSummary {
    /// Invariant masses of all surviving events (GeV).
    pub mass_values: Vec<f64>,
}

impl WireMessage for MassSummary {
    fn validate(&self) -> Result<()> {
        if self.mass_values.is_empty() {
            return Err(Error::Validation("mass_values must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Processed-spectrum payload published by the fit stage.
///
/// Six equal-length arrays, one value per histogram bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedSpectrum {
    /// Histogram bin centres (GeV).
    pub bin_centres: Vec<f64>,
    /// Binned event counts.
    pub data_x: Vec<f64>,
    /// Poisson errors on the counts.
    pub data_x_errors: Vec<f64>,
    /// Fitted background curve.
    pub background: Vec<f64>,
    /// Background-subtracted residual signal.
    pub signal_x: Vec<f64>,
    /// Combined signal + background fit.
    pub best_fit: Vec<f64>,
}

impl WireMessage for ProcessedSpectrum {
    fn validate(&self) -> Result<()> {
        let n = self.bin_centres.len();
        if n == 0 {
            return Err(Error::Validation("bin_centres must be non-empty".to_string()));
        }
        let lengths = [
            ("data_x", self.data_x.len()),
            ("data_x_errors", self.data_x_errors.len()),
            ("background", self.background.len()),
            ("signal_x", self.signal_x.len()),
            ("best_fit", self.best_fit.len()),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(Error::Validation(format!(
                    "array length mismatch: {name} has {len} entries, bin_centres has {n}"
                )));
            }
        }
        Ok(())
    }
}

//! Event-store read seam.
//!
//! The raw event store is an external collaborator: given a dataset
//! identifier and a field list it yields event batches. A JSON-file
//! implementation ships for tests and local runs; the production reader
//! (remote ROOT ntuples) lives behind the same trait.

use std::path::PathBuf;

use dp_analysis::event::{Event, EventBatch};
use dp_core::{Error, Result};

/// Reads event batches for a dataset.
pub trait EventSource {
    /// Read all batches of `dataset`, restricted to `fields`.
    ///
    /// Fails with [`Error::SourceRead`] when the dataset is inaccessible;
    /// callers log and skip the dataset rather than aborting the run.
    fn read_batches(&self, dataset: &str, fields: &[String]) -> Result<Vec<EventBatch>>;
}

/// Event source backed by per-dataset JSON files (`<dir>/<dataset>.json`,
/// each holding an array of event records).
#[derive(Debug, Clone)]
pub struct JsonEventSource {
    base_dir: PathBuf,
    /// Events per emitted batch.
    pub batch_size: usize,
}

impl JsonEventSource {
    /// Create a source rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), batch_size: 10_000 }
    }
}

impl EventSource for JsonEventSource {
    fn read_batches(&self, dataset: &str, _fields: &[String]) -> Result<Vec<EventBatch>> {
        let path = self.base_dir.join(format!("{dataset}.json"));
        let bytes = std::fs::read(&path).map_err(|e| Error::SourceRead {
            dataset: dataset.to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;
        let events: Vec<Event> = serde_json::from_slice(&bytes).map_err(|e| Error::SourceRead {
            dataset: dataset.to_string(),
            reason: format!("invalid event JSON: {e}"),
        })?;

        Ok(events
            .chunks(self.batch_size.max(1))
            .map(|chunk| EventBatch::new(dataset, chunk.to_vec()))
            .collect())
    }
}

/// Truncate a dataset's batches to the first `fraction` of its events.
///
/// `fraction = 1.0` analyses everything; smaller values trade statistics
/// for speed, mirroring the original analysis knob.
pub fn apply_fraction(batches: Vec<EventBatch>, fraction: f64) -> Vec<EventBatch> {
    if fraction >= 1.0 {
        return batches;
    }
    let total: usize = batches.iter().map(EventBatch::len).sum();
    let mut remaining = (total as f64 * fraction.max(0.0)) as usize;
    let mut out = Vec::new();
    for mut batch in batches {
        if remaining == 0 {
            break;
        }
        if batch.len() > remaining {
            batch.events.truncate(remaining);
        }
        remaining -= batch.len();
        out.push(batch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_of(n: usize) -> EventBatch {
        let ev = Event {
            photon_pt: vec![60.0, 55.0],
            photon_eta: vec![0.5, -0.7],
            photon_phi: vec![0.2, 2.8],
            photon_e: vec![68.0, 70.0],
            photon_is_tight_id: vec![true, true],
            photon_ptcone20: vec![1.0, 1.2],
            mass: None,
        };
        EventBatch::new("d", vec![ev; n])
    }

    #[test]
    fn fraction_one_keeps_everything() {
        let batches = apply_fraction(vec![batch_of(3), batch_of(2)], 1.0);
        let total: usize = batches.iter().map(EventBatch::len).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn fraction_truncates_across_batches() {
        let batches = apply_fraction(vec![batch_of(4), batch_of(4)], 0.5);
        let total: usize = batches.iter().map(EventBatch::len).sum();
        assert_eq!(total, 4);
        assert_eq!(batches.len(), 1);
    }

    #[test]
    fn missing_dataset_is_a_source_read_error() {
        let source = JsonEventSource::new("/nonexistent");
        let err = source.read_batches("data15_periodG", &[]).unwrap_err();
        assert!(matches!(err, Error::SourceRead { .. }));
    }
}

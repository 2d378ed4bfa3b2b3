//! Merging of filtered batches from multiple datasets.

use dp_core::{Error, Result};

use crate::event::{Event, EventBatch};

/// Accumulates event batches from multiple sources into one logical
/// collection, preserving arrival order.
///
/// Batches must agree on their field set; a mismatch is a [`Error::Merge`]
/// and aborts the run. No deduplication is performed.
#[derive(Debug, Default)]
pub struct BatchAggregator {
    fields: Option<Vec<String>>,
    events: Vec<Event>,
    n_batches: usize,
}

impl BatchAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch, checking its schema against previously seen batches.
    pub fn push(&mut self, batch: EventBatch) -> Result<()> {
        match &self.fields {
            None => self.fields = Some(batch.fields),
            Some(expected) => {
                if *expected != batch.fields {
                    return Err(Error::Merge(format!(
                        "schema mismatch in dataset '{}': expected {:?}, got {:?}",
                        batch.dataset, expected, batch.fields
                    )));
                }
            }
        }
        self.events.extend(batch.events);
        self.n_batches += 1;
        Ok(())
    }

    /// Number of batches merged so far.
    pub fn n_batches(&self) -> usize {
        self.n_batches
    }

    /// Finish aggregation, yielding one batch over all pushed events.
    pub fn finish(self) -> EventBatch {
        EventBatch {
            dataset: "aggregated".to_string(),
            fields: self.fields.unwrap_or_default(),
            events: self.events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_support::passing_event;

    #[test]
    fn concatenation_preserves_order() {
        let mut a = passing_event();
        a.photon_pt[0] = 61.0;
        let mut b = passing_event();
        b.photon_pt[0] = 62.0;

        let mut agg = BatchAggregator::new();
        agg.push(EventBatch::new("d1", vec![a.clone()])).unwrap();
        agg.push(EventBatch::new("d2", vec![b.clone()])).unwrap();
        let merged = agg.finish();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.events[0].photon_pt[0], 61.0);
        assert_eq!(merged.events[1].photon_pt[0], 62.0);
    }

    #[test]
    fn schema_mismatch_is_a_merge_error() {
        let mut agg = BatchAggregator::new();
        agg.push(EventBatch::new("d1", vec![passing_event()])).unwrap();

        let mut odd = EventBatch::new("d2", vec![passing_event()]);
        odd.fields.push("mass".to_string());
        let err = agg.push(odd).unwrap_err();
        assert!(matches!(err, Error::Merge(_)));
    }

    #[test]
    fn empty_aggregator_finishes_empty() {
        let merged = BatchAggregator::new().finish();
        assert!(merged.is_empty());
    }
}

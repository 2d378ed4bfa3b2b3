//! Event records and batches as delivered by the event store.

use serde::{Deserialize, Serialize};

/// Field names a selection-stage read requests from the event store.
///
/// Wire names match the upstream ntuple branches.
pub const EVENT_FIELDS: [&str; 6] = [
    "photon_pt",
    "photon_eta",
    "photon_phi",
    "photon_e",
    "photon_isTightID",
    "photon_ptcone20",
];

/// Field name under which the reconstructed invariant mass is attached.
pub const MASS_FIELD: &str = "mass";

/// One collision record.
///
/// Photon quantities are parallel arrays, one entry per photon candidate,
/// ordered by the upstream source: index 0 is the leading photon, index 1
/// the sub-leading one. The record itself does not sort by momentum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Transverse momentum per photon (GeV).
    pub photon_pt: Vec<f64>,
    /// Pseudorapidity per photon.
    pub photon_eta: Vec<f64>,
    /// Azimuthal angle per photon.
    pub photon_phi: Vec<f64>,
    /// Energy per photon (GeV).
    pub photon_e: Vec<f64>,
    /// Tight identification flag per photon.
    #[serde(rename = "photon_isTightID")]
    pub photon_is_tight_id: Vec<bool>,
    /// Isolation cone energy per photon (GeV).
    pub photon_ptcone20: Vec<f64>,
    /// Di-photon invariant mass (GeV), attached after reconstruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass: Option<f64>,
}

impl Event {
    /// True when the record carries at least two photons and all per-photon
    /// arrays agree in length. Malformed records are excluded by the
    /// selection filter rather than treated as an error.
    pub fn is_well_formed(&self) -> bool {
        let n = self.photon_pt.len();
        n >= 2
            && self.photon_eta.len() == n
            && self.photon_phi.len() == n
            && self.photon_e.len() == n
            && self.photon_is_tight_id.len() == n
            && self.photon_ptcone20.len() == n
    }
}

/// An ordered sequence of events with a shared schema.
///
/// `fields` names the columns present in every event of the batch; the
/// aggregator refuses to merge batches whose field sets differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    /// Identifier of the dataset this batch was read from.
    pub dataset: String,
    /// Field set shared by all events in the batch.
    pub fields: Vec<String>,
    /// The events, in source order.
    pub events: Vec<Event>,
}

impl EventBatch {
    /// Create a batch over the standard event-store field set.
    pub fn new(dataset: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            dataset: dataset.into(),
            fields: EVENT_FIELDS.iter().map(|s| s.to_string()).collect(),
            events,
        }
    }

    /// Number of events in the batch.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when the batch holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_requires_two_photons() {
        let mut ev = test_support::passing_event();
        assert!(ev.is_well_formed());

        ev.photon_pt.truncate(1);
        ev.photon_eta.truncate(1);
        ev.photon_phi.truncate(1);
        ev.photon_e.truncate(1);
        ev.photon_is_tight_id.truncate(1);
        ev.photon_ptcone20.truncate(1);
        assert!(!ev.is_well_formed());
    }

    #[test]
    fn well_formed_requires_aligned_arrays() {
        let mut ev = test_support::passing_event();
        ev.photon_eta.push(0.1);
        assert!(!ev.is_well_formed());
    }

    #[test]
    fn event_wire_names_match_upstream_branches() {
        let ev = test_support::passing_event();
        let json = serde_json::to_value(&ev).unwrap();
        assert!(json.get("photon_isTightID").is_some());
        assert!(json.get("mass").is_none());
    }
}

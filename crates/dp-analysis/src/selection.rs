//! Selection cuts for the di-photon analysis.
//!
//! Each predicate is pure and returns `true` when the event should be
//! *removed*. An event survives the selection iff every predicate returns
//! `false`. Cuts 1–4 run before mass reconstruction; the zero-mass and
//! mass-relative-isolation cuts run after, in that order, so the isolation
//! ratio is never computed against a zero mass.

use crate::event::{Event, EventBatch, MASS_FIELD};
use crate::kinematics::diphoton_mass;

/// Minimum transverse momentum of the leading photon (GeV).
pub const LEADING_PT_MIN: f64 = 50.0;
/// Minimum transverse momentum of the sub-leading photon (GeV).
pub const SUBLEADING_PT_MIN: f64 = 30.0;
/// Maximum calorimeter isolation ratio `ptcone20 / pt`.
pub const ISOLATION_MAX: f64 = 0.055;
/// Barrel/end-cap transition region in `|eta|`, open interval.
pub const ETA_TRANSITION: (f64, f64) = (1.37, 1.52);
/// Minimum `pt / mass` ratio for either photon.
pub const ISO_MASS_MIN: f64 = 0.35;

/// Cut events where either leading photon fails tight identification.
pub fn cut_photon_reconstruction(event: &Event) -> bool {
    !event.photon_is_tight_id[0] || !event.photon_is_tight_id[1]
}

/// Cut events below the leading/sub-leading transverse-momentum thresholds.
pub fn cut_photon_pt(event: &Event) -> bool {
    event.photon_pt[0] < LEADING_PT_MIN || event.photon_pt[1] < SUBLEADING_PT_MIN
}

/// Cut events where either photon's isolation ratio exceeds 5.5%.
///
/// A degenerate `pt` of zero makes the ratio non-finite; such events are
/// cut rather than propagated.
pub fn cut_isolation_pt(event: &Event) -> bool {
    let iso = |i: usize| {
        let r = event.photon_ptcone20[i] / event.photon_pt[i];
        !r.is_finite() || r > ISOLATION_MAX
    };
    iso(0) || iso(1)
}

/// Cut events with either photon in the calorimeter transition region
/// (1.37 < |eta| < 1.52, degraded resolution).
pub fn cut_photon_eta_transition(event: &Event) -> bool {
    let in_gap = |i: usize| {
        let abs_eta = event.photon_eta[i].abs();
        abs_eta > ETA_TRANSITION.0 && abs_eta < ETA_TRANSITION.1
    };
    in_gap(0) || in_gap(1)
}

/// Cut events whose reconstructed mass is zero or non-finite.
///
/// The upstream analysis only filtered an exact zero (the reconstruction
/// failure sentinel); NaN from a space-like four-vector sum is removed here
/// as well so it can never reach the histogram.
pub fn cut_mass(mass: f64) -> bool {
    !mass.is_finite() || mass == 0.0
}

/// Cut events where either photon's `pt / mass` falls below 35%.
pub fn cut_iso_mass(event: &Event, mass: f64) -> bool {
    let low = |i: usize| {
        let r = event.photon_pt[i] / mass;
        !r.is_finite() || r < ISO_MASS_MIN
    };
    low(0) || low(1)
}

/// Apply the full selection to a batch and attach the invariant mass to
/// every survivor.
///
/// The surviving set is the intersection of all six pass conditions;
/// the staging (pre-mass cuts first) only avoids computing masses for
/// events that are already gone. Malformed records (fewer than two photons
/// or misaligned arrays) are excluded deterministically up front.
pub fn select_and_reconstruct(batch: EventBatch) -> EventBatch {
    let EventBatch { dataset, mut fields, events } = batch;

    let survivors: Vec<Event> = events
        .into_iter()
        .filter_map(|mut event| {
            if !event.is_well_formed() {
                return None;
            }
            if cut_photon_reconstruction(&event)
                || cut_photon_pt(&event)
                || cut_isolation_pt(&event)
                || cut_photon_eta_transition(&event)
            {
                return None;
            }
            let mass = diphoton_mass(&event);
            if cut_mass(mass) || cut_iso_mass(&event, mass) {
                return None;
            }
            event.mass = Some(mass);
            Some(event)
        })
        .collect();

    if !fields.iter().any(|f| f == MASS_FIELD) {
        fields.push(MASS_FIELD.to_string());
    }
    EventBatch { dataset, fields, events: survivors }
}

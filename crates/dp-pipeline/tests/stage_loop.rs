//! Stage-loop tests over the in-memory transport: happy path, malformed
//! messages, receive timeout, and the full three-stage pipeline.

use std::time::Duration;

use dp_analysis::event::{Event, EventBatch};
use dp_analysis::{FitEngine, HistogramConfig};
use dp_core::{Error, Result};
use dp_pipeline::sink::CollectingSink;
use dp_pipeline::{
    run_fit_stage, run_process_stage, run_render_stage, EventSource, InMemoryBroker, MassSummary,
    ProcessedSpectrum, Transport, WireMessage,
};

const TIMEOUT: Option<Duration> = Some(Duration::from_millis(50));

/// Two back-to-back photons at eta = 0 with E1 = E2 = m/2 reconstruct to
/// an invariant mass of exactly `m` and pass every selection cut for
/// m >= 100 GeV.
fn event_with_mass(m: f64) -> Event {
    let e = m / 2.0;
    Event {
        photon_pt: vec![e, e],
        photon_eta: vec![0.0, 0.0],
        photon_phi: vec![0.0, std::f64::consts::PI],
        photon_e: vec![e, e],
        photon_is_tight_id: vec![true, true],
        photon_ptcone20: vec![0.0, 0.0],
        mass: None,
    }
}

/// Flat background (10 events per GeV, 100-160) plus a peak at 125.
fn synthetic_masses() -> Vec<f64> {
    let mut masses = Vec::new();
    for i in 100..160 {
        for k in 0..10 {
            masses.push(i as f64 + 0.05 + 0.1 * k as f64);
        }
    }
    for _ in 0..200 {
        masses.push(125.0);
    }
    for _ in 0..100 {
        masses.push(123.9);
        masses.push(126.1);
    }
    masses
}

struct StubSource {
    datasets: Vec<(String, Vec<Event>)>,
}

impl EventSource for StubSource {
    fn read_batches(&self, dataset: &str, _fields: &[String]) -> Result<Vec<EventBatch>> {
        self.datasets
            .iter()
            .find(|(name, _)| name == dataset)
            .map(|(name, events)| vec![EventBatch::new(name.clone(), events.clone())])
            .ok_or_else(|| Error::SourceRead {
                dataset: dataset.to_string(),
                reason: "no such dataset".to_string(),
            })
    }
}

#[test]
fn process_stage_publishes_one_mass_summary() {
    let broker = InMemoryBroker::new();
    let source = StubSource {
        datasets: vec![
            ("d1".to_string(), vec![event_with_mass(124.0), event_with_mass(126.0)]),
            ("d2".to_string(), vec![event_with_mass(110.0)]),
        ],
    };
    let datasets = vec!["d1".to_string(), "d2".to_string()];

    let n = run_process_stage(&source, &broker, &datasets, 1.0, "masses").unwrap();
    assert_eq!(n, 3);

    let delivery = broker.consume("masses", TIMEOUT).unwrap().unwrap();
    let summary = MassSummary::parse(&delivery.payload).unwrap();
    assert_eq!(summary.mass_values.len(), 3);
    for (got, want) in summary.mass_values.iter().zip([124.0, 126.0, 110.0]) {
        assert!((got - want).abs() < 1e-6, "mass {got} != {want}");
    }
}

#[test]
fn process_stage_skips_unreadable_datasets() {
    let broker = InMemoryBroker::new();
    let source =
        StubSource { datasets: vec![("good".to_string(), vec![event_with_mass(125.0)])] };
    let datasets = vec!["missing".to_string(), "good".to_string()];

    let n = run_process_stage(&source, &broker, &datasets, 1.0, "masses").unwrap();
    assert_eq!(n, 1, "run continues past the unreadable dataset");
}

#[test]
fn fit_stage_publishes_a_valid_spectrum() {
    let broker = InMemoryBroker::new();
    let summary = MassSummary { mass_values: synthetic_masses() };
    broker.publish("masses", &summary.to_bytes().unwrap()).unwrap();

    let stats = run_fit_stage(
        &broker,
        &HistogramConfig::default(),
        &FitEngine::new(),
        "masses",
        "spectra",
        TIMEOUT,
    )
    .unwrap();
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.skipped, 0);

    let delivery = broker.consume("spectra", TIMEOUT).unwrap().unwrap();
    let spectrum = ProcessedSpectrum::parse(&delivery.payload).unwrap();
    assert_eq!(spectrum.bin_centres.len(), 30);

    // signal_x is exactly data - background, elementwise.
    for i in 0..spectrum.bin_centres.len() {
        assert_eq!(spectrum.signal_x[i], spectrum.data_x[i] - spectrum.background[i]);
    }
    // The input mass summary was consumed and acknowledged.
    assert_eq!(broker.acked_tags().len(), 1);
}

#[test]
fn malformed_message_is_acked_without_output() {
    let broker = InMemoryBroker::new();
    broker.publish("masses", b"{\"foo\": 1}").unwrap();

    let stats = run_fit_stage(
        &broker,
        &HistogramConfig::default(),
        &FitEngine::new(),
        "masses",
        "spectra",
        TIMEOUT,
    )
    .unwrap();

    assert_eq!(stats.processed, 0);
    assert_eq!(stats.skipped, 1);
    assert_eq!(broker.depth("spectra"), 0, "no spectrum published");
    assert_eq!(broker.acked_tags().len(), 1, "bad message still acknowledged");
}

#[test]
fn consumer_stops_cleanly_on_timeout() {
    let broker = InMemoryBroker::new();
    let stats = run_fit_stage(
        &broker,
        &HistogramConfig::default(),
        &FitEngine::new(),
        "masses",
        "spectra",
        Some(Duration::from_millis(10)),
    )
    .unwrap();
    assert_eq!(stats, dp_pipeline::StageStats::default());
}

#[test]
fn full_pipeline_end_to_end() {
    let broker = InMemoryBroker::new();

    // Flat background plus a resonance, expressed as real events.
    let mut events = Vec::new();
    for m in synthetic_masses() {
        events.push(event_with_mass(m));
    }
    let source = StubSource { datasets: vec![("all".to_string(), events)] };

    let n = run_process_stage(&source, &broker, &["all".to_string()], 1.0, "masses").unwrap();
    assert!(n > 900);

    let fit_stats = run_fit_stage(
        &broker,
        &HistogramConfig::default(),
        &FitEngine::new(),
        "masses",
        "spectra",
        TIMEOUT,
    )
    .unwrap();
    assert_eq!(fit_stats.processed, 1);

    let mut sink = CollectingSink::default();
    let render_stats = run_render_stage(&broker, &mut sink, "spectra", TIMEOUT).unwrap();
    assert_eq!(render_stats.processed, 1);
    assert_eq!(sink.spectra.len(), 1);

    let spectrum = &sink.spectra[0];
    let peak = spectrum.bin_centres.iter().position(|&c| c == 125.0).unwrap();
    assert!(
        spectrum.signal_x[peak] > 50.0,
        "residual signal at 125 GeV, got {}",
        spectrum.signal_x[peak]
    );
}

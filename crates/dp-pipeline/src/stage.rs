//! The receive-process-acknowledge loop and the concrete pipeline stages.
//!
//! Each stage runs single-threaded: it blocks awaiting the next unit of
//! work, processes it to completion, then awaits the next. Acknowledgment
//! policy (skip-and-ack): a message is acked after processing whether it
//! succeeded or failed. Validation failures and fit failures are logged
//! and skipped, and even unrecognized processing errors are logged and
//! acked rather than requeued. This trades completeness for liveness:
//! a structurally bad input can never become a poison-message loop.
//! Whether failed work should instead go to a dead-letter queue is an open
//! design question; it would only need a second queue name here.

use std::time::Duration;

use dp_analysis::event::EVENT_FIELDS;
use dp_analysis::{
    extract_signal, select_and_reconstruct, BatchAggregator, FitEngine, Histogram,
    HistogramConfig,
};
use dp_core::{Error, Result};

use crate::message::{MassSummary, ProcessedSpectrum, WireMessage};
use crate::sink::SpectrumSink;
use crate::source::{apply_fraction, EventSource};
use crate::transport::Transport;

/// A message to publish after successful processing.
pub struct Outgoing {
    /// Target queue.
    pub queue: String,
    /// Serialized payload.
    pub payload: Vec<u8>,
}

/// Counters reported by a finished stage loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    /// Messages processed and (where applicable) published.
    pub processed: u64,
    /// Messages acknowledged without an output.
    pub skipped: u64,
}

/// Generic consuming stage: receive, process, publish, acknowledge.
pub struct StageLoop<'a, T: Transport + ?Sized> {
    transport: &'a T,
    input_queue: String,
    receive_timeout: Option<Duration>,
}

impl<'a, T: Transport + ?Sized> StageLoop<'a, T> {
    /// Create a loop consuming from `input_queue`.
    ///
    /// With a `receive_timeout` the loop exits cleanly once the queue
    /// stays empty that long; without one it blocks indefinitely.
    pub fn new(
        transport: &'a T,
        input_queue: impl Into<String>,
        receive_timeout: Option<Duration>,
    ) -> Self {
        Self { transport, input_queue: input_queue.into(), receive_timeout }
    }

    /// Run until the receive timeout fires, processing one message at a
    /// time through `handle`.
    ///
    /// `handle` returns `Ok(Some(_))` to publish, `Ok(None)` to finish
    /// without output, or an error. Skippable errors (validation, fit) and
    /// unrecognized ones alike are logged and the message acknowledged;
    /// only transport failures abort the loop.
    pub fn run<F>(&self, mut handle: F) -> Result<StageStats>
    where
        F: FnMut(&[u8]) -> Result<Option<Outgoing>>,
    {
        let mut stats = StageStats::default();
        loop {
            let delivery = match self.transport.consume(&self.input_queue, self.receive_timeout)? {
                Some(d) => d,
                None => {
                    log::info!(
                        "queue '{}' idle for {:?}; stopping",
                        self.input_queue,
                        self.receive_timeout
                    );
                    return Ok(stats);
                }
            };

            match handle(&delivery.payload) {
                Ok(Some(out)) => {
                    self.transport.publish(&out.queue, &out.payload)?;
                    stats.processed += 1;
                }
                Ok(None) => {
                    stats.processed += 1;
                }
                Err(e) if e.is_skippable() => {
                    log::warn!("skipping message on '{}': {e}", self.input_queue);
                    stats.skipped += 1;
                }
                Err(e) => {
                    log::error!(
                        "unrecognized processing failure on '{}' (message still acked): {e}",
                        self.input_queue
                    );
                    stats.skipped += 1;
                }
            }
            // Acked after processing, success or not.
            self.transport.ack(&delivery)?;
        }
    }
}

/// Selection stage: read datasets, filter, reconstruct, aggregate, and
/// publish one mass summary for the whole run.
///
/// An unreadable dataset is logged and skipped; the run continues with the
/// remaining datasets. A schema mismatch during aggregation is fatal to
/// the run.
pub fn run_process_stage<S, T>(
    source: &S,
    transport: &T,
    datasets: &[String],
    fraction: f64,
    mass_queue: &str,
) -> Result<usize>
where
    S: EventSource,
    T: Transport + ?Sized,
{
    let fields: Vec<String> = EVENT_FIELDS.iter().map(|s| s.to_string()).collect();
    let mut aggregator = BatchAggregator::new();

    for dataset in datasets {
        log::info!("processing {dataset}");
        let batches = match source.read_batches(dataset, &fields) {
            Ok(b) => b,
            Err(e @ Error::SourceRead { .. }) => {
                log::warn!("skipping dataset: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };
        for batch in apply_fraction(batches, fraction) {
            aggregator.push(select_and_reconstruct(batch))?;
        }
    }

    let merged = aggregator.finish();
    let mass_values: Vec<f64> = merged.events.iter().filter_map(|e| e.mass).collect();
    let n = mass_values.len();
    log::info!("{n} events survive selection");

    let summary = MassSummary { mass_values };
    summary.validate()?;
    transport.publish(mass_queue, &summary.to_bytes()?)?;
    Ok(n)
}

/// Fit stage: consume mass summaries, histogram and fit each one, publish
/// the processed spectrum.
pub fn run_fit_stage<T>(
    transport: &T,
    config: &HistogramConfig,
    engine: &FitEngine,
    mass_queue: &str,
    spectrum_queue: &str,
    receive_timeout: Option<Duration>,
) -> Result<StageStats>
where
    T: Transport + ?Sized,
{
    let stage = StageLoop::new(transport, mass_queue, receive_timeout);
    stage.run(|payload| {
        let summary = MassSummary::parse(payload)?;
        let hist = Histogram::fill(&summary.mass_values, config)?;
        let fit = engine.fit(&hist)?;
        let signal = extract_signal(&hist, &fit.background);

        let spectrum = ProcessedSpectrum {
            bin_centres: hist.bin_centres.clone(),
            data_x: hist.counts.iter().map(|&c| c as f64).collect(),
            data_x_errors: hist.errors.clone(),
            background: fit.background,
            signal_x: signal,
            best_fit: fit.best_fit,
        };
        Ok(Some(Outgoing { queue: spectrum_queue.to_string(), payload: spectrum.to_bytes()? }))
    })
}

/// Render stage (terminal): consume processed spectra and hand them to the
/// rendering sink.
pub fn run_render_stage<T, K>(
    transport: &T,
    sink: &mut K,
    spectrum_queue: &str,
    receive_timeout: Option<Duration>,
) -> Result<StageStats>
where
    T: Transport + ?Sized,
    K: SpectrumSink,
{
    let stage = StageLoop::new(transport, spectrum_queue, receive_timeout);
    stage.run(|payload| {
        let spectrum = ProcessedSpectrum::parse(payload)?;
        sink.write(&spectrum)?;
        Ok(None)
    })
}

//! # dp-pipeline
//!
//! Typed inter-stage messages, the transport seam with an in-memory queue
//! implementation, connection retry, and the receive-process-acknowledge
//! stage loops that wrap the analysis components as independent processes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod message;
pub mod retry;
pub mod sink;
pub mod source;
pub mod stage;
pub mod transport;

pub use config::{StageConfig, DEFAULT_DATASETS};
pub use message::{MassSummary, ProcessedSpectrum, WireMessage};
pub use retry::{connect_with_retry, RetryPolicy};
pub use sink::{JsonArtifactSink, SpectrumSink};
pub use source::{EventSource, JsonEventSource};
pub use stage::{run_fit_stage, run_process_stage, run_render_stage, StageLoop, StageStats};
pub use transport::{Delivery, InMemoryBroker, Transport};

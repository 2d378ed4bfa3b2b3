//! Stage configuration.
//!
//! Environment variables are read once into an explicit struct that is
//! passed into constructors; no module-level globals.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default queue carrying mass summaries from the selection stage to the
/// fit stage.
pub const DEFAULT_MASS_QUEUE: &str = "demo_queue";
/// Default queue carrying processed spectra from the fit stage onwards.
pub const DEFAULT_SPECTRUM_QUEUE: &str = "analysis_queue";

/// Dataset identifiers of the full di-photon data-taking periods.
pub const DEFAULT_DATASETS: [&str; 12] = [
    "data15_periodD",
    "data15_periodE",
    "data15_periodF",
    "data15_periodG",
    "data15_periodH",
    "data15_periodJ",
    "data16_periodA",
    "data16_periodB",
    "data16_periodC",
    "data16_periodD",
    "data16_periodE",
    "data16_periodF",
];

/// Transport and queue settings for one pipeline stage.
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Broker host name.
    pub broker_host: String,
    /// Broker user name.
    pub broker_user: String,
    /// Broker password.
    pub broker_pass: String,
    /// Queue for mass-summary messages.
    pub mass_queue: String,
    /// Queue for processed-spectrum messages.
    pub spectrum_queue: String,
    /// Connection retry policy.
    pub retry: RetryPolicy,
    /// Bounded receive timeout for terminal consumers; `None` blocks
    /// indefinitely.
    pub receive_timeout: Option<Duration>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            broker_host: "rabbitmq".to_string(),
            broker_user: "admin".to_string(),
            broker_pass: "password123".to_string(),
            mass_queue: DEFAULT_MASS_QUEUE.to_string(),
            spectrum_queue: DEFAULT_SPECTRUM_QUEUE.to_string(),
            retry: RetryPolicy::default(),
            receive_timeout: None,
        }
    }
}

impl StageConfig {
    /// Build a configuration from the environment, falling back to the
    /// deployment defaults for anything unset.
    ///
    /// Recognized variables: `RABBITMQ_HOST`, `RABBITMQ_USER`,
    /// `RABBITMQ_PASS`, `MASS_QUEUE`, `SPECTRUM_QUEUE`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str, fallback: String| std::env::var(name).unwrap_or(fallback);
        Self {
            broker_host: var("RABBITMQ_HOST", defaults.broker_host),
            broker_user: var("RABBITMQ_USER", defaults.broker_user),
            broker_pass: var("RABBITMQ_PASS", defaults.broker_pass),
            mass_queue: var("MASS_QUEUE", defaults.mass_queue),
            spectrum_queue: var("SPECTRUM_QUEUE", defaults.spectrum_queue),
            retry: defaults.retry,
            receive_timeout: defaults.receive_timeout,
        }
    }

    /// Set the terminal-consumer receive timeout.
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }
}

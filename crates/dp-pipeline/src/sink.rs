//! Rendering seam.
//!
//! Visual output is an external collaborator; the pipeline only hands it a
//! processed spectrum. The bundled sink writes plot-friendly JSON
//! artifacts, one timestamped file per spectrum.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use dp_core::Result;

use crate::message::ProcessedSpectrum;

/// Consumes processed spectra.
pub trait SpectrumSink {
    /// Hand one spectrum to the renderer.
    fn write(&mut self, spectrum: &ProcessedSpectrum) -> Result<()>;
}

/// Writes each spectrum as pretty JSON under a target directory.
#[derive(Debug, Clone)]
pub struct JsonArtifactSink {
    dir: PathBuf,
}

impl JsonArtifactSink {
    /// Create a sink writing into `dir` (created on first write).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SpectrumSink for JsonArtifactSink {
    fn write(&mut self, spectrum: &ProcessedSpectrum) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let path = self.dir.join(format!("mass_spectrum_fit_{stamp}.json"));
        let json = serde_json::to_vec_pretty(spectrum)?;
        std::fs::write(&path, json)?;
        log::info!("spectrum artifact written to {}", path.display());
        Ok(())
    }
}

/// Sink that keeps spectra in memory; used by tests and the in-process
/// pipeline runner.
#[derive(Debug, Default)]
pub struct CollectingSink {
    /// Spectra received so far.
    pub spectra: Vec<ProcessedSpectrum>,
}

impl SpectrumSink for CollectingSink {
    fn write(&mut self, spectrum: &ProcessedSpectrum) -> Result<()> {
        self.spectra.push(spectrum.clone());
        Ok(())
    }
}

//! JSON exporter for rendered figures.
//!
//! Writes plotly-shaped figure JSON tagged with the scenario that produced it.

use crate::error::SimResult;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;
use tracks_core::Figure;

/// A figure plus the scenario and seed it came from.
#[derive(Debug, Clone, Serialize)]
pub struct FigureExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Number of animation frames (0 for static figures)
    pub frame_count: usize,

    pub figure: Figure,
}

impl FigureExport {
    pub fn new(scenario: &str, seed: u64, figure: Figure) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            frame_count: figure.frames.len(),
            figure,
        }
    }

    pub fn to_json_string(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> SimResult<()> {
        let json = self.to_json_string()?;
        let mut file = File::create(path.as_ref())?;
        file.write_all(json.as_bytes())?;
        info!(
            "Exported {} ({} frames) to {}",
            self.scenario,
            self.frame_count,
            path.as_ref().display()
        );
        Ok(())
    }
}

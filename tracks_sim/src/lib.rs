//! Tree Tracks synthetic catalogs
//!
//! Deterministic halo and tracer catalogs with a known merger tree, used to
//! drive `tracks_core` end to end:
//! - **Catalogs**: seeded `ChaCha8Rng` generation of halo histories
//! - **Tracers**: particle blocks per halo for `Vines`
//! - **Scenarios**: named configurations with standard images and movies
//!
//! # Usage
//!
//! ```ignore
//! use tracks_sim::{FigureExport, ScenarioId};
//!
//! let scenario = ScenarioId::NestedMerger.build(42)?;
//! let movie = scenario.movie(1)?;
//! FigureExport::new(scenario.id.name(), 42, movie).write_to_file("nested.json")?;
//! ```

pub mod catalog;
pub mod error;
pub mod exporter;
pub mod logging;
pub mod scenarios;
pub mod tracers;

#[cfg(test)]
mod properties;

pub use catalog::{CatalogBuilder, CatalogConfig, HaloHistory, HaloRole, SyntheticCatalog};
pub use error::{SimError, SimResult};
pub use exporter::FigureExport;
pub use logging::init_tracing;
pub use scenarios::{Scenario, ScenarioId};
pub use tracers::TracerCatalog;

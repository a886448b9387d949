//! Tree Tracks Core - tracker data model for cosmological simulation catalogs
//!
//! Turns per-snapshot halo and tracer catalogs into renderable trajectories:
//! 1. **Storage**: uniform access to catalog fields with explicit time/object axes
//! 2. **Traversal**: merger-tree walks (`Tree`), spatial selection (`Bush`),
//!    tracer particle histories (`Vines`)
//! 3. **Rendering**: trackers, event markers and decorations composed into
//!    static figures (`Image`) or per-snapshot animations (`Movie`)

pub mod dataset;
pub mod error;
pub mod simulation;
pub mod trace;
pub mod tracker;
pub mod storage;
pub mod tree;
pub mod bush;
pub mod vines;
pub mod decorator;
pub mod marker;
pub mod marker_funcs;
pub mod visual;

// Re-export key types for convenience
pub use bush::Bush;
pub use dataset::{AxisRole, Columns, Dataset, Dtype, Field, FieldAccess, FieldData, Records, Selector};
pub use decorator::{Decoration, Decorator};
pub use error::{Result, TrackError};
pub use marker::{MarkPoint, Marker};
pub use simulation::{Simulation, SNAP_TIME_KEY};
pub use storage::{Storage, StorageKeys, NOT_ALIVE};
pub use trace::{Coords, CustomData, CustomValue, PlotArgs, Trace, TraceKind};
pub use tracker::{Extent, SphereStyle, Tracker, TrackerKind, INDEX_KEY};
pub use tree::{IncludeFn, Tree, DEPTH_PROP};
pub use vines::{Vines, VinesKeys};
pub use visual::{Figure, Frame, Image, Movie, NameSource, Visual};

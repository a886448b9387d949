//! Global simulation metadata.

use crate::dataset::FieldData;
use indexmap::IndexMap;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Property name under which trackers carry the time of every snapshot.
pub const SNAP_TIME_KEY: &str = "snap_t";

/// Box size and snapshot times of a simulation. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    /// Side length of the periodic box
    box_size: f64,

    /// Time of each snapshot, in snapshot order
    time: Vec<f64>,
}

impl Simulation {
    pub fn new(box_size: f64, time: Vec<f64>) -> Self {
        Self { box_size, time }
    }

    /// Number of snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.time.len()
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn box_size(&self) -> f64 {
        self.box_size
    }

    /// Per-snapshot properties every tracer tracker inherits from the simulation.
    pub fn default_props(&self) -> IndexMap<String, FieldData> {
        let mut props = IndexMap::new();
        props.insert(
            SNAP_TIME_KEY.to_string(),
            FieldData::from(Array1::from(self.time.clone())),
        );
        props
    }
}

//! Spatial region queries over a halo or particle catalog.

use crate::dataset::Dataset;
use crate::error::{Result, TrackError};
use crate::simulation::Simulation;
use crate::storage::Storage;
use crate::tracker::Tracker;
use tracing::debug;

/// A storage that selects objects by where they spent their time.
///
/// The radius key (`R200m` by default, see [`crate::StorageKeys::radius`])
/// names the halo radius property sphere trackers are drawn with.
#[derive(Debug, Clone)]
pub struct Bush {
    storage: Storage,
}

impl Bush {
    pub fn new(dataset: Dataset, sim: Simulation) -> Result<Self> {
        Ok(Self::from_storage(Storage::new(dataset, sim)?))
    }

    pub fn from_storage(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    pub fn radius_key(&self) -> &str {
        &self.storage.keys().radius
    }

    pub fn make_tracker_list(&self, idxs: &[usize]) -> Result<Vec<Tracker>> {
        self.storage.make_tracker_list(idxs)
    }

    /// Objects inside the cube of edge `side_length` around `center` on at
    /// least `min_snapshot_count` snapshots.
    ///
    /// The snapshots need not be consecutive. Not-alive snapshots never count.
    pub fn box_indices(
        &self,
        center: &[f64],
        side_length: f64,
        min_snapshot_count: usize,
    ) -> Result<Vec<usize>> {
        let pos = self.storage.position_history()?;
        let dim = pos.shape()[2];
        if center.len() != dim {
            return Err(TrackError::shape(format!(
                "box center has {} coordinates, positions are {}D",
                center.len(),
                dim
            )));
        }
        let half = side_length / 2.0;

        let mut counts = vec![0usize; pos.shape()[1]];
        for snap in pos.outer_iter() {
            for (obj, row) in snap.outer_iter().enumerate() {
                // NaN compares false, so dead rows are never inside
                let inside = row
                    .iter()
                    .zip(center)
                    .all(|(&p, &c)| (p - c).abs() <= half);
                if inside {
                    counts[obj] += 1;
                }
            }
        }

        let idxs: Vec<usize> = counts
            .iter()
            .enumerate()
            .filter_map(|(obj, &n)| (n >= min_snapshot_count).then_some(obj))
            .collect();
        debug!(
            "{} of {} objects spent {} snapshots in box of side {}",
            idxs.len(),
            counts.len(),
            min_snapshot_count,
            side_length
        );
        Ok(idxs)
    }

    /// Trackers for every object selected by [`Bush::box_indices`].
    pub fn tracker_box(
        &self,
        center: &[f64],
        side_length: f64,
        min_snapshot_count: usize,
    ) -> Result<Vec<Tracker>> {
        let idxs = self.box_indices(center, side_length, min_snapshot_count)?;
        self.make_tracker_list(&idxs)
    }
}

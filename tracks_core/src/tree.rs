//! The Tree Engine - merger tree traversal over a halo catalog
//!
//! A [`Tree`] wraps a [`Storage`] whose dataset is a halo catalog with a
//! per-snapshot host pointer (`parent_id_cat` by default) and liveness mask
//! (`mask_alive`). Starting from a host halo it walks the tree of halos that
//! ever pointed at it, producing one tracker per visited halo.
//!
//! Traversal is iterative: visited halos live in an arena with parent links,
//! so stack depth is bounded and a halo that reappears on its own ancestor
//! path is reported as [`TrackError::CyclicTree`] instead of looping.

use crate::dataset::{Dataset, Field, FieldAccess, FieldData, Selector};
use crate::error::{Result, TrackError};
use crate::simulation::Simulation;
use crate::storage::Storage;
use crate::tracker::Tracker;
use indexmap::IndexMap;
use ndarray::arr0;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Tracker property holding the level below the traversal root.
pub const DEPTH_PROP: &str = "depth";

/// Predicate over every field of one halo, deciding whether it is traversed.
pub type IncludeFn<'a> = &'a dyn Fn(&IndexMap<String, Field>) -> bool;

/// One visited halo.
#[derive(Debug, Clone, Copy)]
struct Node {
    index: usize,
    level: usize,
    parent: Option<usize>,
}

/// Merger tree view of a halo catalog.
#[derive(Debug, Clone)]
pub struct Tree {
    storage: Storage,
}

impl Tree {
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

    pub fn into_storage(self) -> Storage {
        self.storage
    }

    pub fn set_host_sub_key(&mut self, key: impl Into<String>) {
        self.storage.keys_mut().host = key.into();
    }

    pub fn set_alive_key(&mut self, key: impl Into<String>) {
        self.storage.keys_mut().alive = key.into();
    }

    /// Halos that pointed at `halo_idx` at any snapshot while it was alive.
    ///
    /// The host's IDs over its alive snapshots form a set; every halo whose
    /// host pointer equals a member of that set at some snapshot is a
    /// progenitor. Snapshots need not line up. Sorted ascending.
    pub fn get_progenitors(&self, halo_idx: usize) -> Result<Vec<usize>> {
        let storage = &self.storage;
        if halo_idx >= storage.object_count() {
            return Err(TrackError::IndexOutOfRange {
                index: halo_idx,
                len: storage.object_count(),
            });
        }
        let keys = storage.keys();
        let nsnaps = storage.snapshot_count();
        let object = Selector::Index(halo_idx);

        let alive: Vec<bool> = storage
            .get(&keys.alive, &Selector::All, &object)?
            .into_time_major(nsnaps)?
            .truthy()
            .iter()
            .copied()
            .collect();
        if alive.len() != nsnaps {
            return Err(TrackError::shape(format!(
                "alive mask '{}' has {} entries for {} snapshots",
                keys.alive,
                alive.len(),
                nsnaps
            )));
        }

        let host_ids: HashSet<i64> = storage
            .get(&keys.id, &Selector::Mask(alive), &object)?
            .to_i64(&keys.id)?
            .iter()
            .copied()
            .collect();

        let pointers = storage.dataset().field(&keys.host)?;
        let object_axis = pointers.object_axis().ok_or_else(|| {
            TrackError::shape(format!("host field '{}' has no object axis", keys.host))
        })?;
        let progenitors: BTreeSet<usize> = pointers
            .to_i64(&keys.host)?
            .indexed_iter()
            .filter(|(_, v)| host_ids.contains(*v))
            .map(|(pos, _)| pos[object_axis])
            .collect();

        Ok(progenitors.into_iter().collect())
    }

    /// Trackers for `halo_idx` and its progenitor tree, in pre-order.
    ///
    /// Each tracker carries a `depth` property with its level below the root.
    /// `depth` bounds how many levels are expanded; 0 yields only the host.
    /// Progenitors rejected by `include` are neither returned nor expanded.
    pub fn traverse_tree(
        &self,
        halo_idx: usize,
        depth: usize,
        include: Option<IncludeFn<'_>>,
    ) -> Result<Vec<Tracker>> {
        let mut arena = vec![Node {
            index: halo_idx,
            level: 0,
            parent: None,
        }];
        let mut stack = vec![0];
        let mut trackers = Vec::new();

        while let Some(id) = stack.pop() {
            let node = arena[id];
            let mut trk = self.storage.create_track(node.index)?;
            trk.set_prop(DEPTH_PROP, FieldData::from(arr0(node.level as f64)))?;
            trackers.push(trk);

            if node.level >= depth {
                continue;
            }

            let mut children = Vec::new();
            for prog in self.get_progenitors(node.index)? {
                if let Some(include) = include {
                    let row = self.storage.get_all(&Selector::All, &Selector::Index(prog))?;
                    if !include(&row) {
                        debug!("Skipping progenitor {} of halo {}", prog, node.index);
                        continue;
                    }
                }
                if on_ancestor_path(&arena, id, prog) {
                    return Err(TrackError::CyclicTree { index: prog });
                }
                arena.push(Node {
                    index: prog,
                    level: node.level + 1,
                    parent: Some(id),
                });
                children.push(arena.len() - 1);
            }
            debug!(
                "Halo {} at level {} has {} progenitors",
                node.index,
                node.level,
                children.len()
            );
            // Reversed so the first progenitor is expanded first
            stack.extend(children.into_iter().rev());
        }

        Ok(trackers)
    }
}

/// Whether `index` is the halo at `id` or any of its ancestors.
fn on_ancestor_path(arena: &[Node], id: usize, index: usize) -> bool {
    let mut cursor = Some(id);
    while let Some(current) = cursor {
        let node = arena[current];
        if node.index == index {
            return true;
        }
        cursor = node.parent;
    }
    false
}

// ============================================================================
// TESTS
// ============================================================================

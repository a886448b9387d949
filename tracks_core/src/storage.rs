//! The Storage Engine - dataset access and tracker construction
//!
//! A [`Storage`] owns a halo or particle [`Dataset`] together with the
//! [`Simulation`] it came from. It has three jobs:
//!
//! 1. Slice fields along their tagged time and object axes ([`Storage::get`]).
//! 2. Build [`Tracker`]s for single objects, deep-copying the position and
//!    the registered custom properties ([`Storage::create_track`]).
//! 3. Provide periodic-box helpers that operate on tracker lists
//!    ([`unwrap_positions`], [`transform_com`]).
//!
//! Raw catalogs mark "does not exist at this snapshot" with position rows
//! that are entirely `-1`; trackers see those rows as NaN.

use crate::dataset::{AxisRole, Dataset, Field, FieldAccess, FieldData, Selector};
use crate::error::{Result, TrackError};
use crate::simulation::Simulation;
use crate::tracker::{Tracker, TrackerKind, INDEX_KEY};
use indexmap::IndexMap;
use ndarray::{Array, Array1, Array3, Axis, Dimension, Ix2, Ix3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Raw coordinate value marking a not-alive snapshot.
pub const NOT_ALIVE: f64 = -1.0;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Field names a storage expects in its dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    /// Position history, `[.., dim]` (default: "x")
    pub position: String,

    /// Object ID per snapshot (default: "id")
    pub id: String,

    /// ID of the host each halo pointed at (default: "parent_id_cat")
    pub host: String,

    /// Per-snapshot liveness mask (default: "mask_alive")
    pub alive: String,

    /// Halo radius (default: "R200m")
    pub radius: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            position: "x".to_string(),
            id: "id".to_string(),
            host: "parent_id_cat".to_string(),
            alive: "mask_alive".to_string(),
            radius: "R200m".to_string(),
        }
    }
}

impl StorageKeys {
    /// Load key overrides; absent keys keep their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    fn entries(&self) -> [(&'static str, &str); 5] {
        [
            ("position", &self.position),
            ("id", &self.id),
            ("host", &self.host),
            ("alive", &self.alive),
            ("radius", &self.radius),
        ]
    }
}

// ============================================================================
// STORAGE
// ============================================================================

/// A dataset plus the machinery to turn its objects into trackers.
#[derive(Debug, Clone)]
pub struct Storage {
    dataset: Dataset,
    sim: Simulation,
    keys: StorageKeys,

    /// Length of the ID field's object axis
    object_count: usize,

    /// Properties copied into every tracker and registered as custom data
    custom_props: Vec<String>,

    tracker_kind: TrackerKind,
}

impl Storage {
    /// Create a storage with the default keys.
    pub fn new(dataset: Dataset, sim: Simulation) -> Result<Self> {
        Self::with_keys(dataset, sim, StorageKeys::default())
    }

    /// Create a storage. Fails when the ID field is missing or has no object axis.
    pub fn with_keys(dataset: Dataset, sim: Simulation, keys: StorageKeys) -> Result<Self> {
        let object_count = object_count_of(&dataset, &keys.id)?;
        Ok(Self {
            dataset,
            sim,
            keys,
            object_count,
            custom_props: Vec::new(),
            tracker_kind: TrackerKind::default(),
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn object_count(&self) -> usize {
        self.object_count
    }

    pub fn snapshot_count(&self) -> usize {
        self.sim.snapshot_count()
    }

    /// Replace every key at once. The object count is re-derived from the new ID field.
    pub fn set_keys(&mut self, keys: StorageKeys) -> Result<()> {
        self.object_count = object_count_of(&self.dataset, &keys.id)?;
        self.keys = keys;
        Ok(())
    }

    pub fn set_position_key(&mut self, key: impl Into<String>) {
        self.keys.position = key.into();
    }

    pub fn set_id_key(&mut self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        self.object_count = object_count_of(&self.dataset, &key)?;
        self.keys.id = key;
        Ok(())
    }

    pub(crate) fn keys_mut(&mut self) -> &mut StorageKeys {
        &mut self.keys
    }

    /// Human-readable list of the field names this storage expects.
    pub fn keynames(&self) -> String {
        let mut out = String::from("EXPECTED KEYNAMES\n");
        for (role, key) in self.keys.entries() {
            out.push_str(&format!("{}: {}\n", role, key));
        }
        out
    }

    // ========================================================================
    // ACCESS
    // ========================================================================

    /// Slice one field along its time and object axes.
    pub fn get(&self, prop: &str, time: &Selector, object: &Selector) -> Result<Field> {
        self.dataset.field(prop)?.slice(time, object)
    }

    /// Slice several fields; the result keeps the requested order.
    pub fn get_many(
        &self,
        props: &[&str],
        time: &Selector,
        object: &Selector,
    ) -> Result<IndexMap<String, Field>> {
        props
            .iter()
            .map(|&prop| Ok((prop.to_string(), self.get(prop, time, object)?)))
            .collect()
    }

    /// Slice every field, in dataset order.
    pub fn get_all(&self, time: &Selector, object: &Selector) -> Result<IndexMap<String, Field>> {
        let names = self.dataset.field_names();
        self.get_many(&names, time, object)
    }

    /// Object indices of every element of the ID field equal to `id`,
    /// deduplicated and ascending.
    pub fn id_to_idx(&self, id: i64) -> Result<Vec<usize>> {
        let field = self.dataset.field(&self.keys.id)?;
        let object_axis = field
            .object_axis()
            .ok_or_else(|| no_object_axis(&self.keys.id))?;
        let ids = field.to_i64(&self.keys.id)?;

        let mut idxs: Vec<usize> = ids
            .indexed_iter()
            .filter(|(_, &v)| v == id)
            .map(|(pos, _)| pos[object_axis])
            .collect();
        idxs.sort_unstable();
        idxs.dedup();

        if idxs.is_empty() {
            return Err(TrackError::UnknownId(id));
        }
        Ok(idxs)
    }

    /// Position history of every object, `[snapshot, object, dim]`, with
    /// not-alive rows set to NaN.
    pub fn position_history(&self) -> Result<Array3<f64>> {
        let key = &self.keys.position;
        let field = self.dataset.field(key)?;
        let (Some(t), Some(o)) = (field.time_axis(), field.object_axis()) else {
            return Err(TrackError::shape(format!(
                "position field '{}' needs both a time and an object axis",
                key
            )));
        };
        let mut perm = vec![t, o];
        perm.extend((0..field.axes().len()).filter(|&a| a != t && a != o));

        let mut pos = field
            .data()
            .clone()
            .permuted(&perm)
            .to_f64()
            .into_dimensionality::<Ix3>()
            .map_err(|_| {
                TrackError::shape(format!(
                    "position field '{}' has shape {:?}",
                    key,
                    field.shape()
                ))
            })?;
        mask_not_alive(&mut pos);
        Ok(pos)
    }

    // ========================================================================
    // TRACKERS
    // ========================================================================

    /// Build a tracker for the object at `idx`.
    ///
    /// The tracker carries deep copies of the position and of every custom
    /// property, plus an `index` property holding `idx` at every snapshot.
    pub fn create_track(&self, idx: usize) -> Result<Tracker> {
        if idx >= self.object_count {
            return Err(TrackError::IndexOutOfRange {
                index: idx,
                len: self.object_count,
            });
        }
        let nsnaps = self.snapshot_count();
        let object = Selector::Index(idx);

        let pos_key = &self.keys.position;
        let raw = self.get(pos_key, &Selector::All, &object)?;
        let mut pos = raw
            .into_time_major(nsnaps)?
            .to_f64()
            .into_dimensionality::<Ix2>()
            .map_err(|_| {
                TrackError::shape(format!(
                    "position '{}' of object {} is not [snapshot, dim]",
                    pos_key, idx
                ))
            })?;
        mask_not_alive(&mut pos);

        let mut props = IndexMap::new();
        for key in &self.custom_props {
            let field = self.get(key, &Selector::All, &object)?;
            props.insert(key.clone(), field.into_time_major(nsnaps)?);
        }
        props.insert(
            INDEX_KEY.to_string(),
            FieldData::from(Array1::from_elem(pos.nrows(), idx as i64)),
        );

        let mut tracker = Tracker::new(pos, props, self.tracker_kind.clone())?;
        tracker.set_custom(self.tracker_custom_keys());
        if !tracker.get_alive().iter().any(|&alive| alive) {
            warn!("Object {} is never alive; its traces will be empty", idx);
        }
        Ok(tracker)
    }

    /// One tracker per index, in the given order.
    pub fn make_tracker_list(&self, idxs: &[usize]) -> Result<Vec<Tracker>> {
        debug!("Creating {} trackers", idxs.len());
        idxs.iter().map(|&idx| self.create_track(idx)).collect()
    }

    pub fn set_tracker_kind(&mut self, kind: TrackerKind) {
        self.tracker_kind = kind;
    }

    pub fn tracker_kind(&self) -> &TrackerKind {
        &self.tracker_kind
    }

    /// Properties copied into new trackers and registered as their custom data.
    pub fn set_tracker_custom(&mut self, props: Vec<String>) {
        self.custom_props = props;
    }

    pub fn tracker_custom(&self) -> &[String] {
        &self.custom_props
    }

    /// Custom data columns of new trackers: the registered properties, then `index`.
    fn tracker_custom_keys(&self) -> Vec<String> {
        let mut keys = self.custom_props.clone();
        if !keys.iter().any(|k| k == INDEX_KEY) {
            keys.push(INDEX_KEY.to_string());
        }
        keys
    }
}

fn no_object_axis(key: &str) -> TrackError {
    TrackError::shape(format!("ID field '{}' has no object axis", key))
}

fn object_count_of(dataset: &Dataset, id_key: &str) -> Result<usize> {
    dataset
        .field(id_key)?
        .axis_len(AxisRole::Object)
        .ok_or_else(|| no_object_axis(id_key))
}

// ============================================================================
// TRACKER LIST HELPERS
// ============================================================================

/// Replace every coordinate row that is entirely [`NOT_ALIVE`] by NaN.
///
/// Rows run along the last axis.
pub fn mask_not_alive<D: Dimension>(pos: &mut Array<f64, D>) {
    let Some(last) = pos.ndim().checked_sub(1) else {
        return;
    };
    for mut row in pos.lanes_mut(Axis(last)) {
        if row.iter().all(|&v| v == NOT_ALIVE) {
            row.fill(f64::NAN);
        }
    }
}

fn common_shape(trackers: &[Tracker]) -> Result<Option<(usize, usize)>> {
    let Some(first) = trackers.first() else {
        return Ok(None);
    };
    let shape = (first.snapshot_count(), first.dim());
    if let Some(other) = trackers
        .iter()
        .find(|t| (t.snapshot_count(), t.dim()) != shape)
    {
        return Err(TrackError::shape(format!(
            "trackers of shape {:?} and {:?} cannot be combined",
            shape,
            (other.snapshot_count(), other.dim())
        )));
    }
    Ok(Some(shape))
}

/// Undo periodic wrapping so trajectories crossing the box edge display continuously.
///
/// An axis is unwrapped when the combined alive range of all trackers spans
/// at least half the box; coordinates in the lower half are then shifted up
/// by one box length. NaN rows stay NaN.
pub fn unwrap_positions(trackers: &mut [Tracker], box_size: f64) -> Result<()> {
    let Some((_, dim)) = common_shape(trackers)? else {
        return Ok(());
    };
    let half = box_size / 2.0;

    let mut lo = vec![box_size; dim];
    let mut hi = vec![0.0_f64; dim];
    for trk in trackers.iter() {
        for row in trk.positions().rows() {
            if row[0].is_nan() {
                continue;
            }
            for (axis, &v) in row.iter().enumerate() {
                lo[axis] = lo[axis].min(v);
                hi[axis] = hi[axis].max(v);
            }
        }
    }

    for axis in (0..dim).filter(|&a| hi[a] - lo[a] >= half) {
        debug!("Unwrapping axis {} over box of size {}", axis, box_size);
        for trk in trackers.iter_mut() {
            let mut pos = trk.positions().clone();
            for v in pos.column_mut(axis).iter_mut() {
                if *v <= half {
                    *v += box_size;
                }
            }
            trk.set_pos(pos)?;
        }
    }
    Ok(())
}

/// Recentre all trackers on their mean alive position at every snapshot.
///
/// Snapshots where no tracker is alive are left untouched.
pub fn transform_com(trackers: &mut [Tracker]) -> Result<()> {
    let Some((nsnaps, dim)) = common_shape(trackers)? else {
        return Ok(());
    };

    let mut com = Array::<f64, Ix2>::zeros((nsnaps, dim));
    let mut counts = vec![0usize; nsnaps];
    for trk in trackers.iter() {
        for (snap, row) in trk.positions().rows().into_iter().enumerate() {
            if row[0].is_nan() {
                continue;
            }
            com.row_mut(snap).zip_mut_with(&row, |c, &v| *c += v);
            counts[snap] += 1;
        }
    }
    for (snap, &count) in counts.iter().enumerate() {
        if count > 0 {
            com.row_mut(snap).mapv_inplace(|c| c / count as f64);
        }
    }

    for trk in trackers.iter_mut() {
        let pos = trk.positions() - &com;
        trk.set_pos(pos)?;
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Columns, Records};
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2, Array2};

    /// 4 snapshots x 3 objects; object 2 is dead at snapshot 0.
    fn sample_storage() -> Storage {
        let mut pos = Array3::<f64>::zeros((4, 3, 3));
        for s in 0..4 {
            for o in 0..3 {
                pos[[s, o, 0]] = s as f64 + 10.0 * o as f64;
                pos[[s, o, 1]] = 1.0;
                pos[[s, o, 2]] = -2.0;
            }
        }
        pos.slice_mut(ndarray::s![0, 2, ..]).fill(NOT_ALIVE);

        let ids = Array2::from_shape_fn((4, 3), |(s, o)| (100 * (s + 1) + o) as i64);
        let mass = Array2::from_shape_fn((4, 3), |(s, o)| (s + o) as f64);
        let records = Records::new(vec![4, 3], vec![AxisRole::Time, AxisRole::Object])
            .unwrap()
            .with("id", ids)
            .unwrap()
            .with("x", pos)
            .unwrap()
            .with("mass", mass)
            .unwrap();
        Storage::new(records.into(), Simulation::new(50.0, vec![0.1, 0.2, 0.3, 0.4])).unwrap()
    }

    #[test]
    fn test_get_slices_by_role() {
        let storage = sample_storage();
        let full = storage.get("mass", &Selector::All, &Selector::All).unwrap();
        assert_eq!(full.shape(), &[4, 3]);

        let one = storage
            .get("mass", &Selector::Index(2), &Selector::Index(1))
            .unwrap();
        assert_eq!(one.data().to_f64().iter().copied().collect::<Vec<_>>(), vec![3.0]);

        let many = storage
            .get_many(&["id", "mass"], &Selector::All, &Selector::Index(0))
            .unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many["id"].shape(), &[4]);
    }

    #[test]
    fn test_unknown_field_names_the_key() {
        let storage = sample_storage();
        assert_eq!(
            storage.get("Vmax", &Selector::All, &Selector::All),
            Err(TrackError::UnknownField("Vmax".to_string()))
        );
    }

    #[test]
    fn test_missing_id_field_fails_construction() {
        let columns = Columns::new().with(
            "x",
            Field::new(Array3::<f64>::zeros((2, 2, 3)), vec![AxisRole::Time, AxisRole::Object, AxisRole::Free])
                .unwrap(),
        );
        let err = Storage::new(columns.into(), Simulation::new(1.0, vec![0.0, 1.0])).unwrap_err();
        assert_eq!(err, TrackError::UnknownField("id".to_string()));
    }

    #[test]
    fn test_id_to_idx() {
        let storage = sample_storage();
        assert_eq!(storage.id_to_idx(301).unwrap(), vec![1]);
        assert_eq!(storage.id_to_idx(999), Err(TrackError::UnknownId(999)));
    }

    #[test]
    fn test_create_track_masks_sentinel_rows() {
        let storage = sample_storage();
        let trk = storage.create_track(2).unwrap();
        assert_eq!(trk.get_alive(), vec![false, true, true, true]);
        assert_eq!(
            trk.get_prop(INDEX_KEY, &Selector::All).unwrap(),
            FieldData::from(arr1(&[2i64, 2, 2, 2]))
        );
        assert_eq!(trk.custom_keys(), &[INDEX_KEY.to_string()]);
    }

    #[test]
    fn test_create_track_copies_custom_props() {
        let mut storage = sample_storage();
        storage.set_tracker_custom(vec!["mass".to_string()]);
        let trk = storage.create_track(1).unwrap();
        assert_eq!(
            trk.prop("mass").unwrap(),
            &FieldData::from(arr1(&[1.0, 2.0, 3.0, 4.0]))
        );
        assert_eq!(trk.custom_index(INDEX_KEY).unwrap(), 1);
    }

    #[test]
    fn test_create_track_out_of_range() {
        let storage = sample_storage();
        assert_eq!(
            storage.create_track(3).unwrap_err(),
            TrackError::IndexOutOfRange { index: 3, len: 3 }
        );
    }

    #[test]
    fn test_tracker_does_not_alias_storage() {
        let storage = sample_storage();
        let before = storage.get("x", &Selector::All, &Selector::All).unwrap();

        let mut trk = storage.create_track(0).unwrap();
        trk.set_pos(Array2::from_elem((4, 3), 7.0)).unwrap();

        let after = storage.get("x", &Selector::All, &Selector::All).unwrap();
        assert_eq!(before, after);
        let fresh = storage.create_track(0).unwrap();
        assert_relative_eq!(fresh.positions()[[0, 0]], 0.0);
    }

    #[test]
    fn test_position_history_is_time_object_dim() {
        let storage = sample_storage();
        let hist = storage.position_history().unwrap();
        assert_eq!(hist.shape(), &[4, 3, 3]);
        assert!(hist[[0, 2, 1]].is_nan());
        assert_relative_eq!(hist[[3, 1, 0]], 13.0);
    }

    #[test]
    fn test_keynames_and_key_overrides() {
        let keys = StorageKeys::from_json(r#"{"position": "pos"}"#).unwrap();
        assert_eq!(keys.position, "pos");
        assert_eq!(keys.id, "id");

        let storage = sample_storage();
        let names = storage.keynames();
        assert!(names.starts_with("EXPECTED KEYNAMES\n"));
        assert!(names.contains("host: parent_id_cat\n"));
    }

    #[test]
    fn test_mask_not_alive_needs_every_coordinate() {
        let mut pos = arr2(&[[-1.0, -1.0], [-1.0, 0.5]]);
        mask_not_alive(&mut pos);
        assert!(pos[[0, 1]].is_nan());
        assert_relative_eq!(pos[[1, 0]], -1.0);
    }

    #[test]
    fn test_unwrap_positions_shifts_lower_half() {
        let nan = f64::NAN;
        let a = Tracker::trajectory(arr2(&[[95.0, 50.0], [2.0, 50.0], [nan, nan]]), IndexMap::new()).unwrap();
        let b = Tracker::trajectory(arr2(&[[90.0, 51.0], [93.0, 52.0], [96.0, 53.0]]), IndexMap::new()).unwrap();
        let mut trackers = vec![a, b];
        unwrap_positions(&mut trackers, 100.0).unwrap();

        let a = trackers[0].positions();
        assert_relative_eq!(a[[1, 0]], 102.0);
        assert_relative_eq!(a[[0, 0]], 95.0);
        assert!(a[[2, 0]].is_nan());
        // y spans less than half the box
        assert_relative_eq!(a[[0, 1]], 50.0);
    }

    #[test]
    fn test_transform_com_centres_alive_trackers() {
        let nan = f64::NAN;
        let a = Tracker::trajectory(arr2(&[[0.0, 0.0], [2.0, 2.0]]), IndexMap::new()).unwrap();
        let b = Tracker::trajectory(arr2(&[[nan, nan], [4.0, 0.0]]), IndexMap::new()).unwrap();
        let mut trackers = vec![a, b];
        transform_com(&mut trackers).unwrap();

        assert_relative_eq!(trackers[0].positions()[[0, 0]], 0.0);
        assert_relative_eq!(trackers[0].positions()[[1, 0]], -1.0);
        assert_relative_eq!(trackers[1].positions()[[1, 1]], -1.0);
        assert!(trackers[1].positions()[[0, 0]].is_nan());
    }
}

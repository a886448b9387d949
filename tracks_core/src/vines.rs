//! Vines - tracer particles grouped by host halo
//!
//! Tracer data is indexed `[tracer, snapshot]`; the halo table records, for
//! every host `h`, a contiguous tracer range `[first[h], first[h] + count[h])`.
//! Vines builds trajectory trackers for the tracers of a host and a sphere
//! tracker for the host itself.

use crate::dataset::{AxisRole, Dataset, Field, FieldAccess, FieldData, Selector};
use crate::error::{Result, TrackError};
use crate::simulation::Simulation;
use crate::storage::mask_not_alive;
use crate::tracker::{SphereStyle, Tracker, TrackerKind, INDEX_KEY};
use crate::tree::IncludeFn;
use indexmap::IndexMap;
use ndarray::{Array1, Array2, Ix2};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Field names Vines expects in its tracer and halo datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VinesKeys {
    /// Tracer positions (default: "tjy_x")
    pub position: String,

    /// Index of each host's first tracer (default: "sho_tjy_first")
    pub first_tracer: String,

    /// Number of tracers owned by each host (default: "sho_tjy_n")
    pub tracer_count: String,

    /// Host radius per snapshot (default: "R200m")
    pub host_radius: String,

    /// Halo ID (default: "id")
    pub halo_id: String,
}

impl Default for VinesKeys {
    fn default() -> Self {
        Self {
            position: "tjy_x".to_string(),
            first_tracer: "sho_tjy_first".to_string(),
            tracer_count: "sho_tjy_n".to_string(),
            host_radius: "R200m".to_string(),
            halo_id: "id".to_string(),
        }
    }
}

impl VinesKeys {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// VINES
// ============================================================================

#[derive(Debug, Clone)]
pub struct Vines {
    tracers: Dataset,
    halos: Dataset,
    sim: Simulation,
    keys: VinesKeys,
    tracker_kind: TrackerKind,

    /// Length of the position field's object axis
    tracer_count: usize,
}

impl Vines {
    pub fn new(tracers: Dataset, halos: Dataset, sim: Simulation) -> Result<Self> {
        Self::with_keys(tracers, halos, sim, VinesKeys::default())
    }

    /// Fails with [`TrackError::UnknownField`] when the tracer positions are absent.
    pub fn with_keys(
        tracers: Dataset,
        halos: Dataset,
        sim: Simulation,
        keys: VinesKeys,
    ) -> Result<Self> {
        let tracer_count = tracer_count_of(&tracers, &keys.position)?;
        Ok(Self {
            tracers,
            halos,
            sim,
            keys,
            tracker_kind: TrackerKind::Trajectory,
            tracer_count,
        })
    }

    pub fn set_tracers(&mut self, tracers: Dataset) -> Result<()> {
        self.tracer_count = tracer_count_of(&tracers, &self.keys.position)?;
        self.tracers = tracers;
        Ok(())
    }

    pub fn set_halos(&mut self, halos: Dataset) {
        self.halos = halos;
    }

    pub fn set_tracker_kind(&mut self, kind: TrackerKind) {
        self.tracker_kind = kind;
    }

    pub fn keys(&self) -> &VinesKeys {
        &self.keys
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn tracer_count(&self) -> usize {
        self.tracer_count
    }

    // ========================================================================
    // TRACER ACCESS
    // ========================================================================

    /// Raw position history of one tracer, `[snapshot, dim]`.
    pub fn get_pos(&self, ptl: usize) -> Result<Array2<f64>> {
        self.check_tracer(ptl)?;
        let key = &self.keys.position;
        self.tracers
            .field(key)?
            .slice(&Selector::All, &Selector::Index(ptl))?
            .into_time_major(self.sim.snapshot_count())?
            .to_f64()
            .into_dimensionality::<Ix2>()
            .map_err(|_| TrackError::shape(format!("tracer positions '{}' are not [snapshot, dim]", key)))
    }

    /// False at snapshots where every coordinate is the not-alive sentinel.
    pub fn get_alive(&self, ptl: usize) -> Result<Vec<bool>> {
        let mut pos = self.get_pos(ptl)?;
        mask_not_alive(&mut pos);
        Ok(pos.column(0).iter().map(|v| !v.is_nan()).collect())
    }

    /// Tracer fields sliced by tracer and snapshot.
    pub fn get(
        &self,
        props: &[&str],
        ptl: &Selector,
        snap: &Selector,
    ) -> Result<IndexMap<String, Field>> {
        props
            .iter()
            .map(|&prop| Ok((prop.to_string(), self.tracers.field(prop)?.slice(snap, ptl)?)))
            .collect()
    }

    /// Every tracer field sliced by tracer and snapshot.
    pub fn get_all(&self, ptl: &Selector, snap: &Selector) -> Result<IndexMap<String, Field>> {
        let names = self.tracers.field_names();
        self.get(&names, ptl, snap)
    }

    // ========================================================================
    // HALO ACCESS
    // ========================================================================

    pub fn get_halo_data(&self, prop: &str, halo: &Selector, snap: &Selector) -> Result<Field> {
        self.halos.field(prop)?.slice(snap, halo)
    }

    /// Halo indices carrying `halo_id`.
    pub fn get_idx(&self, halo_id: i64) -> Result<Vec<usize>> {
        let key = &self.keys.halo_id;
        let field = self.halos.field(key)?;
        let object_axis = field
            .object_axis()
            .ok_or_else(|| TrackError::shape(format!("halo field '{}' has no object axis", key)))?;
        let mut idxs: Vec<usize> = field
            .to_i64(key)?
            .indexed_iter()
            .filter(|(_, &v)| v == halo_id)
            .map(|(pos, _)| pos[object_axis])
            .collect();
        idxs.dedup();
        if idxs.is_empty() {
            return Err(TrackError::UnknownId(halo_id));
        }
        Ok(idxs)
    }

    fn halo_scalar(&self, key: &str, halo: usize) -> Result<i64> {
        let values = self
            .get_halo_data(key, &Selector::Index(halo), &Selector::All)?
            .to_i64(key)?;
        let mut iter = values.iter();
        match (iter.next(), iter.next()) {
            (Some(&value), None) => Ok(value),
            _ => Err(TrackError::shape(format!(
                "halo field '{}' holds {} values per halo, expected 1",
                key,
                values.len()
            ))),
        }
    }

    /// Tracers owned by `halo`, clipped to the tracer count.
    pub fn get_halo_ptls(&self, halo: usize) -> Result<Vec<usize>> {
        let first = self.halo_scalar(&self.keys.first_tracer, halo)?;
        let count = self.halo_scalar(&self.keys.tracer_count, halo)?;
        if first < 0 || count <= 0 {
            return Ok(Vec::new());
        }
        let start = first as usize;
        let end = start.saturating_add(count as usize);
        let mask = Selector::Range(start..end).mask(self.tracer_count)?;
        Selector::Mask(mask).indices(self.tracer_count)
    }

    // ========================================================================
    // TRACKERS
    // ========================================================================

    /// Tracker for one tracer: every tracer field, the snapshot times and `index`.
    pub fn create_track(&self, ptl: usize) -> Result<Tracker> {
        let nsnaps = self.sim.snapshot_count();
        let mut pos = self.get_pos(ptl)?;
        mask_not_alive(&mut pos);

        let mut props = IndexMap::new();
        for (name, field) in self.get_all(&Selector::Index(ptl), &Selector::All)? {
            props.insert(name, field.into_time_major(nsnaps)?);
        }
        props.extend(self.sim.default_props());
        props.insert(
            INDEX_KEY.to_string(),
            FieldData::from(Array1::from_elem(pos.nrows(), ptl as i64)),
        );

        let mut tracker = Tracker::new(pos, props, self.tracker_kind.clone())?;
        tracker.set_custom(vec![INDEX_KEY.to_string()]);
        Ok(tracker)
    }

    /// Trackers for the tracers of `halo`.
    ///
    /// `include` sees every tracer field restricted to the tracer's alive snapshots.
    pub fn create_halo_tracks(
        &self,
        halo: usize,
        include: Option<IncludeFn<'_>>,
    ) -> Result<Vec<Tracker>> {
        let ptls = self.get_halo_ptls(halo)?;
        let mut trackers = Vec::with_capacity(ptls.len());
        for ptl in ptls {
            if let Some(include) = include {
                let alive = self.get_alive(ptl)?;
                let row = self.get_all(&Selector::Index(ptl), &Selector::Mask(alive))?;
                if !include(&row) {
                    continue;
                }
            }
            trackers.push(self.create_track(ptl)?);
        }
        debug!("Created {} tracer trackers for halo {}", trackers.len(), halo);
        Ok(trackers)
    }

    /// Sphere tracker for `halo` at the origin, sized by its radius history.
    ///
    /// Callers recentre it with [`Tracker::set_pos`].
    pub fn create_host_sphere(&self, halo: usize) -> Result<Tracker> {
        let key = &self.keys.host_radius;
        let radius = self
            .get_halo_data(key, &Selector::Index(halo), &Selector::All)?
            .into_time_major(self.sim.snapshot_count())?;
        let nsnaps = radius.len_of(0);

        let mut props = IndexMap::new();
        props.insert(key.clone(), radius);
        props.insert(
            INDEX_KEY.to_string(),
            FieldData::from(Array1::from_elem(nsnaps, halo as i64)),
        );
        let style = SphereStyle {
            radius_key: key.clone(),
            ..SphereStyle::default()
        };
        let mut sphere = Tracker::sphere(Array2::zeros((nsnaps, 3)), props, style)?;
        sphere.set_custom(vec![INDEX_KEY.to_string()]);
        Ok(sphere)
    }

    fn check_tracer(&self, ptl: usize) -> Result<()> {
        if ptl >= self.tracer_count {
            return Err(TrackError::IndexOutOfRange {
                index: ptl,
                len: self.tracer_count,
            });
        }
        Ok(())
    }
}

fn tracer_count_of(tracers: &Dataset, position_key: &str) -> Result<usize> {
    tracers
        .field(position_key)?
        .axis_len(AxisRole::Object)
        .ok_or_else(|| {
            TrackError::shape(format!(
                "tracer positions '{}' have no tracer axis",
                position_key
            ))
        })
}

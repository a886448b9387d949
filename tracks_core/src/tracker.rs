//! Trackers - the position and property history of one tracked object
//!
//! A tracker owns a `[snapshot, dim]` position array (dim 2 or 3) and a set
//! of per-snapshot properties, all deep copies of the storage they came
//! from. A snapshot is *alive* when the first position coordinate is not
//! NaN; NaN rows are how "this object does not exist yet / any more" is
//! represented.
//!
//! How a tracker renders is chosen by its [`TrackerKind`]:
//! - `Points`: a point cloud (`mode = "markers"`)
//! - `Trajectory`: a line through the alive positions (`mode = "lines"`)
//! - `Sphere`: a surface mesh at the latest centre and radius

use crate::dataset::{FieldData, Selector};
use crate::error::{Result, TrackError};
use crate::trace::{Coords, CustomData, CustomValue, PlotArgs, Trace, TraceKind};
use indexmap::IndexMap;
use nalgebra::{DVector, Vector3};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::f64::consts::{PI, TAU};

/// Property holding the storage index of the tracked object.
pub const INDEX_KEY: &str = "index";

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Rendering options for sphere trackers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SphereStyle {
    /// Property holding the radius at every snapshot (default: "R200m")
    pub radius_key: String,

    /// Latitude samples of the mesh; longitude uses twice as many (default: 20)
    pub resolution: usize,
}

impl Default for SphereStyle {
    fn default() -> Self {
        Self {
            radius_key: "R200m".to_string(),
            resolution: 20,
        }
    }
}

/// Rendering variant of a tracker.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TrackerKind {
    Points,
    #[default]
    Trajectory,
    Sphere(SphereStyle),
}

impl TrackerKind {
    /// Whether point-style event markers can be attached to this variant.
    pub fn marker_compatible(&self) -> bool {
        !matches!(self, TrackerKind::Sphere(_))
    }
}

// ============================================================================
// EXTENT
// ============================================================================

/// Axis-aligned bounding box of a set of positions.
///
/// An empty extent has `min = +inf` and `max = -inf` on every axis, so the
/// union with any other extent yields the other extent.
#[derive(Debug, Clone, PartialEq)]
pub struct Extent {
    pub min: DVector<f64>,
    pub max: DVector<f64>,
}

impl Extent {
    pub fn empty(dim: usize) -> Self {
        Self {
            min: DVector::from_element(dim, f64::INFINITY),
            max: DVector::from_element(dim, f64::NEG_INFINITY),
        }
    }

    pub fn dim(&self) -> usize {
        self.min.len()
    }

    pub fn is_empty(&self) -> bool {
        self.min.iter().zip(self.max.iter()).any(|(lo, hi)| lo > hi)
    }

    /// Smallest extent containing both.
    pub fn union(&self, other: &Extent) -> Result<Extent> {
        if self.dim() != other.dim() {
            return Err(TrackError::shape(format!(
                "union of {}D and {}D extents",
                self.dim(),
                other.dim()
            )));
        }
        Ok(Extent {
            min: self.min.zip_map(&other.min, f64::min),
            max: self.max.zip_map(&other.max, f64::max),
        })
    }
}

// ============================================================================
// TRACKER
// ============================================================================

/// Position and property history of a single object.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracker {
    /// Positions, `[snapshot, dim]`; NaN rows are not alive
    position: Array2<f64>,

    /// Per-snapshot properties, snapshot axis first
    props: IndexMap<String, FieldData>,

    /// Properties packaged as custom data, in column order
    custom_keys: Vec<String>,

    /// Style arguments for the renderer
    plot_args: PlotArgs,

    marker_compatible: bool,

    kind: TrackerKind,
}

impl Tracker {
    /// Create a tracker. Every property must have one entry per snapshot
    /// (zero-dimensional values are repeated across snapshots).
    pub fn new(
        position: Array2<f64>,
        props: IndexMap<String, FieldData>,
        kind: TrackerKind,
    ) -> Result<Self> {
        check_dim(position.ncols())?;
        let mut tracker = Self {
            position,
            props: IndexMap::new(),
            custom_keys: Vec::new(),
            plot_args: PlotArgs::new(),
            marker_compatible: kind.marker_compatible(),
            kind,
        };
        tracker.set_props(props)?;
        Ok(tracker)
    }

    pub fn trajectory(position: Array2<f64>, props: IndexMap<String, FieldData>) -> Result<Self> {
        Self::new(position, props, TrackerKind::Trajectory)
    }

    pub fn points(position: Array2<f64>, props: IndexMap<String, FieldData>) -> Result<Self> {
        Self::new(position, props, TrackerKind::Points)
    }

    pub fn sphere(
        position: Array2<f64>,
        props: IndexMap<String, FieldData>,
        style: SphereStyle,
    ) -> Result<Self> {
        Self::new(position, props, TrackerKind::Sphere(style))
    }

    pub fn kind(&self) -> &TrackerKind {
        &self.kind
    }

    /// Spatial dimension of the positions (2 or 3).
    pub fn dim(&self) -> usize {
        self.position.ncols()
    }

    pub fn snapshot_count(&self) -> usize {
        self.position.nrows()
    }

    // ========================================================================
    // POSITIONS & LIVENESS
    // ========================================================================

    /// True at every snapshot where the object exists.
    pub fn get_alive(&self) -> Vec<bool> {
        self.position
            .column(0)
            .iter()
            .map(|v| !v.is_nan())
            .collect()
    }

    /// Copy of the position rows picked by `sel`.
    pub fn get_pos(&self, sel: &Selector) -> Result<Array2<f64>> {
        let rows = sel.indices(self.snapshot_count())?;
        Ok(self.position.select(Axis(0), &rows))
    }

    /// Position at a single snapshot.
    pub fn position_at(&self, snap: usize) -> Result<DVector<f64>> {
        if snap >= self.snapshot_count() {
            return Err(TrackError::IndexOutOfRange {
                index: snap,
                len: self.snapshot_count(),
            });
        }
        let row = self.position.row(snap);
        Ok(DVector::from_iterator(row.len(), row.iter().copied()))
    }

    pub fn positions(&self) -> &Array2<f64> {
        &self.position
    }

    /// Replace the positions; the snapshot count must not change.
    pub fn set_pos(&mut self, position: Array2<f64>) -> Result<()> {
        if position.nrows() != self.snapshot_count() {
            return Err(TrackError::shape(format!(
                "{} position rows for {} snapshots",
                position.nrows(),
                self.snapshot_count()
            )));
        }
        check_dim(position.ncols())?;
        self.position = position;
        Ok(())
    }

    /// Alive snapshots, optionally restricted to those picked by `sel`.
    pub fn selected_snapshots(&self, sel: Option<&Selector>) -> Result<Vec<usize>> {
        let alive = self.get_alive();
        let wanted = match sel {
            Some(sel) => sel.mask(alive.len())?,
            None => vec![true; alive.len()],
        };
        Ok(alive
            .iter()
            .zip(wanted)
            .enumerate()
            .filter_map(|(snap, (&is_alive, keep))| (is_alive && keep).then_some(snap))
            .collect())
    }

    /// Smallest box that keeps the tracker visible over the selected snapshots.
    ///
    /// Returns [`Extent::empty`] when no alive snapshot is selected.
    pub fn get_axes(&self, sel: Option<&Selector>) -> Result<Extent> {
        let snaps = self.selected_snapshots(sel)?;
        if let TrackerKind::Sphere(style) = &self.kind {
            let Some(&last) = snaps.last() else {
                return Ok(Extent::empty(self.dim()));
            };
            let center = self.position_at(last)?;
            let radius = self.radius_at(style, last)?;
            return Ok(Extent {
                min: center.add_scalar(-radius),
                max: center.add_scalar(radius),
            });
        }

        let mut extent = Extent::empty(self.dim());
        for snap in snaps {
            for (axis, &v) in self.position.row(snap).iter().enumerate() {
                extent.min[axis] = extent.min[axis].min(v);
                extent.max[axis] = extent.max[axis].max(v);
            }
        }
        Ok(extent)
    }

    // ========================================================================
    // PROPERTIES
    // ========================================================================

    /// Set a property. Zero-dimensional values are repeated across snapshots.
    pub fn set_prop(&mut self, name: impl Into<String>, value: FieldData) -> Result<()> {
        let name = name.into();
        let n = self.snapshot_count();
        let value = if value.ndim() == 0 {
            value.broadcast_leading(n)?
        } else {
            value
        };
        if value.len_of(0) != n {
            return Err(TrackError::shape(format!(
                "property '{}' has {} snapshots, tracker has {}",
                name,
                value.len_of(0),
                n
            )));
        }
        self.props.insert(name, value);
        Ok(())
    }

    pub fn set_props(&mut self, props: IndexMap<String, FieldData>) -> Result<()> {
        for (name, value) in props {
            self.set_prop(name, value)?;
        }
        Ok(())
    }

    /// Full history of a property.
    pub fn prop(&self, name: &str) -> Result<&FieldData> {
        self.props
            .get(name)
            .ok_or_else(|| TrackError::unknown_property(name))
    }

    /// Property values at the snapshots picked by `sel`.
    pub fn get_prop(&self, name: &str, sel: &Selector) -> Result<FieldData> {
        self.prop(name)?.select_axis(0, sel)
    }

    pub fn has_prop(&self, name: &str) -> bool {
        self.props.contains_key(name)
    }

    pub fn prop_names(&self) -> impl Iterator<Item = &str> {
        self.props.keys().map(String::as_str)
    }

    fn radius_at(&self, style: &SphereStyle, snap: usize) -> Result<f64> {
        self.prop(&style.radius_key)?
            .scalar_at(snap)
            .ok_or_else(|| {
                TrackError::shape(format!("radius '{}' is not a scalar per snapshot", style.radius_key))
            })
    }

    // ========================================================================
    // CUSTOM DATA
    // ========================================================================

    /// Register the properties packaged into custom data, in column order.
    pub fn set_custom(&mut self, keys: Vec<String>) {
        self.custom_keys = keys;
    }

    pub fn custom_keys(&self) -> &[String] {
        &self.custom_keys
    }

    /// Column of `key` in this tracker's custom data.
    pub fn custom_index(&self, key: &str) -> Result<usize> {
        self.custom_keys
            .iter()
            .position(|k| k == key)
            .ok_or_else(|| TrackError::unknown_property(key))
    }

    /// Custom data cells for one snapshot, in column order.
    pub fn custom_row(&self, snap: usize) -> Result<Vec<CustomValue>> {
        self.custom_keys
            .iter()
            .map(|key| {
                CustomValue::from_row(self.prop(key)?, snap).ok_or(TrackError::IndexOutOfRange {
                    index: snap,
                    len: self.snapshot_count(),
                })
            })
            .collect()
    }

    /// One custom data row per snapshot in `snaps`.
    pub fn custom_data(&self, snaps: &[usize]) -> Result<CustomData> {
        let mut data = CustomData::new(self.custom_keys.clone());
        for &snap in snaps {
            data.push_row(self.custom_row(snap)?)?;
        }
        Ok(data)
    }

    // ========================================================================
    // RENDERING
    // ========================================================================

    pub fn plot_args(&self) -> &PlotArgs {
        &self.plot_args
    }

    /// Merge style arguments into the existing ones.
    pub fn set_plot_args(&mut self, args: PlotArgs) {
        self.plot_args.extend(args);
    }

    pub fn set_plot_arg(&mut self, key: impl Into<String>, value: Value) {
        self.plot_args.insert(key.into(), value);
    }

    pub fn set_marker_compatible(&mut self, compatible: bool) {
        self.marker_compatible = compatible;
    }

    pub fn marker_compatible(&self) -> bool {
        self.marker_compatible
    }

    /// Placeholder trace of the right kind for this tracker.
    pub fn empty_trace(&self) -> Trace {
        match self.kind {
            TrackerKind::Sphere(_) => Trace::empty(TraceKind::Surface),
            _ => Trace::empty(TraceKind::for_dim(self.dim()).unwrap_or(TraceKind::Scatter3d)),
        }
    }

    /// Renderer payload over the alive snapshots picked by `sel` (all alive
    /// snapshots when `None`).
    pub fn plot(&self, sel: Option<&Selector>) -> Result<Trace> {
        let snaps = self.selected_snapshots(sel)?;
        let customdata = if self.custom_keys.is_empty() {
            None
        } else {
            Some(self.custom_data(&snaps)?)
        };
        match &self.kind {
            TrackerKind::Points => self.scatter_trace(&snaps, "markers", "marker", customdata),
            TrackerKind::Trajectory => self.scatter_trace(&snaps, "lines", "line", customdata),
            TrackerKind::Sphere(style) => self.sphere_trace(style, &snaps, customdata),
        }
    }

    fn scatter_trace(
        &self,
        snaps: &[usize],
        mode: &str,
        style_key: &str,
        customdata: Option<CustomData>,
    ) -> Result<Trace> {
        let pos = self.position.select(Axis(0), snaps);
        let mut trace = Trace::from_positions(pos.view())?;
        trace.mode = Some(mode.to_string());
        trace
            .style
            .insert(style_key.to_string(), Value::Object(self.plot_args.clone()));
        trace.customdata = customdata;
        Ok(trace)
    }

    /// Only the latest selected radius is drawn; radius history is not shown.
    fn sphere_trace(
        &self,
        style: &SphereStyle,
        snaps: &[usize],
        customdata: Option<CustomData>,
    ) -> Result<Trace> {
        if self.dim() != 3 {
            return Err(TrackError::dimension(
                "sphere tracker not defined for non 3D plots",
            ));
        }
        let mut trace = Trace::empty(TraceKind::Surface);
        trace.update(&self.plot_args);
        trace.customdata = customdata;

        let Some(&last) = snaps.last() else {
            return Ok(trace);
        };
        let p = self.position.row(last);
        let center = Vector3::new(p[0], p[1], p[2]);
        let radius = self.radius_at(style, last)?;
        let [x, y, z] = sphere_mesh(center, radius, style.resolution);
        trace.x = Some(Coords::Grid(x));
        trace.y = Some(Coords::Grid(y));
        trace.z = Some(Coords::Grid(z));
        Ok(trace)
    }
}

fn check_dim(dim: usize) -> Result<()> {
    if (2..=3).contains(&dim) {
        Ok(())
    } else {
        Err(TrackError::dimension(format!(
            "positions must be 2D or 3D, got {}D",
            dim
        )))
    }
}

/// `n` evenly spaced samples over `[0, stop]`, endpoints included.
fn linspace(n: usize, stop: f64) -> impl Iterator<Item = f64> {
    (0..n).map(move |i| {
        if n > 1 {
            stop * i as f64 / (n - 1) as f64
        } else {
            0.0
        }
    })
}

/// Longitude/latitude grid on a sphere, `2 * resolution` rows by `resolution` columns.
fn sphere_mesh(center: Vector3<f64>, radius: f64, resolution: usize) -> [Vec<Vec<f64>>; 3] {
    let mut grid: [Vec<Vec<f64>>; 3] = Default::default();
    for u in linspace(resolution * 2, TAU) {
        let mut rows: [Vec<f64>; 3] = Default::default();
        for v in linspace(resolution, PI) {
            let dir = Vector3::new(u.cos() * v.sin(), u.sin() * v.sin(), v.cos());
            let p = center + dir * radius;
            rows[0].push(p.x);
            rows[1].push(p.y);
            rows[2].push(p.z);
        }
        for (axis, row) in rows.into_iter().enumerate() {
            grid[axis].push(row);
        }
    }
    grid
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2, Array1};
    use serde_json::json;

    fn sample_tracker() -> Tracker {
        let nan = f64::NAN;
        let pos = arr2(&[
            [nan, nan, nan],
            [0.0, 1.0, 2.0],
            [1.0, -1.0, 4.0],
            [nan, nan, nan],
        ]);
        let mut props = IndexMap::new();
        props.insert(INDEX_KEY.to_string(), FieldData::from(Array1::from_elem(4, 7i64)));
        props.insert(
            "mass".to_string(),
            FieldData::from(arr1(&[1.0, 2.0, 3.0, 4.0])),
        );
        props.insert(
            "vel".to_string(),
            FieldData::from(arr2(&[[0.0, 0.0], [1.0, 2.0], [3.0, 4.0], [0.0, 0.0]])),
        );
        Tracker::trajectory(pos, props).unwrap()
    }

    #[test]
    fn test_alive_follows_nan_rows() {
        let trk = sample_tracker();
        assert_eq!(trk.get_alive(), vec![false, true, true, false]);
        assert_eq!(trk.selected_snapshots(None).unwrap(), vec![1, 2]);
        assert_eq!(
            trk.selected_snapshots(Some(&Selector::Range(0..2))).unwrap(),
            vec![1]
        );
    }

    #[test]
    fn test_get_axes_over_alive_snapshots() {
        let trk = sample_tracker();
        let extent = trk.get_axes(None).unwrap();
        assert_relative_eq!(extent.min[1], -1.0);
        assert_relative_eq!(extent.max[2], 4.0);
        assert!(!extent.is_empty());
    }

    #[test]
    fn test_get_axes_without_selection_is_empty_sentinel() {
        let trk = sample_tracker();
        let extent = trk.get_axes(Some(&Selector::Index(3))).unwrap();
        assert!(extent.is_empty());
        assert_eq!(extent.min[0], f64::INFINITY);
        assert_eq!(extent.max[0], f64::NEG_INFINITY);
    }

    #[test]
    fn test_get_prop_unknown_key() {
        let trk = sample_tracker();
        assert_eq!(
            trk.get_prop("missing", &Selector::All),
            Err(TrackError::UnknownProperty("missing".to_string()))
        );
    }

    #[test]
    fn test_set_prop_broadcasts_scalars_and_checks_length() {
        let mut trk = sample_tracker();
        trk.set_prop("depth", FieldData::from(ndarray::arr0(2.0))).unwrap();
        assert_eq!(trk.prop("depth").unwrap().scalar_at(3), Some(2.0));
        assert!(trk
            .set_prop("short", FieldData::from(arr1(&[1.0, 2.0])))
            .is_err());
    }

    #[test]
    fn test_custom_data_packs_vectors_as_tuples() {
        let mut trk = sample_tracker();
        trk.set_custom(vec!["mass".to_string(), "vel".to_string(), INDEX_KEY.to_string()]);
        let cdata = trk.custom_data(&[1, 2]).unwrap();
        assert_eq!(cdata.len(), 2);
        assert_eq!(cdata.cell(1, 0), Some(&CustomValue::Float(3.0)));
        assert_eq!(
            cdata.cell(1, 1),
            Some(&CustomValue::Tuple(vec![
                CustomValue::Float(3.0),
                CustomValue::Float(4.0)
            ]))
        );
        assert_eq!(trk.custom_index(INDEX_KEY).unwrap(), 2);
        assert!(trk.custom_index("mass_peak").is_err());
    }

    #[test]
    fn test_trajectory_plot_payload() {
        let mut trk = sample_tracker();
        trk.set_custom(vec![INDEX_KEY.to_string()]);
        trk.set_plot_arg("width", json!(3));
        let trace = trk.plot(None).unwrap();
        assert_eq!(trace.kind, TraceKind::Scatter3d);
        assert_eq!(trace.mode.as_deref(), Some("lines"));
        assert_eq!(trace.x, Some(Coords::Line(vec![0.0, 1.0])));
        assert_eq!(trace.style["line"], json!({"width": 3}));
        assert_eq!(trace.first_custom(0), Some(&CustomValue::Int(7)));
    }

    #[test]
    fn test_never_alive_tracker_plots_empty() {
        let pos = Array2::from_elem((3, 3), f64::NAN);
        let trk = Tracker::points(pos, IndexMap::new()).unwrap();
        let trace = trk.plot(None).unwrap();
        assert!(trace.is_empty());
        assert_eq!(trace.mode.as_deref(), Some("markers"));
        assert!(trk.get_axes(None).unwrap().is_empty());
    }

    #[test]
    fn test_sphere_uses_latest_radius() {
        let pos = Array2::zeros((3, 3));
        let mut props = IndexMap::new();
        props.insert("R200m".to_string(), FieldData::from(arr1(&[1.0, 2.0, 3.0])));
        let style = SphereStyle {
            resolution: 4,
            ..SphereStyle::default()
        };
        let sphere = Tracker::sphere(pos, props, style).unwrap();
        assert!(!sphere.marker_compatible());

        let extent = sphere.get_axes(Some(&Selector::Range(0..2))).unwrap();
        assert_relative_eq!(extent.max[0], 2.0);
        assert_relative_eq!(extent.min[2], -2.0);

        let trace = sphere.plot(None).unwrap();
        assert_eq!(trace.kind, TraceKind::Surface);
        match trace.z {
            Some(Coords::Grid(grid)) => {
                assert_eq!(grid.len(), 8);
                assert_eq!(grid[0].len(), 4);
                // v = 0 is the pole
                assert_relative_eq!(grid[0][0], 3.0);
            }
            other => panic!("expected grid, got {:?}", other),
        }
    }

    #[test]
    fn test_sphere_rejects_2d() {
        let mut props = IndexMap::new();
        props.insert("R200m".to_string(), FieldData::from(arr1(&[1.0])));
        let sphere = Tracker::sphere(Array2::zeros((1, 2)), props, SphereStyle::default()).unwrap();
        assert!(matches!(sphere.plot(None), Err(TrackError::InvalidDimension(_))));
    }

    #[test]
    fn test_extent_union() {
        let a = Extent {
            min: DVector::from_vec(vec![0.0, 0.0]),
            max: DVector::from_vec(vec![1.0, 1.0]),
        };
        let joined = Extent::empty(2).union(&a).unwrap();
        assert_eq!(joined, a);
        assert!(Extent::empty(3).union(&a).is_err());
    }
}

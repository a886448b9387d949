//! Named catalog scenarios and their standard figures.

use crate::catalog::{CatalogBuilder, CatalogConfig, HaloRole, SyntheticCatalog};
use crate::error::{SimError, SimResult};
use crate::tracers::TracerCatalog;
use serde_json::{json, Value};
use tracing::info;
use tracks_core::marker_funcs::{birth, death, infall, pericenter, INFALL_POS_KEY, INFALL_TIME_KEY, PERICENTER_KEY};
use tracks_core::storage::unwrap_positions;
use tracks_core::{
    Decoration, Decorator, Figure, Image, Marker, Movie, NameSource, PlotArgs, Tracker,
    DEPTH_PROP, INDEX_KEY, SNAP_TIME_KEY,
};

/// Tracers seeded per halo by [`ScenarioId::build`].
pub const TRACERS_PER_HALO: usize = 8;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// A host with field halos and nothing falling in
    LoneHost,

    /// One subhalo falling into the host
    MinorMerger,

    /// Subhalos that carry their own sub-subhalos
    NestedMerger,

    /// A merger whose host drifts across the periodic box edge
    BoxDrift,
}

impl ScenarioId {
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::LoneHost,
            ScenarioId::MinorMerger,
            ScenarioId::NestedMerger,
            ScenarioId::BoxDrift,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::LoneHost => "lone_host",
            ScenarioId::MinorMerger => "minor_merger",
            ScenarioId::NestedMerger => "nested_merger",
            ScenarioId::BoxDrift => "box_drift",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::LoneHost => "Isolated host, two field halos, empty merger tree",
            ScenarioId::MinorMerger => "Single subhalo accreted and possibly disrupted",
            ScenarioId::NestedMerger => "Three subhalos with two sub-subhalos each",
            ScenarioId::BoxDrift => "Merger drifting through the periodic boundary along x",
        }
    }

    /// Catalog parameters for this scenario.
    pub fn config(&self, seed: u64) -> CatalogConfig {
        let base = CatalogConfig {
            seed,
            ..Default::default()
        };
        match self {
            ScenarioId::LoneHost => CatalogConfig {
                subhalo_count: 0,
                ..base
            },
            ScenarioId::MinorMerger => CatalogConfig {
                subhalo_count: 1,
                field_halo_count: 0,
                ..base
            },
            ScenarioId::NestedMerger => CatalogConfig {
                subhalo_count: 3,
                subsubhalo_count: 2,
                ..base
            },
            ScenarioId::BoxDrift => CatalogConfig {
                host_center: [95.0, 50.0, 50.0],
                host_drift: [0.8, 0.0, 0.0],
                subhalo_count: 2,
                field_halo_count: 0,
                ..base
            },
        }
    }

    pub fn build(&self, seed: u64) -> SimResult<Scenario> {
        let catalog = CatalogBuilder::new(self.config(seed))?.build()?;
        let tracers = TracerCatalog::from_catalog(&catalog, TRACERS_PER_HALO)?;
        info!("Scenario {}: {}", self.name(), self.description());
        Ok(Scenario {
            id: *self,
            catalog,
            tracers,
        })
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lone_host" | "lonehost" => Ok(ScenarioId::LoneHost),
            "minor_merger" | "minormerger" => Ok(ScenarioId::MinorMerger),
            "nested_merger" | "nestedmerger" => Ok(ScenarioId::NestedMerger),
            "box_drift" | "boxdrift" => Ok(ScenarioId::BoxDrift),
            _ => Err(SimError::config(format!("unknown scenario: {}", s))),
        }
    }
}

// ============================================================================
// SCENARIO
// ============================================================================

/// A built scenario: halo catalog plus tracers.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: ScenarioId,
    pub catalog: SyntheticCatalog,
    pub tracers: TracerCatalog,
}

impl Scenario {
    /// The host's merger tree with marker properties attached, unwrapped
    /// across the box edge.
    pub fn tree_trackers(&self) -> SimResult<Vec<Tracker>> {
        let mut tree = self.catalog.tree()?;
        tree.storage_mut().set_tracker_custom(vec![
            SNAP_TIME_KEY.to_string(),
            INFALL_TIME_KEY.to_string(),
            INFALL_POS_KEY.to_string(),
            PERICENTER_KEY.to_string(),
        ]);
        let mut trackers = tree.traverse_tree(self.catalog.host_index(), usize::MAX, None)?;
        unwrap_positions(&mut trackers, self.catalog.simulation().box_size())?;
        Ok(trackers)
    }

    /// Static figure of the merger tree, colored by depth, with the final
    /// centre of mass as a decoration.
    pub fn image(&self) -> SimResult<Figure> {
        let trackers = self.tree_trackers()?;
        let mut centre = Decorator::new(final_centre, json_args(json!({"name": "centre"})));
        centre.set_plot_args(json_args(json!({"mode": "markers", "marker": {"symbol": "x"}})));

        let mut image = Image::new(trackers, vec![centre]);
        image.set_layout(json_args(json!({"title": self.id.description()})));
        let mut fig = image.figure()?;

        let visual = image.visual();
        visual.set_name(&mut fig, &NameSource::Property(INDEX_KEY.to_string()))?;
        visual.set_color(&mut fig, depth_color)?;
        visual.set_hover(&mut fig, &[("index", "%{customdata[4]}"), ("t", "%{customdata[0]:.2f}")])?;
        Ok(fig)
    }

    /// Animated merger tree with birth, death, infall and pericenter markers,
    /// one frame every `stride` snapshots.
    pub fn movie(&self, stride: usize) -> SimResult<Figure> {
        let trackers = self.tree_trackers()?;
        let markers = vec![
            Marker::new(birth, "birth", json_args(json!({"color": "green"}))),
            Marker::new(death, "death", json_args(json!({"color": "black"}))),
            Marker::new(infall, "infall", json_args(json!({"color": "blue"}))),
            Marker::new(pericenter, "pericenter", json_args(json!({"color": "red"}))),
        ];
        let mut movie = Movie::new(trackers, markers);
        let snaps: Vec<usize> = (0..self.catalog.simulation().snapshot_count())
            .step_by(stride.max(1))
            .collect();
        let frames = movie.create_frames(&snaps)?;
        let mut fig = movie.figure(frames);
        movie.visual().set_color(&mut fig, depth_color)?;
        Ok(fig)
    }

    /// Tracers of `halo` around its radius sphere.
    pub fn tracer_image(&self, halo: usize) -> SimResult<Figure> {
        let vines = self.tracers.vines()?;
        let mut trackers = vines.create_halo_tracks(halo, None)?;
        let mut sphere = vines.create_host_sphere(halo)?;
        let centre = self.catalog.storage()?.create_track(halo)?;
        sphere.set_pos(centre.positions().clone())?;
        sphere.set_plot_args(json_args(json!({"opacity": 0.3, "showscale": false})));
        trackers.push(sphere);
        Ok(Image::new(trackers, Vec::new()).figure()?)
    }

    /// Halos other than the tree members, selected by a box around the host.
    pub fn neighbours(&self, side_length: f64, min_snapshot_count: usize) -> SimResult<Vec<usize>> {
        let host = self.catalog.host_index();
        let last = self.catalog.simulation().snapshot_count() - 1;
        let pos = self.catalog.positions();
        let centre = [pos[[last, host, 0]], pos[[last, host, 1]], pos[[last, host, 2]]];
        let idxs = self
            .catalog
            .bush()?
            .box_indices(&centre, side_length, min_snapshot_count)?;
        Ok(idxs
            .into_iter()
            .filter(|&i| self.catalog.halos()[i].role == HaloRole::Field)
            .collect())
    }
}

fn json_args(value: Value) -> PlotArgs {
    match value {
        Value::Object(map) => map,
        _ => PlotArgs::new(),
    }
}

fn depth_color(trk: &Tracker) -> String {
    const PALETTE: [&str; 4] = ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728"];
    let depth = trk
        .prop(DEPTH_PROP)
        .ok()
        .and_then(|d| d.scalar_at(0))
        .unwrap_or(0.0) as usize;
    PALETTE[depth.min(PALETTE.len() - 1)].to_string()
}

/// Mean final alive position of the decorated trackers.
fn final_centre(trackers: &[&Tracker]) -> tracks_core::Result<Decoration> {
    let mut sum = [0.0; 3];
    let mut count = 0usize;
    for trk in trackers {
        let Some(last) = trk.get_alive().iter().rposition(|&a| a) else {
            continue;
        };
        let p = trk.position_at(last)?;
        for (acc, v) in sum.iter_mut().zip(p.iter()) {
            *acc += v;
        }
        count += 1;
    }
    if count == 0 {
        return Ok(Decoration::Static(PlotArgs::new()));
    }
    let mean = sum.map(|s| s / count as f64);
    Ok(Decoration::Static(json_args(json!({
        "x": [mean[0]], "y": [mean[1]], "z": [mean[2]]
    }))))
}

// ============================================================================
// TESTS
// ============================================================================

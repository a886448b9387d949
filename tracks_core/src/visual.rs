//! Figures - composing tracker, decorator and marker traces
//!
//! [`Image`] builds a static figure, [`Movie`] an animation with one frame
//! per snapshot. Both share [`Visual`], which restyles the traces that
//! belong to each tracker after the figure exists.
//!
//! Traces are matched to trackers through custom data: every tracker keeps
//! an `index` column, and a trace belongs to the tracker whose `index`
//! equals the value in that column of the trace's first row. Only the
//! leading tracker slots of a figure are matched, so decorator and marker
//! traces keep their own names and styles.

use crate::dataset::Selector;
use crate::error::{Result, TrackError};
use crate::marker::Marker;
use crate::decorator::Decorator;
use crate::trace::{field_to_json, merge_json, CustomValue, PlotArgs, Trace};
use crate::tracker::{Extent, Tracker, INDEX_KEY};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

// ============================================================================
// FIGURES
// ============================================================================

/// One animation frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub data: Vec<Trace>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Frame {
    /// True when no trace in the frame carries points.
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(Trace::is_empty)
    }
}

/// A renderer-native figure: traces, optional frames and layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<Frame>,

    pub layout: Value,

    /// Leading traces of `data` (and of each frame) drawn by trackers
    #[serde(skip)]
    tracker_slots: usize,
}

impl Figure {
    /// Static figure whose traces all belong to trackers.
    pub fn new(data: Vec<Trace>, layout: Value) -> Self {
        let tracker_slots = data.len();
        Self {
            data,
            frames: Vec::new(),
            layout,
            tracker_slots,
        }
    }

    /// Restrict restyling to the first `n` traces.
    pub fn with_tracker_slots(mut self, n: usize) -> Self {
        self.tracker_slots = n;
        self
    }

    pub fn tracker_slots(&self) -> usize {
        self.tracker_slots
    }

    pub fn is_animated(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Merge `patch` into every tracker trace whose first custom row holds
    /// `value` at `column`. Animated figures update their frames, static ones
    /// their data. Returns the number of traces updated.
    pub fn update_matching(&mut self, column: usize, value: &CustomValue, patch: &PlotArgs) -> usize {
        let n = self.tracker_slots;
        let traces: Box<dyn Iterator<Item = &mut Trace>> = if self.is_animated() {
            Box::new(self.frames.iter_mut().flat_map(move |f| f.data.iter_mut().take(n)))
        } else {
            Box::new(self.data.iter_mut().take(n))
        };
        let mut updated = 0;
        for trace in traces {
            if trace.first_custom(column) == Some(value) {
                trace.update(patch);
                updated += 1;
            }
        }
        updated
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

// ============================================================================
// VISUAL
// ============================================================================

/// Where [`Visual::set_name`] takes trace names from.
#[derive(Debug, Clone, PartialEq)]
pub enum NameSource {
    /// A tracker property, read at snapshot 0
    Property(String),
    /// One name per tracker
    List(Vec<String>),
}

/// The trackers behind a figure, and the operations restyling their traces.
#[derive(Debug, Clone, Default)]
pub struct Visual {
    trackers: Vec<Tracker>,
}

impl Visual {
    pub fn new(trackers: Vec<Tracker>) -> Self {
        Self { trackers }
    }

    pub fn trackers(&self) -> &[Tracker] {
        &self.trackers
    }

    pub fn trackers_mut(&mut self) -> &mut [Tracker] {
        &mut self.trackers
    }

    /// Register `keys` as the custom data of every tracker.
    ///
    /// The `index` column is appended when missing.
    pub fn include_data(&mut self, keys: &[&str]) {
        let mut keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        if !keys.iter().any(|k| k == INDEX_KEY) {
            keys.push(INDEX_KEY.to_string());
        }
        for trk in &mut self.trackers {
            trk.set_custom(keys.clone());
        }
    }

    fn ensure_index(&mut self) {
        for trk in &mut self.trackers {
            if trk.custom_index(INDEX_KEY).is_err() {
                let mut keys = trk.custom_keys().to_vec();
                keys.push(INDEX_KEY.to_string());
                trk.set_custom(keys);
            }
        }
    }

    /// Custom data column of `key`.
    pub fn data_index(&self, key: &str) -> Result<usize> {
        self.trackers
            .first()
            .ok_or_else(|| TrackError::unknown_property(key))?
            .custom_index(key)
    }

    /// Column and value identifying the traces of `trk`.
    fn selector(trk: &Tracker) -> Result<(usize, CustomValue)> {
        let column = trk.custom_index(INDEX_KEY)?;
        let value = CustomValue::from_row(trk.prop(INDEX_KEY)?, 0)
            .ok_or_else(|| TrackError::shape("tracker has no snapshots"))?;
        Ok((column, value))
    }

    /// Compute every patch first so a failure leaves the figure untouched.
    fn apply<F>(&self, fig: &mut Figure, mut patch_for: F) -> Result<()>
    where
        F: FnMut(usize, &Tracker) -> Result<PlotArgs>,
    {
        let mut updates = Vec::with_capacity(self.trackers.len());
        for (i, trk) in self.trackers.iter().enumerate() {
            let (column, value) = Self::selector(trk)?;
            updates.push((column, value, patch_for(i, trk)?));
        }
        for (column, value, patch) in updates {
            let n = fig.update_matching(column, &value, &patch);
            debug!("Restyled {} traces of tracker {}", n, value);
        }
        Ok(())
    }

    fn check_len(&self, what: &str, len: usize) -> Result<()> {
        if len != self.trackers.len() {
            return Err(TrackError::shape(format!(
                "{} {} given for {} trackers",
                len,
                what,
                self.trackers.len()
            )));
        }
        Ok(())
    }

    pub fn set_name(&self, fig: &mut Figure, source: &NameSource) -> Result<()> {
        if let NameSource::List(names) = source {
            self.check_len("names", names.len())?;
        }
        self.apply(fig, |i, trk| {
            let name = match source {
                NameSource::List(names) => names[i].clone(),
                NameSource::Property(prop) => CustomValue::from_row(trk.prop(prop)?, 0)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            };
            Ok(object(json!({ "name": name })))
        })
    }

    /// Line color per tracker, chosen by `color_of`.
    pub fn set_color(&self, fig: &mut Figure, color_of: impl Fn(&Tracker) -> String) -> Result<()> {
        self.apply(fig, |_, trk| Ok(object(json!({ "line": { "color": color_of(trk) } }))))
    }

    /// Color each tracker's line by `prop` over its alive snapshots.
    ///
    /// With a fixed `range`, the tracker alive earliest shows the color scale.
    pub fn set_colormap(
        &self,
        fig: &mut Figure,
        prop: &str,
        colorscales: &[Value],
        range: Option<(f64, f64)>,
        colorbar: Option<&Value>,
    ) -> Result<()> {
        self.check_len("colorscales", colorscales.len())?;
        let earliest = self
            .trackers
            .iter()
            .enumerate()
            .filter_map(|(i, t)| Some((t.get_alive().iter().position(|&a| a)?, i)))
            .min()
            .map(|(_, i)| i);

        self.apply(fig, |i, trk| {
            let alive = Selector::Mask(trk.get_alive());
            let mut line = object(json!({
                "color": field_to_json(&trk.get_prop(prop, &alive)?),
                "colorscale": colorscales[i],
            }));
            if let Some((cmin, cmax)) = range {
                line.insert("cmin".to_string(), json!(cmin));
                line.insert("cmax".to_string(), json!(cmax));
                if earliest == Some(i) {
                    line.insert("showscale".to_string(), json!(true));
                    if let Some(colorbar) = colorbar {
                        line.insert("colorbar".to_string(), colorbar.clone());
                    }
                }
            }
            Ok(object(json!({ "line": line })))
        })
    }

    /// Hover template built from `(label, format)` pairs, one per line.
    pub fn set_hover(&self, fig: &mut Figure, fields: &[(&str, &str)]) -> Result<()> {
        let text = fields
            .iter()
            .map(|(label, format)| format!("{}: {}", label, format))
            .collect::<Vec<_>>()
            .join("<br>");
        self.apply(fig, |_, _| Ok(object(json!({ "hovertemplate": text }))))
    }
}

fn object(value: Value) -> PlotArgs {
    match value {
        Value::Object(map) => map,
        _ => PlotArgs::new(),
    }
}

// ============================================================================
// IMAGE
// ============================================================================

/// A static figure of full tracker histories plus decorations.
#[derive(Debug)]
pub struct Image {
    visual: Visual,
    decorators: Vec<Decorator>,
    layout: PlotArgs,
}

impl Image {
    pub fn new(trackers: Vec<Tracker>, decorators: Vec<Decorator>) -> Self {
        let mut visual = Visual::new(trackers);
        visual.ensure_index();
        Self {
            visual,
            decorators,
            layout: PlotArgs::new(),
        }
    }

    pub fn visual(&self) -> &Visual {
        &self.visual
    }

    pub fn visual_mut(&mut self) -> &mut Visual {
        &mut self.visual
    }

    pub fn set_layout(&mut self, layout: PlotArgs) {
        for (key, value) in layout {
            merge_json(self.layout.entry(key).or_insert(Value::Null), &value);
        }
    }

    pub fn num_trackers(&self) -> usize {
        self.visual.trackers.len()
    }

    /// Tracker traces over all alive snapshots, then decorator traces at the
    /// last snapshot.
    pub fn figure(&mut self) -> Result<Figure> {
        let trackers = &self.visual.trackers;
        let mut data = Vec::with_capacity(trackers.len() + self.decorators.len());
        for trk in trackers {
            data.push(trk.plot(None)?);
        }
        let layout = Value::Object(self.layout.clone());
        let last = match trackers.first().map(|t| t.snapshot_count().checked_sub(1)) {
            Some(None) => {
                debug!("No snapshots to decorate");
                return Ok(Figure::new(data, layout));
            }
            last => last.flatten(),
        };
        for deco in &mut self.decorators {
            data.push(deco.decorate_plot(trackers, last)?);
        }
        Ok(Figure::new(data, layout).with_tracker_slots(trackers.len()))
    }
}

// ============================================================================
// MOVIE
// ============================================================================

const AXIS_NAMES: [&str; 3] = ["xaxis", "yaxis", "zaxis"];

/// An animation with one frame per snapshot.
#[derive(Debug)]
pub struct Movie {
    visual: Visual,
    markers: Vec<Marker>,
    layout: PlotArgs,
}

impl Movie {
    /// Movie with 30 ms frames and no transitions.
    pub fn new(trackers: Vec<Tracker>, markers: Vec<Marker>) -> Self {
        Self::with_durations(trackers, markers, 30.0, 0.0)
    }

    pub fn with_durations(
        trackers: Vec<Tracker>,
        markers: Vec<Marker>,
        frame_duration: f64,
        transition_duration: f64,
    ) -> Self {
        let mut visual = Visual::new(trackers);
        visual.ensure_index();
        let mut movie = Self {
            visual,
            markers,
            layout: PlotArgs::new(),
        };
        let play = json!({
            "label": "Play",
            "method": "animate",
            "args": [null, {
                "frame": {"duration": frame_duration, "redraw": true},
                "transition": {"duration": transition_duration}
            }]
        });
        movie.set_menu(vec![play], Vec::new());
        movie.set_scene(object(json!({"aspectratio": {"x": 1, "y": 1, "z": 1}})));
        movie
    }

    pub fn visual(&self) -> &Visual {
        &self.visual
    }

    pub fn visual_mut(&mut self) -> &mut Visual {
        &mut self.visual
    }

    pub fn layout(&self) -> &PlotArgs {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: PlotArgs) {
        for (key, value) in layout {
            merge_json(self.layout.entry(key).or_insert(Value::Null), &value);
        }
    }

    pub fn set_scene(&mut self, scene: PlotArgs) {
        let mut patch = PlotArgs::new();
        patch.insert("scene".to_string(), Value::Object(scene));
        self.set_layout(patch);
    }

    /// Replace the animation buttons and sliders.
    pub fn set_menu(&mut self, buttons: Vec<Value>, sliders: Vec<Value>) {
        self.layout.insert(
            "updatemenus".to_string(),
            json!([{ "type": "buttons", "buttons": buttons }]),
        );
        self.layout.insert("sliders".to_string(), Value::Array(sliders));
    }

    /// One frame per snapshot in `snapshots`.
    ///
    /// A frame shows every tracker alive somewhere in `[snapshots[0], snap]`
    /// over that window, and an empty trace for the rest so every frame has
    /// the same trace slots. Markers see only the trackers shown. Frames
    /// without any points are dropped. The scene axes are fixed to the
    /// combined extent of everything shown.
    pub fn create_frames(&mut self, snapshots: &[usize]) -> Result<Vec<Frame>> {
        let Some(&first) = snapshots.first() else {
            return Ok(Vec::new());
        };
        let mut extent: Option<Extent> = None;
        let mut frames = Vec::with_capacity(snapshots.len());

        for &snap in snapshots {
            let window = Selector::Range(first..snap + 1);
            let mut data = Vec::new();
            let mut extant = Vec::new();

            for trk in &self.visual.trackers {
                if trk.selected_snapshots(Some(&window))?.is_empty() {
                    data.push(trk.empty_trace());
                    continue;
                }
                data.push(trk.plot(Some(&window))?);
                let ext = trk.get_axes(Some(&window))?;
                extent = Some(match extent {
                    Some(acc) => acc.union(&ext)?,
                    None => ext,
                });
                extant.push(trk);
            }
            if !extant.is_empty() {
                for marker in &self.markers {
                    data.push(marker.plot(extant.iter().copied(), snap)?);
                }
            }

            let frame = Frame {
                data,
                name: Some(snap.to_string()),
            };
            if frame.is_empty() {
                debug!("Dropping empty frame at snapshot {}", snap);
                continue;
            }
            frames.push(frame);
        }

        if let Some(extent) = extent.filter(|e| !e.is_empty()) {
            let mut scene = PlotArgs::new();
            for (axis, name) in AXIS_NAMES.iter().enumerate().take(extent.dim()) {
                scene.insert(
                    name.to_string(),
                    json!({ "range": [extent.min[axis], extent.max[axis]], "autorange": false }),
                );
            }
            self.set_scene(scene);
        }
        Ok(frames)
    }

    /// Animated figure whose initial data is the first frame.
    pub fn figure(&self, frames: Vec<Frame>) -> Figure {
        let data = frames.first().map(|f| f.data.clone()).unwrap_or_default();
        Figure {
            data,
            frames,
            layout: Value::Object(self.layout.clone()),
            tracker_slots: self.visual.trackers.len(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorator::Decoration;
    use crate::marker_funcs::birth;
    use crate::trace::Coords;
    use indexmap::IndexMap;
    use ndarray::{arr1, Array2};

    /// Tracker `index` alive from snapshot `born` to the end of 4 snapshots.
    fn tracker(index: i64, born: usize) -> Tracker {
        let pos = Array2::from_shape_fn((4, 3), |(s, a)| {
            if s >= born {
                (index * 10 + s as i64) as f64 + a as f64
            } else {
                f64::NAN
            }
        });
        let mut props = IndexMap::new();
        props.insert(INDEX_KEY.to_string(), arr1(&[index; 4]).into());
        props.insert("mass".to_string(), arr1(&[1.0, 2.0, 3.0, 4.0]).into());
        Tracker::trajectory(pos, props).unwrap()
    }

    fn image() -> Image {
        Image::new(vec![tracker(0, 0), tracker(1, 2)], Vec::new())
    }

    #[test]
    fn test_image_adds_index_column() {
        let mut img = image();
        assert_eq!(img.num_trackers(), 2);
        assert_eq!(img.visual().data_index(INDEX_KEY).unwrap(), 0);

        let fig = img.figure().unwrap();
        assert_eq!(fig.data.len(), 2);
        assert_eq!(fig.data[1].first_custom(0), Some(&CustomValue::Int(1)));
        assert!(!fig.is_animated());
    }

    #[test]
    fn test_include_data_keeps_index_last() {
        let mut visual = Visual::new(vec![tracker(0, 0), tracker(1, 1)]);
        visual.include_data(&["mass"]);
        assert_eq!(visual.data_index("mass").unwrap(), 0);
        assert_eq!(visual.data_index(INDEX_KEY).unwrap(), 1);
        assert!(visual.data_index("missing").is_err());

        let trace = visual.trackers()[1].plot(None).unwrap();
        assert_eq!(
            trace.customdata.unwrap().rows()[0],
            vec![CustomValue::Float(2.0), CustomValue::Int(1)]
        );
    }

    #[test]
    fn test_image_decorators_plot_last_snapshot() {
        let deco = Decorator::new(
            |trks| {
                Ok(Decoration::PerSnapshot(
                    (0..4)
                        .map(|s| object(json!({"name": format!("{} at {}", trks.len(), s)})))
                        .collect(),
                ))
            },
            PlotArgs::new(),
        );
        let mut img = Image::new(vec![tracker(0, 0)], vec![deco]);
        let fig = img.figure().unwrap();
        assert_eq!(fig.data[1].name.as_deref(), Some("1 at 3"));
    }

    #[test]
    fn test_set_name_checks_length_before_touching() {
        let mut img = image();
        let mut fig = img.figure().unwrap();
        let before = fig.clone();

        let err = img
            .visual()
            .set_name(&mut fig, &NameSource::List(vec!["only one".to_string()]))
            .unwrap_err();
        assert!(matches!(err, TrackError::ShapeMismatch(_)));
        assert_eq!(fig, before);

        img.visual()
            .set_name(&mut fig, &NameSource::List(vec!["a".to_string(), "b".to_string()]))
            .unwrap();
        assert_eq!(fig.data[1].name.as_deref(), Some("b"));

        img.visual()
            .set_name(&mut fig, &NameSource::Property("mass".to_string()))
            .unwrap();
        assert_eq!(fig.data[0].name.as_deref(), Some("1"));
    }

    #[test]
    fn test_set_color_and_hover() {
        let mut img = image();
        let mut fig = img.figure().unwrap();
        img.visual()
            .set_color(&mut fig, |trk| {
                if trk.get_alive()[0] { "red".to_string() } else { "blue".to_string() }
            })
            .unwrap();
        assert_eq!(fig.data[0].style["line"]["color"], json!("red"));
        assert_eq!(fig.data[1].style["line"]["color"], json!("blue"));

        img.visual()
            .set_hover(&mut fig, &[("mass", "%{customdata[0]}"), ("t", "%{x}")])
            .unwrap();
        assert_eq!(
            fig.data[0].style["hovertemplate"],
            json!("mass: %{customdata[0]}<br>t: %{x}")
        );
    }

    #[test]
    fn test_colormap_scale_on_earliest_tracker() {
        let mut img = image();
        let mut fig = img.figure().unwrap();
        let scales = vec![json!("Viridis"), json!("Plasma")];
        img.visual()
            .set_colormap(&mut fig, "mass", &scales, Some((0.0, 4.0)), Some(&json!({"title": "M"})))
            .unwrap();

        let line0 = &fig.data[0].style["line"];
        assert_eq!(line0["showscale"], json!(true));
        assert_eq!(line0["colorbar"], json!({"title": "M"}));
        assert_eq!(line0["color"], json!([1.0, 2.0, 3.0, 4.0]));

        let line1 = &fig.data[1].style["line"];
        assert!(line1.get("showscale").is_none());
        assert_eq!(line1["color"], json!([3.0, 4.0]));
        assert_eq!(line1["colorscale"], json!("Plasma"));

        assert!(img
            .visual()
            .set_colormap(&mut fig, "mass", &scales[..1], None, None)
            .is_err());
    }

    #[test]
    fn test_movie_frames_use_inclusive_window() {
        let mut movie = Movie::new(
            vec![tracker(0, 0), tracker(1, 2)],
            vec![Marker::new(birth, "birth", PlotArgs::new())],
        );
        let frames = movie.create_frames(&[0, 1, 2, 3]).unwrap();
        assert_eq!(frames.len(), 4);

        // tracker slots, then the marker
        assert_eq!(frames[0].data.len(), 3);
        assert_eq!(frames[0].data[0].x, Some(Coords::Line(vec![0.0])));
        assert!(frames[0].data[1].is_empty());
        assert_eq!(frames[2].data[1].x, Some(Coords::Line(vec![12.0])));
        assert_eq!(frames[3].data[0].x.as_ref().map(|c| match c {
            Coords::Line(v) => v.len(),
            Coords::Grid(g) => g.len(),
        }), Some(4));
        assert_eq!(frames[3].name.as_deref(), Some("3"));

        let scene = &movie.layout()["scene"];
        assert_eq!(scene["xaxis"], json!({"range": [0.0, 13.0], "autorange": false}));
        assert_eq!(scene["aspectratio"]["x"], json!(1));
    }

    #[test]
    fn test_restyle_leaves_marker_traces_alone() {
        let mut movie = Movie::new(
            vec![tracker(0, 0)],
            vec![Marker::new(birth, "birth", PlotArgs::new())],
        );
        let frames = movie.create_frames(&[0, 1]).unwrap();
        let mut fig = movie.figure(frames);
        assert_eq!(fig.tracker_slots(), 1);
        // the birth marker row belongs to tracker 0 as well
        assert_eq!(fig.frames[0].data[1].first_custom(0), Some(&CustomValue::Int(0)));

        movie
            .visual()
            .set_name(&mut fig, &NameSource::List(vec!["host".to_string()]))
            .unwrap();
        movie.visual().set_color(&mut fig, |_| "red".to_string()).unwrap();
        assert_eq!(fig.frames[0].data[0].name.as_deref(), Some("host"));
        assert_eq!(fig.frames[0].data[1].name.as_deref(), Some("birth"));
        assert!(fig.frames[0].data[1].style.get("line").is_none());
    }

    #[test]
    fn test_image_without_snapshots_has_empty_traces() {
        let empty = Tracker::trajectory(Array2::zeros((0, 3)), IndexMap::new()).unwrap();
        let deco = Decorator::new(|_| Ok(Decoration::Static(PlotArgs::new())), PlotArgs::new());
        let mut img = Image::new(vec![empty], vec![deco]);
        let fig = img.figure().unwrap();
        assert_eq!(fig.data.len(), 1);
        assert!(fig.data[0].is_empty());
    }

    #[test]
    fn test_movie_drops_empty_frames() {
        let mut movie = Movie::new(vec![tracker(0, 2)], Vec::new());
        let frames = movie.create_frames(&[1, 2, 3]).unwrap();
        let names: Vec<_> = frames.iter().filter_map(|f| f.name.clone()).collect();
        assert_eq!(names, vec!["2".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_animated_restyle_updates_frames() {
        let mut movie = Movie::new(vec![tracker(0, 0)], Vec::new());
        let frames = movie.create_frames(&[0, 1]).unwrap();
        let mut fig = movie.figure(frames);
        assert!(fig.is_animated());
        assert_eq!(fig.data.len(), 1);

        movie
            .visual()
            .set_name(&mut fig, &NameSource::List(vec!["host".to_string()]))
            .unwrap();
        assert!(fig.frames.iter().all(|f| f.data[0].name.as_deref() == Some("host")));
        assert_eq!(fig.data[0].name, None);

        let value = fig.to_json().unwrap();
        assert_eq!(value["layout"]["updatemenus"][0]["buttons"][0]["label"], json!("Play"));
        assert_eq!(value["frames"][1]["name"], json!("1"));
    }
}

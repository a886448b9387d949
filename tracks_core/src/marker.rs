//! Event markers
//!
//! A [`Marker`] applies a mark function to every marker-compatible tracker
//! at one snapshot and collects the resulting points into a single
//! `markers` trace. Mark functions return a NaN placeholder when the event
//! is not visible yet; placeholders are dropped together with their custom
//! data rows.

use crate::error::{Result, TrackError};
use crate::trace::{CustomData, CustomValue, PlotArgs, Trace, TraceKind};
use crate::tracker::Tracker;
use nalgebra::DVector;
use ndarray::Array2;
use serde_json::Value;
use std::fmt;

/// One marked point and the custom data row that travels with it.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkPoint {
    pub position: DVector<f64>,
    pub custom: Vec<CustomValue>,
}

impl MarkPoint {
    pub fn new(position: DVector<f64>, custom: Vec<CustomValue>) -> Self {
        Self { position, custom }
    }

    /// NaN position matching the tracker's dimension.
    pub fn placeholder(tracker: &Tracker, custom: Vec<CustomValue>) -> Self {
        Self {
            position: DVector::from_element(tracker.dim(), f64::NAN),
            custom,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.position.iter().next().map_or(true, |v| v.is_nan())
    }
}

/// Mark function: tracker and snapshot to a point or placeholder.
pub type MarkFn = Box<dyn Fn(&Tracker, usize) -> Result<MarkPoint>>;

pub struct Marker {
    func: MarkFn,
    name: String,
    plot_props: PlotArgs,
}

impl Marker {
    pub fn new(
        func: impl Fn(&Tracker, usize) -> Result<MarkPoint> + 'static,
        name: impl Into<String>,
        plot_props: PlotArgs,
    ) -> Self {
        Self {
            func: Box::new(func),
            name: name.into(),
            plot_props,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Set one `marker` style property.
    pub fn set_plot_prop(&mut self, key: impl Into<String>, value: Value) {
        self.plot_props.insert(key.into(), value);
    }

    pub fn set_plot_props(&mut self, props: PlotArgs) {
        self.plot_props.extend(props);
    }

    pub fn empty_trace(&self) -> Trace {
        Trace::empty(TraceKind::Scatter3d)
    }

    /// Marker trace over the marker-compatible trackers at `snap`.
    ///
    /// Custom data columns follow the first tracker's registered keys.
    pub fn plot<'a>(
        &self,
        trackers: impl IntoIterator<Item = &'a Tracker>,
        snap: usize,
    ) -> Result<Trace> {
        let compatible: Vec<&Tracker> = trackers
            .into_iter()
            .filter(|t| t.marker_compatible())
            .collect();
        let Some(first) = compatible.first() else {
            return Ok(self.empty_trace());
        };
        let dim = first.dim();
        let keys = first.custom_keys().to_vec();

        let mut coords = Vec::new();
        let mut customdata = CustomData::new(keys);
        for &trk in &compatible {
            let point = (self.func)(trk, snap)?;
            if point.position.len() != dim {
                return Err(TrackError::shape(format!(
                    "marker '{}' mixes {}D and {}D points",
                    self.name,
                    dim,
                    point.position.len()
                )));
            }
            if point.is_placeholder() {
                continue;
            }
            coords.extend(point.position.iter().copied());
            if !customdata.keys().is_empty() {
                customdata.push_row(point.custom)?;
            }
        }

        let npoints = coords.len() / dim;
        let pos = Array2::from_shape_vec((npoints, dim), coords)
            .map_err(|e| TrackError::shape(e.to_string()))?;
        let mut trace = Trace::from_positions(pos.view())?;
        trace.mode = Some("markers".to_string());
        trace.name = Some(self.name.clone());
        trace
            .style
            .insert("marker".to_string(), Value::Object(self.plot_props.clone()));
        if !customdata.keys().is_empty() {
            trace.customdata = Some(customdata);
        }
        Ok(trace)
    }
}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Marker")
            .field("name", &self.name)
            .field("plot_props", &self.plot_props)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker_funcs::birth;
    use crate::trace::Coords;
    use crate::tracker::{SphereStyle, INDEX_KEY};
    use indexmap::IndexMap;
    use ndarray::{arr1, arr2};
    use serde_json::json;

    fn tracker(pos: Array2<f64>, index: i64) -> Tracker {
        let n = pos.nrows();
        let mut props = IndexMap::new();
        props.insert(INDEX_KEY.to_string(), arr1(&vec![index; n]).into());
        let mut trk = Tracker::trajectory(pos, props).unwrap();
        trk.set_custom(vec![INDEX_KEY.to_string()]);
        trk
    }

    #[test]
    fn test_plot_drops_placeholders_with_their_custom_rows() {
        let nan = f64::NAN;
        let early = tracker(arr2(&[[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]]), 0);
        let late = tracker(arr2(&[[nan, nan, nan], [5.0, 5.0, 5.0]]), 1);
        let mut marker = Marker::new(birth, "birth", PlotArgs::new());
        marker.set_plot_prop("size", json!(4));

        let trace = marker.plot([&early, &late], 0).unwrap();
        assert_eq!(trace.x, Some(Coords::Line(vec![1.0])));
        let cdata = trace.customdata.as_ref().unwrap();
        assert_eq!(cdata.rows(), &[vec![CustomValue::Int(0)]]);
        assert_eq!(trace.style["marker"], json!({"size": 4}));
        assert_eq!(trace.name.as_deref(), Some("birth"));

        let trace = marker.plot([&early, &late], 1).unwrap();
        assert_eq!(trace.x, Some(Coords::Line(vec![1.0, 5.0])));
        assert_eq!(trace.customdata.unwrap().len(), 2);
    }

    #[test]
    fn test_plot_without_compatible_trackers_is_empty() {
        let mut props = IndexMap::new();
        props.insert("R200m".to_string(), arr1(&[1.0]).into());
        let sphere = Tracker::sphere(Array2::zeros((1, 3)), props, SphereStyle::default()).unwrap();
        let marker = Marker::new(birth, "birth", PlotArgs::new());
        let trace = marker.plot([&sphere], 0).unwrap();
        assert!(trace.is_empty());
        assert_eq!(trace.mode, None);
    }

    #[test]
    fn test_plot_2d_positions() {
        let flat = tracker(arr2(&[[1.0, 2.0]]), 3);
        let marker = Marker::new(birth, "birth", PlotArgs::new());
        let trace = marker.plot([&flat], 0).unwrap();
        assert_eq!(trace.kind, TraceKind::Scatter);
        assert_eq!(trace.z, None);
    }

    #[test]
    fn test_all_placeholders_give_empty_markers_trace() {
        let nan = f64::NAN;
        let dead = tracker(arr2(&[[nan, nan, nan]]), 0);
        let marker = Marker::new(birth, "birth", PlotArgs::new());
        let trace = marker.plot([&dead], 0).unwrap();
        assert!(trace.is_empty());
        assert_eq!(trace.mode.as_deref(), Some("markers"));
        assert_eq!(trace.customdata.map(|c| c.len()), Some(0));
    }
}

//! Renderer payloads
//!
//! A [`Trace`] is the hand-off point to the external plotting toolkit. It
//! serializes to a plotly-shaped JSON object (`type`, `mode`, coordinates,
//! `customdata` and arbitrary style keys) and never draws anything itself.
//!
//! Custom data travels as [`CustomData`]: one row per plotted point, one
//! column per registered property key, in registration order. Hover and
//! selection logic index into rows by that column position.

use crate::dataset::FieldData;
use crate::error::{Result, TrackError};
use ndarray::{ArrayView2, Axis};
use serde::ser::Serializer;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Free-form style arguments forwarded to the renderer.
pub type PlotArgs = Map<String, Value>;

/// Plot types understood by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Scatter,
    Scatter3d,
    Surface,
}

impl TraceKind {
    /// Scatter kind matching a position dimension.
    pub fn for_dim(dim: usize) -> Result<Self> {
        match dim {
            2 => Ok(TraceKind::Scatter),
            3 => Ok(TraceKind::Scatter3d),
            d => Err(TrackError::dimension(format!(
                "positions must be 2D or 3D, got {}D",
                d
            ))),
        }
    }
}

// ============================================================================
// CUSTOM DATA
// ============================================================================

/// One cell of custom data. Vector properties become tuples.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CustomValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Tuple(Vec<CustomValue>),
}

impl CustomValue {
    /// The value of `data` at `row` of its leading (snapshot) axis.
    pub fn from_row(data: &FieldData, row: usize) -> Option<Self> {
        if data.ndim() == 0 || row >= data.len_of(0) {
            return None;
        }
        let cell = match data {
            FieldData::Float(a) => {
                let view = a.index_axis(Axis(0), row);
                if view.ndim() == 0 {
                    CustomValue::Float(view.iter().copied().next()?)
                } else {
                    CustomValue::Tuple(view.iter().map(|&v| CustomValue::Float(v)).collect())
                }
            }
            FieldData::Int(a) => {
                let view = a.index_axis(Axis(0), row);
                if view.ndim() == 0 {
                    CustomValue::Int(view.iter().copied().next()?)
                } else {
                    CustomValue::Tuple(view.iter().map(|&v| CustomValue::Int(v)).collect())
                }
            }
            FieldData::Bool(a) => {
                let view = a.index_axis(Axis(0), row);
                if view.ndim() == 0 {
                    CustomValue::Bool(view.iter().copied().next()?)
                } else {
                    CustomValue::Tuple(view.iter().map(|&v| CustomValue::Bool(v)).collect())
                }
            }
        };
        Some(cell)
    }
}

impl fmt::Display for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomValue::Float(v) => write!(f, "{}", v),
            CustomValue::Int(v) => write!(f, "{}", v),
            CustomValue::Bool(v) => write!(f, "{}", v),
            CustomValue::Tuple(values) => {
                write!(f, "(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Row-major table of custom values with named columns.
///
/// Serializes as a bare array of rows, which is what the renderer expects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomData {
    keys: Vec<String>,
    rows: Vec<Vec<CustomValue>>,
}

impl CustomData {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            rows: Vec::new(),
        }
    }

    /// Append a row; it must have one cell per key.
    pub fn push_row(&mut self, row: Vec<CustomValue>) -> Result<()> {
        if row.len() != self.keys.len() {
            return Err(TrackError::shape(format!(
                "custom data row has {} cells for {} keys",
                row.len(),
                self.keys.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn rows(&self) -> &[Vec<CustomValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column position of `key`.
    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&CustomValue> {
        self.rows.get(row)?.get(column)
    }
}

impl Serialize for CustomData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.rows.serialize(serializer)
    }
}

// ============================================================================
// TRACE
// ============================================================================

/// Coordinates of a trace: a flat list for scatter plots, a grid for surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Coords {
    Line(Vec<f64>),
    Grid(Vec<Vec<f64>>),
}

impl Coords {
    pub fn is_empty(&self) -> bool {
        match self {
            Coords::Line(v) => v.is_empty(),
            Coords::Grid(g) => g.is_empty(),
        }
    }
}

/// A renderer-native trace description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: TraceKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Coords>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Coords>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<Coords>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub customdata: Option<CustomData>,

    /// Everything else: `line`, `marker`, `hovertemplate`, ...
    #[serde(flatten)]
    pub style: PlotArgs,
}

impl Trace {
    /// A placeholder trace with no data.
    ///
    /// Animations need one trace per slot in every frame, so absent objects
    /// are represented by these instead of being left out.
    pub fn empty(kind: TraceKind) -> Self {
        Self {
            kind,
            mode: None,
            name: None,
            x: None,
            y: None,
            z: None,
            customdata: None,
            style: PlotArgs::new(),
        }
    }

    /// A scatter trace through the rows of `positions` (2D or 3D).
    pub fn from_positions(positions: ArrayView2<f64>) -> Result<Self> {
        let dim = positions.ncols();
        let mut trace = Self::empty(TraceKind::for_dim(dim)?);
        let column = |c: usize| Some(Coords::Line(positions.column(c).to_vec()));
        trace.x = column(0);
        trace.y = column(1);
        if dim == 3 {
            trace.z = column(2);
        }
        Ok(trace)
    }

    /// True when the trace carries no points.
    pub fn is_empty(&self) -> bool {
        let missing = |c: &Option<Coords>| c.as_ref().map_or(true, Coords::is_empty);
        missing(&self.x) && !self.style.contains_key("x")
    }

    /// Merge `patch` into the trace, recursing into nested objects.
    pub fn update(&mut self, patch: &PlotArgs) {
        for (key, value) in patch {
            match (key.as_str(), value) {
                ("name", Value::String(name)) => self.name = Some(name.clone()),
                ("mode", Value::String(mode)) => self.mode = Some(mode.clone()),
                _ => merge_json(self.style.entry(key.clone()).or_insert(Value::Null), value),
            }
        }
    }

    /// Cell of the first custom data row at `column`.
    pub fn first_custom(&self, column: usize) -> Option<&CustomValue> {
        self.customdata.as_ref()?.cell(0, column)
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Recursive merge of `src` into `target`; objects merge key by key,
/// everything else is replaced.
pub(crate) fn merge_json(target: &mut Value, src: &Value) {
    match (target, src) {
        (Value::Object(target), Value::Object(src)) => {
            for (key, value) in src {
                merge_json(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, src) => *target = src.clone(),
    }
}

/// JSON array of a field's values, flattened.
pub(crate) fn field_to_json(data: &FieldData) -> Value {
    match data {
        FieldData::Float(a) => Value::Array(a.iter().map(|&v| Value::from(v)).collect()),
        FieldData::Int(a) => Value::Array(a.iter().map(|&v| Value::from(v)).collect()),
        FieldData::Bool(a) => Value::Array(a.iter().map(|&v| Value::from(v)).collect()),
    }
}

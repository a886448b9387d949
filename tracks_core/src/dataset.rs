//! Datasets - named N-dimensional arrays with explicitly tagged axes
//!
//! Every field carries a role per axis (`Time`, `Object` or `Free`), so
//! slicing never depends on array lengths happening to differ. Length-based
//! inference is still available through [`Field::infer`], which refuses to
//! guess when the snapshot and object counts coincide.
//!
//! A [`Dataset`] is either a mapping of independent columns or a structured
//! record array whose fields all share a leading record shape. Both expose
//! the same [`FieldAccess`] capability.

use crate::error::{Result, TrackError};
use indexmap::IndexMap;
use ndarray::{Array, ArrayD, Axis, Dimension, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

// ============================================================================
// AXIS ROLES & DTYPES
// ============================================================================

/// Role of a single array axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisRole {
    /// One entry per simulation snapshot
    Time,
    /// One entry per tracked object (halo or tracer)
    Object,
    /// Any other axis (spatial components, vector properties)
    Free,
}

/// Element type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dtype {
    Float,
    Int,
    Bool,
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dtype::Float => "f64",
            Dtype::Int => "i64",
            Dtype::Bool => "bool",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// SELECTORS
// ============================================================================

/// Ways of indexing one axis of an array.
///
/// `Index` drops the axis from the result, every other variant keeps it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Selector {
    /// The full axis
    #[default]
    All,
    /// A single position; the axis is removed
    Index(usize),
    /// Explicit positions, in the given order
    Indices(Vec<usize>),
    /// A half-open range, clipped to the axis length
    Range(Range<usize>),
    /// A boolean mask with one entry per position
    Mask(Vec<bool>),
}

/// A selector resolved against a concrete axis length.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolved {
    All,
    Scalar(usize),
    List(Vec<usize>),
}

impl Selector {
    pub(crate) fn resolve(&self, len: usize) -> Result<Resolved> {
        match self {
            Selector::All => Ok(Resolved::All),
            Selector::Index(index) => {
                if *index < len {
                    Ok(Resolved::Scalar(*index))
                } else {
                    Err(TrackError::IndexOutOfRange { index: *index, len })
                }
            }
            Selector::Indices(indices) => {
                if let Some(&index) = indices.iter().find(|&&i| i >= len) {
                    return Err(TrackError::IndexOutOfRange { index, len });
                }
                Ok(Resolved::List(indices.clone()))
            }
            Selector::Range(range) => {
                let start = range.start.min(len);
                let end = range.end.min(len).max(start);
                Ok(Resolved::List((start..end).collect()))
            }
            Selector::Mask(mask) => {
                if mask.len() != len {
                    return Err(TrackError::shape(format!(
                        "mask of length {} applied to axis of length {}",
                        mask.len(),
                        len
                    )));
                }
                Ok(Resolved::List(
                    mask.iter()
                        .enumerate()
                        .filter_map(|(i, &keep)| keep.then_some(i))
                        .collect(),
                ))
            }
        }
    }

    /// Positions selected on an axis of length `len`, in selection order.
    pub fn indices(&self, len: usize) -> Result<Vec<usize>> {
        Ok(match self.resolve(len)? {
            Resolved::All => (0..len).collect(),
            Resolved::Scalar(i) => vec![i],
            Resolved::List(list) => list,
        })
    }

    /// Boolean mask of the positions selected on an axis of length `len`.
    pub fn mask(&self, len: usize) -> Result<Vec<bool>> {
        let mut mask = vec![false; len];
        for i in self.indices(len)? {
            mask[i] = true;
        }
        Ok(mask)
    }
}

impl From<usize> for Selector {
    fn from(index: usize) -> Self {
        Selector::Index(index)
    }
}

impl From<Range<usize>> for Selector {
    fn from(range: Range<usize>) -> Self {
        Selector::Range(range)
    }
}

impl From<Vec<usize>> for Selector {
    fn from(indices: Vec<usize>) -> Self {
        Selector::Indices(indices)
    }
}

impl From<Vec<bool>> for Selector {
    fn from(mask: Vec<bool>) -> Self {
        Selector::Mask(mask)
    }
}

// ============================================================================
// FIELD DATA
// ============================================================================

/// A dynamically shaped array of one of the supported element types.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldData {
    Float(ArrayD<f64>),
    Int(ArrayD<i64>),
    Bool(ArrayD<bool>),
}

/// Apply the same array expression to whichever variant is present.
macro_rules! map_data {
    ($data:expr, $arr:ident => $body:expr) => {
        match $data {
            FieldData::Float($arr) => FieldData::Float($body),
            FieldData::Int($arr) => FieldData::Int($body),
            FieldData::Bool($arr) => FieldData::Bool($body),
        }
    };
}

fn broadcast_leading<T: Clone>(arr: ArrayD<T>, n: usize) -> Option<ArrayD<T>> {
    let mut shape = vec![n];
    shape.extend_from_slice(arr.shape());
    let expanded = arr.insert_axis(Axis(0));
    let out = expanded.broadcast(IxDyn(&shape)).map(|view| view.to_owned());
    out
}

impl FieldData {
    pub fn dtype(&self) -> Dtype {
        match self {
            FieldData::Float(_) => Dtype::Float,
            FieldData::Int(_) => Dtype::Int,
            FieldData::Bool(_) => Dtype::Bool,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            FieldData::Float(a) => a.shape(),
            FieldData::Int(a) => a.shape(),
            FieldData::Bool(a) => a.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Length of `axis`, or 0 when the axis does not exist.
    pub fn len_of(&self, axis: usize) -> usize {
        self.shape().get(axis).copied().unwrap_or(0)
    }

    /// Apply `sel` along `axis`. An `Index` selector removes the axis.
    pub fn select_axis(&self, axis: usize, sel: &Selector) -> Result<FieldData> {
        if axis >= self.ndim() {
            return Err(TrackError::dimension(format!(
                "axis {} of a {}-dimensional array",
                axis,
                self.ndim()
            )));
        }
        Ok(match sel.resolve(self.len_of(axis))? {
            Resolved::All => self.clone(),
            Resolved::Scalar(i) => map_data!(self, a => a.index_axis(Axis(axis), i).to_owned()),
            Resolved::List(idxs) => map_data!(self, a => a.select(Axis(axis), &idxs)),
        })
    }

    /// Reorder axes; `perm[k]` is the source axis that becomes axis `k`.
    pub fn permuted(self, perm: &[usize]) -> FieldData {
        map_data!(self, a => a.permuted_axes(IxDyn(perm)).as_standard_layout().into_owned())
    }

    /// Prepend an axis of length `n`, repeating the current contents along it.
    pub fn broadcast_leading(self, n: usize) -> Result<FieldData> {
        let shape = self.shape().to_vec();
        let out = match self {
            FieldData::Float(a) => broadcast_leading(a, n).map(FieldData::Float),
            FieldData::Int(a) => broadcast_leading(a, n).map(FieldData::Int),
            FieldData::Bool(a) => broadcast_leading(a, n).map(FieldData::Bool),
        };
        out.ok_or_else(|| {
            TrackError::shape(format!("cannot broadcast shape {:?} over {} snapshots", shape, n))
        })
    }

    /// Values converted to `f64` (booleans become 0 or 1).
    pub fn to_f64(&self) -> ArrayD<f64> {
        match self {
            FieldData::Float(a) => a.clone(),
            FieldData::Int(a) => a.mapv(|v| v as f64),
            FieldData::Bool(a) => a.mapv(|v| if v { 1.0 } else { 0.0 }),
        }
    }

    /// Values converted to `i64`. Boolean fields have no integer reading.
    pub fn to_i64(&self) -> Option<ArrayD<i64>> {
        match self {
            FieldData::Float(a) => Some(a.mapv(|v| v as i64)),
            FieldData::Int(a) => Some(a.clone()),
            FieldData::Bool(_) => None,
        }
    }

    /// Element-wise truth value (non-zero, non-NaN numbers are true).
    pub fn truthy(&self) -> ArrayD<bool> {
        match self {
            FieldData::Float(a) => a.mapv(|v| v != 0.0 && !v.is_nan()),
            FieldData::Int(a) => a.mapv(|v| v != 0),
            FieldData::Bool(a) => a.clone(),
        }
    }

    /// The scalar at `row` of a one-dimensional array, as `f64`.
    pub fn scalar_at(&self, row: usize) -> Option<f64> {
        if self.ndim() != 1 || row >= self.len_of(0) {
            return None;
        }
        Some(match self {
            FieldData::Float(a) => a[[row]],
            FieldData::Int(a) => a[[row]] as f64,
            FieldData::Bool(a) => {
                if a[[row]] {
                    1.0
                } else {
                    0.0
                }
            }
        })
    }

    /// All values under `row` of the leading axis, flattened, as `f64`.
    pub fn row_f64(&self, row: usize) -> Option<Vec<f64>> {
        if self.ndim() == 0 || row >= self.len_of(0) {
            return None;
        }
        let values = self.to_f64();
        let out = values.index_axis(Axis(0), row).iter().copied().collect();
        Some(out)
    }
}

impl<D: Dimension> From<Array<f64, D>> for FieldData {
    fn from(arr: Array<f64, D>) -> Self {
        FieldData::Float(arr.into_dyn())
    }
}

impl<D: Dimension> From<Array<i64, D>> for FieldData {
    fn from(arr: Array<i64, D>) -> Self {
        FieldData::Int(arr.into_dyn())
    }
}

impl<D: Dimension> From<Array<bool, D>> for FieldData {
    fn from(arr: Array<bool, D>) -> Self {
        FieldData::Bool(arr.into_dyn())
    }
}

// ============================================================================
// FIELD
// ============================================================================

/// An array together with the role of each of its axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    data: FieldData,
    axes: Vec<AxisRole>,
}

impl Field {
    /// Create a field with explicit axis roles.
    ///
    /// At most one axis may be `Time` and at most one `Object`.
    pub fn new(data: impl Into<FieldData>, axes: Vec<AxisRole>) -> Result<Self> {
        let data = data.into();
        if data.ndim() != axes.len() {
            return Err(TrackError::shape(format!(
                "{} axis roles given for a {}-dimensional array",
                axes.len(),
                data.ndim()
            )));
        }
        for role in [AxisRole::Time, AxisRole::Object] {
            if axes.iter().filter(|&&r| r == role).count() > 1 {
                return Err(TrackError::shape(format!("more than one {:?} axis", role)));
            }
        }
        Ok(Self { data, axes })
    }

    /// Tag axes by matching their lengths against the snapshot and object counts.
    ///
    /// Fails with [`TrackError::AmbiguousAxis`] when an axis length equals both.
    pub fn infer(
        name: &str,
        data: impl Into<FieldData>,
        snapshot_count: usize,
        object_count: usize,
    ) -> Result<Self> {
        let data = data.into();
        let mut axes = Vec::with_capacity(data.ndim());
        let mut seen_time = false;
        let mut seen_object = false;
        for (axis, &len) in data.shape().iter().enumerate() {
            let role = if len == snapshot_count && len == object_count {
                return Err(TrackError::AmbiguousAxis {
                    field: name.to_string(),
                    axis,
                    len,
                });
            } else if len == snapshot_count && !seen_time {
                seen_time = true;
                AxisRole::Time
            } else if len == object_count && !seen_object {
                seen_object = true;
                AxisRole::Object
            } else {
                AxisRole::Free
            };
            axes.push(role);
        }
        Self::new(data, axes)
    }

    pub fn data(&self) -> &FieldData {
        &self.data
    }

    pub fn into_data(self) -> FieldData {
        self.data
    }

    pub fn axes(&self) -> &[AxisRole] {
        &self.axes
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn dtype(&self) -> Dtype {
        self.data.dtype()
    }

    pub fn time_axis(&self) -> Option<usize> {
        self.axes.iter().position(|&r| r == AxisRole::Time)
    }

    pub fn object_axis(&self) -> Option<usize> {
        self.axes.iter().position(|&r| r == AxisRole::Object)
    }

    /// Length of the axis playing `role`, if the field has one.
    pub fn axis_len(&self, role: AxisRole) -> Option<usize> {
        self.axes
            .iter()
            .position(|&r| r == role)
            .map(|axis| self.data.len_of(axis))
    }

    /// Slice along the time and object axes.
    ///
    /// A field without a time axis ignores `time`; without an object axis it
    /// ignores `object`. `Free` axes are never sliced.
    pub fn slice(&self, time: &Selector, object: &Selector) -> Result<Field> {
        let mut data = self.data.clone();
        let mut axes = self.axes.clone();
        // Walk backwards so dropped axes do not shift the ones still to visit
        for axis in (0..axes.len()).rev() {
            let sel = match axes[axis] {
                AxisRole::Time => time,
                AxisRole::Object => object,
                AxisRole::Free => continue,
            };
            if matches!(sel, Selector::All) {
                continue;
            }
            data = data.select_axis(axis, sel)?;
            if matches!(sel, Selector::Index(_)) {
                axes.remove(axis);
            }
        }
        Ok(Field { data, axes })
    }

    /// Data with the time axis moved to the front.
    ///
    /// Fields without a time axis are repeated across `snapshot_count` snapshots.
    pub fn into_time_major(self, snapshot_count: usize) -> Result<FieldData> {
        match self.time_axis() {
            Some(0) => Ok(self.data),
            Some(t) => {
                let mut perm = vec![t];
                perm.extend((0..self.axes.len()).filter(|&a| a != t));
                Ok(self.data.permuted(&perm))
            }
            None => self.data.broadcast_leading(snapshot_count),
        }
    }

    /// Integer view of the field, failing for boolean fields.
    pub fn to_i64(&self, name: &str) -> Result<ArrayD<i64>> {
        self.data.to_i64().ok_or_else(|| TrackError::DtypeMismatch {
            field: name.to_string(),
            expected: Dtype::Int,
            found: self.dtype(),
        })
    }
}

// ============================================================================
// DATASETS
// ============================================================================

/// Named field lookup shared by every dataset backing.
pub trait FieldAccess {
    /// Look up a field, failing with [`TrackError::UnknownField`] when absent.
    fn field(&self, name: &str) -> Result<&Field>;

    /// Field names in insertion order.
    fn field_names(&self) -> Vec<&str>;

    fn contains(&self, name: &str) -> bool {
        self.field(name).is_ok()
    }
}

/// Independent named columns, each with its own shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns {
    fields: IndexMap<String, Field>,
}

impl Columns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a column.
    pub fn insert(&mut self, name: impl Into<String>, field: Field) {
        self.fields.insert(name.into(), field);
    }

    /// Builder-style [`Columns::insert`].
    pub fn with(mut self, name: impl Into<String>, field: Field) -> Self {
        self.insert(name, field);
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FieldAccess for Columns {
    fn field(&self, name: &str) -> Result<&Field> {
        self.fields
            .get(name)
            .ok_or_else(|| TrackError::unknown_field(name))
    }

    fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }
}

/// A structured record array.
///
/// All fields share the record shape as their leading axes (with the record
/// axis roles) and may add trailing `Free` axes, e.g. position components.
#[derive(Debug, Clone, PartialEq)]
pub struct Records {
    shape: Vec<usize>,
    axes: Vec<AxisRole>,
    fields: IndexMap<String, Field>,
}

impl Records {
    /// Create an empty record array with the given record shape and roles.
    pub fn new(shape: Vec<usize>, axes: Vec<AxisRole>) -> Result<Self> {
        if shape.len() != axes.len() {
            return Err(TrackError::shape(format!(
                "record shape {:?} with {} axis roles",
                shape,
                axes.len()
            )));
        }
        Ok(Self {
            shape,
            axes,
            fields: IndexMap::new(),
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Insert or replace a field; its leading axes must match the record shape.
    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<FieldData>) -> Result<()> {
        let name = name.into();
        let data = data.into();
        let leading = data.shape().get(..self.shape.len());
        if leading != Some(self.shape.as_slice()) {
            return Err(TrackError::shape(format!(
                "field '{}' has shape {:?}, records have shape {:?}",
                name,
                data.shape(),
                self.shape
            )));
        }
        let mut axes = self.axes.clone();
        axes.resize(data.ndim(), AxisRole::Free);
        self.fields.insert(name, Field::new(data, axes)?);
        Ok(())
    }

    /// Builder-style [`Records::insert`].
    pub fn with(mut self, name: impl Into<String>, data: impl Into<FieldData>) -> Result<Self> {
        self.insert(name, data)?;
        Ok(self)
    }
}

impl FieldAccess for Records {
    fn field(&self, name: &str) -> Result<&Field> {
        self.fields
            .get(name)
            .ok_or_else(|| TrackError::unknown_field(name))
    }

    fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }
}

/// The data behind a storage: independent columns or structured records.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Columns(Columns),
    Records(Records),
}

impl Dataset {
    /// Build a column dataset by inferring axis roles from lengths.
    ///
    /// The object count is taken from the non-time axis of the ID field.
    pub fn infer_columns(
        fields: IndexMap<String, FieldData>,
        snapshot_count: usize,
        id_key: &str,
    ) -> Result<Self> {
        let id = fields
            .get(id_key)
            .ok_or_else(|| TrackError::unknown_field(id_key))?;
        let object_lens: Vec<(usize, usize)> = id
            .shape()
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, len)| len != snapshot_count)
            .collect();
        let object_count = match object_lens.as_slice() {
            [(_, len)] => *len,
            [] => {
                return Err(TrackError::AmbiguousAxis {
                    field: id_key.to_string(),
                    axis: 0,
                    len: snapshot_count,
                })
            }
            _ => {
                return Err(TrackError::shape(format!(
                    "ID field '{}' has shape {:?}; expected one object axis",
                    id_key,
                    id.shape()
                )))
            }
        };

        let mut columns = Columns::new();
        for (name, data) in fields {
            let field = Field::infer(&name, data, snapshot_count, object_count)?;
            columns.insert(name, field);
        }
        Ok(Dataset::Columns(columns))
    }
}

impl FieldAccess for Dataset {
    fn field(&self, name: &str) -> Result<&Field> {
        match self {
            Dataset::Columns(c) => c.field(name),
            Dataset::Records(r) => r.field(name),
        }
    }

    fn field_names(&self) -> Vec<&str> {
        match self {
            Dataset::Columns(c) => c.field_names(),
            Dataset::Records(r) => r.field_names(),
        }
    }
}

impl From<Columns> for Dataset {
    fn from(columns: Columns) -> Self {
        Dataset::Columns(columns)
    }
}

impl From<Records> for Dataset {
    fn from(records: Records) -> Self {
        Dataset::Records(records)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array3};

    fn time_object_field() -> Field {
        // 3 objects x 4 snapshots, object-major
        let data = arr2(&[[0i64, 1, 2, 3], [10, 11, 12, 13], [20, 21, 22, 23]]);
        Field::new(data, vec![AxisRole::Object, AxisRole::Time]).unwrap()
    }

    #[test]
    fn test_unsliced_get_round_trips() {
        let field = time_object_field();
        let out = field.slice(&Selector::All, &Selector::All).unwrap();
        assert_eq!(out, field);
    }

    #[test]
    fn test_slice_follows_axis_roles() {
        let field = time_object_field();

        let one_object = field.slice(&Selector::All, &Selector::Index(1)).unwrap();
        assert_eq!(one_object.axes(), &[AxisRole::Time]);
        assert_eq!(one_object.data(), &FieldData::from(arr1(&[10i64, 11, 12, 13])));

        let one_snap = field.slice(&Selector::Index(2), &Selector::All).unwrap();
        assert_eq!(one_snap.data(), &FieldData::from(arr1(&[2i64, 12, 22])));

        let masked = field
            .slice(&Selector::Mask(vec![true, false, false, true]), &Selector::Index(2))
            .unwrap();
        assert_eq!(masked.data(), &FieldData::from(arr1(&[20i64, 23])));
    }

    #[test]
    fn test_slice_ignores_missing_axes() {
        let per_object = Field::new(arr1(&[1.5, 2.5, 3.5]), vec![AxisRole::Object]).unwrap();
        let out = per_object.slice(&Selector::Index(3), &Selector::Index(1)).unwrap();
        assert_eq!(out.data().scalar_at(0), None);
        assert_eq!(out.data().ndim(), 0);
        assert_eq!(out.data().to_f64().iter().copied().collect::<Vec<_>>(), vec![2.5]);
    }

    #[test]
    fn test_selector_bounds() {
        assert_eq!(
            Selector::Index(5).indices(3),
            Err(TrackError::IndexOutOfRange { index: 5, len: 3 })
        );
        assert!(matches!(
            Selector::Mask(vec![true]).indices(3),
            Err(TrackError::ShapeMismatch(_))
        ));
        assert_eq!(Selector::Range(1..10).indices(3).unwrap(), vec![1, 2]);
        assert_eq!(
            Selector::Indices(vec![2, 0]).mask(3).unwrap(),
            vec![true, false, true]
        );
    }

    #[test]
    fn test_infer_axes_by_length() {
        let pos = Array3::<f64>::zeros((5, 2, 3));
        let field = Field::infer("x", pos, 5, 2).unwrap();
        assert_eq!(
            field.axes(),
            &[AxisRole::Time, AxisRole::Object, AxisRole::Free]
        );
    }

    #[test]
    fn test_infer_rejects_equal_counts() {
        let ids = ndarray::Array2::<i64>::zeros((4, 4));
        let err = Field::infer("id", ids, 4, 4).unwrap_err();
        assert!(matches!(err, TrackError::AmbiguousAxis { axis: 0, len: 4, .. }));
    }

    #[test]
    fn test_time_major_permutes_and_broadcasts() {
        let field = time_object_field();
        let row = field.slice(&Selector::All, &Selector::Index(0)).unwrap();
        assert_eq!(row.into_time_major(4).unwrap().shape(), &[4]);

        let free_first = Field::new(
            ndarray::Array2::<f64>::zeros((3, 4)),
            vec![AxisRole::Free, AxisRole::Time],
        )
        .unwrap();
        assert_eq!(free_first.into_time_major(4).unwrap().shape(), &[4, 3]);

        let scalar = Field::new(arr1(&[7i64]), vec![AxisRole::Object])
            .unwrap()
            .slice(&Selector::All, &Selector::Index(0))
            .unwrap();
        let broadcast = scalar.into_time_major(4).unwrap();
        assert_eq!(broadcast, FieldData::from(arr1(&[7i64, 7, 7, 7])));
    }

    #[test]
    fn test_records_validate_shape() {
        let mut records = Records::new(vec![4, 2], vec![AxisRole::Time, AxisRole::Object]).unwrap();
        records
            .insert("x", Array3::<f64>::zeros((4, 2, 3)))
            .unwrap();
        assert_eq!(
            records.field("x").unwrap().axes(),
            &[AxisRole::Time, AxisRole::Object, AxisRole::Free]
        );
        assert!(records.insert("bad", ndarray::Array2::<f64>::zeros((2, 4))).is_err());
        assert!(matches!(
            records.field("missing"),
            Err(TrackError::UnknownField(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_infer_columns_uses_id_shape() {
        let mut fields = IndexMap::new();
        fields.insert("id".to_string(), FieldData::from(ndarray::Array2::<i64>::zeros((6, 3))));
        fields.insert("mass".to_string(), FieldData::from(arr1(&[1.0, 2.0, 3.0])));
        let dataset = Dataset::infer_columns(fields, 6, "id").unwrap();
        assert_eq!(dataset.field("mass").unwrap().axes(), &[AxisRole::Object]);
        assert_eq!(dataset.field_names(), vec!["id", "mass"]);
    }
}

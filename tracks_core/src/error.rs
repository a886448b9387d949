//! Error types for the tracker data model.

use crate::dataset::Dtype;
use thiserror::Error;

/// Errors raised by storages, trackers and decorations.
///
/// Every failure is local and immediate. Degenerate inputs (no alive
/// snapshots, no progenitors, no qualifying trackers) are not errors and
/// produce empty results instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    /// A dataset has no field under the requested key
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// A tracker has no property under the requested key
    #[error("Unknown tracker property: {0}")]
    UnknownProperty(String),

    /// No object carries the requested ID
    #[error("No matches found for ID {0}")]
    UnknownId(i64),

    /// An index selector points past the end of an axis
    #[error("Index {index} out of range for axis of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Axis role cannot be inferred because the snapshot and object counts coincide
    #[error("Ambiguous axis {axis} of field '{field}': length {len} matches both snapshot and object counts")]
    AmbiguousAxis { field: String, axis: usize, len: usize },

    /// Lengths or shapes of related inputs disagree
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A field holds a different element type than the operation needs
    #[error("Field '{field}' has dtype {found}, expected {expected}")]
    DtypeMismatch {
        field: String,
        expected: Dtype,
        found: Dtype,
    },

    /// Positions are not 2D/3D, or a variant does not support the dimension
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),

    /// A marker function needs a property the tracker does not carry
    #[error("{func} marker requires '{key}' to be stored in tracker data")]
    MissingMarkerProp { func: &'static str, key: String },

    /// A halo appears among the progenitors on its own ancestor path
    #[error("Cyclic merger tree: halo {index} is its own progenitor")]
    CyclicTree { index: usize },
}

impl TrackError {
    /// Creates an unknown field error.
    pub fn unknown_field(name: impl Into<String>) -> Self {
        Self::UnknownField(name.into())
    }

    /// Creates an unknown property error.
    pub fn unknown_property(name: impl Into<String>) -> Self {
        Self::UnknownProperty(name.into())
    }

    /// Creates a shape mismatch error.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Creates an invalid dimension error.
    pub fn dimension(msg: impl Into<String>) -> Self {
        Self::InvalidDimension(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TrackError>;

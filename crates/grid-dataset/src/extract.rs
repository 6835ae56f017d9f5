//! Slice extraction by dimension name.
//!
//! Data variables do not agree on axis order. The reference layout is
//! `trajReconstructed(batch, Time, level, y, x)` but files exist with a
//! species axis in front, without the batch axis, or with the spatial axes
//! swapped. Extraction therefore never indexes positionally: each axis of
//! the stored variable is matched to a role by name and gathered with its
//! stride.
//!
//! A variable without an axis for some selector holds a single field along
//! that role, so only index 0 selects it. Any other index is rejected with
//! [`ExtractionError::AxisNotStored`] rather than silently answered with the
//! same field.

use crate::dataset::Dataset;
use crate::error::{ExtractionError, SelectorDimension};
use crate::schema::Schema;
use crate::selection::Selection;

/// A 2-D field on the spatial grid, row-major, with non-finite values
/// replaced by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl Slice {
    /// Build a slice from row-major values. Returns `None` on a length mismatch.
    pub fn new(rows: usize, cols: usize, values: Vec<f64>) -> Option<Self> {
        (values.len() == rows * cols).then_some(Self { rows, cols, values })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i >= self.rows || j >= self.cols {
            return None;
        }
        Some(self.values[i * self.cols + j])
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Minimum and maximum value.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.values.iter().copied().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// Role of one axis of the stored variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisRole {
    Row,
    Col,
    Fixed(usize),
}

/// Extract the 2-D field a selection points at.
///
/// The dataset must be the same snapshot the schema was resolved from.
pub fn extract(dataset: &Dataset, schema: &Schema, selection: &Selection) -> Result<Slice, ExtractionError> {
    let name = selection.variable();
    let var = dataset
        .variable(name)
        .ok_or_else(|| ExtractionError::VariableAbsent(name.to_string()))?;

    let spatial = &schema.spatial;
    let expected = (spatial.rows, spatial.cols);
    let mismatch = |detail: String| ExtractionError::ShapeMismatch {
        variable: name.to_string(),
        expected,
        detail,
    };

    let strides = var.strides();
    let mut base = 0usize;
    let mut row_axis = None;
    let mut col_axis = None;
    let mut stored = [false; 3];

    for (axis, (dim, &len)) in var.dims.iter().zip(var.shape.iter()).enumerate() {
        let role = if *dim == spatial.row_dim {
            AxisRole::Row
        } else if *dim == spatial.col_dim {
            AxisRole::Col
        } else if *dim == schema.time.dimension {
            stored[0] = true;
            AxisRole::Fixed(selection.time_index())
        } else if schema.level.dimension.as_deref() == Some(dim.as_str()) {
            stored[1] = true;
            AxisRole::Fixed(selection.level_index())
        } else if *dim == schema.species.dimension {
            stored[2] = true;
            AxisRole::Fixed(selection.species_index())
        } else if len == 1 {
            AxisRole::Fixed(0)
        } else {
            return Err(mismatch(format!("unrecognised dimension '{}' of length {}", dim, len)));
        };

        match role {
            AxisRole::Row => row_axis = Some((len, strides[axis])),
            AxisRole::Col => col_axis = Some((len, strides[axis])),
            AxisRole::Fixed(index) => {
                if index >= len {
                    return Err(mismatch(format!(
                        "index {} is outside dimension '{}' of length {}",
                        index, dim, len
                    )));
                }
                base += index * strides[axis];
            }
        }
    }

    let selectors = [
        (SelectorDimension::Time, selection.time_index()),
        (SelectorDimension::Level, selection.level_index()),
        (SelectorDimension::Species, selection.species_index()),
    ];
    for ((dimension, index), present) in selectors.into_iter().zip(stored) {
        if !present && index != 0 {
            return Err(ExtractionError::AxisNotStored {
                variable: name.to_string(),
                dimension,
                index,
            });
        }
    }

    let (rows, row_stride) =
        row_axis.ok_or_else(|| mismatch(format!("missing row dimension '{}'", spatial.row_dim)))?;
    let (cols, col_stride) =
        col_axis.ok_or_else(|| mismatch(format!("missing column dimension '{}'", spatial.col_dim)))?;
    if (rows, cols) != expected {
        return Err(mismatch(format!("spatial extent is {}x{}", rows, cols)));
    }

    let mut values = Vec::with_capacity(rows * cols);
    for i in 0..rows {
        let row_base = base + i * row_stride;
        for j in 0..cols {
            let v = var
                .data
                .get_f64(row_base + j * col_stride)
                .ok_or_else(|| mismatch("offset outside stored data".to_string()))?;
            values.push(if v.is_finite() { v } else { 0.0 });
        }
    }

    Ok(Slice { rows, cols, values })
}

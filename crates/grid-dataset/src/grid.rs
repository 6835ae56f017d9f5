//! Latitude/longitude coordinate grids.
//!
//! Files store coordinates either as 1-D axis vectors (`lat(y)`, `lon(x)`)
//! or as 2-D curvilinear meshes (`lat(y, x)`, `lon(y, x)`), sometimes with
//! extra leading dimensions (`XLAT(Time, south_north, west_east)`). This
//! module works out which dimensions are the grid rows and columns and
//! exposes a single lookup that hides the difference.

use serde::Serialize;

use crate::dataset::{Dataset, Variable};
use crate::error::SchemaError;

/// Canonical name of the latitude coordinate after normalisation.
pub const LATITUDE: &str = "lat";
/// Canonical name of the longitude coordinate after normalisation.
pub const LONGITUDE: &str = "lon";

/// The row and column dimensions of the spatial grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialAxes {
    pub row_dim: String,
    pub col_dim: String,
    pub rows: usize,
    pub cols: usize,
}

/// Geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    pub fn height(&self) -> f64 {
        self.lat_max - self.lat_min
    }
}

/// Coordinates of every grid cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateGrid {
    /// Rectilinear grid: `lat[i]`, `lon[j]`.
    Axes { lat: Vec<f64>, lon: Vec<f64> },
    /// Curvilinear grid stored row-major: `lat[i * cols + j]`.
    Mesh {
        rows: usize,
        cols: usize,
        lat: Vec<f64>,
        lon: Vec<f64>,
    },
}

/// Dimensions a coordinate variable contributes after squeezing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Layout {
    Vector(String, usize),
    Plane((String, usize), (String, usize)),
}

impl CoordinateGrid {
    pub fn from_axes(lat: Vec<f64>, lon: Vec<f64>) -> Self {
        CoordinateGrid::Axes { lat, lon }
    }

    pub fn from_mesh(rows: usize, cols: usize, lat: Vec<f64>, lon: Vec<f64>) -> Result<Self, SchemaError> {
        if lat.len() != rows * cols || lon.len() != rows * cols {
            return Err(SchemaError::InvalidCoordinates(format!(
                "mesh of {}x{} needs {} values, got lat={} lon={}",
                rows,
                cols,
                rows * cols,
                lat.len(),
                lon.len()
            )));
        }
        Ok(CoordinateGrid::Mesh { rows, cols, lat, lon })
    }

    /// Read the normalised `lat`/`lon` variables of a dataset.
    pub fn from_dataset(dataset: &Dataset, axes: &SpatialAxes) -> Result<Self, SchemaError> {
        let (lat_var, lon_var) = coordinate_variables(dataset)?;
        let lat_layout = layout(lat_var, lon_var)?;
        let lon_layout = layout(lon_var, lat_var)?;
        let lat = trailing_values(lat_var, &lat_layout);
        let lon = trailing_values(lon_var, &lon_layout);

        let grid = match (&lat_layout, &lon_layout) {
            (Layout::Vector(..), Layout::Vector(..)) => CoordinateGrid::from_axes(lat, lon),
            (Layout::Plane(..), Layout::Plane(..)) => {
                CoordinateGrid::from_mesh(axes.rows, axes.cols, lat, lon)?
            }
            (Layout::Plane(..), Layout::Vector(..)) => {
                // lon varies along columns only
                let lon = (0..axes.rows).flat_map(|_| lon.iter().copied()).collect();
                CoordinateGrid::from_mesh(axes.rows, axes.cols, lat, lon)?
            }
            (Layout::Vector(..), Layout::Plane(..)) => {
                // lat varies along rows only
                let lat = lat
                    .iter()
                    .flat_map(|&v| std::iter::repeat(v).take(axes.cols))
                    .collect();
                CoordinateGrid::from_mesh(axes.rows, axes.cols, lat, lon)?
            }
        };

        if grid.shape() != (axes.rows, axes.cols) {
            return Err(SchemaError::InvalidCoordinates(format!(
                "coordinate grid is {:?} but spatial axes are {}x{}",
                grid.shape(),
                axes.rows,
                axes.cols
            )));
        }
        Ok(grid)
    }

    /// `(rows, cols)` of the grid.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            CoordinateGrid::Axes { lat, lon } => (lat.len(), lon.len()),
            CoordinateGrid::Mesh { rows, cols, .. } => (*rows, *cols),
        }
    }

    pub fn is_empty(&self) -> bool {
        let (rows, cols) = self.shape();
        rows == 0 || cols == 0
    }

    /// `(lon, lat)` of cell `(i, j)`.
    #[inline]
    pub fn coordinate(&self, i: usize, j: usize) -> Option<(f64, f64)> {
        match self {
            CoordinateGrid::Axes { lat, lon } => Some((*lon.get(j)?, *lat.get(i)?)),
            CoordinateGrid::Mesh { rows, cols, lat, lon } => {
                if i >= *rows || j >= *cols {
                    return None;
                }
                let idx = i * cols + j;
                Some((lon[idx], lat[idx]))
            }
        }
    }

    /// Bounding box over all finite coordinates; `None` if there are none.
    pub fn bounds(&self) -> Option<Bounds> {
        let (lat, lon) = match self {
            CoordinateGrid::Axes { lat, lon } | CoordinateGrid::Mesh { lat, lon, .. } => (lat, lon),
        };
        let (lat_min, lat_max) = finite_range(lat)?;
        let (lon_min, lon_max) = finite_range(lon)?;
        Some(Bounds {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        })
    }

    /// True when row 0 is the northernmost row.
    pub fn north_up(&self) -> bool {
        let (rows, cols) = self.shape();
        if rows < 2 || cols == 0 {
            return true;
        }
        match (self.coordinate(0, cols / 2), self.coordinate(rows - 1, cols / 2)) {
            (Some((_, first)), Some((_, last))) => first >= last,
            _ => true,
        }
    }

    /// True when column 0 is the westernmost column.
    pub fn east_right(&self) -> bool {
        let (rows, cols) = self.shape();
        if cols < 2 || rows == 0 {
            return true;
        }
        match (self.coordinate(rows / 2, 0), self.coordinate(rows / 2, cols - 1)) {
            (Some((first, _)), Some((last, _))) => first <= last,
            _ => true,
        }
    }
}

/// Determine the row/column dimensions from the normalised `lat`/`lon`.
pub fn spatial_axes(dataset: &Dataset) -> Result<SpatialAxes, SchemaError> {
    let (lat_var, lon_var) = coordinate_variables(dataset)?;
    let lat = layout(lat_var, lon_var)?;
    let lon = layout(lon_var, lat_var)?;

    let (row, col) = match (lat, lon) {
        (Layout::Vector(r, rn), Layout::Vector(c, cn)) => {
            if r == c {
                return Err(SchemaError::InvalidCoordinates(format!(
                    "1-D lat and lon share dimension '{}'",
                    r
                )));
            }
            ((r, rn), (c, cn))
        }
        (Layout::Plane(r1, c1), Layout::Plane(r2, c2)) => {
            if r1 != r2 || c1 != c2 {
                return Err(SchemaError::InvalidCoordinates(format!(
                    "lat is on ({}, {}) but lon is on ({}, {})",
                    r1.0, c1.0, r2.0, c2.0
                )));
            }
            (r1, c1)
        }
        (Layout::Plane(r, c), Layout::Vector(v, _)) => {
            if v != c.0 {
                return Err(SchemaError::InvalidCoordinates(format!(
                    "1-D lon dimension '{}' is not the lat column dimension '{}'",
                    v, c.0
                )));
            }
            (r, c)
        }
        (Layout::Vector(v, _), Layout::Plane(r, c)) => {
            if v != r.0 {
                return Err(SchemaError::InvalidCoordinates(format!(
                    "1-D lat dimension '{}' is not the lon row dimension '{}'",
                    v, r.0
                )));
            }
            (r, c)
        }
    };

    Ok(SpatialAxes {
        row_dim: row.0,
        col_dim: col.0,
        rows: row.1,
        cols: col.1,
    })
}

fn coordinate_variables(dataset: &Dataset) -> Result<(&Variable, &Variable), SchemaError> {
    let lat = dataset
        .variable(LATITUDE)
        .ok_or_else(|| SchemaError::MissingSpatialCoordinate(LATITUDE.to_string()))?;
    let lon = dataset
        .variable(LONGITUDE)
        .ok_or_else(|| SchemaError::MissingSpatialCoordinate(LONGITUDE.to_string()))?;
    Ok((lat, lon))
}

/// Squeeze a coordinate variable down to its spatial dimensions.
///
/// Dimensions ahead of the trailing plane are dropped (their index 0 is
/// used). A 2-D variable with a singleton leading dimension is treated as a
/// vector unless the other coordinate has exactly the same dimensions.
fn layout(var: &Variable, other: &Variable) -> Result<Layout, SchemaError> {
    let dims: Vec<(String, usize)> = var
        .dims
        .iter()
        .cloned()
        .zip(var.shape.iter().copied())
        .collect();

    match dims.len() {
        0 => Err(SchemaError::InvalidCoordinates(format!(
            "coordinate '{}' is a scalar",
            var.name
        ))),
        1 => Ok(Layout::Vector(dims[0].0.clone(), dims[0].1)),
        n => {
            let row = dims[n - 2].clone();
            let col = dims[n - 1].clone();
            if n == 2 && row.1 == 1 && other.dims != var.dims {
                Ok(Layout::Vector(col.0, col.1))
            } else {
                Ok(Layout::Plane(row, col))
            }
        }
    }
}

/// Values of the first trailing plane (or vector) of a coordinate variable.
fn trailing_values(var: &Variable, layout: &Layout) -> Vec<f64> {
    let count = match layout {
        Layout::Vector(_, n) => *n,
        Layout::Plane((_, r), (_, c)) => r * c,
    };
    (0..count)
        .map(|i| var.data.get_f64(i).unwrap_or(f64::NAN))
        .collect()
}

fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::VariableData;

    fn dataset_with(lat: (&[&str], Vec<f32>), lon: (&[&str], Vec<f32>), dims: &[(&str, usize)]) -> Dataset {
        let mut ds = Dataset::new();
        for (name, len) in dims {
            ds.add_dimension(*name, *len).unwrap();
        }
        ds.add_variable(Variable::new("lat", lat.0, VariableData::Float(lat.1)))
            .unwrap();
        ds.add_variable(Variable::new("lon", lon.0, VariableData::Float(lon.1)))
            .unwrap();
        ds
    }

    #[test]
    fn test_axes_grid() {
        let ds = dataset_with(
            (&["y"], vec![10.0, 20.0]),
            (&["x"], vec![100.0, 110.0, 120.0]),
            &[("y", 2), ("x", 3)],
        );
        let axes = spatial_axes(&ds).unwrap();
        assert_eq!((axes.row_dim.as_str(), axes.col_dim.as_str()), ("y", "x"));

        let grid = CoordinateGrid::from_dataset(&ds, &axes).unwrap();
        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(grid.coordinate(1, 2), Some((120.0, 20.0)));
        assert_eq!(grid.coordinate(2, 0), None);
        assert!(!grid.north_up());
        assert!(grid.east_right());
    }

    #[test]
    fn test_mesh_with_leading_time_dimension() {
        // XLAT(Time=2, y=2, x=2): the first time step is used
        let ds = dataset_with(
            (&["Time", "y", "x"], vec![5.0, 5.0, 4.0, 4.0, 9.0, 9.0, 9.0, 9.0]),
            (&["Time", "y", "x"], vec![1.0, 2.0, 1.0, 2.0, 9.0, 9.0, 9.0, 9.0]),
            &[("Time", 2), ("y", 2), ("x", 2)],
        );
        let axes = spatial_axes(&ds).unwrap();
        let grid = CoordinateGrid::from_dataset(&ds, &axes).unwrap();

        assert_eq!(grid.coordinate(0, 1), Some((2.0, 5.0)));
        assert_eq!(grid.coordinate(1, 0), Some((1.0, 4.0)));
        assert!(grid.north_up());
        let b = grid.bounds().unwrap();
        assert_eq!((b.lat_min, b.lat_max, b.lon_min, b.lon_max), (4.0, 5.0, 1.0, 2.0));
    }

    #[test]
    fn test_singleton_leading_dimension_squeezed_to_vector() {
        let ds = dataset_with(
            (&["batch", "y"], vec![1.0, 2.0]),
            (&["batch", "x"], vec![3.0, 4.0, 5.0]),
            &[("batch", 1), ("y", 2), ("x", 3)],
        );
        let axes = spatial_axes(&ds).unwrap();
        assert_eq!((axes.rows, axes.cols), (2, 3));
        let grid = CoordinateGrid::from_dataset(&ds, &axes).unwrap();
        assert!(matches!(grid, CoordinateGrid::Axes { .. }));
    }

    #[test]
    fn test_mixed_layout_is_broadcast() {
        let ds = dataset_with(
            (&["y", "x"], vec![1.0, 1.1, 2.0, 2.1]),
            (&["x"], vec![30.0, 31.0]),
            &[("y", 2), ("x", 2)],
        );
        let axes = spatial_axes(&ds).unwrap();
        let grid = CoordinateGrid::from_dataset(&ds, &axes).unwrap();
        assert_eq!(grid.coordinate(1, 1), Some((31.0, 2.1)));
        assert_eq!(grid.coordinate(1, 0), Some((30.0, 2.0)));
    }

    #[test]
    fn test_shared_vector_dimension_rejected() {
        let ds = dataset_with(
            (&["n"], vec![1.0, 2.0]),
            (&["n"], vec![3.0, 4.0]),
            &[("n", 2)],
        );
        assert!(matches!(
            spatial_axes(&ds),
            Err(SchemaError::InvalidCoordinates(_))
        ));
    }

    #[test]
    fn test_missing_latitude() {
        let mut ds = Dataset::new();
        ds.add_dimension("x", 1).unwrap();
        ds.add_variable(Variable::new("lon", &["x"], VariableData::Float(vec![0.0])))
            .unwrap();
        assert_eq!(
            spatial_axes(&ds),
            Err(SchemaError::MissingSpatialCoordinate("lat".to_string()))
        );
    }

    #[test]
    fn test_bounds_ignore_non_finite() {
        let grid = CoordinateGrid::from_axes(vec![f64::NAN, 1.0, 3.0], vec![-5.0, f64::INFINITY]);
        let b = grid.bounds().unwrap();
        assert_eq!((b.lat_min, b.lat_max), (1.0, 3.0));
        assert_eq!((b.lon_min, b.lon_max), (-5.0, -5.0));

        let empty = CoordinateGrid::from_axes(vec![f64::NAN], vec![1.0]);
        assert!(empty.bounds().is_none());
    }
}

//! Bilinear resampling of a slice onto the output raster.
//!
//! Each output pixel is placed at its geographic position inside the grid
//! bounds and mapped back to a fractional grid index through the latitude
//! and longitude axes, so unevenly spaced grids land where they belong.
//! Curvilinear meshes, where latitude varies along a row, have no such
//! axes; they are resampled in index space, which is exact only when the
//! mesh is close to regular.

use rayon::prelude::*;

use grid_dataset::{Bounds, CoordinateGrid, Slice};

/// Largest raster edge in pixels.
pub const MAX_DIMENSION: usize = 4096;

/// How grid indices map onto image axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation {
    /// Grid row 0 is the southern edge, so image rows run backwards.
    pub flip_rows: bool,
    /// Grid column 0 is the eastern edge.
    pub flip_cols: bool,
}

impl Orientation {
    pub fn of(grid: &CoordinateGrid) -> Self {
        Self {
            flip_rows: !grid.north_up(),
            flip_cols: !grid.east_right(),
        }
    }
}

/// Fractional grid row of every image row and grid column of every image
/// column.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelMap {
    pub rows: Vec<f64>,
    pub cols: Vec<f64>,
}

impl PixelMap {
    /// Geographic placement when the grid is rectilinear, index space otherwise.
    pub fn for_grid(grid: &CoordinateGrid, bounds: &Bounds, width: usize, height: usize) -> Self {
        Self::geographic(grid, bounds, width, height).unwrap_or_else(|| {
            let (rows, cols) = grid.shape();
            Self::index_space(rows, cols, Orientation::of(grid), width, height)
        })
    }

    /// Spread grid indices evenly over the image.
    pub fn index_space(rows: usize, cols: usize, orientation: Orientation, width: usize, height: usize) -> Self {
        let spread = |src: usize, dst: usize, flip: bool| -> Vec<f64> {
            let last = src.saturating_sub(1) as f64;
            let ratio = if dst > 1 { last / (dst - 1) as f64 } else { 0.0 };
            (0..dst)
                .map(|p| {
                    let v = p as f64 * ratio;
                    if flip {
                        last - v
                    } else {
                        v
                    }
                })
                .collect()
        };
        Self {
            rows: spread(rows, height, orientation.flip_rows),
            cols: spread(cols, width, orientation.flip_cols),
        }
    }

    /// Place pixels by coordinate. `None` unless the grid has strictly
    /// monotonic, finite latitude and longitude axes.
    pub fn geographic(grid: &CoordinateGrid, bounds: &Bounds, width: usize, height: usize) -> Option<Self> {
        let (lat, lon) = rectilinear_axes(grid)?;
        let step = |lo: f64, hi: f64, n: usize| if n > 1 { (hi - lo) / (n - 1) as f64 } else { 0.0 };
        let lat_step = step(bounds.lat_min, bounds.lat_max, height);
        let lon_step = step(bounds.lon_min, bounds.lon_max, width);

        Some(Self {
            rows: (0..height)
                .map(|py| fractional_index(&lat, bounds.lat_max - py as f64 * lat_step))
                .collect(),
            cols: (0..width)
                .map(|px| fractional_index(&lon, bounds.lon_min + px as f64 * lon_step))
                .collect(),
        })
    }
}

/// Latitude per row and longitude per column, if every cell agrees with them.
fn rectilinear_axes(grid: &CoordinateGrid) -> Option<(Vec<f64>, Vec<f64>)> {
    let (rows, cols) = grid.shape();
    if rows == 0 || cols == 0 {
        return None;
    }
    let lat: Vec<f64> = (0..rows).map(|i| grid.coordinate(i, 0).map(|c| c.1)).collect::<Option<_>>()?;
    let lon: Vec<f64> = (0..cols).map(|j| grid.coordinate(0, j).map(|c| c.0)).collect::<Option<_>>()?;
    if !strictly_monotonic(&lat) || !strictly_monotonic(&lon) {
        return None;
    }

    if let CoordinateGrid::Mesh { .. } = grid {
        let tolerance = |axis: &[f64]| 1e-6 * (axis[0] - axis[axis.len() - 1]).abs().max(1.0);
        let (lat_tol, lon_tol) = (tolerance(&lat), tolerance(&lon));
        for i in 0..rows {
            for j in 0..cols {
                let (x, y) = grid.coordinate(i, j)?;
                if (y - lat[i]).abs() > lat_tol || (x - lon[j]).abs() > lon_tol {
                    return None;
                }
            }
        }
    }
    Some((lat, lon))
}

fn strictly_monotonic(axis: &[f64]) -> bool {
    if axis.iter().any(|v| !v.is_finite()) {
        return false;
    }
    axis.windows(2).all(|w| w[1] > w[0]) || axis.windows(2).all(|w| w[1] < w[0])
}

/// Fractional position of `value` along a strictly monotonic axis, clamped
/// to its ends.
pub fn fractional_index(axis: &[f64], value: f64) -> f64 {
    let n = axis.len();
    if n < 2 {
        return 0.0;
    }
    let ascending = axis[n - 1] > axis[0];
    let k = axis.partition_point(|&a| if ascending { a <= value } else { a >= value });
    if k == 0 {
        return 0.0;
    }
    if k >= n {
        return (n - 1) as f64;
    }
    let (lo, hi) = (axis[k - 1], axis[k]);
    (k - 1) as f64 + (value - lo) / (hi - lo)
}

/// Raster size for `width` pixels across, keeping the geographic aspect.
///
/// Falls back to the grid's index aspect when the extent is degenerate.
pub fn output_size(bounds: &Bounds, width: usize, rows: usize, cols: usize) -> (usize, usize) {
    let width = width.clamp(1, MAX_DIMENSION);
    let aspect = if bounds.width() > 0.0 && bounds.height() > 0.0 {
        bounds.height() / bounds.width()
    } else {
        rows.max(1) as f64 / cols.max(1) as f64
    };
    let height = (width as f64 * aspect).round();
    let height = if height.is_finite() { height as usize } else { width };
    (width, height.clamp(1, MAX_DIMENSION))
}

/// Sample the slice at fractional index `(y, x)`; indices are clamped.
pub fn sample_bilinear(slice: &Slice, y: f64, x: f64) -> f64 {
    let (rows, cols) = slice.shape();
    let y = y.clamp(0.0, (rows - 1) as f64);
    let x = x.clamp(0.0, (cols - 1) as f64);

    let (y0, x0) = (y.floor() as usize, x.floor() as usize);
    let (y1, x1) = ((y0 + 1).min(rows - 1), (x0 + 1).min(cols - 1));
    let (dy, dx) = (y - y0 as f64, x - x0 as f64);

    let v = |i, j| slice.get(i, j).unwrap_or(0.0);
    let top = v(y0, x0) * (1.0 - dx) + v(y0, x1) * dx;
    let bottom = v(y1, x0) * (1.0 - dx) + v(y1, x1) * dx;
    top * (1.0 - dy) + bottom * dy
}

/// Resample a non-empty slice onto the pixels of `map`, image row 0 north
/// and column 0 west.
pub fn resample(slice: &Slice, map: &PixelMap) -> Vec<f64> {
    let width = map.cols.len();
    let mut out = vec![0.0; width * map.rows.len()];
    if width == 0 {
        return out;
    }
    out.par_chunks_mut(width).zip(map.rows.par_iter()).for_each(|(line, &y)| {
        for (cell, &x) in line.iter_mut().zip(&map.cols) {
            *cell = sample_bilinear(slice, y, x);
        }
    });
    out
}

//! Test data generators for synthetic concentration fields.
//!
//! These generators create predictable, verifiable patterns that can be used
//! across the test suite.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);
/// assert_eq!(grid[10], 1.0);
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a plume-like concentration field.
///
/// A Gaussian bump whose centre drifts with `seed`, floored at zero so
/// roughly half of the cells carry no concentration.
pub fn create_plume_grid(width: usize, height: usize, seed: u32) -> Vec<f32> {
    let cx = (simple_hash(seed, 1, 7) % width.max(1) as u32) as f32;
    let cy = (simple_hash(seed, 2, 7) % height.max(1) as u32) as f32;
    let sigma = (width.max(height) as f32 / 4.0).max(1.0);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 - cx;
            let dy = row as f32 - cy;
            let v = 100.0 * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp() - 20.0;
            data.push(v.max(0.0));
        }
    }
    data
}

/// Creates a grid filled with a constant value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a grid with NaN values at the given `(row, col)` positions.
pub fn create_grid_with_nans(width: usize, height: usize, nan_positions: &[(usize, usize)]) -> Vec<f32> {
    let mut data = create_test_grid(width, height);
    for &(row, col) in nan_positions {
        if row < height && col < width {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plume_is_deterministic_and_non_negative() {
        let a = create_plume_grid(20, 10, 3);
        let b = create_plume_grid(20, 10, 3);
        assert_eq!(a, b);
        assert!(a.iter().all(|&v| v >= 0.0));
        assert!(a.iter().any(|&v| v > 0.0));
        assert!(a.iter().any(|&v| v == 0.0));
    }

    #[test]
    fn test_grid_with_nans() {
        let data = create_grid_with_nans(3, 3, &[(1, 1), (5, 5)]);
        assert!(data[4].is_nan());
        assert_eq!(data.iter().filter(|v| v.is_nan()).count(), 1);
    }

    #[test]
    fn test_constant_grid() {
        assert!(create_constant_grid(4, 2, 7.5).iter().all(|&v| v == 7.5));
    }
}

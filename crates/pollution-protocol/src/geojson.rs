//! GeoJSON point features for concentration slices.

use serde::{Deserialize, Serialize};

use grid_dataset::{CoordinateGrid, ExtractionError, Slice};

/// A GeoJSON FeatureCollection of concentration points.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureCollection {
    /// Type identifier (always "FeatureCollection").
    #[serde(rename = "type")]
    pub type_: String,

    pub features: Vec<Feature>,

    /// Time label of the slice the features came from.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub time: Option<String>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            type_: "FeatureCollection".to_string(),
            features,
            time: None,
        }
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// A single concentration point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    /// Type identifier (always "Feature").
    #[serde(rename = "type")]
    pub type_: String,

    pub geometry: Geometry,

    pub properties: FeatureProperties,
}

impl Feature {
    pub fn point(lon: f64, lat: f64, concentration: f64) -> Self {
        Self {
            type_: "Feature".to_string(),
            geometry: Geometry::point(lon, lat),
            properties: FeatureProperties { concentration },
        }
    }
}

/// GeoJSON geometry. Only points are produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        /// Coordinates as [longitude, latitude].
        coordinates: [f64; 2],
    },
}

impl Geometry {
    pub fn point(lon: f64, lat: f64) -> Self {
        Geometry::Point {
            coordinates: [lon, lat],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FeatureProperties {
    pub concentration: f64,
}

/// Number of cells [`project`] would emit.
pub fn positive_count(slice: &Slice) -> usize {
    slice.values().iter().filter(|&&v| v > 0.0).count()
}

/// Turn every strictly positive cell into a point feature, row-major.
///
/// Zero and negative concentrations carry no meaning and are dropped.
pub fn project(slice: &Slice, grid: &CoordinateGrid) -> Result<FeatureCollection, ExtractionError> {
    let (rows, cols) = slice.shape();
    if grid.shape() != (rows, cols) {
        return Err(ExtractionError::ShapeMismatch {
            variable: "slice".to_string(),
            expected: grid.shape(),
            detail: format!("slice is {}x{}", rows, cols),
        });
    }

    let mut features = Vec::with_capacity(positive_count(slice));
    for (idx, &value) in slice.values().iter().enumerate() {
        if value <= 0.0 {
            continue;
        }
        let (i, j) = (idx / cols, idx % cols);
        if let Some((lon, lat)) = grid.coordinate(i, j) {
            features.push(Feature::point(lon, lat, value));
        }
    }

    Ok(FeatureCollection::new(features))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_2x2() -> CoordinateGrid {
        CoordinateGrid::from_mesh(
            2,
            2,
            vec![41.0, 41.0, 40.0, 40.0],
            vec![-74.0, -73.0, -74.0, -73.0],
        )
        .unwrap()
    }

    #[test]
    fn test_only_strictly_positive_cells() {
        let slice = Slice::new(2, 2, vec![0.0, 5.2, -1.0, 0.0]).unwrap();
        let fc = project(&slice, &mesh_2x2()).unwrap();

        assert_eq!(fc.len(), 1);
        assert_eq!(fc.features[0], Feature::point(-73.0, 41.0, 5.2));
    }

    #[test]
    fn test_row_major_order() {
        let slice = Slice::new(2, 2, vec![1.0, 0.0, 0.0, 2.0]).unwrap();
        let fc = project(&slice, &mesh_2x2()).unwrap();

        let got: Vec<_> = fc
            .features
            .iter()
            .map(|f| {
                let Geometry::Point { coordinates } = f.geometry;
                (coordinates, f.properties.concentration)
            })
            .collect();
        assert_eq!(got, vec![([-74.0, 41.0], 1.0), ([-73.0, 40.0], 2.0)]);
    }

    #[test]
    fn test_axes_grid_indexing() {
        let grid = CoordinateGrid::from_axes(vec![10.0, 20.0], vec![1.0, 2.0, 3.0]);
        let slice = Slice::new(2, 3, vec![0.0, 0.0, 0.0, 0.0, 0.0, 7.0]).unwrap();
        let fc = project(&slice, &grid).unwrap();
        assert_eq!(fc.features, vec![Feature::point(3.0, 20.0, 7.0)]);
    }

    #[test]
    fn test_shape_mismatch() {
        let slice = Slice::new(1, 4, vec![1.0; 4]).unwrap();
        assert!(matches!(
            project(&slice, &mesh_2x2()),
            Err(ExtractionError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_serialized_shape() {
        let fc = FeatureCollection::new(vec![Feature::point(-73.5, 40.5, 3.25)]).with_time("2023-01-01 00:00:00");
        let json = serde_json::to_value(&fc).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [-73.5, 40.5]},
                    "properties": {"concentration": 3.25}
                }],
                "time": "2023-01-01 00:00:00"
            })
        );

        let no_time = serde_json::to_value(FeatureCollection::default()).unwrap();
        assert!(no_time.get("time").is_none());
    }

    #[test]
    fn test_positive_count() {
        let slice = Slice::new(1, 4, vec![0.0, 1.0, -2.0, 3.0]).unwrap();
        assert_eq!(positive_count(&slice), 2);
    }
}

//! Pollution API wire types.
//!
//! Response bodies served by the pollution service plus the feature
//! projector that turns a concentration [`grid_dataset::Slice`] into a
//! GeoJSON [`FeatureCollection`].
//!
//! # Example
//!
//! ```rust
//! use grid_dataset::{CoordinateGrid, Slice};
//! use pollution_protocol::project;
//!
//! let grid = CoordinateGrid::from_axes(vec![41.0, 40.0], vec![-74.0, -73.0]);
//! let slice = Slice::new(2, 2, vec![1.0, 0.0, 0.0, 2.0]).unwrap();
//! let features = project(&slice, &grid).unwrap();
//! assert_eq!(features.len(), 2);
//! ```

pub mod geojson;
pub mod responses;

pub use geojson::{positive_count, project, Feature, FeatureCollection, FeatureProperties, Geometry};
pub use responses::{
    BoundsResponse, DataTypesResponse, DatasetListResponse, DatasetSwitchRequest, DatasetSwitchResponse,
    ExceptionResponse, SpeciesResponse, TimeResponse, UploadResponse,
};

/// Media types used in responses
pub mod media_types {
    /// GeoJSON media type
    pub const GEO_JSON: &str = "application/geo+json";
    /// JSON media type
    pub const JSON: &str = "application/json";
    /// PNG media type
    pub const PNG: &str = "image/png";
}

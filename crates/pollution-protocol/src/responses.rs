//! Metadata and exception response bodies.

use serde::{Deserialize, Serialize};

use grid_dataset::Bounds;

/// Geographic extent of the active dataset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundsResponse {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl From<Bounds> for BoundsResponse {
    fn from(b: Bounds) -> Self {
        Self {
            lat_min: b.lat_min,
            lat_max: b.lat_max,
            lon_min: b.lon_min,
            lon_max: b.lon_max,
        }
    }
}

/// Timestamp at a time index plus the last valid index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeResponse {
    /// `YYYY-MM-DD HH:MM:SS`
    pub time: String,
    pub max_time_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeciesResponse {
    pub species_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataTypesResponse {
    pub data_types: Vec<String>,
}

/// Dataset files available in the data directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetListResponse {
    pub datasets: Vec<String>,
    /// Identifier of the active dataset, if any.
    pub current: Option<String>,
}

/// Request body for switching the active dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetSwitchRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetSwitchResponse {
    pub current: String,
    pub previous: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    pub message: String,
    pub dataset: String,
    pub bytes: u64,
}

/// Error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExceptionResponse {
    /// Error kind, e.g. `UnknownSpecies` or `MissingTimeCoordinate`.
    #[serde(rename = "type")]
    pub type_: String,

    /// Human-readable title.
    pub title: String,

    /// HTTP status code.
    pub status: u16,

    /// Detailed error message.
    pub detail: String,
}

impl ExceptionResponse {
    pub fn new(type_: impl Into<String>, title: impl Into<String>, status: u16, detail: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            title: title.into(),
            status,
            detail: detail.into(),
        }
    }

    /// Replace the error kind.
    pub fn with_type(mut self, type_: impl Into<String>) -> Self {
        self.type_ = type_.into();
        self
    }

    /// Create a 404 Not Found exception.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new("NotFound", "Not Found", 404, detail)
    }

    /// Create a 400 Bad Request exception.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new("BadRequest", "Bad Request", 400, detail)
    }

    /// Create a 413 Payload Too Large exception.
    pub fn payload_too_large(detail: impl Into<String>) -> Self {
        Self::new("PayloadTooLarge", "Payload Too Large", 413, detail)
    }

    /// Create a 422 Unprocessable Entity exception.
    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new("Unprocessable", "Unprocessable Entity", 422, detail)
    }

    /// Create a 503 Service Unavailable exception.
    pub fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new("ServiceUnavailable", "Service Unavailable", 503, detail)
    }

    /// Create a 500 Internal Server Error exception.
    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self::new("InternalError", "Internal Server Error", 500, detail)
    }
}

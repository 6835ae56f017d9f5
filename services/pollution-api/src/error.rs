//! HTTP error mapping.
//!
//! Two tiers: selectors that do not match the dataset are 404s, anything
//! wrong with the dataset or the server is a 5xx. The body is always an
//! [`ExceptionResponse`] whose `type` names the error kind.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use grid_dataset::{ExtractionError, QueryError, ValidationError};
use pollution_protocol::ExceptionResponse;
use renderer::RenderError;

use crate::metrics;
use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{count} features exceed the limit of {limit}")]
    TooManyFeatures { count: usize, limit: usize },

    #[error("{0}")]
    Internal(String),
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Validation(v) => ApiError::Validation(v),
            QueryError::Extraction(x) => ApiError::Extraction(x),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::NOT_FOUND,
            // another selector value would work
            ApiError::Extraction(ExtractionError::AxisNotStored { .. }) => StatusCode::NOT_FOUND,
            ApiError::Extraction(_) | ApiError::Render(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Registry(e) => match e {
                RegistryError::NoActiveDataset => StatusCode::SERVICE_UNAVAILABLE,
                RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
                RegistryError::InvalidName(_) => StatusCode::BAD_REQUEST,
                RegistryError::InvalidDataset { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                RegistryError::Io(_) | RegistryError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) | ApiError::TooManyFeatures { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(e) => e.kind(),
            ApiError::Extraction(e) => e.kind(),
            ApiError::Registry(e) => e.kind(),
            ApiError::Render(e) => e.kind(),
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::PayloadTooLarge(_) => "PayloadTooLarge",
            ApiError::TooManyFeatures { .. } => "TooManyFeatures",
            ApiError::Internal(_) => "InternalError",
        }
    }

    pub fn to_exception(&self) -> ExceptionResponse {
        let status = self.status_code();
        ExceptionResponse::new(
            self.kind(),
            status.canonical_reason().unwrap_or("Error"),
            status.as_u16(),
            detail(self),
        )
    }
}

/// Full error chain, so an invalid dataset reports why it is invalid.
fn detail(err: &ApiError) -> String {
    let mut detail = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let text = cause.to_string();
        if !detail.contains(&text) {
            detail.push_str(": ");
            detail.push_str(&text);
        }
        source = cause.source();
    }
    detail
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();
        metrics::record_error(kind);

        if status.is_server_error() {
            tracing::error!(kind, error = %self, "Request failed");
        } else {
            tracing::debug!(kind, error = %self, "Request rejected");
        }

        (
            status,
            [(header::CONTENT_TYPE, pollution_protocol::media_types::JSON)],
            Json(self.to_exception()),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_dataset::{DatasetError, SchemaError, SelectorDimension};

    #[test]
    fn test_selector_errors_are_not_found() {
        let err = ApiError::from(QueryError::from(ValidationError::IndexOutOfBounds {
            dimension: SelectorDimension::Time,
            requested: 3,
            extent: 3,
        }));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.kind(), "IndexOutOfBounds");
    }

    #[test]
    fn test_data_errors_are_server_errors() {
        let err = ApiError::from(QueryError::from(ExtractionError::VariableAbsent("trajReference".into())));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::from(RenderError::failed("constant field"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), "RenderFailed");
    }

    #[test]
    fn test_unstored_axis_is_not_found() {
        let err = ApiError::from(QueryError::from(ExtractionError::AxisNotStored {
            variable: "trajReconstructed".into(),
            dimension: SelectorDimension::Species,
            index: 1,
        }));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.kind(), "AxisNotStored");
        assert_eq!(
            err.to_exception().detail,
            "variable 'trajReconstructed' has no species axis; species index 1 cannot be selected"
        );
    }

    #[test]
    fn test_registry_statuses() {
        assert_eq!(
            ApiError::from(RegistryError::NoActiveDataset).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(RegistryError::NotFound("x.nc".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        let invalid = ApiError::from(RegistryError::InvalidDataset {
            name: "x.nc".into(),
            source: DatasetError::Schema(SchemaError::MissingSpatialCoordinate("lat".into())),
        });
        assert_eq!(invalid.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let exc = invalid.to_exception();
        assert_eq!(exc.type_, "InvalidDataset");
        assert_eq!(exc.status, 422);
        assert_eq!(exc.title, "Unprocessable Entity");
        assert!(exc.detail.contains("missing spatial coordinate 'lat'"));
    }

    #[test]
    fn test_feature_cap_status() {
        let err = ApiError::TooManyFeatures { count: 10, limit: 5 };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.to_exception().detail, "10 features exceed the limit of 5");
    }
}

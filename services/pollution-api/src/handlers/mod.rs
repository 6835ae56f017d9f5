//! HTTP request handlers for the pollution API.

pub mod datasets;
pub mod health;
pub mod pollution;

use axum::extract::rejection::QueryRejection;

use crate::error::ApiError;

pub(crate) fn bad_query(rejection: QueryRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

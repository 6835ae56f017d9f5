//! Error types for raster rendering.

use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    /// The slice cannot be drawn: empty, constant, mismatched or unencodable.
    #[error("render failed: {0}")]
    RenderFailed(String),

    #[error("grid has {cells} cells, render limit is {limit}")]
    GridTooLarge { cells: usize, limit: usize },
}

impl RenderError {
    pub fn failed(cause: impl Into<String>) -> Self {
        RenderError::RenderFailed(cause.into())
    }

    /// Error kind as reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::RenderFailed(_) => "RenderFailed",
            RenderError::GridTooLarge { .. } => "GridTooLarge",
        }
    }
}

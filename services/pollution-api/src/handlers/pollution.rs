//! Data and metadata handlers for the active dataset.
//!
//! Every handler takes one dataset snapshot from the registry up front and
//! uses only that snapshot, so a concurrent swap cannot mix two datasets
//! within a request.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::debug;

use pollution_protocol::{
    media_types, positive_count, project, BoundsResponse, DataTypesResponse, SpeciesResponse, TimeResponse,
};
use renderer::RenderError;

use super::bad_query;
use crate::config::QueryDefaults;
use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;

/// Selector query parameters; omitted values come from the config defaults.
#[derive(Debug, Default, Deserialize)]
pub struct SelectorParams {
    pub time_index: Option<i64>,
    pub level_index: Option<i64>,
    pub species: Option<String>,
    pub data_type: Option<String>,
}

/// Selectors with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selectors {
    pub time_index: i64,
    pub level_index: i64,
    pub species: String,
    pub data_type: String,
}

impl SelectorParams {
    pub fn resolve(self, defaults: &QueryDefaults) -> Selectors {
        Selectors {
            time_index: self.time_index.unwrap_or(defaults.time_index),
            level_index: self.level_index.unwrap_or(defaults.level_index),
            species: self.species.unwrap_or_else(|| defaults.species.clone()),
            data_type: self.data_type.unwrap_or_else(|| defaults.data_type.clone()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TimeParams {
    pub time_index: Option<i64>,
}

/// GET /pollution - point features for the selected slice
pub async fn features_handler(
    Extension(state): Extension<Arc<AppState>>,
    params: Result<Query<SelectorParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    metrics::record_request("features");
    let Query(params) = params.map_err(bad_query)?;
    let sel = params.resolve(&state.config.defaults);

    let dataset = state.registry.current()?;
    let (_, slice) = dataset.query(sel.time_index, sel.level_index, &sel.species, &sel.data_type)?;

    let count = positive_count(&slice);
    if let Some(limit) = state.config.features.max_features {
        if count > limit {
            return Err(ApiError::TooManyFeatures { count, limit });
        }
    }

    let time = dataset.time_label(sel.time_index)?;
    let collection = project(&slice, dataset.grid())?.with_time(time);
    metrics::record_features(collection.len());

    debug!(
        dataset = dataset.id(),
        time_index = sel.time_index,
        level_index = sel.level_index,
        species = %sel.species,
        data_type = %sel.data_type,
        features = collection.len(),
        "Features projected"
    );

    Ok(([(header::CONTENT_TYPE, media_types::GEO_JSON)], Json(collection)).into_response())
}

/// GET /pollution/image - PNG raster for the selected slice
pub async fn image_handler(
    Extension(state): Extension<Arc<AppState>>,
    params: Result<Query<SelectorParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    metrics::record_request("image");
    let Query(params) = params.map_err(bad_query)?;
    let sel = params.resolve(&state.config.defaults);

    let dataset = state.registry.current()?;
    let (_, slice) = dataset.query(sel.time_index, sel.level_index, &sel.species, &sel.data_type)?;
    let units = dataset.units(&sel.data_type).map(str::to_string);

    let renderer = Arc::clone(&state.renderer);
    let start = Instant::now();
    let image = tokio::task::spawn_blocking(move || renderer.render(&slice, dataset.grid(), units.as_deref()))
        .await
        .map_err(|e| RenderError::failed(format!("render task failed: {}", e)))??;
    metrics::record_render(start.elapsed());

    debug!(
        width = image.width,
        height = image.height,
        bytes = image.png.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Image rendered"
    );

    Ok((
        [
            (header::CONTENT_TYPE, media_types::PNG),
            (header::CACHE_CONTROL, "no-store"),
        ],
        image.png,
    )
        .into_response())
}

/// GET /pollution/bounds
pub async fn bounds_handler(Extension(state): Extension<Arc<AppState>>) -> Result<Json<BoundsResponse>, ApiError> {
    metrics::record_request("bounds");
    let dataset = state.registry.current()?;
    Ok(Json(dataset.bounds().into()))
}

/// GET /pollution/time?time_index=
pub async fn time_handler(
    Extension(state): Extension<Arc<AppState>>,
    params: Result<Query<TimeParams>, QueryRejection>,
) -> Result<Json<TimeResponse>, ApiError> {
    metrics::record_request("time");
    let Query(params) = params.map_err(bad_query)?;
    let dataset = state.registry.current()?;
    let index = params.time_index.unwrap_or(state.config.defaults.time_index);

    Ok(Json(TimeResponse {
        time: dataset.time_label(index)?,
        max_time_index: dataset.max_time_index(),
    }))
}

/// GET /pollution/species
pub async fn species_handler(Extension(state): Extension<Arc<AppState>>) -> Result<Json<SpeciesResponse>, ApiError> {
    metrics::record_request("species");
    let dataset = state.registry.current()?;
    Ok(Json(SpeciesResponse {
        species_names: dataset.species_names().to_vec(),
    }))
}

/// GET /pollution/data_types
pub async fn data_types_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<DataTypesResponse>, ApiError> {
    metrics::record_request("data_types");
    let dataset = state.registry.current()?;
    Ok(Json(DataTypesResponse {
        data_types: dataset.data_types().to_vec(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_defaults() {
        let sel = SelectorParams::default().resolve(&QueryDefaults::default());
        assert_eq!(
            sel,
            Selectors {
                time_index: 0,
                level_index: 0,
                species: "PM".into(),
                data_type: "trajReconstructed".into(),
            }
        );
    }

    #[test]
    fn test_selector_overrides() {
        let params = SelectorParams {
            time_index: Some(4),
            species: Some("CO".into()),
            ..Default::default()
        };
        let sel = params.resolve(&QueryDefaults::default());
        assert_eq!(sel.time_index, 4);
        assert_eq!(sel.level_index, 0);
        assert_eq!(sel.species, "CO");
    }
}

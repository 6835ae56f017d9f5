//! Application state shared by all handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::warn;

use renderer::Renderer;

use crate::config::ServiceConfig;
use crate::registry::{DatasetLoader, DatasetRegistry};

pub struct AppState {
    pub config: ServiceConfig,
    pub registry: DatasetRegistry,
    pub renderer: Arc<Renderer>,
    pub metrics: PrometheusHandle,
}

impl AppState {
    pub fn new(config: ServiceConfig, loader: Arc<dyn DatasetLoader>, metrics: PrometheusHandle) -> Self {
        let registry = DatasetRegistry::new(
            config.data_dir.clone(),
            config.upload.extensions.clone(),
            config.schema.clone(),
            config.dataset_cache_size,
            loader,
        );
        let renderer = Arc::new(Renderer::new(config.render.clone()));
        if config.render.legend && !renderer.has_font() {
            warn!("Legend font unavailable, legend labels are disabled");
        }

        Self {
            config,
            registry,
            renderer,
            metrics,
        }
    }

    /// Activate the configured default dataset.
    ///
    /// A failure is logged and the service starts without a dataset; data
    /// endpoints answer 503 until one is selected or uploaded.
    pub async fn activate_default(&self) {
        let Some(name) = self.config.default_dataset.as_deref() else {
            return;
        };
        let path = std::path::Path::new(name);
        let result = if path.is_absolute() || path.components().count() > 1 {
            self.registry.activate_path(path).await
        } else {
            self.registry.set_current(name).await
        };
        if let Err(e) = result {
            warn!(dataset = name, error = %e, "Default dataset not activated");
        }
    }
}

//! Service configuration loaded from YAML.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use grid_dataset::SchemaConfig;
use renderer::RenderOptions;

/// Top-level service configuration. Every field has a default, so an empty
/// or partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory holding dataset files; uploads land here too.
    pub data_dir: PathBuf,

    /// Dataset activated at startup, relative to `data_dir`.
    pub default_dataset: Option<String>,

    /// Number of opened datasets kept in memory.
    pub dataset_cache_size: usize,

    /// Allowed CORS origins; empty means permissive.
    pub cors_origins: Vec<String>,

    pub defaults: QueryDefaults,
    pub schema: SchemaConfig,
    pub render: RenderOptions,
    pub features: FeatureLimits,
    pub upload: UploadConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            default_dataset: Some("res_annotated.nc".to_string()),
            dataset_cache_size: 4,
            cors_origins: Vec::new(),
            defaults: QueryDefaults::default(),
            schema: SchemaConfig::default(),
            render: RenderOptions::default(),
            features: FeatureLimits::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load from a YAML file, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read: {:?}", path))?;
        let config: Self =
            serde_yaml::from_str(&content).with_context(|| format!("Failed to parse config: {:?}", path))?;

        tracing::info!(
            path = %path.display(),
            data_dir = %config.data_dir.display(),
            default_dataset = ?config.default_dataset,
            "Loaded service config"
        );
        Ok(config)
    }
}

/// Selector values used when a query parameter is omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDefaults {
    pub time_index: i64,
    pub level_index: i64,
    pub species: String,
    pub data_type: String,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            time_index: 0,
            level_index: 0,
            species: "PM".to_string(),
            data_type: "trajReconstructed".to_string(),
        }
    }
}

/// Optional cap on feature collection size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureLimits {
    /// Reject collections with more features than this.
    pub max_features: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Accepted file extensions, without the dot, case-insensitive.
    pub extensions: Vec<String>,
    pub max_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["nc".to_string(), "nc4".to_string(), "cdf".to_string()],
            max_bytes: 512 * 1024 * 1024,
        }
    }
}

impl UploadConfig {
    pub fn allows(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ServiceConfig::load(Path::new("/nonexistent/pollution.yaml")).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.defaults.species, "PM");
        assert_eq!(config.render.level_count, 20);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
data_dir: /srv/pollution
defaults:
  species: CO
render:
  color_scale: magma
features:
  max_features: 1000
schema:
  variables: [trajReconstructed]
"#;
        let config: ServiceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/pollution"));
        assert_eq!(config.defaults.species, "CO");
        assert_eq!(config.defaults.data_type, "trajReconstructed");
        assert_eq!(config.render.color_scale, renderer::ColorScale::Magma);
        assert_eq!(config.features.max_features, Some(1000));
        assert_eq!(config.schema.variables, vec!["trajReconstructed".to_string()]);
        assert_eq!(config.upload, UploadConfig::default());
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pollution.yaml");
        std::fs::write(&path, "render: [not, a, map]").unwrap();
        assert!(ServiceConfig::load(&path).is_err());
    }

    #[test]
    fn test_upload_extensions() {
        let upload = UploadConfig::default();
        assert!(upload.allows("run.nc"));
        assert!(upload.allows("RUN.NC4"));
        assert!(!upload.allows("run.csv"));
        assert!(!upload.allows("nc"));
    }
}

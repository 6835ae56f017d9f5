//! The active dataset and the cache of opened datasets.
//!
//! Readers take an `Arc<GridDataset>` snapshot under a short read lock and
//! keep it for the whole request; a swap only rebinds which snapshot is
//! current and never touches one that is already handed out. Swaps are
//! serialised by an async mutex and do all their loading before the
//! rebind, so a failed candidate leaves the current dataset in place.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

use lru::LruCache;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use grid_dataset::{DatasetError, GridDataset, SchemaConfig};

/// Opens and validates dataset files.
pub trait DatasetLoader: Send + Sync + 'static {
    fn load(&self, path: &Path, schema: &SchemaConfig) -> Result<GridDataset, DatasetError>;
}

/// Loads NetCDF files from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetCdfLoader;

impl DatasetLoader for NetCdfLoader {
    fn load(&self, path: &Path, schema: &SchemaConfig) -> Result<GridDataset, DatasetError> {
        GridDataset::open(path, schema)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no dataset is active")]
    NoActiveDataset,

    #[error("dataset '{0}' not found")]
    NotFound(String),

    #[error("invalid dataset name '{0}'")]
    InvalidName(String),

    #[error("dataset '{name}' is invalid: {source}")]
    InvalidDataset {
        name: String,
        #[source]
        source: DatasetError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset task failed: {0}")]
    Task(String),
}

impl RegistryError {
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::NoActiveDataset => "NoActiveDataset",
            RegistryError::NotFound(_) => "DatasetNotFound",
            RegistryError::InvalidName(_) => "InvalidDatasetName",
            RegistryError::InvalidDataset { .. } => "InvalidDataset",
            RegistryError::Io(_) => "IoError",
            RegistryError::Task(_) => "TaskFailed",
        }
    }
}

/// Identity of a file on disk; a rewritten file gets a new key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub path: PathBuf,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileKey {
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let path = path.canonicalize()?;
        let meta = std::fs::metadata(&path)?;
        Ok(Self {
            path,
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// Result of a successful swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    pub current: String,
    pub previous: Option<String>,
}

type DatasetCache = Arc<Mutex<LruCache<FileKey, Arc<GridDataset>>>>;

pub struct DatasetRegistry {
    data_dir: PathBuf,
    extensions: Vec<String>,
    schema: Arc<SchemaConfig>,
    loader: Arc<dyn DatasetLoader>,
    current: RwLock<Option<Arc<GridDataset>>>,
    swap_lock: tokio::sync::Mutex<()>,
    cache: DatasetCache,
}

impl std::fmt::Debug for DatasetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetRegistry")
            .field("data_dir", &self.data_dir)
            .field("current", &self.current_id())
            .finish()
    }
}

impl DatasetRegistry {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        extensions: Vec<String>,
        schema: SchemaConfig,
        cache_size: usize,
        loader: Arc<dyn DatasetLoader>,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            data_dir: data_dir.into(),
            extensions,
            schema: Arc::new(schema),
            loader,
            current: RwLock::new(None),
            swap_lock: tokio::sync::Mutex::new(()),
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Snapshot of the active dataset.
    pub fn current(&self) -> Result<Arc<GridDataset>, RegistryError> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(RegistryError::NoActiveDataset)
    }

    pub fn current_id(&self) -> Option<String> {
        self.current().ok().map(|ds| ds.id().to_string())
    }

    /// Dataset files in the data directory, sorted by name.
    pub fn list(&self) -> Result<Vec<String>, RegistryError> {
        if !self.data_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.data_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| RegistryError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if !name.starts_with('.') && self.allows(name) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Switch to the dataset file `name` inside the data directory.
    pub async fn set_current(&self, name: &str) -> Result<SwapOutcome, RegistryError> {
        self.check_name(name)?;
        let path = self.data_dir.join(name);
        if !path.is_file() {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        self.activate_path(&path).await
    }

    /// Switch to a dataset at an arbitrary path.
    pub async fn activate_path(&self, path: &Path) -> Result<SwapOutcome, RegistryError> {
        let _guard = self.swap_lock.lock().await;
        let dataset = self.load_cached(path).await?;
        Ok(self.rebind(dataset))
    }

    /// Validate a staged upload, move it into the data directory as `name`
    /// and make it current. The staged file is removed if it is invalid.
    pub async fn install_upload(&self, staged: &Path, name: &str) -> Result<SwapOutcome, RegistryError> {
        self.check_name(name)?;
        let _guard = self.swap_lock.lock().await;

        let staged_owned = staged.to_path_buf();
        let loader = Arc::clone(&self.loader);
        let schema = Arc::clone(&self.schema);
        let loaded = tokio::task::spawn_blocking(move || loader.load(&staged_owned, &schema))
            .await
            .map_err(|e| RegistryError::Task(e.to_string()))?;

        let dataset = match loaded {
            Ok(dataset) => dataset,
            Err(source) => {
                if let Err(e) = tokio::fs::remove_file(staged).await {
                    warn!(path = %staged.display(), error = %e, "Failed to remove rejected upload");
                }
                return Err(RegistryError::InvalidDataset {
                    name: name.to_string(),
                    source,
                });
            }
        };

        let target = self.data_dir.join(name);
        tokio::fs::rename(staged, &target).await?;
        let dataset = Arc::new(dataset.with_id(name));

        let key = FileKey::of(&target)?;
        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            evict_stale(&mut cache, &key);
            cache.put(key, Arc::clone(&dataset));
        }

        info!(dataset = name, path = %target.display(), "Installed uploaded dataset");
        Ok(self.rebind(dataset))
    }

    fn rebind(&self, dataset: Arc<GridDataset>) -> SwapOutcome {
        let current = dataset.id().to_string();
        let previous = {
            let mut slot = self.current.write().unwrap_or_else(|e| e.into_inner());
            slot.replace(dataset).map(|old| old.id().to_string())
        };
        info!(current = %current, previous = ?previous, "Active dataset switched");
        SwapOutcome { current, previous }
    }

    /// Open a dataset through the cache on the blocking pool.
    async fn load_cached(&self, path: &Path) -> Result<Arc<GridDataset>, RegistryError> {
        let path = path.to_path_buf();
        let loader = Arc::clone(&self.loader);
        let schema = Arc::clone(&self.schema);
        let cache = Arc::clone(&self.cache);

        tokio::task::spawn_blocking(move || -> Result<Arc<GridDataset>, RegistryError> {
            let key = FileKey::of(&path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RegistryError::NotFound(path.display().to_string()),
                _ => RegistryError::Io(e),
            })?;

            {
                let mut cache = cache.lock().unwrap_or_else(|e| e.into_inner());
                evict_stale(&mut cache, &key);
                if let Some(hit) = cache.get(&key) {
                    debug!(path = %key.path.display(), "Dataset cache hit");
                    return Ok(Arc::clone(hit));
                }
            }

            let name = display_name(&path);
            let dataset = loader
                .load(&path, &schema)
                .map(|ds| Arc::new(ds.with_id(name.clone())))
                .map_err(|source| RegistryError::InvalidDataset { name, source })?;

            cache
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .put(key, Arc::clone(&dataset));
            Ok(dataset)
        })
        .await
        .map_err(|e| RegistryError::Task(e.to_string()))?
    }

    fn allows(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    /// Names must be plain file names with an allowed extension.
    fn check_name(&self, name: &str) -> Result<(), RegistryError> {
        let plain = Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name);
        if name.is_empty() || !plain || name.starts_with('.') || !self.allows(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        Ok(())
    }
}

/// Drop entries for the same path whose identity changed.
fn evict_stale(cache: &mut LruCache<FileKey, Arc<GridDataset>>, key: &FileKey) {
    let stale: Vec<FileKey> = cache
        .iter()
        .filter(|(k, _)| k.path == key.path && *k != key)
        .map(|(k, _)| k.clone())
        .collect();
    for k in stale {
        debug!(path = %k.path.display(), "Evicting stale dataset");
        cache.pop(&k);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

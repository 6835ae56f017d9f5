//! Gridded pollution datasets.
//!
//! This crate turns a NetCDF file with loosely standardised names into a
//! validated, immutable [`GridDataset`] that answers selector queries.
//!
//! # Pipeline
//!
//! 1. [`native::load_netcdf`] reads the file into an in-memory [`Dataset`]
//! 2. [`schema::normalize_coordinates`] renames coordinate aliases once
//! 3. [`schema::resolve`] maps the dataset onto time/level/species/spatial
//!    roles and the allow-listed data variables
//! 4. [`selection::validate`] turns user selectors into a [`Selection`]
//! 5. [`extract::extract`] gathers the 2-D [`Slice`] by dimension name
//!
//! A [`GridDataset`] bundles the dataset with its schema and coordinate
//! grid. It is never mutated after construction, so a request that holds
//! one sees a consistent snapshot for its whole lifetime.

pub mod dataset;
pub mod error;
pub mod extract;
pub mod grid;
pub mod native;
pub mod schema;
pub mod selection;
pub mod time;

pub use dataset::{AttrValue, Dataset, Dimension, Variable, VariableData};
pub use error::{
    DatasetError, DatasetResult, ExtractionError, QueryError, SchemaError, SelectorDimension,
    ValidationError,
};
pub use extract::{extract, Slice};
pub use grid::{Bounds, CoordinateGrid, SpatialAxes};
pub use native::{load_netcdf, silence_hdf5_errors};
pub use schema::{normalize_coordinates, resolve, Schema, SchemaConfig};
pub use selection::{validate, Selection};

use std::path::Path;

use tracing::info;

/// A dataset together with its resolved schema and coordinate grid.
#[derive(Debug, Clone)]
pub struct GridDataset {
    id: String,
    dataset: Dataset,
    schema: Schema,
    grid: CoordinateGrid,
    bounds: Bounds,
}

impl GridDataset {
    /// Load, normalise and resolve a NetCDF file.
    ///
    /// This is blocking and can take a while for large files.
    pub fn open(path: &Path, config: &SchemaConfig) -> DatasetResult<Self> {
        let dataset = native::load_netcdf(path)?;
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_dataset(id, dataset, config)
    }

    /// Validate an in-memory dataset.
    pub fn from_dataset(id: impl Into<String>, mut dataset: Dataset, config: &SchemaConfig) -> DatasetResult<Self> {
        let id = id.into();
        normalize_coordinates(&mut dataset, config);
        let schema = resolve(&dataset, config)?;
        let grid = CoordinateGrid::from_dataset(&dataset, &schema.spatial)?;
        let bounds = grid
            .bounds()
            .ok_or_else(|| SchemaError::InvalidCoordinates("no finite coordinates".to_string()))?;

        info!(
            dataset = %id,
            times = schema.time.extent(),
            levels = schema.level.extent,
            species = schema.species.names.len(),
            rows = schema.spatial.rows,
            cols = schema.spatial.cols,
            variables = ?schema.variables,
            "Dataset resolved"
        );

        Ok(Self {
            id,
            dataset,
            schema,
            grid,
            bounds,
        })
    }

    /// Same dataset under a different identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn grid(&self) -> &CoordinateGrid {
        &self.grid
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn species_names(&self) -> &[String] {
        &self.schema.species.names
    }

    pub fn data_types(&self) -> &[String] {
        &self.schema.variables
    }

    /// Largest valid time index (0 for an empty time axis).
    pub fn max_time_index(&self) -> usize {
        self.schema.time.extent().saturating_sub(1)
    }

    /// Formatted timestamp at a time index.
    pub fn time_label(&self, index: i64) -> Result<String, ValidationError> {
        let extent = self.schema.time.extent();
        usize::try_from(index)
            .ok()
            .and_then(|i| self.schema.time.timestamps.get(i))
            .map(time::format_label)
            .ok_or(ValidationError::IndexOutOfBounds {
                dimension: SelectorDimension::Time,
                requested: index,
                extent,
            })
    }

    /// The `units` attribute of a data variable.
    pub fn units(&self, variable: &str) -> Option<&str> {
        self.dataset.variable(variable).and_then(Variable::units)
    }

    /// Validate selectors and extract the slice from this snapshot.
    pub fn query(
        &self,
        time_index: i64,
        level_index: i64,
        species: &str,
        variable: &str,
    ) -> Result<(Selection, Slice), QueryError> {
        let selection = validate(&self.schema, time_index, level_index, species, variable)?;
        let slice = extract(&self.dataset, &self.schema, &selection)?;
        Ok((selection, slice))
    }
}

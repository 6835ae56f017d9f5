//! Schema resolution: mapping a loosely named dataset onto canonical roles.
//!
//! Input files disagree on coordinate names (`lat` vs `latitude` vs `XLAT`),
//! time encodings (character stamps vs numeric offsets) and which data
//! variables they carry. [`normalize_coordinates`] fixes the coordinate
//! names once at load time; [`resolve`] then reads the dataset without
//! mutating it and produces a [`Schema`] that every later step consumes.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::{AttrValue, Dataset, Variable, VariableData};
use crate::error::SchemaError;
use crate::grid::{spatial_axes, SpatialAxes, LATITUDE, LONGITUDE};
use crate::time::{self, TimeUnit};

/// Candidate names and time-decoding policy used during resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Time coordinate variables, first match wins.
    pub time_candidates: Vec<String>,
    /// Vertical level dimensions (or 1-D level variables).
    pub level_candidates: Vec<String>,
    /// Species catalog variables (2-D character matrices).
    pub species_candidates: Vec<String>,
    /// Allow-list of selectable data variables, in presentation order.
    pub variables: Vec<String>,
    pub latitude_aliases: Vec<String>,
    pub longitude_aliases: Vec<String>,
    /// Global attribute holding the base timestamp of numeric time offsets.
    pub base_time_attribute: String,
    /// Base timestamp used when neither the units nor the attributes name one.
    pub fallback_epoch: String,
    /// Offset unit used when the time variable has no CF units.
    pub default_time_unit: TimeUnit,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }
        Self {
            time_candidates: names(&["Times", "time"]),
            level_candidates: names(&["level", "lev", "bottom_top", "z"]),
            species_candidates: names(&["species_names", "species", "SpeciesNames"]),
            variables: names(&["trajReconstructed", "trajReference"]),
            latitude_aliases: names(&["latitude", "XLAT", "nav_lat"]),
            longitude_aliases: names(&["longitude", "XLONG", "nav_lon"]),
            base_time_attribute: "base_time".to_string(),
            fallback_epoch: "1970-01-01 00:00:00".to_string(),
            default_time_unit: TimeUnit::Hours,
        }
    }
}

/// The time coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    pub variable: String,
    pub dimension: String,
    pub timestamps: Vec<NaiveDateTime>,
}

impl TimeAxis {
    pub fn extent(&self) -> usize {
        self.timestamps.len()
    }
}

/// The vertical level axis. Datasets without one behave as a single level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelAxis {
    pub dimension: Option<String>,
    pub extent: usize,
}

/// The species axis and its decoded catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeciesAxis {
    pub variable: String,
    pub dimension: String,
    pub names: Vec<String>,
}

impl SpeciesAxis {
    /// Catalog position of an exact, case-sensitive name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Canonical description of a dataset's layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub time: TimeAxis,
    pub level: LevelAxis,
    pub species: SpeciesAxis,
    pub spatial: SpatialAxes,
    /// Selectable data variables present in the dataset, allow-list order.
    pub variables: Vec<String>,
}

impl Schema {
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }
}

/// Rename aliased coordinates to the canonical `lat`/`lon`.
///
/// Safe to apply repeatedly: once the canonical name exists nothing is
/// renamed. Returns the renames performed as `(from, to)` pairs.
pub fn normalize_coordinates(dataset: &mut Dataset, config: &SchemaConfig) -> Vec<(String, String)> {
    let mut renamed = Vec::new();
    for (canonical, aliases) in [
        (LATITUDE, &config.latitude_aliases),
        (LONGITUDE, &config.longitude_aliases),
    ] {
        if dataset.has_variable(canonical) {
            continue;
        }
        if let Some(alias) = aliases.iter().find(|a| dataset.has_variable(a)) {
            if dataset.rename_variable(alias, canonical) {
                debug!(from = %alias, to = canonical, "Normalised coordinate name");
                renamed.push((alias.clone(), canonical.to_string()));
            }
        }
    }
    renamed
}

/// Resolve the canonical schema of an (already normalised) dataset.
pub fn resolve(dataset: &Dataset, config: &SchemaConfig) -> Result<Schema, SchemaError> {
    let time = resolve_time(dataset, config)?;
    let spatial = spatial_axes(dataset)?;
    let species = resolve_species(dataset, config)?;
    let level = resolve_level(dataset, config);

    let variables: Vec<String> = config
        .variables
        .iter()
        .filter(|v| dataset.has_variable(v))
        .cloned()
        .collect();
    if variables.is_empty() {
        return Err(SchemaError::NoRecognizedVariables {
            allowed: config.variables.clone(),
        });
    }

    Ok(Schema {
        time,
        level,
        species,
        spatial,
        variables,
    })
}

fn resolve_time(dataset: &Dataset, config: &SchemaConfig) -> Result<TimeAxis, SchemaError> {
    let var = config
        .time_candidates
        .iter()
        .find_map(|name| dataset.variable(name))
        .ok_or_else(|| SchemaError::MissingTimeCoordinate {
            candidates: config.time_candidates.clone(),
        })?;

    let invalid = |reason: String| SchemaError::InvalidTimeCoordinate {
        variable: var.name.clone(),
        reason,
    };

    let dimension = var
        .dims
        .first()
        .cloned()
        .ok_or_else(|| invalid("time coordinate has no dimensions".to_string()))?;

    let timestamps = match (&var.data, var.ndim()) {
        (VariableData::Bytes(bytes), 2) => {
            time::decode_char_times(bytes, var.shape[0], var.shape[1]).map_err(invalid)?
        }
        (VariableData::Bytes(_), n) => {
            return Err(invalid(format!("character time coordinate has {} dimensions", n)));
        }
        (_, 1) => decode_numeric_times(dataset, var, config).map_err(invalid)?,
        (_, n) => {
            return Err(invalid(format!("numeric time coordinate has {} dimensions", n)));
        }
    };

    Ok(TimeAxis {
        variable: var.name.clone(),
        dimension,
        timestamps,
    })
}

/// Numeric offsets: base from CF units, then the global attribute, then the
/// fallback epoch.
fn decode_numeric_times(
    dataset: &Dataset,
    var: &Variable,
    config: &SchemaConfig,
) -> Result<Vec<NaiveDateTime>, String> {
    let cf = var.units().and_then(time::parse_cf_units);
    let unit = cf.map(|(unit, _)| unit).unwrap_or(config.default_time_unit);

    let base = cf
        .and_then(|(_, base)| base)
        .or_else(|| match dataset.attribute(&config.base_time_attribute)? {
            AttrValue::Text(text) => time::parse_timestamp(text),
            other => {
                // numeric base times are seconds since the Unix epoch
                let secs = other.as_number()?;
                chrono::DateTime::from_timestamp(secs as i64, 0).map(|dt| dt.naive_utc())
            }
        })
        .or_else(|| time::parse_timestamp(&config.fallback_epoch))
        .ok_or_else(|| format!("fallback epoch '{}' is not a timestamp", config.fallback_epoch))?;

    var.data
        .to_f64_vec()
        .into_iter()
        .map(|offset| {
            time::offset_to_datetime(base, offset, unit)
                .ok_or_else(|| format!("time offset {} is not representable", offset))
        })
        .collect()
}

fn resolve_species(dataset: &Dataset, config: &SchemaConfig) -> Result<SpeciesAxis, SchemaError> {
    let var = config
        .species_candidates
        .iter()
        .find_map(|name| dataset.variable(name))
        .ok_or_else(|| SchemaError::MissingSpeciesCatalog {
            candidates: config.species_candidates.clone(),
        })?;

    let bytes = match (var.data.as_bytes(), var.ndim()) {
        (Some(bytes), 2) => bytes,
        _ => {
            return Err(SchemaError::InvalidSpeciesCatalog {
                variable: var.name.clone(),
            })
        }
    };

    let (rows, width) = (var.shape[0], var.shape[1]);
    let names = (0..rows)
        .map(|row| decode_name(&bytes[row * width..(row + 1) * width]))
        .collect();

    Ok(SpeciesAxis {
        variable: var.name.clone(),
        dimension: var.dims[0].clone(),
        names,
    })
}

/// One fixed-width catalog row: lossy UTF-8, trailing NULs and blanks removed.
fn decode_name(row: &[u8]) -> String {
    String::from_utf8_lossy(row)
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

fn resolve_level(dataset: &Dataset, config: &SchemaConfig) -> LevelAxis {
    for name in &config.level_candidates {
        if let Some(extent) = dataset.dimension_len(name) {
            return LevelAxis {
                dimension: Some(name.clone()),
                extent,
            };
        }
        if let Some(var) = dataset.variable(name) {
            if let (1, Some(dim)) = (var.ndim(), var.dims.first()) {
                return LevelAxis {
                    dimension: Some(dim.clone()),
                    extent: var.shape[0],
                };
            }
        }
    }
    LevelAxis {
        dimension: None,
        extent: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_dataset() -> Dataset {
        let mut ds = Dataset::new();
        for (name, len) in [("Time", 2), ("DateStrLen", 19), ("species", 2), ("name_len", 4), ("level", 3), ("y", 2), ("x", 2)] {
            ds.add_dimension(name, len).unwrap();
        }
        ds.add_variable(Variable::new(
            "Times",
            &["Time", "DateStrLen"],
            VariableData::Bytes(b"2023-01-01_00:00:002023-01-01_03:00:00".to_vec()),
        ))
        .unwrap();
        ds.add_variable(Variable::new(
            "species_names",
            &["species", "name_len"],
            VariableData::Bytes(b"CO\0\0PM  ".to_vec()),
        ))
        .unwrap();
        ds.add_variable(Variable::new("latitude", &["y", "x"], VariableData::Float(vec![1.0, 1.0, 0.0, 0.0])))
            .unwrap();
        ds.add_variable(Variable::new("longitude", &["y", "x"], VariableData::Float(vec![0.0, 1.0, 0.0, 1.0])))
            .unwrap();
        ds.add_variable(Variable::new(
            "trajReconstructed",
            &["species", "Time", "level", "y", "x"],
            VariableData::Float(vec![0.0; 2 * 2 * 3 * 4]),
        ))
        .unwrap();
        ds
    }

    #[test]
    fn test_resolve_full_schema() {
        let config = SchemaConfig::default();
        let mut ds = base_dataset();
        normalize_coordinates(&mut ds, &config);

        let schema = resolve(&ds, &config).unwrap();
        assert_eq!(schema.time.variable, "Times");
        assert_eq!(schema.time.dimension, "Time");
        assert_eq!(schema.time.extent(), 2);
        assert_eq!(time::format_label(&schema.time.timestamps[1]), "2023-01-01 03:00:00");
        assert_eq!(schema.level, LevelAxis { dimension: Some("level".into()), extent: 3 });
        assert_eq!(schema.species.names, vec!["CO", "PM"]);
        assert_eq!(schema.species.dimension, "species");
        assert_eq!(schema.spatial.row_dim, "y");
        assert_eq!(schema.variables, vec!["trajReconstructed"]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let config = SchemaConfig::default();
        let mut ds = base_dataset();

        let first = normalize_coordinates(&mut ds, &config);
        assert_eq!(first.len(), 2);
        let schema_a = resolve(&ds, &config).unwrap();

        let second = normalize_coordinates(&mut ds, &config);
        assert!(second.is_empty());
        let schema_b = resolve(&ds, &config).unwrap();

        assert_eq!(schema_a, schema_b);
        assert!(ds.has_variable("lat"));
        assert!(!ds.has_variable("latitude"));
    }

    #[test]
    fn test_time_fallback_candidate() {
        let config = SchemaConfig::default();
        let mut ds = base_dataset();
        normalize_coordinates(&mut ds, &config);
        assert!(ds.rename_variable("Times", "Times_unused"));

        assert_eq!(
            resolve(&ds, &config).unwrap_err(),
            SchemaError::MissingTimeCoordinate {
                candidates: vec!["Times".into(), "time".into()]
            }
        );

        ds.add_variable(
            Variable::new("time", &["Time"], VariableData::Double(vec![0.0, 6.0]))
                .with_attribute("units", AttrValue::Text("hours since 2023-01-01 00:00:00".into())),
        )
        .unwrap();
        let schema = resolve(&ds, &config).unwrap();
        assert_eq!(schema.time.variable, "time");
        assert_eq!(time::format_label(&schema.time.timestamps[1]), "2023-01-01 06:00:00");
    }

    #[test]
    fn test_numeric_time_base_precedence() {
        let config = SchemaConfig::default();
        let mut ds = base_dataset();
        normalize_coordinates(&mut ds, &config);
        ds.rename_variable("Times", "Times_unused");
        ds.add_variable(Variable::new("time", &["Time"], VariableData::Double(vec![0.0, 1.0])))
            .unwrap();

        // no units and no attribute: fallback epoch, default unit hours
        let schema = resolve(&ds, &config).unwrap();
        assert_eq!(time::format_label(&schema.time.timestamps[1]), "1970-01-01 01:00:00");

        // global attribute beats the fallback
        ds.set_attribute("base_time", AttrValue::Text("2023-01-01 00:00:00".into()));
        let schema = resolve(&ds, &config).unwrap();
        assert_eq!(time::format_label(&schema.time.timestamps[1]), "2023-01-01 01:00:00");
    }

    #[test]
    fn test_missing_species_catalog() {
        let config = SchemaConfig::default();
        let mut ds = base_dataset();
        normalize_coordinates(&mut ds, &config);
        ds.rename_variable("species_names", "other");

        assert!(matches!(
            resolve(&ds, &config),
            Err(SchemaError::MissingSpeciesCatalog { .. })
        ));
    }

    #[test]
    fn test_no_recognized_variables() {
        let config = SchemaConfig::default();
        let mut ds = base_dataset();
        normalize_coordinates(&mut ds, &config);
        ds.rename_variable("trajReconstructed", "somethingElse");

        assert_eq!(
            resolve(&ds, &config).unwrap_err(),
            SchemaError::NoRecognizedVariables {
                allowed: vec!["trajReconstructed".into(), "trajReference".into()]
            }
        );
    }

    #[test]
    fn test_missing_level_means_single_level() {
        let config = SchemaConfig {
            level_candidates: vec!["plev".into()],
            ..SchemaConfig::default()
        };
        let mut ds = base_dataset();
        normalize_coordinates(&mut ds, &config);

        let schema = resolve(&ds, &config).unwrap();
        assert_eq!(schema.level, LevelAxis { dimension: None, extent: 1 });
    }

    #[test]
    fn test_config_from_partial_yaml() {
        let config: SchemaConfig = serde_yaml::from_str("variables: [trajReference]\n").unwrap();
        assert_eq!(config.variables, vec!["trajReference"]);
        assert_eq!(config.time_candidates, vec!["Times", "time"]);
        assert_eq!(config.default_time_unit, TimeUnit::Hours);
    }
}

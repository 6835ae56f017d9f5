//! Error types for dataset loading, schema resolution, validation and extraction.
//!
//! The split mirrors who is at fault: [`ValidationError`] means the caller
//! asked for something that does not exist ("try a different value"), while
//! [`SchemaError`] and [`ExtractionError`] mean the dataset itself is
//! unusable or inconsistent.

use thiserror::Error;

/// Result type for dataset loading operations.
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Errors raised while opening or assembling a dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The NetCDF library rejected the file or a read
    #[error("NetCDF error: {0}")]
    NetCdf(String),

    /// A variable or dimension is structurally inconsistent
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// The dataset opened but its schema could not be resolved
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// The dataset is structurally unusable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("no time coordinate found (tried {candidates:?})")]
    MissingTimeCoordinate { candidates: Vec<String> },

    #[error("missing spatial coordinate '{0}'")]
    MissingSpatialCoordinate(String),

    #[error("no species catalog found (tried {candidates:?})")]
    MissingSpeciesCatalog { candidates: Vec<String> },

    #[error("species catalog '{variable}' is not a 2-D character matrix")]
    InvalidSpeciesCatalog { variable: String },

    #[error("none of the recognised data variables {allowed:?} are present")]
    NoRecognizedVariables { allowed: Vec<String> },

    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("invalid time coordinate '{variable}': {reason}")]
    InvalidTimeCoordinate { variable: String, reason: String },
}

/// Dimension a selector index applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorDimension {
    Time,
    Level,
    Species,
}

impl std::fmt::Display for SelectorDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectorDimension::Time => write!(f, "time"),
            SelectorDimension::Level => write!(f, "level"),
            SelectorDimension::Species => write!(f, "species"),
        }
    }
}

/// A caller-supplied selector does not match the dataset.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{dimension} index {requested} out of range (valid: 0..{extent})")]
    IndexOutOfBounds {
        dimension: SelectorDimension,
        requested: i64,
        extent: usize,
    },

    #[error("unknown species '{requested}'")]
    UnknownSpecies { requested: String },

    #[error("unknown data type '{requested}' (available: {available:?})")]
    UnknownVariable {
        requested: String,
        available: Vec<String>,
    },
}

/// The resolved schema and the stored data disagree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("variable '{0}' is absent from the dataset")]
    VariableAbsent(String),

    #[error("variable '{variable}' does not reduce to the {expected:?} grid: {detail}")]
    ShapeMismatch {
        variable: String,
        expected: (usize, usize),
        detail: String,
    },

    /// The variable has no axis for a selector, so only index 0 is meaningful.
    #[error("variable '{variable}' has no {dimension} axis; {dimension} index {index} cannot be selected")]
    AxisNotStored {
        variable: String,
        dimension: SelectorDimension,
        index: usize,
    },
}

/// Anything that can go wrong between receiving selectors and holding a slice.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl DatasetError {
    /// Short name of the failure, used as the exception `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            DatasetError::IoError(_) => "IoError",
            DatasetError::NetCdf(_) => "NetCdfError",
            DatasetError::InvalidFormat(_) => "InvalidFormat",
            DatasetError::Schema(e) => e.kind(),
        }
    }
}

impl SchemaError {
    pub fn kind(&self) -> &'static str {
        match self {
            SchemaError::MissingTimeCoordinate { .. } => "MissingTimeCoordinate",
            SchemaError::MissingSpatialCoordinate(_) => "MissingSpatialCoordinate",
            SchemaError::MissingSpeciesCatalog { .. } => "MissingSpeciesCatalog",
            SchemaError::InvalidSpeciesCatalog { .. } => "InvalidSpeciesCatalog",
            SchemaError::NoRecognizedVariables { .. } => "NoRecognizedVariables",
            SchemaError::InvalidCoordinates(_) => "InvalidCoordinates",
            SchemaError::InvalidTimeCoordinate { .. } => "InvalidTimeCoordinate",
        }
    }
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::IndexOutOfBounds { .. } => "IndexOutOfBounds",
            ValidationError::UnknownSpecies { .. } => "UnknownSpecies",
            ValidationError::UnknownVariable { .. } => "UnknownVariable",
        }
    }
}

impl ExtractionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::VariableAbsent(_) => "VariableAbsent",
            ExtractionError::ShapeMismatch { .. } => "ShapeMismatch",
            ExtractionError::AxisNotStored { .. } => "AxisNotStored",
        }
    }
}

impl QueryError {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Validation(e) => e.kind(),
            QueryError::Extraction(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_see_through_wrappers() {
        let schema = DatasetError::from(SchemaError::MissingSpatialCoordinate("lat".into()));
        assert_eq!(schema.kind(), "MissingSpatialCoordinate");

        let query = QueryError::from(ValidationError::UnknownSpecies { requested: "co".into() });
        assert_eq!(query.kind(), "UnknownSpecies");
        assert_eq!(query.to_string(), "unknown species 'co'");

        let extraction = QueryError::from(ExtractionError::VariableAbsent("trajReference".into()));
        assert_eq!(extraction.kind(), "VariableAbsent");
    }
}

//! Selector validation.

use crate::error::{SelectorDimension, ValidationError};
use crate::schema::Schema;

/// A fully validated selection. Only [`validate`] constructs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    time_index: usize,
    level_index: usize,
    species_index: usize,
    variable: String,
}

impl Selection {
    pub fn time_index(&self) -> usize {
        self.time_index
    }

    pub fn level_index(&self) -> usize {
        self.level_index
    }

    pub fn species_index(&self) -> usize {
        self.species_index
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }
}

/// Check caller-supplied selectors against a schema.
///
/// Checks run in a fixed order (time, level, species, variable) so the same
/// bad request always reports the same error.
pub fn validate(
    schema: &Schema,
    time_index: i64,
    level_index: i64,
    species: &str,
    variable: &str,
) -> Result<Selection, ValidationError> {
    let time_index = check_index(SelectorDimension::Time, time_index, schema.time.extent())?;
    let level_index = check_index(SelectorDimension::Level, level_index, schema.level.extent)?;

    let species_index = schema
        .species
        .index_of(species)
        .ok_or_else(|| ValidationError::UnknownSpecies {
            requested: species.to_string(),
        })?;

    if !schema.has_variable(variable) {
        return Err(ValidationError::UnknownVariable {
            requested: variable.to_string(),
            available: schema.variables.clone(),
        });
    }

    Ok(Selection {
        time_index,
        level_index,
        species_index,
        variable: variable.to_string(),
    })
}

fn check_index(dimension: SelectorDimension, requested: i64, extent: usize) -> Result<usize, ValidationError> {
    usize::try_from(requested)
        .ok()
        .filter(|&i| i < extent)
        .ok_or(ValidationError::IndexOutOfBounds {
            dimension,
            requested,
            extent,
        })
}

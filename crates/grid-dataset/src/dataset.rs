//! In-memory representation of an opened gridded dataset.
//!
//! A [`Dataset`] is a plain value: named dimensions, named variables and
//! global attributes. It is filled once by the NetCDF loader (or by hand in
//! tests) and never mutated after it has been published to readers.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::error::{DatasetError, DatasetResult};

/// A named dimension and its length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
}

/// Attribute value attached to a variable or to the dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Numbers(Vec<f64>),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            AttrValue::Numbers(v) => v.first().copied(),
            AttrValue::Text(_) => None,
        }
    }
}

/// Raw storage of a variable's values in row-major (C) order.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableData {
    Float(Vec<f32>),
    Double(Vec<f64>),
    /// Character and byte arrays (species names, WRF style time stamps).
    Bytes(Vec<u8>),
}

impl VariableData {
    pub fn len(&self) -> usize {
        match self {
            VariableData::Float(v) => v.len(),
            VariableData::Double(v) => v.len(),
            VariableData::Bytes(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at a flat offset, widened to f64.
    #[inline]
    pub fn get_f64(&self, offset: usize) -> Option<f64> {
        match self {
            VariableData::Float(v) => v.get(offset).map(|&x| x as f64),
            VariableData::Double(v) => v.get(offset).copied(),
            VariableData::Bytes(v) => v.get(offset).map(|&x| x as f64),
        }
    }

    /// All values widened to f64.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            VariableData::Float(v) => v.iter().map(|&x| x as f64).collect(),
            VariableData::Double(v) => v.clone(),
            VariableData::Bytes(v) => v.iter().map(|&x| x as f64).collect(),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            VariableData::Bytes(v) => Some(v),
            _ => None,
        }
    }
}

/// A named n-dimensional array.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub data: VariableData,
    pub attributes: HashMap<String, AttrValue>,
}

impl Variable {
    /// Create a variable; the shape is filled in when it is added to a dataset.
    pub fn new(name: impl Into<String>, dims: &[&str], data: VariableData) -> Self {
        Self {
            name: name.into(),
            dims: dims.iter().map(|d| d.to_string()).collect(),
            shape: Vec::new(),
            data,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Position of a named dimension in this variable's dimension list.
    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    /// Row-major strides for each axis.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.shape.len()];
        for axis in (0..self.shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.shape[axis + 1];
        }
        strides
    }

    /// The `units` attribute, if the variable carries one.
    pub fn units(&self) -> Option<&str> {
        self.attribute("units").and_then(AttrValue::as_text)
    }
}

/// An opened gridded dataset.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    source: Option<PathBuf>,
    dimensions: Vec<Dimension>,
    variables: BTreeMap<String, Variable>,
    attributes: HashMap<String, AttrValue>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn source(&self) -> Option<&std::path::Path> {
        self.source.as_deref()
    }

    /// Declare a dimension. Re-declaring with the same length is a no-op.
    pub fn add_dimension(&mut self, name: impl Into<String>, len: usize) -> DatasetResult<()> {
        let name = name.into();
        match self.dimension_len(&name) {
            Some(existing) if existing == len => Ok(()),
            Some(existing) => Err(DatasetError::InvalidFormat(format!(
                "dimension '{}' redeclared with length {} (was {})",
                name, len, existing
            ))),
            None => {
                self.dimensions.push(Dimension { name, len });
                Ok(())
            }
        }
    }

    /// Add a variable, checking its dimensions and data length.
    pub fn add_variable(&mut self, mut variable: Variable) -> DatasetResult<()> {
        let mut shape = Vec::with_capacity(variable.dims.len());
        for dim in &variable.dims {
            let len = self.dimension_len(dim).ok_or_else(|| {
                DatasetError::InvalidFormat(format!(
                    "variable '{}' uses undeclared dimension '{}'",
                    variable.name, dim
                ))
            })?;
            shape.push(len);
        }

        let expected: usize = shape.iter().product();
        if expected != variable.data.len() {
            return Err(DatasetError::InvalidFormat(format!(
                "variable '{}' has {} values but shape {:?} needs {}",
                variable.name,
                variable.data.len(),
                shape,
                expected
            )));
        }

        variable.shape = shape;
        self.variables.insert(variable.name.clone(), variable);
        Ok(())
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: AttrValue) {
        self.attributes.insert(name.into(), value);
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().find(|d| d.name == name).map(|d| d.len)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// Rename a variable in place. Returns false when `from` does not exist
    /// or `to` is already taken.
    pub fn rename_variable(&mut self, from: &str, to: &str) -> bool {
        if self.variables.contains_key(to) {
            return false;
        }
        match self.variables.remove(from) {
            Some(mut var) => {
                var.name = to.to_string();
                self.variables.insert(to.to_string(), var);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_variable_records_shape() {
        let mut ds = Dataset::new();
        ds.add_dimension("y", 2).unwrap();
        ds.add_dimension("x", 3).unwrap();
        ds.add_variable(Variable::new(
            "lat",
            &["y", "x"],
            VariableData::Float(vec![0.0; 6]),
        ))
        .unwrap();

        let lat = ds.variable("lat").unwrap();
        assert_eq!(lat.shape, vec![2, 3]);
        assert_eq!(lat.strides(), vec![3, 1]);
    }

    #[test]
    fn test_add_variable_rejects_wrong_length() {
        let mut ds = Dataset::new();
        ds.add_dimension("x", 3).unwrap();
        let err = ds
            .add_variable(Variable::new("v", &["x"], VariableData::Float(vec![1.0])))
            .unwrap_err();
        assert!(err.to_string().contains("needs 3"));
    }

    #[test]
    fn test_add_variable_rejects_unknown_dimension() {
        let mut ds = Dataset::new();
        let err = ds
            .add_variable(Variable::new("v", &["x"], VariableData::Float(vec![])))
            .unwrap_err();
        assert!(err.to_string().contains("undeclared"));
    }

    #[test]
    fn test_dimension_redeclaration() {
        let mut ds = Dataset::new();
        ds.add_dimension("t", 4).unwrap();
        assert!(ds.add_dimension("t", 4).is_ok());
        assert!(ds.add_dimension("t", 5).is_err());
    }

    #[test]
    fn test_rename_variable() {
        let mut ds = Dataset::new();
        ds.add_dimension("x", 1).unwrap();
        ds.add_variable(Variable::new("latitude", &["x"], VariableData::Float(vec![1.0])))
            .unwrap();

        assert!(ds.rename_variable("latitude", "lat"));
        assert!(ds.has_variable("lat"));
        assert!(!ds.has_variable("latitude"));
        assert_eq!(ds.variable("lat").unwrap().name, "lat");
        assert!(!ds.rename_variable("latitude", "lat"));
    }
}

//! Native NetCDF loading using the netcdf library.
//!
//! The whole file is read into a [`Dataset`] up front. Pollution datasets
//! are small enough (a few hundred MB at most) that holding them in memory
//! is cheaper than keeping a libnetcdf handle alive across requests, and it
//! lets the in-memory model be shared between threads without touching HDF5.

use std::path::Path;
use std::sync::Once;

use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::AttributeValue;
use tracing::{debug, warn};

use crate::dataset::{AttrValue, Dataset, Variable, VariableData};
use crate::error::{DatasetError, DatasetResult};

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose diagnostics to stderr even when errors
/// are handled on the Rust side (e.g. when probing optional attributes).
/// Call this early in `main()` before any NetCDF operation; it is safe to
/// call any number of times.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are a
        // documented way of disabling the automatic error stack printing.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Load every dimension, global attribute and variable of a NetCDF file.
///
/// Numeric variables have `_FillValue`/`missing_value` masked to NaN and
/// `scale_factor`/`add_offset` applied. Character and byte variables are
/// kept as raw bytes. Variables of types with no numeric meaning (strings,
/// compound, vlen) are skipped.
pub fn load_netcdf(path: &Path) -> DatasetResult<Dataset> {
    silence_hdf5_errors();

    let file = netcdf::open(path).map_err(|e| {
        DatasetError::NetCdf(format!("failed to open {}: {}", path.display(), e))
    })?;

    let mut dataset = Dataset::new().with_source(path);

    for dim in file.dimensions() {
        dataset.add_dimension(dim.name(), dim.len())?;
    }

    for attr in file.attributes() {
        let name = attr.name().to_string();
        match attr.value() {
            Ok(value) => {
                if let Some(value) = convert_attribute(value) {
                    dataset.set_attribute(name, value);
                }
            }
            Err(e) => debug!(attribute = %name, error = %e, "Skipping unreadable global attribute"),
        }
    }

    for var in file.variables() {
        let name = var.name();
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();

        let Some(data) = read_variable_data(&var)? else {
            warn!(variable = %name, vartype = ?var.vartype(), "Skipping variable with unsupported type");
            continue;
        };

        let mut variable = Variable {
            name: name.clone(),
            dims,
            shape: Vec::new(),
            data,
            attributes: Default::default(),
        };
        for attr in var.attributes() {
            if let Ok(value) = attr.value() {
                if let Some(value) = convert_attribute(value) {
                    variable.attributes.insert(attr.name().to_string(), value);
                }
            }
        }

        dataset.add_variable(variable)?;
    }

    debug!(
        path = %path.display(),
        dimensions = dataset.dimensions().len(),
        variables = dataset.variable_names().count(),
        "Loaded NetCDF file"
    );

    Ok(dataset)
}

fn read_variable_data(var: &netcdf::Variable) -> DatasetResult<Option<VariableData>> {
    let read_err =
        |e: netcdf::Error| DatasetError::NetCdf(format!("failed to read '{}': {}", var.name(), e));

    let data = match var.vartype() {
        NcVariableType::Char => VariableData::Bytes(var.get_raw_values(..).map_err(read_err)?),
        NcVariableType::Int(IntType::U8) => {
            VariableData::Bytes(var.get_values::<u8, _>(..).map_err(read_err)?)
        }
        NcVariableType::Int(IntType::I8) => {
            let raw: Vec<i8> = var.get_values(..).map_err(read_err)?;
            VariableData::Bytes(raw.into_iter().map(|b| b as u8).collect())
        }
        NcVariableType::Float(FloatType::F32) => {
            let mut values: Vec<f32> = var.get_values(..).map_err(read_err)?;
            let packing = Packing::from_variable(var);
            if !packing.is_identity() {
                for v in values.iter_mut() {
                    *v = packing.apply(*v as f64) as f32;
                }
            }
            VariableData::Float(values)
        }
        NcVariableType::Float(FloatType::F64) | NcVariableType::Int(_) => {
            let mut values: Vec<f64> = var.get_values(..).map_err(read_err)?;
            let packing = Packing::from_variable(var);
            if !packing.is_identity() {
                for v in values.iter_mut() {
                    *v = packing.apply(*v);
                }
            }
            VariableData::Double(values)
        }
        _ => return Ok(None),
    };

    Ok(Some(data))
}

/// CF packing and missing-value conventions of a numeric variable.
#[derive(Debug, Clone, Copy)]
struct Packing {
    fill_value: Option<f64>,
    missing_value: Option<f64>,
    scale_factor: f64,
    add_offset: f64,
}

impl Packing {
    fn from_variable(var: &netcdf::Variable) -> Self {
        Self {
            fill_value: get_f64_attr(var, "_FillValue"),
            missing_value: get_f64_attr(var, "missing_value"),
            scale_factor: get_f64_attr(var, "scale_factor").unwrap_or(1.0),
            add_offset: get_f64_attr(var, "add_offset").unwrap_or(0.0),
        }
    }

    fn is_identity(&self) -> bool {
        self.fill_value.is_none()
            && self.missing_value.is_none()
            && self.scale_factor == 1.0
            && self.add_offset == 0.0
    }

    #[inline]
    fn apply(&self, raw: f64) -> f64 {
        if self.fill_value == Some(raw) || self.missing_value == Some(raw) {
            f64::NAN
        } else {
            raw * self.scale_factor + self.add_offset
        }
    }
}

fn convert_attribute(value: AttributeValue) -> Option<AttrValue> {
    match value {
        AttributeValue::Str(s) => Some(AttrValue::Text(s)),
        AttributeValue::Strs(v) => Some(AttrValue::Text(v.join(" "))),
        AttributeValue::Floats(v) => Some(AttrValue::Numbers(v.into_iter().map(f64::from).collect())),
        AttributeValue::Doubles(v) => Some(AttrValue::Numbers(v)),
        AttributeValue::Shorts(v) => Some(AttrValue::Numbers(v.into_iter().map(f64::from).collect())),
        AttributeValue::Ints(v) => Some(AttrValue::Numbers(v.into_iter().map(f64::from).collect())),
        other => f64::try_from(other).ok().map(AttrValue::Number),
    }
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing_masks_fill_and_scales() {
        let packing = Packing {
            fill_value: Some(-999.0),
            missing_value: None,
            scale_factor: 0.5,
            add_offset: 10.0,
        };
        assert!(packing.apply(-999.0).is_nan());
        assert_eq!(packing.apply(4.0), 12.0);
        assert!(!packing.is_identity());
    }

    #[test]
    fn test_convert_attribute_text_and_numbers() {
        assert_eq!(
            convert_attribute(AttributeValue::Str("ppb".into())),
            Some(AttrValue::Text("ppb".into()))
        );
        assert_eq!(
            convert_attribute(AttributeValue::Double(2.5)),
            Some(AttrValue::Number(2.5))
        );
        assert_eq!(
            convert_attribute(AttributeValue::Doubles(vec![1.0, 2.0])),
            Some(AttrValue::Numbers(vec![1.0, 2.0]))
        );
    }

    #[test]
    fn test_missing_file_is_netcdf_error() {
        let err = load_netcdf(Path::new("/nonexistent/res_annotated.nc")).unwrap_err();
        assert!(matches!(err, DatasetError::NetCdf(_)));
    }
}

//! Loads datasets written to real NetCDF files.

use grid_dataset::{DatasetError, GridDataset, SchemaConfig, SchemaError, VariableData};
use test_utils::{assert_approx_eq, require_test_file, temp_test_dir, write_netcdf, PollutionDatasetBuilder};

#[test]
fn test_open_written_fixture() {
    let dir = temp_test_dir();
    let path = dir.path().join("res_annotated.nc");
    let builder = PollutionDatasetBuilder::new().grid(3, 4).times(2).levels(2);
    write_netcdf(&builder.build(), &path).unwrap();

    let from_file = GridDataset::open(&path, &SchemaConfig::default()).unwrap();
    let in_memory = builder.build_grid_dataset("res_annotated.nc");

    assert_eq!(from_file.id(), "res_annotated.nc");
    assert_eq!(from_file.schema(), in_memory.schema());
    assert_eq!(from_file.species_names(), in_memory.species_names());
    assert_eq!(from_file.time_label(1).unwrap(), "2023-01-01 01:00:00");
    assert_eq!(from_file.units("trajReconstructed"), Some("ug/m3"));

    let (_, a) = from_file.query(1, 1, "PM", "trajReference").unwrap();
    let (_, b) = in_memory.query(1, 1, "PM", "trajReference").unwrap();
    assert_eq!(a.shape(), (3, 4));
    for (x, y) in a.values().iter().zip(b.values()) {
        assert_approx_eq!(*x, *y, 1e-6);
    }
}

#[test]
fn test_species_catalog_stored_as_bytes() {
    let dir = temp_test_dir();
    let path = dir.path().join("species.nc");
    write_netcdf(&PollutionDatasetBuilder::new().species(&["NO2", "SO2", "O3"]).build(), &path).unwrap();

    let dataset = grid_dataset::load_netcdf(&path).unwrap();
    let catalog = dataset.variable("species_names").unwrap();
    assert!(matches!(catalog.data, VariableData::Bytes(_)));

    let gd = GridDataset::from_dataset("species.nc", dataset, &SchemaConfig::default()).unwrap();
    assert_eq!(gd.species_names(), &["NO2", "SO2", "O3"]);
}

#[test]
fn test_structurally_invalid_file() {
    let dir = temp_test_dir();
    let path = dir.path().join("broken.nc");
    write_netcdf(&PollutionDatasetBuilder::new().variables(&["temperature"]).build(), &path).unwrap();

    let err = GridDataset::open(&path, &SchemaConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        DatasetError::Schema(SchemaError::NoRecognizedVariables { .. })
    ));
}

#[test]
fn test_not_a_netcdf_file() {
    let dir = temp_test_dir();
    let path = dir.path().join("garbage.nc");
    std::fs::write(&path, b"this is not netcdf").unwrap();

    assert!(matches!(
        GridDataset::open(&path, &SchemaConfig::default()),
        Err(DatasetError::NetCdf(_))
    ));
}

#[test]
fn test_real_dataset_if_present() {
    let path = require_test_file!("res_annotated.nc");
    let gd = GridDataset::open(&path, &SchemaConfig::default()).unwrap();

    assert!(!gd.data_types().is_empty());
    let species = gd.species_names()[0].clone();
    let variable = gd.data_types()[0].clone();
    let (_, slice) = gd.query(0, 0, &species, &variable).unwrap();
    assert_eq!(slice.shape(), gd.grid().shape());
}

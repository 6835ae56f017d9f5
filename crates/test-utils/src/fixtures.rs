//! In-memory pollution datasets for tests.
//!
//! The default layout mirrors the production files:
//! `trajReconstructed(batch, species, Time, level, south_north, west_east)`
//! with WRF style `Times` stamps, a `species_names` character matrix and
//! `XLAT`/`XLONG` (or 1-D `latitude`/`longitude`) coordinates.

use std::collections::HashMap;
use std::path::Path;

use grid_dataset::{AttrValue, Dataset, GridDataset, SchemaConfig, Variable, VariableData};

use crate::generators::create_plume_grid;

/// Width of a WRF `Times` row (`2023-01-01_00:00:00`).
pub const DATE_STR_LEN: usize = 19;

/// Width of one `species_names` row.
pub const SPECIES_STR_LEN: usize = 8;

/// Builder for synthetic pollution datasets.
#[derive(Debug, Clone)]
pub struct PollutionDatasetBuilder {
    rows: usize,
    cols: usize,
    times: usize,
    levels: usize,
    species: Vec<String>,
    variables: Vec<String>,
    lat_range: (f64, f64),
    lon_range: (f64, f64),
    curvilinear: bool,
    batch: bool,
    units: Option<String>,
    fields: HashMap<(String, usize, usize, usize), Vec<f32>>,
    uniform: Option<Vec<f32>>,
}

impl Default for PollutionDatasetBuilder {
    fn default() -> Self {
        Self {
            rows: 4,
            cols: 5,
            times: 3,
            levels: 2,
            species: vec!["CO".into(), "PM".into()],
            variables: vec!["trajReconstructed".into(), "trajReference".into()],
            lat_range: (40.0, 41.5),
            lon_range: (-74.5, -72.5),
            curvilinear: true,
            batch: true,
            units: Some("ug/m3".into()),
            fields: HashMap::new(),
            uniform: None,
        }
    }
}

impl PollutionDatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grid(mut self, rows: usize, cols: usize) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    pub fn times(mut self, times: usize) -> Self {
        self.times = times;
        self
    }

    pub fn levels(mut self, levels: usize) -> Self {
        self.levels = levels;
        self
    }

    pub fn species(mut self, names: &[&str]) -> Self {
        self.species = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn variables(mut self, names: &[&str]) -> Self {
        self.variables = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn extent(mut self, lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        self.lat_range = (lat_min, lat_max);
        self.lon_range = (lon_min, lon_max);
        self
    }

    /// 2-D `XLAT`/`XLONG` (true) or 1-D `latitude`/`longitude` (false).
    pub fn curvilinear(mut self, curvilinear: bool) -> Self {
        self.curvilinear = curvilinear;
        self
    }

    /// Include the leading singleton `batch` dimension.
    pub fn with_batch(mut self, batch: bool) -> Self {
        self.batch = batch;
        self
    }

    pub fn units(mut self, units: Option<&str>) -> Self {
        self.units = units.map(str::to_string);
        self
    }

    /// Use the same row-major field for every selection.
    pub fn uniform(mut self, values: Vec<f32>) -> Self {
        self.uniform = Some(values);
        self
    }

    /// Override the field of one (variable, species, time, level) selection.
    pub fn field(mut self, variable: &str, species: usize, time: usize, level: usize, values: Vec<f32>) -> Self {
        self.fields
            .insert((variable.to_string(), species, time, level), values);
        self
    }

    /// Latitude of row `i`: row 0 is the northern edge.
    fn lat_at(&self, i: usize) -> f64 {
        let (lo, hi) = self.lat_range;
        if self.rows <= 1 {
            return hi;
        }
        hi - (hi - lo) * i as f64 / (self.rows - 1) as f64
    }

    fn lon_at(&self, j: usize) -> f64 {
        let (lo, hi) = self.lon_range;
        if self.cols <= 1 {
            return lo;
        }
        lo + (hi - lo) * j as f64 / (self.cols - 1) as f64
    }

    fn values_for(&self, variable: &str, s: usize, t: usize, l: usize) -> Vec<f32> {
        if let Some(v) = self.fields.get(&(variable.to_string(), s, t, l)) {
            return v.clone();
        }
        if let Some(v) = &self.uniform {
            return v.clone();
        }
        let seed = (s * 10_000 + t * 100 + l) as u32 + variable.len() as u32;
        create_plume_grid(self.cols, self.rows, seed)
    }

    pub fn build(&self) -> Dataset {
        let mut ds = Dataset::new();
        let mut dims: Vec<(&str, usize)> = vec![
            ("Time", self.times),
            ("DateStrLen", DATE_STR_LEN),
            ("species", self.species.len()),
            ("SpeciesStrLen", SPECIES_STR_LEN),
            ("level", self.levels),
            ("south_north", self.rows),
            ("west_east", self.cols),
        ];
        if self.batch {
            dims.insert(0, ("batch", 1));
        }
        for (name, len) in &dims {
            ds.add_dimension(*name, *len).expect("fixture dimension");
        }

        let mut times = Vec::with_capacity(self.times * DATE_STR_LEN);
        for t in 0..self.times {
            let stamp = format!("2023-01-{:02}_{:02}:00:00", 1 + t / 24, t % 24);
            times.extend_from_slice(stamp.as_bytes());
        }
        ds.add_variable(Variable::new("Times", &["Time", "DateStrLen"], VariableData::Bytes(times)))
            .expect("fixture Times");

        let mut names = Vec::with_capacity(self.species.len() * SPECIES_STR_LEN);
        for name in &self.species {
            let mut row = name.as_bytes().to_vec();
            row.resize(SPECIES_STR_LEN, 0);
            names.extend_from_slice(&row);
        }
        ds.add_variable(Variable::new(
            "species_names",
            &["species", "SpeciesStrLen"],
            VariableData::Bytes(names),
        ))
        .expect("fixture species_names");

        if self.curvilinear {
            let mut lat = Vec::with_capacity(self.rows * self.cols);
            let mut lon = Vec::with_capacity(self.rows * self.cols);
            for i in 0..self.rows {
                for j in 0..self.cols {
                    lat.push(self.lat_at(i) as f32);
                    lon.push(self.lon_at(j) as f32);
                }
            }
            ds.add_variable(Variable::new("XLAT", &["south_north", "west_east"], VariableData::Float(lat)))
                .expect("fixture XLAT");
            ds.add_variable(Variable::new("XLONG", &["south_north", "west_east"], VariableData::Float(lon)))
                .expect("fixture XLONG");
        } else {
            let lat = (0..self.rows).map(|i| self.lat_at(i)).collect();
            let lon = (0..self.cols).map(|j| self.lon_at(j)).collect();
            ds.add_variable(Variable::new("latitude", &["south_north"], VariableData::Double(lat)))
                .expect("fixture latitude");
            ds.add_variable(Variable::new("longitude", &["west_east"], VariableData::Double(lon)))
                .expect("fixture longitude");
        }

        let mut data_dims = vec!["species", "Time", "level", "south_north", "west_east"];
        if self.batch {
            data_dims.insert(0, "batch");
        }
        for variable in &self.variables {
            let mut data = Vec::with_capacity(self.species.len() * self.times * self.levels * self.rows * self.cols);
            for s in 0..self.species.len() {
                for t in 0..self.times {
                    for l in 0..self.levels {
                        data.extend(self.values_for(variable, s, t, l));
                    }
                }
            }
            let mut var = Variable::new(variable.as_str(), &data_dims, VariableData::Float(data));
            if let Some(units) = &self.units {
                var = var.with_attribute("units", AttrValue::Text(units.clone()));
            }
            ds.add_variable(var).expect("fixture data variable");
        }

        ds.set_attribute("title", AttrValue::Text("synthetic pollution fixture".into()));
        ds
    }

    pub fn build_grid_dataset(&self, id: &str) -> GridDataset {
        GridDataset::from_dataset(id, self.build(), &SchemaConfig::default()).expect("fixture resolves")
    }
}

/// The canonical 2x2 scenario: species `["CO", "PM"]`, only
/// `trajReconstructed`, every slice `[[1, 0], [0, 2]]`.
pub fn two_by_two_dataset() -> Dataset {
    PollutionDatasetBuilder::new()
        .grid(2, 2)
        .times(2)
        .levels(1)
        .species(&["CO", "PM"])
        .variables(&["trajReconstructed"])
        .extent(40.0, 41.0, -74.0, -73.0)
        .uniform(vec![1.0, 0.0, 0.0, 2.0])
        .build()
}

/// Write a dataset to a NetCDF file.
///
/// Byte variables are written as `u8`; text attributes as strings and
/// numeric attributes as doubles.
pub fn write_netcdf(dataset: &Dataset, path: &Path) -> Result<(), netcdf::Error> {
    let mut file = netcdf::create(path)?;

    for dim in dataset.dimensions() {
        file.add_dimension(&dim.name, dim.len)?;
    }

    let names: Vec<String> = dataset.variable_names().map(str::to_string).collect();
    for name in names {
        let Some(var) = dataset.variable(&name) else {
            continue;
        };
        let dims: Vec<&str> = var.dims.iter().map(String::as_str).collect();
        let mut nc_var = match &var.data {
            VariableData::Float(values) => {
                let mut v = file.add_variable::<f32>(&name, &dims)?;
                v.put_values(values, ..)?;
                v
            }
            VariableData::Double(values) => {
                let mut v = file.add_variable::<f64>(&name, &dims)?;
                v.put_values(values, ..)?;
                v
            }
            VariableData::Bytes(values) => {
                let mut v = file.add_variable::<u8>(&name, &dims)?;
                v.put_values(values, ..)?;
                v
            }
        };
        for (attr, value) in &var.attributes {
            match value {
                AttrValue::Text(s) => nc_var.put_attribute(attr, s.as_str())?,
                AttrValue::Number(n) => nc_var.put_attribute(attr, *n)?,
                AttrValue::Numbers(v) => nc_var.put_attribute(attr, v.clone())?,
            };
        }
    }

    if let Some(AttrValue::Text(title)) = dataset.attribute("title") {
        file.add_attribute("title", title.as_str())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fixture_resolves() {
        let gd = PollutionDatasetBuilder::new().build_grid_dataset("fixture.nc");
        assert_eq!(gd.species_names(), &["CO".to_string(), "PM".to_string()]);
        assert_eq!(gd.data_types(), &["trajReconstructed".to_string(), "trajReference".to_string()]);
        assert_eq!(gd.grid().shape(), (4, 5));
        assert_eq!(gd.max_time_index(), 2);
        assert!(gd.grid().north_up());
    }

    #[test]
    fn test_two_by_two_fixture() {
        let gd = GridDataset::from_dataset("2x2.nc", two_by_two_dataset(), &SchemaConfig::default()).unwrap();
        let (_, slice) = gd.query(1, 0, "PM", "trajReconstructed").unwrap();
        assert_eq!(slice.values(), &[1.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_field_override() {
        let gd = PollutionDatasetBuilder::new()
            .grid(1, 2)
            .field("trajReference", 1, 2, 1, vec![9.0, 8.0])
            .build_grid_dataset("x.nc");
        let (_, slice) = gd.query(2, 1, "PM", "trajReference").unwrap();
        assert_eq!(slice.values(), &[9.0, 8.0]);
    }

    #[test]
    fn test_rectilinear_fixture() {
        let gd = PollutionDatasetBuilder::new()
            .curvilinear(false)
            .with_batch(false)
            .build_grid_dataset("rect.nc");
        assert!(matches!(gd.grid(), grid_dataset::CoordinateGrid::Axes { .. }));
    }
}

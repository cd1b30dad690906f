use std::path::Path;

use itertools::izip;
use log::{debug, info};
use polars::prelude::*;

use crate::config::InputPaths;
use crate::error::{DataValidationError, Table, ValidationIssue};

mod utils;
pub use utils::*;


pub const DEMAND_COLUMNS: [&str; 2] = ["region_id", "demand"];
pub const CAPACITY_COLUMNS: [&str; 2] = ["dc_id", "capacity"];
pub const LANE_COLUMNS: [&str; 4] =
    ["dc_id", "region_id", "unit_cost", "service_time"];

/// A demand row exactly as read, before any type coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDemandRow {
    pub region_id: Option<String>,
    pub demand: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCapacityRow {
    pub dc_id: Option<String>,
    pub capacity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawLaneRow {
    pub dc_id: Option<String>,
    pub region_id: Option<String>,
    pub unit_cost: Option<String>,
    pub service_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTables {
    pub demand: Vec<RawDemandRow>,
    pub capacity: Vec<RawCapacityRow>,
    pub lanes: Vec<RawLaneRow>,
}

/// Read all three input tables. Every problem across the three files is
/// collected before failing.
pub fn load_raw(paths: &InputPaths) -> Result<RawTables, DataValidationError> {
    let mut issues = Vec::new();
    let demand = read_table(&paths.demand, Table::Demand, &DEMAND_COLUMNS)
        .and_then(|df| demand_rows(&df, Table::Demand));
    let capacity =
        read_table(&paths.capacity, Table::Capacity, &CAPACITY_COLUMNS)
            .and_then(|df| capacity_rows(&df, Table::Capacity));
    let lanes = read_table(&paths.lanes, Table::Lanes, &LANE_COLUMNS)
        .and_then(|df| lane_rows(&df, Table::Lanes));
    let (demand, capacity, lanes) = (
        take_rows(demand, &mut issues),
        take_rows(capacity, &mut issues),
        take_rows(lanes, &mut issues),
    );
    match (demand, capacity, lanes) {
        (Some(demand), Some(capacity), Some(lanes)) if issues.is_empty() => {
            let tables = RawTables {
                demand,
                capacity,
                lanes,
            };
            info!(
                "Loaded {} demand, {} capacity and {} lane rows",
                tables.demand.len(),
                tables.capacity.len(),
                tables.lanes.len()
            );
            Ok(tables)
        }
        _ => Err(DataValidationError::new(issues)),
    }
}

fn take_rows<T>(
    result: Result<Vec<T>, DataValidationError>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Vec<T>> {
    match result {
        Ok(rows) => Some(rows),
        Err(DataValidationError { issues: found }) => {
            issues.extend(found);
            None
        }
    }
}

/// Read a csv file with every column as text and check that the required
/// columns are present.
pub fn read_table(
    path: &Path,
    table: Table,
    required: &[&str],
) -> Result<DataFrame, DataValidationError> {
    debug!("Reading {table} table from {}", path.display());
    let df = CsvReader::from_path(path)
        .and_then(|reader| {
            reader
                .with_comment_char(Some(b'#'))
                .has_header(true)
                .infer_schema(Some(0))
                .finish()
        })
        .map_err(|e| {
            DataValidationError::single(ValidationIssue::table(
                table,
                format!("cannot read {}: {e}", path.display()),
            ))
        })?;
    let missing = missing_columns(&df, required);
    if missing.is_empty() {
        Ok(df)
    } else {
        Err(DataValidationError::new(
            missing
                .into_iter()
                .map(|column| ValidationIssue {
                    table,
                    row: None,
                    column: Some(column),
                    message: "required column is missing".into(),
                })
                .collect(),
        ))
    }
}

fn frame_error(table: Table, e: PolarsError) -> DataValidationError {
    DataValidationError::single(ValidationIssue::table(table, e.to_string()))
}

pub fn demand_rows(
    df: &DataFrame,
    table: Table,
) -> Result<Vec<RawDemandRow>, DataValidationError> {
    let columns = string_columns(df, &DEMAND_COLUMNS)
        .map_err(|e| frame_error(table, e))?;
    Ok(izip!(&columns[0], &columns[1])
        .map(|(region_id, demand)| RawDemandRow {
            region_id: region_id.clone(),
            demand: demand.clone(),
        })
        .collect())
}

pub fn capacity_rows(
    df: &DataFrame,
    table: Table,
) -> Result<Vec<RawCapacityRow>, DataValidationError> {
    let columns = string_columns(df, &CAPACITY_COLUMNS)
        .map_err(|e| frame_error(table, e))?;
    Ok(izip!(&columns[0], &columns[1])
        .map(|(dc_id, capacity)| RawCapacityRow {
            dc_id: dc_id.clone(),
            capacity: capacity.clone(),
        })
        .collect())
}

pub fn lane_rows(
    df: &DataFrame,
    table: Table,
) -> Result<Vec<RawLaneRow>, DataValidationError> {
    let columns = string_columns(df, &LANE_COLUMNS)
        .map_err(|e| frame_error(table, e))?;
    Ok(izip!(&columns[0], &columns[1], &columns[2], &columns[3])
        .map(|(dc_id, region_id, unit_cost, service_time)| RawLaneRow {
            dc_id: dc_id.clone(),
            region_id: region_id.clone(),
            unit_cost: unit_cost.clone(),
            service_time: service_time.clone(),
        })
        .collect())
}

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use log::{info, warn};

use crate::csv_parser::{RawCapacityRow, RawDemandRow, RawLaneRow, RawTables};
use crate::datastructures::*;
use crate::error::{DataValidationError, Table, ValidationIssue};

#[cfg(test)]
mod tests;

const MISSING_TOKENS: [&str; 5] = ["nan", "na", "n/a", "null", "none"];

#[derive(Debug, Clone, PartialEq)]
pub struct CleanOutput {
    pub data: CleanedData,
    pub report: DataQualityReport,
}

/// Bookkeeping shared by the per-table passes.
#[derive(Default)]
struct Cleaning {
    issues: Vec<ValidationIssue>,
    duplicates_dropped: usize,
    defaults_applied: usize,
}

impl Cleaning {
    fn id(
        &mut self,
        table: Table,
        row: usize,
        column: &str,
        value: &Option<String>,
    ) -> Option<String> {
        match value.as_deref().map(normalize_id) {
            Some(id) if !id.is_empty() => Some(id),
            _ => {
                self.issues.push(ValidationIssue::cell(
                    table,
                    row,
                    column,
                    "identifier is missing",
                ));
                None
            }
        }
    }

    /// Demand and capacity cells: missing means zero.
    fn quantity(
        &mut self,
        table: Table,
        row: usize,
        column: &str,
        value: &Option<String>,
    ) -> Option<f64> {
        match self.number(table, row, column, value)? {
            Some(v) => Some(v),
            None => {
                warn!("{table} row {row}: missing '{column}', using 0");
                self.defaults_applied += 1;
                Some(0.0)
            }
        }
    }

    /// Lane cells: missing is an error.
    fn required(
        &mut self,
        table: Table,
        row: usize,
        column: &str,
        value: &Option<String>,
    ) -> Option<f64> {
        match self.number(table, row, column, value)? {
            Some(v) => Some(v),
            None => {
                self.issues.push(ValidationIssue::cell(
                    table,
                    row,
                    column,
                    "value is missing",
                ));
                None
            }
        }
    }

    /// `None` on a rejected cell, `Some(None)` on a missing one.
    fn number(
        &mut self,
        table: Table,
        row: usize,
        column: &str,
        value: &Option<String>,
    ) -> Option<Option<f64>> {
        match parse_number(value.as_deref()) {
            Ok(Some(v)) if v < 0.0 => {
                self.issues.push(ValidationIssue::cell(
                    table,
                    row,
                    column,
                    format!("negative value {v}"),
                ));
                None
            }
            Ok(parsed) => Some(parsed),
            Err(message) => {
                self.issues
                    .push(ValidationIssue::cell(table, row, column, message));
                None
            }
        }
    }

    /// Drop exact repeats, reject rows that reuse a key with other values.
    fn dedup<K, T>(
        &mut self,
        table: Table,
        rows: Vec<(usize, T)>,
        key: impl Fn(&T) -> K,
    ) -> Vec<T>
    where
        K: Eq + Hash + std::fmt::Debug,
        T: PartialEq,
    {
        let mut first_seen: HashMap<K, usize> = HashMap::new();
        let mut kept: Vec<(usize, T)> = Vec::with_capacity(rows.len());
        for (row, record) in rows {
            let record_key = key(&record);
            match first_seen.get(&record_key).copied() {
                Some(idx) if kept[idx].1 == record => {
                    warn!("{table} row {row}: dropping exact duplicate");
                    self.duplicates_dropped += 1;
                }
                Some(idx) => self.issues.push(ValidationIssue {
                    table,
                    row: Some(row),
                    column: None,
                    message: format!(
                        "duplicate key {record_key:?} conflicts with row {}",
                        kept[idx].0
                    ),
                }),
                None => {
                    first_seen.insert(record_key, kept.len());
                    kept.push((row, record));
                }
            }
        }
        kept.into_iter().map(|(_, record)| record).collect()
    }
}

pub fn normalize_id(id: &str) -> String {
    id.trim().to_uppercase()
}

/// Parse a numeric cell. Blank cells and the usual missing-value tokens are
/// `Ok(None)`.
pub fn parse_number(value: Option<&str>) -> Result<Option<f64>, String> {
    let Some(value) = value.map(str::trim) else {
        return Ok(None);
    };
    if value.is_empty()
        || MISSING_TOKENS.contains(&value.to_lowercase().as_str())
    {
        return Ok(None);
    }
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) => Err(format!("'{value}' is not a finite number")),
        Err(_) => Err(format!("'{value}' is not a number")),
    }
}

fn clean_demand(
    cleaning: &mut Cleaning,
    rows: &[RawDemandRow],
) -> Vec<DemandRecord> {
    let parsed: Vec<(usize, DemandRecord)> = rows
        .iter()
        .enumerate()
        .filter_map(|(row, raw)| {
            let region_id =
                cleaning.id(Table::Demand, row, "region_id", &raw.region_id);
            let demand =
                cleaning.quantity(Table::Demand, row, "demand", &raw.demand);
            Some((row, DemandRecord::new(region_id?, demand?)))
        })
        .collect();
    cleaning.dedup(Table::Demand, parsed, |d: &DemandRecord| {
        d.region_id.clone()
    })
}

fn clean_capacity(
    cleaning: &mut Cleaning,
    rows: &[RawCapacityRow],
) -> Vec<CapacityRecord> {
    let parsed: Vec<(usize, CapacityRecord)> = rows
        .iter()
        .enumerate()
        .filter_map(|(row, raw)| {
            let dc_id = cleaning.id(Table::Capacity, row, "dc_id", &raw.dc_id);
            let capacity = cleaning.quantity(
                Table::Capacity,
                row,
                "capacity",
                &raw.capacity,
            );
            Some((row, CapacityRecord::new(dc_id?, capacity?)))
        })
        .collect();
    cleaning.dedup(Table::Capacity, parsed, |c: &CapacityRecord| {
        c.dc_id.clone()
    })
}

fn clean_lanes(cleaning: &mut Cleaning, rows: &[RawLaneRow]) -> Vec<LaneCost> {
    let parsed: Vec<(usize, LaneCost)> = rows
        .iter()
        .enumerate()
        .filter_map(|(row, raw)| {
            let dc_id = cleaning.id(Table::Lanes, row, "dc_id", &raw.dc_id);
            let region_id =
                cleaning.id(Table::Lanes, row, "region_id", &raw.region_id);
            let unit_cost =
                cleaning.required(Table::Lanes, row, "unit_cost", &raw.unit_cost);
            let service_time = cleaning.required(
                Table::Lanes,
                row,
                "service_time",
                &raw.service_time,
            );
            Some((
                row,
                LaneCost::new(dc_id?, region_id?, unit_cost?, service_time?),
            ))
        })
        .collect();
    cleaning.dedup(Table::Lanes, parsed, |l: &LaneCost| {
        (l.dc_id.clone(), l.region_id.clone())
    })
}

/// Validate and coerce the raw tables. Fails with every offending cell when
/// anything is rejected.
pub fn clean(raw: &RawTables) -> Result<CleanOutput, DataValidationError> {
    let mut cleaning = Cleaning::default();
    let demand = clean_demand(&mut cleaning, &raw.demand);
    let capacity = clean_capacity(&mut cleaning, &raw.capacity);
    let lanes = clean_lanes(&mut cleaning, &raw.lanes);
    if !cleaning.issues.is_empty() {
        return Err(DataValidationError::new(cleaning.issues));
    }

    let dc_ids: BTreeSet<&str> =
        capacity.iter().map(|c| c.dc_id.as_str()).collect();
    let region_ids: BTreeSet<&str> =
        demand.iter().map(|d| d.region_id.as_str()).collect();
    let lane_count = lanes.len();
    let lanes: Vec<LaneCost> = lanes
        .into_iter()
        .filter(|lane| {
            let known = dc_ids.contains(lane.dc_id.as_str())
                && region_ids.contains(lane.region_id.as_str());
            if !known {
                warn!(
                    "Dropping lane {} -> {}: unknown dc or region",
                    lane.dc_id, lane.region_id
                );
            }
            known
        })
        .collect();
    let orphan_lanes_dropped = lane_count - lanes.len();

    let data = CleanedData {
        demand,
        capacity,
        lanes,
    };
    let report = quality_report(
        &data,
        cleaning.duplicates_dropped,
        cleaning.defaults_applied,
        orphan_lanes_dropped,
    );
    info!("Cleaned data:\n{data}");
    Ok(CleanOutput { data, report })
}

pub fn quality_report(
    data: &CleanedData,
    duplicates_dropped: usize,
    defaults_applied: usize,
    orphan_lanes_dropped: usize,
) -> DataQualityReport {
    let pairs = data.capacity.len() * data.demand.len();
    let lane_coverage_pct = if pairs == 0 {
        0.0
    } else {
        round_to(100.0 * data.lanes.len() as f64 / pairs as f64, 2)
    };
    DataQualityReport {
        demand_rows: data.demand.len(),
        capacity_rows: data.capacity.len(),
        lane_rows: data.lanes.len(),
        total_demand: data.total_demand(),
        total_capacity: data.total_capacity(),
        capacity_minus_demand: data.total_capacity() - data.total_demand(),
        lane_coverage_pct,
        duplicates_dropped,
        defaults_applied,
        orphan_lanes_dropped,
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

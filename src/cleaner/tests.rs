use std::path::Path;

use super::{clean, normalize_id, parse_number, round_to};
use crate::config::InputPaths;
use crate::csv_parser::{load_raw, RawDemandRow, RawTables};
use crate::datastructures::*;
use crate::error::Table;

fn load(dir: &str) -> RawTables {
    load_raw(&InputPaths::in_dir(Path::new(dir))).unwrap()
}

#[test]
fn test_clean_basic() {
    let out = clean(&load("data/test/basic")).unwrap();
    assert_eq!(
        out.data.demand,
        vec![DemandRecord::new("A", 100.0), DemandRecord::new("B", 50.0)]
    );
    assert_eq!(out.data.capacity, vec![CapacityRecord::new("DC1", 120.0)]);
    assert_eq!(out.data.lanes.len(), 2);
    assert_eq!(out.report.lane_coverage_pct, 100.0);
    assert_eq!(out.report.capacity_minus_demand, -30.0);
}

#[test]
fn test_clean_messy() {
    let out = clean(&load("data/test/messy")).unwrap();
    assert_eq!(
        out.data.demand,
        vec![
            DemandRecord::new("WEST", 3200.0),
            DemandRecord::new("SOUTH", 2800.0),
            DemandRecord::new("EAST", 0.0),
        ]
    );
    assert_eq!(
        out.data.capacity,
        vec![
            CapacityRecord::new("DC_PERRIS", 4000.0),
            CapacityRecord::new("DC_DALLAS", 0.0),
            CapacityRecord::new("DC_TROY", 3500.0),
        ]
    );
    assert_eq!(out.data.lanes.len(), 5);
    assert!(out
        .data
        .lanes
        .iter()
        .all(|l| l.dc_id != "DC_GHOST" && l.region_id != "NORTH"));
    assert_eq!(out.report.duplicates_dropped, 2);
    assert_eq!(out.report.defaults_applied, 2);
    assert_eq!(out.report.orphan_lanes_dropped, 2);
    assert_eq!(out.report.lane_coverage_pct, 55.56);
    assert_eq!(out.report.total_demand, 6000.0);
    assert_eq!(out.report.total_capacity, 7500.0);
}

#[test]
fn test_negative_and_non_numeric_demand() {
    let err = clean(&load("data/test/negative_demand")).unwrap_err();
    assert_eq!(err.issues.len(), 2);
    assert!(err.issues.iter().all(|i| i.table == Table::Demand
        && i.column.as_deref() == Some("demand")));
    assert_eq!(err.issues[0].row, Some(1));
    assert_eq!(err.issues[1].row, Some(2));
}

#[test]
fn test_conflicting_lane_duplicates() {
    let err = clean(&load("data/test/ambiguous_lanes")).unwrap_err();
    assert_eq!(err.issues.len(), 1);
    assert_eq!(err.issues[0].table, Table::Lanes);
    assert_eq!(err.issues[0].row, Some(1));
}

#[test]
fn test_missing_identifier() {
    let raw = RawTables {
        demand: vec![RawDemandRow {
            region_id: Some("  ".into()),
            demand: Some("10".into()),
        }],
        ..Default::default()
    };
    let err = clean(&raw).unwrap_err();
    assert_eq!(err.issues[0].column.as_deref(), Some("region_id"));
}

#[test]
fn test_empty_tables() {
    let out = clean(&RawTables::default()).unwrap();
    assert!(out.data.demand.is_empty());
    assert_eq!(out.report.lane_coverage_pct, 0.0);
}

#[test]
fn test_parse_number() {
    assert_eq!(parse_number(Some(" 3500 ")), Ok(Some(3500.0)));
    assert_eq!(parse_number(Some("1e3")), Ok(Some(1000.0)));
    assert_eq!(parse_number(Some("")), Ok(None));
    assert_eq!(parse_number(Some("NaN")), Ok(None));
    assert_eq!(parse_number(Some("N/A")), Ok(None));
    assert_eq!(parse_number(None), Ok(None));
    assert!(parse_number(Some("abc")).is_err());
    assert!(parse_number(Some("inf")).is_err());
}

#[test]
fn test_normalize_id() {
    assert_eq!(normalize_id(" dc_troy "), "DC_TROY");
    assert_eq!(round_to(55.5555, 2), 55.56);
}

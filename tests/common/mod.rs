#![allow(dead_code)]
use std::{fs, path::Path};

use rusqlite::Connection;
use supply_chain_twin::config::{Config, InputPaths};

pub fn test_config(raw_dir: &Path, out_dir: &Path) -> Config {
    Config {
        raw_dir: raw_dir.to_path_buf(),
        out_dir: out_dir.to_path_buf(),
        run_id: Some("test-run".into()),
        ..Config::default()
    }
}

/// Write the three input csvs into `dir`.
pub fn write_inputs(dir: &Path, demand: &str, capacity: &str, lanes: &str) {
    let paths = InputPaths::in_dir(dir);
    fs::write(paths.demand, demand).unwrap();
    fs::write(paths.capacity, capacity).unwrap();
    fs::write(paths.lanes, lanes).unwrap();
}

/// The two region example with DC1 at `capacity`.
pub fn write_two_region_inputs(dir: &Path, capacity: f64) {
    write_inputs(
        dir,
        "region_id,demand\nA,100\nB,50\n",
        &format!("dc_id,capacity\nDC1,{capacity}\n"),
        "dc_id,region_id,unit_cost,service_time\nDC1,A,5,1\nDC1,B,8,3\n",
    );
}

pub fn assert_close(actual: f64, expected: f64, eps: f64) {
    assert!(
        (actual - expected).abs() <= eps,
        "expected {expected}, got {actual}"
    );
}

pub fn count_rows(database: &Path, table: &str) -> i64 {
    let conn = Connection::open(database).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

pub fn kpi_metric(database: &Path, metric: &str) -> f64 {
    let conn = Connection::open(database).unwrap();
    conn.query_row(
        "SELECT value FROM kpi_summary WHERE metric = ?1",
        [metric],
        |row| row.get(0),
    )
    .unwrap()
}

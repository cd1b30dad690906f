use std::path::Path;

use supply_chain_twin::{
    pipeline,
    queries::{self, Order, Question},
};
mod common;
use common::*;

fn basic_warehouse(out: &Path) -> rusqlite::Connection {
    let config = test_config(Path::new("data/test/basic"), out);
    pipeline::run(&config).unwrap();
    queries::open_warehouse(&config.database_path()).unwrap()
}

#[test]
fn test_headline_answers() {
    let out = tempfile::tempdir().unwrap();
    let conn = basic_warehouse(out.path());
    let total = queries::answer(&conn, &Question::TotalCost).unwrap();
    assert_eq!(
        total.text,
        "Total cost: $660 (objective incl. unmet penalty $30,660)."
    );
    assert_eq!(total.source, "kpi_summary");
    let transport = queries::answer(&conn, &Question::TransportCost).unwrap();
    assert_eq!(transport.text, "Transport cost: $660.");
    let unmet = queries::answer(&conn, &Question::UnmetUnits).unwrap();
    assert_eq!(unmet.text, "Unmet demand: 30 units (penalty $30,000).");
}

#[test]
fn test_utilization_answers() {
    let out = tempfile::tempdir().unwrap();
    let conn = basic_warehouse(out.path());
    let highest =
        queries::answer(&conn, &Question::HighestUtilization).unwrap();
    assert_eq!(
        highest.text,
        "Highest utilization: DC1 at 100.0% (assigned 120 / capacity 120)."
    );
    let unknown = queries::answer(
        &conn,
        &Question::DcUtilization {
            dc_id: "DC9".into(),
        },
    )
    .unwrap();
    assert_eq!(unknown.text, "Unknown DC 'DC9'.");
}

#[test]
fn test_ranking_answers() {
    let out = tempfile::tempdir().unwrap();
    let conn = basic_warehouse(out.path());
    let by_region = queries::answer(
        &conn,
        &Question::CostByRegion {
            order: Order::Desc,
            top: 3,
        },
    )
    .unwrap();
    assert_eq!(
        by_region.text,
        "Highest regional transport cost: A: $500; B: $160."
    );
    let cheapest = queries::answer(
        &conn,
        &Question::CostByRegion {
            order: Order::Asc,
            top: 1,
        },
    )
    .unwrap();
    assert_eq!(cheapest.text, "Lowest regional transport cost: B: $160.");
    let served = queries::answer(
        &conn,
        &Question::RegionsServedBy {
            dc_id: "DC1".into(),
        },
    )
    .unwrap();
    assert_eq!(served.text, "DC1 serves 2 region(s).");
}

#[test]
fn test_routed_questions() {
    let out = tempfile::tempdir().unwrap();
    let conn = basic_warehouse(out.path());
    let slow = queries::route("top 5 slow lanes").unwrap();
    assert_eq!(
        queries::answer(&conn, &slow).unwrap().text,
        "Top slow lanes: DC1->B (3.0d, 20u)."
    );
    let by_dc = queries::route("cost by dc").unwrap();
    assert_eq!(
        queries::answer(&conn, &by_dc).unwrap().text,
        "Highest DC transport cost: DC1: $660."
    );
    let listing = queries::route("list regions for dc1").unwrap();
    assert_eq!(
        queries::answer(&conn, &listing).unwrap().text,
        "Regions served by DC1: A (100u); B (20u)."
    );
}

#[test]
fn test_missing_warehouse() {
    let out = tempfile::tempdir().unwrap();
    assert!(queries::open_warehouse(&out.path().join("warehouse.db")).is_err());
}

use std::path::Path;

use supply_chain_twin::pipeline;
mod common;
use common::*;

#[test]
fn test_capacity_shortfall() {
    let out = tempfile::tempdir().unwrap();
    let config = test_config(Path::new("data/test/basic"), out.path());
    let output = pipeline::run(&config).unwrap();
    let summary = &output.kpis.summary;
    assert_close(summary.transport_cost, 660.0, 1e-3);
    assert_close(summary.total_cost, 660.0, 1e-3);
    assert_close(summary.unmet_units, 30.0, 1e-3);
    assert_close(summary.per_dc_utilization["DC1"], 1.0, 1e-6);
    assert_close(
        summary.unmet_units,
        summary.total_demand - summary.satisfied_units,
        1e-6,
    );

    let database = config.database_path();
    assert_eq!(output.written.len(), 15);
    assert!(output.written.iter().all(|path| path.exists()));
    for chart in [
        "dc_utilization.svg",
        "cost_per_dc.svg",
        "cost_by_region.svg",
        "demand_hist.svg",
    ] {
        assert!(output.written.contains(&out.path().join(chart)), "{chart}");
    }
    assert_close(kpi_metric(&database, "transport_cost"), 660.0, 1e-3);
    assert_eq!(count_rows(&database, "runs"), 1);
    assert_eq!(count_rows(&database, "flow_assignments"), 2);
    assert_eq!(count_rows(&database, "unmet_demand"), 1);
    assert_eq!(count_rows(&database, "v_flows_enriched"), 2);
}

#[test]
fn test_shortfall_lands_on_exact_values() {
    let out = tempfile::tempdir().unwrap();
    let config = test_config(Path::new("data/test/basic"), out.path());
    let output = pipeline::run(&config).unwrap();
    let shipped = output
        .solution
        .flows
        .iter()
        .map(|f| (f.region_id.as_str(), f.flow))
        .collect::<Vec<_>>();
    assert_eq!(shipped, vec![("A", 100.0), ("B", 20.0)]);
    let fulfilment = &output.kpis.fulfilment;
    assert_eq!(fulfilment[0].unmet_units, 0.0);
    assert_eq!(fulfilment[1].unmet_units, 30.0);
    let conn = rusqlite::Connection::open(config.database_path()).unwrap();
    let (region, units): (String, f64) = conn
        .query_row(
            "SELECT region_id, unmet_units FROM unmet_demand",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!((region.as_str(), units), ("B", 30.0));
}

#[test]
fn test_capacity_covers_demand() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_two_region_inputs(raw.path(), 150.0);
    let output = pipeline::run(&test_config(raw.path(), out.path())).unwrap();
    let summary = &output.kpis.summary;
    assert_close(summary.transport_cost, 900.0, 1e-3);
    assert_close(summary.unmet_units, 0.0, 1e-3);
    assert_close(summary.per_dc_utilization["DC1"], 1.0, 1e-6);
    assert_eq!(count_rows(&out.path().join("warehouse.db"), "unmet_demand"), 0);
}

#[test]
fn test_zero_capacity_dc() {
    let raw = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_inputs(
        raw.path(),
        "region_id,demand\nA,100\n",
        "dc_id,capacity\nDC1,0\n",
        "dc_id,region_id,unit_cost,service_time\nDC1,A,5,1\n",
    );
    let output = pipeline::run(&test_config(raw.path(), out.path())).unwrap();
    assert_eq!(output.kpis.summary.per_dc_utilization["DC1"], 0.0);
    assert_close(output.kpis.summary.unmet_units, 100.0, 1e-3);
    assert!(output.solution.flows.is_empty());
}

#[test]
fn test_repeated_runs_are_identical() {
    let out = tempfile::tempdir().unwrap();
    let config = test_config(Path::new("data/test/multi"), out.path());
    let first = pipeline::run(&config).unwrap();
    let second = pipeline::run(&config).unwrap();
    assert_eq!(first.kpis, second.kpis);
    assert_eq!(first.solution, second.solution);
    assert_eq!(count_rows(&config.database_path(), "runs"), 1);
}

#[test]
fn test_generated_run_ids_differ() {
    let out = tempfile::tempdir().unwrap();
    let config = supply_chain_twin::config::Config {
        run_id: None,
        ..test_config(Path::new("data/test/basic"), out.path())
    };
    let first = pipeline::run(&config).unwrap();
    let second = pipeline::run(&config).unwrap();
    assert_ne!(first.run.run_id, second.run.run_id);
}

use std::{collections::BTreeMap, path::Path};

use supply_chain_twin::{
    config::{Config, ScenarioConfig},
    datastructures::SolverStatus,
    pipeline,
};
mod common;
use common::*;

fn flow(output: &pipeline::PipelineOutput, dc: &str, region: &str) -> f64 {
    output
        .solution
        .flows
        .iter()
        .filter(|f| f.dc_id == dc && f.region_id == region)
        .map(|f| f.flow)
        .sum()
}

#[test]
fn test_messy_inputs() {
    let out = tempfile::tempdir().unwrap();
    let output =
        pipeline::run(&test_config(Path::new("data/test/messy"), out.path()))
            .unwrap();
    assert_eq!(output.quality.duplicates_dropped, 2);
    assert_eq!(output.quality.orphan_lanes_dropped, 2);
    assert_close(flow(&output, "DC_PERRIS", "WEST"), 3200.0, 1e-3);
    assert_close(flow(&output, "DC_TROY", "SOUTH"), 2800.0, 1e-3);
    let summary = &output.kpis.summary;
    assert_close(summary.transport_cost, 13_200.0, 0.01);
    assert_close(summary.unmet_units, 0.0, 1e-3);
    assert_close(summary.per_dc_utilization["DC_PERRIS"], 0.8, 1e-6);
    assert_close(summary.per_dc_utilization["DC_TROY"], 0.8, 1e-6);
    assert_eq!(summary.per_dc_utilization["DC_DALLAS"], 0.0);
    assert_eq!(
        count_rows(&out.path().join("warehouse.db"), "data_quality"),
        10
    );
}

#[test]
fn test_multi_dc_network() {
    let out = tempfile::tempdir().unwrap();
    let output =
        pipeline::run(&test_config(Path::new("data/test/multi"), out.path()))
            .unwrap();
    assert_eq!(output.solution.status, SolverStatus::Optimal);
    let summary = &output.kpis.summary;
    assert_close(summary.transport_cost, 1800.0, 0.01);
    assert_close(summary.unmet_units, 200.0, 1e-3);
    assert_close(summary.penalty_cost, 200_000.0, 1.0);
    assert_eq!(summary.slow_lane_share, 0.0);
    assert_eq!(summary.per_dc_utilization["DC_IDLE"], 0.0);
    for dc in &output.data.capacity {
        let outbound: f64 = output
            .solution
            .flows
            .iter()
            .filter(|f| f.dc_id == dc.dc_id)
            .map(|f| f.flow)
            .sum();
        assert!(outbound <= dc.capacity);
    }
    for region in &output.data.demand {
        let inbound: f64 = output
            .solution
            .flows
            .iter()
            .filter(|f| f.region_id == region.region_id)
            .map(|f| f.flow)
            .sum();
        assert!(inbound <= region.demand);
    }
    assert_eq!(flow(&output, "DC_A", "SOUTH"), 0.0);
    assert_eq!(flow(&output, "DC_B", "WEST"), 0.0);
    assert_eq!(
        count_rows(&out.path().join("warehouse.db"), "flow_assignments"),
        4
    );
}

#[test]
fn test_demand_lever_closes_gap() {
    let out = tempfile::tempdir().unwrap();
    let config = Config {
        scenario: ScenarioConfig {
            region_demand_mult: BTreeMap::from([("b".to_string(), 0.4)]),
            ..ScenarioConfig::default()
        },
        ..test_config(Path::new("data/test/basic"), out.path())
    };
    let output = pipeline::run(&config).unwrap();
    assert_close(output.kpis.summary.total_demand, 120.0, 1e-9);
    assert_close(output.kpis.summary.transport_cost, 660.0, 1e-3);
    assert_close(output.kpis.summary.unmet_units, 0.0, 1e-3);
}

#[test]
fn test_capacity_lever() {
    let out = tempfile::tempdir().unwrap();
    let config = Config {
        scenario: ScenarioConfig {
            dc_capacity_delta: BTreeMap::from([("DC1".to_string(), 30.0)]),
            ..ScenarioConfig::default()
        },
        ..test_config(Path::new("data/test/basic"), out.path())
    };
    let output = pipeline::run(&config).unwrap();
    assert_close(output.kpis.summary.transport_cost, 900.0, 1e-3);
    assert_close(output.kpis.summary.unmet_units, 0.0, 1e-3);
    assert!(output.run.scenario.contains("dc_capacity_delta"));
}

#[test]
fn test_scenario_from_json() {
    let scenario: ScenarioConfig =
        serde_json::from_str(r#"{"dc_capacity_mult": {"DC1": 0.5}}"#).unwrap();
    assert_eq!(scenario.demand_scale, 1.0);
    let out = tempfile::tempdir().unwrap();
    let config = Config {
        scenario,
        ..test_config(Path::new("data/test/basic"), out.path())
    };
    let output = pipeline::run(&config).unwrap();
    // 60 units fit, all of them to the cheaper region A
    assert_close(flow(&output, "DC1", "A"), 60.0, 1e-3);
    assert_close(output.kpis.summary.unmet_units, 90.0, 1e-3);
}

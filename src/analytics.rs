use itertools::Itertools;
use polars::prelude::*;

use crate::datastructures::*;

pub fn demand_frame(demand: &[DemandRecord]) -> PolarsResult<DataFrame> {
    df! {
        "region_id" => demand.iter().map(|d| d.region_id.clone()).collect_vec(),
        "demand" => demand.iter().map(|d| d.demand).collect_vec(),
    }
}

pub fn capacity_frame(capacity: &[CapacityRecord]) -> PolarsResult<DataFrame> {
    df! {
        "dc_id" => capacity.iter().map(|c| c.dc_id.clone()).collect_vec(),
        "capacity" => capacity.iter().map(|c| c.capacity).collect_vec(),
    }
}

pub fn lanes_frame(lanes: &[LaneCost]) -> PolarsResult<DataFrame> {
    df! {
        "dc_id" => lanes.iter().map(|l| l.dc_id.clone()).collect_vec(),
        "region_id" => lanes.iter().map(|l| l.region_id.clone()).collect_vec(),
        "unit_cost" => lanes.iter().map(|l| l.unit_cost).collect_vec(),
        "service_time" => lanes.iter().map(|l| l.service_time).collect_vec(),
    }
}

pub fn flows_frame(flows: &[FlowAssignment]) -> PolarsResult<DataFrame> {
    df! {
        "dc_id" => flows.iter().map(|f| f.dc_id.clone()).collect_vec(),
        "region_id" => flows.iter().map(|f| f.region_id.clone()).collect_vec(),
        "flow" => flows.iter().map(|f| f.flow).collect_vec(),
        "unit_cost" => flows.iter().map(|f| f.unit_cost).collect_vec(),
        "flow_cost" => flows.iter().map(FlowAssignment::flow_cost).collect_vec(),
    }
}

pub fn utilization_frame(rows: &[DcUtilization]) -> PolarsResult<DataFrame> {
    df! {
        "dc_id" => rows.iter().map(|u| u.dc_id.clone()).collect_vec(),
        "capacity" => rows.iter().map(|u| u.capacity).collect_vec(),
        "outbound" => rows.iter().map(|u| u.outbound).collect_vec(),
        "utilization" => rows.iter().map(|u| u.utilization).collect_vec(),
    }
}

pub fn fulfilment_frame(rows: &[RegionFulfilment]) -> PolarsResult<DataFrame> {
    df! {
        "region_id" => rows.iter().map(|f| f.region_id.clone()).collect_vec(),
        "demand" => rows.iter().map(|f| f.demand).collect_vec(),
        "satisfied" => rows.iter().map(|f| f.satisfied).collect_vec(),
        "unmet_units" => rows.iter().map(|f| f.unmet_units).collect_vec(),
    }
}

/// The writer adds `run_id` itself.
pub fn runs_frame(run: &RunRecord) -> PolarsResult<DataFrame> {
    df! {
        "created_at" => [run.created_at.as_str()],
        "solver_status" => [run.solver_status.to_string()],
        "unmet_penalty" => [run.unmet_penalty],
        "slow_lane_days" => [run.slow_lane_days],
        "scenario" => [run.scenario.as_str()],
    }
}

/// Long metric/value layout.
pub fn metrics_frame(metrics: &[(&str, f64)]) -> PolarsResult<DataFrame> {
    df! {
        "metric" => metrics.iter().map(|(m, _)| m.to_string()).collect_vec(),
        "value" => metrics.iter().map(|(_, v)| *v).collect_vec(),
    }
}

/// Transport cost, units and number of regions served per DC, costliest
/// first.
pub fn cost_by_dc(flows: &DataFrame) -> PolarsResult<DataFrame> {
    flows
        .clone()
        .lazy()
        .groupby_stable([col("dc_id")])
        .agg([
            col("flow_cost").sum().alias("flow_cost"),
            col("flow").sum().alias("units"),
            col("region_id")
                .n_unique()
                .cast(DataType::Int64)
                .alias("regions_served"),
        ])
        .sort_by_exprs(&[col("flow_cost"), col("dc_id")], vec![true, false], false)
        .collect()
}

pub fn cost_by_region(flows: &DataFrame) -> PolarsResult<DataFrame> {
    flows
        .clone()
        .lazy()
        .groupby_stable([col("region_id")])
        .agg([
            col("flow_cost").sum().alias("flow_cost"),
            col("flow").sum().alias("units"),
        ])
        .sort_by_exprs(
            &[col("flow_cost"), col("region_id")],
            vec![true, false],
            false,
        )
        .collect()
}

use std::collections::{BTreeMap, HashMap};

use ndarray::Axis;

use crate::config::{DEFAULT_SLOW_LANE_DAYS, DEFAULT_UNMET_PENALTY};
use crate::datastructures::*;
use crate::error::{DataValidationError, Table, ValidationIssue};
use crate::solver::{clean_value, flow_matrix};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiOptions {
    pub unmet_penalty: f64,
    pub slow_lane_days: f64,
}

impl Default for KpiOptions {
    fn default() -> Self {
        Self {
            unmet_penalty: DEFAULT_UNMET_PENALTY,
            slow_lane_days: DEFAULT_SLOW_LANE_DAYS,
        }
    }
}

/// Aggregate flows into the KPI summary and its per-DC / per-region detail.
///
/// Costs come from the lane table, so a flow on a lane that does not exist is
/// rejected. Utilization is clamped to [0, 1] and is zero for a DC without
/// capacity.
pub fn compute(
    data: &CleanedData,
    flows: &[FlowAssignment],
    options: &KpiOptions,
) -> Result<KpiReport, DataValidationError> {
    let lanes: HashMap<(&str, &str), &LaneCost> = data
        .lanes
        .iter()
        .map(|l| ((l.dc_id.as_str(), l.region_id.as_str()), l))
        .collect();

    let mut issues = Vec::new();
    let mut transport_cost = 0.0;
    let mut shipped = 0.0;
    let mut shipped_slow = 0.0;
    for (row, flow) in flows.iter().enumerate() {
        match lanes.get(&(flow.dc_id.as_str(), flow.region_id.as_str())) {
            Some(lane) => {
                transport_cost += flow.flow * lane.unit_cost;
                shipped += flow.flow;
                if lane.service_time > options.slow_lane_days {
                    shipped_slow += flow.flow;
                }
            }
            None => issues.push(ValidationIssue {
                table: Table::Flows,
                row: Some(row),
                column: None,
                message: format!(
                    "flow {} -> {} has no lane",
                    flow.dc_id, flow.region_id
                ),
            }),
        }
    }
    if !issues.is_empty() {
        return Err(DataValidationError::new(issues));
    }

    let matrix = flow_matrix(data, flows);
    let outbound = matrix.flows.sum_axis(Axis(1));
    let inbound = matrix.flows.sum_axis(Axis(0));

    let utilization: Vec<DcUtilization> = data
        .capacity
        .iter()
        .zip(outbound.iter())
        .map(|(dc, &out)| DcUtilization {
            dc_id: dc.dc_id.clone(),
            capacity: dc.capacity,
            outbound: out,
            utilization: utilization(out, dc.capacity),
        })
        .collect();
    let fulfilment: Vec<RegionFulfilment> = data
        .demand
        .iter()
        .zip(inbound.iter())
        .map(|(region, &satisfied)| RegionFulfilment {
            region_id: region.region_id.clone(),
            demand: region.demand,
            satisfied,
            unmet_units: clean_value(region.demand - satisfied),
        })
        .collect();

    let unmet_units: f64 = fulfilment.iter().map(|f| f.unmet_units).sum();
    let penalty_cost = options.unmet_penalty * unmet_units;
    let summary = KpiSummary {
        total_cost: transport_cost,
        transport_cost,
        unmet_units,
        per_dc_utilization: utilization
            .iter()
            .map(|u| (u.dc_id.clone(), u.utilization))
            .collect::<BTreeMap<_, _>>(),
        penalty_cost,
        objective_value: transport_cost + penalty_cost,
        total_demand: data.total_demand(),
        satisfied_units: inbound.sum(),
        slow_lane_share: if shipped > 0.0 {
            shipped_slow / shipped
        } else {
            0.0
        },
        num_dcs: data.capacity.len(),
        num_regions: data.demand.len(),
    };
    Ok(KpiReport {
        summary,
        utilization,
        fulfilment,
    })
}

pub fn utilization(outbound: f64, capacity: f64) -> f64 {
    if capacity > 0.0 {
        (outbound / capacity).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

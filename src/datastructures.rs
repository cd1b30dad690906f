use core::fmt;
use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub type DcId = String;
pub type RegionId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    pub region_id: RegionId,
    pub demand: f64,
}

impl DemandRecord {
    pub fn new(region_id: impl Into<RegionId>, demand: f64) -> Self {
        Self {
            region_id: region_id.into(),
            demand,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityRecord {
    pub dc_id: DcId,
    pub capacity: f64,
}

impl CapacityRecord {
    pub fn new(dc_id: impl Into<DcId>, capacity: f64) -> Self {
        Self {
            dc_id: dc_id.into(),
            capacity,
        }
    }
}

/// A feasible DC → region shipping path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneCost {
    pub dc_id: DcId,
    pub region_id: RegionId,
    pub unit_cost: f64,
    pub service_time: f64,
}

impl LaneCost {
    pub fn new(
        dc_id: impl Into<DcId>,
        region_id: impl Into<RegionId>,
        unit_cost: f64,
        service_time: f64,
    ) -> Self {
        Self {
            dc_id: dc_id.into(),
            region_id: region_id.into(),
            unit_cost,
            service_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowAssignment {
    pub dc_id: DcId,
    pub region_id: RegionId,
    pub flow: f64,
    pub unit_cost: f64,
}

impl FlowAssignment {
    pub fn flow_cost(&self) -> f64 {
        self.flow * self.unit_cost
    }
}

/// Input tables after cleaning. Row order is the order of first appearance in
/// the raw files and is kept stable through the whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedData {
    pub demand: Vec<DemandRecord>,
    pub capacity: Vec<CapacityRecord>,
    pub lanes: Vec<LaneCost>,
}

impl CleanedData {
    pub fn total_demand(&self) -> f64 {
        self.demand.iter().map(|d| d.demand).sum()
    }

    pub fn total_capacity(&self) -> f64 {
        self.capacity.iter().map(|c| c.capacity).sum()
    }
}

impl fmt::Display for CleanedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "regions: {}, dcs: {}, lanes: {}",
            self.demand.len(),
            self.capacity.len(),
            self.lanes.len()
        )?;
        write!(
            f,
            "total demand: {}, total capacity: {}",
            self.total_demand(),
            self.total_capacity()
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub demand_rows: usize,
    pub capacity_rows: usize,
    pub lane_rows: usize,
    pub total_demand: f64,
    pub total_capacity: f64,
    pub capacity_minus_demand: f64,
    /// Share of all DC × region pairs that have a lane, in percent.
    pub lane_coverage_pct: f64,
    pub duplicates_dropped: usize,
    pub defaults_applied: usize,
    pub orphan_lanes_dropped: usize,
}

impl DataQualityReport {
    pub fn metrics(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("demand_rows", self.demand_rows as f64),
            ("capacity_rows", self.capacity_rows as f64),
            ("lane_rows", self.lane_rows as f64),
            ("total_demand", self.total_demand),
            ("total_capacity", self.total_capacity),
            ("capacity_minus_demand", self.capacity_minus_demand),
            ("lane_coverage_pct", self.lane_coverage_pct),
            ("duplicates_dropped", self.duplicates_dropped as f64),
            ("defaults_applied", self.defaults_applied as f64),
            ("orphan_lanes_dropped", self.orphan_lanes_dropped as f64),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    Optimal,
    Infeasible,
    Unbounded,
    SolverFailure,
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            SolverStatus::Optimal => "optimal",
            SolverStatus::Infeasible => "infeasible",
            SolverStatus::Unbounded => "unbounded",
            SolverStatus::SolverFailure => "solver_failure",
        };
        write!(f, "{status}")
    }
}

/// Dense DC × region view of the flows. Rows follow `dc_ids`, columns follow
/// `region_ids`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowMatrix {
    pub dc_ids: Vec<DcId>,
    pub region_ids: Vec<RegionId>,
    pub flows: Array2<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowSolution {
    /// Lanes carrying more than the solver tolerance, in lane order.
    pub flows: Vec<FlowAssignment>,
    /// Unmet units per region as reported by the slack variables, in demand
    /// order.
    pub unmet: Vec<(RegionId, f64)>,
    pub objective_value: f64,
    pub status: SolverStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcUtilization {
    pub dc_id: DcId,
    pub capacity: f64,
    pub outbound: f64,
    pub utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionFulfilment {
    pub region_id: RegionId,
    pub demand: f64,
    pub satisfied: f64,
    pub unmet_units: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub total_cost: f64,
    pub transport_cost: f64,
    pub unmet_units: f64,
    pub per_dc_utilization: BTreeMap<DcId, f64>,
    pub penalty_cost: f64,
    pub objective_value: f64,
    pub total_demand: f64,
    pub satisfied_units: f64,
    /// Share of shipped units on lanes slower than the slow-lane threshold.
    pub slow_lane_share: f64,
    pub num_dcs: usize,
    pub num_regions: usize,
}

impl KpiSummary {
    /// Scalar KPIs in the long metric/value layout used by the warehouse.
    pub fn metrics(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("total_cost", self.total_cost),
            ("transport_cost", self.transport_cost),
            ("unmet_units", self.unmet_units),
            ("penalty_cost", self.penalty_cost),
            ("objective_value", self.objective_value),
            ("total_demand", self.total_demand),
            ("satisfied_units", self.satisfied_units),
            ("slow_lane_share", self.slow_lane_share),
            ("num_dcs", self.num_dcs as f64),
            ("num_regions", self.num_regions as f64),
        ]
    }
}

impl fmt::Display for KpiSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (metric, value) in self.metrics() {
            writeln!(f, "{metric}: {value:.2}")?;
        }
        for (dc, utilization) in &self.per_dc_utilization {
            writeln!(f, "utilization {dc}: {:.1}%", utilization * 100.0)?;
        }
        Ok(())
    }
}

/// Row-level KPI detail that feeds the persisted tables.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiReport {
    pub summary: KpiSummary,
    pub utilization: Vec<DcUtilization>,
    pub fulfilment: Vec<RegionFulfilment>,
}

/// One row of the `runs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    /// RFC 3339 timestamp.
    pub created_at: String,
    pub solver_status: SolverStatus,
    pub unmet_penalty: f64,
    pub slow_lane_days: f64,
    /// The scenario levers as json.
    pub scenario: String,
}

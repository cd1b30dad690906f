use std::collections::HashMap;

use good_lp::solvers::microlp::microlp;
use good_lp::{
    constraint, variable, variables, Expression, ResolutionError, Solution,
    SolverModel, Variable,
};
use log::{debug, info, warn};
use ndarray::Array2;

use crate::cleaner::round_to;
use crate::datastructures::*;
use crate::error::OptimizationError;


/// Solver values below this are treated as zero.
pub const FLOW_TOLERANCE: f64 = 1e-6;

const TRIM_PASSES: usize = 4;

/// Min-cost transportation problem with an unmet-demand slack per region.
#[derive(Debug, Clone, Copy)]
pub struct TransportationProblem<'a> {
    pub data: &'a CleanedData,
    pub unmet_penalty: f64,
}

impl<'a> TransportationProblem<'a> {
    pub fn new(data: &'a CleanedData, unmet_penalty: f64) -> Self {
        Self {
            data,
            unmet_penalty,
        }
    }
}

/// Anything that can turn a transportation problem into flows.
pub trait FlowSolver {
    fn solve(
        &self,
        problem: &TransportationProblem,
    ) -> Result<FlowSolution, OptimizationError>;
}

/// LP backend using `good_lp` with the pure-Rust microlp simplex solver.
///
/// Simplex ends on a vertex, so flows land on capacity and demand values
/// instead of the interior of an optimal face.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplexSolver;

impl FlowSolver for SimplexSolver {
    fn solve(
        &self,
        problem: &TransportationProblem,
    ) -> Result<FlowSolution, OptimizationError> {
        let TransportationProblem {
            data,
            unmet_penalty,
        } = *problem;
        if !unmet_penalty.is_finite() || unmet_penalty <= 0.0 {
            return Err(OptimizationError {
                status: SolverStatus::SolverFailure,
                message: format!(
                    "unmet penalty must be finite and positive, got {unmet_penalty}"
                ),
            });
        }
        if data.demand.is_empty() {
            debug!("No regions to serve, skipping the solver");
            return Ok(FlowSolution {
                flows: vec![],
                unmet: vec![],
                objective_value: 0.0,
                status: SolverStatus::Optimal,
            });
        }
        let max_unit_cost =
            data.lanes.iter().map(|l| l.unit_cost).fold(0.0, f64::max);
        if unmet_penalty <= max_unit_cost {
            warn!(
                "Unmet penalty {unmet_penalty} does not exceed the largest lane cost {max_unit_cost}, \
                 some demand may be left unmet on purpose"
            );
        }

        let region_index: HashMap<&str, usize> = data
            .demand
            .iter()
            .enumerate()
            .map(|(i, d)| (d.region_id.as_str(), i))
            .collect();
        let dc_index: HashMap<&str, usize> = data
            .capacity
            .iter()
            .enumerate()
            .map(|(i, c)| (c.dc_id.as_str(), i))
            .collect();

        let mut vars = variables!();
        let lane_vars: Vec<Variable> = data
            .lanes
            .iter()
            .map(|_| vars.add(variable().min(0.0)))
            .collect();
        let unmet_vars: Vec<Variable> = data
            .demand
            .iter()
            .map(|_| vars.add(variable().min(0.0)))
            .collect();

        let mut objective = Expression::from(0.0);
        let mut inbound = vec![Expression::from(0.0); data.demand.len()];
        let mut outbound: Vec<Option<Expression>> = vec![None; data.capacity.len()];
        let mut lane_routes: Vec<(usize, usize)> = Vec::with_capacity(data.lanes.len());
        for (lane, &x) in data.lanes.iter().zip(&lane_vars) {
            let (Some(&r), Some(&d)) = (
                region_index.get(lane.region_id.as_str()),
                dc_index.get(lane.dc_id.as_str()),
            ) else {
                return Err(OptimizationError {
                    status: SolverStatus::SolverFailure,
                    message: format!(
                        "lane {} -> {} references an unknown dc or region",
                        lane.dc_id, lane.region_id
                    ),
                });
            };
            lane_routes.push((d, r));
            objective += lane.unit_cost * x;
            inbound[r] += x;
            *outbound[d].get_or_insert_with(|| Expression::from(0.0)) += x;
        }
        for &u in &unmet_vars {
            objective += unmet_penalty * u;
        }

        let mut model = vars.minimise(objective).using(microlp);
        // every region: shipped + unmet == demand
        for ((record, &u), inflow) in
            data.demand.iter().zip(&unmet_vars).zip(inbound)
        {
            model = model.with(constraint!(inflow + u == record.demand));
        }
        // every dc with lanes: shipped <= capacity
        for (record, outflow) in data.capacity.iter().zip(outbound) {
            if let Some(outflow) = outflow {
                model = model.with(constraint!(outflow <= record.capacity));
            }
        }

        info!(
            "Solving transportation LP with {} lanes and {} regions",
            lane_vars.len(),
            unmet_vars.len()
        );
        let solution = model.solve().map_err(|e| {
            let status = match &e {
                ResolutionError::Infeasible => SolverStatus::Infeasible,
                ResolutionError::Unbounded => SolverStatus::Unbounded,
                _ => SolverStatus::SolverFailure,
            };
            OptimizationError {
                status,
                message: e.to_string(),
            }
        })?;

        let raw: Vec<f64> = lane_vars.iter().map(|&x| solution.value(x)).collect();
        let shipped = snap_to_bounds(data, &lane_routes, raw);
        let flows: Vec<FlowAssignment> = data
            .lanes
            .iter()
            .zip(&shipped)
            .filter(|&(_, &flow)| flow > 0.0)
            .map(|(lane, &flow)| FlowAssignment {
                dc_id: lane.dc_id.clone(),
                region_id: lane.region_id.clone(),
                flow,
                unit_cost: lane.unit_cost,
            })
            .collect();
        let mut received = vec![0.0; data.demand.len()];
        for (&(_, r), &flow) in lane_routes.iter().zip(&shipped) {
            received[r] += flow;
        }
        // unmet is whatever the lanes leave uncovered, not the slack value
        let unmet: Vec<(RegionId, f64)> = data
            .demand
            .iter()
            .zip(&received)
            .map(|(d, &inflow)| (d.region_id.clone(), clean_value(d.demand - inflow)))
            .collect();
        let objective_value = flows.iter().map(FlowAssignment::flow_cost).sum::<f64>()
            + unmet_penalty * unmet.iter().map(|(_, u)| u).sum::<f64>();
        info!(
            "LP optimal: {} active lanes, objective {objective_value:.2}",
            flows.len()
        );
        Ok(FlowSolution {
            flows,
            unmet,
            objective_value,
            status: SolverStatus::Optimal,
        })
    }
}

/// Solve with the default backend.
pub fn solve(
    data: &CleanedData,
    unmet_penalty: f64,
) -> Result<FlowSolution, OptimizationError> {
    SimplexSolver.solve(&TransportationProblem::new(data, unmet_penalty))
}

/// Clean raw lane values and trim them so every DC ships at most its
/// capacity and every region receives at most its demand.
///
/// `routes[i]` is the `(dc, region)` index pair of lane `i`.
fn snap_to_bounds(
    data: &CleanedData,
    routes: &[(usize, usize)],
    raw: Vec<f64>,
) -> Vec<f64> {
    let mut flows: Vec<f64> = raw.into_iter().map(clean_value).collect();
    for (d, record) in data.capacity.iter().enumerate() {
        let members: Vec<usize> = (0..routes.len()).filter(|&i| routes[i].0 == d).collect();
        trim_to_limit(&mut flows, &members, record.capacity);
    }
    for (r, record) in data.demand.iter().enumerate() {
        let members: Vec<usize> = (0..routes.len()).filter(|&i| routes[i].1 == r).collect();
        trim_to_limit(&mut flows, &members, record.demand);
    }
    for flow in flows.iter_mut().filter(|f| **f < FLOW_TOLERANCE) {
        *flow = 0.0;
    }
    flows
}

/// Cut the excess of `members` over `limit`, last lane first.
///
/// The sum is recomputed in lane order after each pass, so the check holds
/// for the same left-to-right summation callers use.
fn trim_to_limit(flows: &mut [f64], members: &[usize], limit: f64) {
    for _ in 0..TRIM_PASSES {
        let total: f64 = members.iter().map(|&i| flows[i]).sum();
        if total <= limit {
            return;
        }
        debug!("Trimming {:e} of solver excess", total - limit);
        let mut excess = total - limit;
        for &i in members.iter().rev() {
            let cut = flows[i].min(excess);
            flows[i] -= cut;
            excess -= cut;
            if excess <= 0.0 {
                break;
            }
        }
    }
    if members.iter().map(|&i| flows[i]).sum::<f64>() > limit {
        // still over after every pass
        warn!("Could not trim flows to {limit}, zeroing {} lanes", members.len());
        for &i in members {
            flows[i] = 0.0;
        }
    }
}

/// Zero out solver noise and round to the tolerance grid.
pub(crate) fn clean_value(value: f64) -> f64 {
    if value < FLOW_TOLERANCE {
        0.0
    } else {
        round_to(value, 6)
    }
}

/// Dense DC × region matrix of the flows, in cleaned table order.
pub fn flow_matrix(data: &CleanedData, flows: &[FlowAssignment]) -> FlowMatrix {
    let dc_ids: Vec<DcId> = data.capacity.iter().map(|c| c.dc_id.clone()).collect();
    let region_ids: Vec<RegionId> =
        data.demand.iter().map(|d| d.region_id.clone()).collect();
    let mut matrix = Array2::<f64>::zeros((dc_ids.len(), region_ids.len()));
    for flow in flows {
        let dc = dc_ids.iter().position(|id| *id == flow.dc_id);
        let region = region_ids.iter().position(|id| *id == flow.region_id);
        if let (Some(i), Some(j)) = (dc, region) {
            matrix[(i, j)] += flow.flow;
        }
    }
    FlowMatrix {
        dc_ids,
        region_ids,
        flows: matrix,
    }
}

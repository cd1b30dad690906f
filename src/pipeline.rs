use std::path::PathBuf;

use chrono::Utc;
use itertools::Itertools;
use log::info;
use polars::prelude::*;
use uuid::Uuid;

use crate::analytics;
use crate::charts::{self, Chart};
use crate::cleaner::{self, CleanOutput};
use crate::config::Config;
use crate::csv_parser;
use crate::datastructures::*;
use crate::error::{
    DataValidationError, PersistenceError, PipelineError, Table, ValidationIssue,
};
use crate::kpi::{self, KpiOptions};
use crate::scenario;
use crate::solver::{FlowSolver, SimplexSolver, TransportationProblem};
use crate::writer::{self, OutputWriter};

/// Everything a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub run: RunRecord,
    /// Inputs after cleaning and scenario levers, as handed to the solver.
    pub data: CleanedData,
    pub quality: DataQualityReport,
    pub solution: FlowSolution,
    pub kpis: KpiReport,
    /// Csv files and charts written to the output directory.
    pub written: Vec<PathBuf>,
}

/// Run the whole pipeline with the default LP backend.
pub fn run(config: &Config) -> Result<PipelineOutput, PipelineError> {
    run_with(config, &SimplexSolver)
}

/// Load, clean, apply the scenario, solve, compute KPIs and persist.
///
/// Every fallible step before persisting runs first, so a run that fails
/// leaves the outputs of the previous run in place.
pub fn run_with(
    config: &Config,
    solver: &impl FlowSolver,
) -> Result<PipelineOutput, PipelineError> {
    validate_options(config)?;
    let raw = csv_parser::load_raw(&config.input_paths())?;
    let CleanOutput {
        data: cleaned,
        report: quality,
    } = cleaner::clean(&raw)?;
    let data = scenario::apply(&cleaned, &config.scenario)?;

    let solution =
        solver.solve(&TransportationProblem::new(&data, config.unmet_penalty))?;
    info!(
        "Solved with status {} and objective {:.2}",
        solution.status, solution.objective_value
    );
    let kpis = kpi::compute(
        &data,
        &solution.flows,
        &KpiOptions {
            unmet_penalty: config.unmet_penalty,
            slow_lane_days: config.slow_lane_days,
        },
    )?;
    info!("KPIs:\n{}", kpis.summary);

    let run = RunRecord {
        run_id: config
            .run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        created_at: Utc::now().to_rfc3339(),
        solver_status: solution.status,
        unmet_penalty: config.unmet_penalty,
        slow_lane_days: config.slow_lane_days,
        scenario: serde_json::to_string(&config.scenario)
            .map_err(PersistenceError::from)?,
    };
    let (tables, charts) = output_tables(&run, &data, &quality, &solution, &kpis)?;

    let mut output = OutputWriter::open(
        &config.out_dir,
        &config.database_path(),
        &run.run_id,
    )?;
    for (name, frame) in &tables {
        output.write_table(name, frame)?;
    }
    for chart in &charts {
        output.write_chart(chart)?;
    }
    let written = output.commit()?;

    Ok(PipelineOutput {
        run,
        data,
        quality,
        solution,
        kpis,
        written,
    })
}

fn validate_options(config: &Config) -> Result<(), DataValidationError> {
    let mut issues = Vec::new();
    if !config.unmet_penalty.is_finite() || config.unmet_penalty <= 0.0 {
        issues.push(ValidationIssue {
            table: Table::Scenario,
            row: None,
            column: Some("unmet_penalty".into()),
            message: format!(
                "must be finite and positive, got {}",
                config.unmet_penalty
            ),
        });
    }
    if !config.slow_lane_days.is_finite() || config.slow_lane_days < 0.0 {
        issues.push(ValidationIssue {
            table: Table::Scenario,
            row: None,
            column: Some("slow_lane_days".into()),
            message: format!(
                "must be finite and non-negative, got {}",
                config.slow_lane_days
            ),
        });
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(DataValidationError::new(issues))
    }
}

type NamedFrames = Vec<(&'static str, DataFrame)>;

fn output_tables(
    run: &RunRecord,
    data: &CleanedData,
    quality: &DataQualityReport,
    solution: &FlowSolution,
    kpis: &KpiReport,
) -> PolarsResult<(NamedFrames, Vec<Chart>)> {
    let flows = analytics::flows_frame(&solution.flows)?;
    let demand = analytics::demand_frame(&data.demand)?;
    let cost_by_dc = analytics::cost_by_dc(&flows)?;
    let cost_by_region = analytics::cost_by_region(&flows)?;
    let utilization = analytics::utilization_frame(&kpis.utilization)?;
    let charts =
        charts::output_charts(&utilization, &cost_by_dc, &cost_by_region, &demand)?;
    let unmet = kpis
        .fulfilment
        .iter()
        .filter(|f| f.unmet_units > 0.0)
        .cloned()
        .collect_vec();
    let tables = vec![
        (writer::RUNS, analytics::runs_frame(run)?),
        (writer::DEMAND_CLEAN, demand),
        (
            writer::CAPACITY_CLEAN,
            analytics::capacity_frame(&data.capacity)?,
        ),
        (writer::LANES_CLEAN, analytics::lanes_frame(&data.lanes)?),
        (writer::COST_BY_DC, cost_by_dc),
        (writer::COST_BY_REGION, cost_by_region),
        (writer::FLOW_ASSIGNMENTS, flows),
        (writer::UNMET_DEMAND, analytics::fulfilment_frame(&unmet)?),
        (writer::DC_UTILIZATION, utilization),
        (
            writer::KPI_SUMMARY,
            analytics::metrics_frame(&kpis.summary.metrics())?,
        ),
        (
            writer::DATA_QUALITY,
            analytics::metrics_frame(&quality.metrics())?,
        ),
    ];
    Ok((tables, charts))
}

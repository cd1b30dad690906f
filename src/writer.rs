use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use itertools::Itertools;
use log::{debug, info, warn};
use polars::prelude::*;
use rusqlite::{params_from_iter, types::Value, Connection};

use crate::charts::Chart;
use crate::csv_parser::df_to_csv;
use crate::error::PersistenceError;

pub const RUNS: &str = "runs";
pub const DEMAND_CLEAN: &str = "demand_clean";
pub const CAPACITY_CLEAN: &str = "capacity_clean";
pub const LANES_CLEAN: &str = "lanes_clean";
pub const FLOW_ASSIGNMENTS: &str = "flow_assignments";
pub const UNMET_DEMAND: &str = "unmet_demand";
pub const DC_UTILIZATION: &str = "dc_utilization";
pub const KPI_SUMMARY: &str = "kpi_summary";
pub const COST_BY_DC: &str = "cost_by_dc";
pub const COST_BY_REGION: &str = "cost_by_region";
pub const DATA_QUALITY: &str = "data_quality";
pub const FLOWS_VIEW: &str = "v_flows_enriched";

/// Previous flat files are parked here while a commit swaps files in.
const PREVIOUS_DIR: &str = "previous";

const INDEXES: [(&str, &[&str]); 5] = [
    (DC_UTILIZATION, &["dc_id"]),
    (FLOW_ASSIGNMENTS, &["dc_id", "region_id"]),
    (DEMAND_CLEAN, &["region_id"]),
    (COST_BY_DC, &["dc_id"]),
    (LANES_CLEAN, &["dc_id", "region_id"]),
];

const FLOWS_VIEW_SQL: &str = "
CREATE VIEW v_flows_enriched AS
SELECT f.run_id, f.dc_id, f.region_id, f.flow, f.unit_cost, f.flow_cost,
       l.service_time, d.demand, c.capacity
FROM flow_assignments f
LEFT JOIN lanes_clean l ON f.dc_id = l.dc_id AND f.region_id = l.region_id
LEFT JOIN demand_clean d ON f.region_id = d.region_id
LEFT JOIN capacity_clean c ON f.dc_id = c.dc_id;
";

/// Writes one run's tables to the SQLite warehouse and the csv directory.
///
/// Opening the writer starts an immediate transaction, which also keeps a
/// second writer on the same database waiting. Csv files and charts go to a
/// staging directory first. Nothing becomes visible until
/// [`OutputWriter::commit`]; dropping the writer before that rolls the
/// transaction back and removes the staging directory, leaving the previous
/// run's outputs as they were.
pub struct OutputWriter {
    conn: Connection,
    out_dir: PathBuf,
    staging: PathBuf,
    run_id: String,
    tables: Vec<String>,
    files: Vec<String>,
    committed: bool,
}

impl OutputWriter {
    pub fn open(
        out_dir: &Path,
        database: &Path,
        run_id: &str,
    ) -> Result<Self, PersistenceError> {
        fs::create_dir_all(out_dir)?;
        if let Some(parent) = database.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(database)?;
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        let staging = out_dir.join(format!(".staging-{run_id}"));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        debug!(
            "Opened output writer for run {run_id} on {}",
            database.display()
        );
        Ok(Self {
            conn,
            out_dir: out_dir.to_path_buf(),
            staging,
            run_id: run_id.to_string(),
            tables: vec![],
            files: vec![],
            committed: false,
        })
    }

    /// Replace table `name` with `frame` plus a leading `run_id` column and
    /// stage `<name>.csv`.
    pub fn write_table(
        &mut self,
        name: &str,
        frame: &DataFrame,
    ) -> Result<(), PersistenceError> {
        let mut frame = frame.clone();
        let run_ids =
            Series::new("run_id", vec![self.run_id.clone(); frame.height()]);
        frame.insert_at_idx(0, run_ids)?;
        replace_table(&self.conn, name, &frame)?;
        let file_name = format!("{name}.csv");
        df_to_csv(&mut frame, &self.staging.join(&file_name))?;
        debug!("Staged {name} with {} rows", frame.height());
        self.tables.push(name.to_string());
        self.files.push(file_name);
        Ok(())
    }

    /// Render `chart` into staging.
    pub fn write_chart(&mut self, chart: &Chart) -> Result<(), PersistenceError> {
        chart.render(&self.staging.join(chart.file_name))?;
        debug!("Staged chart {}", chart.file_name);
        self.files.push(chart.file_name.to_string());
        Ok(())
    }

    /// Move the staged files into place, then commit the transaction.
    ///
    /// Previous files are moved aside first. If a move or the commit fails,
    /// they are put back and the transaction is rolled back on drop, so the
    /// warehouse and the flat files never disagree about the current run.
    /// Returns the paths of the files written.
    pub fn commit(mut self) -> Result<Vec<PathBuf>, PersistenceError> {
        self.create_indexes_and_views()?;
        let mut published = Vec::with_capacity(self.files.len());
        if let Err(e) = self.publish(&mut published) {
            warn!("Publishing run {} failed: {e}", self.run_id);
            self.restore(&published);
            return Err(e.into());
        }
        if let Err(e) = self.conn.execute_batch("COMMIT") {
            self.restore(&published);
            return Err(e.into());
        }
        self.committed = true;
        info!(
            "Run {} committed: {} tables and {} files written to {}",
            self.run_id,
            self.tables.len(),
            self.files.len(),
            self.out_dir.display()
        );
        Ok(self.files.iter().map(|f| self.out_dir.join(f)).collect())
    }

    /// Swap every staged file into `out_dir`, parking the file it replaces.
    /// `published` collects the names whose previous file was parked.
    fn publish(&self, published: &mut Vec<String>) -> std::io::Result<()> {
        let previous = self.staging.join(PREVIOUS_DIR);
        fs::create_dir_all(&previous)?;
        for name in &self.files {
            let target = self.out_dir.join(name);
            if target.exists() {
                fs::rename(&target, previous.join(name))?;
            }
            published.push(name.clone());
            fs::rename(self.staging.join(name), &target)?;
        }
        Ok(())
    }

    /// Undo a partial [`OutputWriter::publish`].
    fn restore(&self, published: &[String]) {
        let previous = self.staging.join(PREVIOUS_DIR);
        for name in published.iter().rev() {
            let target = self.out_dir.join(name);
            if target.exists() {
                if let Err(e) = fs::remove_file(&target) {
                    warn!("Could not remove {}: {e}", target.display());
                }
            }
            let parked = previous.join(name);
            if parked.exists() {
                if let Err(e) = fs::rename(&parked, &target) {
                    warn!("Could not restore {}: {e}", target.display());
                }
            }
        }
    }

    fn create_indexes_and_views(&self) -> Result<(), PersistenceError> {
        for (table, columns) in INDEXES {
            if !self.tables.iter().any(|t| t == table) {
                continue;
            }
            for column in columns {
                self.conn.execute_batch(&format!(
                    "CREATE INDEX IF NOT EXISTS ix_{table}_{column} ON {table}({column});"
                ))?;
            }
        }
        let view_tables = [FLOW_ASSIGNMENTS, LANES_CLEAN, DEMAND_CLEAN, CAPACITY_CLEAN];
        if view_tables
            .iter()
            .all(|table| self.tables.iter().any(|t| t == table))
        {
            self.conn
                .execute_batch(&format!("DROP VIEW IF EXISTS {FLOWS_VIEW};"))?;
            self.conn.execute_batch(FLOWS_VIEW_SQL)?;
        }
        Ok(())
    }
}

impl Drop for OutputWriter {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("Rollback of run {} failed: {e}", self.run_id);
            }
            warn!("Run {} aborted, previous outputs kept", self.run_id);
        }
        if self.staging.exists() {
            if let Err(e) = fs::remove_dir_all(&self.staging) {
                warn!("Could not remove {}: {e}", self.staging.display());
            }
        }
    }
}

fn sql_type(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Utf8 => "TEXT",
        DataType::Int64
        | DataType::Int32
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Boolean => "INTEGER",
        _ => "REAL",
    }
}

fn column_values(series: &Series) -> PolarsResult<Vec<Value>> {
    let values = match sql_type(series.dtype()) {
        "TEXT" => series
            .utf8()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, |s| Value::Text(s.to_string())))
            .collect_vec(),
        "INTEGER" => {
            let cast = series.cast(&DataType::Int64)?;
            let values = cast
                .i64()?
                .into_iter()
                .map(|v| v.map_or(Value::Null, Value::Integer))
                .collect_vec();
            values
        }
        _ => {
            let cast = series.cast(&DataType::Float64)?;
            let values = cast
                .f64()?
                .into_iter()
                .map(|v| v.map_or(Value::Null, Value::Real))
                .collect_vec();
            values
        }
    };
    Ok(values)
}

/// Drop, recreate and fill `name` from the frame, like a pandas
/// `to_sql(if_exists="replace")`.
fn replace_table(
    conn: &Connection,
    name: &str,
    frame: &DataFrame,
) -> Result<(), PersistenceError> {
    let columns = frame.get_columns();
    let declarations = columns
        .iter()
        .map(|s| format!("\"{}\" {}", s.name(), sql_type(s.dtype())))
        .join(", ");
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS \"{name}\"; CREATE TABLE \"{name}\" ({declarations});"
    ))?;
    let values = columns
        .iter()
        .map(column_values)
        .collect::<PolarsResult<Vec<_>>>()?;
    let placeholders = (1..=columns.len()).map(|i| format!("?{i}")).join(", ");
    let mut stmt =
        conn.prepare(&format!("INSERT INTO \"{name}\" VALUES ({placeholders})"))?;
    for row in 0..frame.height() {
        stmt.execute(params_from_iter(values.iter().map(|column| &column[row])))?;
    }
    Ok(())
}

use core::fmt;

use itertools::Itertools;
use polars::prelude::PolarsError;
use thiserror::Error;

use crate::datastructures::SolverStatus;

/// The input table an issue was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Demand,
    Capacity,
    Lanes,
    Scenario,
    Flows,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Table::Demand => "demand",
            Table::Capacity => "capacity",
            Table::Lanes => "lanes",
            Table::Scenario => "scenario",
            Table::Flows => "flows",
        };
        write!(f, "{name}")
    }
}

/// A single offending cell, row or table.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub table: Table,
    /// Zero-based data row, `None` if the issue concerns the whole table.
    pub row: Option<usize>,
    pub column: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn table(table: Table, message: impl Into<String>) -> Self {
        Self {
            table,
            row: None,
            column: None,
            message: message.into(),
        }
    }

    pub fn cell(
        table: Table,
        row: usize,
        column: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            table,
            row: Some(row),
            column: Some(column.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table)?;
        if let Some(row) = self.row {
            write!(f, " row {row}")?;
        }
        if let Some(column) = &self.column {
            write!(f, " column '{column}'")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Bad or missing input. Enumerates every problem found so the input can be
/// fixed in one go.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} invalid input value(s):\n  {}", .issues.len(), .issues.iter().join("\n  "))]
pub struct DataValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl DataValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn single(issue: ValidationIssue) -> Self {
        Self {
            issues: vec![issue],
        }
    }
}

/// The LP could not be solved. `status` separates an infeasible model from a
/// solver that gave up.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("optimization failed ({status}): {message}")]
pub struct OptimizationError {
    pub status: SolverStatus,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataframe: {0}")]
    Frame(#[from] PolarsError),
    #[error("serialization: {0}")]
    Json(#[from] serde_json::Error),
    #[error("chart: {0}")]
    Chart(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] DataValidationError),
    #[error(transparent)]
    Optimization(#[from] OptimizationError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<rusqlite::Error> for PipelineError {
    fn from(e: rusqlite::Error) -> Self {
        PipelineError::Persistence(e.into())
    }
}

impl From<PolarsError> for PipelineError {
    fn from(e: PolarsError) -> Self {
        PipelineError::Persistence(e.into())
    }
}

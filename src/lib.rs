//! Optimize the flow of goods from distribution centers to demand regions.
//!
//! Raw demand, capacity and lane tables are cleaned, optionally reshaped by
//! scenario levers, and fed to a min-cost transportation LP in which every
//! region may leave demand unmet at a penalty. The resulting flows are
//! summarised into KPIs and persisted to a SQLite warehouse plus csv and chart
//! files, which the query catalog answers canned questions from.
//!
//! The LP is solved with [good_lp](https://docs.rs/good_lp) and the pure-Rust
//! microlp simplex solver, so no external solver installation is needed.
//!
//! The crate ships three executables: `supply_chain_twin` runs the pipeline,
//! `data_generator` writes messy synthetic inputs and `ask` answers questions
//! against a warehouse.
//!
//! Example
//! ```rust,no_run
//! use supply_chain_twin::config::Config;
//! use supply_chain_twin::pipeline;
//! # use anyhow::Result;
//!
//! fn example() -> Result<()> {
//!     let config = Config {
//!         raw_dir: "data/raw".into(), // demand.csv, capacity.csv, lanes.csv
//!         out_dir: "data/results".into(),
//!         ..Config::default()
//!     };
//!     let output = pipeline::run(&config)?;
//!     println!("{}", serde_json::to_string_pretty(&output.kpis.summary)?);
//!     Ok(())
//! }
//! ```

/// Polars breakdowns and the frames persisted by the writer.
pub mod analytics;

/// SVG charts written next to the csv files.
pub mod charts;

/// Validation and coercion of the raw input tables.
pub mod cleaner;

/// Run configuration from json and command line.
pub mod config;

/// Loading of the raw csv inputs.
pub mod csv_parser;

/// Records, solutions and KPI types shared across the pipeline.
pub mod datastructures;

/// Error taxonomy of the library.
pub mod error;

/// KPI calculation over a set of flows.
pub mod kpi;

/// The end-to-end run.
pub mod pipeline;

/// Canonical questions answered from the warehouse.
pub mod queries;

/// What-if levers on demand and capacity.
pub mod scenario;

/// The transportation LP and its solver backend.
pub mod solver;

/// All-or-nothing persistence of a run.
pub mod writer;

#[cfg(test)]
mod test_utils;

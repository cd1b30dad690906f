use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use serde::{Deserialize, Serialize};

use crate::datastructures::{DcId, RegionId};

/// Cost charged per unit of demand left unserved. Large enough to dominate
/// any realistic lane cost, so the solver only leaves demand unmet when
/// capacity or lanes run out.
pub const DEFAULT_UNMET_PENALTY: f64 = 1_000.0;

/// Lanes slower than this many days count as slow lanes.
pub const DEFAULT_SLOW_LANE_DAYS: f64 = 2.0;

pub const DEMAND_FILE: &str = "demand.csv";
pub const CAPACITY_FILE: &str = "capacity.csv";
pub const LANES_FILE: &str = "lanes.csv";
pub const DATABASE_FILE: &str = "warehouse.db";

/// What-if levers applied to the cleaned inputs before solving.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    #[serde(default = "default_scale")]
    pub demand_scale: f64,
    #[serde(default)]
    pub region_demand_mult: BTreeMap<RegionId, f64>,
    #[serde(default)]
    pub dc_capacity_mult: BTreeMap<DcId, f64>,
    #[serde(default)]
    pub dc_capacity_delta: BTreeMap<DcId, f64>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            demand_scale: default_scale(),
            region_demand_mult: BTreeMap::new(),
            dc_capacity_mult: BTreeMap::new(),
            dc_capacity_delta: BTreeMap::new(),
        }
    }
}

impl ScenarioConfig {
    pub fn is_baseline(&self) -> bool {
        self == &ScenarioConfig::default()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub raw_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Defaults to `<out_dir>/warehouse.db`.
    #[serde(default)]
    pub database: Option<PathBuf>,
    #[serde(default = "default_unmet_penalty")]
    pub unmet_penalty: f64,
    #[serde(default = "default_slow_lane_days")]
    pub slow_lane_days: f64,
    #[serde(default)]
    pub scenario: ScenarioConfig,
    /// Generated when absent.
    #[serde(default)]
    pub run_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            out_dir: PathBuf::from("data/results"),
            database: None,
            unmet_penalty: DEFAULT_UNMET_PENALTY,
            slow_lane_days: DEFAULT_SLOW_LANE_DAYS,
            scenario: ScenarioConfig::default(),
            run_id: None,
        }
    }
}

impl Config {
    pub fn from_cli(args: &Args) -> Result<Config> {
        let mut config = match &args.config {
            Some(config_path) => {
                let config_str = fs::read_to_string(config_path)
                    .with_context(|| {
                        format!("reading config {}", config_path.display())
                    })?;
                serde_json::from_str(&config_str)?
            }
            None => Config::default(),
        };
        if let Some(raw_dir) = &args.raw_dir {
            config.raw_dir = raw_dir.to_path_buf();
        }
        if let Some(out_dir) = &args.out_dir {
            config.out_dir = out_dir.to_path_buf();
        }
        if let Some(database) = &args.database {
            config.database = Some(database.to_path_buf());
        }
        if let Some(scenario_path) = &args.scenario {
            let scenario_str = fs::read_to_string(scenario_path)
                .with_context(|| {
                    format!("reading scenario {}", scenario_path.display())
                })?;
            config.scenario = serde_json::from_str(&scenario_str)?;
        }
        if let Some(unmet_penalty) = args.unmet_penalty {
            config.unmet_penalty = unmet_penalty;
        }
        if let Some(slow_lane_days) = args.slow_lane_days {
            config.slow_lane_days = slow_lane_days;
        }
        if let Some(run_id) = &args.run_id {
            config.run_id = Some(run_id.clone());
        }
        Ok(config)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| self.out_dir.join(DATABASE_FILE))
    }

    pub fn input_paths(&self) -> InputPaths {
        InputPaths::in_dir(&self.raw_dir)
    }
}

/// Locations of the three raw input tables.
#[derive(Debug, Clone, PartialEq)]
pub struct InputPaths {
    pub demand: PathBuf,
    pub capacity: PathBuf,
    pub lanes: PathBuf,
}

impl InputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            demand: dir.join(DEMAND_FILE),
            capacity: dir.join(CAPACITY_FILE),
            lanes: dir.join(LANES_FILE),
        }
    }
}

fn default_scale() -> f64 {
    1.0
}

fn default_unmet_penalty() -> f64 {
    DEFAULT_UNMET_PENALTY
}

fn default_slow_lane_days() -> f64 {
    DEFAULT_SLOW_LANE_DAYS
}

#[derive(Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Path to the json config
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory containing demand.csv, capacity.csv and lanes.csv
    #[arg(short, long)]
    pub raw_dir: Option<PathBuf>,

    /// Directory for the csv outputs
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// SQLite warehouse, defaults to <out_dir>/warehouse.db
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Path to a json file with scenario levers
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,

    /// Cost per unit of unmet demand
    #[arg(long)]
    pub unmet_penalty: Option<f64>,

    /// Service time in days above which a lane counts as slow
    #[arg(long)]
    pub slow_lane_days: Option<f64>,

    /// Identifier stored with every persisted row
    #[arg(long)]
    pub run_id: Option<String>,

    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

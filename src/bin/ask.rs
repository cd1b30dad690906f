use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::warn;
use std::{path::PathBuf, process};

use supply_chain_twin::config::{DATABASE_FILE, DEFAULT_SLOW_LANE_DAYS};
use supply_chain_twin::queries::{self, Question};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// The question, e.g. "which DC has the highest utilization?"
    question: Vec<String>,

    /// SQLite warehouse written by a pipeline run
    #[arg(short, long, default_value = "data/results")]
    out_dir: PathBuf,

    /// Overrides <out_dir>/warehouse.db
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Service time in days above which a lane counts as slow
    #[arg(long, default_value_t = DEFAULT_SLOW_LANE_DAYS)]
    slow_lane_days: f64,

    /// Print the answer as json
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbosity.log_level_filter())
        .init();
    let question = args.question.join(" ");
    let Some(mut routed) = queries::route(&question) else {
        warn!("No canned answer for '{question}'");
        process::exit(exitcode::USAGE);
    };
    if let Question::SlowLanes { min_days, .. } = &mut routed {
        *min_days = args.slow_lane_days;
    }
    let database = args
        .database
        .unwrap_or_else(|| args.out_dir.join(DATABASE_FILE));
    let conn = queries::open_warehouse(&database)
        .with_context(|| format!("opening warehouse {}", database.display()))?;
    let answer = queries::answer(&conn, &routed)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        println!("{}\n(source: {})", answer.text, answer.source);
    }
    Ok(())
}

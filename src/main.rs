use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::process;

use supply_chain_twin::config::{Args, Config};
use supply_chain_twin::error::{PersistenceError, PipelineError};
use supply_chain_twin::pipeline;

fn exit_code(err: &PipelineError) -> exitcode::ExitCode {
    match err {
        PipelineError::Validation(_) => exitcode::DATAERR,
        PipelineError::Optimization(_) => exitcode::SOFTWARE,
        PipelineError::Persistence(PersistenceError::Io(_)) => exitcode::CANTCREAT,
        PipelineError::Persistence(_) => exitcode::IOERR,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbosity.log_level_filter())
        .init();
    let config = match Config::from_cli(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e:#}");
            process::exit(exitcode::CONFIG);
        }
    };
    let output = match pipeline::run(&config) {
        Ok(output) => output,
        Err(e) => {
            error!("{e}");
            process::exit(exit_code(&e));
        }
    };
    info!(
        "Run {} wrote {} files to {}",
        output.run.run_id,
        output.written.len(),
        config.out_dir.display()
    );
    println!("{}", serde_json::to_string_pretty(&output.kpis.summary)?);
    Ok(())
}

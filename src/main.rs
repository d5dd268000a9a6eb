use agent_index::config::Config;
use agent_index::{config_loader, scenario};
use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};
use std::path::PathBuf;

/// Replay index registry operations and report the resulting allocations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the scenario YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Print the final registry as JSON instead of the text report
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    let config = config_loader::load_config(&args.config)?;

    // RUST_LOG wins over the scenario's log level
    env_logger::Builder::from_env(Env::default().default_filter_or(log_filter(&config))).init();

    info!("Loaded scenario from: {:?}", args.config);
    info!(
        "Replaying {} operation(s) for a {:?} agent",
        config.operations.len(),
        config.general.role
    );

    let report = scenario::run_scenario(&config)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report.snapshot)
            .wrap_err("Failed to serialize registry snapshot")?;
        println!("{}", json);
    } else if report.final_dump.is_empty() {
        println!("No index allocations");
    } else {
        print!("{}", report.final_dump);
    }

    let mismatches = report.mismatches();
    if !mismatches.is_empty() {
        for step in &mismatches {
            warn!("Operation #{} did not match its expected outcome", step.position);
        }
        return Err(eyre!(
            "{} of {} operation(s) did not match their expected outcome",
            mismatches.len(),
            report.steps.len()
        ));
    }

    info!("Scenario completed successfully");
    Ok(())
}

/// Default log filter for a scenario run
fn log_filter(config: &Config) -> String {
    config
        .general
        .log_level
        .clone()
        .unwrap_or_else(|| "info".to_string())
}

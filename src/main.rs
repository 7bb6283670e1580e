use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use acceptance_steps::config::StepsConfig;
use acceptance_steps::runner::{RunReport, SequentialRunner};
use acceptance_steps::scenario::loader::load_scenario_from_file;
use acceptance_steps::scenario::validation::validate_scenario;
use acceptance_steps::scenario::Scenario;
use acceptance_steps::step::StepStatus;
use acceptance_steps::telemetry::{self, TelemetryConfig};

#[derive(Parser)]
#[command(name = "acceptance-steps")]
#[command(about = "Runs acceptance step scenarios against an in-process client", long_about = None)]
struct Cli {
    /// Log at DEBUG unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs a scenario and prints or writes its report
    Execute {
        /// Path to the scenario JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Path to the output report file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory fixture paths are resolved against
        #[arg(long)]
        fixtures: Option<PathBuf>,

        /// Bound applied to every step
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Run every step even after a failure
        #[arg(long)]
        keep_going: bool,
    },

    /// Checks a scenario's structure without running it
    Validate {
        /// Path to the scenario JSON file
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = telemetry::init_telemetry(TelemetryConfig::from_env().verbose(cli.verbose)) {
        eprintln!("Failed to initialise telemetry: {:#}", e);
    }

    let passed = match &cli.command {
        Commands::Execute {
            file,
            output,
            fixtures,
            timeout_secs,
            keep_going,
        } => {
            let mut config = StepsConfig::from_env();
            if let Some(dir) = fixtures {
                config.fixture_root = dir.clone();
            }
            if let Some(secs) = timeout_secs {
                config.step_timeout = Duration::from_secs(*secs);
            }
            if *keep_going {
                config.stop_on_failure = false;
            }
            execute_scenario(file, output.as_deref(), &config).await
        }
        Commands::Validate { file } => validate_file(file),
    };

    telemetry::shutdown_telemetry();

    match passed {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn load_valid_scenario(file: &Path) -> Result<Option<Scenario>> {
    let scenario = load_scenario_from_file(file)?;
    match validate_scenario(&scenario) {
        Ok(()) => Ok(Some(scenario)),
        Err(errors) => {
            eprintln!("Scenario {:?} is invalid:", file);
            for err in errors {
                eprintln!("  - {}", err);
            }
            Ok(None)
        }
    }
}

fn validate_file(file: &Path) -> Result<bool> {
    let Some(scenario) = load_valid_scenario(file)? else {
        return Ok(false);
    };
    println!(
        "Scenario '{}' is valid ({} step entries)",
        scenario.name,
        scenario.steps.len()
    );
    Ok(true)
}

async fn execute_scenario(file: &Path, output: Option<&Path>, config: &StepsConfig) -> Result<bool> {
    let Some(scenario) = load_valid_scenario(file)? else {
        return Ok(false);
    };
    info!(scenario = %scenario.name, "Scenario loaded");

    let world = scenario.build_world(config)?;
    let steps = scenario.steps(&world.factory)?;

    let report = SequentialRunner::from_config(config)
        .run(&scenario.name, steps)
        .await;

    write_report(&report, output)?;
    println!(
        "{}: {} passed, {} failed, {} timed out, {} skipped",
        scenario.name,
        report.count(StepStatus::Passed),
        report.count(StepStatus::Failed),
        report.count(StepStatus::TimedOut),
        report.count(StepStatus::Skipped),
    );
    Ok(report.passed())
}

fn write_report(report: &RunReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialise report")?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write report {:?}", path))?;
            info!(path = ?path, "Report saved");
        }
        None => println!("{}", json),
    }
    Ok(())
}

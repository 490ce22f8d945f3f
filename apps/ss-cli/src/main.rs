mod error;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::Level;

use error::{CliError, CliResult};
use ss_controls::{RATIO_MAX, RATIO_MIN};
use ss_sim::RunRecord;

#[derive(Parser)]
#[command(name = "ss-cli")]
#[command(about = "stagesync - stage temperature synchronization tool", long_about = None)]
struct Cli {
    /// Log controller activity at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file
    Validate {
        /// Path to the YAML or JSON configuration
        config_path: PathBuf,
    },
    /// List controllers and their stage ratios
    Show {
        /// Path to the YAML or JSON configuration
        config_path: PathBuf,
    },
    /// Run the file's scenario on the simulated host
    Simulate {
        /// Path to the YAML or JSON configuration
        config_path: PathBuf,
        /// End time in seconds (defaults to the scenario's)
        #[arg(long)]
        t_end: Option<f64>,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Show { config_path } => cmd_show(&config_path),
        Commands::Simulate { config_path, t_end } => cmd_simulate(&config_path, t_end),
    }
}

fn cmd_validate(config_path: &Path) -> CliResult<()> {
    println!("Validating configuration: {}", config_path.display());
    let file = ss_project::load(config_path)?;
    println!(
        "✓ Configuration is valid ({} controller(s), {} heater(s))",
        file.controllers.len(),
        file.heaters.len()
    );
    Ok(())
}

fn cmd_show(config_path: &Path) -> CliResult<()> {
    let file = ss_project::load(config_path)?;
    let controllers = ss_project::controller_settings(&file)?;

    if controllers.is_empty() {
        println!("No controllers configured");
        return Ok(());
    }
    println!("Controllers (ratio range {RATIO_MIN}..={RATIO_MAX}):");
    for settings in &controllers {
        println!(
            "  {} - every {:.3} s, {} stage(s)",
            settings.primary_id(),
            settings.sample().period(),
            settings.table().len()
        );
        for entry in settings.table() {
            println!("    {:<24} x {}", entry.stage_id.as_str(), entry.ratio);
        }
    }
    Ok(())
}

fn cmd_simulate(config_path: &Path, t_end: Option<f64>) -> CliResult<()> {
    println!("Simulating: {}", config_path.display());
    let record = ss_sim::run_path(config_path, t_end)?;
    print_record(&record);

    match record.shutdown {
        Some(message) => Err(CliError::Shutdown { message }),
        None => Ok(()),
    }
}

fn print_record(record: &RunRecord) {
    if record.commands.is_empty() {
        println!("No commands sent");
    } else {
        println!("Commands:");
        for command in &record.commands {
            println!("  [{:>8.3}] {}", command.at, command.script);
        }
    }

    println!("Summary:");
    println!("  End time: {:.3} s", record.end_time);
    println!("  Ticks: {} ({} idle)", record.ticks, record.idle_ticks);
    println!("  Propagations: {}", record.propagations);
    println!("  Failed stage commands: {}", record.propagation_faults);
    println!("Final targets:");
    for (heater, target) in &record.final_targets {
        println!("  {:<24} {:.1}", heater.as_str(), target);
    }
    if let Some(message) = &record.shutdown {
        println!("✗ Shutdown: {}", message);
    } else {
        println!("✓ Completed without shutdown");
    }
}

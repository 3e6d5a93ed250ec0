//! Scenario runner CLI
//!
//! Runs a possession scenario headless and writes the report as JSON.

#[cfg(feature = "cli")]
use anyhow::Result;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use gp_core::PieceEventType;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "gp_sim")]
#[command(about = "Run game-piece possession scenarios", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print or save its report
    Run {
        /// Scenario file (.yaml, .yml or .json)
        #[arg(long)]
        scenario: PathBuf,

        /// Override the scenario's tick count
        #[arg(long)]
        ticks: Option<u64>,

        /// Output JSON file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Check a scenario without running it
    Validate {
        /// Scenario file (.yaml, .yml or .json)
        #[arg(long)]
        scenario: PathBuf,
    },
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { scenario, ticks, out } => {
            let summary = gp_sim::run_scenario_file(&scenario, ticks)?;
            match out {
                Some(path) => {
                    gp_sim::write_summary(&path, &summary)?;
                    print_summary(&summary);
                    println!("\nReport saved to: {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&summary)?),
            }
        }

        Commands::Validate { scenario } => {
            let stats = gp_sim::validate_scenario_file(&scenario)?;
            println!("Scenario OK: {}", scenario.display());
            println!("   Robots:  {} ({} intakes, {} nodes)", stats.robots, stats.intakes, stats.nodes);
            println!("   Pieces:  {}", stats.pieces);
            println!("   Script:  {} steps over {} ticks", stats.script_steps, stats.ticks);
        }
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn print_summary(summary: &gp_sim::RunSummary) {
    println!("Ran {} for {} ticks", summary.scenario, summary.report.ticks);
    println!("   Captures: {}", summary.count(PieceEventType::Claimed));
    println!("   Releases: {}", summary.count(PieceEventType::Released));
    println!("   Lost:     {}", summary.count(PieceEventType::Lost));
    for node in &summary.report.nodes {
        println!(
            "   {}/{}: ordinal {} state {}",
            node.robot,
            node.node,
            node.ordinal,
            node.settled.as_deref().unwrap_or("-")
        );
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("gp_sim CLI is not available. Enable the 'cli' feature to use it.");
    std::process::exit(1);
}

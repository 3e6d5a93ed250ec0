//! Scenario runner
//!
//! Scenario file (YAML or JSON) → build → run → timestamped JSON summary.

use anyhow::{Context, Result};
use gp_core::{PieceEventType, ScenarioConfig, ScenarioReport};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Run output as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario file the run came from
    pub scenario: String,
    /// Creation time (RFC3339)
    pub generated_at: String,
    pub core_version: String,
    /// Schema version of `report`
    pub api_version: String,
    pub report: ScenarioReport,
}

impl RunSummary {
    pub fn count(&self, event_type: PieceEventType) -> usize {
        self.report.events.iter().filter(|e| e.event_type == event_type).count()
    }
}

/// Shape of a scenario that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScenarioStats {
    pub robots: usize,
    pub intakes: usize,
    pub nodes: usize,
    pub pieces: usize,
    pub script_steps: usize,
    pub ticks: u64,
}

pub fn load_scenario(path: &Path) -> Result<ScenarioConfig> {
    ScenarioConfig::load(path).with_context(|| format!("Failed to load scenario: {}", path.display()))
}

/// Build and run the scenario at `path`. `ticks` overrides the file's tick
/// count.
pub fn run_scenario_file(path: &Path, ticks: Option<u64>) -> Result<RunSummary> {
    let config = load_scenario(path)?;
    let mut scenario = config.build().with_context(|| format!("Invalid scenario: {}", path.display()))?;
    if let Some(ticks) = ticks {
        scenario.ticks = ticks;
    }
    log::info!("running {} for {} ticks", path.display(), scenario.ticks);

    let report = scenario.run();
    Ok(RunSummary {
        scenario: path.display().to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        core_version: gp_core::VERSION.to_string(),
        api_version: gp_core::API_VERSION.to_string(),
        report,
    })
}

/// Check the scenario at `path` without running it.
pub fn validate_scenario_file(path: &Path) -> Result<ScenarioStats> {
    let config = load_scenario(path)?;
    let scenario = config.build().with_context(|| format!("Invalid scenario: {}", path.display()))?;
    let robots = scenario.sim.robots();
    Ok(ScenarioStats {
        robots: robots.len(),
        intakes: robots.iter().map(|r| r.intakes().len()).sum(),
        nodes: robots.iter().map(|r| r.nodes().len()).sum(),
        pieces: scenario.sim.world().piece_count(),
        script_steps: scenario.script().len(),
        ticks: scenario.ticks,
    })
}

pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize run summary")?;
    fs::write(path, json).with_context(|| format!("Failed to write output file: {}", path.display()))?;
    Ok(())
}

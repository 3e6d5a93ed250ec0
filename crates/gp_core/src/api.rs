//! JSON API
//!
//! String-in/string-out entry points for hosts that embed the pipeline
//! without linking against its types.

use crate::config::ScenarioConfig;
use crate::error::Result;
use crate::sim::ScenarioReport;
use tracing::{debug, error, info};

/// API version for schema compatibility
pub const API_VERSION: &str = "v1";

/// Parse a JSON scenario, run it for its configured ticks and return the
/// report as JSON.
pub fn run_scenario_json(request: &str) -> Result<String> {
    let report = run_scenario(request)?;
    Ok(serde_json::to_string(&report)?)
}

/// Same as [`run_scenario_json`] but hands back the typed report.
pub fn run_scenario(request: &str) -> Result<ScenarioReport> {
    info!("Processing scenario request (api {})", API_VERSION);
    let config = ScenarioConfig::from_json_str(request).map_err(|e| {
        error!("Failed to parse ScenarioConfig: {}", e);
        e
    })?;
    let scenario = config.build().map_err(|e| {
        error!("Scenario validation failed: {}", e);
        e
    })?;
    debug!(
        "Running {} ticks with {} robots and {} pieces",
        scenario.ticks,
        scenario.sim.robots().len(),
        scenario.sim.world().piece_count()
    );
    let report = scenario.run();
    info!("Scenario finished after {} ticks with {} events", report.ticks, report.events.len());
    Ok(report)
}

/// Check a JSON scenario without running it.
pub fn validate_scenario_json(request: &str) -> Result<()> {
    ScenarioConfig::from_json_str(request)?.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::events::PieceEventType;

    const REQUEST: &str = r#"{
        "ticks": 200,
        "piece_kinds": [{ "name": "ball", "layer": 1, "radius_in": 3.0 }],
        "robots": [{
            "name": "r1",
            "collision_group": 2,
            "frames": [{ "name": "mouth", "position_in": [0, 6, 12] }],
            "intakes": [{
                "name": "front",
                "piece_kind": "ball",
                "target_frame": "mouth",
                "volumes": [{ "frame": "mouth", "shape": "box", "half_extents": [10, 10, 10] }]
            }],
            "nodes": [{
                "name": "ball",
                "piece_kind": "ball",
                "intakes": ["front"],
                "states": [{ "name": "Hold" }]
            }]
        }],
        "spawns": [{ "piece_kind": "ball", "position_in": [0, 3, 18] }],
        "script": [
            { "tick": 0, "command": "request_intake", "robot": "r1", "node": "ball", "intake": "front", "enabled": true }
        ]
    }"#;

    #[test]
    fn test_run_scenario_captures_piece() {
        let report = run_scenario(REQUEST).unwrap();
        assert_eq!(report.ticks, 200);
        assert_eq!(report.nodes.len(), 1);
        assert_eq!(report.nodes[0].ordinal, 1);
        assert!(report.nodes[0].at_target);
        assert!(report.events.iter().any(|e| e.event_type == PieceEventType::Claimed));

        let json = run_scenario_json(REQUEST).unwrap();
        assert!(json.contains("\"claimed\""));
    }

    #[test]
    fn test_bad_request_is_config_error() {
        assert!(matches!(run_scenario_json("{ not json"), Err(ConfigError::Json(_))));
        let unknown = REQUEST.replace("\"target_frame\": \"mouth\"", "\"target_frame\": \"chute\"");
        assert!(matches!(validate_scenario_json(&unknown), Err(ConfigError::UnknownFrame { .. })));
    }
}

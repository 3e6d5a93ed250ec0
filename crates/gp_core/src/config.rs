//! Static configuration
//!
//! Scenarios are described in YAML or JSON using engineering units (inches,
//! degrees). [`ScenarioConfig::build`] validates everything and resolves
//! every name to an id, so nothing string-keyed survives past this module
//! apart from the case-insensitive state lookup nodes keep for callers.
//!
//! Robot frames are namespaced by robot: frame `mouth` on robot `blue` is
//! registered as `blue/mouth`, and the robot's own name is its root frame.

use crate::error::{ConfigError, Result};
use crate::guidance::{BreakableParams, SymmetryClass};
use crate::intake::{CaptureVolume, IntakeId, IntakeSpec};
use crate::math::{pose, quat_from_euler_deg, Pose, Vec3};
use crate::node::StateSpec;
use crate::physics::{CollisionGroup, CollisionLayer, ForceMode, FrameId, PieceId, VolumeShape, World};
use crate::physics_constants::units::{inches, inches_vec};
use crate::piece::PieceDescriptor;
use crate::sim::{Command, Scenario, ScriptStep, Simulation};
use crate::timestep::FIXED_DT;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn inches_pose(position_in: [f32; 3], rotation_deg: [f32; 3]) -> Pose {
    pose(inches_vec(position_in), quat_from_euler_deg(rotation_deg))
}

fn default_true() -> bool {
    true
}

// ============================================================
// Piece kinds
// ============================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PieceKindConfig {
    pub name: String,
    pub layer: u32,
    pub symmetry: SymmetryClass,
    pub radius_in: f32,
    pub mass_kg: f32,
    pub drag: f32,
    pub angular_drag: f32,
    /// Principal inertia (kg·m²)
    pub inertia: [f32; 3],
    pub low_profile: bool,
}

impl Default for PieceKindConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            layer: 0,
            symmetry: SymmetryClass::None,
            radius_in: 4.0,
            mass_kg: 0.25,
            drag: 0.0,
            angular_drag: 0.05,
            inertia: [0.01, 0.01, 0.01],
            low_profile: false,
        }
    }
}

impl PieceKindConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("radius_in", self.radius_in),
            ("mass_kg", self.mass_kg),
            ("inertia.x", self.inertia[0]),
            ("inertia.y", self.inertia[1]),
            ("inertia.z", self.inertia[2]),
        ];
        for (field, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::invalid(format!("{}.{field}", self.name), value));
            }
        }
        for (field, value) in [("drag", self.drag), ("angular_drag", self.angular_drag)] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ConfigError::invalid(format!("{}.{field}", self.name), value));
            }
        }
        Ok(())
    }

    pub fn descriptor(&self) -> PieceDescriptor {
        PieceDescriptor::new(&self.name, CollisionLayer(self.layer))
            .with_symmetry(self.symmetry)
            .with_radius(inches(self.radius_in))
            .with_mass(self.mass_kg, self.drag, self.angular_drag)
            .with_low_profile(self.low_profile)
            .with_inertia(Vec3::from(self.inertia))
    }
}

// ============================================================
// Robots
// ============================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameConfig {
    pub name: String,
    /// Another frame of the same robot; the robot root when absent
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub position_in: [f32; 3],
    #[serde(default)]
    pub rotation_deg: [f32; 3],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub frame: String,
    /// Sized in inches
    #[serde(flatten)]
    pub shape: VolumeShape,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntakeConfig {
    pub name: String,
    pub piece_kind: String,
    pub target_frame: String,
    pub volumes: Vec<VolumeConfig>,
    #[serde(default)]
    pub breakable: BreakableParams,
    #[serde(default)]
    pub smooth_handoff: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    pub name: String,
    /// Target frame; absent means "hold in place"
    #[serde(default)]
    pub frame: Option<String>,
    #[serde(default = "StateConfig::default_linear_speed")]
    pub linear_speed_in: f32,
    #[serde(default = "StateConfig::default_angular_speed")]
    pub angular_speed_deg: f32,
    #[serde(default)]
    pub smooth_handoff: bool,
}

impl StateConfig {
    fn default_linear_speed() -> f32 {
        60.0
    }

    fn default_angular_speed() -> f32 {
        360.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub piece_kind: String,
    #[serde(default)]
    pub intakes: Vec<String>,
    pub states: Vec<StateConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    pub name: String,
    pub collision_group: u32,
    #[serde(default)]
    pub position_in: [f32; 3],
    #[serde(default)]
    pub rotation_deg: [f32; 3],
    /// Constant root motion (in/s)
    #[serde(default)]
    pub velocity_in: [f32; 3],
    #[serde(default)]
    pub frames: Vec<FrameConfig>,
    #[serde(default)]
    pub intakes: Vec<IntakeConfig>,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

impl RobotConfig {
    fn frame_name(&self, local: &str) -> String {
        if local == self.name {
            local.to_string()
        } else {
            format!("{}/{}", self.name, local)
        }
    }

    fn frame(&self, world: &World, local: &str) -> Result<FrameId> {
        world.frames.id(&self.frame_name(local)).ok_or_else(|| ConfigError::UnknownFrame { name: local.to_string() })
    }
}

// ============================================================
// Scenario
// ============================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnConfig {
    pub piece_kind: String,
    #[serde(default)]
    pub position_in: [f32; 3],
    #[serde(default)]
    pub rotation_deg: [f32; 3],
    #[serde(default)]
    pub velocity_in: [f32; 3],
}

/// A scripted caller action. Pieces are referenced by spawn index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ScriptCommand {
    RequestIntake {
        robot: String,
        node: String,
        intake: String,
        enabled: bool,
    },
    SetTargetState {
        robot: String,
        node: String,
        state: String,
    },
    Release {
        robot: String,
        node: String,
        /// Piece-local (N, or N·s / m/s depending on mode)
        force: [f32; 3],
        #[serde(default)]
        mode: ForceMode,
        #[serde(default = "default_true")]
        require_at_target: bool,
    },
    ReleaseContinued {
        robot: String,
        node: String,
        /// Piece-local force (N)
        force: [f32; 3],
        duration: f32,
        /// m/s
        speed_cap: f32,
        #[serde(default = "default_true")]
        require_at_target: bool,
    },
    SetDisabled {
        disabled: bool,
    },
    Despawn {
        piece: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub tick: u64,
    #[serde(flatten)]
    pub command: ScriptCommand,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "ScenarioConfig::default_ticks")]
    pub ticks: u64,
    #[serde(default = "ScenarioConfig::default_dt")]
    pub dt: f32,
    /// Floor height (in); absent means no floor
    #[serde(default = "ScenarioConfig::default_floor")]
    pub floor_in: Option<f32>,
    #[serde(default)]
    pub piece_kinds: Vec<PieceKindConfig>,
    #[serde(default)]
    pub robots: Vec<RobotConfig>,
    #[serde(default)]
    pub spawns: Vec<SpawnConfig>,
    #[serde(default)]
    pub script: Vec<ScriptEntry>,
}

impl ScenarioConfig {
    fn default_ticks() -> u64 {
        250
    }

    fn default_dt() -> f32 {
        FIXED_DT
    }

    fn default_floor() -> Option<f32> {
        Some(0.0)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load by extension: `.json` is JSON, anything else YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    /// Build and throw away; reports the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.build().map(|_| ())
    }

    pub fn build(&self) -> Result<Scenario> {
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            return Err(ConfigError::invalid("dt", self.dt));
        }

        let mut kinds: KindTable<'_> = FxHashMap::default();
        for kind in &self.piece_kinds {
            kind.validate()?;
            if kinds.insert(kind.name.as_str(), kind.descriptor()).is_some() {
                return Err(ConfigError::DuplicateName { what: "piece kind", name: kind.name.clone() });
            }
        }
        let world = World::new().with_floor(self.floor_in.map(inches));
        let mut sim = Simulation::with_world(world, self.dt);

        for robot in &self.robots {
            build_robot(&mut sim, robot, &kinds)?;
        }

        let mut spawned = Vec::with_capacity(self.spawns.len());
        for spawn in &self.spawns {
            let d = lookup_kind(&kinds, &spawn.piece_kind)?.clone();
            let id = sim.spawn(d, &inches_pose(spawn.position_in, spawn.rotation_deg));
            if let Some(piece) = sim.world_mut().piece_mut(id) {
                piece.body_mut().linear_velocity = inches_vec(spawn.velocity_in);
            }
            spawned.push(id);
        }

        let script = self
            .script
            .iter()
            .map(|entry| {
                Ok(ScriptStep { tick: entry.tick, command: resolve_command(&sim, &spawned, &entry.command)? })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Scenario::new(sim, script, self.ticks))
    }
}

type KindTable<'a> = FxHashMap<&'a str, PieceDescriptor>;

fn lookup_kind<'k>(kinds: &'k KindTable<'_>, name: &str) -> Result<&'k PieceDescriptor> {
    kinds.get(name).ok_or_else(|| ConfigError::UnknownPieceKind { name: name.to_string() })
}

fn build_robot(sim: &mut Simulation, config: &RobotConfig, kinds: &KindTable<'_>) -> Result<()> {
    let id = sim.add_robot(
        &config.name,
        CollisionGroup(config.collision_group),
        inches_pose(config.position_in, config.rotation_deg),
    )?;
    let (robot, world) = sim.robot_and_world(id);
    robot.set_velocity(inches_vec(config.velocity_in));

    // parents must be declared before their children
    for frame in &config.frames {
        let parent = match &frame.parent {
            Some(parent) => config.frame(world, parent)?,
            None => robot.root_frame(),
        };
        world.frames.add(
            &config.frame_name(&frame.name),
            Some(parent),
            inches_pose(frame.position_in, frame.rotation_deg),
        )?;
    }

    for intake in &config.intakes {
        let kind = lookup_kind(kinds, &intake.piece_kind)?;
        let volumes = intake
            .volumes
            .iter()
            .map(|v| {
                if !v.shape.is_valid() {
                    return Err(ConfigError::invalid(format!("{}.volume", intake.name), 0.0));
                }
                Ok(CaptureVolume { frame: config.frame(world, &v.frame)?, shape: v.shape.to_metres() })
            })
            .collect::<Result<Vec<_>>>()?;
        robot.add_intake(IntakeSpec {
            name: intake.name.clone(),
            kind: kind.kind.clone(),
            layer: kind.layer,
            target: config.frame(world, &intake.target_frame)?,
            volumes,
            params: intake.breakable.clone(),
            smooth_handoff: intake.smooth_handoff,
        })?;
    }

    for node in &config.nodes {
        lookup_kind(kinds, &node.piece_kind)?;
        let states = node
            .states
            .iter()
            .map(|s| {
                let target = s.frame.as_deref().map(|f| config.frame(world, f)).transpose()?;
                Ok(StateSpec::new(&s.name, target)
                    .with_speeds(s.linear_speed_in, s.angular_speed_deg)
                    .with_smooth_handoff(s.smooth_handoff))
            })
            .collect::<Result<Vec<_>>>()?;
        let intakes: Vec<&str> = node.intakes.iter().map(String::as_str).collect();
        robot.add_node(&node.name, &node.piece_kind, states, &intakes)?;
    }

    let attached = |id: IntakeId| robot.nodes().iter().any(|n| n.intakes().contains(&id));
    if let Some(orphan) = robot.intakes().iter().find(|i| !attached(i.id())) {
        return Err(ConfigError::UnattachedIntake { robot: config.name.clone(), intake: orphan.name().to_string() });
    }
    Ok(())
}

fn resolve_command(sim: &Simulation, spawned: &[PieceId], command: &ScriptCommand) -> Result<Command> {
    let robot_node = |robot: &str, node: &str| {
        let robot_id = sim.robot_id(robot).ok_or_else(|| ConfigError::UnknownRobot { name: robot.to_string() })?;
        let node_id = sim
            .robot(robot_id)
            .node_id(node)
            .ok_or_else(|| ConfigError::UnknownNode { robot: robot.to_string(), node: node.to_string() })?;
        Ok::<_, ConfigError>((robot_id, node_id))
    };

    Ok(match command {
        ScriptCommand::RequestIntake { robot, node, intake, enabled } => {
            let (robot_id, node_id) = robot_node(robot, node)?;
            let intake_id = sim
                .robot(robot_id)
                .intake_id(intake)
                .ok_or_else(|| ConfigError::UnknownIntake { node: node.clone(), intake: intake.clone() })?;
            Command::RequestIntake { robot: robot_id, node: node_id, intake: intake_id, enabled: *enabled }
        }
        ScriptCommand::SetTargetState { robot, node, state } => {
            let (robot_id, node_id) = robot_node(robot, node)?;
            if sim.robot(robot_id).node(node_id).state_by_name(state).is_none() {
                return Err(ConfigError::UnknownState { node: node.clone(), state: state.clone() });
            }
            Command::SetTargetState { robot: robot_id, node: node_id, state: state.clone() }
        }
        ScriptCommand::Release { robot, node, force, mode, require_at_target } => {
            let (robot_id, node_id) = robot_node(robot, node)?;
            Command::Release {
                robot: robot_id,
                node: node_id,
                force: Vec3::from(*force),
                mode: *mode,
                require_at_target: *require_at_target,
            }
        }
        ScriptCommand::ReleaseContinued { robot, node, force, duration, speed_cap, require_at_target } => {
            let (robot_id, node_id) = robot_node(robot, node)?;
            if !(*duration >= 0.0) || !duration.is_finite() {
                return Err(ConfigError::invalid("release_continued.duration", *duration));
            }
            if !(*speed_cap >= 0.0) || !speed_cap.is_finite() {
                return Err(ConfigError::invalid("release_continued.speed_cap", *speed_cap));
            }
            Command::ReleaseContinued {
                robot: robot_id,
                node: node_id,
                force: Vec3::from(*force),
                duration: *duration,
                speed_cap: *speed_cap,
                require_at_target: *require_at_target,
            }
        }
        ScriptCommand::SetDisabled { disabled } => Command::SetDisabled(*disabled),
        ScriptCommand::Despawn { piece } => {
            let id = spawned.get(*piece).copied().ok_or_else(|| ConfigError::invalid("despawn.piece", *piece as f32))?;
            Command::Despawn(id)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"
ticks: 120
piece_kinds:
  - name: coral
    layer: 3
    radius_in: 2.0
    symmetry: { type: one_axis, axis: y }
robots:
  - name: blue
    collision_group: 7
    frames:
      - { name: mouth, position_in: [0, 8, 14] }
      - { name: stow, parent: mouth, position_in: [0, 10, -10], rotation_deg: [0, 90, 0] }
    intakes:
      - name: ground
        piece_kind: coral
        target_frame: mouth
        volumes:
          - { frame: mouth, shape: sphere, radius: 12 }
    nodes:
      - name: coral
        piece_kind: coral
        intakes: [ground]
        states:
          - { name: Stow, frame: stow }
          - { name: Hold }
spawns:
  - { piece_kind: coral, position_in: [0, 2, 24] }
script:
  - { tick: 0, command: request_intake, robot: blue, node: coral, intake: ground, enabled: true }
  - { tick: 100, command: release, robot: blue, node: coral, force: [0, 0, 0.5], mode: impulse }
"#;

    #[test]
    fn test_sample_builds() {
        let config = ScenarioConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.dt, FIXED_DT);
        let scenario = config.build().unwrap();
        let robot = scenario.sim.robot_id("blue").unwrap();
        let robot = scenario.sim.robot(robot);
        assert_eq!(robot.intakes().len(), 1);
        let node = robot.node(robot.node_id("coral").unwrap());
        assert_eq!(node.states().len(), 2);
        assert_eq!(node.state_by_name("hold").unwrap().target, None);
        assert!(scenario.sim.world().frames.id("blue/stow").is_some());
        assert_eq!(scenario.script().len(), 2);
    }

    #[test]
    fn test_unknown_names_are_reported() {
        let bad_frame = SAMPLE.replace("target_frame: mouth", "target_frame: chute");
        let err = ScenarioConfig::from_yaml_str(&bad_frame).unwrap().build().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFrame { ref name } if name == "chute"));

        let bad_kind = SAMPLE.replace("- { piece_kind: coral", "- { piece_kind: algae");
        let err = ScenarioConfig::from_yaml_str(&bad_kind).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPieceKind { .. }));

        let bad_node = SAMPLE.replace("node: coral, intake", "node: algae, intake");
        let err = ScenarioConfig::from_yaml_str(&bad_node).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownNode { .. }));
    }

    #[test]
    fn test_intake_without_node_rejected() {
        let orphaned = SAMPLE.replace("intakes: [ground]", "intakes: []");
        let err = ScenarioConfig::from_yaml_str(&orphaned).unwrap().validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnattachedIntake { ref robot, ref intake } if robot == "blue" && intake == "ground"
        ));
    }

    #[test]
    fn test_bad_parameters_rejected() {
        let mut config = ScenarioConfig::from_yaml_str(SAMPLE).unwrap();
        config.piece_kinds[0].mass_kg = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidParameter { .. })));

        let mut config = ScenarioConfig::from_yaml_str(SAMPLE).unwrap();
        config.dt = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::from_yaml_str(SAMPLE).unwrap();
        config.robots[0].nodes[0].states.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyStates { .. })));
    }

    #[test]
    fn test_json_round_trip_through_loader() {
        let config = ScenarioConfig::from_yaml_str(SAMPLE).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back = ScenarioConfig::from_json_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_script_entry_shape() {
        let entry: ScriptEntry =
            serde_yaml::from_str("{ tick: 5, command: set_disabled, disabled: true }").unwrap();
        assert_eq!(entry.tick, 5);
        assert_eq!(entry.command, ScriptCommand::SetDisabled { disabled: true });
    }
}

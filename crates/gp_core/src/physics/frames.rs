//! Named transform hierarchy
//!
//! Robots, their intake targets and their stow poses are frames. Pieces that
//! are possessed are parented under a frame and follow it as it moves.

use crate::error::{ConfigError, Result};
use crate::math::Pose;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(pub(crate) usize);

impl FrameId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug)]
struct FrameNode {
    name: String,
    parent: Option<FrameId>,
    local: Pose,
}

#[derive(Clone, Debug, Default)]
pub struct FrameTree {
    nodes: Vec<FrameNode>,
    by_name: FxHashMap<String, FrameId>,
}

impl FrameTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame. Names are unique across the whole tree.
    pub fn add(&mut self, name: &str, parent: Option<FrameId>, local: Pose) -> Result<FrameId> {
        if self.by_name.contains_key(name) {
            return Err(ConfigError::DuplicateName { what: "frame", name: name.to_string() });
        }
        let id = FrameId(self.nodes.len());
        self.nodes.push(FrameNode { name: name.to_string(), parent, local });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn id(&self, name: &str) -> Option<FrameId> {
        self.by_name.get(name).copied()
    }

    /// Look a frame up by name, reporting a config error when missing.
    pub fn require(&self, name: &str) -> Result<FrameId> {
        self.id(name).ok_or_else(|| ConfigError::UnknownFrame { name: name.to_string() })
    }

    pub fn name(&self, id: FrameId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn parent(&self, id: FrameId) -> Option<FrameId> {
        self.nodes[id.0].parent
    }

    pub fn local_pose(&self, id: FrameId) -> Pose {
        self.nodes[id.0].local
    }

    pub fn set_local_pose(&mut self, id: FrameId, local: Pose) {
        self.nodes[id.0].local = local;
    }

    /// Compose local poses up to the root.
    pub fn world_pose(&self, id: FrameId) -> Pose {
        let mut pose = self.nodes[id.0].local;
        let mut cursor = self.nodes[id.0].parent;
        while let Some(parent) = cursor {
            let node = &self.nodes[parent.0];
            pose = node.local * pose;
            cursor = node.parent;
        }
        pose
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{pose, quat_from_euler_deg, Quat, Vec3};

    #[test]
    fn test_world_pose_composes_parents() {
        let mut tree = FrameTree::new();
        let robot = tree
            .add("robot", None, pose(Vec3::new(1.0, 0.0, 0.0), quat_from_euler_deg([0.0, 90.0, 0.0])))
            .unwrap();
        let stow = tree.add("stow", Some(robot), pose(Vec3::new(0.0, 0.5, 1.0), Quat::identity())).unwrap();

        let world = tree.world_pose(stow);
        // local +Z of a robot yawed 90° is world +X
        assert!((world.translation.vector - Vec3::new(2.0, 0.5, 0.0)).norm() < 1e-5);
        assert_eq!(tree.parent(stow), Some(robot));
        assert_eq!(tree.name(stow), "stow");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut tree = FrameTree::new();
        tree.add("a", None, Pose::identity()).unwrap();
        let err = tree.add("a", None, Pose::identity()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName { .. }));
        assert!(tree.require("missing").is_err());
    }

    #[test]
    fn test_moving_parent_moves_child() {
        let mut tree = FrameTree::new();
        let robot = tree.add("robot", None, Pose::identity()).unwrap();
        let child = tree.add("child", Some(robot), pose(Vec3::new(0.0, 1.0, 0.0), Quat::identity())).unwrap();
        tree.set_local_pose(robot, pose(Vec3::new(3.0, 0.0, 0.0), Quat::identity()));
        let world = tree.world_pose(child);
        assert!((world.translation.vector - Vec3::new(3.0, 1.0, 0.0)).norm() < 1e-6);
    }
}

//! Named states
//!
//! Names are resolved to dense [`StateId`]s when a node is built; after that
//! only the id is carried around. The name table stays for the public
//! string-keyed entry points.

use crate::error::{ConfigError, Result};
use crate::physics::FrameId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Index into a node's state table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub(crate) usize);

impl StateId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Immutable target description. Ordinals start at 1; 0 means "empty node".
#[derive(Clone, Debug, PartialEq)]
pub struct NamedState {
    pub ordinal: u32,
    /// Lower-cased
    pub name: String,
    /// `None` means "stay where you are"; moves arrive immediately
    pub target: Option<FrameId>,
    pub linear_speed_in: f32,
    pub angular_speed_deg: f32,
    pub smooth_handoff: bool,
}

/// Input for [`StateTable::new`]: everything but the ordinal.
#[derive(Clone, Debug, PartialEq)]
pub struct StateSpec {
    pub name: String,
    pub target: Option<FrameId>,
    pub linear_speed_in: f32,
    pub angular_speed_deg: f32,
    pub smooth_handoff: bool,
}

impl StateSpec {
    pub fn new(name: &str, target: Option<FrameId>) -> Self {
        Self {
            name: name.to_string(),
            target,
            linear_speed_in: 60.0,
            angular_speed_deg: 360.0,
            smooth_handoff: false,
        }
    }

    pub fn with_speeds(mut self, linear_speed_in: f32, angular_speed_deg: f32) -> Self {
        self.linear_speed_in = linear_speed_in;
        self.angular_speed_deg = angular_speed_deg;
        self
    }

    pub fn with_smooth_handoff(mut self, smooth_handoff: bool) -> Self {
        self.smooth_handoff = smooth_handoff;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct StateTable {
    states: Vec<NamedState>,
    by_name: FxHashMap<String, StateId>,
}

impl StateTable {
    /// Build the table; ordinals follow list order starting at 1.
    pub fn new(node: &str, specs: Vec<StateSpec>) -> Result<Self> {
        if specs.is_empty() {
            return Err(ConfigError::EmptyStates { node: node.to_string() });
        }
        let mut table = Self::default();
        for (index, spec) in specs.into_iter().enumerate() {
            let name = spec.name.to_lowercase();
            if table.by_name.contains_key(&name) {
                return Err(ConfigError::DuplicateName { what: "state", name });
            }
            if !(spec.linear_speed_in >= 0.0) {
                return Err(ConfigError::invalid(format!("{node}.{name}.linear_speed_in"), spec.linear_speed_in));
            }
            if !(spec.angular_speed_deg >= 0.0) {
                return Err(ConfigError::invalid(
                    format!("{node}.{name}.angular_speed_deg"),
                    spec.angular_speed_deg,
                ));
            }
            table.by_name.insert(name.clone(), StateId(index));
            table.states.push(NamedState {
                ordinal: index as u32 + 1,
                name,
                target: spec.target,
                linear_speed_in: spec.linear_speed_in,
                angular_speed_deg: spec.angular_speed_deg,
                smooth_handoff: spec.smooth_handoff,
            });
        }
        Ok(table)
    }

    /// Case-insensitive lookup.
    pub fn id(&self, name: &str) -> Option<StateId> {
        self.by_name.get(&name.to_lowercase()).copied()
    }

    pub fn get(&self, id: StateId) -> &NamedState {
        &self.states[id.0]
    }

    pub fn first(&self) -> StateId {
        StateId(0)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_and_case_insensitive_lookup() {
        let table = StateTable::new(
            "coral",
            vec![StateSpec::new("Stow", None), StateSpec::new("L4", None).with_speeds(30.0, 90.0)],
        )
        .unwrap();
        let stow = table.id("STOW").unwrap();
        assert_eq!(table.get(stow).ordinal, 1);
        assert_eq!(table.get(stow).name, "stow");
        assert_eq!(table.get(table.id("l4").unwrap()).ordinal, 2);
        assert_eq!(table.first(), stow);
        assert!(table.id("score").is_none());
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert!(matches!(StateTable::new("n", vec![]), Err(ConfigError::EmptyStates { .. })));
        assert!(matches!(
            StateTable::new("n", vec![StateSpec::new("a", None), StateSpec::new("A", None)]),
            Err(ConfigError::DuplicateName { .. })
        ));
        assert!(matches!(
            StateTable::new("n", vec![StateSpec::new("a", None).with_speeds(f32::NAN, 1.0)]),
            Err(ConfigError::InvalidParameter { .. })
        ));
    }
}

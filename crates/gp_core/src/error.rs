use thiserror::Error;

/// Configuration and wiring errors.
///
/// Runtime guidance failures are never errors: a lost piece is an outcome,
/// and invalid release requests return `false`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown frame: {name}")]
    UnknownFrame { name: String },

    #[error("Unknown intake '{intake}' referenced by node '{node}'")]
    UnknownIntake { node: String, intake: String },

    #[error("Unknown piece kind: {name}")]
    UnknownPieceKind { name: String },

    #[error("Unknown robot: {name}")]
    UnknownRobot { name: String },

    #[error("Unknown node '{node}' on robot '{robot}'")]
    UnknownNode { robot: String, node: String },

    #[error("Unknown state '{state}' on node '{node}'")]
    UnknownState { node: String, state: String },

    #[error("Duplicate {what} name: {name}")]
    DuplicateName { what: &'static str, name: String },

    #[error("Node '{node}' has no states")]
    EmptyStates { node: String },

    #[error("Intake '{intake}' has no capture volumes")]
    NoCaptureVolumes { intake: String },

    #[error("Intake '{intake}' collects '{intake_kind}' but node '{node}' holds '{node_kind}'")]
    KindMismatch { node: String, node_kind: String, intake: String, intake_kind: String },

    #[error("Intake '{intake}' on robot '{robot}' is not attached to any node")]
    UnattachedIntake { robot: String, intake: String },

    #[error("Invalid parameter {field}: {value}")]
    InvalidParameter { field: String, value: f32 },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, value: f32) -> Self {
        ConfigError::InvalidParameter { field: field.into(), value }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

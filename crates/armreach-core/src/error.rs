use thiserror::Error;

/// Top-level error type for armreach.
#[derive(Debug, Error)]
pub enum ArmreachError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid iterations: {0} (must be > 0)")]
    InvalidIterations(u32),

    #[error("Invalid max_angle_change_deg: {0} (must be > 0)")]
    InvalidMaxAngleChange(f32),

    #[error("Invalid tolerance: {0} (must be >= 0)")]
    InvalidTolerance(f32),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Kinematic chain construction and lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Chain must contain at least one joint")]
    Empty,

    #[error("Joint {joint} has a zero-length drive axis")]
    DegenerateAxis { joint: String },

    #[error("Duplicate joint name: {0}")]
    DuplicateJoint(String),

    #[error("Joint index {index} out of range for chain of {len} joints")]
    JointIndexOutOfRange { index: usize, len: usize },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

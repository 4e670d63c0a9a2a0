use std::collections::HashSet;

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::error::{ArmreachError, ChainError, ConfigError};

/// Drive axes with a length at or below this are rejected as degenerate.
pub const MIN_AXIS_NORM: f32 = 1e-6;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_iterations() -> u32 {
    10
}
const fn default_max_angle_change_deg() -> f32 {
    10.0
}
const fn default_tolerance() -> f32 {
    0.01
}
const fn default_axis() -> [f32; 3] {
    [1.0, 0.0, 0.0]
}
const fn default_true() -> bool {
    true
}
fn default_arm_name() -> String {
    "arm".into()
}

// ---------------------------------------------------------------------------
// SolverConfig
// ---------------------------------------------------------------------------

/// Tuning for the CCD solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
pub struct SolverConfig {
    /// Maximum sweeps per solve (default: 10).
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Largest rotation any single joint update may apply, in degrees
    /// (default: 10).
    #[serde(default = "default_max_angle_change_deg")]
    pub max_angle_change_deg: f32,

    /// Convergence radius in world distance units (default: 0.01).
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            max_angle_change_deg: default_max_angle_change_deg(),
            tolerance: default_tolerance(),
        }
    }
}

impl SolverConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::InvalidIterations(self.iterations));
        }
        if self.max_angle_change_deg.is_nan() || self.max_angle_change_deg <= 0.0 {
            return Err(ConfigError::InvalidMaxAngleChange(
                self.max_angle_change_deg,
            ));
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        Ok(())
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// PoseConfig
// ---------------------------------------------------------------------------

/// A fixed transform: translation plus roll-pitch-yaw in radians.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseConfig {
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default)]
    pub rpy: [f32; 3],
}

// ---------------------------------------------------------------------------
// JointConfig
// ---------------------------------------------------------------------------

/// One link of the arm, described relative to its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointConfig {
    pub name: String,
    /// Joint origin in the parent joint's frame.
    #[serde(default)]
    pub offset: [f32; 3],
    /// Drive axis in the joint's local frame. Normalized on chain build.
    #[serde(default = "default_axis")]
    pub axis: [f32; 3],
    /// `false` for fixed links (zero degrees of freedom).
    #[serde(default = "default_true")]
    pub actuated: bool,
    /// Starting drive angle in degrees. Ignored for fixed links.
    #[serde(default)]
    pub initial_angle_deg: f32,
    /// Static rotation (radians) between the parent frame and this joint's
    /// frame. Actuated joints rotate about `axis` on top of it; for fixed
    /// links it is the whole rotation.
    #[serde(default)]
    pub rpy: [f32; 3],
}

impl JointConfig {
    /// Actuated revolute joint about `axis` with its origin at `offset`.
    pub fn revolute(name: impl Into<String>, offset: [f32; 3], axis: [f32; 3]) -> Self {
        Self {
            name: name.into(),
            offset,
            axis,
            actuated: true,
            initial_angle_deg: 0.0,
            rpy: [0.0; 3],
        }
    }

    /// Non-actuated link at `offset`.
    pub fn fixed(name: impl Into<String>, offset: [f32; 3]) -> Self {
        Self {
            name: name.into(),
            offset,
            axis: default_axis(),
            actuated: false,
            initial_angle_deg: 0.0,
            rpy: [0.0; 3],
        }
    }

    /// Builder: set the starting drive angle.
    #[must_use]
    pub const fn with_initial_angle(mut self, degrees: f32) -> Self {
        self.initial_angle_deg = degrees;
        self
    }
}

// ---------------------------------------------------------------------------
// ArmConfig
// ---------------------------------------------------------------------------

/// Static description of an arm: base transform, joints base-to-tip, the
/// end-effector offset from the last joint, and solver tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmConfig {
    #[serde(default = "default_arm_name")]
    pub name: String,
    #[serde(default)]
    pub base: PoseConfig,
    pub joints: Vec<JointConfig>,
    #[serde(default)]
    pub end_effector: PoseConfig,
    #[serde(default)]
    pub solver: SolverConfig,
}

impl ArmConfig {
    /// Validate the chain description and solver block.
    pub fn validate(&self) -> Result<(), ArmreachError> {
        if self.joints.is_empty() {
            return Err(ChainError::Empty.into());
        }
        let mut seen = HashSet::new();
        for joint in &self.joints {
            if !seen.insert(joint.name.as_str()) {
                return Err(ChainError::DuplicateJoint(joint.name.clone()).into());
            }
            let [x, y, z] = joint.axis;
            if joint.actuated && (x * x + y * y + z * z).sqrt() <= MIN_AXIS_NORM {
                return Err(ChainError::DegenerateAxis {
                    joint: joint.name.clone(),
                }
                .into());
            }
        }
        self.solver.validate()?;
        Ok(())
    }

    /// Parse and validate from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ArmreachError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ArmreachError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::from)?;
        Self::from_toml_str(&content)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

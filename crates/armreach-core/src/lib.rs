//! armreach-core: configuration, errors, and fixed-tick ordering shared by
//! the armreach crates.
//!
//! The solver itself lives in `armreach-ik`; this crate holds the pieces
//! every host needs regardless of how it drives the arm.

pub mod config;
pub mod error;

use bevy::prelude::*;

// ---------------------------------------------------------------------------
// ArmreachSet
// ---------------------------------------------------------------------------

/// Ordering of arm control work inside [`FixedUpdate`].
///
/// ```text
/// Sense ──► Solve ──► Actuate
/// ```
///
/// `Sense` refreshes reported joint angles, `Solve` runs the IK step, and
/// `Actuate` hands drive targets to the joint layer. All three run once per
/// physics tick, never per rendered frame.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmreachSet {
    Sense,
    Solve,
    Actuate,
}

/// Bevy plugin that configures [`ArmreachSet`] ordering in [`FixedUpdate`].
///
/// Add it before any other armreach plugin.
pub struct ArmreachCorePlugin;

impl Plugin for ArmreachCorePlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            FixedUpdate,
            (
                ArmreachSet::Sense,
                ArmreachSet::Solve,
                ArmreachSet::Actuate,
            )
                .chain(),
        );
    }
}

pub mod prelude {
    pub use crate::config::{ArmConfig, JointConfig, PoseConfig, SolverConfig};
    pub use crate::error::{ArmreachError, ChainError, ConfigError};
    pub use crate::{ArmreachCorePlugin, ArmreachSet};
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Shared test fixtures and utilities for armreach crates.
//!
//! Provides reusable chain descriptions, Bevy test app builders, and joint
//! entity spawn helpers.

pub mod app;
pub mod chains;
pub mod spawn;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use app::ik_test_app;
pub use chains::{planar_config, planar_two_link, single_joint, spatial_arm_config};
pub use spawn::{spawn_drive_joints, spawn_feedback_joints};

//! Entity spawn helpers for tests.

use bevy::prelude::*;
use armreach_ik::{DriveTarget, JointFeedback};

/// Spawn `n` joint entities carrying only a [`DriveTarget`].
///
/// Returns the entity slots in spawning order, ready for
/// [`IkRigMap::insert_from_config`](armreach_ik::IkRigMap::insert_from_config).
pub fn spawn_drive_joints(world: &mut World, n: usize) -> Vec<Option<Entity>> {
    (0..n)
        .map(|_| Some(world.spawn(DriveTarget::default()).id()))
        .collect()
}

/// Spawn one joint entity per angle with a [`DriveTarget`] and a
/// [`JointFeedback`] reporting that angle.
pub fn spawn_feedback_joints(world: &mut World, angles_deg: &[f32]) -> Vec<Option<Entity>> {
    angles_deg
        .iter()
        .map(|&degrees| {
            Some(
                world
                    .spawn((DriveTarget { degrees }, JointFeedback { degrees }))
                    .id(),
            )
        })
        .collect()
}

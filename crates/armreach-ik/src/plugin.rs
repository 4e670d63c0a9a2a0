//! Bevy ECS integration for the CCD solver.
//!
//! Provides [`ArmreachIkPlugin`] which runs one solver step per rig every
//! fixed tick and writes [`DriveTarget`] values onto joint entities.
//!
//! # Usage
//!
//! 1. Add [`ArmreachCorePlugin`](armreach_core::ArmreachCorePlugin) and
//!    [`ArmreachIkPlugin`] to your app.
//! 2. Spawn one entity per chain joint carrying a [`DriveTarget`] (and a
//!    [`JointFeedback`] if the actuation layer reports angles back).
//! 3. Register the rig with [`IkRigMap::insert_from_config`].
//! 4. Set a goal with [`IkRigMap::set_position_goal`].
//!
//! The solve system runs in [`ArmreachSet::Solve`] inside [`FixedUpdate`],
//! after sensing and before actuation.

use std::collections::HashMap;

use bevy::prelude::*;
use nalgebra::{Isometry3, Vector3};
use tracing::warn;

use armreach_core::ArmreachSet;
use armreach_core::config::ArmConfig;
use armreach_core::error::ArmreachError;

use crate::chain::KinematicChain;
use crate::sink::{ActuationSink, DriveCommand};
use crate::solver::{CcdSolver, IkTarget, SolveReport};

/// Bevy plugin that adds the fixed-tick CCD step.
pub struct ArmreachIkPlugin;

impl Plugin for ArmreachIkPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<IkRigMap>()
            .add_systems(FixedUpdate, ccd_step_system.in_set(ArmreachSet::Solve));
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Commanded joint angle in degrees, written by the solver.
#[derive(Component, Clone, Debug, Default)]
pub struct DriveTarget {
    pub degrees: f32,
}

/// Joint angle in degrees as reported by the actuation layer.
///
/// When present, the solver re-poses its chain from these values before
/// every step.
#[derive(Component, Clone, Debug, Default)]
pub struct JointFeedback {
    pub degrees: f32,
}

// ---------------------------------------------------------------------------
// Rigs
// ---------------------------------------------------------------------------

/// Identifier of one IK-driven arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RigId(pub u32);

/// Per-arm IK data: chain, solver, and joint entity references.
#[derive(Debug)]
pub struct IkRig {
    pub chain: KinematicChain,
    pub solver: CcdSolver,
    /// Joint entities in chain order. `None` for joints with no entity
    /// (typically fixed links).
    pub joint_entities: Vec<Option<Entity>>,
    /// Current target. `None` means the rig is idle.
    pub goal: Option<IkTarget>,
    /// Report from the most recent step. Its distance is measured on the
    /// solver's preview pose.
    pub last_report: Option<SolveReport>,
    /// Distance from the goal to the end effector posed at the angles the
    /// joints reported, measured before the most recent step. `None` unless
    /// every actuated joint carries a [`JointFeedback`].
    pub feedback_distance: Option<f32>,
}

/// Resource mapping [`RigId`] to rig data.
#[derive(Resource, Debug, Default)]
pub struct IkRigMap {
    rigs: HashMap<RigId, IkRig>,
}

impl IkRigMap {
    /// Insert a pre-built rig.
    pub fn insert(&mut self, id: RigId, rig: IkRig) {
        self.rigs.insert(id, rig);
    }

    /// Build the chain and solver from `config` and register them.
    ///
    /// `joint_entities` must have one slot per configured joint.
    ///
    /// # Errors
    ///
    /// Chain or solver configuration errors, or an
    /// [`InvalidValue`](armreach_core::error::ConfigError::InvalidValue) if
    /// the entity list length does not match the joints.
    pub fn insert_from_config(
        &mut self,
        id: RigId,
        config: &ArmConfig,
        joint_entities: Vec<Option<Entity>>,
    ) -> Result<(), ArmreachError> {
        let chain = KinematicChain::from_config(config)?;
        let solver = CcdSolver::new(config.solver.clone())?;
        if joint_entities.len() != chain.num_joints() {
            return Err(armreach_core::error::ConfigError::InvalidValue {
                field: "joint_entities".into(),
                message: format!(
                    "expected {} entries, got {}",
                    chain.num_joints(),
                    joint_entities.len()
                ),
            }
            .into());
        }
        self.rigs.insert(
            id,
            IkRig {
                chain,
                solver,
                joint_entities,
                goal: None,
                last_report: None,
                feedback_distance: None,
            },
        );
        Ok(())
    }

    /// Set the target for a rig. Unknown ids are ignored.
    ///
    /// The rig is stepped every fixed tick until the goal is cleared, even
    /// after it converges. Joints without an entity slot are still solved in
    /// the preview chain, but their commands go nowhere.
    pub fn set_goal(&mut self, id: RigId, target: IkTarget) {
        if let Some(rig) = self.rigs.get_mut(&id) {
            rig.goal = Some(target);
        }
    }

    /// Set a position-only target for a rig.
    pub fn set_position_goal(&mut self, id: RigId, x: f32, y: f32, z: f32) {
        self.set_goal(id, IkTarget::Position(Vector3::new(x, y, z)));
    }

    /// Set a full-pose target for a rig. Only the translation is tracked.
    pub fn set_pose_goal(&mut self, id: RigId, pose: Isometry3<f32>) {
        self.set_goal(id, IkTarget::Pose(pose));
    }

    /// Clear the target. The rig stops stepping and its joint entities keep
    /// whatever [`DriveTarget`] was last written.
    pub fn clear_goal(&mut self, id: RigId) {
        if let Some(rig) = self.rigs.get_mut(&id) {
            rig.goal = None;
        }
    }

    /// Rig data, including the preview chain and the last report.
    pub fn get(&self, id: RigId) -> Option<&IkRig> {
        self.rigs.get(&id)
    }

    pub fn get_mut(&mut self, id: RigId) -> Option<&mut IkRig> {
        self.rigs.get_mut(&id)
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

type DriveQuery<'w, 's> = Query<'w, 's, (Option<&'static JointFeedback>, &'static mut DriveTarget)>;

/// Sink writing commands onto the rig's joint entities.
struct EntitySink<'a, 'w, 's> {
    entities: &'a [Option<Entity>],
    query: &'a mut DriveQuery<'w, 's>,
}

impl ActuationSink for EntitySink<'_, '_, '_> {
    fn send(&mut self, command: DriveCommand) {
        let Some(Some(entity)) = self.entities.get(command.joint) else {
            return;
        };
        if let Ok((_, mut drive)) = self.query.get_mut(*entity) {
            drive.degrees = command.degrees;
        }
    }
}

/// System that steps the solver for every rig with a goal.
///
/// For each rig in [`IkRigMap`] with a non-`None` goal:
/// 1. Re-poses the chain from any [`JointFeedback`] on its joint entities,
///    recording the reported-pose distance when every actuated joint reports.
/// 2. Runs one solver step.
/// 3. Writes issued commands to [`DriveTarget`] on the joint entities.
#[allow(clippy::needless_pass_by_value)]
pub fn ccd_step_system(mut rigs: ResMut<IkRigMap>, mut drives: DriveQuery) {
    for rig in rigs.rigs.values_mut() {
        let IkRig {
            chain,
            solver,
            joint_entities,
            goal,
            last_report,
            feedback_distance,
        } = rig;
        let Some(target) = goal.as_ref() else {
            continue;
        };

        let mut reported = 0;
        for (index, entity) in joint_entities.iter().enumerate() {
            let Some(entity) = entity else { continue };
            if let Ok((Some(feedback), _)) = drives.get(*entity) {
                match chain.set_joint_angle(index, feedback.degrees) {
                    Ok(()) if chain.joints()[index].is_actuated() => reported += 1,
                    Ok(()) => {}
                    Err(err) => warn!(%err, "joint feedback ignored"),
                }
            }
        }
        *feedback_distance =
            (reported == chain.dof()).then(|| chain.distance_to(&target.position()));

        let mut sink = EntitySink {
            entities: joint_entities,
            query: &mut drives,
        };
        *last_report = Some(solver.step(chain, target, &mut sink));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

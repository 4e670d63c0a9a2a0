//! Cyclic Coordinate Descent (CCD) IK solver.
//!
//! Each sweep walks the chain from the tip toward the base and rotates one
//! actuated joint at a time so the end effector swings toward the target.
//! Rotations are capped per joint update, which bounds how fast any joint
//! can be commanded to move in one tick regardless of the sweep count.
//!
//! The chain is updated in place as a kinematic preview: a joint processed
//! later in the same sweep sees the poses already chosen for joints nearer
//! the tip. The real joints lag behind through the actuation layer.
//!
//! The preview keeps each joint's full world-space rotation, including any
//! swing a single-axis joint cannot follow. Only the twist about the drive
//! axis reaches the actuation layer. On a planar chain the two agree; on a
//! spatial chain the preview can reach a target the commanded angles do not.
//! Hosts that need the arm's true position re-pose a chain from reported
//! angles ([`KinematicChain::set_joint_angle`]) and measure that.

use nalgebra::{Isometry3, UnitQuaternion, Vector3};
use tracing::{debug, trace};

use armreach_core::config::SolverConfig;
use armreach_core::error::ConfigError;

use crate::chain::KinematicChain;
use crate::math::{drive_angle_degrees, shortest_arc, try_direction};
use crate::sink::{ActuationSink, DriveCommand};

/// Drive targets closer than this (degrees) to the previous one are not
/// re-issued.
pub const DRIVE_EPSILON_DEG: f32 = 1e-4;

/// What the solver should target.
///
/// CCD tracks position only; a pose target's orientation is carried for
/// callers but ignored by the sweep.
#[derive(Debug, Clone)]
pub enum IkTarget {
    /// Target position only.
    Position(Vector3<f32>),
    /// Target pose: position + orientation.
    Pose(Isometry3<f32>),
}

impl IkTarget {
    /// World position the end effector should reach.
    pub fn position(&self) -> Vector3<f32> {
        match self {
            Self::Position(p) => *p,
            Self::Pose(pose) => pose.translation.vector,
        }
    }

    /// Requested orientation, if any.
    pub fn orientation(&self) -> Option<UnitQuaternion<f32>> {
        match self {
            Self::Position(_) => None,
            Self::Pose(pose) => Some(pose.rotation),
        }
    }
}

/// Result of one solve call.
///
/// `converged` and `distance` describe the preview chain the solver left
/// behind, not the physical arm.
#[derive(Debug, Clone, Default)]
pub struct SolveReport {
    /// Drive commands issued, in issue order.
    pub commands: Vec<DriveCommand>,
    /// Sweeps performed (0 when the target was already within tolerance).
    pub sweeps: u32,
    /// Whether the preview end effector ended within tolerance.
    pub converged: bool,
    /// Final preview end-effector-to-target distance.
    pub distance: f32,
    /// Largest single joint rotation applied, in degrees.
    pub largest_step_deg: f32,
}

/// Outcome of visiting one joint during a sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
enum JointUpdate {
    /// Zero-DOF joint.
    Fixed,
    /// Joint coincident with the tip or the target.
    Degenerate,
    /// Tip already points at the target from this joint.
    Aligned,
    /// Joint rotated by `step_deg`; `command` is set if the drive target moved.
    Rotated {
        step_deg: f32,
        command: Option<DriveCommand>,
    },
}

/// CCD inverse-kinematics solver.
#[derive(Debug, Clone)]
pub struct CcdSolver {
    config: SolverConfig,
    max_step_rad: f32,
    tolerance_sq: f32,
}

impl CcdSolver {
    /// Create a solver, validating the configuration once.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from [`SolverConfig::validate`].
    pub fn new(config: SolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    /// Create a solver with default configuration.
    pub fn with_defaults() -> Self {
        Self::from_valid(SolverConfig::default())
    }

    fn from_valid(config: SolverConfig) -> Self {
        Self {
            max_step_rad: config.max_angle_change_deg.to_radians(),
            tolerance_sq: config.tolerance * config.tolerance,
            config,
        }
    }

    pub const fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Refine `chain` toward `target` and return the commands produced.
    ///
    /// Returns immediately, without touching the chain, when the end
    /// effector is already within tolerance or the target is not finite.
    pub fn solve(&self, chain: &mut KinematicChain, target: &IkTarget) -> SolveReport {
        let target_pos = target.position();
        let mut report = SolveReport::default();

        if !target_pos.iter().all(|v| v.is_finite()) {
            report.distance = f32::INFINITY;
            debug!(target = ?target_pos, "ignoring non-finite target");
            return report;
        }

        if self.within_tolerance(chain, &target_pos) {
            report.converged = true;
            report.distance = chain.distance_to(&target_pos);
            trace!(distance = report.distance, "already within tolerance");
            return report;
        }

        for _ in 0..self.config.iterations {
            for index in (0..chain.num_joints()).rev() {
                if let JointUpdate::Rotated { step_deg, command } =
                    self.update_joint(chain, index, &target_pos)
                {
                    report.largest_step_deg = report.largest_step_deg.max(step_deg);
                    report.commands.extend(command);
                }
            }
            report.sweeps += 1;

            if self.within_tolerance(chain, &target_pos) {
                report.converged = true;
                break;
            }
        }

        report.distance = chain.distance_to(&target_pos);
        debug!(
            sweeps = report.sweeps,
            converged = report.converged,
            distance = report.distance,
            commands = report.commands.len(),
            "ccd solve"
        );
        report
    }

    /// Solve, then forward every issued command to `sink` in order.
    ///
    /// This is the per-tick entry point for a fixed-rate host loop.
    pub fn step(
        &self,
        chain: &mut KinematicChain,
        target: &IkTarget,
        sink: &mut impl ActuationSink,
    ) -> SolveReport {
        let report = self.solve(chain, target);
        for command in &report.commands {
            sink.send(*command);
        }
        report
    }

    fn within_tolerance(&self, chain: &KinematicChain, target: &Vector3<f32>) -> bool {
        (target - chain.end_effector_world_position()).norm_squared() < self.tolerance_sq
    }

    /// One CCD joint update: swing the tip toward the target about joint
    /// `index`, commit the new pose to the chain, and derive its drive target.
    fn update_joint(
        &self,
        chain: &mut KinematicChain,
        index: usize,
        target: &Vector3<f32>,
    ) -> JointUpdate {
        let joint = &chain.joints()[index];
        if !joint.is_actuated() {
            return JointUpdate::Fixed;
        }

        let origin = *joint.world_position();
        let to_tip = chain.end_effector_world_position() - origin;
        let to_target = target - origin;
        let (Some(tip_dir), Some(target_dir)) = (try_direction(&to_tip), try_direction(&to_target))
        else {
            trace!(joint = %joint.name, "skipping joint coincident with tip or target");
            return JointUpdate::Degenerate;
        };

        let Some((axis, angle)) = shortest_arc(&tip_dir, &target_dir) else {
            return JointUpdate::Aligned;
        };
        if !angle.is_finite() {
            trace!(joint = %joint.name, "skipping joint with non-finite rotation");
            return JointUpdate::Degenerate;
        }
        let angle = angle.min(self.max_step_rad);

        // World-space rotation applied on top of the joint's current pose.
        let new_world = UnitQuaternion::from_axis_angle(&axis, angle) * joint.world_rotation();
        let local = chain.parent_world_rotation(index).inverse() * new_world;
        let degrees = drive_angle_degrees(&(joint.mount().inverse() * local), joint.axis());
        let previous = joint.drive_target();

        chain.set_world_rotation(index, new_world);

        let command = ((degrees - previous).abs() > DRIVE_EPSILON_DEG).then(|| {
            chain.set_drive_target(index, degrees);
            DriveCommand {
                joint: index,
                degrees,
            }
        });

        let step_deg = angle.to_degrees();
        trace!(joint = index, step_deg, degrees, "joint update");
        JointUpdate::Rotated { step_deg, command }
    }
}

impl Default for CcdSolver {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

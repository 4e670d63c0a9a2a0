//! Kinematic chain model for CCD solving.
//!
//! A [`KinematicChain`] is an ordered list of joints from the base to the
//! tip, plus a fixed end-effector offset from the last joint. Unlike a
//! scene graph, world poses are never propagated implicitly: after any local
//! rotation changes, [`KinematicChain::forward_kinematics`] (or the
//! from-index variant) must run before a world pose is read. Every mutating
//! method on the chain does this itself.

use std::collections::HashSet;

use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, UnitVector3, Vector3};

use armreach_core::config::{ArmConfig, MIN_AXIS_NORM, PoseConfig};
use armreach_core::error::ChainError;

use crate::math::{rotation_from_rpy, wrap_degrees};

/// A single joint (link frame) in the chain.
#[derive(Debug, Clone)]
pub struct ChainJoint {
    /// Name of this joint.
    pub name: String,
    /// Joint origin in the parent's frame.
    offset: Vector3<f32>,
    /// Drive axis in the joint's local frame.
    axis: UnitVector3<f32>,
    /// Zero-DOF joints are never touched by the solver.
    actuated: bool,
    /// Static rotation from the parent frame into the drive frame.
    mount: UnitQuaternion<f32>,
    local_rotation: UnitQuaternion<f32>,
    world_rotation: UnitQuaternion<f32>,
    world_position: Vector3<f32>,
    /// Last commanded angle (degrees, `[-180, 180]`).
    drive_target: f32,
}

impl ChainJoint {
    /// An actuated revolute joint about `axis`, starting at `angle_deg`.
    ///
    /// # Errors
    ///
    /// [`ChainError::DegenerateAxis`] if `axis` has (near) zero length.
    pub fn revolute(
        name: impl Into<String>,
        offset: Vector3<f32>,
        axis: Vector3<f32>,
        angle_deg: f32,
    ) -> Result<Self, ChainError> {
        let name = name.into();
        let Some(axis) = Unit::try_new(axis, MIN_AXIS_NORM) else {
            return Err(ChainError::DegenerateAxis { joint: name });
        };
        let drive_target = wrap_degrees(angle_deg);
        Ok(Self {
            name,
            offset,
            axis,
            actuated: true,
            mount: UnitQuaternion::identity(),
            local_rotation: UnitQuaternion::from_axis_angle(&axis, drive_target.to_radians()),
            world_rotation: UnitQuaternion::identity(),
            world_position: Vector3::zeros(),
            drive_target,
        })
    }

    /// A fixed (zero-DOF) link with a static local rotation.
    pub fn fixed(name: impl Into<String>, offset: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self {
            name: name.into(),
            offset,
            axis: Vector3::x_axis(),
            actuated: false,
            mount: rotation,
            local_rotation: rotation,
            world_rotation: UnitQuaternion::identity(),
            world_position: Vector3::zeros(),
            drive_target: 0.0,
        }
    }

    /// Builder: set the static mount rotation, keeping the current drive
    /// angle. `local = mount * drive`.
    #[must_use]
    pub fn with_mount(mut self, mount: UnitQuaternion<f32>) -> Self {
        let drive = self.drive_rotation();
        self.mount = mount;
        self.local_rotation = mount * drive;
        self
    }

    pub const fn offset(&self) -> &Vector3<f32> {
        &self.offset
    }

    pub const fn axis(&self) -> &UnitVector3<f32> {
        &self.axis
    }

    pub const fn is_actuated(&self) -> bool {
        self.actuated
    }

    pub const fn local_rotation(&self) -> &UnitQuaternion<f32> {
        &self.local_rotation
    }

    pub const fn mount(&self) -> &UnitQuaternion<f32> {
        &self.mount
    }

    /// The part of the local rotation produced by the drive.
    pub fn drive_rotation(&self) -> UnitQuaternion<f32> {
        self.mount.inverse() * self.local_rotation
    }

    /// Cached world rotation, valid as of the last forward-kinematics pass.
    pub const fn world_rotation(&self) -> &UnitQuaternion<f32> {
        &self.world_rotation
    }

    /// Cached world position, valid as of the last forward-kinematics pass.
    pub const fn world_position(&self) -> &Vector3<f32> {
        &self.world_position
    }

    /// Last commanded drive angle in degrees.
    pub const fn drive_target(&self) -> f32 {
        self.drive_target
    }
}

/// An ordered kinematic chain from base to end effector.
#[derive(Debug, Clone)]
pub struct KinematicChain {
    /// Fixed transform of the chain root in world space.
    base: Isometry3<f32>,
    /// Ordered joints from base (index 0) to tip.
    joints: Vec<ChainJoint>,
    /// Transform from the last joint to the end-effector point.
    ee_offset: Isometry3<f32>,
}

impl KinematicChain {
    /// Build a chain and run an initial forward-kinematics pass.
    ///
    /// # Errors
    ///
    /// [`ChainError::Empty`] for no joints, [`ChainError::DuplicateJoint`]
    /// when two joints share a name.
    pub fn new(
        base: Isometry3<f32>,
        joints: Vec<ChainJoint>,
        ee_offset: Isometry3<f32>,
    ) -> Result<Self, ChainError> {
        if joints.is_empty() {
            return Err(ChainError::Empty);
        }
        let mut seen = HashSet::new();
        for joint in &joints {
            if !seen.insert(joint.name.as_str()) {
                return Err(ChainError::DuplicateJoint(joint.name.clone()));
            }
        }

        let mut chain = Self {
            base,
            joints,
            ee_offset,
        };
        chain.forward_kinematics();
        Ok(chain)
    }

    /// Build a chain from an [`ArmConfig`] description.
    ///
    /// # Errors
    ///
    /// Same conditions as [`KinematicChain::new`], plus
    /// [`ChainError::DegenerateAxis`] for an actuated joint with a zero axis.
    pub fn from_config(config: &ArmConfig) -> Result<Self, ChainError> {
        let joints = config
            .joints
            .iter()
            .map(|j| {
                let offset = Vector3::from(j.offset);
                if j.actuated {
                    ChainJoint::revolute(
                        j.name.clone(),
                        offset,
                        Vector3::from(j.axis),
                        j.initial_angle_deg,
                    )
                    .map(|joint| joint.with_mount(rotation_from_rpy(j.rpy)))
                } else {
                    Ok(ChainJoint::fixed(j.name.clone(), offset, rotation_from_rpy(j.rpy)))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(
            pose_to_isometry(&config.base),
            joints,
            pose_to_isometry(&config.end_effector),
        )
    }

    /// Number of joints, actuated or not.
    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    /// Number of actuated degrees of freedom.
    pub fn dof(&self) -> usize {
        self.joints.iter().filter(|j| j.actuated).count()
    }

    /// Access the joints in chain order.
    pub fn joints(&self) -> &[ChainJoint] {
        &self.joints
    }

    /// Access a single joint.
    pub fn joint(&self, index: usize) -> Option<&ChainJoint> {
        self.joints.get(index)
    }

    /// Joint names in chain order.
    pub fn joint_names(&self) -> Vec<&str> {
        self.joints.iter().map(|j| j.name.as_str()).collect()
    }

    /// Index of the joint called `name`.
    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    pub const fn base(&self) -> &Isometry3<f32> {
        &self.base
    }

    pub const fn ee_offset(&self) -> &Isometry3<f32> {
        &self.ee_offset
    }

    /// Recompute every joint's world pose from the base outward.
    pub fn forward_kinematics(&mut self) {
        self.forward_kinematics_from(0);
    }

    /// Recompute world poses for `start` and every joint downstream of it.
    ///
    /// Joints before `start` are assumed current.
    pub fn forward_kinematics_from(&mut self, start: usize) {
        let (mut parent_rotation, mut parent_position) = match start {
            0 => (self.base.rotation, self.base.translation.vector),
            i => {
                let parent = &self.joints[i - 1];
                (parent.world_rotation, parent.world_position)
            }
        };
        for joint in self.joints.iter_mut().skip(start) {
            joint.world_position = parent_position + parent_rotation * joint.offset;
            joint.world_rotation = parent_rotation * joint.local_rotation;
            parent_rotation = joint.world_rotation;
            parent_position = joint.world_position;
        }
    }

    /// World rotation of joint `index`'s parent (the base for joint 0).
    pub fn parent_world_rotation(&self, index: usize) -> UnitQuaternion<f32> {
        match index {
            0 => self.base.rotation,
            i => self.joints[i - 1].world_rotation,
        }
    }

    /// World pose of the tip joint.
    fn tip_pose(&self) -> Isometry3<f32> {
        // `new` rejects empty chains, so a last joint always exists.
        let tip = &self.joints[self.joints.len() - 1];
        Isometry3::from_parts(Translation3::from(tip.world_position), tip.world_rotation)
    }

    /// World pose of the end effector.
    pub fn end_effector_pose(&self) -> Isometry3<f32> {
        self.tip_pose() * self.ee_offset
    }

    /// World position of the end effector.
    pub fn end_effector_world_position(&self) -> Vector3<f32> {
        self.end_effector_pose().translation.vector
    }

    /// Distance from the end effector to `target`.
    pub fn distance_to(&self, target: &Vector3<f32>) -> f32 {
        (target - self.end_effector_world_position()).norm()
    }

    /// Whether the end effector is strictly within `tolerance` of `target`.
    pub fn is_at_target(&self, target: &Vector3<f32>, tolerance: f32) -> bool {
        (target - self.end_effector_world_position()).norm_squared() < tolerance * tolerance
    }

    /// Combined reach: link lengths from the first joint to the end effector.
    pub fn reach(&self) -> f32 {
        self.joints
            .iter()
            .skip(1)
            .map(|j| j.offset.norm())
            .sum::<f32>()
            + self.ee_offset.translation.vector.norm()
    }

    /// Overwrite joint `index`'s world rotation and refresh everything
    /// downstream. The local rotation becomes `inverse(parent) * rotation`.
    pub fn set_world_rotation(&mut self, index: usize, rotation: UnitQuaternion<f32>) {
        let local = self.parent_world_rotation(index).inverse() * rotation;
        self.joints[index].local_rotation = local;
        self.forward_kinematics_from(index);
    }

    /// Pose an actuated joint at `degrees` about its drive axis, as reported
    /// by the actuation layer. Fixed joints are left untouched.
    ///
    /// # Errors
    ///
    /// [`ChainError::JointIndexOutOfRange`] for a bad index.
    pub fn set_joint_angle(&mut self, index: usize, degrees: f32) -> Result<(), ChainError> {
        let len = self.joints.len();
        let joint = self
            .joints
            .get_mut(index)
            .ok_or(ChainError::JointIndexOutOfRange { index, len })?;
        if !joint.actuated {
            return Ok(());
        }
        joint.local_rotation =
            joint.mount * UnitQuaternion::from_axis_angle(&joint.axis, degrees.to_radians());
        self.forward_kinematics_from(index);
        Ok(())
    }

    pub(crate) fn set_drive_target(&mut self, index: usize, degrees: f32) {
        self.joints[index].drive_target = degrees;
    }

    /// Current drive targets of the actuated joints, in chain order.
    pub fn drive_targets(&self) -> Vec<(usize, f32)> {
        self.joints
            .iter()
            .enumerate()
            .filter(|(_, j)| j.actuated)
            .map(|(i, j)| (i, j.drive_target))
            .collect()
    }
}

/// Convert a [`PoseConfig`] (xyz + rpy) to an [`Isometry3`].
fn pose_to_isometry(pose: &PoseConfig) -> Isometry3<f32> {
    Isometry3::from_parts(
        Translation3::from(Vector3::from(pose.position)),
        rotation_from_rpy(pose.rpy),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use armreach_core::config::{JointConfig, SolverConfig};
    use std::f32::consts::FRAC_PI_2;

    fn planar_two_link(elbow_deg: f32) -> KinematicChain {
        KinematicChain::new(
            Isometry3::identity(),
            vec![
                ChainJoint::revolute("shoulder", Vector3::zeros(), Vector3::z(), 0.0).unwrap(),
                ChainJoint::revolute("elbow", Vector3::x(), Vector3::z(), elbow_deg).unwrap(),
            ],
            Isometry3::translation(1.0, 0.0, 0.0),
        )
        .unwrap()
    }

    #[test]
    fn empty_chain_rejected() {
        let err = KinematicChain::new(Isometry3::identity(), Vec::new(), Isometry3::identity())
            .unwrap_err();
        assert_eq!(err, ChainError::Empty);
    }

    #[test]
    fn duplicate_names_rejected() {
        let joints = vec![
            ChainJoint::revolute("j", Vector3::zeros(), Vector3::z(), 0.0).unwrap(),
            ChainJoint::revolute("j", Vector3::x(), Vector3::z(), 0.0).unwrap(),
        ];
        let err = KinematicChain::new(Isometry3::identity(), joints, Isometry3::identity())
            .unwrap_err();
        assert_eq!(err, ChainError::DuplicateJoint("j".into()));
    }

    #[test]
    fn zero_axis_rejected() {
        let err = ChainJoint::revolute("bad", Vector3::zeros(), Vector3::zeros(), 0.0).unwrap_err();
        assert!(matches!(err, ChainError::DegenerateAxis { .. }));
    }

    #[test]
    fn axis_is_normalized() {
        let j = ChainJoint::revolute("j", Vector3::zeros(), Vector3::new(0.0, 0.0, 5.0), 0.0).unwrap();
        assert_relative_eq!(j.axis().into_inner(), Vector3::z(), epsilon = 1e-6);
    }

    #[test]
    fn fk_straight_chain() {
        let chain = planar_two_link(0.0);
        assert_relative_eq!(
            chain.end_effector_world_position(),
            Vector3::new(2.0, 0.0, 0.0),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            *chain.joints()[1].world_position(),
            Vector3::new(1.0, 0.0, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn fk_bent_elbow() {
        let chain = planar_two_link(90.0);
        assert_relative_eq!(
            chain.end_effector_world_position(),
            Vector3::new(1.0, 1.0, 0.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn fk_respects_base_transform() {
        let base = Isometry3::from_parts(
            Translation3::new(0.0, 0.0, 0.5),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2),
        );
        let chain = KinematicChain::new(
            base,
            vec![ChainJoint::revolute("j", Vector3::zeros(), Vector3::z(), 0.0).unwrap()],
            Isometry3::translation(1.0, 0.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(
            chain.end_effector_world_position(),
            Vector3::new(0.0, 1.0, 0.5),
            epsilon = 1e-5
        );
    }

    #[test]
    fn set_joint_angle_propagates_downstream() {
        let mut chain = planar_two_link(0.0);
        chain.set_joint_angle(0, 90.0).unwrap();
        assert_relative_eq!(
            *chain.joints()[1].world_position(),
            Vector3::new(0.0, 1.0, 0.0),
            epsilon = 1e-5
        );
        assert_relative_eq!(
            chain.end_effector_world_position(),
            Vector3::new(0.0, 2.0, 0.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn set_joint_angle_out_of_range() {
        let mut chain = planar_two_link(0.0);
        assert_eq!(
            chain.set_joint_angle(7, 10.0),
            Err(ChainError::JointIndexOutOfRange { index: 7, len: 2 })
        );
    }

    #[test]
    fn set_world_rotation_updates_local_and_downstream() {
        let mut chain = planar_two_link(0.0);
        chain.set_joint_angle(0, 90.0).unwrap();

        // Point the elbow back along world +X while the shoulder faces +Y.
        chain.set_world_rotation(1, UnitQuaternion::identity());
        let local = chain.joints()[1].local_rotation();
        assert_relative_eq!(local.angle(), FRAC_PI_2, epsilon = 1e-5);
        assert_relative_eq!(
            chain.end_effector_world_position(),
            Vector3::new(1.0, 1.0, 0.0),
            epsilon = 1e-5
        );
    }

    #[test]
    fn distance_and_arrival() {
        let chain = planar_two_link(0.0);
        let target = Vector3::new(2.0, 0.005, 0.0);
        assert_relative_eq!(chain.distance_to(&target), 0.005, epsilon = 1e-6);
        assert!(chain.is_at_target(&target, 0.01));
        assert!(!chain.is_at_target(&target, 0.001));
    }

    #[test]
    fn reach_sums_links() {
        assert_relative_eq!(planar_two_link(45.0).reach(), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn from_config_with_fixed_link() {
        let config = ArmConfig {
            name: "arm".into(),
            base: PoseConfig::default(),
            joints: vec![
                JointConfig::revolute("yaw", [0.0, 0.0, 0.1], [0.0, 0.0, 1.0]),
                JointConfig::fixed("bracket", [0.0, 0.0, 0.2]),
                JointConfig::revolute("pitch", [0.0, 0.0, 0.1], [0.0, 1.0, 0.0])
                    .with_initial_angle(-30.0),
            ],
            end_effector: PoseConfig {
                position: [0.0, 0.0, 0.25],
                rpy: [0.0; 3],
            },
            solver: SolverConfig::default(),
        };
        let chain = KinematicChain::from_config(&config).unwrap();
        assert_eq!(chain.num_joints(), 3);
        assert_eq!(chain.dof(), 2);
        assert_eq!(chain.joint_names(), vec!["yaw", "bracket", "pitch"]);
        assert_eq!(chain.joint_index("pitch"), Some(2));
        assert!(chain.joint_index("missing").is_none());
        assert!(!chain.joints()[1].is_actuated());
        assert_relative_eq!(chain.joints()[2].drive_target(), -30.0);
        assert_eq!(chain.drive_targets().len(), 2);

        // Fixed link at z=0.3, pitch joint at z=0.4, EE 0.25 along the
        // pitched Z axis.
        let ee = chain.end_effector_world_position();
        let pitch = (-30f32).to_radians();
        assert_relative_eq!(ee.x, 0.25 * pitch.sin(), epsilon = 1e-5);
        assert_relative_eq!(ee.z, 0.4 + 0.25 * pitch.cos(), epsilon = 1e-5);
    }

    #[test]
    fn mount_rotates_drive_frame() {
        let mut chain = KinematicChain::new(
            Isometry3::identity(),
            vec![
                ChainJoint::revolute("j", Vector3::zeros(), Vector3::z(), 0.0)
                    .unwrap()
                    .with_mount(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2)),
            ],
            Isometry3::translation(1.0, 0.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(
            chain.end_effector_world_position(),
            Vector3::new(0.0, 1.0, 0.0),
            epsilon = 1e-5
        );

        chain.set_joint_angle(0, 90.0).unwrap();
        assert_relative_eq!(
            chain.end_effector_world_position(),
            Vector3::new(-1.0, 0.0, 0.0),
            epsilon = 1e-5
        );
        assert_relative_eq!(chain.joints()[0].drive_rotation().angle(), FRAC_PI_2, epsilon = 1e-5);
    }

    #[test]
    fn from_config_applies_rpy_to_actuated_joint() {
        let mut joint = JointConfig::revolute("pitch", [0.0; 3], [0.0, 0.0, 1.0]).with_initial_angle(30.0);
        // Tip the drive frame so its Z axis points along world -Y.
        joint.rpy = [FRAC_PI_2, 0.0, 0.0];
        let config = ArmConfig {
            name: "mounted".into(),
            base: PoseConfig::default(),
            joints: vec![joint],
            end_effector: PoseConfig {
                position: [1.0, 0.0, 0.0],
                rpy: [0.0; 3],
            },
            solver: SolverConfig::default(),
        };
        let chain = KinematicChain::from_config(&config).unwrap();

        // 30 degrees about world -Y swings +X up toward +Z.
        let ee = chain.end_effector_world_position();
        let a = 30f32.to_radians();
        assert_relative_eq!(ee, Vector3::new(a.cos(), 0.0, a.sin()), epsilon = 1e-5);
        assert_relative_eq!(chain.joints()[0].drive_target(), 30.0);
    }

    #[test]
    fn short_but_nonzero_axis_accepted() {
        let config = ArmConfig {
            name: "short".into(),
            base: PoseConfig::default(),
            joints: vec![JointConfig::revolute("j", [0.0; 3], [1e-4, 0.0, 0.0])],
            end_effector: PoseConfig::default(),
            solver: SolverConfig::default(),
        };
        assert!(config.validate().is_ok());
        let chain = KinematicChain::from_config(&config).unwrap();
        assert_relative_eq!(chain.joints()[0].axis().into_inner(), Vector3::x(), epsilon = 1e-6);
    }

    #[test]
    fn set_joint_angle_ignores_fixed_links() {
        let mut chain = KinematicChain::new(
            Isometry3::identity(),
            vec![ChainJoint::fixed("f", Vector3::zeros(), UnitQuaternion::identity())],
            Isometry3::translation(1.0, 0.0, 0.0),
        )
        .unwrap();
        chain.set_joint_angle(0, 45.0).unwrap();
        assert_relative_eq!(chain.joints()[0].local_rotation().angle(), 0.0);
    }
}

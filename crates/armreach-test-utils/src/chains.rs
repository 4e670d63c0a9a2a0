//! Chain fixtures.

use armreach_core::config::{ArmConfig, JointConfig, PoseConfig, SolverConfig};
use armreach_ik::{ChainJoint, KinematicChain};
use nalgebra::{Isometry3, Vector3};

/// One revolute joint at the world origin about `axis`, with the end
/// effector at `ee` in the joint frame.
pub fn single_joint(axis: Vector3<f32>, ee: Vector3<f32>) -> KinematicChain {
    KinematicChain::new(
        Isometry3::identity(),
        vec![ChainJoint::revolute("joint", Vector3::zeros(), axis, 0.0).unwrap()],
        Isometry3::translation(ee.x, ee.y, ee.z),
    )
    .unwrap()
}

/// Two unit links in the XY plane, both rotating about Z.
///
/// At `elbow_deg = 0` the chain lies along +X with the tip at (2, 0, 0).
pub fn planar_two_link(elbow_deg: f32) -> KinematicChain {
    KinematicChain::from_config(&planar_config(&[1.0, 1.0], &[0.0, elbow_deg])).unwrap()
}

/// A planar chain with one Z-axis joint per link, links laid along local X.
///
/// `angles_deg` gives the starting angle per joint and must match
/// `link_lengths` in length.
pub fn planar_config(link_lengths: &[f32], angles_deg: &[f32]) -> ArmConfig {
    assert_eq!(link_lengths.len(), angles_deg.len());
    let mut joints = Vec::with_capacity(link_lengths.len());
    let mut previous_length = 0.0;
    for (i, (&length, &angle)) in link_lengths.iter().zip(angles_deg).enumerate() {
        joints.push(
            JointConfig::revolute(format!("j{i}"), [previous_length, 0.0, 0.0], [0.0, 0.0, 1.0])
                .with_initial_angle(angle),
        );
        previous_length = length;
    }
    ArmConfig {
        name: "planar".into(),
        base: PoseConfig::default(),
        joints,
        end_effector: PoseConfig {
            position: [previous_length, 0.0, 0.0],
            rpy: [0.0; 3],
        },
        solver: SolverConfig::default(),
    }
}

/// A spatial arm: base yaw about Z, shoulder and elbow pitch about Y, and a
/// fixed wrist bracket. Total reach 0.8.
pub fn spatial_arm_config() -> ArmConfig {
    ArmConfig {
        name: "spatial".into(),
        base: PoseConfig::default(),
        joints: vec![
            JointConfig::revolute("base_yaw", [0.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            JointConfig::revolute("shoulder", [0.0, 0.0, 0.1], [0.0, 1.0, 0.0])
                .with_initial_angle(20.0),
            JointConfig::revolute("elbow", [0.0, 0.0, 0.3], [0.0, 1.0, 0.0])
                .with_initial_angle(45.0),
            JointConfig::fixed("wrist", [0.0, 0.0, 0.25]),
        ],
        end_effector: PoseConfig {
            position: [0.0, 0.0, 0.15],
            rpy: [0.0; 3],
        },
        solver: SolverConfig::default(),
    }
}

//! Convergence behaviour of the CCD solver on whole chains.

use approx::assert_relative_eq;
use armreach_core::config::SolverConfig;
use armreach_ik::{CcdSolver, IkTarget, KinematicChain};
use armreach_test_utils::{planar_config, planar_two_link, single_joint, spatial_arm_config};
use nalgebra::Vector3;

fn solver(iterations: u32, max_angle_change_deg: f32, tolerance: f32) -> CcdSolver {
    CcdSolver::new(SolverConfig {
        iterations,
        max_angle_change_deg,
        tolerance,
    })
    .unwrap()
}

#[test]
fn single_joint_reaches_perpendicular_target() {
    let mut chain = single_joint(Vector3::z(), Vector3::x());
    let target = IkTarget::Position(Vector3::y());
    let report = solver(1, 90.0, 0.01).solve(&mut chain, &target);

    assert!(report.converged);
    assert_relative_eq!(chain.end_effector_world_position(), Vector3::y(), epsilon = 1e-5);
}

#[test]
fn reachable_target_converges_monotonically() {
    let config = planar_config(&[1.0, 1.0, 1.0], &[0.0, 30.0, 30.0]);
    let mut chain = KinematicChain::from_config(&config).unwrap();
    let target = IkTarget::Position(Vector3::new(1.0, 1.5, 0.0));
    let s = solver(1, 10.0, 0.01);

    let mut previous = chain.distance_to(&target.position());
    let mut converged = false;
    for _ in 0..500 {
        let report = s.solve(&mut chain, &target);
        assert!(
            report.distance <= previous + 1e-5,
            "distance grew: {previous} -> {}",
            report.distance
        );
        previous = report.distance;
        if report.converged {
            converged = true;
            break;
        }
    }
    assert!(converged, "final distance {previous}");
    assert!(chain.is_at_target(&target.position(), 0.01));
}

#[test]
fn every_step_respects_the_cap() {
    let config = planar_config(&[1.0, 1.0, 1.0], &[0.0, 0.0, 0.0]);
    let mut chain = KinematicChain::from_config(&config).unwrap();
    let target = IkTarget::Position(Vector3::new(-1.0, 1.0, 0.0));
    let s = solver(10, 7.5, 0.001);

    for _ in 0..20 {
        let report = s.solve(&mut chain, &target);
        assert!(report.largest_step_deg <= 7.5 + 1e-4);
    }
}

#[test]
fn solving_at_target_is_idempotent() {
    let config = planar_config(&[1.0, 1.0], &[10.0, 40.0]);
    let mut chain = KinematicChain::from_config(&config).unwrap();
    let target = IkTarget::Position(Vector3::new(0.8, 1.2, 0.0));
    let s = solver(50, 10.0, 0.01);
    for _ in 0..20 {
        if s.solve(&mut chain, &target).converged {
            break;
        }
    }

    let targets_before = chain.drive_targets();
    let report = s.solve(&mut chain, &target);
    assert!(report.converged);
    assert_eq!(report.sweeps, 0);
    assert!(report.commands.is_empty());
    assert_eq!(chain.drive_targets(), targets_before);
}

#[test]
fn unreachable_target_settles_at_full_extension() {
    let mut chain = planar_two_link(90.0);
    let target = IkTarget::Position(Vector3::new(0.0, 3.0, 0.0));
    let s = solver(10, 10.0, 0.01);

    for _ in 0..40 {
        s.solve(&mut chain, &target);
    }
    let residual = chain.distance_to(&target.position());
    assert_relative_eq!(residual, 3.0 - chain.reach(), epsilon = 1e-3);

    // Further calls neither improve nor wander.
    for _ in 0..5 {
        let report = s.solve(&mut chain, &target);
        assert!(!report.converged);
        assert_relative_eq!(report.distance, residual, epsilon = 1e-4);
    }
}

/// Checks the solver's preview chain. Where the commanded angles leave the
/// physical arm is covered in `fixed_tick.rs`.
#[test]
fn spatial_preview_reaches_target_and_keeps_fixed_link() {
    let mut chain = KinematicChain::from_config(&spatial_arm_config()).unwrap();
    let wrist = chain.joint_index("wrist").unwrap();
    let wrist_local = *chain.joints()[wrist].local_rotation();
    let target = IkTarget::Position(Vector3::new(0.3, 0.2, 0.4));
    let s = solver(10, 10.0, 0.01);

    let mut converged = false;
    for _ in 0..300 {
        let report = s.solve(&mut chain, &target);
        assert!(report.commands.iter().all(|c| c.joint != wrist));
        if report.converged {
            converged = true;
            break;
        }
    }

    assert!(converged, "distance {}", chain.distance_to(&target.position()));
    assert_eq!(*chain.joints()[wrist].local_rotation(), wrist_local);
}

#[test]
fn drive_targets_stay_in_range() {
    let mut chain = KinematicChain::from_config(&spatial_arm_config()).unwrap();
    let s = solver(10, 25.0, 0.005);
    let targets = [
        Vector3::new(0.4, -0.3, 0.2),
        Vector3::new(-0.5, 0.1, 0.3),
        Vector3::new(0.0, 0.0, -0.6),
    ];
    for target in targets {
        let target = IkTarget::Position(target);
        for _ in 0..30 {
            let report = s.solve(&mut chain, &target);
            for command in &report.commands {
                assert!((-180.0..=180.0).contains(&command.degrees), "{command:?}");
            }
        }
    }
}

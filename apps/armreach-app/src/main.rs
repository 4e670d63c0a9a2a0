//! Armreach command-line host.
//!
//! Provides two modes of operation:
//! - `run`: drive an arm toward a target for N fixed ticks
//! - `info`: print crate version and default solver configuration

use std::path::PathBuf;
use std::process::ExitCode;

use bevy::prelude::*;
use clap::{Parser, Subcommand};
use nalgebra::Vector3;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use armreach_core::prelude::*;
use armreach_ik::math::wrap_degrees;
use armreach_ik::{
    ArmreachIkPlugin, DriveTarget, IkRigMap, JointFeedback, KinematicChain, RigId,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Inverse kinematics for articulated arms.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive an arm toward a target over a number of fixed ticks.
    Run {
        /// Arm description (TOML). Uses a built-in three-joint arm if omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Target position as `x,y,z`.
        #[arg(short, long, value_parser = parse_vec3, allow_hyphen_values = true)]
        target: Vector3<f32>,

        /// Number of fixed ticks to run.
        #[arg(short = 'n', long, default_value_t = 100)]
        ticks: u32,

        /// Rate limit of the simulated joints in degrees per tick. Joints
        /// snap to their drive target if omitted.
        #[arg(short, long)]
        lag_deg_per_tick: Option<f32>,
    },

    /// Print crate information.
    Info,
}

fn parse_vec3(s: &str) -> Result<Vector3<f32>, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("expected x,y,z, got `{s}`"));
    };
    let parse = |v: &str| v.parse::<f32>().map_err(|e| format!("`{v}`: {e}"));
    Ok(Vector3::new(parse(x)?, parse(y)?, parse(z)?))
}

// ---------------------------------------------------------------------------
// Demo arm
// ---------------------------------------------------------------------------

/// Yaw base, pitching shoulder and elbow, and a fixed tool bracket.
fn demo_arm() -> ArmConfig {
    ArmConfig {
        name: "demo".into(),
        base: PoseConfig::default(),
        joints: vec![
            JointConfig::revolute("base_yaw", [0.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            JointConfig::revolute("shoulder", [0.0, 0.0, 0.1], [0.0, 1.0, 0.0])
                .with_initial_angle(15.0),
            JointConfig::revolute("elbow", [0.0, 0.0, 0.4], [0.0, 1.0, 0.0])
                .with_initial_angle(30.0),
            JointConfig::fixed("tool", [0.0, 0.0, 0.3]),
        ],
        end_effector: PoseConfig {
            position: [0.0, 0.0, 0.1],
            rpy: [0.0; 3],
        },
        solver: SolverConfig::default(),
    }
}

// ---------------------------------------------------------------------------
// Simulated actuation
// ---------------------------------------------------------------------------

const RIG: RigId = RigId(0);

/// Per-tick rate limit of the simulated joints. `None` snaps immediately.
#[derive(Resource)]
struct FollowRate(Option<f32>);

/// Move each reported joint angle toward its drive target along the shorter
/// way round.
#[allow(clippy::needless_pass_by_value)]
fn follow_drive_targets(
    rate: Res<FollowRate>,
    mut joints: Query<(&DriveTarget, &mut JointFeedback)>,
) {
    for (drive, mut feedback) in &mut joints {
        let error = wrap_degrees(drive.degrees - feedback.degrees);
        let step = match rate.0 {
            Some(limit) => error.clamp(-limit, limit),
            None => error,
        };
        feedback.degrees = wrap_degrees(feedback.degrees + step);
    }
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn run(
    config: Option<PathBuf>,
    target: Vector3<f32>,
    ticks: u32,
    lag_deg_per_tick: Option<f32>,
) -> Result<(), ArmreachError> {
    let arm = match config {
        Some(path) => ArmConfig::from_file(&path)?,
        None => {
            let arm = demo_arm();
            arm.validate()?;
            arm
        }
    };
    if let Some(rate) = lag_deg_per_tick {
        if rate.is_nan() || rate <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "lag_deg_per_tick".into(),
                message: format!("must be positive, got {rate}"),
            }
            .into());
        }
    }

    let mut app = App::new();
    app.add_plugins((ArmreachCorePlugin, ArmreachIkPlugin))
        .insert_resource(FollowRate(lag_deg_per_tick))
        .add_systems(
            FixedUpdate,
            follow_drive_targets.in_set(ArmreachSet::Actuate),
        );
    app.finish();
    app.cleanup();

    let entities: Vec<Option<Entity>> = arm
        .joints
        .iter()
        .map(|joint| {
            joint.actuated.then(|| {
                let degrees = joint.initial_angle_deg;
                app.world_mut()
                    .spawn((DriveTarget { degrees }, JointFeedback { degrees }))
                    .id()
            })
        })
        .collect();

    // Posed from joint feedback only: where the arm actually is.
    let mut reported = KinematicChain::from_config(&arm)?;

    {
        let mut rigs = app.world_mut().resource_mut::<IkRigMap>();
        rigs.insert_from_config(RIG, &arm, entities.clone())?;
        rigs.set_position_goal(RIG, target.x, target.y, target.z);
    }

    info!(
        arm = %arm.name,
        joints = arm.joints.len(),
        target = ?[target.x, target.y, target.z],
        ticks,
        "starting run"
    );

    let mut arrived_at = None;
    for tick in 1..=ticks {
        app.world_mut().run_schedule(FixedUpdate);
        pose_from_feedback(app.world(), &entities, &mut reported)?;
        let distance = reported.distance_to(&target);

        let rigs = app.world().resource::<IkRigMap>();
        let Some(report) = rigs.get(RIG).and_then(|rig| rig.last_report.as_ref()) else {
            continue;
        };
        info!(
            tick,
            distance,
            preview_distance = report.distance,
            sweeps = report.sweeps,
            commands = report.commands.len(),
            "tick"
        );
        if arrived_at.is_none() && reported.is_at_target(&target, arm.solver.tolerance) {
            arrived_at = Some(tick);
        }
    }

    let tip = reported.end_effector_world_position();
    println!(
        "end effector: ({:.4}, {:.4}, {:.4}), distance {:.4}",
        tip.x,
        tip.y,
        tip.z,
        reported.distance_to(&target)
    );
    if let Some(rig) = app.world().resource::<IkRigMap>().get(RIG) {
        println!("preview distance {:.4}", rig.chain.distance_to(&target));
        for (index, degrees) in rig.chain.drive_targets() {
            let name = &rig.chain.joints()[index].name;
            println!("  [{index}] {name:<12} {degrees:>9.3} deg");
        }
    }
    match arrived_at {
        Some(tick) => println!("within tolerance at tick {tick}"),
        None => println!("not within tolerance after {ticks} ticks"),
    }
    Ok(())
}

/// Pose `chain` at the angles the joint entities report.
fn pose_from_feedback(
    world: &World,
    entities: &[Option<Entity>],
    chain: &mut KinematicChain,
) -> Result<(), ArmreachError> {
    for (index, entity) in entities.iter().enumerate() {
        let Some(feedback) = entity.and_then(|e| world.get::<JointFeedback>(e)) else {
            continue;
        };
        chain.set_joint_angle(index, feedback.degrees)?;
    }
    Ok(())
}

fn run_info() {
    let solver = SolverConfig::default();
    println!("armreach v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("default solver:");
    println!("  iterations           {}", solver.iterations);
    println!("  max_angle_change_deg {}", solver.max_angle_change_deg);
    println!("  tolerance            {}", solver.tolerance);
    println!();
    println!("edition: 2024");
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            target,
            ticks,
            lag_deg_per_tick,
        } => match run(config, target, ticks, lag_deg_per_tick) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                error!(%err, "run failed");
                ExitCode::FAILURE
            }
        },
        Commands::Info => {
            run_info();
            ExitCode::SUCCESS
        }
    }
}

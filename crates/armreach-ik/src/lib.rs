//! Cyclic Coordinate Descent inverse kinematics for armreach arms.
//!
//! Provides an explicit forward-kinematics chain model, a CCD solver that
//! refines joint rotations in place each fixed tick, and the seam through
//! which drive targets reach the joint layer.
//!
//! # Architecture
//!
//! ```text
//! ArmConfig ──► KinematicChain ──► CcdSolver::step ──► ActuationSink
//!                     ▲                                      │
//!                     └──────── reported joint angles ◄──────┘
//! ```
//!
//! The solver never waits on the joints: each tick it computes against the
//! chain's current pose and emits bounded corrections.

pub mod chain;
pub mod math;
pub mod plugin;
pub mod sink;
pub mod solver;

pub use chain::{ChainJoint, KinematicChain};
pub use plugin::{ArmreachIkPlugin, DriveTarget, IkRig, IkRigMap, JointFeedback, RigId};
pub use sink::{ActuationSink, DriveCommand};
pub use solver::{CcdSolver, IkTarget, SolveReport};

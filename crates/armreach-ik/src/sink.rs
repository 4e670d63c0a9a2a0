//! The boundary between the solver and the joint-drive layer.
//!
//! The solver only produces target angles. Whatever receives them (a
//! simulated articulation, a motor controller, a recorder in tests) moves
//! the real joint over later ticks and reports its angle back through
//! [`KinematicChain::set_joint_angle`](crate::KinematicChain::set_joint_angle).

/// One drive command: move joint `joint` (chain index) toward `degrees`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveCommand {
    /// Index of the joint in its chain.
    pub joint: usize,
    /// Target angle about the joint's drive axis, degrees in `[-180, 180]`.
    pub degrees: f32,
}

/// Receiver of drive commands.
pub trait ActuationSink {
    /// Deliver a single command. Called in the order commands were issued.
    fn send(&mut self, command: DriveCommand);
}

/// Collects commands in order.
impl ActuationSink for Vec<DriveCommand> {
    fn send(&mut self, command: DriveCommand) {
        self.push(command);
    }
}

impl<S: ActuationSink + ?Sized> ActuationSink for &mut S {
    fn send(&mut self, command: DriveCommand) {
        (**self).send(command);
    }
}

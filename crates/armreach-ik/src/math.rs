//! Angle and axis helpers for the CCD solver.
//!
//! Everything here is pure and works on `f32`, matching the chain.
//! Angles crossing the public API are degrees; internal rotations are radians.

use nalgebra::{Unit, UnitQuaternion, UnitVector3, Vector3};

/// Vectors shorter than this are treated as zero-length.
pub const DEGENERATE_LENGTH: f32 = 1e-6;

/// Rotations smaller than this (radians) are treated as already aligned.
pub const ALIGNED_ANGLE: f32 = 1e-6;

/// Normalize `v`, or `None` if it is too short to carry a direction.
pub fn try_direction(v: &Vector3<f32>) -> Option<UnitVector3<f32>> {
    Unit::try_new(*v, DEGENERATE_LENGTH)
}

/// A unit axis perpendicular to `v`, chosen deterministically.
///
/// Crosses with world X, falling back to world Y when `v` is (anti)parallel
/// to X.
pub fn perpendicular_axis(v: &UnitVector3<f32>) -> UnitVector3<f32> {
    let candidate = v.cross(&Vector3::x());
    if let Some(axis) = Unit::try_new(candidate, DEGENERATE_LENGTH) {
        return axis;
    }
    Unit::new_normalize(v.cross(&Vector3::y()))
}

/// Shortest-arc rotation taking direction `from` onto direction `to`.
///
/// Returns `(axis, angle_radians)` with the angle in `(0, π]`, or `None` when
/// the directions already coincide. Antiparallel inputs rotate by `π` about
/// [`perpendicular_axis`] of `from`.
pub fn shortest_arc(
    from: &UnitVector3<f32>,
    to: &UnitVector3<f32>,
) -> Option<(UnitVector3<f32>, f32)> {
    let (from, to) = (from.into_inner(), to.into_inner());
    let cross = from.cross(&to);
    let sin = cross.norm();
    let cos = from.dot(&to);
    let angle = sin.atan2(cos);
    if angle <= ALIGNED_ANGLE {
        return None;
    }
    match Unit::try_new(cross, DEGENERATE_LENGTH) {
        Some(axis) => Some((axis, angle)),
        None => Some((
            perpendicular_axis(&Unit::new_unchecked(from)),
            std::f32::consts::PI,
        )),
    }
}

/// Map an angle in degrees into `[-180, 180]`.
///
/// The angle is first reduced into `[0, 360)`, then anything above 180 has
/// 360 subtracted so a joint never winds the long way round.
pub fn wrap_degrees(degrees: f32) -> f32 {
    let reduced = degrees.rem_euclid(360.0);
    if reduced > 180.0 {
        reduced - 360.0
    } else {
        reduced
    }
}

/// Rotation of `q` about `axis` (swing-twist decomposition), in `[0, 360)`
/// degrees.
///
/// Components of `q` orthogonal to `axis` are discarded, which is the
/// projection a single-DOF revolute joint can actually follow.
pub fn twist_degrees(q: &UnitQuaternion<f32>, axis: &UnitVector3<f32>) -> f32 {
    let projected = q.imag().dot(&axis.into_inner());
    let twist = 2.0 * projected.atan2(q.w);
    twist.to_degrees().rem_euclid(360.0)
}

/// Drive angle for a joint whose local rotation is `local`: the twist about
/// `axis`, wrapped into `[-180, 180]`.
pub fn drive_angle_degrees(local: &UnitQuaternion<f32>, axis: &UnitVector3<f32>) -> f32 {
    wrap_degrees(twist_degrees(local, axis))
}

/// Rotation from roll-pitch-yaw (radians, extrinsic XYZ).
pub fn rotation_from_rpy(rpy: [f32; 3]) -> UnitQuaternion<f32> {
    UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

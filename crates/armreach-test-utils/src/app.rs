//! Bevy test app builders.

use bevy::prelude::*;

/// Create a test app with the core and IK plugins.
///
/// Drive the fixed tick manually with
/// `app.world_mut().run_schedule(FixedUpdate)`.
pub fn ik_test_app() -> App {
    let mut app = App::new();
    app.add_plugins(armreach_core::ArmreachCorePlugin);
    app.add_plugins(armreach_ik::ArmreachIkPlugin);
    app.finish();
    app.cleanup();
    app
}

//! World simulation settings read from cvars.

use oxy_common::cvar::{CvarContext, CvarFlags};

/// Upward lift per second applied before a sliding hull moves.
pub const DEFAULT_STEP_LIFT: f32 = 48.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldConfig {
    /// Multiplies every hull's gravity.
    pub gravity_scale: f32,
    pub step_lift: f32,
    /// Extra logging of hull events.
    pub developer: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity_scale: 1.0,
            step_lift: DEFAULT_STEP_LIFT,
            developer: false,
        }
    }
}

impl WorldConfig {
    pub fn register_cvars(cvars: &mut CvarContext) {
        cvars.get("sv_gravity_scale", "1", CvarFlags::ARCHIVE);
        cvars.get("sv_steplift", &DEFAULT_STEP_LIFT.to_string(), CvarFlags::ARCHIVE);
        cvars.get("developer", "0", CvarFlags::empty());
    }

    /// Unregistered cvars keep their defaults. Negative lift clamps to 0.
    pub fn from_cvars(cvars: &CvarContext) -> Self {
        let defaults = Self::default();
        Self {
            gravity_scale: cvars
                .find_var("sv_gravity_scale")
                .map_or(defaults.gravity_scale, |v| v.value),
            step_lift: cvars
                .find_var("sv_steplift")
                .map_or(defaults.step_lift, |v| v.value.max(0.0)),
            developer: cvars.variable_value("developer") != 0.0,
        }
    }
}

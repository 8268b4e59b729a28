//! Software render configuration.
//!
//! Holds the software depth-target size and the world draw toggles.
//! Reads from cvars; the defaults depend on the build profile.

use oxy_common::cvar::{CvarContext, CvarFlags};

#[cfg(debug_assertions)]
pub const DEFAULT_SOFT_WIDTH: usize = 400;
#[cfg(debug_assertions)]
pub const DEFAULT_SOFT_HEIGHT: usize = 300;
#[cfg(not(debug_assertions))]
pub const DEFAULT_SOFT_WIDTH: usize = 1000;
#[cfg(not(debug_assertions))]
pub const DEFAULT_SOFT_HEIGHT: usize = 750;

/// Largest software target either axis may request.
pub const MAX_SOFT_DIMENSION: usize = 4096;

/// Render configuration settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    /// Width of the software z/id buffers in pixels
    pub soft_width: usize,
    /// Height of the software z/id buffers in pixels
    pub soft_height: usize,
    /// Treat every leaf as visible
    pub novis: bool,
    /// Submit world faces at all
    pub draw_world: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            soft_width: DEFAULT_SOFT_WIDTH,
            soft_height: DEFAULT_SOFT_HEIGHT,
            novis: false,
            draw_world: true,
        }
    }
}

impl RenderConfig {
    /// Register the render cvars with their defaults.
    pub fn register_cvars(cvars: &mut CvarContext) {
        cvars.get("r_softwidth", &DEFAULT_SOFT_WIDTH.to_string(), CvarFlags::ARCHIVE | CvarFlags::LATCH);
        cvars.get("r_softheight", &DEFAULT_SOFT_HEIGHT.to_string(), CvarFlags::ARCHIVE | CvarFlags::LATCH);
        cvars.get("r_novis", "0", CvarFlags::empty());
        cvars.get("r_drawworld", "1", CvarFlags::empty());
    }

    /// Snapshot the render cvars. Missing or non-positive sizes fall back
    /// to the defaults.
    pub fn from_cvars(cvars: &CvarContext) -> Self {
        let defaults = Self::default();
        Self {
            soft_width: Self::dimension(cvars, "r_softwidth", defaults.soft_width),
            soft_height: Self::dimension(cvars, "r_softheight", defaults.soft_height),
            novis: cvars.variable_value("r_novis") != 0.0,
            draw_world: cvars
                .find_var("r_drawworld")
                .map_or(defaults.draw_world, |v| v.value != 0.0),
        }
    }

    fn dimension(cvars: &CvarContext, name: &str, default: usize) -> usize {
        let value = cvars.variable_value(name);
        if value >= 1.0 {
            (value as usize).min(MAX_SOFT_DIMENSION)
        } else {
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================
    // Default
    // ============================================================

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.soft_width, DEFAULT_SOFT_WIDTH);
        assert_eq!(config.soft_height, DEFAULT_SOFT_HEIGHT);
        assert!(!config.novis);
        assert!(config.draw_world);
    }

    #[test]
    fn test_default_aspect_is_four_three() {
        assert_eq!(DEFAULT_SOFT_WIDTH * 3, DEFAULT_SOFT_HEIGHT * 4);
    }

    // ============================================================
    // from_cvars
    // ============================================================

    #[test]
    fn test_from_empty_cvars_matches_default() {
        let cvars = CvarContext::new();
        assert_eq!(RenderConfig::from_cvars(&cvars), RenderConfig::default());
    }

    #[test]
    fn test_from_cvars_reads_values() {
        let mut cvars = CvarContext::new();
        RenderConfig::register_cvars(&mut cvars);
        cvars.set("r_novis", "1");
        cvars.set("r_drawworld", "0");
        cvars.set("r_softwidth", "640");
        cvars.apply_latched();
        let config = RenderConfig::from_cvars(&cvars);
        assert_eq!(config.soft_width, 640);
        assert!(config.novis);
        assert!(!config.draw_world);
    }

    #[test]
    fn test_bad_dimensions_fall_back() {
        let mut cvars = CvarContext::new();
        cvars.set("r_softwidth", "-5");
        cvars.set("r_softheight", "100000");
        let config = RenderConfig::from_cvars(&cvars);
        assert_eq!(config.soft_width, DEFAULT_SOFT_WIDTH);
        assert_eq!(config.soft_height, MAX_SOFT_DIMENSION);
    }
}

//! Depth Charge - a submarine-hunting arcade game simulation core
//!
//! Core modules:
//! - `sim`: Deterministic level simulation (entities, pools, scoring)
//! - `screen`: Generic interactive-screen state machine and frame loop
//! - `config`: Data-driven object descriptors and per-level overrides
//! - `platform`: Collaborator traits (rendering, audio, clock, input)
//! - `persistence`: Save/load of the level state

pub mod config;
pub mod persistence;
pub mod platform;
pub mod screen;
pub mod sim;

pub use config::GameConfig;
pub use screen::Status;

/// Game configuration constants
pub mod consts {
    /// Score for a kill at the very bottom of the screen; shallower kills
    /// score proportionally less.
    pub const SCORE_DEPTH_SCALE: f32 = 20.0;

    /// Vertical offset (pixels) above the ship at which the bomb-cost
    /// indicator appears.
    pub const BOMB_COST_TEXT_RISE: f32 = 40.0;
}

/// Map a fractional water depth (0.0 = waterline, 1.0 = screen bottom) to a
/// pixel y-coordinate.
#[inline]
pub fn depth_to_y(depth: f32, waterline: f32, height: f32) -> f32 {
    depth * (height - waterline) + waterline
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_to_y_endpoints() {
        assert_eq!(depth_to_y(0.0, 100.0, 500.0), 100.0);
        assert_eq!(depth_to_y(1.0, 100.0, 500.0), 500.0);
        assert_eq!(depth_to_y(0.5, 100.0, 500.0), 300.0);
    }
}

//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must stay deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (pools keyed in a BTreeMap)
//! - No rendering or platform dependencies beyond the collaborator traits

pub mod entity;
pub mod level;
pub mod rect;

pub use entity::{Animation, Entity, MovingEntity, Sprite, TransientText};
pub use level::{Level, LevelState, Pool};
pub use rect::Rect;

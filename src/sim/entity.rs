//! Game entities: moving objects, hit animations, transient text
//!
//! Entities carry no rendering state beyond an opaque image id and its pixel
//! size; image loading and blitting belong to the renderer collaborator.
//! An inactive entity is never drawn and is pruned from its pool at the end
//! of the next simulation step.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::rect::Rect;

/// Reference to a drawable image: an opaque id resolved by the renderer's
/// image cache, plus the pixel size the simulation needs for placement and
/// bounding boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprite {
    pub image: String,
    pub size: Vec2,
}

/// Any moving object in the game (ship, submarine, bomb, whale, bubble).
///
/// The movement region bounds the entity's life: once its bounding box no
/// longer intersects the region it is deactivated, or reset to its start
/// position if the movement repeats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovingEntity {
    pub sprite: Sprite,
    start: Vec2,
    pub pos: Vec2,
    pub velocity: Vec2,
    region: Rect,
    /// Displacement from the anchor point to the image's top-left corner.
    disp: Vec2,
    repeat: bool,
    active: bool,
}

impl MovingEntity {
    /// Create a moving entity.
    ///
    /// `start` is in pixels; `adjust_start` is in units of image width and
    /// shifts the start so edge-anchored sprites begin exactly off-screen.
    /// `origin` selects the anchor point in units of image width/height
    /// (e.g. `(0.5, 1.0)` anchors at bottom-center).
    pub fn new(
        sprite: Sprite,
        start: Vec2,
        adjust_start: Vec2,
        velocity: Vec2,
        region: Rect,
        origin: Vec2,
        repeat: bool,
    ) -> Self {
        let width = sprite.size.x;
        let start = start + adjust_start * width;
        let disp = -sprite.size * origin;
        Self {
            sprite,
            start,
            pos: start,
            velocity,
            region,
            disp,
            repeat,
            active: true,
        }
    }

    /// Advance the entity by `dt` seconds of movement.
    pub fn update(&mut self, dt: f32) {
        if !self.active {
            return;
        }
        let inside_before = self.region.intersects(&self.bounding_box());
        self.pos += self.velocity * dt;
        let inside_after = self.region.intersects(&self.bounding_box());
        if inside_before && !inside_after {
            if self.repeat {
                self.pos = self.start;
            } else {
                self.active = false;
            }
        }
    }

    /// Anchor-point position in pixels.
    pub fn position(&self) -> Vec2 {
        self.pos
    }

    /// Top-left corner of the image, for blitting.
    pub fn top_left(&self) -> Vec2 {
        self.pos + self.disp
    }

    pub fn bounding_box(&self) -> Rect {
        Rect::new(self.top_left(), self.sprite.size)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// A fixed-position frame animation (explosions).
///
/// `frames` is an image-id scheme containing the placeholder `{frame}`;
/// frame numbering starts at 0. The animation deactivates itself once the
/// elapsed time passes the last frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Animation {
    pub frames: String,
    pub frame_count: u32,
    pub fps: f32,
    pub size: Vec2,
    /// Top-left corner; the constructor centers the animation on the given
    /// position.
    pub position: Vec2,
    time: f32,
    current_frame: Option<u32>,
}

impl Animation {
    pub fn new(frames: String, frame_count: u32, fps: f32, size: Vec2, center: Vec2) -> Self {
        Self {
            frames,
            frame_count,
            fps,
            size,
            position: center - size * 0.5,
            time: 0.0,
            current_frame: Some(0),
        }
    }

    pub fn update(&mut self, dt: f32) {
        if self.current_frame.is_none() {
            return;
        }
        self.time += dt;
        let frame = (self.time * self.fps) as u32;
        if frame >= self.frame_count {
            self.current_frame = None;
        } else {
            self.current_frame = Some(frame);
        }
    }

    /// Image id of the current frame, or `None` once finished.
    pub fn frame_image(&self) -> Option<String> {
        self.current_frame
            .map(|frame| self.frames.replace("{frame}", &frame.to_string()))
    }

    pub fn is_active(&self) -> bool {
        self.current_frame.is_some()
    }

    pub fn deactivate(&mut self) {
        self.current_frame = None;
    }
}

/// Short-lived floating text (score deltas). Purely cosmetic; excluded from
/// save files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransientText {
    pub text: String,
    pub position: Vec2,
    remaining: f32,
}

impl TransientText {
    pub fn new(text: String, position: Vec2, lifetime: f32) -> Self {
        Self {
            text,
            position,
            remaining: lifetime,
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.remaining -= dt;
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0.0
    }
}

/// A pool slot: any of the visual object kinds the level tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Entity {
    Moving(MovingEntity),
    Animation(Animation),
    Transient(TransientText),
}

impl Entity {
    pub fn update(&mut self, dt: f32) {
        match self {
            Entity::Moving(e) => e.update(dt),
            Entity::Animation(a) => a.update(dt),
            Entity::Transient(t) => t.update(dt),
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Entity::Moving(e) => e.is_active(),
            Entity::Animation(a) => a.is_active(),
            Entity::Transient(t) => t.is_active(),
        }
    }

    pub fn as_moving(&self) -> Option<&MovingEntity> {
        match self {
            Entity::Moving(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_moving_mut(&mut self) -> Option<&mut MovingEntity> {
        match self {
            Entity::Moving(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite(w: f32, h: f32) -> Sprite {
        Sprite {
            image: "test.png".to_string(),
            size: Vec2::new(w, h),
        }
    }

    fn region() -> Rect {
        Rect::new(Vec2::ZERO, Vec2::new(100.0, 100.0))
    }

    #[test]
    fn test_moving_entity_deactivates_outside_region() {
        let mut e = MovingEntity::new(
            sprite(10.0, 10.0),
            Vec2::new(50.0, 50.0),
            Vec2::ZERO,
            Vec2::new(100.0, 0.0),
            region(),
            Vec2::new(0.5, 0.5),
            false,
        );
        // One second moves it 100px to the right, fully out of the region.
        e.update(1.0);
        assert!(!e.is_active());
    }

    #[test]
    fn test_moving_entity_repeat_resets_to_start() {
        let mut e = MovingEntity::new(
            sprite(10.0, 10.0),
            Vec2::new(50.0, 50.0),
            Vec2::ZERO,
            Vec2::new(100.0, 0.0),
            region(),
            Vec2::new(0.5, 0.5),
            true,
        );
        e.update(1.0);
        assert!(e.is_active());
        assert_eq!(e.position(), Vec2::new(50.0, 50.0));
    }

    #[test]
    fn test_moving_entity_stays_active_inside_region() {
        let mut e = MovingEntity::new(
            sprite(10.0, 10.0),
            Vec2::new(50.0, 50.0),
            Vec2::ZERO,
            Vec2::new(10.0, 0.0),
            region(),
            Vec2::new(0.5, 0.5),
            false,
        );
        e.update(1.0);
        assert!(e.is_active());
        assert_eq!(e.position(), Vec2::new(60.0, 50.0));
    }

    #[test]
    fn test_start_adjustment_uses_image_width_units() {
        let e = MovingEntity::new(
            sprite(20.0, 10.0),
            Vec2::new(0.0, 50.0),
            Vec2::new(-1.0, 0.0),
            Vec2::ZERO,
            region(),
            Vec2::new(0.0, 0.0),
            false,
        );
        assert_eq!(e.position(), Vec2::new(-20.0, 50.0));
    }

    #[test]
    fn test_bounding_box_respects_origin() {
        let e = MovingEntity::new(
            sprite(10.0, 20.0),
            Vec2::new(50.0, 50.0),
            Vec2::ZERO,
            Vec2::ZERO,
            region(),
            Vec2::new(0.5, 1.0),
            false,
        );
        let bb = e.bounding_box();
        assert_eq!(bb.pos, Vec2::new(45.0, 30.0));
        assert_eq!(bb.size, Vec2::new(10.0, 20.0));
    }

    #[test]
    fn test_animation_advances_and_finishes() {
        let mut a = Animation::new(
            "explosion_{frame}.png".to_string(),
            5,
            10.0,
            Vec2::new(16.0, 16.0),
            Vec2::new(50.0, 50.0),
        );
        assert_eq!(a.frame_image().as_deref(), Some("explosion_0.png"));

        a.update(0.25);
        assert_eq!(a.frame_image().as_deref(), Some("explosion_2.png"));

        a.update(0.25);
        assert!(!a.is_active());
        assert_eq!(a.frame_image(), None);
    }

    #[test]
    fn test_animation_is_centered() {
        let a = Animation::new(
            "x_{frame}".to_string(),
            1,
            1.0,
            Vec2::new(16.0, 8.0),
            Vec2::new(50.0, 50.0),
        );
        assert_eq!(a.position, Vec2::new(42.0, 46.0));
    }

    #[test]
    fn test_transient_text_expires() {
        let mut t = TransientText::new("+5".to_string(), Vec2::ZERO, 1.0);
        t.update(0.5);
        assert!(t.is_active());
        t.update(0.6);
        assert!(!t.is_active());
    }
}

//! Level simulation
//!
//! One [`Level`] owns everything that happens during a playable level:
//! - Entity pools per object type, with spawn caps, budgets and quotas
//! - The bomb economy (quadratic cost of concurrent bombs)
//! - Collision handling for configured (target, projectile) pairs
//! - Depth-scaled scoring with a smoothed score display
//! - Win/lose detection and the lingering end-of-level display
//!
//! The simulation is deterministic: a fixed timestep and a seeded PCG32
//! make replays and tests reproducible.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::config::{AreaName, ConfigError, GameConfig, StartCoord};
use crate::consts;
use crate::depth_to_y;
use crate::platform::{Context, Key};
use crate::screen::{KeyBindings, Screen, ScreenAction, Status, save_screenshot};

use super::entity::{Animation, Entity, MovingEntity, Sprite, TransientText};
use super::rect::Rect;

const SKY_COLOUR: [u8; 3] = [135, 206, 235];
const WATER_COLOUR: [u8; 3] = [0, 64, 128];

/// Pool name for the short-lived score texts. Rebuilt on load, never saved.
const TRANSIENTS: &str = "transients";

/// Name of the player object type.
const SHIP: &str = "ship";

/// Entities of one type, together with the type's spawn bookkeeping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pool {
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Concurrent cap; absent for non-spawnable types like the ship.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn_rate: Option<f32>,
    /// Spawns left in the level budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    /// Kills still needed for the win condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_destroy: Option<u32>,
}

/// Everything about a level that outlives a frame: carried into the next
/// level, and written to save files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelState {
    pub level_number: u32,
    pub lives: u32,
    pub score: i64,
    /// Object settings with this level's overrides already merged in.
    pub object_settings: BTreeMap<String, crate::config::ObjectConfig>,
    /// Empty pools mean "not yet populated"; [`Level::new`] builds them.
    pub pools: BTreeMap<String, Pool>,
    pub spawnables: BTreeSet<String>,
}

impl LevelState {
    /// State of the very first level.
    pub fn first(config: &GameConfig) -> Result<Self, ConfigError> {
        Self::start(config, None, false)
    }

    /// State of the level following `previous`: the next level if the
    /// previous was cleared, or the same one again (at the cost of a life)
    /// if it was failed.
    pub fn next(
        config: &GameConfig,
        previous: &LevelState,
        repeat: bool,
    ) -> Result<Self, ConfigError> {
        Self::start(config, Some(previous), repeat)
    }

    fn start(
        config: &GameConfig,
        previous: Option<&LevelState>,
        repeat: bool,
    ) -> Result<Self, ConfigError> {
        let mut level_number = previous.map_or(0, |s| s.level_number);
        let mut lives = previous.map_or(config.lives, |s| s.lives);
        if repeat {
            lives = lives.saturating_sub(1);
        } else {
            level_number += 1;
        }

        Ok(Self {
            level_number,
            lives,
            score: previous.map_or(0, |s| s.score),
            object_settings: config.object_settings_for_level(level_number)?,
            pools: BTreeMap::new(),
            spawnables: BTreeSet::new(),
        })
    }
}

/// Counters for purely visual, per-session display state.
#[derive(Debug, Clone)]
struct DisplayState {
    /// Score currently shown; trails the real score one point at a time.
    score: i64,
    /// Frames until the next displayed-score step.
    score_countdown: u32,
    /// Frames the cleared/failed message stays up after the level ends.
    final_display_frames: u32,
}

/// A playable level. Implements [`Screen`], so [`crate::screen::run`]
/// drives it.
pub struct Level {
    config: GameConfig,
    screen_area: Rect,
    sky: Rect,
    water: Rect,
    pub state: LevelState,
    display: DisplayState,
    status: Status,
    bindings: KeyBindings,
    rng: Pcg32,
}

impl Level {
    /// Build a level from a state, populating the entity pools if the state
    /// is fresh (pools already populated means a resumed save).
    pub fn new(config: &GameConfig, state: LevelState, seed: u64) -> Self {
        let width = config.geometry.width;
        let height = config.geometry.height;
        let waterline = config.geometry.waterline();

        let mut level = Self {
            config: config.clone(),
            screen_area: Rect::new(Vec2::ZERO, Vec2::new(width, height)),
            sky: Rect::new(Vec2::ZERO, Vec2::new(width, waterline)),
            water: Rect::new(
                Vec2::new(0.0, waterline),
                Vec2::new(width, height - waterline),
            ),
            state,
            display: DisplayState {
                score: 0,
                score_countdown: config.score_frames,
                final_display_frames: config.level_display_frames,
            },
            status: Status::Prepared,
            bindings: KeyBindings::from([
                (Key::Space, ScreenAction::DropBomb),
                (Key::P, ScreenAction::TogglePause),
                (Key::S, ScreenAction::SaveAndQuit),
                (Key::Escape, ScreenAction::QuitScreen),
                (Key::PrintScreen, ScreenAction::Screenshot),
            ]),
            rng: Pcg32::seed_from_u64(seed),
        };
        level.display.score = level.state.score;

        if level.state.pools.is_empty() {
            level.build_pools();
        }
        // transients are session-only and always start empty
        level
            .state
            .pools
            .insert(TRANSIENTS.to_string(), Pool::default());

        info!(
            "level {} ready (lives: {}, score: {})",
            level.state.level_number, level.state.lives, level.state.score
        );
        level
    }

    fn build_pools(&mut self) {
        let specs: Vec<_> = self
            .state
            .object_settings
            .iter()
            .map(|(name, obj)| {
                (
                    name.clone(),
                    obj.max_count,
                    obj.spawn_rate,
                    obj.total_count,
                    obj.to_destroy,
                )
            })
            .collect();
        for (name, max_count, spawn_rate, total_count, to_destroy) in specs {
            if spawn_rate.is_some() {
                self.state.spawnables.insert(name.clone());
            }
            self.state.pools.insert(
                name,
                Pool {
                    entities: Vec::new(),
                    max_count,
                    spawn_rate,
                    remaining: total_count,
                    to_destroy,
                },
            );
        }

        for name in self.config.animations.keys() {
            self.state.pools.entry(name.clone()).or_default();
        }

        if let Some(ship) = self.build_entity(SHIP) {
            if let Some(pool) = self.state.pools.get_mut(SHIP) {
                pool.entities.push(Entity::Moving(ship));
            }
        }
    }

    /// State suitable for save files and for seeding the next level.
    pub fn save_state(&self) -> LevelState {
        let mut state = self.state.clone();
        state.pools.remove(TRANSIENTS);
        state
    }

    pub fn lives(&self) -> u32 {
        self.state.lives
    }

    /// Anchor position of the player ship.
    fn ship_position(&self) -> Option<Vec2> {
        self.state
            .pools
            .get(SHIP)?
            .entities
            .first()?
            .as_moving()
            .map(MovingEntity::position)
    }

    /// Instantiate a moving entity of the given type, resolving its start
    /// rule and sampling speed and constants.
    fn build_entity(&mut self, object_type: &str) -> Option<MovingEntity> {
        let width = self.screen_area.size.x;
        let height = self.screen_area.size.y;
        let waterline = self.water.pos.y;
        let ship_pos = self.ship_position();

        let settings = self.state.object_settings.get(object_type)?;
        let origin = Vec2::new(settings.origin.0, settings.origin.1);
        let movement = &settings.movement;
        let rng = &mut self.rng;

        // `left`/`right` place the entity just off-screen; the adjustment
        // is origin-dependent so the whole image starts outside.
        let (start_x, adjust_x) = match &movement.start.0 {
            StartCoord::Name(name) if name == "left" => (0.0, origin.x - 1.0),
            StartCoord::Name(name) if name == "right" => (width, origin.x),
            StartCoord::Name(name) if name == SHIP => (ship_pos?.x, 0.0),
            StartCoord::Name(name) => (settings.constants.get(name)?.sample(rng), 0.0),
            StartCoord::Literal(v) => (*v, 0.0),
        };

        // the ship floats exactly on the waterline, depth 0
        let depth = match &movement.start.1 {
            StartCoord::Name(name) if name == SHIP => 0.0,
            StartCoord::Name(name) => settings.constants.get(name)?.sample(rng),
            StartCoord::Literal(v) => *v,
        };

        let speed = movement.speed.sample(rng);
        let velocity = Vec2::new(
            speed * movement.direction.0 * width,
            speed * movement.direction.1 * height,
        );
        let region = match movement.area {
            AreaName::Screen => self.screen_area,
            AreaName::Sky => self.sky,
            AreaName::Water => self.water,
        };

        Some(MovingEntity::new(
            Sprite {
                image: settings.sprite.image.clone(),
                size: Vec2::new(settings.sprite.width, settings.sprite.height),
            },
            Vec2::new(start_x, depth_to_y(depth, waterline, height)),
            Vec2::new(adjust_x, 0.0),
            velocity,
            region,
            origin,
            movement.repeat,
        ))
    }

    /// Score cost of dropping `count` further bombs right now.
    fn bomb_cost(&self, count: i64) -> i64 {
        let existing = self
            .state
            .pools
            .get("bomb")
            .map_or(0, |pool| pool.entities.len()) as i64;
        bomb_cost_from(existing, count)
    }

    /// How many more bombs can be dropped, limited by the concurrent cap,
    /// the level budget and the current score.
    fn available_bombs(&self) -> i64 {
        let Some(pool) = self.state.pools.get("bomb") else {
            return 0;
        };
        let cap = pool
            .max_count
            .unwrap_or(0)
            .min(pool.remaining.unwrap_or(u32::MAX));
        let mut available = i64::from(cap) - pool.entities.len() as i64;
        while available > 0 && self.bomb_cost(available) > self.state.score {
            available -= 1;
        }
        available
    }

    /// Drop a bomb from the ship, if one is available and affordable. The
    /// cost is charged before the bomb exists, so the new bomb makes the
    /// next one more expensive, not itself. A refused drop just clicks.
    fn drop_bomb(&mut self, ctx: &mut Context) {
        if self.status != Status::Running {
            return;
        }

        if self.available_bombs() > 0 {
            if let Some(ship_pos) = self.ship_position() {
                // no bombs from off-screen
                if ship_pos.x > 0.0 && ship_pos.x < self.screen_area.size.x {
                    let cost = self.bomb_cost(1);
                    if cost != 0 {
                        self.push_transient(
                            format!("{}", -cost),
                            Vec2::new(ship_pos.x, ship_pos.y - consts::BOMB_COST_TEXT_RISE),
                        );
                    }
                    self.state.score -= cost;

                    if let Some(bomb) = self.build_entity("bomb") {
                        if let Some(pool) = self.state.pools.get_mut("bomb") {
                            pool.entities.push(Entity::Moving(bomb));
                            if let Some(remaining) = pool.remaining.as_mut() {
                                *remaining -= 1;
                            }
                        }
                    }
                    debug!("bomb dropped, cost {cost}");
                    ctx.play_sound("bomb drop");
                    return;
                }
            }
        }

        ctx.play_sound("click");
    }

    /// Spawn rolls for every spawnable type still under its caps. The
    /// per-frame probability is rate/fps, a close approximation of the
    /// configured expected spawns per second.
    fn spawn_objects(&mut self) {
        let spawnables: Vec<String> = self.state.spawnables.iter().cloned().collect();
        for object_type in spawnables {
            let Some(pool) = self.state.pools.get(&object_type) else {
                continue;
            };
            let Some(rate) = pool.spawn_rate else {
                continue;
            };
            let limited = pool.remaining.is_some();
            let cap = pool
                .max_count
                .unwrap_or(0)
                .min(pool.remaining.unwrap_or(u32::MAX));
            if (pool.entities.len() as u32) >= cap {
                continue;
            }

            let probability = rate / self.config.fps as f32;
            if self.rng.random_range(0.0..1.0) < probability {
                if let Some(entity) = self.build_entity(&object_type) {
                    if let Some(pool) = self.state.pools.get_mut(&object_type) {
                        pool.entities.push(Entity::Moving(entity));
                        if limited {
                            if let Some(remaining) = pool.remaining.as_mut() {
                                *remaining -= 1;
                            }
                        }
                    }
                }
            }
        }
    }

    fn push_transient(&mut self, text: String, position: Vec2) {
        let lifetime = self.config.transient_display_time;
        if let Some(pool) = self.state.pools.get_mut(TRANSIENTS) {
            pool.entities
                .push(Entity::Transient(TransientText::new(text, position, lifetime)));
        }
    }

    fn push_animation(&mut self, animation_type: &str, center: Vec2) {
        let Some(descriptor) = self.config.animations.get(animation_type) else {
            return;
        };
        let animation = Animation::new(
            descriptor.frames.clone(),
            descriptor.frame_count,
            descriptor.fps,
            Vec2::new(descriptor.width, descriptor.height),
            center,
        );
        self.state
            .pools
            .entry(animation_type.to_string())
            .or_default()
            .entities
            .push(Entity::Animation(animation));
    }

    /// Resolve collisions for every configured hit pair: score (scaled by
    /// target depth), play the pair's sound, start its animation, and
    /// deactivate both entities.
    fn handle_hits(&mut self, ctx: &mut Context) {
        let waterline = self.water.pos.y;
        let height = self.screen_area.size.y;
        let pairs = self.config.hit_pairs.clone();

        for pair in &pairs {
            let collisions = {
                let Some(targets) = self.state.pools.get(&pair.target) else {
                    continue;
                };
                let Some(projectiles) = self.state.pools.get(&pair.projectile) else {
                    continue;
                };
                let mut found = Vec::new();
                for (ti, target) in targets.entities.iter().enumerate() {
                    let Some(target) = target.as_moving() else {
                        continue;
                    };
                    for (pi, projectile) in projectiles.entities.iter().enumerate() {
                        let Some(projectile) = projectile.as_moving() else {
                            continue;
                        };
                        if target.bounding_box().intersects(&projectile.bounding_box()) {
                            found.push((ti, pi));
                        }
                    }
                }
                found
            };

            for (ti, pi) in collisions {
                let target_info = self
                    .state
                    .pools
                    .get(&pair.target)
                    .and_then(|pool| pool.entities.get(ti))
                    .and_then(Entity::as_moving)
                    .map(|m| (m.position(), m.is_active()));
                let projectile_pos = self
                    .state
                    .pools
                    .get(&pair.projectile)
                    .and_then(|pool| pool.entities.get(pi))
                    .and_then(Entity::as_moving)
                    .map(MovingEntity::position);
                let (Some((target_pos, target_active)), Some(projectile_pos)) =
                    (target_info, projectile_pos)
                else {
                    continue;
                };

                // a target already hit this frame yields no further points
                if target_active && pair.score {
                    let delta =
                        ((target_pos.y - waterline) / height * consts::SCORE_DEPTH_SCALE + 0.5)
                            .floor() as i64;
                    self.state.score += delta;
                    self.push_transient(
                        format!("{delta:+}"),
                        Vec2::new(target_pos.x.max(0.0), target_pos.y),
                    );
                    debug!("{} destroyed at depth for {delta:+} points", pair.target);
                }

                ctx.play_sound(&pair.sound);
                self.push_animation(&pair.animation, projectile_pos);

                if let Some(target) = self
                    .state
                    .pools
                    .get_mut(&pair.target)
                    .and_then(|pool| pool.entities.get_mut(ti))
                    .and_then(Entity::as_moving_mut)
                {
                    target.deactivate();
                }
                if let Some(projectile) = self
                    .state
                    .pools
                    .get_mut(&pair.projectile)
                    .and_then(|pool| pool.entities.get_mut(pi))
                    .and_then(Entity::as_moving_mut)
                {
                    projectile.deactivate();
                }
                if let Some(to_destroy) = self
                    .state
                    .pools
                    .get_mut(&pair.target)
                    .and_then(|pool| pool.to_destroy.as_mut())
                {
                    if *to_destroy > 0 {
                        *to_destroy -= 1;
                    }
                }
            }
        }
    }

    /// Budgeted objects still to come: the unspawned budget plus whatever is
    /// on screen.
    fn objects_remaining(&self, object_type: &str) -> u32 {
        self.state.pools.get(object_type).map_or(0, |pool| {
            pool.remaining.unwrap_or(1) + pool.entities.len() as u32
        })
    }

    /// Step the displayed score one point towards the real score every
    /// `score_frames` frames.
    fn update_displayed_score(&mut self) {
        if self.display.score == self.state.score {
            return;
        }
        if self.display.score_countdown == 0 {
            self.display.score_countdown = self.config.score_frames;
            if self.display.score < self.state.score {
                self.display.score += 1;
            } else {
                self.display.score -= 1;
            }
        } else {
            self.display.score_countdown -= 1;
        }
    }

    fn toggle_pause(&mut self, ctx: &mut Context) {
        if self.status == Status::Paused {
            self.set_status(Status::Running);
            ctx.set_music_paused(false);
        } else if self.status == Status::Running {
            self.set_status(Status::Paused);
            ctx.set_music_paused(true);
        }
    }

    /// End the level immediately, skipping the final display.
    fn quit_with(&mut self, status: Status) {
        self.display.final_display_frames = 0;
        self.set_status(status);
    }

    fn check_level_end(&mut self, ctx: &mut Context) {
        let objective = self.config.objective.clone();
        if self.objects_remaining(&objective) > 0 {
            return;
        }
        let to_destroy = self
            .state
            .pools
            .get(&objective)
            .and_then(|pool| pool.to_destroy)
            .unwrap_or(0);

        ctx.set_music_paused(true);
        if to_destroy > 0 {
            info!(
                "level {} failed, {to_destroy} {objective}(s) short",
                self.state.level_number
            );
            self.set_status(Status::LevelFailed);
            ctx.play_sound("losing");
        } else {
            info!("level {} cleared", self.state.level_number);
            self.set_status(Status::LevelCleared);
            ctx.play_sound("winning");
        }
    }

    fn draw_entities(&self, ctx: &mut Context) {
        for pool in self.state.pools.values() {
            for entity in &pool.entities {
                match entity {
                    Entity::Moving(m) if m.is_active() => {
                        ctx.renderer.blit(&m.sprite.image, m.top_left());
                    }
                    Entity::Moving(_) => {}
                    Entity::Animation(a) => {
                        if let Some(image) = a.frame_image() {
                            ctx.renderer.blit(&image, a.position);
                        }
                    }
                    Entity::Transient(t) => {
                        if t.is_active() {
                            ctx.renderer.draw_text(&t.text, t.position);
                        }
                    }
                }
            }
        }
    }

    fn draw_hud(&self, ctx: &mut Context) {
        let center_x = self.screen_area.size.x / 2.0;
        let center_y = self.screen_area.size.y / 2.0;
        let remaining_bombs = self
            .state
            .pools
            .get("bomb")
            .and_then(|pool| pool.remaining)
            .unwrap_or(0);
        let objective = &self.config.objective;
        let to_destroy = self
            .state
            .pools
            .get(objective)
            .and_then(|pool| pool.to_destroy)
            .unwrap_or(0);

        let lines = [
            (
                format!(
                    "Bombs: {remaining_bombs} ({} available)",
                    self.available_bombs()
                ),
                Vec2::new(20.0, 20.0),
            ),
            (
                format!("Bomb cost: {}", self.bomb_cost(1)),
                Vec2::new(20.0, 50.0),
            ),
            (
                format!(
                    "Level: {},  Score: {}",
                    self.state.level_number, self.display.score
                ),
                Vec2::new(20.0 + center_x, 20.0),
            ),
            (
                format!(
                    "Targets: {to_destroy}/{}",
                    self.objects_remaining(objective)
                ),
                Vec2::new(20.0 + center_x, 50.0),
            ),
        ];
        for (text, position) in lines {
            ctx.renderer.draw_text(&text, position);
        }

        if self.status == Status::Paused {
            ctx.renderer
                .draw_text("--- PAUSED ---", Vec2::new(center_x, center_y));
        }
        if !self.is_running() {
            let message = match self.status {
                Status::LevelCleared => Some("*** LEVEL CLEARED ***"),
                Status::LevelFailed if self.state.lives > 1 => Some("*** LEVEL FAILED ***"),
                Status::LevelFailed => Some("*** GAME OVER ***"),
                _ => None,
            };
            if let Some(message) = message {
                ctx.renderer
                    .draw_text(message, Vec2::new(center_x, center_y - 32.0));
            }
        }

        // spare lives as a row of ship icons
        if let Some(ship) = self.state.object_settings.get(SHIP) {
            let mut x = 20.0;
            for _ in 1..self.state.lives {
                ctx.renderer.blit(&ship.sprite.image, Vec2::new(x, 0.0));
                x += ship.sprite.width;
            }
        }
    }
}

/// Quadratic bomb pricing: with `existing` bombs in the water, the next
/// `count` bombs cost the sum of squares of the running bomb count.
fn bomb_cost_from(existing: i64, count: i64) -> i64 {
    (0..count.max(0)).map(|k| (existing + k).pow(2)).sum()
}

impl Screen for Level {
    fn valid_statuses(&self) -> &[Status] {
        &[
            Status::Prepared,
            Status::Running,
            Status::Paused,
            Status::Terminate,
            Status::Quit,
            Status::LevelCleared,
            Status::LevelFailed,
            Status::LevelSave,
        ]
    }

    fn running_statuses(&self) -> &[Status] {
        &[Status::Running, Status::Paused]
    }

    fn status(&self) -> Status {
        self.status
    }

    fn store_status(&mut self, status: Status) {
        self.status = status;
    }

    fn ready_to_quit(&self) -> bool {
        self.display.final_display_frames == 0
    }

    fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    fn draw(&mut self, ctx: &mut Context) {
        ctx.renderer.fill(SKY_COLOUR);
        ctx.renderer
            .fill_rect(self.water.pos, self.water.size, WATER_COLOUR);
        self.draw_entities(ctx);
        self.draw_hud(ctx);
    }

    /// One simulation step. Pausing freezes everything; after the level has
    /// ended only animations and the final display countdown advance.
    fn update_state(&mut self, dt: f32, ctx: &mut Context) {
        if self.status == Status::Paused {
            return;
        }

        self.update_displayed_score();

        if !self.is_running() {
            if self.display.final_display_frames > 0 {
                self.display.final_display_frames -= 1;
            }
            let animation_types: Vec<String> = self.config.animations.keys().cloned().collect();
            for name in animation_types {
                if let Some(pool) = self.state.pools.get_mut(&name) {
                    for entity in &mut pool.entities {
                        entity.update(dt);
                    }
                }
            }
            return;
        }

        for pool in self.state.pools.values_mut() {
            for entity in &mut pool.entities {
                entity.update(dt);
            }
        }

        self.handle_hits(ctx);

        for pool in self.state.pools.values_mut() {
            pool.entities.retain(Entity::is_active);
        }

        self.check_level_end(ctx);
        self.spawn_objects();
    }

    fn perform(&mut self, action: ScreenAction, ctx: &mut Context) {
        match action {
            ScreenAction::Screenshot => save_screenshot(ctx),
            ScreenAction::TogglePause => self.toggle_pause(ctx),
            ScreenAction::DropBomb => self.drop_bomb(ctx),
            ScreenAction::SaveAndQuit => self.quit_with(Status::LevelSave),
            ScreenAction::QuitScreen => self.quit_with(Status::Quit),
        }
    }
}

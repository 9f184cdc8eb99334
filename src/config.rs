//! Data-driven game configuration
//!
//! All gameplay balance lives in descriptor tables: per-object movement
//! rules, spawn budgets and quotas, hit pairs, animations and sound cues,
//! plus per-level override patches applied to the object table.
//!
//! Malformed configuration is a fatal startup failure: `validate` runs
//! before the first frame so a bad table can never surface mid-game.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("object type `{object}` references unknown constant `{name}`")]
    UnknownConstant { object: String, name: String },

    #[error("spawnable type `{0}` has no max_count")]
    SpawnableWithoutCap(String),

    #[error("hit pair ({target}, {projectile}) references unknown object type `{missing}`")]
    UnknownHitType {
        target: String,
        projectile: String,
        missing: String,
    },

    #[error("hit pair ({target}, {projectile}) references unknown animation `{animation}`")]
    UnknownHitAnimation {
        target: String,
        projectile: String,
        animation: String,
    },

    #[error("hit pair ({target}, {projectile}) references unknown sound `{sound}`")]
    UnknownHitSound {
        target: String,
        projectile: String,
        sound: String,
    },

    #[error("required sound cue `{0}` is not configured")]
    MissingSound(String),

    #[error("objective type `{0}` is not a configured object type")]
    UnknownObjective(String),

    #[error("objective type `{0}` needs both total_count and to_destroy")]
    ObjectiveWithoutQuota(String),

    #[error("overrides for level {level} produce invalid object settings: {source}")]
    BadLevelOverride {
        level: u32,
        source: serde_json::Error,
    },

    #[error("object settings are not representable as a settings tree: {0}")]
    Tree(#[from] serde_json::Error),
}

/// A fixed value or a uniform range to sample from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueOrRange {
    Value(f32),
    Range { min: f32, max: f32 },
}

impl ValueOrRange {
    /// Resolve to a concrete value, sampling uniformly for ranges.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f32 {
        match *self {
            ValueOrRange::Value(v) => v,
            ValueOrRange::Range { min, max } => rng.random_range(min..=max),
        }
    }
}

/// One coordinate of a start-position rule.
///
/// A literal is used as-is. A name is resolved by the level: `left`/`right`
/// map to the screen edges (x only), `ship` reads the player position, and
/// anything else names a constant of the owning object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StartCoord {
    Literal(f32),
    Name(String),
}

/// Named movement region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaName {
    Screen,
    Sky,
    Water,
}

/// Movement rule of an object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementConfig {
    pub start: (StartCoord, StartCoord),
    pub speed: ValueOrRange,
    /// Direction vector; speed is scaled by screen width/height per axis, so
    /// speeds are fractions of the play field per second.
    pub direction: (f32, f32),
    pub area: AreaName,
    pub repeat: bool,
}

/// Drawable image reference with its pixel size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteConfig {
    pub image: String,
    pub width: f32,
    pub height: f32,
}

/// Full descriptor of one object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub sprite: SpriteConfig,
    /// Anchor point in units of image width/height.
    pub origin: (f32, f32),
    pub movement: MovementConfig,
    #[serde(default)]
    pub constants: BTreeMap<String, ValueOrRange>,
    /// Concurrent on-screen cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_count: Option<u32>,
    /// Lifetime spawn budget for the whole level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u32>,
    /// Expected spawns per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawn_rate: Option<f32>,
    /// Kill quota for the win condition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_destroy: Option<u32>,
}

/// Frame-animation descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationConfig {
    /// Image-id scheme with a `{frame}` placeholder.
    pub frames: String,
    pub frame_count: u32,
    pub fps: f32,
    pub width: f32,
    pub height: f32,
}

/// Sound cue descriptor. The file is opaque to the core; the audio
/// collaborator resolves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundConfig {
    pub file: String,
    pub volume: f32,
}

/// A (target, projectile) pair that can collide, and what happens on a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitPair {
    pub target: String,
    pub projectile: String,
    pub animation: String,
    pub sound: String,
    /// Whether the hit scores points.
    pub score: bool,
}

/// Screen geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub width: f32,
    pub height: f32,
    /// Fraction of the screen height that is sky; the rest is water.
    pub sky_fraction: f32,
}

impl Geometry {
    pub fn waterline(&self) -> f32 {
        (self.sky_fraction * self.height).floor()
    }
}

/// An override patch over the settings tree.
///
/// `Remove` deletes the key it is attached to (an explicit variant, so a
/// legitimate `null` value can never be mistaken for a deletion). Patches
/// only touch keys that already exist in the base tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Patch {
    Remove,
    Value(Value),
    Map(BTreeMap<String, Patch>),
}

/// Recursively merge a patch into a settings tree.
///
/// Map patches recurse into map values and replace anything else; keys
/// absent from the base are ignored; `Remove` deletes the key.
pub fn merge_patch(base: &mut Value, patch: &Patch) {
    match patch {
        Patch::Remove => *base = Value::Null,
        Patch::Value(v) => *base = v.clone(),
        Patch::Map(entries) => {
            let Some(object) = base.as_object_mut() else {
                return;
            };
            for (key, sub) in entries {
                match sub {
                    Patch::Remove => {
                        object.remove(key);
                    }
                    _ => {
                        if let Some(slot) = object.get_mut(key) {
                            merge_patch(slot, sub);
                        }
                    }
                }
            }
        }
    }
}

/// The complete game configuration, consumed read-only by the simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub geometry: Geometry,
    /// Frame rate the loop runs at; also the denominator of the per-frame
    /// spawn probability.
    pub fps: u32,
    /// Starting number of lives.
    pub lives: u32,
    /// Frames between steps of the smoothed score display.
    pub score_frames: u32,
    /// Frames the cleared/failed message stays on screen.
    pub level_display_frames: u32,
    /// Seconds a floating score delta stays visible.
    pub transient_display_time: f32,
    /// The quota-bearing target type that decides win/lose.
    pub objective: String,
    pub objects: BTreeMap<String, ObjectConfig>,
    pub animations: BTreeMap<String, AnimationConfig>,
    pub sounds: BTreeMap<String, SoundConfig>,
    pub hit_pairs: Vec<HitPair>,
    /// Per-level override patches, keyed by level number.
    pub level_updates: BTreeMap<u32, Patch>,
}

/// Sound cues the level plays by name; they must exist in any valid config.
pub const REQUIRED_SOUNDS: [&str; 4] = ["winning", "losing", "click", "bomb drop"];

impl GameConfig {
    /// Object settings for a given level: the base table with that level's
    /// override patch (if any) deep-merged in.
    pub fn object_settings_for_level(
        &self,
        level: u32,
    ) -> Result<BTreeMap<String, ObjectConfig>, ConfigError> {
        let mut tree = serde_json::to_value(&self.objects)?;
        if let Some(patch) = self.level_updates.get(&level) {
            merge_patch(&mut tree, patch);
        }
        serde_json::from_value(tree).map_err(|source| ConfigError::BadLevelOverride { level, source })
    }

    /// Validate the whole configuration. Called once at startup; any error
    /// is fatal before gameplay begins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_objects(&self.objects)?;

        // every level override must still yield a valid table
        for &level in self.level_updates.keys() {
            let patched = self.object_settings_for_level(level)?;
            validate_objects(&patched)?;
        }

        for pair in &self.hit_pairs {
            for name in [&pair.target, &pair.projectile] {
                if !self.objects.contains_key(name) {
                    return Err(ConfigError::UnknownHitType {
                        target: pair.target.clone(),
                        projectile: pair.projectile.clone(),
                        missing: name.clone(),
                    });
                }
            }
            if !self.animations.contains_key(&pair.animation) {
                return Err(ConfigError::UnknownHitAnimation {
                    target: pair.target.clone(),
                    projectile: pair.projectile.clone(),
                    animation: pair.animation.clone(),
                });
            }
            if !self.sounds.contains_key(&pair.sound) {
                return Err(ConfigError::UnknownHitSound {
                    target: pair.target.clone(),
                    projectile: pair.projectile.clone(),
                    sound: pair.sound.clone(),
                });
            }
        }

        for name in REQUIRED_SOUNDS {
            if !self.sounds.contains_key(name) {
                return Err(ConfigError::MissingSound(name.to_string()));
            }
        }

        let Some(objective) = self.objects.get(&self.objective) else {
            return Err(ConfigError::UnknownObjective(self.objective.clone()));
        };
        if objective.total_count.is_none() || objective.to_destroy.is_none() {
            return Err(ConfigError::ObjectiveWithoutQuota(self.objective.clone()));
        }

        Ok(())
    }
}

fn validate_objects(objects: &BTreeMap<String, ObjectConfig>) -> Result<(), ConfigError> {
    for (name, object) in objects {
        let (x, y) = &object.movement.start;
        if let StartCoord::Name(coord) = x {
            if !matches!(coord.as_str(), "left" | "right" | "ship")
                && !object.constants.contains_key(coord)
            {
                return Err(ConfigError::UnknownConstant {
                    object: name.clone(),
                    name: coord.clone(),
                });
            }
        }
        if let StartCoord::Name(coord) = y {
            if coord != "ship" && !object.constants.contains_key(coord) {
                return Err(ConfigError::UnknownConstant {
                    object: name.clone(),
                    name: coord.clone(),
                });
            }
        }
        if object.spawn_rate.is_some() && object.max_count.is_none() {
            return Err(ConfigError::SpawnableWithoutCap(name.clone()));
        }
    }
    Ok(())
}

// Builders for the default tables. Kept as plain functions so tests can
// assemble variations of the standard game.

fn sprite(image: &str, width: f32, height: f32) -> SpriteConfig {
    SpriteConfig {
        image: image.to_string(),
        width,
        height,
    }
}

fn pmap<const N: usize>(entries: [(&str, Patch); N]) -> Patch {
    Patch::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

impl GameConfig {
    /// The standard game: ship, bubbles, submarines, bombs and whales, with
    /// the depth overrides that ease the first three levels.
    pub fn default_game() -> Self {
        let width = 1024.0;
        let fps = 60;

        let mut objects = BTreeMap::new();

        objects.insert(
            "ship".to_string(),
            ObjectConfig {
                sprite: sprite("assets/schiff.png", 80.0, 24.0),
                origin: (0.5, 1.0),
                movement: MovementConfig {
                    start: (
                        StartCoord::Name("left".to_string()),
                        StartCoord::Literal(0.0),
                    ),
                    speed: ValueOrRange::Value(0.1),
                    direction: (1.0, 0.0),
                    area: AreaName::Sky,
                    repeat: true,
                },
                constants: BTreeMap::new(),
                max_count: None,
                total_count: None,
                spawn_rate: None,
                to_destroy: None,
            },
        );

        objects.insert(
            "bubble".to_string(),
            ObjectConfig {
                sprite: sprite("assets/bubble.png", 10.0, 10.0),
                origin: (0.0, 1.0),
                movement: MovementConfig {
                    start: (
                        StartCoord::Name("startx".to_string()),
                        StartCoord::Name("startdepth".to_string()),
                    ),
                    speed: ValueOrRange::Range {
                        min: 0.01,
                        max: 0.1,
                    },
                    direction: (0.0, -1.0),
                    area: AreaName::Water,
                    repeat: false,
                },
                constants: BTreeMap::from([
                    (
                        "startx".to_string(),
                        ValueOrRange::Range {
                            min: 0.0,
                            max: width,
                        },
                    ),
                    (
                        "startdepth".to_string(),
                        ValueOrRange::Range { min: 0.2, max: 1.0 },
                    ),
                ]),
                max_count: Some(20),
                total_count: Some(1000), // basically unlimited
                spawn_rate: Some(1.0),
                to_destroy: None,
            },
        );

        objects.insert(
            "submarine".to_string(),
            ObjectConfig {
                sprite: sprite("assets/uboot.png", 64.0, 16.0),
                origin: (0.0, 0.0),
                movement: MovementConfig {
                    start: (
                        StartCoord::Name("right".to_string()),
                        StartCoord::Name("depth".to_string()),
                    ),
                    speed: ValueOrRange::Range {
                        min: 0.05,
                        max: 0.2,
                    },
                    direction: (-1.0, 0.0),
                    area: AreaName::Water,
                    repeat: false,
                },
                constants: BTreeMap::from([(
                    "depth".to_string(),
                    ValueOrRange::Range {
                        min: 0.1,
                        max: 0.97,
                    },
                )]),
                max_count: Some(10),
                total_count: Some(50),
                spawn_rate: Some(1.0 / 3.0),
                to_destroy: Some(30),
            },
        );

        objects.insert(
            "bomb".to_string(),
            ObjectConfig {
                sprite: sprite("assets/bomb.png", 8.0, 16.0),
                origin: (0.5, 0.0),
                movement: MovementConfig {
                    start: (
                        StartCoord::Name("ship".to_string()),
                        StartCoord::Name("ship".to_string()),
                    ),
                    speed: ValueOrRange::Value(0.1),
                    direction: (0.0, 1.0),
                    area: AreaName::Water,
                    repeat: false,
                },
                constants: BTreeMap::new(),
                max_count: Some(15),
                total_count: Some(100),
                spawn_rate: None,
                to_destroy: None,
            },
        );

        objects.insert(
            "whale".to_string(),
            ObjectConfig {
                sprite: sprite("assets/whale.png", 64.0, 32.0),
                origin: (0.0, 0.0),
                movement: MovementConfig {
                    start: (
                        StartCoord::Name("right".to_string()),
                        StartCoord::Name("depth".to_string()),
                    ),
                    speed: ValueOrRange::Range {
                        min: 0.01,
                        max: 0.05,
                    },
                    direction: (-1.0, 0.0),
                    area: AreaName::Water,
                    repeat: false,
                },
                constants: BTreeMap::from([(
                    "depth".to_string(),
                    ValueOrRange::Range {
                        min: 0.1,
                        max: 0.97,
                    },
                )]),
                max_count: Some(10),
                total_count: Some(50),
                spawn_rate: Some(1.0 / 20.0),
                to_destroy: Some(30),
            },
        );

        let animations = BTreeMap::from([(
            "explosion".to_string(),
            AnimationConfig {
                frames: "assets/explosion_{frame}.png".to_string(),
                frame_count: 5,
                fps: 10.0,
                width: 40.0,
                height: 40.0,
            },
        )]);

        let sounds = BTreeMap::from([
            (
                "explosion".to_string(),
                SoundConfig {
                    file: "assets/explosion.wav".to_string(),
                    volume: 0.2,
                },
            ),
            (
                "whale explosion".to_string(),
                SoundConfig {
                    file: "assets/torpedo-impact.wav".to_string(),
                    volume: 1.0,
                },
            ),
            (
                "winning".to_string(),
                SoundConfig {
                    file: "assets/fanfare.wav".to_string(),
                    volume: 0.5,
                },
            ),
            (
                "losing".to_string(),
                SoundConfig {
                    file: "assets/sad-trombone.wav".to_string(),
                    volume: 0.5,
                },
            ),
            (
                "click".to_string(),
                SoundConfig {
                    file: "assets/click.wav".to_string(),
                    volume: 0.4,
                },
            ),
            (
                "bomb drop".to_string(),
                SoundConfig {
                    file: "assets/splash.wav".to_string(),
                    volume: 0.6,
                },
            ),
        ]);

        let hit_pairs = vec![
            HitPair {
                target: "submarine".to_string(),
                projectile: "bomb".to_string(),
                animation: "explosion".to_string(),
                sound: "explosion".to_string(),
                score: true,
            },
            HitPair {
                target: "whale".to_string(),
                projectile: "bomb".to_string(),
                animation: "explosion".to_string(),
                sound: "whale explosion".to_string(),
                score: false,
            },
        ];

        // Early levels keep submarines shallow (and push whales a little
        // deeper so they stay out of the easy-kill zone).
        let depth_limit = |key: &str, value: f32| {
            pmap([(
                "constants",
                pmap([("depth", pmap([(key, Patch::Value(value.into()))]))]),
            )])
        };
        let level_updates = BTreeMap::from([
            (
                1,
                pmap([
                    ("submarine", depth_limit("max", 0.2)),
                    ("whale", depth_limit("min", 0.25)),
                ]),
            ),
            (2, pmap([("submarine", depth_limit("max", 0.4))])),
            (3, pmap([("submarine", depth_limit("max", 0.6))])),
        ]);

        Self {
            geometry: Geometry {
                width,
                height: 768.0,
                sky_fraction: 0.2,
            },
            fps,
            lives: 4,
            score_frames: 6,
            level_display_frames: 5 * fps,
            transient_display_time: 3.0,
            objective: "submarine".to_string(),
            objects,
            animations,
            sounds,
            hit_pairs,
            level_updates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_game_validates() {
        GameConfig::default_game().validate().expect("valid config");
    }

    #[test]
    fn test_value_or_range_parses_untagged() {
        let v: ValueOrRange = serde_json::from_value(json!(0.25)).unwrap();
        assert_eq!(v, ValueOrRange::Value(0.25));

        let r: ValueOrRange = serde_json::from_value(json!({"min": 0.1, "max": 0.9})).unwrap();
        assert_eq!(r, ValueOrRange::Range { min: 0.1, max: 0.9 });
    }

    #[test]
    fn test_sample_range_stays_in_bounds() {
        use rand::SeedableRng;
        let mut rng = rand_pcg::Pcg32::seed_from_u64(7);
        let range = ValueOrRange::Range { min: 2.0, max: 5.0 };
        for _ in 0..100 {
            let v = range.sample(&mut rng);
            assert!((2.0..=5.0).contains(&v));
        }
    }

    #[test]
    fn test_merge_patch_overrides_nested_value() {
        let mut tree = json!({"a": {"b": {"min": 0.1, "max": 0.9}}});
        let patch = pmap([("a", pmap([("b", pmap([("max", Patch::Value(json!(0.2)))]))]))]);
        merge_patch(&mut tree, &patch);
        assert_eq!(tree, json!({"a": {"b": {"min": 0.1, "max": 0.2}}}));
    }

    #[test]
    fn test_merge_patch_remove_deletes_key() {
        let mut tree = json!({"a": {"b": 1, "c": 2}});
        let patch = pmap([("a", pmap([("b", Patch::Remove)]))]);
        merge_patch(&mut tree, &patch);
        assert_eq!(tree, json!({"a": {"c": 2}}));
    }

    #[test]
    fn test_merge_patch_ignores_unknown_keys() {
        let mut tree = json!({"a": 1});
        let patch = pmap([
            ("missing", Patch::Value(json!(9))),
            ("also_missing", Patch::Remove),
        ]);
        merge_patch(&mut tree, &patch);
        assert_eq!(tree, json!({"a": 1}));
    }

    #[test]
    fn test_merge_patch_value_replaces_subtree() {
        let mut tree = json!({"a": {"b": 1}});
        let patch = pmap([("a", Patch::Value(json!(42)))]);
        merge_patch(&mut tree, &patch);
        assert_eq!(tree, json!({"a": 42}));
    }

    #[test]
    fn test_null_value_is_not_a_deletion() {
        let mut tree = json!({"a": 1});
        let patch = pmap([("a", Patch::Value(json!(null)))]);
        merge_patch(&mut tree, &patch);
        assert_eq!(tree, json!({"a": null}));
    }

    #[test]
    fn test_level_one_limits_submarine_depth() {
        let config = GameConfig::default_game();
        let objects = config.object_settings_for_level(1).unwrap();
        assert_eq!(
            objects["submarine"].constants["depth"],
            ValueOrRange::Range { min: 0.1, max: 0.2 }
        );
        assert_eq!(
            objects["whale"].constants["depth"],
            ValueOrRange::Range {
                min: 0.25,
                max: 0.97
            }
        );
        // levels without overrides are untouched
        let base = config.object_settings_for_level(4).unwrap();
        assert_eq!(base, config.objects);
    }

    #[test]
    fn test_unknown_constant_is_fatal() {
        let mut config = GameConfig::default_game();
        config
            .objects
            .get_mut("submarine")
            .unwrap()
            .constants
            .remove("depth");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownConstant { .. }));
    }

    #[test]
    fn test_spawnable_without_cap_is_fatal() {
        let mut config = GameConfig::default_game();
        config.objects.get_mut("bubble").unwrap().max_count = None;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::SpawnableWithoutCap(name) if name == "bubble"));
    }

    #[test]
    fn test_hit_pair_with_unknown_sound_is_fatal() {
        let mut config = GameConfig::default_game();
        config.hit_pairs[0].sound = "nope".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownHitSound { .. }));
    }

    #[test]
    fn test_objective_must_carry_quota() {
        let mut config = GameConfig::default_game();
        config.objective = "bubble".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ObjectiveWithoutQuota(_)));

        config.objective = "kraken".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownObjective(_)));
    }

    #[test]
    fn test_override_breaking_a_level_is_fatal() {
        let mut config = GameConfig::default_game();
        // removing the whole constants map leaves `depth` unresolvable at
        // level 1
        config.level_updates.insert(
            1,
            pmap([("submarine", pmap([("constants", Patch::Remove)]))]),
        );
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownConstant { .. }));
    }
}

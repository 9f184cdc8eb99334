//! Headless game driver
//!
//! Runs the level progression without a windowing stack: a scripted input
//! feed, a fixed clock and a recording renderer. Useful for soak-testing
//! the simulation and for demonstrating the save/resume cycle.
//!
//! Pass `--resume` to continue from the save file instead of starting a
//! new game.

use std::error::Error;
use std::path::PathBuf;

use glam::Vec2;
use log::{error, info};

use depth_charge::config::GameConfig;
use depth_charge::persistence;
use depth_charge::platform::{headless_context, Context, Event, Key, ScriptedInput};
use depth_charge::screen::{self, Status};
use depth_charge::sim::{Level, LevelState};

const SAVE_FILE: &str = "depth-charge-save.json";

/// Base RNG seed; each level derives its own from this and its sequence
/// number, so a full run is reproducible.
const BASE_SEED: u64 = 0x5eed_0d15;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = GameConfig::default_game();
    config.validate()?;

    let save_path = PathBuf::from(SAVE_FILE);
    let resume = std::env::args().any(|arg| arg == "--resume");
    let state = if resume {
        info!("resuming from {}", save_path.display());
        persistence::load_state(&save_path)?
    } else {
        LevelState::first(&config)?
    };

    let mut ctx = headless_context(
        Vec2::new(config.geometry.width, config.geometry.height),
        config.fps,
        demo_script(&config),
    );

    let (result, state) = play(&config, &mut ctx, state);

    if result == Status::LevelSave {
        persistence::save_state(&save_path, &state)?;
    }

    info!(
        "finished with {result:?} on level {} (score {}, lives {})",
        state.level_number, state.score, state.lives
    );
    Ok(())
}

/// Run levels back to back until the game ends: a cleared level leads to
/// the next one, a failed level repeats at the cost of a life, anything
/// else (quit, save, terminate, last life lost) ends the session.
fn play(config: &GameConfig, ctx: &mut Context, mut state: LevelState) -> (Status, LevelState) {
    let mut sequence = 0u64;
    loop {
        ctx.set_music_paused(false);
        let mut level = Level::new(config, state, BASE_SEED.wrapping_add(sequence));
        let result = screen::run(&mut level, ctx);
        let ended = level.save_state();

        let repeat = match result {
            Status::LevelCleared => false,
            Status::LevelFailed if ended.lives > 1 => true,
            _ => return (result, ended),
        };

        state = match LevelState::next(config, &ended, repeat) {
            Ok(next) => next,
            Err(err) => {
                // validate() makes this unreachable, but a broken override
                // table should not panic the driver
                error!("could not prepare next level: {err}");
                return (Status::Terminate, ended);
            }
        };
        sequence += 1;
    }
}

/// Thirty simulated seconds of play: a bomb drop every one and a half
/// seconds, then a save-and-quit.
fn demo_script(config: &GameConfig) -> ScriptedInput {
    let frames = 30 * config.fps as usize;
    let mut batches = Vec::with_capacity(frames + 1);
    for frame in 0..frames {
        if frame > 0 && frame % 90 == 0 {
            batches.push(vec![Event::KeyDown(Key::Space)]);
        } else {
            batches.push(Vec::new());
        }
    }
    batches.push(vec![Event::KeyDown(Key::S)]);
    ScriptedInput::new(batches)
}

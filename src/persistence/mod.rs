//! Save/load persistence
//!
//! Features:
//! - Versioned JSON envelope
//! - Atomic writes (tmp → rename) so a crash never truncates a save
//! - Typed errors distinguishing I/O, corruption and version mismatch

use std::fs;
use std::io;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::LevelState;

/// Format version of the save envelope. Bump on incompatible changes.
pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("save file I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("save file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("save file version {found} is not supported (expected {SAVE_VERSION})")]
    UnsupportedVersion { found: u32 },
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    state: LevelState,
}

/// Write the level state to `path`, going through a temporary file so an
/// interrupted write leaves any previous save intact.
pub fn save_state(path: &Path, state: &LevelState) -> Result<(), SaveError> {
    let envelope = Envelope {
        version: SAVE_VERSION,
        state: state.clone(),
    };
    let json = serde_json::to_string_pretty(&envelope)?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    info!("saved level state to {}", path.display());
    Ok(())
}

/// Read a level state back from `path`.
pub fn load_state(path: &Path) -> Result<LevelState, SaveError> {
    let json = fs::read_to_string(path)?;
    let envelope: Envelope = serde_json::from_str(&json)?;
    if envelope.version != SAVE_VERSION {
        return Err(SaveError::UnsupportedVersion {
            found: envelope.version,
        });
    }
    info!("loaded level state from {}", path.display());
    Ok(envelope.state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("depth-charge-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn test_round_trip() {
        let config = GameConfig::default_game();
        let mut state = LevelState::first(&config).unwrap();
        state.score = 123;
        state.lives = 2;

        let path = temp_path("roundtrip");
        save_state(&path, &state).unwrap();
        let loaded = load_state(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.score, 123);
        assert_eq!(loaded.lives, 2);
        assert_eq!(loaded.level_number, state.level_number);
        assert_eq!(loaded.object_settings, state.object_settings);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_state(Path::new("/nonexistent/depth-charge.json")).unwrap_err();
        assert!(matches!(err, SaveError::Io(_)));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let path = temp_path("garbage");
        fs::write(&path, "not json at all").unwrap();
        let err = load_state(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(matches!(err, SaveError::Corrupt(_)));
    }

    #[test]
    fn test_future_version_is_rejected() {
        let config = GameConfig::default_game();
        let state = LevelState::first(&config).unwrap();
        let json = serde_json::to_string(&Envelope {
            version: SAVE_VERSION + 1,
            state,
        })
        .unwrap();

        let path = temp_path("future");
        fs::write(&path, json).unwrap();
        let err = load_state(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(matches!(err, SaveError::UnsupportedVersion { found } if found == SAVE_VERSION + 1));
    }
}

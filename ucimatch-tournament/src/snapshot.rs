//! Resumable tournament state

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::config::TournamentFormat;
use crate::error::SnapshotError;
use crate::scoreboard::ScoreboardSnapshot;

/// Shape of the pairing schedule a snapshot belongs to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleFingerprint {
    pub engines: Vec<String>,
    pub format: TournamentFormat,
    pub rounds: usize,
    pub games_per_round: usize,
    pub alternate_colors: bool,
}

/// Scoreboard plus schedule position
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TournamentSnapshot {
    pub scoreboard: ScoreboardSnapshot,
    /// Games recorded so far; a resumed run starts the schedule here
    pub completed: usize,
    pub fingerprint: ScheduleFingerprint,
}

/// Persists snapshots after every recorded game
pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &TournamentSnapshot) -> Result<(), SnapshotError>;
}

/// Writes pretty JSON, replacing the file atomically
pub struct JsonSnapshotStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a snapshot written by [`save`](SnapshotStore::save)
    pub fn load(path: impl AsRef<Path>) -> Result<TournamentSnapshot, SnapshotError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn save(&self, snapshot: &TournamentSnapshot) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(snapshot)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoreboard::{PairEntry, PairStats};

    fn snapshot(completed: usize) -> TournamentSnapshot {
        TournamentSnapshot {
            scoreboard: ScoreboardSnapshot {
                pairs: vec![PairEntry {
                    first: "a".into(),
                    second: "b".into(),
                    stats: PairStats {
                        games: 1,
                        draws: 1,
                        ..Default::default()
                    },
                }],
            },
            completed,
            fingerprint: ScheduleFingerprint {
                engines: vec!["a".into(), "b".into()],
                format: TournamentFormat::Gauntlet { seeds: 1 },
                rounds: 2,
                games_per_round: 2,
                alternate_colors: true,
            },
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("state.json"));
        store.save(&snapshot(1)).unwrap();
        store.save(&snapshot(2)).unwrap();
        let loaded = JsonSnapshotStore::load(store.path()).unwrap();
        assert_eq!(loaded, snapshot(2));
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            JsonSnapshotStore::load(dir.path().join("none.json")),
            Err(SnapshotError::Io(_))
        ));
        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{not json").unwrap();
        assert!(matches!(
            JsonSnapshotStore::load(&bad),
            Err(SnapshotError::Format(_))
        ));
    }
}

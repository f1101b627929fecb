use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::SAVE_VERSION;
use crate::error::PersistenceError;
use crate::types::{CellCoord, MovementMode};
use crate::world::is_valid_token;

pub trait KeyValueStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// One JSON file per key inside `dir`.
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
            && !key.contains("..");
        if !valid {
            return Err(PersistenceError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Read { path, source }),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        if let Err(source) = fs::create_dir_all(&self.dir) {
            return Err(PersistenceError::Write {
                path: self.dir.clone(),
                source,
            });
        }
        fs::write(&path, value).map_err(|source| PersistenceError::Write { path, source })
    }
}

/// In-memory store. Clones share the same entries.
#[derive(Clone, Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.get(key))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.insert(key, value);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPosition {
    pub i: i32,
    pub j: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveSnapshot {
    pub player: CellCoord,
    pub held: Option<u32>,
    pub overrides: Vec<(CellCoord, u32)>,
    pub movement_mode: MovementMode,
    pub won_value: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SaveFile {
    version: u8,
    player: SavedPosition,
    held: Option<u32>,
    overrides: Vec<(String, u32)>,
    #[serde(rename = "movementMode", alias = "movement_mode", default)]
    movement_mode: MovementMode,
    #[serde(rename = "wonValue", alias = "won_value", default)]
    won_value: Option<u32>,
    #[serde(rename = "savedAt", alias = "saved_at", default)]
    saved_at: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct SaveFileRaw {
    version: u8,
}

pub fn encode(snapshot: &SaveSnapshot) -> Result<String, PersistenceError> {
    let payload = SaveFile {
        version: SAVE_VERSION,
        player: SavedPosition {
            i: snapshot.player.i,
            j: snapshot.player.j,
        },
        held: snapshot.held,
        overrides: snapshot
            .overrides
            .iter()
            .map(|(coord, value)| (coord.key(), *value))
            .collect(),
        movement_mode: snapshot.movement_mode,
        won_value: snapshot.won_value,
        saved_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    };
    Ok(serde_json::to_string(&payload)?)
}

pub fn decode(text: &str) -> Result<SaveSnapshot, PersistenceError> {
    let raw: SaveFileRaw = serde_json::from_str(text)
        .map_err(|error| PersistenceError::Malformed(error.to_string()))?;
    if raw.version != SAVE_VERSION {
        return Err(PersistenceError::UnsupportedVersion(raw.version));
    }
    let parsed: SaveFile = serde_json::from_str(text)
        .map_err(|error| PersistenceError::Malformed(error.to_string()))?;

    if let Some(held) = parsed.held {
        if held == 0 || !is_valid_token(held) {
            return Err(PersistenceError::Malformed(format!(
                "held value {held} is not a token"
            )));
        }
    }

    let mut overrides = Vec::with_capacity(parsed.overrides.len());
    for (key, value) in parsed.overrides {
        let coord = match CellCoord::parse_key(&key) {
            Ok(coord) => coord,
            Err(error) => {
                warn!(%error, "skipping override with bad cell key");
                continue;
            }
        };
        if !is_valid_token(value) {
            warn!(key = %key, value, "skipping override with non-token value");
            continue;
        }
        overrides.push((coord, value));
    }

    Ok(SaveSnapshot {
        player: CellCoord::new(parsed.player.i, parsed.player.j),
        held: parsed.held,
        overrides,
        movement_mode: parsed.movement_mode,
        won_value: parsed.won_value.filter(|value| is_valid_token(*value) && *value > 0),
    })
}

/// Reads the saved game. A first run yields `None` quietly; unreadable or
/// malformed content is logged and also yields `None`.
pub fn load_snapshot(store: &dyn KeyValueStore, key: &str) -> Option<SaveSnapshot> {
    let text = match store.read(key) {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(error) => {
            warn!(%error, key, "failed to read save, starting fresh");
            return None;
        }
    };
    match decode(&text) {
        Ok(snapshot) => Some(snapshot),
        Err(error) => {
            warn!(%error, key, "save data malformed, starting fresh");
            None
        }
    }
}

pub fn save_snapshot(
    store: &mut dyn KeyValueStore,
    key: &str,
    snapshot: &SaveSnapshot,
) -> Result<(), PersistenceError> {
    let text = encode(snapshot)?;
    store.write(key, &text)
}

pub fn default_save_dir() -> PathBuf {
    std::env::var("GRIDMERGE_SAVE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".data"))
}

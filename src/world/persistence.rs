//! Durable writes the world depends on.
//!
//! Builder room edits go through [`RoomPersistence`] and are strict: a failed
//! write rolls the in-memory edit back. Player profiles go through
//! [`ProfileStore`] and are best-effort.

use fs2::FileExt;
use log::debug;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::world::errors::WorldError;
use crate::world::loader::AreaFile;
use crate::world::types::{PlayerProfile, Room};

pub trait RoomPersistence: Send + Sync + fmt::Debug {
    /// Replace the stored overlay with exactly `rooms`.
    fn save_builder_rooms(&self, rooms: &[Room]) -> Result<(), WorldError>;
}

pub trait ProfileStore: Send + Sync + fmt::Debug {
    /// Stored profile for `account`; unknown accounts get the default.
    fn profile(&self, account: &str) -> Result<PlayerProfile, WorldError>;

    fn save_profile(&self, account: &str, profile: &PlayerProfile) -> Result<(), WorldError>;
}

/// Accepts every write and stores nothing, so builder edits only last until
/// the next reboot. Used when no overlay file is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardRooms;

impl RoomPersistence for DiscardRooms {
    fn save_builder_rooms(&self, rooms: &[Room]) -> Result<(), WorldError> {
        debug!("Discarding {} builder rooms (no overlay configured)", rooms.len());
        Ok(())
    }
}

/// Builder overlay stored as a pretty-printed area file.
///
/// Writes are atomic: content goes to a temp file next to the target which is
/// then renamed over it, all while holding an exclusive lock on a sibling
/// `.lock` file.
#[derive(Debug, Clone)]
pub struct JsonOverlayStore {
    path: PathBuf,
}

impl JsonOverlayStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "rooms.json".into());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn write_locked(&self, content: &str) -> Result<(), WorldError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;
        lock_file.lock_exclusive()?;

        let base = self
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("rooms.json");
        let mut counter = 0u32;
        let tmp_path = loop {
            let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(mut tmp) => {
                    tmp.write_all(content.as_bytes())?;
                    tmp.flush()?;
                    let _ = tmp.sync_all();
                    break candidate;
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    counter = counter.saturating_add(1);
                }
                Err(e) => return Err(e.into()),
            }
        };

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        if let Ok(dir_file) = File::open(&dir) {
            let _ = dir_file.sync_all();
        }
        // Unlocks on drop.
        drop(lock_file);
        Ok(())
    }
}

impl RoomPersistence for JsonOverlayStore {
    fn save_builder_rooms(&self, rooms: &[Room]) -> Result<(), WorldError> {
        let mut rooms = rooms.to_vec();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        let file = AreaFile {
            name: "builder".to_string(),
            rooms,
        };
        let content = serde_json::to_string_pretty(&file)?;
        self.write_locked(&content)?;
        debug!("Wrote {} builder rooms to {}", file.rooms.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::loader::load_overlay;
    use tempfile::TempDir;

    #[test]
    fn overlay_written_then_read_back() {
        let tmp = TempDir::new().unwrap();
        let store = JsonOverlayStore::new(tmp.path().join("builder").join("rooms.json"));
        let rooms = vec![
            Room::new("garden", "Garden", "Green.").with_exit("south", "start"),
            Room::new("attic", "Attic", ""),
        ];
        store.save_builder_rooms(&rooms).unwrap();

        let loaded = load_overlay(store.path()).unwrap();
        let ids: Vec<&str> = loaded.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["attic", "garden"]);
        assert_eq!(loaded[1].exits["south"].as_str(), "start");

        let stray: Vec<_> = fs::read_dir(tmp.path().join("builder"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(stray.is_empty());
    }

    #[test]
    fn unwritable_target_reports_persistence_error() {
        let tmp = TempDir::new().unwrap();
        // A directory where the file should be makes the rename fail.
        let target = tmp.path().join("rooms.json");
        fs::create_dir_all(target.join("occupied")).unwrap();
        let store = JsonOverlayStore::new(&target);
        let err = store
            .save_builder_rooms(&[Room::new("x", "X", "")])
            .unwrap_err();
        assert_eq!(err.kind(), crate::world::ErrorKind::Persistence);
    }
}

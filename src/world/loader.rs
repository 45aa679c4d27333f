//! Area and quest definition loading.
//!
//! Core areas are every `*.json` file directly inside the areas directory,
//! read in file-name order. The builder overlay is a separate file in the
//! same format whose rooms replace core rooms with the same id.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use crate::world::errors::WorldError;
use crate::world::quest::{Quest, QuestCatalog};
use crate::world::types::{Room, RoomId};

/// On-disk layout shared by core area files and the builder overlay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rooms: Vec<Room>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct QuestFile {
    #[serde(default)]
    quests: Vec<Quest>,
}

/// Where a room definition came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomSource {
    Core(PathBuf),
    Builder,
    /// Defined in code when the world was built.
    Inline,
}

impl RoomSource {
    pub fn is_builder(&self) -> bool {
        matches!(self, RoomSource::Builder)
    }
}

#[derive(Debug, Default)]
pub struct LoadedRooms {
    pub rooms: HashMap<RoomId, Room>,
    pub sources: HashMap<RoomId, RoomSource>,
}

fn read_area(path: &Path) -> Result<AreaFile, WorldError> {
    let data = fs::read_to_string(path)
        .map_err(|e| WorldError::Load(format!("read area {}: {}", path.display(), e)))?;
    serde_json::from_str(&data)
        .map_err(|e| WorldError::Load(format!("decode area {}: {}", path.display(), e)))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Sorted list of core area files, excluding the overlay if it happens to
/// live in the same directory.
fn area_files(areas_path: &Path, overlay: Option<&Path>) -> Result<Vec<PathBuf>, WorldError> {
    let entries = fs::read_dir(areas_path)
        .map_err(|e| WorldError::Load(format!("read areas {}: {}", areas_path.display(), e)))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if overlay.is_some_and(|o| same_file(&path, o)) {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// Load core areas plus the builder overlay and check every exit resolves.
pub fn load_rooms(areas_path: &Path, overlay: Option<&Path>) -> Result<LoadedRooms, WorldError> {
    let mut loaded = LoadedRooms::default();

    for path in area_files(areas_path, overlay)? {
        let area = read_area(&path)?;
        debug!("Loading area '{}' from {}", area.name, path.display());
        for mut room in area.rooms {
            if room.id.is_empty() {
                return Err(WorldError::Load(format!(
                    "area {} contains a room without an id",
                    path.display()
                )));
            }
            if loaded.rooms.contains_key(&room.id) {
                return Err(WorldError::Load(format!("duplicate room id {}", room.id)));
            }
            prepare_room(&mut room);
            loaded.sources.insert(room.id.clone(), RoomSource::Core(path.clone()));
            loaded.rooms.insert(room.id.clone(), room);
        }
    }

    if let Some(overlay) = overlay {
        let mut replaced = 0usize;
        for mut room in load_overlay(overlay)? {
            if room.id.is_empty() {
                return Err(WorldError::Load(format!(
                    "builder overlay {} contains a room without an id",
                    overlay.display()
                )));
            }
            prepare_room(&mut room);
            loaded.sources.insert(room.id.clone(), RoomSource::Builder);
            if loaded.rooms.insert(room.id.clone(), room).is_some() {
                replaced += 1;
            }
        }
        if replaced > 0 {
            debug!("Builder overlay replaced {} core rooms", replaced);
        }
    }

    if loaded.rooms.is_empty() {
        return Err(WorldError::Load("no rooms loaded".to_string()));
    }
    validate_exits(&loaded.rooms)?;
    info!(
        "Loaded {} rooms ({} from builder overlay)",
        loaded.rooms.len(),
        loaded.sources.values().filter(|s| s.is_builder()).count()
    );
    Ok(loaded)
}

/// Rooms from the builder overlay; a missing file is an empty overlay.
pub fn load_overlay(path: &Path) -> Result<Vec<Room>, WorldError> {
    match fs::metadata(path) {
        Ok(_) => Ok(read_area(path)?.rooms),
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(WorldError::Load(format!("read overlay {}: {}", path.display(), e))),
    }
}

fn prepare_room(room: &mut Room) {
    room.exits = std::mem::take(&mut room.exits)
        .into_iter()
        .map(|(dir, target)| (dir.trim().to_ascii_lowercase(), target))
        .filter(|(dir, _)| !dir.is_empty())
        .collect();
    for npc in &mut room.npcs {
        npc.ensure_stats();
    }
}

/// Every exit must point at a loaded room.
pub fn validate_exits(rooms: &HashMap<RoomId, Room>) -> Result<(), WorldError> {
    let mut ids: Vec<&RoomId> = rooms.keys().collect();
    ids.sort();
    for id in ids {
        let room = &rooms[id];
        for (dir, target) in &room.exits {
            if !rooms.contains_key(target) {
                return Err(WorldError::Load(format!(
                    "room {} exit {} points to unknown room {}",
                    id, dir, target
                )));
            }
        }
    }
    Ok(())
}

/// Raw quest definitions; a missing file has none.
pub fn read_quest_file(path: &Path) -> Result<Vec<Quest>, WorldError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            debug!("No quest file at {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(WorldError::Load(format!("read quests {}: {}", path.display(), e))),
    };
    let parsed: QuestFile = serde_json::from_str(&data)
        .map_err(|e| WorldError::Load(format!("parse quests {}: {}", path.display(), e)))?;
    Ok(parsed.quests)
}

/// Load the quest catalog. A missing file yields an empty catalog; a
/// malformed one is an error.
pub fn load_quests(path: &Path) -> Result<QuestCatalog, WorldError> {
    let catalog = QuestCatalog::from_quests(read_quest_file(path)?);
    info!("Loaded {} quests", catalog.len());
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn overlay_wins_and_sources_are_tracked() {
        let tmp = TempDir::new().unwrap();
        let areas = tmp.path().join("areas");
        fs::create_dir_all(&areas).unwrap();
        write(
            &areas,
            "a.json",
            r#"{"name":"core","rooms":[{"id":"start","title":"Start","exits":{"North":"hall"}},{"id":"hall","title":"Hall"}]}"#,
        );
        let overlay = write(
            tmp.path(),
            "builder.json",
            r#"{"rooms":[{"id":"hall","title":"Grand Hall","exits":{"south":"start"}}]}"#,
        );

        let loaded = load_rooms(&areas, Some(&overlay)).unwrap();
        assert_eq!(loaded.rooms[&RoomId::from("hall")].title, "Grand Hall");
        assert_eq!(loaded.sources[&RoomId::from("hall")], RoomSource::Builder);
        assert!(!loaded.sources[&RoomId::from("start")].is_builder());
        assert!(loaded.rooms[&RoomId::from("start")].exits.contains_key("north"));
    }

    #[test]
    fn duplicate_core_ids_are_fatal() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.json", r#"{"rooms":[{"id":"start"}]}"#);
        write(tmp.path(), "b.json", r#"{"rooms":[{"id":"start"}]}"#);
        let err = load_rooms(tmp.path(), None).unwrap_err();
        assert!(err.to_string().contains("duplicate room id start"));
    }

    #[test]
    fn dangling_exit_is_fatal() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "a.json",
            r#"{"rooms":[{"id":"start","exits":{"east":"nowhere"}}]}"#,
        );
        assert!(load_rooms(tmp.path(), None).is_err());
    }

    #[test]
    fn malformed_area_is_fatal() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.json", "{ not json");
        let err = load_rooms(tmp.path(), None).unwrap_err();
        assert_eq!(err.kind(), crate::world::ErrorKind::Load);
    }

    #[test]
    fn missing_quest_file_is_empty_catalog() {
        let tmp = TempDir::new().unwrap();
        let catalog = load_quests(&tmp.path().join("quests.json")).unwrap();
        assert!(catalog.is_empty());
    }
}

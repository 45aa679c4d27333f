//! Layered area loading from disk.

use lumenmud::world::{load_rooms, AreaFile, ErrorKind, Npc, Room, RoomId, RoomSource, World};
use std::path::Path;
use tempfile::TempDir;

fn write_area(path: &Path, rooms: Vec<Room>) {
    let area = AreaFile {
        name: "test".into(),
        rooms,
    };
    std::fs::write(path, serde_json::to_string(&area).expect("encode")).expect("write");
}

#[test]
fn overlay_replaces_core_room() {
    let dir = TempDir::new().expect("tempdir");
    let areas = dir.path().join("areas");
    std::fs::create_dir_all(&areas).expect("mkdir");
    write_area(
        &areas.join("01-town.json"),
        vec![
            Room::new("start", "Square", "").with_exit("north", "hall"),
            Room::new("hall", "Hall", "").with_exit("south", "start"),
        ],
    );
    let overlay = dir.path().join("rooms.json");
    write_area(
        &overlay,
        vec![Room::new("hall", "Rebuilt Hall", "").with_exit("South", "start")],
    );

    let loaded = load_rooms(&areas, Some(&overlay)).expect("load");
    let hall = RoomId::from("hall");
    assert_eq!(loaded.rooms[&hall].title, "Rebuilt Hall");
    assert!(loaded.rooms[&hall].exits.contains_key("south"));
    assert_eq!(loaded.sources[&hall], RoomSource::Builder);
    assert!(matches!(
        loaded.sources[&RoomId::from("start")],
        RoomSource::Core(_)
    ));
}

#[test]
fn dangling_exit_fails_the_load() {
    let dir = TempDir::new().expect("tempdir");
    write_area(
        &dir.path().join("town.json"),
        vec![Room::new("start", "Square", "").with_exit("east", "nowhere")],
    );
    let err = World::builder()
        .areas_path(dir.path())
        .build()
        .expect_err("bad exit");
    assert_eq!(err.kind(), ErrorKind::Load);
}

#[test]
fn duplicate_ids_across_core_files_fail() {
    let dir = TempDir::new().expect("tempdir");
    write_area(&dir.path().join("a.json"), vec![Room::new("start", "A", "")]);
    write_area(&dir.path().join("b.json"), vec![Room::new("start", "B", "")]);
    let err = load_rooms(dir.path(), None).expect_err("duplicate");
    assert_eq!(err.kind(), ErrorKind::Load);
}

#[test]
fn npc_stats_are_filled_on_load() {
    let dir = TempDir::new().expect("tempdir");
    let mut ogre = Npc::new("Ogre");
    ogre.level = 4;
    ogre.max_health = 0;
    ogre.health = 0;
    write_area(
        &dir.path().join("cave.json"),
        vec![Room::new("start", "Cave", "").with_npc(ogre)],
    );
    let world = World::builder().areas_path(dir.path()).build().expect("world");
    let npc = &world.room_npcs(&RoomId::from("start"))[0];
    assert_eq!(npc.max_health, 64);
    assert_eq!(npc.health, 64);
}

//! Heal and bolt: mana checks, clamping, and who gets hit.

use lumenmud::world::{
    BoltOutcome, ErrorKind, Item, Npc, PlayerProfile, Room, RoomId, World, WorldError,
};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;

fn weak_rat() -> Npc {
    let mut npc = Npc {
        name: "Rat".into(),
        level: 1,
        max_health: 10,
        health: 10,
        ..Npc::default()
    };
    npc.ensure_stats();
    npc.with_loot(Item::new("rat tail", "Still twitching."))
}

fn world() -> Arc<World> {
    World::builder()
        .with_room(
            Room::new("start", "Start", "")
                .with_npc(weak_rat())
                .with_npc(Npc::new("Ogre")),
        )
        .outbound_buffer(64)
        .build()
        .expect("world")
}

fn lines(rx: &mut Receiver<String>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(line) = rx.try_recv() {
        out.push(line);
    }
    out
}

/// Log in and raise to level 3, which is the first level with enough mana
/// for a bolt.
fn seasoned(world: &World, name: &str) -> Receiver<String> {
    let rx = world
        .add_player(name, None, false, PlayerProfile::default())
        .expect("login");
    assert_eq!(world.award_experience(name, 300).expect("online"), 2);
    rx
}

#[test]
fn heal_is_clamped_and_refused_without_mana() {
    let world = world();
    let start = RoomId::from("start");
    let _rx = world
        .add_player("Ada", None, false, PlayerProfile::default())
        .expect("login");
    world
        .apply_damage_from_npc(&start, "Ogre", "Ada", 5)
        .expect("wound");

    let healed = world.cast_heal("Ada").expect("heal");
    assert_eq!(healed.restored, 5);
    assert_eq!(healed.health, 40);
    assert_eq!(healed.max_health, 40);
    assert_eq!(healed.mana, 0);

    world
        .apply_damage_from_npc(&start, "Ogre", "Ada", 5)
        .expect("wound again");
    let err = world.cast_heal("Ada").expect_err("out of mana");
    assert!(matches!(
        err,
        WorldError::NotEnoughMana { spell: "heal", cost: 10, mana: 0 }
    ));
    assert_eq!(err.kind(), ErrorKind::State);
    let ada = world.active_player("Ada").expect("online");
    assert_eq!(ada.health, 35);
    assert_eq!(ada.mana, 0);
}

#[test]
fn bolt_spends_mana_only_when_it_lands() {
    let world = world();
    let start = RoomId::from("start");
    let _rx = seasoned(&world, "Ada");
    assert_eq!(world.active_player("Ada").expect("online").mana, 18);

    assert!(matches!(
        world.cast_bolt("Ada", "nobody"),
        Err(WorldError::NotHere(_))
    ));
    assert!(matches!(world.cast_bolt("Ada", "  "), Err(WorldError::Empty(_))));
    assert!(matches!(world.cast_bolt("Ada", "ada"), Err(WorldError::SelfTarget)));
    assert_eq!(world.active_player("Ada").expect("online").mana, 18);

    match world.cast_bolt("Ada", "ogre").expect("bolt") {
        BoltOutcome::Npc {
            result,
            experience,
            levels_gained,
        } => {
            assert_eq!(result.damage, 19);
            assert_eq!(result.npc.health, 21);
            assert!(!result.defeated);
            assert_eq!(experience, 0);
            assert_eq!(levels_gained, 0);
        }
        other => panic!("expected an NPC hit, got {:?}", other),
    }
    assert_eq!(world.active_player("Ada").expect("online").mana, 3);

    assert!(matches!(
        world.cast_bolt("Ada", "ogre"),
        Err(WorldError::NotEnoughMana { spell: "bolt", mana: 3, .. })
    ));
    let ogre = world
        .room_npcs(&start)
        .into_iter()
        .find(|n| n.name == "Ogre")
        .expect("ogre");
    assert_eq!(ogre.health, 21);
}

#[test]
fn bolt_kill_awards_experience_and_drops_loot() {
    let world = world();
    let start = RoomId::from("start");
    let mut rx = seasoned(&world, "Ada");

    match world.cast_bolt("Ada", "rat").expect("bolt") {
        BoltOutcome::Npc {
            result, experience, ..
        } => {
            assert!(result.defeated);
            assert_eq!(result.damage, 10);
            assert_eq!(experience, 25);
        }
        other => panic!("expected an NPC hit, got {:?}", other),
    }
    assert_eq!(world.active_player("Ada").expect("online").experience, 25);
    let floor: Vec<String> = world.room_items(&start).into_iter().map(|i| i.name).collect();
    assert_eq!(floor, vec!["rat tail"]);
    let seen = lines(&mut rx);
    assert!(seen.iter().any(|l| l == "Your magic fells Rat!"));
    assert!(seen.iter().any(|l| l == "You gain 25 experience."));
}

#[test]
fn bolt_falls_back_to_players() {
    let world = world();
    let _ada = seasoned(&world, "Ada");
    let mut bea = world
        .add_player("Bea", None, false, PlayerProfile::default())
        .expect("login");

    match world.cast_bolt("Ada", "be").expect("bolt") {
        BoltOutcome::Player(result) => {
            assert_eq!(result.target, "Bea");
            assert_eq!(result.damage, 19);
            assert_eq!(result.remaining, 21);
            assert!(!result.defeated);
        }
        other => panic!("expected a player hit, got {:?}", other),
    }
    let seen = lines(&mut bea);
    assert!(seen
        .iter()
        .any(|l| l == "Ada's bolt burns you for 19 damage! (21/40 HP)"));
    assert_eq!(world.active_player("Bea").expect("online").health, 21);
}

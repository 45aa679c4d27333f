//! Per-room combat scheduling, driven on a paused tokio clock.

use lumenmud::world::{
    CombatTarget, ErrorKind, Item, Npc, PlayerProfile, Room, RoomId, World, WorldError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;

const ROUND: Duration = Duration::from_millis(100);

fn rat() -> Npc {
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

fn arena(max_instances: usize) -> Arc<World> {
    World::builder()
        .with_room(
            Room::new("start", "Start", "")
                .with_exit("east", "pit")
                .with_npc(rat()),
        )
        .with_room(
            Room::new("pit", "Pit", "")
                .with_exit("west", "start")
                .with_npc(Npc::new("Troll").with_level(5)),
        )
        .round_interval(ROUND)
        .max_combat_instances(max_instances)
        .outbound_buffer(64)
        .build()
        .expect("world")
}

fn drain(rx: &mut Receiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    lines
}

#[tokio::test(start_paused = true)]
async fn npc_fight_ends_with_defeat_and_loot() {
    let world = arena(0);
    let start = RoomId::from("start");
    let mut rx = world
        .add_player("Ada", None, false, PlayerProfile::default())
        .expect("login");

    let target = world.start_combat("Ada", "rat").expect("attack");
    assert_eq!(target, CombatTarget::Npc("Rat".into()));
    assert_eq!(world.active_combat_rooms(), vec![start.clone()]);
    assert_eq!(world.combat_target("Ada"), Some(target));

    tokio::time::sleep(ROUND * 5).await;

    assert!(world.active_combat_rooms().is_empty());
    assert!(world.room_npcs(&start).is_empty());
    let items: Vec<String> = world.room_items(&start).into_iter().map(|i| i.name).collect();
    assert_eq!(items, vec!["rat tail"]);

    let ada = world.active_player("Ada").expect("online");
    assert_eq!(ada.experience, 25);
    assert!(ada.health > 0);

    let lines = drain(&mut rx);
    assert!(lines.iter().any(|l| l.starts_with("You strike Rat for")));
    assert!(lines.iter().any(|l| l == "You defeat Rat!"));
    assert!(lines.iter().any(|l| l == "You gain 25 experience."));
}

#[tokio::test(start_paused = true)]
async fn player_fight_ends_with_respawn_at_home() {
    let world = arena(0);
    let _a = world
        .add_player("Ada", None, false, PlayerProfile::default())
        .expect("login");
    let mut bob_rx = world
        .add_player("Bob", None, false, PlayerProfile::default())
        .expect("login");
    world.move_player("Ada", "east").expect("move");
    world.move_player("Bob", "east").expect("move");

    let target = world.start_combat("Ada", "bob").expect("attack");
    assert_eq!(target, CombatTarget::Player("Bob".into()));

    tokio::time::sleep(ROUND * 12).await;

    assert!(world.active_combat_rooms().is_empty());
    let bob = world.active_player("Bob").expect("online");
    assert_eq!(bob.room.as_str(), "start");
    assert_eq!(bob.health, bob.max_health);
    let lines = drain(&mut bob_rx);
    assert!(lines.iter().any(|l| l == "You have been defeated by Ada!"));
}

#[tokio::test(start_paused = true)]
async fn leaving_the_room_ends_the_fight() {
    let world = arena(0);
    let pit = RoomId::from("pit");
    let _a = world
        .add_player("Ada", None, false, PlayerProfile::default())
        .expect("login");
    world.move_player("Ada", "east").expect("move");
    world.start_combat("Ada", "troll").expect("attack");
    world.move_player("Ada", "west").expect("flee");

    tokio::time::sleep(ROUND * 3).await;

    assert!(world.active_combat_rooms().is_empty());
    let troll = &world.room_npcs(&pit)[0];
    assert_eq!(troll.health, troll.max_health);
    assert_eq!(world.active_player("Ada").expect("online").health, 40);
}

#[tokio::test(start_paused = true)]
async fn stop_combat_halts_rounds() {
    let world = arena(0);
    let start = RoomId::from("start");
    let _a = world
        .add_player("Ada", None, false, PlayerProfile::default())
        .expect("login");
    world.start_combat("Ada", "rat").expect("attack");
    let instance = world.combat_instance(&start).expect("running");

    assert!(world.stop_combat(&start));
    assert!(!world.stop_combat(&start));
    assert!(instance.is_stopped());

    tokio::time::sleep(ROUND * 5).await;
    assert_eq!(world.room_npcs(&start)[0].health, 10);
}

#[tokio::test(start_paused = true)]
async fn second_attack_joins_running_instance() {
    let world = arena(1);
    let start = RoomId::from("start");
    let _a = world
        .add_player("Ada", None, false, PlayerProfile::default())
        .expect("login");
    let _b = world
        .add_player("Bea", None, false, PlayerProfile::default())
        .expect("login");
    world.start_combat("Ada", "rat").expect("attack");
    let first = world.combat_instance(&start).expect("running");
    world.start_combat("Bea", "rat").expect("join");
    let second = world.combat_instance(&start).expect("running");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(world.active_combat_rooms().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn instance_cap_rejects_new_fights() {
    let world = arena(1);
    let _a = world
        .add_player("Ada", None, false, PlayerProfile::default())
        .expect("login");
    let _b = world
        .add_player("Bea", None, false, PlayerProfile::default())
        .expect("login");
    world.move_player("Bea", "east").expect("move");
    world.start_combat("Ada", "rat").expect("attack");
    let err = world.start_combat("Bea", "troll").expect_err("capped");
    assert!(matches!(err, WorldError::CombatCapacity));
    assert_eq!(err.kind(), ErrorKind::State);
}

#[tokio::test]
async fn invalid_targets_are_rejected() {
    let world = arena(0);
    let _a = world
        .add_player("Ada", None, false, PlayerProfile::default())
        .expect("login");
    assert!(matches!(world.start_combat("Ada", "ada"), Err(WorldError::SelfTarget)));
    assert!(matches!(world.start_combat("Ada", "troll"), Err(WorldError::NotHere(_))));
    assert!(matches!(world.start_combat("Ada", "  "), Err(WorldError::Empty(_))));
    assert!(matches!(world.start_combat("Nobody", "rat"), Err(WorldError::NotOnline(_))));
    assert!(world.active_combat_rooms().is_empty());
}

#[test]
fn combat_needs_a_runtime() {
    let world = arena(0);
    let _a = world
        .add_player("Ada", None, false, PlayerProfile::default())
        .expect("login");
    assert!(matches!(
        world.start_combat("Ada", "rat"),
        Err(WorldError::CombatUnavailable)
    ));
    assert!(world.active_combat_rooms().is_empty());
}

#[test]
fn damage_is_clamped_and_defeat_respawns() {
    let world = arena(0);
    let start = RoomId::from("start");
    let pit = RoomId::from("pit");
    let _a = world
        .add_player("Ada", None, false, PlayerProfile::default())
        .expect("login");

    let hit = world.apply_damage_to_npc(&start, "Rat", 0).expect("hit");
    assert_eq!(hit.damage, 1);
    assert_eq!(hit.npc.health, 9);
    assert!(!hit.defeated);

    let kill = world.apply_damage_to_npc(&start, "rat", 500).expect("kill");
    assert_eq!(kill.damage, 9);
    assert!(kill.defeated);
    assert_eq!(kill.loot.len(), 1);
    assert!(world.room_npcs(&start).is_empty());

    world.move_player("Ada", "east").expect("move");
    let hurt = world
        .apply_damage_from_npc(&pit, "Troll", "Ada", 1000)
        .expect("hurt");
    assert_eq!(hurt.damage, 40);
    assert!(hurt.defeated);
    assert_eq!(hurt.previous_room, pit);
    assert_eq!(hurt.respawn_room, Some(start.clone()));
    let ada = world.active_player("Ada").expect("online");
    assert_eq!(ada.room, start);
    assert_eq!(ada.health, ada.max_health);

    assert!(matches!(
        world.apply_damage_to_player("Ada", "Ada", 5),
        Err(WorldError::SelfTarget)
    ));
}

#[test]
fn experience_carries_over_levels() {
    let world = arena(0);
    let _a = world
        .add_player("Ada", None, false, PlayerProfile::default())
        .expect("login");
    assert_eq!(world.award_experience("Ada", 350).expect("award"), 2);
    let ada = world.active_player("Ada").expect("online");
    assert_eq!(ada.level, 3);
    assert_eq!(ada.experience, 50);
    assert_eq!(ada.max_health, 56);
    assert_eq!(ada.health, 56);
}

fn troll_fight_with_two_attackers(world: &Arc<World>) -> (Receiver<String>, Receiver<String>) {
    let ada = world
        .add_player("Ada", None, false, PlayerProfile::default())
        .expect("login");
    let bea = world
        .add_player("Bea", None, false, PlayerProfile::default())
        .expect("login");
    world.move_player("Ada", "east").expect("move");
    world.move_player("Bea", "east").expect("move");
    world.start_combat("Ada", "troll").expect("attack");
    world.start_combat("Bea", "troll").expect("join");
    let pit = RoomId::from("pit");
    let instance = world.combat_instance(&pit).expect("running");
    assert_eq!(instance.npc_target("Troll").as_deref(), Some("Ada"));
    (ada, bea)
}

#[tokio::test(start_paused = true)]
async fn npc_turns_on_remaining_attacker_when_target_flees() {
    let world = arena(0);
    let pit = RoomId::from("pit");
    let _rx = troll_fight_with_two_attackers(&world);

    world.move_player("Ada", "west").expect("flee");
    tokio::time::sleep(ROUND + ROUND / 2).await;

    let instance = world.combat_instance(&pit).expect("still running");
    assert_eq!(instance.npc_target("Troll").as_deref(), Some("Bea"));
    assert_eq!(instance.player_target("Ada"), None);
    let ada = world.active_player("Ada").expect("online");
    assert_eq!(ada.health, ada.max_health);

    tokio::time::sleep(ROUND).await;
    let bea = world.active_player("Bea").expect("online");
    assert!(bea.health < bea.max_health);
    world.stop_combat(&pit);
}

#[tokio::test(start_paused = true)]
async fn npc_turns_on_remaining_attacker_when_target_disconnects() {
    let world = arena(0);
    let pit = RoomId::from("pit");
    let _rx = troll_fight_with_two_attackers(&world);

    world.remove_player("Ada");
    tokio::time::sleep(ROUND + ROUND / 2).await;

    let instance = world.combat_instance(&pit).expect("still running");
    assert_eq!(instance.npc_target("Troll").as_deref(), Some("Bea"));
    world.stop_combat(&pit);
    assert!(instance.is_stopped());
}

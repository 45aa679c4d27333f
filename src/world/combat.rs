//! Per-room combat scheduling.
//!
//! The first hostile action in a room creates a [`CombatInstance`] and spawns
//! a tokio task for it. Every round the task snapshots the attacker/target
//! pairs, releases the instance lock, and resolves each action through the
//! ordinary [`World`] operations, one at a time. Rounds in different rooms are
//! independent; only individual actions are atomic.
//!
//! Lock order is world, then instance. The round loop never holds the
//! instance lock while it calls into the world, and the decision to shut an
//! instance down is made under the world write lock, the same lock a new
//! attack takes to join an instance. An attack therefore either joins a live
//! instance or starts a fresh one.

use log::{debug, info};
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::world::errors::WorldError;
use crate::world::matching::unique_match;
use crate::world::player::player_attack_damage;
use crate::world::quest::QuestProgressUpdate;
use crate::world::state::{World, WorldState};
use crate::world::types::{default_npc_experience, Item, Npc, PlayerProfile, RoomId};

/// What a player is attacking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CombatTarget {
    Npc(String),
    Player(String),
}

impl CombatTarget {
    pub fn name(&self) -> &str {
        match self {
            CombatTarget::Npc(name) | CombatTarget::Player(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CombatAction {
    Player { attacker: String, target: CombatTarget },
    Npc { attacker: String, target: String },
}

#[derive(Debug, Default)]
struct Pairings {
    player_targets: HashMap<String, CombatTarget>,
    /// NPC name to the player it is fighting back against.
    npc_targets: HashMap<String, String>,
}

/// Hostilities in one room.
#[derive(Debug)]
pub struct CombatInstance {
    room: RoomId,
    pairs: Mutex<Pairings>,
    stopped: AtomicBool,
    stop_tx: watch::Sender<bool>,
}

impl CombatInstance {
    fn new(room: RoomId) -> (Arc<Self>, watch::Receiver<bool>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let instance = Arc::new(Self {
            room,
            pairs: Mutex::new(Pairings::default()),
            stopped: AtomicBool::new(false),
            stop_tx,
        });
        (instance, stop_rx)
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    fn pairs(&self) -> MutexGuard<'_, Pairings> {
        self.pairs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask the round loop to exit. Only the first call has any effect.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            let _ = self.stop_tx.send(true);
            debug!("Combat in {} stopped", self.room);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn engage_player(&self, attacker: &str, target: CombatTarget) {
        self.pairs()
            .player_targets
            .insert(attacker.to_string(), target);
    }

    /// An NPC keeps its first opponent until that opponent is gone.
    fn engage_npc(&self, npc: &str, player: &str) {
        self.pairs()
            .npc_targets
            .entry(npc.to_string())
            .or_insert_with(|| player.to_string());
    }

    fn clear_player(&self, name: &str) {
        self.pairs().player_targets.remove(name);
    }

    fn clear_npc(&self, name: &str) {
        self.pairs().npc_targets.remove(name);
    }

    /// Point `npc` at another player attacker, preferring one who is
    /// attacking it. Clears its target when nobody is left.
    fn retarget_npc(&self, npc: &str, lost: &str) -> bool {
        let mut pairs = self.pairs();
        let mut candidates: Vec<(&String, &CombatTarget)> = pairs
            .player_targets
            .iter()
            .filter(|(name, _)| name.as_str() != lost)
            .collect();
        candidates.sort_by_key(|(name, target)| {
            let attacking_npc = matches!(target, CombatTarget::Npc(n) if n.eq_ignore_ascii_case(npc));
            (!attacking_npc, (*name).clone())
        });
        match candidates.first().map(|(name, _)| (*name).clone()) {
            Some(next) => {
                pairs.npc_targets.insert(npc.to_string(), next);
                true
            }
            None => {
                pairs.npc_targets.remove(npc);
                false
            }
        }
    }

    /// Remove every pairing that involves the named player.
    fn forget_player(&self, name: &str) {
        let mut pairs = self.pairs();
        pairs.player_targets.remove(name);
        pairs
            .player_targets
            .retain(|_, target| !matches!(target, CombatTarget::Player(p) if p == name));
    }

    fn snapshot_actions(&self) -> Vec<CombatAction> {
        let pairs = self.pairs();
        let mut players: Vec<CombatAction> = pairs
            .player_targets
            .iter()
            .map(|(attacker, target)| CombatAction::Player {
                attacker: attacker.clone(),
                target: target.clone(),
            })
            .collect();
        let mut npcs: Vec<CombatAction> = pairs
            .npc_targets
            .iter()
            .map(|(attacker, target)| CombatAction::Npc {
                attacker: attacker.clone(),
                target: target.clone(),
            })
            .collect();
        let key = |action: &CombatAction| match action {
            CombatAction::Player { attacker, .. } | CombatAction::Npc { attacker, .. } => attacker.clone(),
        };
        players.sort_by_key(key);
        npcs.sort_by_key(key);
        players.extend(npcs);
        players
    }

    /// Whether another round is warranted: some player is still attacking
    /// and either an NPC is still fighting back or a player is the target.
    fn has_hostilities(&self) -> bool {
        let pairs = self.pairs();
        if pairs.player_targets.is_empty() {
            return false;
        }
        !pairs.npc_targets.is_empty()
            || pairs
                .player_targets
                .values()
                .any(|target| matches!(target, CombatTarget::Player(_)))
    }

    pub fn player_target(&self, name: &str) -> Option<CombatTarget> {
        self.pairs().player_targets.get(name).cloned()
    }

    pub fn npc_target(&self, npc: &str) -> Option<String> {
        self.pairs().npc_targets.get(npc).cloned()
    }
}

async fn run_instance(
    world: Weak<World>,
    instance: Arc<CombatInstance>,
    mut stop_rx: watch::Receiver<bool>,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop_rx.changed() => break,
        }
        if instance.is_stopped() {
            break;
        }
        let Some(shared) = world.upgrade() else {
            break;
        };
        shared.resolve_round(&instance);
        if shared.finish_combat(&instance) {
            break;
        }
    }
    debug!("Combat loop for {} exited", instance.room());
}

#[derive(Debug, Clone)]
pub struct NpcDamageResult {
    /// The NPC after the blow (health 0 when defeated).
    pub npc: Npc,
    pub damage: u32,
    pub defeated: bool,
    /// Items dropped into the room on defeat.
    pub loot: Vec<Item>,
}

#[derive(Debug, Clone)]
pub struct PlayerDamageResult {
    pub target: String,
    pub damage: u32,
    /// Health left after the blow; 0 when defeated.
    pub remaining: u32,
    pub max_health: u32,
    pub defeated: bool,
    /// Where the blow landed.
    pub previous_room: RoomId,
    /// Where a defeated player woke up.
    pub respawn_room: Option<RoomId>,
}

fn clamp_damage(requested: u32, health: u32) -> u32 {
    requested.max(1).min(health)
}

pub(crate) fn format_kill_updates(updates: &[QuestProgressUpdate]) -> Vec<String> {
    let mut lines = Vec::new();
    for update in updates {
        for kill in &update.kill_progress {
            lines.push(format!(
                "Quest {}: {} defeated ({}/{}).",
                update.quest.name, kill.npc, kill.current, kill.required
            ));
        }
        if update.kills_completed {
            lines.push(format!(
                "Quest {}: all foes defeated. Return to {}.",
                update.quest.name, update.quest.turn_in
            ));
        }
    }
    lines
}

/// Clamp and apply `damage` to the first NPC in `room` named `npc`.
pub(crate) fn strike_npc(
    state: &mut WorldState,
    room: &RoomId,
    npc: &str,
    damage: u32,
) -> Result<NpcDamageResult, WorldError> {
    let target_room = state.room_mut(room)?;
    let idx = target_room
        .npcs
        .iter()
        .position(|n| n.is_named(npc))
        .ok_or_else(|| WorldError::NotHere(npc.trim().to_string()))?;
    let target = &mut target_room.npcs[idx];
    target.ensure_stats();
    let applied = clamp_damage(damage, target.health);
    target.health -= applied;
    let defeated = target.health == 0;

    if !defeated {
        return Ok(NpcDamageResult {
            npc: target.clone(),
            damage: applied,
            defeated,
            loot: Vec::new(),
        });
    }

    let mut fallen = target_room.npcs.remove(idx);
    let loot = std::mem::take(&mut fallen.loot);
    target_room.items.extend(loot.iter().cloned());
    if let Some(instance) = state.combat.get(room) {
        instance.clear_npc(&fallen.name);
    }
    info!("{} was defeated in {}", fallen.name, room);
    Ok(NpcDamageResult {
        npc: fallen,
        damage: applied,
        defeated,
        loot,
    })
}

impl World {
    /// Begin (or redirect) an attack by `attacker` on the NPC or player named
    /// by `token` in the attacker's room. Starts the room's combat loop if
    /// none is running.
    pub fn start_combat(self: &Arc<Self>, attacker: &str, token: &str) -> Result<CombatTarget, WorldError> {
        if token.trim().is_empty() {
            return Err(WorldError::Empty("target"));
        }
        let mut state = self.write();
        let player = state.online(attacker)?;
        let room_id = player.room.clone();
        if token.trim().eq_ignore_ascii_case(&player.name) {
            return Err(WorldError::SelfTarget);
        }
        let room = state.room(&room_id)?;
        let target = match unique_match(token, &room.npc_names(), true) {
            Some(idx) => CombatTarget::Npc(room.npcs[idx].name.clone()),
            None => {
                let others: Vec<&str> = state
                    .alive_players()
                    .filter(|p| p.room == room_id && p.name != attacker)
                    .map(|p| p.name.as_str())
                    .collect();
                let idx = unique_match(token, &others, false)
                    .ok_or_else(|| WorldError::NotHere(token.trim().to_string()))?;
                CombatTarget::Player(others[idx].to_string())
            }
        };

        let existing = state
            .combat
            .get(&room_id)
            .filter(|instance| !instance.is_stopped())
            .cloned();
        let instance = match existing {
            Some(instance) => instance,
            None => {
                let max = self.settings.max_combat_instances;
                if max > 0 && state.combat.len() >= max {
                    return Err(WorldError::CombatCapacity);
                }
                let handle = tokio::runtime::Handle::try_current()
                    .map_err(|_| WorldError::CombatUnavailable)?;
                let (instance, stop_rx) = CombatInstance::new(room_id.clone());
                handle.spawn(run_instance(
                    Arc::downgrade(self),
                    Arc::clone(&instance),
                    stop_rx,
                    self.settings.round_interval,
                ));
                state.combat.insert(room_id.clone(), Arc::clone(&instance));
                debug!("Combat started in {}", room_id);
                instance
            }
        };

        instance.engage_player(attacker, target.clone());
        if let CombatTarget::Npc(npc) = &target {
            instance.engage_npc(npc, attacker);
        }
        Ok(target)
    }

    /// Rooms with a running combat instance, sorted.
    pub fn active_combat_rooms(&self) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self.read().combat.keys().cloned().collect();
        rooms.sort();
        rooms
    }

    pub fn combat_instance(&self, room: &RoomId) -> Option<Arc<CombatInstance>> {
        self.read().combat.get(room).cloned()
    }

    /// What `player` is currently attacking, if anything.
    pub fn combat_target(&self, player: &str) -> Option<CombatTarget> {
        let state = self.read();
        let room = &state.players.get(player)?.room;
        state.combat.get(room)?.player_target(player)
    }

    /// Stop and deregister the room's combat instance. Safe to call when no
    /// fight is running.
    pub fn stop_combat(&self, room: &RoomId) -> bool {
        let removed = self.write().combat.remove(room);
        match removed {
            Some(instance) => {
                instance.stop();
                true
            }
            None => false,
        }
    }

    /// Deregister `instance` if nothing hostile is left. Returns true when the
    /// loop should exit.
    pub(crate) fn finish_combat(&self, instance: &Arc<CombatInstance>) -> bool {
        let mut state = self.write();
        let registered = state
            .combat
            .get(instance.room())
            .is_some_and(|current| Arc::ptr_eq(current, instance));
        if !registered || instance.is_stopped() {
            instance.stop();
            return true;
        }
        if instance.has_hostilities() {
            return false;
        }
        state.combat.remove(instance.room());
        instance.stop();
        true
    }

    /// Strike the first NPC in `room` named `npc`. On defeat the NPC is
    /// removed, its loot drops into the room and its combat pairing ends.
    pub fn apply_damage_to_npc(&self, room: &RoomId, npc: &str, damage: u32) -> Result<NpcDamageResult, WorldError> {
        let mut state = self.write();
        strike_npc(&mut state, room, npc, damage)
    }

    /// Player versus player damage. Both must be online and in the same room.
    pub fn apply_damage_to_player(&self, attacker: &str, target: &str, damage: u32) -> Result<PlayerDamageResult, WorldError> {
        if attacker == target {
            return Err(WorldError::SelfTarget);
        }
        let room = {
            let state = self.read();
            state.online(attacker)?.room.clone()
        };
        self.damage_player(&room, target, damage)
    }

    /// Damage from the NPC `npc` in `room` to the player `target`.
    pub fn apply_damage_from_npc(&self, room: &RoomId, npc: &str, target: &str, damage: u32) -> Result<PlayerDamageResult, WorldError> {
        {
            let state = self.read();
            if !state.room(room)?.npcs.iter().any(|n| n.is_named(npc)) {
                return Err(WorldError::NotHere(npc.trim().to_string()));
            }
        }
        self.damage_player(room, target, damage)
    }

    /// Clamp and apply damage to a player standing in `room`. A defeated
    /// player wakes at home with full health and mana.
    fn damage_player(&self, room: &RoomId, target: &str, damage: u32) -> Result<PlayerDamageResult, WorldError> {
        let (result, pending) = {
            let mut state = self.write();
            self.wound_player(&mut state, room, target, damage)?
        };
        if let Some((account, profile)) = pending {
            self.save_profile(&account, &profile);
        }
        Ok(result)
    }

    /// The locked half of [`World::damage_player`]. Returns the profile to
    /// persist once the lock is released when the player was defeated.
    pub(crate) fn wound_player(
        &self,
        state: &mut WorldState,
        room: &RoomId,
        target: &str,
        damage: u32,
    ) -> Result<(PlayerDamageResult, Option<(String, PlayerProfile)>), WorldError> {
        let player = state
            .players
            .get_mut(target)
            .filter(|p| p.alive)
            .ok_or_else(|| WorldError::NotOnline(target.to_string()))?;
        if &player.room != room {
            return Err(WorldError::NotHere(target.to_string()));
        }
        player.ensure_stats();
        let applied = clamp_damage(damage, player.health);
        player.health -= applied;
        let mut result = PlayerDamageResult {
            target: player.name.clone(),
            damage: applied,
            remaining: player.health,
            max_health: player.max_health,
            defeated: player.health == 0,
            previous_room: room.clone(),
            respawn_room: None,
        };
        if !result.defeated {
            return Ok((result, None));
        }

        let home = if state.rooms.contains_key(&player.home) {
            player.home.clone()
        } else {
            self.settings.start_room.clone()
        };
        player.restore();
        player.room = home.clone();
        result.respawn_room = Some(home);
        if let Some(instance) = state.combat.get(room) {
            instance.forget_player(&player.name);
        }
        info!("{} was defeated in {}", player.name, room);
        Ok((result, Some(World::pending_profile(player))))
    }

    /// Grant experience; returns the number of levels gained.
    pub fn award_experience(&self, player: &str, amount: u32) -> Result<u32, WorldError> {
        let mut state = self.write();
        Ok(state.online_mut(player)?.gain_experience(amount))
    }

    /// Resolve every action from one snapshot of the instance's pairs.
    pub(crate) fn resolve_round(&self, instance: &CombatInstance) {
        let mut rng = rand::thread_rng();
        for action in instance.snapshot_actions() {
            match action {
                CombatAction::Player { attacker, target } => {
                    self.resolve_player_attack(instance, &attacker, &target, &mut rng)
                }
                CombatAction::Npc { attacker, target } => {
                    self.resolve_npc_attack(instance, &attacker, &target, &mut rng)
                }
            }
        }
    }

    fn resolve_player_attack<R: Rng>(&self, instance: &CombatInstance, name: &str, target: &CombatTarget, rng: &mut R) {
        let room = instance.room();
        let attacker = match self.active_player(name) {
            Some(attacker) if &attacker.room == room => attacker,
            _ => {
                instance.clear_player(name);
                return;
            }
        };
        let damage = player_attack_damage(attacker.level, rng);
        match target {
            CombatTarget::Npc(npc) => self.player_hits_npc(instance, name, npc, damage),
            CombatTarget::Player(other) => self.player_hits_player(instance, name, other, damage),
        }
    }

    fn player_hits_npc(&self, instance: &CombatInstance, name: &str, npc: &str, damage: u32) {
        let room = instance.room();
        let result = match self.apply_damage_to_npc(room, npc, damage) {
            Ok(result) => result,
            Err(e) => {
                self.send_to(name, &e.to_string());
                instance.clear_player(name);
                return;
            }
        };
        let npc_name = &result.npc.name;
        self.send_to(
            name,
            &format!(
                "You strike {} for {} damage. ({}/{} HP)",
                npc_name, result.damage, result.npc.health, result.npc.max_health
            ),
        );
        self.broadcast_to_room(
            room,
            &format!("{} strikes {} for {} damage.", name, npc_name, result.damage),
            Some(name),
        );
        if !result.defeated {
            return;
        }

        self.send_to(name, &format!("You defeat {}!", npc_name));
        self.broadcast_to_room(room, &format!("{} defeats {}!", name, npc_name), Some(name));

        let xp = if result.npc.experience > 0 {
            result.npc.experience
        } else {
            default_npc_experience(result.npc.level)
        };
        if let Ok(levels) = self.award_experience(name, xp) {
            self.send_to(name, &format!("You gain {} experience.", xp));
            if levels > 0 {
                if let Some(p) = self.active_player(name) {
                    self.send_to(name, &format!("You advance to level {}!", p.level));
                }
            }
        }
        if !result.loot.is_empty() {
            let names: Vec<&str> = result.loot.iter().map(|i| i.name.as_str()).collect();
            self.broadcast_to_room(
                room,
                &format!("{} leaves behind {}.", npc_name, names.join(", ")),
                None,
            );
        }
        for line in format_kill_updates(&self.record_npc_kill(name, npc_name)) {
            self.send_to(name, &line);
        }
        instance.clear_npc(npc_name);
        instance.clear_player(name);
    }

    fn player_hits_player(&self, instance: &CombatInstance, name: &str, other: &str, damage: u32) {
        let result = match self.apply_damage_to_player(name, other, damage) {
            Ok(result) => result,
            Err(e) => {
                self.send_to(name, &e.to_string());
                instance.clear_player(name);
                return;
            }
        };
        self.broadcast_except(
            &result.previous_room,
            &format!("{} strikes {} for {} damage.", name, other, result.damage),
            &[name, other],
        );
        if result.defeated {
            self.send_to(name, &format!("You defeat {}!", other));
            self.send_to(other, &format!("You have been defeated by {}!", name));
            self.broadcast_except(
                &result.previous_room,
                &format!("{} collapses in defeat!", other),
                &[name, other],
            );
            instance.clear_player(other);
            instance.clear_player(name);
            return;
        }
        self.send_to(
            name,
            &format!(
                "You strike {} for {} damage. ({}/{} HP)",
                other, result.damage, result.remaining, result.max_health
            ),
        );
        self.send_to(
            other,
            &format!(
                "{} strikes you for {} damage. ({}/{} HP)",
                name, result.damage, result.remaining, result.max_health
            ),
        );
    }

    fn resolve_npc_attack<R: Rng>(&self, instance: &CombatInstance, npc_name: &str, target: &str, rng: &mut R) {
        let room = instance.room();
        let Some(npc) = self.room_npc_named(room, npc_name) else {
            instance.clear_npc(npc_name);
            return;
        };
        let damage = npc.attack_damage(rng);

        let present = self
            .active_player(target)
            .is_some_and(|p| &p.room == room);
        if !present {
            instance.retarget_npc(npc_name, target);
            return;
        }
        let result = match self.apply_damage_from_npc(room, &npc.name, target, damage) {
            Ok(result) => result,
            Err(_) => {
                instance.retarget_npc(npc_name, target);
                return;
            }
        };

        self.broadcast_to_room(
            room,
            &format!("{} strikes {} for {} damage.", npc.name, target, result.damage),
            Some(target),
        );
        self.send_to(
            target,
            &format!(
                "{} strikes you for {} damage. ({}/{} HP)",
                npc.name, result.damage, result.remaining, result.max_health
            ),
        );
        if result.defeated {
            self.send_to(target, &format!("You have been defeated by {}!", npc.name));
            self.broadcast_to_room(room, &format!("{} collapses in defeat!", target), Some(target));
            instance.clear_player(target);
            instance.retarget_npc(npc_name, target);
        }
    }

    fn room_npc_named(&self, room: &RoomId, name: &str) -> Option<Npc> {
        self.read()
            .rooms
            .get(room)?
            .npcs
            .iter()
            .find(|npc| npc.is_named(name))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_is_clamped_to_health() {
        assert_eq!(clamp_damage(50, 12), 12);
        assert_eq!(clamp_damage(5, 12), 5);
        assert_eq!(clamp_damage(0, 12), 1);
        assert_eq!(clamp_damage(3, 0), 0);
    }

    #[test]
    fn stop_is_idempotent() {
        let (instance, rx) = CombatInstance::new(RoomId::from("arena"));
        instance.stop();
        instance.stop();
        assert!(instance.is_stopped());
        assert!(*rx.borrow());
    }

    #[test]
    fn npc_keeps_first_opponent() {
        let (instance, _rx) = CombatInstance::new(RoomId::from("arena"));
        instance.engage_npc("Wolf", "Ada");
        instance.engage_npc("Wolf", "Bea");
        assert_eq!(instance.npc_target("Wolf").as_deref(), Some("Ada"));
    }

    #[test]
    fn retarget_prefers_players_attacking_the_npc() {
        let (instance, _rx) = CombatInstance::new(RoomId::from("arena"));
        instance.engage_player("Ada", CombatTarget::Npc("Wolf".into()));
        instance.engage_player("Bea", CombatTarget::Npc("Bear".into()));
        instance.engage_player("Cy", CombatTarget::Npc("Wolf".into()));
        instance.engage_npc("Wolf", "Ada");
        assert!(instance.retarget_npc("Wolf", "Ada"));
        assert_eq!(instance.npc_target("Wolf").as_deref(), Some("Cy"));

        instance.clear_player("Bea");
        instance.clear_player("Cy");
        assert!(!instance.retarget_npc("Wolf", "Ada"));
        assert!(instance.npc_target("Wolf").is_none());
    }

    #[test]
    fn hostilities_follow_termination_rule() {
        let (instance, _rx) = CombatInstance::new(RoomId::from("arena"));
        assert!(!instance.has_hostilities());
        instance.engage_player("Ada", CombatTarget::Npc("Wolf".into()));
        assert!(!instance.has_hostilities());
        instance.engage_npc("Wolf", "Ada");
        assert!(instance.has_hostilities());
        instance.clear_player("Ada");
        assert!(!instance.has_hostilities());
        instance.engage_player("Ada", CombatTarget::Player("Bea".into()));
        instance.clear_npc("Wolf");
        assert!(instance.has_hostilities());
    }

    #[test]
    fn kill_updates_are_rendered() {
        use crate::world::quest::{Quest, QuestKillProgress};
        let update = QuestProgressUpdate {
            quest: Arc::new(Quest {
                name: "Pest Control".into(),
                turn_in: "Guide".into(),
                ..Quest::default()
            }),
            kill_progress: vec![QuestKillProgress {
                npc: "Rat".into(),
                current: 2,
                required: 2,
            }],
            kills_completed: true,
        };
        let lines = format_kill_updates(&[update]);
        assert_eq!(lines[0], "Quest Pest Control: Rat defeated (2/2).");
        assert!(lines[1].contains("Return to Guide"));
    }
}

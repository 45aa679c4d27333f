//! The authoritative world model.
//!
//! Every map lives inside one [`WorldState`] behind a single `RwLock`: pure
//! queries take the shared side, anything that mutates takes the exclusive
//! side for the whole logical operation. Player output is a non-blocking
//! queue send, so nothing here waits on a client while holding the lock.
//! Profile writes happen after the lock is released and are best-effort.

use log::{info, warn};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::world::channels::{Channel, ChannelMessage, ChannelSettings, CHANNEL_HISTORY_DEFAULT};
use crate::world::combat::CombatInstance;
use crate::world::errors::WorldError;
use crate::world::loader::{load_quests, load_rooms, read_quest_file, validate_exits, RoomSource};
use crate::world::matching::unique_match;
use crate::world::persistence::{DiscardRooms, JsonOverlayStore, ProfileStore, RoomPersistence};
use crate::world::player::{Outbound, Player, PlayerSnapshot, Takeover, TransportHandle, DEFAULT_OUTBOUND_BUFFER};
use crate::world::quest::{Quest, QuestCatalog};
use crate::world::resets::apply_resets;
use crate::world::types::{Item, Npc, PlayerProfile, Room, RoomId, DEFAULT_START_ROOM};

/// Default delay between combat rounds.
pub const DEFAULT_ROUND_INTERVAL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone)]
pub struct WorldSettings {
    pub areas_path: Option<PathBuf>,
    pub builder_overlay: Option<PathBuf>,
    pub quests_path: Option<PathBuf>,
    pub start_room: RoomId,
    pub round_interval: Duration,
    /// Upper bound on simultaneously running combat instances; 0 means no limit.
    pub max_combat_instances: usize,
    pub outbound_buffer: usize,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            areas_path: None,
            builder_overlay: None,
            quests_path: None,
            start_room: RoomId::from(DEFAULT_START_ROOM),
            round_interval: DEFAULT_ROUND_INTERVAL,
            max_combat_instances: 0,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct WorldState {
    pub(crate) rooms: HashMap<RoomId, Room>,
    pub(crate) sources: HashMap<RoomId, RoomSource>,
    /// Hand-placed population per room, as its definition declares it.
    pub(crate) placed: HashMap<RoomId, Placed>,
    pub(crate) players: HashMap<String, Player>,
    /// Registration order, used wherever players are listed or matched.
    pub(crate) order: Vec<String>,
    pub(crate) quests: QuestCatalog,
    pub(crate) combat: HashMap<RoomId, Arc<CombatInstance>>,
}

impl WorldState {
    pub(crate) fn online(&self, name: &str) -> Result<&Player, WorldError> {
        self.players
            .get(name)
            .filter(|p| p.alive)
            .ok_or_else(|| WorldError::NotOnline(name.to_string()))
    }

    pub(crate) fn online_mut(&mut self, name: &str) -> Result<&mut Player, WorldError> {
        self.players
            .get_mut(name)
            .filter(|p| p.alive)
            .ok_or_else(|| WorldError::NotOnline(name.to_string()))
    }

    pub(crate) fn room(&self, id: &RoomId) -> Result<&Room, WorldError> {
        self.rooms
            .get(id)
            .ok_or_else(|| WorldError::UnknownRoom(id.clone()))
    }

    pub(crate) fn room_mut(&mut self, id: &RoomId) -> Result<&mut Room, WorldError> {
        self.rooms
            .get_mut(id)
            .ok_or_else(|| WorldError::UnknownRoom(id.clone()))
    }

    /// Alive players in registration order.
    pub(crate) fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.order
            .iter()
            .filter_map(|name| self.players.get(name))
            .filter(|p| p.alive)
    }

    /// Definitions of every builder-sourced room: live NPCs and floor items
    /// are swapped for the room's hand-placed population.
    pub(crate) fn builder_rooms(&self) -> Vec<Room> {
        self.sources
            .iter()
            .filter(|(_, source)| source.is_builder())
            .filter_map(|(id, _)| {
                let room = self.rooms.get(id)?;
                Some(match self.placed.get(id) {
                    Some(placed) => placed.definition(room),
                    None => Placed::default().definition(room),
                })
            })
            .collect()
    }
}

/// NPCs and items a room definition places by hand. Reset spawns, loot and
/// player drops are live population and never part of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Placed {
    pub(crate) npcs: Vec<Npc>,
    pub(crate) items: Vec<Item>,
}

impl Placed {
    pub(crate) fn of(room: &Room) -> Self {
        Self {
            npcs: room.npcs.iter().cloned().map(Npc::full_strength).collect(),
            items: room.items.clone(),
        }
    }

    /// Every room's placed population, taken before resets run.
    pub(crate) fn index(rooms: &HashMap<RoomId, Room>) -> HashMap<RoomId, Placed> {
        rooms
            .iter()
            .map(|(id, room)| (id.clone(), Self::of(room)))
            .collect()
    }

    pub(crate) fn definition(&self, room: &Room) -> Room {
        let mut definition = room.clone();
        definition.npcs = self.npcs.clone();
        definition.items = self.items.clone();
        definition
    }
}

/// Counts reported by [`World::summary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorldSummary {
    pub rooms: usize,
    pub builder_rooms: usize,
    pub npcs: usize,
    pub items: usize,
    pub resets: usize,
    pub quests: usize,
    pub players: usize,
    pub combats: usize,
}

/// Builder for [`World`], mirroring how stores are opened elsewhere in the
/// crate: configure, then `build()`.
#[derive(Debug, Default)]
pub struct WorldBuilder {
    settings: WorldSettings,
    rooms: Vec<Room>,
    quests: Vec<Quest>,
    persistence: Option<Arc<dyn RoomPersistence>>,
    profiles: Option<Arc<dyn ProfileStore>>,
}

impl WorldBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        let world = &config.world;
        let mut builder = Self::new()
            .areas_path(&world.areas_path)
            .start_room(world.start_room.as_str())
            .round_interval(Duration::from_millis(config.combat.round_ms))
            .max_combat_instances(config.combat.max_instances)
            .outbound_buffer(config.session.outbound_buffer);
        if let Some(overlay) = &world.builder_overlay {
            builder = builder.builder_overlay(overlay);
        }
        if let Some(quests) = &world.quests_path {
            builder = builder.quests_path(quests);
        }
        builder
    }

    pub fn areas_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.areas_path = Some(path.into());
        self
    }

    pub fn builder_overlay(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.builder_overlay = Some(path.into());
        self
    }

    pub fn quests_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.quests_path = Some(path.into());
        self
    }

    pub fn start_room(mut self, room: impl Into<RoomId>) -> Self {
        self.settings.start_room = room.into();
        self
    }

    pub fn round_interval(mut self, interval: Duration) -> Self {
        self.settings.round_interval = interval;
        self
    }

    pub fn max_combat_instances(mut self, max: usize) -> Self {
        self.settings.max_combat_instances = max;
        self
    }

    pub fn outbound_buffer(mut self, capacity: usize) -> Self {
        self.settings.outbound_buffer = capacity;
        self
    }

    /// Add a room defined in code instead of an area file.
    pub fn with_room(mut self, room: Room) -> Self {
        self.rooms.push(room);
        self
    }

    pub fn with_quest(mut self, quest: Quest) -> Self {
        self.quests.push(quest);
        self
    }

    pub fn room_persistence(mut self, persistence: Arc<dyn RoomPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn profile_store(mut self, store: Arc<dyn ProfileStore>) -> Self {
        self.profiles = Some(store);
        self
    }

    pub fn build(self) -> Result<Arc<World>, WorldError> {
        let settings = self.settings;
        let mut state = WorldState::default();

        if let Some(areas) = &settings.areas_path {
            let loaded = load_rooms(areas, settings.builder_overlay.as_deref())?;
            state.rooms = loaded.rooms;
            state.sources = loaded.sources;
        }
        for mut room in self.rooms {
            if room.id.is_empty() {
                return Err(WorldError::Empty("room id"));
            }
            if state.rooms.contains_key(&room.id) {
                return Err(WorldError::Load(format!("duplicate room id {}", room.id)));
            }
            for npc in &mut room.npcs {
                npc.ensure_stats();
            }
            state.sources.insert(room.id.clone(), RoomSource::Inline);
            state.rooms.insert(room.id.clone(), room);
        }
        if state.rooms.is_empty() {
            return Err(WorldError::Load("no rooms loaded".to_string()));
        }
        validate_exits(&state.rooms)?;
        if !state.rooms.contains_key(&settings.start_room) {
            return Err(WorldError::Load(format!(
                "start room {} does not exist",
                settings.start_room
            )));
        }

        state.placed = Placed::index(&state.rooms);
        for room in state.rooms.values_mut() {
            apply_resets(room);
        }

        let mut quests = match &settings.quests_path {
            Some(path) => read_quest_file(path)?,
            None => Vec::new(),
        };
        quests.extend(self.quests);
        state.quests = QuestCatalog::from_quests(quests);

        let persistence = match (self.persistence, &settings.builder_overlay) {
            (Some(p), _) => p,
            (None, Some(path)) => Arc::new(JsonOverlayStore::new(path.clone())) as Arc<dyn RoomPersistence>,
            (None, None) => Arc::new(DiscardRooms) as Arc<dyn RoomPersistence>,
        };

        info!(
            "World ready: {} rooms, {} quests, start room {}",
            state.rooms.len(),
            state.quests.len(),
            settings.start_room
        );
        Ok(Arc::new(World {
            state: RwLock::new(state),
            settings,
            persistence,
            profiles: self.profiles,
        }))
    }
}

/// Shared handle to the world. Command handlers and combat tasks call the
/// same operations; the internal lock serializes them.
#[derive(Debug)]
pub struct World {
    state: RwLock<WorldState>,
    pub(crate) settings: WorldSettings,
    pub(crate) persistence: Arc<dyn RoomPersistence>,
    profiles: Option<Arc<dyn ProfileStore>>,
}

impl World {
    pub fn builder() -> WorldBuilder {
        WorldBuilder::new()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, WorldState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, WorldState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn start_room(&self) -> &RoomId {
        &self.settings.start_room
    }

    /// Best-effort profile write. Never called with the world lock held.
    pub(crate) fn save_profile(&self, account: &str, profile: &PlayerProfile) {
        let Some(store) = &self.profiles else {
            return;
        };
        if let Err(e) = store.save_profile(account, profile) {
            warn!("Failed to persist profile for {}: {}", account, e);
        }
    }

    /// The stored profile for `account`, or the default if there is no store
    /// or the lookup fails.
    pub fn stored_profile(&self, account: &str) -> PlayerProfile {
        let Some(store) = &self.profiles else {
            return PlayerProfile::default();
        };
        store.profile(account).unwrap_or_else(|e| {
            warn!("Failed to load profile for {}: {}", account, e);
            PlayerProfile::default()
        })
    }

    pub(crate) fn pending_profile(player: &Player) -> (String, PlayerProfile) {
        (player.account.clone(), player.profile())
    }

    /// `room` if it exists, otherwise the start room.
    fn known_room(&self, state: &WorldState, room: Option<&RoomId>) -> RoomId {
        room.filter(|id| state.rooms.contains_key(*id))
            .cloned()
            .unwrap_or_else(|| self.settings.start_room.clone())
    }

    // ----- rooms -----

    pub fn room(&self, id: &RoomId) -> Option<Room> {
        self.read().rooms.get(id).cloned()
    }

    pub fn room_exists(&self, id: &RoomId) -> bool {
        self.read().rooms.contains_key(id)
    }

    /// All room ids, sorted.
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.read().rooms.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_builder_room(&self, id: &RoomId) -> bool {
        self.read()
            .sources
            .get(id)
            .is_some_and(RoomSource::is_builder)
    }

    pub fn summary(&self) -> WorldSummary {
        let state = self.read();
        WorldSummary {
            rooms: state.rooms.len(),
            builder_rooms: state.sources.values().filter(|s| s.is_builder()).count(),
            npcs: state.rooms.values().map(|r| r.npcs.len()).sum(),
            items: state.rooms.values().map(|r| r.items.len()).sum(),
            resets: state.rooms.values().map(|r| r.resets.len()).sum(),
            quests: state.quests.len(),
            players: state.alive_players().count(),
            combats: state.combat.len(),
        }
    }

    // ----- registry -----

    /// Register a connection for `name`, reactivating a disconnected record
    /// if one exists. Returns the receiving end of the player's output queue.
    pub fn add_player(
        &self,
        name: &str,
        transport: Option<TransportHandle>,
        is_admin: bool,
        profile: PlayerProfile,
    ) -> Result<mpsc::Receiver<String>, WorldError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WorldError::Empty("player name"));
        }
        let (output, rx) = Outbound::channel(self.settings.outbound_buffer);

        let pending = {
            let mut state = self.write();
            let state = &mut *state;
            if state
                .players
                .values()
                .any(|p| p.alive && p.name.eq_ignore_ascii_case(name))
            {
                return Err(WorldError::AlreadyConnected(name.to_string()));
            }

            let room = self.known_room(state, profile.room.as_ref());
            let home = self.known_room(state, profile.home.as_ref());

            if !state.players.contains_key(name) {
                state
                    .players
                    .insert(name.to_string(), Player::new(name, room.clone(), home.clone()));
                state.order.push(name.to_string());
            }
            let player = state
                .players
                .get_mut(name)
                .ok_or_else(|| WorldError::NotOnline(name.to_string()))?;
            player.room = room;
            player.home = home;
            player.channels = ChannelSettings::from_profile(&profile.channels, &profile.aliases);
            player.account = name.to_string();
            player.is_admin = is_admin;
            player.alive = true;
            player.output = Some(output);
            player.transport = transport;
            info!("{} entered the world in {}", name, player.room);
            Self::pending_profile(player)
        };

        self.save_profile(&pending.0, &pending.1);
        Ok(rx)
    }

    /// Deregister `name`. Dropping the record's output closes the player's
    /// queue; nothing is sent to it afterwards.
    pub fn remove_player(&self, name: &str) -> bool {
        let removed = {
            let mut state = self.write();
            let removed = state.players.remove(name);
            if removed.is_some() {
                state.order.retain(|n| n != name);
            }
            removed
        };
        match removed {
            Some(player) => {
                info!("{} left the world", player.name);
                let (account, profile) = Self::pending_profile(&player);
                drop(player);
                self.save_profile(&account, &profile);
                true
            }
            None => false,
        }
    }

    /// Detach the transport and output of a live session so another
    /// connection can claim the name. Room, stats and inventory are kept for
    /// the following [`World::add_player`].
    pub fn prepare_takeover(&self, name: &str) -> Option<Takeover> {
        let mut state = self.write();
        let player = state.players.get_mut(name).filter(|p| p.alive)?;
        player.alive = false;
        info!("{} is being taken over by a new connection", name);
        Some(Takeover {
            transport: player.transport.take(),
            output: player.output.take(),
        })
    }

    pub fn active_player(&self, name: &str) -> Option<PlayerSnapshot> {
        self.read().online(name).ok().map(Player::snapshot)
    }

    /// Snapshot of any registered record, connected or not.
    pub fn player_snapshot(&self, name: &str) -> Option<PlayerSnapshot> {
        self.read().players.get(name).map(Player::snapshot)
    }

    /// Resolve a (partial) player name among connected players.
    pub fn find_player(&self, token: &str) -> Option<String> {
        let state = self.read();
        let names: Vec<&str> = state.alive_players().map(|p| p.name.as_str()).collect();
        unique_match(token, &names, false).map(|idx| names[idx].to_string())
    }

    pub fn rename_player(&self, name: &str, new_name: &str) -> Result<(), WorldError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(WorldError::Empty("player name"));
        }
        let mut state = self.write();
        state.online(name)?;
        if new_name == name {
            return Ok(());
        }
        if state
            .players
            .keys()
            .any(|n| n != name && n.eq_ignore_ascii_case(new_name))
        {
            return Err(WorldError::NameTaken);
        }
        let mut player = state
            .players
            .remove(name)
            .ok_or_else(|| WorldError::NotOnline(name.to_string()))?;
        player.name = new_name.to_string();
        state.players.insert(new_name.to_string(), player);
        for entry in state.order.iter_mut() {
            if entry == name {
                *entry = new_name.to_string();
            }
        }
        info!("{} is now known as {}", name, new_name);
        Ok(())
    }

    pub fn set_builder(&self, name: &str, enabled: bool) -> Result<(), WorldError> {
        let mut state = self.write();
        state.online_mut(name)?.is_builder = enabled;
        Ok(())
    }

    /// Rate-limit check for a command `name` issues at `now`. Refused
    /// commands are not counted.
    pub fn allow_command(&self, name: &str, now: Instant) -> Result<bool, WorldError> {
        let mut state = self.write();
        Ok(state.online_mut(name)?.allow_command(now))
    }

    /// Connected player names in registration order, optionally limited to
    /// one room.
    pub fn list_players(&self, room_only: bool, room: &RoomId) -> Vec<String> {
        self.read()
            .alive_players()
            .filter(|p| !room_only || &p.room == room)
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn player_locations(&self) -> Vec<(String, RoomId)> {
        self.read()
            .alive_players()
            .map(|p| (p.name.clone(), p.room.clone()))
            .collect()
    }

    /// Write the player's current profile to the profile store.
    pub fn persist_player(&self, name: &str) {
        let pending = self.read().players.get(name).map(Self::pending_profile);
        if let Some((account, profile)) = pending {
            self.save_profile(&account, &profile);
        }
    }

    // ----- movement -----

    /// Resolve a (partial) direction among the room's exits.
    pub fn resolve_exit(&self, room: &RoomId, token: &str) -> Option<(String, RoomId)> {
        let state = self.read();
        let room = state.rooms.get(room)?;
        let dirs: Vec<&String> = room.exits.keys().collect();
        let idx = unique_match(token, &dirs, false)?;
        let dir = dirs[idx];
        Some((dir.clone(), room.exits[dir].clone()))
    }

    pub fn move_player(&self, name: &str, token: &str) -> Result<RoomId, WorldError> {
        let (target, pending) = {
            let mut state = self.write();
            let current = state.online(name)?.room.clone();
            let room = state.room(&current)?;
            let dirs: Vec<&String> = room.exits.keys().collect();
            let idx = unique_match(token, &dirs, false).ok_or(WorldError::NoSuchExit)?;
            let target = room.exits[dirs[idx]].clone();
            state.room(&target)?;
            let player = state.online_mut(name)?;
            player.room = target.clone();
            (target, Self::pending_profile(player))
        };
        self.save_profile(&pending.0, &pending.1);
        Ok(target)
    }

    pub fn move_to_room(&self, name: &str, room: &RoomId) -> Result<(), WorldError> {
        let pending = {
            let mut state = self.write();
            state.room(room)?;
            let player = state.online_mut(name)?;
            player.room = room.clone();
            Self::pending_profile(player)
        };
        self.save_profile(&pending.0, &pending.1);
        Ok(())
    }

    pub fn set_home(&self, name: &str, room: &RoomId) -> Result<(), WorldError> {
        let pending = {
            let mut state = self.write();
            state.room(room)?;
            let player = state.online_mut(name)?;
            player.home = room.clone();
            Self::pending_profile(player)
        };
        self.save_profile(&pending.0, &pending.1);
        Ok(())
    }

    /// Send the player back to their home room.
    pub fn recall(&self, name: &str) -> Result<RoomId, WorldError> {
        let (home, pending) = {
            let mut state = self.write();
            let home = state.online(name)?.home.clone();
            let home = if state.rooms.contains_key(&home) {
                home
            } else {
                self.settings.start_room.clone()
            };
            let player = state.online_mut(name)?;
            player.room = home.clone();
            (home, Self::pending_profile(player))
        };
        self.save_profile(&pending.0, &pending.1);
        Ok(home)
    }

    /// Distinct rooms reachable through one exit, sorted.
    pub fn adjacent_rooms(&self, room: &RoomId) -> Vec<RoomId> {
        let state = self.read();
        let Some(room) = state.rooms.get(room) else {
            return Vec::new();
        };
        room.exits
            .values()
            .filter(|target| *target != &room.id)
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    // ----- items and npcs -----

    pub fn take_item(&self, name: &str, token: &str) -> Result<Item, WorldError> {
        let mut state = self.write();
        let state = &mut *state;
        let player = state
            .players
            .get_mut(name)
            .filter(|p| p.alive)
            .ok_or_else(|| WorldError::NotOnline(name.to_string()))?;
        let room = state
            .rooms
            .get_mut(&player.room)
            .ok_or_else(|| WorldError::UnknownRoom(player.room.clone()))?;
        let idx = unique_match(token, &room.item_names(), true).ok_or(WorldError::ItemNotFound)?;
        let item = room.items.remove(idx);
        player.inventory.push(item.clone());
        Ok(item)
    }

    pub fn drop_item(&self, name: &str, token: &str) -> Result<Item, WorldError> {
        let mut state = self.write();
        let state = &mut *state;
        let player = state
            .players
            .get_mut(name)
            .filter(|p| p.alive)
            .ok_or_else(|| WorldError::NotOnline(name.to_string()))?;
        let room = state
            .rooms
            .get_mut(&player.room)
            .ok_or_else(|| WorldError::UnknownRoom(player.room.clone()))?;
        let names: Vec<&str> = player.inventory.iter().map(|i| i.name.as_str()).collect();
        let idx = unique_match(token, &names, true).ok_or(WorldError::ItemNotCarried)?;
        let item = player.inventory.remove(idx);
        room.items.push(item.clone());
        Ok(item)
    }

    pub fn room_items(&self, room: &RoomId) -> Vec<Item> {
        self.read()
            .rooms
            .get(room)
            .map(|r| r.items.clone())
            .unwrap_or_default()
    }

    pub fn player_inventory(&self, name: &str) -> Vec<Item> {
        self.read()
            .players
            .get(name)
            .map(|p| p.inventory.clone())
            .unwrap_or_default()
    }

    pub fn find_room_item(&self, room: &RoomId, token: &str) -> Option<Item> {
        let state = self.read();
        let room = state.rooms.get(room)?;
        unique_match(token, &room.item_names(), true).map(|idx| room.items[idx].clone())
    }

    pub fn find_inventory_item(&self, name: &str, token: &str) -> Option<Item> {
        let state = self.read();
        let player = state.players.get(name)?;
        let names: Vec<&str> = player.inventory.iter().map(|i| i.name.as_str()).collect();
        unique_match(token, &names, true).map(|idx| player.inventory[idx].clone())
    }

    pub fn find_room_npc(&self, room: &RoomId, token: &str) -> Option<Npc> {
        let state = self.read();
        let room = state.rooms.get(room)?;
        unique_match(token, &room.npc_names(), true).map(|idx| room.npcs[idx].clone())
    }

    pub fn room_npcs(&self, room: &RoomId) -> Vec<Npc> {
        self.read()
            .rooms
            .get(room)
            .map(|r| r.npcs.clone())
            .unwrap_or_default()
    }

    // ----- output and channels -----

    /// Deliver to every connected player in `room` except `exclude`.
    /// Returns how many queues accepted the message.
    pub fn broadcast_to_room(&self, room: &RoomId, message: &str, exclude: Option<&str>) -> usize {
        self.broadcast_except(room, message, exclude.as_slice())
    }

    pub(crate) fn broadcast_except(&self, room: &RoomId, message: &str, exclude: &[&str]) -> usize {
        let state = self.read();
        state
            .alive_players()
            .filter(|p| &p.room == room && !exclude.contains(&p.name.as_str()))
            .filter(|p| p.send(message))
            .count()
    }

    pub fn broadcast_to_room_channel(
        &self,
        room: &RoomId,
        channel: Channel,
        message: &str,
        exclude: Option<&str>,
    ) -> usize {
        self.broadcast_to_rooms_channel(std::slice::from_ref(room), channel, message, exclude)
    }

    pub fn broadcast_to_rooms_channel(
        &self,
        rooms: &[RoomId],
        channel: Channel,
        message: &str,
        exclude: Option<&str>,
    ) -> usize {
        if rooms.is_empty() {
            return 0;
        }
        let state = self.read();
        state
            .alive_players()
            .filter(|p| rooms.contains(&p.room) && Some(p.name.as_str()) != exclude)
            .filter(|p| p.channels.enabled(channel))
            .filter(|p| p.send(message))
            .count()
    }

    pub fn broadcast_to_all_channel(&self, channel: Channel, message: &str, exclude: Option<&str>) -> usize {
        let state = self.read();
        state
            .alive_players()
            .filter(|p| Some(p.name.as_str()) != exclude)
            .filter(|p| p.channels.enabled(channel))
            .filter(|p| p.send(message))
            .count()
    }

    pub fn send_to(&self, name: &str, message: &str) -> bool {
        self.read()
            .online(name)
            .map(|p| p.send(message))
            .unwrap_or(false)
    }

    pub fn set_channel(&self, name: &str, channel: Channel, enabled: bool) -> Result<(), WorldError> {
        let pending = {
            let mut state = self.write();
            let player = state.online_mut(name)?;
            player.channels.set_enabled(channel, enabled);
            Self::pending_profile(player)
        };
        self.save_profile(&pending.0, &pending.1);
        Ok(())
    }

    pub fn channel_statuses(&self, name: &str) -> Result<HashMap<Channel, bool>, WorldError> {
        Ok(self.read().online(name)?.channels.statuses())
    }

    /// Set a personal alias for a channel; an empty alias clears it.
    pub fn set_channel_alias(&self, name: &str, channel: Channel, alias: &str) -> Result<(), WorldError> {
        let alias = alias.trim();
        if alias.split_whitespace().count() > 1 {
            return Err(WorldError::InvalidAlias(alias.to_string()));
        }
        if let Some(other) = Channel::from_name(alias) {
            if other != channel {
                return Err(WorldError::NameTaken);
            }
        }
        let pending = {
            let mut state = self.write();
            let player = state.online_mut(name)?;
            if let Some(existing) = player.channels.resolve(alias) {
                if !alias.is_empty() && existing != channel {
                    return Err(WorldError::NameTaken);
                }
            }
            player.channels.set_alias(channel, alias);
            Self::pending_profile(player)
        };
        self.save_profile(&pending.0, &pending.1);
        Ok(())
    }

    pub fn channel_alias(&self, name: &str, channel: Channel) -> Option<String> {
        let state = self.read();
        let player = state.players.get(name)?;
        player.channels.alias(channel).map(str::to_string)
    }

    /// Resolve a channel name or the player's personal alias for one.
    pub fn resolve_channel_token(&self, name: &str, token: &str) -> Option<Channel> {
        match self.read().players.get(name) {
            Some(player) => player.channels.resolve(token),
            None => Channel::from_name(token),
        }
    }

    /// Mute or unmute a player on a channel. Mutes last for the session.
    pub fn set_channel_mute(&self, name: &str, channel: Channel, muted: bool) -> Result<(), WorldError> {
        let mut state = self.write();
        state.online_mut(name)?.channels.set_muted(channel, muted);
        Ok(())
    }

    pub fn channel_muted(&self, name: &str, channel: Channel) -> bool {
        self.read()
            .players
            .get(name)
            .is_some_and(|p| p.channels.muted(channel))
    }

    pub fn record_channel_message(&self, name: &str, channel: Channel, message: &str) {
        let mut state = self.write();
        if let Some(player) = state.players.get_mut(name) {
            player.channels.record(channel, message, chrono::Utc::now());
        }
    }

    /// Recent channel traffic for the player, oldest first. `None` means the
    /// default amount.
    pub fn channel_history(&self, name: &str, channel: Channel, limit: Option<usize>) -> Vec<ChannelMessage> {
        self.read()
            .players
            .get(name)
            .map(|p| p.channels.history(channel, limit.unwrap_or(CHANNEL_HISTORY_DEFAULT)))
            .unwrap_or_default()
    }

    // ----- lifecycle -----

    /// Reload rooms and quests from disk without disconnecting anyone. All
    /// fights stop, rooms come back fully stocked and every registered player
    /// is returned to the start room. On a load error the running world is
    /// left untouched.
    pub fn reboot(&self) -> Result<Vec<String>, WorldError> {
        let areas = self
            .settings
            .areas_path
            .as_ref()
            .ok_or(WorldError::NoAreasPath)?;
        let mut loaded = load_rooms(areas, self.settings.builder_overlay.as_deref())?;
        if !loaded.rooms.contains_key(&self.settings.start_room) {
            return Err(WorldError::Load(format!(
                "start room {} does not exist",
                self.settings.start_room
            )));
        }
        let placed = Placed::index(&loaded.rooms);
        for room in loaded.rooms.values_mut() {
            apply_resets(room);
        }
        let quests = match &self.settings.quests_path {
            Some(path) => load_quests(path)?,
            None => QuestCatalog::default(),
        };

        let (moved, pending, stopped) = {
            let mut state = self.write();
            state.rooms = loaded.rooms;
            state.sources = loaded.sources;
            state.placed = placed;
            state.quests = quests;
            let stopped: Vec<Arc<CombatInstance>> = state.combat.drain().map(|(_, c)| c).collect();

            let start = self.settings.start_room.clone();
            let WorldState {
                rooms,
                players,
                order,
                ..
            } = &mut *state;
            let mut moved = Vec::new();
            let mut pending = Vec::new();
            for name in order.iter() {
                let Some(player) = players.get_mut(name) else {
                    continue;
                };
                player.room = start.clone();
                if !rooms.contains_key(&player.home) {
                    player.home = start.clone();
                }
                moved.push(player.name.clone());
                pending.push(Self::pending_profile(player));
            }
            (moved, pending, stopped)
        };

        for instance in stopped {
            instance.stop();
        }
        for (account, profile) in pending {
            self.save_profile(&account, &profile);
        }
        info!("World rebooted; {} players returned to start", moved.len());
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> Arc<World> {
        World::builder()
            .with_room(
                Room::new("start", "Start", "The beginning.")
                    .with_exit("north", "hall")
                    .with_exit("northeast", "yard")
                    .with_item(Item::new("rusty key", "Old."))
                    .with_npc(Npc::new("Guide")),
            )
            .with_room(Room::new("hall", "Hall", "").with_exit("south", "start"))
            .with_room(Room::new("yard", "Yard", "").with_exit("southwest", "start"))
            .build()
            .unwrap()
    }

    #[test]
    fn new_player_starts_in_start_room() {
        let world = world();
        let _rx = world.add_player("Ada", None, false, PlayerProfile::default()).unwrap();
        let snap = world.active_player("Ada").unwrap();
        assert_eq!(snap.room.as_str(), "start");
        assert_eq!(snap.home.as_str(), "start");
        assert!(snap.alive);
    }

    #[test]
    fn unknown_profile_room_falls_back_to_start() {
        let world = world();
        let profile = PlayerProfile {
            room: Some(RoomId::from("gone")),
            ..PlayerProfile::default()
        };
        let _rx = world.add_player("Ada", None, false, profile).unwrap();
        assert_eq!(world.active_player("Ada").unwrap().room.as_str(), "start");
    }

    #[test]
    fn ambiguous_direction_does_not_move() {
        let world = world();
        let _rx = world.add_player("Ada", None, false, PlayerProfile::default()).unwrap();
        assert!(matches!(
            world.move_player("Ada", "n"),
            Err(WorldError::NoSuchExit)
        ));
        assert_eq!(world.move_player("Ada", "north").unwrap().as_str(), "hall");
        assert_eq!(world.move_player("Ada", "s").unwrap().as_str(), "start");
    }

    #[test]
    fn take_and_drop_move_items() {
        let world = world();
        let _rx = world.add_player("Ada", None, false, PlayerProfile::default()).unwrap();
        let item = world.take_item("Ada", "key").unwrap();
        assert_eq!(item.name, "rusty key");
        assert!(world.room_items(&RoomId::from("start")).is_empty());
        assert!(matches!(
            world.take_item("Ada", "key"),
            Err(WorldError::ItemNotFound)
        ));
        world.drop_item("Ada", "rusty").unwrap();
        assert!(world.player_inventory("Ada").is_empty());
        assert!(matches!(
            world.drop_item("Ada", "rusty"),
            Err(WorldError::ItemNotCarried)
        ));
    }

    #[test]
    fn rename_rejects_taken_name() {
        let world = world();
        let _a = world.add_player("Ada", None, false, PlayerProfile::default()).unwrap();
        let _b = world.add_player("Bea", None, false, PlayerProfile::default()).unwrap();
        assert!(matches!(
            world.rename_player("Ada", "bea"),
            Err(WorldError::NameTaken)
        ));
        world.rename_player("Ada", "Cass").unwrap();
        assert!(world.active_player("Ada").is_none());
        assert_eq!(world.list_players(false, &RoomId::from("start")), vec!["Cass", "Bea"]);
    }

    #[test]
    fn channel_broadcast_respects_preferences() {
        let world = world();
        let mut a = world.add_player("Ada", None, false, PlayerProfile::default()).unwrap();
        let mut b = world.add_player("Bea", None, false, PlayerProfile::default()).unwrap();
        world.set_channel("Bea", Channel::Ooc, false).unwrap();
        let delivered = world.broadcast_to_all_channel(Channel::Ooc, "hello", None);
        assert_eq!(delivered, 1);
        assert_eq!(a.try_recv().ok().as_deref(), Some("hello"));
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn adjacent_rooms_are_distinct() {
        let world = world();
        let adjacent = world.adjacent_rooms(&RoomId::from("start"));
        assert_eq!(adjacent, vec![RoomId::from("hall"), RoomId::from("yard")]);
    }

    #[test]
    fn missing_start_room_fails_build() {
        let result = World::builder()
            .with_room(Room::new("hall", "Hall", ""))
            .build();
        assert!(matches!(result, Err(WorldError::Load(_))));
    }
}

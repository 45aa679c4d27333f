//! World simulation core: rooms and exits, connected players, NPC and item
//! population, quests, chat channels, per-room combat and spells.
//!
//! A [`World`] owns everything behind one lock and is shared as
//! `Arc<World>` between command handlers and combat tasks. Builder edits go
//! through a persist-or-rollback path so the in-memory graph and the builder
//! overlay on disk never disagree.

pub mod builder;
pub mod channels;
pub mod combat;
pub mod errors;
pub mod loader;
pub mod matching;
pub mod persistence;
pub mod player;
pub mod quest;
pub mod resets;
pub mod spells;
pub mod state;
pub mod types;

pub use channels::{Channel, ChannelMessage, ChannelSettings, CHANNEL_HISTORY_DEFAULT, CHANNEL_HISTORY_LIMIT};
pub use combat::{CombatInstance, CombatTarget, NpcDamageResult, PlayerDamageResult};
pub use errors::{ErrorKind, WorldError};
pub use loader::{load_overlay, load_quests, load_rooms, read_quest_file, validate_exits, AreaFile, LoadedRooms, RoomSource};
pub use matching::unique_match;
pub use persistence::{DiscardRooms, JsonOverlayStore, ProfileStore, RoomPersistence};
pub use player::{
    experience_for_next_level, player_attack_damage, Outbound, Player, PlayerSnapshot, Takeover, Transport,
    TransportHandle, COMMAND_LIMIT, COMMAND_WINDOW, DEFAULT_OUTBOUND_BUFFER,
};
pub use quest::{
    Quest, QuestCatalog, QuestCompletionResult, QuestItemRequirement, QuestKillProgress, QuestKillRequirement,
    QuestProgress, QuestProgressSnapshot, QuestProgressUpdate,
};
pub use resets::{apply_resets, ResetReport};
pub use spells::{bolt_damage, heal_amount, BoltOutcome, HealResult, BOLT_MANA_COST, HEAL_MANA_COST};
pub use state::{World, WorldBuilder, WorldSettings, WorldSummary, DEFAULT_ROUND_INTERVAL};
pub use types::*;

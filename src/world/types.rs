use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::world::channels::Channel;

/// Room every new player starts in unless configured otherwise.
pub const DEFAULT_START_ROOM: &str = "start";

/// Stable identity of a room across area files, the builder overlay and
/// player profiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Maximum health for a combatant of the given level.
pub fn max_health_for_level(level: u32) -> u32 {
    40 + 8 * level.max(1).saturating_sub(1)
}

/// Maximum mana for a combatant of the given level.
pub fn max_mana_for_level(level: u32) -> u32 {
    10 + 4 * level.max(1).saturating_sub(1)
}

/// Experience granted for defeating an NPC of the given level when the
/// definition leaves it unset.
pub fn default_npc_experience(level: u32) -> u32 {
    25 * level.max(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Item {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Item {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            description: description.trim().to_string(),
        }
    }
}

/// A live NPC instance bound to one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Npc {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auto_greet: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub health: u32,
    #[serde(default)]
    pub max_health: u32,
    #[serde(default)]
    pub mana: u32,
    #[serde(default)]
    pub max_mana: u32,
    #[serde(default)]
    pub experience: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loot: Vec<Item>,
}

impl Npc {
    pub fn new(name: &str) -> Self {
        let mut npc = Self {
            name: name.trim().to_string(),
            ..Self::default()
        };
        npc.ensure_stats();
        npc
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self.max_health = 0;
        self.max_mana = 0;
        self.health = 0;
        self.mana = 0;
        self.experience = 0;
        self.ensure_stats();
        self
    }

    pub fn with_greeting(mut self, greeting: &str) -> Self {
        self.auto_greet = greeting.trim().to_string();
        self
    }

    pub fn with_loot(mut self, item: Item) -> Self {
        self.loot.push(item);
        self
    }

    /// Same NPC with health and mana topped up.
    pub fn full_strength(mut self) -> Self {
        self.ensure_stats();
        self.health = self.max_health;
        self.mana = self.max_mana;
        self
    }

    pub fn attack_damage<R: Rng>(&self, rng: &mut R) -> u32 {
        3 + 2 * self.level.max(1) + rng.gen_range(0..=2)
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(name.trim())
    }

    /// Fill in missing or invalid stats from the level and clamp health/mana
    /// into range. A zero or out-of-range current value means "full".
    pub fn ensure_stats(&mut self) {
        if self.level == 0 {
            self.level = 1;
        }
        if self.max_health == 0 {
            self.max_health = max_health_for_level(self.level);
        }
        if self.health == 0 || self.health > self.max_health {
            self.health = self.max_health;
        }
        if self.max_mana == 0 {
            self.max_mana = max_mana_for_level(self.level);
        }
        if self.mana > self.max_mana || self.mana == 0 {
            self.mana = self.max_mana;
        }
        if self.experience == 0 {
            self.experience = default_npc_experience(self.level);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetKind {
    Npc,
    Item,
}

fn default_reset_count() -> u32 {
    1
}

/// Declarative restock rule: keep `count` instances of `name` in the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reset {
    pub kind: ResetKind,
    pub name: String,
    #[serde(default = "default_reset_count")]
    pub count: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auto_greet: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub level: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loot: Vec<Item>,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl Reset {
    pub fn npc(name: &str, auto_greet: &str) -> Self {
        Self {
            kind: ResetKind::Npc,
            name: name.trim().to_string(),
            count: 1,
            auto_greet: auto_greet.trim().to_string(),
            description: String::new(),
            level: 0,
            loot: Vec::new(),
        }
    }

    pub fn item(name: &str, description: &str) -> Self {
        Self {
            kind: ResetKind::Item,
            name: name.trim().to_string(),
            count: 1,
            auto_greet: String::new(),
            description: description.trim().to_string(),
            level: 0,
            loot: Vec::new(),
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Target population, never below one.
    pub fn target_count(&self) -> usize {
        self.count.max(1) as usize
    }

    /// Fresh NPC built from this template.
    pub fn spawn_npc(&self) -> Npc {
        let mut npc = Npc {
            name: self.name.clone(),
            auto_greet: self.auto_greet.clone(),
            level: self.level,
            loot: self.loot.clone(),
            ..Npc::default()
        };
        npc.ensure_stats();
        npc
    }

    pub fn spawn_item(&self) -> Item {
        Item {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

/// Snapshot of a room's prose taken whenever a builder edits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRevision {
    pub number: u32,
    pub editor: String,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Room {
    pub id: RoomId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exits: BTreeMap<String, RoomId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub npcs: Vec<Npc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resets: Vec<Reset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revisions: Vec<RoomRevision>,
}

impl Room {
    pub fn new(id: impl Into<RoomId>, title: &str, description: &str) -> Self {
        Self {
            id: id.into(),
            title: title.trim().to_string(),
            description: description.trim().to_string(),
            ..Self::default()
        }
    }

    pub fn with_exit(mut self, direction: &str, target: impl Into<RoomId>) -> Self {
        self.exits
            .insert(direction.trim().to_ascii_lowercase(), target.into());
        self
    }

    pub fn with_npc(mut self, npc: Npc) -> Self {
        self.npcs.push(npc);
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_reset(mut self, reset: Reset) -> Self {
        self.resets.push(reset);
        self
    }

    pub fn npc_names(&self) -> Vec<&str> {
        self.npcs.iter().map(|npc| npc.name.as_str()).collect()
    }

    pub fn item_names(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.name.as_str()).collect()
    }

    pub fn has_npc_named(&self, name: &str) -> bool {
        let wanted = name.trim();
        !wanted.is_empty()
            && self
                .npcs
                .iter()
                .any(|npc| npc.name.trim().eq_ignore_ascii_case(wanted))
    }

    /// Sorted exit directions, or "none".
    pub fn exit_list(&self) -> String {
        if self.exits.is_empty() {
            return "none".to_string();
        }
        self.exits.keys().cloned().collect::<Vec<_>>().join(" ")
    }

    pub(crate) fn next_revision_number(&self) -> u32 {
        self.revisions.iter().map(|rev| rev.number).max().unwrap_or(0) + 1
    }

    pub(crate) fn push_revision(&mut self, editor: &str) {
        let number = self.next_revision_number();
        self.revisions.push(RoomRevision {
            number,
            editor: editor.to_string(),
            timestamp: Utc::now(),
            title: self.title.clone(),
            description: self.description.clone(),
        });
    }
}

/// Persistent per-account state handed to the world on login and written back
/// whenever a player's room, home or channel preferences change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerProfile {
    #[serde(default)]
    pub room: Option<RoomId>,
    #[serde(default)]
    pub home: Option<RoomId>,
    #[serde(default)]
    pub channels: HashMap<Channel, bool>,
    #[serde(default)]
    pub aliases: HashMap<Channel, String>,
}

//! Quest catalog and the per-player quest state machine.
//!
//! A quest moves through *available* (giver present, not in the log),
//! *active* (accepted), *completable* (kills satisfied and items held) and
//! *completed*. Completion is all-or-nothing: required items are only taken
//! after every requirement has been checked.

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::world::errors::WorldError;
use crate::world::state::World;
use crate::world::types::Item;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QuestKillRequirement {
    pub npc: String,
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QuestItemRequirement {
    pub item: String,
    #[serde(default)]
    pub count: u32,
}

/// Static quest template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Quest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub giver: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub turn_in: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_kills: Vec<QuestKillRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_items: Vec<QuestItemRequirement>,
    #[serde(default)]
    pub reward_xp: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reward_items: Vec<Item>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub completion_message: String,
}

impl Quest {
    /// Trim text fields, default the turn-in NPC to the giver and raise zero
    /// requirement counts to one.
    pub fn normalize(&mut self) {
        self.id = self.id.trim().to_string();
        self.name = self.name.trim().to_string();
        self.description = self.description.trim().to_string();
        self.giver = self.giver.trim().to_string();
        self.turn_in = self.turn_in.trim().to_string();
        if self.turn_in.is_empty() {
            self.turn_in = self.giver.clone();
        }
        for req in &mut self.required_kills {
            req.npc = req.npc.trim().to_string();
            req.count = req.count.max(1);
        }
        for req in &mut self.required_items {
            req.item = req.item.trim().to_string();
            req.count = req.count.max(1);
        }
        for item in &mut self.reward_items {
            *item = Item::new(&item.name, &item.description);
        }
        self.completion_message = self.completion_message.trim().to_string();
    }

    pub fn key(&self) -> String {
        self.id.to_lowercase()
    }
}

fn npc_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Quest templates indexed by id and by giver.
#[derive(Debug, Clone, Default)]
pub struct QuestCatalog {
    quests: HashMap<String, Arc<Quest>>,
    by_npc: HashMap<String, Vec<Arc<Quest>>>,
}

impl QuestCatalog {
    /// Build a catalog, dropping quests without an id or name. Later
    /// duplicates replace earlier ones.
    pub fn from_quests(quests: Vec<Quest>) -> Self {
        let mut catalog = Self::default();
        for mut quest in quests {
            quest.normalize();
            if quest.id.is_empty() || quest.name.is_empty() {
                debug!("Skipping quest without id or name");
                continue;
            }
            catalog.quests.insert(quest.key(), Arc::new(quest));
        }
        for quest in catalog.quests.values() {
            let giver = npc_key(&quest.giver);
            if giver.is_empty() {
                continue;
            }
            catalog.by_npc.entry(giver).or_default().push(Arc::clone(quest));
        }
        for list in catalog.by_npc.values_mut() {
            list.sort_by(|a, b| a.name.cmp(&b.name));
        }
        catalog
    }

    pub fn get(&self, id: &str) -> Option<Arc<Quest>> {
        self.quests.get(&id.trim().to_lowercase()).cloned()
    }

    pub fn offered_by(&self, npc: &str) -> &[Arc<Quest>] {
        self.by_npc
            .get(&npc_key(npc))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestProgress {
    pub quest_id: String,
    pub accepted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub kill_counts: HashMap<String, u32>,
}

impl QuestProgress {
    pub fn new(quest: &Quest) -> Self {
        let kill_counts = quest
            .required_kills
            .iter()
            .map(|req| npc_key(&req.npc))
            .filter(|key| !key.is_empty())
            .map(|key| (key, 0))
            .collect();
        Self {
            quest_id: quest.key(),
            accepted_at: Utc::now(),
            completed_at: None,
            completed: false,
            kill_counts,
        }
    }

    /// Count a kill of `npc` against every matching requirement, never past
    /// the required amount. Returns the affected requirements and whether any
    /// count actually moved.
    fn increment_kill(&mut self, quest: &Quest, npc: &str) -> (Vec<QuestKillProgress>, bool) {
        if self.completed {
            return (Vec::new(), false);
        }
        let wanted = npc_key(npc);
        if wanted.is_empty() {
            return (Vec::new(), false);
        }
        let mut changed = false;
        let mut updates = Vec::new();
        for req in &quest.required_kills {
            let key = npc_key(&req.npc);
            if key != wanted {
                continue;
            }
            let need = req.count.max(1);
            let have = self.kill_counts.entry(key).or_insert(0);
            if *have < need {
                *have += 1;
                changed = true;
            }
            updates.push(QuestKillProgress {
                npc: req.npc.clone(),
                current: *have,
                required: need,
            });
        }
        (updates, changed)
    }

    pub fn kills_complete(&self, quest: &Quest) -> bool {
        quest.required_kills.iter().all(|req| {
            let key = npc_key(&req.npc);
            key.is_empty() || self.kill_counts.get(&key).copied().unwrap_or(0) >= req.count.max(1)
        })
    }

    fn kill_progress(&self, quest: &Quest) -> Vec<QuestKillProgress> {
        quest
            .required_kills
            .iter()
            .map(|req| QuestKillProgress {
                npc: req.npc.clone(),
                current: self.kill_counts.get(&npc_key(&req.npc)).copied().unwrap_or(0),
                required: req.count.max(1),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestKillProgress {
    pub npc: String,
    pub current: u32,
    pub required: u32,
}

#[derive(Debug, Clone)]
pub struct QuestProgressSnapshot {
    pub quest: Arc<Quest>,
    pub completed: bool,
    pub accepted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub kill_progress: Vec<QuestKillProgress>,
}

/// Change in one quest's progress after a kill.
#[derive(Debug, Clone)]
pub struct QuestProgressUpdate {
    pub quest: Arc<Quest>,
    pub kill_progress: Vec<QuestKillProgress>,
    pub kills_completed: bool,
}

#[derive(Debug, Clone)]
pub struct QuestCompletionResult {
    pub quest: Arc<Quest>,
    pub reward_items: Vec<Item>,
    pub reward_xp: u32,
    pub levels_gained: u32,
    pub completion_message: String,
}

impl World {
    /// Quests offered by the named NPC, sorted by name.
    pub fn quests_by_npc(&self, npc: &str) -> Vec<Arc<Quest>> {
        if npc.trim().is_empty() {
            return Vec::new();
        }
        self.read().quests.offered_by(npc).to_vec()
    }

    pub fn quest(&self, id: &str) -> Option<Arc<Quest>> {
        self.read().quests.get(id)
    }

    /// Quests the player could accept from NPCs in their current room.
    pub fn available_quests(&self, player: &str) -> Vec<Arc<Quest>> {
        let state = self.read();
        let Ok(p) = state.online(player) else {
            return Vec::new();
        };
        let Some(room) = state.rooms.get(&p.room) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut available = Vec::new();
        for npc in &room.npcs {
            for quest in state.quests.offered_by(&npc.name) {
                let key = quest.key();
                if p.quest_log.contains_key(&key) || !seen.insert(key) {
                    continue;
                }
                available.push(Arc::clone(quest));
            }
        }
        available.sort_by(|a, b| a.name.cmp(&b.name));
        available
    }

    pub fn accept_quest(&self, player: &str, quest_id: &str) -> Result<Arc<Quest>, WorldError> {
        if quest_id.trim().is_empty() {
            return Err(WorldError::Empty("quest id"));
        }
        let mut state = self.write();
        let state = &mut *state;
        let quest = state.quests.get(quest_id).ok_or(WorldError::UnknownQuest)?;
        let p = state
            .players
            .get_mut(player)
            .filter(|p| p.alive)
            .ok_or_else(|| WorldError::NotOnline(player.to_string()))?;
        let room = state
            .rooms
            .get(&p.room)
            .ok_or_else(|| WorldError::UnknownRoom(p.room.clone()))?;
        if !room.has_npc_named(&quest.giver) {
            return Err(WorldError::NotHere(quest.giver.clone()));
        }
        if let Some(progress) = p.quest_log.get(&quest.key()) {
            return Err(if progress.completed {
                WorldError::QuestCompleted
            } else {
                WorldError::QuestActive
            });
        }
        p.quest_log.insert(quest.key(), QuestProgress::new(&quest));
        debug!("{} accepted quest {}", p.name, quest.id);
        Ok(quest)
    }

    /// Credit a defeated NPC to every active quest that asks for it.
    pub fn record_npc_kill(&self, player: &str, npc: &str) -> Vec<QuestProgressUpdate> {
        let mut state = self.write();
        let state = &mut *state;
        let Some(p) = state.players.get_mut(player) else {
            return Vec::new();
        };
        let mut updates = Vec::new();
        for (id, progress) in p.quest_log.iter_mut() {
            if progress.completed {
                continue;
            }
            let Some(quest) = state.quests.get(id) else {
                continue;
            };
            let (kills, changed) = progress.increment_kill(&quest, npc);
            if !changed || kills.is_empty() {
                continue;
            }
            let kills_completed = progress.kills_complete(&quest);
            updates.push(QuestProgressUpdate {
                quest,
                kill_progress: kills,
                kills_completed,
            });
        }
        updates.sort_by(|a, b| a.quest.name.cmp(&b.quest.name));
        updates
    }

    /// Turn in a quest. Either every requirement holds and all rewards are
    /// granted, or nothing changes.
    pub fn complete_quest(&self, player: &str, quest_id: &str) -> Result<QuestCompletionResult, WorldError> {
        if quest_id.trim().is_empty() {
            return Err(WorldError::Empty("quest id"));
        }
        let mut state = self.write();
        let state = &mut *state;
        let quest = state.quests.get(quest_id).ok_or(WorldError::UnknownQuest)?;
        let p = state
            .players
            .get_mut(player)
            .filter(|p| p.alive)
            .ok_or_else(|| WorldError::NotOnline(player.to_string()))?;
        let progress = p
            .quest_log
            .get(&quest.key())
            .ok_or(WorldError::QuestNotAccepted)?;
        if progress.completed {
            return Err(WorldError::QuestCompleted);
        }
        let room = state
            .rooms
            .get(&p.room)
            .ok_or_else(|| WorldError::UnknownRoom(p.room.clone()))?;
        if !room.has_npc_named(&quest.turn_in) {
            return Err(WorldError::NotHere(quest.turn_in.clone()));
        }
        if !progress.kills_complete(&quest) {
            return Err(WorldError::ObjectivesIncomplete);
        }

        // Requirements naming the same item add up.
        let mut needed: Vec<(String, String, u32)> = Vec::new();
        for req in &quest.required_items {
            let key = req.item.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            match needed.iter_mut().find(|(k, _, _)| *k == key) {
                Some(entry) => entry.2 += req.count.max(1),
                None => needed.push((key, req.item.trim().to_string(), req.count.max(1))),
            }
        }
        let mut held: HashMap<String, u32> = HashMap::new();
        for item in &p.inventory {
            *held.entry(item.name.to_lowercase()).or_insert(0) += 1;
        }
        for (key, item, need) in &needed {
            if held.get(key).copied().unwrap_or(0) < *need {
                return Err(WorldError::MissingItem {
                    item: item.clone(),
                    count: *need,
                });
            }
        }

        // Every requirement holds; from here on nothing can fail.
        for (key, _, need) in &needed {
            let mut remaining = *need;
            p.inventory.retain(|item| {
                if remaining > 0 && item.name.to_lowercase() == *key {
                    remaining -= 1;
                    false
                } else {
                    true
                }
            });
        }
        let reward_items = quest.reward_items.clone();
        p.inventory.extend(reward_items.iter().cloned());
        let levels_gained = if quest.reward_xp > 0 {
            p.gain_experience(quest.reward_xp)
        } else {
            0
        };
        if let Some(progress) = p.quest_log.get_mut(&quest.key()) {
            progress.completed = true;
            progress.completed_at = Some(Utc::now());
        }
        info!("{} completed quest {}", p.name, quest.id);
        Ok(QuestCompletionResult {
            reward_xp: quest.reward_xp,
            completion_message: quest.completion_message.clone(),
            quest,
            reward_items,
            levels_gained,
        })
    }

    /// The player's quest log, sorted by quest name.
    pub fn snapshot_quest_log(&self, player: &str) -> Vec<QuestProgressSnapshot> {
        let state = self.read();
        let Some(p) = state.players.get(player) else {
            return Vec::new();
        };
        let mut snapshots: Vec<QuestProgressSnapshot> = p
            .quest_log
            .iter()
            .filter_map(|(id, progress)| {
                let quest = state.quests.get(id)?;
                Some(QuestProgressSnapshot {
                    kill_progress: progress.kill_progress(&quest),
                    completed: progress.completed,
                    accepted_at: progress.accepted_at,
                    completed_at: progress.completed_at,
                    quest,
                })
            })
            .collect();
        snapshots.sort_by(|a, b| a.quest.name.cmp(&b.quest.name));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hunt() -> Quest {
        Quest {
            id: " Hunt ".into(),
            name: "The Hunt".into(),
            giver: "Guide".into(),
            required_kills: vec![QuestKillRequirement {
                npc: "Rat".into(),
                count: 2,
            }],
            required_items: vec![QuestItemRequirement {
                item: "Tail".into(),
                count: 0,
            }],
            ..Quest::default()
        }
    }

    #[test]
    fn normalize_defaults_turn_in_and_counts() {
        let mut quest = hunt();
        quest.normalize();
        assert_eq!(quest.id, "Hunt");
        assert_eq!(quest.turn_in, "Guide");
        assert_eq!(quest.required_items[0].count, 1);
    }

    #[test]
    fn catalog_indexes_by_giver_case_insensitively() {
        let catalog = QuestCatalog::from_quests(vec![
            hunt(),
            Quest {
                id: "nameless".into(),
                giver: "Guide".into(),
                ..Quest::default()
            },
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.offered_by("guide").len(), 1);
        assert!(catalog.get("HUNT").is_some());
    }

    #[test]
    fn kill_count_is_clamped() {
        let mut quest = hunt();
        quest.normalize();
        let mut progress = QuestProgress::new(&quest);
        for _ in 0..2 {
            let (_, changed) = progress.increment_kill(&quest, "rat");
            assert!(changed);
        }
        let (updates, changed) = progress.increment_kill(&quest, "Rat");
        assert!(!changed);
        assert_eq!(updates[0].current, 2);
        assert!(progress.kills_complete(&quest));
    }

    #[test]
    fn unrelated_kill_is_ignored() {
        let mut quest = hunt();
        quest.normalize();
        let mut progress = QuestProgress::new(&quest);
        let (updates, changed) = progress.increment_kill(&quest, "Bat");
        assert!(updates.is_empty());
        assert!(!changed);
    }
}

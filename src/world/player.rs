use chrono::{DateTime, Utc};
use log::debug;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::world::channels::ChannelSettings;
use crate::world::quest::QuestProgress;
use crate::world::types::{max_health_for_level, max_mana_for_level, Item, PlayerProfile, RoomId};

/// Default capacity of a player's outbound queue.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 32;

/// Commands a player may issue within one [`COMMAND_WINDOW`].
pub const COMMAND_LIMIT: usize = 5;
pub const COMMAND_WINDOW: Duration = Duration::from_secs(1);

/// Experience needed to advance from `level` to the next one.
pub fn experience_for_next_level(level: u32) -> u32 {
    100 * level.max(1)
}

/// Damage a player of `level` deals with one blow.
pub fn player_attack_damage<R: Rng>(level: u32, rng: &mut R) -> u32 {
    4 + 2 * level.max(1) + rng.gen_range(0..=3)
}

/// Connection owned by the network layer. The world only ever closes it.
pub trait Transport: Send + Sync + fmt::Debug {
    fn close(&self);

    fn peer(&self) -> String {
        "unknown".to_string()
    }
}

pub type TransportHandle = Arc<dyn Transport>;

/// Bounded, never-blocking outbound queue for one session.
///
/// When the queue is full the newest message is dropped. Dropping the
/// `Outbound` closes the channel; the world holds the only sender so the
/// session's writer sees end-of-stream exactly once.
#[derive(Debug)]
pub struct Outbound {
    tx: mpsc::Sender<String>,
}

impl Outbound {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a message; returns false if it was dropped.
    pub fn send(&self, message: impl Into<String>) -> bool {
        match self.tx.try_send(message.into()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Outbound queue full; dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Transport and output handles released by a session takeover. The caller
/// notifies the old connection through `output`, then drops it and closes the
/// transport.
#[derive(Debug)]
pub struct Takeover {
    pub transport: Option<TransportHandle>,
    pub output: Option<Outbound>,
}

impl Takeover {
    /// Send a farewell to the old connection and release both handles.
    pub fn release(self, notice: &str) {
        if let Some(output) = self.output {
            output.send(notice);
        }
        if let Some(transport) = self.transport {
            transport.close();
        }
    }
}

/// A connected (or recently disconnected) adventurer.
#[derive(Debug)]
pub struct Player {
    pub name: String,
    pub account: String,
    pub room: RoomId,
    pub home: RoomId,
    pub level: u32,
    pub experience: u32,
    pub health: u32,
    pub max_health: u32,
    pub mana: u32,
    pub max_mana: u32,
    pub inventory: Vec<Item>,
    pub is_admin: bool,
    pub is_builder: bool,
    pub alive: bool,
    pub joined_at: DateTime<Utc>,
    pub(crate) channels: ChannelSettings,
    pub(crate) quest_log: HashMap<String, QuestProgress>,
    pub(crate) output: Option<Outbound>,
    pub(crate) transport: Option<TransportHandle>,
    command_times: VecDeque<Instant>,
}

impl Player {
    pub fn new(name: &str, room: RoomId, home: RoomId) -> Self {
        let mut player = Self {
            name: name.to_string(),
            account: name.to_string(),
            room,
            home,
            level: 1,
            experience: 0,
            health: 0,
            max_health: 0,
            mana: 0,
            max_mana: 0,
            inventory: Vec::new(),
            is_admin: false,
            is_builder: false,
            alive: false,
            joined_at: Utc::now(),
            channels: ChannelSettings::default(),
            quest_log: HashMap::new(),
            output: None,
            transport: None,
            command_times: VecDeque::new(),
        };
        player.restore();
        player
    }

    pub fn ensure_stats(&mut self) {
        if self.level == 0 {
            self.level = 1;
        }
        let max_health = max_health_for_level(self.level);
        if self.max_health < max_health {
            self.max_health = max_health;
        }
        let max_mana = max_mana_for_level(self.level);
        if self.max_mana < max_mana {
            self.max_mana = max_mana;
        }
        if self.health == 0 || self.health > self.max_health {
            self.health = self.max_health;
        }
        if self.mana > self.max_mana {
            self.mana = self.max_mana;
        }
    }

    /// Restore health and mana to their maxima.
    pub fn restore(&mut self) {
        self.ensure_stats();
        self.health = self.max_health;
        self.mana = self.max_mana;
    }

    /// Add experience, advancing as many levels as it pays for. Returns the
    /// number of levels gained.
    pub fn gain_experience(&mut self, amount: u32) -> u32 {
        self.ensure_stats();
        self.experience = self.experience.saturating_add(amount);
        let mut gained = 0;
        loop {
            let needed = experience_for_next_level(self.level);
            if self.experience < needed {
                break;
            }
            self.experience -= needed;
            self.level += 1;
            gained += 1;
        }
        if gained > 0 {
            self.max_health = max_health_for_level(self.level);
            self.max_mana = max_mana_for_level(self.level);
            self.restore();
        }
        gained
    }

    /// Count a command issued at `now` against the sliding window. Returns
    /// false, without counting it, once the window is full.
    pub fn allow_command(&mut self, now: Instant) -> bool {
        while let Some(&oldest) = self.command_times.front() {
            if now.saturating_duration_since(oldest) < COMMAND_WINDOW {
                break;
            }
            self.command_times.pop_front();
        }
        if self.command_times.len() >= COMMAND_LIMIT {
            return false;
        }
        self.command_times.push_back(now);
        true
    }

    pub fn attack_damage<R: Rng>(&self, rng: &mut R) -> u32 {
        player_attack_damage(self.level, rng)
    }

    /// Queue a message for this player's connection, if any.
    pub fn send(&self, message: impl Into<String>) -> bool {
        match &self.output {
            Some(output) if self.alive => output.send(message),
            _ => false,
        }
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn profile(&self) -> PlayerProfile {
        PlayerProfile {
            room: Some(self.room.clone()),
            home: Some(self.home.clone()),
            channels: self.channels.enabled_map(),
            aliases: self.channels.alias_map(),
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            name: self.name.clone(),
            account: self.account.clone(),
            room: self.room.clone(),
            home: self.home.clone(),
            level: self.level,
            experience: self.experience,
            health: self.health,
            max_health: self.max_health,
            mana: self.mana,
            max_mana: self.max_mana,
            inventory: self.inventory.clone(),
            is_admin: self.is_admin,
            is_builder: self.is_builder,
            alive: self.alive,
        }
    }
}

/// Detached copy of a player's visible state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub name: String,
    pub account: String,
    pub room: RoomId,
    pub home: RoomId,
    pub level: u32,
    pub experience: u32,
    pub health: u32,
    pub max_health: u32,
    pub mana: u32,
    pub max_mana: u32,
    pub inventory: Vec<Item>,
    pub is_admin: bool,
    pub is_builder: bool,
    pub alive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hero() -> Player {
        Player::new("Hero", RoomId::from("start"), RoomId::from("start"))
    }

    #[test]
    fn new_player_has_level_one_stats() {
        let player = hero();
        assert_eq!(player.level, 1);
        assert_eq!(player.max_health, 40);
        assert_eq!(player.health, 40);
        assert_eq!(player.max_mana, 10);
        assert_eq!(player.mana, 10);
    }

    #[test]
    fn command_window_slides() {
        let mut player = hero();
        let start = Instant::now();
        for i in 0..COMMAND_LIMIT {
            assert!(player.allow_command(start + Duration::from_millis(i as u64 * 100)));
        }
        assert!(!player.allow_command(start + Duration::from_millis(900)));
        // The first command ages out exactly one window after it was issued.
        assert!(player.allow_command(start + COMMAND_WINDOW));
        assert!(!player.allow_command(start + COMMAND_WINDOW + Duration::from_millis(50)));
    }

    #[test]
    fn experience_can_gain_several_levels() {
        let mut player = hero();
        // 100 for level 2, 200 for level 3, 50 left over.
        let gained = player.gain_experience(350);
        assert_eq!(gained, 2);
        assert_eq!(player.level, 3);
        assert_eq!(player.experience, 50);
        assert_eq!(player.max_health, 56);
        assert_eq!(player.health, 56);
    }

    #[test]
    fn small_award_does_not_level() {
        let mut player = hero();
        assert_eq!(player.gain_experience(99), 0);
        assert_eq!(player.level, 1);
    }

    #[test]
    fn outbound_drops_newest_when_full() {
        let (out, mut rx) = Outbound::channel(1);
        assert!(out.send("first"));
        assert!(!out.send("second"));
        assert_eq!(rx.try_recv().ok().as_deref(), Some("first"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropping_outbound_closes_receiver() {
        let (out, mut rx) = Outbound::channel(4);
        drop(out);
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
        ));
    }
}

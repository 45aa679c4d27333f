//! Chat channels and per-player channel preferences.
//!
//! Players can switch channels off, give a channel a personal alias, and be
//! muted on a channel by an admin. Every player also keeps a short history of
//! channel traffic they received so late joiners can catch up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// Upper bound on stored history per channel per player.
pub const CHANNEL_HISTORY_LIMIT: usize = 50;
/// Entries shown when the caller does not ask for a specific count.
pub const CHANNEL_HISTORY_DEFAULT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Say,
    Whisper,
    Yell,
    Ooc,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Say, Channel::Whisper, Channel::Yell, Channel::Ooc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Say => "say",
            Channel::Whisper => "whisper",
            Channel::Yell => "yell",
            Channel::Ooc => "ooc",
        }
    }

    /// Parse a canonical channel name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim();
        Channel::ALL
            .into_iter()
            .find(|channel| channel.as_str().eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything enabled.
pub fn default_channel_settings() -> HashMap<Channel, bool> {
    Channel::ALL.into_iter().map(|channel| (channel, true)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChannelSettings {
    enabled: HashMap<Channel, bool>,
    aliases: HashMap<Channel, String>,
    muted: HashSet<Channel>,
    history: HashMap<Channel, VecDeque<ChannelMessage>>,
}

impl ChannelSettings {
    /// Build settings from persisted values, filling unknown channels with
    /// defaults and discarding blank aliases.
    pub fn from_profile(enabled: &HashMap<Channel, bool>, aliases: &HashMap<Channel, String>) -> Self {
        let mut merged = default_channel_settings();
        for (channel, on) in enabled {
            merged.insert(*channel, *on);
        }
        let aliases = aliases
            .iter()
            .filter_map(|(channel, alias)| {
                let trimmed = alias.trim();
                (!trimmed.is_empty()).then(|| (*channel, trimmed.to_string()))
            })
            .collect();
        Self {
            enabled: merged,
            aliases,
            muted: HashSet::new(),
            history: HashMap::new(),
        }
    }

    pub fn enabled(&self, channel: Channel) -> bool {
        self.enabled.get(&channel).copied().unwrap_or(true)
    }

    pub fn set_enabled(&mut self, channel: Channel, enabled: bool) {
        self.enabled.insert(channel, enabled);
    }

    pub fn statuses(&self) -> HashMap<Channel, bool> {
        Channel::ALL
            .into_iter()
            .map(|channel| (channel, self.enabled(channel)))
            .collect()
    }

    pub fn alias(&self, channel: Channel) -> Option<&str> {
        self.aliases.get(&channel).map(String::as_str)
    }

    /// Set or clear (empty string) the alias for a channel.
    pub fn set_alias(&mut self, channel: Channel, alias: &str) {
        let trimmed = alias.trim();
        if trimmed.is_empty() {
            self.aliases.remove(&channel);
        } else {
            self.aliases.insert(channel, trimmed.to_string());
        }
    }

    /// Resolve a channel by canonical name first, then by personal alias.
    pub fn resolve(&self, token: &str) -> Option<Channel> {
        if let Some(channel) = Channel::from_name(token) {
            return Some(channel);
        }
        let wanted = token.trim();
        self.aliases
            .iter()
            .find(|(_, alias)| alias.eq_ignore_ascii_case(wanted))
            .map(|(channel, _)| *channel)
    }

    pub fn muted(&self, channel: Channel) -> bool {
        self.muted.contains(&channel)
    }

    pub fn set_muted(&mut self, channel: Channel, muted: bool) {
        if muted {
            self.muted.insert(channel);
        } else {
            self.muted.remove(&channel);
        }
    }

    pub fn record(&mut self, channel: Channel, message: &str, timestamp: DateTime<Utc>) {
        let entries = self.history.entry(channel).or_default();
        entries.push_back(ChannelMessage {
            timestamp,
            message: message.to_string(),
        });
        while entries.len() > CHANNEL_HISTORY_LIMIT {
            entries.pop_front();
        }
    }

    /// Most recent `limit` entries, oldest first.
    pub fn history(&self, channel: Channel, limit: usize) -> Vec<ChannelMessage> {
        let Some(entries) = self.history.get(&channel) else {
            return Vec::new();
        };
        let limit = limit.clamp(1, CHANNEL_HISTORY_LIMIT);
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn enabled_map(&self) -> HashMap<Channel, bool> {
        self.enabled.clone()
    }

    pub fn alias_map(&self) -> HashMap<Channel, String> {
        self.aliases.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_everything() {
        let settings = ChannelSettings::from_profile(&HashMap::new(), &HashMap::new());
        for channel in Channel::ALL {
            assert!(settings.enabled(channel));
        }
    }

    #[test]
    fn alias_resolves_channel() {
        let mut settings = ChannelSettings::default();
        settings.set_alias(Channel::Ooc, "chat");
        assert_eq!(settings.resolve("CHAT"), Some(Channel::Ooc));
        assert_eq!(settings.resolve("yell"), Some(Channel::Yell));
        settings.set_alias(Channel::Ooc, "  ");
        assert_eq!(settings.resolve("chat"), None);
    }

    #[test]
    fn history_is_bounded() {
        let mut settings = ChannelSettings::default();
        let now = Utc::now();
        for i in 0..(CHANNEL_HISTORY_LIMIT + 5) {
            settings.record(Channel::Say, &format!("line {}", i), now);
        }
        let all = settings.history(Channel::Say, CHANNEL_HISTORY_LIMIT);
        assert_eq!(all.len(), CHANNEL_HISTORY_LIMIT);
        assert_eq!(all[0].message, "line 5");
        let recent = settings.history(Channel::Say, 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].message, format!("line {}", CHANNEL_HISTORY_LIMIT + 4));
    }
}

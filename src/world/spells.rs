//! Spells: mana-priced actions outside the combat round loop.
//!
//! A cast either lands and pays its mana cost or fails and leaves the caster
//! untouched. The mana check, the effect and the payment happen under one
//! world write lock.

use log::debug;

use crate::world::combat::{format_kill_updates, strike_npc, NpcDamageResult, PlayerDamageResult};
use crate::world::errors::WorldError;
use crate::world::matching::unique_match;
use crate::world::state::World;
use crate::world::types::{default_npc_experience, RoomId};

pub const HEAL_MANA_COST: u32 = 10;
pub const BOLT_MANA_COST: u32 = 15;

/// Health restored by `heal` at the caster's level, before clamping.
pub fn heal_amount(level: u32) -> u32 {
    15 + 5 * level.max(1)
}

/// Damage dealt by `bolt` at the caster's level.
pub fn bolt_damage(level: u32) -> u32 {
    10 + 3 * level.max(1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealResult {
    /// Health actually gained after clamping to the maximum.
    pub restored: u32,
    pub health: u32,
    pub max_health: u32,
    /// Mana left after paying for the spell.
    pub mana: u32,
}

#[derive(Debug, Clone)]
pub enum BoltOutcome {
    Npc {
        result: NpcDamageResult,
        /// Experience awarded for a kill; 0 otherwise.
        experience: u32,
        levels_gained: u32,
    },
    Player(PlayerDamageResult),
}

enum Struck {
    Npc(NpcDamageResult),
    Player(PlayerDamageResult),
}

impl World {
    /// Spend mana to restore the caster's health.
    pub fn cast_heal(&self, name: &str) -> Result<HealResult, WorldError> {
        let (result, room) = {
            let mut state = self.write();
            let caster = state.online_mut(name)?;
            caster.ensure_stats();
            if caster.mana < HEAL_MANA_COST {
                return Err(WorldError::NotEnoughMana {
                    spell: "heal",
                    cost: HEAL_MANA_COST,
                    mana: caster.mana,
                });
            }
            caster.mana -= HEAL_MANA_COST;
            let before = caster.health;
            caster.health = caster
                .health
                .saturating_add(heal_amount(caster.level))
                .min(caster.max_health);
            let result = HealResult {
                restored: caster.health - before,
                health: caster.health,
                max_health: caster.max_health,
                mana: caster.mana,
            };
            (result, caster.room.clone())
        };
        self.send_to(
            name,
            &format!(
                "You channel restorative energy and recover {} health. ({}/{} HP)",
                result.restored, result.health, result.max_health
            ),
        );
        self.broadcast_to_room(&room, &format!("{} is bathed in soothing light.", name), Some(name));
        Ok(result)
    }

    /// Hurl a bolt at the NPC or player named by `token` in the caster's
    /// room. NPCs are matched first. Mana is only spent when the bolt hits.
    pub fn cast_bolt(&self, name: &str, token: &str) -> Result<BoltOutcome, WorldError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(WorldError::Empty("target"));
        }
        let (struck, room, pending) = {
            let mut guard = self.write();
            let state = &mut *guard;
            let caster = state.online_mut(name)?;
            caster.ensure_stats();
            if caster.mana < BOLT_MANA_COST {
                return Err(WorldError::NotEnoughMana {
                    spell: "bolt",
                    cost: BOLT_MANA_COST,
                    mana: caster.mana,
                });
            }
            if token.eq_ignore_ascii_case(&caster.name) {
                return Err(WorldError::SelfTarget);
            }
            let damage = bolt_damage(caster.level);
            let room = caster.room.clone();

            let npc = {
                let here = state.room(&room)?;
                unique_match(token, &here.npc_names(), true).map(|idx| here.npcs[idx].name.clone())
            };
            let (struck, pending) = match npc {
                Some(npc) => (Struck::Npc(strike_npc(state, &room, &npc, damage)?), None),
                None => {
                    let others: Vec<String> = state
                        .alive_players()
                        .filter(|p| p.room == room && p.name != name)
                        .map(|p| p.name.clone())
                        .collect();
                    let idx = unique_match(token, &others, false)
                        .ok_or_else(|| WorldError::NotHere(token.to_string()))?;
                    let (result, pending) = self.wound_player(state, &room, &others[idx], damage)?;
                    (Struck::Player(result), pending)
                }
            };
            if let Ok(caster) = state.online_mut(name) {
                caster.mana = caster.mana.saturating_sub(BOLT_MANA_COST);
            }
            (struck, room, pending)
        };
        if let Some((account, profile)) = pending {
            self.save_profile(&account, &profile);
        }

        match struck {
            Struck::Npc(result) => {
                let (experience, levels_gained) = self.after_bolt_on_npc(name, &room, &result);
                Ok(BoltOutcome::Npc {
                    result,
                    experience,
                    levels_gained,
                })
            }
            Struck::Player(result) => {
                self.after_bolt_on_player(name, &result);
                Ok(BoltOutcome::Player(result))
            }
        }
    }

    fn after_bolt_on_npc(&self, name: &str, room: &RoomId, result: &NpcDamageResult) -> (u32, u32) {
        let npc = &result.npc.name;
        self.send_to(
            name,
            &format!(
                "Arcs of energy slam into {} for {} damage. ({}/{} HP)",
                npc, result.damage, result.npc.health, result.npc.max_health
            ),
        );
        self.broadcast_to_room(
            room,
            &format!("{} hurls a crackling bolt at {} for {} damage!", name, npc, result.damage),
            Some(name),
        );
        if !result.defeated {
            return (0, 0);
        }

        self.send_to(name, &format!("Your magic fells {}!", npc));
        let experience = if result.npc.experience > 0 {
            result.npc.experience
        } else {
            default_npc_experience(result.npc.level)
        };
        let levels = self.award_experience(name, experience).unwrap_or(0);
        self.send_to(name, &format!("You gain {} experience.", experience));
        if levels > 0 {
            if let Some(p) = self.active_player(name) {
                self.send_to(name, &format!("You advance to level {}!", p.level));
            }
        }
        if !result.loot.is_empty() {
            let names: Vec<&str> = result.loot.iter().map(|i| i.name.as_str()).collect();
            self.broadcast_to_room(room, &format!("{} leaves behind {}.", npc, names.join(", ")), None);
        }
        for line in format_kill_updates(&self.record_npc_kill(name, npc)) {
            self.send_to(name, &line);
        }
        debug!("{} felled {} with a bolt", name, npc);
        (experience, levels)
    }

    fn after_bolt_on_player(&self, name: &str, result: &PlayerDamageResult) {
        let target = result.target.as_str();
        self.broadcast_except(
            &result.previous_room,
            &format!("{} unleashes a bolt at {} for {} damage!", name, target, result.damage),
            &[name, target],
        );
        if result.defeated {
            self.send_to(name, &format!("Your bolt overwhelms {}!", target));
            self.broadcast_except(
                &result.previous_room,
                &format!("{} collapses under the magical assault!", target),
                &[name, target],
            );
            self.send_to(target, &format!("{}'s bolt overwhelms you!", name));
            return;
        }
        self.send_to(
            name,
            &format!(
                "Your bolt scorches {} for {} damage. ({}/{} HP)",
                target, result.damage, result.remaining, result.max_health
            ),
        );
        self.send_to(
            target,
            &format!(
                "{}'s bolt burns you for {} damage! ({}/{} HP)",
                name, result.damage, result.remaining, result.max_health
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spell_strength_scales_with_level() {
        assert_eq!(heal_amount(1), 20);
        assert_eq!(heal_amount(3), 30);
        assert_eq!(bolt_damage(1), 13);
        assert_eq!(bolt_damage(4), 22);
        assert_eq!(bolt_damage(0), bolt_damage(1));
    }
}

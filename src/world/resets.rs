//! Room population restocking.
//!
//! A reset keeps `count` instances of a named NPC or item in its room.
//! Applying resets only ever tops a population up, so running them on a
//! fully stocked room changes nothing.

use log::debug;
use std::ops::AddAssign;

use crate::world::errors::WorldError;
use crate::world::matching::unique_match;
use crate::world::state::World;
use crate::world::types::{Reset, ResetKind, Room, RoomId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub npcs_spawned: usize,
    pub items_spawned: usize,
}

impl ResetReport {
    pub fn total(&self) -> usize {
        self.npcs_spawned + self.items_spawned
    }
}

impl AddAssign for ResetReport {
    fn add_assign(&mut self, other: Self) {
        self.npcs_spawned += other.npcs_spawned;
        self.items_spawned += other.items_spawned;
    }
}

fn apply_reset(room: &mut Room, reset: &Reset) -> ResetReport {
    let mut report = ResetReport::default();
    let target = reset.target_count();
    match reset.kind {
        ResetKind::Npc => {
            let present = room
                .npcs
                .iter()
                .filter(|npc| npc.name.eq_ignore_ascii_case(&reset.name))
                .count();
            for _ in present..target {
                room.npcs.push(reset.spawn_npc());
                report.npcs_spawned += 1;
            }
        }
        ResetKind::Item => {
            let present = room
                .items
                .iter()
                .filter(|item| item.name.eq_ignore_ascii_case(&reset.name))
                .count();
            for _ in present..target {
                room.items.push(reset.spawn_item());
                report.items_spawned += 1;
            }
        }
    }
    report
}

/// Top up every reset in the room.
pub fn apply_resets(room: &mut Room) -> ResetReport {
    let resets = room.resets.clone();
    let mut report = ResetReport::default();
    for reset in resets.iter().filter(|r| !r.name.is_empty()) {
        report += apply_reset(room, reset);
    }
    report
}

/// Insert `reset`, replacing an existing reset of the same kind and name,
/// then make sure its population is present.
pub(crate) fn upsert_reset(room: &mut Room, reset: Reset) -> ResetReport {
    let existing = room
        .resets
        .iter_mut()
        .find(|r| r.kind == reset.kind && r.name.eq_ignore_ascii_case(&reset.name));
    match existing {
        Some(slot) => *slot = reset.clone(),
        None => room.resets.push(reset.clone()),
    }
    if reset.kind == ResetKind::Npc {
        for npc in room
            .npcs
            .iter_mut()
            .filter(|npc| npc.name.eq_ignore_ascii_case(&reset.name))
        {
            npc.auto_greet = reset.auto_greet.clone();
        }
    }
    apply_reset(room, &reset)
}

/// Remove the reset of `kind` whose name matches `token`.
pub(crate) fn remove_reset(room: &mut Room, kind: ResetKind, token: &str) -> Result<Reset, WorldError> {
    let indices: Vec<usize> = room
        .resets
        .iter()
        .enumerate()
        .filter(|(_, r)| r.kind == kind)
        .map(|(idx, _)| idx)
        .collect();
    let names: Vec<&str> = indices.iter().map(|&idx| room.resets[idx].name.as_str()).collect();
    let found = unique_match(token, &names, true)
        .ok_or_else(|| WorldError::UnknownReset(token.trim().to_string()))?;
    Ok(room.resets.remove(indices[found]))
}

impl World {
    pub fn room_resets(&self, room: &RoomId) -> Result<Vec<Reset>, WorldError> {
        Ok(self.read().room(room)?.resets.clone())
    }

    /// Restock one room. Population is live state and is not written to the
    /// builder overlay.
    pub fn apply_room_resets(&self, room: &RoomId) -> Result<ResetReport, WorldError> {
        let mut state = self.write();
        let report = apply_resets(state.room_mut(room)?);
        if report.total() > 0 {
            debug!("Reset {}: {:?}", room, report);
        }
        Ok(report)
    }

    pub fn apply_all_resets(&self) -> ResetReport {
        let mut state = self.write();
        let mut report = ResetReport::default();
        for room in state.rooms.values_mut() {
            report += apply_resets(room);
        }
        debug!("World reset: {:?}", report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::types::Npc;

    #[test]
    fn satisfied_reset_is_a_no_op() {
        let mut room = Room::new("den", "Den", "")
            .with_npc(Npc::new("Wolf"))
            .with_reset(Reset::npc("Wolf", ""));
        let report = apply_resets(&mut room);
        assert_eq!(report.total(), 0);
        assert_eq!(room.npcs.len(), 1);
    }

    #[test]
    fn depleted_population_regenerates_to_count() {
        let mut room = Room::new("den", "Den", "")
            .with_reset(Reset::npc("Wolf", "").with_count(3))
            .with_reset(Reset::item("bone", "Chewed."));
        let report = apply_resets(&mut room);
        assert_eq!(report.npcs_spawned, 3);
        assert_eq!(report.items_spawned, 1);
        room.npcs.truncate(1);
        assert_eq!(apply_resets(&mut room).npcs_spawned, 2);
        assert_eq!(room.npcs.len(), 3);
    }

    #[test]
    fn zero_count_means_one() {
        let mut room = Room::new("den", "Den", "").with_reset(Reset::item("bone", "").with_count(0));
        apply_resets(&mut room);
        assert_eq!(room.items.len(), 1);
    }

    #[test]
    fn upsert_replaces_and_updates_greeting() {
        let mut room = Room::new("gate", "Gate", "");
        upsert_reset(&mut room, Reset::npc("Guard", "Halt."));
        upsert_reset(&mut room, Reset::npc("guard", "Welcome."));
        assert_eq!(room.resets.len(), 1);
        assert_eq!(room.npcs.len(), 1);
        assert_eq!(room.npcs[0].auto_greet, "Welcome.");
    }

    #[test]
    fn remove_reset_matches_by_prefix() {
        let mut room = Room::new("gate", "Gate", "")
            .with_reset(Reset::item("lantern", ""))
            .with_reset(Reset::npc("Lamplighter", ""));
        let removed = remove_reset(&mut room, ResetKind::Item, "lan").unwrap();
        assert_eq!(removed.name, "lantern");
        assert!(matches!(
            remove_reset(&mut room, ResetKind::Item, "lan"),
            Err(WorldError::UnknownReset(_))
        ));
        assert_eq!(room.resets.len(), 1);
    }
}

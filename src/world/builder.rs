//! In-game world editing.
//!
//! Every edit runs the same sequence under the world write lock: capture a
//! [`RoomUndo`] for the rooms it touches, apply the change, write the builder
//! overlay, and on a failed write put the captured rooms back. Memory and
//! disk never disagree about a builder room.
//!
//! Persistence happens while the lock is held. Edits are rare and the overlay
//! is small.

use log::{info, warn};

use crate::world::errors::WorldError;
use crate::world::loader::RoomSource;
use crate::world::matching::unique_match;
use crate::world::resets::{remove_reset, upsert_reset, ResetReport};
use crate::world::state::{Placed, World, WorldState};
use crate::world::types::{Npc, Reset, ResetKind, Room, RoomId, RoomRevision};

/// Prior value of one room and where it was loaded from. `None` means the
/// room did not exist.
#[derive(Debug, Clone)]
struct UndoEntry {
    id: RoomId,
    room: Option<Room>,
    source: Option<RoomSource>,
    placed: Option<Placed>,
}

/// Everything needed to put a set of rooms back exactly as they were.
#[derive(Debug, Clone, Default)]
pub(crate) struct RoomUndo {
    entries: Vec<UndoEntry>,
}

impl RoomUndo {
    pub(crate) fn capture(state: &WorldState, ids: &[RoomId]) -> Self {
        let mut entries: Vec<UndoEntry> = Vec::with_capacity(ids.len());
        for id in ids {
            if entries.iter().any(|e| &e.id == id) {
                continue;
            }
            entries.push(UndoEntry {
                id: id.clone(),
                room: state.rooms.get(id).cloned(),
                source: state.sources.get(id).cloned(),
                placed: state.placed.get(id).cloned(),
            });
        }
        Self { entries }
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = &RoomId> {
        self.entries.iter().map(|e| &e.id)
    }

    pub(crate) fn restore(self, state: &mut WorldState) {
        for entry in self.entries.into_iter().rev() {
            match entry.room {
                Some(room) => {
                    state.rooms.insert(entry.id.clone(), room);
                }
                None => {
                    state.rooms.remove(&entry.id);
                }
            }
            match entry.source {
                Some(source) => {
                    state.sources.insert(entry.id.clone(), source);
                }
                None => {
                    state.sources.remove(&entry.id);
                }
            }
            match entry.placed {
                Some(placed) => {
                    state.placed.insert(entry.id, placed);
                }
                None => {
                    state.placed.remove(&entry.id);
                }
            }
        }
    }
}

fn required<'a>(value: &'a str, what: &'static str) -> Result<&'a str, WorldError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(WorldError::Empty(what))
    } else {
        Ok(trimmed)
    }
}

impl World {
    /// Run `edit` against the rooms named in `ids`, then persist the builder
    /// overlay. Any failure (from the edit or the write) restores the rooms.
    fn persist_edit<T>(
        &self,
        ids: &[RoomId],
        edit: impl FnOnce(&mut WorldState) -> Result<T, WorldError>,
    ) -> Result<T, WorldError> {
        let mut guard = self.write();
        let state = &mut *guard;
        let undo = RoomUndo::capture(state, ids);

        let value = match edit(state) {
            Ok(value) => value,
            Err(e) => {
                undo.restore(state);
                return Err(e);
            }
        };

        for id in undo.ids() {
            if state.rooms.contains_key(id) {
                state.sources.insert(id.clone(), RoomSource::Builder);
            }
        }
        if let Err(e) = self.persistence.save_builder_rooms(&state.builder_rooms()) {
            warn!("Builder overlay write failed, rolling back: {}", e);
            undo.restore(state);
            return Err(e);
        }
        Ok(value)
    }

    pub fn create_room(&self, id: &str, title: &str, editor: &str) -> Result<(), WorldError> {
        let id = RoomId::new(required(id, "room id")?);
        let title = required(title, "room title")?.to_string();
        self.persist_edit(std::slice::from_ref(&id), |state| {
            if state.rooms.contains_key(&id) {
                return Err(WorldError::RoomExists(id.clone()));
            }
            let mut room = Room::new(id.clone(), &title, "");
            room.push_revision(editor);
            state.rooms.insert(id.clone(), room);
            state.placed.insert(id.clone(), Placed::default());
            Ok(())
        })?;
        info!("{} created room {}", editor, id);
        Ok(())
    }

    pub fn update_room_title(&self, room: &RoomId, title: &str, editor: &str) -> Result<(), WorldError> {
        let title = required(title, "room title")?.to_string();
        self.persist_edit(std::slice::from_ref(room), |state| {
            let target = state.room_mut(room)?;
            target.title = title;
            target.push_revision(editor);
            Ok(())
        })
    }

    pub fn update_room_description(
        &self,
        room: &RoomId,
        description: &str,
        editor: &str,
    ) -> Result<(), WorldError> {
        let description = description.trim().to_string();
        self.persist_edit(std::slice::from_ref(room), |state| {
            let target = state.room_mut(room)?;
            target.description = description;
            target.push_revision(editor);
            Ok(())
        })
    }

    /// Point `direction` in `room` at `target`, replacing any existing exit.
    pub fn set_exit(&self, room: &RoomId, direction: &str, target: &RoomId) -> Result<(), WorldError> {
        let direction = required(direction, "direction")?.to_ascii_lowercase();
        self.persist_edit(std::slice::from_ref(room), |state| {
            state.room(target)?;
            state
                .room_mut(room)?
                .exits
                .insert(direction, target.clone());
            Ok(())
        })
    }

    pub fn clear_exit(&self, room: &RoomId, direction: &str) -> Result<(), WorldError> {
        let direction = required(direction, "direction")?.to_ascii_lowercase();
        self.persist_edit(std::slice::from_ref(room), |state| {
            state
                .room_mut(room)?
                .exits
                .remove(&direction)
                .map(|_| ())
                .ok_or(WorldError::NoSuchExit)
        })
    }

    /// Set `from --direction--> to` and, when given, the return exit
    /// `to --reverse--> from`, as one edit.
    pub fn link_rooms(
        &self,
        from: &RoomId,
        direction: &str,
        to: &RoomId,
        reverse: Option<&str>,
    ) -> Result<(), WorldError> {
        let direction = required(direction, "direction")?.to_ascii_lowercase();
        let reverse = match reverse {
            Some(dir) => Some(required(dir, "return direction")?.to_ascii_lowercase()),
            None => None,
        };
        let ids = [from.clone(), to.clone()];
        self.persist_edit(&ids, |state| {
            state.room(to)?;
            state
                .room_mut(from)?
                .exits
                .insert(direction, to.clone());
            if let Some(reverse) = reverse {
                state.room_mut(to)?.exits.insert(reverse, from.clone());
            }
            Ok(())
        })
    }

    /// Add or update an NPC reset and make sure the NPC is present.
    pub fn upsert_room_npc(&self, room: &RoomId, name: &str, auto_greet: &str) -> Result<ResetReport, WorldError> {
        let name = required(name, "npc name")?.to_string();
        let reset = Reset::npc(&name, auto_greet);
        self.persist_edit(std::slice::from_ref(room), |state| {
            Ok(upsert_reset(state.room_mut(room)?, reset))
        })
    }

    /// Remove an NPC reset and every live NPC of that name.
    pub fn remove_room_npc(&self, room: &RoomId, token: &str) -> Result<Reset, WorldError> {
        required(token, "npc name")?;
        self.persist_edit(std::slice::from_ref(room), |state| {
            let target = state.room_mut(room)?;
            let removed = match remove_reset(target, ResetKind::Npc, token) {
                Ok(reset) => reset,
                Err(e) => {
                    // A hand-placed NPC without a reset can still be removed.
                    let idx = unique_match(token, &target.npc_names(), true).ok_or(e)?;
                    let npc = target.npcs.remove(idx);
                    Reset::npc(&npc.name, &npc.auto_greet)
                }
            };
            target
                .npcs
                .retain(|npc| !npc.name.eq_ignore_ascii_case(&removed.name));
            if let Some(placed) = state.placed.get_mut(room) {
                placed
                    .npcs
                    .retain(|npc| !npc.name.eq_ignore_ascii_case(&removed.name));
            }
            Ok(removed)
        })
    }

    pub fn upsert_room_item_reset(
        &self,
        room: &RoomId,
        name: &str,
        description: &str,
    ) -> Result<ResetReport, WorldError> {
        let name = required(name, "item name")?.to_string();
        let reset = Reset::item(&name, description);
        self.persist_edit(std::slice::from_ref(room), |state| {
            Ok(upsert_reset(state.room_mut(room)?, reset))
        })
    }

    /// Remove an item reset. Items already lying in the room stay.
    pub fn remove_room_item_reset(&self, room: &RoomId, token: &str) -> Result<Reset, WorldError> {
        required(token, "item name")?;
        self.persist_edit(std::slice::from_ref(room), |state| {
            remove_reset(state.room_mut(room)?, ResetKind::Item, token)
        })
    }

    /// Replace the NPCs, items and resets of `destination` with copies of
    /// those in `source`. Cloned NPCs start at full health.
    pub fn clone_room_population(&self, source: &RoomId, destination: &RoomId) -> Result<(), WorldError> {
        if source == destination {
            return Ok(());
        }
        self.persist_edit(std::slice::from_ref(destination), |state| {
            let template = state.room(source)?.clone();
            let placed = state.placed.get(source).cloned().unwrap_or_default();
            let target = state.room_mut(destination)?;
            target.npcs = template.npcs.into_iter().map(Npc::full_strength).collect();
            target.items = template.items;
            target.resets = template.resets;
            state.placed.insert(destination.clone(), placed);
            Ok(())
        })
    }

    pub fn room_revisions(&self, room: &RoomId) -> Result<Vec<RoomRevision>, WorldError> {
        Ok(self.read().room(room)?.revisions.clone())
    }

    /// Restore a room's title and description from revision `number`. The
    /// revert itself is recorded as a new revision.
    pub fn revert_room_to_revision(
        &self,
        room: &RoomId,
        number: u32,
        editor: &str,
    ) -> Result<RoomRevision, WorldError> {
        self.persist_edit(std::slice::from_ref(room), |state| {
            let target = state.room_mut(room)?;
            let revision = target
                .revisions
                .iter()
                .find(|rev| rev.number == number)
                .cloned()
                .ok_or(WorldError::UnknownRevision(number))?;
            target.title = revision.title.clone();
            target.description = revision.description.clone();
            target.push_revision(editor);
            Ok(revision)
        })
    }
}

use thiserror::Error;

use crate::world::types::RoomId;

/// Broad classification of a [`WorldError`], used by callers to decide whether
/// a failed operation is worth retrying and how to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Empty or unknown identifiers. Nothing changed; safe to retry.
    Validation,
    /// Conflicts with live state (duplicate login, offline player, ...).
    /// Rejected before any write.
    State,
    /// The durable write failed and the in-memory change was rolled back.
    Persistence,
    /// Area or quest definitions could not be loaded.
    Load,
}

/// Errors that can arise while operating on the world model.
#[derive(Debug, Error)]
pub enum WorldError {
    /// A required identifier was empty after trimming.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("unknown room: {0}")]
    UnknownRoom(RoomId),

    #[error("room {0} already exists")]
    RoomExists(RoomId),

    #[error("you can't go that way")]
    NoSuchExit,

    #[error("you don't see that here")]
    ItemNotFound,

    #[error("you aren't carrying that")]
    ItemNotCarried,

    /// An NPC or player named by the caller is not present.
    #[error("{0} is not here")]
    NotHere(String),

    #[error("no such quest")]
    UnknownQuest,

    #[error("unknown revision: {0}")]
    UnknownRevision(u32),

    #[error("no reset named {0}")]
    UnknownReset(String),

    #[error("'{0}' is not a valid alias")]
    InvalidAlias(String),

    #[error("{0} is already connected")]
    AlreadyConnected(String),

    #[error("{0} is not online")]
    NotOnline(String),

    #[error("that name is taken")]
    NameTaken,

    #[error("you cannot attack yourself")]
    SelfTarget,

    #[error("you are already on that quest")]
    QuestActive,

    #[error("you have already completed that quest")]
    QuestCompleted,

    #[error("you have not accepted that quest")]
    QuestNotAccepted,

    #[error("you have not completed the objectives")]
    ObjectivesIncomplete,

    #[error("you still need {count} {item}")]
    MissingItem { item: String, count: u32 },

    #[error("you lack the mana to cast {spell} ({mana}/{cost})")]
    NotEnoughMana {
        spell: &'static str,
        cost: u32,
        mana: u32,
    },

    #[error("too many fights are already underway; try again shortly")]
    CombatCapacity,

    /// Combat needs a running tokio runtime to schedule rounds.
    #[error("combat is unavailable right now")]
    CombatUnavailable,

    #[error("world does not have an areas path configured")]
    NoAreasPath,

    /// Malformed or inconsistent area/quest definitions.
    #[error("load error: {0}")]
    Load(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// A persistence backend refused the write for a reason of its own.
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl WorldError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorldError::Empty(_)
            | WorldError::UnknownRoom(_)
            | WorldError::RoomExists(_)
            | WorldError::NoSuchExit
            | WorldError::ItemNotFound
            | WorldError::ItemNotCarried
            | WorldError::NotHere(_)
            | WorldError::UnknownQuest
            | WorldError::UnknownRevision(_)
            | WorldError::UnknownReset(_)
            | WorldError::InvalidAlias(_)
            | WorldError::SelfTarget => ErrorKind::Validation,
            WorldError::AlreadyConnected(_)
            | WorldError::NotOnline(_)
            | WorldError::NameTaken
            | WorldError::QuestActive
            | WorldError::QuestCompleted
            | WorldError::QuestNotAccepted
            | WorldError::ObjectivesIncomplete
            | WorldError::MissingItem { .. }
            | WorldError::NotEnoughMana { .. }
            | WorldError::CombatCapacity
            | WorldError::CombatUnavailable => ErrorKind::State,
            WorldError::Io(_)
            | WorldError::Json(_)
            | WorldError::Sled(_)
            | WorldError::Bincode(_)
            | WorldError::SchemaMismatch { .. }
            | WorldError::Persistence(_) => ErrorKind::Persistence,
            WorldError::NoAreasPath | WorldError::Load(_) => ErrorKind::Load,
        }
    }
}

//! # lumenmud - World Simulation Core for a Persistent Text World
//!
//! lumenmud holds the authoritative state of a multiplayer text world: the
//! room graph, who is connected and where, NPC and item populations, quest
//! progress and the fights going on in each room. Transports (telnet, SSH,
//! web sockets) and the command parser live outside this crate and drive it
//! through the [`world::World`] API.
//!
//! ## Features
//!
//! - **Layered areas**: core area files plus a builder overlay that wins on
//!   id collisions and is rewritten atomically on every builder edit.
//! - **Persist-or-rollback building**: a builder edit that cannot be saved is
//!   undone in memory before the lock is released.
//! - **Fuzzy names**: exits, items, NPCs and players resolve from partial
//!   input, and ambiguous input resolves to nothing.
//! - **Quests**: accept, track kills, turn in for experience and items.
//! - **Per-room combat**: each active room runs its own tokio task on a fixed
//!   round interval and shuts itself down when the fight is over.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lumenmud::config::Config;
//! use lumenmud::world::{PlayerProfile, WorldBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let world = WorldBuilder::from_config(&config).build()?;
//!
//!     let mut output = world.add_player("Ada", None, false, PlayerProfile::default())?;
//!     world.move_player("Ada", "north")?;
//!     while let Ok(line) = output.try_recv() {
//!         println!("{}", line);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`world`] - World model, registry, builder edits, quests and combat
//! - [`storage`] - sled-backed player profile store
//! - [`config`] - TOML configuration

pub mod config;
pub mod storage;
pub mod world;

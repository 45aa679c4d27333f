//! # Storage Module - Player Profile Persistence
//!
//! Player profiles (last room, home, channel preferences and aliases) are kept
//! in an embedded [sled](https://docs.rs/sled) database, one bincode record per
//! account. The world only ever talks to this through the
//! [`ProfileStore`](crate::world::ProfileStore) trait, and treats every write
//! as best-effort.
//!
//! ## Layout
//!
//! ```text
//! data/profiles/       ← sled database directory
//!   tree "profiles"    ← profiles:<account> → ProfileRecord
//! ```
//!
//! Records carry a schema version; a record written by a different schema is
//! reported as [`WorldError::SchemaMismatch`] rather than silently decoded.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lumenmud::storage::SledProfileStoreBuilder;
//! use lumenmud::world::World;
//!
//! # fn main() -> Result<(), lumenmud::world::WorldError> {
//! let profiles = SledProfileStoreBuilder::new("data/profiles").open()?;
//! let world = World::builder()
//!     .areas_path("data/areas")
//!     .profile_store(Arc::new(profiles))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use sled::IVec;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::world::{PlayerProfile, ProfileStore, WorldError};

const TREE_PROFILES: &str = "profiles";

/// Bumped whenever [`ProfileRecord`] changes shape.
pub const PROFILE_SCHEMA_VERSION: u8 = 1;

/// Stored form of a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub schema_version: u8,
    pub account: String,
    pub updated_at: DateTime<Utc>,
    pub profile: PlayerProfile,
}

/// Helper builder so tests can create throwaway stores with custom paths.
pub struct SledProfileStoreBuilder {
    path: PathBuf,
    flush_on_write: bool,
}

impl SledProfileStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            flush_on_write: true,
        }
    }

    /// Skip the fsync after each save. Faster, but a crash may lose the most
    /// recent profile changes.
    pub fn without_flush(mut self) -> Self {
        self.flush_on_write = false;
        self
    }

    pub fn open(self) -> Result<SledProfileStore, WorldError> {
        SledProfileStore::open_with_options(self.path, self.flush_on_write)
    }
}

/// Sled-backed [`ProfileStore`].
pub struct SledProfileStore {
    path: PathBuf,
    _db: sled::Db,
    profiles: sled::Tree,
    flush_on_write: bool,
}

impl fmt::Debug for SledProfileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SledProfileStore")
            .field("path", &self.path)
            .field("flush_on_write", &self.flush_on_write)
            .finish()
    }
}

impl SledProfileStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WorldError> {
        Self::open_with_options(path, true)
    }

    fn open_with_options<P: AsRef<Path>>(path: P, flush_on_write: bool) -> Result<Self, WorldError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let profiles = db.open_tree(TREE_PROFILES)?;
        debug!("Opened profile store at {}", path_ref.display());
        Ok(Self {
            path: path_ref.to_path_buf(),
            _db: db,
            profiles,
            flush_on_write,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn profile_key(account: &str) -> Vec<u8> {
        format!("profiles:{}", account.trim().to_ascii_lowercase()).into_bytes()
    }

    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, WorldError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, WorldError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    /// Full stored record for `account`, if any.
    pub fn record(&self, account: &str) -> Result<Option<ProfileRecord>, WorldError> {
        let Some(bytes) = self.profiles.get(Self::profile_key(account))? else {
            return Ok(None);
        };
        let record: ProfileRecord = Self::deserialize(bytes)?;
        if record.schema_version != PROFILE_SCHEMA_VERSION {
            return Err(WorldError::SchemaMismatch {
                entity: "profile",
                expected: PROFILE_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(Some(record))
    }

    /// Stored account keys, sorted.
    pub fn list_accounts(&self) -> Result<Vec<String>, WorldError> {
        let mut accounts = Vec::new();
        for entry in self.profiles.scan_prefix(b"profiles:") {
            let (key, _) = entry?;
            let text = String::from_utf8_lossy(&key);
            if let Some(account) = text.strip_prefix("profiles:") {
                accounts.push(account.to_string());
            }
        }
        accounts.sort();
        Ok(accounts)
    }

    pub fn delete_profile(&self, account: &str) -> Result<bool, WorldError> {
        let removed = self.profiles.remove(Self::profile_key(account))?.is_some();
        if removed && self.flush_on_write {
            self.profiles.flush()?;
        }
        Ok(removed)
    }
}

impl ProfileStore for SledProfileStore {
    fn profile(&self, account: &str) -> Result<PlayerProfile, WorldError> {
        Ok(self
            .record(account)?
            .map(|record| record.profile)
            .unwrap_or_default())
    }

    fn save_profile(&self, account: &str, profile: &PlayerProfile) -> Result<(), WorldError> {
        let record = ProfileRecord {
            schema_version: PROFILE_SCHEMA_VERSION,
            account: account.to_string(),
            updated_at: Utc::now(),
            profile: profile.clone(),
        };
        let bytes = Self::serialize(&record)?;
        self.profiles.insert(Self::profile_key(account), bytes)?;
        if self.flush_on_write {
            self.profiles.flush()?;
        }
        Ok(())
    }
}

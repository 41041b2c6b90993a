//! Core CooldownStore implementation

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;

/// A single persisted cooldown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownRecord {
    /// Requester identity as supplied by the transport
    pub identity: String,
    /// When the identity was last granted an elevated tier
    pub last_elevated_at: DateTime<Utc>,
}

/// Outcome of [`CooldownStore::put`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// A new record was written
    Inserted,
    /// A record already existed and was left untouched
    AlreadyPresent,
}

/// Identity -> last-elevated-at mapping, snapshotted to a JSON file
///
/// Not internally synchronized; owners wrap it in a lock so that a
/// `get`-then-`put` sequence is atomic.
pub struct CooldownStore {
    /// Snapshot file (None for in-memory stores)
    path: Option<PathBuf>,
    records: BTreeMap<String, DateTime<Utc>>,
}

impl CooldownStore {
    /// Load the store from `path`
    ///
    /// A missing file yields an empty store. Unreadable or malformed content
    /// is logged and also yields an empty store.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "CooldownStore::load: called");

        let records = match fs::read_to_string(&path) {
            Ok(content) => parse_snapshot(&path, &content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "No cooldown file found, starting empty");
                BTreeMap::new()
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read cooldown file, starting empty");
                BTreeMap::new()
            }
        };

        info!(path = %path.display(), count = records.len(), "Loaded cooldowns");
        Self {
            path: Some(path),
            records,
        }
    }

    /// Create a store that is never written to disk
    pub fn in_memory() -> Self {
        debug!("CooldownStore::in_memory: called");
        Self {
            path: None,
            records: BTreeMap::new(),
        }
    }

    /// Path of the snapshot file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, identity: &str) -> Option<DateTime<Utc>> {
        self.records.get(identity).copied()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.records.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, ordered by identity
    pub fn records(&self) -> Vec<CooldownRecord> {
        self.records
            .iter()
            .map(|(identity, at)| CooldownRecord {
                identity: identity.clone(),
                last_elevated_at: *at,
            })
            .collect()
    }

    /// Record a cooldown for `identity`
    ///
    /// Existing records are never overwritten.
    pub fn put(&mut self, identity: &str, at: DateTime<Utc>) -> PutOutcome {
        debug!(%identity, %at, "CooldownStore::put: called");
        if self.records.contains_key(identity) {
            error!(%identity, "Identity is already on cooldown, not overwriting");
            return PutOutcome::AlreadyPresent;
        }

        self.records.insert(identity.to_string(), at);
        info!(%identity, "Added identity to cooldown list");
        self.persist();
        PutOutcome::Inserted
    }

    /// Remove the record for `identity`; returns whether one existed
    pub fn remove(&mut self, identity: &str) -> bool {
        debug!(%identity, "CooldownStore::remove: called");
        if self.records.remove(identity).is_none() {
            debug!(%identity, "CooldownStore::remove: no record");
            return false;
        }

        info!(%identity, "Cleared cooldown");
        self.persist();
        true
    }

    /// Remove every record; returns how many were removed
    pub fn clear_all(&mut self) -> usize {
        debug!("CooldownStore::clear_all: called");
        let removed = self.records.len();
        self.records.clear();
        info!(removed, "Cleared all cooldowns");
        self.persist();
        removed
    }

    /// Write the full mapping to disk
    ///
    /// The snapshot goes to a temp file in the same directory and is renamed
    /// over the target, under an exclusive lock on a sidecar `.lock` file so
    /// writers in other processes do not interleave.
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = self.path.as_deref() else {
            debug!("CooldownStore::save: in-memory store, skipping");
            return Ok(());
        };
        debug!(?path, count = self.records.len(), "CooldownStore::save: called");

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let snapshot: BTreeMap<&str, String> = self
            .records
            .iter()
            .map(|(identity, at)| (identity.as_str(), at.to_rfc3339_opts(SecondsFormat::Millis, true)))
            .collect();
        let content = serde_json::to_string_pretty(&snapshot)?;

        let lock_file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path(path))?;
        FileExt::lock_exclusive(&lock_file)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)?;

        FileExt::unlock(&lock_file)?;
        debug!(?path, "CooldownStore::save: snapshot written");
        Ok(())
    }

    /// Save after a mutation; failures leave the in-memory state authoritative
    fn persist(&self) {
        if let Err(e) = self.save() {
            error!(error = %e, "Failed to save cooldown file");
        }
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

fn parse_snapshot(path: &Path, content: &str) -> BTreeMap<String, DateTime<Utc>> {
    debug!(?path, "parse_snapshot: called");
    if content.trim().is_empty() {
        debug!("parse_snapshot: empty file");
        return BTreeMap::new();
    }

    let raw: BTreeMap<String, String> = match serde_json::from_str(content) {
        Ok(raw) => raw,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Malformed cooldown file, starting empty");
            return BTreeMap::new();
        }
    };

    raw.into_iter()
        .filter_map(|(identity, stamp)| match DateTime::parse_from_rfc3339(&stamp) {
            Ok(at) => Some((identity, at.with_timezone(&Utc))),
            Err(e) => {
                warn!(%identity, %stamp, error = %e, "Dropping cooldown with unreadable timestamp");
                None
            }
        })
        .collect()
}

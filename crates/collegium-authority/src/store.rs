//! # Contributor Store
//!
//! Persistence layer for contributor profiles, backed by Sled. Keeps
//! authority and track-record scores across restarts so a process
//! bounce does not reset the meritocracy.
//!
//! ## Storage Structure
//!
//! One tree:
//!
//! | Tree | Key | Value |
//! |------|-----|-------|
//! | `contributors` | contributor id | serialized [`Contributor`] |
//!
//! ## Thread Safety
//!
//! The underlying Sled database is thread-safe; reads and writes from
//! multiple threads are fine. Read-modify-write sequences on a single
//! contributor are serialized one level up, in the scorer.

use std::path::Path;

use crate::error::AuthorityError;
use crate::models::Contributor;
use crate::Result;

/// Tree name for contributor profiles.
const CONTRIBUTOR_TREE: &str = "contributors";

/// Wrapper around a Sled database holding contributor profiles.
#[derive(Clone)]
pub struct ContributorStore {
    db: sled::Db,
    contributors: sled::Tree,
}

impl ContributorStore {
    /// Opens or creates a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::Storage`] if the database cannot be
    /// opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let contributors = db.open_tree(CONTRIBUTOR_TREE)?;
        Ok(Self { db, contributors })
    }

    /// Creates a temporary in-memory store for testing.
    pub fn temporary() -> Result<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        let contributors = db.open_tree(CONTRIBUTOR_TREE)?;
        Ok(Self { db, contributors })
    }

    /// Stores a profile, overwriting any existing one for the same id.
    pub fn put(&self, contributor: &Contributor) -> Result<()> {
        let bytes = serde_json::to_vec(contributor)?;
        self.contributors.insert(contributor.id.as_bytes(), bytes)?;
        Ok(())
    }

    /// Loads a profile by id.
    pub fn get(&self, id: &str) -> Result<Option<Contributor>> {
        match self.contributors.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Loads a profile or fails with [`AuthorityError::UnknownContributor`].
    pub fn get_required(&self, id: &str) -> Result<Contributor> {
        self.get(id)?
            .ok_or_else(|| AuthorityError::UnknownContributor(id.to_string()))
    }

    /// Returns true if the id is registered.
    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.contributors.contains_key(id.as_bytes())?)
    }

    /// Iterates all stored profiles in id order.
    pub fn list(&self) -> Result<Vec<Contributor>> {
        let mut profiles = Vec::new();
        for entry in self.contributors.iter() {
            let (_, bytes) = entry?;
            profiles.push(serde_json::from_slice(&bytes)?);
        }
        Ok(profiles)
    }

    /// Number of registered contributors.
    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    /// Returns true if no contributors are registered.
    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    /// Flushes pending writes to disk.
    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }
}

impl std::fmt::Debug for ContributorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContributorStore")
            .field("contributor_count", &self.len())
            .finish()
    }
}

//! Collision-free persistent subtitle ids.
//!
//! Ids are short random strings checked against a sorted inventory of every
//! id ever handed out. The inventory lives behind an [`InventoryStore`] and
//! is read once and persisted once per generation batch.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::db::StoreError;

pub const ID_LENGTH: usize = 4;
pub const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Default retry budget is `count * DEFAULT_RETRY_FACTOR` draws...
pub const DEFAULT_RETRY_FACTOR: usize = 10;
/// ...but never fewer than this many
pub const DEFAULT_MIN_ATTEMPTS: usize = 100;

#[derive(Error, Debug)]
pub enum IdError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("could not find {requested} free ids in {attempts} attempts ({found} found); inventory near exhaustion or broken random source")]
    Exhausted {
        requested: usize,
        found: usize,
        attempts: usize,
    },
}

/// Persisted set of every id handed out so far.
///
/// `load` returns the ids sorted; `persist` replaces the stored set.
pub trait InventoryStore {
    fn load(&mut self) -> Result<Vec<String>, IdError>;
    fn persist(&mut self, inventory: &[String]) -> Result<(), IdError>;
}

/// Something that hands out fresh persistent ids.
pub trait IdSource {
    fn generate(&mut self, count: usize) -> Result<Vec<String>, IdError>;
}

/// In-memory inventory, for tests and one-off runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryInventory {
    pub ids: Vec<String>,
    pub persist_count: usize,
}

impl MemoryInventory {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        ids.sort_unstable();
        Self {
            ids,
            persist_count: 0,
        }
    }
}

impl InventoryStore for MemoryInventory {
    fn load(&mut self) -> Result<Vec<String>, IdError> {
        // `ids` is public and may have been filled out of order
        let mut ids = self.ids.clone();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn persist(&mut self, inventory: &[String]) -> Result<(), IdError> {
        self.ids = inventory.to_vec();
        self.persist_count += 1;
        Ok(())
    }
}

/// Newline-delimited inventory file, rewritten atomically.
#[derive(Debug, Clone)]
pub struct FileInventory {
    path: PathBuf,
}

impl FileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InventoryStore for FileInventory {
    fn load(&mut self) -> Result<Vec<String>, IdError> {
        if !self.path.exists() {
            debug!("Inventory {} does not exist yet", self.path.display());
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        let mut ids: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        ids.sort_unstable();
        debug!("Loaded {} ids from {}", ids.len(), self.path.display());
        Ok(ids)
    }

    fn persist(&mut self, inventory: &[String]) -> Result<(), IdError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        // Write next to the target, then rename over it
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        for id in inventory {
            writeln!(tmp, "{}", id)?;
        }
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!("Persisted {} ids to {}", inventory.len(), self.path.display());
        Ok(())
    }
}

/// Generates ids absent from the inventory and from the current batch.
pub struct PersistentIdGenerator<S, R = StdRng> {
    store: S,
    rng: R,
    retry_factor: usize,
    min_attempts: usize,
}

impl<S: InventoryStore> PersistentIdGenerator<S, StdRng> {
    pub fn new(store: S) -> Self {
        Self::with_rng(store, StdRng::from_os_rng())
    }

    /// Deterministic generator for reproducible runs
    pub fn seeded(store: S, seed: u64) -> Self {
        Self::with_rng(store, StdRng::seed_from_u64(seed))
    }
}

impl<S: InventoryStore, R: Rng> PersistentIdGenerator<S, R> {
    pub fn with_rng(store: S, rng: R) -> Self {
        Self {
            store,
            rng,
            retry_factor: DEFAULT_RETRY_FACTOR,
            min_attempts: DEFAULT_MIN_ATTEMPTS,
        }
    }

    pub fn with_retry_budget(mut self, retry_factor: usize, min_attempts: usize) -> Self {
        self.retry_factor = retry_factor;
        self.min_attempts = min_attempts;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn random_id(&mut self) -> String {
        (0..ID_LENGTH)
            .map(|_| ID_ALPHABET[self.rng.random_range(0..ID_ALPHABET.len())] as char)
            .collect()
    }

    /// Draw `count` new ids and record them in the inventory.
    ///
    /// Ids are returned in draw order. On exhaustion nothing is persisted.
    pub fn generate(&mut self, count: usize) -> Result<Vec<String>, IdError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let inventory = self.store.load()?;
        let budget = (count * self.retry_factor).max(self.min_attempts);

        let mut batch: Vec<String> = Vec::with_capacity(count);
        let mut drawn: HashSet<String> = HashSet::with_capacity(count);
        let mut attempts = 0usize;

        while batch.len() < count {
            if attempts >= budget {
                return Err(IdError::Exhausted {
                    requested: count,
                    found: batch.len(),
                    attempts,
                });
            }
            attempts += 1;

            let candidate = self.random_id();
            if inventory.binary_search(&candidate).is_ok() || drawn.contains(&candidate) {
                continue;
            }
            drawn.insert(candidate.clone());
            batch.push(candidate);
        }

        let merged = merge_into_inventory(inventory, &batch);
        self.store.persist(&merged)?;
        debug!("Generated {} ids in {} attempts", count, attempts);

        Ok(batch)
    }
}

impl<S: InventoryStore, R: Rng> IdSource for PersistentIdGenerator<S, R> {
    fn generate(&mut self, count: usize) -> Result<Vec<String>, IdError> {
        PersistentIdGenerator::generate(self, count)
    }
}

/// Merge new ids into a sorted inventory, keeping it sorted.
pub fn merge_into_inventory(inventory: Vec<String>, new_ids: &[String]) -> Vec<String> {
    let mut new_sorted: Vec<&String> = new_ids.iter().collect();
    new_sorted.sort_unstable();

    let mut merged = Vec::with_capacity(inventory.len() + new_sorted.len());
    let mut new_iter = new_sorted.into_iter().peekable();

    for id in inventory {
        while let Some(next) = new_iter.next_if(|n| **n < id) {
            merged.push(next.clone());
        }
        merged.push(id);
    }
    merged.extend(new_iter.cloned());
    merged
}

/// Whether `id` has the shape of a generated id
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LENGTH && id.bytes().all(|b| ID_ALPHABET.contains(&b))
}

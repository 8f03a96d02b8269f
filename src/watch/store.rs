// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! String key/value persistence shared by the foreground and the background
//! monitor.
//!
//! The store is the only state the two sides share. It offers no list or scan
//! operation, so the set of watched flights lives in a [`WatchIndex`] encoded
//! under [`INDEX_KEY`], next to one `flight_<id>` entry per flight. Writes are
//! last-writer-wins.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use adsb_client::Altitude;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::status::StatusCategory;

/// Key holding the encoded watch index.
pub const INDEX_KEY: &str = "watchlist";

const FLIGHT_KEY_PREFIX: &str = "flight_";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored value could not be encoded or decoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("store lock poisoned: {0}")]
    Poisoned(String),
}

/// Minimal string key/value store.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Delete `key`. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

impl<K: KvStore + ?Sized> KvStore for Arc<K> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }
}

/// In-process store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON object in a file, rewritten on every write.
///
/// Every operation rereads the file, so writes from another process are seen
/// by the next read.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Default location under the platform data directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("flightwatch").join("watch.json"))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a sibling file and rename it over the store, so a reader
    /// never sees a half-written file.
    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(entries)?;
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        fs::write(&staging, contents)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// Ordered set of watched flight ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchIndex {
    ids: Vec<String>,
}

impl WatchIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` unless already present. Returns whether it was added.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push(id.to_string());
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| existing != id);
        self.ids.len() != before
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for WatchIndex {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut index = Self::new();
        for id in iter {
            index.insert(id);
        }
        index
    }
}

/// Persisted state of one watched flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEntry {
    pub status: StatusCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<Altitude>,
}

impl WatchEntry {
    #[must_use]
    pub fn new(status: StatusCategory, altitude: Option<Altitude>) -> Self {
        Self { status, altitude }
    }
}

fn flight_key(id: &str) -> String {
    format!("{FLIGHT_KEY_PREFIX}{id}")
}

/// Typed view of the watch index and per-flight entries over a [`KvStore`].
#[derive(Debug, Clone)]
pub struct WatchStore<K> {
    kv: K,
}

impl<K: KvStore> WatchStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Start a fresh watch: forget any leftover index and entries, then write
    /// one entry per initial flight and a new index holding exactly those ids.
    ///
    /// A leftover index that cannot be decoded is replaced without deleting
    /// its entries, since the store has no way to list them. Those orphaned
    /// `flight_` keys stay behind until overwritten by a later watch.
    pub fn reset(&self, initial: &BTreeMap<String, StatusCategory>) -> Result<(), StoreError> {
        match self.index() {
            Ok(leftover) => {
                for id in leftover.iter().filter(|id| !initial.contains_key(*id)) {
                    self.kv.delete(&flight_key(id))?;
                }
            }
            Err(e) => warn!("Discarding unreadable watch index: {}", e),
        }

        for (id, status) in initial {
            let entry = serde_json::to_string(&WatchEntry::new(*status, None))?;
            self.kv.set(&flight_key(id), &entry)?;
        }

        let index: WatchIndex = initial.keys().map(String::as_str).collect();
        self.write_index(&index)?;
        debug!("Watch index reset with {} flights", index.len());
        Ok(())
    }

    /// Write the entry for `id` and make sure the index lists it.
    pub fn upsert(&self, id: &str, entry: &WatchEntry) -> Result<(), StoreError> {
        self.kv.set(&flight_key(id), &serde_json::to_string(entry)?)?;
        let mut index = self.index()?;
        if index.insert(id) {
            self.write_index(&index)?;
        }
        Ok(())
    }

    pub fn entry(&self, id: &str) -> Result<Option<WatchEntry>, StoreError> {
        match self.kv.get(&flight_key(id))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// The current index; empty when none is stored.
    pub fn index(&self) -> Result<WatchIndex, StoreError> {
        match self.kv.get(INDEX_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(WatchIndex::new()),
        }
    }

    /// Every indexed flight with its entry. Flights without an entry are
    /// skipped.
    pub fn entries(&self) -> Result<Vec<(String, WatchEntry)>, StoreError> {
        let index = self.index()?;
        let mut entries = Vec::with_capacity(index.len());
        for id in index.iter() {
            if let Some(entry) = self.entry(id)? {
                entries.push((id.to_string(), entry));
            }
        }
        Ok(entries)
    }

    /// Delete every indexed entry and the index itself.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        let index = self.index().unwrap_or_default();
        for id in index.iter() {
            self.kv.delete(&flight_key(id))?;
        }
        self.kv.delete(INDEX_KEY)
    }

    fn write_index(&self, index: &WatchIndex) -> Result<(), StoreError> {
        self.kv.set(INDEX_KEY, &serde_json::to_string(index)?)
    }
}

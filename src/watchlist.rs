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

//! Foreground watch list.
//!
//! Keeps the flights the user asked to watch, builds the payload that starts
//! the background monitor, and reads back the statuses it persisted.

use std::collections::BTreeMap;

use adsb_client::AnnotationData;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::watch::{classify, KvStore, StatusCategory, StoreError, WatchStore};

pub const DEFAULT_CAPACITY: usize = 20;

/// One row of the watch list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchDetails {
    pub id: String,
    pub flight: String,
    pub origin: String,
    pub destination: String,
    pub status: StatusCategory,
}

impl WatchDetails {
    /// Build a row from a selected aircraft. Returns `None` without an id.
    #[must_use]
    pub fn from_annotation(data: &AnnotationData) -> Option<Self> {
        let iata = |airport: Option<&adsb_client::AirportInfo>| {
            airport
                .and_then(|a| a.iata.clone())
                .unwrap_or_default()
        };

        Some(Self {
            id: data.id()?.to_string(),
            flight: data.callsign().unwrap_or_default().to_string(),
            origin: iata(data.origin_airport.as_ref()),
            destination: iata(data.destination_airport.as_ref()),
            status: classify(data.altitude()),
        })
    }
}

/// Bounded list of watched flights, newest last. Each id appears once.
#[derive(Debug)]
pub struct WatchList {
    entries: Vec<WatchDetails>,
    capacity: usize,
    updates: watch::Sender<Vec<WatchDetails>>,
}

impl Default for WatchList {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl WatchList {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (updates, _) = watch::channel(Vec::new());
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
            updates,
        }
    }

    /// Receive the full list after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<WatchDetails>> {
        self.updates.subscribe()
    }

    #[must_use]
    pub fn entries(&self) -> &[WatchDetails] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add or refresh the row for `data`. The oldest row is dropped once the
    /// list is full. Returns `false` if `data` has no id.
    pub fn add(&mut self, data: &AnnotationData) -> bool {
        let Some(details) = WatchDetails::from_annotation(data) else {
            return false;
        };

        if let Some(existing) = self.entries.iter_mut().find(|e| e.id == details.id) {
            *existing = details;
        } else {
            if self.entries.len() == self.capacity {
                let dropped = self.entries.remove(0);
                debug!("Watch list full, dropping {}", dropped.id);
            }
            self.entries.push(details);
        }
        self.publish();
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        let removed = self.entries.len() != before;
        if removed {
            self.publish();
        }
        removed
    }

    /// Initial id to status mapping for the background monitor.
    #[must_use]
    pub fn start_payload(&self) -> BTreeMap<String, StatusCategory> {
        self.entries
            .iter()
            .map(|e| (e.id.clone(), e.status))
            .collect()
    }

    /// [`Self::start_payload`] serialized for dispatch.
    pub fn start_payload_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.start_payload())
    }

    /// Adopt statuses the background monitor persisted. Returns how many rows
    /// changed.
    pub fn refresh_from<K: KvStore>(&mut self, store: &WatchStore<K>) -> Result<usize, StoreError> {
        let mut changed = 0;
        for entry in &mut self.entries {
            if let Some(persisted) = store.entry(&entry.id)? {
                if persisted.status != entry.status {
                    entry.status = persisted.status;
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.publish();
        }
        Ok(changed)
    }

    fn publish(&self) {
        self.updates.send_replace(self.entries.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::{MemoryStore, WatchEntry};
    use adsb_client::{AirportInfo, Altitude, DynamicDetails, FlightDetails};

    fn flight(id: &str, altitude: Option<Altitude>) -> AnnotationData {
        AnnotationData {
            flight_details: Some(FlightDetails {
                callsign: Some("DAL42 ".to_string()),
                airline_code: None,
            }),
            origin_airport: Some(AirportInfo {
                iata: Some("ATL".to_string()),
                ..AirportInfo::default()
            }),
            dynamic: Some(DynamicDetails {
                altitude,
                ..DynamicDetails::default()
            }),
            ..AnnotationData::with_id(id)
        }
    }

    #[test]
    fn test_details_from_annotation() {
        let details = WatchDetails::from_annotation(&flight("abc123", Some(Altitude::Feet(7000.0)))).unwrap();
        assert_eq!(details.flight, "DAL42");
        assert_eq!(details.origin, "ATL");
        assert_eq!(details.destination, "");
        assert_eq!(details.status, StatusCategory::AscendingDescending);

        assert!(WatchDetails::from_annotation(&AnnotationData::default()).is_none());
    }

    #[test]
    fn test_add_dedups_and_bounds() {
        let mut list = WatchList::new(2);
        assert!(list.add(&flight("a", None)));
        assert!(list.add(&flight("a", Some(Altitude::Ground))));
        assert_eq!(list.entries().len(), 1);
        assert_eq!(list.entries()[0].status, StatusCategory::Grounded);

        list.add(&flight("b", None));
        list.add(&flight("c", None));
        let ids: Vec<&str> = list.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_start_payload_json() {
        let mut list = WatchList::default();
        list.add(&flight("abc123", None));
        assert_eq!(list.start_payload_json().unwrap(), r#"{"abc123":"Unknown"}"#);
    }

    #[test]
    fn test_refresh_reads_persisted_status() {
        let mut list = WatchList::default();
        let mut updates = list.subscribe();
        list.add(&flight("abc123", None));
        list.add(&flight("def456", None));
        let _ = updates.borrow_and_update();

        let store = WatchStore::new(MemoryStore::new());
        store
            .upsert("abc123", &WatchEntry::new(StatusCategory::Cruising, Some(Altitude::Feet(36_000.0))))
            .unwrap();

        assert_eq!(list.refresh_from(&store).unwrap(), 1);
        assert_eq!(list.entries()[0].status, StatusCategory::Cruising);
        assert_eq!(list.entries()[1].status, StatusCategory::Unknown);
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update()[0].status, StatusCategory::Cruising);
    }

    #[test]
    fn test_remove() {
        let mut list = WatchList::default();
        list.add(&flight("a", None));
        assert!(list.remove("a"));
        assert!(!list.remove("a"));
        assert!(list.is_empty());
    }
}

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

//! Keyed marker store: an arena of slots plus an id lookup.

use std::collections::HashMap;

use adsb_client::{AnnotationData, LatLng};

use crate::map::AnnotationHandle;

/// One live marker on the map.
#[derive(Debug, Clone)]
pub struct Marker {
    pub id: String,
    pub handle: AnnotationHandle,
    /// Coordinate the surface currently shows for this marker.
    pub rendered: LatLng,
    /// Accumulated data from every snapshot merged into this marker.
    pub data: AnnotationData,
}

/// Arena of markers indexed by id. Each id maps to exactly one slot.
#[derive(Debug, Default)]
pub struct MarkerStore {
    slots: Vec<Option<Marker>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
}

impl MarkerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Marker> {
        self.index
            .get(id)
            .and_then(|&slot| self.slots.get(slot))
            .and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Marker> {
        let slot = *self.index.get(id)?;
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Insert a marker, replacing any marker already stored under its id.
    /// Returns the replaced marker.
    pub fn insert(&mut self, marker: Marker) -> Option<Marker> {
        if let Some(&slot) = self.index.get(&marker.id) {
            return self.slots[slot].replace(marker);
        }

        let id = marker.id.clone();
        let slot = if let Some(slot) = self.free.pop() {
            self.slots[slot] = Some(marker);
            slot
        } else {
            self.slots.push(Some(marker));
            self.slots.len() - 1
        };
        self.index.insert(id, slot);
        None
    }

    pub fn remove(&mut self, id: &str) -> Option<Marker> {
        let slot = self.index.remove(id)?;
        let marker = self.slots[slot].take();
        self.free.push(slot);
        marker
    }

    /// Ids of all live markers, in no particular order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.index.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Remove every marker, returning them.
    pub fn drain(&mut self) -> Vec<Marker> {
        self.index.clear();
        self.free.clear();
        self.slots.drain(..).flatten().collect()
    }
}

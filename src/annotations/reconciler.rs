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

//! Annotation reconciler.
//!
//! Diffs each feed snapshot against the live marker set and drives the map
//! surface: markers that disappeared are removed, known markers glide to
//! their new coordinates, and new ids get a fresh marker. Removals are always
//! applied before creations, so an id that vanishes and reappears within one
//! pass is a clean create.
//!
//! Track mode narrows the map to one selected aircraft. The other markers are
//! parked (taken off the surface but remembered) and restored on exit.

use std::collections::HashMap;
use std::time::Duration;

use adsb_client::{AnnotationData, LatLng, RouteInfo};
use log::{debug, info};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use super::store::{Marker, MarkerStore};
use super::transition::{Transition, TransitionSet, DEFAULT_TRANSITION};
use crate::easing::DEFAULT_WAYPOINT_STEP;
use crate::map::{MapSurface, MarkerStyle, NewAnnotation, SelectHandler};

const EVENT_CAPACITY: usize = 64;

/// Events published to UI consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationEvent {
    /// A reconciliation pass finished; carries the accepted snapshot.
    Reconciled(Vec<AnnotationData>),
    /// The selected aircraft changed or its data was refreshed.
    SelectedChanged(Option<AnnotationData>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerSettings {
    pub transition: Duration,
    pub waypoint_step: f64,
    pub track_camera_distance_m: f64,
    pub overview_camera_distance_m: f64,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            transition: DEFAULT_TRANSITION,
            waypoint_step: DEFAULT_WAYPOINT_STEP,
            track_camera_distance_m: 100_000.0,
            overview_camera_distance_m: 1_000_000.0,
        }
    }
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub removed: usize,
    pub updated: usize,
    pub created: usize,
}

#[derive(Debug)]
pub struct Reconciler {
    settings: ReconcilerSettings,
    markers: MarkerStore,
    transitions: TransitionSet,
    parked: Vec<Marker>,
    tracked: Option<String>,
    route_shown: bool,
    select_tx: mpsc::UnboundedSender<String>,
    events: broadcast::Sender<AnnotationEvent>,
}

impl Reconciler {
    /// Create a reconciler. Marker selections are forwarded to `select_tx`.
    #[must_use]
    pub fn new(settings: ReconcilerSettings, select_tx: mpsc::UnboundedSender<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            settings,
            markers: MarkerStore::new(),
            transitions: TransitionSet::new(),
            parked: Vec::new(),
            tracked: None,
            route_shown: false,
            select_tx,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnnotationEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn marker(&self, id: &str) -> Option<&Marker> {
        self.markers.get(id)
    }

    /// Number of markers on the surface.
    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Id of the aircraft in track mode.
    #[must_use]
    pub fn tracked(&self) -> Option<&str> {
        self.tracked.as_deref()
    }

    /// Whether any marker is still mid-transition.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        !self.transitions.is_empty()
    }

    /// Bring the marker set in line with `snapshot`.
    ///
    /// Records without an id or without valid coordinates are dropped. When
    /// the snapshot repeats an id the first record wins. Ignored while in
    /// track mode.
    pub fn reconcile<S>(
        &mut self,
        snapshot: Vec<AnnotationData>,
        now: Instant,
        surface: &mut S,
    ) -> ReconcileSummary
    where
        S: MapSurface + ?Sized,
    {
        let mut summary = ReconcileSummary::default();
        if self.tracked.is_some() {
            debug!("Snapshot of {} records ignored in track mode", snapshot.len());
            return summary;
        }

        let mut accepted = Vec::with_capacity(snapshot.len());
        let mut lookup: HashMap<String, AnnotationData> = HashMap::with_capacity(snapshot.len());
        let mut order = Vec::with_capacity(snapshot.len());
        for record in snapshot {
            let Some(id) = record.id().map(str::to_string) else {
                continue;
            };
            if record.valid_coordinates().is_none() || lookup.contains_key(&id) {
                continue;
            }
            accepted.push(record.clone());
            order.push(id.clone());
            lookup.insert(id, record);
        }

        for id in self.markers.ids() {
            if lookup.contains_key(&id) {
                continue;
            }
            if let Some(marker) = self.markers.remove(&id) {
                surface.remove_annotation(marker.handle);
                self.transitions.cancel(&id);
                summary.removed += 1;
            }
        }

        for id in self.markers.ids() {
            if let Some(record) = lookup.remove(&id) {
                self.update_marker(&id, &record, now, surface);
                summary.updated += 1;
            }
        }

        for id in order {
            if let Some(record) = lookup.remove(&id) {
                if self.create_marker(id, record, surface) {
                    summary.created += 1;
                }
            }
        }

        debug!(
            "Reconciled {} markers: {} removed, {} updated, {} created",
            self.markers.len(),
            summary.removed,
            summary.updated,
            summary.created
        );
        let _ = self.events.send(AnnotationEvent::Reconciled(accepted));
        summary
    }

    /// Narrow the map to `id`. Returns `false` if no such marker is live.
    pub fn enter_track<S>(&mut self, id: &str, surface: &mut S) -> bool
    where
        S: MapSurface + ?Sized,
    {
        if self.tracked.is_some() {
            self.restore_parked(surface);
        }
        let Some(marker) = self.markers.get(id) else {
            debug!("Selection of unknown marker {}", id);
            return false;
        };
        let (center, data) = (marker.rendered, marker.data.clone());

        for other in self.markers.ids() {
            if other == id {
                continue;
            }
            if let Some(parked) = self.markers.remove(&other) {
                surface.remove_annotation(parked.handle);
                self.transitions.cancel(&other);
                self.parked.push(parked);
            }
        }

        info!("Tracking {} ({} markers parked)", id, self.parked.len());
        self.tracked = Some(id.to_string());
        let _ = self.events.send(AnnotationEvent::SelectedChanged(Some(data)));
        surface.set_center(center, true);
        surface.set_camera_distance(self.settings.track_camera_distance_m, true);
        true
    }

    /// Merge looked-up route details into the tracked aircraft.
    ///
    /// `None` leaves origin and destination unset. When both airports have
    /// coordinates the flight path is drawn through the aircraft.
    pub fn apply_route<S>(&mut self, id: &str, route: Option<&RouteInfo>, surface: &mut S)
    where
        S: MapSurface + ?Sized,
    {
        if self.tracked.as_deref() != Some(id) {
            debug!("Route for {} arrived after selection changed", id);
            return;
        }
        let Some(route) = route else {
            debug!("No route for {}", id);
            return;
        };
        let Some(marker) = self.markers.get_mut(id) else {
            return;
        };

        marker.data.merge_from(&route.as_patch());
        let path = match (route.origin.coordinates(), route.destination.coordinates()) {
            (Some(origin), Some(destination)) => Some([origin, marker.rendered, destination]),
            _ => None,
        };
        let _ = self
            .events
            .send(AnnotationEvent::SelectedChanged(Some(marker.data.clone())));

        if let Some(path) = path {
            surface.show_route(&path);
            self.route_shown = true;
        }
    }

    /// Apply a dense single-aircraft record for the tracked marker.
    pub fn apply_track_update<S>(&mut self, record: &AnnotationData, now: Instant, surface: &mut S)
    where
        S: MapSurface + ?Sized,
    {
        let Some(id) = self.tracked.clone() else {
            return;
        };
        if record.id() != Some(id.as_str()) {
            debug!("Track update for {:?} while tracking {}", record.id(), id);
            return;
        }
        let Some(target) = record.valid_coordinates() else {
            debug!("Track update for {} has no usable position", id);
            return;
        };
        if !self.markers.contains(&id) {
            return;
        }

        self.update_marker(&id, record, now, surface);
        if let Some(marker) = self.markers.get(&id) {
            let _ = self
                .events
                .send(AnnotationEvent::SelectedChanged(Some(marker.data.clone())));
        }
        surface.set_center(target, true);
    }

    /// Leave track mode and restore the parked markers. Returns `false` if
    /// nothing was tracked.
    pub fn exit_track<S>(&mut self, surface: &mut S) -> bool
    where
        S: MapSurface + ?Sized,
    {
        let Some(id) = self.tracked.clone() else {
            return false;
        };
        self.restore_parked(surface);
        info!("Stopped tracking {}", id);
        let _ = self.events.send(AnnotationEvent::SelectedChanged(None));
        surface.set_camera_distance(self.settings.overview_camera_distance_m, true);
        true
    }

    /// Move every transitioning marker to its position for this frame.
    /// Returns the number of markers moved.
    pub fn advance_frame<S>(&mut self, now: Instant, surface: &mut S) -> usize
    where
        S: MapSurface + ?Sized,
    {
        let mut moved = 0;
        for update in self.transitions.advance(now) {
            let Some(marker) = self.markers.get_mut(&update.id) else {
                continue;
            };
            marker.rendered = update.position;
            surface.move_annotation(marker.handle, update.position);
            moved += 1;

            if self.route_shown && self.tracked.as_deref() == Some(update.id.as_str()) {
                surface.update_route_middle(update.position);
            }
        }
        moved
    }

    /// Take every marker off the surface and stop all transitions.
    pub fn clear<S>(&mut self, surface: &mut S)
    where
        S: MapSurface + ?Sized,
    {
        self.transitions.cancel_all();
        for marker in self.markers.drain() {
            surface.remove_annotation(marker.handle);
        }
        self.parked.clear();
        if self.route_shown {
            surface.clear_route();
            self.route_shown = false;
        }
        self.tracked = None;
    }

    fn update_marker<S>(&mut self, id: &str, record: &AnnotationData, now: Instant, surface: &mut S)
    where
        S: MapSurface + ?Sized,
    {
        let Some(target) = record.valid_coordinates() else {
            return;
        };
        let Some(marker) = self.markers.get_mut(id) else {
            return;
        };

        // A running transition is superseded from wherever the marker is drawn now.
        let start = marker.rendered;
        if self.transitions.destination(id) == Some(target) {
            debug!("{} already moving to the reported position", id);
        } else if start == target {
            self.transitions.cancel(id);
        } else {
            self.transitions.begin(
                id,
                Transition::new(
                    start,
                    target,
                    self.settings.waypoint_step,
                    now,
                    self.settings.transition,
                ),
            );
        }

        let previous = marker.data.coordinates;
        marker.data.merge_from(record);
        if previous.is_some() {
            marker.data.last_position = previous;
        }
        if record.altitude().is_some() {
            surface.restyle_annotation(marker.handle, MarkerStyle::for_data(&marker.data));
        }
    }

    fn create_marker<S>(&mut self, id: String, record: AnnotationData, surface: &mut S) -> bool
    where
        S: MapSurface + ?Sized,
    {
        let Some(coordinate) = record.valid_coordinates() else {
            return false;
        };
        let handle = surface.add_annotation(NewAnnotation {
            id: id.clone(),
            coordinate,
            title: record.title.clone(),
            style: MarkerStyle::for_data(&record),
            on_select: SelectHandler::new(id.clone(), self.select_tx.clone()),
        });
        self.markers.insert(Marker {
            id,
            handle,
            rendered: coordinate,
            data: record,
        });
        true
    }

    fn restore_parked<S>(&mut self, surface: &mut S)
    where
        S: MapSurface + ?Sized,
    {
        if self.route_shown {
            surface.clear_route();
            self.route_shown = false;
        }
        for parked in std::mem::take(&mut self.parked) {
            if self.markers.contains(&parked.id) {
                continue;
            }
            let rendered: LatLng = parked.rendered;
            let handle = surface.add_annotation(NewAnnotation {
                id: parked.id.clone(),
                coordinate: rendered,
                title: parked.data.title.clone(),
                style: MarkerStyle::for_data(&parked.data),
                on_select: SelectHandler::new(parked.id.clone(), self.select_tx.clone()),
            });
            self.markers.insert(Marker { handle, ..parked });
        }
        self.tracked = None;
    }
}

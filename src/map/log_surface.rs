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

//! Headless surface used by the command-line front end.

use std::collections::HashMap;

use adsb_client::LatLng;
use log::{debug, info};

use super::{AnnotationHandle, MapSurface, MarkerStyle, NewAnnotation, SelectHandler, VisibleRegion};

#[derive(Debug)]
struct Placed {
    id: String,
    at: LatLng,
    on_select: SelectHandler,
}

/// Map surface that keeps annotations in memory and logs camera changes.
///
/// The visible region is fixed at construction and only moves when the
/// camera is recentered.
#[derive(Debug)]
pub struct LogSurface {
    annotations: HashMap<AnnotationHandle, Placed>,
    next_handle: u64,
    region: VisibleRegion,
    route: Vec<LatLng>,
}

impl LogSurface {
    #[must_use]
    pub fn new(center: LatLng, radius_m: f64) -> Self {
        Self {
            annotations: HashMap::new(),
            next_handle: 1,
            region: VisibleRegion { center, radius_m },
            route: Vec::new(),
        }
    }

    /// Number of markers currently on the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Simulate a tap on the marker for `id`. Returns `false` when no such
    /// marker is rendered.
    pub fn select(&self, id: &str) -> bool {
        match self.annotations.values().find(|placed| placed.id == id) {
            Some(placed) => {
                placed.on_select.fire();
                true
            }
            None => false,
        }
    }

    /// Rendered positions keyed by marker id.
    #[must_use]
    pub fn positions(&self) -> Vec<(String, LatLng)> {
        let mut positions: Vec<_> = self
            .annotations
            .values()
            .map(|placed| (placed.id.clone(), placed.at))
            .collect();
        positions.sort_by(|a, b| a.0.cmp(&b.0));
        positions
    }

    #[must_use]
    pub fn route(&self) -> &[LatLng] {
        &self.route
    }
}

impl MapSurface for LogSurface {
    fn add_annotation(&mut self, annotation: NewAnnotation) -> AnnotationHandle {
        let handle = AnnotationHandle(self.next_handle);
        self.next_handle += 1;
        debug!(
            "Add marker {} at ({:.4}, {:.4})",
            annotation.id, annotation.coordinate.lat, annotation.coordinate.lng
        );
        self.annotations.insert(
            handle,
            Placed {
                id: annotation.id,
                at: annotation.coordinate,
                on_select: annotation.on_select,
            },
        );
        handle
    }

    fn remove_annotation(&mut self, handle: AnnotationHandle) {
        if let Some(placed) = self.annotations.remove(&handle) {
            debug!("Remove marker {}", placed.id);
        }
    }

    fn move_annotation(&mut self, handle: AnnotationHandle, to: LatLng) {
        if let Some(placed) = self.annotations.get_mut(&handle) {
            placed.at = to;
        }
    }

    fn restyle_annotation(&mut self, handle: AnnotationHandle, style: MarkerStyle) {
        if let Some(placed) = self.annotations.get(&handle) {
            debug!(
                "Restyle marker {}: heading {:.0}, scale {:.1}",
                placed.id, style.heading, style.scale
            );
        }
    }

    fn set_center(&mut self, center: LatLng, animated: bool) {
        info!("Camera center ({:.4}, {:.4}) animated={}", center.lat, center.lng, animated);
        self.region.center = center;
    }

    fn set_camera_distance(&mut self, meters: f64, animated: bool) {
        info!("Camera distance {:.0} m animated={}", meters, animated);
    }

    fn visible_region(&self) -> Option<VisibleRegion> {
        Some(self.region)
    }

    fn show_route(&mut self, path: &[LatLng]) {
        info!("Route polyline with {} points", path.len());
        self.route = path.to_vec();
    }

    fn update_route_middle(&mut self, position: LatLng) {
        if self.route.len() >= 2 {
            let first = self.route[0];
            let last = self.route[self.route.len() - 1];
            self.route = vec![first, position, last];
        }
    }

    fn clear_route(&mut self) {
        self.route.clear();
    }
}

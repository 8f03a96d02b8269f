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

//! Map surface contract.
//!
//! The map renderer is an external collaborator. The reconciler only talks to
//! it through [`MapSurface`]: add/remove/move/restyle annotations, move the
//! camera, query the visible region, and draw the flight-path polyline. The
//! surface owns the rendering handles; the reconciler only keeps the opaque
//! [`AnnotationHandle`] it was given back.

mod log_surface;
#[cfg(test)]
pub(crate) mod recording;

pub use log_surface::LogSurface;

use adsb_client::{Altitude, AnnotationData, LatLng};
use log::debug;
use tokio::sync::mpsc;

/// Metres per nautical mile.
pub const METERS_PER_NM: f64 = 1852.0;

/// Opaque handle to an annotation owned by the map surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnnotationHandle(pub u64);

/// Visible part of the map as a center and radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleRegion {
    pub center: LatLng,
    /// Radius in metres.
    pub radius_m: f64,
}

impl VisibleRegion {
    /// Radius in nautical miles.
    #[must_use]
    pub fn radius_nm(&self) -> f64 {
        self.radius_m / METERS_PER_NM
    }
}

/// Icon rotation and scale for one aircraft marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
    /// Rotation in degrees, north = 0.
    pub heading: f64,
    pub scale: f64,
}

impl MarkerStyle {
    /// Style derived from a record's heading and altitude.
    #[must_use]
    pub fn for_data(data: &AnnotationData) -> Self {
        Self {
            heading: data.heading().unwrap_or(0.0),
            scale: scale_for_altitude(data.altitude()),
        }
    }
}

/// Icon scale by altitude band. Aircraft on the ground get no icon scale.
#[must_use]
pub fn scale_for_altitude(altitude: Option<Altitude>) -> f64 {
    match altitude {
        Some(Altitude::Ground) => 0.0,
        None => 1.0,
        Some(Altitude::Feet(feet)) if feet < 10_000.0 => 1.0,
        Some(Altitude::Feet(feet)) if feet < 20_000.0 => 1.2,
        Some(Altitude::Feet(feet)) if feet < 30_000.0 => 1.4,
        Some(Altitude::Feet(feet)) if feet < 40_000.0 => 1.5,
        Some(Altitude::Feet(_)) => 1.6,
    }
}

/// Selection callback bound to one marker id.
///
/// Firing it forwards the id to the owning session's selection channel.
#[derive(Debug, Clone)]
pub struct SelectHandler {
    id: String,
    tx: mpsc::UnboundedSender<String>,
}

impl SelectHandler {
    #[must_use]
    pub fn new(id: String, tx: mpsc::UnboundedSender<String>) -> Self {
        Self { id, tx }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Report that the user selected this marker.
    pub fn fire(&self) {
        if self.tx.send(self.id.clone()).is_err() {
            debug!("Selection of {} dropped: session is gone", self.id);
        }
    }
}

/// Everything the surface needs to render a new marker.
#[derive(Debug, Clone)]
pub struct NewAnnotation {
    pub id: String,
    pub coordinate: LatLng,
    pub title: Option<String>,
    pub style: MarkerStyle,
    pub on_select: SelectHandler,
}

/// Rendering surface the reconciler drives.
///
/// All calls happen on the foreground task; implementations need no locking.
pub trait MapSurface {
    /// Render a new marker and return its handle.
    fn add_annotation(&mut self, annotation: NewAnnotation) -> AnnotationHandle;

    /// Remove a marker. Unknown handles are ignored.
    fn remove_annotation(&mut self, handle: AnnotationHandle);

    /// Move a marker to a new coordinate without animation.
    fn move_annotation(&mut self, handle: AnnotationHandle, to: LatLng);

    /// Update a marker's rotation and scale.
    fn restyle_annotation(&mut self, handle: AnnotationHandle, style: MarkerStyle);

    fn set_center(&mut self, center: LatLng, animated: bool);

    fn set_camera_distance(&mut self, meters: f64, animated: bool);

    /// Currently visible region, or `None` before the map has laid out.
    fn visible_region(&self) -> Option<VisibleRegion>;

    /// Draw the flight-path polyline through `path`.
    fn show_route(&mut self, path: &[LatLng]);

    /// Replace the middle points of the polyline with `position`, keeping its
    /// first and last points.
    fn update_route_middle(&mut self, position: LatLng);

    fn clear_route(&mut self);
}

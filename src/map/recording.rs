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

//! Surface that records every call, for tests.

use std::collections::HashMap;

use adsb_client::LatLng;

use super::{AnnotationHandle, MapSurface, MarkerStyle, NewAnnotation, SelectHandler, VisibleRegion};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SurfaceCall {
    Add(String),
    Remove(String),
    Move(String, LatLng),
    Restyle(String, MarkerStyle),
    Center(LatLng),
    Distance(f64),
    ShowRoute(Vec<LatLng>),
    RouteMiddle(LatLng),
    ClearRoute,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingSurface {
    pub calls: Vec<SurfaceCall>,
    pub rendered: HashMap<AnnotationHandle, (String, LatLng)>,
    pub handlers: HashMap<String, SelectHandler>,
    pub region: Option<VisibleRegion>,
    next: u64,
}

impl RecordingSurface {
    pub fn with_region(center: LatLng, radius_m: f64) -> Self {
        Self {
            region: Some(VisibleRegion { center, radius_m }),
            ..Self::default()
        }
    }

    /// Ids currently on the map, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.rendered.values().map(|(id, _)| id.clone()).collect();
        ids.sort();
        ids
    }

    pub fn position_of(&self, id: &str) -> Option<LatLng> {
        self.rendered
            .values()
            .find(|(rendered, _)| rendered == id)
            .map(|(_, at)| *at)
    }

    pub fn count(&self, matches: impl Fn(&SurfaceCall) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    fn id_of(&self, handle: AnnotationHandle) -> String {
        self.rendered
            .get(&handle)
            .map(|(id, _)| id.clone())
            .unwrap_or_default()
    }
}

impl MapSurface for RecordingSurface {
    fn add_annotation(&mut self, annotation: NewAnnotation) -> AnnotationHandle {
        self.next += 1;
        let handle = AnnotationHandle(self.next);
        self.calls.push(SurfaceCall::Add(annotation.id.clone()));
        self.handlers
            .insert(annotation.id.clone(), annotation.on_select);
        self.rendered
            .insert(handle, (annotation.id, annotation.coordinate));
        handle
    }

    fn remove_annotation(&mut self, handle: AnnotationHandle) {
        let id = self.id_of(handle);
        self.calls.push(SurfaceCall::Remove(id));
        self.rendered.remove(&handle);
    }

    fn move_annotation(&mut self, handle: AnnotationHandle, to: LatLng) {
        let id = self.id_of(handle);
        self.calls.push(SurfaceCall::Move(id, to));
        if let Some(entry) = self.rendered.get_mut(&handle) {
            entry.1 = to;
        }
    }

    fn restyle_annotation(&mut self, handle: AnnotationHandle, style: MarkerStyle) {
        let id = self.id_of(handle);
        self.calls.push(SurfaceCall::Restyle(id, style));
    }

    fn set_center(&mut self, center: LatLng, _animated: bool) {
        self.calls.push(SurfaceCall::Center(center));
    }

    fn set_camera_distance(&mut self, meters: f64, _animated: bool) {
        self.calls.push(SurfaceCall::Distance(meters));
    }

    fn visible_region(&self) -> Option<VisibleRegion> {
        self.region
    }

    fn show_route(&mut self, path: &[LatLng]) {
        self.calls.push(SurfaceCall::ShowRoute(path.to_vec()));
    }

    fn update_route_middle(&mut self, position: LatLng) {
        self.calls.push(SurfaceCall::RouteMiddle(position));
    }

    fn clear_route(&mut self) {
        self.calls.push(SurfaceCall::ClearRoute);
    }
}

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

//! Position transitions.
//!
//! A [`Transition`] walks a marker along precomputed eased waypoints over a
//! fixed duration. [`TransitionSet`] holds at most one transition per marker
//! id; beginning a new one for the same id supersedes the old one, which then
//! produces no further frames.

use std::collections::HashMap;
use std::time::Duration;

use adsb_client::LatLng;
use tokio::time::Instant;

use crate::easing::precalculate_waypoints;

/// Default duration of a position transition.
pub const DEFAULT_TRANSITION: Duration = Duration::from_millis(4000);

#[derive(Debug, Clone)]
pub struct Transition {
    waypoints: Vec<LatLng>,
    started: Instant,
    duration: Duration,
}

impl Transition {
    #[must_use]
    pub fn new(start: LatLng, end: LatLng, step: f64, started: Instant, duration: Duration) -> Self {
        Self {
            waypoints: precalculate_waypoints(start, end, step),
            started,
            duration,
        }
    }

    #[must_use]
    pub fn destination(&self) -> LatLng {
        self.waypoints.last().copied().unwrap_or(LatLng::new(0.0, 0.0))
    }

    /// Position at `now` and whether the transition has finished.
    ///
    /// The waypoint index advances in proportion to elapsed time. Once the
    /// full duration has elapsed the destination is returned exactly.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        reason = "fraction is in [0, 1) and waypoint counts are tiny"
    )]
    pub fn position_at(&self, now: Instant) -> (LatLng, bool) {
        let last = self.waypoints.len().saturating_sub(1);
        let elapsed = now.saturating_duration_since(self.started);

        if self.duration.is_zero() || elapsed >= self.duration {
            return (self.destination(), true);
        }

        let fraction = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        let index = ((fraction * last as f64).floor() as usize).min(last);
        (self.waypoints[index], false)
    }
}

/// One marker movement produced by [`TransitionSet::advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUpdate {
    pub id: String,
    pub position: LatLng,
    pub finished: bool,
}

/// Active transitions keyed by marker id.
#[derive(Debug, Default)]
pub struct TransitionSet {
    active: HashMap<String, Transition>,
}

impl TransitionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transition for `id`, superseding any transition already running
    /// for it.
    pub fn begin(&mut self, id: &str, transition: Transition) {
        self.active.insert(id.to_string(), transition);
    }

    /// Stop the transition for `id`. Returns whether one was running.
    pub fn cancel(&mut self, id: &str) -> bool {
        self.active.remove(id).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.active.clear();
    }

    #[must_use]
    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    /// Where the running transition for `id` is heading.
    #[must_use]
    pub fn destination(&self, id: &str) -> Option<LatLng> {
        self.active.get(id).map(Transition::destination)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Compute this frame's position for every running transition. Finished
    /// transitions are dropped after reporting their destination once.
    pub fn advance(&mut self, now: Instant) -> Vec<FrameUpdate> {
        let mut updates = Vec::with_capacity(self.active.len());
        self.active.retain(|id, transition| {
            let (position, finished) = transition.position_at(now);
            updates.push(FrameUpdate {
                id: id.clone(),
                position,
                finished,
            });
            !finished
        });
        updates
    }
}

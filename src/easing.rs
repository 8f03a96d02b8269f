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

//! Quadratic ease-in-out interpolation between geographic points.
//!
//! Pure and stateless. Callers validate coordinates before calling in; a NaN
//! input yields NaN output rather than an error.

use adsb_client::LatLng;

/// Default fraction advanced per precalculated waypoint.
pub const DEFAULT_WAYPOINT_STEP: f64 = 0.05;

/// Quadratic ease-in-out on `t` in `[0, 1]`.
#[must_use]
pub fn ease_in_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        -1.0 + (4.0 - 2.0 * t) * t
    }
}

/// Eased position `fraction_complete` of the way from `start` to `end`.
///
/// The fraction is clamped to `[0, 1]`; the endpoints are returned exactly.
#[must_use]
pub fn interpolate(start: LatLng, end: LatLng, fraction_complete: f64) -> LatLng {
    let t = if fraction_complete.is_nan() {
        0.0
    } else {
        fraction_complete.clamp(0.0, 1.0)
    };

    if t >= 1.0 {
        return end;
    }

    let eased = ease_in_out_quad(t);
    LatLng::new(
        start.lat + (end.lat - start.lat) * eased,
        start.lng + (end.lng - start.lng) * eased,
    )
}

/// Number of intervals a waypoint table with `step` spacing covers.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "step is validated into (0, 1], so the ratio is a small positive integer"
)]
fn intervals(step: f64) -> usize {
    let step = if step.is_finite() && step > 0.0 && step <= 1.0 {
        step
    } else {
        DEFAULT_WAYPOINT_STEP
    };
    // Tolerance keeps 1/0.05 from rounding up to 21.
    ((1.0 / step) - 1e-9).ceil().max(1.0) as usize
}

/// Precompute eased waypoints from `start` to `end`, both inclusive.
///
/// Yields `ceil(1 / step) + 1` points. The first equals `start` and the last
/// equals `end` exactly. Invalid steps fall back to [`DEFAULT_WAYPOINT_STEP`].
#[must_use]
pub fn precalculate_waypoints(start: LatLng, end: LatLng, step: f64) -> Vec<LatLng> {
    let count = intervals(step);
    #[allow(clippy::cast_precision_loss, reason = "waypoint counts are tiny")]
    let denominator = count as f64;

    (0..=count)
        .map(|i| {
            #[allow(clippy::cast_precision_loss, reason = "waypoint counts are tiny")]
            let t = i as f64 / denominator;
            interpolate(start, end, t)
        })
        .collect()
}

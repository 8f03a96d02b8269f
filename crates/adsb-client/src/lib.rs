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

//! ADS-B client library for querying REST aircraft feeds.
//!
//! This library fetches aircraft snapshots from an adsb.lol-compatible REST
//! feed and normalizes them into a canonical, sparse record. It is layered so
//! each part can be used independently:
//!
//! - **Annotation layer**: the canonical [`AnnotationData`] record and its
//!   shallow-merge semantics
//! - **Protocol layer**: wire records and the wire-to-canonical mapping
//! - **Transport layer**: the [`FeedTransport`] seam with a `reqwest`
//!   implementation
//!
//! # Quick Start
//!
//! ```no_run
//! use adsb_client::{FeedClient, FeedConfig, LatLng};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = FeedClient::from_config(&FeedConfig::default()).unwrap();
//!     let center = LatLng::new(33.9425, -118.4081);
//!
//!     for aircraft in client.fetch_overview(center, 100.0).await {
//!         println!("{:?}: {:?}", aircraft.id, aircraft.title);
//!     }
//! }
//! ```
//!
//! # Partial failure
//!
//! [`FeedClient::fetch_overview`] queries the nearby and military categories
//! concurrently. A failing category degrades to an empty list and is logged;
//! it never prevents the other category from being returned.

pub mod annotation;
pub mod http;
pub mod protocol;

use std::collections::HashSet;

use log::{debug, warn};

pub use annotation::{
    AircraftDetails, AirportInfo, Altitude, AnnotationData, DynamicDetails, FlightDetails, LatLng,
    RouteInfo,
};
pub use http::{FeedConfig, FeedTransport, ReqwestTransport, DEFAULT_BASE_URL};
pub use protocol::{ApiResponse, FeedError, RoutesetPlane, RoutesetRequest, WireAircraft, WireRoute};

/// Largest query radius the feed accepts, in nautical miles.
pub const MAX_RADIUS_NM: u32 = 250;

/// Clamp a requested radius into `0..=MAX_RADIUS_NM`, rounded to whole miles.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "value is clamped into 0..=250 before the cast"
)]
pub fn clamp_radius_nm(radius_nm: f64) -> u32 {
    if !radius_nm.is_finite() {
        return MAX_RADIUS_NM;
    }
    radius_nm.round().clamp(0.0, f64::from(MAX_RADIUS_NM)) as u32
}

/// Concatenate feed categories, keeping the first record seen for each id.
///
/// Records without an id are passed through untouched.
#[must_use]
pub fn merge_unique<I>(categories: I) -> Vec<AnnotationData>
where
    I: IntoIterator<Item = Vec<AnnotationData>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for record in categories.into_iter().flatten() {
        let duplicate = record.id().is_some_and(|id| !seen.insert(id.to_string()));
        if !duplicate {
            merged.push(record);
        }
    }

    merged
}

/// Typed client for the aircraft feed.
#[derive(Debug, Clone)]
pub struct FeedClient<T = ReqwestTransport> {
    transport: T,
}

impl FeedClient<ReqwestTransport> {
    /// Create a client talking to the configured feed over HTTP.
    pub fn from_config(config: &FeedConfig) -> Result<Self, FeedError> {
        Ok(Self::new(ReqwestTransport::new(config)?))
    }
}

impl<T: FeedTransport> FeedClient<T> {
    /// Wrap an existing transport.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Access the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn query(&self, path: &str) -> Result<Vec<AnnotationData>, FeedError> {
        let body = self.transport.get(path).await?;
        let response: ApiResponse = serde_json::from_str(&body)?;
        debug!("{} returned {} aircraft", path, response.ac.len());
        Ok(protocol::annotations_from_wire(&response.ac))
    }

    /// Aircraft within `radius_nm` of `center`. The radius is clamped to
    /// [`MAX_RADIUS_NM`].
    pub async fn fetch_nearby(
        &self,
        center: LatLng,
        radius_nm: f64,
    ) -> Result<Vec<AnnotationData>, FeedError> {
        if !center.is_valid() {
            return Err(FeedError::InvalidRequest(format!(
                "invalid center {}, {}",
                center.lat, center.lng
            )));
        }
        let radius = clamp_radius_nm(radius_nm);
        self.query(&format!(
            "/v2/lat/{}/lon/{}/dist/{}",
            center.lat, center.lng, radius
        ))
        .await
    }

    /// All aircraft flagged as military.
    pub async fn fetch_military(&self) -> Result<Vec<AnnotationData>, FeedError> {
        self.query("/v2/mil").await
    }

    /// Aircraft flagged as privacy ICAO addresses.
    pub async fn fetch_pia(&self) -> Result<Vec<AnnotationData>, FeedError> {
        self.query("/v2/pia").await
    }

    /// Aircraft on the limiting aircraft data displayed list.
    pub async fn fetch_ladd(&self) -> Result<Vec<AnnotationData>, FeedError> {
        self.query("/v2/ladd").await
    }

    /// Aircraft of ICAO type designator `type_code`, e.g. `A320`.
    pub async fn fetch_by_type(&self, type_code: &str) -> Result<Vec<AnnotationData>, FeedError> {
        let type_code = non_empty_segment(type_code, "aircraft type")?;
        self.query(&format!("/v2/type/{}", type_code.to_ascii_uppercase()))
            .await
    }

    /// The single aircraft closest to `center` within `radius_nm`.
    pub async fn fetch_closest(
        &self,
        center: LatLng,
        radius_nm: f64,
    ) -> Result<Option<AnnotationData>, FeedError> {
        if !center.is_valid() {
            return Err(FeedError::InvalidRequest(format!(
                "invalid center {}, {}",
                center.lat, center.lng
            )));
        }
        let radius = clamp_radius_nm(radius_nm);
        let records = self
            .query(&format!(
                "/v2/closest/{}/{}/{}",
                center.lat, center.lng, radius
            ))
            .await?;
        Ok(records.into_iter().next())
    }

    /// Dense single-aircraft lookup by ICAO address.
    pub async fn fetch_by_icao(&self, id: &str) -> Result<Option<AnnotationData>, FeedError> {
        let id = id.trim().to_ascii_lowercase();
        if id.is_empty() {
            return Err(FeedError::InvalidRequest("empty icao address".to_string()));
        }
        let records = self.query(&format!("/v2/icao/{id}")).await?;
        Ok(records.into_iter().next())
    }

    /// Aircraft currently broadcasting `callsign`.
    pub async fn fetch_by_callsign(
        &self,
        callsign: &str,
    ) -> Result<Vec<AnnotationData>, FeedError> {
        let callsign = non_empty_segment(callsign, "callsign")?;
        self.query(&format!("/v2/callsign/{callsign}")).await
    }

    /// Aircraft with the given registration.
    pub async fn fetch_by_registration(
        &self,
        registration: &str,
    ) -> Result<Vec<AnnotationData>, FeedError> {
        let registration = non_empty_segment(registration, "registration")?;
        self.query(&format!("/v2/registration/{registration}")).await
    }

    /// Aircraft squawking `squawk`.
    pub async fn fetch_by_squawk(&self, squawk: &str) -> Result<Vec<AnnotationData>, FeedError> {
        let squawk = non_empty_segment(squawk, "squawk")?;
        if squawk.len() != 4 || !squawk.chars().all(|c| ('0'..='7').contains(&c)) {
            return Err(FeedError::InvalidRequest(format!("invalid squawk {squawk}")));
        }
        self.query(&format!("/v2/squawk/{squawk}")).await
    }

    /// Route (origin and destination airports) for `callsign` near `position`.
    pub async fn fetch_route(
        &self,
        callsign: &str,
        position: LatLng,
    ) -> Result<Option<RouteInfo>, FeedError> {
        let callsign = non_empty_segment(callsign, "callsign")?;
        let request = RoutesetRequest {
            planes: vec![RoutesetPlane {
                callsign: callsign.to_string(),
                lat: position.lat,
                lng: position.lng,
            }],
        };
        let body = self
            .transport
            .post_json("/api/0/routeset", serde_json::to_string(&request)?)
            .await?;
        let routes: Vec<WireRoute> = serde_json::from_str(&body)?;
        Ok(protocol::route_from_wire(&routes))
    }

    /// Nearby and military aircraft merged, first occurrence wins.
    ///
    /// Each category fails independently; a failing category contributes an
    /// empty list.
    pub async fn fetch_overview(&self, center: LatLng, radius_nm: f64) -> Vec<AnnotationData> {
        let (nearby, military) =
            tokio::join!(self.fetch_nearby(center, radius_nm), self.fetch_military());

        let nearby = nearby.unwrap_or_else(|e| {
            warn!("Nearby aircraft unavailable: {}", e);
            Vec::new()
        });
        let military = military.unwrap_or_else(|e| {
            warn!("Military aircraft unavailable: {}", e);
            Vec::new()
        });

        merge_unique([nearby, military])
    }
}

fn non_empty_segment<'a>(value: &'a str, field: &str) -> Result<&'a str, FeedError> {
    let value = value.trim();
    if value.is_empty() || value.contains('/') {
        return Err(FeedError::InvalidRequest(format!("invalid {field} '{value}'")));
    }
    Ok(value)
}

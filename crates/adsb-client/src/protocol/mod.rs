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

//! Wire records of the REST aircraft feed.
//!
//! The feed answers aircraft queries with `{ac: [...], now, total, ...}` and
//! route queries with a JSON array of routes. Every field is optional on the
//! wire; normalization into [`crate::AnnotationData`] lives in
//! [`normalize`].

mod normalize;

pub use normalize::{annotation_from_wire, annotations_from_wire, route_from_wire};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to the feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("http transport error: {0}")]
    Http(String),

    #[error("unexpected status {status} for {path}")]
    Status { status: u16, path: String },

    #[error("failed to decode feed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Top-level response of every aircraft query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub ac: Vec<WireAircraft>,
    #[serde(default)]
    pub now: Option<f64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub msg: Option<String>,
}

/// Barometric altitude field; the feed sends either feet or the literal
/// string `"ground"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireAltitude {
    Feet(f64),
    Text(String),
}

/// Last known position for aircraft whose current position is stale.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireLastPosition {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub seen_pos: Option<f64>,
}

/// One aircraft record as sent by the feed. Only the fields the client maps
/// are declared; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireAircraft {
    #[serde(default)]
    pub hex: Option<String>,
    #[serde(default)]
    pub flight: Option<String>,
    /// Registration.
    #[serde(default)]
    pub r: Option<String>,
    /// ICAO type designator.
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub alt_baro: Option<WireAltitude>,
    #[serde(default)]
    pub gs: Option<f64>,
    #[serde(default)]
    pub geom_rate: Option<f64>,
    #[serde(default)]
    pub rssi: Option<f64>,
    #[serde(default)]
    pub track: Option<f64>,
    #[serde(default)]
    pub seen: Option<f64>,
    #[serde(default)]
    pub squawk: Option<String>,
    #[serde(default, rename = "lastPosition")]
    pub last_position: Option<WireLastPosition>,
}

/// Airport entry of a route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireAirport {
    #[serde(default)]
    pub iata: Option<String>,
    #[serde(default)]
    pub icao: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

/// One entry of the routeset response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireRoute {
    #[serde(default)]
    pub callsign: Option<String>,
    #[serde(default)]
    pub airline_code: Option<String>,
    #[serde(default)]
    pub airport_codes: Option<String>,
    #[serde(default, rename = "_airports")]
    pub airports: Vec<WireAirport>,
    #[serde(default)]
    pub plausible: Option<f64>,
}

/// Body of a routeset query.
#[derive(Debug, Clone, Serialize)]
pub struct RoutesetRequest {
    pub planes: Vec<RoutesetPlane>,
}

/// One aircraft to look up a route for.
#[derive(Debug, Clone, Serialize)]
pub struct RoutesetPlane {
    pub callsign: String,
    pub lat: f64,
    pub lng: f64,
}

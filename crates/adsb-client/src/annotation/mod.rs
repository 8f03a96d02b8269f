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

//! Canonical per-aircraft annotation records.
//!
//! Every feed category is normalized into [`AnnotationData`]. All fields are
//! optional and sparse: a field is only present when the feed reported it, and
//! absent fields are never serialized as explicit nulls. Consumers rely on this
//! when shallow-merging a newer partial record over an older one with
//! [`AnnotationData::merge_from`].

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and inside the WGS84 degree ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Barometric altitude as reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Altitude {
    /// Altitude in feet.
    Feet(f64),
    /// The aircraft reports itself on the ground.
    Ground,
}

impl Serialize for Altitude {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Feet(feet) => serializer.serialize_f64(*feet),
            Self::Ground => serializer.serialize_str("ground"),
        }
    }
}

impl<'de> Deserialize<'de> for Altitude {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Feet(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Feet(feet) => Ok(Self::Feet(feet)),
            Repr::Text(text) if text.eq_ignore_ascii_case("ground") => Ok(Self::Ground),
            Repr::Text(text) => Err(de::Error::invalid_value(
                de::Unexpected::Str(&text),
                &"a number of feet or \"ground\"",
            )),
        }
    }
}

/// Flight identification, filled lazily after a route lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callsign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airline_code: Option<String>,
}

/// Airframe identification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AircraftDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icao24: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AircraftDetails {
    fn is_empty(&self) -> bool {
        self.registration.is_none() && self.icao24.is_none() && self.model.is_none()
    }
}

/// Origin or destination airport of a looked-up route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirportInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iata: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl AirportInfo {
    /// Coordinates of the airport when both components are known.
    #[must_use]
    pub fn coordinates(&self) -> Option<LatLng> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)).filter(LatLng::is_valid),
            _ => None,
        }
    }
}

/// Fast-changing kinematic state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicDetails {
    /// Seconds since the feed last heard from the aircraft.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<f64>,
    /// Ground speed in knots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_speed: Option<f64>,
    /// Geometric vertical rate in feet per minute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_rate: Option<f64>,
    /// Receiver signal strength in dBFS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<Altitude>,
    /// Track over ground in degrees, north = 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

impl DynamicDetails {
    fn is_empty(&self) -> bool {
        self.last_updated.is_none()
            && self.ground_speed.is_none()
            && self.vertical_rate.is_none()
            && self.signal_strength.is_none()
            && self.altitude.is_none()
            && self.heading.is_none()
    }
}

/// Canonical per-aircraft record shared by the reconciler, the watch list and
/// the background monitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationData {
    /// ICAO 24-bit address in lowercase hex. Records without one never reach
    /// reconciliation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<LatLng>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_position: Option<LatLng>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_details: Option<FlightDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aircraft_details: Option<AircraftDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_airport: Option<AirportInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_airport: Option<AirportInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<DynamicDetails>,
}

impl AnnotationData {
    /// Create an otherwise empty record for `id`.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Identifier, if present and non-empty.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Coordinates, if present and usable for rendering.
    #[must_use]
    pub fn valid_coordinates(&self) -> Option<LatLng> {
        self.coordinates.filter(LatLng::is_valid)
    }

    /// Callsign from the flight details, trimmed.
    #[must_use]
    pub fn callsign(&self) -> Option<&str> {
        self.flight_details
            .as_ref()
            .and_then(|f| f.callsign.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    #[must_use]
    pub fn altitude(&self) -> Option<Altitude> {
        self.dynamic.as_ref().and_then(|d| d.altitude)
    }

    #[must_use]
    pub fn heading(&self) -> Option<f64> {
        self.dynamic.as_ref().and_then(|d| d.heading)
    }

    /// Shallow-merge `newer` over `self`.
    ///
    /// Top-level fields present in `newer` replace the stored ones wholesale;
    /// fields absent from `newer` are kept. Nested groups are not merged
    /// field-by-field.
    pub fn merge_from(&mut self, newer: &AnnotationData) {
        fn take<T: Clone>(slot: &mut Option<T>, newer: &Option<T>) {
            if let Some(value) = newer {
                *slot = Some(value.clone());
            }
        }

        take(&mut self.id, &newer.id);
        take(&mut self.title, &newer.title);
        take(&mut self.coordinates, &newer.coordinates);
        take(&mut self.last_position, &newer.last_position);
        take(&mut self.flight_details, &newer.flight_details);
        take(&mut self.aircraft_details, &newer.aircraft_details);
        take(&mut self.origin_airport, &newer.origin_airport);
        take(&mut self.destination_airport, &newer.destination_airport);
        take(&mut self.dynamic, &newer.dynamic);
    }

    /// Drop nested groups that ended up with no fields set.
    pub(crate) fn prune_empty(&mut self) {
        if self.aircraft_details.as_ref().is_some_and(AircraftDetails::is_empty) {
            self.aircraft_details = None;
        }
        if self.dynamic.as_ref().is_some_and(DynamicDetails::is_empty) {
            self.dynamic = None;
        }
    }
}

/// Route information for a single callsign.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInfo {
    pub flight_details: FlightDetails,
    pub origin: AirportInfo,
    pub destination: AirportInfo,
}

impl RouteInfo {
    /// Partial record carrying only the route fields, ready to be merged over
    /// the selected aircraft's data.
    #[must_use]
    pub fn as_patch(&self) -> AnnotationData {
        AnnotationData {
            flight_details: Some(self.flight_details.clone()),
            origin_airport: Some(self.origin.clone()),
            destination_airport: Some(self.destination.clone()),
            ..AnnotationData::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validity() {
        assert!(LatLng::new(10.0, 20.0).is_valid());
        assert!(!LatLng::new(f64::NAN, 20.0).is_valid());
        assert!(!LatLng::new(91.0, 20.0).is_valid());
        assert!(!LatLng::new(10.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let mut stored = AnnotationData {
            id: Some("a1".to_string()),
            title: Some("UAL1".to_string()),
            coordinates: Some(LatLng::new(10.0, 20.0)),
            aircraft_details: Some(AircraftDetails {
                model: Some("B738".to_string()),
                ..AircraftDetails::default()
            }),
            ..AnnotationData::default()
        };

        let newer = AnnotationData {
            id: Some("a1".to_string()),
            coordinates: Some(LatLng::new(10.5, 20.5)),
            ..AnnotationData::default()
        };
        stored.merge_from(&newer);

        assert_eq!(stored.title.as_deref(), Some("UAL1"));
        assert_eq!(stored.coordinates, Some(LatLng::new(10.5, 20.5)));
        assert_eq!(
            stored.aircraft_details.and_then(|d| d.model).as_deref(),
            Some("B738")
        );
    }

    #[test]
    fn test_merge_replaces_groups_wholesale() {
        let mut stored = AnnotationData {
            dynamic: Some(DynamicDetails {
                altitude: Some(Altitude::Feet(30000.0)),
                heading: Some(90.0),
                ..DynamicDetails::default()
            }),
            ..AnnotationData::default()
        };
        let newer = AnnotationData {
            dynamic: Some(DynamicDetails {
                ground_speed: Some(420.0),
                ..DynamicDetails::default()
            }),
            ..AnnotationData::default()
        };
        stored.merge_from(&newer);

        let dynamic = stored.dynamic.unwrap();
        assert_eq!(dynamic.ground_speed, Some(420.0));
        assert!(dynamic.heading.is_none());
    }

    #[test]
    fn test_sparse_serialization_omits_absent_fields() {
        let data = AnnotationData::with_id("abc123");
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"id":"abc123"}"#);
    }

    #[test]
    fn test_altitude_serde() {
        let ground: Altitude = serde_json::from_str(r#""ground""#).unwrap();
        assert_eq!(ground, Altitude::Ground);
        let feet: Altitude = serde_json::from_str("35000").unwrap();
        assert_eq!(feet, Altitude::Feet(35000.0));
        assert!(serde_json::from_str::<Altitude>(r#""high""#).is_err());
        assert_eq!(serde_json::to_string(&Altitude::Ground).unwrap(), r#""ground""#);
    }

    #[test]
    fn test_callsign_is_trimmed() {
        let data = AnnotationData {
            flight_details: Some(FlightDetails {
                callsign: Some("DAL42   ".to_string()),
                airline_code: None,
            }),
            ..AnnotationData::default()
        };
        assert_eq!(data.callsign(), Some("DAL42"));
    }
}

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

//! Wire-to-canonical mapping.
//!
//! A canonical field is only set when the source field is present and
//! non-zero (non-empty for strings). Zero-valued numbers are treated as
//! "not reported", which keeps downstream shallow merges from clobbering good
//! data with placeholders.

use crate::annotation::{
    AircraftDetails, AirportInfo, Altitude, AnnotationData, DynamicDetails, FlightDetails, LatLng,
    RouteInfo,
};

use super::{WireAircraft, WireAirport, WireAltitude, WireRoute};

fn non_zero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn altitude(value: Option<&WireAltitude>) -> Option<Altitude> {
    match value? {
        WireAltitude::Feet(feet) => non_zero(Some(*feet)).map(Altitude::Feet),
        WireAltitude::Text(text) if text.eq_ignore_ascii_case("ground") => Some(Altitude::Ground),
        WireAltitude::Text(_) => None,
    }
}

fn position(lat: Option<f64>, lon: Option<f64>) -> Option<LatLng> {
    match (non_zero(lat), non_zero(lon)) {
        (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
        _ => None,
    }
}

/// Map one wire record into a sparse [`AnnotationData`].
#[must_use]
pub fn annotation_from_wire(aircraft: &WireAircraft) -> AnnotationData {
    let hex = non_empty(aircraft.hex.as_deref()).map(|h| h.to_ascii_lowercase());

    let mut annotation = AnnotationData {
        id: hex.clone(),
        coordinates: position(aircraft.lat, aircraft.lon),
        ..AnnotationData::default()
    };

    if let Some(flight) = non_empty(aircraft.flight.as_deref()) {
        annotation.title = Some(flight.clone());
        annotation.flight_details = Some(FlightDetails {
            callsign: Some(flight),
            airline_code: None,
        });
    }

    annotation.aircraft_details = Some(AircraftDetails {
        registration: non_empty(aircraft.r.as_deref()),
        icao24: hex,
        model: non_empty(aircraft.t.as_deref()),
    });

    annotation.dynamic = Some(DynamicDetails {
        last_updated: non_zero(aircraft.seen),
        ground_speed: non_zero(aircraft.gs),
        vertical_rate: non_zero(aircraft.geom_rate),
        signal_strength: non_zero(aircraft.rssi),
        altitude: altitude(aircraft.alt_baro.as_ref()),
        heading: non_zero(aircraft.track),
    });

    if let Some(last) = &aircraft.last_position {
        annotation.last_position = position(last.lat, last.lon);
    }

    annotation.prune_empty();
    annotation
}

/// Map a batch of wire records, preserving feed order.
#[must_use]
pub fn annotations_from_wire(aircraft: &[WireAircraft]) -> Vec<AnnotationData> {
    aircraft.iter().map(annotation_from_wire).collect()
}

fn airport(airport: Option<&WireAirport>) -> AirportInfo {
    airport
        .map(|a| AirportInfo {
            iata: non_empty(a.iata.as_deref()),
            name: non_empty(a.name.as_deref()),
            location: non_empty(a.location.as_deref()),
            lat: a.lat,
            lng: a.lon,
        })
        .unwrap_or_default()
}

/// Map the first route of a routeset response. The first airport is the
/// origin and the second the destination.
#[must_use]
pub fn route_from_wire(routes: &[WireRoute]) -> Option<RouteInfo> {
    let route = routes.first()?;
    Some(RouteInfo {
        flight_details: FlightDetails {
            callsign: non_empty(route.callsign.as_deref()),
            airline_code: non_empty(route.airline_code.as_deref()),
        },
        origin: airport(route.airports.first()),
        destination: airport(route.airports.get(1)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WireLastPosition;

    #[test]
    fn test_full_record_mapping() {
        let wire = WireAircraft {
            hex: Some("A1B2C3".to_string()),
            flight: Some("UAL123  ".to_string()),
            r: Some("N12345".to_string()),
            t: Some("B738".to_string()),
            lat: Some(33.9),
            lon: Some(-118.4),
            alt_baro: Some(WireAltitude::Feet(35000.0)),
            gs: Some(450.0),
            track: Some(270.0),
            ..WireAircraft::default()
        };
        let data = annotation_from_wire(&wire);

        assert_eq!(data.id.as_deref(), Some("a1b2c3"));
        assert_eq!(data.title.as_deref(), Some("UAL123"));
        assert_eq!(data.callsign(), Some("UAL123"));
        assert_eq!(data.coordinates, Some(LatLng::new(33.9, -118.4)));
        assert_eq!(data.altitude(), Some(Altitude::Feet(35000.0)));
        assert_eq!(data.heading(), Some(270.0));
        let details = data.aircraft_details.unwrap();
        assert_eq!(details.registration.as_deref(), Some("N12345"));
        assert_eq!(details.icao24.as_deref(), Some("a1b2c3"));
    }

    #[test]
    fn test_sparse_record_has_no_placeholder_fields() {
        let wire = WireAircraft {
            hex: Some("abc123".to_string()),
            lat: Some(0.0),
            lon: Some(5.0),
            gs: Some(0.0),
            ..WireAircraft::default()
        };
        let data = annotation_from_wire(&wire);

        assert!(data.coordinates.is_none());
        assert!(data.title.is_none());
        assert!(data.flight_details.is_none());
        assert!(data.dynamic.is_none());
        // icao24 mirrors the hex id, so aircraft details survive
        assert!(data.aircraft_details.is_some());

        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("dynamic").is_none());
        assert!(json.get("coordinates").is_none());
    }

    #[test]
    fn test_ground_altitude_and_last_position() {
        let wire = WireAircraft {
            hex: Some("c0ffee".to_string()),
            alt_baro: Some(WireAltitude::Text("ground".to_string())),
            last_position: Some(WireLastPosition {
                lat: Some(51.47),
                lon: Some(-0.45),
                seen_pos: Some(30.0),
            }),
            ..WireAircraft::default()
        };
        let data = annotation_from_wire(&wire);

        assert_eq!(data.altitude(), Some(Altitude::Ground));
        assert_eq!(data.last_position, Some(LatLng::new(51.47, -0.45)));
    }

    #[test]
    fn test_missing_hex_yields_no_id() {
        let data = annotation_from_wire(&WireAircraft {
            hex: Some("   ".to_string()),
            ..WireAircraft::default()
        });
        assert!(data.id().is_none());
    }

    #[test]
    fn test_route_mapping() {
        let routes = vec![WireRoute {
            callsign: Some("UAL123".to_string()),
            airline_code: Some("UAL".to_string()),
            airports: vec![
                WireAirport {
                    iata: Some("LAX".to_string()),
                    lat: Some(33.94),
                    lon: Some(-118.41),
                    ..WireAirport::default()
                },
                WireAirport {
                    iata: Some("JFK".to_string()),
                    lat: Some(40.64),
                    lon: Some(-73.78),
                    ..WireAirport::default()
                },
            ],
            ..WireRoute::default()
        }];

        let route = route_from_wire(&routes).unwrap();
        assert_eq!(route.flight_details.airline_code.as_deref(), Some("UAL"));
        assert_eq!(route.origin.iata.as_deref(), Some("LAX"));
        assert_eq!(
            route.destination.coordinates(),
            Some(LatLng::new(40.64, -73.78))
        );
    }

    #[test]
    fn test_empty_routeset() {
        assert!(route_from_wire(&[]).is_none());
    }
}

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

use std::fmt;
use std::str::FromStr;

use adsb_client::Altitude;
use serde::{Deserialize, Serialize};

/// Coarse flight phase derived from barometric altitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum StatusCategory {
    Grounded,
    LandingTakeOff,
    AscendingDescending,
    Cruising,
    Unknown,
}

impl StatusCategory {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Grounded => "Grounded",
            Self::LandingTakeOff => "Landing / Take off",
            Self::AscendingDescending => "Ascending / Descending",
            Self::Cruising => "Cruising",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StatusCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Grounded,
            Self::LandingTakeOff,
            Self::AscendingDescending,
            Self::Cruising,
            Self::Unknown,
        ]
        .into_iter()
        .find(|status| status.label() == s)
        .ok_or_else(|| format!("unknown status '{s}'"))
    }
}

impl From<StatusCategory> for String {
    fn from(status: StatusCategory) -> Self {
        status.label().to_string()
    }
}

impl TryFrom<String> for StatusCategory {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Classify an altitude.
///
/// Exactly 10 000 ft matches no band and is `Unknown`, as is a missing or
/// NaN altitude.
#[must_use]
pub fn classify(altitude: Option<Altitude>) -> StatusCategory {
    match altitude {
        Some(Altitude::Ground) => StatusCategory::Grounded,
        Some(Altitude::Feet(feet)) if feet < 5_000.0 => StatusCategory::LandingTakeOff,
        Some(Altitude::Feet(feet)) if (5_000.0..10_000.0).contains(&feet) => {
            StatusCategory::AscendingDescending
        }
        Some(Altitude::Feet(feet)) if feet > 10_000.0 => StatusCategory::Cruising,
        _ => StatusCategory::Unknown,
    }
}

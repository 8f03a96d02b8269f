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

//! Application configuration management.
//!
//! Persistent configuration in TOML via `confy`. Every field has a serde
//! default so older or partial files keep loading.

use std::path::PathBuf;
use std::time::Duration;

use adsb_client::{FeedConfig, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};

use crate::annotations::ReconcilerSettings;
use crate::session::SessionSettings;
use crate::watch::{FileStore, MonitorSettings};

const APP_NAME: &str = "flightwatch";
const CONFIG_NAME: &str = "config";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Base URL of the aircraft feed
    #[serde(default = "default_feed_base_url")]
    pub feed_base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Overview polling period in seconds
    #[serde(default = "default_poll_secs")]
    pub overview_poll_secs: u64,

    /// Track-mode polling period in seconds
    #[serde(default = "default_poll_secs")]
    pub track_poll_secs: u64,

    /// Duration of a marker position transition in milliseconds
    #[serde(default = "default_transition_duration_ms")]
    pub transition_duration_ms: u64,

    /// Fraction advanced per precomputed waypoint (0.0 - 1.0)
    #[serde(default = "default_waypoint_step")]
    pub waypoint_step: f64,

    /// Camera distance when tracking one aircraft, in metres
    #[serde(default = "default_track_camera_distance_m")]
    pub track_camera_distance_m: f64,

    /// Camera distance when returning to overview, in metres
    #[serde(default = "default_overview_camera_distance_m")]
    pub overview_camera_distance_m: f64,

    /// Background watch polling period in seconds
    #[serde(default = "default_watch_interval_secs")]
    pub watch_interval_secs: u64,

    /// Concurrent lookups per background batch
    #[serde(default = "default_watch_batch_size")]
    pub watch_batch_size: usize,

    /// Watch store file; defaults to the platform data directory
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_feed_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_poll_secs() -> u64 {
    3
}

fn default_transition_duration_ms() -> u64 {
    4000
}

fn default_waypoint_step() -> f64 {
    0.05
}

fn default_track_camera_distance_m() -> f64 {
    100_000.0
}

fn default_overview_camera_distance_m() -> f64 {
    1_000_000.0
}

fn default_watch_interval_secs() -> u64 {
    120
}

fn default_watch_batch_size() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            feed_base_url: default_feed_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            overview_poll_secs: default_poll_secs(),
            track_poll_secs: default_poll_secs(),
            transition_duration_ms: default_transition_duration_ms(),
            waypoint_step: default_waypoint_step(),
            track_camera_distance_m: default_track_camera_distance_m(),
            overview_camera_distance_m: default_overview_camera_distance_m(),
            watch_interval_secs: default_watch_interval_secs(),
            watch_batch_size: default_watch_batch_size(),
            store_path: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    pub fn config_path() -> Result<PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    #[must_use]
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            base_url: self.feed_base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }

    #[must_use]
    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            transition: Duration::from_millis(self.transition_duration_ms),
            waypoint_step: self.waypoint_step,
            track_camera_distance_m: self.track_camera_distance_m,
            overview_camera_distance_m: self.overview_camera_distance_m,
        }
    }

    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            overview_interval: Duration::from_secs(self.overview_poll_secs.max(1)),
            track_interval: Duration::from_secs(self.track_poll_secs.max(1)),
            reconciler: self.reconciler_settings(),
        }
    }

    #[must_use]
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            interval: Duration::from_secs(self.watch_interval_secs.max(1)),
            batch_size: self.watch_batch_size.max(1),
        }
    }

    /// Watch store location: the configured path, else the platform default.
    #[must_use]
    pub fn store_path(&self) -> Option<PathBuf> {
        self.store_path.clone().or_else(FileStore::default_path)
    }
}

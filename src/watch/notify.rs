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

//! Local notification scheduling.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::status::StatusCategory;

/// Delay between observing a status change and showing its notification.
pub const NOTIFICATION_DELAY_SECS: i64 = 5;

const NOTIFICATION_TITLE: &str = "Flight Status Change";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification could not be scheduled: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalNotification {
    pub id: i32,
    pub title: String,
    pub body: String,
    pub schedule_at: DateTime<Utc>,
}

impl LocalNotification {
    /// Notification announcing that flight `id` entered `status`.
    ///
    /// The notification id is a random small integer; collisions are not
    /// checked.
    #[must_use]
    pub fn status_change(id: &str, status: StatusCategory, observed_at: DateTime<Utc>) -> Self {
        Self {
            id: rand::thread_rng().gen_range(1..=i32::from(u16::MAX)),
            title: NOTIFICATION_TITLE.to_string(),
            body: format!("Flight {id} is now {status}"),
            schedule_at: observed_at + ChronoDuration::seconds(NOTIFICATION_DELAY_SECS),
        }
    }
}

/// Host capability that delivers local notifications.
pub trait Notifier: Send + Sync {
    fn schedule(&self, notifications: &[LocalNotification]) -> Result<(), NotifyError>;
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn schedule(&self, notifications: &[LocalNotification]) -> Result<(), NotifyError> {
        for notification in notifications {
            info!(
                "[notification {} at {}] {}: {}",
                notification.id,
                notification.schedule_at.format("%H:%M:%S"),
                notification.title,
                notification.body
            );
        }
        Ok(())
    }
}

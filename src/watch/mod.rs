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

//! Background flight watching.
//!
//! The monitor runs in its own execution context: [`BackgroundRunner`] gives
//! every dispatched event a dedicated thread and tokio runtime. Nothing is
//! shared with the foreground except the [`KvStore`] and the serialized start
//! payload, which is decoded on dispatch.
//!
//! ```no_run
//! use std::sync::Arc;
//! use adsb_client::{FeedClient, FeedConfig};
//! use flightwatch::watch::{BackgroundRunner, LogNotifier, MemoryStore, MonitorSettings, START_TRACKING_EVENT};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(FeedClient::from_config(&FeedConfig::default())?);
//! let runner = BackgroundRunner::new(MemoryStore::new(), LogNotifier, client, MonitorSettings::default());
//! runner.dispatch_event(START_TRACKING_EVENT, r#"{"abc123": "Unknown"}"#, true, |outcome| {
//!     println!("watch finished: {outcome:?}");
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod monitor;
pub mod notify;
pub mod status;
pub mod store;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{error, info, warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use monitor::{
    CycleReport, FlightSource, MonitorSettings, MonitorState, WatchMonitor, WatchOutcome,
};
pub use notify::{LocalNotification, LogNotifier, Notifier, NotifyError};
pub use status::{classify, StatusCategory};
pub use store::{
    FileStore, KvStore, MemoryStore, StoreError, WatchEntry, WatchIndex, WatchStore, INDEX_KEY,
};

/// Event that starts watching the flights in its payload.
pub const START_TRACKING_EVENT: &str = "startTracking";

/// Start payload: watched id to its initial status.
pub type StartPayload = BTreeMap<String, StatusCategory>;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no handler for event '{0}'")]
    UnknownEvent(String),
    #[error("invalid start payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("failed to start background context: {0}")]
    Spawn(#[source] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Started,
    /// A task for this event is still running; the dispatch was ignored.
    AlreadyRunning,
}

#[derive(Debug)]
struct RunningTask {
    cancel: CancellationToken,
    stop_on_foreground: bool,
}

type TaskTable = Arc<Mutex<HashMap<String, RunningTask>>>;

fn lock_tasks(tasks: &Mutex<HashMap<String, RunningTask>>) -> MutexGuard<'_, HashMap<String, RunningTask>> {
    tasks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hosts watch monitors outside the foreground runtime.
#[derive(Debug)]
pub struct BackgroundRunner<K, N, F> {
    store: K,
    notifier: N,
    source: Arc<F>,
    settings: MonitorSettings,
    tasks: TaskTable,
}

impl<K, N, F> BackgroundRunner<K, N, F>
where
    K: KvStore + Clone + 'static,
    N: Notifier + Clone + 'static,
    F: FlightSource + 'static,
{
    pub fn new(store: K, notifier: N, source: Arc<F>, settings: MonitorSettings) -> Self {
        Self {
            store,
            notifier,
            source,
            settings,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Deliver `event` with its JSON `payload`.
    ///
    /// `on_complete` is called exactly once, from the background thread, for
    /// every dispatch that returns [`Dispatch::Started`]. It is dropped
    /// unused otherwise.
    pub fn dispatch_event<C>(
        &self,
        event: &str,
        payload: &str,
        stop_on_foreground: bool,
        on_complete: C,
    ) -> Result<Dispatch, RunnerError>
    where
        C: FnOnce(Result<WatchOutcome, RunnerError>) + Send + 'static,
    {
        if event != START_TRACKING_EVENT {
            return Err(RunnerError::UnknownEvent(event.to_string()));
        }
        let initial: StartPayload = serde_json::from_str(payload)?;

        let mut tasks = lock_tasks(&self.tasks);
        if tasks.contains_key(event) {
            info!("Task already running for event: {}", event);
            return Ok(Dispatch::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let mut monitor = WatchMonitor::new(
            WatchStore::new(self.store.clone()),
            self.notifier.clone(),
            Arc::clone(&self.source),
            self.settings.clone(),
        );
        let table = Arc::clone(&self.tasks);
        let name = event.to_string();
        let token = cancel.clone();

        std::thread::Builder::new()
            .name(format!("watch-{event}"))
            .spawn(move || {
                let outcome = match tokio::runtime::Runtime::new() {
                    Ok(rt) => rt
                        .block_on(monitor.run(&initial, &token))
                        .map_err(RunnerError::from),
                    Err(e) => {
                        error!("Failed to create runtime for {}: {}", name, e);
                        Err(RunnerError::Spawn(e))
                    }
                };
                lock_tasks(&table).remove(&name);
                info!("Background task {} finished: {:?}", name, outcome);
                on_complete(outcome);
            })
            .map_err(RunnerError::Spawn)?;

        tasks.insert(
            event.to_string(),
            RunningTask {
                cancel,
                stop_on_foreground,
            },
        );
        info!("Background task started for event: {}", event);
        Ok(Dispatch::Started)
    }

    #[must_use]
    pub fn is_running(&self, event: &str) -> bool {
        lock_tasks(&self.tasks).contains_key(event)
    }

    /// Ask the task for `event` to stop. Returns whether one was running.
    pub fn shutdown(&self, event: &str) -> bool {
        match lock_tasks(&self.tasks).get(event) {
            Some(task) => {
                task.cancel.cancel();
                true
            }
            None => {
                warn!("No background task running for event: {}", event);
                false
            }
        }
    }

    /// The foreground came back: stop tasks that asked for it.
    pub fn on_foreground(&self) {
        for (event, task) in lock_tasks(&self.tasks).iter() {
            if task.stop_on_foreground {
                info!("Stopping background task {} on foreground", event);
                task.cancel.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::notify::testing::RecordingNotifier;
    use adsb_client::{Altitude, AnnotationData, DynamicDetails, FeedError};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Reports the same altitude for every flight.
    struct FixedAltitude(Altitude);

    impl FlightSource for FixedAltitude {
        async fn fetch_flight(&self, id: &str) -> Result<Option<AnnotationData>, FeedError> {
            Ok(Some(AnnotationData {
                dynamic: Some(DynamicDetails {
                    altitude: Some(self.0),
                    ..DynamicDetails::default()
                }),
                ..AnnotationData::with_id(id)
            }))
        }
    }

    fn runner(
        altitude: Altitude,
    ) -> (BackgroundRunner<MemoryStore, RecordingNotifier, FixedAltitude>, MemoryStore, RecordingNotifier) {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let runner = BackgroundRunner::new(
            store.clone(),
            notifier.clone(),
            Arc::new(FixedAltitude(altitude)),
            MonitorSettings {
                interval: Duration::from_millis(10),
                batch_size: 5,
            },
        );
        (runner, store, notifier)
    }

    const PAYLOAD: &str = r#"{"abc123": "Unknown"}"#;
    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_dispatch_runs_to_completion() {
        let (runner, store, notifier) = runner(Altitude::Ground);
        let (tx, rx) = mpsc::channel();

        let dispatch = runner
            .dispatch_event(START_TRACKING_EVENT, PAYLOAD, false, move |outcome| {
                tx.send(outcome.map_err(|e| e.to_string())).unwrap();
            })
            .unwrap();
        assert_eq!(dispatch, Dispatch::Started);

        let outcome = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(outcome, Ok(WatchOutcome::AllLanded));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(store.is_empty());
        assert_eq!(notifier.bodies(), vec!["Flight abc123 is now Grounded"]);
        assert!(!runner.is_running(START_TRACKING_EVENT));
    }

    #[test]
    fn test_duplicate_dispatch_is_ignored_until_finished() {
        let (runner, _store, _notifier) = runner(Altitude::Feet(35_000.0));
        let (tx, rx) = mpsc::channel();

        let first = runner
            .dispatch_event(START_TRACKING_EVENT, PAYLOAD, false, move |outcome| {
                tx.send(outcome.map_err(|e| e.to_string())).unwrap();
            })
            .unwrap();
        let second = runner
            .dispatch_event(START_TRACKING_EVENT, PAYLOAD, false, |_| {
                panic!("ignored dispatch must not complete");
            })
            .unwrap();
        assert_eq!(first, Dispatch::Started);
        assert_eq!(second, Dispatch::AlreadyRunning);

        assert!(runner.shutdown(START_TRACKING_EVENT));
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Ok(WatchOutcome::Cancelled));
        assert!(!runner.shutdown(START_TRACKING_EVENT));

        let (tx, rx) = mpsc::channel();
        let third = runner
            .dispatch_event(START_TRACKING_EVENT, PAYLOAD, false, move |outcome| {
                tx.send(outcome.is_ok()).unwrap();
            })
            .unwrap();
        assert_eq!(third, Dispatch::Started);
        runner.shutdown(START_TRACKING_EVENT);
        assert!(rx.recv_timeout(WAIT).unwrap());
    }

    #[test]
    fn test_foreground_stops_flagged_tasks() {
        let (runner, _store, _notifier) = runner(Altitude::Feet(35_000.0));
        let (tx, rx) = mpsc::channel();
        runner
            .dispatch_event(START_TRACKING_EVENT, PAYLOAD, true, move |outcome| {
                tx.send(outcome.map_err(|e| e.to_string())).unwrap();
            })
            .unwrap();

        runner.on_foreground();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Ok(WatchOutcome::Cancelled));
    }

    #[test]
    fn test_rejects_unknown_event_and_bad_payload() {
        let (runner, _store, _notifier) = runner(Altitude::Ground);

        let unknown = runner.dispatch_event("stopEverything", PAYLOAD, false, |_| {});
        assert!(matches!(unknown, Err(RunnerError::UnknownEvent(_))));

        let bad = runner.dispatch_event(START_TRACKING_EVENT, r#"{"abc123": "Hovering"}"#, false, |_| {});
        assert!(matches!(bad, Err(RunnerError::Payload(_))));
        assert!(!runner.is_running(START_TRACKING_EVENT));
    }
}

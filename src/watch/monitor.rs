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

//! Background watch monitor.
//!
//! Polls every watched flight on a timer, persists coarse status changes and
//! schedules a notification for each one. The run ends once no watched flight
//! is still airborne, clearing everything it persisted.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use adsb_client::{AnnotationData, FeedClient, FeedError, FeedTransport};
use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::notify::{LocalNotification, Notifier};
use super::status::{classify, StatusCategory};
use super::store::{KvStore, StoreError, WatchEntry, WatchStore};

/// Where the monitor gets current flight data from.
pub trait FlightSource: Send + Sync {
    /// Current record for `id`, or `None` when the feed has nothing for it.
    fn fetch_flight(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<AnnotationData>, FeedError>> + Send;
}

impl<T: FeedTransport> FlightSource for FeedClient<T> {
    async fn fetch_flight(&self, id: &str) -> Result<Option<AnnotationData>, FeedError> {
        self.fetch_by_icao(id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub interval: Duration,
    /// Concurrent lookups per batch.
    pub batch_size: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(120),
            batch_size: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Started,
    Polling,
}

/// How a monitor run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Every watched flight is grounded or could not be resolved.
    AllLanded,
    /// The watch index was empty.
    NothingToWatch,
    Cancelled,
}

/// Result of one polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub watched: usize,
    /// Flights whose status changed and was persisted, in completion order.
    pub changes: Vec<(String, StatusCategory)>,
    /// Resolved flights that are not grounded.
    pub active: usize,
    pub unresolved: usize,
}

#[derive(Debug)]
pub struct WatchMonitor<K, N, F> {
    store: WatchStore<K>,
    notifier: N,
    source: Arc<F>,
    settings: MonitorSettings,
    state: MonitorState,
}

impl<K, N, F> WatchMonitor<K, N, F>
where
    K: KvStore,
    N: Notifier,
    F: FlightSource + 'static,
{
    pub fn new(store: WatchStore<K>, notifier: N, source: Arc<F>, settings: MonitorSettings) -> Self {
        Self {
            store,
            notifier,
            source,
            settings,
            state: MonitorState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn store(&self) -> &WatchStore<K> {
        &self.store
    }

    /// Watch the flights in `initial` until none is airborne or `cancel`
    /// fires. The first poll happens one interval after the start.
    ///
    /// Only a failure to write the initial state is an error; failures while
    /// polling are logged and the affected flight keeps its previous status.
    pub async fn run(
        &mut self,
        initial: &BTreeMap<String, StatusCategory>,
        cancel: &CancellationToken,
    ) -> Result<WatchOutcome, StoreError> {
        self.store.reset(initial)?;
        if initial.is_empty() {
            info!("No flights to watch");
            self.store.clear_all()?;
            return Ok(WatchOutcome::NothingToWatch);
        }
        self.set_state(MonitorState::Started);
        info!(
            "Watching {} flights every {:?}",
            initial.len(),
            self.settings.interval
        );

        let mut ticker = interval_at(Instant::now() + self.settings.interval, self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("Watch cancelled");
                    self.set_state(MonitorState::Idle);
                    return Ok(WatchOutcome::Cancelled);
                }
                _ = ticker.tick() => {}
            }

            self.set_state(MonitorState::Polling);
            let report = match self.poll_once().await {
                Ok(report) => report,
                Err(e) => {
                    warn!("Watch index unreadable, keeping watch for next cycle: {}", e);
                    continue;
                }
            };

            let outcome = if report.watched == 0 {
                Some(WatchOutcome::NothingToWatch)
            } else if report.active == 0 {
                Some(WatchOutcome::AllLanded)
            } else {
                None
            };

            if let Some(outcome) = outcome {
                info!("All flights are landed or unavailable, stopping watch");
                if let Err(e) = self.store.clear_all() {
                    error!("Failed to clear watch state: {}", e);
                }
                self.set_state(MonitorState::Idle);
                return Ok(outcome);
            }
        }
    }

    /// Fetch every indexed flight once and record status changes.
    ///
    /// Fails only when the watch index cannot be read; nothing is fetched or
    /// written in that case.
    pub async fn poll_once(&mut self) -> Result<CycleReport, StoreError> {
        let index = self.store.index()?;
        let ids: Vec<String> = index.iter().map(str::to_string).collect();
        let mut report = CycleReport {
            watched: ids.len(),
            ..CycleReport::default()
        };
        debug!("Checking {} flights for updates", ids.len());

        for batch in ids.chunks(self.settings.batch_size.max(1)) {
            let mut lookups = JoinSet::new();
            for id in batch {
                let source = Arc::clone(&self.source);
                let id = id.clone();
                lookups.spawn(async move {
                    let result = source.fetch_flight(&id).await;
                    (id, result)
                });
            }

            while let Some(joined) = lookups.join_next().await {
                match joined {
                    Ok((id, Ok(Some(record)))) => self.observe(&id, &record, &mut report),
                    Ok((id, Ok(None))) => {
                        debug!("No data for flight {}", id);
                        report.unresolved += 1;
                    }
                    Ok((id, Err(e))) => {
                        warn!("Error fetching flight {}: {}", id, e);
                        report.unresolved += 1;
                    }
                    Err(e) => {
                        error!("Flight lookup task failed: {}", e);
                        report.unresolved += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    fn observe(&self, id: &str, record: &AnnotationData, report: &mut CycleReport) {
        let altitude = record.altitude();
        let status = classify(altitude);
        if status != StatusCategory::Grounded {
            report.active += 1;
        }

        let previous = match self.store.entry(id) {
            Ok(entry) => entry.map(|entry| entry.status),
            Err(e) => {
                warn!("Stored status for {} unreadable: {}", id, e);
                None
            }
        };
        if previous == Some(status) {
            return;
        }

        info!("Flight {} changed from {:?} to {}", id, previous, status);
        if let Err(e) = self.store.upsert(id, &WatchEntry::new(status, altitude)) {
            error!("Failed to persist status for {}: {}", id, e);
            return;
        }
        report.changes.push((id.to_string(), status));

        let notification = LocalNotification::status_change(id, status, Utc::now());
        if let Err(e) = self.notifier.schedule(&[notification]) {
            warn!("Failed to schedule notification for {}: {}", id, e);
        }
    }

    fn set_state(&mut self, state: MonitorState) {
        if self.state != state {
            debug!("Monitor {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::notify::testing::RecordingNotifier;
    use crate::watch::store::{MemoryStore, INDEX_KEY};
    use adsb_client::{Altitude, DynamicDetails};
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Reply = Result<Option<Altitude>, ()>;

    /// Replies per id in order; the last reply repeats.
    #[derive(Default)]
    struct ScriptedSource {
        replies: Mutex<HashMap<String, VecDeque<Reply>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn with(self, id: &str, replies: Vec<Reply>) -> Self {
            self.replies
                .lock()
                .unwrap()
                .insert(id.to_string(), replies.into());
            self
        }
    }

    impl FlightSource for ScriptedSource {
        async fn fetch_flight(&self, id: &str) -> Result<Option<AnnotationData>, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = {
                let mut replies = self.replies.lock().unwrap();
                let queue = replies.entry(id.to_string()).or_default();
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            };
            match reply {
                Some(Ok(altitude)) => Ok(Some(AnnotationData {
                    dynamic: Some(DynamicDetails {
                        altitude,
                        ..DynamicDetails::default()
                    }),
                    ..AnnotationData::with_id(id)
                })),
                Some(Err(())) => Err(FeedError::Http("connection reset".to_string())),
                None => Ok(None),
            }
        }
    }

    /// Memory store whose flight writes and index reads can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_flight_writes: AtomicBool,
        /// Index reads still to fail.
        fail_index_reads: AtomicUsize,
    }

    impl KvStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            if key == INDEX_KEY
                && self
                    .fail_index_reads
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return Err(StoreError::Io(std::io::Error::other("read interrupted")));
            }
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if key.starts_with("flight_") && self.fail_flight_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.set(key, value)
        }

        fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.inner.delete(key)
        }
    }

    fn watching(ids: &[&str]) -> BTreeMap<String, StatusCategory> {
        ids.iter()
            .map(|id| ((*id).to_string(), StatusCategory::Unknown))
            .collect()
    }

    fn monitor<K: KvStore>(
        kv: K,
        source: ScriptedSource,
    ) -> (WatchMonitor<K, RecordingNotifier, ScriptedSource>, RecordingNotifier) {
        let notifier = RecordingNotifier::default();
        let monitor = WatchMonitor::new(
            WatchStore::new(kv),
            notifier.clone(),
            Arc::new(source),
            MonitorSettings::default(),
        );
        (monitor, notifier)
    }

    #[tokio::test]
    async fn test_landing_then_grounded_scenario() {
        let source = ScriptedSource::default().with(
            "abc123",
            vec![Ok(Some(Altitude::Feet(3000.0))), Ok(Some(Altitude::Ground))],
        );
        let kv = MemoryStore::new();
        let (mut monitor, notifier) = monitor(kv.clone(), source);
        monitor.store().reset(&watching(&["abc123"])).unwrap();

        let first = monitor.poll_once().await.unwrap();
        assert_eq!(first.changes, vec![("abc123".to_string(), StatusCategory::LandingTakeOff)]);
        assert_eq!(first.active, 1);
        assert_eq!(notifier.bodies(), vec!["Flight abc123 is now Landing / Take off"]);
        let entry = monitor.store().entry("abc123").unwrap().unwrap();
        assert_eq!(entry.status, StatusCategory::LandingTakeOff);
        assert_eq!(entry.altitude, Some(Altitude::Feet(3000.0)));

        let second = monitor.poll_once().await.unwrap();
        assert_eq!(second.changes, vec![("abc123".to_string(), StatusCategory::Grounded)]);
        assert_eq!(second.active, 0);
        assert_eq!(notifier.bodies().len(), 2);
        assert_eq!(notifier.bodies()[1], "Flight abc123 is now Grounded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_terminates_when_all_landed_and_clears_state() {
        let source = ScriptedSource::default().with(
            "abc123",
            vec![Ok(Some(Altitude::Feet(3000.0))), Ok(Some(Altitude::Ground))],
        );
        let kv = MemoryStore::new();
        let (mut monitor, notifier) = monitor(kv.clone(), source);
        let started = Instant::now();

        let outcome = monitor
            .run(&watching(&["abc123"]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, WatchOutcome::AllLanded);
        assert_eq!(notifier.bodies().len(), 2);
        assert!(kv.is_empty());
        assert!(monitor.store().index().unwrap().is_empty());
        assert_eq!(monitor.state(), MonitorState::Idle);
        // Two polls, the first one interval after start.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(240) && elapsed < Duration::from_secs(241));
    }

    #[tokio::test]
    async fn test_unchanged_status_is_not_renotified() {
        let source =
            ScriptedSource::default().with("abc123", vec![Ok(Some(Altitude::Feet(35_000.0)))]);
        let (mut monitor, notifier) = monitor(MemoryStore::new(), source);
        monitor.store().reset(&watching(&["abc123"])).unwrap();

        monitor.poll_once().await.unwrap();
        let again = monitor.poll_once().await.unwrap();

        assert!(again.changes.is_empty());
        assert_eq!(again.active, 1);
        assert_eq!(notifier.bodies(), vec!["Flight abc123 is now Cruising"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_carries_previous_status() {
        let source = ScriptedSource::default()
            .with("bad", vec![Ok(Some(Altitude::Feet(35_000.0))), Err(())])
            .with("good", vec![Ok(Some(Altitude::Feet(20_000.0)))]);
        let (mut monitor, notifier) = monitor(MemoryStore::new(), source);
        monitor.store().reset(&watching(&["bad", "good"])).unwrap();

        monitor.poll_once().await.unwrap();
        let report = monitor.poll_once().await.unwrap();

        assert_eq!(report.unresolved, 1);
        assert_eq!(report.active, 1);
        assert_eq!(
            monitor.store().entry("bad").unwrap().unwrap().status,
            StatusCategory::Cruising
        );
        assert_eq!(notifier.bodies().len(), 2);
    }

    #[tokio::test]
    async fn test_unresolved_flights_do_not_keep_watch_alive() {
        let source = ScriptedSource::default().with("gone", vec![Err(())]);
        let (mut monitor, _notifier) = monitor(MemoryStore::new(), source);
        monitor.store().reset(&watching(&["gone", "missing"])).unwrap();

        let report = monitor.poll_once().await.unwrap();
        assert_eq!(report.unresolved, 2);
        assert_eq!(report.active, 0);
    }

    #[tokio::test]
    async fn test_every_flight_fetched_across_batches() {
        let ids = ["a", "b", "c", "d", "e", "f", "g"];
        let mut source = ScriptedSource::default();
        for id in ids {
            source = source.with(id, vec![Ok(Some(Altitude::Feet(12_000.0)))]);
        }
        let source = Arc::new(source);
        let notifier = RecordingNotifier::default();
        let mut monitor = WatchMonitor::new(
            WatchStore::new(MemoryStore::new()),
            notifier.clone(),
            Arc::clone(&source),
            MonitorSettings::default(),
        );
        monitor.store().reset(&watching(&ids)).unwrap();

        let report = monitor.poll_once().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 7);
        assert_eq!(report.changes.len(), 7);
        assert_eq!(notifier.bodies().len(), 7);
    }

    #[tokio::test]
    async fn test_persist_failure_skips_notification() {
        let source =
            ScriptedSource::default().with("abc123", vec![Ok(Some(Altitude::Feet(3000.0)))]);
        let kv = Arc::new(FlakyStore::default());
        let (mut monitor, notifier) = monitor(Arc::clone(&kv), source);
        monitor.store().reset(&watching(&["abc123"])).unwrap();
        kv.fail_flight_writes.store(true, Ordering::SeqCst);

        let report = monitor.poll_once().await.unwrap();
        assert!(report.changes.is_empty());
        assert!(notifier.bodies().is_empty());
        assert_eq!(
            monitor.store().entry("abc123").unwrap().unwrap().status,
            StatusCategory::Unknown
        );

        kv.fail_flight_writes.store(false, Ordering::SeqCst);
        let retry = monitor.poll_once().await.unwrap();
        assert_eq!(retry.changes.len(), 1);
        assert_eq!(notifier.bodies().len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_index_fails_only_that_cycle() {
        let source =
            ScriptedSource::default().with("abc123", vec![Ok(Some(Altitude::Feet(35_000.0)))]);
        let kv = Arc::new(FlakyStore::default());
        let (mut monitor, notifier) = monitor(Arc::clone(&kv), source);
        monitor.store().reset(&watching(&["abc123"])).unwrap();
        kv.fail_index_reads.store(1, Ordering::SeqCst);

        assert!(monitor.poll_once().await.is_err());
        assert!(notifier.bodies().is_empty());
        assert_eq!(
            monitor.store().entry("abc123").unwrap().unwrap().status,
            StatusCategory::Unknown
        );

        let report = monitor.poll_once().await.unwrap();
        assert_eq!(report.watched, 1);
        assert_eq!(report.active, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_transient_index_error() {
        let source =
            ScriptedSource::default().with("abc123", vec![Ok(Some(Altitude::Feet(35_000.0)))]);
        let kv = Arc::new(FlakyStore::default());
        let (mut monitor, notifier) = monitor(Arc::clone(&kv), source);
        let cancel = CancellationToken::new();

        // Break the first poll's index read, then stop after the second poll.
        let flaky = Arc::clone(&kv);
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            flaky.fail_index_reads.store(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(299)).await;
            trigger.cancel();
        });

        let outcome = monitor.run(&watching(&["abc123"]), &cancel).await.unwrap();

        assert_eq!(outcome, WatchOutcome::Cancelled);
        assert_eq!(kv.fail_index_reads.load(Ordering::SeqCst), 0);
        assert_eq!(
            monitor.store().index().unwrap().iter().collect::<Vec<_>>(),
            vec!["abc123"]
        );
        assert_eq!(
            monitor.store().entry("abc123").unwrap().unwrap().status,
            StatusCategory::Cruising
        );
        assert_eq!(notifier.bodies(), vec!["Flight abc123 is now Cruising"]);
    }

    #[tokio::test]
    async fn test_empty_start_clears_leftover_watch() {
        let kv = MemoryStore::new();
        let (mut monitor, _notifier) = monitor(kv.clone(), ScriptedSource::default());
        monitor.store().reset(&watching(&["old1", "old2"])).unwrap();

        let outcome = monitor
            .run(&BTreeMap::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, WatchOutcome::NothingToWatch);
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn test_empty_watch_list_finishes_immediately() {
        let (mut monitor, _notifier) = monitor(MemoryStore::new(), ScriptedSource::default());
        let outcome = monitor
            .run(&BTreeMap::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, WatchOutcome::NothingToWatch);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let source =
            ScriptedSource::default().with("abc123", vec![Ok(Some(Altitude::Feet(35_000.0)))]);
        let (mut monitor, _notifier) = monitor(MemoryStore::new(), source);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(300)).await;
            trigger.cancel();
        });

        let outcome = monitor.run(&watching(&["abc123"]), &cancel).await.unwrap();
        assert_eq!(outcome, WatchOutcome::Cancelled);
        assert_eq!(
            monitor.store().entry("abc123").unwrap().unwrap().status,
            StatusCategory::Cruising
        );
    }
}

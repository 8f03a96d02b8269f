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

//! Foreground session.
//!
//! One task owns the map surface, the reconciler and the polling scheduler.
//! Poll ticks, fetch results, marker selections, commands and animation
//! frames are interleaved with `tokio::select!`, so map mutation never needs
//! a lock. Fetches run as spawned tasks and may overlap; their results come
//! back over a channel tagged with the poll generation and sequence number
//! and stale ones are dropped.

use std::sync::Arc;
use std::time::Duration;

use adsb_client::{AnnotationData, FeedClient, FeedError, FeedTransport, RouteInfo};
use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::annotations::{AnnotationEvent, Reconciler, ReconcilerSettings};
use crate::map::MapSurface;
use crate::scheduler::{PollMode, PollTick, PollingScheduler};

/// Animation frame period, roughly 60 Hz.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub overview_interval: Duration,
    pub track_interval: Duration,
    pub reconciler: ReconcilerSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            overview_interval: Duration::from_secs(3),
            track_interval: Duration::from_secs(3),
            reconciler: ReconcilerSettings::default(),
        }
    }
}

/// Requests a front end can send to a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Select a marker, as if the user tapped it.
    Select(String),
    ExitTrack,
    Shutdown,
}

/// Control side of a running [`Session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn select(&self, id: impl Into<String>) {
        self.send(SessionCommand::Select(id.into()));
    }

    pub fn exit_track(&self) {
        self.send(SessionCommand::ExitTrack);
    }

    /// Stop the session. Safe to call more than once.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Queue a shutdown behind commands already sent.
    pub fn shutdown_after_pending(&self) {
        self.send(SessionCommand::Shutdown);
    }

    fn send(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            debug!("Session already stopped");
        }
    }
}

#[derive(Debug)]
enum FetchResult {
    Overview {
        generation: u64,
        seq: u64,
        records: Vec<AnnotationData>,
    },
    Track {
        generation: u64,
        seq: u64,
        id: String,
        record: Result<Option<AnnotationData>, FeedError>,
    },
    Route {
        id: String,
        route: Result<Option<RouteInfo>, FeedError>,
    },
}

pub struct Session<S, T> {
    client: Arc<FeedClient<T>>,
    surface: S,
    reconciler: Reconciler,
    scheduler: PollingScheduler,
    ticks: mpsc::UnboundedReceiver<PollTick>,
    selections: mpsc::UnboundedReceiver<String>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    results_tx: mpsc::UnboundedSender<FetchResult>,
    results: mpsc::UnboundedReceiver<FetchResult>,
    cancel: CancellationToken,
}

impl<S, T> std::fmt::Debug for Session<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("markers", &self.reconciler.len())
            .field("tracked", &self.reconciler.tracked())
            .field("mode", &self.scheduler.active_mode())
            .finish_non_exhaustive()
    }
}

impl<S, T> Session<S, T>
where
    S: MapSurface,
    T: FeedTransport + 'static,
{
    #[must_use]
    pub fn new(
        client: Arc<FeedClient<T>>,
        surface: S,
        settings: SessionSettings,
    ) -> (Self, SessionHandle) {
        let (select_tx, selections) = mpsc::unbounded_channel();
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (results_tx, results) = mpsc::unbounded_channel();
        let (scheduler, ticks) =
            PollingScheduler::new(settings.overview_interval, settings.track_interval);
        let cancel = CancellationToken::new();

        let session = Self {
            client,
            surface,
            reconciler: Reconciler::new(settings.reconciler, select_tx),
            scheduler,
            ticks,
            selections,
            commands,
            results_tx,
            results,
            cancel: cancel.clone(),
        };
        let handle = SessionHandle {
            commands: commands_tx,
            cancel,
        };
        (session, handle)
    }

    /// Subscribe to reconciliation and selection events.
    pub fn subscribe(&self) -> broadcast::Receiver<AnnotationEvent> {
        self.reconciler.subscribe()
    }

    /// Run until shut down, then tear down every marker and timer and hand
    /// the surface back.
    pub async fn run(mut self) -> S {
        info!("Session started");
        self.scheduler.start(PollMode::Overview);

        let mut frames = tokio::time::interval(FRAME_INTERVAL);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                Some(command) = self.commands.recv() => self.handle_command(command),
                Some(id) = self.selections.recv() => self.select(id),
                Some(result) = self.results.recv() => self.apply(result),
                Some(tick) = self.ticks.recv() => self.on_tick(tick),
                _ = frames.tick(), if self.reconciler.is_animating() => {
                    self.reconciler.advance_frame(Instant::now(), &mut self.surface);
                }
            }
        }

        self.scheduler.cancel();
        self.reconciler.clear(&mut self.surface);
        info!("Session stopped");
        self.surface
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Select(id) => self.select(id),
            SessionCommand::ExitTrack => {
                if self.reconciler.exit_track(&mut self.surface) {
                    self.scheduler.start(PollMode::Overview);
                }
            }
            SessionCommand::Shutdown => self.cancel.cancel(),
        }
    }

    fn select(&mut self, id: String) {
        if self.reconciler.tracked() == Some(id.as_str()) {
            return;
        }
        if !self.reconciler.enter_track(&id, &mut self.surface) {
            return;
        }

        let lookup = self
            .reconciler
            .marker(&id)
            .and_then(|marker| marker.data.callsign().map(|c| (c.to_string(), marker.rendered)));
        match lookup {
            Some((callsign, position)) => {
                let client = Arc::clone(&self.client);
                let results = self.results_tx.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    let route = client.fetch_route(&callsign, position).await;
                    let _ = results.send(FetchResult::Route { id, route });
                });
            }
            None => debug!("No callsign for {}, skipping route lookup", id),
        }

        self.scheduler.start(PollMode::Track { id });
    }

    fn on_tick(&mut self, tick: PollTick) {
        if !self.scheduler.accepts(&tick) {
            debug!("Dropping tick {} of cancelled generation {}", tick.seq, tick.generation);
            return;
        }

        let client = Arc::clone(&self.client);
        let results = self.results_tx.clone();
        let PollTick {
            generation,
            seq,
            mode,
        } = tick;

        match mode {
            PollMode::Overview => {
                let Some(region) = self.surface.visible_region() else {
                    debug!("Map region not ready, skipping overview poll");
                    return;
                };
                tokio::spawn(async move {
                    let records = client
                        .fetch_overview(region.center, region.radius_nm())
                        .await;
                    let _ = results.send(FetchResult::Overview {
                        generation,
                        seq,
                        records,
                    });
                });
            }
            PollMode::Track { id } => {
                tokio::spawn(async move {
                    let record = client.fetch_by_icao(&id).await;
                    let _ = results.send(FetchResult::Track {
                        generation,
                        seq,
                        id,
                        record,
                    });
                });
            }
        }
    }

    fn apply(&mut self, result: FetchResult) {
        match result {
            FetchResult::Overview {
                generation,
                seq,
                records,
            } => {
                if !self.scheduler.admit_result(generation, seq) {
                    debug!("Discarding stale overview result {}/{}", generation, seq);
                    return;
                }
                self.reconciler
                    .reconcile(records, Instant::now(), &mut self.surface);
            }
            FetchResult::Track {
                generation,
                seq,
                id,
                record,
            } => match record {
                Ok(Some(record)) => {
                    if !self.scheduler.admit_result(generation, seq) {
                        debug!("Discarding stale track result for {}", id);
                        return;
                    }
                    self.reconciler
                        .apply_track_update(&record, Instant::now(), &mut self.surface);
                }
                Ok(None) => debug!("{} is not currently reported", id),
                Err(e) => warn!("Track lookup for {} failed: {}", id, e),
            },
            FetchResult::Route { id, route } => match route {
                Ok(route) => self
                    .reconciler
                    .apply_route(&id, route.as_ref(), &mut self.surface),
                Err(e) => warn!("Route lookup for {} failed: {}", id, e),
            },
        }
    }
}

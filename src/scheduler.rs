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

//! Polling scheduler.
//!
//! Owns at most one active polling handle. Each handle runs a timer task that
//! emits [`PollTick`]s into a channel, the first one immediately. Starting a
//! mode always cancels the previous handle first, and ticks from a cancelled
//! handle that were already queued are rejected by [`PollingScheduler::accepts`].
//!
//! Fetches triggered by ticks may overlap. Each tick carries a sequence number
//! so a late response can be rejected once a newer one has been applied.

use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// What the active handle polls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollMode {
    /// Everything in the visible region.
    Overview,
    /// One aircraft by id.
    Track { id: String },
}

/// One timer firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTick {
    pub generation: u64,
    pub seq: u64,
    pub mode: PollMode,
}

#[derive(Debug)]
struct PollingHandle {
    generation: u64,
    mode: PollMode,
    cancel: CancellationToken,
    guard: SequenceGuard,
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Rejects results older than the newest one already applied.
#[derive(Debug, Default, Clone)]
pub struct SequenceGuard {
    latest: Option<u64>,
}

impl SequenceGuard {
    /// Record `seq` as applied if it is newer than anything seen so far.
    pub fn admit(&mut self, seq: u64) -> bool {
        match self.latest {
            Some(latest) if seq <= latest => false,
            _ => {
                self.latest = Some(seq);
                true
            }
        }
    }
}

#[derive(Debug)]
pub struct PollingScheduler {
    overview_interval: Duration,
    track_interval: Duration,
    ticks: mpsc::UnboundedSender<PollTick>,
    active: Option<PollingHandle>,
    generation: u64,
}

impl PollingScheduler {
    /// Create a scheduler and the receiver its ticks arrive on.
    #[must_use]
    pub fn new(
        overview_interval: Duration,
        track_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<PollTick>) {
        let (ticks, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            overview_interval,
            track_interval,
            ticks,
            active: None,
            generation: 0,
        };
        (scheduler, rx)
    }

    /// Replace the active handle with a new one polling for `mode`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, mode: PollMode) {
        self.cancel();
        self.generation += 1;

        let period = match mode {
            PollMode::Overview => self.overview_interval,
            PollMode::Track { .. } => self.track_interval,
        };
        let cancel = CancellationToken::new();
        info!("Polling {:?} every {:?}", mode, period);

        tokio::spawn(run_timer(
            self.generation,
            mode.clone(),
            period,
            self.ticks.clone(),
            cancel.clone(),
        ));

        self.active = Some(PollingHandle {
            generation: self.generation,
            mode,
            cancel,
            guard: SequenceGuard::default(),
        });
    }

    /// Cancel the active handle. A no-op when nothing is active.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.active.take() {
            debug!("Cancelling poll generation {}", handle.generation);
            handle.cancel.cancel();
        }
    }

    #[must_use]
    pub fn active_mode(&self) -> Option<&PollMode> {
        self.active.as_ref().map(|handle| &handle.mode)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Whether `tick` belongs to the active handle.
    #[must_use]
    pub fn accepts(&self, tick: &PollTick) -> bool {
        self.is_current(tick.generation)
    }

    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|handle| handle.generation == generation && !handle.cancel.is_cancelled())
    }

    /// Whether a result fetched for (`generation`, `seq`) may be applied.
    /// Admitting a result makes every older sequence number stale.
    pub fn admit_result(&mut self, generation: u64, seq: u64) -> bool {
        match self.active.as_mut() {
            Some(handle) if handle.generation == generation => handle.guard.admit(seq),
            _ => false,
        }
    }
}

async fn run_timer(
    generation: u64,
    mode: PollMode,
    period: Duration,
    ticks: mpsc::UnboundedSender<PollTick>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seq = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                seq += 1;
                let tick = PollTick { generation, seq, mode: mode.clone() };
                if ticks.send(tick).is_err() {
                    break;
                }
            }
        }
    }
    debug!("Poll generation {} stopped after {} ticks", generation, seq);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<PollTick>) -> Vec<PollTick> {
        let mut ticks = Vec::new();
        while let Ok(tick) = rx.try_recv() {
            ticks.push(tick);
        }
        ticks
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let (mut scheduler, mut rx) = PollingScheduler::new(Duration::from_secs(3), Duration::from_secs(3));
        scheduler.start(PollMode::Overview);

        let tick = rx.recv().await.unwrap();
        assert_eq!(tick.seq, 1);
        assert_eq!(tick.mode, PollMode::Overview);
        assert!(scheduler.accepts(&tick));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_then_start_leaves_one_handle() {
        let (mut scheduler, mut rx) = PollingScheduler::new(Duration::from_secs(3), Duration::from_secs(3));
        scheduler.start(PollMode::Overview);
        scheduler.cancel();
        scheduler.start(PollMode::Overview);

        tokio::time::sleep(Duration::from_millis(9_500)).await;
        let ticks = drain(&mut rx);

        // 0s, 3s, 6s and 9s from the second handle only.
        assert_eq!(ticks.len(), 4);
        assert!(ticks.iter().all(|tick| tick.generation == 2));
        assert!(ticks.iter().all(|tick| scheduler.accepts(tick)));
        let seqs: Vec<u64> = ticks.iter().map(|tick| tick.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_tick_rejected_after_cancel() {
        let (mut scheduler, mut rx) = PollingScheduler::new(Duration::from_secs(3), Duration::from_secs(3));
        scheduler.start(PollMode::Overview);
        tokio::time::sleep(Duration::from_millis(10)).await;

        scheduler.cancel();
        scheduler.cancel();
        let queued = rx.recv().await.unwrap();
        assert!(!scheduler.accepts(&queued));
        assert!(!scheduler.is_active());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_modes_replaces_handle() {
        let (mut scheduler, mut rx) = PollingScheduler::new(Duration::from_secs(3), Duration::from_secs(5));
        scheduler.start(PollMode::Overview);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let track = PollMode::Track { id: "abc123".to_string() };
        scheduler.start(track.clone());
        assert_eq!(scheduler.active_mode(), Some(&track));

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        let accepted: Vec<PollTick> = drain(&mut rx)
            .into_iter()
            .filter(|tick| scheduler.accepts(tick))
            .collect();

        assert_eq!(accepted.len(), 2);
        assert!(accepted.iter().all(|tick| tick.mode == track));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admit_result_rejects_stale_and_foreign() {
        let (mut scheduler, _rx) = PollingScheduler::new(Duration::from_secs(3), Duration::from_secs(3));
        scheduler.start(PollMode::Overview);

        assert!(scheduler.admit_result(1, 2));
        assert!(!scheduler.admit_result(1, 1));
        assert!(!scheduler.admit_result(1, 2));
        assert!(scheduler.admit_result(1, 3));
        assert!(!scheduler.admit_result(7, 10));

        scheduler.start(PollMode::Overview);
        assert!(!scheduler.admit_result(1, 4));
        assert!(scheduler.admit_result(2, 1));
    }

    #[test]
    fn test_sequence_guard() {
        let mut guard = SequenceGuard::default();
        assert!(guard.admit(5));
        assert!(!guard.admit(4));
        assert!(guard.admit(6));
    }
}

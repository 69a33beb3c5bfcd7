//! Heartbeat tracking and full-state-sync recovery.
//!
//! The device pushes a heartbeat at a steady rate. When one is missed for
//! the timeout window the link is considered lost: the heartbeat variable is
//! zeroed and a full state sync is requested. Sync requests keep repeating
//! on a slow interval until the device confirms with `/ggo/state/updated`,
//! so a dropped request or reply can never leave the bridge half-synced.
//!
//! Like the coalescer, the monitor is a pure state machine over deadlines.
//! The actor owns the clock and performs the returned [`LivenessAction`]s.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Default window after which a missing heartbeat counts as lost.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default interval between repeated full-sync requests.
pub const DEFAULT_SYNC_RETRY: Duration = Duration::from_millis(30_000);

/// Registry key written with [`HEARTBEAT_LOST`] when the heartbeat times out.
pub const HEARTBEAT_VARIABLE: &str = "heartbeat";

/// Shortest window the monitor accepts; zero would re-arm in place.
const MIN_WINDOW: Duration = Duration::from_millis(1);

/// Sentinel value of the heartbeat variable while the link is lost.
pub const HEARTBEAT_LOST: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessPhase {
    /// No heartbeat seen since the session started.
    Idle,
    /// Heartbeats are arriving; the next is due before the deadline.
    AwaitingHeartbeat,
    /// The last heartbeat deadline passed without a heartbeat.
    Lost,
}

/// Why a sync request is being sent (only affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReason {
    Requested,
    Retry,
}

/// Work the actor must perform on behalf of the monitor, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessAction {
    /// Write the lost sentinel into the heartbeat variable.
    MarkHeartbeatLost,
    /// Send `/ggo/cmd/update 1`.
    RequestSync(SyncReason),
}

/// Point-in-time view of the monitor, for status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LivenessSnapshot {
    pub phase: LivenessPhase,
    /// A full sync was requested and has not been confirmed yet.
    pub sync_pending: bool,
}

#[derive(Debug)]
pub struct LivenessMonitor {
    phase: LivenessPhase,
    heartbeat_deadline: Option<Instant>,
    sync_retry_at: Option<Instant>,
    heartbeat_timeout: Duration,
    sync_retry: Duration,
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_TIMEOUT, DEFAULT_SYNC_RETRY)
    }
}

impl LivenessMonitor {
    pub fn new(heartbeat_timeout: Duration, sync_retry: Duration) -> Self {
        Self {
            phase: LivenessPhase::Idle,
            heartbeat_deadline: None,
            sync_retry_at: None,
            heartbeat_timeout: heartbeat_timeout.max(MIN_WINDOW),
            sync_retry: sync_retry.max(MIN_WINDOW),
        }
    }

    /// A heartbeat arrived.
    ///
    /// While a sync is still outstanding the heartbeat proves the link is
    /// back, so one more request goes out immediately.
    pub fn on_heartbeat(&mut self, now: Instant) -> Option<LivenessAction> {
        self.phase = LivenessPhase::AwaitingHeartbeat;
        self.heartbeat_deadline = Some(now + self.heartbeat_timeout);
        self.sync_retry_at
            .is_some()
            .then_some(LivenessAction::RequestSync(SyncReason::Requested))
    }

    /// The device confirmed a complete state push.
    pub fn on_state_updated(&mut self) {
        self.sync_retry_at = None;
    }

    /// A sync request was sent; arm the retry interval unless it already runs.
    pub fn sync_requested(&mut self, now: Instant) {
        if self.sync_retry_at.is_none() {
            self.sync_retry_at = Some(now + self.sync_retry);
        }
    }

    /// Earliest instant at which [`LivenessMonitor::on_deadline`] has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.heartbeat_deadline, self.sync_retry_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fire every deadline that has passed.
    pub fn on_deadline(&mut self, now: Instant) -> Vec<LivenessAction> {
        let mut actions = Vec::new();

        if self.heartbeat_deadline.is_some_and(|d| d <= now) {
            self.heartbeat_deadline = None;
            self.phase = LivenessPhase::Lost;
            actions.push(LivenessAction::MarkHeartbeatLost);
            actions.push(LivenessAction::RequestSync(SyncReason::Requested));
        }

        if self.sync_retry_at.is_some_and(|d| d <= now) {
            self.sync_retry_at = Some(now + self.sync_retry);
            actions.push(LivenessAction::RequestSync(SyncReason::Retry));
        }

        actions
    }

    /// Disarm everything and return to [`LivenessPhase::Idle`].
    pub fn reset(&mut self) {
        self.phase = LivenessPhase::Idle;
        self.heartbeat_deadline = None;
        self.sync_retry_at = None;
    }

    pub fn snapshot(&self) -> LivenessSnapshot {
        LivenessSnapshot {
            phase: self.phase,
            sync_pending: self.sync_retry_at.is_some(),
        }
    }
}

//! Two-tier update coalescing.
//!
//! Inbound state updates are buffered per variable key and released in
//! batches:
//!
//! - **Normal** updates debounce: every collect pushes the flush deadline
//!   out by the debounce window, so a burst flushes once, after silence.
//! - **Flooding** updates (meters, gains) use a fixed window: the first
//!   collect arms the deadline and later collects never move it, so a
//!   continuous stream flushes at a bounded cadence.
//!
//! The coalescer owns no timers. It exposes its nearest deadline and the
//! owning actor sleeps until then and calls [`Coalescer::take_due`].

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use ggo_protocol::Value;
use tokio::time::Instant;

/// Default quiet period before a normal batch flushes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(5);

/// Default fixed window for flooding batches.
pub const DEFAULT_FLOOD_WINDOW: Duration = Duration::from_millis(250);

/// A flushed set of `{key: value}` updates.
pub type Batch = BTreeMap<String, Value>;

/// Which pending queue an update is buffered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Normal,
    Flooding,
}

#[derive(Debug, Default)]
struct PendingQueue {
    entries: HashMap<String, Value>,
    deadline: Option<Instant>,
}

impl PendingQueue {
    fn drain(&mut self) -> Batch {
        self.deadline = None;
        self.entries.drain().collect()
    }

    fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}

/// Buffers updates and decides when each queue flushes.
#[derive(Debug)]
pub struct Coalescer {
    normal: PendingQueue,
    flooding: PendingQueue,
    debounce: Duration,
    flood_window: Duration,
}

impl Default for Coalescer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE, DEFAULT_FLOOD_WINDOW)
    }
}

impl Coalescer {
    pub fn new(debounce: Duration, flood_window: Duration) -> Self {
        Self {
            normal: PendingQueue::default(),
            flooding: PendingQueue::default(),
            debounce,
            flood_window,
        }
    }

    /// Buffer an update, replacing any pending value for the same key.
    ///
    /// A key lives in at most one queue: collecting it into one queue drops
    /// any stale value still pending in the other.
    pub fn collect(&mut self, key: String, value: Value, is_flooding: bool, now: Instant) {
        if is_flooding {
            self.normal.entries.remove(&key);
            self.flooding.entries.insert(key, value);
            if self.flooding.deadline.is_none() {
                self.flooding.deadline = Some(now + self.flood_window);
            }
        } else {
            self.flooding.entries.remove(&key);
            self.normal.entries.insert(key, value);
            self.normal.deadline = Some(now + self.debounce);
        }
    }

    /// The earliest instant at which some queue must flush.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.normal.deadline, self.flooding.deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Flush deadline of one queue.
    pub fn deadline(&self, kind: QueueKind) -> Option<Instant> {
        self.queue(kind).deadline
    }

    /// Number of keys pending in one queue.
    pub fn pending(&self, kind: QueueKind) -> usize {
        self.queue(kind).entries.len()
    }

    /// Drain one queue unconditionally and disarm its deadline.
    pub fn flush(&mut self, kind: QueueKind) -> Batch {
        self.queue_mut(kind).drain()
    }

    /// Drain every queue whose deadline has passed.
    ///
    /// Queues that became empty while armed are disarmed without producing
    /// a batch.
    pub fn take_due(&mut self, now: Instant) -> Vec<(QueueKind, Batch)> {
        let mut due = Vec::new();
        for kind in [QueueKind::Normal, QueueKind::Flooding] {
            if self.queue(kind).is_due(now) {
                let batch = self.flush(kind);
                if !batch.is_empty() {
                    due.push((kind, batch));
                }
            }
        }
        due
    }

    /// Drop everything pending and disarm both deadlines.
    ///
    /// Returns the number of discarded updates.
    pub fn clear(&mut self) -> usize {
        let discarded = self.normal.entries.len() + self.flooding.entries.len();
        self.normal.drain();
        self.flooding.drain();
        discarded
    }

    fn queue(&self, kind: QueueKind) -> &PendingQueue {
        match kind {
            QueueKind::Normal => &self.normal,
            QueueKind::Flooding => &self.flooding,
        }
    }

    fn queue_mut(&mut self, kind: QueueKind) -> &mut PendingQueue {
        match kind {
            QueueKind::Normal => &mut self.normal,
            QueueKind::Flooding => &mut self.flooding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn burst_of_normal_updates_flushes_once_with_latest_value() {
        let mut c = Coalescer::default();
        let t0 = Instant::now();

        c.collect("a".into(), Value::Int(1), false, t0);
        c.collect("a".into(), Value::Int(2), false, t0 + ms(2));

        assert!(c.take_due(t0 + ms(6)).is_empty());

        let flushed = c.take_due(t0 + ms(7));
        assert_eq!(flushed.len(), 1);
        let (kind, batch) = &flushed[0];
        assert_eq!(*kind, QueueKind::Normal);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch["a"], Value::Int(2));

        assert!(c.take_due(t0 + ms(100)).is_empty());
        assert_eq!(c.next_deadline(), None);
    }

    #[test]
    fn normal_deadline_restarts_on_every_collect() {
        let mut c = Coalescer::default();
        let t0 = Instant::now();

        c.collect("a".into(), Value::Int(1), false, t0);
        assert_eq!(c.deadline(QueueKind::Normal), Some(t0 + ms(5)));

        c.collect("b".into(), Value::Int(1), false, t0 + ms(4));
        assert_eq!(c.deadline(QueueKind::Normal), Some(t0 + ms(9)));
    }

    #[test]
    fn flooding_deadline_is_not_restarted() {
        let mut c = Coalescer::default();
        let t0 = Instant::now();

        c.collect("lvl".into(), Value::Float(0.1), true, t0);
        c.collect("lvl".into(), Value::Float(0.2), true, t0 + ms(100));
        c.collect("lvl".into(), Value::Float(0.3), true, t0 + ms(200));

        assert_eq!(c.deadline(QueueKind::Flooding), Some(t0 + ms(250)));
    }

    #[test]
    fn continuous_flood_flushes_on_fixed_cadence() {
        let mut c = Coalescer::default();
        let t0 = Instant::now();
        let mut flushes: Vec<(Duration, Batch)> = Vec::new();
        let mut last_collected = Value::Int(0);

        for step in 0..100u64 {
            let now = t0 + ms(step * 10);
            for (_, batch) in c.take_due(now) {
                assert_eq!(batch["lvl"], last_collected);
                flushes.push((now - t0, batch));
            }
            last_collected = Value::Int(step as i64);
            c.collect("lvl".into(), last_collected.clone(), true, now);
        }
        for (_, batch) in c.take_due(t0 + ms(1000)) {
            flushes.push((ms(1000), batch));
        }

        assert!(flushes.len() <= 1000usize.div_ceil(250) + 1);
        let times: Vec<Duration> = flushes.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![ms(250), ms(500), ms(750), ms(1000)]);
        for (_, batch) in &flushes {
            assert_eq!(batch.len(), 1);
        }
        assert_eq!(flushes.last().unwrap().1["lvl"], Value::Int(99));
    }

    #[test]
    fn queues_flush_independently() {
        let mut c = Coalescer::default();
        let t0 = Instant::now();

        c.collect("mute".into(), Value::Bool(true), false, t0);
        c.collect("lvl".into(), Value::Float(0.5), true, t0);

        let first = c.take_due(t0 + ms(5));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].0, QueueKind::Normal);
        assert_eq!(c.pending(QueueKind::Flooding), 1);
        assert_eq!(c.next_deadline(), Some(t0 + ms(250)));

        let second = c.take_due(t0 + ms(250));
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].0, QueueKind::Flooding);
    }

    #[test]
    fn key_is_never_pending_in_both_queues() {
        let mut c = Coalescer::default();
        let t0 = Instant::now();

        c.collect("x".into(), Value::Int(1), true, t0);
        c.collect("x".into(), Value::Int(2), false, t0 + ms(1));

        assert_eq!(c.pending(QueueKind::Flooding), 0);
        assert_eq!(c.pending(QueueKind::Normal), 1);

        // The emptied flooding queue disarms without producing a batch.
        let flushed = c.take_due(t0 + ms(300));
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].1["x"], Value::Int(2));
        assert_eq!(c.next_deadline(), None);
    }

    #[test]
    fn clear_discards_pending_and_disarms() {
        let mut c = Coalescer::default();
        let t0 = Instant::now();

        c.collect("a".into(), Value::Int(1), false, t0);
        c.collect("lvl".into(), Value::Int(1), true, t0);

        assert_eq!(c.clear(), 2);
        assert_eq!(c.next_deadline(), None);
        assert!(c.take_due(t0 + ms(1000)).is_empty());
    }
}

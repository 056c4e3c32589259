//! In-process publish/subscribe for workflow progress events, keyed by
//! `runId`. Subscription lists are guarded by a short critical section;
//! `emit` copies the subscriber snapshot and sends outside the lock so no
//! lock is ever held across a (potentially blocking) send.

use cirrus_core::{NodeId, RunId};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Status {
        run_id: RunId,
        status: String,
        error: Option<String>,
    },
    Step {
        run_id: RunId,
        stage: StepStage,
        node_id: NodeId,
        node_type: String,
        duration_ms: Option<u64>,
        error: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStage {
    Start,
    Complete,
    Error,
}

impl StreamEvent {
    #[must_use]
    pub fn run_id(&self) -> RunId {
        match self {
            StreamEvent::Status { run_id, .. } | StreamEvent::Step { run_id, .. } => *run_id,
        }
    }

    fn is_status(&self) -> bool {
        matches!(self, StreamEvent::Status { .. })
    }
}

type Subscriber = mpsc::UnboundedSender<StreamEvent>;

#[derive(Default)]
struct Inner {
    subscribers: HashMap<RunId, Vec<Subscriber>>,
    latest_status: HashMap<RunId, StreamEvent>,
}

#[derive(Clone, Default)]
pub struct StreamBus {
    inner: Arc<Mutex<Inner>>,
}

pub struct Unsubscribe {
    bus: StreamBus,
    run_id: RunId,
    // Identifies this subscriber's slot without exposing the sender for comparison.
    index: usize,
}

impl Unsubscribe {
    pub fn unsubscribe(self) {
        let mut inner = self.bus.inner.lock();
        if let Some(subs) = inner.subscribers.get_mut(&self.run_id) {
            if self.index < subs.len() {
                subs.remove(self.index);
            }
        }
    }
}

impl StreamBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subscribe(&self, run_id: RunId) -> (mpsc::UnboundedReceiver<StreamEvent>, Unsubscribe) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let subs = inner.subscribers.entry(run_id).or_default();
        let index = subs.len();
        subs.push(tx);
        (rx, Unsubscribe { bus: self.clone(), run_id, index })
    }

    /// Fan out `event` to every current subscriber of its `runId`, and cache
    /// it if it is a `status` event so late subscribers have a baseline.
    pub fn emit(&self, event: StreamEvent) {
        let run_id = event.run_id();
        let snapshot = {
            let mut inner = self.inner.lock();
            if event.is_status() {
                inner.latest_status.insert(run_id, event.clone());
            }
            inner.subscribers.get(&run_id).cloned().unwrap_or_default()
        };
        for sub in snapshot {
            let _ = sub.send(event.clone());
        }
    }

    #[must_use]
    pub fn latest(&self, run_id: RunId) -> Option<StreamEvent> {
        self.inner.lock().latest_status.get(&run_id).cloned()
    }

    /// Drops all subscribers and cached statuses. Test-only.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.subscribers.clear();
        inner.latest_status.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_fans_out_to_all_subscribers_of_a_run() {
        let bus = StreamBus::new();
        let run_id = RunId::v4();
        let (mut rx1, _u1) = bus.subscribe(run_id);
        let (mut rx2, _u2) = bus.subscribe(run_id);

        bus.emit(StreamEvent::Status { run_id, status: "running".into(), error: None });

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn late_subscriber_reads_cached_latest_status() {
        let bus = StreamBus::new();
        let run_id = RunId::v4();
        bus.emit(StreamEvent::Status { run_id, status: "completed".into(), error: None });

        let latest = bus.latest(run_id).unwrap();
        match latest {
            StreamEvent::Status { status, .. } => assert_eq!(status, "completed"),
            StreamEvent::Step { .. } => panic!("expected status event"),
        }
    }

    #[test]
    fn step_events_are_not_cached() {
        let bus = StreamBus::new();
        let run_id = RunId::v4();
        bus.emit(StreamEvent::Step { run_id, stage: StepStage::Start, node_id: NodeId::new("t1"), node_type: "tool".into(), duration_ms: None, error: None });
        assert!(bus.latest(run_id).is_none());
    }

    #[test]
    fn unrelated_run_ids_do_not_cross_talk() {
        let bus = StreamBus::new();
        let run_a = RunId::v4();
        let run_b = RunId::v4();
        let (mut rx_b, _u) = bus.subscribe(run_b);
        bus.emit(StreamEvent::Status { run_id: run_a, status: "running".into(), error: None });
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn clear_drops_subscribers_and_cache() {
        let bus = StreamBus::new();
        let run_id = RunId::v4();
        let (_rx, _u) = bus.subscribe(run_id);
        bus.emit(StreamEvent::Status { run_id, status: "running".into(), error: None });
        bus.clear();
        assert!(bus.latest(run_id).is_none());
    }
}

//! Telemetry events for job and task execution.
//!
//! Producers publish through the [`TelemetrySink`] trait, which is
//! fire-and-forget: publishing never fails and never blocks. [`EventBus`]
//! is the in-process sink, wrapping a `tokio::sync::broadcast` channel with
//! a bounded ring-buffer of recent events so that late subscribers can
//! catch up.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ids::{JobId, TaskId};
use crate::jobs::{JobState, TaskState};

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Throttled progress sample for a running task.
    TaskProgress {
        job_id: JobId,
        task_id: TaskId,
        percentage: f64,
        frame: u64,
        fps: f64,
        speed: f64,
        eta_secs: Option<f64>,
    },
    TaskStateChanged {
        job_id: JobId,
        task_id: TaskId,
        state: TaskState,
        error: Option<String>,
    },
    JobStateChanged {
        job_id: JobId,
        state: JobState,
        error: Option<String>,
    },
}

impl EventPayload {
    /// The job this event belongs to.
    pub fn job_id(&self) -> JobId {
        match self {
            Self::TaskProgress { job_id, .. }
            | Self::TaskStateChanged { job_id, .. }
            | Self::JobStateChanged { job_id, .. } => *job_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// TelemetrySink
// ---------------------------------------------------------------------------

/// Receiver of execution telemetry.
pub trait TelemetrySink: Send + Sync {
    fn publish(&self, payload: EventPayload);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn publish(&self, _payload: EventPayload) {}
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// `capacity` controls the broadcast channel buffer size, not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`].
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl TelemetrySink for EventBus {
    fn publish(&self, payload: EventPayload) {
        let event = Event::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_event(job_id: JobId, state: JobState) -> EventPayload {
        EventPayload::JobStateChanged {
            job_id,
            state,
            error: None,
        }
    }

    #[test]
    fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let job_id = JobId::new();
        bus.publish(job_event(job_id, JobState::Queued));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.payload.job_id(), job_id);
        match event.payload {
            EventPayload::JobStateChanged { state, .. } => assert_eq!(state, JobState::Queued),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::default();
        bus.publish(job_event(JobId::new(), JobState::Processing));
        assert_eq!(bus.recent_events(10).len(), 1);
    }

    #[test]
    fn recent_events_capped() {
        let bus = EventBus::new(256);
        let job_id = JobId::new();
        for _ in 0..(MAX_RECENT_EVENTS + 25) {
            bus.publish(job_event(job_id, JobState::Processing));
        }
        assert_eq!(bus.recent_events(usize::MAX).len(), MAX_RECENT_EVENTS);
    }

    #[test]
    fn recent_events_newest_first() {
        let bus = EventBus::default();
        let first = JobId::new();
        let second = JobId::new();
        bus.publish(job_event(first, JobState::Queued));
        bus.publish(job_event(second, JobState::Queued));

        let recent = bus.recent_events(2);
        assert_eq!(recent[0].payload.job_id(), second);
        assert_eq!(recent[1].payload.job_id(), first);
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let payload = EventPayload::TaskStateChanged {
            job_id: JobId::new(),
            task_id: TaskId::new(),
            state: TaskState::Failed,
            error: Some("boom".into()),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "task_state_changed");
        assert_eq!(json["state"], "failed");
    }
}

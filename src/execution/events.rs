//! Events emitted during a release run and the sinks that receive them
//!
//! The orchestrator never renders anything itself. It calls
//! [`EventSink::emit`], which must return promptly: a sink that forwards
//! to a display does so through a bounded queue and drops the oldest
//! events when the display falls behind.

use crate::core::state::{RunOutcome, StepStatus};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default capacity of the display queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Events that can occur during a release run
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseEvent {
    RunStarted {
        run_id: Uuid,
        tag: String,
        steps: Vec<String>,
        dry_run: bool,
    },
    StepStarted {
        index: usize,
        name: String,
    },
    /// Sub-step progress, e.g. recipe 2 of 3
    StepProgress {
        index: usize,
        current: usize,
        total: usize,
        label: Option<String>,
    },
    /// A status line from inside a step, including dry-run "would ..." lines
    StepMessage {
        index: usize,
        line: String,
    },
    StepFinished {
        index: usize,
        name: String,
        status: StepStatus,
        detail: Option<String>,
        error: Option<String>,
    },
    RunFinished {
        run_id: Uuid,
        outcome: RunOutcome,
    },
}

/// Receiver of release events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ReleaseEvent);
}

impl<F> EventSink for F
where
    F: Fn(ReleaseEvent) + Send + Sync,
{
    fn emit(&self, event: ReleaseEvent) {
        self(event)
    }
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: ReleaseEvent) {}
}

/// Sink that feeds a bounded queue drained by a separate rendering task
///
/// Sending never waits. When a receiver lags more than `capacity` events
/// behind, its oldest unread events are dropped and it resumes from the
/// oldest one still queued.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: broadcast::Sender<ReleaseEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<ReleaseEvent>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReleaseEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ReleaseEvent) {
        // Only fails when nobody is listening, which is fine
        let _ = self.tx.send(event);
    }
}

/// Handle given to a running step for reporting progress and status lines
#[derive(Clone)]
pub struct StepReporter {
    sink: Arc<dyn EventSink>,
    index: usize,
}

impl StepReporter {
    pub fn new(sink: Arc<dyn EventSink>, index: usize) -> Self {
        Self { sink, index }
    }

    /// A reporter that goes nowhere, for collaborators used outside a run
    pub fn detached() -> Self {
        Self::new(Arc::new(NoopSink), 0)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn progress(&self, current: usize, total: usize, label: Option<&str>) {
        self.sink.emit(ReleaseEvent::StepProgress {
            index: self.index,
            current,
            total,
            label: label.map(str::to_string),
        });
    }

    pub fn message(&self, line: impl Into<String>) {
        self.sink.emit(ReleaseEvent::StepMessage {
            index: self.index,
            line: line.into(),
        });
    }
}

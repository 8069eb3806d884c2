//! Broadcast publisher for run lifecycle events.
//!
//! Every subscriber receives every event published after it subscribed. A slow
//! subscriber that falls more than the channel capacity behind loses the oldest
//! events (`RecvError::Lagged`); the run itself never waits on subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::constants::events;
use crate::orchestration::{BatchReport, ProgressState, RunObserver, RunSummary};

/// Default channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Lifecycle notifications of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    StateChanged { in_progress: bool },
    Progress(ProgressState),
    BatchCompleted(BatchReport),
    RunFinished(RunSummary),
}

impl RunEvent {
    /// Dotted event name, e.g. `run.progress`
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::StateChanged { .. } => events::RUN_STATE_CHANGED,
            RunEvent::Progress(_) => events::RUN_PROGRESS,
            RunEvent::BatchCompleted(_) => events::RUN_BATCH_COMPLETED,
            RunEvent::RunFinished(_) => events::RUN_FINISHED,
        }
    }
}

/// Event that has been published
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedEvent {
    pub name: String,
    pub event: RunEvent,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RunEventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

impl RunEventPublisher {
    /// Create a publisher with the given channel capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Returns how many subscribers it reached; zero
    /// subscribers is not an error.
    pub fn publish(&self, event: RunEvent) -> usize {
        let name = event.name();
        let published = PublishedEvent {
            name: name.to_string(),
            event,
            published_at: Utc::now(),
        };

        match self.sender.send(published) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(_)) => {
                trace!(event = name, "No subscribers for run event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RunEventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl RunObserver for RunEventPublisher {
    fn on_progress(&self, progress: &ProgressState) {
        self.publish(RunEvent::Progress(progress.clone()));
    }

    fn on_state_change(&self, in_progress: bool) {
        self.publish(RunEvent::StateChanged { in_progress });
    }

    fn on_batch_completed(&self, report: &BatchReport) {
        self.publish(RunEvent::BatchCompleted(report.clone()));
    }

    fn on_run_finished(&self, summary: &RunSummary) {
        self.publish(RunEvent::RunFinished(summary.clone()));
    }
}

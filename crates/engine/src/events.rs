//! Broadcast of execution lifecycle events.
//!
//! Emission never blocks and never fails: with no subscribers, or with a
//! lagging one, events are dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use keyshift_core::{AutomationId, ExecutionId, RecordId};
use keyshift_execution::ExecutionStatus;
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RotationEvent {
    ExecutionStarted {
        execution_id: ExecutionId,
        automation_id: AutomationId,
        records: usize,
    },
    RecordSucceeded {
        execution_id: ExecutionId,
        record_id: RecordId,
    },
    RecordFailed {
        execution_id: ExecutionId,
        record_id: RecordId,
        error: String,
    },
    ExecutionCancelled {
        execution_id: ExecutionId,
    },
    ExecutionFinalized {
        execution_id: ExecutionId,
        status: ExecutionStatus,
    },
}

impl RotationEvent {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            Self::ExecutionStarted { execution_id, .. }
            | Self::RecordSucceeded { execution_id, .. }
            | Self::RecordFailed { execution_id, .. }
            | Self::ExecutionCancelled { execution_id }
            | Self::ExecutionFinalized { execution_id, .. } => *execution_id,
        }
    }
}

#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<RotationEvent>,
    emitted: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            emitted: AtomicU64::new(0),
        }
    }

    pub fn emit(&self, event: RotationEvent) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

pub struct EventSubscriber {
    receiver: broadcast::Receiver<RotationEvent>,
}

impl EventSubscriber {
    /// Next event, skipping over any the subscriber lagged behind on.
    /// `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<RotationEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<RotationEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}

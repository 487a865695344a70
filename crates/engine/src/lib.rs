//! # Keyshift Engine
//!
//! Drives change-secret executions end to end.
//!
//! [`RotationOrchestrator::on_trigger`] resolves an automation's targets,
//! opens an execution in the ledger, fans the per-account attempts out over
//! a bounded worker pool, waits for every attempt to settle, finalizes the
//! execution and hands the outcome to the configured notification sinks.
//!
//! The transport that actually talks to a target host sits behind
//! [`ExecutionBackend`]. [`DryRunBackend`] simulates one in memory.
//! [`IntervalScheduler`] fires periodic automations.

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod notify;
pub mod orchestrator;
pub mod retry;
pub mod scheduler;
mod worker;

pub use backend::{BackendError, DryRunBackend, ExecutionBackend, MergePolicy};
pub use config::{OrchestratorConfig, SchedulerConfig};
pub use error::{EngineError, EngineResult};
pub use events::{EventBus, EventSubscriber, RotationEvent};
pub use notify::{
    BroadcastSink, ExecutionOutcome, LogSink, NotificationSink, NotifyError, RecordFailure,
};
pub use orchestrator::{OrchestratorBuilder, RotationOrchestrator, TriggerEvent};
pub use retry::CaptureRetry;
pub use scheduler::IntervalScheduler;

//! # Keyshift Execution
//!
//! The execution ledger: the single writer of rotation state.
//!
//! An [`AutomationExecution`] pins a [`Snapshot`](keyshift_automation::Snapshot)
//! of its automation and owns one [`ChangeSecretRecord`] per target account.
//! Records move `pending → running → succeeded | failed`; secrets on a record
//! are write-once and sealed through a
//! [`SecretStore`](keyshift_secret::SecretStore). Once every record is
//! terminal, [`ExecutionLedger::finalize`] rolls the record statuses up into
//! `succeeded`, `failed` or `partial`.
//!
//! [`MemoryLedger`] is the in-process implementation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod execution;
pub mod journal;
pub mod ledger;
pub mod memory;
pub mod record;
pub mod status;
pub mod transition;

pub use error::{LedgerError, LedgerResult};
pub use execution::AutomationExecution;
pub use journal::JournalEntry;
pub use ledger::{ExecutionLedger, Finalized, RecordSummary, RecordUpdate, RevealedSecrets};
pub use memory::MemoryLedger;
pub use record::ChangeSecretRecord;
pub use status::{ExecutionStatus, RecordStatus, TriggerKind};

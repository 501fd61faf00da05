//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod finding;
mod job;
mod provider;

pub use finding::{AuditFinding, NewAuditFinding, NewAuditFindingInput, Severity};
pub use job::{
    AuditJob, AuditJobRecord, CheckName, JobPriority, JobStatus, NewAuditJobInput,
    WORKER_TIMEOUT_MESSAGE,
};
pub use provider::{AccountTarget, CloudProvider};

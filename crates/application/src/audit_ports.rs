mod checks;
mod control;
mod events;
mod lease;
mod queue;
mod repository;

pub use checks::{
    AuditCheck, CheckContext, CheckDescriptor, CheckFault, CloudResource, FindingDraft,
    ResourceInventory,
};
pub use control::{JobControl, StartOutcome};
pub use events::{JobStatusEvent, JobStatusEventPublisher};
pub use lease::{ReaperLease, ReaperLeaseCoordinator};
pub use queue::{AuditTask, AuditTaskQueue, QueueDepth, TaskDelivery};
pub use repository::{
    AuditFindingRepository, AuditJobRepository, AuditJobStats, FindingCursor, FindingListQuery,
    FindingPage, FindingSeverityCounts, FindingWrite, JobOutcome,
};

//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_ports;
mod audit_service;
mod check_registry;
mod finding_pager;
mod worker_runtime;

#[cfg(test)]
mod test_fakes;

pub use audit_ports::{
    AuditCheck, AuditFindingRepository, AuditJobRepository, AuditJobStats, AuditTask,
    AuditTaskQueue, CheckContext, CheckDescriptor, CheckFault, CloudResource, FindingCursor,
    FindingDraft, FindingListQuery, FindingPage, FindingSeverityCounts, FindingWrite, JobControl,
    JobOutcome, JobStatusEvent, JobStatusEventPublisher, QueueDepth, ReaperLease,
    ReaperLeaseCoordinator, ResourceInventory, StartOutcome, TaskDelivery,
};
pub use audit_service::{
    AuditOverview, AuditService, DEFAULT_FINDINGS_PAGE_SIZE, DEFAULT_LIVENESS_WINDOW,
    MAX_FINDINGS_PAGE_SIZE, SubmitAuditInput, SubmitAuditOutcome, WORKER_REPORTED_FAILURE_MESSAGE,
};
pub use check_registry::{CheckCatalog, CheckRegistry};
pub use finding_pager::FindingPager;
pub use worker_runtime::{
    AuditWorkerRuntime, CHECK_FAULT_RECOMMENDATION, CHECK_FAULT_RESOURCE_TYPE, ProcessOutcome,
    WorkerRuntimeConfig,
};

use std::sync::Arc;
use std::time::Duration;

use auditor_core::JobId;
use auditor_domain::{AuditJob, CloudProvider, JobPriority, JobStatus, NewAuditJobInput, Severity};
use chrono::Utc;

use crate::audit_ports::{AuditCheck, AuditTask, AuditTaskQueue, JobControl};
use crate::test_fakes::{
    CheckBehavior, Harness, ScriptedCheck, UnreachableJobControl, azure_target, check_name, draft,
};
use crate::{CHECK_FAULT_RECOMMENDATION, CHECK_FAULT_RESOURCE_TYPE, SubmitAuditInput};

use super::{AuditWorkerRuntime, ProcessOutcome, WorkerRuntimeConfig};

fn config() -> WorkerRuntimeConfig {
    WorkerRuntimeConfig {
        worker_id: "worker-1".to_owned(),
        visibility_timeout: Duration::from_secs(60),
        poll_wait: Duration::from_millis(10),
        check_timeout: Duration::from_secs(1),
        heartbeat_interval: Duration::from_secs(30),
    }
}

fn runtime_with(
    harness: &Harness,
    config: WorkerRuntimeConfig,
    job_control: Arc<dyn JobControl>,
) -> AuditWorkerRuntime {
    AuditWorkerRuntime::new(
        config,
        harness.queue.clone(),
        job_control,
        harness.findings.clone(),
        harness.registry.clone(),
    )
    .unwrap_or_else(|error| panic!("runtime should build: {error}"))
}

fn runtime(harness: &Harness) -> AuditWorkerRuntime {
    runtime_with(harness, config(), Arc::new(harness.service.clone()))
}

async fn submit(harness: &Harness, checks: &[&str]) -> JobId {
    harness
        .service
        .submit(SubmitAuditInput {
            cloud_provider: "azure".to_owned(),
            subscription_id: Some("sub-1".to_owned()),
            checks: Some(checks.iter().map(|check| (*check).to_owned()).collect()),
            ..SubmitAuditInput::default()
        })
        .await
        .unwrap_or_else(|error| panic!("submit should succeed: {error}"))
        .job
        .job_id()
        .clone()
}

async fn job(harness: &Harness, job_id: &JobId) -> AuditJob {
    harness
        .service
        .get_status(job_id)
        .await
        .unwrap_or_else(|error| panic!("job should exist: {error}"))
}

async fn poll(runtime: &AuditWorkerRuntime) -> ProcessOutcome {
    runtime
        .poll_once()
        .await
        .unwrap_or_else(|error| panic!("poll should succeed: {error}"))
        .unwrap_or_else(|| panic!("a task should be available"))
}

#[tokio::test]
async fn azure_audit_runs_checks_and_completes_job() {
    let harness = Harness::new(vec![
        Arc::new(ScriptedCheck::new(
            "storage-encryption",
            &CloudProvider::ALL,
            CheckBehavior::Findings(vec![draft("storage-1", Severity::High)]),
        )),
        Arc::new(ScriptedCheck::new(
            "open-ports",
            &CloudProvider::ALL,
            CheckBehavior::Findings(vec![draft("nsg-1", Severity::Medium)]),
        )),
    ]);
    let job_id = submit(&harness, &["storage-encryption", "open-ports"]).await;
    assert_eq!(job(&harness, &job_id).await.status(), JobStatus::Pending);

    let outcome = poll(&runtime(&harness)).await;

    assert_eq!(
        outcome,
        ProcessOutcome::Completed {
            findings_written: 2,
            duplicate_findings: 0,
            faulted_checks: 0,
        }
    );

    let finished = job(&harness, &job_id).await;
    assert_eq!(finished.status(), JobStatus::Completed);
    assert!(finished.started_at().is_some());
    assert!(finished.completed_at().is_some());
    assert!(finished.error_message().is_none());

    let findings = harness.findings.all().await;
    let resources: Vec<&str> = findings
        .iter()
        .map(|finding| finding.resource_id.as_str())
        .collect();
    assert_eq!(resources, vec!["storage-1", "nsg-1"]);
    assert!(findings[0].created_at <= findings[1].created_at);
    assert_eq!(findings[0].check_type.as_str(), "storage-encryption");

    assert_eq!(harness.queue.acked().await.len(), 1);
    assert_eq!(harness.queue.ready_len().await, 0);
}

#[tokio::test]
async fn faulting_check_becomes_critical_finding_and_job_completes() {
    let failing = Arc::new(ScriptedCheck::new(
        "open-ports",
        &CloudProvider::ALL,
        CheckBehavior::Fail("permission denied".to_owned()),
    ));
    let last = Arc::new(ScriptedCheck::new(
        "public-access",
        &CloudProvider::ALL,
        CheckBehavior::Findings(vec![draft("bucket-1", Severity::Low)]),
    ));
    let checks: Vec<Arc<dyn AuditCheck>> = vec![
        Arc::new(ScriptedCheck::new(
            "storage-encryption",
            &CloudProvider::ALL,
            CheckBehavior::Findings(vec![draft("storage-1", Severity::High)]),
        )),
        failing.clone(),
        last.clone(),
    ];
    let harness = Harness::new(checks);
    let job_id = submit(
        &harness,
        &["storage-encryption", "open-ports", "public-access"],
    )
    .await;

    let outcome = poll(&runtime(&harness)).await;

    assert_eq!(
        outcome,
        ProcessOutcome::Completed {
            findings_written: 3,
            duplicate_findings: 0,
            faulted_checks: 1,
        }
    );
    assert_eq!(failing.runs(), 1);
    assert_eq!(last.runs(), 1);
    assert_eq!(job(&harness, &job_id).await.status(), JobStatus::Completed);

    let findings = harness.findings.all().await;
    let fault = findings
        .iter()
        .find(|finding| finding.check_type.as_str() == "open-ports")
        .unwrap_or_else(|| panic!("fault finding should be recorded"));
    assert_eq!(fault.severity, Severity::Critical);
    assert_eq!(fault.resource_id, "check:open-ports");
    assert_eq!(fault.resource_type, CHECK_FAULT_RESOURCE_TYPE);
    assert_eq!(
        fault.recommendation.as_deref(),
        Some(CHECK_FAULT_RECOMMENDATION)
    );
    assert_eq!(fault.metadata["fault"], "failed");
    assert_eq!(fault.metadata["worker_id"], "worker-1");
}

#[tokio::test]
async fn invalid_check_output_is_recorded_as_fault() {
    let mut blank = draft("storage-2", Severity::Medium);
    blank.resource_id = "  ".to_owned();
    let malformed = Arc::new(ScriptedCheck::new(
        "storage-encryption",
        &CloudProvider::ALL,
        CheckBehavior::Findings(vec![draft("storage-1", Severity::High), blank]),
    ));
    let checks: Vec<Arc<dyn AuditCheck>> = vec![
        malformed.clone(),
        Arc::new(ScriptedCheck::new(
            "open-ports",
            &CloudProvider::ALL,
            CheckBehavior::Findings(vec![draft("nsg-1", Severity::Low)]),
        )),
    ];
    let harness = Harness::new(checks);
    let job_id = submit(&harness, &["storage-encryption", "open-ports"]).await;

    let outcome = poll(&runtime(&harness)).await;

    assert_eq!(
        outcome,
        ProcessOutcome::Completed {
            findings_written: 2,
            duplicate_findings: 0,
            faulted_checks: 1,
        }
    );
    assert_eq!(job(&harness, &job_id).await.status(), JobStatus::Completed);

    let findings = harness.findings.all().await;
    let fault = findings
        .iter()
        .find(|finding| finding.check_type.as_str() == "storage-encryption")
        .unwrap_or_else(|| panic!("fault finding should be recorded"));
    assert_eq!(fault.resource_id, "check:storage-encryption");
    assert_eq!(fault.severity, Severity::Critical);
    assert_eq!(fault.metadata["fault"], "failed");
    assert!(
        findings
            .iter()
            .any(|finding| finding.check_type.as_str() == "open-ports")
    );
}

#[tokio::test]
async fn hanging_check_is_bounded_by_timeout() {
    let harness = Harness::new(vec![Arc::new(ScriptedCheck::new(
        "inventory-connectivity",
        &CloudProvider::ALL,
        CheckBehavior::Hang(Duration::from_secs(30)),
    ))]);
    let job_id = submit(&harness, &["inventory-connectivity"]).await;
    let runtime = runtime_with(
        &harness,
        WorkerRuntimeConfig {
            check_timeout: Duration::from_millis(50),
            ..config()
        },
        Arc::new(harness.service.clone()),
    );

    let outcome = poll(&runtime).await;

    assert!(matches!(
        outcome,
        ProcessOutcome::Completed {
            faulted_checks: 1,
            ..
        }
    ));
    let findings = harness.findings.all().await;
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].metadata["fault"], "timed_out");
    assert_eq!(job(&harness, &job_id).await.status(), JobStatus::Completed);
}

#[tokio::test]
async fn duplicate_delivery_is_skipped_without_new_findings() {
    let check = Arc::new(ScriptedCheck::new(
        "storage-encryption",
        &CloudProvider::ALL,
        CheckBehavior::Findings(vec![draft("storage-1", Severity::High)]),
    ));
    let harness = Harness::new(vec![check.clone()]);
    let job_id = submit(&harness, &["storage-encryption"]).await;
    let runtime = runtime(&harness);

    let delivery = harness
        .queue
        .dequeue("worker-1", Duration::from_secs(60), Duration::from_millis(10))
        .await
        .unwrap_or_else(|error| panic!("{error}"))
        .unwrap_or_else(|| panic!("task should be ready"));
    let mut redelivery = delivery.clone();
    redelivery.receipt = format!("{}-again", delivery.receipt);
    redelivery.delivery_count = 2;

    let first = runtime
        .process_delivery(delivery)
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert!(matches!(first, ProcessOutcome::Completed { .. }));

    let second = runtime
        .process_delivery(redelivery)
        .await
        .unwrap_or_else(|error| panic!("{error}"));
    assert_eq!(
        second,
        ProcessOutcome::SkippedDuplicate {
            status: JobStatus::Completed
        }
    );

    assert_eq!(check.runs(), 1);
    assert_eq!(harness.findings.all().await.len(), 1);
    assert_eq!(job(&harness, &job_id).await.status(), JobStatus::Completed);
}

#[tokio::test]
async fn racing_workers_start_job_once() {
    let check = Arc::new(ScriptedCheck::new(
        "storage-encryption",
        &CloudProvider::ALL,
        CheckBehavior::Findings(vec![draft("storage-1", Severity::High)]),
    ));
    let harness = Harness::new(vec![check.clone()]);
    let job_id = submit(&harness, &["storage-encryption"]).await;

    let delivery = harness
        .queue
        .dequeue("worker-1", Duration::from_secs(60), Duration::from_millis(10))
        .await
        .unwrap_or_else(|error| panic!("{error}"))
        .unwrap_or_else(|| panic!("task should be ready"));
    let mut stolen = delivery.clone();
    stolen.receipt = format!("{}-expired", delivery.receipt);

    let first = runtime(&harness);
    let second = runtime_with(
        &harness,
        WorkerRuntimeConfig {
            worker_id: "worker-2".to_owned(),
            ..config()
        },
        Arc::new(harness.service.clone()),
    );

    let (left, right) = tokio::join!(
        first.process_delivery(delivery),
        second.process_delivery(stolen)
    );
    let outcomes = [
        left.unwrap_or_else(|error| panic!("{error}")),
        right.unwrap_or_else(|error| panic!("{error}")),
    ];

    let completed = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, ProcessOutcome::Completed { .. }))
        .count();
    let skipped = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, ProcessOutcome::SkippedDuplicate { .. }))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(skipped, 1);
    assert_eq!(check.runs(), 1);
    assert_eq!(job(&harness, &job_id).await.status(), JobStatus::Completed);
}

#[tokio::test]
async fn store_failure_completes_job_as_failed() {
    let harness = Harness::new(vec![Arc::new(ScriptedCheck::new(
        "storage-encryption",
        &CloudProvider::ALL,
        CheckBehavior::Findings(vec![draft("storage-1", Severity::High)]),
    ))]);
    let job_id = submit(&harness, &["storage-encryption"]).await;
    harness.findings.fail_writes();

    let outcome = poll(&runtime(&harness)).await;

    let ProcessOutcome::Failed { error_message } = outcome else {
        panic!("expected failed outcome, got {outcome:?}");
    };
    assert!(error_message.starts_with("failed to store findings"));

    let failed = job(&harness, &job_id).await;
    assert_eq!(failed.status(), JobStatus::Failed);
    assert_eq!(failed.error_message(), Some(error_message.as_str()));
    assert_eq!(harness.queue.acked().await.len(), 1);
}

#[tokio::test]
async fn unreachable_orchestrator_returns_task_to_queue() {
    let harness = Harness::new(vec![Arc::new(ScriptedCheck::new(
        "storage-encryption",
        &CloudProvider::ALL,
        CheckBehavior::Findings(Vec::new()),
    ))]);
    let job_id = submit(&harness, &["storage-encryption"]).await;
    let runtime = runtime_with(&harness, config(), Arc::new(UnreachableJobControl));

    let outcome = poll(&runtime).await;

    assert!(matches!(outcome, ProcessOutcome::Abandoned { .. }));
    assert_eq!(harness.queue.nacked().await.len(), 1);
    assert_eq!(harness.queue.ready_len().await, 1);
    assert_eq!(job(&harness, &job_id).await.status(), JobStatus::Pending);
}

#[tokio::test]
async fn task_for_unknown_job_is_dropped() {
    let harness = Harness::new(vec![Arc::new(ScriptedCheck::new(
        "storage-encryption",
        &CloudProvider::ALL,
        CheckBehavior::Findings(Vec::new()),
    ))]);
    let orphan = AuditJob::new_pending(
        NewAuditJobInput {
            job_id: JobId::new("rolled-back").unwrap_or_else(|error| panic!("{error}")),
            target: azure_target(),
            checks: vec![check_name("storage-encryption")],
            priority: JobPriority::Low,
            credentials_ref: None,
        },
        Utc::now(),
    )
    .unwrap_or_else(|error| panic!("{error}"));
    let enqueued = harness.queue.enqueue(AuditTask::for_job(&orphan)).await;
    assert!(enqueued.is_ok());

    let outcome = poll(&runtime(&harness)).await;

    assert_eq!(outcome, ProcessOutcome::Dropped);
    assert_eq!(harness.queue.acked().await.len(), 1);
    assert!(harness.findings.all().await.is_empty());
}

#[tokio::test]
async fn heartbeats_refresh_liveness_and_visibility_while_checks_run() {
    let harness = Harness::new(vec![Arc::new(ScriptedCheck::new(
        "inventory-connectivity",
        &CloudProvider::ALL,
        CheckBehavior::Hang(Duration::from_millis(150)),
    ))]);
    let job_id = submit(&harness, &["inventory-connectivity"]).await;
    let runtime = runtime_with(
        &harness,
        WorkerRuntimeConfig {
            heartbeat_interval: Duration::from_millis(20),
            ..config()
        },
        Arc::new(harness.service.clone()),
    );

    let outcome = poll(&runtime).await;

    assert!(matches!(
        outcome,
        ProcessOutcome::Completed {
            faulted_checks: 0,
            ..
        }
    ));
    assert!(harness.queue.extensions() >= 1);

    let finished = job(&harness, &job_id).await;
    let started_at = finished
        .started_at()
        .unwrap_or_else(|| panic!("started_at should be set"));
    let heartbeat_at = finished
        .last_heartbeat_at()
        .unwrap_or_else(|| panic!("last_heartbeat_at should be set"));
    assert!(heartbeat_at > started_at);
}

#[tokio::test]
async fn poll_returns_none_on_empty_queue() {
    let harness = Harness::new(Vec::new());
    let result = runtime(&harness).poll_once().await;

    assert!(matches!(result, Ok(None)));
}

#[test]
fn config_rejects_zero_and_inverted_timings() {
    assert!(WorkerRuntimeConfig::new("worker-1").validate().is_ok());
    assert!(WorkerRuntimeConfig::new("  ").validate().is_err());
    assert!(
        WorkerRuntimeConfig {
            check_timeout: Duration::ZERO,
            ..config()
        }
        .validate()
        .is_err()
    );
    assert!(
        WorkerRuntimeConfig {
            heartbeat_interval: Duration::from_secs(60),
            visibility_timeout: Duration::from_secs(60),
            ..config()
        }
        .validate()
        .is_err()
    );
}

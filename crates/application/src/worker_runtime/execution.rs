use super::*;

impl AuditWorkerRuntime {
    /// Runs every check while a single ticker keeps the job and the delivery alive.
    pub(super) async fn execute_with_heartbeats(&self, delivery: &TaskDelivery) -> ExecutionReport {
        let execution = self.execute_checks(&delivery.task);
        tokio::pin!(execution);

        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                report = &mut execution => return report,
                _ = ticker.tick() => self.send_heartbeat(delivery).await,
            }
        }
    }

    async fn send_heartbeat(&self, delivery: &TaskDelivery) {
        let job_id = &delivery.task.job_id;
        let worker_id = self.config.worker_id.as_str();

        if let Err(error) = self.job_control.heartbeat(job_id).await {
            warn!(job_id = %job_id, worker_id, error = %error, "audit job heartbeat failed");
        }

        match self
            .task_queue
            .extend_visibility(delivery, self.config.visibility_timeout)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(job_id = %job_id, worker_id, "audit task receipt is stale, delivery may be repeated");
            }
            Err(error) => {
                warn!(job_id = %job_id, worker_id, error = %error, "failed to extend audit task visibility");
            }
        }
    }

    async fn execute_checks(&self, task: &AuditTask) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        let context = CheckContext {
            job_id: task.job_id.clone(),
            target: task.target.clone(),
            credentials_ref: task.credentials_ref.clone(),
        };

        for check_name in &task.checks {
            let checked = self
                .run_check(check_name, &context)
                .await
                .and_then(|drafts| build_findings(task, check_name, drafts));

            let findings = match checked {
                Ok(findings) => findings,
                Err(fault) => {
                    warn!(
                        job_id = %task.job_id,
                        check = check_name.as_str(),
                        fault = fault.kind(),
                        error = %fault,
                        "audit check faulted"
                    );
                    report.faulted_checks += 1;
                    match build_finding(task, check_name, self.fault_finding(check_name, &fault)) {
                        Ok(finding) => vec![finding],
                        Err(error) => {
                            report.store_error =
                                Some(format!("failed to record fault of check '{check_name}': {error}"));
                            return report;
                        }
                    }
                }
            };

            debug!(job_id = %task.job_id, check = check_name.as_str(), findings = findings.len(), "audit check finished");

            for finding in findings {
                match self.finding_repository.append_finding(finding).await {
                    Ok(FindingWrite::Inserted(_)) => report.findings_written += 1,
                    Ok(FindingWrite::Duplicate) => report.duplicate_findings += 1,
                    Err(error) => {
                        report.store_error = Some(format!("failed to store findings: {error}"));
                        return report;
                    }
                }
            }
        }

        report
    }

    async fn run_check(
        &self,
        check_name: &CheckName,
        context: &CheckContext,
    ) -> Result<Vec<FindingDraft>, CheckFault> {
        let check = self.checks.get(check_name).ok_or_else(|| {
            CheckFault::Failed(format!("check '{check_name}' is not registered on this worker"))
        })?;

        match tokio::time::timeout(self.config.check_timeout, check.run(context)).await {
            Ok(result) => result,
            Err(_) => Err(CheckFault::TimedOut(self.config.check_timeout)),
        }
    }

    fn fault_finding(&self, check_name: &CheckName, fault: &CheckFault) -> FindingDraft {
        FindingDraft {
            resource_id: format!("check:{check_name}"),
            resource_type: CHECK_FAULT_RESOURCE_TYPE.to_owned(),
            severity: Severity::Critical,
            description: format!("Audit check '{check_name}' could not complete: {fault}"),
            recommendation: Some(CHECK_FAULT_RECOMMENDATION.to_owned()),
            metadata: Some(json!({
                "fault": fault.kind(),
                "error": fault.to_string(),
                "worker_id": self.config.worker_id,
            })),
        }
    }
}

/// Validates every draft of one check; a single invalid draft faults the whole check.
fn build_findings(
    task: &AuditTask,
    check_name: &CheckName,
    drafts: Vec<FindingDraft>,
) -> Result<Vec<NewAuditFinding>, CheckFault> {
    drafts
        .into_iter()
        .map(|draft| build_finding(task, check_name, draft))
        .collect::<AppResult<Vec<_>>>()
        .map_err(|error| CheckFault::Failed(format!("check returned an invalid finding: {error}")))
}

fn build_finding(
    task: &AuditTask,
    check_name: &CheckName,
    draft: FindingDraft,
) -> AppResult<NewAuditFinding> {
    NewAuditFinding::new(NewAuditFindingInput {
        job_id: task.job_id.clone(),
        resource_id: draft.resource_id,
        resource_type: draft.resource_type,
        check_type: check_name.clone(),
        severity: draft.severity,
        description: draft.description,
        recommendation: draft.recommendation,
        metadata: draft.metadata,
    })
}

use super::*;

impl PostgresAuditRepository {
    pub(super) async fn append_finding_impl(
        &self,
        finding: NewAuditFinding,
    ) -> AppResult<FindingWrite> {
        let row = sqlx::query_as::<_, AuditFindingRow>(
            r#"
            INSERT INTO audit_findings (
                job_id,
                resource_id,
                resource_type,
                check_type,
                severity,
                description,
                recommendation,
                metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (job_id, resource_id, check_type)
            DO NOTHING
            RETURNING
                id,
                job_id,
                resource_id,
                resource_type,
                check_type,
                severity,
                description,
                recommendation,
                metadata,
                created_at
            "#,
        )
        .bind(finding.job_id().as_str())
        .bind(finding.resource_id())
        .bind(finding.resource_type())
        .bind(finding.check_type().as_str())
        .bind(finding.severity().as_str())
        .bind(finding.description())
        .bind(finding.recommendation())
        .bind(finding.metadata())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to append finding for audit job '{}': {error}",
                finding.job_id()
            ))
        })?;

        match row {
            Some(row) => Ok(FindingWrite::Inserted(audit_finding_from_row(row)?)),
            None => Ok(FindingWrite::Duplicate),
        }
    }

    pub(super) async fn list_findings_impl(
        &self,
        query: &FindingListQuery,
    ) -> AppResult<Vec<AuditFinding>> {
        let limit = i64::try_from(query.limit)
            .map_err(|error| AppError::Validation(format!("invalid findings limit: {error}")))?;
        let (after_created_at, after_id) = match query.after {
            Some(cursor) => (Some(cursor.created_at), Some(cursor.id)),
            None => (None, None),
        };

        let rows = sqlx::query_as::<_, AuditFindingRow>(
            r#"
            SELECT
                id,
                job_id,
                resource_id,
                resource_type,
                check_type,
                severity,
                description,
                recommendation,
                metadata,
                created_at
            FROM audit_findings
            WHERE job_id = $1
              AND ($2::TEXT IS NULL OR severity = $2)
              AND (
                    $3::TIMESTAMPTZ IS NULL
                    OR (created_at, id) > ($3::TIMESTAMPTZ, $4::BIGINT)
                  )
            ORDER BY created_at ASC, id ASC
            LIMIT $5
            "#,
        )
        .bind(query.job_id.as_str())
        .bind(query.severity.map(|severity| severity.as_str()))
        .bind(after_created_at)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list findings for audit job '{}': {error}",
                query.job_id
            ))
        })?;

        rows.into_iter().map(audit_finding_from_row).collect()
    }

    pub(super) async fn count_findings_impl(&self, job_id: &JobId) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)::BIGINT
            FROM audit_findings
            WHERE job_id = $1
            "#,
        )
        .bind(job_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to count findings for audit job '{job_id}': {error}"
            ))
        })
    }

    pub(super) async fn severity_counts_impl(&self) -> AppResult<FindingSeverityCounts> {
        let rows = sqlx::query_as::<_, StatusCountRow>(
            r#"
            SELECT severity AS status, COUNT(*)::BIGINT AS count
            FROM audit_findings
            GROUP BY severity
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to count findings by severity: {error}"))
        })?;

        let mut counts = FindingSeverityCounts::default();
        for row in rows {
            counts.add(Severity::parse(row.status.as_str())?, row.count);
        }

        Ok(counts)
    }
}

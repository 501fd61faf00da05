use auditor_core::{AppError, AppResult, JobId};
use auditor_domain::{AuditFinding, Severity};

use crate::audit_ports::{FindingCursor, FindingListQuery};
use crate::audit_service::{AuditService, DEFAULT_FINDINGS_PAGE_SIZE, MAX_FINDINGS_PAGE_SIZE};

/// Lazy, restartable iteration over the findings of one job.
///
/// Each call to [`FindingPager::next_page`] fetches one page; the current
/// [`FindingPager::cursor`] can be stored and handed to a new pager to resume.
#[derive(Clone)]
pub struct FindingPager {
    service: AuditService,
    job_id: JobId,
    severity: Option<Severity>,
    page_size: usize,
    cursor: Option<FindingCursor>,
    exhausted: bool,
}

impl FindingPager {
    /// Creates a pager positioned before the first finding.
    #[must_use]
    pub fn new(service: AuditService, job_id: JobId) -> Self {
        Self {
            service,
            job_id,
            severity: None,
            page_size: DEFAULT_FINDINGS_PAGE_SIZE,
            cursor: None,
            exhausted: false,
        }
    }

    /// Restricts iteration to one severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Sets the number of findings fetched per page.
    pub fn with_page_size(mut self, page_size: usize) -> AppResult<Self> {
        if page_size == 0 || page_size > MAX_FINDINGS_PAGE_SIZE {
            return Err(AppError::Validation(format!(
                "page size must be between 1 and {MAX_FINDINGS_PAGE_SIZE}"
            )));
        }

        self.page_size = page_size;
        Ok(self)
    }

    /// Resumes after a previously returned cursor.
    #[must_use]
    pub fn starting_after(mut self, cursor: FindingCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Returns the position after the last finding handed out.
    #[must_use]
    pub fn cursor(&self) -> Option<FindingCursor> {
        self.cursor
    }

    /// Returns whether the last page has been read.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fetches the next page, `None` once every finding has been returned.
    pub async fn next_page(&mut self) -> AppResult<Option<Vec<AuditFinding>>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self
            .service
            .list_findings(FindingListQuery {
                job_id: self.job_id.clone(),
                severity: self.severity,
                after: self.cursor,
                limit: self.page_size,
            })
            .await?;

        if let Some(last) = page.findings.last() {
            self.cursor = Some(FindingCursor::after(last));
        }

        if page.next_cursor.is_none() {
            self.exhausted = true;
        }

        if page.findings.is_empty() {
            return Ok(None);
        }

        Ok(Some(page.findings))
    }

    /// Drains the remaining pages into one vector.
    pub async fn collect_remaining(&mut self) -> AppResult<Vec<AuditFinding>> {
        let mut findings = Vec::new();
        while let Some(page) = self.next_page().await? {
            findings.extend(page);
        }
        Ok(findings)
    }
}

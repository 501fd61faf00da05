use std::time::Duration;

use async_trait::async_trait;
use auditor_application::{JobControl, StartOutcome};
use auditor_core::{AppError, AppResult, JobId};
use auditor_domain::JobStatus;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Header carrying the calling worker identity.
pub const WORKER_ID_HEADER: &str = "x-auditor-worker-id";

#[derive(Debug, Deserialize)]
struct WorkerJobStatusResponse {
    status: JobStatus,
}

#[derive(Debug, Serialize)]
struct WorkerCompleteRequest<'a> {
    success: bool,
    error_message: Option<&'a str>,
}

/// Job control client that reports worker transitions to the orchestrator's internal API.
pub struct HttpJobControl {
    http_client: reqwest::Client,
    api_base_url: String,
    shared_secret: String,
    worker_id: String,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl HttpJobControl {
    /// Creates a client for one worker identity.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        api_base_url: impl Into<String>,
        shared_secret: impl Into<String>,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
            shared_secret: shared_secret.into(),
            worker_id: worker_id.into(),
            max_attempts: 3,
            retry_backoff_ms: 200,
        }
    }

    /// Overrides the retry policy applied to transport errors and 5xx/429 responses.
    #[must_use]
    pub fn with_retry(mut self, max_attempts: u8, retry_backoff_ms: u64) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_backoff_ms = retry_backoff_ms.max(50);
        self
    }

    fn job_url(&self, job_id: &JobId, action: Option<&str>) -> String {
        match action {
            Some(action) => format!(
                "{}/api/internal/worker/jobs/{job_id}/{action}",
                self.api_base_url
            ),
            None => format!("{}/api/internal/worker/jobs/{job_id}", self.api_base_url),
        }
    }

    async fn send_with_retry<F>(
        &self,
        operation: &str,
        worker_id: &str,
        mut build: F,
    ) -> AppResult<reqwest::Response>
    where
        F: FnMut(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_u8;
        let mut last_error: Option<String> = None;

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = build(&self.http_client)
                .bearer_auth(self.shared_secret.as_str())
                .header(WORKER_ID_HEADER, worker_id)
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response)
                    if response.status().is_server_error()
                        || response.status() == StatusCode::TOO_MANY_REQUESTS =>
                {
                    last_error = Some(format!(
                        "{operation} returned transient HTTP status {}",
                        response.status()
                    ));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
                    return Err(error_for_status(status, operation, body.as_str()));
                }
                Err(error) => {
                    last_error = Some(format!("{operation} transport error: {error}"));
                }
            }

            if attempt < self.max_attempts {
                let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AppError::Internal(last_error.unwrap_or_else(|| {
            format!("{operation} exhausted retries")
        })))
    }
}

fn error_for_status(status: StatusCode, operation: &str, body: &str) -> AppError {
    let message = format!("{operation} failed with status {status}: {body}");
    match status {
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::CONFLICT => AppError::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            AppError::Validation(message)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(message),
        _ => AppError::Internal(message),
    }
}

#[async_trait]
impl JobControl for HttpJobControl {
    async fn job_status(&self, job_id: &JobId) -> AppResult<JobStatus> {
        let url = self.job_url(job_id, None);
        let response = self
            .send_with_retry("job status lookup", self.worker_id.as_str(), |client| {
                client.get(url.as_str())
            })
            .await?;

        let payload = response
            .json::<WorkerJobStatusResponse>()
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode status response for audit job '{job_id}': {error}"
                ))
            })?;

        Ok(payload.status)
    }

    async fn start_job(&self, job_id: &JobId, worker_id: &str) -> AppResult<StartOutcome> {
        let url = self.job_url(job_id, Some("start"));
        let response = self
            .send_with_retry("job start", worker_id, |client| client.post(url.as_str()))
            .await?;

        response.json::<StartOutcome>().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to decode start response for audit job '{job_id}': {error}"
            ))
        })
    }

    async fn heartbeat(&self, job_id: &JobId) -> AppResult<()> {
        let url = self.job_url(job_id, Some("heartbeat"));
        self.send_with_retry("job heartbeat", self.worker_id.as_str(), |client| {
            client.post(url.as_str())
        })
        .await?;

        Ok(())
    }

    async fn complete_job(
        &self,
        job_id: &JobId,
        success: bool,
        error_message: Option<String>,
    ) -> AppResult<()> {
        let url = self.job_url(job_id, Some("complete"));
        let body = WorkerCompleteRequest {
            success,
            error_message: error_message.as_deref(),
        };

        self.send_with_retry("job completion", self.worker_id.as_str(), |client| {
            client.post(url.as_str()).json(&body)
        })
        .await?;

        Ok(())
    }
}

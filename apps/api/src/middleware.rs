use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use auditor_core::AppError;
use auditor_infrastructure::WORKER_ID_HEADER;
use subtle::ConstantTimeEq;

use crate::error::ApiResult;
use crate::state::AppState;

const MAX_WORKER_ID_LENGTH: usize = 128;

/// Authenticated worker calling the internal API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerIdentity {
    worker_id: String,
}

impl WorkerIdentity {
    /// Returns the identity declared by the worker.
    #[must_use]
    pub fn worker_id(&self) -> &str {
        self.worker_id.as_str()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(worker_id: &str) -> Self {
        Self {
            worker_id: worker_id.to_owned(),
        }
    }
}

pub async fn require_worker_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let identity = authorize_worker(request.headers(), state.worker_shared_secret.as_str())?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn authorize_worker(headers: &HeaderMap, shared_secret: &str) -> Result<WorkerIdentity, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("worker bearer token is required".to_owned()))?;

    if !secret_matches(token.trim(), shared_secret) {
        return Err(AppError::Unauthorized("invalid worker token".to_owned()));
    }

    let worker_id = headers
        .get(WORKER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("{WORKER_ID_HEADER} header is required")))?;

    if worker_id.len() > MAX_WORKER_ID_LENGTH {
        return Err(AppError::Validation(format!(
            "{WORKER_ID_HEADER} must be at most {MAX_WORKER_ID_LENGTH} characters"
        )));
    }

    Ok(WorkerIdentity {
        worker_id: worker_id.to_owned(),
    })
}

fn secret_matches(provided: &str, expected: &str) -> bool {
    if provided.len() != expected.len() {
        return false;
    }

    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

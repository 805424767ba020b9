//! Report jobs and ingress payload decoding.
//!
//! The ingress body is `{"data": {...}, "uuid": "..."}`. [`decode_report_request`]
//! turns raw bytes into a validated [`Job`] or a [`CoreError`] that the HTTP
//! layer maps to `400 Bad Request`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::CoreError;
use crate::types::Timestamp;

/// Maximum length of a correlation id.
pub const MAX_CORRELATION_ID_LEN: usize = 128;

/// Caller-supplied identifier keying the rendered artifact and its
/// completion signal.
///
/// Not generated or deduplicated here. Because the id becomes a file name it
/// is restricted to `[A-Za-z0-9._-]`, 1..=128 characters, and may not be `.`
/// or `..`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(CoreError::Validation("uuid must not be empty".into()));
        }
        if raw.len() > MAX_CORRELATION_ID_LEN {
            return Err(CoreError::Validation(format!(
                "uuid must be at most {MAX_CORRELATION_ID_LEN} characters, got {}",
                raw.len()
            )));
        }
        if raw == "." || raw == ".." {
            return Err(CoreError::Validation(format!("uuid '{raw}' is reserved")));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(CoreError::Validation(format!(
                "uuid contains invalid character {bad:?}"
            )));
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One queued rendering request.
#[derive(Debug, Clone)]
pub struct Job {
    pub correlation_id: CorrelationId,
    pub payload: Dataset,
    pub submitted_at: Timestamp,
}

impl Job {
    pub fn new(correlation_id: CorrelationId, payload: Dataset) -> Self {
        Self {
            correlation_id,
            payload,
            submitted_at: chrono::Utc::now(),
        }
    }
}

/// Wire shape of `POST /api/report/generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateReportRequest {
    pub data: Dataset,
    pub uuid: String,
}

impl TryFrom<GenerateReportRequest> for Job {
    type Error = CoreError;

    fn try_from(req: GenerateReportRequest) -> Result<Self, Self::Error> {
        let id = CorrelationId::parse(req.uuid)?;
        Ok(Job::new(id, req.data))
    }
}

/// Decode and validate an ingress body.
pub fn decode_report_request(body: &[u8]) -> Result<Job, CoreError> {
    let req: GenerateReportRequest = serde_json::from_slice(body)?;
    Job::try_from(req)
}

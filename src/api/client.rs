use super::error::FetchError;
use crate::config::Config;
use crate::types::JobStatus;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const NEXT_OFFSET_HEADER: &str = "X-JSON";
const START_LINE_PARAM: &str = "startLineNumber";

/// Log text fetched from a resume offset, plus the offset to resume from next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    pub text: String,
    pub next_offset: u64,
}

#[async_trait]
pub trait LogSource: Send + Sync {
    async fn fetch_log(&self, start_line: u64) -> Result<LogChunk, FetchError>;
}

/// Reports whether the job producing the log has finished.
#[async_trait]
pub trait CompletionProbe: Send + Sync {
    async fn is_completed(&self) -> Result<bool, FetchError>;
}

#[derive(Clone)]
pub struct ConsoleClient {
    http: reqwest::Client,
    console_url: String,
    job_status_url: Option<String>,
}

impl ConsoleClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            http,
            console_url: config.console_url.clone(),
            job_status_url: config.job_status_url.clone(),
        })
    }

    pub fn console_url(&self) -> &str {
        &self.console_url
    }

    /// Asks the job status endpoint whether the job has finished. Without a
    /// configured endpoint the job is treated as still running.
    pub async fn fetch_job_completed(&self) -> Result<bool, FetchError> {
        let Some(url) = &self.job_status_url else {
            return Ok(false);
        };

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| FetchError::from_request(error, url))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Body {
            url: url.clone(),
            source,
        })?;
        JobStatus::completed_from_json(&body).map_err(|error| FetchError::Decode {
            url: url.clone(),
            message: format!("{error:#}"),
        })
    }
}

#[async_trait]
impl CompletionProbe for ConsoleClient {
    async fn is_completed(&self) -> Result<bool, FetchError> {
        self.fetch_job_completed().await
    }
}

#[async_trait]
impl LogSource for ConsoleClient {
    async fn fetch_log(&self, start_line: u64) -> Result<LogChunk, FetchError> {
        let url = &self.console_url;
        let response = self
            .http
            .get(url)
            .query(&[(START_LINE_PARAM, start_line)])
            .send()
            .await
            .map_err(|error| FetchError::from_request(error, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let next_offset = parse_next_offset(
            response
                .headers()
                .get(NEXT_OFFSET_HEADER)
                .and_then(|value| value.to_str().ok()),
        );
        let text = response.text().await.map_err(|source| FetchError::Body {
            url: url.clone(),
            source,
        })?;

        debug!(start_line, next_offset, bytes = text.len(), "fetched console log");
        Ok(LogChunk { text, next_offset })
    }
}

/// Reads the resume offset from the `X-JSON` header, a JSON array whose
/// first element is the next line number. Absent or malformed means `0`.
pub fn parse_next_offset(header: Option<&str>) -> u64 {
    header
        .and_then(|raw| serde_json::from_str::<Vec<Value>>(raw).ok())
        .and_then(|values| values.first().and_then(Value::as_u64))
        .unwrap_or(0)
}

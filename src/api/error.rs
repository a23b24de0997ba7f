use thiserror::Error;

/// Failure of a single console or job status request. The poller treats
/// every variant as transient and retries on the next tick.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot reach '{url}': {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to '{url}' timed out")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("'{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read response from '{url}': {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed response from '{url}': {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    pub fn from_request(error: reqwest::Error, url: &str) -> Self {
        let url = url.to_string();
        if error.is_connect() {
            return FetchError::Connect { url, source: error };
        }
        if error.is_timeout() {
            return FetchError::Timeout { url, source: error };
        }
        if let Some(status) = error.status() {
            return FetchError::Status {
                url,
                status: status.as_u16(),
            };
        }
        FetchError::Request { url, source: error }
    }

    /// Whether waiting for the next tick is likely to help.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Connect { .. } | FetchError::Timeout { .. } | FetchError::Body { .. } => {
                true
            }
            FetchError::Status { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            FetchError::Request { .. } | FetchError::Decode { .. } => false,
        }
    }
}

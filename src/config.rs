use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, parse_bool_str};

pub const CONSOLE_URL_ENV: &str = "CONSOLEFOLD_CONSOLE_URL";
pub const JOB_STATUS_URL_ENV: &str = "CONSOLEFOLD_JOB_STATUS_URL";
pub const POLL_INTERVAL_ENV: &str = "CONSOLEFOLD_POLL_INTERVAL_MS";
pub const CHUNK_SIZE_ENV: &str = "CONSOLEFOLD_CHUNK_SIZE";
pub const REQUEST_TIMEOUT_ENV: &str = "CONSOLEFOLD_REQUEST_TIMEOUT_MS";
pub const SHOW_TIMESTAMPS_ENV: &str = "CONSOLEFOLD_SHOW_TIMESTAMPS";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

const POLL_INTERVAL_RANGE: (u64, u64) = (250, 60_000);
const CHUNK_SIZE_RANGE: (usize, usize) = (1, 100_000);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub console_url: String,
    pub job_status_url: Option<String>,
    pub poll_interval_ms: u64,
    pub chunk_size: usize,
    pub request_timeout_ms: u64,
    pub show_timestamps: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let Some(console_url) = var(CONSOLE_URL_ENV) else {
            bail!("{CONSOLE_URL_ENV} must be set to the console log URL");
        };
        let job_status_url = var(JOB_STATUS_URL_ENV);

        let poll_interval_ms = match var(POLL_INTERVAL_ENV) {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("Invalid {POLL_INTERVAL_ENV} '{raw}'"))?
                .clamp(POLL_INTERVAL_RANGE.0, POLL_INTERVAL_RANGE.1),
            None => DEFAULT_POLL_INTERVAL_MS,
        };
        let chunk_size = match var(CHUNK_SIZE_ENV) {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("Invalid {CHUNK_SIZE_ENV} '{raw}'"))?
                .clamp(CHUNK_SIZE_RANGE.0, CHUNK_SIZE_RANGE.1),
            None => DEFAULT_CHUNK_SIZE,
        };
        let request_timeout_ms = match var(REQUEST_TIMEOUT_ENV) {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("Invalid {REQUEST_TIMEOUT_ENV} '{raw}'"))?,
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        };
        let show_timestamps = match var(SHOW_TIMESTAMPS_ENV) {
            Some(raw) => match parse_bool_str(&raw) {
                Some(flag) => flag,
                None => bail!("Invalid {SHOW_TIMESTAMPS_ENV} '{raw}': expected true or false"),
            },
            None => false,
        };

        Ok(Self {
            console_url,
            job_status_url,
            poll_interval_ms,
            chunk_size,
            request_timeout_ms,
            show_timestamps,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.console_url) {
            bail!(
                "Invalid {CONSOLE_URL_ENV} '{}': expected http:// or https:// URL",
                self.console_url
            );
        }

        if let Some(url) = &self.job_status_url {
            if !is_http_url(url) {
                bail!("Invalid {JOB_STATUS_URL_ENV} '{url}': expected http:// or https:// URL");
            }
        }

        if self.request_timeout_ms == 0 {
            bail!("{REQUEST_TIMEOUT_ENV} must be greater than zero");
        }

        Ok(())
    }
}

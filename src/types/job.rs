use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

/// One entry of the job status payload: `[{"building_info": {...}}]`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    pub building_info: BuildingInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildingInfo {
    #[serde(default, deserialize_with = "bool_or_string")]
    pub is_completed: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub current_status: Option<String>,
}

impl JobStatus {
    /// Decodes the job status endpoint body and reports whether the job finished.
    pub fn completed_from_json(body: &str) -> Result<bool> {
        let entries: Vec<JobStatus> =
            serde_json::from_str(body).context("malformed job status payload")?;
        let first = entries
            .into_iter()
            .next()
            .context("job status payload is empty")?;
        Ok(first.building_info.is_completed)
    }
}

// The server has sent this field both as a JSON boolean and as "true"/"false".
fn bool_or_string<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Text(text) => crate::util::parse_bool_str(&text).unwrap_or(false),
    })
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Two-character line-type code written by the build agent in front of
/// every console line, e.g. `!!|12:00:01.000 [go] Task: make`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrefixCode {
    Info,
    Alert,
    Prep,
    PrepErr,
    TaskStart,
    Out,
    Err,
    Pass,
    Fail,
    CancelTaskStart,
    CancelTaskPass,
    CancelTaskFail,
    JobPass,
    JobFail,
}

impl PrefixCode {
    pub const COUNT: usize = 14;

    pub const ALL: [PrefixCode; Self::COUNT] = [
        PrefixCode::Info,
        PrefixCode::Alert,
        PrefixCode::Prep,
        PrefixCode::PrepErr,
        PrefixCode::TaskStart,
        PrefixCode::Out,
        PrefixCode::Err,
        PrefixCode::Pass,
        PrefixCode::Fail,
        PrefixCode::CancelTaskStart,
        PrefixCode::CancelTaskPass,
        PrefixCode::CancelTaskFail,
        PrefixCode::JobPass,
        PrefixCode::JobFail,
    ];

    /// The wire token as it appears before the `|` separator.
    pub fn token(self) -> &'static str {
        match self {
            PrefixCode::Info => "##",
            PrefixCode::Alert => "@@",
            PrefixCode::Prep => "pr",
            PrefixCode::PrepErr => "pe",
            PrefixCode::TaskStart => "!!",
            PrefixCode::Out => "&1",
            PrefixCode::Err => "&2",
            PrefixCode::Pass => "?0",
            PrefixCode::Fail => "?1",
            PrefixCode::CancelTaskStart => "!x",
            PrefixCode::CancelTaskPass => "x0",
            PrefixCode::CancelTaskFail => "x1",
            PrefixCode::JobPass => "j0",
            PrefixCode::JobFail => "j1",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.token() == token)
    }

    /// Symbolic name, used as the line's display class (`INFO`, `TASK_START`, ...).
    pub fn name(self) -> &'static str {
        match self {
            PrefixCode::Info => "INFO",
            PrefixCode::Alert => "ALERT",
            PrefixCode::Prep => "PREP",
            PrefixCode::PrepErr => "PREP_ERR",
            PrefixCode::TaskStart => "TASK_START",
            PrefixCode::Out => "OUT",
            PrefixCode::Err => "ERR",
            PrefixCode::Pass => "PASS",
            PrefixCode::Fail => "FAIL",
            PrefixCode::CancelTaskStart => "CANCEL_TASK_START",
            PrefixCode::CancelTaskPass => "CANCEL_TASK_PASS",
            PrefixCode::CancelTaskFail => "CANCEL_TASK_FAIL",
            PrefixCode::JobPass => "JOB_PASS",
            PrefixCode::JobFail => "JOB_FAIL",
        }
    }

    pub(crate) const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for PrefixCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Prefix as parsed off a raw line. Tokens outside the known set are kept
/// verbatim so they can still be displayed; they classify like an absent prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinePrefix {
    Known(PrefixCode),
    Unrecognized(String),
}

impl LinePrefix {
    pub fn parse(token: &str) -> Self {
        PrefixCode::from_token(token)
            .map(LinePrefix::Known)
            .unwrap_or_else(|| LinePrefix::Unrecognized(token.to_string()))
    }

    pub fn code(&self) -> Option<PrefixCode> {
        match self {
            LinePrefix::Known(code) => Some(*code),
            LinePrefix::Unrecognized(_) => None,
        }
    }

    pub fn token(&self) -> &str {
        match self {
            LinePrefix::Known(code) => code.token(),
            LinePrefix::Unrecognized(token) => token,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Info,
    Prep,
    Task,
    Cancel,
    Result,
}

impl SectionType {
    pub const COUNT: usize = 5;

    pub fn as_str(self) -> &'static str {
        match self {
            SectionType::Info => "info",
            SectionType::Prep => "prep",
            SectionType::Task => "task",
            SectionType::Cancel => "cancel",
            SectionType::Result => "result",
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Running,
    Passed,
    Failed,
    /// British spelling, matching the server's job result naming.
    Cancelled,
}

impl SectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionStatus::Running => "running",
            SectionStatus::Passed => "passed",
            SectionStatus::Failed => "failed",
            SectionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a status came from a task-level or job-level terminal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusScope {
    Task,
    Job,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedStatus {
    pub scope: StatusScope,
    pub status: SectionStatus,
}

impl ScopedStatus {
    pub fn task(status: SectionStatus) -> Self {
        Self {
            scope: StatusScope::Task,
            status,
        }
    }

    pub fn job(status: SectionStatus) -> Self {
        Self {
            scope: StatusScope::Job,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_round_trip_through_lookup() {
        for code in PrefixCode::ALL {
            assert_eq!(PrefixCode::from_token(code.token()), Some(code));
        }
        assert_eq!(PrefixCode::from_token("x!"), None);
        assert_eq!(PrefixCode::from_token(""), None);
    }

    #[test]
    fn test_unrecognized_prefix_keeps_token() {
        let prefix = LinePrefix::parse("zz");
        assert_eq!(prefix.code(), None);
        assert_eq!(prefix.token(), "zz");
        assert_eq!(LinePrefix::parse("?1").code(), Some(PrefixCode::Fail));
    }

    #[test]
    fn test_bits_are_distinct() {
        let mut seen = 0u16;
        for code in PrefixCode::ALL {
            assert_eq!(seen & code.bit(), 0, "{} shares a bit", code.name());
            seen |= code.bit();
        }
    }
}

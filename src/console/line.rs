use super::ansi::{self, StyledRun};
use crate::types::{LinePrefix, PrefixCode};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PREFIXED_LOG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^|]{2})\|(\d\d:\d\d:\d\d\.\d\d\d) (.*)").expect("Invalid prefixed line regex")
});
// timestamps are not guaranteed on each line in the legacy format
static LEGACY_LOG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d\d:\d\d:\d\d\.\d\d\d )?(.*)").expect("Invalid legacy line regex")
});
static TASK_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*\[go\] (?:On Cancel )?Task: )(.*)").expect("Invalid task line regex")
});
static STATUS_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*\[go\] (?:Current job|Task) status: )(.*)")
        .expect("Invalid status line regex")
});

/// One raw console line split into its framing parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub prefix: Option<LinePrefix>,
    pub timestamp: String,
    pub content: String,
}

pub fn parse_log_line(raw: &str) -> ParsedLine {
    let raw = raw.trim_end_matches(['\n', '\r']);

    if let Some(caps) = PREFIXED_LOG_LINE.captures(raw) {
        return ParsedLine {
            prefix: Some(LinePrefix::parse(&caps[1])),
            timestamp: caps[2].to_string(),
            content: caps.get(3).map_or("", |m| m.as_str()).to_string(),
        };
    }

    match LEGACY_LOG_LINE.captures(raw) {
        Some(caps) => ParsedLine {
            prefix: None,
            timestamp: caps.get(1).map_or("", |m| m.as_str().trim()).to_string(),
            content: caps.get(2).map_or("", |m| m.as_str()).to_string(),
        },
        None => ParsedLine {
            prefix: None,
            timestamp: String::new(),
            content: raw.to_string(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text(StyledRun),
    /// Emphasized inline value: a task command or a status word.
    Code { text: String },
    Break,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledLine {
    pub segments: Vec<Segment>,
}

impl StyledLine {
    pub fn line_break() -> Self {
        Self {
            segments: vec![Segment::Break],
        }
    }

    pub fn is_break(&self) -> bool {
        matches!(self.segments.as_slice(), [Segment::Break])
    }

    /// The emphasized value, if the line had one.
    pub fn code(&self) -> Option<&str> {
        self.segments.iter().find_map(|segment| match segment {
            Segment::Code { text } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(run) => out.push_str(&run.text),
                Segment::Code { text } => out.push_str(text),
                Segment::Break => {}
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// Unprefixed (legacy or malformed) line.
    Basic,
    /// First line of a section.
    Header,
    Continuation,
}

/// A line as handed to the render sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedLine {
    /// 1-based position of the line in the whole stream.
    pub ordinal: u64,
    pub timestamp: String,
    pub prefix: Option<LinePrefix>,
    pub kind: LineKind,
    pub content: StyledLine,
}

pub fn render_basic(text: &str) -> StyledLine {
    if text.trim().is_empty() {
        return StyledLine::line_break();
    }
    StyledLine {
        segments: ansi::decode(text).into_iter().map(Segment::Text).collect(),
    }
}

pub fn render_header(prefix: Option<PrefixCode>, text: &str) -> StyledLine {
    format_content(prefix, text)
}

pub fn render_continuation(prefix: Option<PrefixCode>, text: &str) -> StyledLine {
    format_content(prefix, text)
}

fn is_task_line(prefix: PrefixCode) -> bool {
    matches!(prefix, PrefixCode::TaskStart | PrefixCode::CancelTaskStart)
}

fn is_status_line(prefix: PrefixCode) -> bool {
    matches!(
        prefix,
        PrefixCode::Pass
            | PrefixCode::Fail
            | PrefixCode::JobPass
            | PrefixCode::JobFail
            | PrefixCode::CancelTaskPass
            | PrefixCode::CancelTaskFail
    )
}

fn format_content(prefix: Option<PrefixCode>, text: &str) -> StyledLine {
    let pattern = match prefix {
        Some(code) if is_task_line(code) => &*TASK_LINE,
        Some(code) if is_status_line(code) => &*STATUS_LINE,
        _ => return render_basic(text),
    };

    // a status prefix without a status line is usually the tail of an on-cancel task
    let Some(caps) = pattern.captures(text) else {
        return render_basic(text);
    };

    StyledLine {
        segments: vec![
            Segment::Text(StyledRun {
                text: caps[1].to_string(),
                style: Default::default(),
            }),
            Segment::Code {
                text: caps[2].to_string(),
            },
        ],
    }
}

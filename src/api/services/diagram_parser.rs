//! Sequence diagram parser.
//!
//! Handles the subset of the Mermaid `sequenceDiagram` language the platform
//! emits: participant/actor declarations, message lines, `activate`/`deactivate`,
//! notes and the `loop`/`alt`/`opt`/`par` blocks. Anything else is skipped.

use crate::models::HttpMethod;
use indexmap::IndexSet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

pub const DIAGRAM_HEADER: &str = "sequenceDiagram";
pub const COMMENT_MARKER: &str = "%%";
pub const INDENT_UNIT: &str = "    ";

/// Blocks closed by a literal `end` line whose nesting is checked.
pub const BLOCK_KEYWORDS: [&str; 4] = ["loop", "alt", "opt", "par"];

/// Other Mermaid blocks that also close with `end`. They take part in nesting
/// but are never reported as unclosed.
pub const PASSIVE_BLOCK_KEYWORDS: [&str; 4] = ["rect", "critical", "break", "box"];

/// Keywords after which the formatter indents one more level.
const INDENT_OPENERS: [&str; 11] = [
    "loop", "alt", "opt", "par", "rect", "critical", "break", "box", "else", "and", "option",
];

/// Branch keywords printed at their block's level.
const BRANCH_KEYWORDS: [&str; 3] = ["else", "and", "option"];

static DECLARATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(participant|actor)\s+(?:"([^"]+)"|(\S+))(?:\s+as\s+(.+?))?\s*$"#)
        .expect("declaration pattern is valid")
});

static MESSAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\w.]+)\s*(-->>|->>|-->|->|--x|-x|--\)|-\))\s*[+-]?\s*([\w.]+)\s*:\s*(.*)$")
        .expect("message pattern is valid")
});

static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\s+(\S+)(?:\s+(.+))?$")
        .expect("call pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageArrow {
    #[serde(rename = "->>")]
    Solid,
    #[serde(rename = "-->>")]
    Dotted,
    #[serde(rename = "->")]
    SolidOpen,
    #[serde(rename = "-->")]
    DottedOpen,
    #[serde(rename = "-x")]
    SolidCross,
    #[serde(rename = "--x")]
    DottedCross,
    #[serde(rename = "-)")]
    SolidAsync,
    #[serde(rename = "--)")]
    DottedAsync,
}

impl MessageArrow {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageArrow::Solid => "->>",
            MessageArrow::Dotted => "-->>",
            MessageArrow::SolidOpen => "->",
            MessageArrow::DottedOpen => "-->",
            MessageArrow::SolidCross => "-x",
            MessageArrow::DottedCross => "--x",
            MessageArrow::SolidAsync => "-)",
            MessageArrow::DottedAsync => "--)",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "->>" => MessageArrow::Solid,
            "-->>" => MessageArrow::Dotted,
            "->" => MessageArrow::SolidOpen,
            "-->" => MessageArrow::DottedOpen,
            "-x" => MessageArrow::SolidCross,
            "--x" => MessageArrow::DottedCross,
            "-)" => MessageArrow::SolidAsync,
            "--)" => MessageArrow::DottedAsync,
            _ => return None,
        })
    }
}

impl fmt::Display for MessageArrow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural validation outcome. Never an error value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(message.into()),
        }
    }
}

/// One message line of a diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCall {
    /// Position among the diagram's calls, starting at 0.
    pub index: usize,
    /// 1-based line in the source text.
    pub line_number: u32,
    pub from: String,
    pub to: String,
    pub arrow: MessageArrow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Trimmed source line.
    pub raw_line: String,
}

impl ParsedCall {
    /// Build a call from a message, splitting `METHOD PATH [DESCRIPTION]` when it matches.
    pub fn new(from: &str, to: &str, arrow: MessageArrow, message: &str) -> Self {
        let message = message.trim();
        let (method, path, description) = match CALL_RE.captures(message) {
            Some(caps) => (
                caps.get(1).and_then(|m| m.as_str().parse::<HttpMethod>().ok()),
                caps.get(2).map(|m| m.as_str().to_string()),
                caps.get(3).map(|m| m.as_str().trim().to_string()),
            ),
            None if message.is_empty() => (None, None, None),
            None => (None, None, Some(message.to_string())),
        };

        let mut call = Self {
            index: 0,
            line_number: 0,
            from: from.to_string(),
            to: to.to_string(),
            arrow,
            method,
            path,
            description,
            raw_line: String::new(),
        };
        call.raw_line = format!("{}{}{}: {}", call.from, arrow, call.to, call.message());
        call
    }

    /// True when the message carried an HTTP method and a path.
    pub fn is_api_call(&self) -> bool {
        self.method.is_some() && self.path.is_some()
    }

    /// Message text as it would appear after the colon.
    pub fn message(&self) -> String {
        match (&self.method, &self.path) {
            (Some(method), Some(path)) => match &self.description {
                Some(desc) => format!("{} {} {}", method, path, desc),
                None => format!("{} {}", method, path),
            },
            _ => self.description.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDiagram {
    pub success: bool,
    pub participants: IndexSet<String>,
    pub api_calls: Vec<ParsedCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ParsedDiagram {
    /// Calls that carry both method and path.
    pub fn http_calls(&self) -> impl Iterator<Item = &ParsedCall> {
        self.api_calls.iter().filter(|c| c.is_api_call())
    }
}

/// Stateless parser, validator and formatter for sequence diagram source.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagramParser;

fn is_skippable(trimmed: &str) -> bool {
    trimmed.is_empty() || trimmed.starts_with(COMMENT_MARKER)
}

fn first_token(trimmed: &str) -> &str {
    trimmed.split_whitespace().next().unwrap_or("")
}

impl DiagramParser {
    pub fn new() -> Self {
        Self
    }

    /// Check the header and block nesting.
    ///
    /// Blank text is valid (not yet authored). Otherwise the first non-blank,
    /// non-comment line must be the header and every `loop`/`alt`/`opt`/`par`
    /// block must be closed by `end`. An `end` with nothing open is ignored.
    pub fn validate(&self, text: &str) -> ValidationResult {
        if text.trim().is_empty() {
            return ValidationResult::ok();
        }

        let mut lines = text.lines().enumerate();
        let mut header_found = false;
        for (idx, raw) in lines.by_ref() {
            let trimmed = raw.trim();
            if is_skippable(trimmed) {
                continue;
            }
            if trimmed != DIAGRAM_HEADER {
                return ValidationResult::invalid(format!(
                    "Diagram must start with '{}' (found '{}' at line {})",
                    DIAGRAM_HEADER,
                    trimmed,
                    idx + 1
                ));
            }
            header_found = true;
            break;
        }
        if !header_found {
            // Only comments: nothing authored yet.
            return ValidationResult::ok();
        }

        let mut open_blocks: Vec<(&str, usize)> = Vec::new();
        for (idx, raw) in lines {
            let trimmed = raw.trim();
            if is_skippable(trimmed) {
                continue;
            }
            if trimmed == "end" {
                if open_blocks.pop().is_none() {
                    debug!("Ignoring 'end' at line {} with no open block", idx + 1);
                }
                continue;
            }
            let keyword = first_token(trimmed);
            if let Some(block) = BLOCK_KEYWORDS
                .iter()
                .chain(PASSIVE_BLOCK_KEYWORDS.iter())
                .find(|k| **k == keyword)
            {
                open_blocks.push((*block, idx + 1));
            }
        }

        if !open_blocks
            .iter()
            .any(|(kind, _)| BLOCK_KEYWORDS.contains(kind))
        {
            return ValidationResult::ok();
        }

        let messages: Vec<String> = BLOCK_KEYWORDS
            .iter()
            .filter_map(|kind| {
                let lines: Vec<String> = open_blocks
                    .iter()
                    .filter(|(k, _)| k == kind)
                    .map(|(_, line)| line.to_string())
                    .collect();
                match lines.len() {
                    0 => None,
                    1 => Some(format!(
                        "Unclosed '{}' block (opened at line {})",
                        kind, lines[0]
                    )),
                    n => Some(format!(
                        "{} unclosed '{}' blocks (opened at lines {})",
                        n,
                        kind,
                        lines.join(", ")
                    )),
                }
            })
            .collect();

        ValidationResult::invalid(messages.join("; "))
    }

    /// Extract participants and calls.
    ///
    /// Unrecognized lines are skipped. `success` mirrors [`Self::validate`]; the
    /// participants and calls found are returned either way.
    pub fn parse(&self, text: &str) -> ParsedDiagram {
        let mut participants: IndexSet<String> = IndexSet::new();
        let mut api_calls: Vec<ParsedCall> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let trimmed = raw.trim();
            if is_skippable(trimmed) || trimmed == DIAGRAM_HEADER {
                continue;
            }

            if let Some(caps) = DECLARATION_RE.captures(trimmed) {
                let name = caps
                    .get(4)
                    .or_else(|| caps.get(2))
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str().trim().to_string());
                if let Some(name) = name.filter(|n| !n.is_empty()) {
                    participants.insert(name);
                }
                continue;
            }

            match first_token(trimmed) {
                "activate" | "deactivate" => continue,
                token if token.eq_ignore_ascii_case("note") => continue,
                _ => {}
            }

            if let Some(caps) = MESSAGE_RE.captures(trimmed) {
                let (Some(from), Some(arrow), Some(to)) = (
                    caps.get(1).map(|m| m.as_str()),
                    caps.get(2).and_then(|m| MessageArrow::from_token(m.as_str())),
                    caps.get(3).map(|m| m.as_str()),
                ) else {
                    continue;
                };
                let message = caps.get(4).map(|m| m.as_str()).unwrap_or("");

                participants.insert(from.to_string());
                participants.insert(to.to_string());

                let mut call = ParsedCall::new(from, to, arrow, message);
                call.index = api_calls.len();
                call.line_number = (idx + 1) as u32;
                call.raw_line = trimmed.to_string();
                api_calls.push(call);
                continue;
            }

            debug!("Skipping unrecognized diagram line {}: {}", idx + 1, trimmed);
        }

        let validation = self.validate(text);
        ParsedDiagram {
            success: validation.valid,
            participants,
            api_calls,
            error: validation.error,
        }
    }

    /// Re-indent the text with [`INDENT_UNIT`].
    ///
    /// Lines after the header start one level in; `end` and branch keywords (`else`,
    /// `and`, `option`) step back a level and block openers step in. Blank lines are
    /// emitted empty. Idempotent.
    pub fn format(&self, text: &str) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut base = 0usize;
        let mut level = 0usize;

        for raw in text.lines() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                out.push(String::new());
                continue;
            }
            if base == 0 && trimmed == DIAGRAM_HEADER {
                out.push(trimmed.to_string());
                base = 1;
                level = 1;
                continue;
            }

            let keyword = first_token(trimmed);
            if trimmed == "end" || BRANCH_KEYWORDS.contains(&keyword) {
                level = level.saturating_sub(1).max(base);
            }
            out.push(format!("{}{}", INDENT_UNIT.repeat(level), trimmed));
            if INDENT_OPENERS.contains(&keyword) {
                level += 1;
            }
        }

        let mut formatted = out.join("\n");
        if text.ends_with('\n') {
            formatted.push('\n');
        }
        formatted
    }

    /// Produce a minimal diagram declaring `participants` and emitting `calls` in order.
    pub fn generate<S: AsRef<str>>(&self, participants: &[S], calls: &[ParsedCall]) -> String {
        let mut out = String::from(DIAGRAM_HEADER);
        out.push('\n');

        for participant in participants {
            let name = participant.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if name.chars().any(char::is_whitespace) {
                out.push_str(&format!("{}participant \"{}\"\n", INDENT_UNIT, name));
            } else {
                out.push_str(&format!("{}participant {}\n", INDENT_UNIT, name));
            }
        }

        for call in calls {
            let message = call.message();
            if message.is_empty() {
                out.push_str(&format!("{}{}{}{}:\n", INDENT_UNIT, call.from, call.arrow, call.to));
            } else {
                out.push_str(&format!(
                    "{}{}{}{}: {}\n",
                    INDENT_UNIT, call.from, call.arrow, call.to, message
                ));
            }
        }

        out
    }
}

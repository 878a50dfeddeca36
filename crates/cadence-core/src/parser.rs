//! Line-oriented parser for the raw signup blob.
//!
//! The external table flattens to a text blob where each participant wrote a
//! header line (`昵称-公司-专注领域`) optionally followed by introduction and
//! goal lines. The parser keeps at most one record under construction and
//! emits records in input order.

use crate::types::ParsedSignup;

/// Marker prefixes inside a record body.
const INTRO_MARKER: &str = "自我介绍：";
const GOALS_MARKER: &str = "本期目标：";

/// Focus-area sentinel for header lines that don't split into three parts.
pub const UNKNOWN_FOCUS: &str = "未知";

/// Parse one raw signup blob into structured records.
///
/// Duplicate nicknames are not deduplicated here; the import transaction
/// rejects them (see `lifecycle::complete_signup`).
pub fn parse_signup_text(raw: &str) -> Vec<ParsedSignup> {
    let mut records = Vec::new();
    let mut current: Option<ParsedSignup> = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.contains('-') {
            // Header line starts a new record; finalize the previous one.
            if let Some(prev) = current.take() {
                if !prev.nickname.is_empty() {
                    records.push(prev);
                }
            }
            current = parse_header(line);
        } else if let Some(rec) = current.as_mut() {
            if let Some(rest) = split_after(line, INTRO_MARKER) {
                rec.introduction = rest.trim().to_string();
            } else if let Some(rest) = split_after(line, GOALS_MARKER) {
                rec.goals = rest.trim().to_string();
            }
        }
        // Body lines before any header are ignored.
    }

    if let Some(last) = current {
        if !last.nickname.is_empty() {
            records.push(last);
        }
    }

    records
}

/// `nickname - <ignored> - focus_area`; fewer than three parts means the
/// whole line is the nickname and the focus area is unknown.
fn parse_header(line: &str) -> Option<ParsedSignup> {
    let parts: Vec<&str> = line.split('-').collect();
    let (nickname, focus_area) = if parts.len() >= 3 {
        (
            parts[0].trim().to_string(),
            parts[parts.len() - 1].trim().to_string(),
        )
    } else {
        (line.to_string(), UNKNOWN_FOCUS.to_string())
    };

    if nickname.is_empty() {
        return None;
    }

    Some(ParsedSignup {
        nickname,
        focus_area,
        introduction: String::new(),
        goals: String::new(),
    })
}

/// Text after `marker` if the line contains it.
fn split_after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.find(marker).map(|idx| &line[idx + marker.len()..])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

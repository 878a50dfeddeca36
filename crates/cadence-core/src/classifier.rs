//! Inbound event classification.
//!
//! Text commands are exact-match literals; the round-opening trigger is a
//! structured card matched against a typed schema instead of substring
//! probing. Anything that fails to parse is `Unrecognized`, never an error:
//! unknown chatter must not produce replies.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Card title announcing a new signup round.
pub const TRIGGER_TITLE: &str = "🌟本期目标制定";

/// Exact text commands.
pub const END_SIGNUP_COMMAND: &str = "#接龙结束";
pub const END_ACTIVITY_COMMAND: &str = "#活动结束";
pub const CHECKIN_PREFIX: &str = "#打卡";

/// Substrings of the "current N participants" echo cards that follow the
/// trigger. Their presence means the card is a participation echo, not the
/// announcement itself.
const ECHO_MARKERS: (&str, &str) = ("当前", "人参加群接龙");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A trigger card opened a new round; carries the signup table link.
    OpenRound { signup_link: String },
    EndSignup,
    EndActivity,
    Checkin { nickname: String, content: String },
    /// Started with the check-in prefix but didn't match the shape; the
    /// dispatcher answers with a usage hint.
    MalformedCheckin,
    /// No reply, no log noise.
    Unrecognized,
}

// ---------------------------------------------------------------------------
// Card schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Card {
    #[serde(default)]
    title: String,
    #[serde(default)]
    elements: Vec<Vec<Element>>,
}

#[derive(Debug, Deserialize)]
struct Element {
    #[serde(default)]
    tag: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    href: Option<String>,
}

impl Card {
    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().flatten()
    }

    fn signup_link(&self) -> Option<&str> {
        self.elements()
            .find(|e| e.tag == "a" && e.href.is_some())
            .and_then(|e| e.href.as_deref())
    }

    fn is_participation_echo(&self) -> bool {
        self.elements()
            .any(|e| e.tag == "text" && e.text.contains(ECHO_MARKERS.0) && e.text.contains(ECHO_MARKERS.1))
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify one inbound message into a command.
///
/// `message_type` and `raw_content` come straight off the transport:
/// `interactive` content is the card JSON, `text` content is the bare text
/// (already unwrapped from its `{"text": …}` envelope).
pub fn classify(message_type: &str, raw_content: &str) -> Command {
    match message_type {
        "interactive" => classify_card(raw_content),
        "text" => classify_text(raw_content),
        _ => Command::Unrecognized,
    }
}

fn classify_card(raw: &str) -> Command {
    let Ok(card) = serde_json::from_str::<Card>(raw) else {
        // Malformed payloads are dropped silently per the dispatch contract.
        tracing::debug!("interactive content did not match card schema");
        return Command::Unrecognized;
    };

    if card.title.trim() != TRIGGER_TITLE {
        return Command::Unrecognized;
    }
    if card.is_participation_echo() {
        // Someone joined the signup; only the announcement opens a round.
        return Command::Unrecognized;
    }
    match card.signup_link() {
        Some(link) => Command::OpenRound {
            signup_link: link.to_string(),
        },
        None => Command::Unrecognized,
    }
}

fn classify_text(raw: &str) -> Command {
    let text = raw.trim();
    if text == END_SIGNUP_COMMAND {
        return Command::EndSignup;
    }
    if text == END_ACTIVITY_COMMAND {
        return Command::EndActivity;
    }
    if let Some(rest) = raw.strip_prefix(CHECKIN_PREFIX) {
        return match checkin_regex().captures(rest) {
            Some(caps) => Command::Checkin {
                nickname: caps[1].to_string(),
                content: caps[2].trim().to_string(),
            },
            None => Command::MalformedCheckin,
        };
    }
    Command::Unrecognized
}

/// Nickname is a whitespace-free token of word characters and hyphens;
/// content is everything up to the first newline.
fn checkin_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s+([\w-]+)\s+(.+)").expect("static regex"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

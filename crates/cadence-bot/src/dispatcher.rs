//! Command dispatch: one inbound chat message in, at most one reply out.
//!
//! Every branch is isolated: a failing command logs and produces either a
//! denial reply or nothing, never a crash of the dispatch loop.

use cadence_core::classifier::{classify, Command};
use cadence_core::ledger::CheckinLedger;
use cadence_core::lifecycle::PeriodLifecycle;
use cadence_core::parser::parse_signup_text;
use cadence_core::types::TARGET_CHECKINS;
use cadence_core::CadenceError;
use chrono::Utc;
use serde::Deserialize;

use crate::feedback::{FeedbackContext, FeedbackKind};
use crate::replies;
use crate::state::AppState;

/// One message off the transport, already deduplicated by event id.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub message_id: String,
    pub chat_id: String,
    pub chat_type: String,
    pub message_type: String,
    /// Raw content: card JSON for interactive messages, `{"text": …}` for
    /// text messages.
    pub content: String,
}

/// Process one event end to end, sending the reply if there is one.
pub async fn handle_event(state: AppState, msg: InboundMessage) {
    let Some(reply) = dispatch(&state, &msg).await else {
        return;
    };
    state
        .messenger
        .reply(&msg.chat_id, &msg.chat_type, &msg.message_id, &reply)
        .await;
}

/// Classify and execute; returns the reply text, or `None` when the message
/// warrants no response.
pub async fn dispatch(state: &AppState, msg: &InboundMessage) -> Option<String> {
    let content = match extract_content(msg) {
        Some(content) => content,
        None => {
            // Broken transport assumption: drop silently, no reply.
            tracing::warn!(message_id = %msg.message_id, "undecodable message content, dropping");
            return None;
        }
    };

    match classify(&msg.message_type, &content) {
        Command::OpenRound { signup_link } => open_round(state, &signup_link),
        Command::EndSignup => end_signup(state).await,
        Command::EndActivity => end_activity(state),
        Command::Checkin { nickname, content } => checkin(state, &nickname, &content).await,
        Command::MalformedCheckin => Some(replies::CHECKIN_USAGE.to_string()),
        Command::Unrecognized => None,
    }
}

/// Text message content is itself a JSON envelope; interactive content is
/// the card JSON and passes through untouched.
fn extract_content(msg: &InboundMessage) -> Option<String> {
    if msg.message_type != "text" {
        return Some(msg.content.clone());
    }

    #[derive(Deserialize)]
    struct TextContent {
        text: String,
    }
    serde_json::from_str::<TextContent>(&msg.content)
        .ok()
        .map(|c| c.text)
}

fn open_round(state: &AppState, signup_link: &str) -> Option<String> {
    let lifecycle = PeriodLifecycle::new(&state.store);
    match lifecycle.open_round(Some(signup_link), Utc::now()) {
        Ok(period) => {
            tracing::info!(period = %period.name, "opened new round");
            Some(replies::ROUND_OPENED.to_string())
        }
        Err(e) => denial_or_log(e, "open_round"),
    }
}

async fn end_signup(state: &AppState) -> Option<String> {
    let lifecycle = PeriodLifecycle::new(&state.store);

    let period = match lifecycle.signup_period() {
        Ok(p) => p,
        Err(e) => return denial_or_log(e, "end_signup"),
    };
    // signup_period guarantees the link exists.
    let link = period.signup_link.as_deref()?;

    let raw = match state.sheet.fetch_raw_signup_text(link).await {
        Ok(raw) => raw,
        Err(e) => return denial_or_log(e, "end_signup"),
    };

    let records = parse_signup_text(&raw);
    match lifecycle.complete_signup(period.id, &records, Utc::now()) {
        Ok(summary) => Some(replies::signup_summary(&summary)),
        Err(e) => denial_or_log(e, "end_signup"),
    }
}

async fn checkin(state: &AppState, nickname: &str, content: &str) -> Option<String> {
    let ledger = CheckinLedger::new(&state.store);
    let now = Utc::now();

    let (record, participant) = match ledger.record(nickname, content, now.date_naive(), now) {
        Ok(pair) => pair,
        Err(e) => return denial_or_log(e, "checkin"),
    };

    // The check-in is committed; feedback generation can no longer undo it.
    let history = match ledger.history(participant.id) {
        Ok(mut all) => {
            all.pop(); // the newest record travels separately
            all
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load check-in history for prompt");
            Vec::new()
        }
    };

    let kind = if record.seq >= TARGET_CHECKINS {
        FeedbackKind::Final
    } else {
        FeedbackKind::Progress
    };
    let reply = state
        .feedback
        .generate(&FeedbackContext {
            nickname,
            goals: &participant.goals,
            history: &history,
            content,
            seq: record.seq,
            kind,
        })
        .await;
    Some(reply)
}

fn end_activity(state: &AppState) -> Option<String> {
    let lifecycle = PeriodLifecycle::new(&state.store);
    match lifecycle.close_activity(Utc::now()) {
        Ok((period, stats)) => Some(replies::close_summary(&period, &stats)),
        Err(e) => denial_or_log(e, "end_activity"),
    }
}

/// User-facing denials become replies; anything else is a system fault that
/// gets logged and produces no reply.
fn denial_or_log(err: CadenceError, op: &str) -> Option<String> {
    match replies::denial_text(&err) {
        Some(text) => {
            tracing::info!(op, denial = %err, "command denied");
            Some(text)
        }
        None => {
            tracing::error!(op, error = %err, "command failed");
            None
        }
    }
}

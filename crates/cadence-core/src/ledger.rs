//! Check-in ledger: one check-in per participant per calendar day.
//!
//! All validation is local and runs before any write. Retry concerns live
//! with the feedback client, never here.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{CadenceError, Result};
use crate::store::Store;
use crate::types::{
    CheckinRecord, Participant, ParticipantStats, PeriodStatus, MAX_CONTENT_CHARS,
    MIN_CONTENT_CHARS,
};

pub struct CheckinLedger<'a> {
    store: &'a Store,
}

impl<'a> CheckinLedger<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Record today's check-in for `nickname` in the active round.
    ///
    /// Content bounds are counted in characters, not bytes; check-ins are
    /// mostly CJK text. The returned record carries the 1-based sequence
    /// number.
    pub fn record(
        &self,
        nickname: &str,
        content: &str,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(CheckinRecord, Participant)> {
        let chars = content.chars().count();
        if chars < MIN_CONTENT_CHARS {
            return Err(CadenceError::ContentTooShort);
        }
        if chars > MAX_CONTENT_CHARS {
            return Err(CadenceError::ContentTooLong);
        }

        let period = self
            .store
            .find_by_status(&[PeriodStatus::Active])?
            .ok_or(CadenceError::NoActivePeriod)?;

        let participant = self
            .store
            .participant_by_nickname(period.id, nickname)?
            .ok_or_else(|| CadenceError::UnknownParticipant(nickname.to_string()))?;

        let record = self
            .store
            .insert_checkin(participant.id, nickname, today, content, now)?;

        tracing::info!(
            nickname,
            seq = record.seq,
            period = %period.name,
            "check-in recorded"
        );
        Ok((record, participant))
    }

    /// A participant's check-ins in chronological order, for prompt context.
    pub fn history(&self, participant_id: i64) -> Result<Vec<CheckinRecord>> {
        self.store.checkins_for(participant_id)
    }

    /// Per-participant counts and qualification for any period, including
    /// ones already closed.
    pub fn stats_for(&self, period_id: i64) -> Result<Vec<ParticipantStats>> {
        self.store.stats_for(period_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::PeriodLifecycle;
    use crate::types::ParsedSignup;

    fn active_store_with(nicknames: &[&str]) -> Store {
        let store = Store::open_in_memory().unwrap();
        let lifecycle = PeriodLifecycle::new(&store);
        let now = Utc::now();
        let period = lifecycle.open_round(Some("link"), now).unwrap();
        let records: Vec<ParsedSignup> = nicknames
            .iter()
            .map(|n| ParsedSignup {
                nickname: n.to_string(),
                focus_area: "web".to_string(),
                introduction: String::new(),
                goals: "ship v1".to_string(),
            })
            .collect();
        lifecycle.complete_signup(period.id, &records, now).unwrap();
        store
    }

    #[test]
    fn record_succeeds_and_numbers_sequentially() {
        let store = active_store_with(&["alice"]);
        let ledger = CheckinLedger::new(&store);
        let now = Utc::now();
        let today = now.date_naive();

        let (rec, participant) = ledger.record("alice", "built the parser", today, now).unwrap();
        assert_eq!(rec.seq, 1);
        assert_eq!(participant.goals, "ship v1");

        let (rec, _) = ledger
            .record("alice", "wired it up", today + chrono::Duration::days(1), now)
            .unwrap();
        assert_eq!(rec.seq, 2);
    }

    #[test]
    fn duplicate_day_yields_one_record_and_an_error() {
        let store = active_store_with(&["alice"]);
        let ledger = CheckinLedger::new(&store);
        let now = Utc::now();
        let today = now.date_naive();

        ledger.record("alice", "first", today, now).unwrap();
        let err = ledger.record("alice", "second", today, now).unwrap_err();
        assert!(matches!(err, CadenceError::CheckinExistsToday));
        assert_eq!(ledger.history(1).unwrap().len(), 1);
    }

    #[test]
    fn content_length_bounds_are_inclusive() {
        let store = active_store_with(&["alice"]);
        let ledger = CheckinLedger::new(&store);
        let now = Utc::now();
        let day = now.date_naive();

        let err = ledger.record("alice", "x", day, now).unwrap_err();
        assert!(matches!(err, CadenceError::ContentTooShort));

        let ok500: String = "字".repeat(500);
        ledger.record("alice", &ok500, day, now).unwrap();

        let too_long: String = "字".repeat(501);
        let err = ledger
            .record("alice", &too_long, day + chrono::Duration::days(1), now)
            .unwrap_err();
        assert!(matches!(err, CadenceError::ContentTooLong));
    }

    #[test]
    fn unknown_nickname_is_rejected() {
        let store = active_store_with(&["alice"]);
        let ledger = CheckinLedger::new(&store);
        let now = Utc::now();
        let err = ledger
            .record("bob", "hello there", now.date_naive(), now)
            .unwrap_err();
        assert!(matches!(err, CadenceError::UnknownParticipant(ref n) if n == "bob"));
    }

    #[test]
    fn record_requires_active_period() {
        let store = Store::open_in_memory().unwrap();
        let ledger = CheckinLedger::new(&store);
        let now = Utc::now();
        let err = ledger
            .record("alice", "hello", now.date_naive(), now)
            .unwrap_err();
        assert!(matches!(err, CadenceError::NoActivePeriod));
    }

    #[test]
    fn length_check_runs_before_period_lookup() {
        // No active period, but the shape error wins.
        let store = Store::open_in_memory().unwrap();
        let ledger = CheckinLedger::new(&store);
        let now = Utc::now();
        let err = ledger.record("alice", "x", now.date_naive(), now).unwrap_err();
        assert!(matches!(err, CadenceError::ContentTooShort));
    }
}

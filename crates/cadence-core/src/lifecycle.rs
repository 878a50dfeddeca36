//! Round lifecycle: `open` → `active` → `closed`, guarded transitions only.
//!
//! The lifecycle touches nothing but the store. Fetching the raw signup text
//! is the caller's job (it owns the table client); the flow for ending a
//! signup is `signup_period()` → fetch → `parse_signup_text` →
//! `complete_signup()`.

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::error::{CadenceError, Result};
use crate::store::Store;
use crate::types::{
    ParsedSignup, Participant, ParticipantStats, Period, PeriodStatus, SignupSummary, PERIOD_DAYS,
};

pub struct PeriodLifecycle<'a> {
    store: &'a Store,
}

impl<'a> PeriodLifecycle<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Open a new signup round.
    ///
    /// Fails while any round is still open or active; the guard and the
    /// insert are one store transaction. The name is the current year-month,
    /// suffixed with a letter when the most recent period already used that
    /// month.
    pub fn open_round(&self, signup_link: Option<&str>, now: DateTime<Utc>) -> Result<Period> {
        let end = now + Duration::days(PERIOD_DAYS);
        self.store.open_round(now, end, signup_link, |latest| {
            next_period_name(now, latest)
        })
    }

    /// The one period currently collecting signups, with its source link
    /// verified to exist.
    pub fn signup_period(&self) -> Result<Period> {
        let period = self
            .store
            .find_by_status(&[PeriodStatus::Open])?
            .ok_or(CadenceError::NoOpenPeriod)?;
        if period.signup_link.is_none() {
            return Err(CadenceError::NoSignupLink);
        }
        Ok(period)
    }

    /// Atomically replace the roster and move the period to `active`.
    ///
    /// Zero records fail with `EmptyImport` and leave the period `open`.
    /// A duplicate nickname aborts the whole import (roster and status
    /// unchanged) so the operator can fix the table and retry.
    pub fn complete_signup(
        &self,
        period_id: i64,
        records: &[ParsedSignup],
        now: DateTime<Utc>,
    ) -> Result<SignupSummary> {
        if records.is_empty() {
            return Err(CadenceError::EmptyImport);
        }

        let period = self
            .store
            .period(period_id)?
            .ok_or(CadenceError::NoOpenPeriod)?;
        let roster = self
            .store
            .replace_participants_and_activate(period_id, records, now)?;

        tracing::info!(
            period = %period.name,
            participants = roster.len(),
            "signup closed, round activated"
        );
        Ok(summarize(&period.name, &roster))
    }

    /// Close the active round and return its per-participant statistics.
    /// Guard, stats and the status write are one store transaction.
    pub fn close_activity(&self, _now: DateTime<Utc>) -> Result<(Period, Vec<ParticipantStats>)> {
        let (period, stats) = self.store.close_active_round()?;
        tracing::info!(period = %period.name, participants = stats.len(), "round closed");
        Ok((period, stats))
    }
}

/// Year-month name with a letter suffix on same-month collision:
/// `2024-05`, then `2024-05a`, `2024-05b`, …
pub fn next_period_name(now: DateTime<Utc>, latest: Option<&str>) -> String {
    let base = format!("{:04}-{:02}", now.year(), now.month());
    let Some(latest) = latest else {
        return base;
    };

    if !latest.starts_with(&base) {
        return base;
    }
    match latest.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => {
            let mut name = latest.to_string();
            name.pop();
            name.push((c as u8 + 1) as char);
            name
        }
        _ => format!("{base}a"),
    }
}

fn summarize(period_name: &str, roster: &[Participant]) -> SignupSummary {
    let mut by_focus_area: Vec<(String, Vec<String>)> = Vec::new();
    for p in roster {
        match by_focus_area.iter_mut().find(|(area, _)| *area == p.focus_area) {
            Some((_, names)) => names.push(p.nickname.clone()),
            None => by_focus_area.push((p.focus_area.clone(), vec![p.nickname.clone()])),
        }
    }
    SignupSummary {
        period_name: period_name.to_string(),
        total: roster.len(),
        by_focus_area,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signup(nickname: &str, focus: &str) -> ParsedSignup {
        ParsedSignup {
            nickname: nickname.to_string(),
            focus_area: focus.to_string(),
            introduction: String::new(),
            goals: String::new(),
        }
    }

    fn may_2024() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap()
    }

    #[test]
    fn name_without_collision_is_year_month() {
        assert_eq!(next_period_name(may_2024(), None), "2024-05");
        assert_eq!(next_period_name(may_2024(), Some("2024-04")), "2024-05");
    }

    #[test]
    fn name_collision_appends_then_increments_letter() {
        assert_eq!(next_period_name(may_2024(), Some("2024-05")), "2024-05a");
        assert_eq!(next_period_name(may_2024(), Some("2024-05a")), "2024-05b");
        assert_eq!(next_period_name(may_2024(), Some("2024-05b")), "2024-05c");
    }

    #[test]
    fn open_round_creates_open_period_with_link() {
        let store = Store::open_in_memory().unwrap();
        let lifecycle = PeriodLifecycle::new(&store);
        let period = lifecycle
            .open_round(Some("https://example/base"), may_2024())
            .unwrap();
        assert_eq!(period.status, PeriodStatus::Open);
        assert_eq!(period.name, "2024-05");
        assert_eq!(period.end_at - period.start_at, Duration::days(30));
        assert_eq!(period.signup_link.as_deref(), Some("https://example/base"));
    }

    #[test]
    fn open_round_refused_while_one_is_underway() {
        let store = Store::open_in_memory().unwrap();
        let lifecycle = PeriodLifecycle::new(&store);
        lifecycle.open_round(Some("link"), may_2024()).unwrap();

        let err = lifecycle.open_round(Some("link"), may_2024()).unwrap_err();
        assert!(matches!(err, CadenceError::RoundAlreadyOpen { .. }));
    }

    #[test]
    fn at_most_one_open_or_active_across_full_sequence() {
        let store = Store::open_in_memory().unwrap();
        let lifecycle = PeriodLifecycle::new(&store);
        let now = may_2024();

        let first = lifecycle.open_round(Some("link"), now).unwrap();
        let period = lifecycle.signup_period().unwrap();
        assert_eq!(period.id, first.id);
        lifecycle
            .complete_signup(first.id, &[signup("a", "web")], now)
            .unwrap();

        // Active blocks a second open.
        assert!(matches!(
            lifecycle.open_round(Some("link"), now),
            Err(CadenceError::RoundAlreadyOpen { .. })
        ));

        lifecycle.close_activity(now).unwrap();

        // Closed releases the invariant; same month gets a suffix.
        let second = lifecycle.open_round(Some("link"), now).unwrap();
        assert_eq!(second.name, "2024-05a");
    }

    #[test]
    fn racing_openers_leave_exactly_one_open_period() {
        use std::sync::Arc;

        let store = Arc::new(Store::open_in_memory().unwrap());
        let now = may_2024();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                PeriodLifecycle::new(&store).open_round(Some("link"), now).is_ok()
            }));
        }
        let opened = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&opened| opened)
            .count();
        assert_eq!(opened, 1);

        // The survivor carries the unsuffixed name, so no loser saw the
        // winner's row as "latest" while passing the guard.
        let open = store
            .find_by_status(&[PeriodStatus::Open])
            .unwrap()
            .unwrap();
        assert_eq!(open.name, "2024-05");
        assert_eq!(store.latest_period().unwrap().unwrap().id, open.id);
    }

    #[test]
    fn second_signup_completion_is_denied() {
        let store = Store::open_in_memory().unwrap();
        let lifecycle = PeriodLifecycle::new(&store);
        let now = may_2024();
        let period = lifecycle.open_round(Some("link"), now).unwrap();

        lifecycle
            .complete_signup(period.id, &[signup("a", "web")], now)
            .unwrap();
        let err = lifecycle
            .complete_signup(period.id, &[signup("b", "web")], now)
            .unwrap_err();
        assert!(matches!(err, CadenceError::NoOpenPeriod));

        // The first roster survives.
        let roster = store.participants_for(period.id).unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].nickname, "a");
    }

    #[test]
    fn signup_period_requires_open_and_link() {
        let store = Store::open_in_memory().unwrap();
        let lifecycle = PeriodLifecycle::new(&store);
        assert!(matches!(
            lifecycle.signup_period(),
            Err(CadenceError::NoOpenPeriod)
        ));

        lifecycle.open_round(None, may_2024()).unwrap();
        assert!(matches!(
            lifecycle.signup_period(),
            Err(CadenceError::NoSignupLink)
        ));
    }

    #[test]
    fn empty_import_leaves_period_open() {
        let store = Store::open_in_memory().unwrap();
        let lifecycle = PeriodLifecycle::new(&store);
        let period = lifecycle.open_round(Some("link"), may_2024()).unwrap();

        let err = lifecycle
            .complete_signup(period.id, &[], may_2024())
            .unwrap_err();
        assert!(matches!(err, CadenceError::EmptyImport));
        assert_eq!(
            store.period(period.id).unwrap().unwrap().status,
            PeriodStatus::Open
        );
    }

    #[test]
    fn summary_groups_by_focus_area_in_first_seen_order() {
        let store = Store::open_in_memory().unwrap();
        let lifecycle = PeriodLifecycle::new(&store);
        let period = lifecycle.open_round(Some("link"), may_2024()).unwrap();

        let summary = lifecycle
            .complete_signup(
                period.id,
                &[
                    signup("a", "backend"),
                    signup("b", "frontend"),
                    signup("c", "backend"),
                ],
                may_2024(),
            )
            .unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.period_name, "2024-05");
        assert_eq!(summary.by_focus_area.len(), 2);
        assert_eq!(summary.by_focus_area[0].0, "backend");
        assert_eq!(summary.by_focus_area[0].1, ["a", "c"]);
        assert_eq!(summary.by_focus_area[1].1, ["b"]);
    }

    #[test]
    fn close_activity_requires_active_period() {
        let store = Store::open_in_memory().unwrap();
        let lifecycle = PeriodLifecycle::new(&store);
        assert!(matches!(
            lifecycle.close_activity(may_2024()),
            Err(CadenceError::NoActivePeriod)
        ));

        // Open but not yet active still refuses.
        lifecycle.open_round(Some("link"), may_2024()).unwrap();
        assert!(matches!(
            lifecycle.close_activity(may_2024()),
            Err(CadenceError::NoActivePeriod)
        ));
    }

    #[test]
    fn close_activity_returns_stats_and_closes() {
        let store = Store::open_in_memory().unwrap();
        let lifecycle = PeriodLifecycle::new(&store);
        let now = may_2024();
        let period = lifecycle.open_round(Some("link"), now).unwrap();
        lifecycle
            .complete_signup(period.id, &[signup("a", "web")], now)
            .unwrap();

        let (closed, stats) = lifecycle.close_activity(now).unwrap();
        assert_eq!(closed.status, PeriodStatus::Closed);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].checkin_count, 0);
        assert!(!stats[0].qualified);

        // A second close finds no active round.
        assert!(matches!(
            lifecycle.close_activity(now),
            Err(CadenceError::NoActivePeriod)
        ));
    }
}

//! SQLite-backed record store for periods, participants and check-ins.
//!
//! # Schema
//!
//! ```text
//! periods       1 ──< participants 1 ──< checkins
//! UNIQUE(name)       UNIQUE(period_id,      UNIQUE(participant_id,
//!                           nickname)              checkin_date)
//! ```
//!
//! Deleting a period's participants cascades to their check-ins. Every
//! multi-step mutation runs inside one transaction; callers never observe a
//! half-applied lifecycle transition or a partially replaced roster.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::error::{CadenceError, Result};
use crate::types::{
    CheckinRecord, ParsedSignup, Participant, ParticipantStats, Period, PeriodStatus,
    QUALIFY_THRESHOLD,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS periods (
    id           INTEGER PRIMARY KEY,
    name         TEXT NOT NULL UNIQUE,
    start_at     TEXT NOT NULL,
    end_at       TEXT NOT NULL,
    status       TEXT NOT NULL,
    signup_link  TEXT
);

CREATE TABLE IF NOT EXISTS participants (
    id            INTEGER PRIMARY KEY,
    period_id     INTEGER NOT NULL REFERENCES periods(id) ON DELETE CASCADE,
    nickname      TEXT NOT NULL,
    focus_area    TEXT NOT NULL,
    introduction  TEXT NOT NULL DEFAULT '',
    goals         TEXT NOT NULL DEFAULT '',
    signed_up_at  TEXT NOT NULL,
    UNIQUE (period_id, nickname)
);

CREATE TABLE IF NOT EXISTS checkins (
    id              INTEGER PRIMARY KEY,
    participant_id  INTEGER NOT NULL REFERENCES participants(id) ON DELETE CASCADE,
    nickname        TEXT NOT NULL,
    checkin_date    TEXT NOT NULL,
    content         TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    seq             INTEGER NOT NULL,
    UNIQUE (participant_id, checkin_date)
);
";

/// Shared handle to the bot's SQLite database.
///
/// The connection sits behind a mutex: commands execute one at a time against
/// the store, which is all the concurrency the dispatch model needs.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // -----------------------------------------------------------------------
    // Periods
    // -----------------------------------------------------------------------

    /// The single period whose status is in `statuses`, if any.
    pub fn find_by_status(&self, statuses: &[PeriodStatus]) -> Result<Option<Period>> {
        let conn = self.lock();
        find_by_status_in(&conn, statuses)
    }

    /// Most recently created period regardless of status.
    pub fn latest_period(&self) -> Result<Option<Period>> {
        let conn = self.lock();
        latest_period_in(&conn)
    }

    pub fn period(&self, id: i64) -> Result<Option<Period>> {
        let conn = self.lock();
        let period = conn
            .query_row(
                "SELECT id, name, start_at, end_at, status, signup_link
                 FROM periods WHERE id = ?1",
                params![id],
                row_to_period,
            )
            .optional()?;
        Ok(period)
    }

    /// Open a new round, as one transaction.
    ///
    /// The open/active guard, the name derived from the most recent period
    /// (via `name_for`) and the insert all run under the same transaction,
    /// so two racing openers cannot both pass the guard or both derive a
    /// name from the same `latest`.
    pub fn open_round(
        &self,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        signup_link: Option<&str>,
        name_for: impl FnOnce(Option<&str>) -> String,
    ) -> Result<Period> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = find_by_status_in(&tx, &[PeriodStatus::Open, PeriodStatus::Active])?
        {
            return Err(CadenceError::RoundAlreadyOpen {
                name: existing.name,
                status: existing.status.to_string(),
            });
        }

        let latest = latest_period_in(&tx)?;
        let name = name_for(latest.as_ref().map(|p| p.name.as_str()));
        tx.execute(
            "INSERT INTO periods (name, start_at, end_at, status, signup_link)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                name,
                start_at.to_rfc3339(),
                end_at.to_rfc3339(),
                PeriodStatus::Open.as_str(),
                signup_link,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Period {
            id,
            name,
            start_at,
            end_at,
            status: PeriodStatus::Open,
            signup_link: signup_link.map(str::to_string),
        })
    }

    /// Close the active round, as one transaction.
    ///
    /// The returned stats are the counts at the moment the status flips;
    /// with no active round the close fails, so a second racing close gets
    /// `NoActivePeriod` instead of a duplicate summary.
    pub fn close_active_round(&self) -> Result<(Period, Vec<ParticipantStats>)> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut period = find_by_status_in(&tx, &[PeriodStatus::Active])?
            .ok_or(CadenceError::NoActivePeriod)?;
        let stats = stats_in(&tx, period.id)?;
        tx.execute(
            "UPDATE periods SET status = ?1 WHERE id = ?2",
            params![PeriodStatus::Closed.as_str(), period.id],
        )?;
        tx.commit()?;

        period.status = PeriodStatus::Closed;
        Ok((period, stats))
    }

    pub fn set_status(&self, period_id: i64, status: PeriodStatus) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE periods SET status = ?1 WHERE id = ?2",
            params![status.as_str(), period_id],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Participants
    // -----------------------------------------------------------------------

    /// Replace the period's roster and activate it, as one transaction.
    ///
    /// The period must still be `open`, re-verified inside the transaction
    /// so a racing second import fails instead of re-activating. Prior
    /// participants (and their check-ins, via cascade) are deleted, the
    /// new records inserted, and the period moved to `active`. A duplicate
    /// nickname inside `records` aborts the whole import: nothing is replaced
    /// and the period stays `open`.
    pub fn replace_participants_and_activate(
        &self,
        period_id: i64,
        records: &[ParsedSignup],
        now: DateTime<Utc>,
    ) -> Result<Vec<Participant>> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM periods WHERE id = ?1",
                params![period_id],
                |row| row.get(0),
            )
            .optional()?;
        if status.as_deref() != Some(PeriodStatus::Open.as_str()) {
            return Err(CadenceError::NoOpenPeriod);
        }

        tx.execute(
            "DELETE FROM participants WHERE period_id = ?1",
            params![period_id],
        )?;

        let mut inserted = Vec::with_capacity(records.len());
        for rec in records {
            let result = tx.execute(
                "INSERT INTO participants
                 (period_id, nickname, focus_area, introduction, goals, signed_up_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    period_id,
                    rec.nickname,
                    rec.focus_area,
                    rec.introduction,
                    rec.goals,
                    now.to_rfc3339(),
                ],
            );
            match result {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    // Rolls back on drop.
                    return Err(CadenceError::DuplicateNickname(rec.nickname.clone()));
                }
                Err(e) => return Err(e.into()),
            }
            inserted.push(Participant {
                id: tx.last_insert_rowid(),
                period_id,
                nickname: rec.nickname.clone(),
                focus_area: rec.focus_area.clone(),
                introduction: rec.introduction.clone(),
                goals: rec.goals.clone(),
                signed_up_at: now,
            });
        }

        tx.execute(
            "UPDATE periods SET status = ?1 WHERE id = ?2",
            params![PeriodStatus::Active.as_str(), period_id],
        )?;
        tx.commit()?;
        Ok(inserted)
    }

    pub fn participant_by_nickname(
        &self,
        period_id: i64,
        nickname: &str,
    ) -> Result<Option<Participant>> {
        let conn = self.lock();
        let participant = conn
            .query_row(
                "SELECT id, period_id, nickname, focus_area, introduction, goals, signed_up_at
                 FROM participants WHERE period_id = ?1 AND nickname = ?2",
                params![period_id, nickname],
                row_to_participant,
            )
            .optional()?;
        Ok(participant)
    }

    pub fn participants_for(&self, period_id: i64) -> Result<Vec<Participant>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, period_id, nickname, focus_area, introduction, goals, signed_up_at
             FROM participants WHERE period_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![period_id], row_to_participant)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    // -----------------------------------------------------------------------
    // Check-ins
    // -----------------------------------------------------------------------

    /// Insert a check-in, computing its sequence number inside the same
    /// transaction as the duplicate-day check.
    pub fn insert_checkin(
        &self,
        participant_id: i64,
        nickname: &str,
        date: NaiveDate,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<CheckinRecord> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM checkins
             WHERE participant_id = ?1 AND checkin_date = ?2)",
            params![participant_id, date.to_string()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(CadenceError::CheckinExistsToday);
        }

        let prior: u32 = tx.query_row(
            "SELECT COUNT(*) FROM checkins WHERE participant_id = ?1",
            params![participant_id],
            |row| row.get(0),
        )?;
        let seq = prior + 1;

        let result = tx.execute(
            "INSERT INTO checkins
             (participant_id, nickname, checkin_date, content, created_at, seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                participant_id,
                nickname,
                date.to_string(),
                content,
                now.to_rfc3339(),
                seq,
            ],
        );
        match result {
            Ok(_) => {}
            // UNIQUE backstop in case a concurrent writer slipped in.
            Err(e) if is_unique_violation(&e) => return Err(CadenceError::CheckinExistsToday),
            Err(e) => return Err(e.into()),
        }
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(CheckinRecord {
            id,
            participant_id,
            nickname: nickname.to_string(),
            date,
            content: content.to_string(),
            created_at: now,
            seq,
        })
    }

    /// All of a participant's check-ins in chronological order.
    pub fn checkins_for(&self, participant_id: i64) -> Result<Vec<CheckinRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, participant_id, nickname, checkin_date, content, created_at, seq
             FROM checkins WHERE participant_id = ?1 ORDER BY checkin_date",
        )?;
        let rows = stmt.query_map(params![participant_id], row_to_checkin)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Per-participant check-in counts and qualification for a period.
    pub fn stats_for(&self, period_id: i64) -> Result<Vec<ParticipantStats>> {
        let conn = self.lock();
        stats_in(&conn, period_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// Connection-level queries, shared between the public accessors and the
// transactional multi-step operations above.

fn find_by_status_in(conn: &Connection, statuses: &[PeriodStatus]) -> Result<Option<Period>> {
    let placeholders = vec!["?"; statuses.len()].join(", ");
    let sql = format!(
        "SELECT id, name, start_at, end_at, status, signup_link
         FROM periods WHERE status IN ({placeholders})
         ORDER BY id DESC LIMIT 1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let period = stmt
        .query_row(
            rusqlite::params_from_iter(statuses.iter().map(|s| s.as_str())),
            row_to_period,
        )
        .optional()?;
    Ok(period)
}

fn latest_period_in(conn: &Connection) -> Result<Option<Period>> {
    let period = conn
        .query_row(
            "SELECT id, name, start_at, end_at, status, signup_link
             FROM periods ORDER BY id DESC LIMIT 1",
            [],
            row_to_period,
        )
        .optional()?;
    Ok(period)
}

fn stats_in(conn: &Connection, period_id: i64) -> Result<Vec<ParticipantStats>> {
    let mut stmt = conn.prepare(
        "SELECT p.nickname, p.focus_area, COUNT(c.id)
         FROM participants p
         LEFT JOIN checkins c ON c.participant_id = p.id
         WHERE p.period_id = ?1
         GROUP BY p.id
         ORDER BY p.id",
    )?;
    let rows = stmt.query_map(params![period_id], |row| {
        let count: u32 = row.get(2)?;
        Ok(ParticipantStats {
            nickname: row.get(0)?,
            focus_area: row.get(1)?,
            checkin_count: count,
            qualified: count >= QUALIFY_THRESHOLD,
        })
    })?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Into::into)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn row_to_period(row: &Row<'_>) -> rusqlite::Result<Period> {
    let status: String = row.get(4)?;
    Ok(Period {
        id: row.get(0)?,
        name: row.get(1)?,
        start_at: parse_ts(row, 2)?,
        end_at: parse_ts(row, 3)?,
        status: status.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("bad period status: {status}").into(),
            )
        })?,
        signup_link: row.get(5)?,
    })
}

fn row_to_participant(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: row.get(0)?,
        period_id: row.get(1)?,
        nickname: row.get(2)?,
        focus_area: row.get(3)?,
        introduction: row.get(4)?,
        goals: row.get(5)?,
        signed_up_at: parse_ts(row, 6)?,
    })
}

fn row_to_checkin(row: &Row<'_>) -> rusqlite::Result<CheckinRecord> {
    let date: String = row.get(3)?;
    Ok(CheckinRecord {
        id: row.get(0)?,
        participant_id: row.get(1)?,
        nickname: row.get(2)?,
        date: date.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("bad checkin date: {date}").into(),
            )
        })?,
        content: row.get(4)?,
        created_at: parse_ts(row, 5)?,
        seq: row.get(6)?,
    })
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                e.to_string().into(),
            )
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

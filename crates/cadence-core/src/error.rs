use thiserror::Error;

#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("a round is already underway: {name} ({status})")]
    RoundAlreadyOpen { name: String, status: String },

    #[error("no round is currently collecting signups")]
    NoOpenPeriod,

    #[error("no round is currently active")]
    NoActivePeriod,

    #[error("the open round has no signup link")]
    NoSignupLink,

    #[error("signup import produced no valid records")]
    EmptyImport,

    #[error("duplicate nickname in signup import: {0}")]
    DuplicateNickname(String),

    #[error("no participant named '{0}' in the active round")]
    UnknownParticipant(String),

    #[error("participant already checked in today")]
    CheckinExistsToday,

    #[error("check-in content too short")]
    ContentTooShort,

    #[error("check-in content too long")]
    ContentTooLong,

    #[error("invalid period status: {0}")]
    InvalidStatus(String),

    #[error("failed to fetch signup table: {0}")]
    FetchFailed(String),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CadenceError {
    /// True for errors that should be rendered as a corrective chat message
    /// rather than logged as a system fault.
    pub fn is_user_denial(&self) -> bool {
        matches!(
            self,
            CadenceError::RoundAlreadyOpen { .. }
                | CadenceError::NoOpenPeriod
                | CadenceError::NoActivePeriod
                | CadenceError::NoSignupLink
                | CadenceError::EmptyImport
                | CadenceError::DuplicateNickname(_)
                | CadenceError::UnknownParticipant(_)
                | CadenceError::CheckinExistsToday
                | CadenceError::ContentTooShort
                | CadenceError::ContentTooLong
                | CadenceError::FetchFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CadenceError>;

use thiserror::Error;

use crate::model::ProviderId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("data key not found")]
    NotFound,

    #[error("{0}")]
    InvalidArgument(&'static str),

    #[error("data key {0:?} already exists")]
    Conflict(String),

    #[error("data key store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("provider {0} is not registered")]
    ProviderUnavailable(ProviderId),

    #[error("provider {provider} failed: {message}")]
    Crypto { provider: ProviderId, message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

/// True when `err` is SQLite rejecting a duplicate primary/unique key.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation
                && matches!(
                    e.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        }
        _ => false,
    }
}

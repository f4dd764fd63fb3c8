//! Error type for `roomsync-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] roomsync_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unread count {0} out of range")]
  UnreadOutOfRange(i64),
}

impl Error {
  /// Smuggle a decode error out of a `tokio_rusqlite` closure.
  pub(crate) fn into_db(self) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(Box::new(self))
  }

  /// Undo [`Error::into_db`], keeping genuine database errors as they are.
  pub(crate) fn from_db(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Other(inner) => match inner.downcast::<Error>() {
        Ok(own) => *own,
        Err(other) => Error::Database(tokio_rusqlite::Error::Other(other)),
      },
      e => Error::Database(e),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

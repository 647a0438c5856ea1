//! Error type for `pointage-store-sqlite`.

use pointage_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  Core(#[from] pointage_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column held a value the domain types reject.
  #[error("corrupt {column} value: {value:?}")]
  Corrupt {
    column: &'static str,
    value:  String,
  },
}

impl StoreError for Error {
  fn domain(&self) -> Option<&pointage_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

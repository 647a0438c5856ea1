//! Error types for `pointage-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid token format: {0:?}")]
  InvalidTokenFormat(String),

  #[error("invalid direction: {0:?}")]
  InvalidDirection(String),

  #[error("personal code must be exactly 4 digits, got {0:?}")]
  InvalidCodeFormat(String),

  #[error("personal code {0} is already assigned to another agent")]
  CodeAlreadyInUse(String),

  #[error("every personal code between 1000 and 9999 is already assigned")]
  CodeSpaceExhausted,

  #[error("agent not found: {0}")]
  AgentNotFound(Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! The `AgentDirectory` and `PunchLedger` traits and supporting query types.
//!
//! The traits are implemented by storage backends (e.g.
//! `pointage-store-sqlite`). Higher layers (`pointage-api`, the workflow)
//! depend on these abstractions, not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  agent::{AgentInput, AgentRecord},
  code::PersonalCode,
  punch::{AppendOutcome, Direction, NewPunch, PunchEvent, PunchKey},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Bound on backend error types.
///
/// Backends wrap domain failures (unknown agent, code already taken) in their
/// own error type; [`StoreError::domain`] hands them back so callers can tell
/// a rejected mutation from a broken store.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn domain(&self) -> Option<&crate::Error>;
}

impl StoreError for std::convert::Infallible {
  fn domain(&self) -> Option<&crate::Error> { match *self {} }
}

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`PunchLedger::list_punches`]. Every filter is an exact
/// match; unset filters match everything.
#[derive(Debug, Clone, Default)]
pub struct PunchQuery {
  pub calendar_date: Option<NaiveDate>,
  pub personal_code: Option<PersonalCode>,
  pub direction:     Option<Direction>,
  pub limit:         Option<usize>,
  pub offset:        Option<usize>,
}

// ─── Directory ───────────────────────────────────────────────────────────────

/// The agent registry.
///
/// Every mutation re-checks code uniqueness before committing; backends must
/// also enforce it in storage so concurrent administrators cannot both win.
pub trait AgentDirectory: Send + Sync {
  type Error: StoreError;

  /// Exact match on `personal_code`.
  fn find_by_code(
    &self,
    code: PersonalCode,
  ) -> impl Future<Output = Result<Option<AgentRecord>, Self::Error>> + Send + '_;

  /// Compatibility lookup by the pre-code IP identifier.
  ///
  /// Only used to label historical punches. Never consult this when
  /// deciding whether a new punch may be recorded.
  fn find_by_legacy_ip(
    &self,
    ip: String,
  ) -> impl Future<Output = Result<Option<AgentRecord>, Self::Error>> + Send + '_;

  /// `true` iff no agent other than `excluding` holds `code`.
  fn is_code_unique(
    &self,
    code: PersonalCode,
    excluding: Option<Uuid>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// A code in `1000..=9999` held by nobody at call time.
  fn generate_unique_code(
    &self,
  ) -> impl Future<Output = Result<PersonalCode, Self::Error>> + Send + '_;

  fn add_agent(
    &self,
    input: AgentInput,
  ) -> impl Future<Output = Result<AgentRecord, Self::Error>> + Send + '_;

  /// Replace the editable fields of agent `id`.
  fn update_agent(
    &self,
    id: Uuid,
    input: AgentInput,
  ) -> impl Future<Output = Result<AgentRecord, Self::Error>> + Send + '_;

  fn remove_agent(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_agent(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<AgentRecord>, Self::Error>> + Send + '_;

  /// All agents, ordered by display name.
  fn list_agents(
    &self,
  ) -> impl Future<Output = Result<Vec<AgentRecord>, Self::Error>> + Send + '_;
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// The append-only punch store.
pub trait PunchLedger: Send + Sync {
  type Error: StoreError;

  /// The punch holding `key`, if any. An existence query: ordering plays no
  /// part.
  fn has_punch(
    &self,
    key: PunchKey,
  ) -> impl Future<Output = Result<Option<PunchEvent>, Self::Error>> + Send + '_;

  /// Append a punch, assigning its id and `captured_at`.
  ///
  /// The existence check and the insert are one unit inside the backend: if
  /// another punch with the same key is already stored, nothing is written
  /// and that punch comes back as [`AppendOutcome::Duplicate`].
  fn append(
    &self,
    punch: NewPunch,
  ) -> impl Future<Output = Result<AppendOutcome, Self::Error>> + Send + '_;

  /// Punches matching `query`, most recent `captured_at` first.
  fn list_punches(
    &self,
    query: PunchQuery,
  ) -> impl Future<Output = Result<Vec<PunchEvent>, Self::Error>> + Send + '_;
}

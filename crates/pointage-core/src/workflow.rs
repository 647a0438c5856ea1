//! The punch state machine.
//!
//! ```text
//! AwaitingCode ─▶ Verifying ─▶ CheckingDuplicate ─┬─▶ AlreadyPunched
//!      ▲              │               │           └─▶ CapturingContext ─▶ Recording ─▶ Recorded
//!      └── rejected ──┘               └─▶ Failed
//! ```
//!
//! An attempt starts in [`PunchState::AwaitingCode`]. A malformed or unknown
//! code sends it back there with the rejection attached, so the agent can
//! type again. Every other outcome is terminal: a fresh attempt is needed to
//! try again.
//!
//! The duplicate check here is advisory and lets the common case answer
//! early. The authoritative check is the one [`PunchLedger::append`] performs
//! atomically with the insert, so two attempts racing on the same key still
//! produce exactly one `Recorded` and one `AlreadyPunched`.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use thiserror::Error;

use crate::{
  code::PersonalCode,
  context::{self, Geocoder, LocationSource},
  punch::{AppendOutcome, Direction, NewPunch, PunchEvent, PunchKey},
  store::{AgentDirectory, PunchLedger},
  token,
};

/// How long to wait for a position before punching without one.
pub const DEFAULT_GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(10);

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// What the scanned QR URL and the request carried.
#[derive(Debug, Clone)]
pub struct ScanContext {
  /// Raw token from the QR code, e.g. `QR-2024-06-01`.
  pub token:     String,
  /// Raw direction parameter, `entree` or `sortie`.
  pub direction: String,
  pub source_ip: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkflowConfig {
  pub geolocation_timeout: Duration,
}

impl Default for WorkflowConfig {
  fn default() -> Self {
    Self { geolocation_timeout: DEFAULT_GEOLOCATION_TIMEOUT }
  }
}

// ─── States ──────────────────────────────────────────────────────────────────

/// Why an attempt did not record a punch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PunchFailure {
  #[error("the personal code must be exactly 4 digits")]
  InvalidCodeFormat,

  #[error("this personal code is not recognised")]
  CodeNotRecognized,

  #[error("the scanned QR code is not valid")]
  InvalidTokenFormat,

  #[error("the scanned QR code has an invalid direction")]
  InvalidDirection,

  /// Backend detail goes to the log only.
  #[error("the punch could not be saved, please try again")]
  PersistenceError,
}

impl PunchFailure {
  /// Code errors are corrected by retyping; everything else needs a new
  /// attempt.
  pub fn is_code_rejection(&self) -> bool {
    matches!(self, Self::InvalidCodeFormat | Self::CodeNotRecognized)
  }

  fn persistence(err: &dyn std::error::Error) -> Self {
    tracing::warn!(error = %err, "punch store call failed");
    Self::PersistenceError
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PunchState {
  AwaitingCode {
    rejected: Option<PunchFailure>,
  },
  Verifying {
    code: PersonalCode,
  },
  CheckingDuplicate {
    code:       PersonalCode,
    agent_name: String,
  },
  CapturingContext {
    key:        PunchKey,
    agent_name: String,
  },
  Recording {
    key: PunchKey,
  },
  AlreadyPunched {
    existing: PunchEvent,
  },
  Recorded {
    punch: PunchEvent,
  },
  Failed {
    failure: PunchFailure,
  },
}

impl PunchState {
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      Self::AlreadyPunched { .. } | Self::Recorded { .. } | Self::Failed { .. }
    )
  }

  pub fn name(&self) -> &'static str {
    match self {
      Self::AwaitingCode { .. } => "awaiting_code",
      Self::Verifying { .. } => "verifying",
      Self::CheckingDuplicate { .. } => "checking_duplicate",
      Self::CapturingContext { .. } => "capturing_context",
      Self::Recording { .. } => "recording",
      Self::AlreadyPunched { .. } => "already_punched",
      Self::Recorded { .. } => "recorded",
      Self::Failed { .. } => "failed",
    }
  }

  fn failed(failure: PunchFailure) -> Self { Self::Failed { failure } }

  fn rejected(failure: PunchFailure) -> Self {
    Self::AwaitingCode { rejected: Some(failure) }
  }
}

// ─── Workflow ────────────────────────────────────────────────────────────────

/// Shared, cheaply cloned handle to the collaborators a punch needs.
///
/// Holds no cache: every attempt reads the directory and ledger afresh.
pub struct PunchWorkflow<D, L, G> {
  directory: Arc<D>,
  ledger:    Arc<L>,
  geocoder:  Arc<G>,
  config:    WorkflowConfig,
}

impl<D, L, G> Clone for PunchWorkflow<D, L, G> {
  fn clone(&self) -> Self {
    Self {
      directory: Arc::clone(&self.directory),
      ledger:    Arc::clone(&self.ledger),
      geocoder:  Arc::clone(&self.geocoder),
      config:    self.config,
    }
  }
}

impl<D, L, G> PunchWorkflow<D, L, G>
where
  D: AgentDirectory,
  L: PunchLedger,
  G: Geocoder,
{
  pub fn new(directory: Arc<D>, ledger: Arc<L>, geocoder: Arc<G>) -> Self {
    Self { directory, ledger, geocoder, config: WorkflowConfig::default() }
  }

  pub fn with_config(mut self, config: WorkflowConfig) -> Self {
    self.config = config;
    self
  }

  pub fn config(&self) -> &WorkflowConfig { &self.config }

  /// Start an attempt for a scanned QR code.
  pub fn begin(&self, scan: ScanContext) -> PunchAttempt<'_, D, L, G> {
    PunchAttempt {
      workflow: self,
      scan,
      state: PunchState::AwaitingCode { rejected: None },
    }
  }

  /// Run a whole attempt with a single code submission and return where it
  /// stopped.
  pub async fn punch<S>(
    &self,
    scan: ScanContext,
    code: &str,
    location: &S,
  ) -> PunchState
  where
    S: LocationSource,
  {
    let mut attempt = self.begin(scan);
    attempt.submit_code(code, location).await;
    attempt.into_state()
  }
}

// ─── Attempt ─────────────────────────────────────────────────────────────────

/// One agent's attempt to punch for one scanned token.
pub struct PunchAttempt<'w, D, L, G> {
  workflow: &'w PunchWorkflow<D, L, G>,
  scan:     ScanContext,
  state:    PunchState,
}

impl<D, L, G> PunchAttempt<'_, D, L, G>
where
  D: AgentDirectory,
  L: PunchLedger,
  G: Geocoder,
{
  pub fn state(&self) -> &PunchState { &self.state }

  pub fn into_state(self) -> PunchState { self.state }

  /// Feed a typed code into the attempt.
  ///
  /// Ignored unless the attempt is awaiting a code. Returns the state the
  /// attempt settled in: `AwaitingCode` with a rejection, or a terminal one.
  pub async fn submit_code<S>(&mut self, input: &str, location: &S) -> &PunchState
  where
    S: LocationSource,
  {
    if !matches!(self.state, PunchState::AwaitingCode { .. }) {
      return &self.state;
    }
    let next = self.run(input, location).await;
    self.enter(next);
    &self.state
  }

  async fn run<S>(&mut self, input: &str, location: &S) -> PunchState
  where
    S: LocationSource,
  {
    let workflow = self.workflow;

    // Format is checked before the directory is touched.
    let Ok(code) = PersonalCode::parse(input) else {
      return PunchState::rejected(PunchFailure::InvalidCodeFormat);
    };

    self.enter(PunchState::Verifying { code: code.clone() });
    let agent = match workflow.directory.find_by_code(code.clone()).await {
      Ok(Some(agent)) => agent,
      Ok(None) => return PunchState::rejected(PunchFailure::CodeNotRecognized),
      Err(e) => return PunchState::failed(PunchFailure::persistence(&e)),
    };

    self.enter(PunchState::CheckingDuplicate {
      code:       code.clone(),
      agent_name: agent.display_name.clone(),
    });
    let Ok(calendar_date) = token::decode(&self.scan.token) else {
      return PunchState::failed(PunchFailure::InvalidTokenFormat);
    };
    let Ok(direction) = Direction::parse(&self.scan.direction) else {
      return PunchState::failed(PunchFailure::InvalidDirection);
    };
    let key = PunchKey { personal_code: code, calendar_date, direction };

    match workflow.ledger.has_punch(key.clone()).await {
      Ok(Some(existing)) => return PunchState::AlreadyPunched { existing },
      Ok(None) => {}
      Err(e) => return PunchState::failed(PunchFailure::persistence(&e)),
    }

    self.enter(PunchState::CapturingContext {
      key:        key.clone(),
      agent_name: agent.display_name.clone(),
    });
    let context = context::capture(
      location,
      workflow.geocoder.as_ref(),
      workflow.config.geolocation_timeout,
    )
    .await;

    self.enter(PunchState::Recording { key: key.clone() });
    let punch = NewPunch {
      personal_code:    key.personal_code,
      agent_name:       agent.display_name,
      direction:        key.direction,
      calendar_date:    key.calendar_date,
      location:         context.location,
      resolved_address: context.address_or_sentinel(),
      source_ip:        self.scan.source_ip.clone(),
      source_token:     self.scan.token.clone(),
    };

    match workflow.ledger.append(punch).await {
      Ok(AppendOutcome::Appended(punch)) => {
        tracing::info!(
          punch_id = %punch.punch_id,
          code = %punch.personal_code,
          date = %punch.calendar_date,
          direction = %punch.direction,
          "punch recorded"
        );
        PunchState::Recorded { punch }
      }
      Ok(AppendOutcome::Duplicate(existing)) => {
        tracing::info!(
          punch_id = %existing.punch_id,
          "concurrent punch for the same key already stored"
        );
        PunchState::AlreadyPunched { existing }
      }
      Err(e) => PunchState::failed(PunchFailure::persistence(&e)),
    }
  }

  fn enter(&mut self, next: PunchState) {
    tracing::debug!(from = self.state.name(), to = next.name(), "punch transition");
    self.state = next;
  }
}

//! Punch events: the append-only record of entries and exits.
//!
//! A punch is written once and never updated or deleted. For a given
//! [`PunchKey`] (code, day, direction) at most one punch may exist; storage
//! backends enforce that at write time.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, code::PersonalCode};

/// Stored in place of an address when reverse geocoding produced nothing.
pub const ADDRESS_UNAVAILABLE: &str = "Adresse non disponible";

/// Stored in place of an agent name when none could be resolved.
pub const UNKNOWN_AGENT: &str = "Agent inconnu";

// ─── Direction ───────────────────────────────────────────────────────────────

/// Whether the agent is arriving or leaving. The wire names are the French
/// `entree`/`sortie` printed into the QR URLs; `entry`/`exit` are accepted
/// on input too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
  #[serde(rename = "entree", alias = "entry")]
  Entry,
  #[serde(rename = "sortie", alias = "exit")]
  Exit,
}

impl Direction {
  pub fn parse(raw: &str) -> Result<Self> {
    match raw {
      "entree" | "entry" => Ok(Self::Entry),
      "sortie" | "exit" => Ok(Self::Exit),
      other => Err(Error::InvalidDirection(other.to_owned())),
    }
  }

  /// The value stored in the database and sent on the wire.
  pub fn as_wire(self) -> &'static str {
    match self {
      Self::Entry => "entree",
      Self::Exit => "sortie",
    }
  }

  /// Human-readable label used in exports.
  pub fn label(self) -> &'static str {
    match self {
      Self::Entry => "Entrée",
      Self::Exit => "Sortie",
    }
  }
}

impl fmt::Display for Direction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_wire())
  }
}

impl FromStr for Direction {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

// ─── Location ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub latitude:  f64,
  pub longitude: f64,
}

impl Coordinates {
  /// `None` unless both values are finite and within WGS84 bounds.
  pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
    let valid = latitude.is_finite()
      && longitude.is_finite()
      && (-90.0..=90.0).contains(&latitude)
      && (-180.0..=180.0).contains(&longitude);
    valid.then_some(Self { latitude, longitude })
  }
}

impl fmt::Display for Coordinates {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
  }
}

// ─── Key ─────────────────────────────────────────────────────────────────────

/// The triple on which punches are unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PunchKey {
  pub personal_code: PersonalCode,
  pub calendar_date: NaiveDate,
  pub direction:     Direction,
}

// ─── PunchEvent ──────────────────────────────────────────────────────────────

/// A recorded punch. Once written, no field is ever updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PunchEvent {
  pub punch_id:         Uuid,
  /// Copy of the code presented at punch time, not a live reference.
  pub personal_code:    PersonalCode,
  /// Agent display name at punch time.
  pub agent_name:       String,
  pub direction:        Direction,
  /// The day encoded in the scanned token, not the wall-clock day.
  pub calendar_date:    NaiveDate,
  /// Server-assigned timestamp.
  pub captured_at:      DateTime<Utc>,
  pub location:         Option<Coordinates>,
  pub resolved_address: String,
  /// Informational only; never used to identify an agent on a new punch.
  pub source_ip:        Option<String>,
  /// The raw scanned token, kept for audit.
  pub source_token:     String,
}

impl PunchEvent {
  pub fn key(&self) -> PunchKey {
    PunchKey {
      personal_code: self.personal_code.clone(),
      calendar_date: self.calendar_date,
      direction:     self.direction,
    }
  }
}

// ─── NewPunch ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::PunchLedger::append`].
/// `punch_id` and `captured_at` are always set by the ledger.
#[derive(Debug, Clone)]
pub struct NewPunch {
  pub personal_code:    PersonalCode,
  pub agent_name:       String,
  pub direction:        Direction,
  pub calendar_date:    NaiveDate,
  pub location:         Option<Coordinates>,
  pub resolved_address: String,
  pub source_ip:        Option<String>,
  pub source_token:     String,
}

impl NewPunch {
  pub fn key(&self) -> PunchKey {
    PunchKey {
      personal_code: self.personal_code.clone(),
      calendar_date: self.calendar_date,
      direction:     self.direction,
    }
  }
}

/// Result of an append: either the new punch, or the one that already held
/// the same key when the write reached the store.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
  Appended(PunchEvent),
  Duplicate(PunchEvent),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn direction_accepts_wire_and_english_names() {
    assert_eq!(Direction::parse("entree").unwrap(), Direction::Entry);
    assert_eq!(Direction::parse("entry").unwrap(), Direction::Entry);
    assert_eq!(Direction::parse("sortie").unwrap(), Direction::Exit);
    assert_eq!(Direction::parse("exit").unwrap(), Direction::Exit);
    assert!(matches!(
      Direction::parse("Entree"),
      Err(Error::InvalidDirection(_))
    ));
    assert!(matches!(Direction::parse(""), Err(Error::InvalidDirection(_))));
  }

  #[test]
  fn direction_serialises_to_wire_name() {
    assert_eq!(serde_json::to_string(&Direction::Exit).unwrap(), "\"sortie\"");
    let d: Direction = serde_json::from_str("\"entry\"").unwrap();
    assert_eq!(d, Direction::Entry);
  }

  #[test]
  fn coordinates_reject_out_of_range_values() {
    assert!(Coordinates::new(48.89, 2.45).is_some());
    assert!(Coordinates::new(91.0, 0.0).is_none());
    assert!(Coordinates::new(0.0, -180.5).is_none());
    assert!(Coordinates::new(f64::NAN, 0.0).is_none());
  }

  #[test]
  fn coordinates_display_with_six_decimals() {
    let at = Coordinates::new(48.8566, 2.3522).unwrap();
    assert_eq!(at.to_string(), "48.856600, 2.352200");
  }
}

//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical order matches chronological order. Calendar dates are
//! `YYYY-MM-DD`. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound as _, Utc};
use pointage_core::{
  agent::AgentRecord,
  code::PersonalCode,
  punch::{Coordinates, Direction, PunchEvent},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current time at the precision [`encode_dt`] keeps.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Direction / PersonalCode ────────────────────────────────────────────────

pub fn encode_direction(d: Direction) -> &'static str { d.as_wire() }

pub fn decode_direction(s: &str) -> Result<Direction> {
  Direction::parse(s).map_err(|_| Error::Corrupt {
    column: "direction",
    value:  s.to_owned(),
  })
}

pub fn decode_code(s: &str) -> Result<PersonalCode> {
  PersonalCode::parse(s).map_err(|_| Error::Corrupt {
    column: "personal_code",
    value:  s.to_owned(),
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const AGENT_COLUMNS: &str =
  "agent_id, personal_code, display_name, ip_hint, created_at";

/// Raw strings read directly from an `agents` row.
pub struct RawAgent {
  pub agent_id:      String,
  pub personal_code: String,
  pub display_name:  String,
  pub ip_hint:       Option<String>,
  pub created_at:    String,
}

impl RawAgent {
  /// Read a row selected with [`AGENT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      agent_id:      row.get(0)?,
      personal_code: row.get(1)?,
      display_name:  row.get(2)?,
      ip_hint:       row.get(3)?,
      created_at:    row.get(4)?,
    })
  }

  pub fn into_agent(self) -> Result<AgentRecord> {
    Ok(AgentRecord {
      agent_id:      decode_uuid(&self.agent_id)?,
      personal_code: decode_code(&self.personal_code)?,
      display_name:  self.display_name,
      ip_hint:       self.ip_hint,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub const PUNCH_COLUMNS: &str = "punch_id, personal_code, agent_name, direction, \
   calendar_date, captured_at, latitude, longitude, resolved_address, \
   source_ip, source_token";

/// Raw values read directly from a `punches` row.
pub struct RawPunch {
  pub punch_id:         String,
  pub personal_code:    String,
  pub agent_name:       String,
  pub direction:        String,
  pub calendar_date:    String,
  pub captured_at:      String,
  pub latitude:         Option<f64>,
  pub longitude:        Option<f64>,
  pub resolved_address: String,
  pub source_ip:        Option<String>,
  pub source_token:     String,
}

impl RawPunch {
  /// Read a row selected with [`PUNCH_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      punch_id:         row.get(0)?,
      personal_code:    row.get(1)?,
      agent_name:       row.get(2)?,
      direction:        row.get(3)?,
      calendar_date:    row.get(4)?,
      captured_at:      row.get(5)?,
      latitude:         row.get(6)?,
      longitude:        row.get(7)?,
      resolved_address: row.get(8)?,
      source_ip:        row.get(9)?,
      source_token:     row.get(10)?,
    })
  }

  pub fn into_punch(self) -> Result<PunchEvent> {
    let location = match (self.latitude, self.longitude) {
      (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon).ok_or_else(
        || Error::Corrupt {
          column: "latitude/longitude",
          value:  format!("{lat}, {lon}"),
        },
      )?),
      _ => None,
    };

    Ok(PunchEvent {
      punch_id: decode_uuid(&self.punch_id)?,
      personal_code: decode_code(&self.personal_code)?,
      agent_name: self.agent_name,
      direction: decode_direction(&self.direction)?,
      calendar_date: decode_date(&self.calendar_date)?,
      captured_at: decode_dt(&self.captured_at)?,
      location,
      resolved_address: self.resolved_address,
      source_ip: self.source_ip,
      source_token: self.source_token,
    })
  }
}

//! [`SqliteStore`]: the SQLite implementation of [`AgentDirectory`] and
//! [`PunchLedger`].

use std::{collections::HashSet, path::Path};

use rand_core::OsRng;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use pointage_core::{
  agent::{AgentInput, AgentRecord},
  code::{self, PersonalCode},
  punch::{AppendOutcome, NewPunch, PunchEvent, PunchKey},
  store::{AgentDirectory, PunchLedger, PunchQuery},
};

use crate::{
  encode::{
    AGENT_COLUMNS, PUNCH_COLUMNS, RawAgent, RawPunch, decode_code, encode_date,
    encode_direction, encode_dt, encode_uuid, now,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// The agent directory and punch ledger, backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// What happened to an agent update inside the database thread.
enum AgentWrite {
  Written,
  CodeTaken,
  Missing,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch at most one agent matching `condition`, which must reference a
  /// single `?1` parameter.
  async fn query_agent(
    &self,
    condition: &'static str,
    value: String,
  ) -> Result<Option<AgentRecord>> {
    let raw: Option<RawAgent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {AGENT_COLUMNS} FROM agents WHERE {condition}
                 ORDER BY created_at LIMIT 1"
              ),
              rusqlite::params![value],
              RawAgent::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAgent::into_agent).transpose()
  }
}

/// Whether any agent other than `excluding` holds `code`.
fn code_taken(
  conn: &rusqlite::Connection,
  code: &str,
  excluding: Option<&str>,
) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS (
       SELECT 1 FROM agents
       WHERE personal_code = ?1 AND (?2 IS NULL OR agent_id != ?2)
     )",
    rusqlite::params![code, excluding],
    |row| row.get(0),
  )
}

// ─── AgentDirectory impl ─────────────────────────────────────────────────────

impl AgentDirectory for SqliteStore {
  type Error = Error;

  async fn find_by_code(&self, code: PersonalCode) -> Result<Option<AgentRecord>> {
    self.query_agent("personal_code = ?1", code.into()).await
  }

  async fn find_by_legacy_ip(&self, ip: String) -> Result<Option<AgentRecord>> {
    self.query_agent("ip_hint = ?1", ip).await
  }

  async fn is_code_unique(
    &self,
    code: PersonalCode,
    excluding: Option<Uuid>,
  ) -> Result<bool> {
    let code_str = String::from(code);
    let excluding_str = excluding.map(encode_uuid);

    let taken = self
      .conn
      .call(move |conn| Ok(code_taken(conn, &code_str, excluding_str.as_deref())?))
      .await?;

    Ok(!taken)
  }

  async fn generate_unique_code(&self) -> Result<PersonalCode> {
    let raws: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT personal_code FROM agents")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let taken = raws
      .iter()
      .map(|s| decode_code(s))
      .collect::<Result<HashSet<_>>>()?;

    Ok(code::generate_unique(&taken, &mut OsRng)?)
  }

  async fn add_agent(&self, input: AgentInput) -> Result<AgentRecord> {
    let agent = AgentRecord {
      agent_id:      Uuid::new_v4(),
      personal_code: input.personal_code,
      display_name:  input.display_name,
      ip_hint:       input.ip_hint,
      created_at:    now(),
    };

    let id_str   = encode_uuid(agent.agent_id);
    let code_str = agent.personal_code.to_string();
    let name     = agent.display_name.clone();
    let ip_hint  = agent.ip_hint.clone();
    let at_str   = encode_dt(agent.created_at);

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if code_taken(&tx, &code_str, None)? {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO agents (agent_id, personal_code, display_name, ip_hint, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, code_str, name, ip_hint, at_str],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(
        pointage_core::Error::CodeAlreadyInUse(agent.personal_code.to_string())
          .into(),
      );
    }

    tracing::info!(agent_id = %agent.agent_id, code = %agent.personal_code, "agent added");
    Ok(agent)
  }

  async fn update_agent(&self, id: Uuid, input: AgentInput) -> Result<AgentRecord> {
    let id_str   = encode_uuid(id);
    let code_str = input.personal_code.to_string();
    let name     = input.display_name;
    let ip_hint  = input.ip_hint;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM agents WHERE agent_id = ?1",
            rusqlite::params![id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(AgentWrite::Missing);
        }
        if code_taken(&tx, &code_str, Some(&id_str))? {
          return Ok(AgentWrite::CodeTaken);
        }
        tx.execute(
          "UPDATE agents SET personal_code = ?2, display_name = ?3, ip_hint = ?4
           WHERE agent_id = ?1",
          rusqlite::params![id_str, code_str, name, ip_hint],
        )?;
        tx.commit()?;
        Ok(AgentWrite::Written)
      })
      .await?;

    match outcome {
      AgentWrite::Written => {}
      AgentWrite::Missing => return Err(pointage_core::Error::AgentNotFound(id).into()),
      AgentWrite::CodeTaken => {
        return Err(
          pointage_core::Error::CodeAlreadyInUse(input.personal_code.to_string())
            .into(),
        );
      }
    }

    tracing::info!(agent_id = %id, "agent updated");
    self
      .get_agent(id)
      .await?
      .ok_or(Error::Core(pointage_core::Error::AgentNotFound(id)))
  }

  async fn remove_agent(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM agents WHERE agent_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    if removed == 0 {
      return Err(pointage_core::Error::AgentNotFound(id).into());
    }
    tracing::info!(agent_id = %id, "agent removed");
    Ok(())
  }

  async fn get_agent(&self, id: Uuid) -> Result<Option<AgentRecord>> {
    self.query_agent("agent_id = ?1", encode_uuid(id)).await
  }

  async fn list_agents(&self) -> Result<Vec<AgentRecord>> {
    let raws: Vec<RawAgent> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {AGENT_COLUMNS} FROM agents
           ORDER BY display_name COLLATE NOCASE, created_at"
        ))?;
        let rows = stmt
          .query_map([], RawAgent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAgent::into_agent).collect()
  }
}

// ─── PunchLedger impl ────────────────────────────────────────────────────────

impl PunchLedger for SqliteStore {
  type Error = Error;

  async fn has_punch(&self, key: PunchKey) -> Result<Option<PunchEvent>> {
    let code_str  = String::from(key.personal_code);
    let date_str  = encode_date(key.calendar_date);
    let direction = encode_direction(key.direction);

    let raw: Option<RawPunch> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {PUNCH_COLUMNS} FROM punches
                 WHERE personal_code = ?1 AND calendar_date = ?2 AND direction = ?3"
              ),
              rusqlite::params![code_str, date_str, direction],
              RawPunch::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPunch::into_punch).transpose()
  }

  async fn append(&self, punch: NewPunch) -> Result<AppendOutcome> {
    let event = PunchEvent {
      punch_id:         Uuid::new_v4(),
      personal_code:    punch.personal_code,
      agent_name:       punch.agent_name,
      direction:        punch.direction,
      calendar_date:    punch.calendar_date,
      captured_at:      now(),
      location:         punch.location,
      resolved_address: punch.resolved_address,
      source_ip:        punch.source_ip,
      source_token:     punch.source_token,
    };

    let id_str    = encode_uuid(event.punch_id);
    let code_str  = event.personal_code.to_string();
    let name      = event.agent_name.clone();
    let direction = encode_direction(event.direction);
    let date_str  = encode_date(event.calendar_date);
    let at_str    = encode_dt(event.captured_at);
    let latitude  = event.location.map(|c| c.latitude);
    let longitude = event.location.map(|c| c.longitude);
    let address   = event.resolved_address.clone();
    let source_ip = event.source_ip.clone();
    let token     = event.source_token.clone();

    // Insert-or-fetch under one write transaction: the UNIQUE constraint on
    // (personal_code, calendar_date, direction) decides who wins.
    let existing: Option<RawPunch> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
          "INSERT INTO punches (
             punch_id, personal_code, agent_name, direction, calendar_date,
             captured_at, latitude, longitude, resolved_address,
             source_ip, source_token
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
           ON CONFLICT (personal_code, calendar_date, direction) DO NOTHING",
          rusqlite::params![
            id_str,
            code_str,
            name,
            direction,
            date_str,
            at_str,
            latitude,
            longitude,
            address,
            source_ip,
            token,
          ],
        )?;

        let existing = if inserted == 0 {
          Some(tx.query_row(
            &format!(
              "SELECT {PUNCH_COLUMNS} FROM punches
               WHERE personal_code = ?1 AND calendar_date = ?2 AND direction = ?3"
            ),
            rusqlite::params![code_str, date_str, direction],
            RawPunch::from_row,
          )?)
        } else {
          None
        };

        tx.commit()?;
        Ok(existing)
      })
      .await?;

    match existing {
      None => Ok(AppendOutcome::Appended(event)),
      Some(raw) => {
        let existing = raw.into_punch()?;
        tracing::debug!(
          punch_id = %existing.punch_id,
          "append rejected by uniqueness constraint"
        );
        Ok(AppendOutcome::Duplicate(existing))
      }
    }
  }

  async fn list_punches(&self, query: PunchQuery) -> Result<Vec<PunchEvent>> {
    let date_str   = query.calendar_date.map(encode_date);
    let code_str   = query.personal_code.map(String::from);
    let direction  = query.direction.map(encode_direction);
    let limit_val  = query.limit.map_or(-1, |l| l as i64);
    let offset_val = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawPunch> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PUNCH_COLUMNS} FROM punches
           WHERE (?1 IS NULL OR calendar_date = ?1)
             AND (?2 IS NULL OR personal_code = ?2)
             AND (?3 IS NULL OR direction     = ?3)
           ORDER BY captured_at DESC, punch_id DESC
           LIMIT ?4 OFFSET ?5"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![date_str, code_str, direction, limit_val, offset_val],
            RawPunch::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPunch::into_punch).collect()
  }
}

//! Agents: the people allowed to punch, keyed by their personal code.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  code::PersonalCode,
  punch::{PunchEvent, UNKNOWN_AGENT},
};

/// An entry in the agent directory. No two agents share a `personal_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
  pub agent_id:      Uuid,
  pub personal_code: PersonalCode,
  pub display_name:  String,
  /// Identifier from before personal codes existed, when agents were told
  /// apart by device IP. Only used to label old punches.
  pub ip_hint:       Option<String>,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::AgentDirectory::add_agent`] and
/// [`crate::store::AgentDirectory::update_agent`]. An update replaces every
/// editable field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInput {
  pub personal_code: PersonalCode,
  pub display_name:  String,
  #[serde(default)]
  pub ip_hint:       Option<String>,
}

/// An in-memory snapshot of the directory used to label punch listings.
///
/// Display only: the punch workflow always asks the directory itself.
#[derive(Debug, Default)]
pub struct AgentIndex {
  by_code: HashMap<PersonalCode, String>,
  by_ip:   HashMap<String, String>,
}

impl AgentIndex {
  pub fn new(agents: &[AgentRecord]) -> Self {
    let mut index = Self::default();
    for agent in agents {
      index
        .by_code
        .insert(agent.personal_code.clone(), agent.display_name.clone());
      if let Some(ip) = &agent.ip_hint {
        index.by_ip.insert(ip.clone(), agent.display_name.clone());
      }
    }
    index
  }

  /// The name to show for `punch`.
  ///
  /// Prefers the name captured when the punch was written. Older punches
  /// recorded without one fall back to the current holder of the code, then
  /// to the agent whose legacy IP matches, then to the IP itself.
  pub fn display_name(&self, punch: &PunchEvent) -> String {
    if !punch.agent_name.is_empty() && punch.agent_name != UNKNOWN_AGENT {
      return punch.agent_name.clone();
    }
    if let Some(name) = self.by_code.get(&punch.personal_code) {
      return name.clone();
    }
    match &punch.source_ip {
      Some(ip) => self.by_ip.get(ip).cloned().unwrap_or_else(|| ip.clone()),
      None => UNKNOWN_AGENT.to_owned(),
    }
  }
}

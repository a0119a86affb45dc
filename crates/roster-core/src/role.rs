//! Roles: a person's membership in a group, with a type the group permits.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Errors, group::GroupTypeRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleStatus {
  Active,
  Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
  pub role_id:    Uuid,
  pub person_id:  Uuid,
  pub group_id:   Uuid,
  /// Name of a role type permitted by the group's type.
  pub role_type:  String,
  /// Free-text addition shown after the type label.
  pub label:      Option<String>,
  pub start_on:   Option<NaiveDate>,
  pub end_on:     Option<NaiveDate>,
  pub created_at: DateTime<Utc>,
}

impl Role {
  /// Active iff there is no end date or it is today or later.
  pub fn is_active(&self, today: NaiveDate) -> bool {
    self.end_on.is_none_or(|end| end >= today)
  }

  pub fn status(&self, today: NaiveDate) -> RoleStatus {
    if self.is_active(today) {
      RoleStatus::Active
    } else {
      RoleStatus::Ended
    }
  }

  /// Type label, followed by ` (label)` when a label is set.
  pub fn display(&self, registry: &GroupTypeRegistry, group_type: &str) -> String {
    let type_label = registry.role_label(group_type, &self.role_type);
    match self.label.as_deref().filter(|l| !l.is_empty()) {
      Some(label) => format!("{type_label} ({label})"),
      None => type_label.to_owned(),
    }
  }

  /// Check the role against the rules of the group type it is placed in.
  pub fn validate(&self, registry: &GroupTypeRegistry, group_type: &str) -> Errors {
    let mut errors = Errors::new();
    if registry.find_role_type(group_type, &self.role_type).is_none() {
      errors.add("type", "is not permitted in this group");
    }
    if let (Some(start), Some(end)) = (self.start_on, self.end_on)
      && end < start
    {
      errors.add("end_on", "must not be before start_on");
    }
    errors
  }
}

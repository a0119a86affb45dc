//! The explicit authorisation context passed into every mutating operation.
//!
//! An [`Ability`] is a plain value: which capabilities an actor holds and in
//! which groups. Policy evaluation beyond this (layer hierarchies, per-role
//! permissions) happens upstream when the ability is built.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Something an actor may do inside a group.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
  /// See people and their records.
  Show,
  CreateRole,
  UpdateRole,
  /// Remove roles, which includes setting their end date.
  DestroyRole,
  ManagePeople,
  ManageGroups,
  Finance,
}

/// Capabilities held by one actor, optionally restricted to a set of groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ability {
  /// The acting person, if the actor is a person at all.
  pub actor:        Option<Uuid>,
  pub capabilities: HashSet<Capability>,
  /// Groups the capabilities apply to. `None` means every group.
  pub groups:       Option<HashSet<Uuid>>,
}

impl Ability {
  /// An ability that may do everything everywhere.
  pub fn root() -> Self {
    Self {
      actor:        None,
      capabilities: [
        Capability::Show,
        Capability::CreateRole,
        Capability::UpdateRole,
        Capability::DestroyRole,
        Capability::ManagePeople,
        Capability::ManageGroups,
        Capability::Finance,
      ]
      .into_iter()
      .collect(),
      groups:       None,
    }
  }

  pub fn new(capabilities: impl IntoIterator<Item = Capability>) -> Self {
    Self {
      actor:        None,
      capabilities: capabilities.into_iter().collect(),
      groups:       None,
    }
  }

  pub fn in_groups(mut self, groups: impl IntoIterator<Item = Uuid>) -> Self {
    self.groups = Some(groups.into_iter().collect());
    self
  }

  pub fn acting_as(mut self, person_id: Uuid) -> Self {
    self.actor = Some(person_id);
    self
  }

  pub fn can(&self, capability: Capability, group_id: Uuid) -> bool {
    self.capabilities.contains(&capability)
      && self.groups.as_ref().is_none_or(|gs| gs.contains(&group_id))
  }

  /// Like [`Ability::can`], but as an error suitable for `?`.
  pub fn authorize(&self, capability: Capability, group_id: Uuid) -> Result<()> {
    if self.can(capability, group_id) {
      Ok(())
    } else {
      Err(Error::Unauthorized { capability, group_id })
    }
  }

  /// Require `capability` without any group restriction, for operations
  /// that are not scoped to a single group.
  pub fn authorize_anywhere(&self, capability: Capability) -> Result<()> {
    if self.capabilities.contains(&capability) && self.groups.is_none() {
      Ok(())
    } else {
      Err(Error::Unauthorized { capability, group_id: Uuid::nil() })
    }
  }

  /// Whether a person holding roles in `group_ids` is visible to this actor.
  /// People can always see themselves.
  pub fn can_show_person(
    &self,
    person_id: Uuid,
    group_ids: impl IntoIterator<Item = Uuid>,
  ) -> bool {
    if self.actor == Some(person_id) {
      return true;
    }
    group_ids
      .into_iter()
      .any(|g| self.can(Capability::Show, g))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn group_restriction_applies() {
    let allowed = Uuid::new_v4();
    let other = Uuid::new_v4();
    let ability = Ability::new([Capability::CreateRole]).in_groups([allowed]);

    assert!(ability.can(Capability::CreateRole, allowed));
    assert!(!ability.can(Capability::CreateRole, other));
    assert!(!ability.can(Capability::DestroyRole, allowed));
    assert!(matches!(
      ability.authorize(Capability::CreateRole, other),
      Err(Error::Unauthorized { group_id, .. }) if group_id == other
    ));
  }

  #[test]
  fn unscoped_operations_need_unrestricted_abilities() {
    let scoped = Ability::new([Capability::ManageGroups]).in_groups([Uuid::new_v4()]);
    assert!(scoped.authorize_anywhere(Capability::ManageGroups).is_err());
    assert!(Ability::root().authorize_anywhere(Capability::ManageGroups).is_ok());
  }

  #[test]
  fn people_see_themselves() {
    let me = Uuid::new_v4();
    let ability = Ability::new([]).acting_as(me);
    assert!(ability.can_show_person(me, []));
    assert!(!ability.can_show_person(Uuid::new_v4(), [Uuid::new_v4()]));
  }

  #[test]
  fn capability_string_form() {
    assert_eq!(Capability::DestroyRole.to_string(), "destroy_role");
    assert_eq!("finance".parse::<Capability>().ok(), Some(Capability::Finance));
  }
}

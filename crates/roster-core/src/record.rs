//! The person read model consumed by displays and exports.

use serde::{Deserialize, Serialize};

use crate::{
  contact::ContactAccounts,
  group::{GroupTypeRegistry, with_layer},
  person::Person,
  qualification::QualificationWithKind,
  role::Role,
};

/// A role together with the names needed to place it in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInGroup {
  pub role:       Role,
  pub group_name: String,
  pub group_type: String,
  /// Name of the group's layer; `None` when the group is itself a layer.
  pub layer_name: Option<String>,
}

impl RoleInGroup {
  /// `Layer / Group`, or just the group name for layers.
  pub fn layer_path(&self) -> String {
    with_layer(&self.group_name, self.layer_name.as_deref()).join(" / ")
  }

  pub fn display(&self, registry: &GroupTypeRegistry) -> String {
    self.role.display(registry, &self.group_type)
  }
}

/// A person with everything hanging off it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
  pub person:          Person,
  pub tags:            Vec<String>,
  /// Active roles, oldest first.
  pub roles:           Vec<RoleInGroup>,
  /// Layer paths of `roles` joined by `", "`, when the store precomputed them.
  pub role_with_layer: Option<String>,
  pub layer_group:     Option<String>,
  pub primary_group:   Option<String>,
  pub accounts:        ContactAccounts,
  pub qualifications:  Vec<QualificationWithKind>,
}

impl PersonRecord {
  /// A record with nothing but the person.
  pub fn bare(person: Person) -> Self {
    Self {
      person,
      tags: Vec::new(),
      roles: Vec::new(),
      role_with_layer: None,
      layer_group: None,
      primary_group: None,
      accounts: ContactAccounts::default(),
      qualifications: Vec::new(),
    }
  }
}

//! Groups and the registry of group types with their permitted role types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Outcome, Result,
  ability::{Ability, Capability},
  change::Change,
  store::MembershipStore,
};

// ─── Group types ─────────────────────────────────────────────────────────────

/// A role type that may be assigned within a group type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleType {
  /// Stable identifier stored on roles, e.g. `"leader"`.
  pub name:  String,
  /// Human-readable name used when displaying a role.
  pub label: String,
}

/// A class of groups, defining which role types it permits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupType {
  pub name:          String,
  /// Layers are organisational tiers; other groups are subgroups of a layer.
  #[serde(default)]
  pub layer:         bool,
  pub role_types:    Vec<RoleType>,
  /// Role type suggested when adding someone to this kind of group.
  #[serde(default)]
  pub standard_role: Option<String>,
}

impl GroupType {
  pub fn find_role_type(&self, name: &str) -> Option<&RoleType> {
    self.role_types.iter().find(|rt| rt.name == name)
  }

  pub fn standard_role(&self) -> Option<&RoleType> {
    self
      .standard_role
      .as_deref()
      .and_then(|n| self.find_role_type(n))
      .or_else(|| self.role_types.first())
  }
}

/// All configured group types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupTypeRegistry {
  types: Vec<GroupType>,
}

impl GroupTypeRegistry {
  pub fn new(types: Vec<GroupType>) -> Self { Self { types } }

  pub fn types(&self) -> &[GroupType] { &self.types }

  pub fn find(&self, group_type: &str) -> Option<&GroupType> {
    self.types.iter().find(|t| t.name == group_type)
  }

  /// The role type `role_type` if `group_type` permits it.
  pub fn find_role_type(
    &self,
    group_type: &str,
    role_type: &str,
  ) -> Option<&RoleType> {
    self.find(group_type)?.find_role_type(role_type)
  }

  /// Display label for a role type, falling back to its raw name.
  pub fn role_label<'a>(&'a self, group_type: &str, role_type: &'a str) -> &'a str {
    self
      .find_role_type(group_type, role_type)
      .map(|rt| rt.label.as_str())
      .unwrap_or(role_type)
  }
}

// ─── Group ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub group_id:       Uuid,
  pub name:           String,
  pub group_type:     String,
  pub parent_id:      Option<Uuid>,
  /// The layer this group belongs to; equals `group_id` for layers.
  pub layer_group_id: Uuid,
  /// Privacy policy new members must accept, if any.
  pub privacy_policy: Option<String>,
  pub created_at:     DateTime<Utc>,
}

impl Group {
  pub fn is_layer(&self) -> bool { self.layer_group_id == self.group_id }
}

/// Input for creating a group.
#[derive(Debug, Clone, Deserialize)]
pub struct NewGroup {
  pub name:           String,
  pub group_type:     String,
  pub parent_id:      Option<Uuid>,
  #[serde(default)]
  pub privacy_policy: Option<String>,
}

impl NewGroup {
  /// Build the group, deriving its layer from its type and parent.
  ///
  /// Non-layer groups need a parent to inherit the layer from; a layer
  /// without a parent is a root.
  pub fn build(
    self,
    registry: &GroupTypeRegistry,
    parent: Option<&Group>,
  ) -> Result<Outcome<Group>> {
    let group_type = registry
      .find(&self.group_type)
      .ok_or_else(|| Error::UnknownGroupType(self.group_type.clone()))?;

    let mut errors = crate::Errors::new();
    let name = self.name.trim().to_owned();
    if name.is_empty() {
      errors.add("name", "can't be blank");
    }

    let group_id = Uuid::new_v4();
    let layer_group_id = match (group_type.layer, parent) {
      (true, _) => group_id,
      (false, Some(p)) => p.layer_group_id,
      (false, None) => {
        errors.add("parent_id", "is required for groups that are not layers");
        group_id
      }
    };

    Ok(errors.into_outcome(Group {
      group_id,
      name,
      group_type: self.group_type,
      parent_id: parent.map(|p| p.group_id),
      layer_group_id,
      privacy_policy: self.privacy_policy.filter(|p| !p.trim().is_empty()),
      created_at: Utc::now(),
    }))
  }
}

/// Create a group below `input.parent_id`, or a root layer without one.
///
/// Root layers need an unrestricted [`Capability::ManageGroups`]; subgroups
/// need it in the parent.
pub async fn create_group<S: MembershipStore>(
  store: &S,
  ability: &Ability,
  registry: &GroupTypeRegistry,
  input: NewGroup,
) -> Result<Outcome<Group>> {
  let parent = match input.parent_id {
    Some(id) => Some(
      store
        .get_group(id)
        .await
        .map_err(Error::store)?
        .ok_or(Error::GroupNotFound(id))?,
    ),
    None => None,
  };
  match &parent {
    Some(p) => ability.authorize(Capability::ManageGroups, p.group_id)?,
    None => ability.authorize_anywhere(Capability::ManageGroups)?,
  }

  let outcome = input.build(registry, parent.as_ref())?;
  if let Outcome::Applied(group) = &outcome {
    store
      .apply(vec![Change::InsertGroup(group.clone())])
      .await
      .map_err(Error::store)?;
    tracing::info!(
      group_id = %group.group_id,
      group_type = %group.group_type,
      "created group"
    );
  }
  Ok(outcome)
}

/// The layer path of a group: `[layer, group]`, or `[group]` when the group
/// is itself a layer (`layer_name` is `None`).
pub fn with_layer(group_name: &str, layer_name: Option<&str>) -> Vec<String> {
  match layer_name {
    Some(layer) => vec![layer.to_owned(), group_name.to_owned()],
    None => vec![group_name.to_owned()],
  }
}

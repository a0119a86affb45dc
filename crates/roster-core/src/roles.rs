//! The role lifecycle: create, update, change of group or type, destroy.
//!
//! Every operation takes an explicit [`Ability`] and checks it before
//! building any change. Writes are computed as a [`Change`] batch and
//! applied in one call so a failure leaves nothing behind.

use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Errors, Outcome, Result,
  ability::{Ability, Capability},
  change::Change,
  date,
  group::{Group, GroupTypeRegistry},
  person::{NewPerson, Person},
  role::Role,
  store::MembershipStore,
  validation::BASE,
};

fn default_minimum_days_to_archive() -> u32 { 7 }

#[derive(Debug, Clone, Deserialize)]
pub struct RoleSettings {
  /// Roles older than this many days are ended instead of deleted.
  #[serde(default = "default_minimum_days_to_archive")]
  pub minimum_days_to_archive: u32,
}

impl Default for RoleSettings {
  fn default() -> Self {
    Self { minimum_days_to_archive: default_minimum_days_to_archive() }
  }
}

// ─── Requests ────────────────────────────────────────────────────────────────

/// A request to create a role, for an existing person or a new one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleRequest {
  #[serde(rename = "type")]
  pub role_type:  String,
  pub person_id:  Option<Uuid>,
  pub new_person: Option<NewPerson>,
  pub label:      Option<String>,
  /// Dates are parsed leniently; unparsable input counts as absent.
  pub start_on:   Option<String>,
  pub end_on:     Option<String>,
}

/// A request to update a role. A different `group_id` or `type` turns the
/// update into a change of type.
///
/// `label`, `start_on` and `end_on` are left alone when the key is missing
/// (`None`). A present `null`, blank or unparsable value clears them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleUpdate {
  pub group_id:  Option<Uuid>,
  #[serde(rename = "type")]
  pub role_type: Option<String>,
  #[serde(default, deserialize_with = "present")]
  pub label:     Option<Option<String>>,
  #[serde(default, deserialize_with = "present")]
  pub start_on:  Option<Option<String>>,
  #[serde(default, deserialize_with = "present")]
  pub end_on:    Option<Option<String>>,
}

/// Deserialize a key that is present, possibly as `null`, into `Some(_)`.
/// Missing keys fall back to `None` through `#[serde(default)]`.
fn present<'de, D, T>(
  deserializer: D,
) -> std::result::Result<Option<Option<T>>, D::Error>
where
  D: serde::Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(deserializer).map(Some)
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// Informational messages for the user; never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
  PrimaryGroupChanged { group_id: Uuid, group_name: String },
  RoleChanged { from: String, to: String },
}

impl std::fmt::Display for Notice {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::PrimaryGroupChanged { group_name, .. } => {
        write!(f, "The primary group is now {group_name}.")
      }
      Self::RoleChanged { from, to } => {
        write!(f, "Role {from} was changed to {to}.")
      }
    }
  }
}

/// Where the caller should go after a role was destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "target", content = "id", rename_all = "snake_case")]
pub enum Redirect {
  Person(Uuid),
  Group(Uuid),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Created {
  pub role:                 Role,
  pub person:               Person,
  /// Set when the group has a privacy policy the new person did not accept.
  /// The role and person were saved regardless.
  pub privacy_policy_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Updated {
  /// Same group and type: the role was changed in place.
  InPlace { role: Role },
  /// The old role was replaced by a new one.
  Replaced {
    old_role_id: Uuid,
    /// The old role was ended rather than deleted.
    archived:    bool,
    role:        Role,
    notices:     Vec<Notice>,
  },
}

impl Updated {
  pub fn role(&self) -> &Role {
    match self {
      Self::InPlace { role } | Self::Replaced { role, .. } => role,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Destroyed {
  pub role_id:  Uuid,
  /// The role was ended rather than deleted.
  pub archived: bool,
  pub notices:  Vec<Notice>,
  pub redirect: Redirect,
}

// ─── Manager ─────────────────────────────────────────────────────────────────

pub struct RoleManager<'a, S> {
  store:    &'a S,
  registry: &'a GroupTypeRegistry,
  settings: &'a RoleSettings,
  today:    NaiveDate,
}

impl<'a, S: MembershipStore> RoleManager<'a, S> {
  pub fn new(
    store: &'a S,
    registry: &'a GroupTypeRegistry,
    settings: &'a RoleSettings,
  ) -> Self {
    Self { store, registry, settings, today: date::today() }
  }

  /// Evaluate activity and archiving against `today` instead of the clock.
  pub fn on(mut self, today: NaiveDate) -> Self {
    self.today = today;
    self
  }

  async fn group(&self, id: Uuid) -> Result<Group> {
    self
      .store
      .get_group(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::GroupNotFound(id))
  }

  async fn person(&self, id: Uuid) -> Result<Person> {
    self
      .store
      .get_person(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::PersonNotFound(id))
  }

  async fn role(&self, id: Uuid) -> Result<Role> {
    self
      .store
      .get_role(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::RoleNotFound(id))
  }

  async fn roles_of(&self, person_id: Uuid) -> Result<Vec<Role>> {
    self.store.person_roles(person_id).await.map_err(Error::store)
  }

  async fn apply(&self, changes: Vec<Change>) -> Result<()> {
    tracing::debug!(count = changes.len(), "applying role changes");
    self.store.apply(changes).await.map_err(Error::store)
  }

  /// Whether `role` is the person's only active role in their primary group.
  /// Must be evaluated before the role is touched.
  fn is_last_in_primary_group(
    &self,
    person: &Person,
    role: &Role,
    roles: &[Role],
  ) -> bool {
    person.primary_group_id == Some(role.group_id)
      && !roles.iter().any(|r| {
        r.role_id != role.role_id
          && r.group_id == role.group_id
          && r.is_active(self.today)
      })
  }

  /// The group of the most recently created active role among `roles`.
  fn primary_group_among<'r>(
    &self,
    roles: impl IntoIterator<Item = &'r Role>,
  ) -> Option<Uuid> {
    roles
      .into_iter()
      .filter(|r| r.is_active(self.today))
      .max_by_key(|r| r.created_at)
      .map(|r| r.group_id)
  }

  /// Ends `role` yesterday when it is older than the archive threshold,
  /// deletes it otherwise. Returns whether it was archived.
  fn retire(&self, role: &Role) -> (bool, Change) {
    let minimum_age = Days::new(u64::from(self.settings.minimum_days_to_archive));
    let archive_before =
      self.today.checked_sub_days(minimum_age).unwrap_or(self.today);
    if role.created_at.date_naive() < archive_before {
      let yesterday = date::yesterday(self.today);
      let mut ended = role.clone();
      ended.end_on =
        Some(role.end_on.map_or(yesterday, |end| end.min(yesterday)));
      (true, Change::UpdateRole(ended))
    } else {
      (false, Change::DeleteRole(role.role_id))
    }
  }

  fn build_role(
    &self,
    person_id: Uuid,
    group: &Group,
    role_type: String,
    label: Option<String>,
    start_on: Option<NaiveDate>,
    end_on: Option<NaiveDate>,
  ) -> (Role, Errors) {
    let role = Role {
      role_id: Uuid::new_v4(),
      person_id,
      group_id: group.group_id,
      role_type,
      label: label.filter(|l| !l.trim().is_empty()),
      start_on,
      end_on,
      created_at: Utc::now(),
    };
    let errors = role.validate(self.registry, &group.group_type);
    (role, errors)
  }

  // ── Create ────────────────────────────────────────────────────────────

  /// Create a role in `group_id`, creating the person too when the request
  /// carries a new person instead of an id.
  pub async fn create(
    &self,
    ability: &Ability,
    group_id: Uuid,
    request: RoleRequest,
  ) -> Result<Outcome<Created>> {
    let group = self.group(group_id).await?;
    ability.authorize(Capability::CreateRole, group_id)?;

    let mut errors = Errors::new();
    let mut changes = Vec::new();

    let (mut person, is_new) = match (request.person_id, &request.new_person) {
      (Some(id), _) => (self.person(id).await?, false),
      (None, Some(new_person)) => {
        let person = new_person.build();
        for (field, message) in person.validate().iter() {
          errors.add(format!("person.{field}"), message);
        }
        (person, true)
      }
      (None, None) => {
        errors.add("person", "must be given");
        return Ok(Outcome::Invalid(errors));
      }
    };

    let (role, role_errors) = self.build_role(
      person.person_id,
      &group,
      request.role_type,
      request.label,
      date::parse_optional(request.start_on.as_deref()),
      date::parse_optional(request.end_on.as_deref()),
    );
    errors.merge(role_errors);
    if !errors.is_empty() {
      return Ok(Outcome::Invalid(errors));
    }

    let mut privacy_policy_error = None;
    if is_new {
      let accepted = request
        .new_person
        .as_ref()
        .is_some_and(NewPerson::privacy_policy_accepted);
      if group.privacy_policy.is_some() {
        if accepted {
          person.privacy_policy_accepted_at = Some(Utc::now());
        } else {
          privacy_policy_error =
            Some("The privacy policy of this group must be accepted".to_owned());
        }
      }
    }

    let sets_primary = person.primary_group_id.is_none();
    if sets_primary {
      person.primary_group_id = Some(group_id);
    }
    if is_new {
      changes.push(Change::InsertPerson(person.clone()));
    } else if sets_primary {
      changes.push(Change::UpdatePerson(person.clone()));
    }
    changes.push(Change::InsertRole(role.clone()));
    self.apply(changes).await?;

    tracing::info!(
      role_id = %role.role_id,
      person_id = %person.person_id,
      %group_id,
      role_type = %role.role_type,
      new_person = is_new,
      "created role"
    );
    Ok(Outcome::Applied(Created { role, person, privacy_policy_error }))
  }

  // ── Update ────────────────────────────────────────────────────────────

  pub async fn update(
    &self,
    ability: &Ability,
    role_id: Uuid,
    request: RoleUpdate,
  ) -> Result<Outcome<Updated>> {
    let role = self.role(role_id).await?;
    let group = self.group(role.group_id).await?;
    ability.authorize(Capability::UpdateRole, group.group_id)?;

    let target_group_id = request.group_id.unwrap_or(role.group_id);
    let target_type = request
      .role_type
      .clone()
      .unwrap_or_else(|| role.role_type.clone());

    if target_group_id == role.group_id && target_type == role.role_type {
      self.update_in_place(ability, role, &group, request).await
    } else {
      self
        .change_type(ability, role, &group, target_group_id, target_type, request)
        .await
    }
  }

  /// The requested end date. The current one is kept when the request
  /// leaves it out or the actor may not end roles in `group_id`.
  fn permitted_end_on(
    &self,
    ability: &Ability,
    group_id: Uuid,
    requested: Option<Option<&str>>,
    current: Option<NaiveDate>,
  ) -> Option<NaiveDate> {
    match requested {
      Some(end_on) if ability.can(Capability::DestroyRole, group_id) => {
        date::parse_optional(end_on)
      }
      _ => current,
    }
  }

  async fn update_in_place(
    &self,
    ability: &Ability,
    mut role: Role,
    group: &Group,
    request: RoleUpdate,
  ) -> Result<Outcome<Updated>> {
    role.end_on = self.permitted_end_on(
      ability,
      group.group_id,
      request.end_on.as_ref().map(Option::as_deref),
      role.end_on,
    );
    if let Some(label) = request.label {
      role.label = label.filter(|l| !l.trim().is_empty());
    }
    if let Some(start_on) = request.start_on {
      role.start_on = date::parse_optional(start_on.as_deref());
    }

    let errors = role.validate(self.registry, &group.group_type);
    if !errors.is_empty() {
      return Ok(Outcome::Invalid(errors));
    }

    self.apply(vec![Change::UpdateRole(role.clone())]).await?;
    tracing::info!(role_id = %role.role_id, "updated role");
    Ok(Outcome::Applied(Updated::InPlace { role }))
  }

  /// Replace `old` by a new role in another group or of another type.
  ///
  /// If the new role is invalid nothing is written and its errors are
  /// reported as errors of the old role.
  async fn change_type(
    &self,
    ability: &Ability,
    old: Role,
    old_group: &Group,
    target_group_id: Uuid,
    target_type: String,
    request: RoleUpdate,
  ) -> Result<Outcome<Updated>> {
    let target_group = if target_group_id == old_group.group_id {
      old_group.clone()
    } else {
      self.group(target_group_id).await?
    };
    ability.authorize(Capability::CreateRole, target_group_id)?;

    let end_on = self.permitted_end_on(
      ability,
      target_group_id,
      request.end_on.as_ref().map(Option::as_deref),
      old.end_on,
    );
    let start_on = match &request.start_on {
      Some(start_on) => date::parse_optional(start_on.as_deref()),
      None => old.start_on,
    };
    let label = request.label.unwrap_or_else(|| old.label.clone());
    let (role, new_errors) = self.build_role(
      old.person_id,
      &target_group,
      target_type,
      label,
      start_on,
      end_on,
    );

    if !new_errors.is_empty() {
      let mut errors = Errors::new();
      errors.add(
        BASE,
        format!(
          "Role could not be changed to {}",
          self.registry.role_label(&target_group.group_type, &role.role_type)
        ),
      );
      errors.merge(new_errors);
      tracing::debug!(role_id = %old.role_id, "change of role type rejected");
      return Ok(Outcome::Invalid(errors));
    }

    let mut person = self.person(old.person_id).await?;
    let roles = self.roles_of(old.person_id).await?;
    let was_last_primary = self.is_last_in_primary_group(&person, &old, &roles);

    let (archived, retired) = self.retire(&old);
    let mut changes = vec![retired, Change::InsertRole(role.clone())];
    let mut notices = vec![Notice::RoleChanged {
      from: old.display(self.registry, &old_group.group_type),
      to:   role.display(self.registry, &target_group.group_type),
    }];
    if was_last_primary || person.primary_group_id.is_none() {
      let remaining = roles
        .iter()
        .filter(|r| r.role_id != old.role_id)
        .chain(std::iter::once(&role));
      let primary = self.primary_group_among(remaining);
      if primary != person.primary_group_id {
        person.primary_group_id = primary;
        changes.push(Change::UpdatePerson(person.clone()));
        if let (true, Some(group_id)) = (was_last_primary, primary) {
          let group_name = if group_id == target_group.group_id {
            target_group.name.clone()
          } else {
            self.group(group_id).await?.name
          };
          notices.push(Notice::PrimaryGroupChanged { group_id, group_name });
        }
      }
    }
    self.apply(changes).await?;

    tracing::info!(
      old_role_id = %old.role_id,
      role_id = %role.role_id,
      group_id = %role.group_id,
      archived,
      "replaced role"
    );
    Ok(Outcome::Applied(Updated::Replaced {
      old_role_id: old.role_id,
      archived,
      role,
      notices,
    }))
  }

  // ── Destroy ───────────────────────────────────────────────────────────

  /// End or delete a role and recompute the person's primary group.
  pub async fn destroy(
    &self,
    ability: &Ability,
    role_id: Uuid,
  ) -> Result<Destroyed> {
    let role = self.role(role_id).await?;
    ability.authorize(Capability::DestroyRole, role.group_id)?;

    let mut person = self.person(role.person_id).await?;
    let roles = self.roles_of(role.person_id).await?;
    let was_last_primary = self.is_last_in_primary_group(&person, &role, &roles);

    let (archived, retired) = self.retire(&role);
    let mut changes = vec![retired];

    let remaining: Vec<&Role> = roles
      .iter()
      .filter(|r| r.role_id != role.role_id && r.is_active(self.today))
      .collect();

    let mut notices = Vec::new();
    if was_last_primary {
      let primary = self.primary_group_among(remaining.iter().copied());
      if primary != person.primary_group_id {
        person.primary_group_id = primary;
        changes.push(Change::UpdatePerson(person.clone()));
      }
      if let Some(group_id) = primary {
        let group = self.group(group_id).await?;
        notices.push(Notice::PrimaryGroupChanged {
          group_id,
          group_name: group.name,
        });
      }
    }

    self.apply(changes).await?;
    tracing::info!(
      %role_id,
      person_id = %person.person_id,
      archived,
      "destroyed role"
    );

    let visible = ability.can_show_person(
      person.person_id,
      remaining.iter().map(|r| r.group_id),
    );
    let redirect = if visible {
      Redirect::Person(person.person_id)
    } else {
      Redirect::Group(role.group_id)
    };
    Ok(Destroyed { role_id, archived, notices, redirect })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn notices_read_naturally() {
    let notice = Notice::PrimaryGroupChanged {
      group_id:   Uuid::new_v4(),
      group_name: "Board".into(),
    };
    assert_eq!(notice.to_string(), "The primary group is now Board.");
    let notice = Notice::RoleChanged { from: "Member".into(), to: "Leader".into() };
    assert_eq!(notice.to_string(), "Role Member was changed to Leader.");
  }

  #[test]
  fn requests_use_type_as_field_name() {
    let request: RoleRequest = serde_json::from_value(serde_json::json!({
      "type": "member",
      "new_person": { "first_name": "Ada", "privacy_policy_accepted": true },
      "start_on": "not a date"
    }))
    .unwrap();
    assert_eq!(request.role_type, "member");
    assert!(request.new_person.unwrap().privacy_policy_accepted());
    assert_eq!(date::parse_optional(request.start_on.as_deref()), None);
  }

  #[test]
  fn updates_tell_missing_keys_from_null() {
    let update: RoleUpdate = serde_json::from_value(serde_json::json!({
      "label": "Treasurer",
      "end_on": null
    }))
    .unwrap();
    assert_eq!(update.label, Some(Some("Treasurer".to_owned())));
    assert_eq!(update.start_on, None);
    assert_eq!(update.end_on, Some(None));
  }

  #[test]
  fn archiving_threshold_defaults_to_a_week() {
    let settings: RoleSettings = serde_json::from_value(serde_json::json!({})).unwrap();
    assert_eq!(settings.minimum_days_to_archive, 7);
  }
}

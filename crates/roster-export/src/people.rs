//! People exports: the person row, the attribute presets and a batch source
//! reading the people of a group from a store.

use chrono::NaiveDate;
use serde::Deserialize;
use roster_core::{
  contact::{ContactCategory, contact_key},
  group::GroupTypeRegistry,
  qualification::QualificationKind,
  record::PersonRecord,
  store::MembershipStore,
};
use uuid::Uuid;

use crate::{
  Error, Result,
  resolver::DynamicAttribute,
  tabular::{Accessor, Attribute, BatchSource, RowContext, RowSpec, TabularExport},
  value::Value,
};

// ─── Row ─────────────────────────────────────────────────────────────────────

/// Row spec for [`PersonRecord`]s. Role types are labelled through the
/// shared group type registry.
pub struct PersonRow;

impl RowSpec for PersonRow {
  type Entry = PersonRecord;
  type Shared = GroupTypeRegistry;

  fn accessor(attr: &str) -> Option<Accessor<PersonRecord, GroupTypeRegistry>> {
    let accessor: Accessor<PersonRecord, GroupTypeRegistry> = match attr {
      "first_name" => |r, _| r.person.first_name.clone().into(),
      "last_name" => |r, _| r.person.last_name.clone().into(),
      "nickname" => |r, _| r.person.nickname.clone().into(),
      "company_name" => |r, _| r.person.company_name.clone().into(),
      "company" => |r, _| r.person.company.into(),
      "email" => |r, _| r.person.email.clone().into(),
      "address" => |r, _| r.person.address().into(),
      "zip_code" => |r, _| r.person.zip_code.clone().into(),
      "town" => |r, _| r.person.town.clone().into(),
      "country" => |r, _| r.person.country_label().into(),
      "gender" => |r, _| r.person.gender_label().into(),
      "birthday" => |r, _| r.person.birthday.into(),
      "layer_group" => |r, _| r.layer_group.clone().into(),
      "primary_group" => |r, _| r.primary_group.clone().into(),
      "roles" => |r, ctx| roles(r, ctx.shared).into(),
      "tags" => |r, _| r.tags.join(", ").into(),
      _ => return None,
    };
    Some(accessor)
  }

  fn dynamic_attributes() -> &'static [DynamicAttribute] { &DynamicAttribute::ALL }

  fn resolve_dynamic(
    entry: &PersonRecord,
    kind: DynamicAttribute,
    attr: &str,
    ctx: &RowContext<'_, GroupTypeRegistry>,
  ) -> Option<String> {
    kind.resolve(attr, entry, ctx.today)
  }

  fn label(attr: &str) -> Option<String> {
    let label = match attr {
      "address" => "Address",
      "company" => "Company",
      "layer_group" => "Main group",
      "primary_group" => "Primary group",
      "roles" => "Roles",
      "zip_code" => "Zip code",
      _ => return None,
    };
    Some(label.to_owned())
  }
}

/// `Role Layer / Group` for every active role, joined by `", "`.
///
/// The store's precomputed layer string is paired with the roles
/// positionally when present.
fn roles(record: &PersonRecord, registry: &GroupTypeRegistry) -> String {
  match record.role_with_layer.as_deref().filter(|s| !s.is_empty()) {
    Some(paths) => record
      .roles
      .iter()
      .zip(paths.split(", "))
      .map(|(role, path)| format!("{} {path}", role.display(registry)))
      .collect::<Vec<_>>()
      .join(", "),
    None => record
      .roles
      .iter()
      .map(|role| format!("{} {}", role.display(registry), role.layer_path()))
      .collect::<Vec<_>>()
      .join(", "),
  }
}

// ─── Presets ─────────────────────────────────────────────────────────────────

/// Columns of the address list.
pub const ADDRESS_ATTRIBUTES: &[&str] = &[
  "first_name",
  "last_name",
  "nickname",
  "company_name",
  "company",
  "email",
  "address",
  "zip_code",
  "town",
  "country",
  "layer_group",
  "roles",
];

/// Columns of the full list, before the contact and qualification columns.
pub const FULL_ATTRIBUTES: &[&str] = &[
  "first_name",
  "last_name",
  "nickname",
  "company_name",
  "company",
  "email",
  "address",
  "zip_code",
  "town",
  "country",
  "gender",
  "birthday",
  "layer_group",
  "primary_group",
  "roles",
  "tags",
];

/// One column per contact label in use, e.g. `phone_number_mobile` labelled
/// `Phone number Mobile`.
pub fn contact_columns(labels: &[(ContactCategory, String)]) -> Vec<Attribute> {
  labels
    .iter()
    .map(|(category, label)| {
      Attribute::labelled(
        contact_key(category.key_prefix(), label),
        format!("{} {label}", category.human_name()),
      )
    })
    .collect()
}

pub fn qualification_columns(kinds: &[QualificationKind]) -> Vec<Attribute> {
  kinds
    .iter()
    .map(|kind| Attribute::labelled(kind.key(), kind.label.clone()))
    .collect()
}

/// Which people list to export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeopleList {
  #[default]
  Address,
  /// Every attribute plus contact and qualification columns.
  Full,
}

// ─── Store source ────────────────────────────────────────────────────────────

/// The people holding an active role in a group, in name order.
pub struct GroupPeople<'a, S> {
  store:    &'a S,
  group_id: Uuid,
  as_of:    NaiveDate,
}

impl<'a, S: MembershipStore> GroupPeople<'a, S> {
  pub fn new(store: &'a S, group_id: Uuid, as_of: NaiveDate) -> Self {
    Self { store, group_id, as_of }
  }
}

impl<S: MembershipStore> BatchSource for GroupPeople<'_, S> {
  type Item = PersonRecord;

  async fn fetch_batch(
    &self,
    offset: usize,
    limit: usize,
  ) -> Result<Vec<PersonRecord>> {
    self
      .store
      .people_in_group(self.group_id, self.as_of, offset, limit)
      .await
      .map_err(Error::fetch)
  }
}

/// Set up a people export of `group_id`. The full list derives its dynamic
/// columns from the labels used by the group's people and the configured
/// qualification kinds.
pub async fn people_export<'a, S: MembershipStore>(
  store: &'a S,
  registry: &GroupTypeRegistry,
  group_id: Uuid,
  list: PeopleList,
  as_of: NaiveDate,
  batch_size: usize,
) -> Result<TabularExport<PersonRow, GroupPeople<'a, S>>> {
  let preset = match list {
    PeopleList::Address => ADDRESS_ATTRIBUTES,
    PeopleList::Full => FULL_ATTRIBUTES,
  };
  let mut attributes: Vec<Attribute> =
    preset.iter().copied().map(Attribute::from).collect();
  if list == PeopleList::Full {
    let labels = store
      .contact_labels(group_id, as_of)
      .await
      .map_err(Error::fetch)?;
    let kinds = store
      .list_qualification_kinds()
      .await
      .map_err(Error::fetch)?;
    attributes.extend(contact_columns(&labels));
    attributes.extend(qualification_columns(&kinds));
  }

  tracing::info!(%group_id, ?list, columns = attributes.len(), "exporting people");
  let source = GroupPeople::new(store, group_id, as_of);
  TabularExport::new(registry.clone(), source, attributes)?
    .with_batch_size(batch_size)
    .map(|export| export.on(as_of))
}

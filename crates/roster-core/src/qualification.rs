//! Qualifications and their kinds.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Errors, Outcome, Result,
  ability::{Ability, Capability},
  change::Change,
  contact::{authorize_person, contact_key},
  date,
  store::MembershipStore,
};

/// Export key prefix for qualification-kind columns.
pub const KEY_PREFIX: &str = "qualification_kind";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationKind {
  pub kind_id:        Uuid,
  pub label:          String,
  /// Years a qualification of this kind stays valid, counted to year end.
  pub validity_years: Option<u32>,
}

impl QualificationKind {
  /// The export attribute key, e.g. `qualification_kind_first_aid`.
  pub fn key(&self) -> String { contact_key(KEY_PREFIX, &self.label) }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQualificationKind {
  pub label:          String,
  pub validity_years: Option<u32>,
}

impl NewQualificationKind {
  pub fn build(self) -> Outcome<QualificationKind> {
    let mut errors = Errors::new();
    let label = self.label.trim().to_owned();
    if label.is_empty() {
      errors.add("label", "can't be blank");
    }
    errors.into_outcome(QualificationKind {
      kind_id: Uuid::new_v4(),
      label,
      validity_years: self.validity_years,
    })
  }
}

/// Define a new qualification kind. Kinds are global, so this needs an
/// unrestricted [`Capability::ManageGroups`].
pub async fn create_qualification_kind<S: MembershipStore>(
  store: &S,
  ability: &Ability,
  input: NewQualificationKind,
) -> Result<Outcome<QualificationKind>> {
  ability.authorize_anywhere(Capability::ManageGroups)?;
  let outcome = input.build();
  if let Outcome::Applied(kind) = &outcome {
    store
      .apply(vec![Change::InsertQualificationKind(kind.clone())])
      .await
      .map_err(Error::store)?;
    tracing::info!(
      kind_id = %kind.kind_id,
      label = %kind.label,
      "created qualification kind"
    );
  }
  Ok(outcome)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualification {
  pub qualification_id: Uuid,
  pub person_id:        Uuid,
  pub kind_id:          Uuid,
  pub start_at:         Option<NaiveDate>,
  /// `None` means the qualification never expires.
  pub finish_at:        Option<NaiveDate>,
  /// Where the qualification was earned, e.g. a course name.
  pub origin:           Option<String>,
}

impl Qualification {
  /// Active iff the validity window covers `today`.
  pub fn is_active(&self, today: NaiveDate) -> bool {
    self.start_at.is_none_or(|s| s <= today)
      && self.finish_at.is_none_or(|f| f >= today)
  }
}

/// A qualification bundled with its kind, as read for display and export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationWithKind {
  pub qualification: Qualification,
  pub kind:          QualificationKind,
}

/// The most recent qualification (by `start_at`) of each kind, ordered by
/// descending start date.
pub fn latest_per_kind(
  qualifications: &[QualificationWithKind],
) -> Vec<&QualificationWithKind> {
  let mut sorted: Vec<&QualificationWithKind> = qualifications.iter().collect();
  sorted.sort_by(|a, b| b.qualification.start_at.cmp(&a.qualification.start_at));
  let mut seen = std::collections::HashSet::new();
  sorted.retain(|q| seen.insert(q.kind.kind_id));
  sorted
}

/// Qualification input as submitted by a client.
#[derive(Debug, Clone, Deserialize)]
pub struct NewQualification {
  pub kind_id:   Uuid,
  pub start_at:  Option<String>,
  pub finish_at: Option<String>,
  pub origin:    Option<String>,
}

impl NewQualification {
  /// Build the qualification. Without an explicit finish date, kinds with a
  /// validity expire at the end of `start_at.year + validity_years`.
  pub fn build(self, person_id: Uuid, kind: &QualificationKind) -> Outcome<Qualification> {
    let mut errors = Errors::new();
    let start_at = date::parse_optional(self.start_at.as_deref());
    if start_at.is_none() {
      errors.add("start_at", "can't be blank");
    }
    let finish_at = date::parse_optional(self.finish_at.as_deref()).or_else(|| {
      let years = kind.validity_years?;
      let start = start_at?;
      NaiveDate::from_ymd_opt(start.year() + years as i32, 12, 31)
    });
    if let (Some(s), Some(f)) = (start_at, finish_at)
      && f < s
    {
      errors.add("finish_at", "must not be before start_at");
    }
    errors.into_outcome(Qualification {
      qualification_id: Uuid::new_v4(),
      person_id,
      kind_id: self.kind_id,
      start_at,
      finish_at,
      origin: self.origin.filter(|o| !o.trim().is_empty()),
    })
  }
}

/// Record a qualification for a person.
pub async fn add_qualification<S: MembershipStore>(
  store: &S,
  ability: &Ability,
  person_id: Uuid,
  input: NewQualification,
) -> Result<Outcome<QualificationWithKind>> {
  store
    .get_person(person_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::PersonNotFound(person_id))?;
  let roles = store.person_roles(person_id).await.map_err(Error::store)?;
  authorize_person(ability, person_id, &roles, date::today())?;

  let kind = store
    .get_qualification_kind(input.kind_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::QualificationKindNotFound(input.kind_id))?;

  match input.build(person_id, &kind) {
    Outcome::Applied(qualification) => {
      store
        .apply(vec![Change::InsertQualification(qualification.clone())])
        .await
        .map_err(Error::store)?;
      tracing::info!(%person_id, kind = %kind.label, "added qualification");
      Ok(Outcome::Applied(QualificationWithKind { qualification, kind }))
    }
    Outcome::Invalid(errors) => Ok(Outcome::Invalid(errors)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn kind(label: &str, validity_years: Option<u32>) -> QualificationKind {
    QualificationKind { kind_id: Uuid::new_v4(), label: label.into(), validity_years }
  }

  fn with_kind(
    kind: &QualificationKind,
    start_at: NaiveDate,
    finish_at: Option<NaiveDate>,
  ) -> QualificationWithKind {
    QualificationWithKind {
      qualification: Qualification {
        qualification_id: Uuid::new_v4(),
        person_id: Uuid::new_v4(),
        kind_id: kind.kind_id,
        start_at: Some(start_at),
        finish_at,
        origin: None,
      },
      kind:          kind.clone(),
    }
  }

  #[test]
  fn active_window() {
    let q = with_kind(&kind("First aid", None), date(2020, 1, 1), Some(date(2022, 12, 31)));
    assert!(q.qualification.is_active(date(2022, 12, 31)));
    assert!(!q.qualification.is_active(date(2023, 1, 1)));
    assert!(!q.qualification.is_active(date(2019, 12, 31)));

    let open = with_kind(&kind("Leader", None), date(2020, 1, 1), None);
    assert!(open.qualification.is_active(date(2099, 1, 1)));
  }

  #[test]
  fn latest_wins_per_kind() {
    let first_aid = kind("First aid", Some(2));
    let leader = kind("Leader", None);
    let quals = vec![
      with_kind(&first_aid, date(2018, 5, 1), Some(date(2020, 12, 31))),
      with_kind(&leader, date(2019, 1, 1), None),
      with_kind(&first_aid, date(2021, 5, 1), Some(date(2023, 12, 31))),
    ];
    let latest = latest_per_kind(&quals);
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].qualification.start_at, Some(date(2021, 5, 1)));
    assert_eq!(latest[1].kind.label, "Leader");
  }

  #[test]
  fn finish_derived_from_validity() {
    let k = kind("First aid", Some(2));
    let q = NewQualification {
      kind_id:   k.kind_id,
      start_at:  Some("2024-03-01".into()),
      finish_at: None,
      origin:    None,
    }
    .build(Uuid::new_v4(), &k)
    .applied()
    .unwrap();
    assert_eq!(q.finish_at, Some(date(2026, 12, 31)));
  }

  #[test]
  fn start_is_required() {
    let k = kind("Leader", None);
    let outcome = NewQualification {
      kind_id:   k.kind_id,
      start_at:  Some("not a date".into()),
      finish_at: None,
      origin:    None,
    }
    .build(Uuid::new_v4(), &k);
    assert_eq!(outcome.errors().unwrap().on("start_at").len(), 1);
  }

  #[test]
  fn kind_key() {
    assert_eq!(kind("First Aid", None).key(), "qualification_kind_first_aid");
  }
}

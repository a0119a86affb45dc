//! Resolution of dynamic attributes such as `phone_number_mobile` against a
//! person's contact sub-records and qualifications.

use chrono::NaiveDate;
use roster_core::{
  contact::{ContactAccount, ContactAccounts, ContactCategory},
  qualification::{self, QualificationWithKind},
  record::PersonRecord,
};

/// Literal returned for an active qualification without a finish date.
pub const OPEN_ENDED: &str = "yes";

/// The families of dynamic attributes, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicAttribute {
  PhoneNumber,
  SocialAccount,
  AdditionalEmail,
  AdditionalAddress,
  QualificationKind,
}

impl DynamicAttribute {
  pub const ALL: [Self; 5] = [
    Self::PhoneNumber,
    Self::SocialAccount,
    Self::AdditionalEmail,
    Self::AdditionalAddress,
    Self::QualificationKind,
  ];

  /// Attribute prefix, including the trailing underscore.
  pub fn prefix(self) -> &'static str {
    match self {
      Self::PhoneNumber => "phone_number_",
      Self::SocialAccount => "social_account_",
      Self::AdditionalEmail => "additional_email_",
      Self::AdditionalAddress => "additional_address_",
      Self::QualificationKind => "qualification_kind_",
    }
  }

  pub fn matches(self, attr: &str) -> bool { attr.starts_with(self.prefix()) }

  /// The first family in `candidates` whose prefix `attr` carries.
  pub fn detect(candidates: &[Self], attr: &str) -> Option<Self> {
    candidates.iter().copied().find(|d| d.matches(attr))
  }

  /// Look `attr` up in `entry`. Absent when nothing matches.
  pub fn resolve(
    self,
    attr: &str,
    entry: &impl Contactable,
    today: NaiveDate,
  ) -> Option<String> {
    let accounts = entry.contact_accounts();
    match self {
      Self::PhoneNumber => first_match(&accounts.phone_numbers, attr),
      Self::SocialAccount => first_match(&accounts.social_accounts, attr),
      Self::AdditionalEmail => first_match(&accounts.additional_emails, attr),
      Self::AdditionalAddress => {
        first_match(&accounts.additional_addresses, attr)
      }
      Self::QualificationKind => {
        qualification_value(entry.qualifications(), attr, today)
      }
    }
  }
}

impl From<ContactCategory> for DynamicAttribute {
  fn from(category: ContactCategory) -> Self {
    match category {
      ContactCategory::PhoneNumber => Self::PhoneNumber,
      ContactCategory::SocialAccount => Self::SocialAccount,
      ContactCategory::AdditionalEmail => Self::AdditionalEmail,
      ContactCategory::AdditionalAddress => Self::AdditionalAddress,
    }
  }
}

/// Anything that owns contact sub-records and qualifications.
pub trait Contactable {
  fn contact_accounts(&self) -> &ContactAccounts;
  fn qualifications(&self) -> &[QualificationWithKind];
}

impl Contactable for PersonRecord {
  fn contact_accounts(&self) -> &ContactAccounts { &self.accounts }

  fn qualifications(&self) -> &[QualificationWithKind] { &self.qualifications }
}

/// Value of the first account, in stored order, whose key equals `attr`.
fn first_match<A: ContactAccount>(accounts: &[A], attr: &str) -> Option<String> {
  accounts.iter().find(|a| a.key() == attr).map(A::value)
}

/// Finish date of the matching active qualification, or [`OPEN_ENDED`].
/// Only the latest qualification of each kind is considered.
fn qualification_value(
  qualifications: &[QualificationWithKind],
  attr: &str,
  today: NaiveDate,
) -> Option<String> {
  qualification::latest_per_kind(qualifications)
    .into_iter()
    .find(|q| q.qualification.is_active(today) && q.kind.key() == attr)
    .map(|q| match q.qualification.finish_at {
      Some(finish) => finish.format("%Y-%m-%d").to_string(),
      None => OPEN_ENDED.to_owned(),
    })
}

#[cfg(test)]
mod tests {
  use roster_core::{
    contact::{PhoneNumber, SocialAccount},
    qualification::{Qualification, QualificationKind},
  };
  use uuid::Uuid;

  use super::*;

  struct Entry {
    accounts:       ContactAccounts,
    qualifications: Vec<QualificationWithKind>,
  }

  impl Contactable for Entry {
    fn contact_accounts(&self) -> &ContactAccounts { &self.accounts }

    fn qualifications(&self) -> &[QualificationWithKind] { &self.qualifications }
  }

  fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn phone(label: &str, number: &str) -> PhoneNumber {
    PhoneNumber {
      account_id: Uuid::new_v4(),
      person_id:  Uuid::nil(),
      label:      label.into(),
      number:     number.into(),
      public:     true,
    }
  }

  fn qualification(
    kind: &QualificationKind,
    start_at: NaiveDate,
    finish_at: Option<NaiveDate>,
  ) -> QualificationWithKind {
    QualificationWithKind {
      qualification: Qualification {
        qualification_id: Uuid::new_v4(),
        person_id: Uuid::nil(),
        kind_id: kind.kind_id,
        start_at: Some(start_at),
        finish_at,
        origin: None,
      },
      kind:          kind.clone(),
    }
  }

  fn kind(label: &str) -> QualificationKind {
    QualificationKind {
      kind_id:        Uuid::new_v4(),
      label:          label.into(),
      validity_years: None,
    }
  }

  fn entry() -> Entry {
    Entry {
      accounts:       ContactAccounts {
        phone_numbers: vec![
          phone("Mobile", "079 111 11 11"),
          phone("Work", "031 222 22 22"),
          phone("mobile", "079 333 33 33"),
        ],
        social_accounts: vec![SocialAccount {
          account_id: Uuid::new_v4(),
          person_id:  Uuid::nil(),
          label:      "Mastodon".into(),
          name:       "@ada@example.org".into(),
          public:     true,
        }],
        ..Default::default()
      },
      qualifications: Vec::new(),
    }
  }

  #[test]
  fn labels_resolve_independently() {
    let e = entry();
    let today = day(2024, 6, 1);
    let resolve = |attr: &str| {
      DynamicAttribute::detect(&DynamicAttribute::ALL, attr)
        .and_then(|d| d.resolve(attr, &e, today))
    };
    assert_eq!(resolve("phone_number_mobile").as_deref(), Some("079 111 11 11"));
    assert_eq!(resolve("phone_number_work").as_deref(), Some("031 222 22 22"));
    assert_eq!(
      resolve("social_account_mastodon").as_deref(),
      Some("@ada@example.org")
    );
  }

  #[test]
  fn missing_labels_are_absent() {
    let e = entry();
    let today = day(2024, 6, 1);
    for attr in [
      "phone_number_fax",
      "social_account_mobile",
      "additional_email_work",
      "additional_address_billing",
    ] {
      let d = DynamicAttribute::detect(&DynamicAttribute::ALL, attr).unwrap();
      assert_eq!(d.resolve(attr, &e, today), None, "{attr}");
    }
    assert_eq!(DynamicAttribute::detect(&DynamicAttribute::ALL, "email"), None);
  }

  #[test]
  fn qualifications_yield_finish_date_or_marker() {
    let today = day(2024, 6, 1);
    let first_aid = kind("First aid");
    let leader = kind("Group leader");
    let diver = kind("Diver");
    let mut e = entry();
    e.qualifications = vec![
      qualification(&first_aid, day(2023, 1, 1), Some(day(2025, 12, 31))),
      qualification(&leader, day(2020, 1, 1), None),
      qualification(&diver, day(2020, 1, 1), Some(day(2021, 12, 31))),
    ];
    let q = DynamicAttribute::QualificationKind;
    assert_eq!(
      q.resolve("qualification_kind_first_aid", &e, today).as_deref(),
      Some("2025-12-31")
    );
    assert_eq!(
      q.resolve("qualification_kind_group_leader", &e, today).as_deref(),
      Some(OPEN_ENDED)
    );
    assert_eq!(q.resolve("qualification_kind_diver", &e, today), None);
  }

  #[test]
  fn only_the_latest_qualification_counts() {
    let today = day(2024, 6, 1);
    let first_aid = kind("First aid");
    let mut e = entry();
    // The older one is still valid, but the newer one has not started yet.
    e.qualifications = vec![
      qualification(&first_aid, day(2022, 1, 1), Some(day(2026, 12, 31))),
      qualification(&first_aid, day(2024, 9, 1), Some(day(2027, 12, 31))),
    ];
    assert_eq!(
      DynamicAttribute::QualificationKind.resolve(
        "qualification_kind_first_aid",
        &e,
        today
      ),
      None
    );
  }
}

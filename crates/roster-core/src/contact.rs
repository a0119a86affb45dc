//! Contact sub-records owned by a person: phone numbers, social accounts,
//! additional emails and additional addresses.
//!
//! The four record types share the [`ContactAccount`] capability: a label and
//! a value. Storage treats them uniformly through [`AnyContactAccount`], which
//! mirrors the tagged `category` + JSON payload layout used in the database.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Errors, Outcome, Result,
  ability::{Ability, Capability},
  change::Change,
  person::is_valid_email,
  role::Role,
  store::MembershipStore,
};

// ─── Categories ──────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContactCategory {
  PhoneNumber,
  SocialAccount,
  AdditionalEmail,
  AdditionalAddress,
}

impl ContactCategory {
  pub const ALL: [Self; 4] = [
    Self::PhoneNumber,
    Self::SocialAccount,
    Self::AdditionalEmail,
    Self::AdditionalAddress,
  ];

  /// Prefix of export attribute keys for this category.
  pub fn key_prefix(self) -> &'static str {
    match self {
      Self::PhoneNumber => "phone_number",
      Self::SocialAccount => "social_account",
      Self::AdditionalEmail => "additional_email",
      Self::AdditionalAddress => "additional_address",
    }
  }

  pub fn human_name(self) -> &'static str {
    match self {
      Self::PhoneNumber => "Phone number",
      Self::SocialAccount => "Social account",
      Self::AdditionalEmail => "Additional email",
      Self::AdditionalAddress => "Additional address",
    }
  }

  /// Labels offered to users before any custom label has been stored.
  pub fn predefined_labels(self) -> &'static [&'static str] {
    match self {
      Self::PhoneNumber => {
        &["Private", "Mobile", "Work", "Father", "Mother", "Fax", "Other"]
      }
      Self::SocialAccount => &[
        "Skype", "Facebook", "Instagram", "LinkedIn", "Mastodon", "Website",
        "Other",
      ],
      Self::AdditionalEmail => &["Private", "Work", "Father", "Mother", "Other"],
      Self::AdditionalAddress => &["Private", "Work", "Billing", "Other"],
    }
  }
}

/// Canonical export key for a label, e.g. `phone_number_mobile`.
///
/// The label is lowercased and every run of non-alphanumeric characters is
/// collapsed into a single `_`.
pub fn contact_key(prefix: &str, label: &str) -> String {
  let mut slug = String::with_capacity(label.len());
  for c in label.trim().chars().flat_map(char::to_lowercase) {
    if c.is_alphanumeric() {
      slug.push(c);
    } else if !slug.is_empty() && !slug.ends_with('_') {
      slug.push('_');
    }
  }
  let slug = slug.trim_end_matches('_');
  format!("{prefix}_{slug}")
}

/// Reuse the spelling of a known label when `label` matches it ignoring case.
pub fn normalize_label<'a>(
  label: &str,
  known: impl IntoIterator<Item = &'a str>,
) -> String {
  let trimmed = label.trim();
  let lowered = trimmed.to_lowercase();
  known
    .into_iter()
    .find(|k| k.to_lowercase() == lowered)
    .map(str::to_owned)
    .unwrap_or_else(|| trimmed.to_owned())
}

// ─── The shared capability ───────────────────────────────────────────────────

/// Behaviour shared by all contact sub-records.
pub trait ContactAccount {
  const CATEGORY: ContactCategory;

  fn label(&self) -> &str;

  /// The label as shown to users. Labels are stored untranslated.
  fn translated_label(&self) -> &str { self.label() }

  fn value(&self) -> String;

  /// The export attribute key this record answers to.
  fn key(&self) -> String {
    contact_key(Self::CATEGORY.key_prefix(), self.translated_label())
  }
}

// ─── Record types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
  pub account_id: Uuid,
  pub person_id:  Uuid,
  pub label:      String,
  pub number:     String,
  pub public:     bool,
}

impl ContactAccount for PhoneNumber {
  const CATEGORY: ContactCategory = ContactCategory::PhoneNumber;

  fn label(&self) -> &str { &self.label }

  fn value(&self) -> String { self.number.clone() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialAccount {
  pub account_id: Uuid,
  pub person_id:  Uuid,
  pub label:      String,
  pub name:       String,
  pub public:     bool,
}

impl ContactAccount for SocialAccount {
  const CATEGORY: ContactCategory = ContactCategory::SocialAccount;

  fn label(&self) -> &str { &self.label }

  fn value(&self) -> String { self.name.clone() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalEmail {
  pub account_id: Uuid,
  pub person_id:  Uuid,
  pub label:      String,
  pub email:      String,
  pub public:     bool,
  /// Whether mailings sent to the person also go to this address.
  pub mailings:   bool,
}

impl ContactAccount for AdditionalEmail {
  const CATEGORY: ContactCategory = ContactCategory::AdditionalEmail;

  fn label(&self) -> &str { &self.label }

  fn value(&self) -> String { self.email.clone() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalAddress {
  pub account_id:  Uuid,
  pub person_id:   Uuid,
  pub label:       String,
  pub street:      String,
  pub housenumber: Option<String>,
  pub zip_code:    String,
  pub town:        String,
  pub country:     Option<String>,
  pub public:      bool,
}

impl ContactAccount for AdditionalAddress {
  const CATEGORY: ContactCategory = ContactCategory::AdditionalAddress;

  fn label(&self) -> &str { &self.label }

  /// `Street 1, 3000 Town` with the country appended when present.
  fn value(&self) -> String {
    let street = match &self.housenumber {
      Some(n) => format!("{} {n}", self.street),
      None => self.street.clone(),
    };
    let mut parts = vec![street, format!("{} {}", self.zip_code, self.town)];
    if let Some(c) = &self.country {
      parts.push(c.clone());
    }
    parts.join(", ")
  }
}

// ─── AnyContactAccount ───────────────────────────────────────────────────────

/// Any contact sub-record. The variant name is the `category` discriminant
/// stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", content = "account", rename_all = "snake_case")]
pub enum AnyContactAccount {
  PhoneNumber(PhoneNumber),
  SocialAccount(SocialAccount),
  AdditionalEmail(AdditionalEmail),
  AdditionalAddress(AdditionalAddress),
}

impl AnyContactAccount {
  pub fn category(&self) -> ContactCategory {
    match self {
      Self::PhoneNumber(_) => ContactCategory::PhoneNumber,
      Self::SocialAccount(_) => ContactCategory::SocialAccount,
      Self::AdditionalEmail(_) => ContactCategory::AdditionalEmail,
      Self::AdditionalAddress(_) => ContactCategory::AdditionalAddress,
    }
  }

  pub fn account_id(&self) -> Uuid {
    match self {
      Self::PhoneNumber(a) => a.account_id,
      Self::SocialAccount(a) => a.account_id,
      Self::AdditionalEmail(a) => a.account_id,
      Self::AdditionalAddress(a) => a.account_id,
    }
  }

  pub fn person_id(&self) -> Uuid {
    match self {
      Self::PhoneNumber(a) => a.person_id,
      Self::SocialAccount(a) => a.person_id,
      Self::AdditionalEmail(a) => a.person_id,
      Self::AdditionalAddress(a) => a.person_id,
    }
  }

  pub fn label(&self) -> &str {
    match self {
      Self::PhoneNumber(a) => a.label(),
      Self::SocialAccount(a) => a.label(),
      Self::AdditionalEmail(a) => a.label(),
      Self::AdditionalAddress(a) => a.label(),
    }
  }

  pub fn value(&self) -> String {
    match self {
      Self::PhoneNumber(a) => a.value(),
      Self::SocialAccount(a) => a.value(),
      Self::AdditionalEmail(a) => a.value(),
      Self::AdditionalAddress(a) => a.value(),
    }
  }

  /// Serialise the inner record (without the category tag) for the
  /// `account_json` column.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("account").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Deserialise from the stored category and JSON payload.
  pub fn from_parts(category: &str, account: serde_json::Value) -> Result<Self> {
    category
      .parse::<ContactCategory>()
      .map_err(|_| Error::UnknownContactCategory(category.to_owned()))?;
    let wrapped = serde_json::json!({ "category": category, "account": account });
    Ok(serde_json::from_value(wrapped)?)
  }
}

/// A person's contact sub-records, split by category, each in the order
/// they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactAccounts {
  pub phone_numbers:        Vec<PhoneNumber>,
  pub social_accounts:      Vec<SocialAccount>,
  pub additional_emails:    Vec<AdditionalEmail>,
  pub additional_addresses: Vec<AdditionalAddress>,
}

impl ContactAccounts {
  pub fn push(&mut self, account: AnyContactAccount) {
    match account {
      AnyContactAccount::PhoneNumber(a) => self.phone_numbers.push(a),
      AnyContactAccount::SocialAccount(a) => self.social_accounts.push(a),
      AnyContactAccount::AdditionalEmail(a) => self.additional_emails.push(a),
      AnyContactAccount::AdditionalAddress(a) => {
        self.additional_addresses.push(a)
      }
    }
  }
}

impl FromIterator<AnyContactAccount> for ContactAccounts {
  fn from_iter<I: IntoIterator<Item = AnyContactAccount>>(iter: I) -> Self {
    let mut accounts = Self::default();
    for a in iter {
      accounts.push(a);
    }
    accounts
  }
}

// ─── Input ───────────────────────────────────────────────────────────────────

fn default_true() -> bool { true }

/// A contact sub-record as submitted by a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum NewContactAccount {
  PhoneNumber {
    label:  String,
    number: String,
    #[serde(default = "default_true")]
    public: bool,
  },
  SocialAccount {
    label:  String,
    name:   String,
    #[serde(default = "default_true")]
    public: bool,
  },
  AdditionalEmail {
    label:    String,
    email:    String,
    #[serde(default = "default_true")]
    public:   bool,
    #[serde(default = "default_true")]
    mailings: bool,
  },
  AdditionalAddress {
    label:       String,
    street:      String,
    housenumber: Option<String>,
    zip_code:    String,
    town:        String,
    country:     Option<String>,
    #[serde(default = "default_true")]
    public:      bool,
  },
}

impl NewContactAccount {
  pub fn category(&self) -> ContactCategory {
    match self {
      Self::PhoneNumber { .. } => ContactCategory::PhoneNumber,
      Self::SocialAccount { .. } => ContactCategory::SocialAccount,
      Self::AdditionalEmail { .. } => ContactCategory::AdditionalEmail,
      Self::AdditionalAddress { .. } => ContactCategory::AdditionalAddress,
    }
  }

  /// Validate and build the record for `person_id`.
  ///
  /// `used_labels` are the labels already stored for this category; together
  /// with the predefined ones they decide the stored spelling of the label.
  pub fn build(
    self,
    person_id: Uuid,
    used_labels: &[String],
  ) -> Outcome<AnyContactAccount> {
    let category = self.category();
    let mut errors = Errors::new();
    let known = category
      .predefined_labels()
      .iter()
      .copied()
      .chain(used_labels.iter().map(String::as_str));

    let raw_label = match &self {
      Self::PhoneNumber { label, .. }
      | Self::SocialAccount { label, .. }
      | Self::AdditionalEmail { label, .. }
      | Self::AdditionalAddress { label, .. } => label.clone(),
    };
    let label = normalize_label(&raw_label, known);
    if label.is_empty() {
      errors.add("label", "can't be blank");
    } else if label.ends_with('.') {
      errors.add("label", "must not end with a dot");
    }

    let account_id = Uuid::new_v4();
    let account = match self {
      Self::PhoneNumber { number, public, .. } => {
        let number = number.trim().to_owned();
        if number.is_empty() {
          errors.add("number", "can't be blank");
        }
        AnyContactAccount::PhoneNumber(PhoneNumber {
          account_id,
          person_id,
          label,
          number,
          public,
        })
      }
      Self::SocialAccount { name, public, .. } => {
        let name = name.trim().to_owned();
        if name.is_empty() {
          errors.add("name", "can't be blank");
        }
        AnyContactAccount::SocialAccount(SocialAccount {
          account_id,
          person_id,
          label,
          name,
          public,
        })
      }
      Self::AdditionalEmail { email, public, mailings, .. } => {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
          errors.add("email", "is invalid");
        }
        AnyContactAccount::AdditionalEmail(AdditionalEmail {
          account_id,
          person_id,
          label,
          email,
          public,
          mailings,
        })
      }
      Self::AdditionalAddress {
        street,
        housenumber,
        zip_code,
        town,
        country,
        public,
        ..
      } => {
        for (field, value) in
          [("street", &street), ("zip_code", &zip_code), ("town", &town)]
        {
          if value.trim().is_empty() {
            errors.add(field, "can't be blank");
          }
        }
        AnyContactAccount::AdditionalAddress(AdditionalAddress {
          account_id,
          person_id,
          label,
          street: street.trim().to_owned(),
          housenumber: housenumber.filter(|h| !h.trim().is_empty()),
          zip_code: zip_code.trim().to_owned(),
          town: town.trim().to_owned(),
          country: country.filter(|c| !c.trim().is_empty()),
          public,
        })
      }
    };

    errors.into_outcome(account)
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Add a contact sub-record to a person.
///
/// The actor needs [`Capability::ManagePeople`] in one of the groups the
/// person currently holds a role in, or must be the person.
pub async fn add_contact_account<S: MembershipStore>(
  store: &S,
  ability: &Ability,
  person_id: Uuid,
  input: NewContactAccount,
) -> Result<Outcome<AnyContactAccount>> {
  store
    .get_person(person_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::PersonNotFound(person_id))?;

  let today = crate::date::today();
  let roles = store.person_roles(person_id).await.map_err(Error::store)?;
  authorize_person(ability, person_id, &roles, today)?;

  let used = store
    .used_labels(input.category())
    .await
    .map_err(Error::store)?;

  match input.build(person_id, &used) {
    Outcome::Applied(account) => {
      store
        .apply(vec![Change::InsertContactAccount(account.clone())])
        .await
        .map_err(Error::store)?;
      tracing::info!(
        person_id = %person_id,
        category = %account.category(),
        "added contact account"
      );
      Ok(Outcome::Applied(account))
    }
    invalid => Ok(invalid),
  }
}

/// Require [`Capability::ManagePeople`] in a group the person is active in.
pub(crate) fn authorize_person(
  ability: &Ability,
  person_id: Uuid,
  roles: &[Role],
  today: chrono::NaiveDate,
) -> Result<()> {
  if ability.actor == Some(person_id) {
    return Ok(());
  }
  let groups: Vec<Uuid> = roles
    .iter()
    .filter(|r| r.is_active(today))
    .map(|r| r.group_id)
    .collect();
  if groups.iter().any(|g| ability.can(Capability::ManagePeople, *g)) {
    Ok(())
  } else {
    Err(Error::Unauthorized {
      capability: Capability::ManagePeople,
      group_id:   groups.first().copied().unwrap_or(Uuid::nil()),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn phone(label: &str, number: &str) -> PhoneNumber {
    PhoneNumber {
      account_id: Uuid::new_v4(),
      person_id:  Uuid::new_v4(),
      label:      label.into(),
      number:     number.into(),
      public:     true,
    }
  }

  #[test]
  fn keys_are_canonical() {
    assert_eq!(contact_key("phone_number", "Mobile"), "phone_number_mobile");
    assert_eq!(
      contact_key("social_account", " Web site / Blog "),
      "social_account_web_site_blog"
    );
    assert_eq!(phone("Work", "031 000 00 00").key(), "phone_number_work");
  }

  #[test]
  fn normalize_reuses_stored_spelling() {
    let used = vec!["Foo".to_owned()];
    assert_eq!(normalize_label("fOO", used.iter().map(String::as_str)), "Foo");
    assert_eq!(normalize_label(" Bar ", used.iter().map(String::as_str)), "Bar");
  }

  #[test]
  fn build_rejects_trailing_dot() {
    let outcome = NewContactAccount::SocialAccount {
      label:  "Foo.".into(),
      name:   "@foo".into(),
      public: true,
    }
    .build(Uuid::new_v4(), &[]);
    assert_eq!(outcome.errors().unwrap().on("label").len(), 1);
  }

  #[test]
  fn build_lowercases_email_and_matches_predefined_label() {
    let account = NewContactAccount::AdditionalEmail {
      label:    "work".into(),
      email:    "TesTer@gMaiL.com".into(),
      public:   true,
      mailings: false,
    }
    .build(Uuid::new_v4(), &[])
    .applied()
    .unwrap();
    assert_eq!(account.label(), "Work");
    assert_eq!(account.value(), "tester@gmail.com");
  }

  #[test]
  fn build_rejects_invalid_email() {
    let outcome = NewContactAccount::AdditionalEmail {
      label:    "Other".into(),
      email:    "blabliblu-ke-email".into(),
      public:   true,
      mailings: true,
    }
    .build(Uuid::new_v4(), &[]);
    assert_eq!(outcome.errors().unwrap().on("email"), ["is invalid"]);
  }

  #[test]
  fn address_value_is_one_line() {
    let account = NewContactAccount::AdditionalAddress {
      label:       "Billing".into(),
      street:      "Belpstrasse".into(),
      housenumber: Some("37".into()),
      zip_code:    "3007".into(),
      town:        "Bern".into(),
      country:     None,
      public:      true,
    }
    .build(Uuid::new_v4(), &[])
    .applied()
    .unwrap();
    assert_eq!(account.value(), "Belpstrasse 37, 3007 Bern");
  }

  #[test]
  fn json_parts_roundtrip_through_category() {
    let account = AnyContactAccount::PhoneNumber(phone("Mobile", "079"));
    let json = account.to_json().unwrap();
    let back = AnyContactAccount::from_parts("phone_number", json).unwrap();
    assert_eq!(back, account);
    assert!(AnyContactAccount::from_parts("fax", serde_json::Value::Null).is_err());
  }
}

//! People and their validation rules.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Errors, Result,
  ability::Ability,
  change::Change,
  contact::authorize_person,
  date,
  store::MembershipStore,
};

/// Gender as stored: `m`, `w`, or unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
  M,
  W,
}

impl Gender {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::M => "m",
      Self::W => "w",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s.trim() {
      "m" => Some(Self::M),
      "w" => Some(Self::W),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
  pub person_id:                  Uuid,
  pub first_name:                 Option<String>,
  pub last_name:                  Option<String>,
  pub nickname:                   Option<String>,
  pub company_name:               Option<String>,
  pub company:                    bool,
  pub email:                      Option<String>,
  pub street:                     Option<String>,
  pub housenumber:                Option<String>,
  pub zip_code:                   Option<String>,
  pub town:                       Option<String>,
  /// ISO 3166 alpha-2 code.
  pub country:                    Option<String>,
  pub gender:                     Option<Gender>,
  pub birthday:                   Option<NaiveDate>,
  pub primary_group_id:           Option<Uuid>,
  pub privacy_policy_accepted_at: Option<DateTime<Utc>>,
  pub created_at:                 DateTime<Utc>,
}

impl Person {
  /// Street and house number on one line.
  pub fn address(&self) -> Option<String> {
    let line = [self.street.as_deref(), self.housenumber.as_deref()]
      .into_iter()
      .flatten()
      .filter(|s| !s.trim().is_empty())
      .collect::<Vec<_>>()
      .join(" ");
    (!line.is_empty()).then_some(line)
  }

  pub fn country_label(&self) -> Option<String> {
    self.country.as_deref().map(country_name)
  }

  pub fn gender_label(&self) -> &'static str {
    match self.gender {
      Some(Gender::M) => "male",
      Some(Gender::W) => "female",
      None => "unknown",
    }
  }

  /// Display name: company name for companies, otherwise the personal name
  /// followed by the nickname.
  pub fn display_name(&self) -> String {
    if self.company
      && let Some(c) = self.company_name.as_deref().filter(|c| !c.is_empty())
    {
      return c.to_owned();
    }
    let name = [self.first_name.as_deref(), self.last_name.as_deref()]
      .into_iter()
      .flatten()
      .collect::<Vec<_>>()
      .join(" ");
    match self.nickname.as_deref().filter(|n| !n.is_empty()) {
      Some(nick) if name.is_empty() => nick.to_owned(),
      Some(nick) => format!("{name} / {nick}"),
      None => name,
    }
  }

  pub fn validate(&self) -> Errors {
    let mut errors = Errors::new();
    let has_name = [
      &self.first_name,
      &self.last_name,
      &self.nickname,
      &self.company_name,
    ]
    .into_iter()
    .any(|n| n.as_deref().is_some_and(|n| !n.trim().is_empty()));
    if !has_name {
      errors.add(crate::validation::BASE, "Please enter a name");
    }
    if self.company && self.company_name.as_deref().is_none_or(str::is_empty) {
      errors.add("company_name", "can't be blank for companies");
    }
    if let Some(email) = &self.email
      && !is_valid_email(email)
    {
      errors.add("email", "is invalid");
    }
    errors
  }
}

/// Attributes for creating a person, as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPerson {
  pub first_name:              Option<String>,
  pub last_name:               Option<String>,
  pub nickname:                Option<String>,
  pub company_name:            Option<String>,
  #[serde(default)]
  pub company:                 bool,
  pub email:                   Option<String>,
  pub street:                  Option<String>,
  pub housenumber:             Option<String>,
  pub zip_code:                Option<String>,
  pub town:                    Option<String>,
  pub country:                 Option<String>,
  pub gender:                  Option<String>,
  pub birthday:                Option<String>,
  #[serde(default)]
  pub privacy_policy_accepted: Option<bool>,
}

impl NewPerson {
  pub fn privacy_policy_accepted(&self) -> bool {
    self.privacy_policy_accepted.unwrap_or(false)
  }

  /// Build an unsaved person. Blank strings become `None`, the email is
  /// lowercased and the birthday is parsed leniently.
  pub fn build(&self) -> Person {
    Person {
      person_id:                  Uuid::new_v4(),
      first_name:                 presence(&self.first_name),
      last_name:                  presence(&self.last_name),
      nickname:                   presence(&self.nickname),
      company_name:               presence(&self.company_name),
      company:                    self.company,
      email:                      presence(&self.email).map(|e| e.to_lowercase()),
      street:                     presence(&self.street),
      housenumber:                presence(&self.housenumber),
      zip_code:                   presence(&self.zip_code),
      town:                       presence(&self.town),
      country:                    presence(&self.country).map(|c| c.to_uppercase()),
      gender:                     self.gender.as_deref().and_then(Gender::parse),
      birthday:                   date::parse_optional(self.birthday.as_deref()),
      primary_group_id:           None,
      privacy_policy_accepted_at: None,
      created_at:                 Utc::now(),
    }
  }
}

/// Trimmed, non-blank, deduplicated and sorted.
pub fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
  let mut tags: Vec<String> = tags
    .into_iter()
    .map(|t| t.trim().to_owned())
    .filter(|t| !t.is_empty())
    .collect();
  tags.sort();
  tags.dedup();
  tags
}

/// Replace the tags of a person.
pub async fn set_tags<S: MembershipStore>(
  store: &S,
  ability: &Ability,
  person_id: Uuid,
  tags: Vec<String>,
) -> Result<Vec<String>> {
  store
    .get_person(person_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::PersonNotFound(person_id))?;
  let roles = store.person_roles(person_id).await.map_err(Error::store)?;
  authorize_person(ability, person_id, &roles, date::today())?;

  let tags = normalize_tags(tags);
  store
    .apply(vec![Change::SetTags { person_id, tags: tags.clone() }])
    .await
    .map_err(Error::store)?;
  tracing::info!(%person_id, count = tags.len(), "set tags");
  Ok(tags)
}

fn presence(s: &Option<String>) -> Option<String> {
  s.as_deref()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_owned)
}

/// Syntactic check only: one `@`, a non-empty local part and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
  let Some((local, domain)) = email.split_once('@') else {
    return false;
  };
  !local.is_empty()
    && !domain.contains('@')
    && !email.chars().any(char::is_whitespace)
    && domain
      .split('.')
      .filter(|part| !part.is_empty())
      .count()
      >= 2
    && !domain.starts_with('.')
    && !domain.ends_with('.')
}

/// English country name for the codes in common use, else the code itself.
pub fn country_name(code: &str) -> String {
  let name = match code.to_uppercase().as_str() {
    "CH" => "Switzerland",
    "LI" => "Liechtenstein",
    "DE" => "Germany",
    "AT" => "Austria",
    "FR" => "France",
    "IT" => "Italy",
    "NL" => "Netherlands",
    "BE" => "Belgium",
    "LU" => "Luxembourg",
    "ES" => "Spain",
    "GB" => "United Kingdom",
    "US" => "United States",
    other => return other.to_owned(),
  };
  name.to_owned()
}

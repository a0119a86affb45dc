//! HTTP Basic authentication against the configured accounts.
//!
//! A successful login yields the account's [`Ability`], which is attached to
//! the request as an extension for the API handlers.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, header},
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use roster_core::ability::{Ability, Capability};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Error;

/// One login and what it may do.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  #[serde(default)]
  pub capabilities:  Vec<Capability>,
  /// Groups the capabilities apply to. Omitted means every group.
  #[serde(default)]
  pub groups:        Option<Vec<Uuid>>,
  /// The person this account belongs to, if any.
  #[serde(default)]
  pub person_id:     Option<Uuid>,
}

impl Account {
  pub fn ability(&self) -> Ability {
    let mut ability = Ability::new(self.capabilities.iter().copied());
    if let Some(groups) = &self.groups {
      ability = ability.in_groups(groups.iter().copied());
    }
    if let Some(person_id) = self.person_id {
      ability = ability.acting_as(person_id);
    }
    ability
  }
}

/// Verify the `Authorization` header and return the matching account's
/// ability.
pub fn verify_auth(headers: &HeaderMap, accounts: &[Account]) -> Result<Ability, Error> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  let account = accounts
    .iter()
    .find(|a| a.username == username)
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&account.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(account.ability())
}

/// Middleware rejecting unauthenticated requests with 401.
pub async fn require_auth(
  State(accounts): State<Arc<Vec<Account>>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  let ability = verify_auth(req.headers(), &accounts).inspect_err(|_| {
    tracing::debug!(uri = %req.uri(), "rejected credentials");
  })?;
  req.extensions_mut().insert(ability);
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHasher, password_hash::SaltString};
  use rand_core::OsRng;

  use super::*;

  fn account(password: &str) -> Account {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    Account {
      username:      "treasurer".to_string(),
      password_hash: hash,
      capabilities:  vec![Capability::Show, Capability::Finance],
      groups:        Some(vec![Uuid::from_u128(7)]),
      person_id:     None,
    }
  }

  fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, value.parse().unwrap());
    headers
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  #[test]
  fn correct_credentials_yield_the_account_ability() {
    let accounts = [account("secret")];
    let ability = verify_auth(&headers(&basic("treasurer", "secret")), &accounts)
      .unwrap();
    assert!(ability.can(Capability::Finance, Uuid::from_u128(7)));
    assert!(!ability.can(Capability::Finance, Uuid::from_u128(8)));
    assert!(!ability.can(Capability::CreateRole, Uuid::from_u128(7)));
  }

  #[test]
  fn wrong_password() {
    let accounts = [account("secret")];
    let result = verify_auth(&headers(&basic("treasurer", "wrong")), &accounts);
    assert!(matches!(result, Err(Error::Unauthorized)));
  }

  #[test]
  fn unknown_user() {
    let accounts = [account("secret")];
    let result = verify_auth(&headers(&basic("someone", "secret")), &accounts);
    assert!(matches!(result, Err(Error::Unauthorized)));
  }

  #[test]
  fn missing_header() {
    let result = verify_auth(&HeaderMap::new(), &[account("secret")]);
    assert!(matches!(result, Err(Error::Unauthorized)));
  }

  #[test]
  fn invalid_base64() {
    let result = verify_auth(&headers("Basic !!!not-base64!!!"), &[account("secret")]);
    assert!(matches!(result, Err(Error::Unauthorized)));
  }

  #[test]
  fn person_accounts_act_as_themselves() {
    let person_id = Uuid::new_v4();
    let ability = Account { person_id: Some(person_id), ..account("secret") }.ability();
    assert!(ability.can_show_person(person_id, []));
  }
}

//! HTTP server for Roster.
//!
//! Wraps the [`roster_api`] router with Basic authentication and request
//! tracing, and holds the runtime configuration.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::{Path, PathBuf}, sync::Arc};

use axum::{Router, middleware};
use roster_api::{ApiState, ExportSettings};
use roster_core::{
  group::GroupTypeRegistry,
  invoices::InvoiceSettings,
  roles::RoleSettings,
  store::MembershipStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{Account, require_auth};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:        String,
  pub port:        u16,
  pub store_path:  PathBuf,
  #[serde(default)]
  pub accounts:    Vec<Account>,
  #[serde(default)]
  pub group_types: GroupTypeRegistry,
  #[serde(default)]
  pub roles:       RoleSettings,
  #[serde(default)]
  pub invoices:    InvoiceSettings,
  #[serde(default)]
  pub export:      ExportSettings,
}

impl ServerConfig {
  /// Read `path` (optional) and `ROSTER_`-prefixed environment variables.
  /// Nested keys use a double underscore, e.g. `ROSTER_EXPORT__BATCH_SIZE`.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("ROSTER")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Build the API state for `store` from the configured settings.
pub fn api_state<S>(store: Arc<S>, config: &ServerConfig) -> ApiState<S> {
  ApiState {
    store,
    registry: Arc::new(config.group_types.clone()),
    roles:    Arc::new(config.roles.clone()),
    invoices: Arc::new(config.invoices.clone()),
    export:   Arc::new(config.export.clone()),
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the server [`Router`]: the API under `/api`, every request
/// authenticated against `accounts`.
pub fn router<S>(state: ApiState<S>, accounts: Vec<Account>) -> Router
where
  S: MembershipStore + 'static,
{
  Router::new()
    .nest("/api", roster_api::api_router(state))
    .layer(middleware::from_fn_with_state(Arc::new(accounts), require_auth))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use rand_core::OsRng;
  use roster_core::ability::Capability;
  use roster_store_sqlite::SqliteStore;
  use serde_json::Value;
  use tower::ServiceExt as _;
  use uuid::Uuid;

  const CONFIG: &str = r#"
host = "127.0.0.1"
port = 8080
store_path = "~/.local/share/roster/roster.db"

[[accounts]]
username = "admin"
password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaA"
capabilities = ["show", "create_role", "finance"]

[[accounts]]
username = "coach"
password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaA"
capabilities = ["show"]
groups = ["00000000-0000-0000-0000-000000000007"]

[[group_types]]
name = "club"
layer = true
role_types = [{ name = "member", label = "Member" }]

[invoices]
due_days = 14

[export]
batch_size = 250
"#;

  fn hash(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string()
  }

  async fn app(accounts: Vec<Account>) -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let config = ServerConfig {
      host:        "127.0.0.1".to_string(),
      port:        8080,
      store_path:  PathBuf::from(":memory:"),
      accounts:    accounts.clone(),
      group_types: GroupTypeRegistry::default(),
      roles:       RoleSettings::default(),
      invoices:    InvoiceSettings::default(),
      export:      ExportSettings::default(),
    };
    router(api_state(Arc::new(store), &config), accounts)
  }

  fn account(username: &str, password: &str, capabilities: Vec<Capability>) -> Account {
    Account {
      username: username.to_string(),
      password_hash: hash(password),
      capabilities,
      groups: None,
      person_id: None,
    }
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn get(app: Router, uri: &str, auth: Option<String>) -> axum::response::Response {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
  }

  #[test]
  fn config_reads_accounts_and_settings() {
    let path = std::env::temp_dir().join(format!("roster-{}.toml", Uuid::new_v4()));
    std::fs::write(&path, CONFIG).unwrap();
    let config = ServerConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.port, 8080);
    assert_eq!(config.accounts.len(), 2);
    assert_eq!(
      config.accounts[0].capabilities,
      vec![Capability::Show, Capability::CreateRole, Capability::Finance]
    );
    let coach = config.accounts[1].ability();
    assert!(coach.can(Capability::Show, Uuid::from_u128(7)));
    assert!(!coach.can(Capability::Show, Uuid::from_u128(8)));
    assert!(config.group_types.find("club").is_some_and(|t| t.layer));
    assert_eq!(config.invoices.due_days, 14);
    assert_eq!(config.roles.minimum_days_to_archive, 7);
    assert_eq!(config.export.batch_size, 250);
  }

  #[tokio::test]
  async fn missing_credentials_are_401() {
    let app = app(vec![account("admin", "secret", vec![Capability::Show])]).await;
    let resp = get(app, "/api/groups", None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
      resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
      "Basic realm=\"roster\""
    );
  }

  #[tokio::test]
  async fn wrong_password_is_401() {
    let app = app(vec![account("admin", "secret", vec![Capability::Show])]).await;
    let resp = get(app, "/api/groups", Some(auth_header("admin", "nope"))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn authenticated_requests_reach_the_api() {
    let app = app(vec![account("admin", "secret", vec![Capability::Show])]).await;
    let resp = get(app, "/api/groups", Some(auth_header("admin", "secret"))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let groups: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(groups, Value::Array(Vec::new()));
  }

  #[tokio::test]
  async fn the_account_ability_is_enforced() {
    let app = app(vec![account("viewer", "secret", vec![Capability::Show])]).await;
    let req = Request::builder()
      .method("POST")
      .uri("/api/qualification_kinds")
      .header(header::AUTHORIZATION, auth_header("viewer", "secret"))
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(r#"{"label": "First aid"}"#))
      .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }
}

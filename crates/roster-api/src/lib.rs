//! JSON REST API for Roster.
//!
//! Exposes an axum [`Router`] backed by any
//! [`roster_core::store::MembershipStore`]. Every request must carry the
//! acting [`Ability`] as a request extension; authentication is the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", roster_api::api_router(state))
//! ```

pub mod error;
pub mod export;
pub mod groups;
pub mod invoices;
pub mod people;
pub mod qualifications;
pub mod roles;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use roster_core::{
  group::GroupTypeRegistry,
  invoices::InvoiceSettings,
  roles::RoleSettings,
  store::MembershipStore,
};
use roster_export::tabular::DEFAULT_BATCH_SIZE;
use serde::Deserialize;

pub use error::ApiError;
#[doc(no_inline)]
pub use roster_core::ability::Ability;

// ─── State ───────────────────────────────────────────────────────────────────

fn default_batch_size() -> usize { DEFAULT_BATCH_SIZE }

/// Export tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportSettings {
  #[serde(default = "default_batch_size")]
  pub batch_size: usize,
}

impl Default for ExportSettings {
  fn default() -> Self { Self { batch_size: default_batch_size() } }
}

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:    Arc<S>,
  pub registry: Arc<GroupTypeRegistry>,
  pub roles:    Arc<RoleSettings>,
  pub invoices: Arc<InvoiceSettings>,
  pub export:   Arc<ExportSettings>,
}

impl<S> ApiState<S> {
  pub fn new(store: Arc<S>, registry: GroupTypeRegistry) -> Self {
    Self {
      store,
      registry: Arc::new(registry),
      roles: Arc::default(),
      invoices: Arc::default(),
      export: Arc::default(),
    }
  }
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      registry: Arc::clone(&self.registry),
      roles:    Arc::clone(&self.roles),
      invoices: Arc::clone(&self.invoices),
      export:   Arc::clone(&self.export),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: MembershipStore + 'static,
{
  Router::new()
    // Groups
    .route("/groups", get(groups::list::<S>).post(groups::create::<S>))
    .route("/groups/{id}", get(groups::get_one::<S>))
    .route("/groups/{id}/people/export", get(export::people::<S>))
    .route("/groups/{id}/roles", post(roles::create::<S>))
    .route("/groups/{id}/invoices", post(invoices::create::<S>))
    // Roles
    .route("/roles/{id}", put(roles::update::<S>).delete(roles::destroy::<S>))
    // People
    .route("/people/{id}", get(people::get_one::<S>))
    .route("/people/{id}/tags", put(people::set_tags::<S>))
    .route("/people/{id}/contact_accounts", post(people::add_contact_account::<S>))
    .route("/people/{id}/qualifications", post(qualifications::add::<S>))
    // Qualification kinds
    .route(
      "/qualification_kinds",
      get(qualifications::list_kinds::<S>).post(qualifications::create_kind::<S>),
    )
    // Invoices
    .route("/invoices/{id}", get(invoices::get_one::<S>))
    .route("/invoices/{id}/issue", post(invoices::issue::<S>))
    .route("/invoices/{id}/send", post(invoices::send::<S>))
    .route("/invoices/{id}/remind", post(invoices::remind::<S>))
    .route("/invoices/{id}/cancel", post(invoices::cancel::<S>))
    .route("/invoices/{id}/payments", post(invoices::add_payment::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;

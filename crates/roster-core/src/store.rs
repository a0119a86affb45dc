//! The `MembershipStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `roster-store-sqlite`).
//! The workflows in this crate and the HTTP layer depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  change::Change,
  contact::ContactCategory,
  group::Group,
  invoice::{Invoice, Payment},
  person::Person,
  qualification::QualificationKind,
  record::PersonRecord,
  role::Role,
};

/// Abstraction over a Roster store backend.
///
/// Reads are individual queries; every write goes through [`apply`], which
/// persists a batch of [`Change`]s in a single transaction.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
///
/// [`apply`]: MembershipStore::apply
pub trait MembershipStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Groups ────────────────────────────────────────────────────────────

  fn get_group(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + '_;

  /// All groups, ordered by name.
  fn list_groups(
    &self,
  ) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + '_;

  // ── People ────────────────────────────────────────────────────────────

  fn get_person(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + '_;

  /// Materialise the read model for one person, with roles active on
  /// `as_of`. Returns `None` if the person does not exist.
  fn person_record(
    &self,
    id: Uuid,
    as_of: NaiveDate,
  ) -> impl Future<Output = Result<Option<PersonRecord>, Self::Error>> + Send + '_;

  /// One page of the people holding a role in `group_id` that is active on
  /// `as_of`, ordered by last name, first name and id.
  fn people_in_group(
    &self,
    group_id: Uuid,
    as_of: NaiveDate,
    offset: usize,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<PersonRecord>, Self::Error>> + Send + '_;

  // ── Roles ─────────────────────────────────────────────────────────────

  fn get_role(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Role>, Self::Error>> + Send + '_;

  /// Every role of a person, ended ones included, oldest first.
  fn person_roles(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Role>, Self::Error>> + Send + '_;

  // ── Contact accounts ──────────────────────────────────────────────────

  /// Distinct labels stored for a category across all people.
  fn used_labels(
    &self,
    category: ContactCategory,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Distinct `(category, label)` pairs used by people with an active role
  /// in `group_id`, ordered by category then label.
  fn contact_labels(
    &self,
    group_id: Uuid,
    as_of: NaiveDate,
  ) -> impl Future<Output = Result<Vec<(ContactCategory, String)>, Self::Error>>
  + Send
  + '_;

  // ── Qualifications ────────────────────────────────────────────────────

  fn get_qualification_kind(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<QualificationKind>, Self::Error>>
  + Send
  + '_;

  /// All qualification kinds, ordered by label.
  fn list_qualification_kinds(
    &self,
  ) -> impl Future<Output = Result<Vec<QualificationKind>, Self::Error>> + Send + '_;

  // ── Invoices ──────────────────────────────────────────────────────────

  fn get_invoice(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Invoice>, Self::Error>> + Send + '_;

  /// Payments of an invoice, oldest first.
  fn invoice_payments(
    &self,
    invoice_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Payment>, Self::Error>> + Send + '_;

  /// Number of invoices of a group that have been issued a sequence number.
  fn count_issued_invoices(
    &self,
    group_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist `changes` in order inside one transaction. Either every change
  /// is visible afterwards or none is.
  fn apply(
    &self,
    changes: Vec<Change>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

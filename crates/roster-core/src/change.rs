//! Writes as values.
//!
//! Mutating operations compute a list of [`Change`]s and hand the whole list
//! to [`MembershipStore::apply`](crate::store::MembershipStore::apply), which
//! persists it all-or-nothing.

use uuid::Uuid;

use crate::{
  contact::AnyContactAccount,
  group::Group,
  invoice::{Invoice, Payment},
  person::Person,
  qualification::{Qualification, QualificationKind},
  role::Role,
};

/// One write inside an atomic batch.
///
/// Updates and deletes of records that do not exist fail the whole batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
  InsertGroup(Group),
  InsertPerson(Person),
  UpdatePerson(Person),
  SetTags { person_id: Uuid, tags: Vec<String> },
  InsertRole(Role),
  UpdateRole(Role),
  DeleteRole(Uuid),
  InsertContactAccount(AnyContactAccount),
  InsertQualificationKind(QualificationKind),
  InsertQualification(Qualification),
  InsertInvoice(Invoice),
  UpdateInvoice(Invoice),
  InsertPayment(Payment),
}

impl Change {
  /// Short name for logging.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::InsertGroup(_) => "insert_group",
      Self::InsertPerson(_) => "insert_person",
      Self::UpdatePerson(_) => "update_person",
      Self::SetTags { .. } => "set_tags",
      Self::InsertRole(_) => "insert_role",
      Self::UpdateRole(_) => "update_role",
      Self::DeleteRole(_) => "delete_role",
      Self::InsertContactAccount(_) => "insert_contact_account",
      Self::InsertQualificationKind(_) => "insert_qualification_kind",
      Self::InsertQualification(_) => "insert_qualification",
      Self::InsertInvoice(_) => "insert_invoice",
      Self::UpdateInvoice(_) => "update_invoice",
      Self::InsertPayment(_) => "insert_payment",
    }
  }
}

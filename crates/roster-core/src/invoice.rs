//! Invoices, their items and payments, and the state machine between them.
//!
//! Amounts are integer cents. The state of an invoice past `sent` is derived
//! from the payments received: see [`Invoice::reconcile`].

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Errors, Outcome, Result};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvoiceState {
  Draft,
  Issued,
  Sent,
  Reminded,
  Partial,
  Payed,
  Excess,
  Cancelled,
}

impl InvoiceState {
  /// States in which a payment may be recorded.
  pub fn accepts_payments(self) -> bool {
    matches!(
      self,
      Self::Issued
        | Self::Sent
        | Self::Reminded
        | Self::Partial
        | Self::Payed
        | Self::Excess
    )
  }

  /// States that can no longer be cancelled.
  pub fn is_final(self) -> bool {
    matches!(self, Self::Payed | Self::Excess | Self::Cancelled)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
  pub name:      String,
  /// Price of one unit in cents.
  pub unit_cost: i64,
  pub count:     u32,
}

impl InvoiceItem {
  /// `None` when the product does not fit into an `i64`.
  pub fn checked_total(&self) -> Option<i64> {
    self.unit_cost.checked_mul(i64::from(self.count))
  }

  pub fn total(&self) -> i64 {
    self.unit_cost.saturating_mul(i64::from(self.count))
  }
}

/// Sum of `amounts`, or `None` on overflow.
pub fn checked_sum(amounts: impl IntoIterator<Item = i64>) -> Option<i64> {
  amounts.into_iter().try_fold(0_i64, i64::checked_add)
}

fn checked_items_total(items: &[InvoiceItem]) -> Option<i64> {
  items
    .iter()
    .try_fold(0_i64, |sum, item| sum.checked_add(item.checked_total()?))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
  pub invoice_id:      Uuid,
  pub group_id:        Uuid,
  pub recipient_id:    Uuid,
  pub title:           String,
  pub items:           Vec<InvoiceItem>,
  pub state:           InvoiceState,
  /// Assigned when the invoice is issued.
  pub sequence_number: Option<String>,
  pub issued_at:       Option<NaiveDate>,
  pub sent_at:         Option<NaiveDate>,
  pub due_at:          Option<NaiveDate>,
  /// Sum of all payments, in cents.
  pub amount_paid:     i64,
  pub created_at:      DateTime<Utc>,
}

impl Invoice {
  /// `None` when an item total or their sum overflows.
  pub fn checked_total(&self) -> Option<i64> {
    checked_items_total(&self.items)
  }

  pub fn total(&self) -> i64 {
    self.items.iter().map(InvoiceItem::total).fold(0, i64::saturating_add)
  }

  pub fn amount_open(&self) -> i64 {
    self.total().saturating_sub(self.amount_paid).max(0)
  }

  fn transition(&mut self, to: InvoiceState, allowed: bool) -> Result<()> {
    if !allowed {
      return Err(Error::InvalidTransition { from: self.state, to });
    }
    self.state = to;
    Ok(())
  }

  /// `draft → issued`, assigning the sequence number and due date.
  pub fn issue(
    &mut self,
    sequence_number: String,
    today: NaiveDate,
    due_days: u32,
  ) -> Result<()> {
    self.transition(InvoiceState::Issued, self.state == InvoiceState::Draft)?;
    self.sequence_number = Some(sequence_number);
    self.issued_at = Some(today);
    self.due_at = today.checked_add_days(Days::new(u64::from(due_days)));
    Ok(())
  }

  /// `issued → sent`. Drafts must be issued first.
  pub fn send(&mut self, today: NaiveDate) -> Result<()> {
    self.transition(InvoiceState::Sent, self.state == InvoiceState::Issued)?;
    self.sent_at = Some(today);
    Ok(())
  }

  pub fn remind(&mut self) -> Result<()> {
    let allowed = matches!(
      self.state,
      InvoiceState::Sent | InvoiceState::Reminded | InvoiceState::Partial
    );
    self.transition(InvoiceState::Reminded, allowed)
  }

  pub fn cancel(&mut self) -> Result<()> {
    let allowed = !self.state.is_final();
    self.transition(InvoiceState::Cancelled, allowed)
  }

  /// Recompute the paid amount from `payments` and derive the state from it.
  ///
  /// Nothing paid leaves the state untouched.
  pub fn reconcile(&mut self, payments: &[Payment]) {
    self.amount_paid = payments
      .iter()
      .map(|p| p.amount)
      .fold(0, i64::saturating_add);
    if self.amount_paid <= 0 {
      return;
    }
    let total = self.total();
    self.state = match self.amount_paid.cmp(&total) {
      std::cmp::Ordering::Less => InvoiceState::Partial,
      std::cmp::Ordering::Equal => InvoiceState::Payed,
      std::cmp::Ordering::Greater => InvoiceState::Excess,
    };
  }
}

/// Invoice input as submitted by a client.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoice {
  pub recipient_id: Uuid,
  pub title:        String,
  #[serde(default)]
  pub items:        Vec<InvoiceItem>,
}

impl NewInvoice {
  pub fn build(self, group_id: Uuid) -> Outcome<Invoice> {
    let mut errors = Errors::new();
    let title = self.title.trim().to_owned();
    if title.is_empty() {
      errors.add("title", "can't be blank");
    }
    if self.items.is_empty() {
      errors.add("items", "must contain at least one item");
    }
    for item in &self.items {
      if item.name.trim().is_empty() {
        errors.add("items", "name can't be blank");
      }
      if item.unit_cost < 0 {
        errors.add("items", "unit cost must not be negative");
      }
    }
    if checked_items_total(&self.items).is_none() {
      errors.add("items", "total is too large");
    }
    errors.into_outcome(Invoice {
      invoice_id: Uuid::new_v4(),
      group_id,
      recipient_id: self.recipient_id,
      title,
      items: self.items,
      state: InvoiceState::Draft,
      sequence_number: None,
      issued_at: None,
      sent_at: None,
      due_at: None,
      amount_paid: 0,
      created_at: Utc::now(),
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
  pub payment_id:  Uuid,
  pub invoice_id:  Uuid,
  /// Amount in cents.
  pub amount:      i64,
  pub received_at: NaiveDate,
  pub reference:   Option<String>,
}

/// Payment input as submitted by a client.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
  pub amount:      i64,
  pub received_at: Option<String>,
  pub reference:   Option<String>,
}

impl NewPayment {
  /// Build the payment; a missing or unparsable date means `today`.
  pub fn build(self, invoice_id: Uuid, today: NaiveDate) -> Outcome<Payment> {
    let mut errors = Errors::new();
    if self.amount <= 0 {
      errors.add("amount", "must be greater than 0");
    }
    errors.into_outcome(Payment {
      payment_id: Uuid::new_v4(),
      invoice_id,
      amount: self.amount,
      received_at: crate::date::parse_optional(self.received_at.as_deref())
        .unwrap_or(today),
      reference: self.reference.filter(|r| !r.trim().is_empty()),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn invoice() -> Invoice {
    NewInvoice {
      recipient_id: Uuid::new_v4(),
      title:        "Membership fee".into(),
      items:        vec![
        InvoiceItem { name: "Fee".into(), unit_cost: 5000, count: 1 },
        InvoiceItem { name: "Magazine".into(), unit_cost: 1250, count: 2 },
      ],
    }
    .build(Uuid::new_v4())
    .applied()
    .unwrap()
  }

  fn payment(invoice: &Invoice, amount: i64) -> Payment {
    NewPayment { amount, received_at: None, reference: None }
      .build(invoice.invoice_id, date(2024, 1, 1))
      .applied()
      .unwrap()
  }

  #[test]
  fn totals_are_summed_from_items() {
    let inv = invoice();
    assert_eq!(inv.total(), 7500);
    assert_eq!(inv.amount_open(), 7500);
  }

  #[test]
  fn issue_then_send() {
    let mut inv = invoice();
    let today = date(2024, 1, 10);
    assert!(matches!(
      inv.send(today),
      Err(Error::InvalidTransition { from: InvoiceState::Draft, .. })
    ));
    inv.issue("G-1".into(), today, 30).unwrap();
    assert_eq!(inv.due_at, Some(date(2024, 2, 9)));
    inv.send(today).unwrap();
    assert_eq!(inv.state, InvoiceState::Sent);
    inv.remind().unwrap();
    assert_eq!(inv.state, InvoiceState::Reminded);
  }

  #[test]
  fn reconcile_follows_the_paid_amount() {
    let mut inv = invoice();
    inv.issue("G-1".into(), date(2024, 1, 1), 30).unwrap();

    let first = payment(&inv, 2500);
    inv.reconcile(std::slice::from_ref(&first));
    assert_eq!(inv.state, InvoiceState::Partial);
    assert_eq!(inv.amount_open(), 5000);

    let second = payment(&inv, 5000);
    inv.reconcile(&[first.clone(), second.clone()]);
    assert_eq!(inv.state, InvoiceState::Payed);
    assert_eq!(inv.amount_open(), 0);

    inv.reconcile(&[first, second, payment(&inv, 100)]);
    assert_eq!(inv.state, InvoiceState::Excess);
    assert_eq!(inv.amount_open(), 0);
  }

  #[test]
  fn paid_invoices_cannot_be_cancelled() {
    let mut inv = invoice();
    inv.issue("G-1".into(), date(2024, 1, 1), 30).unwrap();
    inv.reconcile(&[payment(&inv, 7500)]);
    assert!(inv.cancel().is_err());

    let mut draft = invoice();
    draft.cancel().unwrap();
    assert!(draft.cancel().is_err());
  }

  #[test]
  fn payments_need_a_positive_amount() {
    let outcome = NewPayment { amount: 0, received_at: None, reference: None }
      .build(Uuid::new_v4(), date(2024, 1, 1));
    assert_eq!(outcome.errors().unwrap().on("amount").len(), 1);
  }

  #[test]
  fn oversized_totals_are_rejected() {
    let outcome = NewInvoice {
      recipient_id: Uuid::new_v4(),
      title:        "Everything".into(),
      items:        vec![InvoiceItem {
        name:      "Fee".into(),
        unit_cost: i64::MAX,
        count:     2,
      }],
    }
    .build(Uuid::new_v4());
    assert_eq!(outcome.errors().unwrap().on("items"), ["total is too large"]);
  }

  #[test]
  fn arithmetic_saturates_instead_of_panicking() {
    let mut inv = invoice();
    inv.items.push(InvoiceItem { name: "Huge".into(), unit_cost: i64::MAX, count: 3 });
    assert_eq!(inv.checked_total(), None);
    assert_eq!(inv.total(), i64::MAX);

    inv.issue("G-1".into(), date(2024, 1, 1), 30).unwrap();
    let huge = payment(&inv, i64::MAX);
    inv.reconcile(&[huge.clone(), huge]);
    assert_eq!(inv.amount_paid, i64::MAX);
    assert_eq!(inv.amount_open(), 0);
    assert_eq!(checked_sum([i64::MAX, 1]), None);
    assert_eq!(checked_sum([2, 3]), Some(5));
  }

  #[test]
  fn drafts_need_items() {
    let outcome = NewInvoice {
      recipient_id: Uuid::new_v4(),
      title:        " ".into(),
      items:        vec![],
    }
    .build(Uuid::new_v4());
    let errors = outcome.errors().unwrap();
    assert_eq!(errors.on("title").len(), 1);
    assert_eq!(errors.on("items").len(), 1);
  }
}

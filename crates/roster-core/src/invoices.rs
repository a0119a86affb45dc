//! Invoice workflow: drafting, state transitions and payment reconciliation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Errors, Outcome, Result,
  ability::{Ability, Capability},
  change::Change,
  date,
  invoice::{
    Invoice, InvoiceState, NewInvoice, NewPayment, Payment, checked_sum,
  },
  store::MembershipStore,
  validation::BASE,
};

fn default_due_days() -> u32 { 30 }

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceSettings {
  /// Days between issuing an invoice and its due date.
  #[serde(default = "default_due_days")]
  pub due_days: u32,
}

impl Default for InvoiceSettings {
  fn default() -> Self { Self { due_days: default_due_days() } }
}

/// The reconciled invoice and the payment that was recorded against it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReceived {
  pub invoice:     Invoice,
  pub payment:     Payment,
  pub amount_open: i64,
}

pub struct InvoiceManager<'a, S> {
  store:    &'a S,
  settings: &'a InvoiceSettings,
  today:    NaiveDate,
}

impl<'a, S: MembershipStore> InvoiceManager<'a, S> {
  pub fn new(store: &'a S, settings: &'a InvoiceSettings) -> Self {
    Self { store, settings, today: date::today() }
  }

  pub fn on(mut self, today: NaiveDate) -> Self {
    self.today = today;
    self
  }

  /// Load an invoice and check the actor may manage its group's finances.
  async fn authorized(&self, ability: &Ability, id: Uuid) -> Result<Invoice> {
    let invoice = self
      .store
      .get_invoice(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::InvoiceNotFound(id))?;
    ability.authorize(Capability::Finance, invoice.group_id)?;
    Ok(invoice)
  }

  async fn save(&self, invoice: &Invoice) -> Result<()> {
    self
      .store
      .apply(vec![Change::UpdateInvoice(invoice.clone())])
      .await
      .map_err(Error::store)
  }

  /// Create a draft invoice in `group_id`.
  pub async fn create(
    &self,
    ability: &Ability,
    group_id: Uuid,
    input: NewInvoice,
  ) -> Result<Outcome<Invoice>> {
    self
      .store
      .get_group(group_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::GroupNotFound(group_id))?;
    ability.authorize(Capability::Finance, group_id)?;

    let recipient = self
      .store
      .get_person(input.recipient_id)
      .await
      .map_err(Error::store)?;

    let mut outcome = input.build(group_id);
    if recipient.is_none() {
      let mut errors = outcome.errors().cloned().unwrap_or_default();
      errors.add("recipient_id", "does not exist");
      outcome = Outcome::Invalid(errors);
    }

    if let Outcome::Applied(invoice) = &outcome {
      self
        .store
        .apply(vec![Change::InsertInvoice(invoice.clone())])
        .await
        .map_err(Error::store)?;
      tracing::info!(
        invoice_id = %invoice.invoice_id,
        %group_id,
        total = invoice.total(),
        "created invoice"
      );
    }
    Ok(outcome)
  }

  async fn issue_invoice(&self, invoice: &mut Invoice) -> Result<()> {
    let issued = self
      .store
      .count_issued_invoices(invoice.group_id)
      .await
      .map_err(Error::store)?;
    let group = invoice.group_id.simple().to_string();
    let sequence_number = format!("{}-{}", &group[..8], issued + 1);
    invoice.issue(sequence_number, self.today, self.settings.due_days)
  }

  pub async fn issue(&self, ability: &Ability, id: Uuid) -> Result<Invoice> {
    let mut invoice = self.authorized(ability, id).await?;
    self.issue_invoice(&mut invoice).await?;
    self.save(&invoice).await?;
    tracing::info!(
      invoice_id = %id,
      sequence_number = ?invoice.sequence_number,
      "issued invoice"
    );
    Ok(invoice)
  }

  /// Mark the invoice as sent, issuing it first if it is still a draft.
  pub async fn send(&self, ability: &Ability, id: Uuid) -> Result<Invoice> {
    let mut invoice = self.authorized(ability, id).await?;
    if invoice.state == InvoiceState::Draft {
      self.issue_invoice(&mut invoice).await?;
    }
    invoice.send(self.today)?;
    self.save(&invoice).await?;
    tracing::info!(invoice_id = %id, "sent invoice");
    Ok(invoice)
  }

  pub async fn remind(&self, ability: &Ability, id: Uuid) -> Result<Invoice> {
    let mut invoice = self.authorized(ability, id).await?;
    invoice.remind()?;
    self.save(&invoice).await?;
    tracing::info!(invoice_id = %id, "reminded invoice");
    Ok(invoice)
  }

  pub async fn cancel(&self, ability: &Ability, id: Uuid) -> Result<Invoice> {
    let mut invoice = self.authorized(ability, id).await?;
    invoice.cancel()?;
    self.save(&invoice).await?;
    tracing::info!(invoice_id = %id, "cancelled invoice");
    Ok(invoice)
  }

  /// Record a payment and reconcile the invoice against all its payments.
  /// The payment and the updated invoice are written together.
  pub async fn add_payment(
    &self,
    ability: &Ability,
    id: Uuid,
    input: NewPayment,
  ) -> Result<Outcome<PaymentReceived>> {
    let mut invoice = self.authorized(ability, id).await?;

    let mut errors = Errors::new();
    if !invoice.state.accepts_payments() {
      errors.add(
        BASE,
        format!("Payments cannot be added to a {} invoice", invoice.state),
      );
    }
    let payment = match input.build(id, self.today) {
      Outcome::Applied(payment) if errors.is_empty() => payment,
      Outcome::Applied(_) => return Ok(Outcome::Invalid(errors)),
      Outcome::Invalid(more) => {
        errors.merge(more);
        return Ok(Outcome::Invalid(errors));
      }
    };

    let mut payments = self
      .store
      .invoice_payments(id)
      .await
      .map_err(Error::store)?;
    payments.push(payment.clone());
    if invoice.checked_total().is_none() {
      errors.add("items", "total is too large");
    }
    if checked_sum(payments.iter().map(|p| p.amount)).is_none() {
      errors.add("amount", "exceeds the largest payable sum");
    }
    if !errors.is_empty() {
      return Ok(Outcome::Invalid(errors));
    }
    invoice.reconcile(&payments);

    self
      .store
      .apply(vec![
        Change::InsertPayment(payment.clone()),
        Change::UpdateInvoice(invoice.clone()),
      ])
      .await
      .map_err(Error::store)?;

    tracing::info!(
      invoice_id = %id,
      amount = payment.amount,
      state = %invoice.state,
      "recorded payment"
    );
    let amount_open = invoice.amount_open();
    Ok(Outcome::Applied(PaymentReceived { invoice, payment, amount_open }))
  }
}

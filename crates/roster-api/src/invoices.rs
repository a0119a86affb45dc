//! Handlers for invoices and payments.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/groups/{id}/invoices` | Creates a draft |
//! | `GET`  | `/invoices/{id}` | Invoice, payments and amount open |
//! | `POST` | `/invoices/{id}/{issue,send,remind,cancel}` | 422 on a forbidden transition |
//! | `POST` | `/invoices/{id}/payments` | Body: `{"amount", "received_at"?, "reference"?}` |

use axum::{
  Extension, Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use roster_core::{
  ability::{Ability, Capability},
  invoice::{Invoice, NewInvoice, NewPayment, Payment},
  invoices::InvoiceManager,
  store::MembershipStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  ApiState,
  error::{ApiError, applied},
};

fn manager<S: MembershipStore>(state: &ApiState<S>) -> InvoiceManager<'_, S> {
  InvoiceManager::new(state.store.as_ref(), &state.invoices)
}

/// `POST /groups/{id}/invoices`
pub async fn create<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(group_id): Path<Uuid>,
  Json(body): Json<NewInvoice>,
) -> Result<impl IntoResponse, ApiError> {
  let outcome = manager(&state).create(&ability, group_id, body).await?;
  Ok((StatusCode::CREATED, Json(applied(outcome)?)))
}

#[derive(Debug, Serialize)]
pub struct InvoiceDetail {
  pub invoice:     Invoice,
  pub payments:    Vec<Payment>,
  pub amount_open: i64,
}

/// `GET /invoices/{id}`
pub async fn get_one<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(id): Path<Uuid>,
) -> Result<Json<InvoiceDetail>, ApiError> {
  let store_err = |e| ApiError::Store(Box::new(e));
  let invoice = state
    .store
    .get_invoice(id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("invoice {id} not found")))?;
  ability.authorize(Capability::Finance, invoice.group_id)?;
  let payments = state.store.invoice_payments(id).await.map_err(store_err)?;
  let amount_open = invoice.amount_open();
  Ok(Json(InvoiceDetail { invoice, payments, amount_open }))
}

/// `POST /invoices/{id}/issue`
pub async fn issue<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
  Ok(Json(manager(&state).issue(&ability, id).await?))
}

/// `POST /invoices/{id}/send`
pub async fn send<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
  Ok(Json(manager(&state).send(&ability, id).await?))
}

/// `POST /invoices/{id}/remind`
pub async fn remind<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
  Ok(Json(manager(&state).remind(&ability, id).await?))
}

/// `POST /invoices/{id}/cancel`
pub async fn cancel<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
  Ok(Json(manager(&state).cancel(&ability, id).await?))
}

/// `POST /invoices/{id}/payments`
pub async fn add_payment<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(id): Path<Uuid>,
  Json(body): Json<NewPayment>,
) -> Result<impl IntoResponse, ApiError> {
  let outcome = manager(&state).add_payment(&ability, id, body).await?;
  Ok((StatusCode::CREATED, Json(applied(outcome)?)))
}

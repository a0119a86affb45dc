//! Handlers for qualification kinds and people's qualifications.

use axum::{
  Extension, Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use roster_core::{
  ability::Ability,
  qualification::{self, NewQualification, NewQualificationKind, QualificationKind},
  store::MembershipStore,
};
use uuid::Uuid;

use crate::{
  ApiState,
  error::{ApiError, applied},
};

/// `GET /qualification_kinds`
pub async fn list_kinds<S: MembershipStore>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<QualificationKind>>, ApiError> {
  let kinds = state
    .store
    .list_qualification_kinds()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(kinds))
}

/// `POST /qualification_kinds`, body: `{"label", "validity_years"?}`
pub async fn create_kind<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Json(body): Json<NewQualificationKind>,
) -> Result<impl IntoResponse, ApiError> {
  let outcome =
    qualification::create_qualification_kind(state.store.as_ref(), &ability, body)
      .await?;
  Ok((StatusCode::CREATED, Json(applied(outcome)?)))
}

/// `POST /people/{id}/qualifications`: `finish_at` is derived from the
/// kind's validity when omitted.
pub async fn add<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(person_id): Path<Uuid>,
  Json(body): Json<NewQualification>,
) -> Result<impl IntoResponse, ApiError> {
  let outcome =
    qualification::add_qualification(state.store.as_ref(), &ability, person_id, body)
      .await?;
  Ok((StatusCode::CREATED, Json(applied(outcome)?)))
}

//! Handlers for `/people/{id}` and its sub-records.

use axum::{
  Extension, Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use roster_core::{
  ability::Ability,
  contact::{self, NewContactAccount},
  date,
  person,
  record::PersonRecord,
  store::MembershipStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  ApiState,
  error::{ApiError, applied},
};

/// `GET /people/{id}`: the person with roles, contacts and qualifications.
/// Visible to the person and to actors who may show one of their groups.
pub async fn get_one<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(id): Path<Uuid>,
) -> Result<Json<PersonRecord>, ApiError> {
  let record = state
    .store
    .person_record(id, date::today())
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("person {id} not found")))?;

  let groups = record.roles.iter().map(|r| r.role.group_id);
  if !ability.can_show_person(id, groups) {
    return Err(ApiError::Forbidden(format!("not allowed to show person {id}")));
  }
  Ok(Json(record))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Tags {
  pub tags: Vec<String>,
}

/// `PUT /people/{id}/tags`, body: `{"tags": [...]}`, replaces all tags.
pub async fn set_tags<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(id): Path<Uuid>,
  Json(body): Json<Tags>,
) -> Result<Json<Tags>, ApiError> {
  let tags = person::set_tags(state.store.as_ref(), &ability, id, body.tags).await?;
  Ok(Json(Tags { tags }))
}

/// `POST /people/{id}/contact_accounts`, body tagged by `category`.
pub async fn add_contact_account<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(id): Path<Uuid>,
  Json(body): Json<NewContactAccount>,
) -> Result<impl IntoResponse, ApiError> {
  let outcome =
    contact::add_contact_account(state.store.as_ref(), &ability, id, body).await?;
  Ok((StatusCode::CREATED, Json(applied(outcome)?)))
}

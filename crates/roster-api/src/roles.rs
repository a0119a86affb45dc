//! Handlers for the role lifecycle.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/groups/{id}/roles` | Body: role request, `person_id` or `new_person` |
//! | `PUT`    | `/roles/{id}` | Changing `group_id` or `type` replaces the role |
//! | `DELETE` | `/roles/{id}` | Ends old roles, deletes recent ones |

use axum::{
  Extension, Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use roster_core::{
  ability::Ability,
  roles::{Destroyed, RoleManager, RoleRequest, RoleUpdate, Updated},
  store::MembershipStore,
};
use uuid::Uuid;

use crate::{
  ApiState,
  error::{ApiError, applied},
};

fn manager<S: MembershipStore>(state: &ApiState<S>) -> RoleManager<'_, S> {
  RoleManager::new(state.store.as_ref(), &state.registry, &state.roles)
}

/// `POST /groups/{id}/roles`
pub async fn create<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(group_id): Path<Uuid>,
  Json(body): Json<RoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
  let outcome = manager(&state).create(&ability, group_id, body).await?;
  Ok((StatusCode::CREATED, Json(applied(outcome)?)))
}

/// `PUT /roles/{id}`
pub async fn update<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(role_id): Path<Uuid>,
  Json(body): Json<RoleUpdate>,
) -> Result<Json<Updated>, ApiError> {
  let outcome = manager(&state).update(&ability, role_id, body).await?;
  Ok(Json(applied(outcome)?))
}

/// `DELETE /roles/{id}`
pub async fn destroy<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(role_id): Path<Uuid>,
) -> Result<Json<Destroyed>, ApiError> {
  Ok(Json(manager(&state).destroy(&ability, role_id).await?))
}

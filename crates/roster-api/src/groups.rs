//! Handlers for `/groups` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/groups` | All groups, by name |
//! | `POST` | `/groups` | Body: `{"name", "group_type", "parent_id"?, "privacy_policy"?}` |
//! | `GET`  | `/groups/{id}` | 404 if not found |

use axum::{
  Extension, Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use roster_core::{
  ability::{Ability, Capability},
  group::{self, Group, NewGroup},
  store::MembershipStore,
};
use uuid::Uuid;

use crate::{
  ApiState,
  error::{ApiError, applied},
};

/// `GET /groups`
pub async fn list<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
) -> Result<Json<Vec<Group>>, ApiError> {
  let groups = state
    .store
    .list_groups()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  let visible = groups
    .into_iter()
    .filter(|g| ability.can(Capability::Show, g.group_id))
    .collect();
  Ok(Json(visible))
}

/// `POST /groups`
pub async fn create<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Json(body): Json<NewGroup>,
) -> Result<impl IntoResponse, ApiError> {
  let outcome =
    group::create_group(state.store.as_ref(), &ability, &state.registry, body).await?;
  Ok((StatusCode::CREATED, Json(applied(outcome)?)))
}

/// `GET /groups/{id}`
pub async fn get_one<S: MembershipStore>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(id): Path<Uuid>,
) -> Result<Json<Group>, ApiError> {
  let group = find(&state, id).await?;
  ability.authorize(Capability::Show, id)?;
  Ok(Json(group))
}

/// Load a group or fail with 404.
pub(crate) async fn find<S: MembershipStore>(
  state: &ApiState<S>,
  id: Uuid,
) -> Result<Group, ApiError> {
  state
    .store
    .get_group(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("group {id} not found")))
}

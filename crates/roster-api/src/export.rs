//! `GET /groups/{id}/people/export`
//!
//! Query: `format=csv|xlsx` (default `xlsx`), `list=address|full` (default
//! `address`). Responds with the column labels and the rows, values already
//! formatted for the requested format.
//!
//! The body is streamed: rows are fetched batch by batch on a spawned task
//! and written as they arrive, so the response never holds the whole group.

use axum::{
  Extension,
  body::Body,
  extract::{Path, Query, State},
  http::header,
  response::{IntoResponse, Response},
};
use roster_core::{
  ability::{Ability, Capability},
  date,
  store::MembershipStore,
};
use roster_export::{Format, PeopleList, people_export};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::{StreamExt as _, wrappers::ReceiverStream};
use uuid::Uuid;

use crate::{ApiState, error::ApiError, groups};

/// Chunks buffered between the export task and the response body.
const CHUNKS_IN_FLIGHT: usize = 16;

type Chunk = Result<String, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
  #[serde(default)]
  pub format: Format,
  #[serde(default)]
  pub list:   PeopleList,
}

pub async fn people<S: MembershipStore + 'static>(
  State(state): State<ApiState<S>>,
  Extension(ability): Extension<Ability>,
  Path(id): Path<Uuid>,
  Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
  groups::find(&state, id).await?;
  ability.authorize(Capability::Show, id)?;

  let (tx, mut rx) = mpsc::channel(CHUNKS_IN_FLIGHT);
  tokio::spawn(stream_people(state, id, params, tx));

  // Setup errors arrive before the head and still get a proper status.
  let head = match rx.recv().await {
    Some(Ok(head)) => head,
    Some(Err(e)) => return Err(e),
    None => return Err(ApiError::Store("people export stopped early".into())),
  };
  let body = tokio_stream::once(Ok(head)).chain(ReceiverStream::new(rx));
  Ok(
    (
      [(header::CONTENT_TYPE, "application/json")],
      Body::from_stream(body),
    )
      .into_response(),
  )
}

async fn stream_people<S: MembershipStore>(
  state: ApiState<S>,
  group_id: Uuid,
  params: ExportParams,
  tx: mpsc::Sender<Chunk>,
) {
  if let Err(e) = write_people(&state, group_id, params, &tx).await {
    tracing::warn!(%group_id, error = %e, "people export failed");
    // Nobody is left to tell when the client went away.
    let _ = tx.send(Err(e)).await;
  }
}

fn encode<T: Serialize>(value: &T) -> Result<String, ApiError> {
  serde_json::to_string(value).map_err(|e| ApiError::Store(Box::new(e)))
}

/// Write `{"attributes":[..],"labels":[..],"rows":[..]}` to `tx`, one row per
/// chunk. Returns early once the receiving side is dropped.
async fn write_people<S: MembershipStore>(
  state: &ApiState<S>,
  group_id: Uuid,
  params: ExportParams,
  tx: &mpsc::Sender<Chunk>,
) -> Result<(), ApiError> {
  let export = people_export(
    state.store.as_ref(),
    &state.registry,
    group_id,
    params.list,
    date::today(),
    state.export.batch_size,
  )
  .await?;

  let head = format!(
    "{{\"attributes\":{},\"labels\":{},\"rows\":[",
    encode(&export.attributes())?,
    encode(&export.labels())?,
  );
  if tx.send(Ok(head)).await.is_err() {
    return Ok(());
  }

  let mut cursor = export.data_rows(params.format);
  let mut written = 0_usize;
  while let Some(row) = cursor.next().await? {
    let row = encode(&row)?;
    let chunk = if written == 0 { row } else { format!(",{row}") };
    if tx.send(Ok(chunk)).await.is_err() {
      tracing::debug!(%group_id, written, "export client went away");
      return Ok(());
    }
    written += 1;
  }
  // A closed channel here only means the client is gone.
  let _ = tx.send(Ok("]}".to_owned())).await;
  tracing::debug!(%group_id, rows = written, "streamed people export");
  Ok(())
}

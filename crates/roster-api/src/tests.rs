//! Router tests against an in-memory `SqliteStore`.

use std::sync::Arc;

use axum::{
  Extension, Router,
  body::{Body, to_bytes},
  http::{Request, StatusCode, header},
};
use roster_core::{
  ability::{Ability, Capability},
  group::{GroupType, GroupTypeRegistry, RoleType},
};
use roster_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use super::*;

fn role_type(name: &str, label: &str) -> RoleType {
  RoleType { name: name.into(), label: label.into() }
}

fn registry() -> GroupTypeRegistry {
  GroupTypeRegistry::new(vec![
    GroupType {
      name:          "federation".into(),
      layer:         true,
      role_types:    vec![role_type("president", "President")],
      standard_role: None,
    },
    GroupType {
      name:          "club".into(),
      layer:         true,
      role_types:    vec![
        role_type("member", "Member"),
        role_type("coach", "Coach"),
      ],
      standard_role: Some("member".into()),
    },
  ])
}

async fn make_state() -> ApiState<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  ApiState::new(Arc::new(store), registry())
}

fn app(state: &ApiState<SqliteStore>, ability: Ability) -> Router {
  api_router(state.clone()).layer(Extension(ability))
}

async fn call(
  app: Router,
  method: &str,
  uri: &str,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(json) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(json.to_string())
    }
    None => Body::empty(),
  };
  let resp = app.oneshot(builder.body(body).unwrap()).await.unwrap();
  let status = resp.status();
  let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let json = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, json)
}

fn id_of(json: &Value, field: &str) -> String {
  json[field].as_str().unwrap().to_owned()
}

/// A federation with one club below it; returns both ids.
async fn seed_groups(state: &ApiState<SqliteStore>) -> (String, String) {
  let root = || app(state, Ability::root());
  let (status, federation) = call(
    root(),
    "POST",
    "/groups",
    Some(json!({ "name": "Federation", "group_type": "federation" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let federation = id_of(&federation, "group_id");

  let (status, club) = call(
    root(),
    "POST",
    "/groups",
    Some(json!({
      "name": "Club",
      "group_type": "club",
      "parent_id": federation,
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  (federation, id_of(&club, "group_id"))
}

// ── Groups ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_group_is_404() {
  let state = make_state().await;
  let uri = format!("/groups/{}", Uuid::new_v4());
  let (status, body) = call(app(&state, Ability::root()), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn groups_outside_the_ability_are_hidden() {
  let state = make_state().await;
  let (federation, club) = seed_groups(&state).await;
  let club_id: Uuid = club.parse().unwrap();
  let local = Ability::new([Capability::Show]).in_groups([club_id]);

  let (status, list) = call(app(&state, local.clone()), "GET", "/groups", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(list.as_array().unwrap().len(), 1);

  let uri = format!("/groups/{federation}");
  let (status, _) = call(app(&state, local), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_group_type_is_422() {
  let state = make_state().await;
  let (status, body) = call(
    app(&state, Ability::root()),
    "POST",
    "/groups",
    Some(json!({ "name": "Choir", "group_type": "choir" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["errors"]["group_type"][0], "is not a known group type");
}

// ── Roles ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn role_lifecycle() {
  let state = make_state().await;
  let (federation, club) = seed_groups(&state).await;
  let root = || app(&state, Ability::root());

  let (status, created) = call(
    root(),
    "POST",
    &format!("/groups/{club}/roles"),
    Some(json!({
      "type": "member",
      "new_person": { "first_name": "Ada", "last_name": "Lovelace" },
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["privacy_policy_error"], Value::Null);
  let role_id = id_of(&created["role"], "role_id");
  let person_id = id_of(&created["person"], "person_id");

  // Same group and type: in place.
  let (status, updated) = call(
    root(),
    "PUT",
    &format!("/roles/{role_id}"),
    Some(json!({ "label": "Treasurer" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(updated["result"], "in_place");
  assert_eq!(updated["role"]["role_id"], role_id.as_str());

  // A different type replaces the role.
  let (status, replaced) = call(
    root(),
    "PUT",
    &format!("/roles/{role_id}"),
    Some(json!({ "type": "coach" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(replaced["result"], "replaced");
  assert_eq!(replaced["old_role_id"], role_id.as_str());
  assert_eq!(replaced["archived"], false);
  let new_role = id_of(&replaced["role"], "role_id");

  // A type the target group does not know is a validation error.
  let (status, invalid) = call(
    root(),
    "PUT",
    &format!("/roles/{new_role}"),
    Some(json!({ "group_id": federation, "type": "coach" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(invalid["errors"]["type"].is_array());

  let (status, record) =
    call(root(), "GET", &format!("/people/{person_id}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(record["roles"].as_array().unwrap().len(), 1);

  let (status, destroyed) =
    call(root(), "DELETE", &format!("/roles/{new_role}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(destroyed["role_id"], new_role.as_str());
  assert_eq!(destroyed["archived"], false);

  let (status, _) = call(root(), "DELETE", &format!("/roles/{new_role}"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn creating_roles_needs_the_capability() {
  let state = make_state().await;
  let (_, club) = seed_groups(&state).await;
  let club_id: Uuid = club.parse().unwrap();
  let viewer = Ability::new([Capability::Show]).in_groups([club_id]);

  let (status, _) = call(
    app(&state, viewer),
    "POST",
    &format!("/groups/{club}/roles"),
    Some(json!({ "type": "member", "new_person": { "first_name": "Eve" } })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (_, people) = call(
    app(&state, Ability::root()),
    "GET",
    &format!("/groups/{club}/people/export"),
    None,
  )
  .await;
  assert!(people["rows"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn people_are_visible_to_themselves() {
  let state = make_state().await;
  let (_, club) = seed_groups(&state).await;
  let (_, created) = call(
    app(&state, Ability::root()),
    "POST",
    &format!("/groups/{club}/roles"),
    Some(json!({ "type": "member", "new_person": { "first_name": "Ada" } })),
  )
  .await;
  let person_id = id_of(&created["person"], "person_id");
  let uri = format!("/people/{person_id}");

  let stranger = Ability::new([Capability::Show]).in_groups([Uuid::new_v4()]);
  let (status, _) = call(app(&state, stranger.clone()), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let me = stranger.acting_as(person_id.parse().unwrap());
  let (status, record) = call(app(&state, me), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(record["person"]["first_name"], "Ada");
}

// ── Export ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn export_lists_contact_columns() {
  let state = make_state().await;
  let (_, club) = seed_groups(&state).await;
  let root = || app(&state, Ability::root());

  let (_, created) = call(
    root(),
    "POST",
    &format!("/groups/{club}/roles"),
    Some(json!({
      "type": "member",
      "new_person": { "first_name": "Ada", "last_name": "Lovelace" },
    })),
  )
  .await;
  let person_id = id_of(&created["person"], "person_id");

  let (status, _) = call(
    root(),
    "POST",
    &format!("/people/{person_id}/contact_accounts"),
    Some(json!({
      "category": "phone_number",
      "label": "Mobile",
      "number": "079 123 45 67",
      "public": true,
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, tags) = call(
    root(),
    "PUT",
    &format!("/people/{person_id}/tags"),
    Some(json!({ "tags": ["board", "founder"] })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(tags["tags"].as_array().unwrap().len(), 2);

  let uri = format!("/groups/{club}/people/export?format=csv&list=full");
  let (status, table) = call(root(), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::OK);

  let attributes: Vec<&str> = table["attributes"]
    .as_array()
    .unwrap()
    .iter()
    .map(|a| a.as_str().unwrap())
    .collect();
  let column = attributes
    .iter()
    .position(|a| *a == "phone_number_mobile")
    .unwrap();
  assert_eq!(table["labels"][column], "Phone number Mobile");

  let rows = table["rows"].as_array().unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0][column], "079 123 45 67");
  assert_eq!(rows[0][0], "Ada");
}

#[tokio::test]
async fn export_streams_every_batch() {
  let mut state = make_state().await;
  state.export = Arc::new(ExportSettings { batch_size: 1 });
  let (_, club) = seed_groups(&state).await;
  let root = || app(&state, Ability::root());

  for (first, last) in [("Grace", "Hopper"), ("Ada", "Lovelace"), ("Alan", "Turing")] {
    let (status, _) = call(
      root(),
      "POST",
      &format!("/groups/{club}/roles"),
      Some(json!({
        "type": "member",
        "new_person": { "first_name": first, "last_name": last },
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }

  let uri = format!("/groups/{club}/people/export?format=csv");
  let (status, table) = call(root(), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(table["attributes"][0], "first_name");
  let firsts: Vec<&str> = table["rows"]
    .as_array()
    .unwrap()
    .iter()
    .map(|row| row[0].as_str().unwrap())
    .collect();
  assert_eq!(firsts, ["Grace", "Ada", "Alan"]);

  let missing = Uuid::new_v4();
  let uri = format!("/groups/{missing}/people/export");
  let (status, _) = call(root(), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_export_parameters_are_400() {
  let state = make_state().await;
  let (_, club) = seed_groups(&state).await;

  let uri = format!("/groups/{club}/people/export?format=pdf");
  let (status, _) = call(app(&state, Ability::root()), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Qualifications ──────────────────────────────────────────────────────────

#[tokio::test]
async fn qualification_kinds_need_an_unrestricted_ability() {
  let state = make_state().await;
  let (_, club) = seed_groups(&state).await;
  let club_id: Uuid = club.parse().unwrap();
  let body = json!({ "label": "First aid", "validity_years": 2 });

  let local = Ability::new([Capability::ManageGroups]).in_groups([club_id]);
  let (status, _) = call(
    app(&state, local),
    "POST",
    "/qualification_kinds",
    Some(body.clone()),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let root = || app(&state, Ability::root());
  let (status, kind) =
    call(root(), "POST", "/qualification_kinds", Some(body)).await;
  assert_eq!(status, StatusCode::CREATED);

  let (_, created) = call(
    root(),
    "POST",
    &format!("/groups/{club}/roles"),
    Some(json!({ "type": "member", "new_person": { "first_name": "Ada" } })),
  )
  .await;
  let person_id = id_of(&created["person"], "person_id");

  let (status, _) = call(
    root(),
    "POST",
    &format!("/people/{person_id}/qualifications"),
    Some(json!({ "kind_id": kind["kind_id"], "start_at": "2020-03-01" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (_, kinds) = call(root(), "GET", "/qualification_kinds", None).await;
  assert_eq!(kinds[0]["label"], "First aid");
}

// ── Invoices ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn invoice_flow() {
  let state = make_state().await;
  let (_, club) = seed_groups(&state).await;
  let root = || app(&state, Ability::root());

  let (_, created) = call(
    root(),
    "POST",
    &format!("/groups/{club}/roles"),
    Some(json!({ "type": "member", "new_person": { "first_name": "Ada" } })),
  )
  .await;
  let recipient = id_of(&created["person"], "person_id");

  let (status, invoice) = call(
    root(),
    "POST",
    &format!("/groups/{club}/invoices"),
    Some(json!({
      "recipient_id": recipient,
      "title": "Membership fee",
      "items": [{ "name": "Fee", "unit_cost": 5000, "count": 2 }],
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(invoice["state"], "draft");
  let id = id_of(&invoice, "invoice_id");

  // Drafts take no payments.
  let payments = format!("/invoices/{id}/payments");
  let (status, body) =
    call(root(), "POST", &payments, Some(json!({ "amount": 100 }))).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(body["errors"]["base"].is_array());

  let (status, sent) =
    call(root(), "POST", &format!("/invoices/{id}/send"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(sent["state"], "sent");

  let (status, received) =
    call(root(), "POST", &payments, Some(json!({ "amount": 4000 }))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(received["invoice"]["state"], "partial");
  assert_eq!(received["amount_open"], 6000);

  let (_, received) =
    call(root(), "POST", &payments, Some(json!({ "amount": 6000 }))).await;
  assert_eq!(received["invoice"]["state"], "payed");

  let (status, detail) = call(root(), "GET", &format!("/invoices/{id}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(detail["payments"].as_array().unwrap().len(), 2);
  assert_eq!(detail["amount_open"], 0);

  let (status, _) =
    call(root(), "POST", &format!("/invoices/{id}/cancel"), None).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn invoices_need_finance() {
  let state = make_state().await;
  let (_, club) = seed_groups(&state).await;
  let club_id: Uuid = club.parse().unwrap();
  let viewer = Ability::new([Capability::Show]).in_groups([club_id]);

  let (status, _) = call(
    app(&state, viewer),
    "POST",
    &format!("/groups/{club}/invoices"),
    Some(json!({
      "recipient_id": Uuid::new_v4(),
      "title": "Fee",
      "items": [{ "name": "Fee", "unit_cost": 100, "count": 1 }],
    })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

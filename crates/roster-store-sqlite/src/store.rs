//! [`SqliteStore`]: the SQLite implementation of [`MembershipStore`].

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{OptionalExtension as _, named_params};
use uuid::Uuid;

use roster_core::{
  change::Change,
  contact::ContactCategory,
  group::Group,
  invoice::{Invoice, Payment},
  person::Person,
  qualification::QualificationKind,
  record::PersonRecord,
  role::Role,
  store::MembershipStore,
};

use crate::{
  Error, Result,
  encode::{
    GROUP_COLUMNS, INVOICE_COLUMNS, PERSON_COLUMN_COUNT, PERSON_COLUMNS,
    ROLE_COLUMNS, RawAccount, RawGroup, RawInvoice, RawKind, RawPayment,
    RawPerson, RawQualification, RawRecord, RawRole, RawRoleInGroup,
    encode_change, encode_date, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Roster membership store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Record queries ──────────────────────────────────────────────────────────
//
// These run on the connection thread, inside `call` closures.

/// People query with the derived layer and group name columns.
/// `filter` is appended after `FROM people p` and may use `:as_of`.
fn record_sql(filter: &str) -> String {
  format!(
    "SELECT {PERSON_COLUMNS},
       (SELECT l.name FROM groups g
          JOIN groups l ON l.group_id = g.layer_group_id
          WHERE g.group_id = p.primary_group_id) AS layer_group,
       (SELECT g.name FROM groups g
          WHERE g.group_id = p.primary_group_id) AS primary_group
     FROM people p
     {filter}"
  )
}

fn query_tags(
  conn: &rusqlite::Connection,
  person_id: &str,
) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare_cached(
    "SELECT tag FROM person_tags WHERE person_id = ?1 ORDER BY tag",
  )?;
  stmt
    .query_map([person_id], |row| row.get(0))?
    .collect()
}

fn query_roles_in_groups(
  conn: &rusqlite::Connection,
  person_id: &str,
  as_of: &str,
) -> rusqlite::Result<Vec<RawRoleInGroup>> {
  let sql = format!(
    "SELECT {ROLE_COLUMNS}, g.name, g.group_type,
            CASE WHEN g.layer_group_id = g.group_id THEN NULL ELSE l.name END
     FROM roles r
     JOIN groups g ON g.group_id = r.group_id
     JOIN groups l ON l.group_id = g.layer_group_id
     WHERE r.person_id = ?1 AND (r.end_on IS NULL OR r.end_on >= ?2)
     ORDER BY r.created_at, r.role_id"
  );
  let mut stmt = conn.prepare_cached(&sql)?;
  stmt
    .query_map([person_id, as_of], |row| {
      Ok(RawRoleInGroup {
        role:       RawRole::from_row(row)?,
        group_name: row.get(8)?,
        group_type: row.get(9)?,
        layer_name: row.get(10)?,
      })
    })?
    .collect()
}

fn query_accounts(
  conn: &rusqlite::Connection,
  person_id: &str,
) -> rusqlite::Result<Vec<RawAccount>> {
  let mut stmt = conn.prepare_cached(
    "SELECT category, account_json FROM contact_accounts
     WHERE person_id = ?1 ORDER BY seq",
  )?;
  stmt
    .query_map([person_id], |row| {
      Ok(RawAccount { category: row.get(0)?, account_json: row.get(1)? })
    })?
    .collect()
}

fn query_qualifications(
  conn: &rusqlite::Connection,
  person_id: &str,
) -> rusqlite::Result<Vec<RawQualification>> {
  let mut stmt = conn.prepare_cached(
    "SELECT q.qualification_id, q.person_id, q.start_at, q.finish_at,
            q.origin, k.kind_id, k.label, k.validity_years
     FROM qualifications q
     JOIN qualification_kinds k ON k.kind_id = q.kind_id
     WHERE q.person_id = ?1
     ORDER BY q.start_at DESC, q.qualification_id",
  )?;
  stmt
    .query_map([person_id], |row| {
      Ok(RawQualification {
        qualification_id: row.get(0)?,
        person_id:        row.get(1)?,
        start_at:         row.get(2)?,
        finish_at:        row.get(3)?,
        origin:           row.get(4)?,
        kind:             RawKind {
          kind_id:        row.get(5)?,
          label:          row.get(6)?,
          validity_years: row.get(7)?,
        },
      })
    })?
    .collect()
}

/// The groups of `roles` in the order given, each prefixed with its layer
/// when the group is not a layer itself. `None` without roles.
fn role_with_layer(roles: &[RawRoleInGroup]) -> Option<String> {
  let paths: Vec<String> = roles
    .iter()
    .map(|r| match &r.layer_name {
      Some(layer) => format!("{layer} / {}", r.group_name),
      None => r.group_name.clone(),
    })
    .collect();
  (!paths.is_empty()).then(|| paths.join(", "))
}

/// Run a [`record_sql`] query and load every record's collections.
fn query_records<P: rusqlite::Params>(
  conn: &rusqlite::Connection,
  filter: &str,
  params: P,
  as_of: &str,
) -> rusqlite::Result<Vec<RawRecord>> {
  let mut stmt = conn.prepare(&record_sql(filter))?;
  let heads = stmt
    .query_map(params, |row| {
      Ok((
        RawPerson::from_row(row)?,
        row.get::<_, Option<String>>(PERSON_COLUMN_COUNT)?,
        row.get::<_, Option<String>>(PERSON_COLUMN_COUNT + 1)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut records = Vec::with_capacity(heads.len());
  for (person, layer_group, primary_group) in heads {
    let id = person.person_id.clone();
    let roles = query_roles_in_groups(conn, &id, as_of)?;
    records.push(RawRecord {
      tags: query_tags(conn, &id)?,
      role_with_layer: role_with_layer(&roles),
      roles,
      accounts: query_accounts(conn, &id)?,
      qualifications: query_qualifications(conn, &id)?,
      person,
      layer_group,
      primary_group,
    });
  }
  Ok(records)
}

// ─── MembershipStore impl ────────────────────────────────────────────────────

impl MembershipStore for SqliteStore {
  type Error = Error;

  // ── Groups ────────────────────────────────────────────────────────────────

  async fn get_group(&self, id: Uuid) -> Result<Option<Group>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawGroup> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE group_id = ?1"),
              rusqlite::params![id_str],
              RawGroup::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawGroup::into_group).transpose()
  }

  async fn list_groups(&self) -> Result<Vec<Group>> {
    let raws: Vec<RawGroup> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {GROUP_COLUMNS} FROM groups ORDER BY name, group_id"
        ))?;
        let rows = stmt
          .query_map([], RawGroup::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGroup::into_group).collect()
  }

  // ── People ────────────────────────────────────────────────────────────────

  async fn get_person(&self, id: Uuid) -> Result<Option<Person>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawPerson> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PERSON_COLUMNS} FROM people p WHERE p.person_id = ?1"),
              rusqlite::params![id_str],
              RawPerson::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPerson::into_person).transpose()
  }

  async fn person_record(
    &self,
    id: Uuid,
    as_of: NaiveDate,
  ) -> Result<Option<PersonRecord>> {
    let id_str    = encode_uuid(id);
    let as_of_str = encode_date(as_of);

    let mut raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(query_records(
          conn,
          "WHERE p.person_id = :person_id",
          named_params! { ":person_id": id_str },
          &as_of_str,
        )?)
      })
      .await?;

    raws.pop().map(RawRecord::into_record).transpose()
  }

  async fn people_in_group(
    &self,
    group_id: Uuid,
    as_of: NaiveDate,
    offset: usize,
    limit: usize,
  ) -> Result<Vec<PersonRecord>> {
    let group_str = encode_uuid(group_id);
    let as_of_str = encode_date(as_of);
    let limit     = limit as i64;
    let offset    = offset as i64;

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(query_records(
          conn,
          "WHERE EXISTS (
             SELECT 1 FROM roles r
             WHERE r.person_id = p.person_id
               AND r.group_id = :group_id
               AND (r.end_on IS NULL OR r.end_on >= :as_of))
           ORDER BY p.last_name, p.first_name, p.person_id
           LIMIT :limit OFFSET :offset",
          named_params! {
            ":group_id": group_str,
            ":as_of": as_of_str,
            ":limit": limit,
            ":offset": offset,
          },
          &as_of_str,
        )?)
      })
      .await?;

    tracing::debug!(%group_id, offset, rows = raws.len(), "fetched people page");
    raws.into_iter().map(RawRecord::into_record).collect()
  }

  // ── Roles ─────────────────────────────────────────────────────────────────

  async fn get_role(&self, id: Uuid) -> Result<Option<Role>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawRole> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ROLE_COLUMNS} FROM roles r WHERE r.role_id = ?1"),
              rusqlite::params![id_str],
              RawRole::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRole::into_role).transpose()
  }

  async fn person_roles(&self, person_id: Uuid) -> Result<Vec<Role>> {
    let id_str = encode_uuid(person_id);

    let raws: Vec<RawRole> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ROLE_COLUMNS} FROM roles r WHERE r.person_id = ?1
           ORDER BY r.created_at, r.role_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawRole::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRole::into_role).collect()
  }

  // ── Contact accounts ──────────────────────────────────────────────────────

  async fn used_labels(&self, category: ContactCategory) -> Result<Vec<String>> {
    let category_str = category.to_string();

    Ok(
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(
            "SELECT DISTINCT label FROM contact_accounts
             WHERE category = ?1 ORDER BY label",
          )?;
          let rows = stmt
            .query_map(rusqlite::params![category_str], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn contact_labels(
    &self,
    group_id: Uuid,
    as_of: NaiveDate,
  ) -> Result<Vec<(ContactCategory, String)>> {
    let group_str = encode_uuid(group_id);
    let as_of_str = encode_date(as_of);

    let raws: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT c.category, c.label FROM contact_accounts c
           WHERE c.person_id IN (
             SELECT r.person_id FROM roles r
             WHERE r.group_id = ?1
               AND (r.end_on IS NULL OR r.end_on >= ?2))",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![group_str, as_of_str], |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut labels = raws
      .into_iter()
      .map(|(category, label)| -> Result<(ContactCategory, String)> {
        let category = category
          .parse::<ContactCategory>()
          .map_err(|_| roster_core::Error::UnknownContactCategory(category))?;
        Ok((category, label))
      })
      .collect::<Result<Vec<_>>>()?;
    labels.sort();
    Ok(labels)
  }

  // ── Qualifications ────────────────────────────────────────────────────────

  async fn get_qualification_kind(
    &self,
    id: Uuid,
  ) -> Result<Option<QualificationKind>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawKind> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT kind_id, label, validity_years
               FROM qualification_kinds WHERE kind_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawKind {
                  kind_id:        row.get(0)?,
                  label:          row.get(1)?,
                  validity_years: row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawKind::into_kind).transpose()
  }

  async fn list_qualification_kinds(&self) -> Result<Vec<QualificationKind>> {
    let raws: Vec<RawKind> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT kind_id, label, validity_years
           FROM qualification_kinds ORDER BY label, kind_id",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawKind {
              kind_id:        row.get(0)?,
              label:          row.get(1)?,
              validity_years: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawKind::into_kind).collect()
  }

  // ── Invoices ──────────────────────────────────────────────────────────────

  async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawInvoice> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = ?1"),
              rusqlite::params![id_str],
              RawInvoice::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawInvoice::into_invoice).transpose()
  }

  async fn invoice_payments(&self, invoice_id: Uuid) -> Result<Vec<Payment>> {
    let id_str = encode_uuid(invoice_id);

    let raws: Vec<RawPayment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT payment_id, invoice_id, amount, received_at, reference
           FROM payments WHERE invoice_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawPayment {
              payment_id:  row.get(0)?,
              invoice_id:  row.get(1)?,
              amount:      row.get(2)?,
              received_at: row.get(3)?,
              reference:   row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPayment::into_payment).collect()
  }

  async fn count_issued_invoices(&self, group_id: Uuid) -> Result<u64> {
    let id_str = encode_uuid(group_id);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM invoices
           WHERE group_id = ?1 AND sequence_number IS NOT NULL",
          rusqlite::params![id_str],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(count.max(0) as u64)
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn apply(&self, changes: Vec<Change>) -> Result<()> {
    let kinds: Vec<&'static str> = changes.iter().map(Change::kind).collect();
    let statements = changes
      .iter()
      .map(encode_change)
      .collect::<Result<Vec<_>>>()?
      .into_iter()
      .flatten()
      .collect::<Vec<_>>();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for statement in statements {
          let touched = tx.execute(
            statement.sql,
            rusqlite::params_from_iter(statement.params.iter()),
          )?;
          if let Some((table, id)) = statement.target
            && touched == 0
          {
            // Dropping `tx` rolls back everything executed so far.
            return Err(tokio_rusqlite::Error::Other(Box::new(
              Error::RowNotFound { table, id },
            )));
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::from_call)?;

    tracing::debug!(changes = ?kinds, "applied batch");
    Ok(())
  }
}

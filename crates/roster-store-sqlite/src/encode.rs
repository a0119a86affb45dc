//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and calendar dates as
//! `YYYY-MM-DD`. UUIDs are stored as hyphenated lowercase strings. Contact
//! accounts and invoice items are stored as compact JSON.

use chrono::{DateTime, NaiveDate, Utc};
use roster_core::{
  change::Change,
  contact::{AnyContactAccount, ContactAccounts},
  group::Group,
  invoice::{Invoice, InvoiceItem, InvoiceState, Payment},
  person::{Gender, Person},
  qualification::{Qualification, QualificationKind, QualificationWithKind},
  record::{PersonRecord, RoleInGroup},
  role::Role,
};
use rusqlite::types::Value;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
  s.as_deref().map(decode_date).transpose()
}

fn text(s: impl Into<String>) -> Value { Value::Text(s.into()) }

fn opt_text(s: Option<impl Into<String>>) -> Value {
  s.map_or(Value::Null, |s| Value::Text(s.into()))
}

fn uuid(id: Uuid) -> Value { text(encode_uuid(id)) }

fn opt_uuid(id: Option<Uuid>) -> Value { opt_text(id.map(encode_uuid)) }

fn opt_date(d: Option<NaiveDate>) -> Value { opt_text(d.map(encode_date)) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `groups` row.
pub struct RawGroup {
  pub group_id:       String,
  pub name:           String,
  pub group_type:     String,
  pub parent_id:      Option<String>,
  pub layer_group_id: String,
  pub privacy_policy: Option<String>,
  pub created_at:     String,
}

pub const GROUP_COLUMNS: &str = "group_id, name, group_type, parent_id, \
                                 layer_group_id, privacy_policy, created_at";

impl RawGroup {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      group_id:       row.get(0)?,
      name:           row.get(1)?,
      group_type:     row.get(2)?,
      parent_id:      row.get(3)?,
      layer_group_id: row.get(4)?,
      privacy_policy: row.get(5)?,
      created_at:     row.get(6)?,
    })
  }

  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      group_id:       decode_uuid(&self.group_id)?,
      name:           self.name,
      group_type:     self.group_type,
      parent_id:      decode_opt_uuid(self.parent_id)?,
      layer_group_id: decode_uuid(&self.layer_group_id)?,
      privacy_policy: self.privacy_policy,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read from a `people` row. Column order is [`PERSON_COLUMNS`].
pub struct RawPerson {
  pub person_id:                  String,
  pub first_name:                 Option<String>,
  pub last_name:                  Option<String>,
  pub nickname:                   Option<String>,
  pub company_name:               Option<String>,
  pub company:                    bool,
  pub email:                      Option<String>,
  pub street:                     Option<String>,
  pub housenumber:                Option<String>,
  pub zip_code:                   Option<String>,
  pub town:                       Option<String>,
  pub country:                    Option<String>,
  pub gender:                     Option<String>,
  pub birthday:                   Option<String>,
  pub primary_group_id:           Option<String>,
  pub privacy_policy_accepted_at: Option<String>,
  pub created_at:                 String,
}

pub const PERSON_COLUMNS: &str = "p.person_id, p.first_name, p.last_name, \
  p.nickname, p.company_name, p.company, p.email, p.street, p.housenumber, \
  p.zip_code, p.town, p.country, p.gender, p.birthday, p.primary_group_id, \
  p.privacy_policy_accepted_at, p.created_at";

/// Number of columns in [`PERSON_COLUMNS`].
pub const PERSON_COLUMN_COUNT: usize = 17;

impl RawPerson {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      person_id:                  row.get(0)?,
      first_name:                 row.get(1)?,
      last_name:                  row.get(2)?,
      nickname:                   row.get(3)?,
      company_name:               row.get(4)?,
      company:                    row.get(5)?,
      email:                      row.get(6)?,
      street:                     row.get(7)?,
      housenumber:                row.get(8)?,
      zip_code:                   row.get(9)?,
      town:                       row.get(10)?,
      country:                    row.get(11)?,
      gender:                     row.get(12)?,
      birthday:                   row.get(13)?,
      primary_group_id:           row.get(14)?,
      privacy_policy_accepted_at: row.get(15)?,
      created_at:                 row.get(16)?,
    })
  }

  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      person_id:                  decode_uuid(&self.person_id)?,
      first_name:                 self.first_name,
      last_name:                  self.last_name,
      nickname:                   self.nickname,
      company_name:               self.company_name,
      company:                    self.company,
      email:                      self.email,
      street:                     self.street,
      housenumber:                self.housenumber,
      zip_code:                   self.zip_code,
      town:                       self.town,
      country:                    self.country,
      gender:                     self.gender.as_deref().and_then(Gender::parse),
      birthday:                   decode_opt_date(self.birthday)?,
      primary_group_id:           decode_opt_uuid(self.primary_group_id)?,
      privacy_policy_accepted_at: self
        .privacy_policy_accepted_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      created_at:                 decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read from a `roles` row, optionally joined with its group.
pub struct RawRole {
  pub role_id:    String,
  pub person_id:  String,
  pub group_id:   String,
  pub role_type:  String,
  pub label:      Option<String>,
  pub start_on:   Option<String>,
  pub end_on:     Option<String>,
  pub created_at: String,
}

pub const ROLE_COLUMNS: &str = "r.role_id, r.person_id, r.group_id, \
  r.role_type, r.label, r.start_on, r.end_on, r.created_at";

impl RawRole {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      role_id:    row.get(0)?,
      person_id:  row.get(1)?,
      group_id:   row.get(2)?,
      role_type:  row.get(3)?,
      label:      row.get(4)?,
      start_on:   row.get(5)?,
      end_on:     row.get(6)?,
      created_at: row.get(7)?,
    })
  }

  pub fn into_role(self) -> Result<Role> {
    Ok(Role {
      role_id:    decode_uuid(&self.role_id)?,
      person_id:  decode_uuid(&self.person_id)?,
      group_id:   decode_uuid(&self.group_id)?,
      role_type:  self.role_type,
      label:      self.label,
      start_on:   decode_opt_date(self.start_on)?,
      end_on:     decode_opt_date(self.end_on)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// A role row joined with the names of its group and layer.
pub struct RawRoleInGroup {
  pub role:       RawRole,
  pub group_name: String,
  pub group_type: String,
  pub layer_name: Option<String>,
}

impl RawRoleInGroup {
  pub fn into_role_in_group(self) -> Result<RoleInGroup> {
    Ok(RoleInGroup {
      role:       self.role.into_role()?,
      group_name: self.group_name,
      group_type: self.group_type,
      layer_name: self.layer_name,
    })
  }
}

/// `category` and `account_json` of a `contact_accounts` row.
pub struct RawAccount {
  pub category:     String,
  pub account_json: String,
}

impl RawAccount {
  pub fn into_account(self) -> Result<AnyContactAccount> {
    let json: serde_json::Value = serde_json::from_str(&self.account_json)?;
    Ok(AnyContactAccount::from_parts(&self.category, json)?)
  }
}

pub struct RawKind {
  pub kind_id:        String,
  pub label:          String,
  pub validity_years: Option<u32>,
}

impl RawKind {
  pub fn into_kind(self) -> Result<QualificationKind> {
    Ok(QualificationKind {
      kind_id:        decode_uuid(&self.kind_id)?,
      label:          self.label,
      validity_years: self.validity_years,
    })
  }
}

/// A `qualifications` row joined with its kind.
pub struct RawQualification {
  pub qualification_id: String,
  pub person_id:        String,
  pub start_at:         Option<String>,
  pub finish_at:        Option<String>,
  pub origin:           Option<String>,
  pub kind:             RawKind,
}

impl RawQualification {
  pub fn into_qualification(self) -> Result<QualificationWithKind> {
    let kind = self.kind.into_kind()?;
    Ok(QualificationWithKind {
      qualification: Qualification {
        qualification_id: decode_uuid(&self.qualification_id)?,
        person_id:        decode_uuid(&self.person_id)?,
        kind_id:          kind.kind_id,
        start_at:         decode_opt_date(self.start_at)?,
        finish_at:        decode_opt_date(self.finish_at)?,
        origin:           self.origin,
      },
      kind,
    })
  }
}

pub struct RawInvoice {
  pub invoice_id:      String,
  pub group_id:        String,
  pub recipient_id:    String,
  pub title:           String,
  pub items_json:      String,
  pub state:           String,
  pub sequence_number: Option<String>,
  pub issued_at:       Option<String>,
  pub sent_at:         Option<String>,
  pub due_at:          Option<String>,
  pub amount_paid:     i64,
  pub created_at:      String,
}

pub const INVOICE_COLUMNS: &str = "invoice_id, group_id, recipient_id, title, \
  items_json, state, sequence_number, issued_at, sent_at, due_at, \
  amount_paid, created_at";

impl RawInvoice {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      invoice_id:      row.get(0)?,
      group_id:        row.get(1)?,
      recipient_id:    row.get(2)?,
      title:           row.get(3)?,
      items_json:      row.get(4)?,
      state:           row.get(5)?,
      sequence_number: row.get(6)?,
      issued_at:       row.get(7)?,
      sent_at:         row.get(8)?,
      due_at:          row.get(9)?,
      amount_paid:     row.get(10)?,
      created_at:      row.get(11)?,
    })
  }

  pub fn into_invoice(self) -> Result<Invoice> {
    let items: Vec<InvoiceItem> = serde_json::from_str(&self.items_json)?;
    let state = self
      .state
      .parse::<InvoiceState>()
      .map_err(|_| Error::Decode(format!("invoice state {:?}", self.state)))?;
    Ok(Invoice {
      invoice_id: decode_uuid(&self.invoice_id)?,
      group_id: decode_uuid(&self.group_id)?,
      recipient_id: decode_uuid(&self.recipient_id)?,
      title: self.title,
      items,
      state,
      sequence_number: self.sequence_number,
      issued_at: decode_opt_date(self.issued_at)?,
      sent_at: decode_opt_date(self.sent_at)?,
      due_at: decode_opt_date(self.due_at)?,
      amount_paid: self.amount_paid,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawPayment {
  pub payment_id:  String,
  pub invoice_id:  String,
  pub amount:      i64,
  pub received_at: String,
  pub reference:   Option<String>,
}

impl RawPayment {
  pub fn into_payment(self) -> Result<Payment> {
    Ok(Payment {
      payment_id:  decode_uuid(&self.payment_id)?,
      invoice_id:  decode_uuid(&self.invoice_id)?,
      amount:      self.amount,
      received_at: decode_date(&self.received_at)?,
      reference:   self.reference,
    })
  }
}

/// Everything read for one [`PersonRecord`].
pub struct RawRecord {
  pub person:          RawPerson,
  pub role_with_layer: Option<String>,
  pub layer_group:     Option<String>,
  pub primary_group:   Option<String>,
  pub tags:            Vec<String>,
  pub roles:           Vec<RawRoleInGroup>,
  pub accounts:        Vec<RawAccount>,
  pub qualifications:  Vec<RawQualification>,
}

impl RawRecord {
  pub fn into_record(self) -> Result<PersonRecord> {
    Ok(PersonRecord {
      person:          self.person.into_person()?,
      tags:            self.tags,
      roles:           self
        .roles
        .into_iter()
        .map(RawRoleInGroup::into_role_in_group)
        .collect::<Result<_>>()?,
      role_with_layer: self.role_with_layer,
      layer_group:     self.layer_group,
      primary_group:   self.primary_group,
      accounts:        self
        .accounts
        .into_iter()
        .map(RawAccount::into_account)
        .collect::<Result<ContactAccounts>>()?,
      qualifications:  self
        .qualifications
        .into_iter()
        .map(RawQualification::into_qualification)
        .collect::<Result<_>>()?,
    })
  }
}

// ─── Changes ─────────────────────────────────────────────────────────────────

/// One SQL statement of an encoded [`Change`].
pub struct Statement {
  pub sql:    &'static str,
  pub params: Vec<Value>,
  /// For updates and deletes: the table and id that must be hit.
  pub target: Option<(&'static str, Uuid)>,
}

impl Statement {
  fn new(sql: &'static str, params: Vec<Value>) -> Self {
    Self { sql, params, target: None }
  }

  fn targeting(mut self, table: &'static str, id: Uuid) -> Self {
    self.target = Some((table, id));
    self
  }
}

const INSERT_PERSON: &str = "INSERT INTO people (
    person_id, first_name, last_name, nickname, company_name, company, email,
    street, housenumber, zip_code, town, country, gender, birthday,
    primary_group_id, privacy_policy_accepted_at, created_at
  ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
            ?16, ?17)";

const UPDATE_PERSON: &str = "UPDATE people SET
    first_name = ?2, last_name = ?3, nickname = ?4, company_name = ?5,
    company = ?6, email = ?7, street = ?8, housenumber = ?9, zip_code = ?10,
    town = ?11, country = ?12, gender = ?13, birthday = ?14,
    primary_group_id = ?15, privacy_policy_accepted_at = ?16, created_at = ?17
  WHERE person_id = ?1";

const INSERT_ROLE: &str = "INSERT INTO roles (
    role_id, person_id, group_id, role_type, label, start_on, end_on,
    created_at
  ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const UPDATE_ROLE: &str = "UPDATE roles SET
    person_id = ?2, group_id = ?3, role_type = ?4, label = ?5, start_on = ?6,
    end_on = ?7, created_at = ?8
  WHERE role_id = ?1";

const INSERT_INVOICE: &str = "INSERT INTO invoices (
    invoice_id, group_id, recipient_id, title, items_json, state,
    sequence_number, issued_at, sent_at, due_at, amount_paid, created_at
  ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";

const UPDATE_INVOICE: &str = "UPDATE invoices SET
    group_id = ?2, recipient_id = ?3, title = ?4, items_json = ?5, state = ?6,
    sequence_number = ?7, issued_at = ?8, sent_at = ?9, due_at = ?10,
    amount_paid = ?11, created_at = ?12
  WHERE invoice_id = ?1";

fn person_params(p: &Person) -> Vec<Value> {
  vec![
    uuid(p.person_id),
    opt_text(p.first_name.clone()),
    opt_text(p.last_name.clone()),
    opt_text(p.nickname.clone()),
    opt_text(p.company_name.clone()),
    Value::Integer(i64::from(p.company)),
    opt_text(p.email.clone()),
    opt_text(p.street.clone()),
    opt_text(p.housenumber.clone()),
    opt_text(p.zip_code.clone()),
    opt_text(p.town.clone()),
    opt_text(p.country.clone()),
    opt_text(p.gender.map(Gender::as_str)),
    opt_date(p.birthday),
    opt_uuid(p.primary_group_id),
    opt_text(p.privacy_policy_accepted_at.map(encode_dt)),
    text(encode_dt(p.created_at)),
  ]
}

fn role_params(r: &Role) -> Vec<Value> {
  vec![
    uuid(r.role_id),
    uuid(r.person_id),
    uuid(r.group_id),
    text(r.role_type.clone()),
    opt_text(r.label.clone()),
    opt_date(r.start_on),
    opt_date(r.end_on),
    text(encode_dt(r.created_at)),
  ]
}

fn invoice_params(i: &Invoice) -> Result<Vec<Value>> {
  Ok(vec![
    uuid(i.invoice_id),
    uuid(i.group_id),
    uuid(i.recipient_id),
    text(i.title.clone()),
    text(serde_json::to_string(&i.items)?),
    text(i.state.to_string()),
    opt_text(i.sequence_number.clone()),
    opt_date(i.issued_at),
    opt_date(i.sent_at),
    opt_date(i.due_at),
    Value::Integer(i.amount_paid),
    text(encode_dt(i.created_at)),
  ])
}

/// Encode one change into the statements that persist it.
pub fn encode_change(change: &Change) -> Result<Vec<Statement>> {
  let statements = match change {
    Change::InsertGroup(g) => vec![Statement::new(
      "INSERT INTO groups (
         group_id, name, group_type, parent_id, layer_group_id,
         privacy_policy, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      vec![
        uuid(g.group_id),
        text(g.name.clone()),
        text(g.group_type.clone()),
        opt_uuid(g.parent_id),
        uuid(g.layer_group_id),
        opt_text(g.privacy_policy.clone()),
        text(encode_dt(g.created_at)),
      ],
    )],
    Change::InsertPerson(p) => vec![Statement::new(INSERT_PERSON, person_params(p))],
    Change::UpdatePerson(p) => vec![
      Statement::new(UPDATE_PERSON, person_params(p)).targeting("people", p.person_id),
    ],
    Change::SetTags { person_id, tags } => {
      let mut statements = vec![Statement::new(
        "DELETE FROM person_tags WHERE person_id = ?1",
        vec![uuid(*person_id)],
      )];
      statements.extend(tags.iter().map(|tag| {
        Statement::new(
          "INSERT INTO person_tags (person_id, tag) VALUES (?1, ?2)",
          vec![uuid(*person_id), text(tag.clone())],
        )
      }));
      statements
    }
    Change::InsertRole(r) => vec![Statement::new(INSERT_ROLE, role_params(r))],
    Change::UpdateRole(r) => {
      vec![Statement::new(UPDATE_ROLE, role_params(r)).targeting("roles", r.role_id)]
    }
    Change::DeleteRole(id) => vec![
      Statement::new("DELETE FROM roles WHERE role_id = ?1", vec![uuid(*id)])
        .targeting("roles", *id),
    ],
    Change::InsertContactAccount(a) => vec![Statement::new(
      "INSERT INTO contact_accounts (
         account_id, person_id, category, label, account_json
       ) VALUES (?1, ?2, ?3, ?4, ?5)",
      vec![
        uuid(a.account_id()),
        uuid(a.person_id()),
        text(a.category().to_string()),
        text(a.label()),
        text(a.to_json()?.to_string()),
      ],
    )],
    Change::InsertQualificationKind(k) => vec![Statement::new(
      "INSERT INTO qualification_kinds (kind_id, label, validity_years)
       VALUES (?1, ?2, ?3)",
      vec![
        uuid(k.kind_id),
        text(k.label.clone()),
        k.validity_years
          .map_or(Value::Null, |y| Value::Integer(i64::from(y))),
      ],
    )],
    Change::InsertQualification(q) => vec![Statement::new(
      "INSERT INTO qualifications (
         qualification_id, person_id, kind_id, start_at, finish_at, origin
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      vec![
        uuid(q.qualification_id),
        uuid(q.person_id),
        uuid(q.kind_id),
        opt_date(q.start_at),
        opt_date(q.finish_at),
        opt_text(q.origin.clone()),
      ],
    )],
    Change::InsertInvoice(i) => vec![Statement::new(INSERT_INVOICE, invoice_params(i)?)],
    Change::UpdateInvoice(i) => vec![
      Statement::new(UPDATE_INVOICE, invoice_params(i)?)
        .targeting("invoices", i.invoice_id),
    ],
    Change::InsertPayment(p) => vec![Statement::new(
      "INSERT INTO payments (
         payment_id, invoice_id, amount, received_at, reference
       ) VALUES (?1, ?2, ?3, ?4, ?5)",
      vec![
        uuid(p.payment_id),
        uuid(p.invoice_id),
        Value::Integer(p.amount),
        text(encode_date(p.received_at)),
        opt_text(p.reference.clone()),
      ],
    )],
  };
  Ok(statements)
}

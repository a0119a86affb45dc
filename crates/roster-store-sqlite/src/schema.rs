//! SQL schema for the Roster SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS groups (
    group_id       TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    group_type     TEXT NOT NULL,
    parent_id      TEXT REFERENCES groups(group_id),
    layer_group_id TEXT NOT NULL,   -- equals group_id for layers
    privacy_policy TEXT,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS people (
    person_id                  TEXT PRIMARY KEY,
    first_name                 TEXT,
    last_name                  TEXT,
    nickname                   TEXT,
    company_name               TEXT,
    company                    INTEGER NOT NULL DEFAULT 0,
    email                      TEXT,
    street                     TEXT,
    housenumber                TEXT,
    zip_code                   TEXT,
    town                       TEXT,
    country                    TEXT,
    gender                     TEXT,   -- 'm' | 'w' | NULL
    birthday                   TEXT,   -- YYYY-MM-DD
    primary_group_id           TEXT REFERENCES groups(group_id),
    privacy_policy_accepted_at TEXT,
    created_at                 TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS person_tags (
    person_id TEXT NOT NULL REFERENCES people(person_id),
    tag       TEXT NOT NULL,
    PRIMARY KEY (person_id, tag)
);

CREATE TABLE IF NOT EXISTS roles (
    role_id    TEXT PRIMARY KEY,
    person_id  TEXT NOT NULL REFERENCES people(person_id),
    group_id   TEXT NOT NULL REFERENCES groups(group_id),
    role_type  TEXT NOT NULL,
    label      TEXT,
    start_on   TEXT,
    end_on     TEXT,
    created_at TEXT NOT NULL
);

-- seq keeps the insertion order of each person's accounts.
CREATE TABLE IF NOT EXISTS contact_accounts (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id   TEXT NOT NULL UNIQUE,
    person_id    TEXT NOT NULL REFERENCES people(person_id),
    category     TEXT NOT NULL,   -- discriminant of AnyContactAccount
    label        TEXT NOT NULL,
    account_json TEXT NOT NULL    -- JSON payload (inner record only)
);

CREATE TABLE IF NOT EXISTS qualification_kinds (
    kind_id        TEXT PRIMARY KEY,
    label          TEXT NOT NULL,
    validity_years INTEGER
);

CREATE TABLE IF NOT EXISTS qualifications (
    qualification_id TEXT PRIMARY KEY,
    person_id        TEXT NOT NULL REFERENCES people(person_id),
    kind_id          TEXT NOT NULL REFERENCES qualification_kinds(kind_id),
    start_at         TEXT,
    finish_at        TEXT,
    origin           TEXT
);

CREATE TABLE IF NOT EXISTS invoices (
    invoice_id      TEXT PRIMARY KEY,
    group_id        TEXT NOT NULL REFERENCES groups(group_id),
    recipient_id    TEXT NOT NULL REFERENCES people(person_id),
    title           TEXT NOT NULL,
    items_json      TEXT NOT NULL,
    state           TEXT NOT NULL,
    sequence_number TEXT,
    issued_at       TEXT,
    sent_at         TEXT,
    due_at          TEXT,
    amount_paid     INTEGER NOT NULL DEFAULT 0,   -- cents
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS payments (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    payment_id  TEXT NOT NULL UNIQUE,
    invoice_id  TEXT NOT NULL REFERENCES invoices(invoice_id),
    amount      INTEGER NOT NULL,   -- cents
    received_at TEXT NOT NULL,
    reference   TEXT
);

CREATE INDEX IF NOT EXISTS roles_person_idx    ON roles(person_id);
CREATE INDEX IF NOT EXISTS roles_group_idx     ON roles(group_id);
CREATE INDEX IF NOT EXISTS accounts_person_idx ON contact_accounts(person_id);
CREATE INDEX IF NOT EXISTS quals_person_idx    ON qualifications(person_id);
CREATE INDEX IF NOT EXISTS payments_inv_idx    ON payments(invoice_id);

PRAGMA user_version = 1;
";

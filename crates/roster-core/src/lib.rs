//! Core types and trait definitions for the Roster membership platform.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it. Besides the domain types it hosts the two
//! stateful workflows that operate on any [`store::MembershipStore`]: the role
//! lifecycle ([`roles`]) and invoice reconciliation ([`invoices`]).

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod ability;
pub mod change;
pub mod contact;
pub mod date;
pub mod error;
pub mod group;
pub mod invoice;
pub mod invoices;
pub mod person;
pub mod qualification;
pub mod record;
pub mod role;
pub mod roles;
pub mod store;
pub mod validation;

pub use error::{Error, Result};
pub use validation::{Errors, Outcome};

//! # Docbox Tenancy
//!
//! Multi-tenant isolation and provisioning core for the Docbox document
//! library. Provisions a dedicated isolation boundary per tenant (a
//! Postgres schema or a SQLite database file), records tenants durably in
//! a central registry, and routes every data operation to the correct
//! boundary through managed connection pools. Boundaries are never created
//! implicitly: provisioning is explicit, deterministic, and auditable.

pub mod boundary;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod provisioner;
pub mod repositories;
pub mod router;

pub use migration;

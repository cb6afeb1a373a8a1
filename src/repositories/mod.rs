//! # Repository Layer
//!
//! Storage access for the tenant registry, encapsulating SeaORM operations
//! against the bootstrap boundary.

pub mod tenant;

pub use tenant::{NewTenant, TenantRegistry};

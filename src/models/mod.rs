//! # Data Models
//!
//! SeaORM entity models persisted in the registry boundary.

pub mod tenant;

pub use tenant::Entity as Tenant;

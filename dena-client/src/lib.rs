/// Deta Base HTTP Client Library
///
/// This crate provides an async Rust client for Deta Base collections:
/// item CRUD, update objects, and paginated queries over HTTPS.

pub mod base;
pub mod config;
pub mod credential;
pub mod dena;
pub mod drive;
pub mod error;
mod executor;
pub mod query;
pub mod update;

// Re-export key types
pub use base::{Base, DeleteResponse, Items, Keyed, PutResponse, UpdateResponse};
pub use config::ClientConfig;
pub use credential::Credential;
pub use dena::Dena;
pub use drive::Drive;
pub use error::{ClientError, Result};
pub use query::{Filter, Operator, Paging, Query, QueryResponse};
pub use update::Update;

/// Schemaless record: a JSON object
pub type Record = serde_json::Map<String, serde_json::Value>;

//! Database module: models, schema and the actor-owned SQLite store.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and refresh batches
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `query.rs`: filter/sort options for listings
//! - `reconcile.rs`: the transactional refresh apply
//! - `actor.rs`: `DbActor` and its cloneable handle
//! - `store.rs`: `CountryStore` seam used by the refresh pipeline

pub mod actor;
pub mod models;
pub mod query;
pub mod schema;
pub mod store;

mod reconcile;

pub use actor::{DbActorHandle, spawn};
pub use models::{
    CountryCandidate, DbCountry, ReconcileSummary, RefreshBatch, StatusSnapshot, name_key,
};
pub use query::{CountryQuery, SortDirection, SortField, SortOrder};
pub use schema::SQLITE_INIT;
pub use store::CountryStore;

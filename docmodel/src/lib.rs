//! Typed collections over MongoDB style document stores.
//!
//! This crate is the entry point of the docmodel workspace. It re-exports the core modules,
//! the `Tagged` derive macro and the available storage backends.
//!
//! # Features
//!
//! - **Typed collections** - Bind a record type to a named collection and read, write, count
//!   and aggregate without repeating identifier plumbing
//! - **Structural mapping** - Publish a record under per-namespace keys with `#[derive(Tagged)]`
//! - **Projections** - Build inclusion and exclusion projections from a collection's public fields
//! - **Pagination** - Page through finds, aggregations and split pipelines
//! - **Multiple backends** - In-memory storage for tests, MongoDB behind the `mongodb` feature
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use bson::{doc, oid::ObjectId};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Tagged)]
//! pub struct User {
//!     #[serde(rename = "_id")]
//!     #[tag(bson = "_id", json = "id")]
//!     pub id: ObjectId,
//!     #[tag(bson = "name", json = "name")]
//!     pub name: String,
//!     #[tag(bson = "age", json = "age")]
//!     pub age: i32,
//! }
//!
//! impl Record for User {
//!     fn id(&self) -> ObjectId {
//!         self.id
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let users = store
//!         .collection::<User>("users")?
//!         .with_public_fields(["name", "age"]);
//!
//!     let id = users
//!         .insert_one(&User { id: new_id(), name: "Alice".to_string(), age: 30 })
//!         .await?;
//!
//!     let page = users.paginate(1, 10, doc! { "age": { "$gte": 18 } }).await?;
//!     assert_eq!(page.meta.total, 1);
//!
//!     let alice = users.find_one_handle(Filter::by_id(id)).await?;
//!     alice.update(doc! { "age": 31 }).await?;
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - MongoDB backend (requires the `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as docmodel;

pub mod prelude;

pub use docmodel_core::{
    backend, collection, context, document, error, handle, helpers, mapper, page, projection,
    query, store, sum,
};
pub use docmodel_macros::Tagged;

pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}

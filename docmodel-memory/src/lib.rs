//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It understands the same filter, update and aggregation documents as MongoDB for the
//! subset of operators typed collections rely on, which makes it a drop-in backend for
//! development and tests.
//!
//! # Supported operators
//!
//! - **Filters** - `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`,
//!   `$not`, `$and`, `$or`, `$nor`, dotted paths and implicit equality
//! - **Updates** - `$set`, `$unset`, `$inc`
//! - **Pipelines** - `$match`, `$project`, `$sort`, `$skip`, `$limit`, `$count`, `$group`,
//!   `$lookup`
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//! let users = store.collection::<User>("users")?;
//!
//! users.insert_one(&User::new("Alice")).await?;
//! assert_eq!(users.count(doc! {}).await?, 1);
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

mod evaluator;
mod pipeline;
mod transform;

pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};

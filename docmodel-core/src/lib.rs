//! A strongly-typed model layer for MongoDB style document collections.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Records** ([`document`]) - The identifier capability every stored type implements
//! - **Structural mapping** ([`mapper`]) - Tag-driven conversion of records into field maps
//! - **Projections** ([`projection`]) - Inclusion and exclusion specifications for reads
//! - **Typed collections** ([`collection`]) - CRUD, counting, existence and aggregation
//! - **Document handles** ([`handle`]) - Update and delete a fetched record in place
//! - **Summation** ([`sum`]) and **pagination** ([`page`]) built on top of collections
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Error handling** ([`error`]) and per-operation deadlines ([`context`])
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
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
//! }
//!
//! impl Record for User {
//!     fn id(&self) -> ObjectId {
//!         self.id
//!     }
//! }
//!
//! let users = store.collection::<User>("users")?.with_public_fields(["name"]);
//! let john = users.find_one(doc! { "name": "John" }).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod collection;
pub mod context;
pub mod document;
pub mod error;
pub mod handle;
pub mod helpers;
pub mod mapper;
pub mod page;
pub mod projection;
pub mod query;
pub mod store;
pub mod sum;

#[cfg(test)]
mod testing;

//! Storage backend abstraction for typed collections.
//!
//! This module defines the seam between [`TypedCollection`](crate::collection::TypedCollection)
//! and a concrete document store. Backends receive filters, update documents and aggregation
//! pipelines verbatim, in the query language of the store, and hand back raw BSON documents.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docmodel::backend::StoreBackend;
//! use docmodel::context::OpContext;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//! let ctx = OpContext::background();
//!
//! backend.insert_one(&ctx, "users", doc! { "name": "Alice", "age": 30 }).await?;
//! let adults = backend
//!     .find(&ctx, "users", doc! { "age": { "$gte": 18 } }, Default::default())
//!     .await?;
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::fmt::Debug;

use crate::{context::OpContext, error::DocumentStoreResult, query::FindOptions};

/// Counts reported by an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents matched by the filter.
    pub matched_count: u64,
    /// Documents actually changed by the update.
    pub modified_count: u64,
}

/// Abstract interface for document storage backends.
///
/// Implementations must be thread-safe and support concurrent access from multiple async
/// tasks; a single backend is shared by every collection handle bound to it. Every method
/// receives the [`OpContext`] of the calling handle and must fail with
/// [`DocumentStoreError::DeadlineExceeded`](crate::error::DocumentStoreError::DeadlineExceeded)
/// instead of starting work once its deadline has passed.
///
/// # Error Handling
///
/// Driver failures are wrapped with
/// [`DocumentStoreError::backend`](crate::error::DocumentStoreError::backend) so callers can
/// inspect the original error through
/// [`backend_source`](crate::error::DocumentStoreError::backend_source).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the first document matching `filter`, honouring the projection, sort and skip
    /// of `options`. Returns `Ok(None)` when nothing matches.
    async fn find_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Returns every document matching `filter`, honouring all of `options`.
    async fn find(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Inserts a single document and returns its `_id`.
    ///
    /// A document without an `_id` receives a generated one. Inserting an `_id` that
    /// already exists fails.
    async fn insert_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        document: Document,
    ) -> DocumentStoreResult<Bson>;

    /// Applies `update` to the first document matching `filter`.
    ///
    /// `update` is an operator document such as `{ "$set": { .. } }`.
    async fn update_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Deletes the first document matching `filter` and returns the number deleted.
    async fn delete_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<u64>;

    /// Deletes every document matching `filter` and returns the number deleted.
    async fn delete_many(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<u64>;

    /// Counts the documents matching `filter`.
    async fn count_documents(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<u64>;

    /// Runs an aggregation pipeline and returns every produced document.
    async fn aggregate(
        &self,
        ctx: &OpContext,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with external connections
    /// should override this.
    async fn shutdown(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

/// Factory for backends that need asynchronous setup, such as connecting to a server.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}

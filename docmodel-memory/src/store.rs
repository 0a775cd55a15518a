//! In-memory storage implementation for typed collections.
//!
//! Collections are vectors of BSON documents kept in insertion order behind an async-aware
//! read-write lock. Filters, updates and pipelines use the same document language as
//! MongoDB, evaluated entirely in process.

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;
use std::sync::Arc;
use tracing::trace;

use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome},
    context::OpContext,
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FindOptions},
};

use crate::{
    evaluator::DocumentEvaluator,
    pipeline::{CollectionMap, run_pipeline},
    transform::{apply_projection, apply_update, sort_documents},
};

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and every clone shares the same underlying data, so one
/// instance can back any number of collection handles across async tasks.
///
/// Queries scan the whole collection; there are no indexes.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::{backend::StoreBackend, context::OpContext};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let ctx = OpContext::background();
///
/// store.insert_one(&ctx, "users", doc! { "name": "Alice", "age": 30 }).await?;
/// let adults = store
///     .count_documents(&ctx, "users", doc! { "age": { "$gte": 18 } })
///     .await?;
/// assert_eq!(adults, 1);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents in insertion order
    store: Arc<RwLock<CollectionMap>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(CollectionMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder
    }

    /// Names of the collections holding at least one document, sorted.
    pub async fn collection_names(&self) -> Vec<String> {
        let store = self.store.read().await;
        let mut names: Vec<String> = store
            .iter()
            .filter(|(_, documents)| !documents.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

fn matching_positions(documents: &[Document], filter: &Document) -> DocumentStoreResult<Vec<usize>> {
    let expr = Expr::parse(filter)?;
    let mut positions = Vec::new();
    for (position, document) in documents.iter().enumerate() {
        if DocumentEvaluator::new(document).evaluate(&expr)? {
            positions.push(position);
        }
    }
    Ok(positions)
}

fn select(documents: &[Document], filter: &Document, options: &FindOptions) -> DocumentStoreResult<Vec<Document>> {
    let expr = Expr::parse(filter)?;
    let mut selected = DocumentEvaluator::filter_documents(documents, &expr)?;

    if let Some(sort) = &options.sort {
        sort_documents(&mut selected, sort)?;
    }

    let skip = options
        .skip
        .map_or(0, |skip| usize::try_from(skip).unwrap_or(usize::MAX));
    let limit = match options.limit {
        Some(0) | None => usize::MAX,
        Some(limit) => usize::try_from(limit).unwrap_or(usize::MAX),
    };
    let window = selected.into_iter().skip(skip).take(limit);

    match &options.projection {
        Some(projection) => window
            .map(|document| apply_projection(&document, projection))
            .collect(),
        None => Ok(window.collect()),
    }
}

fn id_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(value) => value.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        ctx.check()?;
        trace!(collection, ?filter, "find_one");

        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(None);
        };
        let options = FindOptions { limit: Some(1), ..options };

        Ok(select(documents, &filter, &options)?.into_iter().next())
    }

    async fn find(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        ctx.check()?;
        trace!(collection, ?filter, "find");

        let store = self.store.read().await;
        match store.get(collection) {
            Some(documents) => select(documents, &filter, &options),
            None => Ok(Vec::new()),
        }
    }

    async fn insert_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        document: Document,
    ) -> DocumentStoreResult<Bson> {
        ctx.check()?;

        let id = document
            .get(ID_FIELD)
            .cloned()
            .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
        let mut stored = Document::new();
        stored.insert(ID_FIELD, id.clone());
        for (key, value) in document {
            if key != ID_FIELD {
                stored.insert(key, value);
            }
        }

        let mut store = self.store.write().await;
        let documents = store.entry(collection.to_string()).or_default();
        if documents.iter().any(|existing| existing.get(ID_FIELD) == Some(&id)) {
            return Err(DocumentStoreError::DocumentAlreadyExists(
                id_string(&id),
                collection.to_string(),
            ));
        }

        trace!(collection, id = %id_string(&id), "insert_one");
        documents.push(stored);

        Ok(id)
    }

    async fn update_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DocumentStoreResult<UpdateOutcome> {
        ctx.check()?;
        trace!(collection, ?filter, ?update, "update_one");

        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(UpdateOutcome::default());
        };
        let Some(position) = matching_positions(documents, &filter)?.first().copied() else {
            return Ok(UpdateOutcome::default());
        };

        let updated = apply_update(&documents[position], &update)?;
        let modified = updated != documents[position];
        if modified {
            documents[position] = updated;
        }

        Ok(UpdateOutcome {
            matched_count: 1,
            modified_count: u64::from(modified),
        })
    }

    async fn delete_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<u64> {
        ctx.check()?;
        trace!(collection, ?filter, "delete_one");

        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        match matching_positions(documents, &filter)?.first() {
            Some(&position) => {
                documents.remove(position);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<u64> {
        ctx.check()?;
        trace!(collection, ?filter, "delete_many");

        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(0);
        };

        let positions = matching_positions(documents, &filter)?;
        for position in positions.iter().rev() {
            documents.remove(*position);
        }

        Ok(positions.len() as u64)
    }

    async fn count_documents(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<u64> {
        ctx.check()?;
        trace!(collection, ?filter, "count_documents");

        let store = self.store.read().await;
        match store.get(collection) {
            Some(documents) => Ok(matching_positions(documents, &filter)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn aggregate(
        &self,
        ctx: &OpContext,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>> {
        ctx.check()?;
        trace!(collection, stages = pipeline.len(), "aggregate");

        let store = self.store.read().await;
        let documents = store.get(collection).cloned().unwrap_or_default();

        run_pipeline(documents, &pipeline, &store)
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

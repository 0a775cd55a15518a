//! Typed collection handles.
//!
//! A [`TypedCollection`] binds a record type to a named collection and exposes retrieval,
//! mutation, counting, aggregation and public-field shaping without restating filters or
//! identifiers at every call site.
//!
//! Handles are built in two phases. [`TypedCollection::create`] validates the name and yields
//! an unbound handle, which [`TypedCollection::link`] later binds to a backend. Every data
//! operation on an unbound handle fails with [`DocumentStoreError::NotBound`].
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//! use bson::doc;
//!
//! let users = TypedCollection::<User>::create("users")?
//!     .with_public_fields(["name", "age"]);
//! let mut users = users;
//! users.link(backend.clone());
//!
//! users.insert_one(&User::new("John", 20)).await?;
//! let john = users.find_one(doc! { "name": "John" }).await?;
//! let adults = users.count(doc! { "age": { "$gte": 18 } }).await?;
//! ```

use bson::{Bson, Document, doc, oid::ObjectId};
use serde::de::DeserializeOwned;
use std::{fmt, marker::PhantomData, sync::Arc};
use tracing::debug;

use crate::{
    backend::StoreBackend,
    context::OpContext,
    document::{ID_FIELD, Record, RecordExt, decode},
    error::{DocumentStoreError, DocumentStoreResult},
    handle::DocumentHandle,
    mapper::{self, TagMap, Tagged},
    projection::Projection,
    query::{Filter, FindOptions},
};

const COUNT_FIELD: &str = "count";

#[derive(Clone)]
enum Binding {
    Unbound,
    Bound(Arc<dyn StoreBackend>),
}

/// A handle binding record type `T` to a named collection.
///
/// Cloning a handle is cheap; clones share the same backend.
pub struct TypedCollection<T> {
    name: String,
    public_fields: Vec<String>,
    binding: Binding,
    context: OpContext,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedCollection<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            public_fields: self.public_fields.clone(),
            binding: self.binding.clone(),
            context: self.context,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TypedCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedCollection")
            .field("name", &self.name)
            .field("public_fields", &self.public_fields)
            .field("bound", &matches!(self.binding, Binding::Bound(_)))
            .field("context", &self.context)
            .finish()
    }
}

impl<T: Record> TypedCollection<T> {
    /// Creates an unbound handle for the collection `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidCollectionName`] if `name` is empty.
    pub fn create(name: impl Into<String>) -> DocumentStoreResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(DocumentStoreError::InvalidCollectionName);
        }

        Ok(Self {
            name,
            public_fields: Vec::new(),
            binding: Binding::Unbound,
            context: OpContext::background(),
            _marker: PhantomData,
        })
    }

    /// Creates a handle for the collection `name` already bound to `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidCollectionName`] if `name` is empty.
    pub fn bound(backend: Arc<dyn StoreBackend>, name: impl Into<String>) -> DocumentStoreResult<Self> {
        let mut collection = Self::create(name)?;
        collection.link(backend);
        Ok(collection)
    }

    /// Binds this handle to `backend`.
    pub fn link(&mut self, backend: Arc<dyn StoreBackend>) {
        self.binding = Binding::Bound(backend);
    }

    /// Declares the fields considered safe to expose.
    ///
    /// The list is not checked against the fields of `T`.
    pub fn with_public_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the context passed to the backend on every operation.
    pub fn with_context(mut self, context: OpContext) -> Self {
        self.context = context;
        self
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn public_fields(&self) -> &[String] {
        &self.public_fields
    }

    pub fn context(&self) -> &OpContext {
        &self.context
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.binding, Binding::Bound(_))
    }

    fn backend(&self) -> DocumentStoreResult<&dyn StoreBackend> {
        match &self.binding {
            Binding::Bound(backend) => Ok(backend.as_ref()),
            Binding::Unbound => Err(DocumentStoreError::NotBound(self.name.clone())),
        }
    }

    /// Returns the first record matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] if nothing matches.
    pub async fn find_one(&self, filter: Document) -> DocumentStoreResult<T> {
        self.find_one_as(filter, FindOptions::default())
            .await
    }

    /// Returns the first record matching `filter`, honouring `options`.
    pub async fn find_one_with(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<T> {
        self.find_one_as(filter, options).await
    }

    /// Returns the first document matching `filter`, decoded into `R` instead of `T`.
    ///
    /// Useful together with a projection that leaves out fields `T` requires.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] if nothing matches.
    pub async fn find_one_as<R: DeserializeOwned>(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<R> {
        debug!(collection = %self.name, ?filter, "find one");
        let document = self
            .backend()?
            .find_one(&self.context, &self.name, filter, options)
            .await?
            .ok_or_else(|| DocumentStoreError::NotFound(self.name.clone()))?;

        decode(document)
    }

    /// Returns the record whose identifier is `id`.
    pub async fn find_one_by_id(&self, id: ObjectId) -> DocumentStoreResult<T> {
        self.find_one(Filter::by_id(id)).await
    }

    /// Returns every record matching `filter`, or an empty vector.
    pub async fn find(&self, filter: Document) -> DocumentStoreResult<Vec<T>> {
        self.find_as(filter, FindOptions::default())
            .await
    }

    pub async fn find_with(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<T>> {
        self.find_as(filter, options).await
    }

    /// Returns every document matching `filter`, decoded into `R`.
    pub async fn find_as<R: DeserializeOwned>(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<R>> {
        debug!(collection = %self.name, ?filter, "find");
        self.backend()?
            .find(&self.context, &self.name, filter, options)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Inserts `record` and returns its identifier.
    pub async fn insert_one(&self, record: &T) -> DocumentStoreResult<ObjectId> {
        debug!(collection = %self.name, id = %record.id(), "insert one");
        let inserted = self
            .backend()?
            .insert_one(&self.context, &self.name, record.to_document()?)
            .await?;

        Ok(match inserted {
            Bson::ObjectId(id) => id,
            _ => record.id(),
        })
    }

    /// Deletes the first record matching `filter` and returns the number deleted.
    pub async fn delete_one(&self, filter: Document) -> DocumentStoreResult<u64> {
        debug!(collection = %self.name, ?filter, "delete one");
        self.backend()?
            .delete_one(&self.context, &self.name, filter)
            .await
    }

    pub async fn delete_many(&self, filter: Document) -> DocumentStoreResult<u64> {
        debug!(collection = %self.name, ?filter, "delete many");
        self.backend()?
            .delete_many(&self.context, &self.name, filter)
            .await
    }

    /// Applies `update` to the first record matching `filter` and returns the number of
    /// records modified.
    pub async fn update_one(&self, filter: Document, update: Document) -> DocumentStoreResult<u64> {
        debug!(collection = %self.name, ?filter, ?update, "update one");
        let outcome = self
            .backend()?
            .update_one(&self.context, &self.name, filter, update)
            .await?;

        Ok(outcome.modified_count)
    }

    /// Counts the records matching `filter`.
    pub async fn count(&self, filter: Document) -> DocumentStoreResult<u64> {
        debug!(collection = %self.name, ?filter, "count");
        self.backend()?
            .count_documents(&self.context, &self.name, filter)
            .await
    }

    /// Counts the documents produced by `pipeline`.
    ///
    /// A `$count` stage is appended to the pipeline; a pipeline producing nothing counts 0.
    pub async fn count_aggregate(&self, mut pipeline: Vec<Document>) -> DocumentStoreResult<u64> {
        pipeline.push(doc! { "$count": COUNT_FIELD });
        let groups = self.aggregate(pipeline).await?;

        Ok(groups
            .first()
            .and_then(|group| group.get(COUNT_FIELD))
            .and_then(count_value)
            .unwrap_or(0))
    }

    /// Reports whether any record matches `filter`.
    ///
    /// Only the identifier is read. A miss is `Ok(false)`; every other failure propagates.
    pub async fn exists(&self, filter: Document) -> DocumentStoreResult<bool> {
        let options = FindOptions::builder()
            .projection(doc! { ID_FIELD: 1 })
            .build();

        match self.find_one_as::<Document>(filter, options).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Runs an aggregation pipeline and returns the raw documents it produces.
    pub async fn aggregate(&self, pipeline: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
        debug!(collection = %self.name, stages = pipeline.len(), "aggregate");
        self.backend()?
            .aggregate(&self.context, &self.name, pipeline)
            .await
    }

    /// Projection including the public fields and excluding the identifier.
    pub fn project_public_fields(&self) -> Document {
        Projection::omit_id_and_pick(&self.public_fields)
    }

    /// Projection including the public fields plus `extra`, excluding the identifier.
    pub fn project_public_fields_and<S: AsRef<str>>(&self, extra: &[S]) -> Document {
        let keys = self
            .public_fields
            .iter()
            .map(String::as_str)
            .chain(extra.iter().map(AsRef::as_ref))
            .collect::<Vec<_>>();

        Projection::omit_id_and_pick(&keys)
    }

    /// Projection including the public fields not listed in `excluded`, excluding the
    /// identifier.
    pub fn project_public_fields_without<S: AsRef<str>>(&self, excluded: &[S]) -> Document {
        let keys = self
            .public_fields
            .iter()
            .filter(|field| !excluded.iter().any(|key| key.as_ref() == field.as_str()))
            .collect::<Vec<_>>();

        Projection::omit_id_and_pick(&keys)
    }

    /// Wraps `record` in an instance-scoped handle owned by this collection.
    pub fn handle(&self, record: T) -> DocumentHandle<T> {
        DocumentHandle::new(record, self.clone())
    }

    /// Finds the first record matching `filter` and wraps it in a handle.
    pub async fn find_one_handle(&self, filter: Document) -> DocumentStoreResult<DocumentHandle<T>> {
        Ok(self.handle(self.find_one(filter).await?))
    }
}

impl<T: Record + Tagged> TypedCollection<T> {
    /// Maps `record` with the `bson` namespace, keeping only the public fields.
    pub fn public_fields_of(&self, record: &T) -> Document {
        mapper::pick(&mapper::to_bson_map(record), &self.public_fields)
    }

    /// Like [`public_fields_of`](Self::public_fields_of), passing the result through
    /// `interceptor` before returning it.
    pub fn public_fields_of_and<F>(&self, record: &T, interceptor: F) -> Document
    where
        F: FnOnce(Document) -> Document,
    {
        interceptor(self.public_fields_of(record))
    }

    pub fn to_bson_map(&self, record: &T) -> TagMap {
        mapper::to_bson_map(record)
    }

    pub fn to_json_map(&self, record: &T) -> TagMap {
        mapper::to_json_map(record)
    }

    /// Maps `record` with the `bson` namespace, keeping only `keys`.
    pub fn pick<S: AsRef<str>>(&self, record: &T, keys: &[S]) -> Document {
        mapper::pick(&mapper::to_bson_map(record), keys)
    }
}

fn count_value(value: &Bson) -> Option<u64> {
    match value {
        Bson::Int32(n) => u64::try_from(*n).ok(),
        Bson::Int64(n) => u64::try_from(*n).ok(),
        Bson::Double(n) if *n >= 0.0 => Some(*n as u64),
        _ => None,
    }
}

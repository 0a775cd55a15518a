//! Main document store interface.
//!
//! A [`DocumentStore`] owns a shared backend and hands out typed collection handles bound to
//! it.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::store::DocumentStore;
//! use docmodel_memory::InMemoryStore;
//!
//! let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//! let users = store.collection::<User>("users")?;
//! ```

use std::sync::Arc;

use crate::{
    backend::StoreBackend,
    collection::TypedCollection,
    document::Record,
    error::DocumentStoreResult,
};

/// A document store sharing one backend among all of its collection handles.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    backend: Arc<dyn StoreBackend>,
}

impl DocumentStore {
    /// Creates a new document store with the given backend.
    pub fn new<B: StoreBackend + 'static>(backend: B) -> Self {
        Self { backend: Arc::new(backend) }
    }

    /// Creates a document store from an already shared backend.
    pub fn from_shared(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> Arc<dyn StoreBackend> {
        Arc::clone(&self.backend)
    }

    /// Returns a handle for the collection `name`, bound to this store.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidCollectionName`](crate::error::DocumentStoreError::InvalidCollectionName)
    /// if `name` is empty.
    pub fn collection<T: Record>(&self, name: &str) -> DocumentStoreResult<TypedCollection<T>> {
        TypedCollection::bound(self.backend(), name)
    }

    /// Binds a handle created with [`TypedCollection::create`] to this store.
    pub fn link<T: Record>(&self, collection: &mut TypedCollection<T>) {
        collection.link(self.backend());
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// Handles still holding the backend keep it alive but should not be used afterwards.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}

//! Instance-scoped operations on a single fetched record.

use bson::{Document, doc, oid::ObjectId};

use crate::{
    collection::TypedCollection,
    document::Record,
    error::DocumentStoreResult,
    mapper::Tagged,
    query::Filter,
};

/// One record together with the collection it came from.
///
/// Every operation filters by the wrapped record's identifier, so callers never restate it.
/// Handles are short-lived: mutations go to the store, the wrapped value is not refreshed.
///
/// ```ignore
/// let john = users.find_one_handle(doc! { "name": "John" }).await?;
/// john.update(doc! { "verified": true }).await?;
/// john.delete().await?;
/// ```
#[derive(Debug, Clone)]
pub struct DocumentHandle<T> {
    data: T,
    owner: TypedCollection<T>,
}

impl<T: Record> DocumentHandle<T> {
    pub(crate) fn new(data: T, owner: TypedCollection<T>) -> Self {
        Self { data, owner }
    }

    pub fn id(&self) -> ObjectId {
        self.data.id()
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn owner(&self) -> &TypedCollection<T> {
        &self.owner
    }

    pub fn into_inner(self) -> T {
        self.data
    }

    /// Applies a raw update document, such as `{ "$inc": { "credit": 5 } }`, to this record.
    ///
    /// Returns the number of records modified.
    pub async fn update_raw(&self, update: Document) -> DocumentStoreResult<u64> {
        self.owner
            .update_one(Filter::by_id(self.id()), update)
            .await
    }

    /// Sets `fields` on this record.
    pub async fn update(&self, fields: Document) -> DocumentStoreResult<u64> {
        self.update_raw(doc! { "$set": fields }).await
    }

    /// Deletes this record and returns the number deleted.
    pub async fn delete(&self) -> DocumentStoreResult<u64> {
        self.owner
            .delete_one(Filter::by_id(self.id()))
            .await
    }
}

impl<T: Record + Tagged> DocumentHandle<T> {
    pub fn public_fields(&self) -> Document {
        self.owner.public_fields_of(&self.data)
    }
}

//! Core traits for record representation and serialization.
//!
//! This module provides the [`Record`] capability that every type bound to a collection must
//! implement, along with conversion utilities between records and BSON documents.

use bson::{
    Bson, Document, de::deserialize_from_bson, oid::ObjectId, ser::serialize_to_bson,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Name of the reserved identifier field.
pub const ID_FIELD: &str = "_id";

/// Core trait that all records stored in a typed collection must implement.
///
/// A record carries a stable, unique identifier that never changes once the record is
/// persisted. The identifier must serialize under the reserved `_id` field.
///
/// # Example
///
/// ```ignore
/// use docmodel::document::Record;
/// use bson::oid::ObjectId;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     #[serde(rename = "_id")]
///     pub id: ObjectId,
///     pub name: String,
/// }
///
/// impl Record for User {
///     fn id(&self) -> ObjectId {
///         self.id
///     }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns this record's unique identifier.
    fn id(&self) -> ObjectId;
}

/// Extension trait providing BSON conversions for records.
///
/// This trait is automatically implemented for all types that implement [`Record`].
pub trait RecordExt: Record {
    /// Converts this record to a BSON document for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the record does not serialize to a document.
    fn to_document(&self) -> DocumentStoreResult<Document>;

    /// Creates a record from a stored BSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    fn from_document(document: Document) -> DocumentStoreResult<Self>;
}

impl<R: Record> RecordExt for R {
    fn to_document(&self) -> DocumentStoreResult<Document> {
        into_document(serialize_to_bson(self)?)
    }

    fn from_document(document: Document) -> DocumentStoreResult<Self> {
        decode(document)
    }
}

/// Decodes a stored document into any deserializable shape.
pub fn decode<R: DeserializeOwned>(document: Document) -> DocumentStoreResult<R> {
    Ok(deserialize_from_bson(Bson::Document(document))?)
}

/// Serializes a value that must produce a BSON document.
pub fn encode<S: Serialize + ?Sized>(value: &S) -> DocumentStoreResult<Document> {
    into_document(serialize_to_bson(value)?)
}

fn into_document(bson: Bson) -> DocumentStoreResult<Document> {
    match bson {
        Bson::Document(document) => Ok(document),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a document, found {:?}",
            other.element_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Account {
        #[serde(rename = "_id")]
        id: ObjectId,
        owner: String,
        credit: i64,
    }

    impl Record for Account {
        fn id(&self) -> ObjectId {
            self.id
        }
    }

    #[test]
    fn record_serializes_identifier_under_reserved_field() {
        let account = Account { id: ObjectId::new(), owner: "John".into(), credit: 100 };
        let document = account.to_document().unwrap();

        assert_eq!(document.get(ID_FIELD), Some(&Bson::ObjectId(account.id)));
        assert_eq!(Account::from_document(document).unwrap(), account);
    }

    #[test]
    fn scalar_values_are_not_documents() {
        assert!(matches!(encode(&5_i32), Err(DocumentStoreError::InvalidDocument(_))));
        assert_eq!(encode(&doc! { "a": 1 }).unwrap(), doc! { "a": 1 });
    }
}

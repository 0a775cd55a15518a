//! Error types and result types for collection operations.
//!
//! This module provides the error taxonomy shared by every crate in the workspace.
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.
//!
//! Two conditions are singled out so callers can branch on them without string matching:
//!
//! - [`DocumentStoreError::NotFound`] - a single-document read matched nothing
//! - [`DocumentStoreError::NotBound`] - an operation ran on a handle that was never linked
//!
//! Failures raised by the underlying driver are carried in [`DocumentStoreError::Backend`]
//! with the original error kept as the source.

use bson::error::Error as BsonError;
use std::error::Error as StdError;
use thiserror::Error;

/// Boxed error raised by a storage driver.
pub type BackendError = Box<dyn StdError + Send + Sync + 'static>;

/// Represents all possible errors that can occur when working with a typed collection.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// No document matched a single-document query in the named collection.
    #[error("No document matched in collection {0}")]
    NotFound(String),
    /// The collection handle has not been linked to a backend.
    #[error("Collection {0} is not linked to a database")]
    NotBound(String),
    /// A collection handle was created with an empty name.
    #[error("Collection name is empty")]
    InvalidCollectionName,
    /// Page or page size outside the accepted range.
    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
    /// The operation context deadline passed before the call could run.
    #[error("Operation deadline exceeded")]
    DeadlineExceeded,
    /// Serialization/deserialization error when converting between records and BSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The document, filter or update has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The backend does not implement the requested operator or stage.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    /// An error raised by the underlying storage driver.
    #[error("Backend error: {0}")]
    Backend(#[source] BackendError),
}

impl DocumentStoreError {
    /// Wraps a driver error without altering it.
    pub fn backend<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        DocumentStoreError::Backend(Box::new(err))
    }

    /// Returns `true` if this is the "no documents" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentStoreError::NotFound(_))
    }

    /// Returns a reference to the driver error if this is a backend failure.
    pub fn backend_source(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            DocumentStoreError::Backend(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// A specialized `Result` type for collection operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

//! Small helpers for building records and classifying errors.

use bson::{DateTime, oid::ObjectId};

use crate::error::DocumentStoreError;

/// Generates a new record identifier.
pub fn new_id() -> ObjectId {
    ObjectId::new()
}

/// Current time at millisecond precision, as stored by the database.
pub fn date_time_now() -> DateTime {
    DateTime::now()
}

/// Generates a random (v4) UUID in its hyphenated string form.
pub fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Returns `true` if `err` reports that a single-document read matched nothing.
pub fn is_no_documents_error(err: &DocumentStoreError) -> bool {
    err.is_not_found()
}

/// Returns `true` if a single-document read failed for a reason other than a miss.
pub fn is_find_one_error(err: &DocumentStoreError) -> bool {
    !err.is_not_found()
}

//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```

pub use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome},
    collection::TypedCollection,
    context::OpContext,
    document::{ID_FIELD, Record, RecordExt},
    error::{DocumentStoreError, DocumentStoreResult},
    handle::DocumentHandle,
    helpers::{date_time_now, is_find_one_error, is_no_documents_error, new_id, new_uuid},
    mapper::{TagMap, Tagged},
    page::{AggregatePage, Paginated, PaginatedMeta, PaginationParams},
    projection::Projection,
    query::{Filter, FindOptions},
    store::DocumentStore,
    sum::SumNumber,
};
pub use docmodel_macros::Tagged;

//! Paginated reads over a typed collection.
//!
//! Every paginated read first obtains the total number of matches. A total of zero returns an
//! empty page without running the read; otherwise the read is bounded to one page with
//! `skip = (page - 1) * per_page` and `limit = per_page`. Pages are 1-indexed.
//!
//! # Split Pipelines
//!
//! [`TypedCollection::paginate_aggregate_raw`] places `$skip`/`$limit` between two groups of
//! stages, so expensive stages such as `$lookup` run over one page of documents instead of the
//! full result set:
//!
//! ```ignore
//! use docmodel::page::AggregatePage;
//! use bson::doc;
//!
//! let page = orders
//!     .paginate_aggregate_raw(
//!         2,
//!         20,
//!         AggregatePage::new(doc! { "status": "paid" })
//!             .before_limit(vec![doc! { "$sort": { "created_at": -1 } }])
//!             .after_limit(vec![doc! { "$lookup": {
//!                 "from": "users",
//!                 "localField": "user_id",
//!                 "foreignField": "_id",
//!                 "as": "user",
//!             } }]),
//!     )
//!     .await?;
//! ```

use bson::{Document, doc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    collection::TypedCollection,
    document::Record,
    error::{DocumentStoreError, DocumentStoreResult},
    query::FindOptions,
};

/// Metadata describing one page of results.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedMeta {
    /// Total number of matches across all pages.
    pub total: u64,
    pub per_page: u64,
    pub page: u64,
    /// `ceil(total / per_page)`, or 0 when there are no matches.
    pub last_page: u64,
}

/// A single page of results.
///
/// `data` is empty, never absent, when nothing matches.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub meta: PaginatedMeta,
    pub data: Vec<T>,
}

impl<T> Paginated<T> {
    fn empty(params: PaginationParams) -> Self {
        Self::new(params, 0, Vec::new())
    }

    fn new(params: PaginationParams, total: u64, data: Vec<T>) -> Self {
        Self {
            meta: PaginatedMeta {
                total,
                per_page: params.per_page,
                page: params.page,
                last_page: params.last_page(total),
            },
            data,
        }
    }
}

/// Page number and page size of a paginated read.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: u64,
    /// Number of items per page.
    pub per_page: u64,
}

impl PaginationParams {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    /// Rejects page 0, a page size of 0, and windows whose skip or limit does not fit in a
    /// BSON `Int64`.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        if self.page == 0 {
            return Err(DocumentStoreError::InvalidPagination(
                "page numbers start at 1".to_string(),
            ));
        }
        if self.per_page == 0 {
            return Err(DocumentStoreError::InvalidPagination(
                "per_page must be at least 1".to_string(),
            ));
        }
        self.window()?;
        Ok(())
    }

    /// The `(skip, limit)` pair of this page as BSON integers.
    fn window(&self) -> DocumentStoreResult<(i64, i64)> {
        let limit = i64::try_from(self.per_page).map_err(|_| {
            DocumentStoreError::InvalidPagination(format!(
                "per_page must be at most {}",
                i64::MAX
            ))
        })?;
        let skip = self
            .page
            .saturating_sub(1)
            .checked_mul(self.per_page)
            .and_then(|offset| i64::try_from(offset).ok())
            .ok_or_else(|| {
                DocumentStoreError::InvalidPagination(format!(
                    "page {} of size {} is out of range",
                    self.page, self.per_page
                ))
            })?;
        Ok((skip, limit))
    }

    /// Number of items to skip to reach this page.
    pub fn offset(&self) -> u64 {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.per_page)
    }

    /// Last page number for `total` matches.
    pub fn last_page(&self, total: u64) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        total.div_ceil(self.per_page)
    }

    fn window_stages(&self) -> DocumentStoreResult<[Document; 2]> {
        let (skip, limit) = self.window()?;
        Ok([doc! { "$skip": skip }, doc! { "$limit": limit }])
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 10 }
    }
}

/// Stages of a split aggregation pipeline.
///
/// The executed pipeline is `[{ $match }] + before_limit + [{ $skip }, { $limit }] + after_limit`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatePage {
    pub match_stage: Document,
    pub before_limit: Vec<Document>,
    pub after_limit: Vec<Document>,
    /// Total to report; skips the count query when set.
    pub precomputed_total: Option<u64>,
}

impl AggregatePage {
    pub fn new(match_stage: Document) -> Self {
        Self { match_stage, ..Self::default() }
    }

    pub fn before_limit(mut self, stages: Vec<Document>) -> Self {
        self.before_limit = stages;
        self
    }

    pub fn after_limit(mut self, stages: Vec<Document>) -> Self {
        self.after_limit = stages;
        self
    }

    pub fn total(mut self, total: u64) -> Self {
        self.precomputed_total = Some(total);
        self
    }
}

impl<T: Record> TypedCollection<T> {
    /// Returns one page of the records matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidPagination`] if `page` or `per_page` is 0, or if
    /// the page starts beyond `i64::MAX` items.
    pub async fn paginate(
        &self,
        page: u64,
        per_page: u64,
        filter: Document,
    ) -> DocumentStoreResult<Paginated<T>> {
        self.paginate_as(page, per_page, filter, FindOptions::default())
            .await
    }

    /// Returns one page of the documents matching `filter`, decoded into `R`.
    ///
    /// The projection and sort of `options` are kept; its skip and limit are replaced.
    pub async fn paginate_as<R: DeserializeOwned>(
        &self,
        page: u64,
        per_page: u64,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Paginated<R>> {
        let params = PaginationParams::new(page, per_page);
        params.validate()?;

        let total = self.count(filter.clone()).await?;
        if total == 0 {
            return Ok(Paginated::empty(params));
        }

        let options = FindOptions {
            skip: Some(params.offset()),
            limit: Some(params.per_page),
            ..options
        };
        let data = self.find_as(filter, options).await?;

        Ok(Paginated::new(params, total, data))
    }

    /// Returns one page of the documents produced by `pipeline`.
    ///
    /// The total is obtained by running `pipeline` with a `$count` stage.
    pub async fn paginate_aggregate(
        &self,
        page: u64,
        per_page: u64,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Paginated<Document>> {
        self.paginate_aggregate_with_count_query(page, per_page, None, pipeline)
            .await
    }

    /// Returns one page of the documents produced by `pipeline`, counting the total with
    /// `count_filter` when one is given instead of re-running the pipeline.
    pub async fn paginate_aggregate_with_count_query(
        &self,
        page: u64,
        per_page: u64,
        count_filter: Option<Document>,
        mut pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Paginated<Document>> {
        let params = PaginationParams::new(page, per_page);
        params.validate()?;

        let total = match count_filter {
            Some(filter) => self.count(filter).await?,
            None => self.count_aggregate(pipeline.clone()).await?,
        };
        if total == 0 {
            return Ok(Paginated::empty(params));
        }

        pipeline.extend(params.window_stages()?);
        let data = self.aggregate(pipeline).await?;

        Ok(Paginated::new(params, total, data))
    }

    /// Returns one page of a split pipeline, see [`AggregatePage`].
    ///
    /// Without a precomputed total, the total counts the output of the match stage and the
    /// `before_limit` stages.
    pub async fn paginate_aggregate_raw(
        &self,
        page: u64,
        per_page: u64,
        split: AggregatePage,
    ) -> DocumentStoreResult<Paginated<Document>> {
        let params = PaginationParams::new(page, per_page);
        params.validate()?;

        let AggregatePage { match_stage, before_limit, after_limit, precomputed_total } = split;
        let mut pipeline = Vec::with_capacity(before_limit.len() + after_limit.len() + 3);
        pipeline.push(doc! { "$match": match_stage });
        pipeline.extend(before_limit);

        let total = match precomputed_total {
            Some(total) => total,
            None => self.count_aggregate(pipeline.clone()).await?,
        };
        if total == 0 {
            return Ok(Paginated::empty(params));
        }

        pipeline.extend(params.window_stages()?);
        pipeline.extend(after_limit);
        let data = self.aggregate(pipeline).await?;

        Ok(Paginated::new(params, total, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        query::Filter,
        testing::{FakeBackend, User, count_response},
    };
    use std::sync::Arc;

    fn bound_users(backend: Arc<FakeBackend>) -> TypedCollection<User> {
        TypedCollection::bound(backend, "users").unwrap()
    }

    async fn seeded(count: i32) -> TypedCollection<User> {
        let users = bound_users(FakeBackend::new());
        for age in 0..count {
            users.insert_one(&User::new("John", age)).await.unwrap();
        }
        users
    }

    #[test]
    fn page_math() {
        let first = PaginationParams::new(1, 5);
        let second = PaginationParams::new(2, 5);

        assert_eq!(first.last_page(10), 2);
        assert_eq!(first.last_page(11), 3);
        assert_eq!(first.last_page(0), 0);
        assert_eq!(first.offset(), 0);
        assert_eq!(second.offset(), 5);
    }

    #[test]
    fn zero_page_or_page_size_is_invalid() {
        assert!(matches!(
            PaginationParams::new(0, 5).validate(),
            Err(DocumentStoreError::InvalidPagination(_))
        ));
        assert!(matches!(
            PaginationParams::new(1, 0).validate(),
            Err(DocumentStoreError::InvalidPagination(_))
        ));
        assert!(PaginationParams::default().validate().is_ok());
    }

    #[test]
    fn windows_beyond_int64_are_invalid() {
        let max = i64::MAX as u64;
        for (page, per_page) in [(1, u64::MAX), (1, max + 1), (u64::MAX, 2), (3, max / 2 + 1)] {
            assert!(
                matches!(
                    PaginationParams::new(page, per_page).validate(),
                    Err(DocumentStoreError::InvalidPagination(_))
                ),
                "page {page} of size {per_page} should be rejected"
            );
        }

        assert!(PaginationParams::new(1, max).validate().is_ok());
        assert!(PaginationParams::new(2, max).validate().is_ok());
        assert_eq!(
            PaginationParams::new(2, max).window_stages().unwrap(),
            [doc! { "$skip": i64::MAX }, doc! { "$limit": i64::MAX }]
        );
    }

    #[test]
    fn meta_serializes_with_camel_case_keys() {
        let page = Paginated::<i32>::new(PaginationParams::new(2, 5), 10, vec![]);
        let json = serde_json::to_value(&page).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "meta": { "total": 10, "perPage": 5, "page": 2, "lastPage": 2 },
                "data": []
            })
        );
    }

    #[tokio::test]
    async fn paginate_bounds_the_read() {
        let users = seeded(10).await;

        let page = users.paginate(2, 4, Filter::all()).await.unwrap();
        assert_eq!(
            page.meta,
            PaginatedMeta { total: 10, per_page: 4, page: 2, last_page: 3 }
        );
        assert_eq!(
            page.data.iter().map(|user| user.age).collect::<Vec<_>>(),
            vec![4, 5, 6, 7]
        );

        let last = users.paginate(3, 4, Filter::all()).await.unwrap();
        assert_eq!(last.data.len(), 2);
    }

    #[tokio::test]
    async fn no_matches_short_circuit_with_empty_data() {
        let users = seeded(3).await;

        let page = users
            .paginate(1, 5, doc! { "name": "Nobody" })
            .await
            .unwrap();
        assert_eq!(page.meta.total, 0);
        assert_eq!(page.meta.last_page, 0);
        assert!(page.data.is_empty());
    }

    #[tokio::test]
    async fn invalid_pages_fail_before_reaching_the_backend() {
        let users = bound_users(FakeBackend::failing());

        assert!(matches!(
            users.paginate(0, 5, Filter::all()).await,
            Err(DocumentStoreError::InvalidPagination(_))
        ));
        assert!(matches!(
            users.paginate_aggregate(1, 0, vec![]).await,
            Err(DocumentStoreError::InvalidPagination(_))
        ));
    }

    #[tokio::test]
    async fn paginate_aggregate_appends_window_to_pipeline() {
        let backend = FakeBackend::new();
        backend.respond_with(count_response(10)).await;
        backend.respond_with(vec![doc! { "n": 1 }]).await;
        let users = bound_users(backend.clone());

        let stages = vec![doc! { "$match": { "verified": true } }];
        let page = users
            .paginate_aggregate(2, 5, stages.clone())
            .await
            .unwrap();
        assert_eq!(page.meta.last_page, 2);
        assert_eq!(page.data, vec![doc! { "n": 1 }]);

        let pipelines = backend.pipelines().await;
        assert_eq!(pipelines.len(), 2);
        assert_eq!(pipelines[0].last(), Some(&doc! { "$count": "count" }));
        assert_eq!(
            pipelines[1],
            vec![
                doc! { "$match": { "verified": true } },
                doc! { "$skip": 5_i64 },
                doc! { "$limit": 5_i64 },
            ]
        );
    }

    #[tokio::test]
    async fn count_filter_replaces_the_count_pipeline() {
        let backend = FakeBackend::new();
        let users = bound_users(backend.clone());
        users.insert_one(&User::new("John", 1)).await.unwrap();

        let page = users
            .paginate_aggregate_with_count_query(1, 5, Some(Filter::all()), vec![])
            .await
            .unwrap();
        assert_eq!(page.meta.total, 1);

        let pipelines = backend.pipelines().await;
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0], vec![doc! { "$skip": 0_i64 }, doc! { "$limit": 5_i64 }]);
    }

    #[tokio::test]
    async fn split_pipeline_places_window_before_expensive_stages() {
        let backend = FakeBackend::new();
        backend.respond_with(count_response(3)).await;
        let users = bound_users(backend.clone());

        let lookup = doc! { "$lookup": {
            "from": "orders",
            "localField": "_id",
            "foreignField": "user_id",
            "as": "orders",
        } };
        let sort = doc! { "$sort": { "age": 1 } };
        users
            .paginate_aggregate_raw(
                1,
                2,
                AggregatePage::new(doc! { "verified": true })
                    .before_limit(vec![sort.clone()])
                    .after_limit(vec![lookup.clone()]),
            )
            .await
            .unwrap();

        let pipelines = backend.pipelines().await;
        assert_eq!(
            pipelines[0],
            vec![
                doc! { "$match": { "verified": true } },
                sort.clone(),
                doc! { "$count": "count" },
            ]
        );
        assert_eq!(
            pipelines[1],
            vec![
                doc! { "$match": { "verified": true } },
                sort,
                doc! { "$skip": 0_i64 },
                doc! { "$limit": 2_i64 },
                lookup,
            ]
        );
    }

    #[tokio::test]
    async fn precomputed_total_skips_the_count() {
        let backend = FakeBackend::new();
        let users = bound_users(backend.clone());

        let page = users
            .paginate_aggregate_raw(3, 10, AggregatePage::new(Filter::all()).total(25))
            .await
            .unwrap();
        assert_eq!(page.meta.total, 25);
        assert_eq!(page.meta.last_page, 3);
        assert!(page.data.is_empty());

        let pipelines = backend.pipelines().await;
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0][1], doc! { "$skip": 20_i64 });

        let empty = users
            .paginate_aggregate_raw(1, 10, AggregatePage::new(Filter::all()).total(0))
            .await
            .unwrap();
        assert_eq!(empty.meta.last_page, 0);
        assert_eq!(backend.pipelines().await.len(), 1);
    }
}

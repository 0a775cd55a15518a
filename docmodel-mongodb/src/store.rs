use async_trait::async_trait;
use bson::{Bson, Document};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{
        AggregateOptions, ClientOptions, CountOptions, FindOneOptions,
        FindOptions as MongoFindOptions,
    },
};
use tracing::{debug, info};

use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome},
    context::OpContext,
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::FindOptions,
};

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

/// Storage backend talking to a MongoDB deployment through the official driver.
///
/// The wrapped [`Client`] pools connections and is cheap to share; one `MongoDbStore` can
/// serve every collection handle of an application.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        ctx.check()?;
        debug!(collection, ?filter, "find_one");

        let mut find_options = FindOneOptions::default();
        find_options.projection = options.projection;
        find_options.sort = options.sort;
        find_options.skip = options.skip;
        find_options.max_time = ctx.max_time()?;

        self.get_collection(collection)
            .find_one(filter)
            .with_options(find_options)
            .await
            .map_err(DocumentStoreError::backend)
    }

    async fn find(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        ctx.check()?;
        debug!(collection, ?filter, "find");

        let mut find_options = MongoFindOptions::default();
        find_options.projection = options.projection;
        find_options.sort = options.sort;
        find_options.skip = options.skip;
        find_options.limit = options.limit.and_then(|limit| i64::try_from(limit).ok());
        find_options.max_time = ctx.max_time()?;

        self.get_collection(collection)
            .find(filter)
            .with_options(find_options)
            .await
            .map_err(DocumentStoreError::backend)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(DocumentStoreError::backend)
    }

    async fn insert_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        document: Document,
    ) -> DocumentStoreResult<Bson> {
        ctx.check()?;
        debug!(collection, "insert_one");

        let id = match document.get(ID_FIELD) {
            Some(Bson::ObjectId(oid)) => oid.to_hex(),
            Some(other) => other.to_string(),
            None => String::new(),
        };

        self.get_collection(collection)
            .insert_one(document)
            .await
            .map(|result| result.inserted_id)
            .map_err(|err| {
                if is_duplicate_key(&err) {
                    DocumentStoreError::DocumentAlreadyExists(id, collection.to_string())
                } else {
                    DocumentStoreError::backend(err)
                }
            })
    }

    async fn update_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> DocumentStoreResult<UpdateOutcome> {
        ctx.check()?;
        debug!(collection, ?filter, "update_one");

        let result = self
            .get_collection(collection)
            .update_one(filter, update)
            .await
            .map_err(DocumentStoreError::backend)?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn delete_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<u64> {
        ctx.check()?;
        debug!(collection, ?filter, "delete_one");

        self.get_collection(collection)
            .delete_one(filter)
            .await
            .map(|result| result.deleted_count)
            .map_err(DocumentStoreError::backend)
    }

    async fn delete_many(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<u64> {
        ctx.check()?;
        debug!(collection, ?filter, "delete_many");

        self.get_collection(collection)
            .delete_many(filter)
            .await
            .map(|result| result.deleted_count)
            .map_err(DocumentStoreError::backend)
    }

    async fn count_documents(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<u64> {
        ctx.check()?;
        debug!(collection, ?filter, "count_documents");

        let mut count_options = CountOptions::default();
        count_options.max_time = ctx.max_time()?;

        self.get_collection(collection)
            .count_documents(filter)
            .with_options(count_options)
            .await
            .map_err(DocumentStoreError::backend)
    }

    async fn aggregate(
        &self,
        ctx: &OpContext,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>> {
        ctx.check()?;
        debug!(collection, stages = pipeline.len(), "aggregate");

        let mut aggregate_options = AggregateOptions::default();
        aggregate_options.max_time = ctx.max_time()?;

        self.get_collection(collection)
            .aggregate(pipeline)
            .with_options(aggregate_options)
            .await
            .map_err(DocumentStoreError::backend)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(DocumentStoreError::backend)
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        info!(database = %self.database, "shutting down mongodb client");
        self.client.clone().shutdown().await;

        Ok(())
    }
}

/// Builder connecting a [`MongoDbStore`] from a connection string.
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    app_name: Option<String>,
    max_pool_size: Option<u32>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            app_name: None,
            max_pool_size: None,
        }
    }

    /// Application name reported to the server in the connection handshake.
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn max_pool_size(mut self, max_pool_size: u32) -> Self {
        self.max_pool_size = Some(max_pool_size);
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        if self.database.is_empty() {
            return Err(DocumentStoreError::Initialization(
                "database name is empty".to_string(),
            ));
        }

        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;
        if self.app_name.is_some() {
            options.app_name = self.app_name;
        }
        if self.max_pool_size.is_some() {
            options.max_pool_size = self.max_pool_size;
        }

        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;
        info!(database = %self.database, "connected mongodb client");

        Ok(MongoDbStore::new(client, self.database))
    }
}

//! Scriptable backend used by the unit tests of this crate.

use async_trait::async_trait;
use bson::{Bson, Document, doc, oid::ObjectId};
use mea::rwlock::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, sync::Arc};

use crate::{
    backend::{StoreBackend, UpdateOutcome},
    context::OpContext,
    document::{ID_FIELD, Record},
    error::{DocumentStoreError, DocumentStoreResult},
    mapper::{TagMap, Tagged, insert_tagged, tag_for, tag_value},
    query::FindOptions,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub age: i32,
    pub verified: bool,
}

impl User {
    pub fn new(name: &str, age: i32) -> Self {
        Self { id: ObjectId::new(), name: name.into(), age, verified: false }
    }
}

impl Record for User {
    fn id(&self) -> ObjectId {
        self.id
    }
}

impl Tagged for User {
    fn tag_map(&self, namespace: &str) -> TagMap {
        let mut map = TagMap::new();
        insert_tagged(&mut map, tag_for(namespace, &[("bson", "_id"), ("json", "id")]), || {
            tag_value(&self.id)
        });
        insert_tagged(&mut map, tag_for(namespace, &[("bson", "name"), ("json", "Name")]), || {
            tag_value(&self.name)
        });
        insert_tagged(&mut map, tag_for(namespace, &[("bson", "age"), ("json", "Age")]), || {
            tag_value(&self.age)
        });
        insert_tagged(
            &mut map,
            tag_for(namespace, &[("bson", "verified"), ("json", "-")]),
            || tag_value(&self.verified),
        );
        map
    }
}

/// Backend over a single document list, matching filters by top-level equality.
///
/// Aggregations are recorded and answered from a queue of scripted responses.
#[derive(Debug)]
pub struct FakeBackend {
    documents: RwLock<Vec<Document>>,
    pipelines: RwLock<Vec<Vec<Document>>>,
    responses: RwLock<VecDeque<Vec<Document>>>,
    failing: bool,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_failure(false))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::with_failure(true))
    }

    fn with_failure(failing: bool) -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            pipelines: RwLock::new(Vec::new()),
            responses: RwLock::new(VecDeque::new()),
            failing,
        }
    }

    pub async fn respond_with(&self, documents: Vec<Document>) {
        self.responses.write().await.push_back(documents);
    }

    pub async fn pipelines(&self) -> Vec<Vec<Document>> {
        self.pipelines.read().await.clone()
    }

    fn guard(&self, ctx: &OpContext) -> DocumentStoreResult<()> {
        ctx.check()?;
        if self.failing {
            return Err(DocumentStoreError::backend(std::io::Error::other("connection reset")));
        }
        Ok(())
    }
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, value)| document.get(key) == Some(value))
}

fn project(document: Document, projection: &Document) -> Document {
    let including = projection
        .iter()
        .any(|(key, value)| key != ID_FIELD && value == &Bson::Int32(1));
    let id_excluded = projection.get(ID_FIELD) == Some(&Bson::Int32(0));

    document
        .into_iter()
        .filter(|(key, _)| {
            if key == ID_FIELD {
                return !id_excluded;
            }
            match projection.get(key) {
                Some(value) => value == &Bson::Int32(1),
                None => !including,
            }
        })
        .collect()
}

#[async_trait]
impl StoreBackend for FakeBackend {
    async fn find_one(
        &self,
        ctx: &OpContext,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        let options = FindOptions { limit: Some(1), ..options };
        Ok(self
            .find(ctx, collection, filter, options)
            .await?
            .into_iter()
            .next())
    }

    async fn find(
        &self,
        ctx: &OpContext,
        _collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.guard(ctx)?;
        let documents = self.documents.read().await;
        let skip = options.skip.unwrap_or(0) as usize;
        let limit = options.limit.map_or(usize::MAX, |limit| limit as usize);

        Ok(documents
            .iter()
            .filter(|document| matches(document, &filter))
            .skip(skip)
            .take(limit)
            .map(|document| match &options.projection {
                Some(projection) => project(document.clone(), projection),
                None => document.clone(),
            })
            .collect())
    }

    async fn insert_one(
        &self,
        ctx: &OpContext,
        _collection: &str,
        document: Document,
    ) -> DocumentStoreResult<Bson> {
        self.guard(ctx)?;
        let id = document
            .get(ID_FIELD)
            .cloned()
            .unwrap_or(Bson::Null);
        self.documents.write().await.push(document);
        Ok(id)
    }

    async fn update_one(
        &self,
        ctx: &OpContext,
        _collection: &str,
        filter: Document,
        update: Document,
    ) -> DocumentStoreResult<UpdateOutcome> {
        self.guard(ctx)?;
        let mut documents = self.documents.write().await;
        let Some(document) = documents
            .iter_mut()
            .find(|document| matches(document, &filter))
        else {
            return Ok(UpdateOutcome::default());
        };

        let set = update.get_document("$set").cloned().unwrap_or_default();
        let before = document.clone();
        for (key, value) in set {
            document.insert(key, value);
        }
        Ok(UpdateOutcome { matched_count: 1, modified_count: u64::from(before != *document) })
    }

    async fn delete_one(
        &self,
        ctx: &OpContext,
        _collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<u64> {
        self.guard(ctx)?;
        let mut documents = self.documents.write().await;
        match documents
            .iter()
            .position(|document| matches(document, &filter))
        {
            Some(index) => {
                documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(
        &self,
        ctx: &OpContext,
        _collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<u64> {
        self.guard(ctx)?;
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|document| !matches(document, &filter));
        Ok((before - documents.len()) as u64)
    }

    async fn count_documents(
        &self,
        ctx: &OpContext,
        _collection: &str,
        filter: Document,
    ) -> DocumentStoreResult<u64> {
        self.guard(ctx)?;
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .filter(|document| matches(document, &filter))
            .count() as u64)
    }

    async fn aggregate(
        &self,
        ctx: &OpContext,
        _collection: &str,
        pipeline: Vec<Document>,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.guard(ctx)?;
        self.pipelines.write().await.push(pipeline);
        Ok(self
            .responses
            .write()
            .await
            .pop_front()
            .unwrap_or_default())
    }
}

pub fn count_response(count: i32) -> Vec<Document> {
    vec![doc! { "count": count }]
}

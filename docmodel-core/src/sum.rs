//! Field summation through a single grouping aggregation.
//!
//! ```ignore
//! let totals = accounts
//!     .sum_many::<i64, _>(&["credit", "debit"], Some(doc! { "owner": "John" }))
//!     .await?;
//! let credit = accounts.sum::<f64>("credit", None).await?;
//! ```
//!
//! Requested keys always appear in the result. Keys the aggregation does not produce, or an
//! aggregation over no documents, leave the key at zero; result keys that were not requested
//! are dropped.

use bson::{Bson, Document, doc};
use std::collections::HashMap;

use crate::{
    collection::TypedCollection,
    document::{ID_FIELD, Record},
    error::DocumentStoreResult,
};

/// Numeric types a summation result can be read as.
pub trait SumNumber: Copy + Send + Sync + 'static {
    fn zero() -> Self;

    /// Converts a numeric BSON value, truncating or widening as `as` does.
    fn from_bson(value: &Bson) -> Option<Self>;
}

macro_rules! impl_sum_number {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SumNumber for $ty {
                fn zero() -> Self {
                    0 as $ty
                }

                fn from_bson(value: &Bson) -> Option<Self> {
                    match value {
                        Bson::Int32(n) => Some(*n as $ty),
                        Bson::Int64(n) => Some(*n as $ty),
                        Bson::Double(n) => Some(*n as $ty),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_sum_number!(i32, i64, f32, f64);

fn sum_pipeline<S: AsRef<str>>(keys: &[S], filter: Option<Document>) -> Vec<Document> {
    let mut group = doc! { ID_FIELD: Bson::Null };
    for key in keys {
        let key = key.as_ref();
        group.insert(key, doc! { "$sum": format!("${key}") });
    }

    let mut pipeline = Vec::with_capacity(2);
    if let Some(filter) = filter {
        pipeline.push(doc! { "$match": filter });
    }
    pipeline.push(doc! { "$group": group });
    pipeline
}

impl<T: Record> TypedCollection<T> {
    /// Sums each of `keys` over the records matching `filter`, or over all records.
    pub async fn sum_many<V, S>(
        &self,
        keys: &[S],
        filter: Option<Document>,
    ) -> DocumentStoreResult<HashMap<String, V>>
    where
        V: SumNumber,
        S: AsRef<str> + Sync,
    {
        let mut totals = keys
            .iter()
            .map(|key| (key.as_ref().to_string(), V::zero()))
            .collect::<HashMap<_, _>>();

        let groups = self
            .aggregate(sum_pipeline(keys, filter))
            .await?;
        let Some(group) = groups.first() else {
            return Ok(totals);
        };

        for (key, value) in group {
            if let Some(total) = totals.get_mut(key) {
                if let Some(value) = V::from_bson(value) {
                    *total = value;
                }
            }
        }

        Ok(totals)
    }

    /// Sums a single field over the records matching `filter`.
    pub async fn sum<V: SumNumber>(&self, key: &str, filter: Option<Document>) -> DocumentStoreResult<V> {
        let totals = self.sum_many::<V, _>(&[key], filter).await?;
        Ok(totals
            .get(key)
            .copied()
            .unwrap_or_else(V::zero))
    }
}

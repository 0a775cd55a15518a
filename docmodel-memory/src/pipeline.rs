//! Aggregation pipeline execution over in-memory collections.
//!
//! Supported stages: `$match`, `$project`, `$sort`, `$skip`, `$limit`, `$count`, `$group`
//! and `$lookup`. Group accumulators: `$sum`, `$avg`, `$min`, `$max` and `$first`.

use bson::{Bson, Document};
use std::{cmp::Ordering, collections::HashMap};
use tracing::trace;

use docmodel_core::{
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::Expr,
};

use crate::{
    evaluator::{DocumentEvaluator, equals, resolve_path},
    transform::{apply_projection, as_f64, compare_values, numeric_add, set_path, sort_documents},
};

pub(crate) type CollectionMap = HashMap<String, Vec<Document>>;

fn invalid(message: impl Into<String>) -> DocumentStoreError {
    DocumentStoreError::InvalidDocument(message.into())
}

fn stage_count(stage: &str, value: &Bson) -> DocumentStoreResult<usize> {
    let count = match value {
        Bson::Int32(n) => usize::try_from(*n).ok(),
        Bson::Int64(n) => usize::try_from(*n).ok(),
        Bson::Double(n) if n.fract() == 0.0 && *n >= 0.0 => Some(*n as usize),
        _ => None,
    };

    count.ok_or_else(|| invalid(format!("{stage} expects a non-negative integer")))
}

fn stage_document<'a>(stage: &str, value: &'a Bson) -> DocumentStoreResult<&'a Document> {
    match value {
        Bson::Document(spec) => Ok(spec),
        _ => Err(invalid(format!("{stage} expects a document"))),
    }
}

/// Evaluates a group key or accumulator operand against `document`.
///
/// `"$path"` strings resolve to the field value (`null` when missing), documents are
/// evaluated field by field and any other value is a literal.
fn evaluate_expression(document: &Document, expr: &Bson) -> DocumentStoreResult<Bson> {
    match expr {
        Bson::String(path) if path.starts_with('$') => Ok(resolve_path(document, &path[1..])
            .cloned()
            .unwrap_or(Bson::Null)),
        Bson::Document(fields) => {
            let mut evaluated = Document::new();
            for (key, value) in fields {
                if key.starts_with('$') {
                    return Err(DocumentStoreError::Unsupported(format!("expression operator {key}")));
                }
                evaluated.insert(key, evaluate_expression(document, value)?);
            }
            Ok(Bson::Document(evaluated))
        }
        literal => Ok(literal.clone()),
    }
}

#[derive(Debug)]
enum Accumulator {
    Sum(Bson),
    Avg { total: f64, count: u64 },
    Min(Option<Bson>),
    Max(Option<Bson>),
    First(Option<Bson>),
}

impl Accumulator {
    fn for_operator(operator: &str) -> DocumentStoreResult<Self> {
        Ok(match operator {
            "$sum" => Accumulator::Sum(Bson::Int32(0)),
            "$avg" => Accumulator::Avg { total: 0.0, count: 0 },
            "$min" => Accumulator::Min(None),
            "$max" => Accumulator::Max(None),
            "$first" => Accumulator::First(None),
            other => {
                return Err(DocumentStoreError::Unsupported(format!("accumulator {other}")));
            }
        })
    }

    fn feed(&mut self, value: Bson) {
        match self {
            Accumulator::Sum(total) => {
                if let Some(next) = numeric_add(total, &value) {
                    *total = next;
                }
            }
            Accumulator::Avg { total, count } => {
                if let Some(n) = as_f64(&value) {
                    *total += n;
                    *count += 1;
                }
            }
            Accumulator::Min(current) => Self::keep(current, value, Ordering::Less),
            Accumulator::Max(current) => Self::keep(current, value, Ordering::Greater),
            Accumulator::First(current) => {
                if current.is_none() {
                    *current = Some(value);
                }
            }
        }
    }

    fn keep(current: &mut Option<Bson>, value: Bson, wanted: Ordering) {
        if matches!(value, Bson::Null | Bson::Undefined) {
            return;
        }
        let replace = current
            .as_ref()
            .is_none_or(|held| compare_values(Some(&value), Some(held)) == wanted);
        if replace {
            *current = Some(value);
        }
    }

    fn finish(self) -> Bson {
        match self {
            Accumulator::Sum(total) => total,
            Accumulator::Avg { count: 0, .. } => Bson::Null,
            Accumulator::Avg { total, count } => Bson::Double(total / count as f64),
            Accumulator::Min(value) | Accumulator::Max(value) | Accumulator::First(value) => {
                value.unwrap_or(Bson::Null)
            }
        }
    }
}

fn group(documents: Vec<Document>, spec: &Document) -> DocumentStoreResult<Vec<Document>> {
    let key_expr = spec
        .get(ID_FIELD)
        .ok_or_else(|| invalid("$group requires an _id expression"))?;

    let mut fields = Vec::with_capacity(spec.len());
    for (field, accumulator) in spec.iter().filter(|(field, _)| *field != ID_FIELD) {
        match accumulator {
            Bson::Document(operator) if operator.len() == 1 => {
                if let Some((name, operand)) = operator.iter().next() {
                    Accumulator::for_operator(name)?;
                    fields.push((field.as_str(), name.as_str(), operand));
                }
            }
            _ => {
                return Err(invalid(format!(
                    "accumulator for {field} must be a single-operator document"
                )));
            }
        }
    }

    // groups keep first-seen order
    let mut groups: Vec<(Bson, Vec<Accumulator>)> = Vec::new();
    for document in &documents {
        let key = evaluate_expression(document, key_expr)?;
        let index = match groups.iter().position(|(existing, _)| *existing == key) {
            Some(index) => index,
            None => {
                let accumulators = fields
                    .iter()
                    .map(|(_, name, _)| Accumulator::for_operator(name))
                    .collect::<DocumentStoreResult<Vec<_>>>()?;
                groups.push((key, accumulators));
                groups.len() - 1
            }
        };

        for ((_, _, operand), accumulator) in fields.iter().zip(groups[index].1.iter_mut()) {
            accumulator.feed(evaluate_expression(document, operand)?);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accumulators)| {
            let mut output = Document::new();
            output.insert(ID_FIELD, key);
            for ((field, _, _), accumulator) in fields.iter().zip(accumulators) {
                output.insert(*field, accumulator.finish());
            }
            output
        })
        .collect())
}

fn lookup(
    documents: Vec<Document>,
    spec: &Document,
    collections: &CollectionMap,
) -> DocumentStoreResult<Vec<Document>> {
    let text = |key: &str| {
        spec.get_str(key)
            .map_err(|_| invalid(format!("$lookup requires a string {key}")))
    };
    let from = text("from")?;
    let local_field = text("localField")?;
    let foreign_field = text("foreignField")?;
    let target = text("as")?;

    let foreign = collections.get(from).map(Vec::as_slice).unwrap_or_default();

    documents
        .into_iter()
        .map(|mut document| {
            let local = resolve_path(&document, local_field)
                .cloned()
                .unwrap_or(Bson::Null);
            let joined = foreign
                .iter()
                .filter(|candidate| {
                    let value = resolve_path(candidate, foreign_field);
                    match &local {
                        Bson::Array(items) => items.iter().any(|item| equals(value, item)),
                        single => equals(value, single),
                    }
                })
                .cloned()
                .map(Bson::Document)
                .collect();

            set_path(&mut document, target, Bson::Array(joined))?;
            Ok(document)
        })
        .collect()
}

fn count(documents: Vec<Document>, value: &Bson) -> DocumentStoreResult<Vec<Document>> {
    let field = match value {
        Bson::String(field) if !field.is_empty() && !field.starts_with('$') && !field.contains('.') => field,
        _ => return Err(invalid("$count expects a plain field name")),
    };

    if documents.is_empty() {
        return Ok(Vec::new());
    }

    let total = i32::try_from(documents.len())
        .map(Bson::Int32)
        .unwrap_or(Bson::Int64(documents.len() as i64));
    let mut output = Document::new();
    output.insert(field.as_str(), total);
    Ok(vec![output])
}

fn run_stage(
    documents: Vec<Document>,
    stage: &Document,
    collections: &CollectionMap,
) -> DocumentStoreResult<Vec<Document>> {
    let mut entries = stage.iter();
    let (name, value) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => return Err(invalid("each pipeline stage must have exactly one field")),
    };

    trace!(stage = %name, input = documents.len(), "running pipeline stage");

    match name.as_str() {
        "$match" => {
            let expr = Expr::parse(stage_document(name, value)?)?;
            DocumentEvaluator::filter_documents(&documents, &expr)
        }
        "$project" => {
            let projection = stage_document(name, value)?;
            documents
                .iter()
                .map(|document| apply_projection(document, projection))
                .collect()
        }
        "$sort" => {
            let mut documents = documents;
            sort_documents(&mut documents, stage_document(name, value)?)?;
            Ok(documents)
        }
        "$skip" => {
            let skip = stage_count(name, value)?;
            Ok(documents.into_iter().skip(skip).collect())
        }
        "$limit" => {
            let limit = stage_count(name, value)?;
            if limit == 0 {
                return Err(invalid("$limit must be positive"));
            }
            let mut documents = documents;
            documents.truncate(limit);
            Ok(documents)
        }
        "$count" => count(documents, value),
        "$group" => group(documents, stage_document(name, value)?),
        "$lookup" => lookup(documents, stage_document(name, value)?, collections),
        other => Err(DocumentStoreError::Unsupported(format!("aggregation stage {other}"))),
    }
}

/// Runs `pipeline` over `documents`, resolving `$lookup` sources from `collections`.
pub(crate) fn run_pipeline(
    documents: Vec<Document>,
    pipeline: &[Document],
    collections: &CollectionMap,
) -> DocumentStoreResult<Vec<Document>> {
    pipeline
        .iter()
        .try_fold(documents, |documents, stage| run_stage(documents, stage, collections))
}

//! Document transformations: projections, sorting and update operators.

use bson::{Bson, Document};
use std::cmp::Ordering;

use docmodel_core::{
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    query::truthy,
};

use crate::evaluator::{Comparable, resolve_path};

/// Sets a dotted path, creating intermediate documents as needed.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }
            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(DocumentStoreError::InvalidDocument(format!(
                    "cannot create field {rest} inside non-document field {head}"
                ))),
            }
        }
    }
}

/// Removes a dotted path, returning the removed value.
pub(crate) fn remove_path(document: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => document.remove(path),
        Some((head, rest)) => match document.get_mut(head) {
            Some(Bson::Document(inner)) => remove_path(inner, rest),
            _ => None,
        },
    }
}

pub(crate) fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Adds two numeric values, widening `Int32` to `Int64` and integers to `Double` on overflow
/// or when either side is a `Double`.
pub(crate) fn numeric_add(left: &Bson, right: &Bson) -> Option<Bson> {
    Some(match (left, right) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map_or(Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32),
        (Bson::Int32(a), Bson::Int64(b)) | (Bson::Int64(b), Bson::Int32(a)) => i64::from(*a)
            .checked_add(*b)
            .map_or(Bson::Double(f64::from(*a) + *b as f64), Bson::Int64),
        (Bson::Int64(a), Bson::Int64(b)) => a
            .checked_add(*b)
            .map_or(Bson::Double(*a as f64 + *b as f64), Bson::Int64),
        _ => Bson::Double(as_f64(left)? + as_f64(right)?),
    })
}

fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => 1,
        Some(Bson::Int32(_)) | Some(Bson::Int64(_)) | Some(Bson::Double(_))
        | Some(Bson::Decimal128(_)) => 2,
        Some(Bson::String(_)) | Some(Bson::Symbol(_)) => 3,
        Some(Bson::Document(_)) => 4,
        Some(Bson::Array(_)) => 5,
        Some(Bson::Binary(_)) => 6,
        Some(Bson::ObjectId(_)) => 7,
        Some(Bson::Boolean(_)) => 8,
        Some(Bson::DateTime(_)) => 9,
        Some(Bson::Timestamp(_)) => 10,
        Some(Bson::RegularExpression(_)) => 11,
        Some(Bson::MinKey) => 0,
        Some(_) => 12,
    }
}

/// Total order over optional values following the BSON type bracket order.
///
/// Missing values sort with `null`, before every other type.
pub(crate) fn compare_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    type_rank(left)
        .cmp(&type_rank(right))
        .then_with(|| match (left, right) {
            (Some(left), Some(right)) => Comparable::from(left)
                .partial_cmp(&Comparable::from(right))
                .unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        })
}

fn sort_keys(sort: &Document) -> DocumentStoreResult<Vec<(&str, bool)>> {
    sort.iter()
        .map(|(field, direction)| match as_f64(direction) {
            Some(d) if d == 1.0 => Ok((field.as_str(), true)),
            Some(d) if d == -1.0 => Ok((field.as_str(), false)),
            _ => Err(DocumentStoreError::InvalidDocument(format!(
                "sort direction for {field} must be 1 or -1"
            ))),
        })
        .collect()
}

/// Sorts documents in place by a `{ field: 1 | -1 }` specification. The sort is stable.
pub(crate) fn sort_documents(documents: &mut [Document], sort: &Document) -> DocumentStoreResult<()> {
    let keys = sort_keys(sort)?;

    documents.sort_by(|a, b| {
        keys.iter()
            .map(|(field, ascending)| {
                let ordering = compare_values(resolve_path(a, field), resolve_path(b, field));
                if *ascending { ordering } else { ordering.reverse() }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });

    Ok(())
}

enum ProjectionField<'a> {
    Include,
    Exclude,
    Computed(&'a str),
}

fn projection_field<'a>(field: &str, spec: &'a Bson) -> DocumentStoreResult<ProjectionField<'a>> {
    match spec {
        Bson::String(path) => match path.strip_prefix('$') {
            Some(path) => Ok(ProjectionField::Computed(path)),
            None => Err(DocumentStoreError::Unsupported(format!(
                "literal projection for {field}"
            ))),
        },
        Bson::Boolean(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => {
            Ok(if truthy(spec) { ProjectionField::Include } else { ProjectionField::Exclude })
        }
        _ => Err(DocumentStoreError::Unsupported(format!(
            "projection expression for {field}"
        ))),
    }
}

/// Applies an inclusion or exclusion projection.
///
/// The identifier is kept unless explicitly excluded, in either mode.
pub(crate) fn apply_projection(document: &Document, projection: &Document) -> DocumentStoreResult<Document> {
    let mut include_id = true;
    let mut id_requested = false;
    let mut fields = Vec::with_capacity(projection.len());
    for (field, spec) in projection {
        let parsed = projection_field(field, spec)?;
        if field == ID_FIELD {
            include_id = !matches!(parsed, ProjectionField::Exclude);
            id_requested = include_id;
        } else {
            fields.push((field.as_str(), parsed));
        }
    }

    let including = fields
        .iter()
        .any(|(_, field)| !matches!(field, ProjectionField::Exclude));
    let excluding = fields
        .iter()
        .any(|(_, field)| matches!(field, ProjectionField::Exclude));
    if including && excluding {
        return Err(DocumentStoreError::InvalidDocument(
            "a projection cannot mix inclusion and exclusion".to_string(),
        ));
    }
    // `{ _id: 1 }` alone selects only the identifier
    let including = including || (id_requested && !excluding);

    if !including {
        let mut projected = document.clone();
        if !include_id {
            projected.remove(ID_FIELD);
        }
        for (field, _) in fields {
            remove_path(&mut projected, field);
        }
        return Ok(projected);
    }

    let mut projected = Document::new();
    if include_id {
        if let Some(id) = document.get(ID_FIELD) {
            projected.insert(ID_FIELD, id.clone());
        }
    }
    for (field, spec) in fields {
        let source = match spec {
            ProjectionField::Computed(path) => path,
            _ => field,
        };
        if let Some(value) = resolve_path(document, source) {
            set_path(&mut projected, field, value.clone())?;
        }
    }

    Ok(projected)
}

fn increment(current: Option<&Bson>, amount: &Bson, path: &str) -> DocumentStoreResult<Bson> {
    if as_f64(amount).is_none() {
        return Err(DocumentStoreError::InvalidDocument(format!(
            "cannot increment {path} by a non-numeric value"
        )));
    }

    match current {
        None => Ok(amount.clone()),
        Some(current) => numeric_add(current, amount).ok_or_else(|| {
            DocumentStoreError::InvalidDocument(format!("cannot increment non-numeric field {path}"))
        }),
    }
}

/// Applies an update document built from `$set`, `$unset` and `$inc` and returns the result.
///
/// # Errors
///
/// Fails on replacement-style updates, unknown operators and changes to the identifier.
pub(crate) fn apply_update(document: &Document, update: &Document) -> DocumentStoreResult<Document> {
    if update.is_empty() {
        return Err(DocumentStoreError::InvalidDocument("update document is empty".to_string()));
    }

    let mut updated = document.clone();
    for (operator, fields) in update {
        if !operator.starts_with('$') {
            return Err(DocumentStoreError::InvalidDocument(
                "update document may only contain update operators".to_string(),
            ));
        }
        let Bson::Document(fields) = fields else {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "{operator} expects a document"
            )));
        };

        match operator.as_str() {
            "$set" => {
                for (path, value) in fields {
                    set_path(&mut updated, path, value.clone())?;
                }
            }
            "$unset" => {
                for path in fields.keys() {
                    remove_path(&mut updated, path);
                }
            }
            "$inc" => {
                for (path, amount) in fields {
                    let next = increment(resolve_path(&updated, path), amount, path)?;
                    set_path(&mut updated, path, next)?;
                }
            }
            other => {
                return Err(DocumentStoreError::Unsupported(format!("update operator {other}")));
            }
        }
    }

    if updated.get(ID_FIELD) != document.get(ID_FIELD) {
        return Err(DocumentStoreError::InvalidDocument(
            "the _id field cannot be modified".to_string(),
        ));
    }

    Ok(updated)
}

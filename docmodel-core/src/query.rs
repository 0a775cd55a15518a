//! Filter documents, find options and a visitor API for evaluating filters.
//!
//! Collection operations take filters as opaque BSON documents in the query language of the
//! underlying store. Backends that do not hand filters to a server (such as the in-memory
//! backend) parse them into an [`Expr`] tree with [`Expr::parse`] and evaluate it with a
//! [`QueryVisitor`].
//!
//! # Find Options
//!
//! ```ignore
//! use docmodel::query::{FindOptions, Filter};
//! use bson::doc;
//!
//! let options = FindOptions::builder()
//!     .projection(doc! { "name": 1 })
//!     .sort(doc! { "age": -1 })
//!     .limit(10)
//!     .build();
//! ```
//!
//! # Supported Filter Syntax
//!
//! - Comparison: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`
//! - Membership: `$in`, `$nin`
//! - Existence: `$exists`
//! - Logical: `$and`, `$or`, `$nor`, and field-level `$not`
//! - Implicit equality: `{ "field": value }`

use bson::{Bson, Document, doc, oid::ObjectId};

use crate::{
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (exact match, or array membership).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Field equals any of the values.
    In,
    /// Field equals none of the values.
    Nin,
}

impl FieldOp {
    fn from_operator(operator: &str) -> Option<Self> {
        Some(match operator {
            "$eq" => FieldOp::Eq,
            "$ne" => FieldOp::Ne,
            "$gt" => FieldOp::Gt,
            "$gte" => FieldOp::Gte,
            "$lt" => FieldOp::Lt,
            "$lte" => FieldOp::Lte,
            "$in" => FieldOp::In,
            "$nin" => FieldOp::Nin,
            _ => return None,
        })
    }
}

/// A parsed filter expression.
///
/// An empty `And` matches every document.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOR of multiple expressions (none may match).
    Nor(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field path to compare, dotted for nested fields.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: impl Into<String>, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field: field.into(), op, value }
    }

    /// Parses a filter document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Unsupported`] for operators outside the supported syntax
    /// and [`DocumentStoreError::InvalidDocument`] for malformed operator arguments.
    pub fn parse(filter: &Document) -> DocumentStoreResult<Expr> {
        let mut clauses = filter
            .iter()
            .map(|(key, value)| match key.as_str() {
                "$and" => Ok(Expr::And(parse_clauses(key, value)?)),
                "$or" => Ok(Expr::Or(parse_clauses(key, value)?)),
                "$nor" => Ok(Expr::Nor(parse_clauses(key, value)?)),
                operator if operator.starts_with('$') => Err(DocumentStoreError::Unsupported(
                    format!("top-level operator {operator}"),
                )),
                field => parse_condition(field, value),
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        Ok(if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            Expr::And(clauses)
        })
    }
}

fn parse_clauses(operator: &str, value: &Bson) -> DocumentStoreResult<Vec<Expr>> {
    match value {
        Bson::Array(items) => items
            .iter()
            .map(|item| match item {
                Bson::Document(clause) => Expr::parse(clause),
                _ => Err(DocumentStoreError::InvalidDocument(format!(
                    "{operator} entries must be documents"
                ))),
            })
            .collect(),
        _ => Err(DocumentStoreError::InvalidDocument(format!("{operator} expects an array"))),
    }
}

fn is_operator_document(value: &Bson) -> Option<&Document> {
    match value {
        Bson::Document(inner)
            if !inner.is_empty() && inner.keys().all(|key| key.starts_with('$')) =>
        {
            Some(inner)
        }
        _ => None,
    }
}

fn parse_condition(field: &str, value: &Bson) -> DocumentStoreResult<Expr> {
    let Some(operators) = is_operator_document(value) else {
        return Ok(Expr::field(field, FieldOp::Eq, value.clone()));
    };

    let mut clauses = operators
        .iter()
        .map(|(operator, argument)| {
            if operator == "$exists" {
                return Ok(Expr::Exists(field.to_string(), truthy(argument)));
            }
            if operator == "$not" {
                return match is_operator_document(argument) {
                    Some(_) => Ok(Expr::Not(Box::new(parse_condition(field, argument)?))),
                    None => Err(DocumentStoreError::InvalidDocument(
                        "$not expects an operator document".to_string(),
                    )),
                };
            }

            let op = FieldOp::from_operator(operator).ok_or_else(|| {
                DocumentStoreError::Unsupported(format!("field operator {operator}"))
            })?;
            if matches!(op, FieldOp::In | FieldOp::Nin) && !matches!(argument, Bson::Array(_)) {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "{operator} expects an array"
                )));
            }

            Ok(Expr::field(field, op, argument.clone()))
        })
        .collect::<DocumentStoreResult<Vec<_>>>()?;

    Ok(if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        Expr::And(clauses)
    })
}

/// Interprets a BSON value the way the query engine interprets flags such as `$exists`.
pub fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

/// Helper struct for constructing common filter documents.
pub struct Filter;

impl Filter {
    /// Matches every document.
    pub fn all() -> Document {
        Document::new()
    }

    /// Matches the document with the given identifier.
    pub fn by_id(id: ObjectId) -> Document {
        doc! { ID_FIELD: id }
    }

    /// Matches documents where `field` equals `value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        let mut filter = Document::new();
        filter.insert(field.into(), value.into());
        filter
    }

    /// Matches documents where `field` equals any of `values`.
    pub fn any_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Document {
        let mut filter = Document::new();
        filter.insert(
            field.into(),
            doc! { "$in": values.into_iter().map(Into::into).collect::<Vec<Bson>>() },
        );
        filter
    }
}

/// Options applied to find operations.
///
/// `limit` is ignored by single-document reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Projection specification, see [`crate::projection::Projection`].
    pub projection: Option<Document>,
    /// Sort specification, `field: 1` ascending or `field: -1` descending.
    pub sort: Option<Document>,
    /// Number of documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
}

impl FindOptions {
    /// Creates a new find options builder.
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    /// Creates a new find options builder.
    pub fn new() -> Self {
        FindOptionsBuilder { options: FindOptions::default() }
    }

    /// Sets the projection specification.
    pub fn projection(mut self, projection: Document) -> Self {
        self.options.projection = Some(projection);
        self
    }

    /// Sets the sort specification.
    pub fn sort(mut self, sort: Document) -> Self {
        self.options.sort = Some(sort);
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: u64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Builds and returns the final options.
    pub fn build(self) -> FindOptions {
        self.options
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_nor(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Nor(exprs) => self.visit_nor(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        assert_eq!(Expr::parse(&Filter::all()).unwrap(), Expr::And(vec![]));
    }

    #[test]
    fn implicit_equality_and_operator_documents() {
        let expr = Expr::parse(&doc! { "name": "John", "age": { "$gte": 18, "$lt": 65 } }).unwrap();

        assert_eq!(
            expr,
            Expr::And(vec![
                Expr::field("name", FieldOp::Eq, Bson::String("John".into())),
                Expr::And(vec![
                    Expr::field("age", FieldOp::Gte, Bson::Int32(18)),
                    Expr::field("age", FieldOp::Lt, Bson::Int32(65)),
                ]),
            ])
        );
    }

    #[test]
    fn embedded_documents_without_operators_are_equality() {
        let expr = Expr::parse(&doc! { "contact": { "phone": "1" } }).unwrap();

        assert_eq!(
            expr,
            Expr::field("contact", FieldOp::Eq, Bson::Document(doc! { "phone": "1" }))
        );
    }

    #[test]
    fn logical_operators_and_negation() {
        let expr = Expr::parse(&doc! {
            "$or": [ { "verified": true }, { "age": { "$not": { "$gt": 30 } } } ],
            "email": { "$exists": false },
        })
        .unwrap();

        assert_eq!(
            expr,
            Expr::And(vec![
                Expr::Or(vec![
                    Expr::field("verified", FieldOp::Eq, Bson::Boolean(true)),
                    Expr::Not(Box::new(Expr::field("age", FieldOp::Gt, Bson::Int32(30)))),
                ]),
                Expr::Exists("email".into(), false),
            ])
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_operators() {
        assert!(matches!(
            Expr::parse(&doc! { "name": { "$regex": "^J" } }),
            Err(DocumentStoreError::Unsupported(_))
        ));
        assert!(matches!(
            Expr::parse(&doc! { "$where": "true" }),
            Err(DocumentStoreError::Unsupported(_))
        ));
        assert!(matches!(
            Expr::parse(&doc! { "age": { "$in": 3 } }),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
        assert!(matches!(
            Expr::parse(&doc! { "$and": { "a": 1 } }),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
    }

    #[test]
    fn filter_helpers_build_documents() {
        let id = ObjectId::new();

        assert_eq!(Filter::by_id(id), doc! { "_id": id });
        assert_eq!(Filter::eq("name", "Jack"), doc! { "name": "Jack" });
        assert_eq!(Filter::any_of("age", [1, 2]), doc! { "age": { "$in": [1, 2] } });
    }

    #[test]
    fn find_options_builder_sets_fields() {
        let options = FindOptions::builder()
            .projection(doc! { "name": 1 })
            .skip(5)
            .limit(5)
            .build();

        assert_eq!(options.projection, Some(doc! { "name": 1 }));
        assert_eq!(options.sort, None);
        assert_eq!(options.skip, Some(5));
        assert_eq!(options.limit, Some(5));
    }
}

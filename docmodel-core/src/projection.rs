//! Projection specifications for read operations.
//!
//! Each builder turns a list of field names into a projection document. Inclusion (`1`) and
//! exclusion (`0`) must not be mixed in a single projection, with the sole exception of the
//! identifier: `_id: 0` is honoured by the query engine even in inclusion mode, which is what
//! [`Projection::omit_id_and_pick`] relies on.
//!
//! ```ignore
//! use docmodel::projection::Projection;
//!
//! let projection = Projection::omit_id_and_pick(&["name", "email"]);
//! // { "name": 1, "email": 1, "_id": 0 }
//! ```

use bson::{Bson, Document};

use crate::document::ID_FIELD;

/// Namespace for projection builders.
pub struct Projection;

impl Projection {
    /// Excludes every key.
    pub fn omit<S: AsRef<str>>(keys: &[S]) -> Document {
        keys_to_document(keys, 0)
    }

    /// Includes every key.
    pub fn pick<S: AsRef<str>>(keys: &[S]) -> Document {
        keys_to_document(keys, 1)
    }

    /// Excludes every key and the identifier.
    pub fn omit_id_and<S: AsRef<str>>(keys: &[S]) -> Document {
        let mut projection = Self::omit(keys);
        projection.insert(ID_FIELD, 0);
        projection
    }

    /// Includes every key and excludes the identifier, even when it is listed in `keys`.
    pub fn omit_id_and_pick<S: AsRef<str>>(keys: &[S]) -> Document {
        let mut projection = Self::pick(keys);
        projection.insert(ID_FIELD, 0);
        projection
    }
}

fn keys_to_document<S: AsRef<str>>(keys: &[S], value: i32) -> Document {
    keys.iter()
        .map(|key| (key.as_ref().to_string(), Bson::Int32(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn omit_and_pick_cover_exactly_the_keys() {
        let keys = ["name", "email"];

        assert_eq!(Projection::omit(&keys), doc! { "name": 0, "email": 0 });
        assert_eq!(Projection::pick(&keys), doc! { "name": 1, "email": 1 });
    }

    #[test]
    fn omit_id_variants_always_zero_the_identifier() {
        let keys = ["name", "email"];

        assert_eq!(
            Projection::omit_id_and(&keys),
            doc! { "name": 0, "email": 0, "_id": 0 }
        );
        assert_eq!(
            Projection::omit_id_and_pick(&keys),
            doc! { "name": 1, "email": 1, "_id": 0 }
        );
    }

    #[test]
    fn picking_the_identifier_still_excludes_it() {
        let projection = Projection::omit_id_and_pick(&["_id", "name"]);

        assert_eq!(projection.get_i32("_id").unwrap(), 0);
        assert_eq!(projection.get_i32("name").unwrap(), 1);
        assert_eq!(projection.len(), 2);
    }

    #[test]
    fn empty_key_sets_still_drop_the_identifier() {
        let keys: [&str; 0] = [];

        assert!(Projection::pick(&keys).is_empty());
        assert_eq!(Projection::omit_id_and_pick(&keys), doc! { "_id": 0 });
    }
}

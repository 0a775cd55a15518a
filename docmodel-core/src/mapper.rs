//! Tag-driven structural mapping of records into field maps.
//!
//! A [`Tagged`] type describes, per tag namespace, the key each of its fields is published
//! under. Field descriptors are produced at compile time by `#[derive(Tagged)]`, or listed by
//! hand with the helpers in this module:
//!
//! ```ignore
//! impl Tagged for Contact {
//!     fn tag_map(&self, namespace: &str) -> TagMap {
//!         let mut map = TagMap::new();
//!         insert_tagged(&mut map, tag_for(namespace, &[("bson", "phone")]), || tag_value(&self.phone));
//!         map
//!     }
//! }
//! ```
//!
//! The resulting [`TagMap`] is unordered; callers must not rely on iteration order.

use bson::{Bson, Document, ser::serialize_to_bson};
use std::collections::HashMap;

/// Bound placed by `#[derive(Tagged)]` on generic plain fields.
pub use serde::Serialize;

/// Namespace used for storage-facing keys.
pub const BSON_NAMESPACE: &str = "bson";
/// Namespace used for API-facing keys.
pub const JSON_NAMESPACE: &str = "json";
/// Tag value marking a field as skipped.
pub const SKIP_TAG: &str = "-";

/// Unordered mapping from tag value to field value.
pub type TagMap = HashMap<String, Bson>;

/// Types that can be mapped into a [`TagMap`] for a given tag namespace.
pub trait Tagged {
    /// Maps this value into `tag -> value` pairs for `namespace`.
    ///
    /// Fields untagged in `namespace` or tagged `-` are omitted. Nested records appear as
    /// nested documents under their own key.
    fn tag_map(&self, namespace: &str) -> TagMap;
}

impl<T: Tagged + ?Sized> Tagged for &T {
    fn tag_map(&self, namespace: &str) -> TagMap {
        (**self).tag_map(namespace)
    }
}

impl<T: Tagged + ?Sized> Tagged for Box<T> {
    fn tag_map(&self, namespace: &str) -> TagMap {
        (**self).tag_map(namespace)
    }
}

/// An absent record maps to an empty map.
impl<T: Tagged> Tagged for Option<T> {
    fn tag_map(&self, namespace: &str) -> TagMap {
        match self {
            Some(value) => value.tag_map(namespace),
            None => TagMap::new(),
        }
    }
}

/// Resolves the key a raw tag publishes under.
///
/// Returns `None` for a missing tag, an empty tag or the skip marker; otherwise strips any
/// modifier suffix starting at the first comma (`"name,omitempty"` becomes `"name"`).
pub fn tag_key(raw: Option<&str>) -> Option<&str> {
    let raw = raw?;
    let key = match raw.split_once(',') {
        Some((key, _)) => key,
        None => raw,
    };

    if key.is_empty() || key == SKIP_TAG {
        None
    } else {
        Some(key)
    }
}

/// Looks up the raw tag declared for `namespace` in a field's descriptor list.
pub fn tag_for<'a>(namespace: &str, tags: &[(&str, &'a str)]) -> Option<&'a str> {
    tags.iter()
        .find(|(ns, _)| *ns == namespace)
        .map(|(_, tag)| *tag)
}

/// Converts a plain field value to BSON.
///
/// Values that cannot be represented in BSON are mapped to `Null` so that mapping stays total.
pub fn tag_value<V: Serialize + ?Sized>(value: &V) -> Bson {
    match serialize_to_bson(value) {
        Ok(bson) => bson,
        Err(err) => {
            tracing::warn!(error = %err, "field value could not be converted to bson");
            Bson::Null
        }
    }
}

/// Maps a nested record into a nested document under the same namespace.
pub fn nested_value<V: Tagged + ?Sized>(value: &V, namespace: &str) -> Bson {
    Bson::Document(into_document(value.tag_map(namespace)))
}

/// Inserts `value` under the resolved key of `raw_tag`, if it resolves.
pub fn insert_tagged(map: &mut TagMap, raw_tag: Option<&str>, value: impl FnOnce() -> Bson) {
    if let Some(key) = tag_key(raw_tag) {
        map.insert(key.to_string(), value());
    }
}

/// Converts a [`TagMap`] into a BSON document.
pub fn into_document(map: TagMap) -> Document {
    map.into_iter().collect()
}

/// Maps a record with the `bson` namespace.
pub fn to_bson_map<T: Tagged + ?Sized>(record: &T) -> TagMap {
    record.tag_map(BSON_NAMESPACE)
}

/// Maps a record with the `json` namespace.
pub fn to_json_map<T: Tagged + ?Sized>(record: &T) -> TagMap {
    record.tag_map(JSON_NAMESPACE)
}

/// Keeps only `keys` from `map`, in the order of `keys`.
///
/// Keys absent from the map are skipped.
pub fn pick<S: AsRef<str>>(map: &TagMap, keys: &[S]) -> Document {
    keys.iter()
        .filter_map(|key| {
            map.get(key.as_ref())
                .map(|value| (key.as_ref().to_string(), value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    struct Contact {
        phone: String,
        email: String,
    }

    impl Tagged for Contact {
        fn tag_map(&self, namespace: &str) -> TagMap {
            let mut map = TagMap::new();
            insert_tagged(
                &mut map,
                tag_for(namespace, &[("primary", "phone"), ("secondary", "Phone")]),
                || tag_value(&self.phone),
            );
            insert_tagged(
                &mut map,
                tag_for(namespace, &[("primary", "email"), ("secondary", "Email,omitempty")]),
                || tag_value(&self.email),
            );
            map
        }
    }

    struct Profile {
        name: String,
        age: i32,
        verified: bool,
        password: String,
        note: String,
        contact: Contact,
    }

    impl Tagged for Profile {
        fn tag_map(&self, namespace: &str) -> TagMap {
            let mut map = TagMap::new();
            insert_tagged(
                &mut map,
                tag_for(namespace, &[("primary", "name"), ("secondary", "Name")]),
                || tag_value(&self.name),
            );
            insert_tagged(
                &mut map,
                tag_for(namespace, &[("primary", "age"), ("secondary", "Age")]),
                || tag_value(&self.age),
            );
            insert_tagged(
                &mut map,
                tag_for(namespace, &[("primary", "verified"), ("secondary", "Verified")]),
                || tag_value(&self.verified),
            );
            insert_tagged(
                &mut map,
                tag_for(namespace, &[("primary", "-"), ("secondary", "-")]),
                || tag_value(&self.password),
            );
            insert_tagged(&mut map, tag_for(namespace, &[]), || tag_value(&self.note));
            insert_tagged(
                &mut map,
                tag_for(namespace, &[("primary", "contact"), ("secondary", "Contact")]),
                || nested_value(&self.contact, namespace),
            );
            map
        }
    }

    fn profile() -> Profile {
        Profile {
            name: "John".into(),
            age: 20,
            verified: true,
            password: "secret".into(),
            note: "untagged".into(),
            contact: Contact { phone: "123456789".into(), email: "app@example.com".into() },
        }
    }

    #[test]
    fn tag_key_strips_modifiers_and_skips_markers() {
        assert_eq!(tag_key(Some("name")), Some("name"));
        assert_eq!(tag_key(Some("name,omitempty")), Some("name"));
        assert_eq!(tag_key(Some("-")), None);
        assert_eq!(tag_key(Some("")), None);
        assert_eq!(tag_key(Some(",omitempty")), None);
        assert_eq!(tag_key(None), None);
    }

    #[test]
    fn maps_nested_records_under_their_own_key() {
        let map = profile().tag_map("primary");

        assert_eq!(map.len(), 4);
        assert_eq!(map["name"], Bson::String("John".into()));
        assert_eq!(map["age"], Bson::Int32(20));
        assert_eq!(map["verified"], Bson::Boolean(true));

        let contact = map["contact"].as_document().unwrap();
        assert_eq!(contact.get_str("phone").unwrap(), "123456789");
        assert_eq!(contact.get_str("email").unwrap(), "app@example.com");
    }

    #[test]
    fn switching_namespace_changes_keys_not_shape() {
        let map = profile().tag_map("secondary");

        let mut keys = map.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        assert_eq!(keys, vec!["Age", "Contact", "Name", "Verified"]);

        let contact = map["Contact"].as_document().unwrap();
        assert_eq!(contact.get_str("Phone").unwrap(), "123456789");
        assert_eq!(contact.get_str("Email").unwrap(), "app@example.com");
    }

    #[test]
    fn unknown_namespace_and_absent_record_map_to_nothing() {
        assert!(profile().tag_map("yaml").is_empty());
        assert!(None::<Profile>.tag_map("primary").is_empty());
    }

    #[test]
    fn pick_keeps_requested_keys_in_order() {
        let map = to_bson_map(&Some(profile()));
        assert!(map.is_empty());

        let map = profile().tag_map("primary");
        assert_eq!(
            pick(&map, &["verified", "name", "missing"]),
            doc! { "verified": true, "name": "John" }
        );
    }
}

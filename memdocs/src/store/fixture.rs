use crate::collection::Document;
use crate::common::{Value, PATH_SEPARATOR, SUB_COLLECTION_KEY};
use crate::errors::{DocsError, DocsResult, ErrorKind};
use crate::store::Collection;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Flat view of a store's contents: collection path to its documents.
pub type CollectionPaths = BTreeMap<String, Collection>;

/// Nested seed data: collection name, then document id, then record.
///
/// A record may hold a `subCollection` entry whose value is another
/// fixture of the same shape:
///
/// ```json
/// {
///   "users": {
///     "u1": { "name": "Ann", "subCollection": { "orders": { "o1": { "total": 3 } } } }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fixture {
    collections: IndexMap<String, IndexMap<String, Document>>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) one record.
    pub fn insert(&mut self, collection: &str, id: &str, record: Document) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record);
    }

    pub fn collection_names(&self) -> Vec<&str> {
        self.collections.keys().map(String::as_str).collect()
    }

    pub fn collection(&self, name: &str) -> Option<&IndexMap<String, Document>> {
        self.collections.get(name)
    }

    pub fn from_json_str(json: &str) -> DocsResult<Fixture> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_json_value(value)
    }

    /// # Errors
    ///
    /// Returns [ErrorKind::EncodingError] unless `json` is an object of
    /// objects of objects.
    pub fn from_json_value(json: serde_json::Value) -> DocsResult<Fixture> {
        let serde_json::Value::Object(collections) = json else {
            return Err(Self::shape_error("root"));
        };
        let mut fixture = Fixture::new();
        for (name, records) in collections {
            let serde_json::Value::Object(records) = records else {
                return Err(Self::shape_error(&format!("collection '{}'", name)));
            };
            for (id, record) in records {
                if !record.is_object() {
                    return Err(Self::shape_error(&format!("record '{}' of '{}'", id, name)));
                }
                fixture.insert(&name, &id, Document::from_json(record)?);
            }
        }
        Ok(fixture)
    }

    fn from_document(document: &Document) -> DocsResult<Fixture> {
        let mut fixture = Fixture::new();
        for (name, records) in document.iter() {
            let records = records
                .as_document()
                .ok_or_else(|| Self::shape_error(&format!("collection '{}'", name)))?;
            for (id, record) in records.iter() {
                let record = record
                    .as_document()
                    .ok_or_else(|| Self::shape_error(&format!("record '{}' of '{}'", id, name)))?;
                fixture.insert(name, id, record.clone());
            }
        }
        Ok(fixture)
    }

    fn shape_error(what: &str) -> DocsError {
        log::error!("Fixture {} is not an object", what);
        DocsError::new(
            &format!("Fixture {} is not an object", what),
            ErrorKind::EncodingError,
        )
    }
}

/// Flattens a fixture into top-level collection paths of the form `/<name>`.
///
/// Nested sub-collections become collections of their own and the
/// `subCollection` entry is dropped from the stored record. When two
/// collections share a name, the one flattened last wins, and a parent is
/// flattened after its sub-collections.
pub fn to_collection_paths(fixture: &Fixture) -> DocsResult<CollectionPaths> {
    let mut paths = CollectionPaths::new();
    flatten_into(fixture, &mut paths)?;
    Ok(paths)
}

fn flatten_into(fixture: &Fixture, paths: &mut CollectionPaths) -> DocsResult<()> {
    for (name, records) in fixture.collections.iter() {
        let mut collection = Collection::new();
        for (id, record) in records.iter() {
            let mut record = record.clone();
            if let Some(nested) = record.remove(SUB_COLLECTION_KEY) {
                match nested {
                    Value::Document(nested) => flatten_into(&Fixture::from_document(&nested)?, paths)?,
                    Value::Null => {}
                    _ => return Err(Fixture::shape_error(&format!("subCollection of '{}/{}'", name, id))),
                }
            }
            collection.insert(id.clone(), record);
        }
        paths.insert(format!("{}{}", PATH_SEPARATOR, name), collection);
    }
    Ok(())
}

/// Rebuilds a fixture from single-segment collection paths.
///
/// # Errors
///
/// Returns [ErrorKind::InvalidOperation] for a nested path such as
/// `/users/u1/orders`, which has no place in the fixture layout.
pub fn to_fixture_export(paths: &CollectionPaths) -> DocsResult<Fixture> {
    let mut fixture = Fixture::new();
    for (path, collection) in paths.iter() {
        let name = path.strip_prefix(PATH_SEPARATOR).unwrap_or(path);
        if name.is_empty() || name.contains(PATH_SEPARATOR) {
            log::error!("Cannot export nested collection path '{}'", path);
            return Err(DocsError::new(
                &format!("Cannot export nested collection path '{}'", path),
                ErrorKind::InvalidOperation,
            ));
        }
        let records = fixture.collections.entry(name.to_string()).or_default();
        for (id, document) in collection.iter() {
            records.insert(id.clone(), document.clone());
        }
    }
    Ok(fixture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    const NESTED: &str = r#"{
        "users": {
            "u1": {
                "id": "u1",
                "name": "Ann",
                "subCollection": { "orders": { "o1": { "id": "o1", "total": 3 } } }
            }
        },
        "items": { "0": { "id": "0", "name": "a" } }
    }"#;

    #[test]
    fn test_from_json_keeps_collection_order() {
        let fixture = Fixture::from_json_str(NESTED).unwrap();
        assert_eq!(fixture.collection_names(), vec!["users", "items"]);
        assert_eq!(fixture.collection("items").map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_from_json_rejects_bad_shapes() {
        for bad in [r#"[1]"#, r#"{"items": 1}"#, r#"{"items": {"0": "a"}}"#] {
            let err = Fixture::from_json_str(bad).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::EncodingError, "input {}", bad);
        }
    }

    #[test]
    fn test_from_json_rejects_malformed_text() {
        let err = Fixture::from_json_str("{").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::EncodingError);
    }

    #[test]
    fn test_flatten_promotes_sub_collections() {
        let fixture = Fixture::from_json_str(NESTED).unwrap();
        let paths = to_collection_paths(&fixture).unwrap();

        let keys: Vec<&String> = paths.keys().collect();
        assert_eq!(keys, vec!["/items", "/orders", "/users"]);
        assert_eq!(paths["/users"]["u1"], doc! { "id": "u1", "name": "Ann" });
        assert_eq!(paths["/orders"]["o1"], doc! { "id": "o1", "total": 3 });
    }

    #[test]
    fn test_flatten_rejects_scalar_sub_collection() {
        let mut fixture = Fixture::new();
        fixture.insert("items", "0", doc! { "subCollection": 5 });
        let err = to_collection_paths(&fixture).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::EncodingError);
    }

    #[test]
    fn test_export_single_segment_paths() {
        let fixture = Fixture::from_json_str(r#"{"items": {"0": {"id": "0"}}}"#).unwrap();
        let paths = to_collection_paths(&fixture).unwrap();
        let exported = to_fixture_export(&paths).unwrap();
        assert_eq!(exported, fixture);
    }

    #[test]
    fn test_export_rejects_nested_paths() {
        let mut paths = CollectionPaths::new();
        paths.insert("/users/u1/orders".to_string(), Collection::new());
        let err = to_fixture_export(&paths).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }
}

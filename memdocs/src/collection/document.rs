use crate::common::{Value, DOC_ID};
use crate::errors::{DocsError, DocsResult, ErrorKind};
use im::OrdMap;
use itertools::Itertools;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt::{Debug, Display};

pub type FieldVec = SmallVec<[String; 8]>;

/// A record stored in a collection: field names mapped to [Value]s.
///
/// The identity field (`id` unless a query says otherwise) is an ordinary
/// field as far as the document is concerned; the store is what keeps it in
/// sync with the key the document is filed under.
///
/// ## Persistent map
///
/// Fields live in an `im::OrdMap`, so cloning a document is O(1) and a
/// snapshot handed to a query never observes later mutations of the store.
#[derive(Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Document {
    data: OrdMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document { data: OrdMap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Associates `value` with `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::InvalidOperation] if the key is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use memdocs::collection::Document;
    /// use memdocs::common::Value;
    ///
    /// let mut doc = Document::new();
    /// doc.put("name", "Alice").unwrap();
    /// doc.put("age", 30).unwrap();
    /// assert_eq!(doc.get("age"), Some(&Value::I64(30)));
    /// ```
    pub fn put<'a, T: Into<Value>>(&mut self, key: impl Into<Cow<'a, str>>, value: T) -> DocsResult<()> {
        let key = key.into();
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(DocsError::new(
                "Document does not support empty key",
                ErrorKind::InvalidOperation,
            ));
        }
        self.data.insert(key.into_owned(), value.into());
        Ok(())
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns the value stored under `key`, or [Value::Null] when absent.
    pub fn value_of(&self, key: &str) -> Value {
        self.data.get(key).cloned().unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Top level field names in key order.
    pub fn fields(&self) -> FieldVec {
        self.data.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    /// The string form of the identity field, read from `id_field`.
    pub fn id_of(&self, id_field: &str) -> Option<String> {
        self.data.get(id_field).and_then(Value::to_id_string)
    }

    /// The string form of the default `id` field.
    pub fn id(&self) -> Option<String> {
        self.id_of(DOC_ID)
    }

    /// Shallow merge: every field of `other` overwrites the field of the
    /// same name in a copy of this document.
    pub fn merge(&self, other: &Document) -> Document {
        let mut data = self.data.clone();
        for (key, value) in other.data.iter() {
            data.insert(key.clone(), value.clone());
        }
        Document { data }
    }

    /// Builds a document from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::EncodingError] if `json` is not an object.
    pub fn from_json(json: serde_json::Value) -> DocsResult<Document> {
        match json {
            serde_json::Value::Object(map) => {
                let mut doc = Document::new();
                for (key, value) in map {
                    doc.put(key, Value::from_json(value)?)?;
                }
                Ok(doc)
            }
            other => {
                log::error!("Expected a JSON object for a document, found {}", other);
                Err(DocsError::new(
                    &format!("Expected a JSON object for a document, found {}", other),
                    ErrorKind::EncodingError,
                ))
            }
        }
    }

    /// Converts this document into a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .data
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.data.iter()).finish()
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = self
            .data
            .iter()
            .map(|(k, v)| format!("{:?}: {}", k, v))
            .join(", ");
        write!(f, "{{{}}}", body)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let data = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _): &(String, Value)| !k.is_empty())
            .collect();
        Document { data }
    }
}

/// Builds a [Document] from `"key": value` pairs.
///
/// Values may be nested documents (`{ .. }`), arrays (`[ .. ]`) or any
/// expression convertible into a [Value]. Keys must be non-empty string
/// literals.
///
/// ```rust
/// use memdocs::doc;
///
/// let doc = doc! { "id": "0", "name": "a", "tags": ["x", "y"], "meta": { "rank": 1 } };
/// assert_eq!(doc.size(), 4);
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::collection::Document::new()
    };

    ($($key:literal : $value:tt),* $(,)?) => {
        {
            let mut doc = $crate::collection::Document::new();
            $(
                doc.put($key, $crate::doc_value!($value))
                    .expect(&format!("Failed to put value {} in document", stringify!($value)));
            )*
            doc
        }
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! doc_value {
    ({ $($key:literal : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}

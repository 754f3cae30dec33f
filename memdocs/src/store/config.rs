use crate::collection::Document;
use crate::common::{DEFAULT_CREATE_LATENCY_MS, DOC_ID, PATH_SEPARATOR};
use crate::errors::{DocsError, DocsResult, ErrorKind};
use crate::store::{to_collection_paths, Collection, DocumentStore, Fixture};
use std::collections::BTreeMap;
use std::time::Duration;

/// Settings of a [DocumentStore].
///
/// * `create_latency` - artificial delay between applying a `create` and
///   announcing it, emulating a remote write (2000 ms by default)
/// * `id_field` - field the store writes document ids into (`id` by default)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    create_latency: Duration,
    id_field: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            create_latency: Duration::from_millis(DEFAULT_CREATE_LATENCY_MS),
            id_field: DOC_ID.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_latency(&self) -> Duration {
        self.create_latency
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn set_create_latency(&mut self, latency: Duration) {
        self.create_latency = latency;
    }

    /// # Errors
    ///
    /// Returns [ErrorKind::ConfigurationError] for an empty field name.
    pub fn set_id_field(&mut self, id_field: &str) -> DocsResult<()> {
        if id_field.is_empty() {
            log::error!("Id field name cannot be empty");
            return Err(DocsError::new(
                "Id field name cannot be empty",
                ErrorKind::ConfigurationError,
            ));
        }
        self.id_field = id_field.to_string();
        Ok(())
    }
}

/// Builder for a pre-seeded [DocumentStore].
///
/// Collections are never created implicitly on read, so every collection a
/// caller will query should be declared here, either empty, with documents
/// or through a [Fixture]. Configuration errors are captured and returned by
/// [`StoreBuilder::open`].
///
/// # Examples
///
/// ```rust
/// use memdocs::doc;
/// use memdocs::store::StoreBuilder;
/// use std::time::Duration;
///
/// let store = StoreBuilder::new()
///     .create_latency(Duration::ZERO)
///     .documents("/items", vec![doc! { "id": "0", "name": "a" }])
///     .collection("/archive")
///     .open()
///     .unwrap();
/// assert_eq!(store.collection_paths(), vec!["/archive", "/items"]);
/// ```
#[derive(Default)]
pub struct StoreBuilder {
    error: Option<DocsError>,
    config: StoreConfig,
    collections: BTreeMap<String, Collection>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delay applied between a `create` and its change signal.
    pub fn create_latency(mut self, latency: Duration) -> Self {
        self.config.set_create_latency(latency);
        self
    }

    /// Sets the field documents carry their id in.
    ///
    /// Applies to documents seeded after this call.
    pub fn id_field(mut self, id_field: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_id_field(id_field) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Declares an empty collection.
    pub fn collection(mut self, path: &str) -> Self {
        if self.error.is_none() {
            match Self::validate_path(path) {
                Ok(_) => {
                    self.collections.entry(path.to_string()).or_default();
                }
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    /// Seeds a collection with documents.
    ///
    /// Documents are keyed by their id field; a document without one gets the
    /// next free numeric id, as `create` would assign it.
    pub fn documents(mut self, path: &str, documents: Vec<Document>) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Err(e) = Self::validate_path(path) {
            self.error = Some(e);
            return self;
        }

        let id_field = self.config.id_field().to_string();
        let collection = self.collections.entry(path.to_string()).or_default();
        for document in documents {
            let id = match document.id_of(&id_field) {
                Some(id) => id,
                None => DocumentStore::next_id(collection),
            };
            let mut document = document;
            if let Err(e) = document.put(id_field.as_str(), id.as_str()) {
                self.error = Some(e);
                return self;
            }
            collection.insert(id, document);
        }
        self
    }

    /// Seeds every collection described by a fixture.
    pub fn fixture(mut self, fixture: Fixture) -> Self {
        if self.error.is_none() {
            match to_collection_paths(&fixture) {
                Ok(paths) => {
                    for (path, collection) in paths {
                        self.collections.insert(path, collection);
                    }
                }
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    /// Opens the store, or returns the first configuration error.
    pub fn open(self) -> DocsResult<DocumentStore> {
        if let Some(error) = self.error {
            return Err(error);
        }
        log::debug!(
            "Opening document store with {} collection(s)",
            self.collections.len()
        );
        Ok(DocumentStore::new(self.config, self.collections))
    }

    fn validate_path(path: &str) -> DocsResult<()> {
        if path.trim_matches(PATH_SEPARATOR).is_empty() || path.ends_with(PATH_SEPARATOR) {
            log::error!("Invalid collection path '{}'", path);
            return Err(DocsError::new(
                &format!("Invalid collection path '{}'", path),
                ErrorKind::InvalidPath,
            ));
        }
        Ok(())
    }
}

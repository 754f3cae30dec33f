use crate::common::PATH_SEPARATOR;
use crate::errors::{DocsError, DocsResult, ErrorKind};
use smallvec::{smallvec, SmallVec};
use std::fmt::Display;

/// A document path split into its collection part and its id.
///
/// The last `/`-separated segment is the id, everything before it is the
/// collection path: `/items/3` addresses document `3` of `/items`, and
/// `/users/u1/orders/7` addresses document `7` of `/users/u1/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    collection: String,
    id: String,
}

impl DocPath {
    /// Splits `path` into collection and id.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::InvalidPath] when either part is empty, as in
    /// `items`, `/items/` or `/3`.
    pub fn parse(path: &str) -> DocsResult<DocPath> {
        let invalid = || {
            log::error!("Invalid document path '{}'", path);
            DocsError::new(
                &format!("Invalid document path '{}', expected <collection>/<id>", path),
                ErrorKind::InvalidPath,
            )
        };

        let (collection, id) = path.rsplit_once(PATH_SEPARATOR).ok_or_else(invalid)?;
        if id.is_empty() || collection.trim_matches(PATH_SEPARATOR).is_empty() {
            return Err(invalid());
        }
        Ok(DocPath {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    pub fn new(collection: &str, id: &str) -> DocPath {
        DocPath {
            collection: collection.trim_end_matches(PATH_SEPARATOR).to_string(),
            id: id.to_string(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.collection, PATH_SEPARATOR, self.id)
    }
}

/// Keys under which a collection path may be registered, in lookup order:
/// the rooted form (`/items`) first, then the path exactly as given.
pub fn lookup_keys(path: &str) -> SmallVec<[String; 2]> {
    let rooted = format!("{}{}", PATH_SEPARATOR, path);
    if path.starts_with(PATH_SEPARATOR) {
        smallvec![path.to_string()]
    } else {
        smallvec![rooted, path.to_string()]
    }
}

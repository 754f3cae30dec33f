/// The default identity field of a document.
pub const DOC_ID: &str = "id";

/// Separator between the segments of a collection or document path.
pub const PATH_SEPARATOR: char = '/';

/// Fixture records carry nested collections under this key.
pub const SUB_COLLECTION_KEY: &str = "subCollection";

/// Default artificial completion delay of `create`, in milliseconds.
pub const DEFAULT_CREATE_LATENCY_MS: u64 = 2000;

/// Event type name used on every memdocs event bus.
pub const DOCS_EVENT: &str = "memdocs_event";

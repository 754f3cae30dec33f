use crate::collection::Document;
use crate::common::{SortOrder, DOC_ID};
use crate::errors::DocsResult;
use crate::filter::WhereClause;

/// One sort key of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrderBy {
    pub field: String,
    pub direction: SortOrder,
}

impl OrderBy {
    pub fn new(field: &str, direction: SortOrder) -> Self {
        OrderBy {
            field: field.to_string(),
            direction,
        }
    }

    /// Builds a key from a direction string: `"asc"`, `"desc"` or `""`.
    pub fn parse(field: &str, direction: &str) -> DocsResult<Self> {
        Ok(OrderBy::new(field, direction.parse()?))
    }
}

/// Describes one query against a collection.
///
/// * `path` - collection path, such as `/items`
/// * `id_field` - field holding document identity, used to locate the
///   `start_after` cursor (defaults to `id`)
/// * `filters` - where clauses, all of which must hold
/// * `order_by` - sort keys, the first one dominant
/// * `limit` - maximum number of documents returned
/// * `start_after` - cursor document; results resume after the document
///   with the same id
///
/// # Examples
///
/// ```rust
/// use memdocs::common::SortOrder;
/// use memdocs::filter::field;
/// use memdocs::query::DocsQuery;
///
/// let query = DocsQuery::new("/items")
///     .filter(field("tag").eq("x"))
///     .sort_by("name", SortOrder::Descending)
///     .limit(10);
/// assert_eq!(query.limit, Some(10));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DocsQuery {
    pub path: String,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub id_field: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, rename = "where", skip_serializing_if = "Vec::is_empty"))]
    pub filters: Vec<WhereClause>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub order_by: Vec<OrderBy>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub limit: Option<usize>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub start_after: Option<Document>,
}

impl DocsQuery {
    pub fn new(path: &str) -> Self {
        DocsQuery {
            path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn id_field(mut self, id_field: &str) -> Self {
        self.id_field = Some(id_field.to_string());
        self
    }

    /// Adds one where clause.
    pub fn filter(mut self, clause: WhereClause) -> Self {
        self.filters.push(clause);
        self
    }

    /// Replaces every where clause.
    pub fn filters(mut self, clauses: Vec<WhereClause>) -> Self {
        self.filters = clauses;
        self
    }

    /// Appends a sort key after the existing ones.
    pub fn sort_by(mut self, field: &str, direction: SortOrder) -> Self {
        self.order_by.push(OrderBy::new(field, direction));
        self
    }

    pub fn order_by(mut self, order_by: Vec<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }

    /// Caps the number of documents returned. Zero means no limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: Document) -> Self {
        self.start_after = Some(cursor);
        self
    }

    /// The identity field, `id` unless overridden.
    pub fn id_field_name(&self) -> &str {
        self.id_field.as_deref().unwrap_or(DOC_ID)
    }
}

use crate::collection::Document;
use crate::common::DOC_ID;
use crate::query::OrderBy;

/// One text predicate of a search.
///
/// With a `column`, only that field is tested; without one, the filter
/// matches when any field of the record does. A `keyword` filter needs an
/// exact string match, otherwise the field must contain `value` ignoring
/// case. Fields that are not strings never match a non-keyword filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchFilter {
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub column: Option<String>,
    pub value: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub keyword: bool,
}

impl SearchFilter {
    /// A case-insensitive substring filter over every field.
    pub fn new(value: &str) -> Self {
        SearchFilter {
            column: None,
            value: value.to_string(),
            keyword: false,
        }
    }

    pub fn column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }

    pub fn keyword(mut self) -> Self {
        self.keyword = true;
        self
    }

    pub fn matches(&self, record: &Document) -> bool {
        match &self.column {
            Some(column) => self.matches_field(record, column),
            None => record.iter().any(|(column, _)| self.matches_field(record, column)),
        }
    }

    fn matches_field(&self, record: &Document, column: &str) -> bool {
        let Some(value) = record.get(column) else {
            return false;
        };
        if self.keyword {
            return value.as_string() == Some(&self.value);
        }
        match value.to_lowercase() {
            Some(text) => text.contains(&self.value.to_lowercase()),
            None => false,
        }
    }
}

/// A primary filter refined by include and exclude lists.
///
/// A record matches when the primary filter matches, at least one
/// `include` filter matches (if any are given) and no `exclude` filter
/// matches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchQuery {
    pub q: SearchFilter,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub include: Vec<SearchFilter>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub exclude: Vec<SearchFilter>,
}

impl SearchQuery {
    pub fn new(q: SearchFilter) -> Self {
        SearchQuery {
            q,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    pub fn include(mut self, filter: SearchFilter) -> Self {
        self.include.push(filter);
        self
    }

    pub fn exclude(mut self, filter: SearchFilter) -> Self {
        self.exclude.push(filter);
        self
    }

    pub fn matches(&self, record: &Document) -> bool {
        if !self.q.matches(record) {
            return false;
        }
        if !self.include.is_empty() && !self.include.iter().any(|f| f.matches(record)) {
            return false;
        }
        !self.exclude.iter().any(|f| f.matches(record))
    }
}

/// Arguments of a [SearchService](crate::search::SearchService) call.
///
/// `index` names the collection to search. Without a `query` every record
/// of the index is returned.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SearchParameters {
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub index: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub query: Option<SearchQuery>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub order_by: Vec<OrderBy>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub limit: Option<usize>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub start_after: Option<Document>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub id_field: Option<String>,
}

impl SearchParameters {
    pub fn new(index: &str) -> Self {
        SearchParameters {
            index: Some(index.to_string()),
            ..Default::default()
        }
    }

    pub fn query(mut self, query: SearchQuery) -> Self {
        self.query = Some(query);
        self
    }

    pub fn order_by(mut self, order_by: Vec<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, cursor: Document) -> Self {
        self.start_after = Some(cursor);
        self
    }

    pub fn id_field(mut self, id_field: &str) -> Self {
        self.id_field = Some(id_field.to_string());
        self
    }

    pub fn id_field_name(&self) -> &str {
        self.id_field.as_deref().unwrap_or(DOC_ID)
    }
}

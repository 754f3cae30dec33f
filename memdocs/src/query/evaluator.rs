use crate::collection::Document;
use crate::errors::DocsResult;
use crate::filter::WhereClause;
use crate::query::{DocsQuery, OrderBy};
use std::cmp::Ordering;

/// Runs `query` over a snapshot of its collection.
///
/// The stages run in a fixed order: filter, order, cursor, limit.
pub fn evaluate(documents: Vec<Document>, query: &DocsQuery) -> DocsResult<Vec<Document>> {
    let mut documents = filter_documents(documents, &query.filters)?;
    sort_documents(&mut documents, &query.order_by);
    let documents = match &query.start_after {
        Some(cursor) => skip_through(documents, cursor, query.id_field_name()),
        None => documents,
    };
    Ok(limit_documents(documents, query.limit))
}

/// Keeps the documents that satisfy every clause.
pub fn filter_documents(documents: Vec<Document>, clauses: &[WhereClause]) -> DocsResult<Vec<Document>> {
    if clauses.is_empty() {
        return Ok(documents);
    }
    let mut kept = Vec::with_capacity(documents.len());
    for document in documents {
        if all_match(&document, clauses)? {
            kept.push(document);
        }
    }
    Ok(kept)
}

fn all_match(document: &Document, clauses: &[WhereClause]) -> DocsResult<bool> {
    for clause in clauses {
        if !clause.matches(document)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Sorts by every key, the first key dominant.
///
/// One stable pass per key runs from the last key to the first, so each
/// earlier key only reorders documents the later passes left tied on it.
pub fn sort_documents(documents: &mut [Document], order_by: &[OrderBy]) {
    for key in order_by.iter().rev() {
        documents.sort_by(|a, b| compare_field(a, b, key));
    }
}

fn compare_field(a: &Document, b: &Document, key: &OrderBy) -> Ordering {
    let ordering = match (a.get(&key.field), b.get(&key.field)) {
        (Some(x), Some(y)) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    if key.direction.is_descending() {
        ordering.reverse()
    } else {
        ordering
    }
}

/// Drops every document up to and including the one whose `id_field`
/// matches the cursor's. Without a match, or when the cursor has no
/// `id_field`, nothing is dropped.
pub fn skip_through(documents: Vec<Document>, cursor: &Document, id_field: &str) -> Vec<Document> {
    let Some(cursor_id) = cursor.get(id_field) else {
        log::debug!("Cursor has no {} field, ignoring it", id_field);
        return documents;
    };
    let position = documents
        .iter()
        .position(|document| document.get(id_field) == Some(cursor_id));
    match position {
        Some(index) => documents.into_iter().skip(index + 1).collect(),
        None => documents,
    }
}

/// Keeps the first `limit` documents. A limit of zero means no limit.
pub fn limit_documents(mut documents: Vec<Document>, limit: Option<usize>) -> Vec<Document> {
    if let Some(limit) = limit.filter(|limit| *limit > 0) {
        documents.truncate(limit);
    }
    documents
}

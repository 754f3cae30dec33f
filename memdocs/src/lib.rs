//! # memdocs - Reactive In-Memory Document Store
//!
//! memdocs keeps collections of JSON-like documents in memory and serves
//! live queries over them with document-database semantics: where clauses,
//! multi-key ordering, limits and `start_after` cursors. Every mutation
//! broadcasts a change signal for its collection, and every live query
//! re-evaluates and re-emits when its collection changes.
//!
//! On top of the query layer sit a client-side text search and a cursor
//! based pagination driver that turns page, sort and filter events into
//! exactly one page request each.
//!
//! ## Quick Start
//!
//! ```rust
//! use memdocs::doc;
//! use memdocs::filter::field;
//! use memdocs::query::{DocsQuery, QueryService};
//! use memdocs::store::StoreBuilder;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = StoreBuilder::new()
//!     .create_latency(Duration::ZERO)
//!     .documents("/items", vec![
//!         doc! { "id": "0", "name": "a", "tag": "x" },
//!         doc! { "id": "1", "name": "b", "tag": "y" },
//!     ])
//!     .open()?;
//! let service = QueryService::new(store);
//!
//! let id = service.create("/items", doc! { "name": "c", "tag": "x" })?;
//! assert_eq!(id, "2");
//!
//! let tagged = service.get(&DocsQuery::new("/items").filter(field("tag").eq("x")))?;
//! assert_eq!(tagged.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`collection`] - Documents, document paths and change signals
//! - [`common`] - Field values, sort order, locks, event bus and reactive primitives
//! - [`errors`] - Error types and result definitions
//! - [`filter`] - Where clauses and the fluent `field(..)` builder
//! - [`query`] - Query descriptors, the evaluator, live queries and scoped delegates
//! - [`search`] - Client-side text search
//! - [`store`] - The document store, its configuration and fixture loading
//! - [`table`] - Table data services and the pagination driver

pub mod collection;
pub mod common;
pub mod errors;
pub mod filter;
pub mod query;
pub mod search;
pub mod store;
pub mod table;

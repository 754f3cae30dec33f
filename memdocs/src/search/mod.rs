mod search_query;
mod service;

pub use search_query::*;
pub use service::*;

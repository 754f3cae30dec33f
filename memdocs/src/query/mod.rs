mod delegate;
mod docs_query;
mod evaluator;
mod service;

pub use delegate::*;
pub use docs_query::*;
pub use evaluator::*;
pub use service::*;

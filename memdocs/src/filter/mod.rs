mod fluent;
mod where_clause;

pub use fluent::*;
pub use where_clause::*;

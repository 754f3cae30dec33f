mod driver;
mod paginator;
mod service;

pub use driver::*;
pub use paginator::*;
pub use service::*;

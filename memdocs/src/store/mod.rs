mod config;
mod fixture;
mod memory_store;

pub use config::*;
pub use fixture::*;
pub use memory_store::*;

mod document;
mod event;
mod path;

pub use document::*;
pub use event::*;
pub use path::*;

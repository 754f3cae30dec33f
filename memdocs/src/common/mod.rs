mod atomic;
mod constants;
mod event_bus;
mod sort_order;
mod subject;
mod subscription;
mod value;

pub use atomic::*;
pub use constants::*;
pub use event_bus::*;
pub use sort_order::*;
pub use subject::*;
pub use subscription::*;
pub use value::*;

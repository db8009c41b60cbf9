pub mod entity;
pub mod error;
pub mod path;

pub use entity::*;
pub use error::*;
pub use path::*;

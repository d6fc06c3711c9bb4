pub mod capability;
pub mod error;

pub use capability::*;
pub use error::*;

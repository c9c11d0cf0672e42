pub mod error;
pub mod key;
pub mod value;

pub use error::{Result, UowError};
pub use key::EntityKey;
pub use value::{Attributes, Value};

pub mod error;
pub mod types;
pub mod value;

pub use error::{ErrorCategory, RegistryError, Result};
pub use types::{FieldDescriptor, type_oid};
pub use value::Value;

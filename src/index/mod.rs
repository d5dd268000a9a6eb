//! Index allocation module.
//!
//! This module holds the registry of table index values: which values are
//! allocated under which table prefix, on behalf of which session, and how
//! new values are generated when a caller asks for any free one.

pub mod dump;
pub mod error;
pub mod generator;
pub mod registry;
pub mod value;

// Re-export commonly used types
pub use dump::{RegistrySnapshot, RegistryVisitor, TextReport};
pub use error::{ErrorKind, RegistryError};
pub use registry::IndexRegistry;
pub use value::{AllocationMode, IndexRequest, IndexType, IndexValue, SessionId};

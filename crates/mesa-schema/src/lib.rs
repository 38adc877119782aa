//! # mesa-schema
//!
//! JSON Schema registry and row validation for mesa.
//!
//! Entity structs in `mesa-core` derive `JsonSchema`. [`StorageRegistry`]
//! pairs each entity class with its table family and the schema generated
//! for its struct, and checks every row against that schema before a backend
//! writes it.

pub mod error;
pub mod registry;

pub use error::SchemaError;
pub use registry::StorageRegistry;

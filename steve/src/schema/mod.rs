//! Schema catalogue and per-user schema projection (§4.D, §4.E).

pub mod builtins;
pub mod catalog;
pub mod factory;

pub use builtins::{builtin_schemas, BUILTIN_IDS};
pub use catalog::SchemaCatalog;
pub use factory::SchemaFactory;

mod dtype;
mod field;

/// Column type system.
pub use dtype::{DataType, TimeUnit};
/// Named types and frame schemas.
pub use field::{Field, Schema};

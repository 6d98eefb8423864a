mod builder;
pub(crate) mod extract;
mod host;
mod infer;

/// Host values to native columns.
pub use builder::ColumnBuilder;
pub(crate) use builder::cast_array;
/// The host value space.
pub use host::{HostBuffer, HostValue};
/// Type inference over host values.
pub use infer::{first_non_null, infer_column_type, infer_type};

//! `alopex-frame` is a typed columnar data model with a lazy, Polars-style
//! expression and query graph built on Arrow.
//!
//! Host values become native columns through [`ColumnBuilder`] and type
//! inference. Queries are built as [`LazyFrame`] plans of [`Expr`] nodes and
//! handed to an [`ExecutionEngine`] on `collect`; [`ArrowEngine`] is the
//! in-process engine used by default.

mod error;
mod format;
mod string_cache;

/// Host values, type inference and column construction.
pub mod construction;
/// Eager DataFrame and Series types.
pub mod dataframe;
/// Column types, fields and schemas.
pub mod datatypes;
/// Expression DSL used by both eager and lazy APIs.
pub mod expr;
/// Lazy query planning and optimization.
pub mod lazy;
/// Plan execution.
pub mod physical;

/// Re-export of the host value space and column construction.
pub use crate::construction::{ColumnBuilder, HostBuffer, HostValue};
/// Re-export of the primary eager types.
pub use crate::dataframe::{DataFrame, GroupBy, Series};
/// Re-export of the column type system.
pub use crate::datatypes::{DataType, Field, Schema, TimeUnit};
/// Re-export of the crate error type and result alias.
pub use crate::error::{DataFrameError, Result};
/// Re-export of the expression DSL entrypoints.
pub use crate::expr::{all, col, cols, lit, when, Expr};
/// Re-export of the serialization format selector.
pub use crate::format::SerializationFormat;
/// Re-export of the primary lazy types.
pub use crate::lazy::{CollectOptions, LazyFrame};
/// Re-export of the execution engine seam.
pub use crate::physical::{ArrowEngine, ExecutionEngine};
/// Re-export of the shared categorical key space.
pub use crate::string_cache::{StringCache, StringCacheGuard};

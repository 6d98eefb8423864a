mod engine;
mod executor;
mod expr_eval;
mod functions;
mod join;
pub(crate) mod kernels;
mod keys;
mod operators;
mod plan;
mod temporal;

/// Execution engine seam and the in-process Arrow engine.
pub use engine::{ArrowEngine, ExecutionEngine};

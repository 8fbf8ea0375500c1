//! Core abstractions for the wireflow engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: dynamic values, the graph definition, the behavior
//! trait and execution context, the error taxonomy, and the run-scoped
//! execution log.

mod error;
mod graph;
pub mod log;
mod node;
mod value;

pub use error::{FlowError, GraphError, NodeError};
pub use graph::{Connection, FlowGraph, NodeSpec, PortSpec};
pub use log::{LogEntry, LogLevel, LogObserver, NodeLogger, RunLog};
pub use node::{Behavior, CustomNodeDefinition, NodeContext};
pub use value::Value;

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;

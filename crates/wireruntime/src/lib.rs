//! Flow execution runtime
//!
//! This crate provides the engine that runs flow graphs: the behavior
//! registry (including custom nodes compiled from user-supplied source),
//! the dependency scheduler, the input resolver, and the orchestrator that
//! drives a run node by node.

mod executor;
mod registry;
pub mod resolver;
mod runtime;
pub mod scheduler;
pub mod script;

pub use executor::{
    coerce_input_value, FlowExecutor, FlowOutputs, INPUT_NODE_TYPE, OUTPUT_NODE_TYPE,
};
pub use registry::BehaviorRegistry;
pub use runtime::{FlowRuntime, RunOptions, RunReport};
pub use script::ScriptBehavior;

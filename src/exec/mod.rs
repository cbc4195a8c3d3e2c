//! Tool call dependency analysis and wave-based parallel execution, used by
//! the `batch_execute_tools` MCP tool.

pub mod dependency;
pub mod executor;

pub use dependency::{DependencyGraph, ToolCall};
pub use executor::{ExecutorOutcome, ParallelExecutor};

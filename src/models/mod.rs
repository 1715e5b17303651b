mod execution;
mod function;
mod metric;

pub use execution::{
    ExecuteRequest, ExecuteResponse, ExecutionResult, ExecutionStatus, IsolationRuntime, Language,
};
pub use function::{FunctionCreate, FunctionRecord};
pub use metric::ExecutionMetric;

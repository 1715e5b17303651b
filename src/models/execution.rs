use serde::{Deserialize, Serialize};

use super::metric::ExecutionMetric;

/// Supported source languages. Adding one means adding a profile in
/// `registry.rs` and a match arm here, nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
}

impl Language {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::Javascript),
            other => Err(format!("Unsupported language: {}", other)),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
        }
    }
}

/// The two isolation modes the container engine can run a sandbox under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationRuntime {
    Default,
    Hardened,
}

impl IsolationRuntime {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "default" | "docker" => Ok(IsolationRuntime::Default),
            "hardened" | "gvisor" | "runsc" => Ok(IsolationRuntime::Hardened),
            other => Err(format!("Unsupported isolation runtime: {}", other)),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            IsolationRuntime::Default => "default",
            IsolationRuntime::Hardened => "hardened",
        }
    }

    /// The hardened runtime is always cold-started; pooling only ever
    /// applies to the default runtime.
    pub fn poolable(&self) -> bool {
        matches!(self, IsolationRuntime::Default)
    }
}

/// Body of `POST /functions/execute/{name}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub runtime: Option<String>,
    pub warm_start: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub function_name: String,
    pub language: String,
    pub runtime: String,
    pub result: ExecutionResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
}

/// Result of a single execution, returned to the caller and also folded
/// into the stored `ExecutionMetric`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub metrics: ExecutionMetric,
}

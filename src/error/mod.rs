//! Step and job error types.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Failure raised while dispatching or running a single step.
///
/// Handlers return these unchanged; the executor stops at the first one.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("job deadline of {budget_secs:.1}s exceeded after {elapsed_secs:.1}s")]
    JobTimeout { elapsed_secs: f64, budget_secs: f64 },

    #[error("step exceeded its timeout of {0}s")]
    StepTimeout(u64),

    #[error("no handler registered for step type '{0}'")]
    UnsupportedStepType(String),

    #[error("missing dependency: {0}")]
    MissingDependency(String),

    #[error("malformed step args: {0}")]
    MalformedStepArgs(String),

    #[error("script exited with code {code}: {stderr}")]
    ScriptExecutionError { code: i32, stderr: String },

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("table extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("plot failed: {0}")]
    PlotFailed(String),

    #[error("malformed plan: {0}")]
    MalformedPlan(String),

    #[error("workspace I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable, serialisable name of a [`StepError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    JobTimeout,
    StepTimeout,
    UnsupportedStepType,
    MissingDependency,
    MalformedStepArgs,
    ScriptExecutionError,
    FileNotFound,
    FetchFailed,
    ExtractionFailed,
    QueryFailed,
    PlotFailed,
    MalformedPlan,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl StepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::JobTimeout { .. } => ErrorKind::JobTimeout,
            Self::StepTimeout(_) => ErrorKind::StepTimeout,
            Self::UnsupportedStepType(_) => ErrorKind::UnsupportedStepType,
            Self::MissingDependency(_) => ErrorKind::MissingDependency,
            Self::MalformedStepArgs(_) => ErrorKind::MalformedStepArgs,
            Self::ScriptExecutionError { .. } => ErrorKind::ScriptExecutionError,
            Self::FileNotFound(_) => ErrorKind::FileNotFound,
            Self::FetchFailed(_) => ErrorKind::FetchFailed,
            Self::ExtractionFailed(_) => ErrorKind::ExtractionFailed,
            Self::QueryFailed(_) => ErrorKind::QueryFailed,
            Self::PlotFailed(_) => ErrorKind::PlotFailed,
            Self::MalformedPlan(_) => ErrorKind::MalformedPlan,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub fn missing(msg: impl Into<String>) -> Self {
        Self::MissingDependency(msg.into())
    }

    pub fn malformed_args(msg: impl Into<String>) -> Self {
        Self::MalformedStepArgs(msg.into())
    }

    pub fn malformed_plan(msg: impl Into<String>) -> Self {
        Self::MalformedPlan(msg.into())
    }
}

/// Why a job stopped, and how far it got.
#[derive(Debug, Error)]
#[error("{}", self.describe())]
pub struct JobFailure {
    /// Step that failed; `None` for failures before any step was dispatched.
    pub step_id: Option<String>,
    #[source]
    pub error: StepError,
    /// Ids committed to the result store before the failure, in order.
    pub completed: Vec<String>,
}

impl JobFailure {
    pub fn new(step_id: Option<String>, error: StepError, completed: Vec<String>) -> Self {
        Self { step_id, error, completed }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    fn describe(&self) -> String {
        match &self.step_id {
            Some(id) => format!("step '{}' failed: {}", id, self.error),
            None => self.error.to_string(),
        }
    }

    /// JSON body reported to callers in place of an answer.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.kind(),
            "message": self.error.to_string(),
            "step": self.step_id,
        })
    }
}

impl From<StepError> for JobFailure {
    fn from(error: StepError) -> Self {
        Self::new(None, error, Vec::new())
    }
}

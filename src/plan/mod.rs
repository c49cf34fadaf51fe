//! Plans: ordered step lists and their structural validation.

use std::{collections::HashSet, fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StepError;

mod args;

pub use args::{
    CodeSource, ExtractTableArgs, FetchUrlArgs, OneOrMany, PlotArgs, QueryArgs, ReadFileArgs,
    ReturnArgs, RunCodeArgs, StepAction, SummarizeArgs,
};

/// Store slot written by `return` steps.
pub const FINAL_ID: &str = "__final__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    FetchUrl,
    ReadFile,
    ExtractTable,
    Query,
    RunCode,
    Plot,
    Summarize,
    Return,
}

impl StepKind {
    pub const ALL: [StepKind; 8] = [
        StepKind::FetchUrl,
        StepKind::ReadFile,
        StepKind::ExtractTable,
        StepKind::Query,
        StepKind::RunCode,
        StepKind::Plot,
        StepKind::Summarize,
        StepKind::Return,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchUrl => "fetch_url",
            Self::ReadFile => "read_file",
            Self::ExtractTable => "extract_table",
            Self::Query => "query",
            Self::RunCode => "run_code",
            Self::Plot => "plot",
            Self::Summarize => "summarize",
            Self::Return => "return",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        // Older planners emitted engine-specific names.
        let name = match name.as_str() {
            "duckdb_query" => "query",
            "run_python" => "run_code",
            other => other,
        };
        StepKind::ALL
            .into_iter()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| StepError::malformed_plan(format!("unknown step type '{}'", s)))
    }
}

/// One declarative unit of work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub args: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Step {
    pub fn new(id: impl Into<String>, kind: StepKind, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { id: id.into(), kind, args, timeout: None }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    /// Per-step timeout, falling back to `default` when the step sets none.
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout.map(Duration::from_secs).unwrap_or(default)
    }
}

/// Ordered step list. Construction guarantees unique, non-reserved ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    pub fn new(steps: Vec<Step>) -> Result<Self, StepError> {
        let mut seen = HashSet::new();
        for (i, step) in steps.iter().enumerate() {
            if step.id.trim().is_empty() {
                return Err(StepError::malformed_plan(format!("step {} has an empty id", i)));
            }
            if step.id == FINAL_ID {
                return Err(StepError::malformed_plan(format!(
                    "step {} uses the reserved id '{}'",
                    i, FINAL_ID
                )));
            }
            if step.timeout == Some(0) {
                return Err(StepError::malformed_plan(format!(
                    "step '{}' has a zero timeout",
                    step.id
                )));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(StepError::malformed_plan(format!("duplicate step id '{}'", step.id)));
            }
        }
        Ok(Self { steps })
    }

    pub fn from_json(text: &str) -> Result<Self, StepError> {
        let value: Value = serde_json::from_str(strip_code_fence(text))
            .map_err(|e| StepError::malformed_plan(format!("invalid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, StepError> {
        let Value::Array(items) = value else {
            return Err(StepError::malformed_plan("plan must be a JSON array of steps"));
        };
        let steps = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| parse_step(i, item))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(steps)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }
}

fn parse_step(index: usize, item: Value) -> Result<Step, StepError> {
    let Value::Object(mut obj) = item else {
        return Err(StepError::malformed_plan(format!("step {} is not an object", index)));
    };
    let id = match obj.remove("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        _ => {
            return Err(StepError::malformed_plan(format!(
                "step {} is missing a string 'id'",
                index
            )))
        }
    };
    let kind = match obj.remove("type") {
        Some(Value::String(s)) => s.parse::<StepKind>()?,
        _ => {
            return Err(StepError::malformed_plan(format!(
                "step '{}' is missing a string 'type'",
                id
            )))
        }
    };
    let args = match obj.remove("args") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(StepError::malformed_plan(format!(
                "step '{}' has non-object 'args'",
                id
            )))
        }
    };
    let timeout = match obj.remove("timeout") {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_u64() {
            Some(secs) if secs > 0 => Some(secs),
            _ => {
                return Err(StepError::malformed_plan(format!(
                    "step '{}' timeout must be a positive integer of seconds",
                    id
                )))
            }
        },
    };
    Ok(Step { id, kind, args, timeout })
}

/// Remove a surrounding Markdown code fence (```json ... ``` or ``` ... ```).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

//! Typed argument shapes, one per step kind.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::{Step, StepKind};
use crate::error::StepError;

/// A step id, or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}

/// Script source: list of lines, or one block of text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CodeSource {
    Lines(Vec<String>),
    Text(String),
}

impl CodeSource {
    pub fn script(&self) -> String {
        match self {
            Self::Lines(lines) => {
                let mut s = lines.join("\n");
                s.push('\n');
                s
            }
            Self::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchUrlArgs {
    pub url: String,
    pub save_as: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadFileArgs {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractTableArgs {
    pub from: String,
    pub save_as: Option<String>,
    #[serde(default)]
    pub index: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryArgs {
    pub query: String,
    pub save_as: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunCodeArgs {
    pub code: CodeSource,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlotArgs {
    pub df_ref: String,
    pub x: String,
    pub y: String,
    #[serde(default)]
    pub regression: bool,
    pub xlabel: Option<String>,
    pub ylabel: Option<String>,
    pub save_as: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarizeArgs {
    #[serde(alias = "from")]
    pub from_steps: OneOrMany,
    pub columns: Option<Vec<String>>,
    pub max_rows: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnArgs {
    pub from: OneOrMany,
}

/// A step's arguments, decoded against its kind.
#[derive(Debug, Clone)]
pub enum StepAction {
    FetchUrl(FetchUrlArgs),
    ReadFile(ReadFileArgs),
    ExtractTable(ExtractTableArgs),
    Query(QueryArgs),
    RunCode(RunCodeArgs),
    Plot(PlotArgs),
    Summarize(SummarizeArgs),
    Return(ReturnArgs),
}

impl StepAction {
    pub fn from_step(step: &Step) -> Result<Self, StepError> {
        Ok(match step.kind {
            StepKind::FetchUrl => Self::FetchUrl(decode(step)?),
            StepKind::ReadFile => Self::ReadFile(decode(step)?),
            StepKind::ExtractTable => Self::ExtractTable(decode(step)?),
            StepKind::Query => Self::Query(decode(step)?),
            StepKind::RunCode => Self::RunCode(decode(step)?),
            StepKind::Plot => Self::Plot(decode(step)?),
            StepKind::Summarize => Self::Summarize(decode(step)?),
            StepKind::Return => Self::Return(decode(step)?),
        })
    }
}

fn decode<T: DeserializeOwned>(step: &Step) -> Result<T, StepError> {
    serde_json::from_value(Value::Object(step.args.clone())).map_err(|e| {
        StepError::malformed_args(format!("{} step '{}': {}", step.kind, step.id, e))
    })
}

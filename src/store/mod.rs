//! Result store: the only channel through which steps exchange data.

use std::{collections::HashMap, fmt, path::PathBuf};

use serde_json::Value;

use crate::{error::StepError, plan::FINAL_ID};

/// Typed value committed by a step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    File(PathBuf),
    Text(String),
    Table(PathBuf),
    Image { path: PathBuf, data_uri: String },
    List(Vec<Value>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    File,
    Text,
    Table,
    Image,
    List,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::File => "file",
            Self::Text => "text",
            Self::Table => "table",
            Self::Image => "image",
            Self::List => "list",
        };
        f.write_str(s)
    }
}

impl StepResult {
    pub fn kind(&self) -> ResultKind {
        match self {
            Self::File(_) => ResultKind::File,
            Self::Text(_) => ResultKind::Text,
            Self::Table(_) => ResultKind::Table,
            Self::Image { .. } => ResultKind::Image,
            Self::List(_) => ResultKind::List,
        }
    }
}

/// Write-once, read-many map from step id to result.
#[derive(Debug, Default)]
pub struct ResultStore {
    results: HashMap<String, StepResult>,
    order: Vec<String>,
    final_result: Option<StepResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step's result. Each id is written exactly once.
    pub fn commit(&mut self, id: &str, result: StepResult) -> Result<(), StepError> {
        if id == FINAL_ID || self.results.contains_key(id) {
            return Err(StepError::malformed_plan(format!(
                "result for '{}' was already committed",
                id
            )));
        }
        self.results.insert(id.to_string(), result);
        self.order.push(id.to_string());
        Ok(())
    }

    /// Fill the reserved final slot. A later `return` step replaces it.
    pub fn set_final(&mut self, result: StepResult) {
        self.final_result = Some(result);
    }

    pub fn get(&self, id: &str) -> Option<&StepResult> {
        if id == FINAL_ID {
            return self.final_result.as_ref();
        }
        self.results.get(id)
    }

    pub fn final_result(&self) -> Option<&StepResult> {
        self.final_result.as_ref()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Committed ids in commit order.
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn require(&self, id: &str) -> Result<&StepResult, StepError> {
        self.get(id)
            .ok_or_else(|| StepError::missing(format!("step '{}' has no committed result", id)))
    }

    pub fn require_file(&self, id: &str) -> Result<&PathBuf, StepError> {
        match self.require(id)? {
            StepResult::File(path) => Ok(path),
            other => Err(kind_mismatch(id, ResultKind::File, other.kind())),
        }
    }

    pub fn require_table(&self, id: &str) -> Result<&PathBuf, StepError> {
        match self.require(id)? {
            StepResult::Table(path) => Ok(path),
            other => Err(kind_mismatch(id, ResultKind::Table, other.kind())),
        }
    }
}

fn kind_mismatch(id: &str, expected: ResultKind, found: ResultKind) -> StepError {
    StepError::missing(format!("step '{}' produced {}, expected {}", id, found, expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_is_write_once() {
        let mut store = ResultStore::new();
        store.commit("a", StepResult::Text("1".into())).unwrap();
        assert!(store.commit("a", StepResult::Text("2".into())).is_err());
        assert_eq!(store.get("a"), Some(&StepResult::Text("1".into())));
        assert_eq!(store.ids(), ["a".to_string()]);
    }

    #[test]
    fn test_missing_and_mismatched_lookups() {
        let mut store = ResultStore::new();
        store.commit("t", StepResult::Text("x".into())).unwrap();

        assert!(matches!(store.require("nope"), Err(StepError::MissingDependency(_))));
        let err = store.require_table("t").unwrap_err();
        assert!(matches!(err, StepError::MissingDependency(ref m) if m.contains("expected table")));
        assert!(matches!(store.require_file("t"), Err(StepError::MissingDependency(_))));
    }

    #[test]
    fn test_final_slot() {
        let mut store = ResultStore::new();
        assert!(!store.contains(FINAL_ID));
        assert!(store.commit(FINAL_ID, StepResult::List(vec![])).is_err());

        store.set_final(StepResult::List(vec![Value::from(1)]));
        store.set_final(StepResult::List(vec![Value::from(2)]));
        assert_eq!(store.get(FINAL_ID), Some(&StepResult::List(vec![Value::from(2)])));
        assert!(store.is_empty());
    }
}

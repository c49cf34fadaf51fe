//! Final output assembly: turning the result store into the job's answer.

use std::fs;

use serde_json::Value;

use crate::{
    error::StepError,
    plan::Plan,
    store::{ResultStore, StepResult},
};

/// Payload value of a result: images as data URIs, tables as their raw
/// content, files as their path, text as-is.
pub fn render_result(result: &StepResult) -> Result<Value, StepError> {
    Ok(match result {
        StepResult::Text(text) => Value::String(text.clone()),
        StepResult::File(path) => Value::String(path.to_string_lossy().into_owned()),
        StepResult::Table(path) => {
            Value::String(String::from_utf8_lossy(&fs::read(path)?).into_owned())
        }
        StepResult::Image { data_uri, .. } => Value::String(data_uri.clone()),
        StepResult::List(items) => Value::Array(items.clone()),
    })
}

/// Pick the answer (the final slot, else the last step's result) and shape it.
///
/// Must run before the workspace is removed: tables are read here.
pub fn assemble(store: &ResultStore, plan: &Plan) -> Result<Value, StepError> {
    let chosen = store
        .final_result()
        .or_else(|| plan.last().and_then(|step| store.get(&step.id)));
    let Some(result) = chosen else {
        return Ok(Value::Null);
    };
    let value = match render_result(result)? {
        list @ Value::Array(_) => list,
        single => Value::Array(vec![single]),
    };
    Ok(unwrap_single_json(value))
}

/// A one-element list holding JSON object/array text becomes that value.
///
/// Scripts conventionally print one JSON document as their whole answer;
/// anything that does not parse passes through untouched.
pub fn unwrap_single_json(value: Value) -> Value {
    if let Value::Array(items) = &value {
        if let [Value::String(text)] = items.as_slice() {
            if let Ok(parsed) = serde_json::from_str::<Value>(text.trim()) {
                if parsed.is_object() || parsed.is_array() {
                    return parsed;
                }
            }
        }
    }
    value
}

//! `return`: gather referenced results into the job's answer list.

use serde_json::Value;
use tracing::warn;

use super::StepContext;
use crate::{error::StepError, output::render_result, plan::ReturnArgs, store::StepResult};

/// Missing references become `null` in their position instead of failing,
/// so a partial answer set can still be returned.
pub fn run(args: ReturnArgs, ctx: &StepContext<'_>) -> Result<StepResult, StepError> {
    let mut values = Vec::new();
    for id in args.from.to_vec() {
        match ctx.store.get(&id) {
            Some(result) => values.push(render_result(result)?),
            None => {
                warn!(reference = %id, "return references a step with no result, using null");
                values.push(Value::Null);
            }
        }
    }
    Ok(StepResult::List(values))
}

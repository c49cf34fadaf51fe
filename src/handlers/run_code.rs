//! `run_code`: write a script into the workspace and run it.

use tracing::debug;

use super::StepContext;
use crate::{
    error::StepError, plan::RunCodeArgs, process::InterpreterType, store::StepResult,
};

pub async fn run(args: RunCodeArgs, ctx: &StepContext<'_>) -> Result<StepResult, StepError> {
    let language = match args.language.as_deref() {
        Some(name) => InterpreterType::from_name(name).ok_or_else(|| {
            StepError::malformed_args(format!("unsupported language '{}'", name))
        })?,
        None => ctx.config.default_language,
    };

    // Kept in the workspace so the script can be inspected after a failure.
    let script_path = ctx.output_path(None, language.extension())?;
    tokio::fs::write(&script_path, args.code.script()).await?;

    let program = ctx.config.interpreters.program_for(language);
    let output = ctx
        .runner
        .run(program, &script_path, ctx.workspace, ctx.timeout)
        .await?
        .ensure_success()?;

    debug!(elapsed = ?output.elapsed, stdout_len = output.stdout.len(), "script finished");
    Ok(StepResult::Text(output.stdout.trim().to_string()))
}

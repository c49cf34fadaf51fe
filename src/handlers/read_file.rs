//! `read_file`: load a workspace file as text.

use super::StepContext;
use crate::{
    error::StepError, plan::ReadFileArgs, store::StepResult, utils::document::read_document,
    workspace::resolve_in,
};

pub fn run(args: ReadFileArgs, ctx: &StepContext<'_>) -> Result<StepResult, StepError> {
    let path = resolve_in(ctx.workspace, &args.path)?;
    if !path.is_file() {
        return Err(StepError::FileNotFound(args.path));
    }
    let text = read_document(&path)
        .map_err(|e| StepError::FileNotFound(format!("{}: {:#}", args.path, e)))?;
    Ok(StepResult::Text(text))
}

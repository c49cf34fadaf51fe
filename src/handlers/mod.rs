//! Step handlers, one per step type.
//!
//! Each handler is a function of (typed args, read-only result store,
//! workspace path) returning a [`StepResult`] or the failure that aborts the
//! job.

use std::{path::{Path, PathBuf}, time::Duration};

use crate::{
    config::EngineConfig,
    error::StepError,
    plan::StepAction,
    process::ProcessRunner,
    store::{ResultStore, StepResult},
    workspace::resolve_in,
};

pub mod extract;
pub mod fetch;
pub mod finish;
pub mod plot;
pub mod query;
pub mod read_file;
pub mod run_code;
pub mod summarize;

/// Everything a handler may see while running one step.
pub struct StepContext<'a> {
    pub step_id: &'a str,
    pub workspace: &'a Path,
    pub store: &'a ResultStore,
    /// Bound on this step's blocking operation.
    pub timeout: Duration,
    pub config: &'a EngineConfig,
    pub http: &'a reqwest::Client,
    pub runner: &'a ProcessRunner,
}

impl StepContext<'_> {
    /// Where to write this step's artifact: `save_as`, or `<id>.<ext>`.
    pub fn output_path(&self, save_as: Option<&str>, ext: &str) -> Result<PathBuf, StepError> {
        match save_as {
            Some(name) => resolve_in(self.workspace, name),
            None => resolve_in(self.workspace, &format!("{}.{}", self.step_id, ext)),
        }
    }
}

pub async fn run_step(action: StepAction, ctx: &StepContext<'_>) -> Result<StepResult, StepError> {
    match action {
        StepAction::FetchUrl(args) => fetch::run(args, ctx).await,
        StepAction::ReadFile(args) => read_file::run(args, ctx),
        StepAction::ExtractTable(args) => extract::run(args, ctx),
        StepAction::Query(args) => query::run(args, ctx),
        StepAction::RunCode(args) => run_code::run(args, ctx).await,
        StepAction::Plot(args) => plot::run(args, ctx),
        StepAction::Summarize(args) => summarize::run(args, ctx),
        StepAction::Return(args) => finish::run(args, ctx),
    }
}

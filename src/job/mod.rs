//! Job orchestration: workspace, uploads, plan, execution, answer, teardown.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::JobFailure,
    executor::Engine,
    output,
    plan::{Plan, StepKind},
    planner::Planner,
    workspace::Workspace,
};

/// Name under which the question text is saved for the plan to read.
pub const QUESTIONS_FILE: &str = "questions.txt";

#[derive(Debug, Clone)]
pub enum PlanSource {
    Plan(Plan),
    Question(String),
}

/// A file placed in the workspace root before execution.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub contents: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), contents: contents.into() }
    }

    /// Read a local file, keeping only its file name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid upload path {}", path.display()))?;
        let contents =
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self::new(name, contents))
    }
}

#[derive(Debug, Clone)]
pub struct JobRequest {
    pub plan: PlanSource,
    pub uploads: Vec<Upload>,
}

/// File names the planner is told about, questions file first.
pub fn planner_files(uploads: &[Upload]) -> Vec<String> {
    std::iter::once(QUESTIONS_FILE.to_string())
        .chain(uploads.iter().map(|u| u.name.clone()))
        .collect()
}

/// Step types the engine will dispatch, in canonical order.
pub fn allowed_steps(engine: &Engine) -> Vec<StepKind> {
    StepKind::ALL
        .into_iter()
        .filter(|k| engine.config().enabled_steps.contains(k))
        .collect()
}

/// Run one job end to end and return its JSON answer.
///
/// Engine failures come back as a [`JobFailure`] inside the `anyhow::Error`.
/// The workspace is removed on every exit path.
pub async fn run_job(engine: &Engine, planner: Option<&Planner>, request: JobRequest) -> Result<Value> {
    let work_dir = &engine.config().work_dir;
    let workspace = Workspace::create(work_dir)
        .with_context(|| format!("Failed to create workspace under {}", work_dir.display()))?;
    info!(workspace = %workspace.path().display(), uploads = request.uploads.len(), "job started");

    for upload in &request.uploads {
        workspace.add_file(&upload.name, &upload.contents).map_err(JobFailure::from)?;
    }

    let plan = match request.plan {
        PlanSource::Plan(plan) => plan,
        PlanSource::Question(question) => {
            workspace
                .add_file(QUESTIONS_FILE, question.as_bytes())
                .map_err(JobFailure::from)?;
            let Some(planner) = planner else {
                bail!("A question was given but no planner is configured");
            };
            planner
                .plan(&question, &planner_files(&request.uploads), &allowed_steps(engine))
                .await?
        }
    };

    let store = engine
        .execute(&plan, workspace.path(), engine.config().job_deadline)
        .await?;
    let answer = output::assemble(&store, &plan).map_err(JobFailure::from)?;

    if let Err(e) = workspace.close() {
        warn!(error = %e, "failed to remove workspace");
    }
    info!("job finished");
    Ok(answer)
}

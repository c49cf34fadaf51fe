//! The plan executor: runs steps strictly in order against one workspace.

use std::{
    path::Path,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use tracing::{debug, error, info, info_span, Instrument};

use crate::{
    config::EngineConfig,
    error::{JobFailure, StepError},
    handlers::{self, StepContext},
    plan::{Plan, Step, StepAction, StepKind},
    process::ProcessRunner,
    store::{ResultStore, StepResult},
};

pub struct Engine {
    config: EngineConfig,
    http: reqwest::Client,
    runner: ProcessRunner,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("planexec/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(config, http))
    }

    pub fn with_client(config: EngineConfig, http: reqwest::Client) -> Self {
        let runner = ProcessRunner::new(config.sandbox.clone());
        Self { config, http, runner }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `plan` inside `workspace`, stopping at the first failing step.
    ///
    /// `deadline` is checked before each step starts; a step already running
    /// is bounded only by its own timeout.
    pub async fn execute(
        &self,
        plan: &Plan,
        workspace: &Path,
        deadline: Duration,
    ) -> Result<ResultStore, JobFailure> {
        let started = Instant::now();
        let mut store = ResultStore::new();
        info!(steps = plan.len(), deadline_secs = deadline.as_secs_f64(), "executing plan");

        for step in plan.steps() {
            let elapsed = started.elapsed();
            if elapsed > deadline {
                let err = StepError::JobTimeout {
                    elapsed_secs: elapsed.as_secs_f64(),
                    budget_secs: deadline.as_secs_f64(),
                };
                return Err(fail(step, err, &store));
            }

            let span = info_span!("step", id = %step.id, step_type = %step.kind);
            let result = match self.run_one(step, workspace, &store).instrument(span).await {
                Ok(result) => result,
                Err(err) => return Err(fail(step, err, &store)),
            };

            debug!(step = %step.id, kind = %result.kind(), "committing result");
            if step.kind == StepKind::Return {
                store.set_final(result.clone());
            }
            if let Err(err) = store.commit(&step.id, result) {
                return Err(fail(step, err, &store));
            }
        }

        info!(elapsed_secs = started.elapsed().as_secs_f64(), "plan finished");
        Ok(store)
    }

    async fn run_one(
        &self,
        step: &Step,
        workspace: &Path,
        store: &ResultStore,
    ) -> Result<StepResult, StepError> {
        if !self.config.enabled_steps.contains(&step.kind) {
            return Err(StepError::UnsupportedStepType(step.kind.to_string()));
        }
        let action = StepAction::from_step(step)?;
        let ctx = StepContext {
            step_id: &step.id,
            workspace,
            store,
            timeout: step.timeout_or(self.config.step_timeout),
            config: &self.config,
            http: &self.http,
            runner: &self.runner,
        };
        info!(timeout_secs = ctx.timeout.as_secs(), "dispatching step");
        handlers::run_step(action, &ctx).await
    }
}

fn fail(step: &Step, err: StepError, store: &ResultStore) -> JobFailure {
    error!(step = %step.id, kind = %err.kind(), "{}", err);
    JobFailure::new(Some(step.id.clone()), err, store.ids().to_vec())
}

mod cli;

use std::{
    fs,
    io::{self, Read},
    process::ExitCode,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use planexec::{
    config::{Config, EngineConfig},
    error::{JobFailure, StepError},
    executor::Engine,
    job::{self, JobRequest, PlanSource, Upload},
    plan::Plan,
    planner::Planner,
    printer::{FailurePrinter, JsonPrinter},
};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Cli::parse();
    init_tracing(args.verbose);
    let printer = JsonPrinter { pretty: !args.raw };

    match run(args, &printer).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err, &printer);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(io::stderr)
        .init();
}

async fn run(args: cli::Cli, printer: &JsonPrinter) -> Result<()> {
    let cfg = Config::load();
    let mut engine_cfg = EngineConfig::from_config(&cfg);
    if let Some(secs) = args.deadline {
        engine_cfg = engine_cfg.with_deadline(Duration::from_secs(secs));
    }
    let engine = Engine::new(engine_cfg)?;

    let uploads = args
        .files
        .iter()
        .map(|p| Upload::from_path(p))
        .collect::<Result<Vec<_>>>()?;

    let source = match args.plan.as_deref() {
        Some(path) => PlanSource::Plan(load_plan(path)?),
        None => PlanSource::Question(read_question(&args)?),
    };

    let planner = match &source {
        PlanSource::Question(_) => Some(Planner::from_config(&cfg, args.model.clone(), !args.no_cache)?),
        PlanSource::Plan(_) => None,
    };

    if args.show_plan {
        let plan = match source {
            PlanSource::Plan(plan) => plan,
            PlanSource::Question(question) => {
                let planner = planner.as_ref().context("planner unavailable")?;
                planner
                    .plan(&question, &job::planner_files(&uploads), &job::allowed_steps(&engine))
                    .await?
            }
        };
        printer.print(&serde_json::to_value(&plan)?);
        return Ok(());
    }

    let answer = job::run_job(&engine, planner.as_ref(), JobRequest { plan: source, uploads }).await?;
    printer.print(&answer);
    Ok(())
}

fn load_plan(path: &str) -> Result<Plan> {
    let text = if path == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("Failed to read plan from stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read plan file {}", path))?
    };
    Ok(Plan::from_json(&text).map_err(JobFailure::from)?)
}

/// Positional question, then `--questions`, then piped stdin.
fn read_question(args: &cli::Cli) -> Result<String> {
    let question = if let Some(q) = &args.question {
        q.clone()
    } else if let Some(path) = &args.questions {
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
    } else if !io::stdin().is_terminal() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        String::new()
    };
    if question.trim().is_empty() {
        bail!("Provide a question, --questions FILE, or --plan FILE");
    }
    Ok(question)
}

fn report(err: &anyhow::Error, printer: &JsonPrinter) {
    let color = io::stderr().is_terminal();
    if let Some(failure) = err.downcast_ref::<JobFailure>() {
        FailurePrinter { color }.print(failure);
        printer.print(&failure.to_json());
        return;
    }

    let kind = err
        .downcast_ref::<StepError>()
        .map(|e| e.kind().to_string())
        .unwrap_or_else(|| "Error".to_string());
    if color {
        eprintln!("{}: {:#}", kind.red().bold(), err);
    } else {
        eprintln!("{}: {:#}", kind, err);
    }
    printer.print(&json!({ "error": kind, "message": format!("{:#}", err), "step": null }));
}

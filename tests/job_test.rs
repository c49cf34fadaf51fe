#![cfg(unix)]

use std::{fs, path::Path, time::Duration};

use anyhow::Result;
use planexec::{
    config::EngineConfig,
    job::{run_job, JobRequest, PlanSource, Upload},
    process::InterpreterType,
    Engine, ErrorKind, JobFailure, Plan,
};
use serde_json::{json, Value};

fn engine(work_dir: &Path) -> Result<Engine> {
    let config = EngineConfig {
        work_dir: work_dir.to_path_buf(),
        default_language: InterpreterType::Shell,
        ..EngineConfig::default()
    };
    Engine::new(config)
}

fn request(plan: Value, uploads: Vec<Upload>) -> JobRequest {
    JobRequest { plan: PlanSource::Plan(Plan::from_value(plan).unwrap()), uploads }
}

fn leftover_workspaces(work_dir: &Path) -> usize {
    fs::read_dir(work_dir).map(|d| d.count()).unwrap_or(0)
}

fn failure(err: &anyhow::Error) -> &JobFailure {
    err.downcast_ref::<JobFailure>().expect("engine failure")
}

#[tokio::test]
async fn test_printed_answer_is_returned_as_list() -> Result<()> {
    let root = tempfile::tempdir()?;
    let plan = json!([
        { "id": "a", "type": "run_code", "args": { "code": ["echo 4"] } },
        { "id": "r", "type": "return", "args": { "from": ["a"] } }
    ]);

    let answer = run_job(&engine(root.path())?, None, request(plan, vec![])).await?;
    assert_eq!(answer, json!(["4"]));
    assert_eq!(leftover_workspaces(root.path()), 0);
    Ok(())
}

#[tokio::test]
async fn test_missing_upload_fails_and_cleans_up() -> Result<()> {
    let root = tempfile::tempdir()?;
    let plan = json!([
        { "id": "load", "type": "read_file", "args": { "path": "missing.csv" } },
        { "id": "r", "type": "return", "args": { "from": ["load"] } }
    ]);

    let err = run_job(&engine(root.path())?, None, request(plan, vec![])).await.unwrap_err();
    let failure = failure(&err);
    assert_eq!(failure.kind(), ErrorKind::FileNotFound);
    assert_eq!(failure.step_id.as_deref(), Some("load"));
    assert_eq!(leftover_workspaces(root.path()), 0);
    Ok(())
}

#[tokio::test]
async fn test_step_timeout_under_short_deadline() -> Result<()> {
    let root = tempfile::tempdir()?;
    let config = EngineConfig {
        work_dir: root.path().to_path_buf(),
        default_language: InterpreterType::Shell,
        step_timeout: Duration::from_secs(1),
        ..EngineConfig::default()
    }
    .with_deadline(Duration::from_secs(1));
    let plan = json!([
        { "id": "slow", "type": "run_code", "args": { "code": ["sleep 5", "echo done"] } },
        { "id": "r", "type": "return", "args": { "from": ["slow"] } }
    ]);

    let err = run_job(&Engine::new(config)?, None, request(plan, vec![])).await.unwrap_err();
    assert_eq!(failure(&err).kind(), ErrorKind::StepTimeout);
    assert_eq!(leftover_workspaces(root.path()), 0);
    Ok(())
}

#[tokio::test]
async fn test_deadline_stops_before_next_step() -> Result<()> {
    let root = tempfile::tempdir()?;
    let config = EngineConfig {
        work_dir: root.path().to_path_buf(),
        default_language: InterpreterType::Shell,
        ..EngineConfig::default()
    }
    .with_deadline(Duration::from_millis(500));
    let plan = json!([
        { "id": "slow", "type": "run_code", "args": { "code": ["sleep 1", "echo late"] } },
        { "id": "r", "type": "return", "args": { "from": ["slow"] } }
    ]);

    let err = run_job(&Engine::new(config)?, None, request(plan, vec![])).await.unwrap_err();
    let failure = failure(&err);
    assert_eq!(failure.kind(), ErrorKind::JobTimeout);
    assert_eq!(failure.step_id.as_deref(), Some("r"));
    assert_eq!(failure.completed, ["slow"]);
    Ok(())
}

#[tokio::test]
async fn test_single_json_document_is_unwrapped() -> Result<()> {
    let root = tempfile::tempdir()?;
    for (printed, expected) in [
        (r#"echo '{"x": 1}'"#, json!({ "x": 1 })),
        ("echo '[1, 2, 3]'", json!([1, 2, 3])),
        ("echo 'plain words'", json!(["plain words"])),
    ] {
        let plan = json!([
            { "id": "a", "type": "run_code", "args": { "code": [printed] } },
            { "id": "r", "type": "return", "args": { "from": ["a"] } }
        ]);
        let answer = run_job(&engine(root.path())?, None, request(plan, vec![])).await?;
        assert_eq!(answer, expected);
    }
    Ok(())
}

#[tokio::test]
async fn test_return_with_missing_reference_yields_null() -> Result<()> {
    let root = tempfile::tempdir()?;
    let plan = json!([
        { "id": "a", "type": "run_code", "args": { "code": ["echo yes"] } },
        { "id": "r", "type": "return", "args": { "from": ["a", "never_ran"] } }
    ]);

    let answer = run_job(&engine(root.path())?, None, request(plan, vec![])).await?;
    assert_eq!(answer, json!(["yes", null]));
    Ok(())
}

#[tokio::test]
async fn test_uploads_are_queryable() -> Result<()> {
    let root = tempfile::tempdir()?;
    let uploads = vec![Upload::new("scores.csv", "name,score\nann,1\nbob,5\ncid,3\n")];
    let plan = json!([
        { "id": "top", "type": "query",
          "args": { "query": "SELECT name FROM \"scores.csv\" WHERE score > 2 ORDER BY score DESC" } },
        { "id": "r", "type": "return", "args": { "from": "top" } }
    ]);

    let answer = run_job(&engine(root.path())?, None, request(plan, uploads)).await?;
    assert_eq!(answer, json!(["name\nbob\ncid\n"]));
    Ok(())
}

#[tokio::test]
async fn test_without_return_uses_last_result() -> Result<()> {
    let root = tempfile::tempdir()?;
    let plan = json!([
        { "id": "a", "type": "run_code", "args": { "code": ["echo first"] } },
        { "id": "b", "type": "run_code", "args": { "code": ["echo second"] } }
    ]);

    let answer = run_job(&engine(root.path())?, None, request(plan, vec![])).await?;
    assert_eq!(answer, json!(["second"]));
    Ok(())
}

#[tokio::test]
async fn test_upload_cannot_escape_workspace() -> Result<()> {
    let root = tempfile::tempdir()?;
    let plan = json!([{ "id": "a", "type": "run_code", "args": { "code": ["echo hi"] } }]);
    let uploads = vec![Upload::new("../evil.csv", "x\n")];

    let err = run_job(&engine(root.path())?, None, request(plan, uploads)).await.unwrap_err();
    assert_eq!(failure(&err).kind(), ErrorKind::MalformedStepArgs);
    assert_eq!(leftover_workspaces(root.path()), 0);
    assert!(!root.path().join("evil.csv").exists());
    Ok(())
}

#[tokio::test]
async fn test_question_without_planner() -> Result<()> {
    let root = tempfile::tempdir()?;
    let request = JobRequest { plan: PlanSource::Question("How many?".into()), uploads: vec![] };

    let err = run_job(&engine(root.path())?, None, request).await.unwrap_err();
    assert!(err.to_string().contains("no planner"));
    assert_eq!(leftover_workspaces(root.path()), 0);
    Ok(())
}

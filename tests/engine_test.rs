#![cfg(unix)]

use std::{fs, time::Duration};

use anyhow::Result;
use planexec::{
    config::EngineConfig, process::InterpreterType, store::StepResult, Engine, ErrorKind, Plan,
};
use serde_json::json;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

fn engine() -> Result<Engine> {
    let config = EngineConfig {
        default_language: InterpreterType::Shell,
        ..EngineConfig::default()
    };
    Engine::new(config)
}

fn plan(value: serde_json::Value) -> Plan {
    Plan::from_value(value).unwrap()
}

async fn serve_once(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 2048];
        let _ = sock.read(&mut buf).await;
        let resp = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = sock.write_all(resp.as_bytes()).await;
    });
    format!("http://{}/films", addr)
}

#[tokio::test]
async fn test_fetch_extract_query_plot_pipeline() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let url = serve_once(
        "<html><body><table>\
         <tr><th>Rank</th><th>Title</th><th>Gross</th></tr>\
         <tr><td>1</td><td>Avatar</td><td>$2,923,706,026</td></tr>\
         <tr><td>2</td><td>Avengers: Endgame</td><td>$2,797,501,328</td></tr>\
         <tr><td>3</td><td>Titanic</td><td>$2,257,844,554</td></tr>\
         </table></body></html>",
    )
    .await;

    let plan = plan(json!([
        { "id": "page", "type": "fetch_url", "args": { "url": url, "save_as": "films.html" } },
        { "id": "films", "type": "extract_table", "args": { "from": "page", "save_as": "films.csv" } },
        { "id": "top", "type": "duckdb_query",
          "args": { "query": "SELECT Title FROM films WHERE Rank <= 2 ORDER BY Rank", "save_as": "top.csv" } },
        { "id": "chart", "type": "plot", "args": { "df_ref": "films", "x": "Rank", "y": "Gross", "regression": true } },
        { "id": "answer", "type": "return", "args": { "from": ["top", "chart"] } }
    ]));

    let store = engine()?.execute(&plan, dir.path(), Duration::from_secs(30)).await?;
    assert_eq!(store.ids(), ["page", "films", "top", "chart", "answer"]);

    let Some(StepResult::List(values)) = store.final_result() else { panic!("no final result") };
    assert_eq!(values[0], json!("Title\nAvatar\nAvengers: Endgame\n"));
    assert!(values[1].as_str().unwrap().starts_with("data:image/svg+xml;base64,"));
    assert!(dir.path().join("chart.svg").is_file());
    Ok(())
}

#[tokio::test]
async fn test_forward_reference_is_missing_dependency() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("data.csv"), "x,y\n1,2\n")?;
    let plan = plan(json!([
        { "id": "chart", "type": "plot", "args": { "df_ref": "rows", "x": "x", "y": "y" } },
        { "id": "rows", "type": "query", "args": { "query": "SELECT * FROM data" } }
    ]));

    let failure = engine()?.execute(&plan, dir.path(), Duration::from_secs(10)).await.unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::MissingDependency);
    assert_eq!(failure.step_id.as_deref(), Some("chart"));
    assert!(failure.completed.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_script_failure_carries_stderr() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let plan = plan(json!([
        { "id": "calc", "type": "run_code", "args": { "code": ["echo 'ZeroDivisionError' >&2", "exit 3"] } },
        { "id": "answer", "type": "return", "args": { "from": ["calc"] } }
    ]));

    let failure = engine()?.execute(&plan, dir.path(), Duration::from_secs(10)).await.unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::ScriptExecutionError);
    let body = failure.to_json();
    assert_eq!(body["step"], "calc");
    assert!(body["message"].as_str().unwrap().contains("ZeroDivisionError"));
    Ok(())
}

#[tokio::test]
async fn test_scripts_see_workspace_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("numbers.txt"), "3\n4\n")?;
    let plan = plan(json!([
        { "id": "sum", "type": "run_code",
          "args": { "code": "total=0; while read n; do total=$((total + n)); done < numbers.txt; echo $total" } },
        { "id": "text", "type": "read_file", "args": { "path": "sum.sh" } },
        { "id": "digest", "type": "summarize", "args": { "from": ["sum"] } }
    ]));

    let store = engine()?.execute(&plan, dir.path(), Duration::from_secs(10)).await?;
    assert_eq!(store.get("sum"), Some(&StepResult::Text("7".into())));
    assert!(matches!(store.get("text"), Some(StepResult::Text(t)) if t.contains("numbers.txt")));
    assert!(matches!(store.get("digest"), Some(StepResult::Text(t)) if t.contains("\"value\": \"7\"")));
    Ok(())
}

#[tokio::test]
async fn test_unknown_step_type_rejected_at_parse() {
    let err = Plan::from_value(json!([{ "id": "a", "type": "scrape_everything", "args": {} }]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedPlan);
}

#[tokio::test]
async fn test_unreadable_pdf_is_file_not_found() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("report.pdf"), b"This is not a PDF file")?;
    let plan = plan(json!([{ "id": "doc", "type": "read_file", "args": { "path": "report.pdf" } }]));

    let failure = engine()?.execute(&plan, dir.path(), Duration::from_secs(10)).await.unwrap_err();
    assert_eq!(failure.kind(), ErrorKind::FileNotFound);
    assert!(failure.error.to_string().contains("report.pdf"));
    Ok(())
}

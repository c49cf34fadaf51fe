//! `summarize`: serialise a projection of text and table results.

use serde_json::{json, Value};

use super::StepContext;
use crate::{
    error::StepError,
    plan::SummarizeArgs,
    store::{ResultKind, StepResult},
    utils::table::Table,
};

const DEFAULT_MAX_ROWS: usize = 20;

pub fn run(args: SummarizeArgs, ctx: &StepContext<'_>) -> Result<StepResult, StepError> {
    let max_rows = args.max_rows.unwrap_or(DEFAULT_MAX_ROWS);
    let mut entries = Vec::new();

    for source in args.from_steps.to_vec() {
        let entry = match ctx.store.require(&source)? {
            StepResult::Text(text) => json!({ "source": source, "kind": "text", "value": text }),
            StepResult::Table(path) => {
                let table = Table::read_csv(path).map_err(|e| {
                    StepError::missing(format!("table from step '{}' is unreadable: {:#}", source, e))
                })?;
                project(&source, &table, args.columns.as_deref(), max_rows)
            }
            other => {
                return Err(StepError::missing(format!(
                    "step '{}' produced {}, expected {} or {}",
                    source,
                    other.kind(),
                    ResultKind::Text,
                    ResultKind::Table
                )))
            }
        };
        entries.push(entry);
    }

    let text = serde_json::to_string_pretty(&entries)
        .map_err(|e| StepError::malformed_args(e.to_string()))?;
    Ok(StepResult::Text(text))
}

fn project(source: &str, table: &Table, columns: Option<&[String]>, max_rows: usize) -> Value {
    // Unknown column names are ignored.
    let picked: Vec<usize> = match columns {
        Some(names) => names.iter().filter_map(|n| table.column_index(n)).collect(),
        None => (0..table.headers.len()).collect(),
    };
    let headers: Vec<&str> = picked.iter().map(|&i| table.headers[i].as_str()).collect();
    let rows: Vec<Vec<&str>> = table
        .rows
        .iter()
        .take(max_rows)
        .map(|row| picked.iter().map(|&i| row.get(i).map_or("", String::as_str)).collect())
        .collect();
    json!({
        "source": source,
        "kind": "table",
        "columns": headers,
        "rows": rows,
        "total_rows": table.rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{handlers::testing::Fixture, plan::OneOrMany};

    fn fixture() -> Fixture {
        let mut fx = Fixture::new();
        let path = fx.write("t.csv", "a,b,c\n1,2,3\n4,5,6\n7,8,9\n");
        fx.store.commit("tbl", StepResult::Table(path)).unwrap();
        fx.store.commit("txt", StepResult::Text("hello".into())).unwrap();
        fx.store.commit("file", StepResult::File(fx.dir.path().join("t.csv"))).unwrap();
        fx
    }

    fn parse(result: StepResult) -> Value {
        let StepResult::Text(text) = result else { panic!("expected text") };
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn test_projection_and_row_cap() {
        let fx = fixture();
        let args = SummarizeArgs {
            from_steps: OneOrMany::Many(vec!["txt".into(), "tbl".into()]),
            columns: Some(vec!["c".into(), "zzz".into(), "a".into()]),
            max_rows: Some(2),
        };
        let value = parse(run(args, &fx.ctx("sum")).unwrap());
        assert_eq!(value[0], json!({"source": "txt", "kind": "text", "value": "hello"}));
        assert_eq!(value[1]["columns"], json!(["c", "a"]));
        assert_eq!(value[1]["rows"], json!([["3", "1"], ["6", "4"]]));
        assert_eq!(value[1]["total_rows"], 3);
    }

    #[test]
    fn test_invalid_sources() {
        let fx = fixture();
        for source in ["missing", "file"] {
            let args = SummarizeArgs {
                from_steps: OneOrMany::One(source.into()),
                columns: None,
                max_rows: None,
            };
            assert!(matches!(run(args, &fx.ctx("sum")), Err(StepError::MissingDependency(_))));
        }
    }
}

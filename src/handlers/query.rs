//! `query`: SQL over the CSV files in the workspace.
//!
//! Each `*.csv` in the workspace root becomes a table named by its file name
//! (`"films.csv"`) and, when that name is free, a view named by its stem
//! (`films`). Cells that look numeric are stored as numbers so comparisons
//! and aggregates behave.

use std::{collections::HashSet, fs, path::Path};

use rusqlite::{
    params_from_iter,
    types::{Value, ValueRef},
    Connection,
};
use tracing::{debug, warn};

use super::StepContext;
use crate::{error::StepError, plan::QueryArgs, store::StepResult, utils::table::Table};

pub fn run(args: QueryArgs, ctx: &StepContext<'_>) -> Result<StepResult, StepError> {
    let conn = Connection::open_in_memory().map_err(query_failed)?;
    let loaded = load_workspace_tables(&conn, ctx.workspace)?;
    debug!(tables = ?loaded, "workspace tables registered");

    let table = execute(&conn, &args.query)?;
    let dest = ctx.output_path(args.save_as.as_deref(), "csv")?;
    table
        .write_csv(&dest)
        .map_err(|e| StepError::QueryFailed(format!("{:#}", e)))?;
    Ok(StepResult::Table(dest))
}

fn query_failed(e: rusqlite::Error) -> StepError {
    StepError::QueryFailed(e.to_string())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn load_workspace_tables(conn: &Connection, dir: &Path) -> Result<Vec<String>, StepError> {
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    paths.sort();

    // SQLite resolves identifiers case-insensitively.
    let mut taken: HashSet<String> = HashSet::new();
    let mut loaded = Vec::new();
    for path in &paths {
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !taken.insert(file_name.to_ascii_lowercase()) {
            warn!(file = %file_name, "skipping CSV whose table name differs only in case");
            continue;
        }
        let table = match Table::read_csv(path) {
            Ok(t) => t,
            Err(e) => {
                warn!(file = %file_name, error = %e, "skipping unreadable CSV");
                continue;
            }
        };
        create_table(conn, &file_name, &table)?;
        loaded.push(file_name.clone());

        if let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) {
            if taken.insert(stem.to_ascii_lowercase()) {
                let sql = format!(
                    "CREATE VIEW {} AS SELECT * FROM {}",
                    quote_ident(&stem),
                    quote_ident(&file_name)
                );
                conn.execute_batch(&sql).map_err(query_failed)?;
                loaded.push(stem);
            }
        }
    }
    loaded.sort();
    Ok(loaded)
}

/// Column names made non-empty and unique, as SQLite requires.
fn column_names(headers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let base = if h.trim().is_empty() { format!("column{}", i) } else { h.clone() };
            let mut name = base.clone();
            let mut n = 1;
            while !seen.insert(name.to_ascii_lowercase()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            name
        })
        .collect()
}

fn cell_value(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        Value::Null
    } else if let Ok(i) = trimmed.parse::<i64>() {
        Value::Integer(i)
    } else if let Some(f) = trimmed.parse::<f64>().ok().filter(|f| f.is_finite()) {
        Value::Real(f)
    } else {
        Value::Text(cell.to_string())
    }
}

fn create_table(conn: &Connection, name: &str, table: &Table) -> Result<(), StepError> {
    let columns = column_names(&table.headers);
    if columns.is_empty() {
        return Ok(());
    }
    let column_list = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    conn.execute_batch(&format!("CREATE TABLE {} ({})", quote_ident(name), column_list))
        .map_err(query_failed)?;

    let placeholders = vec!["?"; columns.len()].join(", ");
    let insert = format!("INSERT INTO {} VALUES ({})", quote_ident(name), placeholders);
    let tx = conn.unchecked_transaction().map_err(query_failed)?;
    {
        let mut stmt = tx.prepare(&insert).map_err(query_failed)?;
        for row in &table.rows {
            let values = (0..columns.len())
                .map(|i| row.get(i).map(|c| cell_value(c)).unwrap_or(Value::Null));
            stmt.execute(params_from_iter(values)).map_err(query_failed)?;
        }
    }
    tx.commit().map_err(query_failed)
}

fn render(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    }
}

fn execute(conn: &Connection, sql: &str) -> Result<Table, StepError> {
    let mut stmt = conn.prepare(sql).map_err(query_failed)?;
    let headers: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = headers.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([]).map_err(query_failed)?;
    while let Some(row) = cursor.next().map_err(query_failed)? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(render(row.get_ref(i).map_err(query_failed)?));
        }
        rows.push(cells);
    }
    Ok(Table { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::Fixture;

    fn fixture() -> Fixture {
        let fx = Fixture::new();
        fx.write("sales.csv", "region,amount,note\nwest,10,a\neast,5,\nwest,2.5,\"x, y\"\n");
        fx
    }

    fn output(fx: &Fixture, result: StepResult) -> String {
        let StepResult::Table(path) = result else { panic!("expected table") };
        assert!(path.starts_with(fx.dir.path()));
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_aggregate_over_stem_view() {
        let fx = fixture();
        let args = QueryArgs {
            query: "SELECT region, SUM(amount) AS total FROM sales GROUP BY region ORDER BY region"
                .into(),
            save_as: Some("totals.csv".into()),
        };
        let result = run(args, &fx.ctx("q")).unwrap();
        assert_eq!(output(&fx, result), "region,total\neast,5\nwest,12.5\n");
    }

    #[test]
    fn test_quoted_file_name_and_numeric_filter() {
        let fx = fixture();
        let args = QueryArgs {
            query: r#"SELECT note FROM "sales.csv" WHERE amount > 3 ORDER BY amount;"#.into(),
            save_as: None,
        };
        let result = run(args, &fx.ctx("q")).unwrap();
        assert_eq!(result, StepResult::Table(fx.dir.path().join("q.csv")));
        assert_eq!(output(&fx, result), "note\n\"\"\na\n");
    }

    #[test]
    fn test_bad_sql() {
        let fx = fixture();
        let args = QueryArgs { query: "SELEC nonsense".into(), save_as: None };
        assert!(matches!(run(args, &fx.ctx("q")), Err(StepError::QueryFailed(_))));

        let args = QueryArgs { query: "SELECT * FROM nowhere".into(), save_as: None };
        assert!(matches!(run(args, &fx.ctx("q")), Err(StepError::QueryFailed(_))));
    }

    #[test]
    fn test_case_colliding_files_do_not_break_queries() {
        let fx = Fixture::new();
        fx.write("Sales.csv", "amount\n1\n2\n");
        fx.write("sales.csv", "amount\n7\n");

        let args = QueryArgs { query: "SELECT 1 AS one".into(), save_as: None };
        let result = run(args, &fx.ctx("one")).unwrap();
        assert_eq!(output(&fx, result), "one\n1\n");

        let args = QueryArgs { query: "SELECT COUNT(*) AS n FROM SALES".into(), save_as: None };
        let result = run(args, &fx.ctx("count")).unwrap();
        assert_eq!(output(&fx, result), "n\n2\n");
    }

    #[test]
    fn test_column_names_deduplicated() {
        let cols = column_names(&["a".into(), "".into(), "A".into()]);
        assert_eq!(cols, ["a", "column1", "A_1"]);
    }
}

//! `extract_table`: pull an HTML table out of a fetched/uploaded file into CSV.

use std::fs;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::StepContext;
use crate::{
    error::StepError,
    plan::ExtractTableArgs,
    store::StepResult,
    utils::table::Table,
};

pub fn run(args: ExtractTableArgs, ctx: &StepContext<'_>) -> Result<StepResult, StepError> {
    let source = match ctx.store.require(&args.from)? {
        StepResult::File(path) => path,
        other => {
            return Err(StepError::ExtractionFailed(format!(
                "source step '{}' produced {}, not a file",
                args.from,
                other.kind()
            )))
        }
    };
    let bytes = fs::read(source)?;
    let html = String::from_utf8_lossy(&bytes);

    let table = parse_table(&html, args.index)?;
    let dest = ctx.output_path(args.save_as.as_deref(), "csv")?;
    table
        .write_csv(&dest)
        .map_err(|e| StepError::ExtractionFailed(format!("{:#}", e)))?;

    debug!(columns = table.headers.len(), rows = table.rows.len(), "table extracted");
    Ok(StepResult::Table(dest))
}

fn selector(css: &str) -> Result<Selector, StepError> {
    Selector::parse(css).map_err(|e| StepError::ExtractionFailed(format!("selector {}: {}", css, e)))
}

/// Parse the `index`-th non-empty `<table>` in `html`.
pub fn parse_table(html: &str, index: usize) -> Result<Table, StepError> {
    let doc = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;

    let tables: Vec<ElementRef> = doc
        .select(&table_sel)
        .filter(|t| t.select(&row_sel).next().is_some())
        .collect();
    let Some(table) = tables.get(index) else {
        return Err(StepError::ExtractionFailed(if tables.is_empty() {
            "no table found".to_string()
        } else {
            format!("table index {} out of range ({} tables)", index, tables.len())
        }));
    };

    let mut rows: Vec<(bool, Vec<String>)> = Vec::new();
    for tr in table.select(&row_sel) {
        let cells: Vec<ElementRef> = tr.select(&cell_sel).collect();
        if cells.is_empty() {
            continue;
        }
        let all_header = cells.iter().all(|c| c.value().name() == "th");
        let texts = cells
            .iter()
            .map(|c| c.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" "))
            .collect();
        rows.push((all_header, texts));
    }
    if rows.is_empty() {
        return Err(StepError::ExtractionFailed("table has no cells".into()));
    }

    let mut headers = if rows[0].0 { rows.remove(0).1 } else { Vec::new() };
    let mut body: Vec<Vec<String>> = rows.into_iter().map(|(_, cells)| cells).collect();

    let width = body.iter().map(Vec::len).chain([headers.len()]).max().unwrap_or(0);
    while headers.len() < width {
        headers.push(headers.len().to_string());
    }
    for row in &mut body {
        row.resize(width, String::new());
    }
    Ok(Table { headers, rows: body })
}

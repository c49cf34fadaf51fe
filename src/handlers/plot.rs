//! `plot`: scatter plot of two table columns, rendered as SVG.

use std::{fmt::Write as _, fs};

use tracing::warn;

use super::StepContext;
use crate::{
    error::StepError,
    plan::PlotArgs,
    store::StepResult,
    utils::{data_uri, table::Table},
};

const WIDTH: f64 = 600.0;
const HEIGHT: f64 = 400.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 20.0;
const MARGIN_BOTTOM: f64 = 50.0;
const TICKS: usize = 5;

pub fn run(args: PlotArgs, ctx: &StepContext<'_>) -> Result<StepResult, StepError> {
    let source = ctx.store.require_table(&args.df_ref)?;
    let table = Table::read_csv(source).map_err(|e| StepError::PlotFailed(format!("{:#}", e)))?;

    let xi = column(&table, &args.x)?;
    let yi = column(&table, &args.y)?;
    let points: Vec<(f64, f64)> = table
        .rows
        .iter()
        .filter_map(|row| Some((parse_number(row.get(xi)?)?, parse_number(row.get(yi)?)?)))
        .collect();
    if points.is_empty() {
        return Err(StepError::PlotFailed(format!(
            "no numeric points in columns '{}' and '{}'",
            args.x, args.y
        )));
    }
    let regression = if args.regression {
        Some(fit_line(&points).ok_or_else(|| {
            StepError::PlotFailed("regression needs at least two distinct x values".into())
        })?)
    } else {
        None
    };

    let xlabel = args.xlabel.as_deref().unwrap_or(&args.x);
    let ylabel = args.ylabel.as_deref().unwrap_or(&args.y);
    let svg = render_svg(&points, regression, xlabel, ylabel);

    let mut dest = ctx.output_path(args.save_as.as_deref(), "svg")?;
    if dest.extension().and_then(|e| e.to_str()) != Some("svg") {
        warn!(requested = %dest.display(), "plots are rendered as SVG, adjusting extension");
        dest.set_extension("svg");
    }
    fs::write(&dest, svg)?;
    let data_uri = data_uri(&dest).map_err(|e| StepError::PlotFailed(format!("{:#}", e)))?;
    Ok(StepResult::Image { path: dest, data_uri })
}

fn column(table: &Table, name: &str) -> Result<usize, StepError> {
    table.column_index(name).ok_or_else(|| {
        StepError::PlotFailed(format!(
            "column '{}' not found (have: {})",
            name,
            table.headers.join(", ")
        ))
    })
}

/// Lenient numeric parse: tolerates thousands separators and currency signs.
fn parse_number(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | ' ' | '\u{a0}'))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Least-squares fit, returning (slope, intercept).
fn fit_line(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    let n = points.len() as f64;
    let (sx, sy, sxx, sxy) = points.iter().fold((0.0, 0.0, 0.0, 0.0), |acc, (x, y)| {
        (acc.0 + x, acc.1 + y, acc.2 + x * x, acc.3 + x * y)
    });
    let denom = n * sxx - sx * sx;
    if points.len() < 2 || denom.abs() < f64::EPSILON {
        return None;
    }
    let slope = (n * sxy - sx * sy) / denom;
    Some((slope, (sy - slope * sx) / n))
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if (hi - lo).abs() < f64::EPSILON {
        (lo - 1.0, hi + 1.0)
    } else {
        let pad = (hi - lo) * 0.05;
        (lo - pad, hi + pad)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn tick_label(v: f64) -> String {
    if v.abs() >= 1e5 || (v != 0.0 && v.abs() < 1e-2) {
        format!("{:.1e}", v)
    } else {
        let s = format!("{:.2}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn render_svg(
    points: &[(f64, f64)],
    regression: Option<(f64, f64)>,
    xlabel: &str,
    ylabel: &str,
) -> String {
    let (x0, x1) = bounds(points.iter().map(|p| p.0));
    let (y0, y1) = bounds(points.iter().map(|p| p.1));
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let sx = |x: f64| MARGIN_LEFT + (x - x0) / (x1 - x0) * plot_w;
    let sy = |y: f64| MARGIN_TOP + plot_h - (y - y0) / (y1 - y0) * plot_h;

    // write! into a String cannot fail.
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif" font-size="11">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<rect x="{MARGIN_LEFT}" y="{MARGIN_TOP}" width="{plot_w}" height="{plot_h}" fill="none" stroke="black"/>"#
    );

    for i in 0..=TICKS {
        let t = i as f64 / TICKS as f64;
        let xv = x0 + t * (x1 - x0);
        let yv = y0 + t * (y1 - y0);
        let (px, py) = (sx(xv), sy(yv));
        let bottom = MARGIN_TOP + plot_h;
        let _ = writeln!(
            svg,
            r#"<line x1="{px:.1}" y1="{bottom}" x2="{px:.1}" y2="{:.1}" stroke="black"/><text x="{px:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
            bottom + 4.0,
            bottom + 16.0,
            tick_label(xv)
        );
        let _ = writeln!(
            svg,
            r#"<line x1="{:.1}" y1="{py:.1}" x2="{MARGIN_LEFT}" y2="{py:.1}" stroke="black"/><text x="{:.1}" y="{:.1}" text-anchor="end">{}</text>"#,
            MARGIN_LEFT - 4.0,
            MARGIN_LEFT - 6.0,
            py + 4.0,
            tick_label(yv)
        );
    }

    for (x, y) in points {
        let _ = writeln!(
            svg,
            r##"<circle cx="{:.1}" cy="{:.1}" r="3" fill="#1f77b4"/>"##,
            sx(*x),
            sy(*y)
        );
    }

    if let Some((m, b)) = regression {
        let lo = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let hi = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let _ = writeln!(
            svg,
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="red" stroke-width="1.5" stroke-dasharray="6,4"/>"#,
            sx(lo),
            sy(m * lo + b),
            sx(hi),
            sy(m * hi + b)
        );
    }

    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="13">{}</text>"#,
        MARGIN_LEFT + plot_w / 2.0,
        HEIGHT - 10.0,
        escape(xlabel)
    );
    let cy = MARGIN_TOP + plot_h / 2.0;
    let _ = writeln!(
        svg,
        r#"<text x="16" y="{cy:.1}" text-anchor="middle" font-size="13" transform="rotate(-90 16 {cy:.1})">{}</text>"#,
        escape(ylabel)
    );
    svg.push_str("</svg>\n");
    svg
}

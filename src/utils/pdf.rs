//! PDF text extraction.
//!
//! Output is normalised into page/line sections:
//!   --page N----\n
//!   L1: ...\n
//!   L2: ...

use std::path::Path;

use anyhow::{anyhow, Result};
use pdf_extract::extract_text;

/// Extract the text content of a PDF file.
///
/// Some PDFs with unusual font encodings extract with missing glyphs; empty
/// or corrupted files return an error.
pub fn extract_pdf_text(path: &Path) -> Result<String> {
    let raw = extract_text(path)
        .map_err(|e| anyhow!("Failed to extract text from PDF '{}': {}", path.display(), e))?;
    Ok(format_pages_and_lines(&raw))
}

/// Page boundaries are form feeds (\x0C) when present; otherwise the whole
/// document is one page.
fn format_pages_and_lines(raw: &str) -> String {
    let pages: Vec<&str> = if raw.contains('\u{000C}') {
        raw.split('\u{000C}').collect()
    } else {
        vec![raw]
    };

    let mut out = String::new();
    for (pi, page) in pages.iter().enumerate() {
        if pi > 0 {
            out.push('\n');
        }
        out.push_str(&format!("--page {}----\n", pi + 1));
        for (li, line) in page.lines().enumerate() {
            let line = line.trim_end_matches(['\r', '\n']);
            out.push_str(&format!("L{}: {}\n", li + 1, line));
        }
    }
    out
}

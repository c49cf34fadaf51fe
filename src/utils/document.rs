//! Reading workspace documents as text.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};

/// Read a document as text.
///
/// PDFs go through text extraction; everything else is decoded as UTF-8,
/// replacing invalid sequences rather than failing.
pub fn read_document(path: &Path) -> Result<String> {
    if !path.is_file() {
        bail!("'{}' is not a file", path.display());
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "pdf" => super::pdf::extract_pdf_text(path),
        _ => {
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read file '{}'", path.display()))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_text_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"caf\xC3\xA9 \xFF ok").unwrap();
        let text = read_document(&path).unwrap();
        assert!(text.starts_with("café"));
        assert!(text.ends_with("ok"));
    }

    #[test]
    fn test_rejects_directories_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_document(dir.path()).is_err());
        assert!(read_document(&dir.path().join("nope.md")).is_err());
    }
}

//! Utilities (document reading, CSV tables, data URIs).

use std::{fs, path::Path};

use anyhow::{Context, Result};
use base64::Engine;

pub mod document;
pub mod pdf;
pub mod table;

/// MIME type guessed from a file extension.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Encode a file as a `data:` URI suitable for embedding.
pub fn data_uri(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{};base64,{}", mime_for(path), encoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.svg");
        fs::write(&path, "<svg/>").unwrap();
        assert_eq!(data_uri(&path).unwrap(), "data:image/svg+xml;base64,PHN2Zy8+");
        assert_eq!(mime_for(Path::new("x.PNG")), "image/png");
    }
}

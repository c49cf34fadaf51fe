//! Job-scoped scratch directories.
//!
//! A [`Workspace`] is removed when it is dropped, so every exit path of a job
//! (success, handled error, panic unwinding through the owner) reaches the
//! same teardown.

use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use tempfile::TempDir;
use tracing::debug;

use crate::error::StepError;

#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh, uniquely named directory under `base`.
    pub fn create(base: &Path) -> io::Result<Self> {
        fs::create_dir_all(base)?;
        let dir = tempfile::Builder::new().prefix("job-").tempdir_in(base)?;
        debug!(path = %dir.path().display(), "workspace created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write an uploaded file into the workspace root.
    pub fn add_file(&self, name: &str, contents: &[u8]) -> Result<PathBuf, StepError> {
        let path = resolve_in(self.path(), name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Remove the directory now, reporting failures instead of swallowing them.
    pub fn close(self) -> io::Result<()> {
        let path = self.path().to_path_buf();
        self.dir.close()?;
        debug!(path = %path.display(), "workspace removed");
        Ok(())
    }
}

/// Resolve a workspace-relative path, refusing anything that would escape `root`.
pub fn resolve_in(root: &Path, relative: &str) -> Result<PathBuf, StepError> {
    let rel = Path::new(relative);
    if relative.trim().is_empty() {
        return Err(StepError::malformed_args("empty workspace path"));
    }
    let escapes = rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(StepError::malformed_args(format!(
            "path '{}' escapes the workspace",
            relative
        )));
    }
    Ok(root.join(rel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_removes_directory() {
        let base = tempfile::tempdir().unwrap();
        let ws = Workspace::create(base.path()).unwrap();
        let path = ws.path().to_path_buf();
        ws.add_file("questions.txt", b"what?").unwrap();
        assert!(path.join("questions.txt").is_file());
        drop(ws);
        assert!(!path.exists());
    }

    #[test]
    fn test_close_removes_directory() {
        let base = tempfile::tempdir().unwrap();
        let ws = Workspace::create(&base.path().join("nested")).unwrap();
        let path = ws.path().to_path_buf();
        ws.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_panic_still_removes_directory() {
        let base = tempfile::tempdir().unwrap();
        let mut seen = None;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let ws = Workspace::create(base.path()).unwrap();
            seen = Some(ws.path().to_path_buf());
            panic!("fault mid-plan");
        }));
        assert!(result.is_err());
        assert!(!seen.unwrap().exists());
    }

    #[test]
    fn test_workspaces_are_distinct() {
        let base = tempfile::tempdir().unwrap();
        let a = Workspace::create(base.path()).unwrap();
        let b = Workspace::create(base.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let root = Path::new("/ws");
        assert_eq!(resolve_in(root, "a/b.csv").unwrap(), PathBuf::from("/ws/a/b.csv"));
        for bad in ["../etc/passwd", "/etc/passwd", "a/../../b", ""] {
            assert!(
                matches!(resolve_in(root, bad), Err(StepError::MalformedStepArgs(_))),
                "accepted {bad}"
            );
        }
    }
}

//! On-disk cache of planner responses, keyed by request digest.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::{config::Config, llm::ChatMessage};

#[derive(Debug, Clone)]
pub struct RequestCache {
    length: usize,
    cache_path: PathBuf,
}

impl RequestCache {
    pub fn from_config(cfg: &Config) -> Self {
        let length = cfg.get_usize("CACHE_LENGTH").unwrap_or(100);
        Self::new(cfg.cache_path(), length)
    }

    pub fn new(cache_path: PathBuf, length: usize) -> Self {
        Self { length, cache_path }
    }

    pub fn key_for(&self, base_url: &str, model: &str, messages: &[ChatMessage]) -> String {
        let payload = serde_json::json!({
            "base_url": base_url,
            "model": model,
            "messages": messages,
        });
        let data = serde_json::to_vec(&payload).unwrap_or_default();
        format!("{:x}", md5::compute(data))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let hit = fs::read_to_string(self.cache_path.join(key)).ok();
        debug!(key, hit = hit.is_some(), "planner cache lookup");
        hit
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.cache_path).with_context(|| {
            format!("Failed to create cache dir {}", self.cache_path.display())
        })?;
        fs::write(self.cache_path.join(key), value)?;
        self.prune()
    }

    /// Keep at most `length` entries, dropping the oldest first.
    fn prune(&self) -> Result<()> {
        let mut entries: Vec<_> = fs::read_dir(&self.cache_path)?.filter_map(|e| e.ok()).collect();
        if entries.len() <= self.length {
            return Ok(());
        }
        entries.sort_by_key(|e| e.metadata().and_then(|m| m.modified()).ok());
        let excess = entries.len() - self.length;
        for entry in entries.into_iter().take(excess) {
            let _ = fs::remove_file(entry.path());
        }
        Ok(())
    }
}

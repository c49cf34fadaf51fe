//! Layered key/value configuration and the engine's immutable settings.

use std::{
    collections::{HashMap, HashSet},
    env, fs,
    io::{BufRead, BufReader},
    path::PathBuf,
    time::Duration,
};

use directories::BaseDirs;
use tracing::warn;

use crate::{
    plan::StepKind,
    process::{InterpreterPrograms, InterpreterType, SandboxPolicy},
};

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    /// Defaults, then the rc file, then recognised environment variables.
    pub fn load() -> Self {
        let mut map = default_map();
        let config_path = default_config_path();

        if config_path.exists() {
            if let Ok(file) = fs::File::open(&config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(Result::ok) {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((k, v)) = line.split_once('=') {
                        map.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
        }

        // Environment takes precedence over the rc file
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }
        if !map.contains_key("OPENAI_API_KEY") {
            if let Some(token) = map.get("AIPIPE_TOKEN").cloned() {
                map.insert("OPENAI_API_KEY".into(), token);
            }
        }

        Self { inner: map, config_path }
    }

    /// Defaults overlaid with explicit pairs; ignores the rc file and environment.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = default_map();
        for (k, v) in pairs {
            map.insert(k.into(), v.into());
        }
        Self { inner: map, config_path: default_config_path() }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).filter(|v| !v.trim().is_empty()).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        let raw = self.get(key)?;
        match raw.parse::<u64>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(key, value = %raw, "ignoring non-numeric config value");
                None
            }
        }
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get_u64(key).map(|v| v as usize)
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.get_path("WORK_DIR")
            .unwrap_or_else(|| env::temp_dir().join("planexec_jobs"))
    }

    pub fn cache_path(&self) -> PathBuf {
        self.get_path("CACHE_PATH")
            .unwrap_or_else(|| env::temp_dir().join("planexec").join("cache"))
    }
}

/// Immutable settings handed to the engine. Nothing inside the engine
/// consults the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub work_dir: PathBuf,
    pub job_deadline: Duration,
    pub step_timeout: Duration,
    pub default_language: InterpreterType,
    pub interpreters: InterpreterPrograms,
    pub sandbox: SandboxPolicy,
    pub enabled_steps: HashSet<StepKind>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            work_dir: env::temp_dir().join("planexec_jobs"),
            job_deadline: Duration::from_secs(DEFAULT_JOB_SECONDS),
            step_timeout: Duration::from_secs(DEFAULT_STEP_SECONDS),
            default_language: InterpreterType::Python,
            interpreters: InterpreterPrograms::default(),
            sandbox: SandboxPolicy::default(),
            enabled_steps: StepKind::ALL.into_iter().collect(),
        }
    }
}

impl EngineConfig {
    pub fn from_config(cfg: &Config) -> Self {
        let defaults = Self::default();
        let default_language = match cfg.get("CODE_LANGUAGE") {
            Some(name) => InterpreterType::from_name(&name).unwrap_or_else(|| {
                warn!(language = %name, "unknown CODE_LANGUAGE, using python");
                InterpreterType::Python
            }),
            None => defaults.default_language,
        };
        let enabled_steps = match cfg.get("ENABLED_STEPS") {
            Some(list) => parse_step_list(&list),
            None => defaults.enabled_steps,
        };
        let programs = InterpreterPrograms::default();
        Self {
            work_dir: cfg.work_dir(),
            job_deadline: cfg
                .get_u64("MAX_JOB_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_deadline),
            step_timeout: cfg
                .get_u64("STEP_TIMEOUT")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.step_timeout),
            default_language,
            interpreters: InterpreterPrograms {
                python: cfg.get("PYTHON_BIN").unwrap_or(programs.python),
                r: cfg.get("RSCRIPT_BIN").unwrap_or(programs.r),
                shell: cfg.get("SHELL_BIN").unwrap_or(programs.shell),
            },
            sandbox: SandboxPolicy { inherit_env: cfg.get_bool("SANDBOX_INHERIT_ENV") },
            enabled_steps,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.job_deadline = deadline;
        self
    }
}

const DEFAULT_JOB_SECONDS: u64 = 170;
const DEFAULT_STEP_SECONDS: u64 = 30;

fn parse_step_list(list: &str) -> HashSet<StepKind> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|name| match name.parse::<StepKind>() {
            Ok(kind) => Some(kind),
            Err(_) => {
                warn!(step_type = name, "ignoring unknown entry in ENABLED_STEPS");
                None
            }
        })
        .collect()
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &[
        "WORK_DIR",
        "MAX_JOB_SECONDS",
        "STEP_TIMEOUT",
        "CODE_LANGUAGE",
        "PYTHON_BIN",
        "RSCRIPT_BIN",
        "SHELL_BIN",
        "SANDBOX_INHERIT_ENV",
        "ENABLED_STEPS",
        "AIPIPE_TOKEN",
        "API_BASE_URL",
        "DEFAULT_MODEL",
        "REQUEST_TIMEOUT",
        "PLANNER_MAX_TOKENS",
        "CACHE_PATH",
        "CACHE_LENGTH",
    ];

    KEYS.contains(&k) || k.starts_with("PLANEXEC_") || k.starts_with("OPENAI_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("planexec").join(".planexecrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    let temp = env::temp_dir();

    // Paths
    m.insert(
        "WORK_DIR".into(),
        temp.join("planexec_jobs").to_string_lossy().into_owned(),
    );
    m.insert(
        "CACHE_PATH".into(),
        temp.join("planexec").join("cache").to_string_lossy().into_owned(),
    );

    // Numbers
    m.insert("MAX_JOB_SECONDS".into(), DEFAULT_JOB_SECONDS.to_string());
    m.insert("STEP_TIMEOUT".into(), DEFAULT_STEP_SECONDS.to_string());
    m.insert("REQUEST_TIMEOUT".into(), "60".into());
    m.insert("PLANNER_MAX_TOKENS".into(), "2048".into());
    m.insert("CACHE_LENGTH".into(), "100".into());

    // Strings
    m.insert("CODE_LANGUAGE".into(), "python".into());
    m.insert("PYTHON_BIN".into(), "python3".into());
    m.insert("RSCRIPT_BIN".into(), "Rscript".into());
    m.insert("SHELL_BIN".into(), "/bin/sh".into());
    m.insert("API_BASE_URL".into(), "https://aipipe.org/openrouter/v1".into());
    m.insert("DEFAULT_MODEL".into(), "openai/gpt-4.1-nano".into());

    // Bools as strings
    m.insert("SANDBOX_INHERIT_ENV".into(), "true".into());

    m
}

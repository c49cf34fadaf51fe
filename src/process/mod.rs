//! Interpreter process management: the only place that spawns OS processes.

use std::{
    path::Path,
    process::Stdio,
    time::{Duration, Instant},
};

use tokio::{io::AsyncReadExt, process::Command, time::timeout};
use tracing::{debug, warn};

use crate::error::StepError;

mod interpreter;

pub use interpreter::{InterpreterPrograms, InterpreterType};

/// PATH handed to children when the parent environment is withheld.
const SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// How much of the parent environment a child process sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    /// When false the child gets only `PATH` and `HOME` (the working directory).
    pub inherit_env: bool,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self { inherit_env: true }
    }
}

/// Captured result of a finished child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    pub success: bool,
    pub elapsed: Duration,
}

impl ProcessOutput {
    /// Turn a non-zero exit into a `ScriptExecutionError` carrying stderr.
    pub fn ensure_success(self) -> Result<Self, StepError> {
        if self.success {
            Ok(self)
        } else {
            Err(StepError::ScriptExecutionError {
                code: self.exit_code.unwrap_or(-1),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    sandbox: SandboxPolicy,
}

impl ProcessRunner {
    pub fn new(sandbox: SandboxPolicy) -> Self {
        Self { sandbox }
    }

    /// Run `program script` inside `working_dir`, killing it after `limit`.
    ///
    /// A non-zero exit is reported in the output, not as an error; only a
    /// timeout or a failure to start the interpreter is an `Err`.
    pub async fn run(
        &self,
        program: &str,
        script: &Path,
        working_dir: &Path,
        limit: Duration,
    ) -> Result<ProcessOutput, StepError> {
        let mut std_cmd = std::process::Command::new(program);
        std_cmd
            .arg(script)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if !self.sandbox.inherit_env {
            std_cmd
                .env_clear()
                .env("PATH", SANDBOX_PATH)
                .env("HOME", working_dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group so a timeout can take down grandchildren too.
            std_cmd.process_group(0);
        }
        let mut cmd = Command::from(std_cmd);
        cmd.kill_on_drop(true);

        debug!(program, script = %script.display(), ?limit, "spawning interpreter");
        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| StepError::ScriptExecutionError {
            code: -1,
            stderr: format!("failed to start '{}': {}", program, e),
        })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("no stdout pipe"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("no stderr pipe"))?;

        let run = async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let (status, out_res, err_res) = tokio::join!(
                child.wait(),
                stdout.read_to_end(&mut out),
                stderr.read_to_end(&mut err)
            );
            out_res?;
            err_res?;
            Ok::<_, std::io::Error>((status?, out, err))
        };
        let outcome = timeout(limit, run).await;

        match outcome {
            Ok(Ok((status, out, err))) => Ok(ProcessOutput {
                stdout: String::from_utf8_lossy(&out).into_owned(),
                stderr: String::from_utf8_lossy(&err).into_owned(),
                exit_code: status.code(),
                success: status.success(),
                elapsed: started.elapsed(),
            }),
            Ok(Err(e)) => Err(StepError::Io(e)),
            Err(_) => {
                warn!(program, ?limit, "interpreter timed out, killing process group");
                kill_process_tree(&mut child).await;
                Err(StepError::StepTimeout(limit.as_secs()))
            }
        }
    }
}

async fn kill_process_tree(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!(pid, error = %e, "killpg failed, falling back to direct kill");
        }
    }
    if let Err(e) = child.kill().await {
        debug!(error = %e, "child already gone");
    }
}

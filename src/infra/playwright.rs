use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::domain::run::RunOptions;
use crate::error::{AppError, AppResult};
use crate::services::{RunnerOutput, TestRunnerService};

/// How long output is still collected once the runner itself has exited.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Launches `playwright test` as a child process in the project directory.
pub struct PlaywrightCli {
    program: String,
    prefix_args: Vec<String>,
    workdir: PathBuf,
    running: Mutex<HashMap<String, oneshot::Sender<()>>>,
}

impl PlaywrightCli {
    pub fn new(program: String, prefix_args: Vec<String>, workdir: PathBuf) -> Self {
        Self {
            program,
            prefix_args,
            workdir,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Splits a configured launcher such as `npx` or `pnpm exec` into program and arguments.
    pub fn from_command_line(command_line: &str, workdir: PathBuf) -> AppResult<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| {
            AppError::Configuration("test runner command must not be empty".to_string())
        })?;
        Ok(Self::new(program, parts.collect(), workdir))
    }

    fn command(&self, options: &RunOptions) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .args(options.runner_args())
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // own process group, so cancelling also reaches node under npx
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

#[cfg(unix)]
async fn stop(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(err) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            tracing::warn!(pid, error = %err, "failed to kill runner process group");
            return child.kill().await;
        }
    }
    child.wait().await.map(|_| ())
}

#[cfg(not(unix))]
async fn stop(child: &mut Child) -> std::io::Result<()> {
    child.kill().await
}

fn drain<R>(reader: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        if let Some(mut reader) = reader {
            if let Err(err) = reader.read_to_end(&mut buffer).await {
                tracing::warn!(error = %err, "failed to read runner output");
            }
        }
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

/// Output of a drain task. Gives up when something else still holds the pipe open.
async fn collect(mut handle: JoinHandle<String>) -> String {
    match tokio::time::timeout(DRAIN_GRACE, &mut handle).await {
        Ok(output) => output.unwrap_or_default(),
        Err(_) => {
            handle.abort();
            tracing::warn!("runner output still open after exit, discarding the rest");
            String::new()
        }
    }
}

#[async_trait]
impl TestRunnerService for PlaywrightCli {
    async fn run(&self, run_id: &str, options: &RunOptions) -> AppResult<RunnerOutput> {
        options.validate()?;
        let mut child = self.command(options).spawn().map_err(|err| {
            AppError::TestRunner(format!("failed to start {}: {err}", self.program))
        })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.running.lock().insert(run_id.to_string(), cancel_tx);

        let waited = tokio::select! {
            status = child.wait() => status.map(Some),
            _ = cancel_rx => {
                tracing::info!(run_id, "stopping test runner");
                stop(&mut child).await.map(|_| None)
            }
        };
        self.running.lock().remove(run_id);

        let exit_code = match waited {
            Ok(Some(status)) => status.code(),
            Ok(None) => None,
            Err(err) => {
                return Err(AppError::TestRunner(format!(
                    "failed to wait for test runner: {err}"
                )));
            }
        };

        let stdout = collect(stdout).await;
        let stderr = collect(stderr).await;

        Ok(RunnerOutput {
            exit_code,
            stdout,
            stderr,
        })
    }

    async fn cancel_all(&self) {
        let senders: Vec<_> = self.running.lock().drain().collect();
        for (run_id, sender) in senders {
            tracing::info!(run_id = %run_id, "cancelling test run");
            let _ = sender.send(());
        }
    }
}

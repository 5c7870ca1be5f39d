use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use super::models::{JobHandle, JobOutcome, Side};
use crate::schema::SchemaConfig;

/// Default per-job timeout for the process executor.
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 900;

/// Default review command.
pub const DEFAULT_REVIEW_CMD: &str = "review-runner";

/// Bytes of stderr kept in a failure reason.
const STDERR_TAIL_BYTES: usize = 2000;

/// One review job to run: a schema reviewing a project.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRequest {
    pub handle: JobHandle,
    pub project_id: i64,
    pub side: Side,
    pub schema: SchemaConfig,
}

/// Completion signal for a dispatched job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobCompletion {
    pub handle: JobHandle,
    pub outcome: JobOutcome,
}

/// Abstraction over whatever actually runs reviews.
/// Real implementation: `ProcessReviewExecutor`. Test double: `RecordingExecutor`.
///
/// `dispatch` returns once the job is accepted; the result arrives later as a
/// [`JobCompletion`] routed by handle. An `Err` from `dispatch` means the job
/// was rejected and will never complete.
#[async_trait]
pub trait ReviewExecutor: Send + Sync {
    async fn dispatch(&self, request: ReviewRequest) -> Result<()>;

    /// Best-effort: stop a job whose result is no longer wanted.
    async fn cancel(&self, handle: &JobHandle);
}

/// Configuration for [`ProcessReviewExecutor`].
#[derive(Debug, Clone)]
pub struct ProcessExecutorConfig {
    pub review_cmd: String,
    pub args: Vec<String>,
    pub job_timeout: Duration,
    pub working_dir: Option<PathBuf>,
}

impl Default for ProcessExecutorConfig {
    fn default() -> Self {
        Self {
            review_cmd: DEFAULT_REVIEW_CMD.to_string(),
            args: Vec::new(),
            job_timeout: Duration::from_secs(DEFAULT_JOB_TIMEOUT_SECS),
            working_dir: None,
        }
    }
}

/// Runs each review as a child process.
///
/// The child gets `ARENA_PROJECT_ID`, `ARENA_JOB_HANDLE`, `ARENA_SIDE` and
/// `ARENA_SCHEMA_JSON` in its environment. The last stdout line that parses as
/// `{"issue_count": N}` is the result. A non-zero exit is a failure carrying
/// the tail of stderr; running past the timeout kills the child.
pub struct ProcessReviewExecutor {
    config: ProcessExecutorConfig,
    completions: mpsc::UnboundedSender<JobCompletion>,
    running: Arc<Mutex<HashMap<JobHandle, tokio::task::JoinHandle<()>>>>,
}

impl ProcessReviewExecutor {
    /// Create the executor and the receiving end of its completion channel.
    pub fn new(config: ProcessExecutorConfig) -> (Self, mpsc::UnboundedReceiver<JobCompletion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let executor = Self {
            config,
            completions: tx,
            running: Arc::new(Mutex::new(HashMap::new())),
        };
        (executor, rx)
    }

    fn command(&self, request: &ReviewRequest) -> Result<Command> {
        let schema_json =
            serde_json::to_string(&request.schema).context("Failed to encode schema for review job")?;
        let mut cmd = Command::new(&self.config.review_cmd);
        cmd.args(&self.config.args)
            .env("ARENA_PROJECT_ID", request.project_id.to_string())
            .env("ARENA_JOB_HANDLE", request.handle.as_str())
            .env("ARENA_SIDE", request.side.as_str())
            .env("ARENA_SCHEMA_JSON", schema_json)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.config.working_dir {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }
}

#[async_trait]
impl ReviewExecutor for ProcessReviewExecutor {
    async fn dispatch(&self, request: ReviewRequest) -> Result<()> {
        let child = self.command(&request)?.spawn().with_context(|| {
            format!("Failed to spawn review command '{}'", self.config.review_cmd)
        })?;

        let handle = request.handle.clone();
        let timeout = self.config.job_timeout;
        let completions = self.completions.clone();
        let running = self.running.clone();

        // Hold the map lock across spawn+insert so a fast job's self-removal
        // cannot run before its insert.
        let mut guard = self.running.lock().await;
        let task_handle = handle.clone();
        let task = tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Err(_) => JobOutcome::TimedOut,
                Ok(Err(e)) => JobOutcome::Failed {
                    reason: format!("failed to wait for review process: {}", e),
                },
                Ok(Ok(output)) => outcome_from_output(
                    output.status.success(),
                    output.status.code(),
                    &String::from_utf8_lossy(&output.stdout),
                    &String::from_utf8_lossy(&output.stderr),
                ),
            };
            debug!(job = %task_handle, ?outcome, "Review process finished");
            running.lock().await.remove(&task_handle);
            if completions
                .send(JobCompletion {
                    handle: task_handle.clone(),
                    outcome,
                })
                .is_err()
            {
                warn!(job = %task_handle, "Completion channel closed; dropping review result");
            }
        });
        guard.insert(handle, task);
        Ok(())
    }

    async fn cancel(&self, handle: &JobHandle) {
        if let Some(task) = self.running.lock().await.remove(handle) {
            // Aborting drops the child, and kill_on_drop reaps it.
            task.abort();
            debug!(job = %handle, "Review job cancelled");
        }
    }
}

#[derive(Deserialize)]
struct ResultLine {
    issue_count: u32,
}

/// Map a finished process to a job outcome.
fn outcome_from_output(success: bool, code: Option<i32>, stdout: &str, stderr: &str) -> JobOutcome {
    if !success {
        let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
        let tail = stderr_tail(stderr);
        let reason = if tail.is_empty() {
            format!("review process exited with {}", code)
        } else {
            format!("review process exited with {}: {}", code, tail)
        };
        return JobOutcome::Failed { reason };
    }
    match parse_result_line(stdout) {
        Some(issue_count) => JobOutcome::Succeeded { issue_count },
        None => JobOutcome::Failed {
            reason: "review process printed no {\"issue_count\": N} line".to_string(),
        },
    }
}

/// Issue count from the last stdout line shaped like `{"issue_count": N}`.
fn parse_result_line(stdout: &str) -> Option<u32> {
    stdout
        .lines()
        .rev()
        .filter_map(|line| serde_json::from_str::<ResultLine>(line.trim()).ok())
        .map(|r| r.issue_count)
        .next()
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

/// Test double that records requests and can reject chosen sides.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingExecutor {
    pub dispatched: std::sync::Mutex<Vec<ReviewRequest>>,
    pub cancelled: std::sync::Mutex<Vec<JobHandle>>,
    pub reject: std::sync::Mutex<HashMap<Side, String>>,
}

#[cfg(test)]
impl RecordingExecutor {
    pub fn rejecting(side: Side, reason: &str) -> Self {
        let executor = Self::default();
        executor
            .reject
            .lock()
            .unwrap()
            .insert(side, reason.to_string());
        executor
    }

    pub fn handle_for(&self, side: Side) -> Option<JobHandle> {
        self.dispatched
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.side == side)
            .map(|r| r.handle.clone())
    }
}

#[cfg(test)]
#[async_trait]
impl ReviewExecutor for RecordingExecutor {
    async fn dispatch(&self, request: ReviewRequest) -> Result<()> {
        if let Some(reason) = self.reject.lock().unwrap().get(&request.side) {
            anyhow::bail!("{}", reason);
        }
        self.dispatched.lock().unwrap().push(request);
        Ok(())
    }

    async fn cancel(&self, handle: &JobHandle) {
        self.cancelled.lock().unwrap().push(handle.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AgentConfig;

    fn request(side: Side) -> ReviewRequest {
        ReviewRequest {
            handle: JobHandle::generate(),
            project_id: 12,
            side,
            schema: SchemaConfig::new().with_role("general", AgentConfig::new("openai", "gpt-4o")),
        }
    }

    fn sh(script: &str, timeout: Duration) -> ProcessExecutorConfig {
        ProcessExecutorConfig {
            review_cmd: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            job_timeout: timeout,
            working_dir: None,
        }
    }

    #[test]
    fn test_parse_result_line_takes_last_match() {
        let stdout = "starting\n{\"issue_count\": 2}\nnoise\n{\"issue_count\": 5}\ndone\n";
        assert_eq!(parse_result_line(stdout), Some(5));
        assert_eq!(parse_result_line("no json here"), None);
        assert_eq!(parse_result_line("{\"other\": 1}"), None);
    }

    #[test]
    fn test_outcome_from_failed_exit_carries_stderr() {
        let outcome = outcome_from_output(false, Some(3), "", "model not found\n");
        match outcome {
            JobOutcome::Failed { reason } => {
                assert!(reason.contains("exited with 3"));
                assert!(reason.contains("model not found"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_outcome_without_result_line_is_failure() {
        assert!(!outcome_from_output(true, Some(0), "ok\n", "").is_success());
        assert_eq!(
            outcome_from_output(true, Some(0), "{\"issue_count\": 0}\n", ""),
            JobOutcome::Succeeded { issue_count: 0 }
        );
    }

    #[test]
    fn test_stderr_tail_truncates_on_char_boundary() {
        let long = "é".repeat(STDERR_TAIL_BYTES);
        let tail = stderr_tail(&long);
        assert!(tail.starts_with("..."));
        assert!(tail.len() <= STDERR_TAIL_BYTES + 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_executor_reports_issue_count() -> Result<()> {
        let script = r#"echo "side=$ARENA_SIDE project=$ARENA_PROJECT_ID"; echo '{"issue_count": 7}'"#;
        let (executor, mut rx) = ProcessReviewExecutor::new(sh(script, Duration::from_secs(10)));
        let req = request(Side::A);
        executor.dispatch(req.clone()).await?;

        let completion = rx.recv().await.context("channel closed")?;
        assert_eq!(completion.handle, req.handle);
        assert_eq!(completion.outcome, JobOutcome::Succeeded { issue_count: 7 });
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_executor_passes_schema_env() -> Result<()> {
        let script = r#"case "$ARENA_SCHEMA_JSON" in *gpt-4o*) echo '{"issue_count": 1}';; *) exit 4;; esac"#;
        let (executor, mut rx) = ProcessReviewExecutor::new(sh(script, Duration::from_secs(10)));
        executor.dispatch(request(Side::B)).await?;
        let completion = rx.recv().await.context("channel closed")?;
        assert_eq!(completion.outcome, JobOutcome::Succeeded { issue_count: 1 });
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_executor_nonzero_exit_fails() -> Result<()> {
        let (executor, mut rx) =
            ProcessReviewExecutor::new(sh("echo rate limited >&2; exit 2", Duration::from_secs(10)));
        executor.dispatch(request(Side::A)).await?;
        let completion = rx.recv().await.context("channel closed")?;
        assert!(completion.outcome.failure_reason().unwrap().contains("rate limited"));
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_executor_times_out() -> Result<()> {
        let (executor, mut rx) =
            ProcessReviewExecutor::new(sh("sleep 5", Duration::from_millis(100)));
        executor.dispatch(request(Side::A)).await?;
        let completion = rx.recv().await.context("channel closed")?;
        assert_eq!(completion.outcome, JobOutcome::TimedOut);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_command_is_rejected_at_dispatch() {
        let config = ProcessExecutorConfig {
            review_cmd: "definitely-not-a-review-runner-binary".to_string(),
            ..ProcessExecutorConfig::default()
        };
        let (executor, _rx) = ProcessReviewExecutor::new(config);
        assert!(executor.dispatch(request(Side::A)).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_stops_job_without_completion() -> Result<()> {
        let (executor, mut rx) = ProcessReviewExecutor::new(sh("sleep 5", Duration::from_secs(30)));
        let req = request(Side::A);
        executor.dispatch(req.clone()).await?;
        executor.cancel(&req.handle).await;

        let waited = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(waited.is_err(), "cancelled job must not report a completion");
        Ok(())
    }
}

//! Two-tier watcher over the ELF coordination directory.
//!
//! Each pass asks a model to review coordination state using a prompt
//! produced by the external watcher loop script. Responses that report an
//! error, stale or complete state are escalated to a handler prompt.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::exec::{CommandSpec, run_command_full};
use crate::jobs::JobError;
use crate::paths::ElfPaths;

pub const MODEL_ENV: &str = "OPENCODE_WATCHER_MODEL";
pub const INTERVAL_ENV: &str = "OPENCODE_WATCHER_INTERVAL";
pub const DEFAULT_MODEL: &str = "opencode/big-pickle";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const MODEL_TIMEOUT: Duration = Duration::from_secs(300);

const LOG_EXCERPT_CHARS: usize = 200;
const HANDLER_TRIGGERS: [&str; 3] = ["STATUS: error", "STATUS: stale", "STATUS: complete"];

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("watcher prompt script failed: {0}")]
    Prompt(#[source] JobError),
    #[error("opencode request timed out (>{}s)", .0.as_secs())]
    Timeout(Duration),
    #[error("opencode CLI not found. Install with: npm install -g opencode")]
    NotFound,
    #[error("opencode returned error code {}\n{stderr}", .code.map_or_else(|| "none".to_string(), |code| code.to_string()))]
    ModelExit { code: Option<i32>, stderr: String },
    #[error("error calling opencode: {0}")]
    Model(#[source] io::Error),
    #[error("failed to write watcher log {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Watcher,
    Handler,
}

impl PromptKind {
    #[must_use]
    pub const fn as_arg(self) -> &'static str {
        match self {
            Self::Watcher => "prompt",
            Self::Handler => "handler-prompt",
        }
    }
}

/// Produces the prompt text for a tier.
pub type PromptFn = Arc<dyn Fn(PromptKind) -> BoxFuture<'static, Result<String, WatcherError>> + Send + Sync>;
/// Sends `(model, prompt)` to a model and returns its response.
pub type ModelFn =
    Arc<dyn Fn(String, String) -> BoxFuture<'static, Result<String, WatcherError>> + Send + Sync>;

/// Outcome of a single monitoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Continue,
    Stop,
    Escalated,
    Failed,
}

impl PassOutcome {
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Continue | Self::Stop => 0,
            Self::Escalated => 1,
            Self::Failed => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub model: String,
    pub interval: Duration,
    pub once: bool,
    pub log_path: PathBuf,
    pub stop_file: PathBuf,
}

impl WatcherConfig {
    #[must_use]
    pub fn new(paths: &ElfPaths) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            interval: DEFAULT_INTERVAL,
            once: false,
            log_path: paths.watcher_log(),
            stop_file: paths.watcher_stop_file(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: Option<&str>) -> Self {
        self.model = resolve_model(model);
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Option<&str>) -> Self {
        self.interval = parse_interval(interval);
        self
    }

    #[must_use]
    pub const fn with_once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }
}

#[must_use]
pub fn resolve_model(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_MODEL)
        .to_string()
}

/// Parses an interval in whole seconds; anything unusable falls back to the default.
#[must_use]
pub fn parse_interval(value: Option<&str>) -> Duration {
    value
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map_or(DEFAULT_INTERVAL, Duration::from_secs)
}

/// True when a response line reports `STATUS: complete` or `STATUS: stopped`.
#[must_use]
pub fn response_requests_stop(response: &str) -> bool {
    response.lines().any(|line| {
        let line = line.trim();
        let Some((head, status)) = line.split_once(':') else {
            return false;
        };
        head.trim().eq_ignore_ascii_case("STATUS")
            && matches!(status.trim().to_ascii_lowercase().as_str(), "complete" | "stopped")
    })
}

#[must_use]
pub fn needs_handler(response: &str) -> bool {
    HANDLER_TRIGGERS.iter().any(|marker| response.contains(marker))
}

/// Runs the watcher loop script to obtain prompts.
#[must_use]
pub fn script_prompts(python: impl Into<OsString>, script: PathBuf) -> PromptFn {
    let python = python.into();
    Arc::new(move |kind: PromptKind| {
        let spec = CommandSpec::new(python.clone()).arg(script.clone()).arg(kind.as_arg());
        async move {
            let output = run_command_full(spec).await.map_err(WatcherError::Prompt)?;
            Ok::<_, WatcherError>(output.stdout.trim().to_string())
        }
        .boxed()
    })
}

/// Calls the opencode CLI as `<program> --model <model> --prompt <prompt>`.
#[must_use]
pub fn opencode_model(program: impl Into<OsString>, timeout: Duration) -> ModelFn {
    let program = program.into();
    Arc::new(move |model: String, prompt: String| {
        let spec = CommandSpec::new(program.clone())
            .args(["--model", model.as_str(), "--prompt", prompt.as_str()]);
        async move {
            let output = tokio::time::timeout(timeout, run_command_full(spec))
                .await
                .map_err(|_| WatcherError::Timeout(timeout))?
                .map_err(map_model_error)?;
            Ok::<_, WatcherError>(output.stdout)
        }
        .boxed()
    })
}

fn map_model_error(err: JobError) -> WatcherError {
    match err {
        JobError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound => {
            WatcherError::NotFound
        }
        JobError::Spawn { source, .. } => WatcherError::Model(source),
        JobError::ExitStatus { code, stderr, .. } => WatcherError::ModelExit { code, stderr },
        JobError::Failed(message) => WatcherError::Model(io::Error::other(message)),
    }
}

/// Watcher loop over a prompt source and a model client.
pub struct Watcher {
    config: WatcherConfig,
    prompts: PromptFn,
    model: ModelFn,
}

impl Watcher {
    #[must_use]
    pub fn new(config: WatcherConfig, prompts: PromptFn, model: ModelFn) -> Self {
        Self {
            config,
            prompts,
            model,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &WatcherConfig {
        &self.config
    }

    fn stop_requested(&self) -> bool {
        self.config.stop_file.exists()
    }

    /// Runs one monitoring pass, escalating to the handler when needed.
    ///
    /// # Errors
    /// Returns an error when a prompt cannot be produced or the log cannot be
    /// written. Model failures are logged and reported as `PassOutcome::Failed`.
    pub async fn run_single_pass(&self) -> Result<PassOutcome, WatcherError> {
        info!("[WATCHER] Fetching prompt...");
        let prompt = (self.prompts)(PromptKind::Watcher).await?;
        info!(model = %self.config.model, "[WATCHER] Sending to model...");

        let response = match (self.model)(self.config.model.clone(), prompt).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "watcher model call failed");
                self.append_log(&format!("[TIER 1 ERROR] {err}")).await?;
                return Ok(PassOutcome::Failed);
            }
        };

        println!("{response}");
        self.append_log(&format!("[TIER 1 WATCHER] {}", excerpt(&response)))
            .await?;

        if self.stop_requested() || response_requests_stop(&response) {
            return Ok(PassOutcome::Stop);
        }
        if !needs_handler(&response) {
            return Ok(PassOutcome::Continue);
        }

        info!("[HANDLER] Escalating to handler (Tier 2)...");
        let handler_prompt = (self.prompts)(PromptKind::Handler).await?;
        let handler_response = match (self.model)(self.config.model.clone(), handler_prompt).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "handler model call failed");
                self.append_log(&format!("[TIER 2 ERROR] {err}")).await?;
                return Ok(PassOutcome::Failed);
            }
        };

        println!("\n{handler_response}");
        self.append_log(&format!("[TIER 2 HANDLER] {}", excerpt(&handler_response)))
            .await?;

        if handler_response.contains("ESCALATE") {
            Ok(PassOutcome::Escalated)
        } else {
            Ok(PassOutcome::Continue)
        }
    }

    /// Loops until a stop is requested, a pass ends non-zero, or after one
    /// pass in `once` mode. Returns the process exit code.
    ///
    /// # Errors
    /// Propagates errors from [`Self::run_single_pass`].
    pub async fn run(&self) -> Result<i32, WatcherError> {
        info!(
            model = %self.config.model,
            interval_secs = self.config.interval.as_secs(),
            "starting watcher"
        );

        loop {
            if self.stop_requested() {
                info!("stop file detected, exiting");
                return Ok(0);
            }

            let outcome = self.run_single_pass().await?;
            if outcome == PassOutcome::Stop || outcome.exit_code() != 0 || self.config.once {
                return Ok(outcome.exit_code());
            }

            info!(secs = self.config.interval.as_secs(), "sleeping");
            tokio::time::sleep(self.config.interval).await;
        }
    }

    async fn append_log(&self, text: &str) -> Result<(), WatcherError> {
        append_line(&self.config.log_path, text).await
    }
}

async fn append_line(path: &Path, text: &str) -> Result<(), WatcherError> {
    let log_err = |source: io::Error| WatcherError::Log {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(log_err)?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(log_err)?;
    file.write_all(format!("{text}\n").as_bytes())
        .await
        .map_err(log_err)?;
    file.flush().await.map_err(log_err)
}

fn excerpt(text: &str) -> String {
    text.chars().take(LOG_EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fixed_prompts() -> PromptFn {
        Arc::new(|kind: PromptKind| async move { Ok::<_, WatcherError>(kind.as_arg().to_string()) }.boxed())
    }

    fn scripted_model(responses: Vec<Result<&str, &str>>, calls: Arc<AtomicUsize>) -> ModelFn {
        let queue: VecDeque<Result<String, String>> = responses
            .into_iter()
            .map(|response| response.map(str::to_string).map_err(str::to_string))
            .collect();
        let queue = Arc::new(Mutex::new(queue));
        Arc::new(move |_model: String, _prompt: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            let next = queue
                .lock()
                .expect("queue lock")
                .pop_front()
                .unwrap_or_else(|| Err("no scripted response".to_string()));
            async move {
                next.map_err(|stderr| WatcherError::ModelExit {
                    code: Some(1),
                    stderr,
                })
            }
            .boxed()
        })
    }

    fn watcher(root: &Path, responses: Vec<Result<&str, &str>>) -> (Watcher, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = WatcherConfig::new(&ElfPaths::new(root)).with_once(true);
        let watcher = Watcher::new(config, fixed_prompts(), scripted_model(responses, calls.clone()));
        (watcher, calls)
    }

    fn read_log(watcher: &Watcher) -> String {
        std::fs::read_to_string(&watcher.config().log_path).unwrap_or_default()
    }

    #[test]
    fn interval_falls_back_on_bad_input() {
        assert_eq!(parse_interval(None), DEFAULT_INTERVAL);
        assert_eq!(parse_interval(Some("abc")), DEFAULT_INTERVAL);
        assert_eq!(parse_interval(Some("-5")), DEFAULT_INTERVAL);
        assert_eq!(parse_interval(Some(" 45 ")), Duration::from_secs(45));
    }

    #[test]
    fn model_falls_back_when_blank() {
        assert_eq!(resolve_model(None), DEFAULT_MODEL);
        assert_eq!(resolve_model(Some("  ")), DEFAULT_MODEL);
        assert_eq!(resolve_model(Some("anthropic/sonnet")), "anthropic/sonnet");
    }

    #[test]
    fn detects_stop_status_lines() {
        assert!(response_requests_stop("summary\n  status: Complete\n"));
        assert!(response_requests_stop("STATUS: stopped"));
        assert!(!response_requests_stop("STATUS: running"));
        assert!(!response_requests_stop("nothing to report"));
    }

    #[test]
    fn handler_triggers() {
        assert!(needs_handler("STATUS: stale agents found"));
        assert!(!needs_handler("status: error"));
    }

    #[tokio::test]
    async fn healthy_pass_continues_and_logs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (watcher, calls) = watcher(dir.path(), vec![Ok("STATUS: ok")]);

        let outcome = watcher.run_single_pass().await.expect("pass");

        assert_eq!(outcome, PassOutcome::Continue);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(read_log(&watcher), "[TIER 1 WATCHER] STATUS: ok\n");
    }

    #[tokio::test]
    async fn escalates_when_handler_says_so() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (watcher, calls) = watcher(
            dir.path(),
            vec![Ok("STATUS: error in agent 3"), Ok("ACTION: ESCALATE to human")],
        );

        let outcome = watcher.run_single_pass().await.expect("pass");

        assert_eq!(outcome, PassOutcome::Escalated);
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(read_log(&watcher).contains("[TIER 2 HANDLER] ACTION: ESCALATE to human"));
    }

    #[tokio::test]
    async fn model_failure_fails_the_pass() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (watcher, _) = watcher(dir.path(), vec![Err("rate limited")]);

        let outcome = watcher.run_single_pass().await.expect("pass");

        assert_eq!(outcome.exit_code(), 2);
        assert!(read_log(&watcher).starts_with("[TIER 1 ERROR] opencode returned error code 1"));
    }

    #[tokio::test]
    async fn log_excerpt_is_truncated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let long = "x".repeat(500);
        let (watcher, _) = watcher(dir.path(), vec![Ok(long.as_str())]);

        watcher.run_single_pass().await.expect("pass");

        let log = read_log(&watcher);
        assert_eq!(log.trim_end().len(), "[TIER 1 WATCHER] ".len() + LOG_EXCERPT_CHARS);
    }

    #[tokio::test]
    async fn stop_file_ends_the_loop_before_any_call() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (watcher, calls) = watcher(dir.path(), vec![]);
        std::fs::create_dir_all(dir.path().join(".coordination")).expect("coordination dir");
        std::fs::write(&watcher.config().stop_file, "").expect("stop file");

        let code = watcher.run().await.expect("run");

        assert_eq!(code, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_status_ends_the_loop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let calls = Arc::new(AtomicUsize::new(0));
        let config = WatcherConfig::new(&ElfPaths::new(dir.path()))
            .with_interval(Some("0"));
        let watcher = Watcher::new(
            config,
            fixed_prompts(),
            scripted_model(vec![Ok("STATUS: ok"), Ok("STATUS: stopped")], calls.clone()),
        );

        let code = watcher.run().await.expect("run");

        assert_eq!(code, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn opencode_model_maps_missing_binary() {
        let model = opencode_model("elf-definitely-not-installed", MODEL_TIMEOUT);
        let err = model("m".to_string(), "p".to_string()).await.expect_err("missing");
        assert!(matches!(err, WatcherError::NotFound));
    }
}

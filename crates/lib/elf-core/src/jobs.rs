use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{RwLock, watch};
use tracing::{error, info};
use uuid::Uuid;

/// Future driving a single background job.
pub type JobFuture = BoxFuture<'static, Result<JobOutput, JobError>>;

/// Output of a job that completed successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error(
        "{program} exited with {}: {stderr}",
        .code.map_or_else(|| "no status".to_string(), |code| format!("status {code}"))
    )]
    ExitStatus {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{0}")]
    Failed(String),
}

impl JobError {
    const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExitStatus { code, .. } => *code,
            Self::Spawn { .. } | Self::Failed(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("job capacity reached (max {max} running)")]
    CapacityReached { max: usize },
}

/// Which tool produced a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Query,
    Swarm,
    Checkin,
}

impl JobKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Swarm => "swarm",
            Self::Checkin => "checkin",
        }
    }

    const fn log_tag(self) -> &'static str {
        match self {
            Self::Query => "[QUERY]",
            Self::Swarm => "[SWARM]",
            Self::Checkin => "[CHECKIN]",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Succeeded,
    Failed,
}

/// Handle returned to callers when work is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTicket {
    pub id: Uuid,
    pub kind: JobKind,
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub kind: JobKind,
    pub label: String,
    pub state: JobState,
    pub exit_code: Option<i32>,
    pub detail: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Configuration for job retention and concurrency.
#[derive(Debug, Clone)]
pub struct JobRegistryConfig {
    pub ttl: Option<Duration>,
    pub sweep_interval: Duration,
    pub max_running: Option<usize>,
}

impl JobRegistryConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ttl: None,
            sweep_interval: Duration::from_secs(60),
            max_running: None,
        }
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub const fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    #[must_use]
    pub const fn with_max_running(mut self, max_running: usize) -> Self {
        self.max_running = Some(max_running);
        self
    }
}

impl Default for JobRegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of background jobs started by the dispatch tools.
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<JobRegistryInner>,
}

/// Internal registry state shared across clones.
struct JobRegistryInner {
    entries: RwLock<HashMap<Uuid, Arc<JobEntry>>>,
    config: JobRegistryConfig,
}

#[derive(Debug, Clone)]
struct JobStatus {
    state: JobState,
    exit_code: Option<i32>,
    detail: Option<String>,
    finished_at: Option<DateTime<Utc>>,
    finished_mono: Option<Instant>,
}

impl JobStatus {
    const fn running() -> Self {
        Self {
            state: JobState::Running,
            exit_code: None,
            detail: None,
            finished_at: None,
            finished_mono: None,
        }
    }
}

struct JobEntry {
    id: Uuid,
    kind: JobKind,
    label: String,
    started_at: DateTime<Utc>,
    status: watch::Sender<JobStatus>,
}

impl JobEntry {
    fn new(kind: JobKind, label: String) -> Self {
        let (status, _) = watch::channel(JobStatus::running());
        Self {
            id: Uuid::new_v4(),
            kind,
            label,
            started_at: Utc::now(),
            status,
        }
    }

    fn is_running(&self) -> bool {
        self.status.borrow().state == JobState::Running
    }

    fn finished_for(&self, now: Instant) -> Option<Duration> {
        self.status
            .borrow()
            .finished_mono
            .map(|finished| now.saturating_duration_since(finished))
    }

    fn finish(&self, outcome: Result<JobOutput, JobError>) {
        let tag = self.kind.log_tag();
        let status = match outcome {
            Ok(output) => {
                info!(job = %self.id, label = %self.label, "{tag} {} complete", self.label);
                JobStatus {
                    state: JobState::Succeeded,
                    exit_code: output.exit_code,
                    detail: Some(output.stdout).filter(|stdout| !stdout.is_empty()),
                    finished_at: Some(Utc::now()),
                    finished_mono: Some(Instant::now()),
                }
            }
            Err(err) => {
                error!(job = %self.id, label = %self.label, "{tag} {} failed: {err}", self.label);
                JobStatus {
                    state: JobState::Failed,
                    exit_code: err.exit_code(),
                    detail: Some(err.to_string()),
                    finished_at: Some(Utc::now()),
                    finished_mono: Some(Instant::now()),
                }
            }
        };
        self.status.send_replace(status);
    }

    fn snapshot(&self) -> JobSnapshot {
        let status = self.status.borrow().clone();
        JobSnapshot {
            id: self.id,
            kind: self.kind,
            label: self.label.clone(),
            state: status.state,
            exit_code: status.exit_code,
            detail: status.detail,
            started_at: self.started_at,
            finished_at: status.finished_at,
        }
    }
}

impl JobRegistry {
    #[must_use]
    pub fn new(config: JobRegistryConfig) -> Self {
        Self {
            inner: Arc::new(JobRegistryInner {
                entries: RwLock::new(HashMap::new()),
                config,
            }),
        }
    }

    /// Starts `job` in the background and returns its ticket immediately.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns `DispatchError::CapacityReached` when the running-job cap is hit.
    pub async fn dispatch(
        &self,
        kind: JobKind,
        label: impl Into<String>,
        job: JobFuture,
    ) -> Result<JobTicket, DispatchError> {
        let entry = {
            let mut map = self.inner.entries.write().await;
            if let Some(max) = self.inner.config.max_running {
                let running = map.values().filter(|entry| entry.is_running()).count();
                if running >= max {
                    return Err(DispatchError::CapacityReached { max });
                }
            }
            let entry = Arc::new(JobEntry::new(kind, label.into()));
            map.insert(entry.id, entry.clone());
            entry
        };

        info!(job = %entry.id, kind = %kind, label = %entry.label, "job dispatched");
        let ticket = JobTicket { id: entry.id, kind };
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(job)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(JobError::Failed(format!("job panicked: {}", panic_message(&*panic))))
                });
            entry.finish(outcome);
        });
        Ok(ticket)
    }

    pub async fn status(&self, id: Uuid) -> Option<JobSnapshot> {
        self.entry(id).await.map(|entry| entry.snapshot())
    }

    /// Lists all retained jobs, oldest first.
    pub async fn list(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self
            .inner
            .entries
            .read()
            .await
            .values()
            .map(|entry| entry.snapshot())
            .collect();
        jobs.sort_by_key(|job| job.started_at);
        jobs
    }

    /// Waits until the job leaves the running state.
    pub async fn wait(&self, id: Uuid) -> Option<JobSnapshot> {
        let entry = self.entry(id).await?;
        let mut rx = entry.status.subscribe();
        let _ = rx.wait_for(|status| status.state != JobState::Running).await;
        Some(entry.snapshot())
    }

    /// Drops finished jobs older than the configured TTL.
    pub async fn evict_finished(&self) -> usize {
        let Some(ttl) = self.inner.config.ttl else {
            return 0;
        };
        let now = Instant::now();
        let mut map = self.inner.entries.write().await;
        let before = map.len();
        map.retain(|_, entry| entry.finished_for(now).is_none_or(|age| age <= ttl));
        before.saturating_sub(map.len())
    }

    #[must_use]
    pub fn spawn_sweeper(self) -> Option<tokio::task::JoinHandle<()>> {
        let _ttl = self.inner.config.ttl?;
        let interval = self.inner.config.sweep_interval;
        let registry = self;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let _ = registry.evict_finished().await;
            }
        }))
    }

    async fn entry(&self, id: Uuid) -> Option<Arc<JobEntry>> {
        self.inner.entries.read().await.get(&id).cloned()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(JobRegistryConfig::default())
    }
}

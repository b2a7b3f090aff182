use std::ffi::OsString;
use std::fmt;

use thiserror::Error;

use crate::jobs::{DispatchError, JobRegistry, JobTicket};
use crate::paths::ElfPaths;

pub mod checkin;
pub mod query;
pub mod swarm;

pub use checkin::CheckinAck;
pub use query::{QueryAck, QueryRequest, QueryType};
pub use swarm::{SwarmAck, SwarmAgent, SwarmMode, SwarmRequest, SwarmRunFn, command_swarm_runner};

pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_NODE: &str = "node";

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Task description must be at least {min} characters")]
    TaskTooShort { min: usize },
    #[error("unknown {field}: {value}")]
    UnknownVariant { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Entry point for the dispatch tools.
///
/// Holds the resolved ELF paths, the interpreter used for the query engine,
/// the swarm runner and the registry that tracks every detached job.
#[derive(Clone)]
pub struct ElfControlPlane {
    paths: ElfPaths,
    python: OsString,
    swarm: SwarmRunFn,
    jobs: JobRegistry,
}

impl ElfControlPlane {
    #[must_use]
    pub fn new(paths: ElfPaths, jobs: JobRegistry) -> Self {
        let swarm = command_swarm_runner(DEFAULT_NODE, paths.swarm_orchestrator());
        Self {
            paths,
            python: OsString::from(DEFAULT_PYTHON),
            swarm,
            jobs,
        }
    }

    #[must_use]
    pub fn with_python(mut self, python: impl Into<OsString>) -> Self {
        self.python = python.into();
        self
    }

    #[must_use]
    pub fn with_swarm_runner(mut self, swarm: SwarmRunFn) -> Self {
        self.swarm = swarm;
        self
    }

    #[must_use]
    pub const fn paths(&self) -> &ElfPaths {
        &self.paths
    }

    #[must_use]
    pub const fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }
}

impl fmt::Debug for ElfControlPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElfControlPlane")
            .field("paths", &self.paths)
            .field("python", &self.python)
            .finish_non_exhaustive()
    }
}

fn write_job_line(f: &mut fmt::Formatter<'_>, job: Option<&JobTicket>) -> fmt::Result {
    match job {
        Some(ticket) => write!(f, "\nJob: {} (poll with job_status)", ticket.id),
        None => Ok(()),
    }
}

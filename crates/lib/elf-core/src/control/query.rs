use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::exec::{CommandSpec, run_command};
use crate::jobs::{JobKind, JobTicket};

use super::{ControlError, ElfControlPlane, ValidationError, write_job_line};

/// Kind of lookup the ELF query engine performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Context,
    Domain,
    Learning,
    Decision,
    Rule,
}

impl QueryType {
    pub const ALL: [Self; 5] = [
        Self::Context,
        Self::Domain,
        Self::Learning,
        Self::Decision,
        Self::Rule,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Domain => "domain",
            Self::Learning => "learning",
            Self::Decision => "decision",
            Self::Rule => "rule",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| ValidationError::UnknownVariant {
                field: "query type",
                value: value.to_string(),
            })
    }
}

/// Input payload for the query tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query_type: QueryType,
    pub domain: Option<String>,
    pub limit: Option<String>,
}

impl QueryRequest {
    #[must_use]
    pub fn new(query_type: QueryType) -> Self {
        Self {
            query_type,
            domain: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = normalize(Some(domain.into()));
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: impl Into<String>) -> Self {
        self.limit = normalize(Some(limit.into()));
        self
    }

    /// Builds the query engine invocation, or `None` when the request
    /// selects nothing (a domain query without a domain).
    #[must_use]
    pub fn command(&self, python: &OsStr, script: &Path) -> Option<CommandSpec> {
        let base = CommandSpec::new(python).arg(script);
        let domain = normalize(self.domain.clone());
        let limit = normalize(self.limit.clone());

        let spec = match self.query_type {
            QueryType::Context => base.arg("--context"),
            QueryType::Domain => base.arg("--domain").arg(domain?),
            QueryType::Learning => base.arg("--learning"),
            QueryType::Decision => base.arg("--decision"),
            QueryType::Rule => base.arg("--rule"),
        };

        Some(match (self.query_type, limit) {
            (QueryType::Context, _) | (_, None) => spec,
            (_, Some(limit)) => spec.arg("--limit").arg(limit),
        })
    }
}

/// Acknowledgement returned by the query tool.
#[derive(Debug, Clone)]
pub struct QueryAck {
    pub query_type: QueryType,
    pub job: Option<JobTicket>,
}

impl fmt::Display for QueryAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "🚀 QUERY STARTED\n\nType: {}\nStatus: Executing in background...\n\nResults will be logged to the ELF system.",
            self.query_type
        )?;
        write_job_line(f, self.job.as_ref())
    }
}

impl ElfControlPlane {
    /// Starts an ELF query in the background.
    ///
    /// # Errors
    /// Returns `ControlError::Dispatch` when the job registry is at capacity.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryAck, ControlError> {
        let query_type = request.query_type;
        let Some(spec) = request.command(&self.python, &self.paths.query_script()) else {
            debug!(query_type = %query_type, "query selected nothing; skipping dispatch");
            return Ok(QueryAck {
                query_type,
                job: None,
            });
        };

        let ticket = self
            .jobs
            .dispatch(JobKind::Query, query_type.as_str(), run_command(spec).boxed())
            .await?;
        Ok(QueryAck {
            query_type,
            job: Some(ticket),
        })
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::exec::{CommandSpec, run_command};
use crate::jobs::{JobFuture, JobKind, JobTicket};

use super::{ControlError, ElfControlPlane, ValidationError, write_job_line};

pub const MIN_TASK_CHARS: usize = 10;

/// ES module evaluated by node: imports the orchestrator named by the first
/// argument and awaits `runSwarm(task, context, mode)` with the rest.
const RUN_SWARM_MODULE: &str = r#"const args = process.argv.slice(1);
if (args[0] === "--") args.shift();
const [script, task, context, mode] = args;
const { pathToFileURL } = await import("node:url");
const { runSwarm } = await import(pathToFileURL(script).href);
const result = await runSwarm(task, context, mode);
if (result !== undefined) {
  console.log(typeof result === "string" ? result : JSON.stringify(result));
}"#;

/// Orchestration routine invoked with a validated swarm request.
pub type SwarmRunFn = Arc<dyn Fn(SwarmRequest) -> JobFuture + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwarmAgent {
    Architect,
    Researcher,
    Skeptic,
    Creative,
    LearningExtractor,
}

impl SwarmAgent {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Architect => "Architect",
            Self::Researcher => "Researcher",
            Self::Skeptic => "Skeptic",
            Self::Creative => "Creative",
            Self::LearningExtractor => "Learning Extractor",
        }
    }

    #[must_use]
    pub const fn focus(self) -> &'static str {
        match self {
            Self::Architect => "System design, structure, and big picture",
            Self::Researcher => "Deep investigation and evidence gathering",
            Self::Skeptic => "Critical analysis and risk identification",
            Self::Creative => "Innovation and novel ideas",
            Self::LearningExtractor => "Meta-learning and knowledge synthesis",
        }
    }
}

impl fmt::Display for SwarmAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Execution mode; selects which agents run and in what order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwarmMode {
    Analysis,
    Design,
    Implementation,
    Learning,
    #[default]
    All,
}

impl SwarmMode {
    pub const ALL: [Self; 5] = [
        Self::Analysis,
        Self::Design,
        Self::Implementation,
        Self::Learning,
        Self::All,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Design => "design",
            Self::Implementation => "implementation",
            Self::Learning => "learning",
            Self::All => "all",
        }
    }

    #[must_use]
    pub const fn pipeline(self) -> &'static [SwarmAgent] {
        use SwarmAgent::{Architect, Creative, LearningExtractor, Researcher, Skeptic};
        match self {
            Self::Analysis => &[Researcher, Architect],
            Self::Design => &[Architect, Creative, Skeptic],
            Self::Implementation => &[Architect, Researcher, Skeptic],
            Self::Learning => &[LearningExtractor, Researcher, Architect],
            Self::All => &[Architect, Researcher, Skeptic, Creative, LearningExtractor],
        }
    }

    #[must_use]
    pub fn pipeline_label(self) -> String {
        self.pipeline()
            .iter()
            .map(|agent| agent.name())
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

impl fmt::Display for SwarmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwarmMode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == value)
            .ok_or_else(|| ValidationError::UnknownVariant {
                field: "swarm mode",
                value: value.to_string(),
            })
    }
}

/// Validated input for a swarm run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwarmRequest {
    task: String,
    context: String,
    mode: SwarmMode,
}

impl SwarmRequest {
    /// # Errors
    /// Returns `ValidationError::TaskTooShort` when the task has fewer than
    /// ten characters.
    pub fn new(
        task: impl Into<String>,
        context: Option<String>,
        mode: Option<SwarmMode>,
    ) -> Result<Self, ValidationError> {
        let task = task.into();
        if task.chars().count() < MIN_TASK_CHARS {
            return Err(ValidationError::TaskTooShort {
                min: MIN_TASK_CHARS,
            });
        }
        Ok(Self {
            task,
            context: context.unwrap_or_default(),
            mode: mode.unwrap_or_default(),
        })
    }

    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }

    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }

    #[must_use]
    pub const fn mode(&self) -> SwarmMode {
        self.mode
    }

    /// Node invocation that calls the orchestrator's exported `runSwarm`.
    ///
    /// The script path and request fields travel as argv, never inside the
    /// evaluated source.
    #[must_use]
    pub fn command(&self, program: impl Into<OsString>, script: impl Into<OsString>) -> CommandSpec {
        CommandSpec::new(program)
            .args(["--input-type=module", "-e", RUN_SWARM_MODULE, "--"])
            .arg(script)
            .args([self.task.as_str(), self.context.as_str(), self.mode.as_str()])
    }
}

/// Runs the swarm orchestrator script as an external process.
#[must_use]
pub fn command_swarm_runner(program: impl Into<OsString>, script: PathBuf) -> SwarmRunFn {
    let program = program.into();
    Arc::new(move |request: SwarmRequest| {
        let spec = request.command(program.clone(), script.clone());
        run_command(spec).boxed()
    })
}

/// Acknowledgement returned by the swarm tool.
#[derive(Debug, Clone)]
pub struct SwarmAck {
    pub task: String,
    pub mode: SwarmMode,
    pub job: Option<JobTicket>,
}

impl fmt::Display for SwarmAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "🚀 SWARM EXECUTION STARTED\n\nTask: {}\nMode: {}\nAgents: {}\nStatus: Running agents in background...\n\nThe swarm is processing your request. Results will be saved to the ELF coordination directory.",
            self.task,
            self.mode,
            self.mode.pipeline_label()
        )?;
        write_job_line(f, self.job.as_ref())
    }
}

impl ElfControlPlane {
    /// Starts a swarm run in the background.
    ///
    /// # Errors
    /// Returns `ControlError::Dispatch` when the job registry is at capacity.
    pub async fn swarm(&self, request: SwarmRequest) -> Result<SwarmAck, ControlError> {
        let task = request.task.clone();
        let mode = request.mode;
        let job = (self.swarm)(request);
        let ticket = self
            .jobs
            .dispatch(JobKind::Swarm, format!("{mode} for task: {task}"), job)
            .await?;
        Ok(SwarmAck {
            task,
            mode,
            job: Some(ticket),
        })
    }
}

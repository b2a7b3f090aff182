use std::ffi::OsString;
use std::fmt;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::jobs::{JobError, JobOutput};

/// Bytes of stdout/stderr retained from a finished command.
pub const MAX_CAPTURED_BYTES: usize = 16 * 1024;

/// An argv to execute without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Arguments as lossy UTF-8, mostly useful for labels and assertions.
    #[must_use]
    pub fn argv_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Runs `spec` to completion with captured output.
///
/// The child never inherits this process's stdio, so a server speaking a
/// protocol over stdout stays intact while background work runs.
///
/// # Errors
/// Returns `JobError::Spawn` if the program cannot be started and
/// `JobError::ExitStatus` if it exits unsuccessfully.
pub async fn run_command(spec: CommandSpec) -> Result<JobOutput, JobError> {
    run_with_limit(spec, MAX_CAPTURED_BYTES).await
}

/// Like [`run_command`] but keeps the whole stdout.
///
/// # Errors
/// Same as [`run_command`].
pub async fn run_command_full(spec: CommandSpec) -> Result<JobOutput, JobError> {
    run_with_limit(spec, usize::MAX).await
}

async fn run_with_limit(spec: CommandSpec, limit: usize) -> Result<JobOutput, JobError> {
    debug!(command = %spec, "running command");

    let output = spec
        .to_command()
        .output()
        .await
        .map_err(|source| JobError::Spawn {
            program: spec.program.to_string_lossy().into_owned(),
            source,
        })?;

    let exit_code = output.status.code();
    if !output.status.success() {
        return Err(JobError::ExitStatus {
            program: spec.program.to_string_lossy().into_owned(),
            code: exit_code,
            stderr: tail_lossy(&output.stderr, MAX_CAPTURED_BYTES),
        });
    }

    Ok(JobOutput {
        exit_code,
        stdout: tail_lossy(&output.stdout, limit),
    })
}

fn tail_lossy(bytes: &[u8], limit: usize) -> String {
    let start = bytes.len().saturating_sub(limit);
    String::from_utf8_lossy(&bytes[start..]).trim_end().to_string()
}

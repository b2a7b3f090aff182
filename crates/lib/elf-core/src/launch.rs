//! Re-invokes an external CLI with forwarded arguments.
//!
//! The launcher blocks on the child, leaves stdio untouched and reports the
//! child's exit code so wrapper scripts can be replaced by a single binary.

use std::ffi::OsString;
use std::io;
use std::process::Command;

use thiserror::Error;
use tracing::debug;

pub const LAUNCH_PROGRAM_ENV: &str = "ELF_LAUNCH_PROGRAM";
pub const LAUNCH_ENTRYPOINT_ENV: &str = "ELF_LAUNCH_ENTRYPOINT";
pub const DEFAULT_LAUNCH_PROGRAM: &str = "node";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// What to run: a program plus the arguments that precede forwarded ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub program: OsString,
    pub leading_args: Vec<OsString>,
}

impl LaunchConfig {
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_leading_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    /// Reads `ELF_LAUNCH_PROGRAM` (default `node`) and the required
    /// `ELF_LAUNCH_ENTRYPOINT`.
    ///
    /// # Errors
    /// Returns `LaunchError::MissingSetting` when the entrypoint is unset or empty.
    pub fn from_env() -> Result<Self, LaunchError> {
        Self::from_vars(
            std::env::var_os(LAUNCH_PROGRAM_ENV),
            std::env::var_os(LAUNCH_ENTRYPOINT_ENV),
        )
    }

    fn from_vars(
        program: Option<OsString>,
        entrypoint: Option<OsString>,
    ) -> Result<Self, LaunchError> {
        let program = program
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| OsString::from(DEFAULT_LAUNCH_PROGRAM));
        let entrypoint = entrypoint
            .filter(|value| !value.is_empty())
            .ok_or(LaunchError::MissingSetting(LAUNCH_ENTRYPOINT_ENV))?;
        Ok(Self::new(program).with_leading_arg(entrypoint))
    }

    fn command<I>(&self, forwarded: I) -> Command
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut command = Command::new(&self.program);
        command.args(&self.leading_args).args(forwarded);
        command
    }
}

/// Runs the configured program with `forwarded` appended and waits for it.
///
/// Returns the child's exit code, or 0 when it exited without one (for
/// example when terminated by a signal).
///
/// # Errors
/// Returns `LaunchError::Spawn` when the program cannot be started.
pub fn launch<I>(config: &LaunchConfig, forwarded: I) -> Result<i32, LaunchError>
where
    I: IntoIterator<Item = OsString>,
{
    let mut command = config.command(forwarded);
    debug!(command = ?command, "launching");
    let status = command.status().map_err(|source| LaunchError::Spawn {
        program: config.program.to_string_lossy().into_owned(),
        source,
    })?;
    Ok(status.code().unwrap_or(0))
}

use std::fmt;
use std::path::PathBuf;

use futures::FutureExt;

use crate::exec::{CommandSpec, run_command};
use crate::jobs::{JobKind, JobTicket};

use super::{ControlError, ElfControlPlane, write_job_line};

/// Acknowledgement returned by the check-in tool.
#[derive(Debug, Clone)]
pub struct CheckinAck {
    pub script: PathBuf,
    pub job: Option<JobTicket>,
}

impl fmt::Display for CheckinAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "🚀 CHECK-IN STARTED\n\nScript: {}\nStatus: Running in background...",
            self.script.display()
        )?;
        write_job_line(f, self.job.as_ref())
    }
}

impl ElfControlPlane {
    #[must_use]
    pub fn checkin_command(&self) -> CommandSpec {
        CommandSpec::new(self.paths.checkin_script())
    }

    /// Runs the ELF check-in script in the background.
    ///
    /// # Errors
    /// Returns `ControlError::Dispatch` when the job registry is at capacity.
    pub async fn checkin(&self) -> Result<CheckinAck, ControlError> {
        let script = self.paths.checkin_script();
        let ticket = self
            .jobs
            .dispatch(
                JobKind::Checkin,
                "check-in",
                run_command(self.checkin_command()).boxed(),
            )
            .await?;
        Ok(CheckinAck {
            script,
            job: Some(ticket),
        })
    }
}

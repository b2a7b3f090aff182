use elf_core::jobs::JobSnapshot;
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, ErrorCode},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::{ElfMcp, helpers};

/// Parameters for fetching a job by id.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct JobStatusParams {
    /// Job id returned by `query`, `swarm_task` or `checkin`
    pub job_id: String,
}

#[tool_router(router = tool_router_jobs, vis = "pub")]
impl ElfMcp {
    #[tool(description = "Fetch the state of a background job (running, succeeded, failed) with its output or error.")]
    async fn job_status(
        &self,
        Parameters(params): Parameters<JobStatusParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let id = params.job_id.trim().parse().map_err(|_| {
            helpers::mcp_err(
                ErrorCode::INVALID_PARAMS,
                format!("invalid job id: {}", params.job_id),
            )
        })?;
        let snapshot = self.control.jobs().status(id).await.ok_or_else(|| {
            helpers::mcp_err(
                ErrorCode::RESOURCE_NOT_FOUND,
                format!("unknown job: {}", params.job_id),
            )
        })?;
        Ok(CallToolResult::success(vec![Content::json(snapshot)?]))
    }

    #[tool(description = "List background jobs retained by the server, oldest first.")]
    async fn list_jobs(&self) -> Result<CallToolResult, ErrorData> {
        let jobs: Vec<JobSnapshot> = self.control.jobs().list().await;
        Ok(CallToolResult::success(vec![Content::json(jobs)?]))
    }
}

//! MCP server implementation for the ELF tools.
//!
//! This crate wires the ELF control plane into rmcp tool handlers. Every
//! dispatch tool acknowledges immediately and hands back a job id that can be
//! polled with `job_status`.

mod helpers;
mod tools;
pub mod server;

use elf_core::control::ElfControlPlane;
use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::tool::ToolRouter,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};

pub use tools::dispatch::{QueryParams, QueryTypeParam, SwarmModeParam, SwarmTaskParams};
pub use tools::jobs::JobStatusParams;

const SERVER_INSTRUCTIONS: &str = r"elf-mcp exposes the Emergent Learning (ELF) tooling as MCP tools.

Workflow:
1. Start work with one of the dispatch tools. Each returns immediately with an acknowledgement
   and a job id while the work keeps running in the background:
   - `query` runs the ELF query engine (`context`, `domain`, `learning`, `decision`, `rule`).
   - `swarm_task` runs a multi-agent swarm on a task (`analysis`, `design`, `implementation`,
     `learning`, `all`).
   - `checkin` runs the ELF check-in script.
2. Poll `job_status` with the job id to learn whether the work succeeded and read its output.
   `list_jobs` shows every job still retained by the server.

Notes:
- `query` with type `domain` needs a `domain`; without one nothing is started.
- `swarm_task` requires a task of at least 10 characters; mode defaults to `all`.
- Use `help` and `swarm_help` for details.
- `health` returns `ok`.";

/// MCP server wrapper around the ELF control plane and tool routers.
#[derive(Clone)]
pub struct ElfMcp {
    tool_router: ToolRouter<Self>,
    control: ElfControlPlane,
}

impl ElfMcp {
    #[must_use]
    pub fn new(control: ElfControlPlane) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_dispatch()
            + Self::tool_router_jobs()
            + Self::tool_router_context();
        Self {
            tool_router,
            control,
        }
    }

    #[must_use]
    pub const fn control(&self) -> &ElfControlPlane {
        &self.control
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl ElfMcp {
    #[tool(description = "Health check. Returns 'ok'.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }
}

#[tool_handler]
impl ServerHandler for ElfMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

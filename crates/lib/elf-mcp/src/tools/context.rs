use elf_core::control::{SwarmAgent, SwarmMode};
use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::ElfMcp;

/// Payload listing the MCP commands exposed by this server.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HelpCommands {
    pub commands: Vec<String>,
}

impl Default for HelpCommands {
    fn default() -> Self {
        Self {
            commands: vec![
                "help - List MCP commands exposed by this server.".to_string(),
                "query - Start an ELF query (context, domain, learning, decision, rule)."
                    .to_string(),
                "swarm_task - Start a swarm of agents on a task.".to_string(),
                "swarm_help - Describe swarm agents and execution modes.".to_string(),
                "checkin - Run the ELF check-in script.".to_string(),
                "job_status - Fetch the state and output of a background job.".to_string(),
                "list_jobs - List background jobs retained by the server.".to_string(),
                "health - Returns ok.".to_string(),
            ],
        }
    }
}

fn swarm_help_text() -> String {
    let agents = [
        SwarmAgent::Architect,
        SwarmAgent::Researcher,
        SwarmAgent::Skeptic,
        SwarmAgent::Creative,
        SwarmAgent::LearningExtractor,
    ];
    let mut text = String::from("AGENTS:\n");
    for agent in agents {
        text.push_str(&format!("- {}: {}\n", agent.name(), agent.focus()));
    }
    text.push_str("\nMODES:\n");
    for mode in SwarmMode::ALL {
        text.push_str(&format!("- {}: {}\n", mode.as_str(), mode.pipeline_label()));
    }
    text
}

#[tool_router(router = tool_router_context, vis = "pub")]
impl ElfMcp {
    #[tool(description = "List the MCP commands exposed by this server.")]
    async fn help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::json(HelpCommands::default())?]))
    }

    #[tool(description = "Describes the swarm agents and which agents each execution mode runs.")]
    async fn swarm_help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text(swarm_help_text())]))
    }
}

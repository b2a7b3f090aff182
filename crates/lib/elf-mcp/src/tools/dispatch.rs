use elf_core::control::{QueryRequest, QueryType, SwarmMode, SwarmRequest};
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::{ElfMcp, helpers};

/// Query type accepted by the `query` tool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueryTypeParam {
    Context,
    Domain,
    Learning,
    Decision,
    Rule,
}

impl From<QueryTypeParam> for QueryType {
    fn from(value: QueryTypeParam) -> Self {
        match value {
            QueryTypeParam::Context => Self::Context,
            QueryTypeParam::Domain => Self::Domain,
            QueryTypeParam::Learning => Self::Learning,
            QueryTypeParam::Decision => Self::Decision,
            QueryTypeParam::Rule => Self::Rule,
        }
    }
}

/// Parameters for querying the ELF knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct QueryParams {
    /// Query type: context, domain, learning, decision, or rule
    #[serde(rename = "type")]
    pub query_type: QueryTypeParam,
    /// Domain filter (optional)
    pub domain: Option<String>,
    /// Limit results (optional, default: 10)
    pub limit: Option<String>,
}

impl From<QueryParams> for QueryRequest {
    fn from(params: QueryParams) -> Self {
        let mut request = Self::new(params.query_type.into());
        if let Some(domain) = params.domain {
            request = request.with_domain(domain);
        }
        if let Some(limit) = params.limit {
            request = request.with_limit(limit);
        }
        request
    }
}

/// Execution mode accepted by the `swarm_task` tool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SwarmModeParam {
    /// For researching and understanding problems
    Analysis,
    /// For creating new solutions and architectures
    Design,
    /// For building and validating solutions
    Implementation,
    /// For extracting insights and building knowledge
    Learning,
    /// Use all agents for comprehensive feedback
    All,
}

impl From<SwarmModeParam> for SwarmMode {
    fn from(value: SwarmModeParam) -> Self {
        match value {
            SwarmModeParam::Analysis => Self::Analysis,
            SwarmModeParam::Design => Self::Design,
            SwarmModeParam::Implementation => Self::Implementation,
            SwarmModeParam::Learning => Self::Learning,
            SwarmModeParam::All => Self::All,
        }
    }
}

/// Parameters for running a swarm of agents on a task.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SwarmTaskParams {
    /// The task or question to process. Be specific about what you need.
    /// Example: 'Design a caching strategy for our API'
    #[schemars(length(min = 10))]
    pub task: String,
    /// Execution mode (defaults to `all`)
    pub mode: Option<SwarmModeParam>,
    /// Additional context about your project, domain, or constraints
    pub context: Option<String>,
}

#[tool_router(router = tool_router_dispatch, vis = "pub")]
impl ElfMcp {
    #[tool(description = "Query ELF (context, golden rules, learnings, decisions, domain knowledge). Returns immediately; the query runs in the background and its result is available through job_status.")]
    async fn query(
        &self,
        Parameters(params): Parameters<QueryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let ack = self
            .control
            .query(params.into())
            .await
            .map_err(helpers::map_control_err)?;
        Ok(CallToolResult::success(vec![Content::text(ack.to_string())]))
    }

    #[tool(description = "Execute a task using a swarm of AI agents (Architect, Researcher, Skeptic, Creative, Learning Extractor). Modes: analysis, design, implementation, learning, all (default). Returns immediately; poll job_status for the outcome. See swarm_help.")]
    async fn swarm_task(
        &self,
        Parameters(params): Parameters<SwarmTaskParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = SwarmRequest::new(params.task, params.context, params.mode.map(Into::into))
            .map_err(|err| helpers::map_control_err(err.into()))?;
        let ack = self
            .control
            .swarm(request)
            .await
            .map_err(helpers::map_control_err)?;
        Ok(CallToolResult::success(vec![Content::text(ack.to_string())]))
    }

    #[tool(description = "Run the ELF check-in script. Returns immediately; poll job_status for the outcome.")]
    async fn checkin(&self) -> Result<CallToolResult, ErrorData> {
        let ack = self
            .control
            .checkin()
            .await
            .map_err(helpers::map_control_err)?;
        Ok(CallToolResult::success(vec![Content::text(ack.to_string())]))
    }
}

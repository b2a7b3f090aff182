//! Transports for [`ElfMcp`]: stdio for a single client, streamable HTTP for
//! shared daemons.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use elf_core::control::ElfControlPlane;
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use tracing::info;

use crate::ElfMcp;

type ServeError = Box<dyn std::error::Error + Send + Sync>;

const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Serves one MCP session on this process's stdin and stdout.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio(control: ElfControlPlane) -> Result<(), ServeError> {
    info!("elf-mcp serving over stdio");
    let running = serve_server(ElfMcp::new(control), stdio()).await?;
    let _ = running.waiting().await?;
    Ok(())
}

/// Serves MCP at `/mcp` and a plain `/health` check on `addr`.
///
/// Every session gets its own [`ElfMcp`] sharing the control plane, so jobs
/// started in one session can be polled from another.
///
/// # Errors
/// Returns any listener or server error.
pub async fn serve_streamable_http(
    control: ElfControlPlane,
    addr: SocketAddr,
) -> Result<(), ServeError> {
    let mcp = StreamableHttpService::new(
        move || Ok(ElfMcp::new(control.clone())),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            sse_keep_alive: Some(SSE_KEEP_ALIVE),
            ..Default::default()
        },
    );
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest_service("/mcp", mcp);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "elf-mcp listening");
    axum::serve(listener, app).await?;
    Ok(())
}

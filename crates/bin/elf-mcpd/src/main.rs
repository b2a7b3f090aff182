//! Daemon entry point for the ELF MCP server.
//!
//! Loads configuration from the CLI and environment, builds the control plane
//! with its job registry, and serves MCP over stdio and/or streamable HTTP.

mod config;
mod control;

use elf_mcp::server::{serve_stdio, serve_streamable_http};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ElfConfig;
use crate::control::build_control_plane;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // stdout carries the MCP stdio transport.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ElfConfig::from_args()?;
    let control = build_control_plane(&config);
    let _sweeper = control.jobs().clone().spawn_sweeper();
    info!(root = %config.paths.root().display(), "elf-mcpd starting");

    let http = if config.mcp_serve {
        Some(tokio::spawn(serve_streamable_http(
            control.clone(),
            config.mcp_http_addr,
        )))
    } else {
        None
    };

    if config.enable_stdio {
        serve_stdio(control).await?;
    } else if let Some(http) = http {
        http.await??;
    }
    Ok(())
}

//! Forwards every argument to the configured opencode entrypoint and exits
//! with the child's status.

use elf_core::launch::{LaunchConfig, launch};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let code = match LaunchConfig::from_env()
        .and_then(|config| launch(&config, std::env::args_os().skip(1)))
    {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "launch failed");
            1
        }
    };
    std::process::exit(code);
}

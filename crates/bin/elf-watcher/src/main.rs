//! Two-tier watcher over the ELF coordination directory.
//!
//! Exit codes: 0 when stopped or finished, 1 when the handler escalates,
//! 2 when a model call fails.

use std::path::PathBuf;

use clap::Parser;
use elf_core::control::DEFAULT_PYTHON;
use elf_core::paths::ElfPaths;
use elf_core::watcher::{
    INTERVAL_ENV,
    MODEL_ENV,
    MODEL_TIMEOUT,
    Watcher,
    WatcherConfig,
    opencode_model,
    script_prompts,
};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_OPENCODE: &str = "opencode";

#[derive(Parser, Debug)]
#[command(name = "elf-watcher", version, about = "OpenCode watcher for ELF coordination.")]
struct CliArgs {
    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    #[arg(long, env = MODEL_ENV)]
    model: Option<String>,

    /// Seconds between passes; unparsable values fall back to the default
    #[arg(long, env = INTERVAL_ENV)]
    interval: Option<String>,

    #[arg(long, env = "ELF_BASE_PATH")]
    elf_dir: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_OPENCODE)]
    opencode: String,

    #[arg(long, env = "ELF_PYTHON", default_value = DEFAULT_PYTHON)]
    python: String,

    /// Prompt script (defaults to `<elf>/watcher/watcher_loop.py`)
    #[arg(long)]
    loop_script: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let code = match run(CliArgs::parse()).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "watcher failed");
            2
        }
    };
    std::process::exit(code);
}

async fn run(args: CliArgs) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
    let paths = ElfPaths::resolve(args.elf_dir)?;
    let config = WatcherConfig::new(&paths)
        .with_model(args.model.as_deref())
        .with_interval(args.interval.as_deref())
        .with_once(args.once);
    let script = args
        .loop_script
        .unwrap_or_else(|| paths.watcher_loop_script());

    let watcher = Watcher::new(
        config,
        script_prompts(args.python, script),
        opencode_model(args.opencode, MODEL_TIMEOUT),
    );
    Ok(watcher.run().await?)
}

//! Rebuilds the heuristics table of the ELF memory index so every column
//! carries its default.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use elf_core::heuristics::{SchemaFixReport, fix_database};
use elf_core::paths::ElfPaths;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "elf-fix-schema", version, about = "Repair the ELF heuristics schema.")]
struct CliArgs {
    /// Database to repair (defaults to `<elf>/memory/index.db`)
    #[arg(long, env = "ELF_DB_PATH")]
    db: Option<PathBuf>,

    #[arg(long, env = "ELF_BASE_PATH")]
    elf_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(CliArgs::parse()) {
        Ok(report) => {
            match report {
                SchemaFixReport::TableMissing => {
                    println!("heuristics table does not exist yet; nothing to fix");
                }
                SchemaFixReport::Rebuilt { rows_restored } => {
                    println!("schema fixed; restored {rows_restored} rows");
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "schema fix failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: CliArgs) -> Result<SchemaFixReport, Box<dyn std::error::Error>> {
    let db = match args.db {
        Some(db) => db,
        None => ElfPaths::resolve(args.elf_dir)?.memory_db(),
    };
    Ok(fix_database(&db)?)
}

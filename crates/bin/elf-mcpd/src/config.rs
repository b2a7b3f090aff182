use clap::{Parser, builder::BoolishValueParser};
use elf_core::control::{DEFAULT_NODE, DEFAULT_PYTHON};
use elf_core::paths::{ElfPaths, PathsError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4030";
const DEFAULT_JOB_TTL_SECS: u64 = 3600;
const DEFAULT_JOB_SWEEP_SECS: u64 = 60;

#[derive(Parser, Debug)]
#[command(name = "elf-mcpd", version, about = "ELF MCP daemon.")]
struct CliArgs {
    #[arg(long, env = "ELF_BASE_PATH")]
    elf_dir: Option<PathBuf>,

    #[arg(long, env = "ELF_PYTHON", default_value = DEFAULT_PYTHON)]
    python: String,

    #[arg(long, env = "ELF_NODE", default_value = DEFAULT_NODE)]
    node: String,

    #[arg(long, env = "ELF_SWARM_SCRIPT")]
    swarm_script: Option<PathBuf>,

    #[arg(long, env = "ELF_JOB_TTL_SECS", default_value_t = DEFAULT_JOB_TTL_SECS)]
    job_ttl_secs: u64,

    #[arg(long, env = "ELF_JOB_SWEEP_SECS")]
    job_sweep_secs: Option<u64>,

    #[arg(long, env = "ELF_MAX_RUNNING_JOBS")]
    max_running_jobs: Option<usize>,

    #[arg(
        long = "stdio",
        env = "ELF_ENABLE_STDIO",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "ELF_MCP_SERVE",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(long, env = "ELF_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub struct ElfConfig {
    pub paths: ElfPaths,
    pub python: String,
    pub node: String,
    pub swarm_script: PathBuf,
    pub job_ttl: Option<Duration>,
    pub sweep_interval: Duration,
    pub max_running: Option<usize>,
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub mcp_http_addr: SocketAddr,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),
    #[error("invalid {name} value: {value}")]
    InvalidSetting { name: &'static str, value: String },
    #[error(transparent)]
    Paths(#[from] PathsError),
}

impl ElfConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

impl TryFrom<CliArgs> for ElfConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if !args.enable_stdio && !args.mcp_serve {
            return Err(ConfigError::MissingSetting(
                "ELF_ENABLE_STDIO or ELF_MCP_SERVE",
            ));
        }
        if args.python.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "ELF_PYTHON",
                value: args.python,
            });
        }
        if args.node.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "ELF_NODE",
                value: args.node,
            });
        }
        if args.max_running_jobs == Some(0) {
            return Err(ConfigError::InvalidSetting {
                name: "ELF_MAX_RUNNING_JOBS",
                value: "0".to_string(),
            });
        }

        let job_ttl = if args.job_ttl_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(args.job_ttl_secs))
        };
        let sweep_secs = args.job_sweep_secs.unwrap_or(DEFAULT_JOB_SWEEP_SECS);
        if sweep_secs == 0 && job_ttl.is_some() {
            return Err(ConfigError::InvalidSetting {
                name: "ELF_JOB_SWEEP_SECS",
                value: sweep_secs.to_string(),
            });
        }

        let elf_dir = args
            .elf_dir
            .filter(|value| !value.as_os_str().is_empty());
        let paths = ElfPaths::resolve(elf_dir)?;
        let swarm_script = args
            .swarm_script
            .filter(|value| !value.as_os_str().is_empty())
            .unwrap_or_else(|| paths.swarm_orchestrator());

        Ok(Self {
            paths,
            python: args.python,
            node: args.node,
            swarm_script,
            job_ttl,
            sweep_interval: Duration::from_secs(sweep_secs),
            max_running: args.max_running_jobs,
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            mcp_http_addr: args.mcp_http_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            elf_dir: Some(PathBuf::from("/srv/elf")),
            python: DEFAULT_PYTHON.to_string(),
            node: DEFAULT_NODE.to_string(),
            swarm_script: None,
            job_ttl_secs: DEFAULT_JOB_TTL_SECS,
            job_sweep_secs: None,
            max_running_jobs: None,
            enable_stdio: true,
            mcp_serve: false,
            mcp_http_addr: DEFAULT_MCP_HTTP_ADDR.parse().expect("valid MCP addr"),
        }
    }

    #[test]
    fn swarm_script_defaults_under_elf_dir() {
        let config = ElfConfig::try_from(base_args()).expect("config should parse");

        assert_eq!(config.paths.root(), std::path::Path::new("/srv/elf"));
        assert_eq!(
            config.swarm_script,
            PathBuf::from("/srv/elf/agentsOpencode/swarm-orchestrator.js")
        );
        assert_eq!(config.job_ttl, Some(Duration::from_secs(DEFAULT_JOB_TTL_SECS)));
        assert_eq!(config.sweep_interval, Duration::from_secs(DEFAULT_JOB_SWEEP_SECS));
    }

    #[test]
    fn zero_ttl_keeps_jobs_forever() {
        let mut args = base_args();
        args.job_ttl_secs = 0;
        args.job_sweep_secs = Some(0);

        let config = ElfConfig::try_from(args).expect("config should parse");

        assert!(config.job_ttl.is_none());
    }

    #[test]
    fn requires_a_transport() {
        let mut args = base_args();
        args.enable_stdio = false;
        args.mcp_serve = false;

        let err = ElfConfig::try_from(args).expect_err("no transport");
        assert!(matches!(err, ConfigError::MissingSetting(_)));
    }

    #[test]
    fn rejects_blank_python_and_zero_capacity() {
        let mut args = base_args();
        args.python = "  ".to_string();
        let err = ElfConfig::try_from(args).expect_err("blank python");
        assert!(matches!(err, ConfigError::InvalidSetting { name: "ELF_PYTHON", .. }));

        let mut args = base_args();
        args.max_running_jobs = Some(0);
        let err = ElfConfig::try_from(args).expect_err("zero capacity");
        assert!(matches!(
            err,
            ConfigError::InvalidSetting {
                name: "ELF_MAX_RUNNING_JOBS",
                ..
            }
        ));
    }
}

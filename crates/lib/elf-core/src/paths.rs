use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable that overrides the ELF root directory.
pub const ELF_BASE_PATH_ENV: &str = "ELF_BASE_PATH";

const OPENCODE_DIR: &str = ".opencode";
const ELF_DIR: &str = "emergent-learning";

#[derive(Debug, Error)]
pub enum PathsError {
    #[error("unable to resolve the home directory")]
    NoHome,
}

/// Filesystem layout of the Emergent Learning tree.
///
/// Every path the tools touch is derived from a single root so callers can
/// resolve it once and pass it around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfPaths {
    root: PathBuf,
}

impl ElfPaths {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves `~/.opencode/emergent-learning`.
    ///
    /// # Errors
    /// Returns `PathsError::NoHome` when the home directory is unknown.
    pub fn from_home() -> Result<Self, PathsError> {
        let home = dirs::home_dir().ok_or(PathsError::NoHome)?;
        Ok(Self::new(home.join(OPENCODE_DIR).join(ELF_DIR)))
    }

    /// Uses `root` when provided, otherwise falls back to the home layout.
    ///
    /// # Errors
    /// Returns `PathsError::NoHome` when no root is given and the home
    /// directory is unknown.
    pub fn resolve(root: Option<PathBuf>) -> Result<Self, PathsError> {
        match root {
            Some(root) => Ok(Self::new(root)),
            None => Self::from_home(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("scripts")
    }

    #[must_use]
    pub fn checkin_script(&self) -> PathBuf {
        self.scripts_dir().join("checkin.sh")
    }

    #[must_use]
    pub fn query_script(&self) -> PathBuf {
        self.root.join("query").join("query.py")
    }

    #[must_use]
    pub fn swarm_orchestrator(&self) -> PathBuf {
        self.root.join("agentsOpencode").join("swarm-orchestrator.js")
    }

    #[must_use]
    pub fn watcher_loop_script(&self) -> PathBuf {
        self.root.join("watcher").join("watcher_loop.py")
    }

    #[must_use]
    pub fn coordination_dir(&self) -> PathBuf {
        self.root.join(".coordination")
    }

    #[must_use]
    pub fn watcher_log(&self) -> PathBuf {
        self.coordination_dir().join("watcher-log.md")
    }

    #[must_use]
    pub fn watcher_stop_file(&self) -> PathBuf {
        self.coordination_dir().join("watcher-stop")
    }

    #[must_use]
    pub fn memory_db(&self) -> PathBuf {
        self.root.join("memory").join("index.db")
    }
}

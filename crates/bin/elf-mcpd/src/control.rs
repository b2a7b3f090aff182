use elf_core::control::{ElfControlPlane, command_swarm_runner};
use elf_core::jobs::{JobRegistry, JobRegistryConfig};

use crate::config::ElfConfig;

pub fn build_control_plane(config: &ElfConfig) -> ElfControlPlane {
    let mut jobs_config = JobRegistryConfig::new().with_sweep_interval(config.sweep_interval);
    if let Some(ttl) = config.job_ttl {
        jobs_config = jobs_config.with_ttl(ttl);
    }
    if let Some(max_running) = config.max_running {
        jobs_config = jobs_config.with_max_running(max_running);
    }

    let swarm = command_swarm_runner(config.node.clone(), config.swarm_script.clone());
    ElfControlPlane::new(config.paths.clone(), JobRegistry::new(jobs_config))
        .with_python(config.python.clone())
        .with_swarm_runner(swarm)
}

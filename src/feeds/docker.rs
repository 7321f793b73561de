//! Container sources via the docker CLI.

use anyhow::{bail, Context, Result};
use std::process::Command;

use super::CommandFeed;

pub const DEFAULT_DOCKER_BIN: &str = "docker";

/// Names of all containers, running or not, in listing order.
pub fn list_containers(docker_bin: &str) -> Result<Vec<String>> {
    let output = Command::new(docker_bin)
        .args(["ps", "--all", "--format", "{{.Names}}"])
        .output()
        .with_context(|| format!("Failed to run '{} ps'", docker_bin))?;

    if !output.status.success() {
        bail!(
            "'{} ps' failed: {}",
            docker_bin,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(parse_container_names(&String::from_utf8_lossy(&output.stdout)))
}

/// One name per line; a container listed with several names is known by the
/// first one.
fn parse_container_names(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| {
            let first = line.split(',').next().unwrap_or("").trim();
            let name = first.trim_start_matches('/');
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

/// Argument vector that follows one container's log with timestamps.
pub fn logs_command(docker_bin: &str, container: &str) -> Vec<String> {
    vec![
        docker_bin.to_string(),
        "logs".to_string(),
        "--timestamps".to_string(),
        "--follow".to_string(),
        container.to_string(),
    ]
}

pub fn container_feed(docker_bin: &str, container: &str) -> Result<CommandFeed> {
    CommandFeed::spawn(container, &logs_command(docker_bin, container))
}

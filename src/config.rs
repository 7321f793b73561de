use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::formatters::validate_ts_format;

/// Main configuration struct for mergetail
#[derive(Debug, Clone)]
pub struct MergetailConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub performance: PerformanceConfig,
    pub verbosity: u8,
}

/// Which sources to follow
#[derive(Debug, Clone, Default)]
pub struct InputConfig {
    pub files: Vec<SourceSpec>,
    pub commands: Vec<SourceSpec>,
    pub docker: bool,
    pub docker_bin: String,
}

/// What to show and how
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Empty means every source is displayed
    pub only_sources: Vec<String>,
    pub ts_format: String,
    pub color: ColorMode,
    pub stats: Option<StatsFormat>,
}

#[derive(Debug, Clone)]
pub struct PerformanceConfig {
    pub queue_size: usize,
}

/// Color output mode
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

/// How `--stats` reports on exit
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatsFormat {
    Table,
    Json,
}

/// A named source given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    File { name: String, path: PathBuf },
    Command { name: String, argv: Vec<String> },
}

impl SourceSpec {
    /// `NAME=PATH`, or a bare `PATH` named after its file stem.
    pub fn parse_file(arg: &str) -> Result<Self> {
        let (name, path) = match arg.split_once('=') {
            Some((name, path)) if !name.is_empty() && !path.is_empty() => {
                (name.to_string(), PathBuf::from(path))
            }
            Some(_) => bail!("Invalid source '{}': expected NAME=PATH", arg),
            None => {
                let path = PathBuf::from(arg);
                (file_stem_name(&path)?, path)
            }
        };
        Ok(SourceSpec::File { name, path })
    }

    /// `NAME=COMMAND`, the command split with shell quoting rules.
    pub fn parse_command(arg: &str) -> Result<Self> {
        let (name, command) = arg
            .split_once('=')
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| anyhow!("Invalid command source '{}': expected NAME=COMMAND", arg))?;
        let argv = shell_words::split(command)
            .with_context(|| format!("Invalid command for source '{}'", name))?;
        if argv.is_empty() {
            bail!("Empty command for source '{}'", name);
        }
        Ok(SourceSpec::Command {
            name: name.to_string(),
            argv,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            SourceSpec::File { name, .. } | SourceSpec::Command { name, .. } => name,
        }
    }
}

fn file_stem_name(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| anyhow!("Cannot derive a source name from '{}'", path.display()))
}

impl MergetailConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        validate_ts_format(&cli.ts_format)?;
        if cli.queue_size == 0 {
            bail!("--queue-size must be at least 1");
        }

        let files = cli
            .sources
            .iter()
            .map(|arg| SourceSpec::parse_file(arg))
            .collect::<Result<Vec<_>>>()?;
        let commands = cli
            .commands
            .iter()
            .map(|arg| SourceSpec::parse_command(arg))
            .collect::<Result<Vec<_>>>()?;

        let config = Self {
            input: InputConfig {
                files,
                commands,
                docker: cli.docker,
                docker_bin: cli.docker_bin.clone(),
            },
            output: OutputConfig {
                only_sources: cli
                    .containers
                    .iter()
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect(),
                ts_format: cli.ts_format.clone(),
                color: cli.color,
                stats: cli.stats,
            },
            performance: PerformanceConfig {
                queue_size: cli.queue_size,
            },
            verbosity: cli.verbose,
        };
        config.check_unique_names()?;
        Ok(config)
    }

    fn check_unique_names(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for spec in self.input.files.iter().chain(&self.input.commands) {
            if !seen.insert(spec.name()) {
                bail!("Duplicate source name '{}'", spec.name());
            }
        }
        Ok(())
    }

    /// No explicit sources: prettify stdin instead of merging.
    pub fn is_humanize_mode(&self) -> bool {
        !self.input.docker && self.input.files.is_empty() && self.input.commands.is_empty()
    }

    /// Whether lines from `source` are displayed
    pub fn shows_source(&self, source: &str) -> bool {
        self.output.only_sources.is_empty()
            || self.output.only_sources.iter().any(|name| name == source)
    }
}

impl Default for MergetailConfig {
    fn default() -> Self {
        Self {
            input: InputConfig {
                docker_bin: crate::feeds::docker::DEFAULT_DOCKER_BIN.to_string(),
                ..Default::default()
            },
            output: OutputConfig {
                only_sources: Vec::new(),
                ts_format: crate::formatters::DEFAULT_TS_FORMAT.to_string(),
                color: ColorMode::Auto,
                stats: None,
            },
            performance: PerformanceConfig {
                queue_size: crate::merge::DEFAULT_QUEUE_CAPACITY,
            },
            verbosity: 0,
        }
    }
}

/// Format an error message for stderr
pub fn format_error_message(message: &str) -> String {
    format_prefixed("⚠️ ", message, crate::tty::is_stderr_tty())
}

/// Format a warning message for stderr
pub fn format_warning_message(message: &str) -> String {
    format_prefixed("🔹 ", message, crate::tty::is_stderr_tty())
}

fn format_prefixed(emoji: &str, message: &str, tty: bool) -> String {
    if tty {
        format!("{}{}", emoji, message)
    } else {
        format!("mergetail: {}", message)
    }
}

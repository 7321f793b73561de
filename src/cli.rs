// Command-line interface definitions

use clap::{ArgAction, Parser};

use crate::config::{ColorMode, StatsFormat};
use crate::feeds::docker::DEFAULT_DOCKER_BIN;
use crate::formatters::DEFAULT_TS_FORMAT;
use crate::merge::DEFAULT_QUEUE_CAPACITY;

#[derive(Parser, Debug)]
#[command(name = "mergetail")]
#[command(about = "Merge concurrently growing logs into one time-ordered, colorized stream")]
#[command(
    long_about = "Merge concurrently growing logs into one time-ordered, colorized stream\n\nEvery source line must start with an RFC3339 timestamp (as written by\n`docker logs --timestamps`). JSON and key=value payloads are rendered as\nlevel badge, message and sorted fields; anything else is shown as is.\n\nMODES:\n  mergetail a.log b.log     Merge log files\n  mergetail --docker        Merge the logs of all containers\n  mergetail < app.log       Prettify stdin line by line\n\nEXAMPLES:\n  mergetail -d -c web,worker\n  mergetail --cmd 'api=kubectl logs -f --timestamps deploy/api' web=web.log"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Log files as NAME=PATH or PATH (the name defaults to the file stem)
    pub sources: Vec<String>,

    /// Follow every container known to docker
    #[arg(short = 'd', long = "docker", help_heading = "Source Options")]
    pub docker: bool,

    /// Docker-compatible CLI used to list and follow containers
    #[arg(
        long = "docker-bin",
        value_name = "PATH",
        default_value = DEFAULT_DOCKER_BIN,
        help_heading = "Source Options"
    )]
    pub docker_bin: String,

    /// Follow the output of a command as source NAME (repeatable)
    #[arg(
        long = "cmd",
        value_name = "NAME=COMMAND",
        action = ArgAction::Append,
        help_heading = "Source Options"
    )]
    pub commands: Vec<String>,

    /// Only display these sources (comma-separated)
    #[arg(
        short = 'c',
        long = "container",
        value_name = "NAMES",
        value_delimiter = ',',
        help_heading = "Filtering Options"
    )]
    pub containers: Vec<String>,

    /// strftime format of the timestamp column
    #[arg(
        long = "ts-format",
        value_name = "FORMAT",
        default_value = DEFAULT_TS_FORMAT,
        help_heading = "Output Options"
    )]
    pub ts_format: String,

    /// Color output
    #[arg(
        long = "color",
        value_enum,
        default_value = "auto",
        help_heading = "Output Options"
    )]
    pub color: ColorMode,

    /// Disable colors (same as --color=never)
    #[arg(long = "no-color", help_heading = "Output Options")]
    pub no_color: bool,

    /// Lines buffered per source before its reader blocks
    #[arg(
        long = "queue-size",
        value_name = "N",
        default_value_t = DEFAULT_QUEUE_CAPACITY,
        value_parser = clap::value_parser!(usize),
        help_heading = "Performance Options"
    )]
    pub queue_size: usize,

    /// Print line counts per source and grammar on exit. Use -s for the
    /// default table, or --stats=FORMAT for an explicit format.
    #[arg(
        short = 's',
        long = "stats",
        value_enum,
        value_name = "FORMAT",
        require_equals = true,
        num_args = 0..=1,
        default_missing_value = "table",
        help_heading = "Metrics and Stats"
    )]
    pub stats: Option<StatsFormat>,

    /// Disable --stats (useful to override config defaults)
    #[arg(long = "no-stats", help_heading = "Metrics and Stats", overrides_with = "stats")]
    pub no_stats: bool,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, help_heading = "Diagnostics")]
    pub verbose: u8,

    /// Specify custom configuration file path
    #[arg(long = "config-file", help_heading = "Configuration Options")]
    pub config_file: Option<String>,

    /// Ignore configuration file
    #[arg(long = "ignore-config", help_heading = "Configuration Options")]
    pub ignore_config: bool,

    /// Use alias from configuration file
    #[arg(short = 'a', long = "alias", help_heading = "Configuration Options")]
    pub alias: Vec<String>,

    /// Show configuration file and exit
    #[arg(long = "show-config", help_heading = "Configuration Options")]
    pub show_config: bool,
}

impl Cli {
    /// Resolve inverted boolean flags to their actual values
    pub fn resolve_boolean_flags(&mut self) {
        if self.no_stats {
            self.stats = None;
        }
        if self.no_color {
            self.color = ColorMode::Never;
        }
    }
}

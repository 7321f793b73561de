//! Wiring between sources, the merge engine and stdout.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, select, Receiver};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::{
    format_error_message, format_warning_message, MergetailConfig, SourceSpec, StatsFormat,
};
use crate::feeds::{docker, CommandFeed, LineFeed, SourceFeed};
use crate::formatters::{EntryFormatter, LinePrefix};
use crate::merge::{MergeEngine, TimestampedLine};
use crate::parsers::LogEntryParser;
use crate::platform::{Ctrl, ExitCode, SafeStdout};
use crate::stats::ProcessingStats;
use crate::tty;

/// How long to wait at startup for every source to deliver a first line
const STARTUP_SETTLE: Duration = Duration::from_millis(500);

/// Turns merged lines into display lines
pub struct MergeRenderer {
    prefix: LinePrefix,
    parser: LogEntryParser,
    formatter: EntryFormatter,
}

impl MergeRenderer {
    pub fn new<'a>(
        source_names: impl IntoIterator<Item = &'a str>,
        ts_format: &str,
        use_colors: bool,
    ) -> Result<Self> {
        Ok(Self {
            prefix: LinePrefix::new(source_names, ts_format)?,
            parser: LogEntryParser::new(),
            formatter: EntryFormatter::new(use_colors),
        })
    }

    pub fn render(&self, line: &TimestampedLine, stats: &ProcessingStats) -> String {
        let (entry, grammar) = self.parser.parse_detailed(&line.text);
        stats.add_line_output(grammar);
        format!(
            "{} {}",
            self.prefix.format(&line.source, &line.timestamp),
            self.formatter.format(&entry)
        )
    }
}

/// Open every configured source. Files come first, then commands, then
/// containers in docker's listing order.
pub fn build_feeds(config: &MergetailConfig) -> Result<Vec<(String, Box<dyn SourceFeed>)>> {
    let mut feeds: Vec<(String, Box<dyn SourceFeed>)> = Vec::new();

    for spec in &config.input.files {
        if let SourceSpec::File { name, path } = spec {
            let file = File::open(path)
                .with_context(|| format!("Failed to open '{}'", path.display()))?;
            let feed = LineFeed::with_label(BufReader::new(file), name.clone());
            feeds.push((name.clone(), Box::new(feed)));
        }
    }

    for spec in &config.input.commands {
        if let SourceSpec::Command { name, argv } = spec {
            feeds.push((name.clone(), Box::new(CommandFeed::spawn(name.clone(), argv)?)));
        }
    }

    if config.input.docker {
        let containers = docker::list_containers(&config.input.docker_bin)?;
        if containers.is_empty() {
            tracing::warn!("docker reports no containers");
        }
        for name in containers {
            let feed = docker::container_feed(&config.input.docker_bin, &name)?;
            feeds.push((name, Box::new(feed)));
        }
    }

    Ok(feeds)
}

/// Write merged lines until every source has ended.
pub fn run_merge<I, W>(
    lines: I,
    renderer: &MergeRenderer,
    config: &MergetailConfig,
    stats: &ProcessingStats,
    output: &mut W,
) -> Result<()>
where
    I: IntoIterator<Item = TimestampedLine>,
    W: Write,
{
    for line in lines {
        stats.add_line_read(Some(&line.source));
        if !config.shows_source(&line.source) {
            stats.add_line_filtered();
            continue;
        }
        writeln!(output, "{}", renderer.render(&line, stats))?;
        output.flush()?;
    }
    Ok(())
}

/// Prettify each input line on its own.
pub fn run_humanize<R, W>(
    mut input: R,
    formatter: &EntryFormatter,
    stats: &ProcessingStats,
    output: &mut W,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let parser = LogEntryParser::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if input
            .read_until(b'\n', &mut buf)
            .context("Failed to read stdin")?
            == 0
        {
            return Ok(());
        }
        stats.add_line_read(None);

        let raw = String::from_utf8_lossy(&buf);
        let (entry, grammar) = parser.parse_detailed(raw.trim_end_matches(['\n', '\r']));
        stats.add_line_output(grammar);
        writeln!(output, "{}", formatter.format(&entry))?;
        output.flush()?;
    }
}

/// Run until every source ends or a shutdown signal arrives.
pub fn run(config: &MergetailConfig, ctrl_rx: Receiver<Ctrl>) -> Result<ExitCode> {
    let use_colors = tty::should_use_colors_with_mode(config.output.color);
    let (done_tx, done_rx) = bounded::<Result<()>>(1);

    let stats = if config.is_humanize_mode() {
        let stats = Arc::new(ProcessingStats::default());
        let worker_stats = Arc::clone(&stats);
        let formatter = EntryFormatter::new(use_colors);
        thread::Builder::new()
            .name("humanize".to_string())
            .spawn(move || {
                let stdin = io::stdin();
                let result = run_humanize(
                    stdin.lock(),
                    &formatter,
                    &worker_stats,
                    &mut SafeStdout::new(),
                );
                let _ = done_tx.send(result);
            })
            .context("Failed to spawn output thread")?;
        stats
    } else {
        let mut engine = MergeEngine::spawn(build_feeds(config)?, config.performance.queue_size)?;
        engine.settle(STARTUP_SETTLE);

        let renderer = MergeRenderer::new(
            engine.source_names(),
            &config.output.ts_format,
            use_colors,
        )?;
        for name in &config.output.only_sources {
            if !engine.source_names().any(|source| source == name) {
                eprintln!(
                    "{}",
                    format_warning_message(&format!("No source named '{}'", name))
                );
            }
        }
        let stats = Arc::new(ProcessingStats::new(engine.source_names()));
        let worker_stats = Arc::clone(&stats);
        let worker_config = config.clone();
        thread::Builder::new()
            .name("merge".to_string())
            .spawn(move || {
                let result = run_merge(
                    engine,
                    &renderer,
                    &worker_config,
                    &worker_stats,
                    &mut SafeStdout::new(),
                );
                let _ = done_tx.send(result);
            })
            .context("Failed to spawn output thread")?;
        stats
    };

    loop {
        select! {
            recv(done_rx) -> result => {
                return finish(config, &stats, result.unwrap_or(Ok(())));
            }
            recv(ctrl_rx) -> msg => match msg {
                Ok(Ctrl::Shutdown { exit_code }) => {
                    if let Some(format) = config.output.stats {
                        eprintln!("{}", stats.report(format));
                    }
                    return Ok(exit_code);
                }
                Ok(Ctrl::PrintStats) => {
                    eprintln!("{}", stats.report(config.output.stats.unwrap_or(StatsFormat::Table)));
                }
                Err(_) => break,
            },
        }
    }

    tracing::debug!("signal channel closed");
    finish(config, &stats, done_rx.recv().unwrap_or(Ok(())))
}

fn finish(config: &MergetailConfig, stats: &ProcessingStats, result: Result<()>) -> Result<ExitCode> {
    if let Some(format) = config.output.stats {
        eprintln!("{}", stats.report(format));
    }
    result?;
    Ok(ExitCode::Success)
}

/// Report a fatal error the way the binary does.
pub fn report_error(err: &anyhow::Error) {
    eprintln!("{}", format_error_message(&format!("{:#}", err)));
}

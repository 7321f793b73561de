use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::config::StatsFormat;
use crate::parsers::Grammar;

/// Counters shared between the output loop and the signal thread
#[derive(Debug)]
pub struct ProcessingStats {
    lines_read: AtomicU64,
    lines_output: AtomicU64,
    lines_filtered: AtomicU64,
    structured: AtomicU64,
    key_value: AtomicU64,
    raw: AtomicU64,
    per_source: IndexMap<String, AtomicU64>,
    start_time: Instant,
}

/// Point-in-time copy of [`ProcessingStats`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub lines_read: u64,
    pub lines_output: u64,
    pub lines_filtered: u64,
    pub structured: u64,
    pub key_value: u64,
    pub raw: u64,
    #[serde(serialize_with = "serialize_sources")]
    pub per_source: Vec<(String, u64)>,
}

fn serialize_sources<S: Serializer>(
    sources: &[(String, u64)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(sources.iter().map(|(name, count)| (name, count)))
}

impl ProcessingStats {
    /// Sources are fixed up front so the per-source table never reallocates.
    pub fn new<'a>(sources: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            lines_read: AtomicU64::new(0),
            lines_output: AtomicU64::new(0),
            lines_filtered: AtomicU64::new(0),
            structured: AtomicU64::new(0),
            key_value: AtomicU64::new(0),
            raw: AtomicU64::new(0),
            per_source: sources
                .into_iter()
                .map(|name| (name.to_string(), AtomicU64::new(0)))
                .collect(),
            start_time: Instant::now(),
        }
    }

    pub fn add_line_read(&self, source: Option<&str>) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
        if let Some(counter) = source.and_then(|name| self.per_source.get(name)) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add_line_filtered(&self) {
        self.lines_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_line_output(&self, grammar: Grammar) {
        self.lines_output.fetch_add(1, Ordering::Relaxed);
        let counter = match grammar {
            Grammar::Structured => &self.structured,
            Grammar::KeyValue => &self.key_value,
            Grammar::Raw => &self.raw,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            lines_output: self.lines_output.load(Ordering::Relaxed),
            lines_filtered: self.lines_filtered.load(Ordering::Relaxed),
            structured: self.structured.load(Ordering::Relaxed),
            key_value: self.key_value.load(Ordering::Relaxed),
            raw: self.raw.load(Ordering::Relaxed),
            per_source: self
                .per_source
                .iter()
                .map(|(name, count)| (name.clone(), count.load(Ordering::Relaxed)))
                .collect(),
        }
    }

    pub fn report(&self, format: StatsFormat) -> String {
        let elapsed_ms = self.start_time.elapsed().as_millis();
        let snapshot = self.snapshot();
        match format {
            StatsFormat::Table => snapshot.format(elapsed_ms),
            StatsFormat::Json => snapshot
                .to_json(elapsed_ms)
                .unwrap_or_else(|e| format!("Failed to serialize stats: {}", e)),
        }
    }
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new(None::<&str>)
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    stats: &'a StatsSnapshot,
    elapsed_ms: u64,
}

impl StatsSnapshot {
    /// One-line JSON object; sources keep their registration order.
    pub fn to_json(&self, elapsed_ms: u128) -> serde_json::Result<String> {
        serde_json::to_string(&JsonReport {
            stats: self,
            elapsed_ms: u64::try_from(elapsed_ms).unwrap_or(u64::MAX),
        })
    }

    pub fn format(&self, elapsed_ms: u128) -> String {
        let mut output = format!(
            "Lines processed: {} total, {} output, {} filtered",
            self.lines_read, self.lines_output, self.lines_filtered
        );

        output.push_str(&format!(" in {}ms", elapsed_ms));
        if elapsed_ms > 0 && self.lines_read > 0 {
            let lines_per_sec = (self.lines_read as f64 * 1000.0) / elapsed_ms as f64;
            output.push_str(&format!(" ({:.0} lines/s)", lines_per_sec));
        }

        output.push_str(&format!(
            "\nGrammars: {} {}, {} {}, {} {}",
            self.structured,
            Grammar::Structured.name(),
            self.key_value,
            Grammar::KeyValue.name(),
            self.raw,
            Grammar::Raw.name()
        ));

        if !self.per_source.is_empty() {
            let width = self
                .per_source
                .iter()
                .map(|(name, _)| name.chars().count())
                .max()
                .unwrap_or(0);
            output.push_str("\nSources:");
            for (name, count) in &self.per_source {
                output.push_str(&format!("\n  {:<width$}  {}", name, count, width = width));
            }
        }

        output
    }
}

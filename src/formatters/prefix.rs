use anyhow::{bail, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

pub const DEFAULT_TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Source name and timestamp columns in front of merged entries
#[derive(Debug, Clone)]
pub struct LinePrefix {
    name_width: usize,
    ts_format: String,
}

impl LinePrefix {
    /// `ts_format` is validated here so that rendering can never fail later.
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>, ts_format: &str) -> Result<Self> {
        validate_ts_format(ts_format)?;
        let name_width = names
            .into_iter()
            .map(|name| name.chars().count())
            .max()
            .unwrap_or(0);
        Ok(Self {
            name_width,
            ts_format: ts_format.to_string(),
        })
    }

    pub fn name_width(&self) -> usize {
        self.name_width
    }

    pub fn format(&self, source: &str, timestamp: &DateTime<Utc>) -> String {
        format!(
            "{:>width$} {}",
            source,
            timestamp.format(&self.ts_format),
            width = self.name_width
        )
    }
}

pub fn validate_ts_format(ts_format: &str) -> Result<()> {
    if StrftimeItems::new(ts_format).any(|item| matches!(item, Item::Error)) {
        bail!("Invalid timestamp format: '{}'", ts_format);
    }
    Ok(())
}

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io::BufRead;

use super::{FeedLine, SourceFeed};

/// Shortest line that can still hold a date after the header is stripped
const MIN_LINE_LEN: usize = 10;

/// Reads timestamp-prefixed lines (`<RFC3339> <text>`) from any buffered
/// reader. This is the format of `docker logs --timestamps` and of log files
/// captured from it.
pub struct LineFeed<R> {
    reader: R,
    label: String,
    buf: Vec<u8>,
    line_number: usize,
}

impl<R: BufRead + Send> LineFeed<R> {
    pub fn new(reader: R) -> Self {
        Self::with_label(reader, "input")
    }

    /// `label` names the source in skipped-line warnings.
    pub fn with_label(reader: R, label: impl Into<String>) -> Self {
        Self {
            reader,
            label: label.into(),
            buf: Vec::with_capacity(256),
            line_number: 0,
        }
    }
}

impl<R: BufRead + Send> SourceFeed for LineFeed<R> {
    fn recv(&mut self) -> Result<Option<FeedLine>> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.buf)
                .with_context(|| format!("Failed to read from {}", self.label))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let raw = String::from_utf8_lossy(&self.buf);
            let line = strip_stream_header(raw.trim_end_matches(['\n', '\r']));
            if line.len() < MIN_LINE_LEN {
                continue;
            }

            match parse_timestamped_line(line) {
                Ok(feed_line) => return Ok(Some(feed_line)),
                Err(err) => {
                    tracing::warn!(
                        source = %self.label,
                        line = self.line_number,
                        "skipping line: {:#}",
                        err
                    );
                }
            }
        }
    }
}

/// Drop leading bytes until the line starts with something shaped like
/// `2YYY-`. Container runtimes prefix multiplexed stream frames with a binary
/// header, and a truncated frame can leave a few stray bytes in front of the
/// next timestamp.
pub fn strip_stream_header(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut start = 0;
    while bytes.len() - start >= 5 {
        if bytes[start] == b'2' && bytes[start + 4] == b'-' {
            break;
        }
        start += 1;
    }
    // Lossy decoding may put multi-byte replacement chars in front
    while !line.is_char_boundary(start) {
        start += 1;
    }
    &line[start..]
}

/// Split `<timestamp> <text>` at the first space. The text is trimmed of
/// spaces, tabs and line breaks; a line with no space has empty text.
pub fn parse_timestamped_line(line: &str) -> Result<FeedLine> {
    let (stamp, rest) = line.split_once(' ').unwrap_or((line, ""));
    let timestamp = DateTime::parse_from_rfc3339(stamp)
        .with_context(|| format!("Invalid timestamp '{}'", stamp))?
        .with_timezone(&Utc);
    let text = rest.trim_matches([' ', '\n', '\t', '\r']);
    Ok(FeedLine::new(timestamp, text))
}

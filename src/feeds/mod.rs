//! Line sources for the merge engine.
//!
//! A feed yields `(timestamp, text)` pairs for one named source and reports
//! `Ok(None)` once the source has closed for good.

pub mod channel;
pub mod command;
pub mod docker;
pub mod line;

use anyhow::Result;
use chrono::{DateTime, Utc};

pub use channel::ChannelFeed;
pub use command::CommandFeed;
pub use line::{parse_timestamped_line, strip_stream_header, LineFeed};

/// One timestamped raw line as produced by a feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLine {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl FeedLine {
    pub fn new(timestamp: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }
}

/// Blocking producer of lines for a single source.
///
/// `recv` returns `Ok(Some)` for each line, `Ok(None)` on clean closure and
/// `Err` when the transport fails. After `Ok(None)` or `Err` the feed is not
/// polled again.
pub trait SourceFeed: Send {
    fn recv(&mut self) -> Result<Option<FeedLine>>;
}

impl<F: SourceFeed + ?Sized> SourceFeed for Box<F> {
    fn recv(&mut self) -> Result<Option<FeedLine>> {
        (**self).recv()
    }
}

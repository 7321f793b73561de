// Core library for the mergetail log merger

pub mod cli;
pub mod colors;
pub mod config;
pub mod config_file;
pub mod entry;
pub mod feeds;
pub mod formatters;
pub mod logging;
pub mod merge;
pub mod parsers;
pub mod platform;
pub mod runner;
pub mod stats;
pub mod tty;

pub use config::{ColorMode, MergetailConfig, SourceSpec, StatsFormat};
pub use entry::{FieldPair, LogLevel, ParsedEntry};
pub use feeds::{FeedLine, SourceFeed};
pub use formatters::{EntryFormatter, LinePrefix};
pub use merge::{MergeBuilder, MergeEngine, SourceName, TimestampedLine};
pub use parsers::{parse, Grammar, LogEntryParser, ParseError};

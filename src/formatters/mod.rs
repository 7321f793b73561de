mod default;
mod prefix;

pub use default::EntryFormatter;
pub use prefix::{validate_ts_format, LinePrefix, DEFAULT_TS_FORMAT};

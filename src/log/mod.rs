//! Parsing for perf interval logs (`perf stat -I` style text output).

pub mod parse;
pub mod row;

pub use parse::{parse_log_file, parse_log_text};
pub use row::TimestampRow;

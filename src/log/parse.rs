use crate::Result;
use crate::log::row::TimestampRow;
use crate::schema::CounterSchema;

use anyhow::Context;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Parse one perf interval log into an ordered sequence of timestamp rows.
///
/// Expected columns (whitespace-separated, extra trailing tokens allowed):
/// timestamp  count  event-name ...
///
/// Example:
/// 1.000123   60,000,000   instructions   # 1.23 insn per cycle
pub fn parse_log_file(path: &Path, schema: &CounterSchema) -> Result<Vec<TimestampRow>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read perf log {}", path.display()))?;
    Ok(parse_log_text(&text, schema))
}

/// Parse log text into timestamp rows.
///
/// Every syntactically valid line opens or extends the row for its
/// timestamp; a timestamp change finalizes the pending row. Lines that do
/// not fit the shape (comments, headers, `<not counted>` markers, short
/// lines) are skipped silently; malformed input is tolerated, not reported.
/// A file with zero valid lines yields an empty sequence.
pub fn parse_log_text(text: &str, schema: &CounterSchema) -> Vec<TimestampRow> {
    // Capture:
    // 1) timestamp: float/integer seconds
    // 2) count: integer, thousands-separator commas permitted
    // 3) event name: one token
    let re = Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?)\s+([0-9][0-9,]*)\s+(\S+)")
        .expect("log line regex is valid");

    let mut out: Vec<TimestampRow> = Vec::new();
    let mut current: Option<(f64, BTreeMap<usize, u64>)> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let caps = match re.captures(line) {
            Some(c) => c,
            None => continue,
        };

        let time: f64 = match caps[1].parse() {
            Ok(t) => t,
            Err(_) => continue,
        };
        let count: u64 = match caps[2].replace(',', "").parse() {
            Ok(c) => c,
            Err(_) => continue,
        };
        let event = &caps[3];

        let switch = match &current {
            Some((cur_time, _)) => *cur_time != time,
            None => true,
        };
        if switch {
            // Timestamp changed: finalize the pending row.
            if let Some((cur_time, counts)) = current.take() {
                out.push(finalize(cur_time, &counts, schema));
            }
            current = Some((time, BTreeMap::new()));
        }

        // Counters outside the schema are dropped; a counter repeated within
        // one timestamp overwrites the earlier value (last write wins).
        if let Some(idx) = schema.index_of(event) {
            if let Some((_, counts)) = &mut current {
                counts.insert(idx, count);
            }
        }
    }

    if let Some((time, counts)) = current {
        out.push(finalize(time, &counts, schema));
    }

    out
}

/// Project accumulated counts onto the schema; absent counters default to 0.
fn finalize(time: f64, counts: &BTreeMap<usize, u64>, schema: &CounterSchema) -> TimestampRow {
    let mut row = TimestampRow::zeroed(time, schema);
    for (&idx, &count) in counts {
        row.counts[idx] = count;
    }
    row
}

//! Threshold aggregation: fold consecutive timestamp rows into windows whose
//! cumulative instruction count meets a configured threshold, then combine
//! windows across files into one table.

use crate::Result;
use crate::log::{TimestampRow, parse_log_file};
use crate::schema::CounterSchema;
use crate::table::CombinedTable;

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Merge consecutive rows by summation until the running `instructions`
/// count reaches `threshold`, emitting one window per merge group.
///
/// Each window carries the `time` of the last row folded into it. A trailing
/// accumulator below threshold is discarded; if it already reached the
/// threshold it is emitted. Every returned window therefore satisfies
/// `instructions >= threshold`.
///
/// `threshold` is assumed positive; the CLI rejects zero before we get here.
pub fn merge_windows(
    rows: &[TimestampRow],
    threshold: u64,
    schema: &CounterSchema,
) -> Vec<TimestampRow> {
    let mut out = Vec::new();
    let mut acc: Option<TimestampRow> = None;

    for row in rows {
        match &mut acc {
            None => acc = Some(row.clone()),
            Some(w) => {
                for (sum, c) in w.counts.iter_mut().zip(&row.counts) {
                    *sum += c;
                }
                // Take the latest timestamp.
                w.time = row.time;
            }
        }

        if let Some(w) = &acc {
            if w.instructions(schema) >= threshold {
                out.push(acc.take().expect("accumulator is open"));
            }
        }
    }

    // Leftover accumulator only survives if it passed the threshold.
    if let Some(w) = acc {
        if w.instructions(schema) >= threshold {
            out.push(w);
        }
    }

    out
}

/// Parse and aggregate every log file, concatenating the resulting windows
/// in file-creation-time order into one combined table.
pub fn build_dataset(
    paths: &[PathBuf],
    threshold: u64,
    schema: &CounterSchema,
) -> Result<CombinedTable> {
    let ordered = sort_by_creation_time(paths)?;

    let mut windows = Vec::new();
    for path in &ordered {
        println!("Processing {} ...", path.display());
        let rows = parse_log_file(path, schema)?;
        windows.extend(merge_windows(&rows, threshold, schema));
    }

    Ok(CombinedTable::new(schema.clone(), windows))
}

/// Order paths by file creation time, oldest first, falling back to the
/// modification time on filesystems that do not record creation.
fn sort_by_creation_time(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut stamped: Vec<(SystemTime, PathBuf)> = Vec::with_capacity(paths.len());
    for path in paths {
        stamped.push((file_timestamp(path)?, path.clone()));
    }
    stamped.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(stamped.into_iter().map(|(_, p)| p).collect())
}

fn file_timestamp(path: &Path) -> Result<SystemTime> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("stat log file {}", path.display()))?;
    Ok(meta.created().or_else(|_| meta.modified()).with_context(|| {
        format!("no creation or modification time for {}", path.display())
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn schema() -> CounterSchema {
        CounterSchema::new(vec!["cycles".to_string(), "instructions".to_string()]).unwrap()
    }

    fn row(time: f64, cycles: u64, instructions: u64) -> TimestampRow {
        TimestampRow {
            time,
            counts: vec![cycles, instructions],
        }
    }

    #[test]
    fn merges_until_threshold_and_drops_trailing_partial() {
        let schema = schema();
        let rows = vec![
            row(0.0, 1, 60_000_000),
            row(1.0, 2, 50_000_000),
            row(2.0, 3, 40_000_000),
        ];
        let windows = merge_windows(&rows, 100_000_000, &schema);

        // 60M + 50M closes one window at t=1; the lone 40M row is dropped.
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].time, 1.0);
        assert_eq!(windows[0].counts, vec![3, 110_000_000]);
    }

    #[test]
    fn lone_trailing_row_below_threshold_yields_no_windows() {
        let schema = schema();
        let rows = vec![row(0.0, 1, 40_000_000)];
        assert_eq!(merge_windows(&rows, 100_000_000, &schema), vec![]);
    }

    #[test]
    fn single_row_meeting_threshold_is_emitted_alone() {
        let schema = schema();
        let rows = vec![row(0.0, 1, 100_000_000), row(1.0, 1, 120_000_000)];
        let windows = merge_windows(&rows, 100_000_000, &schema);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].counts[1], 100_000_000);
        assert_eq!(windows[1].counts[1], 120_000_000);
    }

    #[test]
    fn trailing_accumulator_meeting_threshold_is_emitted() {
        // The loop emits eagerly, so a surviving trailing accumulator can
        // only meet the threshold on the final row; it must not be lost.
        let schema = schema();
        let rows = vec![row(0.0, 1, 60_000_000), row(1.0, 1, 60_000_000)];
        let windows = merge_windows(&rows, 100_000_000, &schema);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].counts[1], 120_000_000);
    }

    #[test]
    fn every_window_meets_threshold() {
        let schema = schema();
        let rows: Vec<TimestampRow> = (0..50u64)
            .map(|i| row(i as f64, i, (i % 7) * 10_000_000))
            .collect();
        let threshold = 25_000_000;
        for w in merge_windows(&rows, threshold, &schema) {
            assert!(w.instructions(&schema) >= threshold);
        }
    }

    #[test]
    fn dataset_pipeline_end_to_end() {
        let dir = std::env::temp_dir().join(format!("perfmodel-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let log_path = dir.join("matmul_perf.txt");
        std::fs::write(
            &log_path,
            "# started on Mon Aug 25 2025\n\
             0.000000  60,000,000  instructions\n\
             0.000000  80,000,000  cycles\n\
             1.000000  50,000,000  instructions\n\
             1.000000  70,000,000  cycles\n",
        )
        .unwrap();

        let schema = CounterSchema::default_events();
        let table = build_dataset(&[log_path], 100_000_000, &schema).unwrap();

        assert_eq!(table.len(), 1);
        let row = &table.rows()[0];
        assert_eq!(row.time, 1.0);
        assert_eq!(row.instructions(&schema), 110_000_000);
        assert_eq!(row.counts[schema.index_of("cycles").unwrap()], 150_000_000);

        // Persist and reload through both serializations.
        let csv_path = dir.join("combined_perf.csv");
        let json_path = dir.join("combined_perf.json");
        table.write_csv_path(&csv_path).unwrap();
        table.write_json_path(&json_path).unwrap();
        assert_eq!(CombinedTable::read_csv_path(&csv_path).unwrap(), table);
        assert_eq!(CombinedTable::read_json_path(&json_path).unwrap(), table);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn window_sums_are_element_wise() {
        let schema = schema();
        let rows = vec![row(0.5, 10, 30), row(1.5, 20, 40)];
        let windows = merge_windows(&rows, 60, &schema);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].counts, vec![30, 70]);
        assert_eq!(windows[0].time, 1.5);
    }
}

//! Explicit counter schema: the ordered set of event names the pipeline
//! recognizes. The schema is passed into the parser and the aggregator so
//! that every produced row carries exactly these columns, in this order.

use crate::Result;
use anyhow::bail;
use std::collections::BTreeSet;

pub const INDEX_COL: &str = "Index";
pub const TIME_COL: &str = "time";
pub const CYCLES_COL: &str = "cycles";
pub const INSTRUCTIONS_COL: &str = "instructions";

/// Events collected by the perf runs, in output-column order.
const DEFAULT_EVENTS: &[&str] = &[
    "cycles",
    "instructions",
    "branch-misses",
    "ls_dc_accesses",
    "l1_data_cache_fills_all",
    "l2_cache_req_stat.ic_access_in_l2",
    "l2_cache_req_stat.ic_dc_hit_in_l2",
    "l2_cache_req_stat.ic_dc_miss_in_l2",
    "ls_dmnd_fills_from_sys.int_cache",
    "ls_dmnd_fills_from_sys.mem_io_local",
    "ls_dispatch.ld_dispatch",
    "fp_ret_sse_avx_ops.all",
];

/// An ordered set of recognized counter names.
///
/// Rows produced against a schema hold one count per counter, in schema
/// order; counters outside the schema are dropped at parse time. The
/// `instructions` counter must be present because the threshold aggregator
/// keys its windows on it.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSchema {
    counters: Vec<String>,
    instructions_idx: usize,
}

impl CounterSchema {
    /// Build a schema from an ordered counter list.
    ///
    /// Fails on duplicate names and when `instructions` is absent.
    pub fn new(counters: Vec<String>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for name in &counters {
            if name.trim().is_empty() {
                bail!("counter schema contains an empty name");
            }
            if !seen.insert(name.as_str()) {
                bail!("duplicate counter name in schema: {}", name);
            }
        }

        let instructions_idx = match counters.iter().position(|c| c == INSTRUCTIONS_COL) {
            Some(i) => i,
            None => bail!("counter schema must include '{}'", INSTRUCTIONS_COL),
        };

        Ok(CounterSchema {
            counters,
            instructions_idx,
        })
    }

    /// The schema used by the dataset builder: the twelve events collected
    /// by the perf runs.
    pub fn default_events() -> Self {
        Self::new(DEFAULT_EVENTS.iter().map(|s| s.to_string()).collect())
            .expect("default event list is valid")
    }

    pub fn counters(&self) -> &[String] {
        &self.counters
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Position of `name` in the schema, if recognized.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.counters.iter().position(|c| c == name)
    }

    /// Position of the `instructions` counter.
    pub fn instructions_index(&self) -> usize {
        self.instructions_idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_schema_has_twelve_events() {
        let schema = CounterSchema::default_events();
        assert_eq!(schema.len(), 12);
        assert!(!schema.is_empty());
        assert_eq!(schema.counters()[0], "cycles");
        assert_eq!(
            schema.instructions_index(),
            schema.index_of("instructions").unwrap()
        );
    }

    #[test]
    fn rejects_duplicates() {
        let err = CounterSchema::new(vec![
            "instructions".to_string(),
            "cycles".to_string(),
            "cycles".to_string(),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn requires_instructions() {
        let err = CounterSchema::new(vec!["cycles".to_string()]).unwrap_err();
        assert!(err.to_string().contains("instructions"));
    }
}

use crate::schema::CounterSchema;

/// One row per distinct timestamp in a perf log: the timestamp plus one
/// count per schema counter, in schema order.
///
/// The same shape is reused for aggregated windows, where `counts` holds
/// element-wise sums and `time` the timestamp of the last folded row.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampRow {
    pub time: f64,
    pub counts: Vec<u64>,
}

impl TimestampRow {
    pub fn zeroed(time: f64, schema: &CounterSchema) -> Self {
        TimestampRow {
            time,
            counts: vec![0; schema.len()],
        }
    }

    /// The row's `instructions` count.
    pub fn instructions(&self, schema: &CounterSchema) -> u64 {
        self.counts[schema.instructions_index()]
    }
}

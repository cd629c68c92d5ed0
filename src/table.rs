//! The combined dataset table: aggregated windows from every input file,
//! indexed in emission order, serialized as CSV and JSON.
//!
//! Both serializations carry identical numeric values; re-reading either one
//! reconstructs the same table up to text-to-number formatting.

use crate::Result;
use crate::log::TimestampRow;
use crate::schema::{self, CounterSchema};

use anyhow::{Context, bail};
use serde_json::Value;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Aggregated windows across all input files, in file-visitation order.
///
/// The `Index` column is implicit: a row's index is its position.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedTable {
    schema: CounterSchema,
    rows: Vec<TimestampRow>,
}

impl CombinedTable {
    pub fn new(schema: CounterSchema, rows: Vec<TimestampRow>) -> Self {
        CombinedTable { schema, rows }
    }

    pub fn schema(&self) -> &CounterSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[TimestampRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in serialization order: Index, time, then the schema
    /// counters.
    pub fn column_names(&self) -> Vec<String> {
        let mut cols = vec![schema::INDEX_COL.to_string(), schema::TIME_COL.to_string()];
        cols.extend(self.schema.counters().iter().cloned());
        cols
    }

    /// Write the row-oriented delimited serialization.
    pub fn write_csv<W: Write>(&self, w: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(w);
        wtr.write_record(self.column_names())?;
        for (idx, row) in self.rows.iter().enumerate() {
            let mut record = vec![idx.to_string(), row.time.to_string()];
            record.extend(row.counts.iter().map(|c| c.to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv_path(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("create {}", path.display()))?;
        self.write_csv(file)
            .with_context(|| format!("write CSV {}", path.display()))
    }

    /// Write the record-oriented serialization: a pretty-printed array of
    /// records, one mapping per row, same column names as the CSV.
    pub fn write_json<W: Write>(&self, w: W) -> Result<()> {
        let mut records = Vec::with_capacity(self.rows.len());
        for (idx, row) in self.rows.iter().enumerate() {
            let mut record = serde_json::Map::new();
            record.insert(schema::INDEX_COL.to_string(), Value::from(idx as u64));
            record.insert(schema::TIME_COL.to_string(), json_f64(row.time)?);
            for (name, count) in self.schema.counters().iter().zip(&row.counts) {
                record.insert(name.clone(), Value::from(*count));
            }
            records.push(Value::Object(record));
        }
        serde_json::to_writer_pretty(w, &Value::Array(records))?;
        Ok(())
    }

    pub fn write_json_path(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("create {}", path.display()))?;
        self.write_json(file)
            .with_context(|| format!("write JSON {}", path.display()))
    }

    /// Read the delimited serialization back.
    pub fn read_csv<R: Read>(r: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(r);
        let headers = rdr.headers()?.clone();
        let cols: Vec<&str> = headers.iter().collect();
        if cols.len() < 2 || cols[0] != schema::INDEX_COL || cols[1] != schema::TIME_COL {
            bail!(
                "combined table CSV must start with '{}' and '{}' columns",
                schema::INDEX_COL,
                schema::TIME_COL
            );
        }
        let schema = CounterSchema::new(cols[2..].iter().map(|s| s.to_string()).collect())?;

        let mut rows = Vec::new();
        for (lineno, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() != cols.len() {
                bail!("combined table CSV row {} has wrong field count", lineno);
            }
            let time: f64 = record[1]
                .parse()
                .with_context(|| format!("bad time at CSV row {}", lineno))?;
            let mut counts = Vec::with_capacity(schema.len());
            for field in record.iter().skip(2) {
                counts.push(
                    field
                        .parse::<u64>()
                        .with_context(|| format!("bad count at CSV row {}", lineno))?,
                );
            }
            rows.push(TimestampRow { time, counts });
        }

        Ok(CombinedTable { schema, rows })
    }

    pub fn read_csv_path(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        Self::read_csv(file).with_context(|| format!("read CSV {}", path.display()))
    }

    /// Read the record-oriented serialization back. The column set is
    /// recovered from the first record, so an empty array is rejected.
    pub fn read_json<R: Read>(r: R) -> Result<Self> {
        let value: Value = serde_json::from_reader(r)?;
        let records = match value {
            Value::Array(a) => a,
            _ => bail!("combined table JSON must be an array of records"),
        };
        let first = match records.first() {
            Some(Value::Object(m)) => m,
            Some(_) => bail!("combined table JSON records must be objects"),
            None => bail!("combined table JSON is empty; cannot recover columns"),
        };

        let counters: Vec<String> = first
            .keys()
            .filter(|k| k.as_str() != schema::INDEX_COL && k.as_str() != schema::TIME_COL)
            .cloned()
            .collect();
        let schema = CounterSchema::new(counters)?;

        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let obj = match record {
                Value::Object(m) => m,
                _ => bail!("combined table JSON record {} is not an object", i),
            };
            let time = obj
                .get(schema::TIME_COL)
                .and_then(Value::as_f64)
                .with_context(|| format!("record {} missing numeric time", i))?;
            let mut counts = Vec::with_capacity(schema.len());
            for name in schema.counters() {
                counts.push(
                    obj.get(name)
                        .and_then(Value::as_u64)
                        .with_context(|| format!("record {} missing counter {}", i, name))?,
                );
            }
            rows.push(TimestampRow { time, counts });
        }

        Ok(CombinedTable { schema, rows })
    }

    pub fn read_json_path(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        Self::read_json(file).with_context(|| format!("read JSON {}", path.display()))
    }
}

fn json_f64(v: f64) -> Result<Value> {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .with_context(|| format!("non-finite value {} cannot be serialized", v))
}

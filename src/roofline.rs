//! Roofline chart description (roofline.json) and its validation.
//!
//! JSON shape:
//! {
//!   "machine": {
//!     "peak": 116.4,                 // compute-bound ceiling
//!     "perf_unit": "GFLOP/s",        // y-axis label (default GFLOP/s)
//!     "oi_unit": "FLOP/byte",        // x-axis label (default FLOP/byte)
//!     "bandwidths": [
//!       { "level": "DRAM", "value": 50.0 },   // perf per unit of OI
//!       { "level": "L1", "value": 900.0 }
//!     ]
//!   },
//!   "points": [
//!     { "label": "i,k,j (T)", "oi": 28.455, "perf": 14.354 }
//!   ]
//! }
//!
//! The same shape covers FLOP rooflines (GFLOPS vs FLOPs/byte) and
//! graph-traversal rooflines (TEPS vs edges/byte); only the unit labels
//! differ. A ceiling at operational intensity `oi` is `min(peak, oi * bw)`.

use crate::Result;

use anyhow::{Context, bail};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct RawRoofline {
    pub machine: RawMachine,

    #[serde(default)]
    pub points: Vec<RawPoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMachine {
    pub peak: f64,

    #[serde(default)]
    pub perf_unit: Option<String>,

    #[serde(default)]
    pub oi_unit: Option<String>,

    #[serde(default)]
    pub bandwidths: Vec<RawBandwidth>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBandwidth {
    pub level: String,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPoint {
    #[serde(default)]
    pub label: String,
    pub oi: f64,
    pub perf: f64,
}

/// Validated roofline description ready for rendering.
#[derive(Debug, Clone)]
pub struct RooflineSpec {
    pub peak: f64,
    pub perf_unit: String,
    pub oi_unit: String,
    pub bandwidths: Vec<Bandwidth>,
    pub points: Vec<MeasuredPoint>,
}

#[derive(Debug, Clone)]
pub struct Bandwidth {
    pub level: String,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct MeasuredPoint {
    pub label: String,
    pub oi: f64,
    pub perf: f64,
}

impl RawRoofline {
    /// Check that every ceiling and point is positive and level names are
    /// unique.
    pub fn validate(&self) -> Result<RooflineSpec> {
        if !(self.machine.peak > 0.0) {
            bail!("machine peak must be positive, got {}", self.machine.peak);
        }

        let mut levels = BTreeSet::new();
        let mut bandwidths = Vec::with_capacity(self.machine.bandwidths.len());
        for bw in &self.machine.bandwidths {
            if bw.level.trim().is_empty() {
                bail!("bandwidth level name cannot be empty");
            }
            if !levels.insert(bw.level.as_str()) {
                bail!("duplicate bandwidth level '{}'", bw.level);
            }
            if !(bw.value > 0.0) {
                bail!("bandwidth for level '{}' must be positive, got {}", bw.level, bw.value);
            }
            bandwidths.push(Bandwidth {
                level: bw.level.clone(),
                value: bw.value,
            });
        }

        let mut points = Vec::with_capacity(self.points.len());
        for (i, p) in self.points.iter().enumerate() {
            if !(p.oi > 0.0) || !(p.perf > 0.0) {
                bail!(
                    "point {} ({:?}) must have positive oi and perf",
                    i,
                    p.label
                );
            }
            points.push(MeasuredPoint {
                label: p.label.clone(),
                oi: p.oi,
                perf: p.perf,
            });
        }

        Ok(RooflineSpec {
            peak: self.machine.peak,
            perf_unit: self
                .machine
                .perf_unit
                .clone()
                .unwrap_or_else(|| "GFLOP/s".to_string()),
            oi_unit: self
                .machine
                .oi_unit
                .clone()
                .unwrap_or_else(|| "FLOP/byte".to_string()),
            bandwidths,
            points,
        })
    }
}

impl RooflineSpec {
    /// Performance bound at `oi` under the ceiling for bandwidth `bw`.
    pub fn ceiling(&self, oi: f64, bw: f64) -> f64 {
        self.peak.min(oi * bw)
    }

    pub fn load(path: &Path) -> Result<RooflineSpec> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read roofline spec {}", path.display()))?;
        let raw: RawRoofline = serde_json::from_str(&text)
            .with_context(|| format!("parse roofline spec {}", path.display()))?;
        raw.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(json: &str) -> RawRoofline {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn valid_spec_round_trips_through_validation() {
        let spec = raw(
            r#"{
                "machine": {
                    "peak": 116.4,
                    "bandwidths": [
                        { "level": "DRAM", "value": 50.0 },
                        { "level": "L1", "value": 900.0 }
                    ]
                },
                "points": [
                    { "label": "i,k,j (T)", "oi": 28.455, "perf": 14.354 }
                ]
            }"#,
        )
        .validate()
        .unwrap();

        assert_eq!(spec.peak, 116.4);
        assert_eq!(spec.perf_unit, "GFLOP/s");
        assert_eq!(spec.bandwidths.len(), 2);
        assert_eq!(spec.points[0].label, "i,k,j (T)");
    }

    #[test]
    fn ceiling_is_min_of_peak_and_slope() {
        let spec = raw(r#"{ "machine": { "peak": 100.0 } }"#).validate().unwrap();
        assert_eq!(spec.ceiling(0.5, 50.0), 25.0);
        assert_eq!(spec.ceiling(10.0, 50.0), 100.0);
    }

    #[test]
    fn duplicate_levels_are_rejected() {
        let err = raw(
            r#"{
                "machine": {
                    "peak": 1.0,
                    "bandwidths": [
                        { "level": "L1", "value": 1.0 },
                        { "level": "L1", "value": 2.0 }
                    ]
                }
            }"#,
        )
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn nonpositive_values_are_rejected() {
        assert!(
            raw(r#"{ "machine": { "peak": 0.0 } }"#)
                .validate()
                .is_err()
        );
        assert!(
            raw(
                r#"{
                    "machine": { "peak": 1.0 },
                    "points": [ { "oi": -1.0, "perf": 2.0 } ]
                }"#
            )
            .validate()
            .is_err()
        );
    }
}

//! CPI regression pipeline: load a combined-table CSV, resolve predictor
//! columns, fit a non-negative linear model of CPI on a deterministic 80/20
//! split, and report residuals, metrics, and a prediction-vs-actual plot.

pub mod features;
pub mod metrics;
pub mod solve;

use crate::Result;
use crate::render;
use crate::schema::{CYCLES_COL, INSTRUCTIONS_COL};

use self::features::{FeatureSource, ResolvedFeature};
use self::metrics::FitMetrics;
use self::solve::FitOutcome;

use anyhow::{Context, bail};
use chrono::Local;
use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};

const TEST_FRACTION: f64 = 0.2;
const SPLIT_SEED: u64 = 42;

/// Paths of the three artifacts a regression run produces.
#[derive(Debug)]
pub struct RegressionArtifacts {
    pub residuals_csv: PathBuf,
    pub metrics_json: PathBuf,
    pub plot_png: PathBuf,
}

/// Run the whole pipeline on `input`, writing timestamped artifacts into
/// `out_dir`.
pub fn run(input: &Path, out_dir: &Path) -> Result<RegressionArtifacts> {
    let table = load_input(input)?;
    println!("Loaded CSV with columns: {:?}", table.columns);

    let cycles_idx = match table.column_index(CYCLES_COL) {
        Some(i) => i,
        None => bail!("input must contain a '{}' column", CYCLES_COL),
    };
    let instr_idx = match table.column_index(INSTRUCTIONS_COL) {
        Some(i) => i,
        None => bail!("input must contain an '{}' column", INSTRUCTIONS_COL),
    };

    // Target: CPI = cycles / instructions; rows with zero instructions are
    // dropped, not errors.
    let mut kept_rows = Vec::new();
    let mut cpi = Vec::new();
    for (i, row) in table.rows.iter().enumerate() {
        let instr = row[instr_idx];
        if instr == 0.0 {
            continue;
        }
        let value = row[cycles_idx] / instr;
        if !value.is_finite() {
            continue;
        }
        kept_rows.push(i);
        cpi.push(value);
    }
    let n = kept_rows.len();
    println!("Samples after dropping undefined CPI: {}", n);
    if n < 2 {
        bail!("need at least 2 usable samples, got {}", n);
    }

    let resolved = features::resolve_features(&table.columns);
    for f in &resolved {
        if f.is_defaulted() {
            eprintln!(
                "WARN: no column matches feature {}; substituting a zero column",
                f.name
            );
        }
    }

    let p = resolved.len();
    let x = DMatrix::from_fn(n, p, |r, c| match &resolved[c].source {
        FeatureSource::Column { index, .. } => table.rows[kept_rows[r]][*index],
        FeatureSource::Defaulted => 0.0,
    });
    let y = DVector::from_vec(cpi);

    // Plot axis follows the filtered row position, as the dataset's `time`
    // restarts per source file and is not unique.
    let plot_time: Vec<f64> = (0..n).map(|i| i as f64).collect();

    let (train_idx, val_idx) = split_indices(n, TEST_FRACTION, SPLIT_SEED);
    println!(
        "Train samples: {}, Validation samples: {}",
        train_idx.len(),
        val_idx.len()
    );

    let x_train = x.select_rows(train_idx.iter());
    let y_train = y.select_rows(train_idx.iter());
    let x_val = x.select_rows(val_idx.iter());
    let y_val = y.select_rows(val_idx.iter());

    let outcome = match solve::fit_primary(&x_train, &y_train) {
        Ok(fit) => FitOutcome::Primary(fit),
        Err(err) => {
            eprintln!("WARN: constrained solve failed ({}); falling back to centered solve", err);
            FitOutcome::Fallback(solve::fit_fallback(&x_train, &y_train)?)
        }
    };
    let fit = outcome.fit();

    println!("Solver: {}", outcome.solver_name());
    println!("Intercept: {}", fit.intercept);
    println!("Coefficients (non-negative):");
    for (f, c) in resolved.iter().zip(&fit.coefficients) {
        println!("  {}: {:.6}", f.name, c);
    }

    let y_pred = fit.predict(&x_val);
    let y_val_s: Vec<f64> = y_val.iter().copied().collect();
    let y_pred_s: Vec<f64> = y_pred.iter().copied().collect();
    let fit_metrics = metrics::compute_metrics(&y_val_s, &y_pred_s, p);
    let res = metrics::residuals(&y_val_s, &y_pred_s);

    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let artifacts = RegressionArtifacts {
        residuals_csv: out_dir.join(format!("residuals_{}.csv", stamp)),
        metrics_json: out_dir.join(format!("regression_metrics_{}.json", stamp)),
        plot_png: out_dir.join(format!("pred_vs_actual_{}.png", stamp)),
    };

    write_residuals(
        &artifacts.residuals_csv,
        &val_idx,
        &plot_time,
        &y_val_s,
        &y_pred_s,
        &res,
    )?;
    write_metrics(
        &artifacts.metrics_json,
        &resolved,
        &outcome,
        &fit_metrics,
        train_idx.len(),
        val_idx.len(),
    )?;

    let series: Vec<(f64, f64, f64)> = val_idx
        .iter()
        .enumerate()
        .map(|(k, &i)| (plot_time[i], y_val_s[k], y_pred_s[k]))
        .collect();
    render::render_pred_vs_actual(&series, &artifacts.plot_png)?;

    println!("===== SUMMARY =====");
    println!("RMSE: {}", fit_metrics.rmse);
    println!("R2: {}", fit_metrics.r2);
    println!("Adjusted R2: {}", fit_metrics.adj_r2);
    println!(
        "F-statistic: {:?} p-value: {:?}",
        fit_metrics.f_stat, fit_metrics.f_pvalue
    );

    Ok(artifacts)
}

/// The regression input: every cell coerced to f64 (blank or non-numeric
/// cells become 0, matching the permissive ingest of the dataset builder).
struct InputTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl InputTable {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

fn load_input(path: &Path) -> Result<InputTable> {
    let file = File::open(path)
        .with_context(|| format!("CSV file not found: {}", path.display()))?;
    let mut rdr = csv::Reader::from_reader(file);
    let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|cell| cell.trim().parse::<f64>().unwrap_or(0.0))
                .collect(),
        );
    }

    Ok(InputTable { columns, rows })
}

/// Deterministic 80/20 partition: a seeded shuffle of row positions, the
/// first fifth held out for validation. Same `n` and `seed` always produce
/// the same split.
fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let n_val = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);
    let (val, train) = order.split_at(n_val);
    (train.to_vec(), val.to_vec())
}

fn write_residuals(
    path: &Path,
    val_idx: &[usize],
    plot_time: &[f64],
    y_true: &[f64],
    y_pred: &[f64],
    residuals: &[f64],
) -> Result<()> {
    // Rows ordered by original index, like the rest of the artifacts.
    let mut order: Vec<usize> = (0..val_idx.len()).collect();
    order.sort_by_key(|&k| val_idx[k]);

    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut wtr = csv::Writer::from_writer(file);
    wtr.write_record(["index", "time", "y_true", "y_pred", "residual"])?;
    for k in order {
        let i = val_idx[k];
        wtr.write_record(&[
            i.to_string(),
            plot_time[i].to_string(),
            y_true[k].to_string(),
            y_pred[k].to_string(),
            residuals[k].to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct MetricsReport<'a> {
    n_train: usize,
    n_val: usize,
    solver: &'static str,
    features: Vec<&'static str>,
    /// Matched source column per feature; null when the feature was
    /// substituted with zeros.
    feature_sources: serde_json::Map<String, Value>,
    intercept: f64,
    coefficients: serde_json::Map<String, Value>,
    #[serde(flatten)]
    metrics: &'a FitMetrics,
}

fn write_metrics(
    path: &Path,
    resolved: &[ResolvedFeature],
    outcome: &FitOutcome,
    fit_metrics: &FitMetrics,
    n_train: usize,
    n_val: usize,
) -> Result<()> {
    let fit = outcome.fit();

    let mut feature_sources = serde_json::Map::new();
    let mut coefficients = serde_json::Map::new();
    for (f, c) in resolved.iter().zip(&fit.coefficients) {
        let source = match &f.source {
            FeatureSource::Column { name, .. } => Value::String(name.clone()),
            FeatureSource::Defaulted => Value::Null,
        };
        feature_sources.insert(f.name.to_string(), source);
        coefficients.insert(f.name.to_string(), Value::from(*c));
    }

    let report = MetricsReport {
        n_train,
        n_val,
        solver: outcome.solver_name(),
        features: resolved.iter().map(|f| f.name).collect(),
        feature_sources,
        intercept: fit.intercept,
        coefficients,
        metrics: fit_metrics,
    };

    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    serde_json::to_writer_pretty(file, &report)?;
    Ok(())
}

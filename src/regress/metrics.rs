//! Fit-quality statistics on the held-out partition.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

/// Standard ANOVA decomposition of the validation fit.
///
/// `f_stat`/`f_pvalue` are `None` when the decomposition degenerates (zero
/// residual variance or an invalid F distribution).
#[derive(Debug, Clone, Serialize)]
pub struct FitMetrics {
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    #[serde(rename = "R2")]
    pub r2: f64,
    #[serde(rename = "adjR2")]
    pub adj_r2: f64,
    #[serde(rename = "SSE")]
    pub sse: f64,
    #[serde(rename = "SSR")]
    pub ssr: f64,
    #[serde(rename = "SST")]
    pub sst: f64,
    #[serde(rename = "F")]
    pub f_stat: Option<f64>,
    #[serde(rename = "F_pvalue")]
    pub f_pvalue: Option<f64>,
}

/// Per-row residuals `y_true - y_pred`.
pub fn residuals(y_true: &[f64], y_pred: &[f64]) -> Vec<f64> {
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| t - p)
        .collect()
}

/// Compute RMSE, R², adjusted R², and the F statistic with its p-value.
///
/// `predictors` is the number of model predictors, not counting the
/// intercept.
pub fn compute_metrics(y_true: &[f64], y_pred: &[f64], predictors: usize) -> FitMetrics {
    let n = y_true.len();
    let p = predictors;

    let res = residuals(y_true, y_pred);
    let sse: f64 = res.iter().map(|r| r * r).sum();
    let y_mean = y_true.iter().sum::<f64>() / n.max(1) as f64;
    let sst: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ssr = sst - sse;

    let r2 = if sst > 0.0 { 1.0 - sse / sst } else { 0.0 };
    let rmse = (sse / n.max(1) as f64).sqrt();
    let dof_resid = n.saturating_sub(p + 1).max(1);
    let adj_r2 = 1.0 - (1.0 - r2) * (n.saturating_sub(1)) as f64 / dof_resid as f64;

    // F = (SSR/p) / (SSE/(n-p-1)).
    let denom = sse / dof_resid as f64;
    let num = ssr / p.max(1) as f64;
    let f_stat = if denom > 0.0 { Some(num / denom) } else { None };

    let f_pvalue = f_stat.and_then(|f| {
        FisherSnedecor::new(p.max(1) as f64, dof_resid as f64)
            .ok()
            .map(|dist| 1.0 - dist.cdf(f))
    });

    FitMetrics {
        rmse,
        r2,
        adj_r2,
        sse,
        ssr,
        sst,
        f_stat,
        f_pvalue,
    }
}

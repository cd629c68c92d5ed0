//! Plot rendering via plotters.

use crate::Result;
use crate::roofline::RooflineSpec;

use anyhow::bail;
use plotters::prelude::*;
use std::path::Path;

const PLOT_SIZE: (u32, u32) = (1024, 768);

/// Render a log-log roofline chart: one slanted ceiling per memory level,
/// the flat compute peak, and the measured points.
pub fn render_roofline(spec: &RooflineSpec, out: &Path) -> Result<()> {
    let (x_min, x_max, y_min, y_max) = roofline_bounds(spec);

    let root = BitMapBackend::new(out, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Roofline", ("sans-serif", 30))
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d((x_min..x_max).log_scale(), (y_min..y_max).log_scale())?;

    chart
        .configure_mesh()
        .x_desc(format!("Operational Intensity ({})", spec.oi_unit))
        .y_desc(format!("Performance ({})", spec.perf_unit))
        .draw()?;

    for (i, bw) in spec.bandwidths.iter().enumerate() {
        let color = Palette99::pick(i).stroke_width(2);
        let series = logspace(x_min, x_max, 200)
            .map(|oi| (oi, spec.ceiling(oi, bw.value)))
            .collect::<Vec<_>>();
        chart
            .draw_series(LineSeries::new(series, color.clone()))?
            .label(format!("{} BW ({:.1})", bw.level, bw.value))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.clone())
            });
    }

    let peak = spec.peak;
    chart
        .draw_series(LineSeries::new(
            vec![(x_min, peak), (x_max, peak)],
            BLACK.stroke_width(3),
        ))?
        .label(format!("Peak ({:.1} {})", peak, spec.perf_unit))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.stroke_width(3)));

    chart.draw_series(
        spec.points
            .iter()
            .map(|p| Circle::new((p.oi, p.perf), 6, RED.filled())),
    )?;
    chart.draw_series(spec.points.iter().map(|p| {
        Text::new(
            p.label.clone(),
            (p.oi, p.perf),
            ("sans-serif", 14).into_font(),
        )
    }))?;

    chart.configure_series_labels().border_style(BLACK).draw()?;
    root.present()?;
    Ok(())
}

/// Render the validation view: actual and predicted CPI over time.
///
/// `series` is (time, actual, predicted) per held-out row; it is sorted by
/// time before drawing.
pub fn render_pred_vs_actual(series: &[(f64, f64, f64)], out: &Path) -> Result<()> {
    if series.is_empty() {
        bail!("no validation rows to plot");
    }

    let mut ordered = series.to_vec();
    ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

    let x_min = ordered.first().map(|s| s.0).unwrap_or(0.0);
    let x_max = ordered.last().map(|s| s.0).unwrap_or(1.0);
    let y_lo = ordered
        .iter()
        .map(|s| s.1.min(s.2))
        .fold(f64::INFINITY, f64::min);
    let y_hi = ordered
        .iter()
        .map(|s| s.1.max(s.2))
        .fold(f64::NEG_INFINITY, f64::max);
    let pad = ((y_hi - y_lo) * 0.1).max(0.1);

    let root = BitMapBackend::new(out, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Validation: CPI actual vs predicted", ("sans-serif", 30))
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..(x_max + 1.0), (y_lo - pad)..(y_hi + pad))?;

    chart
        .configure_mesh()
        .x_desc("time (s) or index")
        .y_desc("CPI (cycles/instruction)")
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            ordered.iter().map(|s| (s.0, s.1)),
            BLUE.stroke_width(2),
        ))?
        .label("CPI (actual)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(2)));
    chart.draw_series(
        ordered
            .iter()
            .map(|s| Circle::new((s.0, s.1), 3, BLUE.filled())),
    )?;

    chart
        .draw_series(LineSeries::new(
            ordered.iter().map(|s| (s.0, s.2)),
            RED.stroke_width(2),
        ))?
        .label("CPI (predicted)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));
    chart.draw_series(
        ordered
            .iter()
            .map(|s| Cross::new((s.0, s.2), 4, RED.stroke_width(1))),
    )?;

    chart.configure_series_labels().border_style(BLACK).draw()?;
    root.present()?;
    Ok(())
}

/// Axis bounds wide enough to show every ceiling ridge and measured point.
fn roofline_bounds(spec: &RooflineSpec) -> (f64, f64, f64, f64) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;

    for bw in &spec.bandwidths {
        // Ridge point: where the slanted ceiling meets the peak.
        let ridge = spec.peak / bw.value;
        x_min = x_min.min(ridge);
        x_max = x_max.max(ridge);
    }
    for p in &spec.points {
        x_min = x_min.min(p.oi);
        x_max = x_max.max(p.oi);
        y_min = y_min.min(p.perf);
    }

    if !x_min.is_finite() || !x_max.is_finite() {
        x_min = 0.01;
        x_max = 100.0;
    }
    if !y_min.is_finite() {
        y_min = spec.peak / 1000.0;
    }

    (x_min / 10.0, x_max * 10.0, y_min / 10.0, spec.peak * 10.0)
}

/// `count` logarithmically spaced samples across [lo, hi].
fn logspace(lo: f64, hi: f64, count: usize) -> impl Iterator<Item = f64> {
    let l0 = lo.log10();
    let l1 = hi.log10();
    let step = (l1 - l0) / (count.saturating_sub(1).max(1)) as f64;
    (0..count).map(move |i| 10f64.powf(l0 + step * i as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logspace_spans_endpoints() {
        let v: Vec<f64> = logspace(0.01, 100.0, 5).collect();
        assert_eq!(v.len(), 5);
        assert!((v[0] - 0.01).abs() < 1e-12);
        assert!((v[4] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn bounds_cover_points_and_ridges() {
        let raw: crate::roofline::RawRoofline = serde_json::from_str(
            r#"{
                "machine": {
                    "peak": 100.0,
                    "bandwidths": [ { "level": "DRAM", "value": 50.0 } ]
                },
                "points": [ { "label": "a", "oi": 0.5, "perf": 10.0 } ]
            }"#,
        )
        .unwrap();
        let spec = raw.validate().unwrap();
        let (x_min, x_max, y_min, y_max) = roofline_bounds(&spec);
        assert!(x_min < 0.5 && x_max > 2.0);
        assert!(y_min < 10.0 && y_max > 100.0);
    }
}

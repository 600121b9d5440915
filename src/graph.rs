#![cfg(feature = "web")]
use crate::error::{DashboardError, Result};
use crate::merge::MergedRecord;
use crate::metric::{DATE_LABEL, Metric};
use crate::metrics::SummaryMetrics;
use plotters::prelude::*;
use std::f64::consts::PI;
use std::ops::Range;

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Caption drawn above the plot
    pub title: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            width: 960,
            height: 420,
        }
    }
}

impl ChartOptions {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }
}

const ACTIVE_COLOR: RGBColor = RGBColor(255, 127, 14);

fn metric_color(metric: Metric) -> RGBColor {
    match metric {
        Metric::Confirmed => RGBColor(31, 119, 180),
        Metric::Deaths => RGBColor(214, 39, 40),
        Metric::Recovered => RGBColor(44, 160, 44),
    }
}

fn chart_err<E: std::fmt::Display>(e: E) -> DashboardError {
    DashboardError::Chart(e.to_string())
}

// Records sit at integer x positions; both time charts use the same range so
// their date axes line up.
fn date_axis(records: &[MergedRecord]) -> Range<f64> {
    -0.5..(records.len() as f64 - 0.5)
}

fn value_axis(values: impl Iterator<Item = i64>) -> Range<f64> {
    let (mut lo, mut hi) = (0.0f64, 0.0f64);
    for v in values {
        lo = lo.min(v as f64);
        hi = hi.max(v as f64);
    }
    let pad = ((hi - lo) * 0.05).max(1.0);
    let bottom = if lo < 0.0 { lo - pad } else { 0.0 };
    bottom..(hi + pad)
}

// Shared layout of the line and bar charts; an empty title draws no caption.
fn time_chart<'a, 'b, DB: DrawingBackend>(
    root: &'a DrawingArea<DB, plotters::coord::Shift>,
    options: &ChartOptions,
) -> ChartBuilder<'a, 'b, DB> {
    let mut builder = ChartBuilder::on(root);
    builder.margin(10).x_label_area_size(30).y_label_area_size(60);
    if !options.title.is_empty() {
        builder.caption(options.title.clone(), ("sans-serif", 24).into_font());
    }
    builder
}

fn date_label(records: &[MergedRecord], x: f64) -> String {
    let i = x.round();
    if i < 0.0 {
        return String::new();
    }
    records
        .get(i as usize)
        .map(|r| r.date.format("%y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Cumulative counts as a line chart with a marker on every day
///
/// # Returns
/// * `Ok(None)` when nothing is selected or there are no records
/// * `Ok(Some(svg))` with the rendered chart otherwise
pub fn line_chart(
    records: &[MergedRecord],
    metrics: &[Metric],
    options: &ChartOptions,
) -> Result<Option<String>> {
    if metrics.is_empty() || records.is_empty() {
        return Ok(None);
    }

    let y_range = value_axis(
        metrics
            .iter()
            .flat_map(|&m| records.iter().map(move |r| r.cumulative(m))),
    );
    let x_label = |x: &f64| date_label(records, *x);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut chart = time_chart(&root, options)
            .build_cartesian_2d(date_axis(records), y_range)
            .map_err(chart_err)?;

        chart
            .configure_mesh()
            .x_labels(8)
            .x_label_formatter(&x_label)
            .x_desc(DATE_LABEL)
            .draw()
            .map_err(chart_err)?;

        for &metric in metrics {
            let color = metric_color(metric);
            let points: Vec<(f64, f64)> = records
                .iter()
                .enumerate()
                .map(|(i, r)| (i as f64, r.cumulative(metric) as f64))
                .collect();

            chart
                .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))
                .map_err(chart_err)?
                .label(metric.label())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            chart
                .draw_series(points.into_iter().map(|p| Circle::new(p, 3, color.filled())))
                .map_err(chart_err)?;
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
    }

    Ok(Some(svg))
}

/// Daily deltas as grouped bars, one bar per selected metric per day
pub fn bar_chart(
    records: &[MergedRecord],
    metrics: &[Metric],
    options: &ChartOptions,
) -> Result<Option<String>> {
    if metrics.is_empty() || records.is_empty() {
        return Ok(None);
    }

    let y_range = value_axis(
        metrics
            .iter()
            .flat_map(|&m| records.iter().map(move |r| r.daily(m))),
    );
    let x_label = |x: &f64| date_label(records, *x);
    let bar_width = 0.8 / metrics.len() as f64;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut chart = time_chart(&root, options)
            .build_cartesian_2d(date_axis(records), y_range)
            .map_err(chart_err)?;

        chart
            .configure_mesh()
            .x_labels(8)
            .x_label_formatter(&x_label)
            .x_desc(DATE_LABEL)
            .draw()
            .map_err(chart_err)?;

        for (j, &metric) in metrics.iter().enumerate() {
            let color = metric_color(metric);
            chart
                .draw_series(records.iter().enumerate().map(move |(i, r)| {
                    let x0 = i as f64 - 0.4 + j as f64 * bar_width;
                    Rectangle::new(
                        [(x0, 0.0), (x0 + bar_width, r.daily(metric) as f64)],
                        color.filled(),
                    )
                }))
                .map_err(chart_err)?
                .label(metric.daily_label())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
    }

    Ok(Some(svg))
}

/// 감염자 분포 pie: recovered, deaths and active cases of the latest day
///
/// Negative slices (inconsistent upstream data) are drawn as empty. Returns
/// `Ok(None)` when there is nothing to divide.
pub fn pie_chart(summary: &SummaryMetrics, options: &ChartOptions) -> Result<Option<String>> {
    let colors = [
        metric_color(Metric::Recovered),
        metric_color(Metric::Deaths),
        ACTIVE_COLOR,
    ];
    let slices = summary.proportions();
    let total: f64 = slices.iter().map(|s| s.value.max(0) as f64).sum();
    if total == 0.0 {
        return Ok(None);
    }

    let (w, h) = (options.width as i32, options.height as i32);
    let center = (w / 2, h / 2 + 15);
    let radius = ((w.min(h) / 2) - 50).max(10) as f64;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        root.draw(&Text::new(
            options.title.clone(),
            (10, 10),
            ("sans-serif", 24).into_font(),
        ))
        .map_err(chart_err)?;

        let point = |angle: f64, r: f64| {
            (
                center.0 + (r * angle.cos()).round() as i32,
                center.1 + (r * angle.sin()).round() as i32,
            )
        };

        // Start at twelve o'clock and go clockwise
        let mut start = -PI / 2.0;
        for (slice, color) in slices.iter().zip(colors) {
            let value = slice.value.max(0);
            if value == 0 {
                continue;
            }
            let share = value as f64 / total;
            let sweep = share * 2.0 * PI;
            let steps = ((sweep / (PI / 90.0)).ceil() as usize).max(1);

            let mut outline = vec![center];
            for s in 0..=steps {
                outline.push(point(start + sweep * s as f64 / steps as f64, radius));
            }
            root.draw(&Polygon::new(outline, color.filled()))
                .map_err(chart_err)?;

            let label_at = point(start + sweep / 2.0, radius + 25.0);
            root.draw(&Text::new(
                format!("{} {:.1}%", slice.label, share * 100.0),
                (label_at.0 - 30, label_at.1 - 8),
                ("sans-serif", 16).into_font(),
            ))
            .map_err(chart_err)?;

            start += sweep;
        }

        root.present().map_err(chart_err)?;
    }

    Ok(Some(svg))
}
